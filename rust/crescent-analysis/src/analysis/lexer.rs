//! Table-driven DFA lexer for Lua source.
//!
//! Each state has an optional accepting kind, keyed byte edges, a default
//! edge (consume the byte and move) and a failure edge (move without
//! consuming, returning the byte to the stream). Tokens are produced by
//! maximal munch: the machine runs until it dies and the last accepting
//! prefix wins.

use crate::analysis::tokens::{Pos, Span, Token, TokenKind};
use std::collections::HashMap;
use std::str::FromStr;

type StateId = usize;

#[derive(Debug, Default)]
struct DfaState {
    accept: Option<TokenKind>,
    edges: HashMap<u8, StateId>,
    default_edge: Option<StateId>,
    failure_edge: Option<StateId>,
}

/// The language DFA. Built once, reused for every document.
pub struct Lexer {
    states: Vec<DfaState>,
    root: StateId,
}

const SYMBOLS: &[(&str, TokenKind)] = &[
    ("=", TokenKind::Assign),
    ("==", TokenKind::Eq),
    ("~=", TokenKind::NotEq),
    ("<", TokenKind::Lt),
    ("<=", TokenKind::LtEq),
    (">", TokenKind::Gt),
    (">=", TokenKind::GtEq),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("^", TokenKind::Caret),
    ("#", TokenKind::Hash),
    ("..", TokenKind::DotDot),
    (".", TokenKind::Dot),
    (":", TokenKind::Colon),
    (",", TokenKind::Comma),
    (";", TokenKind::Semicolon),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    ("...", TokenKind::Ellipsis),
    ("+=", TokenKind::PlusAssign),
    ("-=", TokenKind::MinusAssign),
    ("*=", TokenKind::StarAssign),
    ("/=", TokenKind::SlashAssign),
];

impl Lexer {
    pub fn new() -> Self {
        let mut lexer = Self {
            states: Vec::new(),
            root: 0,
        };
        lexer.root = lexer.state(None);
        lexer.build_symbols();
        lexer.build_whitespace();
        lexer.build_identifiers();
        lexer.build_numbers();
        lexer.build_strings();
        lexer.build_comments();
        lexer
    }

    // ── Construction ──

    fn state(&mut self, accept: Option<TokenKind>) -> StateId {
        self.states.push(DfaState {
            accept,
            ..DfaState::default()
        });
        self.states.len() - 1
    }

    fn edge(&mut self, from: StateId, byte: u8, to: StateId) {
        self.states[from].edges.insert(byte, to);
    }

    fn edge_range(&mut self, from: StateId, bytes: std::ops::RangeInclusive<u8>, to: StateId) {
        for b in bytes {
            self.edge(from, b, to);
        }
    }

    fn default_edge(&mut self, from: StateId, to: StateId) {
        self.states[from].default_edge = Some(to);
    }

    fn failure_edge(&mut self, from: StateId, to: StateId) {
        self.states[from].failure_edge = Some(to);
    }

    fn build_symbols(&mut self) {
        for (text, kind) in SYMBOLS {
            let mut state = self.root;
            for &b in text.as_bytes() {
                state = match self.states[state].edges.get(&b) {
                    Some(&next) => next,
                    None => {
                        let next = self.state(None);
                        self.edge(state, b, next);
                        next
                    }
                };
            }
            self.states[state].accept = Some(*kind);
        }
    }

    fn build_whitespace(&mut self) {
        let ws = self.state(Some(TokenKind::Whitespace));
        for b in [b' ', b'\t', b'\r', b'\n'] {
            self.edge(self.root, b, ws);
            self.edge(ws, b, ws);
        }
    }

    fn build_identifiers(&mut self) {
        let ident = self.state(Some(TokenKind::Ident));
        self.edge(self.root, b'_', ident);
        self.edge_range(self.root, b'a'..=b'z', ident);
        self.edge_range(self.root, b'A'..=b'Z', ident);
        self.edge(ident, b'_', ident);
        self.edge_range(ident, b'a'..=b'z', ident);
        self.edge_range(ident, b'A'..=b'Z', ident);
        self.edge_range(ident, b'0'..=b'9', ident);
    }

    fn build_numbers(&mut self) {
        // Zero gets its own state so 0x can branch into hex.
        let int_zero = self.state(Some(TokenKind::IntLit));
        self.edge(self.root, b'0', int_zero);

        let int = self.state(Some(TokenKind::IntLit));
        self.edge_range(self.root, b'1'..=b'9', int);
        self.edge_range(int, b'0'..=b'9', int);
        self.edge_range(int_zero, b'0'..=b'9', int);

        let decimal = self.state(None);
        self.edge(int_zero, b'.', decimal);
        self.edge(int, b'.', decimal);

        let float = self.state(Some(TokenKind::FloatLit));
        self.edge_range(decimal, b'0'..=b'9', float);
        self.edge_range(float, b'0'..=b'9', float);

        // `.5` reads as a float through the dot symbol state.
        let dot = self.states[self.root].edges[&b'.'];
        self.edge_range(dot, b'0'..=b'9', float);

        let exp_start = self.state(None);
        for s in [int, float] {
            self.edge(s, b'e', exp_start);
            self.edge(s, b'E', exp_start);
        }

        let exp_sign = self.state(None);
        self.edge(exp_start, b'-', exp_sign);

        let exp = self.state(Some(TokenKind::FloatLit));
        self.edge_range(exp_start, b'0'..=b'9', exp);
        self.edge_range(exp_sign, b'0'..=b'9', exp);
        self.edge_range(exp, b'0'..=b'9', exp);

        let hex_start = self.state(None);
        self.edge(int_zero, b'x', hex_start);

        let hex = self.state(Some(TokenKind::IntLit));
        self.edge_range(hex_start, b'0'..=b'9', hex);
        self.edge_range(hex_start, b'a'..=b'f', hex);
        self.edge_range(hex, b'0'..=b'9', hex);
        self.edge_range(hex, b'a'..=b'f', hex);
    }

    fn build_strings(&mut self) {
        self.quoted_string(b'"');
        self.quoted_string(b'\'');

        // Long strings hang off the `[` symbol state; an unfinished opener
        // falls back to the already-accepted bracket token.
        let bracket = self.states[self.root].edges[&b'['];
        self.long_bracket(bracket, TokenKind::StringLit, None);
    }

    /// One quoted-string machine, parameterized on the terminator. Covers
    /// the standard escapes, `\xHH`, and 1-3 digit octal escapes.
    fn quoted_string(&mut self, quote: u8) {
        let body = self.state(None);
        let escape = self.state(None);
        let end = self.state(Some(TokenKind::StringLit));

        self.edge(self.root, quote, body);
        self.default_edge(body, body);
        self.edge(body, quote, end);
        self.edge(body, b'\\', escape);

        for b in [b'b', b't', b'n', b'f', b'r', b'"', b'\'', b'\\'] {
            self.edge(escape, b, body);
        }

        // \xHH, exactly two hex digits
        let hex_first = self.state(None);
        let hex_second = self.state(None);
        self.edge(escape, b'x', hex_first);
        for (from, to) in [(hex_first, hex_second), (hex_second, body)] {
            self.edge_range(from, b'0'..=b'9', to);
            self.edge_range(from, b'a'..=b'f', to);
            self.edge_range(from, b'A'..=b'F', to);
        }

        // Octal escapes accept one, two, or three digits; the failure edge
        // returns the first non-octal byte to the string body.
        let octal_one = self.state(None);
        let octal_two = self.state(None);
        self.failure_edge(octal_one, body);
        self.failure_edge(octal_two, body);
        self.edge_range(escape, b'0'..=b'7', octal_one);
        self.edge_range(octal_one, b'0'..=b'7', octal_two);
        self.edge_range(octal_two, b'0'..=b'7', body);
    }

    /// Long-bracket machine: `gate` has already consumed the introducing
    /// byte; `[` or `=*[` opens the body, `]=*]` closes it. Equals counts
    /// are not matched, except that a body opened with equals demands at
    /// least one equals back, so a bare `]]` inside it stays body text.
    /// `reject` is where an unfinished opener bails to (used by comments to
    /// degrade to a line comment).
    fn long_bracket(&mut self, gate: StateId, accept: TokenKind, reject: Option<StateId>) {
        let end = self.state(Some(accept));

        // `[[` body: closer equals are optional, `]]` terminates.
        let body = self.state(None);
        self.default_edge(body, body);
        self.edge(gate, b'[', body);

        let close = self.state(None);
        self.failure_edge(close, body);
        self.edge(body, b']', close);
        self.edge(close, b']', end);

        let close_eq = self.state(None);
        self.failure_edge(close_eq, body);
        self.edge(close, b'=', close_eq);
        self.edge(close_eq, b'=', close_eq);
        self.edge(close_eq, b']', end);

        // `[=*[` body: only `]=+]` terminates.
        let eq_body = self.state(None);
        self.default_edge(eq_body, eq_body);

        let open_eq = self.state(None);
        self.edge(gate, b'=', open_eq);
        self.edge(open_eq, b'=', open_eq);
        self.edge(open_eq, b'[', eq_body);

        let eq_close = self.state(None);
        self.failure_edge(eq_close, eq_body);
        self.edge(eq_body, b']', eq_close);

        let eq_close_eq = self.state(None);
        self.failure_edge(eq_close_eq, eq_body);
        self.edge(eq_close, b'=', eq_close_eq);
        self.edge(eq_close_eq, b'=', eq_close_eq);
        self.edge(eq_close_eq, b']', end);

        if let Some(reject) = reject {
            self.failure_edge(gate, reject);
            self.failure_edge(open_eq, reject);
        }
    }

    fn build_comments(&mut self) {
        let minus = self.states[self.root].edges[&b'-'];

        // `--` starts a comment; without a long bracket it runs to the
        // newline (which it consumes, \r\n included).
        let maybe_long = self.state(Some(TokenKind::Comment));
        self.edge(minus, b'-', maybe_long);

        let line = self.state(Some(TokenKind::Comment));
        let line_cr = self.state(Some(TokenKind::Comment));
        let line_end = self.state(Some(TokenKind::Comment));
        self.default_edge(line, line);
        self.edge(line, b'\r', line_cr);
        self.edge(line, b'\n', line_end);
        self.edge(line_cr, b'\n', line_end);
        self.failure_edge(maybe_long, line);

        let gate = self.state(None);
        self.edge(maybe_long, b'[', gate);
        self.failure_edge(gate, line);
        self.long_bracket(gate, TokenKind::Comment, Some(line));
    }

    // ── Driving ──

    /// Scan one token starting at `offset`. Returns the token and the
    /// position just past it. A dead start yields a zero-length `Invalid`
    /// token; the caller advances one byte.
    fn scan_token(&self, source: &[u8], offset: usize, pos: Pos) -> (Token, Pos) {
        let mut state = self.root;
        let mut cursor = offset;
        let mut here = pos;
        let mut accepted: Option<(usize, Pos, TokenKind)> = None;
        let mut stalls = 0usize;

        while let Some(&byte) = source.get(cursor) {
            let next = if let Some(&to) = self.states[state].edges.get(&byte) {
                cursor += 1;
                here = advance(here, byte);
                stalls = 0;
                Some(to)
            } else if let Some(to) = self.states[state].failure_edge {
                // The byte goes back to the stream; a failure chain must
                // consume eventually, so cap how long it can spin.
                stalls += 1;
                if stalls > self.states.len() {
                    None
                } else {
                    Some(to)
                }
            } else if let Some(to) = self.states[state].default_edge {
                cursor += 1;
                here = advance(here, byte);
                stalls = 0;
                Some(to)
            } else {
                None
            };

            match next {
                Some(to) => {
                    state = to;
                    if let Some(kind) = self.states[state].accept {
                        accepted = Some((cursor, here, kind));
                    }
                }
                None => break,
            }
        }

        match accepted {
            Some((end, end_pos, kind)) => (Token::new(kind, Span::new(offset, end), pos), end_pos),
            None => (Token::new(TokenKind::Invalid, Span::new(offset, offset), pos), pos),
        }
    }

    /// Tokenize a whole document, whitespace and comments included.
    /// Identifiers matching a keyword are re-typed.
    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        let bytes = source.as_bytes();
        let mut tokens = Vec::new();
        let mut offset = 0;
        let mut pos = Pos::default();

        while offset < bytes.len() {
            let (mut token, next_pos) = self.scan_token(bytes, offset, pos);

            if token.span.is_empty() {
                pos = advance(pos, bytes[offset]);
                offset += 1;
                continue;
            }

            if token.kind == TokenKind::Ident {
                if let Ok(keyword) = TokenKind::from_str(token.text(source)) {
                    token.kind = keyword;
                }
            }

            tokens.push(token);
            offset = token.span.end;
            pos = next_pos;
        }

        tokens
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

fn advance(pos: Pos, byte: u8) -> Pos {
    if byte == b'\n' {
        Pos::new(pos.line + 1, 0)
    } else {
        Pos::new(pos.line, pos.col + 1)
    }
}

/// Drop whitespace and comments ahead of parsing.
pub fn strip_trivia(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new().tokenize(src).iter().map(|t| t.kind).collect()
    }

    fn texts(src: &str) -> Vec<String> {
        Lexer::new()
            .tokenize(src)
            .iter()
            .map(|t| t.text(src).to_string())
            .collect()
    }

    #[test]
    fn test_lex_keywords() {
        let src = "function local if then else elseif end while do repeat until for in return break and or not nil true false";
        let toks: Vec<_> = kinds(src)
            .into_iter()
            .filter(|k| *k != TokenKind::Whitespace)
            .collect();
        assert_eq!(toks[0], TokenKind::Function);
        assert_eq!(toks[1], TokenKind::Local);
        assert_eq!(toks[8], TokenKind::Do);
        assert_eq!(toks[20], TokenKind::False);
    }

    #[test]
    fn test_lex_identifier_not_keyword() {
        assert_eq!(kinds("functions"), vec![TokenKind::Ident]);
        assert_eq!(kinds("_end"), vec![TokenKind::Ident]);
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::IntLit]);
        assert_eq!(kinds("0xff"), vec![TokenKind::IntLit]);
        assert_eq!(kinds("3.14"), vec![TokenKind::FloatLit]);
        assert_eq!(kinds(".5"), vec![TokenKind::FloatLit]);
        assert_eq!(kinds("1e10"), vec![TokenKind::FloatLit]);
        assert_eq!(kinds("2.5e-3"), vec![TokenKind::FloatLit]);
    }

    #[test]
    fn test_lex_maximal_munch_operators() {
        assert_eq!(
            kinds("= == ~= <= .. . ... += /="),
            vec![
                TokenKind::Assign,
                TokenKind::Whitespace,
                TokenKind::Eq,
                TokenKind::Whitespace,
                TokenKind::NotEq,
                TokenKind::Whitespace,
                TokenKind::LtEq,
                TokenKind::Whitespace,
                TokenKind::DotDot,
                TokenKind::Whitespace,
                TokenKind::Dot,
                TokenKind::Whitespace,
                TokenKind::Ellipsis,
                TokenKind::Whitespace,
                TokenKind::PlusAssign,
                TokenKind::Whitespace,
                TokenKind::SlashAssign,
            ]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        // Hex escape, octal escape, then an escaped backslash-n.
        let src = r#""\x41\65\\n""#;
        let toks = Lexer::new().tokenize(src);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::StringLit);
        assert_eq!(toks[0].text(src), src);
    }

    #[test]
    fn test_lex_octal_escape_backtracks() {
        // One octal digit followed by a non-octal byte stays in the string.
        let src = r#""\7g""#;
        assert_eq!(kinds(src), vec![TokenKind::StringLit]);
    }

    #[test]
    fn test_lex_char_string() {
        let src = "'it''s'";
        assert_eq!(kinds(src), vec![TokenKind::StringLit, TokenKind::StringLit]);
    }

    #[test]
    fn test_lex_long_string() {
        let src = "[=[line\nline]] more]=]";
        let toks = Lexer::new().tokenize(src);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::StringLit);
    }

    #[test]
    fn test_lex_long_string_zero_equals() {
        let src = "[[hi]] x";
        let toks = Lexer::new().tokenize(src);
        assert_eq!(toks[0].kind, TokenKind::StringLit);
        assert_eq!(toks[0].text(src), "[[hi]]");
        assert_eq!(toks[2].kind, TokenKind::Ident);
    }

    #[test]
    fn test_lex_line_comment() {
        let src = "-- hello\nx";
        assert_eq!(kinds(src), vec![TokenKind::Comment, TokenKind::Ident]);
    }

    #[test]
    fn test_lex_long_comment_zero_equals() {
        let src = "--[[ hi ]] x";
        let toks = Lexer::new().tokenize(src);
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].text(src), "--[[ hi ]]");
        assert_eq!(toks[2].kind, TokenKind::Ident);
    }

    #[test]
    fn test_lex_long_comment_inner_brackets() {
        let src = "--[==[ commented ]] still ]==] not";
        let toks = Lexer::new().tokenize(src);
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].text(src), "--[==[ commented ]] still ]==]");
        assert_eq!(toks[1].kind, TokenKind::Whitespace);
        assert_eq!(toks[2].kind, TokenKind::Not);
    }

    #[test]
    fn test_lex_unterminated_string_recovers() {
        // The opening quote never reaches an accepting state; the driver
        // skips it and re-lexes the rest.
        assert_eq!(texts("\"abc"), vec!["abc"]);
    }

    #[test]
    fn test_lex_positions() {
        let src = "a\nbb c";
        let toks = Lexer::new().tokenize(src);
        let idents: Vec<_> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .collect();
        assert_eq!(idents[0].pos, Pos::new(0, 0));
        assert_eq!(idents[1].pos, Pos::new(1, 0));
        assert_eq!(idents[2].pos, Pos::new(1, 3));
    }

    #[test]
    fn test_relex_token_spans_roundtrip() {
        let src = "local x = 1 + 2.5 -- done\nreturn x";
        let lexer = Lexer::new();
        let toks = lexer.tokenize(src);
        for tok in &toks {
            let relexed = lexer.tokenize(tok.text(src));
            assert_eq!(relexed.len(), 1, "token {:?} should re-lex whole", tok);
            assert_eq!(relexed[0].kind, tok.kind);
        }
    }
}
