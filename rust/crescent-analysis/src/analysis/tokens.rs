use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumString;

/// Zero-indexed source location. Columns count bytes; a newline resets the
/// column to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Byte range in the source, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Token types for the Lua lexer.
///
/// Keyword variants carry a `strum(serialize = ...)` form so the lexer can
/// re-type identifiers through `TokenKind::from_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
pub enum TokenKind {
    #[strum(disabled)]
    Invalid,

    // Lexical classes
    #[strum(disabled)]
    Ident,
    #[strum(disabled)]
    IntLit,
    #[strum(disabled)]
    FloatLit,
    #[strum(disabled)]
    StringLit,
    #[strum(disabled)]
    Whitespace,
    #[strum(disabled)]
    Comment,

    // Keywords
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "do")]
    Do,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "elseif")]
    Elseif,
    #[strum(serialize = "end")]
    End,
    #[strum(serialize = "false")]
    False,
    #[strum(serialize = "for")]
    For,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "local")]
    Local,
    #[strum(serialize = "nil")]
    Nil,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "repeat")]
    Repeat,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "then")]
    Then,
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "until")]
    Until,
    #[strum(serialize = "while")]
    While,

    // Symbols
    #[strum(disabled)]
    Assign, // =
    #[strum(disabled)]
    Eq, // ==
    #[strum(disabled)]
    NotEq, // ~=
    #[strum(disabled)]
    Lt,
    #[strum(disabled)]
    LtEq,
    #[strum(disabled)]
    Gt,
    #[strum(disabled)]
    GtEq,
    #[strum(disabled)]
    Plus,
    #[strum(disabled)]
    Minus,
    #[strum(disabled)]
    Star,
    #[strum(disabled)]
    Slash,
    #[strum(disabled)]
    Percent,
    #[strum(disabled)]
    Caret,
    #[strum(disabled)]
    Hash,
    #[strum(disabled)]
    DotDot, // ..
    #[strum(disabled)]
    Dot,
    #[strum(disabled)]
    Colon,
    #[strum(disabled)]
    Comma,
    #[strum(disabled)]
    Semicolon,
    #[strum(disabled)]
    LParen,
    #[strum(disabled)]
    RParen,
    #[strum(disabled)]
    LBracket,
    #[strum(disabled)]
    RBracket,
    #[strum(disabled)]
    LBrace,
    #[strum(disabled)]
    RBrace,
    #[strum(disabled)]
    Ellipsis, // ...
    #[strum(disabled)]
    PlusAssign, // +=
    #[strum(disabled)]
    MinusAssign, // -=
    #[strum(disabled)]
    StarAssign, // *=
    #[strum(disabled)]
    SlashAssign, // /=
}

impl TokenKind {
    /// Keywords offered by completion, in declaration order.
    pub const KEYWORDS: [TokenKind; 21] = [
        TokenKind::And,
        TokenKind::Break,
        TokenKind::Do,
        TokenKind::Else,
        TokenKind::Elseif,
        TokenKind::End,
        TokenKind::False,
        TokenKind::For,
        TokenKind::Function,
        TokenKind::If,
        TokenKind::In,
        TokenKind::Local,
        TokenKind::Nil,
        TokenKind::Not,
        TokenKind::Or,
        TokenKind::Repeat,
        TokenKind::Return,
        TokenKind::Then,
        TokenKind::True,
        TokenKind::Until,
        TokenKind::While,
    ];
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Invalid => "Invalid",
            TokenKind::Ident => "Identifier",
            TokenKind::IntLit => "IntegerLiteral",
            TokenKind::FloatLit => "FloatLiteral",
            TokenKind::StringLit => "StringLiteral",
            TokenKind::Whitespace => "Whitespace",
            TokenKind::Comment => "Comment",
            TokenKind::And => "and",
            TokenKind::Break => "break",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::Elseif => "elseif",
            TokenKind::End => "end",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::In => "in",
            TokenKind::Local => "local",
            TokenKind::Nil => "nil",
            TokenKind::Not => "not",
            TokenKind::Or => "or",
            TokenKind::Repeat => "repeat",
            TokenKind::Return => "return",
            TokenKind::Then => "then",
            TokenKind::True => "true",
            TokenKind::Until => "until",
            TokenKind::While => "while",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "~=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Hash => "#",
            TokenKind::DotDot => "..",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Ellipsis => "...",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
        };
        f.write_str(text)
    }
}

/// One lexeme: kind, byte range, and the position of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, pos: Pos) -> Self {
        Self { kind, span, pos }
    }

    /// The lexeme's text within `source`.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}
