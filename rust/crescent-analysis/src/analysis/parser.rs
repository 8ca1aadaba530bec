//! Recursive descent parser for Lua, tolerant of the half-typed input an
//! editor produces.
//!
//! The collecting entry point keeps building after errors so a usable tree
//! always comes back; `parse_strict` surfaces the first error instead. The
//! assignment/call ambiguity is settled by always reading a variable
//! statement first and rewriting it into a call when its trailing suffix
//! ends on calls with no index.

use crate::analysis::ast::{
    Ast, FunctionData, Literal, NodeId, NodeKind, Param, TableEntry,
};
use crate::analysis::tokens::{Pos, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at line {line}, col {col}")]
    Unexpected {
        expected: String,
        found: String,
        line: u32,
        col: u32,
    },
    #[error("unexpected end of input at line {line}, col {col}")]
    UnexpectedEof { line: u32, col: u32 },
    #[error("syntax error near '{text}' at line {line}, col {col}")]
    TrailingInput { text: String, line: u32, col: u32 },
}

impl ParseError {
    pub fn pos(&self) -> Pos {
        match self {
            ParseError::Unexpected { line, col, .. }
            | ParseError::UnexpectedEof { line, col }
            | ParseError::TrailingInput { line, col, .. } => Pos::new(*line, *col),
        }
    }
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<ParseError>,
    ast: Ast,
}

/// Parse in collecting mode: errors accumulate, the tree always comes back.
pub fn parse(source: &str, tokens: &[Token]) -> (Ast, Vec<ParseError>) {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        errors: Vec::new(),
        ast: Ast::new(),
    };
    parser.start();
    (parser.ast, parser.errors)
}

/// Parse in strict mode: the first error wins.
pub fn parse_strict(source: &str, tokens: &[Token]) -> Result<Ast, ParseError> {
    let (ast, errors) = parse(source, tokens);
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(ast),
    }
}

impl<'a> Parser<'a> {
    // ── Token plumbing ──

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    /// Position of the last consumed token; where most nodes anchor.
    fn prev_pos(&self) -> Pos {
        if self.pos == 0 {
            return Pos::default();
        }
        self.tokens
            .get(self.pos - 1)
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn accept_tok(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == Some(kind) {
            let tok = self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn record_expected(&mut self, expected: &str) {
        match self.tokens.get(self.pos) {
            Some(tok) => self.errors.push(ParseError::Unexpected {
                expected: expected.to_string(),
                found: tok.kind.to_string(),
                line: tok.pos.line,
                col: tok.pos.col,
            }),
            None => {
                let pos = self
                    .tokens
                    .last()
                    .map(|t| t.pos)
                    .unwrap_or_default();
                self.errors.push(ParseError::UnexpectedEof {
                    line: pos.line,
                    col: pos.col,
                });
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.accept(kind) {
            true
        } else {
            self.record_expected(&kind.to_string());
            false
        }
    }

    fn expect_tok(&mut self, kind: TokenKind) -> Option<Token> {
        match self.accept_tok(kind) {
            Some(tok) => Some(tok),
            None => {
                self.record_expected(&kind.to_string());
                None
            }
        }
    }

    fn text(&self, tok: &Token) -> String {
        tok.text(self.source).to_string()
    }

    // ── Rules ──

    fn start(&mut self) {
        let pos = self.prev_pos();
        let body = self.chunk();

        if !self.at_end() {
            let tok = self.tokens[self.pos];
            self.errors.push(ParseError::TrailingInput {
                text: self.text(&tok),
                line: tok.pos.line,
                col: tok.pos.col,
            });
        }

        // The root chunk keeps no end marker; completions at top level fall
        // through to the chunk itself.
        if let NodeKind::Block { end, .. } = &mut self.ast[body].kind {
            *end = None;
        }

        let root = self.ast.add(
            NodeKind::Function(FunctionData {
                is_local: false,
                name: Vec::new(),
                params: Vec::new(),
                body: Some(body),
            }),
            pos,
        );
        self.ast.root = root;
    }

    /// A block: statements, an optional final break/return, and a synthetic
    /// end marker for the completion engine. Never fails.
    fn chunk(&mut self) -> NodeId {
        let mut pos = self.prev_pos();
        // Nudge the block just past the token that opened it, so a cursor on
        // that token still resolves to the outer scope.
        pos.col += 1;

        let mut statements = Vec::new();
        while let Some(statement) = self.statement() {
            self.accept(TokenKind::Semicolon);
            statements.push(statement);
        }

        if let Some(last) = self.last_statement() {
            self.accept(TokenKind::Semicolon);
            statements.push(last);
        }

        let end = self.ast.add(NodeKind::EndMarker, self.prev_pos());
        self.ast.add(
            NodeKind::Block {
                statements,
                end: Some(end),
                locals: Vec::new(),
            },
            pos,
        )
    }

    fn set_block_end_pos(&mut self, block: NodeId, pos: Pos) {
        if let NodeKind::Block { end: Some(end), .. } = self.ast[block].kind {
            self.ast[end].pos = pos;
        }
    }

    fn statement(&mut self) -> Option<NodeId> {
        // Both assignments and call statements start with a variable; read
        // one and decide afterwards.
        if let Some(variable) = self.variable_statement() {
            if let Some(suffix) = self.suffix_without_index(variable) {
                let calls = match &mut self.ast[suffix].kind {
                    NodeKind::Suffix { calls, .. } => std::mem::take(calls),
                    _ => Vec::new(),
                };
                let call = self.ast.add(
                    NodeKind::FunctionCall { variable, calls },
                    self.prev_pos(),
                );
                return Some(call);
            }
            return Some(self.assignment(variable));
        }

        if self.accept(TokenKind::Do) {
            let block = self.chunk();
            self.expect(TokenKind::End);
            self.set_block_end_pos(block, self.prev_pos());
            return Some(block);
        }

        if self.accept(TokenKind::While) {
            let pos = self.prev_pos();
            let condition = self.expression();
            self.expect(TokenKind::Do);
            let body = self.chunk();
            self.expect(TokenKind::End);
            self.set_block_end_pos(body, self.prev_pos());
            return Some(self.ast.add(
                NodeKind::While {
                    condition,
                    body: Some(body),
                },
                pos,
            ));
        }

        if self.accept(TokenKind::Repeat) {
            let pos = self.prev_pos();
            let body = self.chunk();
            self.expect(TokenKind::Until);
            let condition = self.expression();
            self.set_block_end_pos(body, self.prev_pos());
            return Some(self.ast.add(
                NodeKind::Repeat {
                    body: Some(body),
                    condition,
                },
                pos,
            ));
        }

        if self.accept(TokenKind::If) {
            return Some(self.if_statement());
        }

        if self.accept(TokenKind::For) {
            return self.for_statement();
        }

        if self.accept(TokenKind::Function) {
            return Some(self.function_statement(false));
        }

        if self.accept(TokenKind::Local) {
            if self.accept(TokenKind::Function) {
                return Some(self.function_statement(true));
            }

            let pos = self.prev_pos();
            let mut names = Vec::new();
            self.identifier_list(&mut names);

            let mut exprs = Vec::new();
            if self.accept(TokenKind::Assign) {
                self.expression_list(&mut exprs);
            }

            return Some(self.ast.add(NodeKind::LocalVariable { names, exprs }, pos));
        }

        None
    }

    fn if_statement(&mut self) -> NodeId {
        let pos = self.prev_pos();
        let condition = self.expression();
        self.expect(TokenKind::Then);
        let body = self.chunk();
        let else_branch = self.else_clause();
        self.expect(TokenKind::End);
        let end_pos = self.prev_pos();

        match else_branch {
            None => self.set_block_end_pos(body, end_pos),
            Some(els) => {
                // Each arm's end marker points at the next arm; the last arm
                // gets the real `end` token.
                self.set_block_end_pos(body, self.ast[els].pos);

                let mut leaf = els;
                while let NodeKind::If {
                    else_branch: Some(next),
                    ..
                } = self.ast[leaf].kind
                {
                    leaf = next;
                }
                if let NodeKind::If {
                    body: Some(leaf_body),
                    ..
                } = self.ast[leaf].kind
                {
                    self.set_block_end_pos(leaf_body, end_pos);
                }
            }
        }

        self.ast.add(
            NodeKind::If {
                condition,
                body: Some(body),
                else_branch,
            },
            pos,
        )
    }

    fn else_clause(&mut self) -> Option<NodeId> {
        if self.accept(TokenKind::Elseif) {
            let pos = self.prev_pos();
            let condition = self.expression();
            self.expect(TokenKind::Then);
            let body = self.chunk();
            let else_branch = self.else_clause();

            if let Some(els) = else_branch {
                self.set_block_end_pos(body, self.ast[els].pos);
            }

            return Some(self.ast.add(
                NodeKind::If {
                    condition,
                    body: Some(body),
                    else_branch,
                },
                pos,
            ));
        }

        if self.accept(TokenKind::Else) {
            let pos = self.prev_pos();
            let body = self.chunk();
            return Some(self.ast.add(
                NodeKind::If {
                    condition: None,
                    body: Some(body),
                    else_branch: None,
                },
                pos,
            ));
        }

        None
    }

    fn for_statement(&mut self) -> Option<NodeId> {
        let mut names = Vec::new();
        self.identifier_list(&mut names);

        if self.accept(TokenKind::Assign) {
            let pos = self.prev_pos();
            let start = self.expression();
            self.expect(TokenKind::Comma);
            let limit = self.expression();
            let step = if self.accept(TokenKind::Comma) {
                self.expression()
            } else {
                None
            };
            self.expect(TokenKind::Do);
            let body = self.chunk();
            self.expect(TokenKind::End);
            self.set_block_end_pos(body, self.prev_pos());
            return Some(self.ast.add(
                NodeKind::NumericFor {
                    name: names.into_iter().next(),
                    start,
                    limit,
                    step,
                    body: Some(body),
                },
                pos,
            ));
        }

        if self.accept(TokenKind::In) {
            let pos = self.prev_pos();
            let mut exprs = Vec::new();
            self.expression_list(&mut exprs);
            self.expect(TokenKind::Do);
            let body = self.chunk();
            self.expect(TokenKind::End);
            self.set_block_end_pos(body, self.prev_pos());
            return Some(self.ast.add(
                NodeKind::GenericFor {
                    names,
                    exprs,
                    body: Some(body),
                },
                pos,
            ));
        }

        self.record_expected("= or in");
        None
    }

    fn function_statement(&mut self, is_local: bool) -> NodeId {
        let pos = self.prev_pos();
        let mut name = Vec::new();

        name.push(self.function_name(false));

        if !is_local {
            loop {
                if self.accept(TokenKind::Dot) {
                    name.push(self.function_name(false));
                    continue;
                }
                if self.accept(TokenKind::Colon) {
                    name.push(self.function_name(true));
                }
                break;
            }
        }

        let function = self.ast.add(
            NodeKind::Function(FunctionData {
                is_local,
                name,
                params: Vec::new(),
                body: None,
            }),
            pos,
        );
        self.function_body(function);
        function
    }

    fn function_name(&mut self, is_method: bool) -> NodeId {
        let name = self
            .expect_tok(TokenKind::Ident)
            .map(|t| self.text(&t))
            .unwrap_or_default();
        self.ast
            .add(NodeKind::FunctionName { name, is_method }, self.prev_pos())
    }

    fn function_body(&mut self, function: NodeId) {
        self.ast[function].pos = self.prev_pos();

        self.expect(TokenKind::LParen);
        let params = self.parameter_list();
        self.expect(TokenKind::RParen);

        let body = self.chunk();
        self.expect(TokenKind::End);
        self.set_block_end_pos(body, self.prev_pos());

        if let NodeKind::Function(data) = &mut self.ast[function].kind {
            data.params = params;
            data.body = Some(body);
        }
    }

    fn parameter_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();

        if let Some(tok) = self.accept_tok(TokenKind::Ident) {
            params.push(Param {
                name: self.text(&tok),
                pos: tok.pos,
            });
            loop {
                if self.accept(TokenKind::Comma) {
                    if let Some(tok) = self.accept_tok(TokenKind::Ident) {
                        params.push(Param {
                            name: self.text(&tok),
                            pos: tok.pos,
                        });
                        continue;
                    }
                    // `...` must close the list.
                    if let Some(tok) = self.accept_tok(TokenKind::Ellipsis) {
                        params.push(Param {
                            name: self.text(&tok),
                            pos: tok.pos,
                        });
                    }
                }
                break;
            }
        } else if let Some(tok) = self.accept_tok(TokenKind::Ellipsis) {
            params.push(Param {
                name: self.text(&tok),
                pos: tok.pos,
            });
        }

        params
    }

    fn identifier_list(&mut self, names: &mut Vec<Param>) -> bool {
        let Some(first) = self.accept_tok(TokenKind::Ident) else {
            return false;
        };
        names.push(Param {
            name: self.text(&first),
            pos: first.pos,
        });

        if self.accept(TokenKind::Comma) {
            loop {
                if let Some(tok) = self.expect_tok(TokenKind::Ident) {
                    names.push(Param {
                        name: self.text(&tok),
                        pos: tok.pos,
                    });
                }
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }

        true
    }

    fn last_statement(&mut self) -> Option<NodeId> {
        if self.accept(TokenKind::Break) {
            return Some(self.ast.add(NodeKind::Break, self.prev_pos()));
        }

        if self.accept(TokenKind::Return) {
            let pos = self.prev_pos();
            let mut values = Vec::new();
            self.expression_list(&mut values);
            return Some(self.ast.add(NodeKind::Return { values }, pos));
        }

        None
    }

    fn assignment(&mut self, first: NodeId) -> NodeId {
        let mut targets = vec![first];

        loop {
            if self.accept(TokenKind::Comma) {
                if let Some(variable) = self.variable_statement() {
                    targets.push(variable);
                    continue;
                }
            }
            break;
        }

        let op = [
            TokenKind::Assign,
            TokenKind::SlashAssign,
            TokenKind::MinusAssign,
            TokenKind::StarAssign,
            TokenKind::PlusAssign,
        ]
        .into_iter()
        .find(|k| self.accept(*k));

        let mut values = Vec::new();
        let mut pos = Pos::default();
        match op {
            Some(_) => {
                self.expression_list(&mut values);
                pos = self.prev_pos();
            }
            None => {
                let found = self
                    .tokens
                    .get(self.pos.saturating_sub(1))
                    .map(|t| t.kind.to_string())
                    .unwrap_or_else(|| "end of input".to_string());
                let at = self.prev_pos();
                self.errors.push(ParseError::Unexpected {
                    expected: "=, +=, -=, *=, or /=".to_string(),
                    found,
                    line: at.line,
                    col: at.col,
                });
            }
        }

        self.ast.add(
            NodeKind::Assignment {
                op,
                targets,
                values,
            },
            pos,
        )
    }

    /// `suffix` of `variable` when it ends on calls without an index — the
    /// shape that makes the statement a function call.
    fn suffix_without_index(&self, variable: NodeId) -> Option<NodeId> {
        if let NodeKind::VariableStatement {
            suffix: Some(suffix),
            ..
        } = self.ast[variable].kind
        {
            if let NodeKind::Suffix { index: None, .. } = self.ast[suffix].kind {
                return Some(suffix);
            }
        }
        None
    }

    fn variable_statement(&mut self) -> Option<NodeId> {
        let pos = self.prev_pos();

        let head = if let Some(tok) = self.accept_tok(TokenKind::Ident) {
            let name = self.text(&tok);
            self.ast.add(NodeKind::NameVariable { name }, self.prev_pos())
        } else if self.accept(TokenKind::LParen) {
            let paren_pos = self.prev_pos();
            let expr = self.expression();
            self.expect(TokenKind::RParen);

            let inner_suffix = self.variable_suffix();
            if let Some(sfx) = inner_suffix {
                if matches!(self.ast[sfx].kind, NodeKind::Suffix { index: None, .. }) {
                    // Ends on calls: the suffix belongs to the statement so
                    // the call rewrite can lift it.
                    let head = self
                        .ast
                        .add(NodeKind::ParenVariable { expr, suffix: None }, paren_pos);
                    return Some(self.ast.add(
                        NodeKind::VariableStatement {
                            head,
                            suffix: Some(sfx),
                        },
                        pos,
                    ));
                }
            }

            self.ast.add(
                NodeKind::ParenVariable {
                    expr,
                    suffix: inner_suffix,
                },
                paren_pos,
            )
        } else {
            return None;
        };

        // Zero or more suffixes, linked into a left-leaning spine.
        let mut current: Option<NodeId> = None;
        while let Some(new_suffix) = self.variable_suffix() {
            if let NodeKind::Suffix { left, .. } = &mut self.ast[new_suffix].kind {
                *left = current;
            }
            current = Some(new_suffix);
        }

        Some(self.ast.add(
            NodeKind::VariableStatement {
                head,
                suffix: current,
            },
            pos,
        ))
    }

    fn variable_suffix(&mut self) -> Option<NodeId> {
        let pos = self.prev_pos();

        let mut calls = Vec::new();
        while let Some(call) = self.call() {
            calls.push(call);
        }

        let index = if self.accept(TokenKind::LBracket) {
            let ix_pos = self.prev_pos();
            let expr = self.expression();
            self.expect(TokenKind::RBracket);
            Some(self.ast.add(NodeKind::ExprIndex { expr }, ix_pos))
        } else if self.accept(TokenKind::Dot) {
            // A bare `.` still yields an index node so completion can see
            // where the member goes.
            let ix_pos = self.prev_pos();
            let name = self
                .accept_tok(TokenKind::Ident)
                .map(|t| self.text(&t))
                .unwrap_or_default();
            Some(self.ast.add(NodeKind::NameIndex { name }, ix_pos))
        } else {
            if !calls.is_empty() {
                return Some(self.ast.add(
                    NodeKind::Suffix {
                        left: None,
                        calls,
                        index: None,
                    },
                    pos,
                ));
            }
            return None;
        };

        Some(self.ast.add(
            NodeKind::Suffix {
                left: None,
                calls,
                index,
            },
            pos,
        ))
    }

    fn call(&mut self) -> Option<NodeId> {
        if self.accept(TokenKind::Colon) {
            let pos = self.prev_pos();
            let name_tok = self.expect_tok(TokenKind::Ident);
            let name = name_tok.map(|t| self.text(&t)).unwrap_or_default();

            // A `:` with no name still produces a node for completion.
            if name.is_empty() {
                return Some(self.ast.add(NodeKind::MemberCall { name, args: None }, pos));
            }

            let args = self.arguments()?;
            return Some(self.ast.add(
                NodeKind::MemberCall {
                    name,
                    args: Some(args),
                },
                pos,
            ));
        }

        let pos = self.prev_pos();
        let args = self.arguments()?;
        Some(self.ast.add(NodeKind::Call { args: Some(args) }, pos))
    }

    fn arguments(&mut self) -> Option<NodeId> {
        if self.accept(TokenKind::LParen) {
            let pos = self.prev_pos();
            let mut list = Vec::new();
            self.expression_list(&mut list);
            self.expect(TokenKind::RParen);
            return Some(self.ast.add(NodeKind::ExprArgs { list }, pos));
        }

        if let Some(tok) = self.accept_tok(TokenKind::StringLit) {
            let value = self.text(&tok);
            return Some(self.ast.add(NodeKind::StringArg { value }, self.prev_pos()));
        }

        let table = self.table()?;
        Some(
            self.ast
                .add(NodeKind::TableArg { table }, self.prev_pos()),
        )
    }

    fn table(&mut self) -> Option<NodeId> {
        if !self.accept(TokenKind::LBrace) {
            return None;
        }
        let pos = self.prev_pos();

        let entries = self.field_list();
        self.expect(TokenKind::RBrace);

        Some(self.ast.add(NodeKind::Table { entries }, pos))
    }

    fn field_list(&mut self) -> Vec<TableEntry> {
        let mut entries = Vec::new();

        match self.field() {
            Some(entry) => entries.push(entry),
            None => return entries,
        }

        loop {
            if !self.accept(TokenKind::Comma) && !self.accept(TokenKind::Semicolon) {
                break;
            }
            match self.field() {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }

        entries
    }

    fn field(&mut self) -> Option<TableEntry> {
        if self.accept(TokenKind::LBracket) {
            let pos = self.prev_pos();
            let expr = self.expression();
            self.expect(TokenKind::RBracket);
            self.expect(TokenKind::Assign);
            let value = self.expression();
            let index = self.ast.add(NodeKind::ExprIndex { expr }, pos);
            return Some(TableEntry {
                index: Some(index),
                value,
            });
        }

        if let Some(tok) = self.accept_tok(TokenKind::Ident) {
            let name = self.text(&tok);
            let index = self.ast.add(NodeKind::NameIndex { name }, tok.pos);
            let value = if self.accept(TokenKind::Assign) {
                self.expression()
            } else {
                None
            };
            return Some(TableEntry {
                index: Some(index),
                value,
            });
        }

        let value = self.expression()?;
        Some(TableEntry {
            index: None,
            value: Some(value),
        })
    }

    fn expression_list(&mut self, exprs: &mut Vec<NodeId>) -> bool {
        let Some(first) = self.expression() else {
            return false;
        };
        exprs.push(first);

        if self.accept(TokenKind::Comma) {
            loop {
                if let Some(expr) = self.expression() {
                    exprs.push(expr);
                }
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }

        true
    }

    // ── Expression grammar, lowest precedence first ──

    fn expression(&mut self) -> Option<NodeId> {
        self.expr_or()
    }

    fn binary_chain(
        &mut self,
        ops: &[TokenKind],
        next: fn(&mut Self) -> Option<NodeId>,
    ) -> Option<NodeId> {
        let mut expr = next(self)?;

        loop {
            let Some(op) = ops.iter().copied().find(|k| self.accept(*k)) else {
                break;
            };
            let pos = self.prev_pos();
            let rhs = next(self);
            expr = self.ast.add(NodeKind::Binary { op, lhs: expr, rhs }, pos);
        }

        Some(expr)
    }

    fn expr_or(&mut self) -> Option<NodeId> {
        self.binary_chain(&[TokenKind::Or], Self::expr_and)
    }

    fn expr_and(&mut self) -> Option<NodeId> {
        self.binary_chain(&[TokenKind::And], Self::expr_compare)
    }

    fn expr_compare(&mut self) -> Option<NodeId> {
        self.binary_chain(
            &[
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Eq,
                TokenKind::NotEq,
            ],
            Self::expr_concat,
        )
    }

    fn expr_concat(&mut self) -> Option<NodeId> {
        self.binary_chain(&[TokenKind::DotDot], Self::expr_additive)
    }

    fn expr_additive(&mut self) -> Option<NodeId> {
        self.binary_chain(&[TokenKind::Plus, TokenKind::Minus], Self::expr_multiplicative)
    }

    fn expr_multiplicative(&mut self) -> Option<NodeId> {
        self.binary_chain(
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
            Self::expr_unary,
        )
    }

    /// Unary prefixes stack freely: `- not # x`.
    fn expr_unary(&mut self) -> Option<NodeId> {
        let mut ops = Vec::new();
        loop {
            let Some(op) = [TokenKind::Minus, TokenKind::Not, TokenKind::Hash]
                .into_iter()
                .find(|k| self.accept(*k))
            else {
                break;
            };
            ops.push((op, self.prev_pos()));
        }

        let mut expr = self.expr_power();
        for (op, pos) in ops.into_iter().rev() {
            expr = Some(self.ast.add(NodeKind::Unary { op, rhs: expr }, pos));
        }
        expr
    }

    fn expr_power(&mut self) -> Option<NodeId> {
        self.binary_chain(&[TokenKind::Caret], Self::expr_atom)
    }

    fn expr_atom(&mut self) -> Option<NodeId> {
        if let Some(value) = self.value() {
            return Some(value);
        }
        if let Some(function) = self.function_expression() {
            return Some(function);
        }
        if let Some(prefix) = self.prefix_expression() {
            return Some(prefix);
        }
        self.table()
    }

    fn value(&mut self) -> Option<NodeId> {
        let literal = match self.peek_kind()? {
            TokenKind::Nil => Literal::Nil,
            TokenKind::True => Literal::True,
            TokenKind::False => Literal::False,
            TokenKind::IntLit => Literal::Int(self.text(&self.tokens[self.pos])),
            TokenKind::FloatLit => Literal::Float(self.text(&self.tokens[self.pos])),
            TokenKind::StringLit => Literal::Str(self.text(&self.tokens[self.pos])),
            TokenKind::Ellipsis => Literal::Ellipsis,
            _ => return None,
        };
        self.pos += 1;
        Some(self.ast.add(NodeKind::Value { literal }, self.prev_pos()))
    }

    fn function_expression(&mut self) -> Option<NodeId> {
        let pos = self.prev_pos();
        if !self.accept(TokenKind::Function) {
            return None;
        }

        let function = self.ast.add(
            NodeKind::Function(FunctionData {
                is_local: false,
                name: Vec::new(),
                params: Vec::new(),
                body: None,
            }),
            self.prev_pos(),
        );
        self.function_body(function);

        Some(self.ast.add(NodeKind::FunctionExpr { function }, pos))
    }

    fn prefix_expression(&mut self) -> Option<NodeId> {
        let pos = self.prev_pos();
        let variable = self.variable_statement()?;

        let mut calls = Vec::new();
        if let Some(suffix) = self.suffix_without_index(variable) {
            if let NodeKind::Suffix {
                calls: suffix_calls,
                ..
            } = &mut self.ast[suffix].kind
            {
                calls.append(suffix_calls);
            }
        }

        while let Some(call) = self.call() {
            calls.push(call);
        }

        Some(self.ast.add(NodeKind::PrefixExpr { variable, calls }, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lexer::{strip_trivia, Lexer};

    fn parse_src(src: &str) -> (Ast, Vec<ParseError>) {
        let tokens = strip_trivia(Lexer::new().tokenize(src));
        parse(src, &tokens)
    }

    fn root_statements(ast: &Ast) -> Vec<NodeId> {
        let NodeKind::Function(data) = &ast[ast.root].kind else {
            panic!("root is not a function");
        };
        let NodeKind::Block { statements, .. } = &ast[data.body.expect("root body")].kind else {
            panic!("root body is not a block");
        };
        statements.clone()
    }

    #[test]
    fn test_parse_assignment() {
        let (ast, errors) = parse_src("x = 1");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        assert_eq!(stmts.len(), 1);
        assert!(matches!(
            ast[stmts[0]].kind,
            NodeKind::Assignment {
                op: Some(TokenKind::Assign),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_call_statement_rewrite() {
        let (ast, errors) = parse_src("a.b.c(x)(y)");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::FunctionCall { variable, calls } = &ast[stmts[0]].kind else {
            panic!("expected call statement, got {:?}", ast[stmts[0]].kind);
        };
        assert_eq!(calls.len(), 2);
        // The remaining spine still reaches `.b.c`.
        let NodeKind::VariableStatement {
            suffix: Some(suffix),
            ..
        } = ast[*variable].kind
        else {
            panic!("callee lost its suffix");
        };
        assert!(matches!(
            ast[suffix].kind,
            NodeKind::Suffix { index: None, .. }
        ));
    }

    #[test]
    fn test_parse_mixed_suffix_assignment() {
        let (ast, errors) = parse_src("a.b.c(x)(y).d = 1");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        assert!(matches!(ast[stmts[0]].kind, NodeKind::Assignment { .. }));
    }

    #[test]
    fn test_parse_dangling_dot_keeps_index_node() {
        let (ast, errors) = parse_src("t.");
        // The missing `=` is reported, but the suffix survives.
        assert!(!errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::Assignment { op, targets, .. } = &ast[stmts[0]].kind else {
            panic!("expected tolerant assignment");
        };
        assert!(op.is_none());
        let NodeKind::VariableStatement {
            suffix: Some(suffix),
            ..
        } = ast[targets[0]].kind
        else {
            panic!("variable lost its suffix");
        };
        let NodeKind::Suffix {
            index: Some(index), ..
        } = ast[suffix].kind
        else {
            panic!("suffix lost its index");
        };
        assert!(matches!(
            &ast[index].kind,
            NodeKind::NameIndex { name } if name.is_empty()
        ));
    }

    #[test]
    fn test_parse_member_call_without_name() {
        let (ast, _) = parse_src("obj:");
        let stmts = root_statements(&ast);
        let NodeKind::FunctionCall { calls, .. } = &ast[stmts[0]].kind else {
            panic!("expected call statement");
        };
        assert!(matches!(
            &ast[calls[0]].kind,
            NodeKind::MemberCall { name, .. } if name.is_empty()
        ));
    }

    #[test]
    fn test_parse_if_elseif_else() {
        let (ast, errors) = parse_src("if a then x = 1 elseif b then y = 2 else z = 3 end");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::If {
            else_branch: Some(elseif),
            ..
        } = ast[stmts[0]].kind
        else {
            panic!("missing elseif branch");
        };
        let NodeKind::If {
            condition: Some(_),
            else_branch: Some(els),
            ..
        } = ast[elseif].kind
        else {
            panic!("elseif shape wrong");
        };
        assert!(matches!(
            ast[els].kind,
            NodeKind::If {
                condition: None,
                else_branch: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_numeric_and_generic_for() {
        let (ast, errors) = parse_src("for i = 1, 10, 2 do end for k, v in pairs(t) do end");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        assert!(matches!(
            ast[stmts[0]].kind,
            NodeKind::NumericFor { step: Some(_), .. }
        ));
        assert!(
            matches!(&ast[stmts[1]].kind, NodeKind::GenericFor { names, .. } if names.len() == 2)
        );
    }

    #[test]
    fn test_parse_function_name_path() {
        let (ast, errors) = parse_src("function a.b:c() end");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::Function(data) = &ast[stmts[0]].kind else {
            panic!("expected function statement");
        };
        assert_eq!(data.name.len(), 3);
        assert!(matches!(
            &ast[data.name[2]].kind,
            NodeKind::FunctionName {
                is_method: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_table_constructor() {
        let (ast, errors) = parse_src("t = {a = 1, [2] = 3, 4}");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::Assignment { values, .. } = &ast[stmts[0]].kind else {
            panic!("expected assignment");
        };
        let NodeKind::Table { entries } = &ast[values[0]].kind else {
            panic!("expected table value");
        };
        assert_eq!(entries.len(), 3);
        assert!(entries[0].index.is_some());
        assert!(entries[2].index.is_none());
    }

    #[test]
    fn test_parse_precedence() {
        // `1 + 2 * 3` parses as 1 + (2 * 3).
        let (ast, errors) = parse_src("x = 1 + 2 * 3");
        assert!(errors.is_empty());
        let stmts = root_statements(&ast);
        let NodeKind::Assignment { values, .. } = &ast[stmts[0]].kind else {
            panic!("expected assignment");
        };
        let NodeKind::Binary {
            op: TokenKind::Plus,
            rhs: Some(rhs),
            ..
        } = ast[values[0]].kind
        else {
            panic!("expected + at the top");
        };
        assert!(matches!(
            ast[rhs].kind,
            NodeKind::Binary {
                op: TokenKind::Star,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_trailing_input_error() {
        let (_, errors) = parse_src("x = 1 )");
        assert!(errors
            .iter()
            .any(|e| matches!(e, ParseError::TrailingInput { .. })));
    }

    #[test]
    fn test_parse_strict_mode() {
        let tokens = strip_trivia(Lexer::new().tokenize("if x then"));
        assert!(parse_strict("if x then", &tokens).is_err());

        let tokens = strip_trivia(Lexer::new().tokenize("x = 1"));
        assert!(parse_strict("x = 1", &tokens).is_ok());
    }
}
