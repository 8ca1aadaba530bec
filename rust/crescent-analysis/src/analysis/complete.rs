//! Cursor-driven completion.
//!
//! Locate the AST node at the cursor, then dispatch on what the user is in
//! the middle of typing: a member after `.`, a method after `:`, a function
//! name path, or plain scope lookup (locals, globals, `_G` members,
//! keywords).

use crate::analysis::ast::{children, Ast, NodeId, NodeKind};
use crate::analysis::library::{Library, Symbol, SymbolId, ValueData, VarKind};
use crate::analysis::tokens::{Pos, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// LSP-compatible completion kinds; the discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionItemKind {
    Text = 1,
    Method = 2,
    Function = 3,
    Constructor = 4,
    Field = 5,
    Variable = 6,
    Class = 7,
    Interface = 8,
    Module = 9,
    Property = 10,
    Unit = 11,
    Value = 12,
    Enum = 13,
    Keyword = 14,
    Snippet = 15,
    Color = 16,
    File = 17,
    Reference = 18,
}

impl CompletionItemKind {
    pub fn lsp_code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CompletionItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub label: String,
    pub kind: CompletionItemKind,
}

/// Ordered completions for a cursor position. Total: the worst outcome is
/// an empty list.
pub fn resolve_autocomplete(
    ast: &Ast,
    lib: &Library,
    tokens: &[Token],
    pos: Pos,
) -> Vec<CompletionEntry> {
    if ast.is_empty() {
        return Vec::new();
    }

    // The token the cursor sits on or just after; a `:` there restricts
    // the result to methods.
    let cursor_token = tokens
        .iter()
        .take_while(|t| t.pos <= pos)
        .last()
        .map(|t| t.kind);

    let found = locate(ast, pos);

    let mut completer = Completer {
        ast,
        lib,
        entries: Vec::new(),
        methods_only: cursor_token == Some(TokenKind::Colon),
    };
    completer.run(found);
    completer.entries
}

/// The last-visited node at or before the cursor, ties going to the later
/// visit.
fn locate(ast: &Ast, pos: Pos) -> NodeId {
    fn walk(ast: &Ast, id: NodeId, pos: Pos, found: &mut NodeId) {
        let here = ast[id].pos;
        if here == pos || (here < pos && ast[*found].pos <= here) {
            *found = id;
        }
        for child in children(&ast[id].kind) {
            walk(ast, child, pos, found);
        }
    }

    let mut found = ast.root;
    walk(ast, ast.root, pos, &mut found);
    found
}

struct Completer<'a> {
    ast: &'a Ast,
    lib: &'a Library,
    entries: Vec<CompletionEntry>,
    /// Cursor sits on a `:`; only methods apply.
    methods_only: bool,
}

impl<'a> Completer<'a> {
    fn run(&mut self, id: NodeId) {
        match &self.ast[id].kind {
            NodeKind::FunctionName { .. } => self.function_name_completion(id),
            NodeKind::MemberCall { .. } => self.member_call_completion(id),
            NodeKind::NameIndex { .. } => self.index_completion(id),
            NodeKind::Suffix { .. } => {
                for child in children(&self.ast[id].kind) {
                    self.run(child);
                }
            }
            _ => self.scope_completion(id),
        }
    }

    fn add_entry(&mut self, label: String, kind: CompletionItemKind) {
        if label.is_empty() {
            return;
        }
        if self.entries.iter().any(|e| e.label == label) {
            return;
        }
        if self.methods_only && kind != CompletionItemKind::Method {
            return;
        }
        self.entries.push(CompletionEntry { label, kind });
    }

    fn entry_kind(&self, id: Option<SymbolId>) -> CompletionItemKind {
        let Some(sym) = id.and_then(|i| self.lib.get(i)) else {
            return CompletionItemKind::Text;
        };

        if let Some(root) = self.lib.resolved_type_of(id) {
            let name = self.lib.name_of(root);
            if name == "Table" || name == "Predictive" {
                return CompletionItemKind::Module;
            }
        }

        let Some(vd) = sym.var_data() else {
            return CompletionItemKind::Text;
        };
        let mut kind = vd.value_kind;
        if kind == VarKind::Default {
            kind = vd.var_kind;
        }

        match kind {
            VarKind::Method => CompletionItemKind::Method,
            VarKind::Field | VarKind::TableValue => CompletionItemKind::Field,
            VarKind::Function => CompletionItemKind::Function,
            VarKind::Default => CompletionItemKind::Text,
        }
    }

    /// Every member of `symbol`'s resolved type: table entries surface
    /// under their string index, plain variables under their name.
    fn add_members(&mut self, symbol: SymbolId) {
        let Some(resolved) = self.lib.resolved_type(symbol) else {
            return;
        };
        let Some(type_sym) = self.lib.get(resolved) else {
            return;
        };

        for &member in &type_sym.members.clone() {
            let Some(sym) = self.lib.get(member) else {
                continue;
            };
            if sym.is_table_entry() {
                let label = sym
                    .var_data()
                    .and_then(|vd| vd.index.as_ref())
                    .and_then(ValueData::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.add_entry(label, self.entry_kind(Some(member)));
            } else {
                self.add_entry(sym.name.clone(), self.entry_kind(Some(member)));
            }
        }
    }

    fn add_members_opt(&mut self, symbol: Option<SymbolId>) {
        if let Some(symbol) = symbol {
            self.add_members(symbol);
        }
    }

    /// Cursor in a `function a.b.c` name path: resolve the path up to the
    /// cursor segment and offer the members found there.
    fn function_name_completion(&mut self, id: NodeId) {
        let Some(parent) = self.ast[id].parent else {
            return;
        };
        let NodeKind::Function(data) = &self.ast[parent].kind else {
            return;
        };

        let mut cursor_segment = 0;
        for (i, &segment) in data.name.iter().enumerate() {
            cursor_segment = i;
            if segment == id {
                break;
            }
        }

        let mut owner: Option<SymbolId> = None;
        for (i, &segment) in data.name.iter().enumerate() {
            if i > cursor_segment {
                break;
            }
            let NodeKind::FunctionName { name, .. } = &self.ast[segment].kind else {
                continue;
            };
            if i >= data.name.len() - 1 {
                break;
            }

            if i == 0 {
                owner = self.lookup_variable(id, name);
            } else if let Some(previous) = owner.take() {
                for member in self.lib.resolved_members(previous) {
                    let matched = self
                        .lib
                        .get(member)
                        .and_then(Symbol::var_data)
                        .is_some_and(|vd| {
                            vd.var_kind == VarKind::TableValue
                                && vd.index.as_ref().is_some_and(|ix| ix.matches_str(name))
                        });
                    if matched {
                        owner = Some(member);
                    }
                }
            }
        }

        self.add_members_opt(owner);
    }

    /// Cursor after `:` — members of the callee, filtered to methods by the
    /// cursor-token check.
    fn member_call_completion(&mut self, id: NodeId) {
        let Some(parent) = self.ast[id].parent else {
            return;
        };
        let NodeKind::FunctionCall { variable, .. } = self.ast[parent].kind else {
            return;
        };

        if let Some(var) = self.ast[variable].sem.variable {
            self.add_members(var);
        } else if let Some(resolved) = self.ast[variable].sem.resolved {
            self.add_members(resolved);
        } else {
            self.scope_completion(id);
        }
    }

    /// Cursor after `.` — members of whatever the left of the suffix
    /// resolved to, falling back to a call's return type, then to the
    /// statement's head variable.
    fn index_completion(&mut self, id: NodeId) {
        let Some(parent) = self.ast[id].parent else {
            return;
        };
        let NodeKind::Suffix { left, .. } = self.ast[parent].kind else {
            return;
        };

        if let Some(left) = left {
            let left_index = match self.ast[left].kind {
                NodeKind::Suffix {
                    index: Some(index), ..
                } => Some(index),
                _ => None,
            };
            if let Some(left_index) = left_index {
                if let Some(var) = self.ast[left_index].sem.variable {
                    self.add_members(var);
                } else if let Some(var) = self.ast[parent].sem.variable {
                    self.add_members(var);
                } else {
                    self.add_members_opt(self.ast[parent].sem.resolved);
                }
                return;
            }
        }

        // `foo().bar` — no variable to the left, but the call resolved to a
        // callable whose return type carries the members.
        if let Some(resolved) = self.ast[parent].sem.resolved {
            let return_type = self
                .lib
                .resolved_type(resolved)
                .and_then(|root| self.lib.get(root))
                .and_then(Symbol::type_data)
                .and_then(|td| td.return_type);
            if let Some(return_type) = return_type {
                self.add_members(return_type);
                return;
            }
        }

        if let Some(grandparent) = self.ast[parent].parent {
            if let NodeKind::VariableStatement { head, .. } = self.ast[grandparent].kind {
                self.add_members_opt(self.ast[head].sem.variable);
            }
        }
    }

    /// Plain position: locals walking out through the blocks, then globals,
    /// `_G`'s members, and the keywords.
    fn scope_completion(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            if let NodeKind::Block { locals, .. } = &self.ast[node].kind {
                for &local in locals {
                    let name = self
                        .lib
                        .get(local)
                        .map(|s| s.name.clone())
                        .unwrap_or_default();
                    self.add_entry(name, self.entry_kind(Some(local)));
                }
            }
            current = self.ast[node].parent;
        }

        for &global in &self.lib.globals {
            let name = self
                .lib
                .get(global)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            self.add_entry(name, self.entry_kind(Some(global)));
        }

        self.add_members(self.lib.global_table);

        for keyword in TokenKind::KEYWORDS {
            self.add_entry(keyword.to_string(), CompletionItemKind::Keyword);
        }
    }

    /// Locals visible from `from`, then globals by name. Used by the
    /// function-name path walk.
    fn lookup_variable(&self, from: NodeId, name: &str) -> Option<SymbolId> {
        let mut blocks = Vec::new();
        let mut current = Some(from);
        while let Some(node) = current {
            if matches!(self.ast[node].kind, NodeKind::Block { .. }) {
                blocks.push(node);
            }
            current = self.ast[node].parent;
        }

        for &block in blocks.iter().rev() {
            if let NodeKind::Block { locals, .. } = &self.ast[block].kind {
                for &local in locals {
                    if let Some(sym) = self.lib.get(local) {
                        if sym.is_variable() && sym.name == name {
                            return Some(local);
                        }
                    }
                }
            }
        }

        let global_type = self.lib.resolved_type(self.lib.global_table)?;
        for &member in &self.lib.get(global_type)?.members {
            if let Some(sym) = self.lib.get(member) {
                if sym.is_variable() && sym.name == name {
                    return Some(member);
                }
            }
        }

        None
    }
}
