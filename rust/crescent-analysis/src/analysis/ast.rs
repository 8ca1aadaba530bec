//! AST for the parsed document.
//!
//! Nodes live in a flat arena and refer to each other by `NodeId`; the
//! parent links are filled in by [`assign_parents`] after parsing. Each node
//! carries slots for the semantic results inference writes back (resolved
//! type, referenced variable, folded value).

use crate::analysis::library::{SymbolId, ValueData};
use crate::analysis::tokens::{Pos, TokenKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A literal value as written, parsed into constants during inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Nil,
    True,
    False,
    /// Raw integer text, base 10 or `0x`-prefixed hex.
    Int(String),
    /// Raw float text, exponent included.
    Float(String),
    /// Raw string text, delimiters still attached.
    Str(String),
    /// `...`
    Ellipsis,
}

/// One table-constructor entry. Both halves are optional: `{x}` has no
/// index, `{a}` parses as an index with no value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub index: Option<NodeId>,
    pub value: Option<NodeId>,
}

/// A function parameter name (`...` appears as a literal "..." name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    pub is_local: bool,
    /// Dotted/colon name path of `FunctionName` nodes; empty when anonymous.
    pub name: Vec<NodeId>,
    pub params: Vec<Param>,
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Block {
        statements: Vec<NodeId>,
        /// Synthetic marker anchoring completions at the block's close;
        /// absent on the root chunk.
        end: Option<NodeId>,
        /// Locals declared in this block, attached by inference.
        locals: Vec<SymbolId>,
    },
    EndMarker,
    Assignment {
        /// One of `= += -= *= /=`; `None` when the operator never arrived.
        op: Option<TokenKind>,
        targets: Vec<NodeId>,
        values: Vec<NodeId>,
    },
    VariableStatement {
        head: NodeId,
        suffix: Option<NodeId>,
    },
    NameVariable {
        name: String,
    },
    ParenVariable {
        expr: Option<NodeId>,
        suffix: Option<NodeId>,
    },
    Suffix {
        /// Left-leaning spine toward the variable head.
        left: Option<NodeId>,
        calls: Vec<NodeId>,
        /// Absent when the suffix ends on calls.
        index: Option<NodeId>,
    },
    Call {
        args: Option<NodeId>,
    },
    MemberCall {
        /// Empty when the user has typed only the `:`.
        name: String,
        args: Option<NodeId>,
    },
    ExprArgs {
        list: Vec<NodeId>,
    },
    TableArg {
        table: NodeId,
    },
    StringArg {
        value: String,
    },
    NameIndex {
        /// Empty when the user has typed only the `.`.
        name: String,
    },
    ExprIndex {
        expr: Option<NodeId>,
    },
    Break,
    Return {
        values: Vec<NodeId>,
    },
    Value {
        literal: Literal,
    },
    Table {
        entries: Vec<TableEntry>,
    },
    FunctionExpr {
        function: NodeId,
    },
    FunctionCall {
        variable: NodeId,
        calls: Vec<NodeId>,
    },
    PrefixExpr {
        variable: NodeId,
        calls: Vec<NodeId>,
    },
    Unary {
        op: TokenKind,
        rhs: Option<NodeId>,
    },
    Binary {
        op: TokenKind,
        lhs: NodeId,
        rhs: Option<NodeId>,
    },
    Function(FunctionData),
    FunctionName {
        name: String,
        is_method: bool,
    },
    While {
        condition: Option<NodeId>,
        body: Option<NodeId>,
    },
    Repeat {
        body: Option<NodeId>,
        condition: Option<NodeId>,
    },
    If {
        condition: Option<NodeId>,
        body: Option<NodeId>,
        else_branch: Option<NodeId>,
    },
    NumericFor {
        name: Option<Param>,
        start: Option<NodeId>,
        limit: Option<NodeId>,
        step: Option<NodeId>,
        body: Option<NodeId>,
    },
    GenericFor {
        names: Vec<Param>,
        exprs: Vec<NodeId>,
        body: Option<NodeId>,
    },
    LocalVariable {
        names: Vec<Param>,
        exprs: Vec<NodeId>,
    },
}

/// Semantic results written by inference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sem {
    /// Resolved type of the node's value.
    pub resolved: Option<SymbolId>,
    /// Variable the node refers to, when there is one.
    pub variable: Option<SymbolId>,
    /// Folded constant.
    pub value: ValueData,
    /// On `Function` nodes: the growing return type.
    pub ret: Option<SymbolId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub pos: Pos,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub sem: Sem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    pub root: NodeId,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn add(&mut self, kind: NodeKind, pos: Pos) -> NodeId {
        self.nodes.push(Node {
            pos,
            parent: None,
            kind,
            sem: Sem::default(),
        });
        NodeId((self.nodes.len() - 1) as u32)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl std::ops::IndexMut<NodeId> for Ast {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

/// Children in traversal order. The order matters: completion keeps the
/// last-visited node at or before the cursor.
pub fn children(kind: &NodeKind) -> Vec<NodeId> {
    let mut out = Vec::new();
    match kind {
        NodeKind::Block { statements, end, .. } => {
            out.extend(statements);
            out.extend(end.iter());
        }
        NodeKind::EndMarker
        | NodeKind::Break
        | NodeKind::NameVariable { .. }
        | NodeKind::NameIndex { .. }
        | NodeKind::StringArg { .. }
        | NodeKind::Value { .. }
        | NodeKind::FunctionName { .. } => {}
        NodeKind::Assignment {
            targets, values, ..
        } => {
            out.extend(targets);
            out.extend(values);
        }
        NodeKind::VariableStatement { head, suffix } => {
            out.push(*head);
            out.extend(suffix.iter());
        }
        NodeKind::ParenVariable { expr, suffix } => {
            out.extend(expr.iter());
            out.extend(suffix.iter());
        }
        NodeKind::Suffix { left, calls, index } => {
            out.extend(left.iter());
            out.extend(calls);
            out.extend(index.iter());
        }
        NodeKind::Call { args } | NodeKind::MemberCall { args, .. } => {
            out.extend(args.iter());
        }
        NodeKind::ExprArgs { list } => out.extend(list),
        NodeKind::TableArg { table } => out.push(*table),
        NodeKind::ExprIndex { expr } => out.extend(expr.iter()),
        NodeKind::Return { values } => out.extend(values),
        NodeKind::Table { entries } => {
            for e in entries {
                out.extend(e.index.iter());
                out.extend(e.value.iter());
            }
        }
        NodeKind::FunctionExpr { function } => out.push(*function),
        NodeKind::FunctionCall { variable, calls } | NodeKind::PrefixExpr { variable, calls } => {
            out.push(*variable);
            out.extend(calls);
        }
        NodeKind::Unary { rhs, .. } => out.extend(rhs.iter()),
        NodeKind::Binary { lhs, rhs, .. } => {
            out.push(*lhs);
            out.extend(rhs.iter());
        }
        NodeKind::Function(data) => {
            out.extend(&data.name);
            out.extend(data.body.iter());
        }
        NodeKind::While { condition, body } => {
            out.extend(condition.iter());
            out.extend(body.iter());
        }
        NodeKind::Repeat { body, condition } => {
            out.extend(body.iter());
            out.extend(condition.iter());
        }
        NodeKind::If {
            condition,
            body,
            else_branch,
        } => {
            out.extend(condition.iter());
            out.extend(body.iter());
            out.extend(else_branch.iter());
        }
        NodeKind::NumericFor {
            start,
            limit,
            step,
            body,
            ..
        } => {
            out.extend(start.iter());
            out.extend(limit.iter());
            out.extend(step.iter());
            out.extend(body.iter());
        }
        NodeKind::GenericFor { exprs, body, .. } => {
            out.extend(exprs);
            out.extend(body.iter());
        }
        NodeKind::LocalVariable { exprs, .. } => out.extend(exprs),
    }
    out
}

/// Populate parent links top-down. Block end markers are short-circuited to
/// the block's own parent, so a cursor between statements lands in the
/// enclosing scope rather than on the block itself.
pub fn assign_parents(ast: &mut Ast) {
    fn walk(ast: &mut Ast, id: NodeId, parent: Option<NodeId>) {
        ast[id].parent = parent;
        let kids = children(&ast[id].kind);
        let end = match &ast[id].kind {
            NodeKind::Block { end, .. } => *end,
            _ => None,
        };
        for child in kids {
            if Some(child) == end {
                walk(ast, child, parent);
            } else {
                walk(ast, child, Some(id));
            }
        }
    }

    let root = ast.root;
    walk(ast, root, None);
}
