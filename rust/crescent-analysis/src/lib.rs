//! Crescent Analysis
//!
//! Language intelligence for Lua: a DFA lexer, an error-tolerant recursive
//! descent parser, and a cross-document shape-inference engine feeding
//! editor completion.

pub mod analysis;
pub mod workspace;

pub use analysis::complete::{CompletionEntry, CompletionItemKind};
pub use analysis::parser::ParseError;
pub use analysis::tokens::Pos;
pub use workspace::Workspace;
