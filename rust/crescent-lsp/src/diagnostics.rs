//! Parse errors rendered as LSP diagnostics

use crescent_analysis::Workspace;
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

pub fn build_diagnostics(workspace: &Workspace, uri: &str) -> Vec<Diagnostic> {
    workspace
        .diagnostics(uri)
        .into_iter()
        .map(|(pos, message)| {
            let position = Position {
                line: pos.line,
                character: pos.col,
            };
            Diagnostic {
                range: Range {
                    start: position,
                    end: position,
                },
                severity: Some(DiagnosticSeverity::ERROR),
                message,
                ..Default::default()
            }
        })
        .collect()
}
