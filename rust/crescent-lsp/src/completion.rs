//! Shape-aware code completion

use crescent_analysis::{CompletionItemKind as CoreKind, Workspace};
use lsp_types::{CompletionItem, CompletionItemKind, CompletionList, Position};

pub fn build_completion(workspace: &Workspace, uri: &str, position: Position) -> CompletionList {
    let entries = workspace.complete(uri, position.line, position.character);

    let items = entries
        .into_iter()
        .map(|entry| CompletionItem {
            label: entry.label,
            kind: Some(map_kind(entry.kind)),
            ..Default::default()
        })
        .collect();

    CompletionList {
        is_incomplete: false,
        items,
    }
}

fn map_kind(kind: CoreKind) -> CompletionItemKind {
    match kind {
        CoreKind::Text => CompletionItemKind::TEXT,
        CoreKind::Method => CompletionItemKind::METHOD,
        CoreKind::Function => CompletionItemKind::FUNCTION,
        CoreKind::Constructor => CompletionItemKind::CONSTRUCTOR,
        CoreKind::Field => CompletionItemKind::FIELD,
        CoreKind::Variable => CompletionItemKind::VARIABLE,
        CoreKind::Class => CompletionItemKind::CLASS,
        CoreKind::Interface => CompletionItemKind::INTERFACE,
        CoreKind::Module => CompletionItemKind::MODULE,
        CoreKind::Property => CompletionItemKind::PROPERTY,
        CoreKind::Unit => CompletionItemKind::UNIT,
        CoreKind::Value => CompletionItemKind::VALUE,
        CoreKind::Enum => CompletionItemKind::ENUM,
        CoreKind::Keyword => CompletionItemKind::KEYWORD,
        CoreKind::Snippet => CompletionItemKind::SNIPPET,
        CoreKind::Color => CompletionItemKind::COLOR,
        CoreKind::File => CompletionItemKind::FILE,
        CoreKind::Reference => CompletionItemKind::REFERENCE,
    }
}
