//! Crescent Language Server Protocol implementation
//!
//! Speaks LSP over stdio: parses documents as they open and change,
//! publishes parse diagnostics, and serves shape-aware completion.

mod completion;
mod diagnostics;

use lsp_server::{Connection, Message, Notification, Request, Response};
use lsp_types::notification::Notification as _;
use lsp_types::request::Request as _;
use lsp_types::*;

use crescent_analysis::Workspace;

fn main() {
    let (connection, io_threads) = Connection::stdio();

    let capabilities = ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![".".into(), ":".into()]),
            ..Default::default()
        }),
        ..Default::default()
    };

    let caps_json = serde_json::to_value(capabilities).unwrap();
    let _init_params = connection.initialize(caps_json).unwrap();

    let mut workspace = Workspace::new();

    for msg in &connection.receiver {
        match msg {
            Message::Notification(not) => {
                handle_notification(&not, &connection, &mut workspace);
            }
            Message::Request(req) => {
                if connection.handle_shutdown(&req).unwrap() {
                    break;
                }
                handle_request(&req, &connection, &workspace);
            }
            _ => {}
        }
    }

    io_threads.join().unwrap();
}

fn handle_notification(not: &Notification, connection: &Connection, workspace: &mut Workspace) {
    if not.method == notification::DidOpenTextDocument::METHOD {
        if let Ok(params) = serde_json::from_value::<DidOpenTextDocumentParams>(not.params.clone())
        {
            let uri = params.text_document.uri;
            workspace.parse_document(uri.as_str(), &params.text_document.text);
            publish_diagnostics(connection, workspace, uri);
        }
    } else if not.method == notification::DidChangeTextDocument::METHOD {
        if let Ok(params) =
            serde_json::from_value::<DidChangeTextDocumentParams>(not.params.clone())
        {
            let uri = params.text_document.uri;
            // Full sync: the last change carries the whole document.
            if let Some(change) = params.content_changes.into_iter().last() {
                workspace.parse_document(uri.as_str(), &change.text);
                publish_diagnostics(connection, workspace, uri);
            }
        }
    } else if not.method == notification::DidCloseTextDocument::METHOD {
        if let Ok(params) = serde_json::from_value::<DidCloseTextDocumentParams>(not.params.clone())
        {
            workspace.remove_document(params.text_document.uri.as_str());
        }
    }
}

fn handle_request(req: &Request, connection: &Connection, workspace: &Workspace) {
    if req.method == request::Completion::METHOD {
        if let Ok(params) = serde_json::from_value::<CompletionParams>(req.params.clone()) {
            let uri = &params.text_document_position.text_document.uri;
            let position = params.text_document_position.position;

            let result =
                completion::build_completion(workspace, uri.as_str(), position);

            let response = Response {
                id: req.id.clone(),
                result: serde_json::to_value(result).ok(),
                error: None,
            };
            let _ = connection.sender.send(Message::Response(response));
        }
    }
}

fn publish_diagnostics(connection: &Connection, workspace: &Workspace, uri: Uri) {
    let diagnostics = diagnostics::build_diagnostics(workspace, uri.as_str());
    let params = PublishDiagnosticsParams {
        uri,
        diagnostics,
        version: None,
    };
    let not = Notification::new(notification::PublishDiagnostics::METHOD.to_string(), params);
    let _ = connection.sender.send(Message::Notification(not));
}
