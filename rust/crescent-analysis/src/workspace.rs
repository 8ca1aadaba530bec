//! Document store over the shared library: the two entry points an editor
//! front-end drives.
//!
//! `parse_document` lexes, parses, and infers one document, holding a
//! [`LibraryReference`] ticket for everything the parse observed.
//! Re-parsing or removing a document releases its prior ticket first, so
//! shapes contributed by stale text drop out of the shared library.

use crate::analysis::ast::Ast;
use crate::analysis::complete::{resolve_autocomplete, CompletionEntry};
use crate::analysis::infer::resolve_types;
use crate::analysis::lexer::{strip_trivia, Lexer};
use crate::analysis::library::{Library, LibraryReference};
use crate::analysis::parser::{parse, ParseError};
use crate::analysis::tokens::{Pos, Token};
use std::collections::HashMap;

struct Document {
    tokens: Vec<Token>,
    ast: Ast,
    errors: Vec<ParseError>,
    ticket: LibraryReference,
}

pub struct Workspace {
    lexer: Lexer,
    library: Library,
    documents: HashMap<String, Document>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            lexer: Lexer::new(),
            library: Library::new(),
            documents: HashMap::new(),
        }
    }

    /// Parse or re-parse a document. A prior parse of the same uri is
    /// released before the new one starts.
    pub fn parse_document(&mut self, uri: &str, text: &str) {
        if let Some(previous) = self.documents.remove(uri) {
            self.library.release(previous.ticket);
        }

        let tokens = strip_trivia(self.lexer.tokenize(text));
        let (mut ast, errors) = parse(text, &tokens);

        let mut ticket = LibraryReference::default();
        resolve_types(&mut ast, &mut self.library, &mut ticket);

        self.documents.insert(
            uri.to_string(),
            Document {
                tokens,
                ast,
                errors,
                ticket,
            },
        );
    }

    /// Drop a document and the references its parse held.
    pub fn remove_document(&mut self, uri: &str) {
        if let Some(document) = self.documents.remove(uri) {
            self.library.release(document.ticket);
        }
    }

    /// Ordered completions at a zero-indexed position. Unknown uris yield
    /// an empty list.
    pub fn complete(&self, uri: &str, line: u32, col: u32) -> Vec<CompletionEntry> {
        let Some(document) = self.documents.get(uri) else {
            return Vec::new();
        };
        resolve_autocomplete(
            &document.ast,
            &self.library,
            &document.tokens,
            Pos::new(line, col),
        )
    }

    /// Parse errors for a document as `(position, message)` pairs.
    pub fn diagnostics(&self, uri: &str) -> Vec<(Pos, String)> {
        self.documents
            .get(uri)
            .map(|d| d.errors.iter().map(|e| (e.pos(), e.to_string())).collect())
            .unwrap_or_default()
    }

    pub fn has_document(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
