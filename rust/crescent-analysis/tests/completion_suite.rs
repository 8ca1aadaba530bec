//! Completion behavior across documents: member shapes, kinds, and the
//! boundary cases around half-typed input.

use crescent_analysis::{CompletionEntry, CompletionItemKind, Workspace};

const GAME_OBJECT: &str = "GameObject = {}  GameObject.position = {}  GameObject.position.x = 5  GameObject.position.y = 10  function GameObject:load() self.new_var = 15 end";

fn kind_of(entries: &[CompletionEntry], label: &str) -> Option<CompletionItemKind> {
    entries.iter().find(|e| e.label == label).map(|e| e.kind)
}

fn labels(entries: &[CompletionEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.label.as_str()).collect()
}

#[test]
fn test_cross_document_member_completion() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("b.lua", "function GameObject.third() self.t_var = 11 end");
    ws.parse_document("c.lua", "GameObject.");

    let entries = ws.complete("c.lua", 0, 11);
    assert_eq!(
        kind_of(&entries, "position"),
        Some(CompletionItemKind::Module)
    );
    assert_eq!(kind_of(&entries, "load"), Some(CompletionItemKind::Method));
    assert_eq!(
        kind_of(&entries, "third"),
        Some(CompletionItemKind::Function)
    );
}

#[test]
fn test_nested_member_completion() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("c.lua", "GameObject.position.");

    let entries = ws.complete("c.lua", 0, 20);
    assert_eq!(kind_of(&entries, "x"), Some(CompletionItemKind::Field));
    assert_eq!(kind_of(&entries, "y"), Some(CompletionItemKind::Field));
    assert!(kind_of(&entries, "load").is_none());
}

#[test]
fn test_local_table_members_without_keywords() {
    let src = "local t = {a=1, b=\"x\"}; t.";
    let mut ws = Workspace::new();
    ws.parse_document("t.lua", src);

    let entries = ws.complete("t.lua", 0, src.len() as u32);
    assert_eq!(kind_of(&entries, "a"), Some(CompletionItemKind::Field));
    assert_eq!(kind_of(&entries, "b"), Some(CompletionItemKind::Field));
    assert!(entries
        .iter()
        .all(|e| e.kind != CompletionItemKind::Keyword));
}

#[test]
fn test_colon_restricts_to_methods() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("b.lua", "function GameObject.third() end");
    ws.parse_document("d.lua", "GameObject:");

    let entries = ws.complete("d.lua", 0, 11);
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .all(|e| e.kind == CompletionItemKind::Method));
    assert!(labels(&entries).contains(&"load"));
    assert!(!labels(&entries).contains(&"position"));
    assert!(!labels(&entries).contains(&"third"));
}

#[test]
fn test_scope_completion_includes_locals_globals_keywords() {
    let src = "score = 0\nlocal lives = 3\n\n";
    let mut ws = Workspace::new();
    ws.parse_document("game.lua", src);

    let entries = ws.complete("game.lua", 2, 0);
    assert!(labels(&entries).contains(&"score"));
    assert!(labels(&entries).contains(&"lives"));
    assert_eq!(
        kind_of(&entries, "while"),
        Some(CompletionItemKind::Keyword)
    );
}

#[test]
fn test_vararg_locals_get_predictive_shapes() {
    let src = "function f(...)\nlocal x, y = ...\n\nend";
    let mut ws = Workspace::new();
    ws.parse_document("f.lua", src);

    let entries = ws.complete("f.lua", 2, 0);
    // Fresh predictive shapes, not the variadic marker.
    assert_eq!(kind_of(&entries, "x"), Some(CompletionItemKind::Module));
    assert_eq!(kind_of(&entries, "y"), Some(CompletionItemKind::Module));
}

#[test]
fn test_empty_member_name_materializes_nothing() {
    let src = "v = {} v.";
    let mut ws = Workspace::new();
    ws.parse_document("v.lua", src);

    let entries = ws.complete("v.lua", 0, src.len() as u32);
    assert!(entries.is_empty());
}

#[test]
fn test_completion_on_unknown_uri_is_empty() {
    let ws = Workspace::new();
    assert!(ws.complete("missing.lua", 0, 0).is_empty());
}

#[test]
fn test_function_name_path_completion() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    // The cursor sits on the second segment of a dotted function name.
    ws.parse_document("e.lua", "function GameObject.update() end");

    let entries = ws.complete("e.lua", 0, 20);
    assert!(labels(&entries).contains(&"position"));
    assert!(labels(&entries).contains(&"load"));
}

#[test]
fn test_read_before_write_predicts_members() {
    // Reading an unknown chain in assignable context grows predictive
    // tables on both levels.
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", "config.window.width = 800");
    ws.parse_document("b.lua", "config.");

    let entries = ws.complete("b.lua", 0, 7);
    assert!(labels(&entries).contains(&"window"));
}

#[test]
fn test_call_return_member_completion() {
    let src = "function maker() return {speed = 7} end\nlocal m = maker()\nm.";
    let mut ws = Workspace::new();
    ws.parse_document("m.lua", src);

    let entries = ws.complete("m.lua", 2, 2);
    assert_eq!(kind_of(&entries, "speed"), Some(CompletionItemKind::Field));
}

#[test]
fn test_parse_is_idempotent_for_completions() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("c.lua", "GameObject.");

    let before = ws.complete("c.lua", 0, 11);
    ws.parse_document("c.lua", "GameObject.");
    let after = ws.complete("c.lua", 0, 11);
    assert_eq!(before, after);
}

#[test]
fn test_reparse_keeps_other_documents_stable() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("c.lua", "GameObject.");

    let mut before = labels(&ws.complete("c.lua", 0, 11))
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    before.sort();

    ws.parse_document("a.lua", GAME_OBJECT);

    let mut after = labels(&ws.complete("c.lua", 0, 11))
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    after.sort();

    assert_eq!(before, after);
}
