//! Cross-document lifetime: removing or replacing documents releases their
//! references, dead shapes drop out, and the library drains completely when
//! every document is gone.

use crescent_analysis::{CompletionItemKind, Workspace};

const GAME_OBJECT: &str = "GameObject = {}  GameObject.position = {}  GameObject.position.x = 5  GameObject.position.y = 10  function GameObject:load() self.new_var = 15 end";
const THIRD: &str = "function GameObject.third() self.t_var = 11 end";

fn labels(ws: &Workspace, uri: &str, line: u32, col: u32) -> Vec<String> {
    ws.complete(uri, line, col)
        .into_iter()
        .map(|e| e.label)
        .collect()
}

#[test]
fn test_removed_document_drops_its_members() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("b.lua", THIRD);
    ws.remove_document("b.lua");
    ws.parse_document("c.lua", "GameObject.");

    let entries = ws.complete("c.lua", 0, 11);
    let names: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
    assert!(!names.contains(&"third"));
    assert!(names.contains(&"position"));
    assert!(names.contains(&"load"));
    assert_eq!(
        entries.iter().find(|e| e.label == "load").map(|e| e.kind),
        Some(CompletionItemKind::Method)
    );
}

#[test]
fn test_removing_every_document_drains_the_library() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("b.lua", THIRD);
    ws.parse_document("c.lua", "GameObject.");

    ws.remove_document("a.lua");
    ws.remove_document("b.lua");
    ws.remove_document("c.lua");

    let lib = ws.library();
    assert!(lib.globals.is_empty());
    assert!(
        lib.symbols().all(|(_, s)| s.pinned),
        "only base types and _G may survive"
    );
}

#[test]
fn test_replacing_a_document_releases_the_old_parse() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", GAME_OBJECT);
    ws.parse_document("b.lua", THIRD);
    ws.parse_document("c.lua", "GameObject.");

    // The replacement no longer declares `third`; its entry must go.
    ws.parse_document("b.lua", "function GameObject.fourth() end");

    let names = labels(&ws, "c.lua", 0, 11);
    assert!(!names.contains(&"third".to_string()));
    assert!(names.contains(&"fourth".to_string()));
    assert!(names.contains(&"position".to_string()));
}

#[test]
fn test_remove_unknown_document_is_harmless() {
    let mut ws = Workspace::new();
    ws.parse_document("a.lua", "x = 1");
    ws.remove_document("ghost.lua");
    assert!(ws.has_document("a.lua"));
}

#[test]
fn test_empty_document_parses_and_releases() {
    let mut ws = Workspace::new();
    ws.parse_document("empty.lua", "");
    assert!(ws.complete("empty.lua", 0, 0).iter().any(|e| e.label == "while"));
    ws.remove_document("empty.lua");

    let lib = ws.library();
    assert!(lib.symbols().all(|(_, s)| s.pinned));
}
