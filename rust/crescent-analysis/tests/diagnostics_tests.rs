//! Parse diagnostics surfaced per document.

use crescent_analysis::Workspace;

#[test]
fn test_clean_document_has_no_diagnostics() {
    let mut ws = Workspace::new();
    ws.parse_document("ok.lua", "local x = 1\nreturn x");
    assert!(ws.diagnostics("ok.lua").is_empty());
}

#[test]
fn test_missing_end_is_reported_with_position() {
    let mut ws = Workspace::new();
    ws.parse_document("bad.lua", "if x then\ny = ");

    let diags = ws.diagnostics("bad.lua");
    assert!(!diags.is_empty());
    let (pos, message) = &diags[0];
    assert_eq!(pos.line, 1);
    assert!(message.contains("end of input"));
}

#[test]
fn test_trailing_input_is_reported() {
    let mut ws = Workspace::new();
    ws.parse_document("t.lua", "x = 1 )");

    let diags = ws.diagnostics("t.lua");
    assert!(diags
        .iter()
        .any(|(_, message)| message.contains("syntax error near ')'")));
}

#[test]
fn test_broken_document_still_completes() {
    // Collecting mode keeps the tree usable even with errors present.
    let mut ws = Workspace::new();
    ws.parse_document("b.lua", "hero = {}\nhero.mana = 50\nhero.\nwhile do");

    assert!(!ws.diagnostics("b.lua").is_empty());
    let entries = ws.complete("b.lua", 2, 5);
    assert!(entries.iter().any(|e| e.label == "mana"));
}

#[test]
fn test_unknown_uri_has_no_diagnostics() {
    let ws = Workspace::new();
    assert!(ws.diagnostics("missing.lua").is_empty());
}
