//! Inference engine behavior observed through the library: folding,
//! operator typing, tuple spreading, and the structural invariants of the
//! shape graph.

use crescent_analysis::analysis::library::{Library, LibraryReference, Symbol, SymbolId, ValueData, VarKind};
use crescent_analysis::analysis::{ast, infer, lexer, parser};
use crescent_analysis::Workspace;

fn find_symbol(lib: &Library, name: &str) -> Option<SymbolId> {
    lib.symbols()
        .find(|(_, s)| s.is_variable() && s.name == name)
        .map(|(id, _)| id)
}

fn resolved_name(lib: &Library, id: SymbolId) -> String {
    lib.resolved_type(id)
        .map(|t| lib.name_of(t).to_string())
        .unwrap_or_default()
}

#[test]
fn test_constant_folding_arithmetic() {
    let mut ws = Workspace::new();
    ws.parse_document("m.lua", "x = 2 + 3 * 4\ny = 2 ^ 3\nz = 7 % 4");

    let lib = ws.library();
    for (name, expected) in [("x", 14.0), ("y", 8.0), ("z", 3.0)] {
        let id = find_symbol(lib, name).expect(name);
        let value = lib.get(id).and_then(Symbol::var_data).map(|vd| &vd.value);
        assert!(
            matches!(value, Some(ValueData::Number(n)) if *n == expected),
            "{name} folded to {value:?}, wanted {expected}"
        );
        assert_eq!(resolved_name(lib, id), "Number");
    }
}

#[test]
fn test_operator_result_types() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "ops.lua",
        "s = \"a\" .. 1\nb = 1 < 2\ne = 1 == \"x\"\nl = true and false",
    );

    let lib = ws.library();
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "s").expect("s")),
        "String"
    );
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "b").expect("b")),
        "Boolean"
    );
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "e").expect("e")),
        "Boolean"
    );
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "l").expect("l")),
        "Boolean"
    );
}

#[test]
fn test_literal_parsing() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "lit.lua",
        "h = 0xff\nf = 2.5e-1\ns = 'quoted'\nn = nil\nt = true",
    );

    let lib = ws.library();
    let value_of = |name: &str| {
        let id = find_symbol(lib, name).expect(name);
        lib.get(id)
            .and_then(Symbol::var_data)
            .map(|vd| vd.value.clone())
            .expect(name)
    };

    assert!(matches!(value_of("h"), ValueData::Number(n) if n == 255.0));
    assert!(matches!(value_of("f"), ValueData::Number(n) if n == 0.25));
    assert!(matches!(value_of("s"), ValueData::String(s) if s == "quoted"));
    assert!(matches!(value_of("n"), ValueData::Nil));
    assert!(matches!(value_of("t"), ValueData::Boolean(true)));
}

#[test]
fn test_multi_value_return_spreads_over_locals() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "mv.lua",
        "function pair() return 1, \"two\" end\nlocal a, b = pair()",
    );

    let lib = ws.library();
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "a").expect("a")),
        "Number"
    );
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "b").expect("b")),
        "String"
    );
}

#[test]
fn test_missing_values_fill_with_nil() {
    let mut ws = Workspace::new();
    ws.parse_document("nil.lua", "a, b = 1");

    let lib = ws.library();
    assert_eq!(
        resolved_name(lib, find_symbol(lib, "a").expect("a")),
        "Number"
    );
    assert_eq!(resolved_name(lib, find_symbol(lib, "b").expect("b")), "Nil");
}

#[test]
fn test_return_union_grows_possible_types() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "u.lua",
        "function pick(c) if c then return 1 end return \"s\" end",
    );

    let lib = ws.library();
    let pick = find_symbol(lib, "pick").expect("pick");
    let function_type = lib.resolved_type(pick).expect("function type");
    let return_type = lib
        .get(function_type)
        .and_then(Symbol::type_data)
        .and_then(|td| td.return_type)
        .expect("return type");
    let name = lib.name_of(return_type);
    assert!(
        name.starts_with("PossibleType("),
        "two return statements should unite: {name}"
    );
}

#[test]
fn test_assignment_order_converges() {
    // Write-then-create and create-then-write end at the same shape: the
    // predictive member survives the in-place upgrade.
    let mut forward = Workspace::new();
    forward.parse_document("a.lua", "obj = {}\nobj.hp.max = 100");
    let mut backward = Workspace::new();
    backward.parse_document("a.lua", "obj.hp.max = 100\nobj = {}");

    for ws in [&forward, &backward] {
        let lib = ws.library();
        let obj = find_symbol(lib, "obj").expect("obj");
        let shape = lib.resolved_type(obj).expect("shape");
        let members = lib.get(shape).expect("type").members.clone();
        let has_hp = members.iter().any(|&m| {
            lib.get(m)
                .and_then(Symbol::var_data)
                .and_then(|vd| vd.index.as_ref())
                .is_some_and(|ix| ix.matches_str("hp"))
        });
        assert!(has_hp, "hp member missing after convergence");
    }
}

#[test]
fn test_table_constructor_indexes() {
    let mut ws = Workspace::new();
    ws.parse_document("t.lua", "t = {10, name = \"n\", [99] = true, 20}");

    let lib = ws.library();
    let t = find_symbol(lib, "t").expect("t");
    let shape = lib.resolved_type(t).expect("shape");
    let indexes: Vec<ValueData> = lib
        .get(shape)
        .expect("type")
        .members
        .iter()
        .filter_map(|&m| lib.get(m))
        .filter_map(|s| s.var_data())
        .filter_map(|vd| vd.index.clone())
        .collect();

    // Positional entries count 1, 2; the explicit ones keep their own keys
    // without advancing the counter.
    assert!(indexes.iter().any(|ix| ix.matches(&ValueData::Number(1.0))));
    assert!(indexes.iter().any(|ix| ix.matches(&ValueData::Number(2.0))));
    assert!(indexes.iter().any(|ix| ix.matches_str("name")));
    assert!(indexes
        .iter()
        .any(|ix| ix.matches(&ValueData::Number(99.0))));
}

#[test]
fn test_method_declaration_adds_self() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "m.lua",
        "Actor = {}\nfunction Actor:move() self.speed = 3 end",
    );

    let lib = ws.library();
    let actor = find_symbol(lib, "Actor").expect("Actor");
    let shape = lib.resolved_type(actor).expect("shape");
    let members = lib.get(shape).expect("type").members.clone();

    let move_entry = members
        .iter()
        .find(|&&m| {
            lib.get(m)
                .and_then(Symbol::var_data)
                .and_then(|vd| vd.index.as_ref())
                .is_some_and(|ix| ix.matches_str("move"))
        })
        .copied()
        .expect("move entry");
    assert_eq!(
        lib.get(move_entry)
            .and_then(Symbol::var_data)
            .map(|vd| vd.value_kind),
        Some(VarKind::Method)
    );

    // `self` resolved to the owner, so the write landed on Actor's shape.
    let has_speed = members.iter().any(|&m| {
        lib.get(m)
            .and_then(Symbol::var_data)
            .and_then(|vd| vd.index.as_ref())
            .is_some_and(|ix| ix.matches_str("speed"))
    });
    assert!(has_speed);
}

#[test]
fn test_resolved_type_roots_are_stable() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "inv.lua",
        "Game = {}\nGame.state = {}\nfunction Game:tick() return 1 end\nlocal n = Game:tick()",
    );

    let lib = ws.library();
    for (id, _) in lib.symbols() {
        if let Some(root) = lib.resolved_type(id) {
            let root_link = lib.get(root).and_then(|s| s.resolved);
            assert_eq!(root_link, Some(root), "root must self-resolve");
        }
    }
}

#[test]
fn test_parent_links_are_structural() {
    let src = "function f(a) if a then return 1 else return 2 end end t = {1, x = 2}";
    let tokens = lexer::strip_trivia(lexer::Lexer::new().tokenize(src));
    let (mut tree, _) = parser::parse(src, &tokens);
    let mut lib = Library::new();
    let mut ticket = LibraryReference::default();
    infer::resolve_types(&mut tree, &mut lib, &mut ticket);

    fn walk(tree: &ast::Ast, id: ast::NodeId) {
        let end = match &tree[id].kind {
            ast::NodeKind::Block { end, .. } => *end,
            _ => None,
        };
        for child in ast::children(&tree[id].kind) {
            if Some(child) == end {
                // Block end markers short-circuit to the block's parent.
                assert_eq!(tree[child].parent, tree[id].parent);
            } else {
                assert_eq!(tree[child].parent, Some(id));
            }
            walk(tree, child);
        }
    }
    walk(&tree, tree.root);
}

#[test]
fn test_table_member_indexes_unique() {
    let mut ws = Workspace::new();
    ws.parse_document(
        "uniq.lua",
        "t = {}\nt.a = 1\nt.a = 2\nt.b = 3\nt.a = \"again\"",
    );

    let lib = ws.library();
    for (_, sym) in lib.symbols() {
        if !sym.is_type() {
            continue;
        }
        let indexes: Vec<ValueData> = sym
            .members
            .iter()
            .filter_map(|&m| lib.get(m))
            .filter_map(|s| s.var_data())
            .filter(|vd| vd.var_kind == VarKind::TableValue)
            .filter_map(|vd| vd.index.clone())
            .collect();
        for (i, a) in indexes.iter().enumerate() {
            for b in indexes.iter().skip(i + 1) {
                assert!(!a.matches(b), "duplicate table index {a:?}");
            }
        }
    }
}
