//! The symbol library — the shape graph shared by every parsed document.
//!
//! All symbols live in one slab arena and refer to each other by `SymbolId`.
//! Slots are never reused, so an id held by a stale AST degrades to absence
//! instead of pointing at a different symbol. Cross-document lifetime is
//! tracked per parse through [`LibraryReference`] tickets.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stable handle into the library's symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a variable is, or — through `value_kind` — what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VarKind {
    #[default]
    Default,
    Field,
    TableValue,
    Function,
    Method,
}

/// A folded constant, or a reference to another symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ValueData {
    #[default]
    Invalid,
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Reference(SymbolId),
    VarArg,
}

impl ValueData {
    /// Structural match used for table-index lookups. `Invalid` and `Nil`
    /// never match anything, themselves included.
    pub fn matches(&self, other: &ValueData) -> bool {
        match (self, other) {
            (ValueData::Boolean(a), ValueData::Boolean(b)) => a == b,
            (ValueData::Number(a), ValueData::Number(b)) => a == b,
            (ValueData::String(a), ValueData::String(b)) => a == b,
            (ValueData::Reference(a), ValueData::Reference(b)) => a == b,
            _ => false,
        }
    }

    pub fn matches_str(&self, s: &str) -> bool {
        matches!(self, ValueData::String(v) if v == s)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueData::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeData {
    /// Tuple of types, for multi-value returns.
    pub multiple: Vec<Option<SymbolId>>,
    /// Union of alternatives, grown by `add_possible_type`.
    pub possible: Vec<SymbolId>,
    /// Present when the type is callable.
    pub return_type: Option<SymbolId>,
    pub predictive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableData {
    pub var_kind: VarKind,
    /// Kind of the held value when the variable stores a function.
    pub value_kind: VarKind,
    pub value: ValueData,
    pub predictive: bool,
    /// Present on table entries: the key this entry sits under.
    pub index: Option<ValueData>,
    pub index_via_expression: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SymbolKind {
    Type(TypeData),
    Variable(VariableData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub parent: Option<SymbolId>,
    /// Link toward the resolved type; roots satisfy `resolved == self`.
    pub resolved: Option<SymbolId>,
    pub members: Vec<SymbolId>,
    pub refs: u32,
    /// Base types and `_G` are pinned and survive every clean.
    pub pinned: bool,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable(_))
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, SymbolKind::Type(_))
    }

    pub fn type_data(&self) -> Option<&TypeData> {
        match &self.kind {
            SymbolKind::Type(t) => Some(t),
            SymbolKind::Variable(_) => None,
        }
    }

    pub fn type_data_mut(&mut self) -> Option<&mut TypeData> {
        match &mut self.kind {
            SymbolKind::Type(t) => Some(t),
            SymbolKind::Variable(_) => None,
        }
    }

    pub fn var_data(&self) -> Option<&VariableData> {
        match &self.kind {
            SymbolKind::Variable(v) => Some(v),
            SymbolKind::Type(_) => None,
        }
    }

    pub fn var_data_mut(&mut self) -> Option<&mut VariableData> {
        match &mut self.kind {
            SymbolKind::Variable(v) => Some(v),
            SymbolKind::Type(_) => None,
        }
    }

    /// A variable that carries a table index.
    pub fn is_table_entry(&self) -> bool {
        matches!(&self.kind, SymbolKind::Variable(v) if v.index.is_some())
    }

    pub fn is_predictive_type(&self) -> bool {
        matches!(&self.kind, SymbolKind::Type(t) if t.predictive)
    }
}

/// The per-parse ticket: records every symbol observation this parse made,
/// so releasing the ticket undoes exactly those counts.
#[derive(Debug, Default)]
pub struct LibraryReference {
    counts: HashMap<SymbolId, u32>,
}

impl LibraryReference {
    fn note(&mut self, id: SymbolId) {
        *self.counts.entry(id).or_insert(0) += 1;
    }
}

/// The set of singleton base types.
#[derive(Debug, Clone, Copy)]
pub struct BaseTypes {
    pub nil: SymbolId,
    pub boolean: SymbolId,
    pub number: SymbolId,
    pub string: SymbolId,
    pub function: SymbolId,
    pub userdata: SymbolId,
    pub thread: SymbolId,
    pub table: SymbolId,
    pub vararg: SymbolId,
}

pub struct Library {
    symbols: Vec<Option<Symbol>>,
    pub base: BaseTypes,
    /// The distinguished `_G` table variable.
    pub global_table: SymbolId,
    /// Every global symbol, in creation order.
    pub globals: Vec<SymbolId>,
    globals_by_name: HashMap<String, SymbolId>,
    anonymous_functions: u32,
}

impl Library {
    pub fn new() -> Self {
        let mut lib = Self {
            symbols: Vec::new(),
            base: BaseTypes {
                nil: SymbolId(0),
                boolean: SymbolId(0),
                number: SymbolId(0),
                string: SymbolId(0),
                function: SymbolId(0),
                userdata: SymbolId(0),
                thread: SymbolId(0),
                table: SymbolId(0),
                vararg: SymbolId(0),
            },
            global_table: SymbolId(0),
            globals: Vec::new(),
            globals_by_name: HashMap::new(),
            anonymous_functions: 0,
        };

        lib.base = BaseTypes {
            nil: lib.create_base_type("Nil"),
            boolean: lib.create_base_type("Boolean"),
            number: lib.create_base_type("Number"),
            string: lib.create_base_type("String"),
            function: lib.create_base_type("Function"),
            userdata: lib.create_base_type("Userdata"),
            thread: lib.create_base_type("Thread"),
            table: lib.create_base_type("Table"),
            vararg: lib.create_base_type("VariableArgument"),
        };

        let global_type = lib.alloc(Symbol {
            name: "Table".to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 1,
            pinned: true,
            kind: SymbolKind::Type(TypeData::default()),
        });
        lib.self_resolve(global_type);

        let g = lib.alloc(Symbol {
            name: "_G".to_string(),
            parent: None,
            resolved: Some(global_type),
            members: Vec::new(),
            refs: 1,
            pinned: true,
            kind: SymbolKind::Variable(VariableData::default()),
        });
        lib.global_table = g;

        lib
    }

    // ── Access ──

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    pub fn name_of(&self, id: SymbolId) -> &str {
        self.get(id).map_or("(none)", |s| s.name.as_str())
    }

    /// Follow `resolved` links to the self-looping root. Absent receivers and
    /// broken links yield `None`; cycles stop at the first repeat.
    pub fn resolved_type(&self, id: SymbolId) -> Option<SymbolId> {
        let mut current = self.get(id)?.resolved?;
        let mut seen = vec![id];
        loop {
            let next = self.get(current)?.resolved;
            match next {
                Some(next) if next != current && !seen.contains(&next) => {
                    seen.push(current);
                    current = next;
                }
                _ => return Some(current),
            }
        }
    }

    pub fn resolved_type_of(&self, id: Option<SymbolId>) -> Option<SymbolId> {
        id.and_then(|i| self.resolved_type(i))
    }

    /// Members of a symbol's resolved type.
    pub fn resolved_members(&self, id: SymbolId) -> Vec<SymbolId> {
        self.resolved_type(id)
            .and_then(|t| self.get(t))
            .map(|t| t.members.clone())
            .unwrap_or_default()
    }

    // ── Creation ──

    fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(Some(symbol));
        SymbolId((self.symbols.len() - 1) as u32)
    }

    fn self_resolve(&mut self, id: SymbolId) {
        if let Some(sym) = self.get_mut(id) {
            sym.resolved = Some(id);
        }
    }

    fn reference(&mut self, id: SymbolId, ticket: &mut LibraryReference) {
        if let Some(sym) = self.get_mut(id) {
            sym.refs += 1;
        }
        ticket.note(id);
    }

    /// Record that a parse observed an existing symbol. Observations keep
    /// cross-document anchors alive until the observing document goes away.
    pub fn observe(&mut self, id: SymbolId, ticket: &mut LibraryReference) {
        self.reference(id, ticket);
    }

    fn create_base_type(&mut self, name: &str) -> SymbolId {
        let id = self.alloc(Symbol {
            name: name.to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 1,
            pinned: true,
            kind: SymbolKind::Type(TypeData::default()),
        });
        self.self_resolve(id);
        id
    }

    /// A rooted type; when `global`, registered under its name.
    pub fn create_type(
        &mut self,
        name: &str,
        global: bool,
        ticket: &mut LibraryReference,
    ) -> SymbolId {
        if global {
            if let Some(&existing) = self.globals_by_name.get(name) {
                self.reference(existing, ticket);
                return existing;
            }
        }

        let id = self.alloc(Symbol {
            name: name.to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 0,
            pinned: false,
            kind: SymbolKind::Type(TypeData::default()),
        });
        self.self_resolve(id);
        if global {
            self.globals.push(id);
            self.globals_by_name.insert(name.to_string(), id);
        }
        self.reference(id, ticket);
        id
    }

    /// An un-registered type (not visible by name anywhere).
    pub fn create_blank_type(&mut self, name: &str, ticket: &mut LibraryReference) -> SymbolId {
        let id = self.alloc(Symbol {
            name: name.to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 0,
            pinned: false,
            kind: SymbolKind::Type(TypeData::default()),
        });
        self.self_resolve(id);
        self.reference(id, ticket);
        id
    }

    /// A blank type flagged predictive, to be concretized later by
    /// `copy_type`.
    pub fn create_predictive_type(&mut self, ticket: &mut LibraryReference) -> SymbolId {
        let id = self.create_blank_type("Predictive", ticket);
        if let Some(td) = self.get_mut(id).and_then(Symbol::type_data_mut) {
            td.predictive = true;
        }
        id
    }

    /// A variable; when `global`, an existing global of the same name is
    /// reused, otherwise the new variable joins the globals and `_G`'s
    /// member list.
    pub fn create_variable(
        &mut self,
        name: &str,
        global: bool,
        ticket: &mut LibraryReference,
    ) -> SymbolId {
        if global {
            if let Some(&existing) = self.globals_by_name.get(name) {
                self.reference(existing, ticket);
                return existing;
            }
        }

        let id = self.alloc(Symbol {
            name: name.to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 0,
            pinned: false,
            kind: SymbolKind::Variable(VariableData::default()),
        });
        if global {
            self.globals.push(id);
            self.globals_by_name.insert(name.to_string(), id);
            if let Some(global_type) = self.resolved_type(self.global_table) {
                if let Some(gt) = self.get_mut(global_type) {
                    gt.members.push(id);
                }
            }
        }
        self.reference(id, ticket);
        id
    }

    /// A fresh table entry of kind `TableValue`; index and parent are the
    /// caller's to fill in.
    pub fn create_table_entry(&mut self, ticket: &mut LibraryReference) -> SymbolId {
        let id = self.alloc(Symbol {
            name: "TableVar".to_string(),
            parent: None,
            resolved: None,
            members: Vec::new(),
            refs: 0,
            pinned: false,
            kind: SymbolKind::Variable(VariableData {
                var_kind: VarKind::TableValue,
                index: Some(ValueData::Invalid),
                ..VariableData::default()
            }),
        });
        self.reference(id, ticket);
        id
    }

    /// A tuple type over `types`; a single entry is returned as-is.
    pub fn create_multiple_type(
        &mut self,
        types: &[Option<SymbolId>],
        ticket: &mut LibraryReference,
    ) -> Option<SymbolId> {
        if types.len() == 1 {
            return types[0];
        }

        let mut name = String::from("MultipleType(");
        for (i, t) in types.iter().enumerate() {
            if i > 0 {
                name.push_str(", ");
            }
            match t {
                Some(t) => name.push_str(self.name_of(*t)),
                None => name.push_str("(none)"),
            }
        }
        name.push(')');

        let id = self.create_blank_type(&name, ticket);
        if let Some(td) = self.get_mut(id).and_then(Symbol::type_data_mut) {
            td.multiple = types.to_vec();
        }
        Some(id)
    }

    /// Grow `base`'s union with `new_type`. A one-entry union collapses to
    /// the single branch; a wider one resolves to itself and is renamed.
    pub fn add_possible_type(&mut self, base: SymbolId, new_type: Option<SymbolId>) {
        let Some(new_type) = new_type else { return };

        let Some(td) = self.get_mut(base).and_then(Symbol::type_data_mut) else {
            return;
        };
        td.possible.push(new_type);

        if td.possible.len() == 1 {
            if let Some(sym) = self.get_mut(base) {
                sym.resolved = Some(new_type);
            }
            return;
        }

        self.self_resolve(base);

        let possible = self
            .get(base)
            .and_then(Symbol::type_data)
            .map(|t| t.possible.clone())
            .unwrap_or_default();
        let mut name = String::from("PossibleType(");
        for (i, t) in possible.iter().enumerate() {
            if i > 0 {
                name.push_str(" OR ");
            }
            name.push_str(self.name_of(*t));
        }
        name.push(')');
        if let Some(sym) = self.get_mut(base) {
            sym.name = name;
        }
    }

    /// The callable type wrapping a function's return type.
    pub fn create_function_type(
        &mut self,
        return_type: SymbolId,
        ticket: &mut LibraryReference,
    ) -> SymbolId {
        let resolved_name = self
            .resolved_type(return_type)
            .map(|t| self.name_of(t).to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let name = format!("Function() - {resolved_name}");

        let id = self.create_type(&name, false, ticket);
        if let Some(td) = self.get_mut(id).and_then(Symbol::type_data_mut) {
            td.return_type = Some(return_type);
        }
        id
    }

    pub fn next_anonymous_function(&mut self) -> u32 {
        self.anonymous_functions += 1;
        self.anonymous_functions
    }

    /// Rebind a predictive type's record to a concrete one in place, so
    /// every id that pointed at the prediction now sees the concrete shape.
    /// Members are appended, keeping whatever was already predicted.
    pub fn copy_type(&mut self, prediction: SymbolId, source: SymbolId) {
        if prediction == source {
            return;
        }
        let Some(src) = self.get(source) else { return };

        let name = src.name.clone();
        let parent = src.parent;
        let members = src.members.clone();
        let type_data = src.type_data().cloned();

        let Some(dst) = self.get_mut(prediction) else {
            return;
        };
        dst.name = name;
        dst.parent = parent;
        dst.members.extend(members);
        if let (Some(td), Some(src_td)) = (dst.type_data_mut(), type_data) {
            td.multiple = src_td.multiple;
            td.possible = src_td.possible;
            td.return_type = src_td.return_type;
        }
    }

    // ── Lifetime ──

    /// Undo every count the ticket recorded, then sweep.
    pub fn release(&mut self, ticket: LibraryReference) {
        for (id, count) in ticket.counts {
            if let Some(sym) = self.get_mut(id) {
                sym.refs = sym.refs.saturating_sub(count);
            }
        }
        self.clean();
    }

    /// Sweep: free every unpinned zero-reference symbol and prune all links
    /// into the freed set.
    pub fn clean(&mut self) {
        let mut dead: HashSet<SymbolId> = HashSet::new();
        for (i, slot) in self.symbols.iter().enumerate() {
            if let Some(sym) = slot {
                if !sym.pinned && sym.refs == 0 {
                    dead.insert(SymbolId(i as u32));
                }
            }
        }
        if dead.is_empty() {
            return;
        }

        for slot in &mut self.symbols {
            let Some(sym) = slot else { continue };
            if sym.parent.is_some_and(|p| dead.contains(&p)) {
                sym.parent = None;
            }
            if sym.resolved.is_some_and(|r| dead.contains(&r)) {
                sym.resolved = None;
            }
            sym.members.retain(|m| !dead.contains(m));
            match &mut sym.kind {
                SymbolKind::Type(td) => {
                    if td.return_type.is_some_and(|r| dead.contains(&r)) {
                        td.return_type = None;
                    }
                    for m in &mut td.multiple {
                        if m.is_some_and(|t| dead.contains(&t)) {
                            *m = None;
                        }
                    }
                    td.possible.retain(|p| !dead.contains(p));
                }
                SymbolKind::Variable(vd) => {
                    if matches!(vd.value, ValueData::Reference(r) if dead.contains(&r)) {
                        vd.value = ValueData::Invalid;
                    }
                    if matches!(vd.index, Some(ValueData::Reference(r)) if dead.contains(&r)) {
                        vd.index = Some(ValueData::Invalid);
                    }
                }
            }
        }

        for id in &dead {
            if let Some(Some(sym)) = self.symbols.get(id.index()) {
                if self.globals_by_name.get(&sym.name) == Some(id) {
                    self.globals_by_name.remove(&sym.name);
                }
            }
            self.symbols[id.index()] = None;
        }
        self.globals.retain(|g| !dead.contains(g));
    }

    /// Live symbol count, for tests and introspection.
    pub fn live_symbols(&self) -> usize {
        self.symbols.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate every live symbol.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|sym| (SymbolId(i as u32), sym)))
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
