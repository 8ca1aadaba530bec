//! Flow-sensitive shape inference.
//!
//! One walk per document over the AST, against the shared [`Library`].
//! Assignments materialize members on table types, reads unite with what
//! earlier documents established, and names that have not been written yet
//! get predictive placeholders that later assignments concretize in place.
//! Lookups that fail resolve to absence, never to an error.

use crate::analysis::ast::{
    assign_parents, Ast, FunctionData, Literal, NodeId, NodeKind, Param, TableEntry,
};
use crate::analysis::library::{
    Library, LibraryReference, Symbol, SymbolId, ValueData, VarKind,
};
use crate::analysis::tokens::TokenKind;

const CALL_PREDICTION_DEPTH: u8 = 16;

/// Run inference over `ast`, recording every symbol observation in
/// `ticket`, then populate the parent links.
pub fn resolve_types(ast: &mut Ast, lib: &mut Library, ticket: &mut LibraryReference) {
    let root = ast.root;
    let mut inference = Inference {
        lib,
        ticket,
        ast,
        function_stack: Vec::new(),
        block_stack: Vec::new(),
        parent_stack: Vec::new(),
        resolve_assignment: false,
        valid_assignment: true,
    };
    inference.visit(root);
    assign_parents(ast);
}

struct Inference<'a> {
    lib: &'a mut Library,
    ticket: &'a mut LibraryReference,
    ast: &'a mut Ast,
    /// Enclosing function nodes, for attaching return types.
    function_stack: Vec<NodeId>,
    /// Enclosing block nodes, for attaching locals.
    block_stack: Vec<NodeId>,
    /// Symbols new members attach to: function symbols and table owners.
    parent_stack: Vec<SymbolId>,
    /// Set while walking the left side of an assignment.
    resolve_assignment: bool,
    /// Cleared while walking an assignment whose operator never arrived.
    valid_assignment: bool,
}

impl<'a> Inference<'a> {
    fn visit(&mut self, id: NodeId) {
        let kind = self.ast[id].kind.clone();
        match kind {
            NodeKind::Block { statements, .. } => self.visit_block(id, &statements),
            NodeKind::EndMarker | NodeKind::Break | NodeKind::FunctionName { .. } => {}
            NodeKind::Assignment {
                op,
                targets,
                values,
            } => self.visit_assignment(op, &targets, &values),
            NodeKind::VariableStatement { head, suffix } => {
                self.visit_variable_statement(id, head, suffix)
            }
            NodeKind::NameVariable { name } => self.visit_name_variable(id, &name),
            NodeKind::ParenVariable { expr, suffix } => {
                self.visit_paren_variable(id, expr, suffix)
            }
            NodeKind::Suffix { left, calls, index } => {
                self.visit_suffix(id, left, &calls, index)
            }
            NodeKind::Call { args } => self.visit_call(id, args),
            NodeKind::MemberCall { name, args } => self.visit_member_call(id, &name, args),
            NodeKind::ExprArgs { list } => {
                for expr in list {
                    self.visit(expr);
                }
            }
            NodeKind::TableArg { table } => self.visit(table),
            NodeKind::StringArg { .. } | NodeKind::NameIndex { .. } => {}
            NodeKind::ExprIndex { expr } => {
                if let Some(expr) = expr {
                    self.visit(expr);
                }
            }
            NodeKind::Return { values } => self.visit_return(&values),
            NodeKind::Value { literal } => self.visit_value(id, &literal),
            NodeKind::Table { entries } => self.visit_table(id, &entries),
            NodeKind::FunctionExpr { function } => {
                self.visit(function);
                let resolved = match self.ast[function].sem.variable {
                    Some(fn_var) => self.lib.resolved_type(fn_var),
                    None => None,
                };
                self.ast[id].sem.resolved = resolved;
            }
            NodeKind::FunctionCall { variable, calls } => {
                self.visit_call_chain(id, variable, &calls, false)
            }
            NodeKind::PrefixExpr { variable, calls } => {
                self.visit_call_chain(id, variable, &calls, true)
            }
            NodeKind::Unary { rhs, .. } => {
                if let Some(rhs) = rhs {
                    self.visit(rhs);
                }
            }
            NodeKind::Binary { op, lhs, rhs } => self.visit_binary(id, op, lhs, rhs),
            NodeKind::Function(data) => self.visit_function(id, &data),
            NodeKind::While { condition, body } => {
                if let Some(condition) = condition {
                    self.visit(condition);
                }
                if let Some(body) = body {
                    self.visit(body);
                }
            }
            NodeKind::Repeat { body, condition } => {
                if let Some(body) = body {
                    self.visit(body);
                }
                if let Some(condition) = condition {
                    self.visit(condition);
                }
            }
            NodeKind::If {
                condition,
                body,
                else_branch,
            } => {
                if let Some(condition) = condition {
                    self.visit(condition);
                }
                if let Some(body) = body {
                    self.visit(body);
                }
                if let Some(else_branch) = else_branch {
                    self.visit(else_branch);
                }
            }
            NodeKind::NumericFor {
                start,
                limit,
                step,
                body,
                ..
            } => {
                for expr in [start, limit, step].into_iter().flatten() {
                    self.visit(expr);
                }
                if let Some(body) = body {
                    self.visit(body);
                }
            }
            NodeKind::GenericFor { exprs, body, .. } => {
                for expr in exprs {
                    self.visit(expr);
                }
                if let Some(body) = body {
                    self.visit(body);
                }
            }
            NodeKind::LocalVariable { names, exprs } => {
                self.visit_local_variable(&names, &exprs)
            }
        }
    }

    // ── Lookup ──

    /// `_G` is a hard alias for the global table; otherwise scan enclosing
    /// scope symbols innermost-first, then the globals.
    fn find_variable(&self, name: &str) -> Option<SymbolId> {
        if name == "_G" {
            return Some(self.lib.global_table);
        }

        for &scope in self.parent_stack.iter().rev() {
            let Some(scope_sym) = self.lib.get(scope) else {
                continue;
            };
            for &member in &scope_sym.members {
                if let Some(sym) = self.lib.get(member) {
                    if sym.is_variable() && sym.name == name {
                        return Some(member);
                    }
                }
            }
        }

        let global_type = self.lib.resolved_type(self.lib.global_table)?;
        for &member in &self.lib.get(global_type)?.members {
            if let Some(sym) = self.lib.get(member) {
                if sym.is_variable() && sym.name == name {
                    return Some(member);
                }
            }
        }

        None
    }

    fn is_vararg(&self, t: Option<SymbolId>) -> bool {
        self.lib.resolved_type_of(t) == Some(self.lib.base.vararg)
    }

    /// Count an observation of an existing symbol (and its resolved root)
    /// against this parse's ticket, so anchors other documents rely on
    /// survive until this document is replaced.
    fn observe(&mut self, id: SymbolId) {
        self.lib.observe(id, self.ticket);
        if let Some(root) = self.lib.resolved_type(id) {
            if root != id {
                self.lib.observe(root, self.ticket);
            }
        }
    }

    /// Spread variadic slots so positional assignment lines up: each vararg
    /// expands to `(n_targets - n_other) / n_varargs` fresh predictive
    /// types, integer division.
    fn expand_varargs(
        &mut self,
        types: &mut Vec<Option<SymbolId>>,
        values: &mut Vec<ValueData>,
        num_varargs: usize,
        num_targets: usize,
    ) {
        let other = types.len() - num_varargs;
        let slots = (num_targets as i64 - other as i64) / num_varargs as i64;

        let mut new_types = Vec::new();
        let mut new_values = Vec::new();
        for (t, v) in types.iter().zip(values.iter()) {
            if self.is_vararg(*t) {
                for _ in 0..slots.max(0) {
                    let predictive = self.lib.create_predictive_type(self.ticket);
                    new_types.push(Some(predictive));
                    new_values.push(ValueData::Invalid);
                }
            } else {
                new_types.push(*t);
                new_values.push(v.clone());
            }
        }
        *types = new_types;
        *values = new_values;
    }

    // ── Statements ──

    fn visit_block(&mut self, id: NodeId, statements: &[NodeId]) {
        self.block_stack.push(id);
        for &statement in statements {
            self.visit(statement);
        }
        self.block_stack.pop();
    }

    fn visit_assignment(&mut self, op: Option<TokenKind>, targets: &[NodeId], values: &[NodeId]) {
        for &value in values {
            self.visit(value);
        }

        let mut expr_types: Vec<Option<SymbolId>> = Vec::new();
        let mut expr_values: Vec<ValueData> = Vec::new();
        let mut num_varargs = 0;
        for &value in values {
            let t = self.ast[value].sem.resolved;
            if self.is_vararg(t) {
                num_varargs += 1;
            }
            expr_types.push(t);
            expr_values.push(self.ast[value].sem.value.clone());
        }

        if num_varargs > 0 {
            self.expand_varargs(&mut expr_types, &mut expr_values, num_varargs, targets.len());
        }

        self.valid_assignment = op.is_some();

        for (i, &target) in targets.iter().enumerate() {
            self.resolve_assignment = true;
            self.visit(target);
            self.resolve_assignment = false;

            if i < expr_types.len() {
                self.ast[target].sem.resolved = expr_types[i];

                if let Some(var) = self.ast[target].sem.variable {
                    if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
                        vd.value = expr_values[i].clone();
                    }

                    // A predictive type is concretized in place so every id
                    // pointing at it keeps working; anything else rebinds.
                    let direct = self.lib.get(var).and_then(|s| s.resolved);
                    let predictive = direct
                        .and_then(|t| self.lib.get(t))
                        .is_some_and(Symbol::is_predictive_type);
                    if predictive {
                        if let (Some(prediction), Some(new_type)) = (direct, expr_types[i]) {
                            self.lib.copy_type(prediction, new_type);
                        }
                    } else if let Some(sym) = self.lib.get_mut(var) {
                        sym.resolved = expr_types[i];
                    }
                }
            } else {
                self.ast[target].sem.resolved = Some(self.lib.base.nil);
            }
        }

        self.valid_assignment = true;
    }

    fn visit_local_variable(&mut self, names: &[Param], exprs: &[NodeId]) {
        let mut expr_types: Vec<Option<SymbolId>> = Vec::new();
        let mut expr_values: Vec<ValueData> = Vec::new();
        let mut num_varargs = 0;

        for &expr in exprs {
            self.visit(expr);

            let t = self.ast[expr].sem.resolved;
            let multiple = t
                .and_then(|t| self.lib.get(t))
                .and_then(Symbol::type_data)
                .map(|td| td.multiple.clone())
                .unwrap_or_default();

            if !multiple.is_empty() {
                // A tuple spreads over the declared names positionally.
                for member in multiple {
                    if self.is_vararg(member) {
                        num_varargs += 1;
                    }
                    expr_types.push(member);
                    expr_values.push(ValueData::Invalid);
                }
            } else {
                if self.is_vararg(t) {
                    num_varargs += 1;
                }
                expr_types.push(t);
                expr_values.push(self.ast[expr].sem.value.clone());
            }
        }

        if num_varargs > 0 {
            self.expand_varargs(&mut expr_types, &mut expr_values, num_varargs, names.len());
        }

        for (i, name) in names.iter().enumerate() {
            let var = self.lib.create_variable(&name.name, false, self.ticket);
            if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
                vd.var_kind = VarKind::Field;
            }

            if i < expr_types.len() {
                if let Some(sym) = self.lib.get_mut(var) {
                    sym.resolved = expr_types[i];
                }
                if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
                    vd.value = expr_values[i].clone();
                }
            } else {
                let nil = self.lib.base.nil;
                if let Some(sym) = self.lib.get_mut(var) {
                    sym.resolved = Some(nil);
                }
            }

            self.attach_to_scope(var);
            self.attach_local(var);
        }
    }

    fn attach_to_scope(&mut self, var: SymbolId) {
        if let Some(&scope) = self.parent_stack.last() {
            if let Some(scope_sym) = self.lib.get_mut(scope) {
                scope_sym.members.push(var);
            }
            if let Some(sym) = self.lib.get_mut(var) {
                sym.parent = Some(scope);
            }
        }
    }

    fn attach_local(&mut self, var: SymbolId) {
        if let Some(&block) = self.block_stack.last() {
            if let NodeKind::Block { locals, .. } = &mut self.ast[block].kind {
                locals.push(var);
            }
        }
    }

    // ── Variables and suffixes ──

    fn visit_variable_statement(&mut self, id: NodeId, head: NodeId, suffix: Option<NodeId>) {
        self.visit(head);
        self.ast[id].sem.resolved = self.ast[head].sem.resolved;
        self.ast[id].sem.variable = self.ast[head].sem.variable;

        if let Some(suffix) = suffix {
            self.ast[suffix].sem.resolved = self.ast[id].sem.resolved;
            self.visit(suffix);
            self.ast[id].sem.resolved =
                self.lib.resolved_type_of(self.ast[suffix].sem.resolved);
            self.ast[id].sem.variable = self.ast[suffix].sem.variable;
        }
    }

    fn visit_name_variable(&mut self, id: NodeId, name: &str) {
        if let Some(var) = self.find_variable(name) {
            self.observe(var);
            let direct = self.lib.get(var).and_then(|s| s.resolved);
            self.ast[id].sem.resolved = self.lib.resolved_type_of(direct);
            self.ast[id].sem.variable = Some(var);
            return;
        }

        // Unknown name on the left of an assignment: a new global with a
        // predictive shape. This is where shape growth starts.
        if self.valid_assignment {
            let var = self.lib.create_variable(name, true, self.ticket);
            if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
                vd.var_kind = VarKind::Field;
            }

            let predictive = self.lib.create_predictive_type(self.ticket);
            if let Some(sym) = self.lib.get_mut(var) {
                sym.resolved = Some(predictive);
            }

            self.ast[id].sem.resolved = self.lib.resolved_type(var);
            self.ast[id].sem.variable = Some(var);
        }
    }

    fn visit_paren_variable(&mut self, id: NodeId, expr: Option<NodeId>, suffix: Option<NodeId>) {
        if let Some(expr) = expr {
            self.visit(expr);
            self.ast[id].sem.resolved = self.ast[expr].sem.resolved;
        }

        if let Some(suffix) = suffix {
            self.ast[suffix].sem.resolved = self.ast[id].sem.resolved;
            self.visit(suffix);
            self.ast[id].sem.resolved =
                self.lib.resolved_type_of(self.ast[suffix].sem.resolved);
        }
    }

    fn index_key(&self, index: NodeId) -> (ValueData, bool) {
        match &self.ast[index].kind {
            NodeKind::NameIndex { name } => (ValueData::String(name.clone()), false),
            NodeKind::ExprIndex { expr } => (
                expr.map(|e| self.ast[e].sem.value.clone())
                    .unwrap_or_default(),
                true,
            ),
            _ => (ValueData::Invalid, false),
        }
    }

    /// Find a `TableValue` entry of `symbol`'s member list matching `key`.
    fn find_table_entry(&self, symbol: SymbolId, key: &ValueData) -> Option<SymbolId> {
        let members = self.lib.get(symbol)?.members.clone();
        for member in members {
            let Some(sym) = self.lib.get(member) else {
                continue;
            };
            let Some(vd) = sym.var_data() else { continue };
            if vd.var_kind != VarKind::TableValue {
                continue;
            }
            if let Some(index) = &vd.index {
                if index.matches(key) {
                    return Some(member);
                }
            }
        }
        None
    }

    /// Materialize a predictive table entry under `owner` with `key`, give
    /// it a predictive resolved type, and return `(entry, type)`.
    fn create_predictive_entry(&mut self, owner: SymbolId, key: ValueData) -> (SymbolId, SymbolId) {
        let entry = self.lib.create_table_entry(self.ticket);
        let predictive = self.lib.create_predictive_type(self.ticket);
        if let Some(vd) = self.lib.get_mut(entry).and_then(Symbol::var_data_mut) {
            vd.predictive = true;
            vd.index = Some(key);
        }
        if let Some(sym) = self.lib.get_mut(entry) {
            sym.parent = Some(owner);
            sym.resolved = Some(predictive);
        }
        if let Some(owner_sym) = self.lib.get_mut(owner) {
            owner_sym.members.push(entry);
        }
        (entry, predictive)
    }

    fn visit_suffix(
        &mut self,
        id: NodeId,
        left: Option<NodeId>,
        calls: &[NodeId],
        index: Option<NodeId>,
    ) {
        // The spine to the left resolves in read mode even when this suffix
        // is an assignment target.
        let saved = self.resolve_assignment;
        self.resolve_assignment = false;
        if let Some(left) = left {
            self.ast[left].sem.resolved = self.ast[id].sem.resolved;
            self.visit(left);
            self.ast[id].sem.resolved = self.ast[left].sem.resolved;
            self.ast[id].sem.variable = self.ast[left].sem.variable;
        }
        self.resolve_assignment = saved;

        for &call in calls {
            self.ast[call].sem.resolved = self.ast[id].sem.resolved;
            self.visit(call);
            self.ast[id].sem.resolved = self.ast[call].sem.resolved;
            self.ast[id].sem.variable = None;
        }

        let Some(index) = index else { return };
        self.visit(index);

        if let Some(symbol) = self.ast[id].sem.resolved {
            if self.resolve_assignment {
                self.resolve_index_assignment(id, index, symbol);
                return;
            }
            self.resolve_index_read(id, index, symbol);
        } else if let Some(left) = left {
            self.predict_parent_table(id, left, index);
        }
    }

    /// Assignment mode: writing through an index materializes the member on
    /// the table up front.
    fn resolve_index_assignment(&mut self, id: NodeId, index: NodeId, symbol: SymbolId) {
        let is_table = self
            .lib
            .get(symbol)
            .is_some_and(|s| s.name == "Table");
        if !is_table {
            return;
        }

        let (key, via_expression) = self.index_key(index);
        // An identifier the user has not typed yet names nothing.
        if !via_expression && !matches!(&key, ValueData::String(s) if !s.is_empty()) {
            return;
        }

        if let Some(existing) = self.find_table_entry(symbol, &key) {
            self.observe(existing);
            let predictive = self
                .lib
                .get(existing)
                .and_then(Symbol::var_data)
                .is_some_and(|vd| vd.predictive);
            if predictive {
                if let Some(vd) = self.lib.get_mut(existing).and_then(Symbol::var_data_mut) {
                    vd.index = Some(key);
                    if via_expression {
                        vd.index_via_expression = true;
                    }
                }
                self.ast[index].sem.variable = Some(existing);
            }
            self.ast[id].sem.variable = Some(existing);
            self.ast[id].sem.resolved = self.lib.resolved_type(existing);
        } else {
            let entry = self.lib.create_table_entry(self.ticket);
            if let Some(vd) = self.lib.get_mut(entry).and_then(Symbol::var_data_mut) {
                vd.index = Some(key);
                vd.index_via_expression = via_expression;
            }
            if let Some(sym) = self.lib.get_mut(entry) {
                sym.parent = Some(symbol);
            }
            if let Some(owner) = self.lib.get_mut(symbol) {
                owner.members.push(entry);
            }
            self.ast[index].sem.variable = Some(entry);
            self.ast[id].sem.variable = Some(entry);
        }
    }

    /// Read mode: a hit resolves to the member; a miss in assignable context
    /// still materializes a predictive member so the editor can complete it.
    fn resolve_index_read(&mut self, id: NodeId, index: NodeId, symbol: SymbolId) {
        match self.ast[index].kind.clone() {
            NodeKind::NameIndex { name } => {
                let key = ValueData::String(name.clone());
                if let Some(member) = self.find_table_entry(symbol, &key) {
                    self.observe(member);
                    self.ast[id].sem.resolved = self.lib.resolved_type(member);
                    self.ast[id].sem.variable = Some(member);
                    return;
                }

                if self.valid_assignment {
                    if !name.is_empty() {
                        let (entry, predictive) = self.create_predictive_entry(symbol, key);
                        self.ast[id].sem.variable = Some(entry);
                        self.ast[id].sem.resolved = Some(predictive);
                        self.ast[index].sem.variable = Some(entry);
                        return;
                    }
                    self.ast[id].sem.resolved = None;
                }
            }
            NodeKind::ExprIndex { expr } => {
                let key = expr
                    .map(|e| self.ast[e].sem.value.clone())
                    .unwrap_or_default();
                if let Some(member) = self.find_table_entry(symbol, &key) {
                    self.observe(member);
                    self.ast[id].sem.resolved = self.lib.resolved_type(member);
                    self.ast[id].sem.variable = Some(member);
                    return;
                }
                self.ast[id].sem.resolved = None;
            }
            _ => {}
        }
    }

    /// The left side has a variable but no shape yet: upgrade it to a
    /// predictive table so chains like `foo.bar.baz` can grow every level.
    fn predict_parent_table(&mut self, id: NodeId, left: NodeId, index: NodeId) {
        let Some(left_var) = self.ast[left].sem.variable else {
            return;
        };

        let parent_prediction = self.lib.create_predictive_type(self.ticket);
        if let Some(sym) = self.lib.get_mut(left_var) {
            sym.resolved = Some(parent_prediction);
        }
        self.ast[left].sem.resolved = Some(parent_prediction);
        self.ast[id].sem.resolved = Some(parent_prediction);

        if let NodeKind::NameIndex { name } = self.ast[index].kind.clone() {
            if !name.is_empty() {
                let (entry, predictive) =
                    self.create_predictive_entry(parent_prediction, ValueData::String(name));
                self.ast[id].sem.variable = Some(entry);
                self.ast[id].sem.resolved = Some(predictive);
                self.ast[index].sem.variable = Some(entry);
            }
        }
    }

    // ── Calls ──

    /// The type a call on `callee` produces: a direct return type wins,
    /// tuples contribute their first member, unions keep every callable
    /// branch (re-united when several remain).
    fn call_result(&mut self, callee: SymbolId, depth: u8) -> Option<SymbolId> {
        if depth == 0 {
            return None;
        }
        let root = self.lib.resolved_type(callee)?;
        let td = self.lib.get(root)?.type_data()?.clone();

        if let Some(return_type) = td.return_type {
            return self.lib.resolved_type(return_type);
        }

        if !td.multiple.is_empty() {
            return td.multiple[0].and_then(|t| self.call_result(t, depth - 1));
        }

        if !td.possible.is_empty() {
            let mut returns = Vec::new();
            for branch in td.possible {
                if let Some(result) = self.call_result(branch, depth - 1) {
                    returns.push(result);
                }
            }
            return match returns.len() {
                0 => None,
                1 => Some(returns[0]),
                _ => {
                    let united = self.lib.create_blank_type("", self.ticket);
                    for result in returns {
                        self.lib.add_possible_type(united, Some(result));
                    }
                    Some(united)
                }
            };
        }

        None
    }

    fn visit_call(&mut self, id: NodeId, args: Option<NodeId>) {
        let Some(symbol) = self.ast[id].sem.resolved else {
            return;
        };

        if let Some(args) = args {
            self.visit(args);
        }

        let result = self.call_result(symbol, CALL_PREDICTION_DEPTH);
        self.ast[id].sem.resolved = self.lib.resolved_type_of(result);
    }

    fn visit_member_call(&mut self, id: NodeId, name: &str, args: Option<NodeId>) {
        let Some(symbol) = self.ast[id].sem.resolved else {
            return;
        };

        let members = self
            .lib
            .get(symbol)
            .map(|s| s.members.clone())
            .unwrap_or_default();
        for member in members {
            let matched = self
                .lib
                .get(member)
                .and_then(Symbol::var_data)
                .and_then(|vd| vd.index.as_ref())
                .is_some_and(|index| index.matches_str(name));
            if matched {
                self.observe(member);
                self.ast[id].sem.resolved = self.lib.resolved_type(member);
                self.visit_call(id, args);
                return;
            }
        }
    }

    fn visit_call_chain(&mut self, id: NodeId, variable: NodeId, calls: &[NodeId], is_prefix: bool) {
        self.visit(variable);

        if is_prefix {
            if let Some(var) = self.ast[variable].sem.variable {
                if let Some(vd) = self.lib.get(var).and_then(Symbol::var_data) {
                    self.ast[id].sem.value = vd.value.clone();
                }
            }
            if self.ast[variable].sem.resolved.is_none() {
                return;
            }
        }

        self.ast[id].sem.resolved =
            self.lib.resolved_type_of(self.ast[variable].sem.resolved);

        for &call in calls {
            self.ast[call].sem.resolved = self.ast[id].sem.resolved;
            self.visit(call);
            self.ast[id].sem.resolved =
                self.lib.resolved_type_of(self.ast[call].sem.resolved);
        }
    }

    // ── Expressions ──

    fn visit_value(&mut self, id: NodeId, literal: &Literal) {
        match literal {
            Literal::Nil => {
                self.ast[id].sem.resolved = Some(self.lib.base.nil);
                self.ast[id].sem.value = ValueData::Nil;
            }
            Literal::True => {
                self.ast[id].sem.resolved = Some(self.lib.base.boolean);
                self.ast[id].sem.value = ValueData::Boolean(true);
            }
            Literal::False => {
                self.ast[id].sem.resolved = Some(self.lib.base.boolean);
                self.ast[id].sem.value = ValueData::Boolean(false);
            }
            Literal::Int(text) => {
                self.ast[id].sem.resolved = Some(self.lib.base.number);
                self.ast[id].sem.value = ValueData::Number(parse_int(text));
            }
            Literal::Float(text) => {
                self.ast[id].sem.resolved = Some(self.lib.base.number);
                self.ast[id].sem.value =
                    ValueData::Number(text.parse::<f64>().unwrap_or(0.0));
            }
            Literal::Str(raw) => {
                self.ast[id].sem.resolved = Some(self.lib.base.string);
                self.ast[id].sem.value = ValueData::String(strip_string_delimiters(raw));
            }
            Literal::Ellipsis => {
                self.ast[id].sem.resolved = Some(self.lib.base.vararg);
                self.ast[id].sem.value = ValueData::VarArg;
            }
        }
    }

    fn visit_table(&mut self, id: NodeId, entries: &[TableEntry]) {
        for entry in entries {
            if let Some(index) = entry.index {
                self.visit(index);
            }
            if let Some(value) = entry.value {
                self.visit(value);
            }
        }

        let table_type = self.lib.create_blank_type("Table", self.ticket);

        let mut array_index = 1.0;
        for entry in entries {
            // An index with no value contributes nothing; the member is nil.
            let Some(value) = entry.value else { continue };

            let key = match entry.index {
                None => {
                    let key = ValueData::Number(array_index);
                    array_index += 1.0;
                    key
                }
                Some(index) => match &self.ast[index].kind {
                    NodeKind::NameIndex { name } => ValueData::String(name.clone()),
                    NodeKind::ExprIndex { expr } => expr
                        .map(|e| self.ast[e].sem.value.clone())
                        .unwrap_or_default(),
                    _ => ValueData::Invalid,
                },
            };

            let member = self.lib.create_table_entry(self.ticket);
            let resolved = self.lib.resolved_type_of(self.ast[value].sem.resolved);
            let value_data = self.ast[value].sem.value.clone();
            if let Some(vd) = self.lib.get_mut(member).and_then(Symbol::var_data_mut) {
                vd.index = Some(key);
                vd.value = value_data;
            }
            if let Some(sym) = self.lib.get_mut(member) {
                sym.resolved = resolved;
                sym.parent = Some(table_type);
            }
            if let Some(table_sym) = self.lib.get_mut(table_type) {
                table_sym.members.push(member);
            }
        }

        self.ast[id].sem.resolved = Some(table_type);
    }

    fn visit_binary(&mut self, id: NodeId, op: TokenKind, lhs: NodeId, rhs: Option<NodeId>) {
        self.visit(lhs);
        if let Some(rhs) = rhs {
            self.visit(rhs);
        }

        let number = self.lib.base.number;
        let string = self.lib.base.string;
        let boolean = self.lib.base.boolean;

        let left_type = self.ast[lhs].sem.resolved;
        let right_type = rhs.and_then(|r| self.ast[r].sem.resolved);

        match op {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Caret => {
                if left_type == Some(number) && right_type == Some(number) {
                    self.ast[id].sem.resolved = Some(number);

                    let left_value = self.ast[lhs].sem.value.clone();
                    let right_value = rhs
                        .map(|r| self.ast[r].sem.value.clone())
                        .unwrap_or_default();
                    if let (ValueData::Number(a), ValueData::Number(b)) =
                        (left_value, right_value)
                    {
                        let folded = match op {
                            TokenKind::Plus => a + b,
                            TokenKind::Minus => a - b,
                            TokenKind::Star => a * b,
                            TokenKind::Slash => a / b,
                            TokenKind::Percent => a % b,
                            _ => a.powf(b),
                        };
                        self.ast[id].sem.value = ValueData::Number(folded);
                    }
                }
                // Anything non-numeric would go through metamethods; the
                // type stays unresolved.
            }
            TokenKind::DotDot => {
                let stringish = |t: Option<SymbolId>| t == Some(number) || t == Some(string);
                if stringish(left_type) && stringish(right_type) {
                    self.ast[id].sem.resolved = Some(string);
                }
            }
            TokenKind::Eq | TokenKind::NotEq => {
                self.ast[id].sem.resolved = Some(boolean);
            }
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                let both_numbers = left_type == Some(number) && right_type == Some(number);
                let both_strings = left_type == Some(string) && right_type == Some(string);
                if both_numbers || both_strings {
                    self.ast[id].sem.resolved = Some(boolean);
                }
            }
            TokenKind::And | TokenKind::Or => {
                if left_type == Some(boolean) && right_type == Some(boolean) {
                    self.ast[id].sem.resolved = Some(boolean);
                }
            }
            _ => {}
        }
    }

    fn visit_return(&mut self, values: &[NodeId]) {
        let mut types = Vec::new();
        for &value in values {
            self.visit(value);
            types.push(self.ast[value].sem.resolved);
        }

        let return_type = self.lib.create_multiple_type(&types, self.ticket);
        if let Some(&function) = self.function_stack.last() {
            if let Some(growing) = self.ast[function].sem.ret {
                self.lib.add_possible_type(growing, return_type);
            }
        }
    }

    // ── Functions ──

    fn visit_function(&mut self, id: NodeId, data: &FunctionData) {
        let fn_var = if self.parent_stack.is_empty() {
            self.lib.create_variable("GlobalChunk", false, self.ticket)
        } else {
            self.declare_function(data)
        };
        self.ast[id].sem.variable = Some(fn_var);

        self.parent_stack.push(fn_var);

        for param in &data.params {
            let predictive = self.lib.create_predictive_type(self.ticket);
            let var = self.lib.create_variable(&param.name, false, self.ticket);
            if let Some(sym) = self.lib.get_mut(var) {
                sym.resolved = Some(predictive);
            }
            self.attach_to_scope(var);
            if let Some(body) = data.body {
                if let NodeKind::Block { locals, .. } = &mut self.ast[body].kind {
                    locals.push(var);
                }
            }
        }

        let return_type = self.lib.create_blank_type("", self.ticket);
        let nil = self.lib.base.nil;
        if let Some(sym) = self.lib.get_mut(return_type) {
            sym.resolved = Some(nil);
        }
        self.ast[id].sem.ret = Some(return_type);

        self.function_stack.push(id);
        if let Some(body) = data.body {
            self.visit(body);
        }
        self.function_stack.pop();
        self.parent_stack.pop();

        let function_type = self.lib.create_function_type(return_type, self.ticket);
        if let Some(sym) = self.lib.get_mut(fn_var) {
            sym.resolved = Some(function_type);
        }
    }

    /// Resolve the declared name path (`a.b.c:d`), predicting any missing
    /// segment, and produce the symbol that holds this function.
    fn declare_function(&mut self, data: &FunctionData) -> SymbolId {
        let mut function_name = String::new();
        let mut is_member = false;
        let mut owner: Option<SymbolId> = None;

        for (i, &segment) in data.name.iter().enumerate() {
            let NodeKind::FunctionName { name, is_method } = &self.ast[segment].kind else {
                continue;
            };
            function_name = name.clone();
            is_member = *is_method;

            if i >= data.name.len() - 1 {
                break;
            }

            if i == 0 {
                owner = self.find_variable(&function_name);
                if let Some(found) = owner {
                    self.observe(found);
                }
                if owner.is_none() && !function_name.is_empty() {
                    let var =
                        self.lib
                            .create_variable(&function_name, !data.is_local, self.ticket);
                    if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
                        vd.var_kind = VarKind::Field;
                    }
                    let predictive = self.lib.create_predictive_type(self.ticket);
                    if let Some(sym) = self.lib.get_mut(var) {
                        sym.resolved = Some(predictive);
                    }
                    owner = Some(var);
                }
            } else if let Some(previous) = owner.take() {
                let key = ValueData::String(function_name.clone());
                for member in self.lib.resolved_members(previous) {
                    let matched = self
                        .lib
                        .get(member)
                        .and_then(Symbol::var_data)
                        .is_some_and(|vd| {
                            vd.var_kind == VarKind::TableValue
                                && vd.index.as_ref().is_some_and(|ix| ix.matches(&key))
                        });
                    if matched {
                        owner = Some(member);
                    }
                }
                if let Some(found) = owner {
                    self.observe(found);
                }

                if owner.is_none() && !function_name.is_empty() {
                    let entry = self.lib.create_table_entry(self.ticket);
                    let predictive = self.lib.create_predictive_type(self.ticket);
                    if let Some(vd) = self.lib.get_mut(entry).and_then(Symbol::var_data_mut) {
                        vd.predictive = true;
                        vd.index = Some(key);
                    }
                    if let Some(sym) = self.lib.get_mut(entry) {
                        sym.parent = Some(previous);
                        sym.resolved = Some(predictive);
                    }
                    if let Some(prev_sym) = self.lib.get_mut(previous) {
                        prev_sym.members.push(entry);
                    }
                    owner = Some(entry);
                }
            }
        }

        if let Some(owner) = owner {
            // The terminal segment becomes a table entry on the owner's
            // shape, carrying the function.
            let entry = self.lib.create_table_entry(self.ticket);
            if let Some(vd) = self.lib.get_mut(entry).and_then(Symbol::var_data_mut) {
                vd.index = Some(ValueData::String(function_name.clone()));
                vd.value_kind = VarKind::Function;
            }
            if let Some(owner_type) = self.lib.resolved_type(owner) {
                if let Some(type_sym) = self.lib.get_mut(owner_type) {
                    type_sym.members.push(entry);
                }
            }

            if is_member {
                if let Some(vd) = self.lib.get_mut(entry).and_then(Symbol::var_data_mut) {
                    vd.value_kind = VarKind::Method;
                }

                let self_var = self.lib.create_variable("self", false, self.ticket);
                let owner_type = self.lib.resolved_type(owner);
                if let Some(sym) = self.lib.get_mut(self_var) {
                    sym.resolved = owner_type;
                }
                if let Some(entry_sym) = self.lib.get_mut(entry) {
                    entry_sym.members.push(self_var);
                }
                if let Some(body) = data.body {
                    if let NodeKind::Block { locals, .. } = &mut self.ast[body].kind {
                        locals.push(self_var);
                    }
                }
            }

            return entry;
        }

        let anonymous = function_name.is_empty();
        if anonymous {
            let n = self.lib.next_anonymous_function();
            function_name = format!("anonymous function #{n}");
        }

        let var = self.lib.create_variable(
            &function_name,
            !anonymous && !data.is_local,
            self.ticket,
        );
        if let Some(vd) = self.lib.get_mut(var).and_then(Symbol::var_data_mut) {
            vd.var_kind = VarKind::Function;
        }
        if data.is_local && !anonymous {
            self.attach_to_scope(var);
        }
        var
    }
}

fn parse_int(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).unwrap_or(0) as f64
    } else {
        text.parse::<u64>().unwrap_or(0) as f64
    }
}

/// Remove quotes or long-bracket delimiters from a string literal. The
/// closer's equals count may differ from the opener's.
fn strip_string_delimiters(raw: &str) -> String {
    let bytes = raw.as_bytes();
    match bytes.first() {
        Some(b'"') | Some(b'\'') if raw.len() >= 2 => raw[1..raw.len() - 1].to_string(),
        Some(b'[') => {
            let open = 2 + bytes[1..].iter().take_while(|b| **b == b'=').count();
            let mut close = 0;
            if bytes.last() == Some(&b']') {
                let mut i = bytes.len() - 1;
                close = 1;
                while i > 0 && bytes[i - 1] == b'=' {
                    close += 1;
                    i -= 1;
                }
                if i > 0 && bytes[i - 1] == b']' {
                    close += 1;
                }
            }
            if raw.len() >= open + close {
                raw[open..raw.len() - close].to_string()
            } else {
                String::new()
            }
        }
        _ => raw.to_string(),
    }
}
