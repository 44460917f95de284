// ==============================================================================
// Binding Enumeration and Search
// ==============================================================================
//
// Candidate bindings for a type variable come from its concrete bounds and
// from literal-protocol defaults. When none of them admits a solution, the
// search widens: alternative literal types after the first round only,
// then direct supertypes of everything tried so far. Termination comes
// from deduplicating by canonical type — every round must produce a type
// not yet explored.

use log::debug;
use rustc_hash::FxHashSet;
use tern_ty::{Ty, TyRef, TyVarId};

use crate::classify::TypeVariableConstraints;
use crate::constraint::{ConstraintKind, Locator};
use crate::solution::Solution;
use crate::{ConstraintSystem, FreeTypeVariableBinding};

/// Candidate bindings for one type variable, plus the flags the variable-
/// selection heuristic ranks by.
#[derive(Debug, Default)]
pub(crate) struct PotentialBindings {
    /// `(type, open)` — when `open`, the type is a generic literal default
    /// that must be opened with fresh variables before binding.
    pub bindings: Vec<(TyRef, bool)>,
    pub fully_bound: bool,
    pub involves_type_variables: bool,
    pub has_literal_bindings: bool,
}

impl PotentialBindings {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn ranking(&self) -> (bool, bool, bool, i64) {
        (
            self.fully_bound,
            self.involves_type_variables,
            self.has_literal_bindings,
            -(self.bindings.len() as i64),
        )
    }

    /// Lexicographic preference: definite bindings first, then fewer
    /// entanglements, then non-literal, then more candidates.
    pub fn better_than(&self, other: &PotentialBindings) -> bool {
        self.ranking() < other.ranking()
    }
}

impl ConstraintSystem {
    /// Check whether `ty` may be bound to `var`, returning the simplified
    /// type to bind. Refuses self-referential bindings and types whose
    /// rvalue is a bare variable (no structure to commit to).
    pub(crate) fn check_type_of_binding(&self, var: TyVarId, ty: &TyRef) -> Option<TyRef> {
        let ty = self.storage.simplify_ty(ty);
        let rep = self.storage.representative(var);
        let mut vars = Vec::new();
        ty.type_variables(&mut vars);
        if vars.iter().any(|&v| self.storage.representative(v) == rep) {
            return None;
        }
        if ty.rvalue().as_var().is_some() {
            return None;
        }
        Some(ty)
    }

    pub(crate) fn get_potential_bindings(
        &self,
        tvc: &TypeVariableConstraints,
    ) -> PotentialBindings {
        let mut result = PotentialBindings {
            bindings: Vec::new(),
            fully_bound: tvc.fully_bound,
            involves_type_variables: tvc.has_non_concrete_constraints,
            has_literal_bindings: false,
        };
        let mut exact_types: FxHashSet<TyRef> = FxHashSet::default();

        for (_, ty) in &tvc.below {
            let Some(bound) = self.check_type_of_binding(tvc.var, ty) else {
                result.involves_type_variables = true;
                continue;
            };
            if bound.has_type_variable() {
                result.involves_type_variables = true;
            }
            if exact_types.insert(bound.clone()) {
                result.bindings.push((bound, false));
            }
        }

        for (cid, ty) in &tvc.above {
            let Some(mut bound) = self.check_type_of_binding(tvc.var, ty) else {
                result.involves_type_variables = true;
                continue;
            };
            if bound.has_type_variable() {
                result.involves_type_variables = true;
            }
            // A conversion into a one-element tuple really bounds the
            // variable by the element type.
            if matches!(
                self.arena.node(*cid).kind,
                ConstraintKind::Conversion(..)
                    | ConstraintKind::Subtype(..)
                    | ConstraintKind::TrivialSubtype(..)
            ) {
                if let Ty::Tuple(t) = &*bound {
                    if let Some(elem) = t.single_scalar_element() {
                        bound = elem.ty.clone();
                    }
                }
            }
            if exact_types.insert(bound.clone()) {
                result.bindings.push((bound, false));
            }
        }

        // Literal protocols contribute their default type.
        for &cid in &tvc.conforms_to {
            let Some(protocol) = self.arena.node(cid).kind.protocol() else {
                continue;
            };
            let Some(default) = self.table.default_literal_type(protocol) else {
                continue;
            };
            if !default.is_unspecialized_generic() {
                if exact_types.insert(default.clone()) {
                    result.has_literal_bindings = true;
                    result.bindings.push((default.clone(), true));
                }
                continue;
            }
            // An unspecialized generic default only counts if no existing
            // candidate already specializes the same nominal.
            let head = default.nominal_head();
            let matched = exact_types
                .iter()
                .any(|t| t.nominal_head().is_some() && t.nominal_head() == head);
            if !matched {
                result.has_literal_bindings = true;
                exact_types.insert(default.clone());
                result.bindings.push((default.clone(), true));
            }
        }

        result
    }

    /// Direct supertypes of a concrete type, for the widening rounds.
    pub(crate) fn enumerate_direct_supertypes(&self, ty: &TyRef) -> Vec<TyRef> {
        let mut result = Vec::new();

        if let Ty::Tuple(t) = &**ty {
            // A tuple constructible from a scalar has that scalar type as
            // a supertype. An unlabelled scalar element adds nothing.
            if let Some(idx) = t.field_for_scalar_init() {
                let elem = &t.elems[idx];
                if elem.variadic || elem.label.is_some() {
                    result.push(elem.ty.clone());
                }
            }
        }

        if let Ty::Fn(f) = &**ty {
            // An auto-closure thunk can be viewed as a scalar of its
            // result type.
            if f.auto_closure {
                result.push(f.result.clone());
            }
        }

        if ty.may_have_superclass() {
            if let Some(superclass) = self.table.superclass_of(ty) {
                result.push(superclass);
            }
        }

        if let Ty::LValue(lv) = &**ty {
            if lv.implicit {
                result.push(lv.object.clone());
            }
        }

        result
    }

    /// Instantiate an unspecialized generic with fresh type variables.
    pub(crate) fn open_binding_type(&mut self, ty: &TyRef) -> TyRef {
        let Some(nominal) = ty.as_nominal() else {
            return ty.clone();
        };
        if !nominal.is_unspecialized() {
            return ty.clone();
        }
        let mut opened = nominal.clone();
        opened.args = (0..nominal.generic_params)
            .map(|_| Ty::var(self.new_type_variable(false)))
            .collect();
        Ty::Nominal(opened).into()
    }

    /// Try each candidate binding for `tvc.var` in turn, widening through
    /// alternative literal types and supertypes when a round comes up
    /// empty. Returns whether any binding admitted a solution.
    pub(crate) fn try_type_variable_bindings(
        &mut self,
        tvc: &TypeVariableConstraints,
        initial: Vec<(TyRef, bool)>,
        solutions: &mut Vec<Solution>,
        allow_free: FreeTypeVariableBinding,
    ) -> bool {
        let type_var = tvc.var;
        let mut any_solved = false;
        let mut explored: FxHashSet<TyRef> = FxHashSet::default();

        self.state.as_mut().unwrap().stats.num_type_variables_bound += 1;

        let mut bindings = initial;
        let mut try_count = 0u32;
        while !any_solved && !bindings.is_empty() {
            self.state.as_mut().unwrap().stats.num_type_variable_bindings += 1;
            let mut saw_first_literal = false;
            for (ty, open) in &bindings {
                let mut ty = ty.clone();
                if !self.storage.can_bind_to_lvalue(type_var) {
                    ty = ty.rvalue();
                }
                if self.debug_enabled() {
                    debug!(
                        "{:indent$}(trying ${} := {ty})",
                        "",
                        type_var.0,
                        indent = self.depth() * 2
                    );
                }

                let scope = self.begin_scope();
                if *open {
                    // Defaults only matter when nothing else worked: once a
                    // non-literal candidate solved this round, stop at the
                    // first literal one.
                    if !saw_first_literal {
                        saw_first_literal = true;
                        if any_solved {
                            self.rollback_scope(scope);
                            break;
                        }
                    }
                    ty = self.open_binding_type(&ty);
                }

                let bind = self.mk_constraint(
                    ConstraintKind::Bind(Ty::var(type_var), ty),
                    Locator::default(),
                );
                self.attach_active(bind, true);
                if self.solve_rec(solutions, allow_free) {
                    any_solved = true;
                }
                self.rollback_scope(scope);
            }

            if any_solved {
                break;
            }

            let mut new_bindings: Vec<(TyRef, bool)> = Vec::new();

            if try_count == 0 {
                for (ty, _) in &bindings {
                    explored.insert(ty.clone());
                }
                // First miss: alternative literal types for each literal
                // protocol. Later rounds never revisit these.
                for &cid in &tvc.conforms_to {
                    let Some(protocol) = self.arena.node(cid).kind.protocol() else {
                        continue;
                    };
                    if self.table.default_literal_type(protocol).is_none() {
                        continue;
                    }
                    for alt in self.table.alternative_literal_types(protocol) {
                        if explored.insert(alt.clone()) {
                            new_bindings.push((alt.clone(), true));
                        }
                    }
                }
                if !new_bindings.is_empty() {
                    bindings = new_bindings;
                    try_count += 1;
                    continue;
                }
            }

            // Widen every tried type to its direct supertypes.
            for (ty, _) in &bindings {
                for supertype in self.enumerate_direct_supertypes(ty) {
                    let Some(simplified) = self.check_type_of_binding(type_var, &supertype)
                    else {
                        continue;
                    };
                    if explored.insert(simplified.clone()) {
                        new_bindings.push((simplified, false));
                    }
                }
            }

            if new_bindings.is_empty() {
                break;
            }
            bindings = new_bindings;
            try_count += 1;
        }

        any_solved
    }
}
