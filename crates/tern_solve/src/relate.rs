// ==============================================================================
// Constraint Simplification
// ==============================================================================
//
// Reduces a single constraint against the current substitution. All side
// effects are confined to the substitution store (with its journal), the
// restriction journal, the score, the resolved-overloads stack, and
// dependent re-activation through the constraint graph. `Unsolved` means
// the constraint cannot be decided yet and stays active; binding a
// variable later re-activates it.

use tern_ty::{Ty, TyRef, TyVarId};

use crate::constraint::{ConstraintId, ConstraintKind, ConversionRestriction, Locator, Place};
use crate::score::ScoreKind;
use crate::solution::ResolvedOverload;
use crate::{ConstraintSystem, OverloadChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionKind {
    Error,
    Solved,
    Unsolved,
}

use SolutionKind::{Error, Solved, Unsolved};

/// Relational strength, weakest unification first. Each kind admits every
/// coercion of the kinds before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Relation {
    Equal,
    TrivialSubtype,
    Subtype,
    Conversion,
}

fn combine(a: SolutionKind, b: SolutionKind) -> SolutionKind {
    match (a, b) {
        (Error, _) | (_, Error) => Error,
        (Unsolved, _) | (_, Unsolved) => Unsolved,
        (Solved, Solved) => Solved,
    }
}

impl ConstraintSystem {
    pub(crate) fn simplify_constraint(&mut self, id: ConstraintId) -> SolutionKind {
        let node = self.arena.node(id);
        let kind = node.kind.clone();
        let restriction = node.restriction;
        let locator = node.locator.clone();

        match kind {
            ConstraintKind::Bind(a, b) | ConstraintKind::Equal(a, b) => {
                self.match_types(&a, &b, Relation::Equal, restriction)
            }
            ConstraintKind::TrivialSubtype(a, b) => {
                self.match_types(&a, &b, Relation::TrivialSubtype, restriction)
            }
            ConstraintKind::Subtype(a, b) => {
                self.match_types(&a, &b, Relation::Subtype, restriction)
            }
            ConstraintKind::Conversion(a, b) => {
                self.match_types(&a, &b, Relation::Conversion, restriction)
            }
            ConstraintKind::ApplicableFn(a, b) => self.simplify_applicable(&a, &b),
            ConstraintKind::Class(t) => self.simplify_class_property(&t),
            ConstraintKind::Materializable(t) => self.simplify_materializable(&t),
            ConstraintKind::ValueMember {
                base,
                member,
                member_ty,
            } => self.simplify_member(false, &base, &member, &member_ty),
            ConstraintKind::TypeMember {
                base,
                member,
                member_ty,
            } => self.simplify_member(true, &base, &member, &member_ty),
            ConstraintKind::ConformsTo(t, p) | ConstraintKind::SelfObjectOfProtocol(t, p) => {
                self.simplify_conformance(&t, &p)
            }
            ConstraintKind::BindOverload { ty, choice } => {
                self.simplify_bind_overload(&ty, choice, locator)
            }
            ConstraintKind::Conjunction(members) => self.simplify_conjunction(&members),
            // The driver branches on disjunctions; they never simplify.
            ConstraintKind::Disjunction(_) => Unsolved,
        }
    }

    // --------------------------------------------------------------------------
    // Core type matching
    // --------------------------------------------------------------------------

    fn match_types(
        &mut self,
        a: &TyRef,
        b: &TyRef,
        relation: Relation,
        carried: Option<ConversionRestriction>,
    ) -> SolutionKind {
        let a = self.storage.simplify_ty(a);
        let b = self.storage.simplify_ty(b);

        let a_var = a.as_var();
        let b_var = b.as_var();
        match (a_var, b_var) {
            (Some(x), Some(y)) => {
                let rx = self.storage.representative(x);
                let ry = self.storage.representative(y);
                if rx == ry {
                    return Solved;
                }
                if relation == Relation::Equal {
                    self.merge_equivalence_classes(rx, ry);
                    return Solved;
                }
                // A subtype relation between two unknowns carries no
                // information to act on yet; it classifies as a bound.
                Unsolved
            }
            (Some(v), None) => {
                if relation != Relation::Equal {
                    return Unsolved;
                }
                self.bind_type_variable(v, b)
            }
            (None, Some(v)) => {
                if relation != Relation::Equal {
                    return Unsolved;
                }
                self.bind_type_variable(v, a)
            }
            (None, None) => self.match_concrete(&a, &b, relation, carried),
        }
    }

    /// Bind `v := ty`, refusing self-referential bindings.
    fn bind_type_variable(&mut self, v: TyVarId, ty: TyRef) -> SolutionKind {
        let rep = self.storage.representative(v);
        let mut vars = Vec::new();
        ty.type_variables(&mut vars);
        if vars.iter().any(|&x| self.storage.representative(x) == rep) {
            return Error;
        }
        self.assign_fixed(rep, ty, true);
        Solved
    }

    /// Fix a variable's type. With `update_score` the binding also
    /// re-activates dependent constraints and participates in score
    /// accounting; solution replay passes `false` so composing partial
    /// solutions neither re-enqueues work nor double-counts.
    pub(crate) fn assign_fixed(&mut self, v: TyVarId, ty: TyRef, update_score: bool) {
        let rep = self.storage.representative(v);
        self.storage.assign_fixed(rep, ty);
        if update_score {
            self.activate_dependents(rep);
        }
    }

    pub(crate) fn merge_equivalence_classes(&mut self, a: TyVarId, b: TyVarId) {
        let Some((kept, gone)) = self.storage.merge_classes(a, b) else {
            return;
        };
        if let Some(graph) = &mut self.graph {
            graph.merge_class(kept, gone);
        }
        self.activate_dependents(kept);
    }

    fn activate_dependents(&mut self, rep: TyVarId) {
        if self.graph.is_none() {
            return;
        }
        let dependents: Vec<ConstraintId> = self
            .graph
            .as_ref()
            .unwrap()
            .constraints_on(rep)
            .to_vec();
        for id in dependents {
            if self.arena.node(id).place == Place::Active {
                self.activate_constraint(id);
            }
        }
    }

    pub(crate) fn increase_score(&mut self, kind: ScoreKind) {
        self.current_score += crate::score::Score::unit(kind);
    }

    pub(crate) fn record_restriction(
        &mut self,
        a: &TyRef,
        b: &TyRef,
        restriction: ConversionRestriction,
    ) {
        if let Some(state) = self.state.as_mut() {
            state
                .restrictions
                .push((a.clone(), b.clone(), restriction));
        }
    }

    // --------------------------------------------------------------------------
    // Concrete-to-concrete matching
    // --------------------------------------------------------------------------

    fn match_concrete(
        &mut self,
        a: &TyRef,
        b: &TyRef,
        relation: Relation,
        carried: Option<ConversionRestriction>,
    ) -> SolutionKind {
        // An alternative minted with an explicit restriction commits to
        // that coercion path; nothing else is attempted.
        if let Some(restriction) = carried {
            return self.apply_restriction(restriction, a, b, relation);
        }

        match (&**a, &**b) {
            // L-values are invariant in their object type.
            (Ty::LValue(l1), Ty::LValue(l2)) => {
                self.match_types(&l1.object, &l2.object, Relation::Equal, None)
            }
            // Nothing converts *into* an l-value.
            (_, Ty::LValue(_)) => Error,
            (Ty::LValue(_), _) if relation >= Relation::TrivialSubtype => {
                self.match_lvalue_decay(a, b, relation)
            }
            (Ty::LValue(_), _) => Error,

            (Ty::Fn(_), Ty::Fn(_)) => self.match_functions(a, b, relation),
            // A scalar converts to an auto-closure thunk of its type.
            (_, Ty::Fn(f2)) if f2.auto_closure && relation == Relation::Conversion => {
                self.match_types(a, &f2.result, Relation::Conversion, None)
            }

            (Ty::Tuple(_), Ty::Tuple(_)) => self.match_tuples(a, b, relation),
            (_, Ty::Tuple(_)) if relation == Relation::Conversion => {
                self.match_scalar_to_tuple(a, b)
            }

            (Ty::Nominal(_), Ty::Nominal(_)) => self.match_nominals(a, b, relation),
            // Non-nominal sources still convert into an optional.
            (_, Ty::Nominal(_))
                if b.as_optional().is_some() && relation >= Relation::Subtype =>
            {
                self.match_value_to_optional(a, b, relation)
            }

            (Ty::GenericParam(i), Ty::GenericParam(j)) if i == j => Solved,

            _ => Error,
        }
    }

    fn apply_restriction(
        &mut self,
        restriction: ConversionRestriction,
        a: &TyRef,
        b: &TyRef,
        relation: Relation,
    ) -> SolutionKind {
        match restriction {
            ConversionRestriction::DeepEquality => self.match_deep_equality(a, b),
            ConversionRestriction::Superclass => self.match_superclass(a, b),
            ConversionRestriction::LValueToRValue => self.match_lvalue_decay(a, b, relation),
            ConversionRestriction::TupleToTuple => self.match_tuples(a, b, relation.max(Relation::Subtype)),
            ConversionRestriction::ScalarToTuple => self.match_scalar_to_tuple(a, b),
            ConversionRestriction::ValueToOptional => self.match_value_to_optional(a, b, relation),
            ConversionRestriction::OptionalToOptional => {
                self.match_optional_to_optional(a, b, relation)
            }
        }
    }

    fn match_lvalue_decay(&mut self, a: &TyRef, b: &TyRef, relation: Relation) -> SolutionKind {
        let Ty::LValue(l1) = &**a else { return Error };
        if !l1.implicit {
            return Error;
        }
        let object = l1.object.clone();
        let result = self.match_types(&object, b, relation, None);
        if result == Solved {
            self.record_restriction(a, b, ConversionRestriction::LValueToRValue);
        }
        result
    }

    fn match_functions(&mut self, a: &TyRef, b: &TyRef, relation: Relation) -> SolutionKind {
        let (Ty::Fn(f1), Ty::Fn(f2)) = (&**a, &**b) else {
            return Error;
        };
        if f1.auto_closure != f2.auto_closure {
            return Error;
        }
        let (f1, f2) = (f1.clone(), f2.clone());
        let result = if relation == Relation::Equal {
            combine(
                self.match_types(&f1.param, &f2.param, Relation::Equal, None),
                self.match_types(&f1.result, &f2.result, Relation::Equal, None),
            )
        } else {
            // Parameters are contravariant, results covariant.
            combine(
                self.match_types(&f2.param, &f1.param, Relation::Subtype, None),
                self.match_types(&f1.result, &f2.result, Relation::Subtype, None),
            )
        };
        result
    }

    fn match_tuples(&mut self, a: &TyRef, b: &TyRef, relation: Relation) -> SolutionKind {
        let (Ty::Tuple(t1), Ty::Tuple(t2)) = (&**a, &**b) else {
            return Error;
        };
        if t1.elems.len() != t2.elems.len() {
            return Error;
        }
        let (t1, t2) = (t1.clone(), t2.clone());
        let mut result = Solved;
        for (e1, e2) in t1.elems.iter().zip(&t2.elems) {
            if e1.label != e2.label || e1.variadic != e2.variadic {
                return Error;
            }
            result = combine(result, self.match_types(&e1.ty, &e2.ty, relation, None));
            if result == Error {
                return Error;
            }
        }
        if result == Solved && relation > Relation::Equal {
            self.record_restriction(a, b, ConversionRestriction::TupleToTuple);
        }
        result
    }

    fn match_scalar_to_tuple(&mut self, a: &TyRef, b: &TyRef) -> SolutionKind {
        let Ty::Tuple(t2) = &**b else { return Error };
        let Some(idx) = t2.field_for_scalar_init() else {
            return Error;
        };
        let elem_ty = t2.elems[idx].ty.clone();
        let result = self.match_types(a, &elem_ty, Relation::Conversion, None);
        if result == Solved {
            self.record_restriction(a, b, ConversionRestriction::ScalarToTuple);
        }
        result
    }

    fn match_value_to_optional(
        &mut self,
        a: &TyRef,
        b: &TyRef,
        relation: Relation,
    ) -> SolutionKind {
        let Some(inner) = b.as_optional().cloned() else {
            return Error;
        };
        let result = self.match_types(a, &inner, relation.max(Relation::Subtype), None);
        if result == Solved {
            self.record_restriction(a, b, ConversionRestriction::ValueToOptional);
            self.increase_score(ScoreKind::ValueToOptional);
        }
        result
    }

    fn match_optional_to_optional(
        &mut self,
        a: &TyRef,
        b: &TyRef,
        relation: Relation,
    ) -> SolutionKind {
        let (Some(inner_a), Some(inner_b)) = (a.as_optional().cloned(), b.as_optional().cloned())
        else {
            return Error;
        };
        let result = self.match_types(&inner_a, &inner_b, relation.max(Relation::Subtype), None);
        if result == Solved {
            self.record_restriction(a, b, ConversionRestriction::OptionalToOptional);
        }
        result
    }

    /// Same nominal head: generic arguments are invariant.
    fn match_deep_equality(&mut self, a: &TyRef, b: &TyRef) -> SolutionKind {
        let (Some(n1), Some(n2)) = (a.as_nominal(), b.as_nominal()) else {
            return Error;
        };
        if n1.name != n2.name || n1.args.len() != n2.args.len() {
            return Error;
        }
        let (n1, n2) = (n1.clone(), n2.clone());
        let mut result = Solved;
        for (arg1, arg2) in n1.args.iter().zip(&n2.args) {
            result = combine(result, self.match_types(arg1, arg2, Relation::Equal, None));
            if result == Error {
                return Error;
            }
        }
        result
    }

    /// Walk `a`'s superclass chain looking for `b`.
    fn match_superclass(&mut self, a: &TyRef, b: &TyRef) -> SolutionKind {
        let mut current = a.clone();
        while let Some(superclass) = self.table.superclass_of(&current) {
            if superclass == *b {
                self.record_restriction(a, b, ConversionRestriction::Superclass);
                return Solved;
            }
            current = superclass;
        }
        Error
    }

    fn match_nominals(&mut self, a: &TyRef, b: &TyRef, relation: Relation) -> SolutionKind {
        let (Some(n1), Some(n2)) = (a.as_nominal(), b.as_nominal()) else {
            return Error;
        };

        // Optional coercions first: they apply even when the heads differ,
        // and Optional-to-Optional is looser than invariant generics.
        if relation >= Relation::Subtype {
            if b.as_optional().is_some() {
                if a.as_optional().is_some() && n1.name != n2.name {
                    return Error;
                }
                if a.as_optional().is_some() {
                    return self.match_optional_to_optional(a, b, relation);
                }
                return self.match_value_to_optional(a, b, relation);
            }
        }

        if n1.name == n2.name {
            let generic = !n1.args.is_empty();
            let result = self.match_deep_equality(a, b);
            if result == Solved && generic && relation > Relation::Equal {
                self.record_restriction(a, b, ConversionRestriction::DeepEquality);
            }
            return result;
        }

        // Different heads: only a superclass walk can help.
        if relation >= Relation::TrivialSubtype && a.may_have_superclass() {
            return self.match_superclass(a, b);
        }
        Error
    }

    // --------------------------------------------------------------------------
    // Non-relational constraint kinds
    // --------------------------------------------------------------------------

    fn simplify_applicable(&mut self, a: &TyRef, b: &TyRef) -> SolutionKind {
        let callee = self.storage.simplify_ty(b).rvalue();
        if callee.as_var().is_some() {
            return Unsolved;
        }
        let Ty::Fn(f2) = &*callee else { return Error };
        let call_site = self.storage.simplify_ty(a);
        if call_site.as_var().is_some() {
            return Unsolved;
        }
        let Ty::Fn(f1) = &*call_site else {
            return Error;
        };
        let (f1, f2) = (f1.clone(), f2.clone());
        // Arguments convert to parameters; the call's result is exactly
        // the callee's.
        let args = self.match_types(&f1.param, &f2.param, Relation::Conversion, None);
        if args == Error {
            return Error;
        }
        combine(
            args,
            self.match_types(&f2.result, &f1.result, Relation::Equal, None),
        )
    }

    fn simplify_class_property(&mut self, t: &TyRef) -> SolutionKind {
        let t = self.storage.simplify_ty(t).rvalue();
        if t.as_var().is_some() {
            return Unsolved;
        }
        if t.may_have_superclass() {
            Solved
        } else {
            Error
        }
    }

    fn simplify_materializable(&mut self, t: &TyRef) -> SolutionKind {
        let t = self.storage.simplify_ty(t);
        match &*t {
            Ty::Var(_) => Unsolved,
            Ty::LValue(_) => Error,
            _ => Solved,
        }
    }

    fn simplify_member(
        &mut self,
        type_member: bool,
        base: &TyRef,
        member: &smol_str::SmolStr,
        member_ty: &TyRef,
    ) -> SolutionKind {
        let base = self.storage.simplify_ty(base).rvalue();
        if base.as_var().is_some() {
            return Unsolved;
        }
        let found = if type_member {
            self.table.type_member(&base, member)
        } else {
            self.table.value_member(&base, member)
        };
        match found.cloned() {
            Some(ty) => self.match_types(member_ty, &ty, Relation::Equal, None),
            None => Error,
        }
    }

    fn simplify_conformance(&mut self, t: &TyRef, protocol: &tern_ty::ProtocolId) -> SolutionKind {
        let t = self.storage.simplify_ty(t).rvalue();
        if t.as_var().is_some() {
            return Unsolved;
        }
        // Conformance is a property of the nominal head; unresolved
        // generic arguments don't block the lookup.
        if self.table.conforms(&t, protocol) {
            Solved
        } else {
            Error
        }
    }

    fn simplify_bind_overload(
        &mut self,
        ty: &TyRef,
        choice: OverloadChoice,
        locator: Locator,
    ) -> SolutionKind {
        let opened_full_ty = choice.ty.clone();
        let opened_ty = self.open_binding_type(&choice.ty);
        self.resolved_overloads.push(ResolvedOverload {
            locator,
            choice,
            opened_full_ty,
            opened_ty: opened_ty.clone(),
        });
        self.match_types(ty, &opened_ty, Relation::Equal, None)
    }

    /// Conjunctions only reach the simplifier as disjunction alternatives;
    /// breaking one apart pushes its undecided members into circulation as
    /// independent constraints.
    fn simplify_conjunction(&mut self, members: &[ConstraintId]) -> SolutionKind {
        for &member in members {
            match self.simplify_constraint(member) {
                Error => return Error,
                Solved => {}
                Unsolved => self.attach_active(member, false),
            }
        }
        Solved
    }
}
