use tern_ty::{ty, ProtocolId, Ty, TyRef, TupleElem, TyVarId};

use crate::constraint::Place;
use crate::solution::ResolvedOverload;
use crate::solve::SolverState;
use crate::{
    ConstraintId, ConstraintKind, ConstraintSystem, ConversionRestriction, FreeTypeVariableBinding,
    Locator, OverloadChoice, PathElem, Score, ScoreKind, SolveError, Solution, SolverOptions,
};

fn int() -> TyRef {
    ty!(Int)
}

fn double() -> TyRef {
    ty!(Double)
}

fn string() -> TyRef {
    ty!(String)
}

fn integer_literal() -> ProtocolId {
    ProtocolId::new("IntegerLiteral")
}

fn array_literal() -> ProtocolId {
    ProtocolId::new("ArrayLiteral")
}

fn equatable() -> ProtocolId {
    ProtocolId::new("Equatable")
}

/// A small standard library: numeric types with literal defaults, a
/// class pair, a member on the superclass only.
pub(crate) fn std_table() -> crate::TypeTable {
    let mut table = crate::TypeTable::new();
    table.add_conformance("Int", integer_literal());
    table.add_conformance("Double", integer_literal());
    table.set_default_literal(integer_literal(), int());
    table.add_alternative_literals(integer_literal(), vec![int(), double()]);

    table.add_conformance("Array", array_literal());
    table.set_default_literal(array_literal(), Ty::generic("Array", 1));

    table.set_superclass("Derived", Ty::class("Base"));
    table.add_value_member("Base", "speak", string());
    table
}

fn system() -> ConstraintSystem {
    ConstraintSystem::new(std_table())
}

fn system_no_graph() -> ConstraintSystem {
    ConstraintSystem::with_options(
        std_table(),
        SolverOptions {
            enable_constraint_graph: false,
            ..SolverOptions::default()
        },
    )
}

#[track_caller]
fn expect_unique_binding(solution: &Solution, var: TyVarId, expected: TyRef) {
    assert_eq!(solution.type_bindings.get(&var), Some(&expected));
}

// ==============================================================================
// End-to-end scenarios
// ==============================================================================

#[test]
fn simple_lower_bound() {
    for mut cs in [system(), system_no_graph()] {
        let v0 = cs.new_type_variable(false);
        cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));

        let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
        expect_unique_binding(&solution, v0, int());
        assert!(solution.score.is_zero());
    }
}

#[test]
fn literal_default_binds_int() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v0), integer_literal()),
        Locator::at(0),
    );

    // The enumerator reports the candidate as a literal binding.
    let (summaries, _) = cs.collect_constraints_for_type_variables();
    let bindings = cs.get_potential_bindings(&summaries[0]);
    assert!(bindings.has_literal_bindings);
    assert_eq!(bindings.bindings, vec![(int(), true)]);

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, int());
}

#[test]
fn independent_components_compose() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));
    cs.add_constraint(ConstraintKind::Subtype(string(), Ty::var(v1)), Locator::at(1));

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, int());
    expect_unique_binding(&solution, v1, string());
    assert!(solution.score.is_zero());
}

#[test]
fn disjunction_picks_viable_alternative() {
    for mut cs in [system(), system_no_graph()] {
        let v0 = cs.new_type_variable(false);
        let to_int = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), int()), Locator::at(1));
        let to_double =
            cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), double()), Locator::at(2));
        cs.add_disjunction(vec![to_int, to_double], Locator::at(0));
        cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(3));

        let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
        expect_unique_binding(&solution, v0, int());
    }
}

#[test]
fn supertype_fallback_finds_superclass() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::Subtype(Ty::class("Derived"), Ty::var(v0)),
        Locator::at(0),
    );
    cs.add_constraint(
        ConstraintKind::ValueMember {
            base: Ty::var(v0),
            member: "speak".into(),
            member_ty: Ty::var(v1),
        },
        Locator::at(1),
    );

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, Ty::class("Base"));
    expect_unique_binding(&solution, v1, string());
    assert_eq!(
        solution
            .restrictions
            .get(&(Ty::class("Derived"), Ty::class("Base"))),
        Some(&ConversionRestriction::Superclass)
    );
}

#[test]
fn equal_overloads_are_ambiguous() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let f = cs.mk_constraint(
        ConstraintKind::BindOverload {
            ty: Ty::var(v0),
            choice: OverloadChoice::new("f", int()),
        },
        Locator::at(7),
    );
    let g = cs.mk_constraint(
        ConstraintKind::BindOverload {
            ty: Ty::var(v0),
            choice: OverloadChoice::new("g", double()),
        },
        Locator::at(7),
    );
    cs.add_disjunction(vec![f, g], Locator::at(7));

    let err = cs.solve(FreeTypeVariableBinding::Disallow).unwrap_err();
    let SolveError::Ambiguous { candidates } = err else {
        panic!("expected ambiguity, got {err:?}");
    };
    assert_eq!(candidates.len(), 2);
    let bound: Vec<&TyRef> = candidates
        .iter()
        .map(|s| s.type_bindings.get(&v0).unwrap())
        .collect();
    assert!(bound.contains(&&int()) && bound.contains(&&double()));
    // Each candidate remembers which overload it took.
    for candidate in &candidates {
        let selection = candidate.overload_choices.get(&Locator::at(7)).unwrap();
        assert!(matches!(selection.choice.name.as_str(), "f" | "g"));
    }
}

// ==============================================================================
// Scoring, ranking, pruning
// ==============================================================================

#[test]
fn conversion_scoring_and_restrictions() {
    let mut cs = system();
    cs.add_constraint(
        ConstraintKind::Conversion(int(), Ty::optional(int())),
        Locator::at(0),
    );

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    assert_eq!(solution.score, Score::unit(ScoreKind::ValueToOptional));
    assert_eq!(
        solution.restrictions.get(&(int(), Ty::optional(int()))),
        Some(&ConversionRestriction::ValueToOptional)
    );
}

#[test]
fn ranking_prefers_cheaper_solution() {
    // Either alternative solves, but one costs a value-to-optional
    // conversion; the zero-score solution must win regardless of order.
    for flipped in [false, true] {
        let mut cs = system();
        let costly = cs.mk_constraint(
            ConstraintKind::Conversion(int(), Ty::optional(int())),
            Locator::at(1),
        );
        let free = cs.mk_constraint(ConstraintKind::Equal(int(), int()), Locator::at(2));
        let alternatives = if flipped {
            vec![costly, free]
        } else {
            vec![free, costly]
        };
        cs.add_disjunction(alternatives, Locator::at(0));

        let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
        assert!(solution.score.is_zero());
    }
}

// ==============================================================================
// Free type variables
// ==============================================================================

#[test]
fn free_variable_handling_per_mode() {
    // A conformance to a protocol without a default literal type gives
    // the variable no binding candidates; only free-variable relaxation
    // can accept the residue.
    let build = || {
        let mut cs = system();
        let v0 = cs.new_type_variable(false);
        cs.add_constraint(
            ConstraintKind::ConformsTo(Ty::var(v0), equatable()),
            Locator::at(0),
        );
        (cs, v0)
    };

    let (mut cs, _) = build();
    assert_eq!(
        cs.solve(FreeTypeVariableBinding::Disallow),
        Err(SolveError::NoSolution)
    );

    let (mut cs, v0) = build();
    let solution = cs.solve(FreeTypeVariableBinding::Allow).unwrap();
    expect_unique_binding(&solution, v0, Ty::var(v0));

    let (mut cs, v0) = build();
    let solution = cs.solve(FreeTypeVariableBinding::GenericParameters).unwrap();
    expect_unique_binding(&solution, v0, Ty::GenericParam(0).into());
}

#[test]
fn generic_literal_default_opens() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v0), array_literal()),
        Locator::at(0),
    );

    let solution = cs.solve(FreeTypeVariableBinding::GenericParameters).unwrap();
    let bound = solution.type_bindings.get(&v0).unwrap();
    let nominal = bound.as_nominal().expect("array binding");
    assert_eq!(nominal.name, "Array");
    assert_eq!(nominal.args, vec![TyRef::from(Ty::GenericParam(0))]);
}

// ==============================================================================
// Binding enumeration
// ==============================================================================

#[test]
fn enumerator_unwraps_single_element_tuple_bound() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::Conversion(
            Ty::var(v0),
            Ty::tuple(vec![TupleElem::labelled("x", int())]),
        ),
        Locator::at(0),
    );

    let (summaries, _) = cs.collect_constraints_for_type_variables();
    let bindings = cs.get_potential_bindings(&summaries[0]);
    assert_eq!(bindings.bindings, vec![(int(), false)]);
}

#[test]
fn enumerator_dedups_by_canonical_type() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(1));
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v0), integer_literal()),
        Locator::at(2),
    );

    let (summaries, _) = cs.collect_constraints_for_type_variables();
    let bindings = cs.get_potential_bindings(&summaries[0]);
    // Two identical lower bounds collapse; the literal default Int is
    // already covered, so no literal candidate appears.
    assert_eq!(bindings.bindings, vec![(int(), false)]);
    assert!(!bindings.has_literal_bindings);
}

#[test]
fn unspecialized_generic_default_skipped_when_specialized_exists() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::Subtype(Ty::applied("Array", vec![int()]), Ty::var(v0)),
        Locator::at(0),
    );
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v0), array_literal()),
        Locator::at(1),
    );

    let (summaries, _) = cs.collect_constraints_for_type_variables();
    let bindings = cs.get_potential_bindings(&summaries[0]);
    assert_eq!(
        bindings.bindings,
        vec![(Ty::applied("Array", vec![int()]), false)]
    );
    assert!(!bindings.has_literal_bindings);
}

#[test]
fn direct_supertype_enumeration() {
    let cs = system();

    let labelled = Ty::tuple(vec![TupleElem::labelled("x", int())]);
    assert_eq!(cs.enumerate_direct_supertypes(&labelled), vec![int()]);

    let varargs = Ty::tuple(vec![TupleElem::variadic(int())]);
    assert_eq!(cs.enumerate_direct_supertypes(&varargs), vec![int()]);

    // An unlabelled scalar element yields nothing.
    let plain = Ty::tuple(vec![TupleElem::unlabelled(int())]);
    assert!(cs.enumerate_direct_supertypes(&plain).is_empty());

    let thunk = Ty::auto_closure(Ty::tuple(vec![]), int());
    assert_eq!(cs.enumerate_direct_supertypes(&thunk), vec![int()]);

    assert_eq!(
        cs.enumerate_direct_supertypes(&Ty::class("Derived")),
        vec![Ty::class("Base")]
    );
    assert!(cs.enumerate_direct_supertypes(&Ty::class("Base")).is_empty());

    let lv = Ty::lvalue(int());
    assert_eq!(cs.enumerate_direct_supertypes(&lv), vec![int()]);
}

#[test]
fn binding_check_refusals() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);

    // Self-reference, directly or inside structure.
    assert_eq!(cs.check_type_of_binding(v0, &Ty::var(v0)), None);
    assert_eq!(
        cs.check_type_of_binding(v0, &Ty::optional(Ty::var(v0))),
        None
    );
    // A bare variable (even behind an l-value) has no structure to commit to.
    assert_eq!(cs.check_type_of_binding(v0, &Ty::var(v1)), None);
    assert_eq!(cs.check_type_of_binding(v0, &Ty::lvalue(Ty::var(v1))), None);
    // Structure containing other variables is fine.
    assert_eq!(
        cs.check_type_of_binding(v0, &Ty::optional(Ty::var(v1))),
        Some(Ty::optional(Ty::var(v1)))
    );
}

#[test]
fn lvalue_bound_decays_for_rvalue_variable() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::Subtype(Ty::lvalue(int()), Ty::var(v0)),
        Locator::at(0),
    );

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, int());
    assert_eq!(
        solution.restrictions.get(&(Ty::lvalue(int()), int())),
        Some(&ConversionRestriction::LValueToRValue)
    );
}

// ==============================================================================
// Disjunction short-circuits
// ==============================================================================

#[test]
fn tuple_to_tuple_success_stops_enumeration() {
    let mut cs = system();
    let pair = Ty::tuple(vec![TupleElem::labelled("x", int())]);
    let first = cs.mk_restricted(
        ConstraintKind::Conversion(pair.clone(), pair.clone()),
        ConversionRestriction::TupleToTuple,
        Locator::at(1),
    );
    // Were this alternative also tried, two equal solutions would make
    // the system ambiguous.
    let second = cs.mk_constraint(ConstraintKind::Equal(int(), int()), Locator::at(2));
    cs.add_disjunction(vec![first, second], Locator::at(0));

    assert!(cs.solve(FreeTypeVariableBinding::Disallow).is_ok());
}

#[test]
fn optional_to_optional_skipped_after_success() {
    let mut cs = system();
    let first = cs.mk_constraint(ConstraintKind::Equal(int(), int()), Locator::at(1));
    let second = cs.mk_restricted(
        ConstraintKind::Conversion(Ty::optional(int()), Ty::optional(int())),
        ConversionRestriction::OptionalToOptional,
        Locator::at(2),
    );
    cs.add_disjunction(vec![first, second], Locator::at(0));

    assert!(cs.solve(FreeTypeVariableBinding::Disallow).is_ok());
}

#[test]
fn interpolation_argument_conversion_stops_enumeration() {
    let mut cs = system();
    let first = cs.mk_constraint(ConstraintKind::Conversion(int(), int()), Locator::at(1));
    let second = cs.mk_constraint(ConstraintKind::Equal(int(), int()), Locator::at(2));
    cs.add_disjunction(
        vec![first, second],
        Locator::at(0).with(PathElem::InterpolationArgument),
    );

    assert!(cs.solve(FreeTypeVariableBinding::Disallow).is_ok());
}

#[test]
fn conjunction_alternatives_bind_multiple_variables() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);

    let a0 = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), int()), Locator::at(1));
    let a1 = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v1), string()), Locator::at(2));
    let ints = cs.mk_conjunction(vec![a0, a1], Locator::at(3));

    let b0 = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), double()), Locator::at(4));
    let b1 = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v1), double()), Locator::at(5));
    let doubles = cs.mk_conjunction(vec![b0, b1], Locator::at(6));

    cs.add_disjunction(vec![ints, doubles], Locator::at(0));
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(7));

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, int());
    expect_unique_binding(&solution, v1, string());
}

// ==============================================================================
// Simplifier behavior
// ==============================================================================

#[test]
fn scalar_conversions() {
    // Scalar into a one-element labelled tuple.
    let mut cs = system();
    let tuple = Ty::tuple(vec![TupleElem::labelled("x", int())]);
    cs.add_constraint(ConstraintKind::Conversion(int(), tuple.clone()), Locator::at(0));
    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    assert_eq!(
        solution.restrictions.get(&(int(), tuple)),
        Some(&ConversionRestriction::ScalarToTuple)
    );

    // Scalar into an auto-closure thunk of its type.
    let mut cs = system();
    let thunk = Ty::auto_closure(Ty::tuple(vec![]), int());
    cs.add_constraint(ConstraintKind::Conversion(int(), thunk), Locator::at(0));
    assert!(cs.solve(FreeTypeVariableBinding::Disallow).is_ok());
}

#[test]
fn occurs_check_rejects_recursive_binding() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::Equal(Ty::var(v0), Ty::optional(Ty::var(v0))),
        Locator::at(0),
    );
    assert_eq!(
        cs.solve(FreeTypeVariableBinding::Disallow),
        Err(SolveError::NoSolution)
    );
}

#[test]
fn applicable_function_resolves_result() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(
        ConstraintKind::ApplicableFn(
            Ty::func(int(), Ty::var(v0)),
            Ty::func(int(), string()),
        ),
        Locator::at(0).with(PathElem::ApplyFunction),
    );

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, string());
}

#[test]
fn type_properties() {
    let mut cs = system();
    cs.add_constraint(ConstraintKind::Class(Ty::class("Base")), Locator::at(0));
    assert!(cs.solve(FreeTypeVariableBinding::Disallow).is_ok());

    let mut cs = system();
    cs.add_constraint(ConstraintKind::Class(int()), Locator::at(0));
    assert_eq!(
        cs.solve(FreeTypeVariableBinding::Disallow),
        Err(SolveError::NoSolution)
    );

    let mut cs = system();
    cs.add_constraint(
        ConstraintKind::Materializable(Ty::lvalue(int())),
        Locator::at(0),
    );
    assert_eq!(
        cs.solve(FreeTypeVariableBinding::Disallow),
        Err(SolveError::NoSolution)
    );
}

#[test]
fn equivalent_variables_share_one_binding() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Equal(Ty::var(v0), Ty::var(v1)), Locator::at(0));
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v1)), Locator::at(1));

    let solution = cs.solve(FreeTypeVariableBinding::Disallow).unwrap();
    expect_unique_binding(&solution, v0, int());
    expect_unique_binding(&solution, v1, int());
}

// ==============================================================================
// Scope round-trip and simplification idempotence
// ==============================================================================

pub(crate) type Snapshot = (
    Vec<(TyVarId, Option<TyRef>)>,
    Vec<ConstraintId>,
    Vec<ConstraintId>,
    usize,
    usize,
    Score,
    usize,
    Option<Vec<Vec<ConstraintId>>>,
);

/// Everything a scope must restore. Constraint lists compare as sets:
/// retire/restore cycles may reorder the list, which is not observable
/// behavior.
pub(crate) fn observable(cs: &ConstraintSystem) -> Snapshot {
    let vars = (0..cs.storage.len() as u32)
        .map(TyVarId)
        .map(|v| (cs.storage.representative(v), cs.storage.fixed(v).cloned()))
        .collect();
    let mut active = cs.active.ids(&cs.arena);
    active.sort_by_key(|id| id.0);
    let mut retired = cs
        .state
        .as_ref()
        .map(|s| s.retired.ids(&cs.arena))
        .unwrap_or_default();
    retired.sort_by_key(|id| id.0);
    (
        vars,
        active,
        retired,
        cs.resolved_overloads.len(),
        cs.state.as_ref().map(|s| s.restrictions.len()).unwrap_or(0),
        cs.current_score,
        cs.type_variables.len(),
        cs.graph.as_ref().map(|g| g.snapshot()),
    )
}

#[test]
fn scope_roundtrip_restores_everything() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v1), integer_literal()),
        Locator::at(1),
    );
    cs.state = Some(SolverState::new(&cs.options));

    let before = observable(&cs);
    let scope = cs.begin_scope();

    // A representative batch of mutations: bindings, merges, constraint
    // generation and retirement, restrictions, score, overloads.
    cs.assign_fixed(v0, int(), true);
    cs.add_constraint(ConstraintKind::Equal(Ty::var(v1), double()), Locator::at(2));
    assert!(!cs.simplify());
    cs.increase_score(ScoreKind::UserConversion);
    cs.record_restriction(&int(), &double(), ConversionRestriction::DeepEquality);
    cs.resolved_overloads.push(ResolvedOverload {
        locator: Locator::at(9),
        choice: OverloadChoice::new("f", int()),
        opened_full_ty: int(),
        opened_ty: int(),
    });

    // The mutations took effect.
    assert_eq!(cs.storage.fixed(v1), Some(&double()));
    assert!(cs.active.is_empty());

    cs.rollback_scope(scope);
    assert_eq!(observable(&cs), before);
}

#[test]
fn merge_roundtrip_restores_representatives() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let v1 = cs.new_type_variable(false);
    cs.state = Some(SolverState::new(&cs.options));

    let before = observable(&cs);
    let scope = cs.begin_scope();
    cs.merge_equivalence_classes(v0, v1);
    assert_eq!(cs.storage.representative(v1), v0);
    cs.rollback_scope(scope);
    assert_eq!(observable(&cs), before);
}

#[test]
fn simplify_twice_does_no_new_work() {
    for mut cs in [system(), system_no_graph()] {
        let v0 = cs.new_type_variable(false);
        cs.add_constraint(ConstraintKind::Equal(Ty::var(v0), int()), Locator::at(0));
        cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(1));
        cs.state = Some(SolverState::new(&cs.options));
        if cs.graph.is_some() {
            for id in cs.active.ids(&cs.arena) {
                cs.activate_constraint(id);
            }
        }

        assert!(!cs.simplify());
        let after_first = cs.state.as_ref().unwrap().stats.num_simplified_constraints;
        assert!(after_first > 0);

        assert!(!cs.simplify());
        let after_second = cs.state.as_ref().unwrap().stats.num_simplified_constraints;
        assert_eq!(after_first, after_second);
    }
}

#[test]
fn failed_simplification_retires_wholesale_and_restores() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));
    cs.add_constraint(
        ConstraintKind::ConformsTo(Ty::var(v0), equatable()),
        Locator::at(1),
    );
    cs.state = Some(SolverState::new(&cs.options));

    let before = observable(&cs);
    let scope = cs.begin_scope();
    // Int does not conform to Equatable in the test table.
    cs.assign_fixed(v0, int(), true);
    assert!(cs.simplify());
    assert!(cs.failed_constraint.is_some());
    assert!(cs.active.is_empty());
    cs.rollback_scope(scope);
    assert_eq!(observable(&cs), before);
    assert!(cs.failed_constraint.is_none());
}

#[test]
fn statistics_accumulate_across_attempts() {
    let before = crate::stats::overall();
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    cs.add_constraint(ConstraintKind::Subtype(int(), Ty::var(v0)), Locator::at(0));
    cs.solve(FreeTypeVariableBinding::Disallow).unwrap();

    let after = crate::stats::overall();
    assert!(after.num_states_explored > before.num_states_explored);
    assert!(after.num_simplified_constraints > before.num_simplified_constraints);
    let (attempt, largest) = crate::stats::largest();
    assert!(attempt >= 1);
    assert!(largest.num_states_explored >= 1);
}

#[test]
fn detached_alternatives_stay_out_of_circulation() {
    let mut cs = system();
    let v0 = cs.new_type_variable(false);
    let a = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), int()), Locator::at(1));
    let b = cs.mk_constraint(ConstraintKind::Equal(Ty::var(v0), double()), Locator::at(2));
    let disjunction = cs.add_disjunction(vec![a, b], Locator::at(0));

    assert_eq!(cs.active.ids(&cs.arena), vec![disjunction]);
    assert_eq!(cs.arena.node(a).place, Place::Detached);
    assert_eq!(cs.arena.node(b).place, Place::Detached);
}
