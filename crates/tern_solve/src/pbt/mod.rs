// ==============================================================================
// Property Tests
// ==============================================================================
//
// Two engine-level properties the design hangs on:
// - Scope round-trip: any mutation script wrapped in a scope leaves the
//   observable state bit-for-bit identical after rollback.
// - Replay consistency: pinning every concretely solved variable to its
//   binding in a fresh copy of the same system must still solve.

use proptest::prelude::*;
use tern_ty::{ty, Ty, TyRef, TyVarId};

use crate::solve::SolverState;
use crate::tests::{observable, std_table};
use crate::{ConstraintKind, ConstraintSystem, FreeTypeVariableBinding, Locator};

fn arb_concrete_ty() -> impl Strategy<Value = TyRef> {
    prop_oneof![
        Just(ty!(Int)),
        Just(ty!(Double)),
        Just(ty!(String)),
        Just(Ty::class("Base")),
        Just(Ty::class("Derived")),
        Just(Ty::optional(ty!(Int))),
    ]
}

#[derive(Debug, Clone)]
enum ScriptOp {
    AssignFixed(usize, TyRef),
    Merge(usize, usize),
    AddLowerBound(usize, TyRef),
    AddEquality(usize, TyRef),
    Simplify,
}

const NUM_VARS: usize = 3;

fn arb_op() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        (0..NUM_VARS, arb_concrete_ty()).prop_map(|(v, t)| ScriptOp::AssignFixed(v, t)),
        (0..NUM_VARS, 0..NUM_VARS).prop_map(|(a, b)| ScriptOp::Merge(a, b)),
        (0..NUM_VARS, arb_concrete_ty()).prop_map(|(v, t)| ScriptOp::AddLowerBound(v, t)),
        (0..NUM_VARS, arb_concrete_ty()).prop_map(|(v, t)| ScriptOp::AddEquality(v, t)),
        Just(ScriptOp::Simplify),
    ]
}

fn apply(cs: &mut ConstraintSystem, vars: &[TyVarId], op: ScriptOp) {
    match op {
        ScriptOp::AssignFixed(i, ty) => {
            let var = vars[i];
            if cs.storage.fixed(var).is_none() {
                cs.assign_fixed(var, ty, true);
            }
        }
        ScriptOp::Merge(a, b) => {
            let (va, vb) = (vars[a], vars[b]);
            if cs.storage.representative(va) != cs.storage.representative(vb)
                && cs.storage.fixed(va).is_none()
                && cs.storage.fixed(vb).is_none()
            {
                cs.merge_equivalence_classes(va, vb);
            }
        }
        ScriptOp::AddLowerBound(i, ty) => {
            cs.add_constraint(ConstraintKind::Subtype(ty, Ty::var(vars[i])), Locator::at(0));
        }
        ScriptOp::AddEquality(i, ty) => {
            cs.add_constraint(ConstraintKind::Equal(Ty::var(vars[i]), ty), Locator::at(0));
        }
        ScriptOp::Simplify => {
            let _ = cs.simplify();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scope_rollback_is_exact(ops in prop::collection::vec(arb_op(), 0..12)) {
        let mut cs = ConstraintSystem::new(std_table());
        let vars: Vec<TyVarId> = (0..NUM_VARS).map(|_| cs.new_type_variable(false)).collect();
        cs.add_constraint(
            ConstraintKind::Subtype(ty!(Int), Ty::var(vars[0])),
            Locator::at(100),
        );
        cs.state = Some(SolverState::new(&cs.options));

        let before = observable(&cs);
        let scope = cs.begin_scope();
        for op in ops {
            apply(&mut cs, &vars, op);
        }
        let _ = cs.simplify();
        cs.rollback_scope(scope);

        prop_assert_eq!(observable(&cs), before);
    }

    #[test]
    fn solutions_replay_consistently(
        bounds in prop::collection::vec((0..NUM_VARS, arb_concrete_ty()), 1..5),
    ) {
        let build = |pins: &[(TyVarId, TyRef)]| {
            let mut cs = ConstraintSystem::new(std_table());
            let vars: Vec<TyVarId> =
                (0..NUM_VARS).map(|_| cs.new_type_variable(false)).collect();
            for (k, (i, ty)) in bounds.iter().enumerate() {
                cs.add_constraint(
                    ConstraintKind::Subtype(ty.clone(), Ty::var(vars[*i])),
                    Locator::at(k as u32),
                );
            }
            for (var, ty) in pins {
                cs.add_constraint(
                    ConstraintKind::Equal(Ty::var(*var), ty.clone()),
                    Locator::at(900),
                );
            }
            (cs, vars)
        };

        let (mut cs, vars) = build(&[]);
        if let Ok(solution) = cs.solve(FreeTypeVariableBinding::Allow) {
            // Fresh system, same constraints, bindings pinned: the
            // solution must reproduce.
            let pins: Vec<(TyVarId, TyRef)> = vars
                .iter()
                .filter_map(|var| {
                    let ty = solution.type_bindings.get(var)?;
                    if ty.has_type_variable() {
                        None
                    } else {
                        Some((*var, ty.clone()))
                    }
                })
                .collect();
            let (mut replay, _) = build(&pins);
            prop_assert!(replay.solve(FreeTypeVariableBinding::Allow).is_ok());
        }
    }
}
