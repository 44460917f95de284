// ==============================================================================
// Constraint Classification
// ==============================================================================
//
// One walk over the active constraints produces a per-equivalence-class
// summary: the concrete bounds above and below each variable, its
// conformance requirements, and flags describing how constrained it is.
// The binding enumerator and the variable-selection heuristic both work
// from these summaries; top-level disjunctions are collected on the side.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_ty::{TyRef, TyVarId};

use crate::constraint::{Classification, ConstraintId, ConstraintKind};
use crate::ConstraintSystem;

#[derive(Debug)]
pub(crate) struct TypeVariableConstraints {
    pub var: TyVarId,
    /// Some constraint (applicable-function, member result) will determine
    /// this variable entirely once other variables resolve; don't guess it.
    pub fully_bound: bool,
    /// The variable is entangled with other unresolved variables.
    pub has_non_concrete_constraints: bool,
    /// Upper bounds: `(constraint, bound)` where `var <rel> bound`.
    pub above: Vec<(ConstraintId, TyRef)>,
    /// Lower bounds: `(constraint, bound)` where `bound <rel> var`.
    pub below: Vec<(ConstraintId, TyRef)>,
    pub conforms_to: Vec<ConstraintId>,
}

impl TypeVariableConstraints {
    fn new(var: TyVarId) -> Self {
        TypeVariableConstraints {
            var,
            fully_bound: false,
            has_non_concrete_constraints: false,
            above: Vec::new(),
            below: Vec::new(),
            conforms_to: Vec::new(),
        }
    }
}

fn summary_slot(
    summaries: &mut Vec<TypeVariableConstraints>,
    index: &mut FxHashMap<TyVarId, usize>,
    rep: TyVarId,
) -> usize {
    *index.entry(rep).or_insert_with(|| {
        summaries.push(TypeVariableConstraints::new(rep));
        summaries.len() - 1
    })
}

impl ConstraintSystem {
    /// Whether two variable sets share an equivalence class.
    fn type_vars_intersect(&self, lhs: &[TyVarId], rhs: &[TyVarId]) -> bool {
        if lhs.is_empty() || rhs.is_empty() {
            return false;
        }
        let lhs_reps: FxHashSet<TyVarId> = lhs
            .iter()
            .map(|&v| self.storage.representative(v))
            .collect();
        rhs.iter()
            .any(|&v| lhs_reps.contains(&self.storage.representative(v)))
    }

    pub(crate) fn collect_constraints_for_type_variables(
        &self,
    ) -> (Vec<TypeVariableConstraints>, Vec<ConstraintId>) {
        let mut summaries: Vec<TypeVariableConstraints> = Vec::new();
        let mut index: FxHashMap<TyVarId, usize> = FxHashMap::default();
        let mut disjunctions: Vec<ConstraintId> = Vec::new();
        let mut referenced: Vec<TyVarId> = Vec::new();

        for cid in self.active.ids(&self.arena) {
            let kind = self.arena.node(cid).kind.clone();
            match kind.classification() {
                Classification::Relational => {
                    let first = self.storage.simplify_ty(kind.first_type().unwrap());
                    match &kind {
                        ConstraintKind::ConformsTo(..)
                        | ConstraintKind::SelfObjectOfProtocol(..) => {
                            if let Some(v) = first.as_var() {
                                let rep = self.storage.representative(v);
                                let slot = summary_slot(&mut summaries, &mut index, rep);
                                summaries[slot].conforms_to.push(cid);
                            }
                            continue;
                        }
                        ConstraintKind::ApplicableFn(_, second) => {
                            // The call-site function type is determined by
                            // the callee once it resolves.
                            let mut lhs_vars = Vec::new();
                            first.type_variables(&mut lhs_vars);
                            for v in lhs_vars {
                                let rep = self.storage.representative(v);
                                let slot = summary_slot(&mut summaries, &mut index, rep);
                                summaries[slot].fully_bound = true;
                            }
                            self.storage.simplify_ty(second).type_variables(&mut referenced);
                            continue;
                        }
                        ConstraintKind::BindOverload { .. } => {
                            first.type_variables(&mut referenced);
                            continue;
                        }
                        _ => {}
                    }

                    let second = self.storage.simplify_ty(kind.second_type().unwrap());
                    let first_tv = first.as_var();
                    let second_tv = second.as_var();

                    match first_tv {
                        Some(v) => {
                            let rep = self.storage.representative(v);
                            let slot = summary_slot(&mut summaries, &mut index, rep);
                            summaries[slot].above.push((cid, second.clone()));
                        }
                        None => first.type_variables(&mut referenced),
                    }
                    match second_tv {
                        Some(v) => {
                            let rep = self.storage.representative(v);
                            let slot = summary_slot(&mut summaries, &mut index, rep);
                            summaries[slot].below.push((cid, first.clone()));
                        }
                        None => second.type_variables(&mut referenced),
                    }
                    if let (Some(a), Some(b)) = (first_tv, second_tv) {
                        referenced.push(a);
                        referenced.push(b);
                    }
                }

                Classification::TypeProperty => {
                    let first = self.storage.simplify_ty(kind.first_type().unwrap());
                    if first.as_var().is_none() {
                        first.type_variables(&mut referenced);
                    }
                }

                Classification::Member => {
                    let base = self.storage.simplify_ty(kind.first_type().unwrap());
                    let member = self.storage.simplify_ty(kind.second_type().unwrap());
                    let mut base_vars = Vec::new();
                    base.type_variables(&mut base_vars);
                    let mut member_vars = Vec::new();
                    member.type_variables(&mut member_vars);

                    // A member type disjoint from its base is pinned down
                    // entirely by the lookup.
                    if !self.type_vars_intersect(&base_vars, &member_vars) {
                        for v in member_vars {
                            let rep = self.storage.representative(v);
                            let slot = summary_slot(&mut summaries, &mut index, rep);
                            summaries[slot].fully_bound = true;
                        }
                    } else {
                        referenced.extend(member_vars);
                    }
                }

                Classification::Conjunction => {
                    unreachable!("conjunction constraints should have been broken apart")
                }

                Classification::Disjunction => {
                    disjunctions.push(cid);
                    let ConstraintKind::Disjunction(members) = &kind else {
                        unreachable!()
                    };
                    // Every variable any alternative touches is entangled
                    // with the pending choice.
                    for &alt in members {
                        let inner: Vec<ConstraintId> =
                            match &self.arena.node(alt).kind {
                                ConstraintKind::Conjunction(ms) => ms.clone(),
                                _ => vec![alt],
                            };
                        for m in inner {
                            let mkind = &self.arena.node(m).kind;
                            if let Some(first) = mkind.first_type() {
                                self.storage.simplify_ty(first).type_variables(&mut referenced);
                            }
                            if let Some(second) = mkind.second_type() {
                                self.storage
                                    .simplify_ty(second)
                                    .type_variables(&mut referenced);
                            }
                        }
                    }
                }
            }
        }

        let mut seen = FxHashSet::default();
        for v in referenced {
            if !seen.insert(v) {
                continue;
            }
            let rep = self.storage.representative(v);
            if let Some(&slot) = index.get(&rep) {
                summaries[slot].has_non_concrete_constraints = true;
            }
        }

        (summaries, disjunctions)
    }
}
