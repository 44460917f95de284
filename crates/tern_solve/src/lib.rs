//! Constraint solver for type inference: given relational, member,
//! conformance, and disjunctive constraints over type variables, search
//! for assignments of concrete types that satisfy all of them, ranked by
//! a lexicographic score.

mod bindings;
mod classify;
mod constraint;
mod graph;
mod relate;
mod scope;
mod score;
mod solution;
mod solve;
pub mod stats;
mod storage;
mod table;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod pbt;

use std::collections::VecDeque;

use thiserror::Error;

use tern_ty::{TyRef, TyVarId};

pub use constraint::{
    Classification, ConstraintId, ConstraintKind, ConversionRestriction, Locator, OverloadChoice,
    PathElem,
};
pub use relate::SolutionKind;
pub use score::{Score, ScoreKind};
pub use solution::{find_best_solution, OverloadSelection, Solution};
pub use table::TypeTable;

use constraint::{ConstraintArena, ConstraintList};
use graph::ConstraintGraph;
use solution::ResolvedOverload;
use solve::SolverState;
use storage::TypeVariableStorage;

/// What to do with type variables that survive the search unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTypeVariableBinding {
    /// Free variables are a failure (a finalize with one is a bug).
    Disallow,
    /// Leave them free in the solution.
    Allow,
    /// Bind each to a fresh generic parameter.
    GenericParameters,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("no solution satisfies the constraint system")]
    NoSolution,
    #[error("constraint system is ambiguous between {} equally ranked solutions", candidates.len())]
    Ambiguous { candidates: Vec<Solution> },
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Trace every search step on the debug stream.
    pub debug_solver: bool,
    /// Trace only the attempt with this (1-based, process-wide) number.
    pub debug_solver_attempt: Option<u64>,
    /// Maintain the constraint graph: worklist simplification, dependent
    /// re-activation, and connected-component decomposition. Without it
    /// the solver falls back to fixed-point re-simplification.
    pub enable_constraint_graph: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            debug_solver: false,
            debug_solver_attempt: None,
            enable_constraint_graph: true,
        }
    }
}

impl SolverOptions {
    /// The two environment inputs the solver honors.
    pub fn from_env() -> Self {
        let mut options = SolverOptions::default();
        if std::env::var_os("TERN_DEBUG_SOLVER").is_some_and(|v| v != "0") {
            options.debug_solver = true;
        }
        if let Some(attempt) = std::env::var("TERN_DEBUG_SOLVER_ATTEMPT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options.debug_solver_attempt = Some(attempt);
        }
        options
    }
}

/// A constraint system under solution: the substitution store, the
/// constraint store with its worklist, the optional constraint graph, the
/// resolved-overloads stack, and the current score. Single-threaded and
/// non-reentrant; `solve` consumes the constraints.
#[derive(Debug)]
pub struct ConstraintSystem {
    pub(crate) table: TypeTable,
    pub(crate) options: SolverOptions,
    pub(crate) storage: TypeVariableStorage,
    pub(crate) arena: ConstraintArena,
    /// Active constraints, in insertion order.
    pub(crate) active: ConstraintList,
    /// Constraints pending (re-)simplification. Graph mode only.
    pub(crate) worklist: VecDeque<ConstraintId>,
    pub(crate) graph: Option<ConstraintGraph>,
    /// Variables visible to the current (sub-)solve; truncated on scope
    /// exit and re-filtered during component decomposition.
    pub(crate) type_variables: Vec<TyVarId>,
    pub(crate) resolved_overloads: Vec<ResolvedOverload>,
    pub(crate) failed_constraint: Option<ConstraintId>,
    pub(crate) current_score: Score,
    pub(crate) state: Option<SolverState>,
}

impl ConstraintSystem {
    pub fn new(table: TypeTable) -> Self {
        Self::with_options(table, SolverOptions::default())
    }

    pub fn with_options(table: TypeTable, options: SolverOptions) -> Self {
        let graph = options.enable_constraint_graph.then(ConstraintGraph::new);
        ConstraintSystem {
            table,
            options,
            storage: TypeVariableStorage::new(),
            arena: ConstraintArena::default(),
            active: ConstraintList::new(),
            worklist: VecDeque::new(),
            graph,
            type_variables: Vec::new(),
            resolved_overloads: Vec::new(),
            failed_constraint: None,
            current_score: Score::ZERO,
            state: None,
        }
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    pub fn new_type_variable(&mut self, can_bind_to_lvalue: bool) -> TyVarId {
        let var = self.storage.new_var(can_bind_to_lvalue);
        self.type_variables.push(var);
        var
    }

    /// Allocate a constraint without putting it into circulation. Used
    /// for disjunction alternatives and conjunction members.
    pub fn mk_constraint(&mut self, kind: ConstraintKind, locator: Locator) -> ConstraintId {
        self.arena.alloc(kind, None, locator)
    }

    /// Like [`mk_constraint`](Self::mk_constraint), with a conversion
    /// restriction the alternative commits to.
    pub fn mk_restricted(
        &mut self,
        kind: ConstraintKind,
        restriction: ConversionRestriction,
        locator: Locator,
    ) -> ConstraintId {
        self.arena.alloc(kind, Some(restriction), locator)
    }

    pub fn mk_conjunction(
        &mut self,
        members: Vec<ConstraintId>,
        locator: Locator,
    ) -> ConstraintId {
        self.arena.alloc(ConstraintKind::Conjunction(members), None, locator)
    }

    /// Add a constraint to the system.
    pub fn add_constraint(&mut self, kind: ConstraintKind, locator: Locator) -> ConstraintId {
        let id = self.arena.alloc(kind, None, locator);
        self.attach_active(id, true);
        id
    }

    /// Add a disjunction over previously allocated alternatives.
    pub fn add_disjunction(
        &mut self,
        alternatives: Vec<ConstraintId>,
        locator: Locator,
    ) -> ConstraintId {
        assert!(!alternatives.is_empty(), "empty disjunction");
        let id = self
            .arena
            .alloc(ConstraintKind::Disjunction(alternatives), None, locator);
        self.attach_active(id, true);
        id
    }

    /// The canonicalizing substitution over the current bindings.
    pub fn simplify_type(&self, ty: &TyRef) -> TyRef {
        self.storage.simplify_ty(ty)
    }

    pub fn representative(&self, var: TyVarId) -> TyVarId {
        self.storage.representative(var)
    }

    pub fn fixed_type(&self, var: TyVarId) -> Option<TyRef> {
        self.storage.fixed(var).cloned()
    }

    pub fn current_score(&self) -> Score {
        self.current_score
    }

    /// Number of constraints still awaiting solution.
    pub fn num_active_constraints(&self) -> usize {
        self.active.len()
    }
}
