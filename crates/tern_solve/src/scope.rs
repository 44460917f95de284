// ==============================================================================
// Scoped Transactions
// ==============================================================================
//
// Every decision point brackets its mutations in a scope. Entry records
// prefix cursors into the journaled stores; rollback truncates back to
// them, in a fixed order, and must leave the system bit-for-bit identical
// to its pre-scope state. Scopes are explicit begin/rollback pairs — the
// driver owns control flow, so each exit path rolls back exactly once.

use rustc_hash::FxHashSet;

use crate::constraint::{ConstraintId, Place};
use crate::score::Score;
use crate::ConstraintSystem;

#[derive(Debug)]
pub(crate) struct SolverScope {
    num_resolved_overloads: usize,
    num_type_variables: usize,
    num_saved_bindings: usize,
    first_retired: Option<ConstraintId>,
    num_restrictions: usize,
    previous_score: Score,
    graph_mark: Option<usize>,
}

impl ConstraintSystem {
    pub(crate) fn begin_scope(&mut self) -> SolverScope {
        let graph_mark = self.graph.as_ref().map(|g| g.mark());
        let num_resolved_overloads = self.resolved_overloads.len();
        let num_type_variables = self.type_variables.len();
        let num_saved_bindings = self.storage.num_saved();
        let previous_score = self.current_score;

        let state = self.state.as_mut().expect("scope opened outside of solving");
        state.depth += 1;
        state.stats.num_states_explored += 1;
        state.generated_stack.push(FxHashSet::default());

        SolverScope {
            num_resolved_overloads,
            num_type_variables,
            num_saved_bindings,
            first_retired: state.retired.head(),
            num_restrictions: state.restrictions.len(),
            previous_score,
            graph_mark,
        }
    }

    pub(crate) fn rollback_scope(&mut self, scope: SolverScope) {
        // Pending work belongs to the branch being abandoned; cancel it.
        while let Some(id) = self.worklist.pop_front() {
            self.arena.node_mut(id).active = false;
        }
        self.state.as_mut().unwrap().depth -= 1;

        // Truncate the overload stack and the active-variable list.
        self.resolved_overloads.truncate(scope.num_resolved_overloads);
        self.type_variables.truncate(scope.num_type_variables);

        // Reverse-apply the saved-bindings suffix.
        self.storage.restore(scope.num_saved_bindings);

        // Constraints retired inside the scope go back into circulation.
        // Retirement prepends, so the scope's contribution is exactly the
        // prefix up to the remembered head.
        loop {
            let state = self.state.as_mut().unwrap();
            if state.retired.head() == scope.first_retired {
                break;
            }
            let id = state.retired.pop_front(&mut self.arena).unwrap();
            self.arena.node_mut(id).place = Place::Active;
            self.active.push_back(&mut self.arena, id);
        }

        // Erase constraints generated inside the scope. This runs after
        // the retired restore: a generated constraint solved mid-scope is
        // back on the active list by now and gets unlinked here.
        let generated = self
            .state
            .as_mut()
            .unwrap()
            .generated_stack
            .pop()
            .expect("generated-constraint stack underflow");
        for id in generated {
            match self.arena.node(id).place {
                Place::Active => {
                    self.active.unlink(&mut self.arena, id);
                    self.arena.node_mut(id).place = Place::Detached;
                }
                // Alternatives that simplified away on the spot were never
                // attached; nothing to erase.
                Place::Detached => {}
                Place::Retired => unreachable!("generated constraint survived the retired restore"),
            }
        }

        // Truncate the restriction journal, restore the score, clear any
        // transient failure.
        let state = self.state.as_mut().unwrap();
        state.restrictions.truncate(scope.num_restrictions);
        self.current_score = scope.previous_score;
        self.failed_constraint = None;

        // The graph journal unwinds last; it is independent of the lists.
        if let (Some(graph), Some(mark)) = (self.graph.as_mut(), scope.graph_mark) {
            graph.rewind(mark);
        }
    }

    // --------------------------------------------------------------------------
    // List transitions
    // --------------------------------------------------------------------------

    /// Put a detached constraint into circulation: active list, graph
    /// edges, and (for never-simplified constraints) the worklist.
    pub(crate) fn attach_active(&mut self, id: ConstraintId, enqueue: bool) {
        debug_assert_eq!(self.arena.node(id).place, Place::Detached);
        self.arena.node_mut(id).place = Place::Active;
        self.active.push_back(&mut self.arena, id);
        if let Some(graph) = &mut self.graph {
            graph.add_constraint(&self.arena, &self.storage, id);
        }
        if enqueue {
            self.activate_constraint(id);
        }
        self.record_generated(id);
    }

    /// Mark a circulating constraint as pending (re-)simplification.
    /// No-op without a graph: the fixed-point loop revisits everything.
    pub(crate) fn activate_constraint(&mut self, id: ConstraintId) {
        if self.graph.is_none() {
            return;
        }
        debug_assert_eq!(self.arena.node(id).place, Place::Active);
        let node = self.arena.node_mut(id);
        if !node.active {
            node.active = true;
            self.worklist.push_back(id);
        }
    }

    /// Move a solved constraint from the active list to the retired list.
    pub(crate) fn retire(&mut self, id: ConstraintId) {
        debug_assert_eq!(self.arena.node(id).place, Place::Active);
        self.active.unlink(&mut self.arena, id);
        if let Some(graph) = &mut self.graph {
            graph.remove_constraint(&self.arena, &self.storage, id);
        }
        self.park_retired(id);
    }

    /// Park an already-unlinked constraint on the retired list.
    pub(crate) fn park_retired(&mut self, id: ConstraintId) {
        self.arena.node_mut(id).place = Place::Retired;
        let state = self.state.as_mut().unwrap();
        state.retired.push_front(&mut self.arena, id);
    }

    /// Take a constraint out of circulation without retiring it (used for
    /// the disjunction under attack). Remembers nothing; the caller holds
    /// the re-insertion anchor.
    pub(crate) fn detach_from_active(&mut self, id: ConstraintId) {
        debug_assert_eq!(self.arena.node(id).place, Place::Active);
        self.active.unlink(&mut self.arena, id);
        if let Some(graph) = &mut self.graph {
            graph.remove_constraint(&self.arena, &self.storage, id);
        }
        self.arena.node_mut(id).place = Place::Detached;
    }

    /// Put a detached constraint back immediately before `anchor`
    /// (append when `None`).
    pub(crate) fn reattach_before(&mut self, id: ConstraintId, anchor: Option<ConstraintId>) {
        debug_assert_eq!(self.arena.node(id).place, Place::Detached);
        self.arena.node_mut(id).place = Place::Active;
        self.active.insert_before(&mut self.arena, anchor, id);
        if let Some(graph) = &mut self.graph {
            graph.add_constraint(&self.arena, &self.storage, id);
        }
    }

    pub(crate) fn record_generated(&mut self, id: ConstraintId) {
        if let Some(state) = self.state.as_mut() {
            state.generated_stack.last_mut().unwrap().insert(id);
        }
    }
}
