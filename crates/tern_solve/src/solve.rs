// ==============================================================================
// Solver Driver
// ==============================================================================
//
// The recursive search: simplify to a fixed point, record a solution when
// no constraints remain, otherwise split the system into independent
// components or branch on the most promising type variable or the
// smallest disjunction. Every branch runs inside a scope; unwinding the
// scope is the only undo mechanism.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use tern_ty::{Ty, TyRef, TyVarId};

use crate::constraint::{
    ConstraintId, ConstraintKind, ConstraintList, ConversionRestriction, PathElem,
};
use crate::relate::SolutionKind;
use crate::score::Score;
use crate::solution::{find_best_solution, Solution};
use crate::stats::{self, SolverStatistics};
use crate::{ConstraintSystem, FreeTypeVariableBinding, SolveError, SolverOptions};

/// Search-time state, created by the top-level `solve` call and torn down
/// when it returns. Holds everything that only exists while searching:
/// the retired list, the journals, the best score, statistics.
#[derive(Debug)]
pub(crate) struct SolverState {
    pub attempt: u64,
    pub depth: usize,
    pub best_score: Option<Score>,
    pub retired: ConstraintList,
    pub restrictions: Vec<(TyRef, TyRef, ConversionRestriction)>,
    /// One generated-constraint set per open scope; the base entry catches
    /// constraints added outside any scope.
    pub generated_stack: Vec<FxHashSet<ConstraintId>>,
    pub stats: SolverStatistics,
    pub debug: bool,
}

impl SolverState {
    pub(crate) fn new(options: &SolverOptions) -> Self {
        let attempt = stats::next_solution_attempt();
        let debug = options.debug_solver || options.debug_solver_attempt == Some(attempt);
        SolverState {
            attempt,
            depth: 0,
            best_score: None,
            retired: ConstraintList::new(),
            restrictions: Vec::new(),
            generated_stack: vec![FxHashSet::default()],
            stats: SolverStatistics::default(),
            debug,
        }
    }
}

impl ConstraintSystem {
    /// Solve the system, returning the unique best solution. Consumes the
    /// system's constraints: call once per constraint set.
    pub fn solve(&mut self, allow_free: FreeTypeVariableBinding) -> Result<Solution, SolveError> {
        assert!(self.state.is_none(), "solver is not reentrant");
        let state = SolverState::new(&self.options);
        if state.debug {
            debug!(
                "---constraint system attempt #{} ({} constraints, {} type variables)---",
                state.attempt,
                self.active.len(),
                self.type_variables.len()
            );
        }
        self.state = Some(state);

        // Everything starts out pending.
        if self.graph.is_some() {
            for id in self.active.ids(&self.arena) {
                self.activate_constraint(id);
            }
        }

        let mut solutions = Vec::new();
        let _ = self.solve_rec(&mut solutions, allow_free);

        // With more than one viable solution, keep the unique best if
        // there is one; otherwise the set survives as an ambiguity.
        if solutions.len() > 1 {
            if let Some(best) = find_best_solution(&mut solutions, false) {
                solutions.swap(0, best);
                solutions.truncate(1);
            }
        }

        let state = self.state.take().unwrap();
        stats::flush(&state.stats, state.attempt);
        if state.debug {
            debug!(
                "---attempt #{} finished: {} states explored, {} solutions---",
                state.attempt,
                state.stats.num_states_explored,
                solutions.len()
            );
        }

        match solutions.len() {
            0 => Err(SolveError::NoSolution),
            1 => Ok(solutions.pop().unwrap()),
            _ => Err(SolveError::Ambiguous {
                candidates: solutions,
            }),
        }
    }

    /// Recursive search. Returns whether any solution was recorded.
    pub(crate) fn solve_rec(
        &mut self,
        solutions: &mut Vec<Solution>,
        allow_free: FreeTypeVariableBinding,
    ) -> bool {
        if self.failed_constraint.is_some() || self.simplify() {
            return false;
        }

        if self.active.is_empty() {
            if self.worse_than_best_solution() {
                return false;
            }
            if allow_free == FreeTypeVariableBinding::Disallow && self.has_free_type_variables() {
                return false;
            }
            let solution = self.finalize(allow_free);
            if self.debug_enabled() {
                debug!(
                    "{:indent$}(found solution {})",
                    "",
                    solution.score,
                    indent = self.depth() * 2
                );
            }
            solutions.push(solution);
            return true;
        }

        let Some(graph) = self.graph.as_ref() else {
            return self.solve_simplified(solutions, allow_free);
        };
        let (component_of, num_components) = graph.connected_components(
            &self.arena,
            &self.storage,
            &self.active,
            &self.type_variables,
        );
        if num_components < 2 {
            return self.solve_simplified(solutions, allow_free);
        }
        self.solve_components(&component_of, num_components as usize, solutions, allow_free)
    }

    // --------------------------------------------------------------------------
    // Simplification to a fixed point
    // --------------------------------------------------------------------------

    /// Drive pending constraints through the simplifier. Returns `true`
    /// when a constraint failed or the branch was pruned.
    pub(crate) fn simplify(&mut self) -> bool {
        if self.graph.is_some() {
            while let Some(cid) = self.worklist.pop_front() {
                debug_assert!(self.arena.node(cid).active, "worklist constraint is not active");
                let result = self.simplify_constraint(cid);
                self.arena.node_mut(cid).active = false;
                match result {
                    SolutionKind::Error => {
                        if self.failed_constraint.is_none() {
                            self.failed_constraint = Some(cid);
                        }
                    }
                    SolutionKind::Solved => {
                        self.state.as_mut().unwrap().stats.num_simplified_constraints += 1;
                        self.retire(cid);
                    }
                    SolutionKind::Unsolved => {
                        self.state.as_mut().unwrap().stats.num_unsimplified_constraints += 1;
                    }
                }

                if self.failed_constraint.is_some() {
                    // Nothing left to learn: cancel pending work and park
                    // every remaining constraint where scope exit can
                    // restore it.
                    while let Some(c) = self.worklist.pop_front() {
                        self.arena.node_mut(c).active = false;
                    }
                    while let Some(c) = self.active.pop_back(&mut self.arena) {
                        if let Some(graph) = &mut self.graph {
                            graph.remove_constraint(&self.arena, &self.storage, c);
                        }
                        self.park_retired(c);
                    }
                    return true;
                }

                if self.worse_than_best_solution() {
                    return true;
                }
            }
            false
        } else {
            // No graph: re-feed every active constraint through the
            // simplifier until a pass makes no progress.
            loop {
                let mut existing = std::mem::take(&mut self.active);
                let mut solved_any = false;
                while let Some(cid) = existing.pop_front(&mut self.arena) {
                    match self.simplify_constraint(cid) {
                        SolutionKind::Error => {
                            if self.failed_constraint.is_none() {
                                self.failed_constraint = Some(cid);
                            }
                            self.park_retired(cid);
                        }
                        SolutionKind::Solved => {
                            solved_any = true;
                            self.state.as_mut().unwrap().stats.num_simplified_constraints += 1;
                            self.park_retired(cid);
                        }
                        SolutionKind::Unsolved => {
                            self.state.as_mut().unwrap().stats.num_unsimplified_constraints += 1;
                            self.active.push_back(&mut self.arena, cid);
                        }
                    }
                    if self.failed_constraint.is_some() {
                        while let Some(c) = existing.pop_back(&mut self.arena) {
                            self.park_retired(c);
                        }
                        return true;
                    }
                }
                self.state.as_mut().unwrap().stats.num_simplify_iterations += 1;
                if !solved_any {
                    break;
                }
            }
            false
        }
    }

    // --------------------------------------------------------------------------
    // Component decomposition
    // --------------------------------------------------------------------------

    fn solve_components(
        &mut self,
        component_of: &FxHashMap<TyVarId, u32>,
        num_components: usize,
        solutions: &mut Vec<Solution>,
        allow_free: FreeTypeVariableBinding,
    ) -> bool {
        // Partition the active constraints by component.
        let mut buckets: Vec<ConstraintList> =
            (0..num_components).map(|_| ConstraintList::new()).collect();
        while let Some(cid) = self.active.pop_front(&mut self.arena) {
            let mut vars = Vec::new();
            self.arena.referenced_vars(cid, &mut vars);
            let component = vars
                .iter()
                .find_map(|&v| component_of.get(&self.storage.representative(v)))
                .copied()
                .unwrap_or(0) as usize;
            buckets[component].push_back(&mut self.arena, cid);
        }

        let mut partials: Vec<Vec<Solution>> = vec![Vec::new(); num_components];
        let previous_best = self.state.as_ref().unwrap().best_score;
        let all_type_variables = std::mem::take(&mut self.type_variables);
        let mut failed = false;

        for component in 0..num_components {
            debug_assert!(self.active.is_empty());
            self.state.as_mut().unwrap().stats.num_components_split += 1;
            std::mem::swap(&mut self.active, &mut buckets[component]);

            // This component's variables, plus any variable with no
            // component of its own (already resolved, or untouched by any
            // active constraint) stay visible.
            self.type_variables = all_type_variables
                .iter()
                .copied()
                .filter(|&tv| {
                    match component_of.get(&self.storage.representative(tv)) {
                        None => true,
                        Some(&c) => c as usize == component,
                    }
                })
                .collect();

            if self.debug_enabled() {
                debug!(
                    "{:indent$}(solving component #{component})",
                    "",
                    indent = self.depth() * 2
                );
            }

            let scope = self.begin_scope();
            let found = self.solve_simplified(&mut partials[component], allow_free);
            self.rollback_scope(scope);

            // Hand the component's constraints back to its bucket.
            std::mem::swap(&mut self.active, &mut buckets[component]);

            if !found {
                if self.debug_enabled() {
                    debug!(
                        "{:indent$}(failed component #{component})",
                        "",
                        indent = self.depth() * 2
                    );
                }
                failed = true;
                break;
            }
            debug_assert!(!partials[component].is_empty());

            // Component contributions compose additively: strip the score
            // accumulated before the split, and rank each component
            // against its own solutions only.
            for solution in &mut partials[component] {
                solution.score -= self.current_score;
            }
            self.state.as_mut().unwrap().best_score = previous_best;
        }

        // Every constraint returns to the active list; the system is back
        // in a normal state.
        self.type_variables = all_type_variables;
        for bucket in &mut buckets {
            while let Some(cid) = bucket.pop_front(&mut self.arena) {
                self.active.push_back(&mut self.arena, cid);
            }
        }
        if failed {
            return false;
        }

        // Keep only the best partial per component where a unique best
        // exists; minimization bounds the product below.
        for partial in &mut partials {
            if let Some(best) = find_best_solution(partial, true) {
                partial.swap(0, best);
                partial.truncate(1);
            }
        }

        // Enumerate every combination of partial solutions.
        let mut indices = vec![0usize; num_components];
        let mut any_solutions = false;
        let mut done = false;
        while !done {
            let scope = self.begin_scope();
            for (component, &index) in indices.iter().enumerate() {
                let partial = partials[component][index].clone();
                self.apply_solution(&partial);
            }

            if !self.worse_than_best_solution() {
                let solution = self.finalize(allow_free);
                if self.debug_enabled() {
                    debug!(
                        "{:indent$}(composed solution {})",
                        "",
                        solution.score,
                        indent = self.depth() * 2
                    );
                }
                solutions.push(solution);
                any_solutions = true;
            }
            self.rollback_scope(scope);

            // Advance the odometer.
            let mut position = num_components;
            loop {
                indices[position - 1] += 1;
                if indices[position - 1] < partials[position - 1].len() {
                    break;
                }
                if position == 1 {
                    done = true;
                    break;
                }
                for index in &mut indices[position - 1..] {
                    *index = 0;
                }
                position -= 1;
            }
        }

        any_solutions
    }

    // --------------------------------------------------------------------------
    // Branching
    // --------------------------------------------------------------------------

    pub(crate) fn solve_simplified(
        &mut self,
        solutions: &mut Vec<Solution>,
        allow_free: FreeTypeVariableBinding,
    ) -> bool {
        let (typevar_constraints, disjunctions) = self.collect_constraints_for_type_variables();

        if !typevar_constraints.is_empty() {
            // Pick the most promising variable to bind.
            let mut best_index = 0;
            let mut best_bindings = self.get_potential_bindings(&typevar_constraints[0]);
            for (index, tvc) in typevar_constraints.iter().enumerate().skip(1) {
                let bindings = self.get_potential_bindings(tvc);
                if bindings.is_empty() {
                    continue;
                }
                if best_bindings.is_empty() || bindings.better_than(&best_bindings) {
                    best_index = index;
                    best_bindings = bindings;
                }
            }

            // Guess a variable when its bindings are definite, or when
            // there is no disjunction to branch on instead.
            if !best_bindings.is_empty()
                && (disjunctions.is_empty()
                    || (!best_bindings.involves_type_variables && !best_bindings.fully_bound))
            {
                let bindings = std::mem::take(&mut best_bindings.bindings);
                return self.try_type_variable_bindings(
                    &typevar_constraints[best_index],
                    bindings,
                    solutions,
                    allow_free,
                );
            }
        }

        if disjunctions.is_empty() {
            // Under free-variable relaxation, conformance and type-member
            // residue is acceptable: those constraints cannot fail once
            // their variables are left generic.
            if allow_free != FreeTypeVariableBinding::Disallow && self.has_free_type_variables() {
                let mut any_non_conformance = false;
                for cid in self.active.ids(&self.arena) {
                    match &self.arena.node(cid).kind {
                        ConstraintKind::ConformsTo(..)
                        | ConstraintKind::SelfObjectOfProtocol(..)
                        | ConstraintKind::TypeMember { .. } => {}
                        _ => {
                            any_non_conformance = true;
                            break;
                        }
                    }
                }

                if self.worse_than_best_solution() {
                    return false;
                }

                if !any_non_conformance {
                    let solution = self.finalize(allow_free);
                    if self.debug_enabled() {
                        debug!(
                            "{:indent$}(found solution with free variables)",
                            "",
                            indent = self.depth() * 2
                        );
                    }
                    solutions.push(solution);
                    return true;
                }
            }
            return false;
        }

        // Branch on the smallest disjunction; two alternatives is as small
        // as a disjunction gets.
        let mut disjunction = disjunctions[0];
        let mut best_size = self.disjunction_len(disjunction);
        if best_size > 2 {
            for &contender in &disjunctions[1..] {
                let size = self.disjunction_len(contender);
                if size < best_size {
                    best_size = size;
                    disjunction = contender;
                    if best_size == 2 {
                        break;
                    }
                }
            }
        }

        self.solve_disjunction(disjunction, solutions, allow_free)
    }

    fn disjunction_len(&self, id: ConstraintId) -> usize {
        match &self.arena.node(id).kind {
            ConstraintKind::Disjunction(members) => members.len(),
            _ => unreachable!("not a disjunction"),
        }
    }

    fn solve_disjunction(
        &mut self,
        disjunction: ConstraintId,
        solutions: &mut Vec<Solution>,
        allow_free: FreeTypeVariableBinding,
    ) -> bool {
        // Detach the disjunction, remembering where to put it back.
        let reinsert_anchor = self.arena.node(disjunction).next;
        self.detach_from_active(disjunction);

        let ConstraintKind::Disjunction(alternatives) = self.arena.node(disjunction).kind.clone()
        else {
            unreachable!("not a disjunction")
        };
        let interpolation = matches!(
            self.arena.node(disjunction).locator.last_path_element(),
            Some(PathElem::InterpolationArgument)
        );

        self.state.as_mut().unwrap().stats.num_disjunctions += 1;
        let mut any_solved = false;

        for alternative in alternatives {
            // Once solved, don't bother with looser optional conversions.
            if any_solved
                && self.arena.node(alternative).restriction
                    == Some(ConversionRestriction::OptionalToOptional)
            {
                break;
            }

            let scope = self.begin_scope();
            self.state.as_mut().unwrap().stats.num_disjunction_terms += 1;
            if self.debug_enabled() {
                debug!(
                    "{:indent$}(assuming {:?})",
                    "",
                    self.arena.node(alternative).kind,
                    indent = self.depth() * 2
                );
            }

            match self.simplify_constraint(alternative) {
                SolutionKind::Error => {
                    if self.failed_constraint.is_none() {
                        self.failed_constraint = Some(alternative);
                    }
                }
                SolutionKind::Solved => {}
                SolutionKind::Unsolved => self.attach_active(alternative, false),
            }
            self.record_generated(alternative);

            let found = self.solve_rec(solutions, allow_free);
            self.rollback_scope(scope);

            if found {
                any_solved = true;
                // A successful tuple-to-tuple conversion, or a successful
                // conversion of an interpolation argument, is good enough:
                // stop enumerating.
                if self.arena.node(alternative).restriction
                    == Some(ConversionRestriction::TupleToTuple)
                {
                    break;
                }
                if interpolation
                    && matches!(
                        self.arena.node(alternative).kind,
                        ConstraintKind::Conversion(..)
                    )
                {
                    break;
                }
            }
        }

        self.reattach_before(disjunction, reinsert_anchor);
        any_solved
    }

    // --------------------------------------------------------------------------
    // Solution composition
    // --------------------------------------------------------------------------

    /// Snapshot the current state as a `Solution` and advance the best
    /// score. Free variables are handled per `allow_free`.
    pub(crate) fn finalize(&mut self, allow_free: FreeTypeVariableBinding) -> Solution {
        {
            let state = self.state.as_mut().unwrap();
            debug_assert!(state
                .best_score
                .map_or(true, |best| self.current_score <= best));
            state.best_score = Some(self.current_score);
        }

        let mut next_generic_index = 0u32;
        for tv in self.type_variables.clone() {
            if self.storage.fixed(tv).is_some() {
                continue;
            }
            match allow_free {
                FreeTypeVariableBinding::Disallow => {
                    unreachable!("solver left free type variables")
                }
                FreeTypeVariableBinding::Allow => {}
                FreeTypeVariableBinding::GenericParameters => {
                    self.assign_fixed(
                        tv,
                        Ty::GenericParam(next_generic_index).into(),
                        false,
                    );
                    next_generic_index += 1;
                }
            }
        }

        let type_bindings = self
            .type_variables
            .iter()
            .map(|&tv| (tv, self.storage.simplify_ty(&Ty::var(tv))))
            .collect();

        let overload_choices = self
            .resolved_overloads
            .iter()
            .map(|resolved| {
                (
                    resolved.locator.clone(),
                    crate::solution::OverloadSelection {
                        choice: resolved.choice.clone(),
                        opened_full_ty: resolved.opened_full_ty.clone(),
                        opened_ty: resolved.opened_ty.clone(),
                    },
                )
            })
            .collect();

        let restrictions = self
            .state
            .as_ref()
            .unwrap()
            .restrictions
            .iter()
            .map(|(a, b, restriction)| {
                (
                    (self.storage.simplify_ty(a), self.storage.simplify_ty(b)),
                    *restriction,
                )
            })
            .collect();

        Solution {
            type_bindings,
            overload_choices,
            restrictions,
            score: self.current_score,
        }
    }

    /// Replay a (partial) solution into the current state.
    pub(crate) fn apply_solution(&mut self, solution: &Solution) {
        self.current_score += solution.score;

        let known: FxHashSet<TyVarId> = self.type_variables.iter().copied().collect();
        for (&tv, ty) in &solution.type_bindings {
            if !known.contains(&tv) {
                self.type_variables.push(tv);
            }
            if self.storage.fixed(tv).is_none() && !ty.has_type_variable() {
                self.assign_fixed(tv, ty.clone(), false);
            }
        }

        for (locator, selection) in &solution.overload_choices {
            self.resolved_overloads.push(crate::solution::ResolvedOverload {
                locator: locator.clone(),
                choice: selection.choice.clone(),
                opened_full_ty: selection.opened_full_ty.clone(),
                opened_ty: selection.opened_ty.clone(),
            });
        }

        let state = self.state.as_mut().unwrap();
        for ((a, b), restriction) in &solution.restrictions {
            state.restrictions.push((a.clone(), b.clone(), *restriction));
        }
    }

    // --------------------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------------------

    /// Strictly worse: an equally-scored branch is still explored, so
    /// that ambiguity between equal solutions can surface.
    pub(crate) fn worse_than_best_solution(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.best_score)
            .is_some_and(|best| self.current_score > best)
    }

    pub(crate) fn has_free_type_variables(&self) -> bool {
        self.type_variables
            .iter()
            .any(|&tv| self.storage.fixed(tv).is_none())
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.debug)
    }

    pub(crate) fn depth(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.depth)
    }
}
