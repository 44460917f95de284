// ==============================================================================
// Solver Statistics
// ==============================================================================
//
// Per-attempt counters, flushed on solver-state teardown into process-wide
// "overall" totals and a "largest attempt" snapshot. The counters are
// advisory: relaxed atomics everywhere, and the largest-attempt update is
// check-then-store without a lock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering::Relaxed};

const NUM_COUNTERS: usize = 9;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SolverStatistics {
    pub num_states_explored: u32,
    pub num_simplified_constraints: u32,
    pub num_unsimplified_constraints: u32,
    pub num_simplify_iterations: u32,
    pub num_type_variables_bound: u32,
    pub num_type_variable_bindings: u32,
    pub num_disjunctions: u32,
    pub num_disjunction_terms: u32,
    pub num_components_split: u32,
}

impl SolverStatistics {
    fn as_array(&self) -> [u32; NUM_COUNTERS] {
        [
            self.num_states_explored,
            self.num_simplified_constraints,
            self.num_unsimplified_constraints,
            self.num_simplify_iterations,
            self.num_type_variables_bound,
            self.num_type_variable_bindings,
            self.num_disjunctions,
            self.num_disjunction_terms,
            self.num_components_split,
        ]
    }

    fn from_array(values: [u32; NUM_COUNTERS]) -> Self {
        SolverStatistics {
            num_states_explored: values[0],
            num_simplified_constraints: values[1],
            num_unsimplified_constraints: values[2],
            num_simplify_iterations: values[3],
            num_type_variables_bound: values[4],
            num_type_variable_bindings: values[5],
            num_disjunctions: values[6],
            num_disjunction_terms: values[7],
            num_components_split: values[8],
        }
    }
}

static NUM_SOLUTION_ATTEMPTS: AtomicU64 = AtomicU64::new(0);

const ZERO: AtomicU32 = AtomicU32::new(0);
static OVERALL: [AtomicU32; NUM_COUNTERS] = [ZERO; NUM_COUNTERS];
static LARGEST: [AtomicU32; NUM_COUNTERS] = [ZERO; NUM_COUNTERS];
static LARGEST_ATTEMPT: AtomicU64 = AtomicU64::new(0);

/// Claim the next attempt number (1-based).
pub(crate) fn next_solution_attempt() -> u64 {
    NUM_SOLUTION_ATTEMPTS.fetch_add(1, Relaxed) + 1
}

/// Fold one attempt's counters into the process-wide totals.
pub(crate) fn flush(stats: &SolverStatistics, attempt: u64) {
    let values = stats.as_array();
    for (total, value) in OVERALL.iter().zip(values) {
        total.fetch_add(value, Relaxed);
    }
    if stats.num_states_explored > LARGEST[0].load(Relaxed) {
        for (slot, value) in LARGEST.iter().zip(values) {
            slot.store(value, Relaxed);
        }
        LARGEST_ATTEMPT.store(attempt, Relaxed);
    }
}

/// Totals across every attempt so far.
pub fn overall() -> SolverStatistics {
    SolverStatistics::from_array(std::array::from_fn(|i| OVERALL[i].load(Relaxed)))
}

/// The attempt that explored the most states, and its counters.
pub fn largest() -> (u64, SolverStatistics) {
    let stats = SolverStatistics::from_array(std::array::from_fn(|i| LARGEST[i].load(Relaxed)));
    (LARGEST_ATTEMPT.load(Relaxed), stats)
}
