// ==============================================================================
// Solutions
// ==============================================================================
//
// The snapshot a successful leaf exports: every variable's binding, every
// overload set's selection, every conversion restriction applied, and the
// accumulated score. Solutions are ranked by score alone; the same `<`
// that prunes branches decides which solution wins.

use rustc_hash::FxHashMap;
use tern_ty::{TyRef, TyVarId};

use crate::constraint::{ConversionRestriction, Locator};
use crate::score::Score;
use crate::OverloadChoice;

/// What an overload set resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadSelection {
    pub choice: OverloadChoice,
    /// The choice's declared type, before opening.
    pub opened_full_ty: TyRef,
    /// The type the choice was used at (fresh variables substituted).
    pub opened_ty: TyRef,
}

/// One entry of the resolved-overloads stack. Append-only within a scope;
/// scope exit truncates back to its recorded prefix.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOverload {
    pub locator: Locator,
    pub choice: OverloadChoice,
    pub opened_full_ty: TyRef,
    pub opened_ty: TyRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub type_bindings: FxHashMap<TyVarId, TyRef>,
    pub overload_choices: FxHashMap<Locator, OverloadSelection>,
    pub restrictions: FxHashMap<(TyRef, TyRef), ConversionRestriction>,
    pub score: Score,
}

/// Pick the unique best solution by score, returning its index, or `None`
/// when the minimum is shared. With `minimize`, non-minimal solutions are
/// dropped even on a tie, bounding the combinations the component
/// composition step enumerates.
pub fn find_best_solution(solutions: &mut Vec<Solution>, minimize: bool) -> Option<usize> {
    match solutions.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }
    let best = solutions.iter().map(|s| s.score).min().unwrap();
    let mut best_index = None;
    let mut unique = true;
    for (i, solution) in solutions.iter().enumerate() {
        if solution.score == best {
            if best_index.is_some() {
                unique = false;
                break;
            }
            best_index = Some(i);
        }
    }
    if unique {
        return best_index;
    }
    if minimize {
        solutions.retain(|s| s.score == best);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreKind;

    fn solution_with(score: Score) -> Solution {
        Solution {
            type_bindings: FxHashMap::default(),
            overload_choices: FxHashMap::default(),
            restrictions: FxHashMap::default(),
            score,
        }
    }

    #[test]
    fn unique_best_wins() {
        let mut solutions = vec![
            solution_with(Score::unit(ScoreKind::UserConversion)),
            solution_with(Score::ZERO),
        ];
        assert_eq!(find_best_solution(&mut solutions, false), Some(1));
        assert_eq!(solutions.len(), 2);
    }

    #[test]
    fn tie_is_ambiguous() {
        let mut solutions = vec![solution_with(Score::ZERO), solution_with(Score::ZERO)];
        assert_eq!(find_best_solution(&mut solutions, false), None);
        assert_eq!(solutions.len(), 2);
    }

    #[test]
    fn minimize_drops_non_minimal() {
        let mut solutions = vec![
            solution_with(Score::ZERO),
            solution_with(Score::unit(ScoreKind::ForceUnwrap)),
            solution_with(Score::ZERO),
        ];
        assert_eq!(find_best_solution(&mut solutions, true), None);
        assert_eq!(solutions.len(), 2);
        assert!(solutions.iter().all(|s| s.score.is_zero()));
    }
}
