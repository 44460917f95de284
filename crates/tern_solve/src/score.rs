// ==============================================================================
// Solution Scoring
// ==============================================================================
//
// A lexicographic tuple of penalty counters. The same derived ordering is
// used everywhere: pruning a branch against the best known solution and
// ranking finished solutions must agree, so the field order is fixed here
// and nowhere else.

use std::fmt;
use std::ops::{Add, AddAssign, SubAssign};

/// The penalty dimensions, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    ForceUnwrap = 0,
    ValueToOptional = 1,
    UserConversion = 2,
}

const NUM_SCORE_KINDS: usize = 3;

/// A solution's accumulated cost. Componentwise non-negative; addition is
/// commutative with zero as identity, so component scores compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Score([u32; NUM_SCORE_KINDS]);

impl Score {
    pub const ZERO: Score = Score([0; NUM_SCORE_KINDS]);

    pub fn unit(kind: ScoreKind) -> Score {
        let mut s = Score::ZERO;
        s.0[kind as usize] = 1;
        s
    }

    pub fn get(&self, kind: ScoreKind) -> u32 {
        self.0[kind as usize]
    }

    pub fn is_zero(&self) -> bool {
        *self == Score::ZERO
    }
}

impl Add for Score {
    type Output = Score;

    fn add(mut self, rhs: Score) -> Score {
        self += rhs;
        self
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl SubAssign for Score {
    fn sub_assign(&mut self, rhs: Score) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            debug_assert!(*a >= b, "score subtraction went negative");
            *a -= b;
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [unwraps, val_to_opt, user] = self.0;
        write!(f, "<unwraps={unwraps} value-to-optional={val_to_opt} user-conversions={user}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_order() {
        let a = Score::unit(ScoreKind::UserConversion);
        let b = Score::unit(ScoreKind::ForceUnwrap);
        // One force-unwrap outweighs any number of user conversions.
        assert!(a < b);
        assert!(a + a + a < b);
        assert!(Score::ZERO < a);
    }

    #[test]
    fn add_sub_roundtrip() {
        let a = Score::unit(ScoreKind::ValueToOptional) + Score::unit(ScoreKind::UserConversion);
        let mut c = a + Score::unit(ScoreKind::ValueToOptional);
        c -= a;
        assert_eq!(c, Score::unit(ScoreKind::ValueToOptional));
        assert_eq!(Score::ZERO + a, a);
    }
}
