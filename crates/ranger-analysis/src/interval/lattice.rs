//! Interval lattice over the extended reals
//!
//! An element is a range `[lower, upper]` with bounds in ℝ ∪ {-∞, +∞}:
//! - Bottom (⊥) = the empty range, kept in the canonical form `[+∞, -∞]`
//! - Top (⊤) = `[-∞, +∞]`

use ranger_core::{ArithmeticLattice, BooleanLattice, Lattice};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalLattice {
    lower: f64,
    upper: f64,
}

impl IntervalLattice {
    pub const TOP: IntervalLattice = IntervalLattice {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    pub const BOTTOM: IntervalLattice = IntervalLattice {
        lower: f64::INFINITY,
        upper: f64::NEG_INFINITY,
    };

    /// `[lower, upper]`, or bottom if the range is empty or lies entirely at
    /// an infinity.
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower.is_nan() || upper.is_nan() || lower > upper || lower == f64::INFINITY || upper == f64::NEG_INFINITY {
            Self::BOTTOM
        } else {
            Self { lower, upper }
        }
    }

    pub fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    /// `[0, +∞]`, the range of a length.
    pub fn non_negative() -> Self {
        Self::new(0.0, f64::INFINITY)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Exactly one value.
    pub fn is_singleton(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Only whole numbers between the bounds are kept.
    pub fn integral(self) -> Self {
        if self.is_bottom() {
            return self;
        }
        Self::new(self.lower.ceil(), self.upper.floor())
    }
}

impl Lattice for IntervalLattice {
    fn bottom(&self) -> Self {
        Self::BOTTOM
    }

    fn top(&self) -> Self {
        Self::TOP
    }

    fn is_bottom(&self) -> bool {
        self.lower > self.upper
    }

    fn is_top(&self) -> bool {
        self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        other.lower <= self.lower && self.upper <= other.upper
    }

    fn do_join(self, other: Self) -> Self {
        Self::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    fn do_meet(self, other: Self) -> Self {
        Self::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    fn do_widening(self, other: Self) -> Self {
        let lower = if other.lower < self.lower {
            f64::NEG_INFINITY
        } else {
            self.lower
        };
        let upper = if other.upper > self.upper {
            f64::INFINITY
        } else {
            self.upper
        };
        Self::new(lower, upper)
    }
}

/// `a * b` with `0 * ∞ = 0`.
fn mult_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

impl ArithmeticLattice for IntervalLattice {
    fn neg(self) -> Self {
        if self.is_bottom() {
            return self;
        }
        Self::new(-self.upper, -self.lower)
    }

    fn add(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::BOTTOM;
        }
        Self::new(self.lower + other.lower, self.upper + other.upper)
    }

    fn sub(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::BOTTOM;
        }
        Self::new(self.lower - other.upper, self.upper - other.lower)
    }

    fn mult(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::BOTTOM;
        }
        let corners = [
            mult_bound(self.lower, other.lower),
            mult_bound(self.lower, other.upper),
            mult_bound(self.upper, other.lower),
            mult_bound(self.upper, other.upper),
        ];
        let lower = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::new(lower, upper)
    }

    /// Any quotient: division is not tracked.
    fn div(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::BOTTOM;
        }
        Self::TOP
    }
}

impl BooleanLattice for IntervalLattice {
    fn false_value(&self) -> Self {
        Self::point(0.0)
    }

    fn true_value(&self) -> Self {
        Self::point(1.0)
    }

    fn maybe_value(&self) -> Self {
        Self::new(0.0, 1.0)
    }

    fn is_false(&self) -> bool {
        *self == self.false_value()
    }

    fn is_true(&self) -> bool {
        *self == self.true_value()
    }

    fn is_maybe(&self) -> bool {
        *self == self.maybe_value()
    }
}

impl Default for IntervalLattice {
    fn default() -> Self {
        Self::TOP
    }
}

impl fmt::Display for IntervalLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "⊥")
        } else {
            write!(f, "[{}, {}]", self.lower, self.upper)
        }
    }
}
