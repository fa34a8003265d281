//! Key and value abstractions of Fulara segments

use crate::interval::IntervalLattice;
use ranger_core::Lattice;
use std::fmt;

/// Abstraction of a region of container keys.
pub trait KeyWrapper: Lattice {
    /// The region holds exactly one key, so an update through it can be strong.
    fn is_singleton(&self) -> bool;

    /// The parts of `self` lying outside `exclude`, pairwise disjoint and
    /// without bottom elements.
    ///
    /// Returns `None` when the difference is not representable in the key
    /// domain.
    fn decomp(&self, exclude: &Self) -> Option<Vec<Self>>;
}

/// Abstraction of the values stored under a key region.
pub trait ValueWrapper: Lattice {
    /// Value summary used when nothing is known about the stored values.
    fn unknown(&self) -> Self {
        self.top()
    }
}

/// Magnitude from which consecutive integers are no longer distinct `f64`s.
const EXACT_INTEGERS: f64 = 9_007_199_254_740_992.0;

/// Interval of keys.
///
/// Integral regions (list indices, integer dictionary keys) decompose
/// exactly; any other region cannot be split and forces weak updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalKeyWrapper {
    interval: IntervalLattice,
    integral: bool,
}

impl IntervalKeyWrapper {
    /// Region of integer keys; fractional bounds are rounded inwards.
    pub fn integral(interval: IntervalLattice) -> Self {
        Self {
            interval: interval.integral(),
            integral: true,
        }
    }

    pub fn real(interval: IntervalLattice) -> Self {
        Self {
            interval,
            integral: false,
        }
    }

    pub fn interval(&self) -> IntervalLattice {
        self.interval
    }

    pub fn is_integral(&self) -> bool {
        self.integral
    }

    /// Same kind of key over another region.
    pub fn with_region(&self, region: IntervalLattice) -> Self {
        if self.integral {
            Self::integral(region)
        } else {
            Self::real(region)
        }
    }

    fn with(&self, interval: IntervalLattice) -> Self {
        Self {
            interval,
            integral: self.integral,
        }
    }

    fn combined(self, other: Self, interval: IntervalLattice) -> Self {
        let integral = self.integral && other.integral;
        Self {
            interval: if integral { interval.integral() } else { interval },
            integral,
        }
    }
}

impl Lattice for IntervalKeyWrapper {
    fn bottom(&self) -> Self {
        self.with(IntervalLattice::BOTTOM)
    }

    fn top(&self) -> Self {
        self.with(IntervalLattice::TOP)
    }

    fn is_bottom(&self) -> bool {
        self.interval.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.interval.is_top()
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.interval.less_equal(&other.interval)
    }

    fn do_join(self, other: Self) -> Self {
        self.combined(other, self.interval.join(other.interval))
    }

    fn do_meet(self, other: Self) -> Self {
        self.combined(other, self.interval.meet(other.interval))
    }

    fn do_widening(self, other: Self) -> Self {
        self.combined(other, self.interval.widening(other.interval))
    }
}

impl KeyWrapper for IntervalKeyWrapper {
    fn is_singleton(&self) -> bool {
        !self.is_bottom() && self.interval.is_singleton()
    }

    fn decomp(&self, exclude: &Self) -> Option<Vec<Self>> {
        if !self.integral {
            return None;
        }
        let overlap = self.interval.meet(exclude.interval).integral();
        if overlap.is_bottom() {
            return Some(vec![*self]);
        }
        // neighbours of a bound are not representable past 2^53
        if [overlap.lower(), overlap.upper()]
            .iter()
            .any(|bound| bound.is_finite() && bound.abs() >= EXACT_INTEGERS)
        {
            return None;
        }
        let mut pieces = Vec::with_capacity(2);
        if overlap.lower() > self.interval.lower() {
            pieces.push(self.with(IntervalLattice::new(self.interval.lower(), overlap.lower() - 1.0)));
        }
        if overlap.upper() < self.interval.upper() {
            pieces.push(self.with(IntervalLattice::new(overlap.upper() + 1.0, self.interval.upper())));
        }
        pieces.retain(|piece| !piece.is_bottom());
        Some(pieces)
    }
}

impl fmt::Display for IntervalKeyWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interval)
    }
}

/// Interval of stored values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalValueWrapper(pub IntervalLattice);

impl IntervalValueWrapper {
    pub fn interval(&self) -> IntervalLattice {
        self.0
    }
}

impl Lattice for IntervalValueWrapper {
    fn bottom(&self) -> Self {
        Self(IntervalLattice::BOTTOM)
    }

    fn top(&self) -> Self {
        Self(IntervalLattice::TOP)
    }

    fn is_bottom(&self) -> bool {
        self.0.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.0.is_top()
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.0.less_equal(&other.0)
    }

    fn do_join(self, other: Self) -> Self {
        Self(self.0.join(other.0))
    }

    fn do_meet(self, other: Self) -> Self {
        Self(self.0.meet(other.0))
    }

    fn do_widening(self, other: Self) -> Self {
        Self(self.0.widening(other.0))
    }
}

impl ValueWrapper for IntervalValueWrapper {}

impl fmt::Display for IntervalValueWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
