//! Lattice contract for abstract domains
//!
//! A lattice element exposes its degenerate cases through `is_bottom` and
//! `is_top`. The public operations (`less_equal`, `join`, `meet`, `widening`)
//! settle every combination involving bottom or top themselves and only
//! delegate to the `do_*` hooks when both operands are proper elements:
//!
//! - Bottom (⊥) = no concrete state, e.g. an infeasible path
//! - Top (⊤) = any concrete state
//!
//! Domains therefore only implement the proper/proper case, and the wrappers
//! stay total even when a hook is undefined on degenerate input.
//!
//! Operations take their operands by value and return the result, so a state
//! handed to one branch of a conditional can never alias the state of the
//! other branch.

use crate::expressions::VariableIdentifier;
use std::fmt::Debug;

/// A mutable lattice element with bottom/top short-circuiting.
pub trait Lattice: Clone + Debug + PartialEq + Sized {
    /// The least element with the same shape as `self`.
    fn bottom(&self) -> Self;

    /// The greatest element with the same shape as `self`.
    fn top(&self) -> Self;

    fn is_bottom(&self) -> bool;

    fn is_top(&self) -> bool;

    /// Partial order on two proper elements.
    fn do_less_equal(&self, other: &Self) -> bool;

    /// Least upper bound of two proper elements.
    fn do_join(self, other: Self) -> Self;

    /// Greatest lower bound of two proper elements.
    fn do_meet(self, other: Self) -> Self;

    /// Widening of two proper elements; must over-approximate `do_join`.
    fn do_widening(self, other: Self) -> Self;

    /// `self ⊑ other`
    fn less_equal(&self, other: &Self) -> bool {
        if self.is_bottom() || other.is_top() {
            true
        } else if other.is_bottom() || self.is_top() {
            false
        } else {
            self.do_less_equal(other)
        }
    }

    /// `self ⊔ other`
    fn join(self, other: Self) -> Self {
        if self.is_bottom() || other.is_top() {
            other
        } else if other.is_bottom() || self.is_top() {
            self
        } else {
            self.do_join(other)
        }
    }

    /// `self ⊓ other`
    fn meet(self, other: Self) -> Self {
        if self.is_top() || other.is_bottom() {
            other
        } else if other.is_top() || self.is_bottom() {
            self
        } else {
            self.do_meet(other)
        }
    }

    /// `self ∇ other`
    fn widening(self, other: Self) -> Self {
        if self.is_bottom() || other.is_top() {
            other
        } else if other.is_bottom() || self.is_top() {
            self
        } else {
            self.do_widening(other)
        }
    }

    /// Join of all `elements`, starting from bottom.
    fn big_join<I>(&self, elements: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        elements.into_iter().fold(self.bottom(), Lattice::join)
    }

    /// Meet of all `elements`, starting from top.
    fn big_meet<I>(&self, elements: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        elements.into_iter().fold(self.top(), Lattice::meet)
    }
}

/// Lattices with sound abstract arithmetic.
pub trait ArithmeticLattice: Lattice {
    fn neg(self) -> Self;

    fn add(self, other: Self) -> Self;

    fn sub(self, other: Self) -> Self;

    fn mult(self, other: Self) -> Self;

    fn div(self, other: Self) -> Self;
}

/// Lattices that can represent the truth values of a condition.
pub trait BooleanLattice: Lattice {
    fn false_value(&self) -> Self;

    fn true_value(&self) -> Self;

    /// Either truth value.
    fn maybe_value(&self) -> Self;

    fn is_false(&self) -> bool;

    fn is_true(&self) -> bool;

    fn is_maybe(&self) -> bool;
}

/// Lattices keyed by program variables whose variable set can change when a
/// lexical scope is entered or left.
pub trait EnvironmentLattice: Lattice {
    type Element: Lattice;

    fn variables(&self) -> Vec<&VariableIdentifier>;

    fn add_variable(&mut self, variable: VariableIdentifier, element: Self::Element);

    fn remove_variable(&mut self, variable: &VariableIdentifier) -> Option<Self::Element>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// Four-level chain `0 ⊏ 1 ⊏ 2 ⊏ 3` whose hooks refuse degenerate input.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Chain(pub u8);

    impl Chain {
        pub(crate) fn new(level: u8) -> Self {
            Chain(level % 4)
        }

        fn assert_proper(&self) {
            assert!(!self.is_bottom() && !self.is_top(), "hook called on {self:?}");
        }
    }

    impl Lattice for Chain {
        fn bottom(&self) -> Self {
            Chain(0)
        }

        fn top(&self) -> Self {
            Chain(3)
        }

        fn is_bottom(&self) -> bool {
            self.0 == 0
        }

        fn is_top(&self) -> bool {
            self.0 == 3
        }

        fn do_less_equal(&self, other: &Self) -> bool {
            self.assert_proper();
            other.assert_proper();
            self.0 <= other.0
        }

        fn do_join(self, other: Self) -> Self {
            self.assert_proper();
            other.assert_proper();
            Chain(self.0.max(other.0))
        }

        fn do_meet(self, other: Self) -> Self {
            self.assert_proper();
            other.assert_proper();
            Chain(self.0.min(other.0))
        }

        fn do_widening(self, other: Self) -> Self {
            self.assert_proper();
            other.assert_proper();
            if other.0 > self.0 {
                Chain(3)
            } else {
                self
            }
        }
    }

    #[test]
    fn test_join_short_circuits_bottom_and_top() {
        let bottom = Chain(0);
        let top = Chain(3);
        let mid = Chain(1);

        assert_eq!(bottom.join(mid), mid);
        assert_eq!(mid.join(bottom), mid);
        assert_eq!(mid.join(top), top);
        assert_eq!(top.join(mid), top);
        assert_eq!(bottom.join(top), top);
    }

    #[test]
    fn test_meet_short_circuits_bottom_and_top() {
        let bottom = Chain(0);
        let top = Chain(3);
        let mid = Chain(2);

        assert_eq!(top.meet(mid), mid);
        assert_eq!(mid.meet(top), mid);
        assert_eq!(mid.meet(bottom), bottom);
        assert_eq!(bottom.meet(mid), bottom);
    }

    #[test]
    fn test_widening_delegates_only_for_proper_elements() {
        assert_eq!(Chain(0).widening(Chain(2)), Chain(2));
        assert_eq!(Chain(2).widening(Chain(0)), Chain(2));
        assert_eq!(Chain(1).widening(Chain(2)), Chain(3));
        assert_eq!(Chain(2).widening(Chain(1)), Chain(2));
    }

    #[test]
    fn test_big_join_and_big_meet() {
        let proto = Chain(1);
        assert_eq!(proto.big_join(vec![Chain(1), Chain(2), Chain(0)]), Chain(2));
        assert_eq!(proto.big_join(Vec::new()), Chain(0));
        assert_eq!(proto.big_meet(vec![Chain(2), Chain(1)]), Chain(1));
        assert_eq!(proto.big_meet(Vec::new()), Chain(3));
    }

    #[quickcheck]
    fn prop_bottom_below_everything(level: u8) -> bool {
        let x = Chain::new(level);
        x.bottom().less_equal(&x) && x.less_equal(&x.top())
    }

    #[quickcheck]
    fn prop_join_meet_commute(a: u8, b: u8) -> bool {
        let (x, y) = (Chain::new(a), Chain::new(b));
        x.join(y) == y.join(x) && x.meet(y) == y.meet(x)
    }

    #[quickcheck]
    fn prop_order_consistent_with_join_and_meet(a: u8, b: u8) -> bool {
        let (x, y) = (Chain::new(a), Chain::new(b));
        !x.less_equal(&y) || (x.join(y) == y && x.meet(y) == x)
    }

    #[quickcheck]
    fn prop_widening_covers_join(a: u8, b: u8) -> bool {
        let (x, y) = (Chain::new(a), Chain::new(b));
        x.join(y).less_equal(&x.widening(y))
    }
}
