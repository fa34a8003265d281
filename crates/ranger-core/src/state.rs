//! Analysis state contract
//!
//! A [`State`] is a lattice element that additionally knows how to transform
//! itself across statements. Concrete analyses implement the `do_*` hooks for
//! a single expression (or pair of expressions); the provided methods lift
//! them to the expression *sets* produced by the semantics, joining the
//! outcome of every alternative.

use crate::error::AnalysisError;
use crate::expressions::{Expression, ExpressionSet};
use crate::lattice::Lattice;
use crate::statements::ProgramPoint;
use std::fmt::Debug;

pub trait State: Lattice {
    /// State type of the analysis this one may be tethered to.
    type Precursory: Clone + Debug;

    /// Expressions computed by the most recently evaluated statement.
    fn result(&self) -> &ExpressionSet;

    fn set_result(&mut self, result: ExpressionSet);

    /// Bind the program point (and the matching precursory state, if any)
    /// before a statement is executed.
    fn before(self, _pp: ProgramPoint, _precursory: Option<&Self::Precursory>) -> Self {
        self
    }

    fn do_assign(self, left: &Expression, right: &Expression) -> Result<Self, AnalysisError>;

    fn do_assume(self, condition: &Expression) -> Result<Self, AnalysisError>;

    fn do_substitute(self, left: &Expression, right: &Expression) -> Result<Self, AnalysisError>;

    fn do_output(self, output: &Expression) -> Result<Self, AnalysisError>;

    fn enter_if(self) -> Self {
        self
    }

    fn exit_if(self) -> Self {
        self
    }

    fn enter_loop(self) -> Self {
        self
    }

    fn exit_loop(self) -> Self {
        self
    }

    /// Forward assignment of every right-hand side to every left-hand side.
    fn assign(self, left: &ExpressionSet, right: &ExpressionSet) -> Result<Self, AnalysisError> {
        let pairs = left.iter().flat_map(|l| right.iter().map(move |r| (l, r))).collect();
        join_each(self, pairs, |state, (l, r)| state.do_assign(l, r))
    }

    /// Restrict the state to the concrete states satisfying one of `condition`.
    fn assume(self, condition: &ExpressionSet) -> Result<Self, AnalysisError> {
        join_each(self, condition.iter().collect(), |state, c| state.do_assume(c))
    }

    /// Backward counterpart of [`State::assign`].
    fn substitute(self, left: &ExpressionSet, right: &ExpressionSet) -> Result<Self, AnalysisError> {
        let pairs = left.iter().flat_map(|l| right.iter().map(move |r| (l, r))).collect();
        join_each(self, pairs, |state, (l, r)| state.do_substitute(l, r))
    }

    /// Record that `output` is observed by the program.
    fn output(self, output: &ExpressionSet) -> Result<Self, AnalysisError> {
        join_each(self, output.iter().collect(), |state, o| state.do_output(o))
    }

    /// Assume the current result and clear it.
    fn filter(self) -> Result<Self, AnalysisError> {
        let condition = self.result().clone();
        self.assume(&condition)
    }

    /// The path is infeasible from here on.
    fn raise_error(self) -> Self {
        self.bottom()
    }
}

/// Apply `apply` to a copy of `state` per item and join the outcomes.
///
/// Bottom states and empty item lists are returned unchanged. The result set
/// is always cleared afterwards.
fn join_each<S, T, F>(state: S, mut items: Vec<T>, apply: F) -> Result<S, AnalysisError>
where
    S: State,
    F: Fn(S, T) -> Result<S, AnalysisError>,
{
    let last = match items.pop() {
        Some(last) if !state.is_bottom() => last,
        _ => return Ok(cleared(state)),
    };
    let mut joined: Option<S> = None;
    for item in items {
        let outcome = apply(state.clone(), item)?;
        joined = Some(match joined {
            Some(acc) => acc.join(outcome),
            None => outcome,
        });
    }
    let outcome = apply(state, last)?;
    let joined = match joined {
        Some(acc) => acc.join(outcome),
        None => outcome,
    };
    Ok(cleared(joined))
}

fn cleared<S: State>(mut state: S) -> S {
    state.set_result(ExpressionSet::new());
    state
}
