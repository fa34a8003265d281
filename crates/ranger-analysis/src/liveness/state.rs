//! Backward liveness state
//!
//! Tracks the set of strongly live variables before each statement. When a
//! forward interval result is threaded in, statements it proves unreachable
//! leave nothing live.

use crate::interval::IntervalState;
use indexmap::IndexSet;
use ranger_core::{AnalysisError, Expression, ExpressionSet, Lattice, ProgramPoint, State, VariableIdentifier};
use std::fmt;
use tracing::trace;

/// Set of strongly live variables.
///
/// Bottom marks program points no execution reaches; it is kept apart from
/// the reachable state where nothing is live.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessState {
    variables: IndexSet<VariableIdentifier>,
    live: IndexSet<VariableIdentifier>,
    reachable: bool,
    result: ExpressionSet,
}

impl LivenessState {
    /// Nothing live yet: the state at program exit.
    pub fn new<I>(variables: I) -> Self
    where
        I: IntoIterator<Item = VariableIdentifier>,
    {
        Self {
            variables: variables.into_iter().collect(),
            live: IndexSet::new(),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    pub fn is_live(&self, variable: &VariableIdentifier) -> bool {
        self.live.contains(variable)
    }

    pub fn live(&self) -> impl Iterator<Item = &VariableIdentifier> {
        self.live.iter()
    }

    fn uses(mut self, expression: &Expression) -> Self {
        let used = expression.variables().into_iter().filter(|v| self.variables.contains(v));
        self.live.extend(used.collect::<Vec<_>>());
        self
    }
}

impl Lattice for LivenessState {
    fn bottom(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            live: IndexSet::new(),
            reachable: false,
            result: ExpressionSet::new(),
        }
    }

    fn top(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            live: self.variables.clone(),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        !self.reachable
    }

    fn is_top(&self) -> bool {
        self.reachable && self.live.len() == self.variables.len()
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.live.is_subset(&other.live)
    }

    fn do_join(mut self, other: Self) -> Self {
        self.live.extend(other.live);
        self.result = ExpressionSet::new();
        self
    }

    fn do_meet(mut self, other: Self) -> Self {
        self.live.retain(|v| other.live.contains(v));
        self.result = ExpressionSet::new();
        self
    }

    /// Finite height, so joining is enough.
    fn do_widening(self, other: Self) -> Self {
        self.do_join(other)
    }
}

impl State for LivenessState {
    type Precursory = IntervalState;

    fn result(&self) -> &ExpressionSet {
        &self.result
    }

    fn set_result(&mut self, result: ExpressionSet) {
        self.result = result;
    }

    /// Statements the interval analysis proves unreachable keep nothing live.
    fn before(self, pp: ProgramPoint, precursory: Option<&IntervalState>) -> Self {
        if precursory.is_some_and(Lattice::is_bottom) {
            trace!(%pp, "unreachable statement");
            return self.bottom();
        }
        self
    }

    fn do_assign(self, left: &Expression, _right: &Expression) -> Result<Self, AnalysisError> {
        Err(AnalysisError::unsupported(
            "liveness",
            format!("forward assignment to {left}"),
        ))
    }

    fn do_assume(self, condition: &Expression) -> Result<Self, AnalysisError> {
        Ok(self.uses(condition))
    }

    fn do_substitute(mut self, left: &Expression, right: &Expression) -> Result<Self, AnalysisError> {
        match left {
            Expression::Variable(variable) => {
                if self.live.shift_remove(variable) {
                    Ok(self.uses(right))
                } else {
                    Ok(self)
                }
            }
            Expression::Subscription { target, key, .. } => match target.as_ref() {
                // the container stays live: only one entry is overwritten
                Expression::Variable(container) if self.live.contains(container) => {
                    Ok(self.uses(key).uses(right))
                }
                Expression::Variable(_) => Ok(self),
                _ => Err(AnalysisError::unsupported(
                    "liveness",
                    format!("substitution of {left}"),
                )),
            },
            _ => Err(AnalysisError::unsupported(
                "liveness",
                format!("substitution of {left}"),
            )),
        }
    }

    fn do_output(self, output: &Expression) -> Result<Self, AnalysisError> {
        Ok(self.uses(output))
    }
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "⊥");
        }
        let names: Vec<_> = self.live.iter().map(|v| v.name.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranger_core::{ArithmeticOperator, ComparisonOperator, Type};

    fn var(name: &str) -> VariableIdentifier {
        VariableIdentifier::new(name, Type::Int)
    }

    fn state() -> LivenessState {
        LivenessState::new([var("x"), var("y"), var("z")])
    }

    fn set(e: Expression) -> ExpressionSet {
        [e].into_iter().collect()
    }

    fn substitute(state: LivenessState, left: &str, right: Expression) -> LivenessState {
        state
            .substitute(&set(Expression::variable(&var(left))), &set(right))
            .unwrap()
    }

    fn sum(a: &str, b: &str) -> Expression {
        Expression::binary_arithmetic(
            Expression::variable(&var(a)),
            ArithmeticOperator::Add,
            Expression::variable(&var(b)),
        )
    }

    #[test]
    fn test_dead_assignments_do_not_make_operands_live() {
        let s = substitute(state(), "z", sum("x", "y"));
        assert_eq!(s.live().count(), 0);
    }

    #[test]
    fn test_live_assignment_transfers_liveness() {
        let s = state().output(&set(Expression::variable(&var("z")))).unwrap();
        assert!(s.is_live(&var("z")));
        let s = substitute(s, "z", sum("x", "y"));
        assert!(!s.is_live(&var("z")));
        assert!(s.is_live(&var("x")) && s.is_live(&var("y")));
        assert_eq!(s.to_string(), "{x, y}");
    }

    #[test]
    fn test_conditions_are_uses() {
        let cond = Expression::comparison(Expression::variable(&var("x")), ComparisonOperator::Lt, Expression::int(3));
        let s = state().assume(&set(cond)).unwrap();
        assert!(s.is_live(&var("x")));
    }

    #[test]
    fn test_unreachable_precursory_state_is_bottom() {
        let interval = IntervalState::new([var("x")]);
        let s = state().before(ProgramPoint::default(), Some(&interval.bottom()));
        assert!(s.is_bottom());
        assert_eq!(s.to_string(), "⊥");
        let s = state().before(ProgramPoint::default(), Some(&interval));
        assert!(!s.is_bottom());
    }

    #[test]
    fn test_assign_is_unsupported() {
        let err = state()
            .assign(&set(Expression::variable(&var("x"))), &set(Expression::int(1)))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported { domain: "liveness", .. }));
    }

    #[test]
    fn test_lattice_shape() {
        let a = state().output(&set(Expression::variable(&var("x")))).unwrap();
        let b = state().output(&set(Expression::variable(&var("y")))).unwrap();
        let joined = a.clone().join(b.clone());
        assert!(a.less_equal(&joined) && b.less_equal(&joined));
        assert_eq!(a.meet(b).live().count(), 0);
        assert!(state().top().is_top());
        assert!(state().bottom().less_equal(&state()));
    }
}
