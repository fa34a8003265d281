//! Forward interval analysis state
//!
//! Numeric variables map to intervals. Containers and sequences are
//! summarized by the range of their length and, for containers, by the join
//! of their keys and the join of their values. An empty container has top
//! summaries: emptiness is carried by its length alone.

use super::evaluation::{evaluate, length, refine, NumericEnvironment, Refinement, View};
use super::lattice::IntervalLattice;
use ranger_core::{
    AnalysisError, ArithmeticOperator, EnvironmentLattice, Expression, ExpressionSet, Lattice, Role, State,
    Store, Type, VariableIdentifier,
};
use std::fmt;
use tracing::trace;

/// Store identifiers used for a program variable.
pub(crate) fn tracked(variable: &VariableIdentifier, summaries: bool) -> Vec<VariableIdentifier> {
    let mut ids = Vec::new();
    if variable.typ.is_numeric() {
        ids.push(variable.clone());
    }
    if variable.has_length() {
        ids.push(variable.length_of());
        if summaries && variable.typ.is_container() {
            ids.push(variable.keys_of());
            ids.push(variable.values_of());
        }
    }
    ids
}

/// Initial range of a store identifier.
pub(crate) fn initial(variable: &VariableIdentifier) -> IntervalLattice {
    match variable.role {
        Role::Length => IntervalLattice::non_negative(),
        _ => IntervalLattice::TOP,
    }
}

/// Bottom summaries stand for an empty container and are widened to top.
fn summary(range: IntervalLattice) -> IntervalLattice {
    if range.is_bottom() {
        IntervalLattice::TOP
    } else {
        range
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalState {
    store: Store<IntervalLattice>,
    reachable: bool,
    result: ExpressionSet,
}

impl IntervalState {
    pub fn new<I>(variables: I) -> Self
    where
        I: IntoIterator<Item = VariableIdentifier>,
    {
        let ids: Vec<_> = variables.into_iter().flat_map(|v| tracked(&v, true)).collect();
        Self {
            store: Store::new(ids, initial),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    pub fn store(&self) -> &Store<IntervalLattice> {
        &self.store
    }

    pub fn get(&self, variable: &VariableIdentifier) -> Option<IntervalLattice> {
        self.store.get(variable).copied()
    }

    /// Track a variable introduced by an entered scope, starting unconstrained.
    pub fn enter_scope<'v, I>(&mut self, variables: I)
    where
        I: IntoIterator<Item = &'v VariableIdentifier>,
    {
        for id in variables.into_iter().flat_map(|v| tracked(v, true)) {
            if !self.store.contains(&id) {
                let range = initial(&id);
                self.store.add_variable(id, range);
            }
        }
    }

    /// Forget the variables of a scope being left.
    pub fn exit_scope<'v, I>(&mut self, variables: I)
    where
        I: IntoIterator<Item = &'v VariableIdentifier>,
    {
        for id in variables.into_iter().flat_map(|v| tracked(v, true)) {
            self.store.remove_variable(&id);
        }
    }

    fn set(&mut self, variable: VariableIdentifier, range: IntervalLattice) {
        if self.store.contains(&variable) {
            self.store.set(variable, range);
        }
    }

    /// Bottom as soon as any identifier, lengths included, has no value.
    fn normalized(self) -> Self {
        if self.store.iter().any(|(_, range)| range.is_bottom()) {
            self.bottom()
        } else {
            self
        }
    }

    fn assign_container(&mut self, container: &VariableIdentifier, value: &Expression) -> Result<(), AnalysisError> {
        let len = length(self, value)?;
        let (keys, values) = self.summaries(value)?;
        self.set(container.length_of(), len);
        self.set(container.keys_of(), summary(keys));
        self.set(container.values_of(), summary(values));
        Ok(())
    }

    /// Key and value summaries of a container-valued expression.
    fn summaries(&self, value: &Expression) -> Result<(IntervalLattice, IntervalLattice), AnalysisError> {
        let top = IntervalLattice::TOP;
        Ok(match value {
            Expression::Variable(other) if other.has_length() => {
                (self.value(&other.keys_of()), self.value(&other.values_of()))
            }
            Expression::ListDisplay { items, .. } => {
                let indices = IntervalLattice::new(0.0, items.len() as f64 - 1.0);
                (indices, self.join_all(items)?)
            }
            Expression::SetDisplay { items, .. } => {
                let members = self.join_all(items)?;
                (members, members)
            }
            Expression::DictDisplay { keys, values, .. } => (self.join_all(keys)?, self.join_all(values)?),
            Expression::Range { start, stop, step } => {
                let start = evaluate(self, start)?;
                let stop = evaluate(self, stop)?;
                let step = evaluate(self, step)?;
                let values = if step.lower() > 0.0 {
                    IntervalLattice::new(start.lower(), stop.upper() - 1.0)
                } else {
                    top
                };
                (IntervalLattice::non_negative(), values)
            }
            Expression::Slicing { target, .. } => {
                let (_, values) = self.summaries(target)?;
                (IntervalLattice::non_negative(), values)
            }
            Expression::BinaryArithmetic {
                left,
                operator: ArithmeticOperator::Add,
                right,
                ..
            } => {
                let (_, left) = self.summaries(left)?;
                let (_, right) = self.summaries(right)?;
                (IntervalLattice::non_negative(), left.join(right))
            }
            // a key view is a set: its members are also its keys
            Expression::Keys(target) => {
                let (keys, _) = self.summaries(target)?;
                (keys, keys)
            }
            Expression::Values(target) => {
                let (_, values) = self.summaries(target)?;
                let len = length(self, target)?;
                (IntervalLattice::new(0.0, len.upper() - 1.0), values)
            }
            _ => (top, top),
        })
    }

    fn join_all(&self, items: &[Expression]) -> Result<IntervalLattice, AnalysisError> {
        let mut joined = IntervalLattice::BOTTOM;
        for item in items {
            joined = joined.join(evaluate(self, item)?);
        }
        Ok(joined)
    }

    /// `container[key] = value`
    fn assign_item(
        &mut self,
        container: &VariableIdentifier,
        key: &Expression,
        value: &Expression,
    ) -> Result<bool, AnalysisError> {
        let key = evaluate(self, key)?;
        let value = evaluate(self, value)?;
        if key.is_bottom() || value.is_bottom() {
            return Ok(false);
        }
        let len = self.value(&container.length_of());
        match &container.typ {
            Type::Dict(_, _) => {
                if len.upper() == 0.0 {
                    trace!(%container, "strong update of empty dictionary");
                    self.set(container.keys_of(), key);
                    self.set(container.values_of(), value);
                    self.set(container.length_of(), IntervalLattice::point(1.0));
                } else {
                    let keys = self.value(&container.keys_of()).join(key);
                    let values = self.value(&container.values_of()).join(value);
                    self.set(container.keys_of(), keys);
                    self.set(container.values_of(), values);
                    self.set(
                        container.length_of(),
                        IntervalLattice::new(len.lower().max(1.0), len.upper() + 1.0),
                    );
                }
                Ok(true)
            }
            Type::List(_) => {
                if len.upper() == 0.0 {
                    // index out of range
                    return Ok(false);
                }
                let values = self.value(&container.values_of()).join(value);
                self.set(container.values_of(), values);
                Ok(true)
            }
            other => Err(AnalysisError::unsupported(
                "interval",
                format!("item assignment to a value of type {other}"),
            )),
        }
    }
}

impl NumericEnvironment for IntervalState {
    fn value(&self, variable: &VariableIdentifier) -> IntervalLattice {
        self.get(variable).unwrap_or_else(|| initial(variable))
    }

    fn element(&self, container: &VariableIdentifier, key: &IntervalLattice) -> IntervalLattice {
        if self.value(&container.length_of()).upper() == 0.0 {
            return IntervalLattice::BOTTOM;
        }
        if matches!(container.typ, Type::Dict(_, _)) && self.value(&container.keys_of()).meet(*key).is_bottom() {
            return IntervalLattice::BOTTOM;
        }
        self.value(&container.values_of())
    }

    fn members(&self, container: &VariableIdentifier, view: View) -> IntervalLattice {
        if self.value(&container.length_of()).upper() == 0.0 {
            return IntervalLattice::BOTTOM;
        }
        match view {
            View::Keys => self.value(&container.keys_of()),
            View::Values => self.value(&container.values_of()),
        }
    }
}

impl Lattice for IntervalState {
    fn bottom(&self) -> Self {
        Self {
            store: self.store.bottom(),
            reachable: false,
            result: ExpressionSet::new(),
        }
    }

    fn top(&self) -> Self {
        Self {
            store: self.store.top(),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        !self.reachable || self.store.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.reachable && self.store.is_top()
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.store.less_equal(&other.store)
    }

    fn do_join(self, other: Self) -> Self {
        Self {
            store: self.store.join(other.store),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    fn do_meet(self, other: Self) -> Self {
        Self {
            store: self.store.meet(other.store),
            reachable: true,
            result: ExpressionSet::new(),
        }
        .normalized()
    }

    fn do_widening(self, other: Self) -> Self {
        Self {
            store: self.store.widening(other.store),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }
}

impl State for IntervalState {
    type Precursory = ();

    fn result(&self) -> &ExpressionSet {
        &self.result
    }

    fn set_result(&mut self, result: ExpressionSet) {
        self.result = result;
    }

    fn do_assign(mut self, left: &Expression, right: &Expression) -> Result<Self, AnalysisError> {
        match left {
            Expression::Variable(variable) if variable.typ.is_numeric() => {
                let value = evaluate(&self, right)?;
                self.set(variable.clone(), value);
            }
            Expression::Variable(variable) if variable.has_length() => {
                self.assign_container(variable, right)?;
            }
            // values of other types are not tracked
            Expression::Variable(_) => {}
            Expression::Subscription { target, key, .. } => match target.as_ref() {
                Expression::Variable(container) if container.has_length() => {
                    if !self.assign_item(container, key, right)? {
                        return Ok(self.bottom());
                    }
                }
                _ => {
                    return Err(AnalysisError::unsupported(
                        "interval",
                        format!("assignment to {left}"),
                    ))
                }
            },
            _ => {
                return Err(AnalysisError::unsupported(
                    "interval",
                    format!("assignment to {left}"),
                ))
            }
        }
        Ok(self.normalized())
    }

    fn do_assume(mut self, condition: &Expression) -> Result<Self, AnalysisError> {
        match refine(&self, condition)? {
            Refinement::Infeasible => Ok(self.bottom()),
            Refinement::Constrain(constraints) => {
                for (variable, range) in constraints {
                    let refined = self.value(&variable).meet(range);
                    if refined.is_bottom() {
                        return Ok(self.bottom());
                    }
                    self.set(variable, refined);
                }
                Ok(self)
            }
        }
    }

    fn do_substitute(self, left: &Expression, _right: &Expression) -> Result<Self, AnalysisError> {
        Err(AnalysisError::unsupported(
            "interval",
            format!("backward substitution of {left}"),
        ))
    }

    fn do_output(self, _output: &Expression) -> Result<Self, AnalysisError> {
        Ok(self)
    }
}

impl fmt::Display for IntervalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "⊥")
        } else {
            write!(f, "{}", self.store)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranger_core::{ComparisonOperator, Literal};

    fn x() -> VariableIdentifier {
        VariableIdentifier::new("x", Type::Int)
    }

    fn d() -> VariableIdentifier {
        VariableIdentifier::new("d", Type::dict(Type::Int, Type::Int))
    }

    fn l() -> VariableIdentifier {
        VariableIdentifier::new("l", Type::list(Type::Int))
    }

    fn state() -> IntervalState {
        IntervalState::new([x(), d(), l()])
    }

    fn set(e: Expression) -> ExpressionSet {
        [e].into_iter().collect()
    }

    fn assign(state: IntervalState, left: Expression, right: Expression) -> IntervalState {
        state.assign(&set(left), &set(right)).unwrap()
    }

    fn item(container: &VariableIdentifier, key: Expression) -> Expression {
        Expression::Subscription {
            typ: Type::Int,
            target: Box::new(Expression::variable(container)),
            key: Box::new(key),
        }
    }

    fn empty_dict() -> Expression {
        Expression::DictDisplay {
            typ: d().typ,
            keys: vec![],
            values: vec![],
        }
    }

    #[test]
    fn test_initial_store_layout() {
        let s = state();
        assert_eq!(s.get(&x()), Some(IntervalLattice::TOP));
        assert_eq!(s.get(&d().length_of()), Some(IntervalLattice::non_negative()));
        assert_eq!(s.get(&l().values_of()), Some(IntervalLattice::TOP));
        assert_eq!(s.get(&d()), None);
    }

    #[test]
    fn test_scalar_assignment() {
        let s = assign(state(), Expression::variable(&x()), Expression::int(3));
        let s = assign(
            s,
            Expression::variable(&x()),
            Expression::binary_arithmetic(Expression::variable(&x()), ArithmeticOperator::Add, Expression::int(2)),
        );
        assert_eq!(s.get(&x()), Some(IntervalLattice::point(5.0)));
    }

    #[test]
    fn test_dictionary_updates() {
        let s = assign(state(), Expression::variable(&d()), empty_dict());
        assert_eq!(s.get(&d().length_of()), Some(IntervalLattice::point(0.0)));

        let s = assign(s, item(&d(), Expression::int(1)), Expression::int(5));
        assert_eq!(s.get(&d().length_of()), Some(IntervalLattice::point(1.0)));
        assert_eq!(s.get(&d().keys_of()), Some(IntervalLattice::point(1.0)));
        assert_eq!(s.get(&d().values_of()), Some(IntervalLattice::point(5.0)));

        let s = assign(s, item(&d(), Expression::int(2)), Expression::int(7));
        assert_eq!(s.get(&d().length_of()), Some(IntervalLattice::new(1.0, 2.0)));
        assert_eq!(s.get(&d().keys_of()), Some(IntervalLattice::new(1.0, 2.0)));
        assert_eq!(s.get(&d().values_of()), Some(IntervalLattice::new(5.0, 7.0)));
    }

    #[test]
    fn test_reading_from_empty_dictionary_is_infeasible() {
        let s = assign(state(), Expression::variable(&d()), empty_dict());
        let s = assign(s, Expression::variable(&x()), item(&d(), Expression::int(0)));
        assert!(s.is_bottom());
    }

    #[test]
    fn test_list_display() {
        let display = Expression::ListDisplay {
            typ: l().typ,
            items: vec![Expression::int(1), Expression::int(2), Expression::int(3)],
        };
        let s = assign(state(), Expression::variable(&l()), display);
        assert_eq!(s.get(&l().length_of()), Some(IntervalLattice::point(3.0)));
        assert_eq!(s.get(&l().keys_of()), Some(IntervalLattice::new(0.0, 2.0)));
        assert_eq!(s.get(&l().values_of()), Some(IntervalLattice::new(1.0, 3.0)));
    }

    #[test]
    fn test_scope_adds_and_removes_variables() {
        let local = VariableIdentifier::new("n", Type::Int);
        let mut s = assign(state(), Expression::variable(&x()), Expression::int(1));
        s.enter_scope([&local, &l()]);
        assert_eq!(s.get(&local), Some(IntervalLattice::TOP));
        assert_eq!(s.store().len(), state().store().len() + 1);

        let mut s = assign(s, Expression::variable(&local), Expression::variable(&x()));
        assert_eq!(s.get(&local), Some(IntervalLattice::point(1.0)));

        s.exit_scope([&local]);
        assert_eq!(s.get(&local), None);
        assert_eq!(s.get(&x()), Some(IntervalLattice::point(1.0)));
        assert_eq!(s.store().len(), state().store().len());
    }

    #[test]
    fn test_dictionary_views() {
        let members = VariableIdentifier::new("k", Type::set(Type::Int));
        let s = IntervalState::new([d(), l(), members.clone()]);
        let display = Expression::DictDisplay {
            typ: d().typ,
            keys: vec![Expression::int(1), Expression::int(2)],
            values: vec![Expression::int(5), Expression::int(7)],
        };
        let s = assign(s, Expression::variable(&d()), display);

        let s = assign(s, Expression::variable(&members), Expression::Keys(Box::new(Expression::variable(&d()))));
        assert_eq!(s.get(&members.length_of()), Some(IntervalLattice::new(1.0, 2.0)));
        assert_eq!(s.get(&members.keys_of()), Some(IntervalLattice::new(1.0, 2.0)));
        assert_eq!(s.get(&members.values_of()), Some(IntervalLattice::new(1.0, 2.0)));

        let s = assign(s, Expression::variable(&l()), Expression::Values(Box::new(Expression::variable(&d()))));
        assert_eq!(s.get(&l().length_of()), Some(IntervalLattice::new(1.0, 2.0)));
        assert_eq!(s.get(&l().keys_of()), Some(IntervalLattice::new(0.0, 1.0)));
        assert_eq!(s.get(&l().values_of()), Some(IntervalLattice::new(5.0, 7.0)));
    }

    #[test]
    fn test_assume_refines_and_detects_infeasibility() {
        let s = assign(state(), Expression::variable(&x()), Expression::Input(Type::Int));
        let cond = Expression::comparison(Expression::variable(&x()), ComparisonOperator::GtE, Expression::int(0));
        let s = s.assume(&set(cond)).unwrap();
        assert_eq!(s.get(&x()), Some(IntervalLattice::non_negative()));

        let cond = Expression::comparison(Expression::variable(&x()), ComparisonOperator::Lt, Expression::int(0));
        assert!(s.assume(&set(cond)).unwrap().is_bottom());
    }

    #[test]
    fn test_membership_in_empty_list_is_infeasible() {
        let empty = Expression::ListDisplay {
            typ: l().typ,
            items: vec![],
        };
        let s = assign(state(), Expression::variable(&l()), empty);
        let cond = Expression::comparison(Expression::variable(&x()), ComparisonOperator::In, Expression::variable(&l()));
        assert!(s.assume(&set(cond)).unwrap().is_bottom());
    }

    #[test]
    fn test_substitute_is_unsupported() {
        let err = state()
            .substitute(&set(Expression::variable(&x())), &set(Expression::Literal(Literal::Int(1))))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unsupported { domain: "interval", .. }));
    }

    #[test]
    fn test_join_and_display() {
        let a = assign(state(), Expression::variable(&x()), Expression::int(1));
        let b = assign(state(), Expression::variable(&x()), Expression::int(4));
        let joined = a.join(b);
        assert_eq!(joined.get(&x()), Some(IntervalLattice::new(1.0, 4.0)));
        assert!(joined.to_string().starts_with("x -> [1, 4]"));
        assert_eq!(joined.bottom().to_string(), "⊥");
    }
}
