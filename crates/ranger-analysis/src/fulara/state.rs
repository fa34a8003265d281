//! Forward Fulara analysis state
//!
//! Scalars and container lengths are kept as intervals. The contents of every
//! list and dictionary variable are kept as a [`FularaLattice`] of interval
//! keys and interval values, so individual entries can be updated strongly.

use super::lattice::FularaLattice;
use super::wrappers::{IntervalKeyWrapper, IntervalValueWrapper, KeyWrapper};
use crate::interval::state::{initial, tracked};
use crate::interval::{evaluate, length, refine, IntervalLattice, NumericEnvironment, Refinement, View};
use ranger_core::{
    AnalysisError, ArithmeticOperator, Expression, ExpressionSet, Lattice, State, Store, Type, VariableIdentifier,
};
use std::fmt;
use tracing::trace;

pub type IntervalFulara = FularaLattice<IntervalKeyWrapper, IntervalValueWrapper>;

fn segmented(variable: &VariableIdentifier) -> bool {
    variable.is_plain() && matches!(variable.typ, Type::List(_) | Type::Dict(_, _))
}

fn key_proto(container: &Type) -> IntervalKeyWrapper {
    let region = IntervalLattice::TOP;
    if container.key_type().is_integral() {
        IntervalKeyWrapper::integral(region)
    } else {
        IntervalKeyWrapper::real(region)
    }
}

fn any_content(container: &Type) -> IntervalFulara {
    FularaLattice::new(key_proto(container), IntervalValueWrapper(IntervalLattice::TOP))
}

fn no_content(container: &Type) -> IntervalFulara {
    FularaLattice::empty(key_proto(container), IntervalValueWrapper(IntervalLattice::TOP))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FularaState {
    scalars: Store<IntervalLattice>,
    contents: Store<IntervalFulara>,
    reachable: bool,
    result: ExpressionSet,
}

impl FularaState {
    pub fn new<I>(variables: I) -> Self
    where
        I: IntoIterator<Item = VariableIdentifier>,
    {
        let variables: Vec<_> = variables.into_iter().collect();
        let scalars = variables.iter().flat_map(|v| tracked(v, false));
        let containers = variables.iter().filter(|v| segmented(v)).cloned();
        Self {
            scalars: Store::new(scalars, initial),
            contents: Store::new(containers, |v| any_content(&v.typ)),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    pub fn scalar(&self, variable: &VariableIdentifier) -> Option<IntervalLattice> {
        self.scalars.get(variable).copied()
    }

    pub fn contents(&self, container: &VariableIdentifier) -> Option<&IntervalFulara> {
        self.contents.get(container)
    }

    fn set_scalar(&mut self, variable: VariableIdentifier, range: IntervalLattice) {
        if self.scalars.contains(&variable) {
            self.scalars.set(variable, range);
        }
    }

    fn normalized(self) -> Self {
        let empty_range = self.scalars.iter().any(|(_, range)| range.is_bottom());
        if empty_range || self.contents.is_bottom() {
            self.bottom()
        } else {
            self
        }
    }

    /// Key region of `container[key]` among the keys that can exist.
    fn key_region(&self, container: &VariableIdentifier, key: IntervalLattice) -> IntervalLattice {
        match container.typ {
            Type::List(_) => {
                let len = self.value(&container.length_of());
                let indices = IntervalLattice::new(0.0, len.upper() - 1.0);
                if key.lower() < 0.0 {
                    // negative indices count from the end
                    indices
                } else {
                    key.meet(indices)
                }
            }
            _ => key,
        }
    }

    /// Abstract contents of a container-valued expression.
    fn content_of(&self, typ: &Type, value: &Expression) -> Result<IntervalFulara, AnalysisError> {
        let keys = key_proto(typ);
        let values = IntervalValueWrapper(IntervalLattice::TOP);
        let spread = |summary: IntervalLattice| {
            FularaLattice::from_segments(
                keys,
                values,
                vec![(keys.with_region(IntervalLattice::non_negative()), IntervalValueWrapper(summary))],
            )
        };
        Ok(match value {
            Expression::Variable(other) => match self.contents.get(other) {
                Some(content) => content.clone(),
                None => any_content(typ),
            },
            Expression::ListDisplay { items, .. } => {
                let mut content = no_content(typ);
                for (index, item) in items.iter().enumerate() {
                    let key = keys.with_region(IntervalLattice::point(index as f64));
                    content = content.partition_add(key, IntervalValueWrapper(evaluate(self, item)?));
                }
                content
            }
            Expression::DictDisplay { keys: ks, values: vs, .. } => {
                let mut content = no_content(typ);
                for (k, v) in ks.iter().zip(vs) {
                    let key = keys.with_region(evaluate(self, k)?);
                    let value = IntervalValueWrapper(evaluate(self, v)?);
                    content = if key.is_singleton() {
                        content.partition_add(key, value)
                    } else {
                        content.normalized_add(key, value)
                    };
                }
                content
            }
            Expression::Range { start, stop, step } => {
                let start = evaluate(self, start)?;
                let stop = evaluate(self, stop)?;
                if evaluate(self, step)?.lower() > 0.0 {
                    spread(IntervalLattice::new(start.lower(), stop.upper() - 1.0))
                } else {
                    spread(IntervalLattice::TOP)
                }
            }
            Expression::Slicing { target, .. } => spread(self.joined_values(target)),
            Expression::Values(target) => spread(self.joined_values(target)),
            Expression::Keys(target) => spread(self.joined_keys(target)),
            Expression::BinaryArithmetic {
                left,
                operator: ArithmeticOperator::Add,
                right,
                ..
            } => spread(self.joined_values(left).join(self.joined_values(right))),
            _ => any_content(typ),
        })
    }

    fn joined_values(&self, expression: &Expression) -> IntervalLattice {
        match expression {
            Expression::Variable(container) => match self.contents.get(container) {
                Some(content) => content.get_values_joined().interval(),
                None => IntervalLattice::TOP,
            },
            _ => IntervalLattice::TOP,
        }
    }

    fn joined_keys(&self, expression: &Expression) -> IntervalLattice {
        match expression {
            Expression::Variable(container) => match self.contents.get(container) {
                Some(content) => content.get_keys_joined().interval(),
                None => IntervalLattice::TOP,
            },
            _ => IntervalLattice::TOP,
        }
    }

    fn assign_container(&mut self, container: &VariableIdentifier, value: &Expression) -> Result<(), AnalysisError> {
        let len = length(self, value)?;
        self.set_scalar(container.length_of(), len);
        if self.contents.contains(container) {
            let content = if len.upper() == 0.0 {
                no_content(&container.typ)
            } else {
                self.content_of(&container.typ, value)?
            };
            self.contents.set(container.clone(), content);
        }
        Ok(())
    }

    /// `container[key] = value`; `false` when the assignment cannot succeed.
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
        let Some(content) = self.contents.get(container).cloned() else {
            return Err(AnalysisError::unsupported(
                "fulara",
                format!("item assignment to a value of type {}", container.typ),
            ));
        };
        let len = self.value(&container.length_of());
        let region = self.key_region(container, key);
        if region.is_bottom() {
            // index out of range
            return Ok(false);
        }
        let proto = key_proto(&container.typ);
        let key = proto.with_region(region);
        let value = IntervalValueWrapper(value);
        let updated = if key.is_singleton() {
            content.clone().partition_add(key, value)
        } else {
            trace!(%container, region = %key, "weak update");
            content.clone().partition_update(vec![(key, value)])
        };
        if matches!(container.typ, Type::Dict(_, _)) {
            let fresh = content.get_keys_joined().meet(key).is_bottom();
            let len = if fresh {
                IntervalLattice::new(len.lower() + 1.0, len.upper() + 1.0)
            } else {
                IntervalLattice::new(len.lower().max(1.0), len.upper() + 1.0)
            };
            self.set_scalar(container.length_of(), len);
        }
        self.contents.set(container.clone(), updated);
        Ok(true)
    }
}

impl NumericEnvironment for FularaState {
    fn value(&self, variable: &VariableIdentifier) -> IntervalLattice {
        self.scalar(variable).unwrap_or_else(|| initial(variable))
    }

    /// Keys outside every segment are absent, so reading them is infeasible.
    fn element(&self, container: &VariableIdentifier, key: &IntervalLattice) -> IntervalLattice {
        if self.value(&container.length_of()).upper() == 0.0 {
            return IntervalLattice::BOTTOM;
        }
        let Some(content) = self.contents.get(container) else {
            return IntervalLattice::TOP;
        };
        let region = self.key_region(container, *key);
        if region.is_bottom() {
            return IntervalLattice::BOTTOM;
        }
        content.values_at(&key_proto(&container.typ).with_region(region)).interval()
    }

    fn members(&self, container: &VariableIdentifier, view: View) -> IntervalLattice {
        if self.value(&container.length_of()).upper() == 0.0 {
            return IntervalLattice::BOTTOM;
        }
        let Some(content) = self.contents.get(container) else {
            return IntervalLattice::TOP;
        };
        match view {
            View::Keys => content.get_keys_joined().interval(),
            View::Values => content.get_values_joined().interval(),
        }
    }
}

impl Lattice for FularaState {
    fn bottom(&self) -> Self {
        Self {
            scalars: self.scalars.bottom(),
            contents: self.contents.bottom(),
            reachable: false,
            result: ExpressionSet::new(),
        }
    }

    fn top(&self) -> Self {
        Self {
            scalars: self.scalars.top(),
            contents: self.contents.top(),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        !self.reachable || self.scalars.is_bottom() || self.contents.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.reachable && self.scalars.is_top() && self.contents.is_top()
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.scalars.less_equal(&other.scalars) && self.contents.less_equal(&other.contents)
    }

    fn do_join(self, other: Self) -> Self {
        Self {
            scalars: self.scalars.join(other.scalars),
            contents: self.contents.join(other.contents),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }

    fn do_meet(self, other: Self) -> Self {
        Self {
            scalars: self.scalars.meet(other.scalars),
            contents: self.contents.meet(other.contents),
            reachable: true,
            result: ExpressionSet::new(),
        }
        .normalized()
    }

    fn do_widening(self, other: Self) -> Self {
        Self {
            scalars: self.scalars.widening(other.scalars),
            contents: self.contents.widening(other.contents),
            reachable: true,
            result: ExpressionSet::new(),
        }
    }
}

impl State for FularaState {
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
                self.set_scalar(variable.clone(), value);
            }
            Expression::Variable(variable) if variable.has_length() => {
                self.assign_container(variable, right)?;
            }
            Expression::Variable(_) => {}
            Expression::Subscription { target, key, .. } => match target.as_ref() {
                Expression::Variable(container) if container.has_length() => {
                    if !self.assign_item(container, key, right)? {
                        return Ok(self.bottom());
                    }
                }
                _ => {
                    return Err(AnalysisError::unsupported(
                        "fulara",
                        format!("assignment to {left}"),
                    ))
                }
            },
            _ => {
                return Err(AnalysisError::unsupported(
                    "fulara",
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
                    self.set_scalar(variable, refined);
                }
                Ok(self)
            }
        }
    }

    fn do_substitute(self, left: &Expression, _right: &Expression) -> Result<Self, AnalysisError> {
        Err(AnalysisError::unsupported(
            "fulara",
            format!("backward substitution of {left}"),
        ))
    }

    fn do_output(self, _output: &Expression) -> Result<Self, AnalysisError> {
        Ok(self)
    }
}

impl fmt::Display for FularaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "⊥");
        }
        write!(f, "{}", self.scalars)?;
        if !self.contents.is_empty() {
            write!(f, " | {}", self.contents)?;
        }
        Ok(())
    }
}
