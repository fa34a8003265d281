//! Interval evaluation and condition refinement
//!
//! Both the interval state and the Fulara state answer numeric questions the
//! same way; they differ only in how a container is read. That difference is
//! captured by [`NumericEnvironment`].

use super::lattice::IntervalLattice;
use indexmap::IndexMap;
use ranger_core::{
    AnalysisError, ArithmeticLattice, ArithmeticOperator, BooleanLattice, BooleanOperator, ComparisonOperator,
    Expression, Lattice, Literal, Type, UnaryArithmeticOperator, VariableIdentifier,
};

/// Which component of a container a membership test looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Keys,
    Values,
}

impl View {
    /// `x in c` looks at the keys of a dictionary and the items of anything else.
    pub fn of_membership(container: &Type) -> Self {
        match container {
            Type::Dict(_, _) => View::Keys,
            _ => View::Values,
        }
    }
}

/// Numeric facts an abstract state can answer.
pub trait NumericEnvironment {
    /// Range of a scalar identifier, including length identifiers.
    fn value(&self, variable: &VariableIdentifier) -> IntervalLattice;

    /// Range of `container[key]`; bottom when no such key can exist.
    fn element(&self, container: &VariableIdentifier, key: &IntervalLattice) -> IntervalLattice;

    /// Join of all keys or all values of `container`; bottom when empty.
    fn members(&self, container: &VariableIdentifier, view: View) -> IntervalLattice;
}

/// Constraints a condition imposes on the identifiers it mentions.
#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    /// The condition cannot hold.
    Infeasible,
    /// Each identifier must lie within the given range.
    Constrain(IndexMap<VariableIdentifier, IntervalLattice>),
}

impl Refinement {
    pub fn unconstrained() -> Self {
        Refinement::Constrain(IndexMap::new())
    }

    fn single(variable: Option<VariableIdentifier>, range: IntervalLattice) -> Self {
        if range.is_bottom() {
            return Refinement::Infeasible;
        }
        let mut constraints = IndexMap::new();
        if let Some(variable) = variable {
            constraints.insert(variable, range);
        }
        Refinement::Constrain(constraints)
    }

    /// Both conditions hold.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Refinement::Constrain(mut left), Refinement::Constrain(right)) => {
                for (variable, range) in right {
                    let merged = match left.get(&variable) {
                        Some(existing) => existing.meet(range),
                        None => range,
                    };
                    if merged.is_bottom() {
                        return Refinement::Infeasible;
                    }
                    left.insert(variable, merged);
                }
                Refinement::Constrain(left)
            }
            _ => Refinement::Infeasible,
        }
    }

    /// At least one condition holds.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Refinement::Infeasible, other) | (other, Refinement::Infeasible) => other,
            (Refinement::Constrain(left), Refinement::Constrain(right)) => Refinement::Constrain(
                left.into_iter()
                    .filter_map(|(variable, range)| right.get(&variable).map(|r| (variable, range.join(*r))))
                    .collect(),
            ),
        }
    }
}

/// Identifier whose range a condition on `expression` can tighten.
fn refinable(expression: &Expression) -> Option<VariableIdentifier> {
    match expression {
        Expression::Variable(variable) if variable.typ.is_numeric() => Some(variable.clone()),
        Expression::Length(target) => match target.as_ref() {
            Expression::Variable(container) if container.has_length() => Some(container.length_of()),
            _ => None,
        },
        _ => None,
    }
}

/// Range of the numeric value of `expression`.
///
/// Expressions of non-numeric type evaluate to top: their values are not
/// tracked by this domain.
pub fn evaluate<E: NumericEnvironment>(env: &E, expression: &Expression) -> Result<IntervalLattice, AnalysisError> {
    let top = IntervalLattice::TOP;
    Ok(match expression {
        Expression::Literal(literal) => literal.as_f64().map_or(top, IntervalLattice::point),
        Expression::Variable(variable) => {
            if variable.typ.is_numeric() {
                env.value(variable)
            } else {
                top
            }
        }
        Expression::Input(Type::Bool) => top.maybe_value(),
        Expression::Input(_) => top,
        Expression::ListDisplay { .. }
        | Expression::SetDisplay { .. }
        | Expression::DictDisplay { .. }
        | Expression::Range { .. }
        | Expression::Keys(_)
        | Expression::Values(_)
        | Expression::Slicing { .. } => top,
        Expression::Length(target) => length(env, target)?,
        Expression::AttributeReference { target, attribute, .. } => {
            return Err(AnalysisError::unsupported(
                "interval",
                format!("attribute reference {target}.{attribute}"),
            ))
        }
        Expression::Subscription { typ, target, key } => {
            let key = evaluate(env, key)?;
            match target.as_ref() {
                Expression::Variable(container) if container.has_length() => {
                    let element = env.element(container, &key);
                    if typ.is_numeric() || element.is_bottom() {
                        element
                    } else {
                        top
                    }
                }
                _ => top,
            }
        }
        Expression::UnaryArithmetic {
            operator, expression, ..
        } => {
            let value = evaluate(env, expression)?;
            match operator {
                UnaryArithmeticOperator::Plus => value,
                UnaryArithmeticOperator::Minus => value.neg(),
            }
        }
        Expression::UnaryBoolean(operand) => {
            let value = truth(evaluate(env, operand)?);
            if value.is_true() {
                top.false_value()
            } else if value.is_false() {
                top.true_value()
            } else {
                value
            }
        }
        Expression::BinaryArithmetic {
            typ,
            left,
            operator,
            right,
        } => {
            if !typ.is_numeric() {
                return Ok(top);
            }
            let left = evaluate(env, left)?;
            let right = evaluate(env, right)?;
            match operator {
                ArithmeticOperator::Add => left.add(right),
                ArithmeticOperator::Sub => left.sub(right),
                ArithmeticOperator::Mult => left.mult(right),
                ArithmeticOperator::Div => left.div(right),
            }
        }
        Expression::BinaryBoolean {
            left,
            operator,
            right,
        } => {
            let left = truth(evaluate(env, left)?);
            let right = truth(evaluate(env, right)?);
            if left.is_bottom() || right.is_bottom() {
                IntervalLattice::BOTTOM
            } else {
                match operator {
                    BooleanOperator::And if left.is_false() || right.is_false() => top.false_value(),
                    BooleanOperator::And if left.is_true() && right.is_true() => top.true_value(),
                    BooleanOperator::Or if left.is_true() || right.is_true() => top.true_value(),
                    BooleanOperator::Or if left.is_false() && right.is_false() => top.false_value(),
                    _ => top.maybe_value(),
                }
            }
        }
        Expression::BinaryComparison {
            left,
            operator,
            right,
        } => compare(env, left, *operator, right)?,
    })
}

/// Truth value of a numeric range: zero is false, anything else true.
fn truth(value: IntervalLattice) -> IntervalLattice {
    if value.is_bottom() || value.is_false() {
        value
    } else if !value.contains(0.0) {
        value.true_value()
    } else {
        value.maybe_value()
    }
}

fn compare<E: NumericEnvironment>(
    env: &E,
    left: &Expression,
    operator: ComparisonOperator,
    right: &Expression,
) -> Result<IntervalLattice, AnalysisError> {
    let maybe = IntervalLattice::TOP.maybe_value();
    if !(left.typ().is_numeric() && right.typ().is_numeric()) {
        return Ok(maybe);
    }
    let l = evaluate(env, left)?;
    let r = evaluate(env, right)?;
    if l.is_bottom() || r.is_bottom() {
        return Ok(IntervalLattice::BOTTOM);
    }
    let (holds, fails) = match operator {
        ComparisonOperator::Lt => (l.upper() < r.lower(), l.lower() >= r.upper()),
        ComparisonOperator::LtE => (l.upper() <= r.lower(), l.lower() > r.upper()),
        ComparisonOperator::Gt => (l.lower() > r.upper(), l.upper() <= r.lower()),
        ComparisonOperator::GtE => (l.lower() >= r.upper(), l.upper() < r.lower()),
        ComparisonOperator::Eq | ComparisonOperator::Is => {
            (l.is_singleton() && l == r, l.meet(r).is_bottom())
        }
        ComparisonOperator::NotEq | ComparisonOperator::IsNot => {
            (l.meet(r).is_bottom(), l.is_singleton() && l == r)
        }
        ComparisonOperator::In | ComparisonOperator::NotIn => (false, false),
    };
    Ok(if holds {
        maybe.true_value()
    } else if fails {
        maybe.false_value()
    } else {
        maybe
    })
}

/// Range of the length of a sequence or container expression.
pub fn length<E: NumericEnvironment>(env: &E, expression: &Expression) -> Result<IntervalLattice, AnalysisError> {
    let unknown = IntervalLattice::non_negative();
    Ok(match expression {
        Expression::Variable(variable) if variable.has_length() => env.value(&variable.length_of()),
        Expression::Literal(Literal::Str(s)) => IntervalLattice::point(s.chars().count() as f64),
        Expression::ListDisplay { items, .. } => IntervalLattice::point(items.len() as f64),
        Expression::SetDisplay { items, .. } => distinct(items.len()),
        Expression::DictDisplay { keys, .. } => distinct(keys.len()),
        Expression::Range { start, stop, step } => {
            let start = evaluate(env, start)?;
            let stop = evaluate(env, stop)?;
            let step = evaluate(env, step)?;
            if start.is_singleton() && stop.is_singleton() && step.is_singleton() && step.lower() != 0.0 {
                let count = ((stop.lower() - start.lower()) / step.lower()).ceil().max(0.0);
                IntervalLattice::point(count)
            } else {
                unknown
            }
        }
        Expression::Keys(target) | Expression::Values(target) => length(env, target)?,
        Expression::Slicing { target, .. } => {
            let whole = length(env, target)?;
            IntervalLattice::new(0.0, whole.upper())
        }
        Expression::BinaryArithmetic {
            typ,
            left,
            operator: ArithmeticOperator::Add,
            right,
        } if typ.is_sequence() => length(env, left)?.add(length(env, right)?),
        _ => unknown,
    })
}

/// Size of a collection built from `n` possibly equal items.
fn distinct(n: usize) -> IntervalLattice {
    IntervalLattice::new(n.min(1) as f64, n as f64)
}

/// Constraints under which `condition` evaluates to true.
pub fn refine<E: NumericEnvironment>(env: &E, condition: &Expression) -> Result<Refinement, AnalysisError> {
    match condition {
        Expression::Literal(_) | Expression::Input(_) => {
            let value = evaluate(env, condition)?;
            Ok(if value.is_false() {
                Refinement::Infeasible
            } else {
                Refinement::unconstrained()
            })
        }
        Expression::Variable(variable) => {
            let value = truth(evaluate(env, condition)?);
            if value.is_false() || value.is_bottom() {
                Ok(Refinement::Infeasible)
            } else if variable.typ == Type::Bool {
                Ok(Refinement::single(Some(variable.clone()), value.true_value()))
            } else {
                Ok(Refinement::unconstrained())
            }
        }
        Expression::UnaryBoolean(operand) => match operand.as_ref() {
            Expression::Variable(variable) => {
                let value = truth(evaluate(env, operand)?);
                if value.is_true() || value.is_bottom() {
                    Ok(Refinement::Infeasible)
                } else if variable.typ.is_numeric() {
                    Ok(Refinement::single(Some(variable.clone()), value.false_value()))
                } else {
                    Ok(Refinement::unconstrained())
                }
            }
            Expression::UnaryBoolean(_) | Expression::BinaryBoolean { .. } | Expression::BinaryComparison { .. } => {
                refine(env, &operand.as_ref().clone().negate())
            }
            _ => {
                let value = evaluate(env, condition)?;
                Ok(if value.is_false() {
                    Refinement::Infeasible
                } else {
                    Refinement::unconstrained()
                })
            }
        },
        Expression::BinaryBoolean {
            left,
            operator,
            right,
        } => {
            let left = refine(env, left)?;
            let right = refine(env, right)?;
            Ok(match operator {
                BooleanOperator::And => left.and(right),
                BooleanOperator::Or => left.or(right),
            })
        }
        Expression::BinaryComparison {
            left,
            operator,
            right,
        } => refine_comparison(env, left, *operator, right),
        _ => Ok(Refinement::unconstrained()),
    }
}

fn refine_comparison<E: NumericEnvironment>(
    env: &E,
    left: &Expression,
    operator: ComparisonOperator,
    right: &Expression,
) -> Result<Refinement, AnalysisError> {
    match operator {
        ComparisonOperator::In => return refine_membership(env, left, right),
        ComparisonOperator::NotIn | ComparisonOperator::Is | ComparisonOperator::IsNot => {
            return Ok(Refinement::unconstrained())
        }
        _ => {}
    }
    if !(left.typ().is_numeric() && right.typ().is_numeric()) {
        return Ok(Refinement::unconstrained());
    }

    let l = evaluate(env, left)?;
    let r = evaluate(env, right)?;
    if l.is_bottom() || r.is_bottom() {
        return Ok(Refinement::Infeasible);
    }
    // strict comparisons between whole numbers tighten by one
    let step = if left.typ().is_integral() && right.typ().is_integral() {
        1.0
    } else {
        0.0
    };
    let inf = f64::INFINITY;

    let (left_range, right_range) = match operator {
        ComparisonOperator::Lt => (
            IntervalLattice::new(-inf, r.upper() - step),
            IntervalLattice::new(l.lower() + step, inf),
        ),
        ComparisonOperator::LtE => (IntervalLattice::new(-inf, r.upper()), IntervalLattice::new(l.lower(), inf)),
        ComparisonOperator::Gt => (
            IntervalLattice::new(r.lower() + step, inf),
            IntervalLattice::new(-inf, l.upper() - step),
        ),
        ComparisonOperator::GtE => (IntervalLattice::new(r.lower(), inf), IntervalLattice::new(-inf, l.upper())),
        ComparisonOperator::Eq => (r, l),
        ComparisonOperator::NotEq => {
            if l.is_singleton() && l == r {
                return Ok(Refinement::Infeasible);
            }
            (excluding(l, r, step), excluding(r, l, step))
        }
        _ => (IntervalLattice::TOP, IntervalLattice::TOP),
    };

    let left_range = l.meet(left_range);
    let right_range = r.meet(right_range);
    Ok(Refinement::single(refinable(left), left_range).and(Refinement::single(refinable(right), right_range)))
}

/// Constraint on `value` from `value != other`: a singleton `other` at one of
/// the bounds of an integral `value` cuts that bound off.
fn excluding(value: IntervalLattice, other: IntervalLattice, step: f64) -> IntervalLattice {
    if step == 0.0 || !other.is_singleton() {
        IntervalLattice::TOP
    } else if other.lower() == value.lower() {
        IntervalLattice::new(value.lower() + step, f64::INFINITY)
    } else if other.upper() == value.upper() {
        IntervalLattice::new(f64::NEG_INFINITY, value.upper() - step)
    } else {
        IntervalLattice::TOP
    }
}

fn refine_membership<E: NumericEnvironment>(
    env: &E,
    item: &Expression,
    collection: &Expression,
) -> Result<Refinement, AnalysisError> {
    let candidates = match collection {
        Expression::Range { start, stop, step } => {
            let start = evaluate(env, start)?;
            let stop = evaluate(env, stop)?;
            let step = evaluate(env, step)?;
            if step.lower() > 0.0 {
                IntervalLattice::new(start.lower(), stop.upper() - 1.0)
            } else {
                IntervalLattice::TOP
            }
        }
        Expression::Variable(container) if container.has_length() => {
            if env.value(&container.length_of()).upper() == 0.0 {
                return Ok(Refinement::Infeasible);
            }
            env.members(container, View::of_membership(&container.typ))
        }
        Expression::Keys(target) | Expression::Values(target) => match target.as_ref() {
            Expression::Variable(container) if container.has_length() => {
                if env.value(&container.length_of()).upper() == 0.0 {
                    return Ok(Refinement::Infeasible);
                }
                let view = if matches!(collection, Expression::Keys(_)) {
                    View::Keys
                } else {
                    View::Values
                };
                env.members(container, view)
            }
            _ => IntervalLattice::TOP,
        },
        Expression::ListDisplay { items, .. } | Expression::SetDisplay { items, .. } => {
            if items.is_empty() {
                return Ok(Refinement::Infeasible);
            }
            let mut joined = IntervalLattice::BOTTOM;
            for item in items {
                joined = joined.join(evaluate(env, item)?);
            }
            joined
        }
        _ => IntervalLattice::TOP,
    };
    if !item.typ().is_numeric() {
        return Ok(if candidates.is_bottom() {
            Refinement::Infeasible
        } else {
            Refinement::unconstrained()
        });
    }
    let value = evaluate(env, item)?.meet(candidates);
    Ok(Refinement::single(refinable(item), value))
}
