//! Statement semantics shared by the forward and backward interpreters
//!
//! Access statements are translated into expression sets stored as the
//! state's result; assignments, `print`, `return` and `raise` call the
//! matching state transformer. Calls are resolved against a fixed builtin
//! table: operators (`add`, `lt`, `and`, ...), `range`, `len`, `keys`,
//! `values`, `input`, the casts `int`/`float`/`bool`/`str`, and `print`.

use crate::error::AnalysisError;
use crate::expressions::{
    ArithmeticOperator, BooleanOperator, ComparisonOperator, Expression, ExpressionSet, Literal, Type,
    UnaryArithmeticOperator,
};
use crate::state::State;
use crate::statements::{Statement, StatementKind};
use std::ops::RangeInclusive;
use tracing::trace;

/// Direction of analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Execute `statement` on `state`.
pub fn semantics<S: State>(statement: &Statement, state: S, direction: Direction) -> Result<S, AnalysisError> {
    trace!(pp = %statement.pp, %statement, "semantics");
    match &statement.kind {
        StatementKind::Assignment { left, right } => {
            let left = translate(left)?;
            let right = translate(right)?;
            match direction {
                Direction::Forward => state.assign(&left, &right),
                Direction::Backward => state.substitute(&left, &right),
            }
        }
        StatementKind::Call { name, arguments, .. } if name == "print" => {
            let output = translate_all(arguments)?;
            state.output(&output)
        }
        StatementKind::Return { values } => {
            let output = translate_all(values)?;
            state.output(&output)
        }
        StatementKind::Raise => Ok(state.raise_error()),
        _ => {
            let result = translate(statement)?;
            let mut state = state;
            state.set_result(result);
            Ok(state)
        }
    }
}

fn translate_all(statements: &[Statement]) -> Result<ExpressionSet, AnalysisError> {
    let mut all = ExpressionSet::new();
    for statement in statements {
        all.extend(translate(statement)?);
    }
    Ok(all)
}

fn translate_optional(statement: Option<&Statement>) -> Result<Vec<Option<Box<Expression>>>, AnalysisError> {
    match statement {
        Some(statement) => Ok(translate(statement)?
            .into_iter()
            .map(|e| Some(Box::new(e)))
            .collect()),
        None => Ok(vec![None]),
    }
}

/// Cartesian product of the alternatives of each operand.
fn product(sets: Vec<ExpressionSet>) -> Vec<Vec<Expression>> {
    sets.into_iter().fold(vec![Vec::new()], |acc, set| {
        acc.iter()
            .flat_map(|prefix| {
                set.iter().map(move |e| {
                    let mut combination = prefix.clone();
                    combination.push(e.clone());
                    combination
                })
            })
            .collect()
    })
}

fn translate_each(statements: &[Statement]) -> Result<Vec<ExpressionSet>, AnalysisError> {
    statements.iter().map(translate).collect()
}

/// Translate an access statement into the expressions it may denote.
fn translate(statement: &Statement) -> Result<ExpressionSet, AnalysisError> {
    match &statement.kind {
        StatementKind::LiteralEvaluation(literal) => Ok([Expression::Literal(literal.clone())].into_iter().collect()),
        StatementKind::VariableAccess(variable) => Ok([Expression::variable(variable)].into_iter().collect()),
        StatementKind::SubscriptionAccess { typ, target, key } => {
            let targets = translate(target)?;
            let keys = translate(key)?;
            Ok(product(vec![targets, keys])
                .into_iter()
                .filter_map(|pair| match <[Expression; 2]>::try_from(pair) {
                    Ok([target, key]) => Some(Expression::Subscription {
                        typ: typ.clone(),
                        target: Box::new(target),
                        key: Box::new(key),
                    }),
                    Err(_) => None,
                })
                .collect())
        }
        StatementKind::SlicingAccess {
            typ,
            target,
            lower,
            upper,
            stride,
        } => {
            let targets = translate(target)?;
            let lowers = translate_optional(lower.as_deref())?;
            let uppers = translate_optional(upper.as_deref())?;
            let strides = translate_optional(stride.as_deref())?;
            let mut result = ExpressionSet::new();
            for target in &targets {
                for lower in &lowers {
                    for upper in &uppers {
                        for stride in &strides {
                            result.insert(Expression::Slicing {
                                typ: typ.clone(),
                                target: Box::new(target.clone()),
                                lower: lower.clone(),
                                upper: upper.clone(),
                                stride: stride.clone(),
                            });
                        }
                    }
                }
            }
            Ok(result)
        }
        StatementKind::ListDisplayAccess { typ, items } => Ok(product(translate_each(items)?)
            .into_iter()
            .map(|items| Expression::ListDisplay {
                typ: typ.clone(),
                items,
            })
            .collect()),
        StatementKind::SetDisplayAccess { typ, items } => Ok(product(translate_each(items)?)
            .into_iter()
            .map(|items| Expression::SetDisplay {
                typ: typ.clone(),
                items,
            })
            .collect()),
        StatementKind::DictDisplayAccess { typ, keys, values } => {
            if keys.len() != values.len() {
                return Err(AnalysisError::malformed(
                    statement.pp,
                    format!("dictionary display with {} keys and {} values", keys.len(), values.len()),
                ));
            }
            let mut operands = translate_each(keys)?;
            operands.extend(translate_each(values)?);
            Ok(product(operands)
                .into_iter()
                .map(|mut keys| {
                    let values = keys.split_off(keys.len() / 2);
                    Expression::DictDisplay {
                        typ: typ.clone(),
                        keys,
                        values,
                    }
                })
                .collect())
        }
        StatementKind::AttributeAccess {
            typ,
            target,
            attribute,
        } => Ok(translate(target)?
            .into_iter()
            .map(|target| Expression::AttributeReference {
                typ: typ.clone(),
                target: Box::new(target),
                attribute: attribute.clone(),
            })
            .collect()),
        StatementKind::Call { name, arguments, typ } => translate_call(statement, name, arguments, typ),
        StatementKind::Assignment { .. } | StatementKind::Return { .. } | StatementKind::Raise => Err(
            AnalysisError::malformed(statement.pp, format!("`{statement}` used as an expression")),
        ),
    }
}

fn check_arity(
    statement: &Statement,
    name: &str,
    arguments: &[Statement],
    expected: RangeInclusive<usize>,
) -> Result<(), AnalysisError> {
    if expected.contains(&arguments.len()) {
        Ok(())
    } else {
        Err(AnalysisError::malformed(
            statement.pp,
            format!("`{name}` called with {} arguments", arguments.len()),
        ))
    }
}

fn translate_call(
    statement: &Statement,
    name: &str,
    arguments: &[Statement],
    typ: &Type,
) -> Result<ExpressionSet, AnalysisError> {
    if let Some(operator) = arithmetic_operator(name) {
        check_arity(statement, name, arguments, 2..=2)?;
        return combine(arguments, |mut operands| {
            let right = operands.pop()?;
            let left = operands.pop()?;
            Some(Expression::BinaryArithmetic {
                typ: typ.clone(),
                left: Box::new(left),
                operator,
                right: Box::new(right),
            })
        });
    }
    if let Some(operator) = comparison_operator(name) {
        check_arity(statement, name, arguments, 2..=2)?;
        return combine(arguments, |mut operands| {
            let right = operands.pop()?;
            let left = operands.pop()?;
            Some(Expression::comparison(left, operator, right))
        });
    }

    match name {
        "uadd" | "usub" => {
            check_arity(statement, name, arguments, 1..=1)?;
            let operator = if name == "uadd" {
                UnaryArithmeticOperator::Plus
            } else {
                UnaryArithmeticOperator::Minus
            };
            combine(arguments, |mut operands| {
                Some(Expression::UnaryArithmetic {
                    typ: typ.clone(),
                    operator,
                    expression: Box::new(operands.pop()?),
                })
            })
        }
        "not" => {
            check_arity(statement, name, arguments, 1..=1)?;
            combine(arguments, |mut operands| {
                Some(Expression::UnaryBoolean(Box::new(operands.pop()?)))
            })
        }
        "and" | "or" => {
            check_arity(statement, name, arguments, 2..=usize::MAX)?;
            let operator = if name == "and" {
                BooleanOperator::And
            } else {
                BooleanOperator::Or
            };
            combine(arguments, |operands| {
                operands.into_iter().reduce(|left, right| Expression::BinaryBoolean {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            })
        }
        "range" => {
            check_arity(statement, name, arguments, 1..=3)?;
            combine(arguments, |operands| {
                let (start, stop, step) = match <[Expression; 3]>::try_from(operands) {
                    Ok([start, stop, step]) => (start, stop, step),
                    Err(operands) => {
                        let mut operands = operands.into_iter();
                        match (operands.next(), operands.next()) {
                            (Some(stop), None) => (Expression::int(0), stop, Expression::int(1)),
                            (Some(start), Some(stop)) => (start, stop, Expression::int(1)),
                            _ => return None,
                        }
                    }
                };
                Some(Expression::Range {
                    start: Box::new(start),
                    stop: Box::new(stop),
                    step: Box::new(step),
                })
            })
        }
        "len" | "keys" | "values" => {
            check_arity(statement, name, arguments, 1..=1)?;
            combine(arguments, |mut operands| {
                let target = Box::new(operands.pop()?);
                Some(match name {
                    "len" => Expression::Length(target),
                    "keys" => Expression::Keys(target),
                    _ => Expression::Values(target),
                })
            })
        }
        "input" => {
            check_arity(statement, name, arguments, 0..=1)?;
            Ok([Expression::Input(typ.clone())].into_iter().collect())
        }
        "int" | "float" | "bool" | "str" => {
            check_arity(statement, name, arguments, 1..=1)?;
            let target = match name {
                "int" => Type::Int,
                "float" => Type::Float,
                "bool" => Type::Bool,
                _ => Type::String,
            };
            // Conversions other than the identity yield an unknown value of the target type.
            combine(arguments, |mut operands| {
                let operand = operands.pop()?;
                Some(match operand {
                    Expression::Literal(Literal::Int(i)) if target == Type::Float => {
                        Expression::Literal(Literal::Float(i as f64))
                    }
                    operand if operand.typ() == target => operand,
                    _ => Expression::Input(target.clone()),
                })
            })
        }
        "print" => Err(AnalysisError::malformed(
            statement.pp,
            "`print` used as an expression",
        )),
        _ => Err(AnalysisError::unsupported("semantics", format!("call to `{name}`"))),
    }
}

/// Translate `arguments` and build one expression per combination of
/// alternatives.
fn combine<F>(arguments: &[Statement], build: F) -> Result<ExpressionSet, AnalysisError>
where
    F: Fn(Vec<Expression>) -> Option<Expression>,
{
    Ok(product(translate_each(arguments)?)
        .into_iter()
        .filter_map(build)
        .collect())
}

fn arithmetic_operator(name: &str) -> Option<ArithmeticOperator> {
    match name {
        "add" => Some(ArithmeticOperator::Add),
        "sub" => Some(ArithmeticOperator::Sub),
        "mult" => Some(ArithmeticOperator::Mult),
        "div" => Some(ArithmeticOperator::Div),
        _ => None,
    }
}

fn comparison_operator(name: &str) -> Option<ComparisonOperator> {
    match name {
        "eq" => Some(ComparisonOperator::Eq),
        "noteq" => Some(ComparisonOperator::NotEq),
        "lt" => Some(ComparisonOperator::Lt),
        "lte" => Some(ComparisonOperator::LtE),
        "gt" => Some(ComparisonOperator::Gt),
        "gte" => Some(ComparisonOperator::GtE),
        "is" => Some(ComparisonOperator::Is),
        "isnot" => Some(ComparisonOperator::IsNot),
        "in" => Some(ComparisonOperator::In),
        "notin" => Some(ComparisonOperator::NotIn),
        _ => None,
    }
}
