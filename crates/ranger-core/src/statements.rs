//! Statements stored in control-flow graph nodes

use crate::expressions::{Literal, Type, VariableIdentifier};
use indexmap::IndexSet;
use std::fmt;

/// Source position of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProgramPoint {
    pub line: usize,
    pub column: usize,
}

impl ProgramPoint {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub pp: ProgramPoint,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    LiteralEvaluation(Literal),
    VariableAccess(VariableIdentifier),
    SubscriptionAccess {
        typ: Type,
        target: Box<Statement>,
        key: Box<Statement>,
    },
    SlicingAccess {
        typ: Type,
        target: Box<Statement>,
        lower: Option<Box<Statement>>,
        upper: Option<Box<Statement>>,
        stride: Option<Box<Statement>>,
    },
    ListDisplayAccess {
        typ: Type,
        items: Vec<Statement>,
    },
    SetDisplayAccess {
        typ: Type,
        items: Vec<Statement>,
    },
    DictDisplayAccess {
        typ: Type,
        keys: Vec<Statement>,
        values: Vec<Statement>,
    },
    AttributeAccess {
        typ: Type,
        target: Box<Statement>,
        attribute: String,
    },
    /// Call of a builtin or operator, e.g. `add(x, 1)` for `x + 1`.
    Call {
        name: String,
        arguments: Vec<Statement>,
        typ: Type,
    },
    Assignment {
        left: Box<Statement>,
        right: Box<Statement>,
    },
    Return {
        values: Vec<Statement>,
    },
    Raise,
}

impl Statement {
    pub fn new(pp: ProgramPoint, kind: StatementKind) -> Self {
        Self { pp, kind }
    }

    pub fn literal(pp: ProgramPoint, literal: Literal) -> Self {
        Self::new(pp, StatementKind::LiteralEvaluation(literal))
    }

    pub fn int(pp: ProgramPoint, value: i64) -> Self {
        Self::literal(pp, Literal::Int(value))
    }

    pub fn variable(pp: ProgramPoint, variable: &VariableIdentifier) -> Self {
        Self::new(pp, StatementKind::VariableAccess(variable.clone()))
    }

    pub fn call(pp: ProgramPoint, name: impl Into<String>, arguments: Vec<Statement>, typ: Type) -> Self {
        Self::new(
            pp,
            StatementKind::Call {
                name: name.into(),
                arguments,
                typ,
            },
        )
    }

    pub fn assignment(pp: ProgramPoint, left: Statement, right: Statement) -> Self {
        Self::new(
            pp,
            StatementKind::Assignment {
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn subscription(pp: ProgramPoint, typ: Type, target: Statement, key: Statement) -> Self {
        Self::new(
            pp,
            StatementKind::SubscriptionAccess {
                typ,
                target: Box::new(target),
                key: Box::new(key),
            },
        )
    }

    pub fn list_display(pp: ProgramPoint, typ: Type, items: Vec<Statement>) -> Self {
        Self::new(pp, StatementKind::ListDisplayAccess { typ, items })
    }

    pub fn dict_display(pp: ProgramPoint, typ: Type, keys: Vec<Statement>, values: Vec<Statement>) -> Self {
        Self::new(pp, StatementKind::DictDisplayAccess { typ, keys, values })
    }

    pub fn ret(pp: ProgramPoint, values: Vec<Statement>) -> Self {
        Self::new(pp, StatementKind::Return { values })
    }

    pub fn raise(pp: ProgramPoint) -> Self {
        Self::new(pp, StatementKind::Raise)
    }

    /// Plain variables accessed anywhere in this statement.
    pub fn variables(&self) -> IndexSet<VariableIdentifier> {
        let mut found = IndexSet::new();
        self.collect_variables(&mut found);
        found
    }

    fn collect_variables(&self, found: &mut IndexSet<VariableIdentifier>) {
        match &self.kind {
            StatementKind::LiteralEvaluation(_) | StatementKind::Raise => {}
            StatementKind::VariableAccess(variable) => {
                found.insert(variable.clone());
            }
            StatementKind::SubscriptionAccess { target, key, .. } => {
                target.collect_variables(found);
                key.collect_variables(found);
            }
            StatementKind::SlicingAccess {
                target,
                lower,
                upper,
                stride,
                ..
            } => {
                target.collect_variables(found);
                for bound in [lower, upper, stride].into_iter().flatten() {
                    bound.collect_variables(found);
                }
            }
            StatementKind::ListDisplayAccess { items, .. } | StatementKind::SetDisplayAccess { items, .. } => {
                for item in items {
                    item.collect_variables(found);
                }
            }
            StatementKind::DictDisplayAccess { keys, values, .. } => {
                for item in keys.iter().chain(values) {
                    item.collect_variables(found);
                }
            }
            StatementKind::AttributeAccess { target, .. } => target.collect_variables(found),
            StatementKind::Call { arguments, .. } => {
                for argument in arguments {
                    argument.collect_variables(found);
                }
            }
            StatementKind::Assignment { left, right } => {
                left.collect_variables(found);
                right.collect_variables(found);
            }
            StatementKind::Return { values } => {
                for value in values {
                    value.collect_variables(found);
                }
            }
        }
    }
}

fn write_all(f: &mut fmt::Formatter<'_>, items: &[Statement]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::LiteralEvaluation(literal) => write!(f, "{literal}"),
            StatementKind::VariableAccess(variable) => write!(f, "{variable}"),
            StatementKind::SubscriptionAccess { target, key, .. } => write!(f, "{target}[{key}]"),
            StatementKind::SlicingAccess {
                target, lower, upper, ..
            } => {
                write!(f, "{target}[")?;
                if let Some(lower) = lower {
                    write!(f, "{lower}")?;
                }
                write!(f, ":")?;
                if let Some(upper) = upper {
                    write!(f, "{upper}")?;
                }
                write!(f, "]")
            }
            StatementKind::ListDisplayAccess { items, .. } => {
                write!(f, "[")?;
                write_all(f, items)?;
                write!(f, "]")
            }
            StatementKind::SetDisplayAccess { items, .. } => {
                write!(f, "{{")?;
                write_all(f, items)?;
                write!(f, "}}")
            }
            StatementKind::DictDisplayAccess { keys, values, .. } => {
                write!(f, "{{")?;
                for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            StatementKind::AttributeAccess {
                target, attribute, ..
            } => write!(f, "{target}.{attribute}"),
            StatementKind::Call { name, arguments, .. } => {
                write!(f, "{name}(")?;
                write_all(f, arguments)?;
                write!(f, ")")
            }
            StatementKind::Assignment { left, right } => write!(f, "{left} = {right}"),
            StatementKind::Return { values } => {
                write!(f, "return ")?;
                write_all(f, values)
            }
            StatementKind::Raise => write!(f, "raise"),
        }
    }
}
