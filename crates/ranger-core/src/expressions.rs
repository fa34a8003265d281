//! Typed expression grammar consumed by abstract domains
//!
//! Expressions are a closed sum type: every domain evaluates them with an
//! exhaustive `match`, so an unhandled shape is a compile-time decision
//! (either handled or explicitly reported as unsupported).

use indexmap::IndexSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Static type of a variable or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int,
    Float,
    String,
    None,
    List(Box<Type>),
    Set(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    Top,
}

impl Type {
    pub fn list(item: Type) -> Self {
        Type::List(Box::new(item))
    }

    pub fn set(item: Type) -> Self {
        Type::Set(Box::new(item))
    }

    pub fn dict(key: Type, value: Type) -> Self {
        Type::Dict(Box::new(key), Box::new(value))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Float)
    }

    /// Integral types, whose strict comparisons can be tightened by one.
    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Bool | Type::Int)
    }

    /// Types whose values are indexed by position.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Type::String | Type::List(_) | Type::Tuple(_))
    }

    /// Mutable containers whose contents are tracked per variable.
    pub fn is_container(&self) -> bool {
        matches!(self, Type::List(_) | Type::Set(_) | Type::Dict(_, _))
    }

    /// Type of the keys (indices for sequences) of a container.
    pub fn key_type(&self) -> Type {
        match self {
            Type::String | Type::List(_) | Type::Tuple(_) => Type::Int,
            Type::Set(item) => (**item).clone(),
            Type::Dict(key, _) => (**key).clone(),
            _ => Type::Top,
        }
    }

    /// Type of the values stored in a container.
    pub fn value_type(&self) -> Type {
        match self {
            Type::String => Type::String,
            Type::List(item) | Type::Set(item) => (**item).clone(),
            Type::Dict(_, value) => (**value).clone(),
            Type::Tuple(items) => match items.split_first() {
                Some((first, rest)) if rest.iter().all(|t| t == first) => first.clone(),
                _ => Type::Top,
            },
            _ => Type::Top,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "str"),
            Type::None => write!(f, "None"),
            Type::List(item) => write!(f, "List[{item}]"),
            Type::Set(item) => write!(f, "Set[{item}]"),
            Type::Dict(key, value) => write!(f, "Dict[{key}, {value}]"),
            Type::Tuple(items) => {
                write!(f, "Tuple[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Type::Top => write!(f, "Any"),
        }
    }
}

/// What a store identifier stands for.
///
/// Container variables get auxiliary identifiers for their length and for
/// summaries of their keys and values next to the variable itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Variable,
    Length,
    Keys,
    Values,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableIdentifier {
    pub name: String,
    pub typ: Type,
    pub role: Role,
}

impl VariableIdentifier {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
            role: Role::Variable,
        }
    }

    /// Identifier of the length of this variable.
    pub fn length_of(&self) -> Self {
        Self {
            name: self.name.clone(),
            typ: Type::Int,
            role: Role::Length,
        }
    }

    /// Identifier of the summary of this variable's keys.
    pub fn keys_of(&self) -> Self {
        Self {
            name: self.name.clone(),
            typ: self.typ.key_type(),
            role: Role::Keys,
        }
    }

    /// Identifier of the summary of this variable's values.
    pub fn values_of(&self) -> Self {
        Self {
            name: self.name.clone(),
            typ: self.typ.value_type(),
            role: Role::Values,
        }
    }

    pub fn is_plain(&self) -> bool {
        self.role == Role::Variable
    }

    pub fn has_length(&self) -> bool {
        self.is_plain() && (self.typ.is_sequence() || self.typ.is_container())
    }
}

impl fmt::Display for VariableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Variable => write!(f, "{}", self.name),
            Role::Length => write!(f, "len({})", self.name),
            Role::Keys => write!(f, "keys({})", self.name),
            Role::Values => write!(f, "values({})", self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl Literal {
    pub fn typ(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::Bool,
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::Str(_) => Type::String,
            Literal::None => Type::None,
        }
    }

    /// Numeric view of the literal, with booleans as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(x) => Some(*x),
            Literal::Str(_) | Literal::None => None,
        }
    }
}

// Floats compare bitwise so literals can live in hash sets.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::None, Literal::None) => true,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Bool(b) => b.hash(state),
            Literal::Int(i) => i.hash(state),
            Literal::Float(x) => x.to_bits().hash(state),
            Literal::Str(s) => s.hash(state),
            Literal::None => {}
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryArithmeticOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mult,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl ComparisonOperator {
    /// Operator of the logical negation: `!(a < b)` is `a >= b`.
    pub fn negated(self) -> Self {
        match self {
            ComparisonOperator::Eq => ComparisonOperator::NotEq,
            ComparisonOperator::NotEq => ComparisonOperator::Eq,
            ComparisonOperator::Lt => ComparisonOperator::GtE,
            ComparisonOperator::LtE => ComparisonOperator::Gt,
            ComparisonOperator::Gt => ComparisonOperator::LtE,
            ComparisonOperator::GtE => ComparisonOperator::Lt,
            ComparisonOperator::Is => ComparisonOperator::IsNot,
            ComparisonOperator::IsNot => ComparisonOperator::Is,
            ComparisonOperator::In => ComparisonOperator::NotIn,
            ComparisonOperator::NotIn => ComparisonOperator::In,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "==",
            ComparisonOperator::NotEq => "!=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::LtE => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::GtE => ">=",
            ComparisonOperator::Is => "is",
            ComparisonOperator::IsNot => "is not",
            ComparisonOperator::In => "in",
            ComparisonOperator::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Literal(Literal),
    Variable(VariableIdentifier),
    /// A value read from outside the program.
    Input(Type),
    ListDisplay {
        typ: Type,
        items: Vec<Expression>,
    },
    SetDisplay {
        typ: Type,
        items: Vec<Expression>,
    },
    DictDisplay {
        typ: Type,
        keys: Vec<Expression>,
        values: Vec<Expression>,
    },
    Range {
        start: Box<Expression>,
        stop: Box<Expression>,
        step: Box<Expression>,
    },
    Length(Box<Expression>),
    Keys(Box<Expression>),
    Values(Box<Expression>),
    AttributeReference {
        typ: Type,
        target: Box<Expression>,
        attribute: String,
    },
    Subscription {
        typ: Type,
        target: Box<Expression>,
        key: Box<Expression>,
    },
    Slicing {
        typ: Type,
        target: Box<Expression>,
        lower: Option<Box<Expression>>,
        upper: Option<Box<Expression>>,
        stride: Option<Box<Expression>>,
    },
    UnaryArithmetic {
        typ: Type,
        operator: UnaryArithmeticOperator,
        expression: Box<Expression>,
    },
    /// Logical `not`.
    UnaryBoolean(Box<Expression>),
    BinaryArithmetic {
        typ: Type,
        left: Box<Expression>,
        operator: ArithmeticOperator,
        right: Box<Expression>,
    },
    BinaryBoolean {
        left: Box<Expression>,
        operator: BooleanOperator,
        right: Box<Expression>,
    },
    BinaryComparison {
        left: Box<Expression>,
        operator: ComparisonOperator,
        right: Box<Expression>,
    },
}

/// Deterministically ordered set of alternative expressions.
pub type ExpressionSet = IndexSet<Expression>;

impl Expression {
    pub fn int(value: i64) -> Self {
        Expression::Literal(Literal::Int(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Bool(value))
    }

    pub fn variable(variable: &VariableIdentifier) -> Self {
        Expression::Variable(variable.clone())
    }

    /// Arithmetic node whose type follows the usual numeric promotion.
    pub fn binary_arithmetic(left: Expression, operator: ArithmeticOperator, right: Expression) -> Self {
        let typ = arithmetic_type(&left.typ(), operator, &right.typ());
        Expression::BinaryArithmetic {
            typ,
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn comparison(left: Expression, operator: ComparisonOperator, right: Expression) -> Self {
        Expression::BinaryComparison {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn typ(&self) -> Type {
        match self {
            Expression::Literal(literal) => literal.typ(),
            Expression::Variable(variable) => variable.typ.clone(),
            Expression::Input(typ) => typ.clone(),
            Expression::ListDisplay { typ, .. }
            | Expression::SetDisplay { typ, .. }
            | Expression::DictDisplay { typ, .. }
            | Expression::AttributeReference { typ, .. }
            | Expression::Subscription { typ, .. }
            | Expression::Slicing { typ, .. }
            | Expression::UnaryArithmetic { typ, .. }
            | Expression::BinaryArithmetic { typ, .. } => typ.clone(),
            Expression::Range { .. } => Type::list(Type::Int),
            Expression::Length(_) => Type::Int,
            Expression::Keys(target) => Type::set(target.typ().key_type()),
            Expression::Values(target) => Type::list(target.typ().value_type()),
            Expression::UnaryBoolean(_)
            | Expression::BinaryBoolean { .. }
            | Expression::BinaryComparison { .. } => Type::Bool,
        }
    }

    /// Plain variables read by this expression, in order of first occurrence.
    pub fn variables(&self) -> IndexSet<VariableIdentifier> {
        let mut found = IndexSet::new();
        self.collect_variables(&mut found);
        found
    }

    fn collect_variables(&self, found: &mut IndexSet<VariableIdentifier>) {
        match self {
            Expression::Literal(_) | Expression::Input(_) => {}
            Expression::Variable(variable) => {
                found.insert(variable.clone());
            }
            Expression::ListDisplay { items, .. } | Expression::SetDisplay { items, .. } => {
                for item in items {
                    item.collect_variables(found);
                }
            }
            Expression::DictDisplay { keys, values, .. } => {
                for item in keys.iter().chain(values) {
                    item.collect_variables(found);
                }
            }
            Expression::Range { start, stop, step } => {
                start.collect_variables(found);
                stop.collect_variables(found);
                step.collect_variables(found);
            }
            Expression::Length(target)
            | Expression::Keys(target)
            | Expression::Values(target)
            | Expression::AttributeReference { target, .. }
            | Expression::UnaryArithmetic {
                expression: target, ..
            }
            | Expression::UnaryBoolean(target) => target.collect_variables(found),
            Expression::Subscription { target, key, .. } => {
                target.collect_variables(found);
                key.collect_variables(found);
            }
            Expression::Slicing {
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
            Expression::BinaryArithmetic { left, right, .. }
            | Expression::BinaryBoolean { left, right, .. }
            | Expression::BinaryComparison { left, right, .. } => {
                left.collect_variables(found);
                right.collect_variables(found);
            }
        }
    }

    /// Logical negation, pushed through connectives and comparisons.
    pub fn negate(self) -> Self {
        match self {
            Expression::Literal(Literal::Bool(value)) => Expression::boolean(!value),
            Expression::UnaryBoolean(inner) => *inner,
            Expression::BinaryBoolean {
                left,
                operator,
                right,
            } => Expression::BinaryBoolean {
                left: Box::new(left.negate()),
                operator: match operator {
                    BooleanOperator::And => BooleanOperator::Or,
                    BooleanOperator::Or => BooleanOperator::And,
                },
                right: Box::new(right.negate()),
            },
            Expression::BinaryComparison {
                left,
                operator,
                right,
            } => Expression::BinaryComparison {
                left,
                operator: operator.negated(),
                right,
            },
            other => Expression::UnaryBoolean(Box::new(other)),
        }
    }
}

fn arithmetic_type(left: &Type, operator: ArithmeticOperator, right: &Type) -> Type {
    match (left, right) {
        (Type::Float, other) | (other, Type::Float) if other.is_numeric() => Type::Float,
        (l, r) if l.is_numeric() && r.is_numeric() => {
            if operator == ArithmeticOperator::Div {
                Type::Float
            } else {
                Type::Int
            }
        }
        (l, r) if l == r && operator == ArithmeticOperator::Add => l.clone(),
        _ => Type::Top,
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{literal}"),
            Expression::Variable(variable) => write!(f, "{variable}"),
            Expression::Input(typ) => write!(f, "input[{typ}]"),
            Expression::ListDisplay { items, .. } => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::SetDisplay { items, .. } => {
                write!(f, "{{")?;
                write_list(f, items)?;
                write!(f, "}}")
            }
            Expression::DictDisplay { keys, values, .. } => {
                write!(f, "{{")?;
                for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Expression::Range { start, stop, step } => write!(f, "range({start}, {stop}, {step})"),
            Expression::Length(target) => write!(f, "len({target})"),
            Expression::Keys(target) => write!(f, "{target}.keys()"),
            Expression::Values(target) => write!(f, "{target}.values()"),
            Expression::AttributeReference {
                target, attribute, ..
            } => write!(f, "{target}.{attribute}"),
            Expression::Subscription { target, key, .. } => write!(f, "{target}[{key}]"),
            Expression::Slicing {
                target,
                lower,
                upper,
                stride,
                ..
            } => {
                write!(f, "{target}[")?;
                if let Some(lower) = lower {
                    write!(f, "{lower}")?;
                }
                write!(f, ":")?;
                if let Some(upper) = upper {
                    write!(f, "{upper}")?;
                }
                if let Some(stride) = stride {
                    write!(f, ":{stride}")?;
                }
                write!(f, "]")
            }
            Expression::UnaryArithmetic {
                operator,
                expression,
                ..
            } => match operator {
                UnaryArithmeticOperator::Plus => write!(f, "+{expression}"),
                UnaryArithmeticOperator::Minus => write!(f, "-{expression}"),
            },
            Expression::UnaryBoolean(expression) => write!(f, "not {expression}"),
            Expression::BinaryArithmetic {
                left,
                operator,
                right,
                ..
            } => {
                let symbol = match operator {
                    ArithmeticOperator::Add => "+",
                    ArithmeticOperator::Sub => "-",
                    ArithmeticOperator::Mult => "*",
                    ArithmeticOperator::Div => "/",
                };
                write!(f, "({left} {symbol} {right})")
            }
            Expression::BinaryBoolean {
                left,
                operator,
                right,
            } => {
                let symbol = match operator {
                    BooleanOperator::And => "and",
                    BooleanOperator::Or => "or",
                };
                write!(f, "({left} {symbol} {right})")
            }
            Expression::BinaryComparison {
                left,
                operator,
                right,
            } => write!(f, "{left} {} {right}", operator.symbol()),
        }
    }
}
