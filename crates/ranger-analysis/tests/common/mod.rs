//! Statement builders shared by the integration tests.

#![allow(dead_code)]

use ranger_core::{ProgramPoint, Statement, Type, VariableIdentifier};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pp(line: usize) -> ProgramPoint {
    ProgramPoint::new(line, 0)
}

pub fn int_var(name: &str) -> VariableIdentifier {
    VariableIdentifier::new(name, Type::Int)
}

pub fn read(line: usize, variable: &VariableIdentifier) -> Statement {
    Statement::variable(pp(line), variable)
}

/// `name(arguments...)` of the given result type.
pub fn call(line: usize, name: &str, arguments: Vec<Statement>, typ: Type) -> Statement {
    Statement::call(pp(line), name, arguments, typ)
}

pub fn assign(line: usize, target: &VariableIdentifier, value: Statement) -> Statement {
    Statement::assignment(pp(line), read(line, target), value)
}

/// `left <op> right` for a comparison builtin such as `lt` or `gte`.
pub fn compare(line: usize, op: &str, left: Statement, right: Statement) -> Statement {
    call(line, op, vec![left, right], Type::Bool)
}

pub fn add(line: usize, left: Statement, right: Statement) -> Statement {
    call(line, "add", vec![left, right], Type::Int)
}

pub fn print(line: usize, value: Statement) -> Statement {
    call(line, "print", vec![value], Type::None)
}
