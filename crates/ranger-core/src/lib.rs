//! # Ranger Core
//!
//! Abstract interpretation framework for imperative programs given as a
//! control-flow graph of typed statements.
//!
//! This crate provides:
//! - the [`Lattice`] contract with bottom/top short-circuiting wrappers,
//!   plus small capability traits composed by concrete domains
//! - the [`Store`] lifting of a lattice to a variable environment
//! - the [`State`] contract with the statement-level transformers
//! - the [`ControlFlowGraph`] data model and its builder
//! - forward and backward worklist [`Interpreter`]s with loop widening
//!
//! Concrete domains live in the `ranger-analysis` crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ranger_core::{CfgBuilder, Interpreter, InterpreterConfig};
//!
//! let cfg = builder.build(entry, exit)?;
//! let interpreter = Interpreter::forward(&cfg, InterpreterConfig::default());
//! let result = interpreter.analyze(initial_state)?;
//! for state in result.get_node_result(exit).unwrap_or_default() {
//!     println!("{state}");
//! }
//! ```

pub mod cfg;
pub mod config;
pub mod error;
pub mod expressions;
pub mod interpreter;
pub mod lattice;
pub mod semantics;
pub mod state;
pub mod statements;
pub mod store;

pub use cfg::{CfgBuilder, ControlFlowGraph, Edge, EdgeKind, Node, NodeId};
pub use config::InterpreterConfig;
pub use error::{AnalysisError, CfgError, ConfigError};
pub use expressions::{
    ArithmeticOperator, BooleanOperator, ComparisonOperator, Expression, ExpressionSet, Literal, Role,
    Type, UnaryArithmeticOperator, VariableIdentifier,
};
pub use interpreter::{AnalysisResult, Interpreter};
pub use lattice::{ArithmeticLattice, BooleanLattice, EnvironmentLattice, Lattice};
pub use semantics::{semantics, Direction};
pub use state::State;
pub use statements::{ProgramPoint, Statement, StatementKind};
pub use store::Store;
