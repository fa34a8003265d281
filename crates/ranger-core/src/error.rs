//! Error types for analysis, CFG construction and configuration loading

use crate::cfg::NodeId;
use crate::statements::ProgramPoint;
use thiserror::Error;

/// Failures surfaced by an analysis run.
///
/// Infeasible paths are not errors: they show up as bottom states in the
/// result. Only capability gaps, statements the semantics cannot translate,
/// and non-convergence are reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The domain has no handler for this operation or expression shape.
    #[error("{operation} is not supported by the {domain} domain")]
    Unsupported { domain: &'static str, operation: String },

    /// The statement does not have a shape the semantics can translate.
    #[error("malformed statement at {pp}: {reason}")]
    MalformedStatement { pp: ProgramPoint, reason: String },

    /// A node kept changing past the configured iteration cap.
    #[error("analysis did not converge at node {node} after {iterations} iterations")]
    NonConvergence { node: NodeId, iterations: usize },
}

impl AnalysisError {
    pub fn unsupported(domain: &'static str, operation: impl Into<String>) -> Self {
        AnalysisError::Unsupported {
            domain,
            operation: operation.into(),
        }
    }

    pub fn malformed(pp: ProgramPoint, reason: impl Into<String>) -> Self {
        AnalysisError::MalformedStatement {
            pp,
            reason: reason.into(),
        }
    }
}

/// Failures while freezing a control-flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgError {
    #[error("edge {from} -> {to} references an unknown node")]
    UnknownNode { from: NodeId, to: NodeId },

    #[error("entry node {0} does not exist")]
    MissingEntry(NodeId),

    #[error("exit node {0} does not exist")]
    MissingExit(NodeId),

    #[error("duplicate edge {from} -> {to}")]
    DuplicateEdge { from: NodeId, to: NodeId },
}

/// Failures while loading an interpreter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
