//! Control flow graph traversed by the interpreters
//!
//! Nodes live in an arena indexed by [`NodeId`]; edges are a flat table with
//! per-node adjacency lists, so the graph has no reference cycles. A graph is
//! assembled with [`CfgBuilder`] and is immutable once built.

use crate::error::CfgError;
use crate::expressions::VariableIdentifier;
use crate::statements::Statement;
use indexmap::IndexSet;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Straight-line sequence of statements
    Basic(Vec<Statement>),
    /// Loop head, without statements; widening is applied here
    Loop,
}

impl Node {
    pub fn statements(&self) -> &[Statement] {
        match self {
            Node::Basic(statements) => statements,
            Node::Loop => &[],
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Node::Loop)
    }
}

/// Scope transition an edge performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Default,
    IfIn,
    IfOut,
    LoopIn,
    LoopOut,
}

/// Edge in the graph, optionally guarded by a condition
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub condition: Option<Statement>,
}

/// Immutable control flow graph with one entry and one exit node
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    outgoing: Vec<SmallVec<[usize; 2]>>,
    incoming: Vec<SmallVec<[usize; 2]>>,
    entry: NodeId,
    exit: NodeId,
}

impl ControlFlowGraph {
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn exit(&self) -> NodeId {
        self.exit
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(id.0)
            .into_iter()
            .flatten()
            .map(move |&e| &self.edges[e])
    }

    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id.0)
            .into_iter()
            .flatten()
            .map(move |&e| &self.edges[e])
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.in_edges(id).map(|edge| edge.from)
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(id).map(|edge| edge.to)
    }

    /// Every plain variable mentioned by a statement or an edge guard.
    pub fn variables(&self) -> IndexSet<VariableIdentifier> {
        let statements = self.nodes.iter().flat_map(Node::statements);
        let guards = self.edges.iter().filter_map(|edge| edge.condition.as_ref());
        statements.chain(guards).flat_map(Statement::variables).collect()
    }
}

/// Incremental construction of a [`ControlFlowGraph`]
#[derive(Debug, Default)]
pub struct CfgBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_basic(&mut self, statements: Vec<Statement>) -> NodeId {
        self.nodes.push(Node::Basic(statements));
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_loop(&mut self) -> NodeId {
        self.nodes.push(Node::Loop);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> &mut Self {
        self.edges.push(Edge {
            from,
            to,
            kind,
            condition: None,
        });
        self
    }

    pub fn add_conditional_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind, condition: Statement) -> &mut Self {
        self.edges.push(Edge {
            from,
            to,
            kind,
            condition: Some(condition),
        });
        self
    }

    /// Validate the graph and freeze it.
    pub fn build(self, entry: NodeId, exit: NodeId) -> Result<ControlFlowGraph, CfgError> {
        let count = self.nodes.len();
        if entry.0 >= count {
            return Err(CfgError::MissingEntry(entry));
        }
        if exit.0 >= count {
            return Err(CfgError::MissingExit(exit));
        }

        let mut outgoing = vec![SmallVec::new(); count];
        let mut incoming = vec![SmallVec::new(); count];
        let mut seen = HashSet::new();
        for (index, edge) in self.edges.iter().enumerate() {
            if edge.from.0 >= count || edge.to.0 >= count {
                return Err(CfgError::UnknownNode {
                    from: edge.from,
                    to: edge.to,
                });
            }
            if !seen.insert((edge.from, edge.to)) {
                return Err(CfgError::DuplicateEdge {
                    from: edge.from,
                    to: edge.to,
                });
            }
            outgoing[edge.from.0].push(index);
            incoming[edge.to.0].push(index);
        }

        Ok(ControlFlowGraph {
            nodes: self.nodes,
            edges: self.edges,
            outgoing,
            incoming,
            entry,
            exit,
        })
    }
}
