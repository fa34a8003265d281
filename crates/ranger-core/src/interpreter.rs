//! Worklist-based fixpoint interpreters
//!
//! The forward interpreter starts at the entry node and propagates states
//! along edges; the backward interpreter starts at the exit node and
//! propagates against them. Both keep a FIFO worklist, apply widening at loop
//! heads once a head has been recomputed more often than the configured
//! threshold, and stop propagating from a node as soon as its incoming state
//! is covered by the one already stored.
//!
//! Results are stored per node as the list of states surrounding its
//! statements, always in program order: `states[i]` is the state before
//! statement `i` and `states[i + 1]` the state after it. When an interpreter
//! is tethered to a precursory result, the precursory state handed to
//! [`State::before`] is the one at the position the dependent analysis is in
//! when it executes the statement: `states[i]` going forward,
//! `states[i + 1]` going backward. Edge guards see the precursory state at the
//! end of the edge's source node.

use crate::cfg::{ControlFlowGraph, Edge, EdgeKind, NodeId};
use crate::config::InterpreterConfig;
use crate::error::AnalysisError;
use crate::semantics::{semantics, Direction};
use crate::state::State;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, trace, warn};

/// Per-node states computed by an interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult<S> {
    states: BTreeMap<NodeId, Vec<S>>,
    iterations: BTreeMap<NodeId, usize>,
    visits: usize,
}

impl<S> AnalysisResult<S> {
    /// States around the statements of `node`, in program order.
    ///
    /// Loop heads have a single state.
    pub fn get_node_result(&self, node: NodeId) -> Option<&[S]> {
        self.states.get(&node).map(Vec::as_slice)
    }

    /// State at the start of `node` in program order.
    pub fn entry_state(&self, node: NodeId) -> Option<&S> {
        self.states.get(&node).and_then(|states| states.first())
    }

    /// State at the end of `node` in program order.
    pub fn exit_state(&self, node: NodeId) -> Option<&S> {
        self.states.get(&node).and_then(|states| states.last())
    }

    /// Number of times the states of `node` were recomputed.
    pub fn iterations(&self, node: NodeId) -> usize {
        self.iterations.get(&node).copied().unwrap_or(0)
    }

    /// Total number of worklist pops.
    pub fn visits(&self) -> usize {
        self.visits
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &[S])> {
        self.states.iter().map(|(id, states)| (*id, states.as_slice()))
    }
}

/// Fixpoint interpreter over a control flow graph
pub struct Interpreter<'a, S: State> {
    cfg: &'a ControlFlowGraph,
    direction: Direction,
    config: InterpreterConfig,
    precursory: Option<&'a AnalysisResult<S::Precursory>>,
}

impl<'a, S: State> Interpreter<'a, S> {
    pub fn forward(cfg: &'a ControlFlowGraph, config: InterpreterConfig) -> Self {
        Self {
            cfg,
            direction: Direction::Forward,
            config,
            precursory: None,
        }
    }

    pub fn backward(cfg: &'a ControlFlowGraph, config: InterpreterConfig) -> Self {
        Self {
            cfg,
            direction: Direction::Backward,
            config,
            precursory: None,
        }
    }

    /// Thread the states of an already computed analysis through `before`.
    pub fn with_precursory(mut self, precursory: &'a AnalysisResult<S::Precursory>) -> Self {
        self.precursory = Some(precursory);
        self
    }

    /// Compute the fixpoint starting from `initial` at the entry (forward)
    /// or exit (backward) node.
    pub fn analyze(&self, initial: S) -> Result<AnalysisResult<S>, AnalysisError> {
        let start = match self.direction {
            Direction::Forward => self.cfg.entry(),
            Direction::Backward => self.cfg.exit(),
        };
        debug!(direction = ?self.direction, %start, widening = self.config.widening, "starting analysis");

        let mut states: BTreeMap<NodeId, Vec<S>> = BTreeMap::new();
        let mut iterations: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut visits = 0;

        let mut worklist = VecDeque::from([start]);
        let mut in_worklist = HashSet::from([start]);

        while let Some(current) = worklist.pop_front() {
            in_worklist.remove(&current);
            visits += 1;

            let Some(node) = self.cfg.node(current) else {
                continue;
            };
            let iteration = iterations.get(&current).copied().unwrap_or(0);
            trace!(node = %current, iteration, "visiting node");

            let previous = states
                .get(&current)
                .and_then(|stored| self.incoming_position(stored))
                .cloned()
                .unwrap_or_else(|| initial.bottom());

            let mut entry = if current == start {
                initial.clone()
            } else {
                initial.bottom()
            };
            for edge in self.incoming_edges(current) {
                let neighbor = match self.direction {
                    Direction::Forward => edge.from,
                    Direction::Backward => edge.to,
                };
                let Some(state) = states.get(&neighbor).and_then(|stored| self.outgoing_position(stored)) else {
                    continue;
                };
                let state = self.traverse(edge, state.clone())?;
                entry = entry.join(state);
            }

            if node.is_loop() && iteration > self.config.widening {
                debug!(node = %current, iteration, "widening at loop head");
                entry = previous.clone().widening(entry);
            }

            if entry.less_equal(&previous) {
                trace!(node = %current, "node is stable");
                continue;
            }

            let computed = self.execute(current, entry)?;
            states.insert(current, computed);

            let count = iterations.entry(current).or_insert(0);
            *count += 1;
            if let Some(max) = self.config.max_iterations {
                if *count > max {
                    warn!(node = %current, iterations = *count, "analysis did not converge");
                    return Err(AnalysisError::NonConvergence {
                        node: current,
                        iterations: *count,
                    });
                }
            }

            for next in self.outgoing_neighbors(current) {
                if in_worklist.insert(next) {
                    worklist.push_back(next);
                }
            }
        }

        for (id, node) in self.cfg.nodes() {
            states
                .entry(id)
                .or_insert_with(|| vec![initial.bottom(); node.statements().len() + 1]);
        }

        debug!(visits, "fixpoint reached");
        Ok(AnalysisResult {
            states,
            iterations,
            visits,
        })
    }

    fn incoming_edges(&self, node: NodeId) -> Box<dyn Iterator<Item = &'a Edge> + 'a> {
        match self.direction {
            Direction::Forward => Box::new(self.cfg.in_edges(node)),
            Direction::Backward => Box::new(self.cfg.out_edges(node)),
        }
    }

    fn outgoing_neighbors(&self, node: NodeId) -> Vec<NodeId> {
        match self.direction {
            Direction::Forward => self.cfg.successors(node).collect(),
            Direction::Backward => self.cfg.predecessors(node).collect(),
        }
    }

    /// Stored state where propagation enters a node.
    fn incoming_position<'s>(&self, stored: &'s [S]) -> Option<&'s S> {
        match self.direction {
            Direction::Forward => stored.first(),
            Direction::Backward => stored.last(),
        }
    }

    /// Stored state where propagation leaves a node.
    fn outgoing_position<'s>(&self, stored: &'s [S]) -> Option<&'s S> {
        match self.direction {
            Direction::Forward => stored.last(),
            Direction::Backward => stored.first(),
        }
    }

    fn precursory_state(&self, node: NodeId, position: usize) -> Option<&'a S::Precursory> {
        self.precursory
            .and_then(|result| result.get_node_result(node))
            .and_then(|states| states.get(position))
    }

    /// Carry `state` across `edge` in the direction of the analysis.
    ///
    /// Going forward, scope entry happens before the guard is assumed and
    /// scope exit after it; going backward the order and the hooks mirror.
    fn traverse(&self, edge: &Edge, state: S) -> Result<S, AnalysisError> {
        trace!(from = %edge.from, to = %edge.to, kind = ?edge.kind, "traversing edge");
        let state = match (self.direction, edge.kind) {
            (Direction::Forward, EdgeKind::IfIn) => state.enter_if(),
            (Direction::Forward, EdgeKind::LoopIn) => state.enter_loop(),
            (Direction::Backward, EdgeKind::IfOut) => state.enter_if(),
            (Direction::Backward, EdgeKind::LoopOut) => state.enter_loop(),
            _ => state,
        };
        let state = match &edge.condition {
            Some(condition) => {
                let precursory = self
                    .precursory
                    .and_then(|result| result.exit_state(edge.from));
                let state = state.before(condition.pp, precursory);
                semantics(condition, state, Direction::Forward)?.filter()?
            }
            None => state,
        };
        Ok(match (self.direction, edge.kind) {
            (Direction::Forward, EdgeKind::IfOut) => state.exit_if(),
            (Direction::Forward, EdgeKind::LoopOut) => state.exit_loop(),
            (Direction::Backward, EdgeKind::IfIn) => state.exit_if(),
            (Direction::Backward, EdgeKind::LoopIn) => state.exit_loop(),
            _ => state,
        })
    }

    /// Run the statements of `node` starting from `entry`, returning the
    /// states in program order.
    fn execute(&self, node: NodeId, entry: S) -> Result<Vec<S>, AnalysisError> {
        let statements = self.cfg.node(node).map(|n| n.statements()).unwrap_or_default();
        let mut computed = Vec::with_capacity(statements.len() + 1);
        let mut state = entry;
        match self.direction {
            Direction::Forward => {
                for (i, statement) in statements.iter().enumerate() {
                    computed.push(state.clone());
                    state = state.before(statement.pp, self.precursory_state(node, i));
                    state = semantics(statement, state, Direction::Forward)?;
                }
                computed.push(state);
            }
            Direction::Backward => {
                for (i, statement) in statements.iter().enumerate().rev() {
                    computed.push(state.clone());
                    state = state.before(statement.pp, self.precursory_state(node, i + 1));
                    state = semantics(statement, state, Direction::Backward)?;
                }
                computed.push(state);
                computed.reverse();
            }
        }
        Ok(computed)
    }
}
