//! Forward interval analysis over small loop programs
//!
//! Checks that widening fires at the loop head, that the analysis terminates
//! shortly after the widening threshold, and that repeated runs agree.

mod common;

use anyhow::Result;
use common::*;
use ranger_analysis::interval::{IntervalLattice, IntervalState};
use ranger_core::{CfgBuilder, ControlFlowGraph, EdgeKind, Interpreter, InterpreterConfig, Lattice, NodeId, Statement};

/// ```text
/// x = 0
/// while x < 10:
///     x = x + 1
/// ```
fn counting_loop() -> Result<(ControlFlowGraph, [NodeId; 4])> {
    let x = int_var("x");
    let mut builder = CfgBuilder::new();
    let init = builder.add_basic(vec![assign(1, &x, Statement::int(pp(1), 0))]);
    let head = builder.add_loop();
    let body = builder.add_basic(vec![assign(3, &x, add(3, read(3, &x), Statement::int(pp(3), 1)))]);
    let exit = builder.add_basic(vec![]);
    builder
        .add_edge(init, head, EdgeKind::Default)
        .add_conditional_edge(head, body, EdgeKind::LoopIn, compare(2, "lt", read(2, &x), Statement::int(pp(2), 10)))
        .add_edge(body, head, EdgeKind::Default)
        .add_conditional_edge(head, exit, EdgeKind::LoopOut, compare(2, "gte", read(2, &x), Statement::int(pp(2), 10)));
    let cfg = builder.build(init, exit)?;
    Ok((cfg, [init, head, body, exit]))
}

#[test]
fn test_widening_reaches_infinity_at_loop_head() -> Result<()> {
    init_tracing();
    let (cfg, [_, head, body, exit]) = counting_loop()?;
    let x = int_var("x");

    let result = Interpreter::forward(&cfg, InterpreterConfig::with_widening(1)).analyze(IntervalState::new(cfg.variables()))?;

    let at_head = result.entry_state(head).and_then(|s| s.get(&x)).unwrap_or(IntervalLattice::BOTTOM);
    assert_eq!(at_head.lower(), 0.0);
    assert_eq!(at_head.upper(), f64::INFINITY);

    let in_body = result.entry_state(body).and_then(|s| s.get(&x));
    assert_eq!(in_body, Some(IntervalLattice::new(0.0, 9.0)));

    let at_exit = result.entry_state(exit).and_then(|s| s.get(&x));
    assert_eq!(at_exit, Some(IntervalLattice::new(10.0, f64::INFINITY)));
    Ok(())
}

#[test]
fn test_termination_shortly_after_threshold() -> Result<()> {
    init_tracing();
    let (cfg, [_, head, _, exit]) = counting_loop()?;
    let x = int_var("x");

    for threshold in [0, 1, 2, 3, 5, 8] {
        let config = InterpreterConfig {
            widening: threshold,
            max_iterations: Some(threshold + 10),
        };
        let result = Interpreter::forward(&cfg, config).analyze(IntervalState::new(cfg.variables()))?;
        assert!(
            result.iterations(head) <= threshold + 3,
            "threshold {threshold}: {} iterations at the loop head",
            result.iterations(head)
        );
        let upper = result.exit_state(exit).and_then(|s| s.get(&x)).map(|r| r.upper());
        assert_eq!(upper, Some(f64::INFINITY));
    }
    Ok(())
}

#[test]
fn test_fixpoint_is_reproducible() -> Result<()> {
    let (cfg, nodes) = counting_loop()?;
    let run = || Interpreter::forward(&cfg, InterpreterConfig::with_widening(2)).analyze(IntervalState::new(cfg.variables()));
    let first = run()?;
    let second = run()?;

    assert_eq!(first.nodes().collect::<Vec<_>>(), second.nodes().collect::<Vec<_>>());
    for node in nodes {
        assert_eq!(first.iterations(node), second.iterations(node));
    }
    assert_eq!(first.visits(), second.visits());
    Ok(())
}

#[test]
fn test_unreachable_branch_is_bottom() -> Result<()> {
    let x = int_var("x");
    let y = int_var("y");
    let mut builder = CfgBuilder::new();
    let head = builder.add_basic(vec![assign(1, &x, Statement::int(pp(1), 4))]);
    let then = builder.add_basic(vec![assign(3, &y, Statement::int(pp(3), 1))]);
    let other = builder.add_basic(vec![assign(5, &y, Statement::int(pp(5), 2))]);
    let join = builder.add_basic(vec![print(6, read(6, &y))]);
    builder
        .add_conditional_edge(head, then, EdgeKind::IfIn, compare(2, "gt", read(2, &x), Statement::int(pp(2), 5)))
        .add_conditional_edge(head, other, EdgeKind::IfIn, compare(4, "lte", read(4, &x), Statement::int(pp(4), 5)))
        .add_edge(then, join, EdgeKind::IfOut)
        .add_edge(other, join, EdgeKind::IfOut);
    let cfg = builder.build(head, join)?;

    let result = Interpreter::forward(&cfg, InterpreterConfig::default()).analyze(IntervalState::new(cfg.variables()))?;

    let then_states = result.get_node_result(then).unwrap_or_default();
    assert_eq!(then_states.len(), 2);
    assert!(then_states.iter().all(Lattice::is_bottom));
    assert_eq!(result.exit_state(join).and_then(|s| s.get(&y)), Some(IntervalLattice::point(2.0)));
    Ok(())
}
