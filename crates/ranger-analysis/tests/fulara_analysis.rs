//! Fulara segmented domain: segment algebra and dictionary programs

mod common;

use anyhow::Result;
use common::*;
use proptest::prelude::*;
use ranger_analysis::fulara::{FularaLattice, FularaState, IntervalKeyWrapper, IntervalValueWrapper};
use ranger_analysis::interval::IntervalLattice;
use ranger_core::{CfgBuilder, EdgeKind, Interpreter, InterpreterConfig, Lattice, Statement, Type, VariableIdentifier};

type Fulara = FularaLattice<IntervalKeyWrapper, IntervalValueWrapper>;

fn key(lower: f64, upper: f64) -> IntervalKeyWrapper {
    IntervalKeyWrapper::integral(IntervalLattice::new(lower, upper))
}

fn value(lower: f64, upper: f64) -> IntervalValueWrapper {
    IntervalValueWrapper(IntervalLattice::new(lower, upper))
}

fn empty() -> Fulara {
    Fulara::empty(key(0.0, 0.0), value(0.0, 0.0))
}

fn is_partition(fulara: &Fulara) -> bool {
    let Some(segments) = fulara.segments() else {
        return true;
    };
    segments.iter().enumerate().all(|(i, (k1, v1))| {
        !k1.is_bottom()
            && !v1.is_bottom()
            && segments[i + 1..].iter().all(|(k2, _)| k1.meet(*k2).is_bottom())
    })
}

#[test]
fn test_round_trip_of_two_strong_updates() {
    let d = empty()
        .partition_add(key(3.0, 3.0), value(2.0, 2.0))
        .partition_add(key(4.0, 4.0), value(1.0, 1.0));
    assert!(d.get_keys_joined().less_equal(&key(3.0, 4.0)));
    assert!(d.get_values_joined().less_equal(&value(1.0, 2.0)));
    assert!(is_partition(&d));
}

#[test]
fn test_strong_update_overrides_and_weak_update_accumulates() {
    let strong = empty()
        .partition_add(key(0.0, 0.0), value(5.0, 5.0))
        .partition_add(key(0.0, 0.0), value(6.0, 6.0));
    assert_eq!(strong.values_at(&key(0.0, 0.0)), value(6.0, 6.0));

    let weak = empty()
        .partition_add(key(0.0, 0.0), value(5.0, 5.0))
        .normalized_add(key(0.0, 0.0), value(6.0, 6.0));
    assert_eq!(weak.values_at(&key(0.0, 0.0)), value(5.0, 6.0));
}

#[test]
fn test_partition_update_over_several_segments() {
    let d = empty()
        .partition_add(key(0.0, 1.0), value(1.0, 1.0))
        .partition_add(key(4.0, 5.0), value(2.0, 2.0))
        .partition_update(vec![(key(1.0, 4.0), value(0.0, 0.0)), (key(8.0, 8.0), value(3.0, 3.0))]);
    assert!(is_partition(&d));
    assert_eq!(d.values_at(&key(0.0, 0.0)), value(1.0, 1.0));
    assert_eq!(d.values_at(&key(1.0, 1.0)), value(0.0, 1.0));
    assert_eq!(d.values_at(&key(2.0, 3.0)), value(0.0, 0.0));
    assert_eq!(d.values_at(&key(4.0, 4.0)), value(0.0, 2.0));
    assert_eq!(d.values_at(&key(5.0, 5.0)), value(2.0, 2.0));
    assert_eq!(d.values_at(&key(8.0, 8.0)), value(3.0, 3.0));
    assert!(d.values_at(&key(6.0, 7.0)).is_bottom());
}

#[test]
fn test_widening_chain_stabilizes() {
    let mut current = empty().partition_add(key(0.0, 0.0), value(0.0, 0.0));
    let mut steps = 0;
    loop {
        let n = f64::from(steps + 1);
        let grown = current.clone().join(empty().partition_add(key(n, n), value(n, n)));
        let next = current.clone().widening(grown);
        assert!(is_partition(&next));
        if next.less_equal(&current) {
            break;
        }
        current = next;
        steps += 1;
        assert!(steps < 10, "widening did not stabilize: {current}");
    }
}

#[derive(Debug, Clone)]
enum Op {
    Strong(i32, i32, i32),
    Weak(i32, i32, i32),
    Update(i32, i32, i32),
    Join(i32, i32, i32),
    Meet(i32, i32, i32),
}

fn op() -> impl Strategy<Value = Op> {
    let segment = (-10i32..10, 0i32..5, -5i32..5);
    prop_oneof![
        segment.clone().prop_map(|(l, w, v)| Op::Strong(l, w, v)),
        segment.clone().prop_map(|(l, w, v)| Op::Weak(l, w, v)),
        segment.clone().prop_map(|(l, w, v)| Op::Update(l, w, v)),
        segment.clone().prop_map(|(l, w, v)| Op::Join(l, w, v)),
        segment.prop_map(|(l, w, v)| Op::Meet(l, w, v)),
    ]
}

fn segment(l: i32, w: i32, v: i32) -> (IntervalKeyWrapper, IntervalValueWrapper) {
    (key(f64::from(l), f64::from(l + w)), value(f64::from(v), f64::from(v)))
}

/// Containers built by weak updates over small key regions.
fn fulara() -> impl Strategy<Value = Fulara> {
    prop::collection::vec((-8i32..8, 0i32..4, -5i32..5), 0..6).prop_map(|segments| {
        segments.into_iter().fold(empty(), |d, (l, w, v)| {
            let (k, v) = segment(l, w, v);
            d.normalized_add(k, v)
        })
    })
}

proptest! {
    #[test]
    fn prop_segments_stay_disjoint(ops in prop::collection::vec(op(), 1..25)) {
        let mut d = empty();
        for op in ops {
            d = match op {
                Op::Strong(l, w, v) => {
                    let (k, v) = segment(l, w, v);
                    d.partition_add(k, v)
                }
                Op::Weak(l, w, v) => {
                    let (k, v) = segment(l, w, v);
                    d.normalized_add(k, v)
                }
                Op::Update(l, w, v) => d.partition_update(vec![segment(l, w, v)]),
                Op::Join(l, w, v) => {
                    let (k, v) = segment(l, w, v);
                    d.join(empty().partition_add(k, v))
                }
                Op::Meet(l, w, v) => {
                    let (k, v) = segment(l, w, v);
                    d.meet(Fulara::new(key(0.0, 0.0), value(0.0, 0.0)).partition_add(k, v))
                }
            };
            prop_assert!(is_partition(&d), "overlapping segments in {}", d);
        }
    }

    #[test]
    fn prop_lattice_laws(x in fulara(), y in fulara(), z in fulara()) {
        prop_assert!(x.bottom().less_equal(&x));
        prop_assert!(x.less_equal(&x.top()));

        prop_assert_eq!(x.clone().join(x.clone()), x.clone());
        prop_assert_eq!(x.clone().meet(x.clone()), x.clone());
        prop_assert_eq!(x.clone().join(y.clone()), y.clone().join(x.clone()));
        prop_assert_eq!(x.clone().meet(y.clone()), y.clone().meet(x.clone()));

        let lower = x.clone().meet(y.clone());
        prop_assert!(lower.less_equal(&x));
        prop_assert!(lower.less_equal(&y));

        // `x ⊑ x ⊔ z`, so join and meet collapse onto the operands
        let above = x.clone().join(z);
        prop_assert!(x.less_equal(&above));
        prop_assert_eq!(x.clone().join(above.clone()), above.clone());
        prop_assert_eq!(x.clone().meet(above), x.clone());
        if x.less_equal(&y) {
            prop_assert_eq!(x.clone().join(y.clone()), y.clone());
            prop_assert_eq!(x.clone().meet(y), x);
        }
    }

    #[test]
    fn prop_join_is_an_upper_bound(a in prop::collection::vec((-10i32..10, 0i32..5, -5i32..5), 0..6),
                                   b in prop::collection::vec((-10i32..10, 0i32..5, -5i32..5), 0..6)) {
        let build = |segments: &[(i32, i32, i32)]| {
            segments.iter().fold(empty(), |d, &(l, w, v)| {
                let (k, v) = segment(l, w, v);
                d.partition_add(k, v)
            })
        };
        let (x, y) = (build(&a), build(&b));
        let joined = x.clone().join(y.clone());
        prop_assert!(x.less_equal(&joined));
        prop_assert!(y.less_equal(&joined));
        prop_assert!(joined.less_equal(&x.widening(y)));
    }
}

/// ```text
/// d = {}
/// i = 0
/// while i < 5:
///     d[i] = i
///     i = i + 1
/// ```
#[test]
fn test_dictionary_filled_in_a_loop() -> Result<()> {
    init_tracing();
    let d = VariableIdentifier::new("d", Type::dict(Type::Int, Type::Int));
    let i = int_var("i");
    let dict = Statement::dict_display(pp(1), d.typ.clone(), vec![], vec![]);
    let item = Statement::subscription(pp(4), Type::Int, read(4, &d), read(4, &i));

    let mut builder = CfgBuilder::new();
    let init = builder.add_basic(vec![assign(1, &d, dict), assign(2, &i, Statement::int(pp(2), 0))]);
    let head = builder.add_loop();
    let body = builder.add_basic(vec![
        Statement::assignment(pp(4), item, read(4, &i)),
        assign(5, &i, add(5, read(5, &i), Statement::int(pp(5), 1))),
    ]);
    let exit = builder.add_basic(vec![print(6, read(6, &d))]);
    builder
        .add_edge(init, head, EdgeKind::Default)
        .add_conditional_edge(head, body, EdgeKind::LoopIn, compare(3, "lt", read(3, &i), Statement::int(pp(3), 5)))
        .add_edge(body, head, EdgeKind::Default)
        .add_conditional_edge(head, exit, EdgeKind::LoopOut, compare(3, "gte", read(3, &i), Statement::int(pp(3), 5)));
    let cfg = builder.build(init, exit)?;

    let config = InterpreterConfig {
        widening: 2,
        max_iterations: Some(20),
    };
    let result = Interpreter::forward(&cfg, config).analyze(FularaState::new(cfg.variables()))?;

    let after_init = result.exit_state(init).and_then(|s| s.contents(&d)).map(Fulara::is_empty);
    assert_eq!(after_init, Some(true));

    let first_pass = result.get_node_result(body).and_then(|states| states.get(1));
    assert!(first_pass.is_some_and(|s| !s.is_bottom()));

    let state = result.exit_state(exit).ok_or_else(|| anyhow::anyhow!("no exit state"))?;
    assert!(!state.is_bottom());
    assert_eq!(state.scalar(&i).map(|r| r.lower()), Some(5.0));
    let values = state
        .contents(&d)
        .map(|c| c.get_values_joined().interval())
        .unwrap_or(IntervalLattice::BOTTOM);
    assert_eq!(values.lower(), 0.0);
    Ok(())
}

/// Strong updates on a known dictionary make later reads exact.
#[test]
fn test_dictionary_reads_after_strong_updates() -> Result<()> {
    let d = VariableIdentifier::new("d", Type::dict(Type::Int, Type::Int));
    let x = int_var("x");
    let item = |line, k| Statement::subscription(pp(line), Type::Int, read(line, &d), Statement::int(pp(line), k));

    let mut builder = CfgBuilder::new();
    let only = builder.add_basic(vec![
        assign(1, &d, Statement::dict_display(pp(1), d.typ.clone(), vec![], vec![])),
        Statement::assignment(pp(2), item(2, 3), Statement::int(pp(2), 2)),
        Statement::assignment(pp(3), item(3, 4), Statement::int(pp(3), 1)),
        assign(4, &x, add(4, Statement::subscription(pp(4), Type::Int, read(4, &d), Statement::int(pp(4), 3)), Statement::int(pp(4), 10))),
    ]);
    let cfg = builder.build(only, only)?;

    let result = Interpreter::forward(&cfg, InterpreterConfig::default()).analyze(FularaState::new(cfg.variables()))?;
    let state = result.exit_state(only).ok_or_else(|| anyhow::anyhow!("no exit state"))?;
    assert_eq!(state.scalar(&x), Some(IntervalLattice::point(12.0)));
    assert_eq!(state.scalar(&d.length_of()), Some(IntervalLattice::point(2.0)));
    Ok(())
}
