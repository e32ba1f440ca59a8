//! Integration tests: end-to-end elaboration scenarios.
//!
//! Each test builds a small design, elaborates it through the public
//! `Simulator`/`elaborate` API and checks the schedule, the reported
//! error, or the simulated values.

use tickweave_block::{BinOp, Expr, Span, Stmt, UpdateBlock};
use tickweave_core::{
    BlockError, BlockId, ComponentId, Cycle, SignalId, SignalKind, SignalTable, StepError,
};
use tickweave_engine::{
    elaborate, ConfigError, Design, ElaborationError, GenerateError, SimConfig, Simulator,
    TickMode,
};
use tickweave_net::NetError;
use tickweave_registry::{Hierarchy, RegistryError};
use tickweave_sched::{CycleEdge, EdgeKind, ScheduleError};
use tickweave_test_utils::fixtures::{
    chain, const_block, copy_block, counter, incr_block, wire, CounterFixture,
};

fn design_of(hierarchy: Hierarchy, signals: SignalTable) -> Design {
    Design::from_parts(hierarchy, signals)
}

// ── Counter ──────────────────────────────────────────────────────────

#[test]
fn counter_runs_incr_before_report() {
    let CounterFixture {
        hierarchy,
        signals,
        count,
        display,
        incr,
        report,
    } = counter();
    let mut sim = Simulator::new(design_of(hierarchy, signals), SimConfig::default()).unwrap();
    assert_eq!(sim.schedule().order(), &[incr, report]);

    sim.tick().unwrap();
    assert_eq!(sim.peek(count), Some(1));
    assert_eq!(sim.peek(display), Some(1));

    sim.run(4).unwrap();
    assert_eq!(sim.peek(display), Some(5));
    assert_eq!(sim.cycle(), Cycle(5));
}

#[test]
fn counter_metrics_count_the_graph() {
    let c = counter();
    let e = elaborate(&design_of(c.hierarchy, c.signals), &SimConfig::default()).unwrap();
    assert_eq!(e.metrics.blocks, 2);
    assert_eq!(e.metrics.nets, 2);
    assert_eq!(e.metrics.inferred_edges, 1);
    assert_eq!(e.metrics.sequential_edges, 0);
    assert_eq!(e.metrics.explicit_edges, 1);
    assert_eq!(e.metrics.batches, 2);
}

#[test]
fn duplicate_block_name_fails_at_registration() {
    let mut c = counter();
    let comp = c.hierarchy.component_by_name(c.hierarchy.top(), "ctr").unwrap();
    let err = c
        .hierarchy
        .register_block(comp, incr_block("incr", c.count))
        .unwrap_err();
    match err {
        RegistryError::DuplicateBlockName { component, name } => {
            assert_eq!(component, "top.ctr");
            assert_eq!(name, "incr");
        }
        other => panic!("expected DuplicateBlockName, got {other:?}"),
    }
    assert_eq!(c.hierarchy.block_count(), 2);
}

// ── Ordering ─────────────────────────────────────────────────────────

#[test]
fn chain_is_reordered_into_dataflow_order() {
    let c = chain(5);
    let mut sim = Simulator::new(design_of(c.hierarchy, c.signals), SimConfig::default()).unwrap();
    assert_eq!(sim.schedule().order(), c.blocks.as_slice());
    assert_eq!(sim.schedule().batches().len(), 5);

    sim.poke(c.stages[0], 7).unwrap();
    sim.tick().unwrap();
    assert_eq!(sim.peek(c.stages[5]), Some(7));
}

#[test]
fn mutual_dependency_is_a_combinational_cycle() {
    let mut d = Design::new("top");
    let x = wire(&mut d.signals, "top.x");
    let y = wire(&mut d.signals, "top.y");
    let top = d.hierarchy.top();
    d.hierarchy.register_block(top, copy_block("a", y, x)).unwrap();
    d.hierarchy.register_block(top, copy_block("b", x, y)).unwrap();

    match elaborate(&d, &SimConfig::default()) {
        Err(ElaborationError::Schedule(ScheduleError::CombinationalCycle { cycles })) => {
            assert_eq!(cycles.len(), 1);
            let names: Vec<&str> = cycles[0].blocks.iter().map(|(_, n)| n.as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
            assert!(cycles[0]
                .edges
                .iter()
                .all(|e| matches!(e, CycleEdge::Inferred { .. })));
        }
        other => panic!("expected CombinationalCycle, got {other:?}"),
    }
}

#[test]
fn constraint_turns_back_edge_into_register() {
    // a: x = y + 1   b: y = x   with a < b
    let mut d = Design::new("top");
    let x = wire(&mut d.signals, "top.x");
    let y = wire(&mut d.signals, "top.y");
    let top = d.hierarchy.top();
    let a = d
        .hierarchy
        .register_block(
            top,
            UpdateBlock::new(
                "a",
                vec![Stmt::assign(
                    x,
                    Expr::binary(BinOp::Add, Expr::sig(y), Expr::Const(1)),
                    Span::line(3),
                )],
                move |ctx| {
                    let v = ctx.read(y)?;
                    ctx.write(x, v + 1)
                },
            ),
        )
        .unwrap();
    let b = d.hierarchy.register_block(top, copy_block("b", x, y)).unwrap();
    d.hierarchy.add_constraint(top, a, b).unwrap();

    let mut sim = Simulator::new(d, SimConfig::default()).unwrap();
    assert_eq!(sim.schedule().order(), &[a, b]);
    let seq = sim.schedule().sequential_edges();
    assert_eq!(seq.len(), 1);
    assert_eq!((seq[0].writer, seq[0].reader), (b, a));
    assert_eq!(sim.elaboration().metrics.sequential_edges, 1);

    let diag = sim.diagnostics();
    assert_eq!(diag.count(EdgeKind::Sequential), 1);
    assert_eq!(diag.ranks, vec![(a, 0), (b, 1)]);

    sim.run(3).unwrap();
    assert_eq!(sim.peek(x), Some(3));
    assert_eq!(sim.peek(y), Some(3));
}

#[test]
fn constraint_cycle_is_fatal() {
    let mut d = Design::new("top");
    let x = wire(&mut d.signals, "top.x");
    let y = wire(&mut d.signals, "top.y");
    let top = d.hierarchy.top();
    let a = d.hierarchy.register_block(top, const_block("a", x, 1)).unwrap();
    let b = d.hierarchy.register_block(top, const_block("b", y, 2)).unwrap();
    let sub = d.hierarchy.add_component(top, "sub").unwrap();
    d.hierarchy.add_constraint(top, a, b).unwrap();
    d.hierarchy.add_constraint(sub, b, a).unwrap();

    match elaborate(&d, &SimConfig::default()) {
        Err(ElaborationError::Schedule(ScheduleError::ConstraintCycle { cycles })) => {
            assert_eq!(cycles[0].blocks.len(), 2);
            assert_eq!(cycles[0].edges.len(), 2);
        }
        other => panic!("expected ConstraintCycle, got {other:?}"),
    }
}

// ── Rejections ───────────────────────────────────────────────────────

#[test]
fn loops_are_reported_for_every_block() {
    let mut d = Design::new("top");
    let x = wire(&mut d.signals, "top.x");
    let y = wire(&mut d.signals, "top.y");
    let top = d.hierarchy.top();
    d.hierarchy
        .register_block(
            top,
            UpdateBlock::new(
                "looper",
                vec![Stmt::For {
                    var: "i".into(),
                    iter: Expr::call("range", vec![Expr::Const(4)]),
                    body: vec![Stmt::assign(x, Expr::local("i"), Span::line(3))],
                    span: Span::line(2),
                }],
                |_| Ok(()),
            ),
        )
        .unwrap();
    d.hierarchy.register_block(top, copy_block("fine", x, y)).unwrap();
    d.hierarchy
        .register_block(
            top,
            UpdateBlock::new(
                "spinner",
                vec![Stmt::While {
                    test: Expr::sig(y),
                    body: vec![Stmt::Pass { span: Span::line(6) }],
                    span: Span::line(5),
                }],
                |_| Ok(()),
            ),
        )
        .unwrap();

    match elaborate(&d, &SimConfig::default()) {
        Err(ElaborationError::Extract(e)) => {
            let names: Vec<&str> = e.errors.iter().map(|b| b.block_name.as_str()).collect();
            assert_eq!(names, vec!["looper", "spinner"]);
            assert_eq!(e.errors[0].span, Span::line(2));
        }
        other => panic!("expected Extract, got {other:?}"),
    }
}

#[test]
fn two_writers_on_one_net_are_reported() {
    let mut d = Design::new("top");
    let p = wire(&mut d.signals, "top.p");
    let q = wire(&mut d.signals, "top.q");
    d.connect(p, q);
    let top = d.hierarchy.top();
    let a = d.hierarchy.register_block(top, const_block("drive_p", p, 1)).unwrap();
    let b = d.hierarchy.register_block(top, const_block("drive_q", q, 2)).unwrap();

    match elaborate(&d, &SimConfig::default()) {
        Err(ElaborationError::Net(NetError::MultipleDrivers { conflicts })) => {
            assert_eq!(conflicts.len(), 1);
            let writers: Vec<BlockId> = conflicts[0].writers.iter().map(|(b, _)| *b).collect();
            assert_eq!(writers, vec![a, b]);
            let members: Vec<&str> = conflicts[0].members.iter().map(|(_, p)| p.as_str()).collect();
            assert_eq!(members, vec!["top.p", "top.q"]);
        }
        other => panic!("expected MultipleDrivers, got {other:?}"),
    }
}

#[test]
fn undriven_output_is_rejected_only_on_request() {
    let mut d = Design::new("top");
    d.signals
        .declare("top.out", SignalKind::OutPort, "Bits1", ComponentId(0))
        .unwrap();
    let x = wire(&mut d.signals, "top.x");
    let top = d.hierarchy.top();
    d.hierarchy.register_block(top, const_block("k", x, 1)).unwrap();

    assert!(elaborate(&d, &SimConfig::default()).is_ok());
    let strict = SimConfig {
        deny_undriven_outputs: true,
        ..SimConfig::default()
    };
    match elaborate(&d, &strict) {
        Err(ElaborationError::Net(NetError::UndrivenOutput { outputs })) => {
            assert_eq!(outputs.len(), 1);
            assert_eq!(outputs[0].1, "top.out");
        }
        other => panic!("expected UndrivenOutput, got {other:?}"),
    }
}

#[test]
fn unknown_connection_endpoint_is_a_config_error() {
    let mut d = Design::new("top");
    let x = wire(&mut d.signals, "top.x");
    d.connect(x, SignalId(9));
    match elaborate(&d, &SimConfig::default()) {
        Err(ElaborationError::Config(ConfigError::UnknownConnectionEndpoint { signal })) => {
            assert_eq!(signal.0, 9);
        }
        other => panic!("expected UnknownConnectionEndpoint, got {other:?}"),
    }
}

#[test]
fn design_without_blocks_reports_empty_schedule() {
    let d = Design::new("top");
    assert!(elaborate(&d, &SimConfig::default()).is_ok());
    match Simulator::new(d, SimConfig::default()) {
        Err(ElaborationError::Generate(GenerateError::EmptySchedule)) => {}
        other => panic!("expected EmptySchedule, got {other:?}"),
    }
}

#[test]
fn constant_nets_feed_readers_and_reject_pokes() {
    let mut d = Design::new("top");
    let k = d
        .signals
        .declare("top.k", SignalKind::Const(5), "Bits8", ComponentId(0))
        .unwrap();
    let w = wire(&mut d.signals, "top.w");
    let out = wire(&mut d.signals, "top.out");
    d.connect(k, w);
    let top = d.hierarchy.top();
    d.hierarchy.register_block(top, copy_block("use", w, out)).unwrap();

    let mut sim = Simulator::new(d, SimConfig::default()).unwrap();
    sim.tick().unwrap();
    assert_eq!(sim.peek(out), Some(5));
    assert_eq!(sim.poke(k, 1), Err(BlockError::ConstWrite { signal: k }));
    assert_eq!(sim.poke(w, 1), Err(BlockError::ConstWrite { signal: w }));
    sim.tick().unwrap();
    assert_eq!(sim.peek(k), Some(5));
    assert_eq!(sim.peek(w), Some(5));
    assert_eq!(sim.peek(out), Some(5));
}

// ── Structural edits ─────────────────────────────────────────────────

struct MirrorDesign {
    design: Design,
    count: SignalId,
    shadow: SignalId,
    incr: BlockId,
}

/// `core.incr` counts; `mirror.copy` mirrors the count into `shadow`.
fn mirror_design() -> MirrorDesign {
    let mut d = Design::new("top");
    let count = wire(&mut d.signals, "top.count");
    let shadow = wire(&mut d.signals, "top.shadow");
    let top = d.hierarchy.top();
    let core = d.hierarchy.add_component(top, "core").unwrap();
    let mirror = d.hierarchy.add_component(top, "mirror").unwrap();
    let incr = d.hierarchy.register_block(core, incr_block("incr", count)).unwrap();
    let copy = d
        .hierarchy
        .register_block(mirror, copy_block("copy", count, shadow))
        .unwrap();
    d.hierarchy.add_constraint(core, incr, copy).unwrap();
    MirrorDesign {
        design: d,
        count,
        shadow,
        incr,
    }
}

#[test]
fn removal_retracts_blocks_and_restructure_carries_values() {
    for mode in [TickMode::Normal, TickMode::Unrolled] {
        let MirrorDesign {
            design,
            count,
            shadow,
            incr,
        } = mirror_design();
        let config = SimConfig {
            tick_mode: mode,
            ..SimConfig::default()
        };
        let mut sim = Simulator::new(design, config).unwrap();
        sim.run(3).unwrap();
        assert_eq!(sim.peek(shadow), Some(3));

        sim.restructure(|d| {
            d.hierarchy.remove_component_by_name(d.hierarchy.top(), "mirror")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(sim.schedule().order(), &[incr]);
        assert!(sim.design().hierarchy.aggregate().constraints.is_empty());
        assert_eq!(sim.peek(count), Some(3));

        sim.tick().unwrap();
        assert_eq!(sim.peek(count), Some(4));
        assert_eq!(sim.peek(shadow), Some(3));
        assert_eq!(sim.cycle(), Cycle(4));
    }
}

#[test]
fn re_adding_a_removed_block_gets_a_fresh_id() {
    let MirrorDesign {
        design,
        count,
        shadow,
        incr,
    } = mirror_design();
    let mut sim = Simulator::new(design, SimConfig::default()).unwrap();
    sim.restructure(|d| {
        let top = d.hierarchy.top();
        d.hierarchy.remove_component_by_name(top, "mirror")?;
        let mirror = d.hierarchy.add_component(top, "mirror")?;
        let copy = d
            .hierarchy
            .register_block(mirror, copy_block("copy", count, shadow))?;
        d.hierarchy.add_constraint(mirror, incr, copy)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(sim.schedule().order(), &[incr, BlockId(2)]);
    sim.tick().unwrap();
    assert_eq!(sim.peek(shadow), Some(1));
}

#[test]
fn failed_edit_leaves_the_tick_stale() {
    let c = counter();
    let mut sim = Simulator::new(design_of(c.hierarchy, c.signals), SimConfig::default()).unwrap();
    let count = c.count;
    let err = sim
        .restructure(|d| {
            let top = d.hierarchy.top();
            d.hierarchy.register_block(top, copy_block("dup_writer", count, count))?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ElaborationError::Net(NetError::MultipleDrivers { .. })
    ));
    assert!(matches!(
        sim.tick(),
        Err(StepError::StaleSchedule { .. })
    ));
}
