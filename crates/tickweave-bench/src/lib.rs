//! Benchmark profiles for the Tickweave scheduling core.
//!
//! Synthetic designs sized for benchmarking elaboration and ticking:
//!
//! - [`chain_profile`]: `n` copy stages in one dependency chain.
//! - [`grid_profile`]: `lanes × stages` adders, each stage reading its own
//!   lane and the next lane, so every batch is `lanes` wide.
//! - [`register_ring_profile`]: `n` incrementers in a ring, ordered by
//!   explicit constraints so the closing edge is sequential.
//!
//! Every profile registers its blocks in reverse dataflow order.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tickweave_block::{BinOp, Expr, Span, Stmt, UpdateBlock};
use tickweave_core::{BlockId, SignalId, SignalKind};
use tickweave_engine::{Design, SimConfig, TickMode};

fn wire(design: &mut Design, path: String) -> SignalId {
    let top = design.hierarchy.top();
    design
        .signals
        .declare(path, SignalKind::Wire, "Bits64", top)
        .expect("profile signal paths are unique")
}

fn register(design: &mut Design, block: UpdateBlock) -> BlockId {
    let top = design.hierarchy.top();
    design
        .hierarchy
        .register_block(top, block)
        .expect("profile block names are unique")
}

fn sum_block(name: String, srcs: Vec<SignalId>, dst: SignalId, line: u32) -> UpdateBlock {
    let expr = srcs
        .iter()
        .skip(1)
        .fold(Expr::sig(srcs[0]), |acc, &s| {
            Expr::binary(BinOp::Add, acc, Expr::sig(s))
        });
    UpdateBlock::new(
        name,
        vec![Stmt::assign(dst, expr, Span::line(line))],
        move |ctx| {
            let mut sum = 0u64;
            for &s in &srcs {
                sum = sum.wrapping_add(ctx.read(s)?);
            }
            ctx.write(dst, sum)
        },
    )
}

/// `n` copy stages: `s[i+1] = s[i]`.
pub fn chain_profile(n: usize) -> Design {
    let mut d = Design::new("top");
    let stages: Vec<SignalId> = (0..=n).map(|i| wire(&mut d, format!("top.s{i}"))).collect();
    for i in (0..n).rev() {
        register(
            &mut d,
            sum_block(format!("stage{i}"), vec![stages[i]], stages[i + 1], i as u32),
        );
    }
    d
}

/// `lanes × stages` adders: `w[l][s+1] = w[l][s] + w[(l+1) % lanes][s]`.
pub fn grid_profile(lanes: usize, stages: usize) -> Design {
    let mut d = Design::new("top");
    let mut w = Vec::with_capacity(lanes);
    for l in 0..lanes {
        let lane: Vec<SignalId> = (0..=stages)
            .map(|s| wire(&mut d, format!("top.l{l}.s{s}")))
            .collect();
        w.push(lane);
    }
    for s in (0..stages).rev() {
        for l in 0..lanes {
            let srcs = if lanes > 1 {
                vec![w[l][s], w[(l + 1) % lanes][s]]
            } else {
                vec![w[l][s]]
            };
            register(
                &mut d,
                sum_block(format!("l{l}s{s}"), srcs, w[l][s + 1], s as u32),
            );
        }
    }
    d
}

/// `n` incrementers in a ring: `r[i] = r[i-1] + 1`, with `b[i] < b[i+1]`.
/// The edge from the last block back to the first is a register.
pub fn register_ring_profile(n: usize) -> Design {
    let mut d = Design::new("top");
    let r: Vec<SignalId> = (0..n).map(|i| wire(&mut d, format!("top.r{i}"))).collect();
    let mut ids = vec![BlockId(0); n];
    for i in (0..n).rev() {
        let (src, dst) = (r[(i + n - 1) % n], r[i]);
        let block = UpdateBlock::new(
            format!("inc{i}"),
            vec![Stmt::assign(
                dst,
                Expr::binary(BinOp::Add, Expr::sig(src), Expr::Const(1)),
                Span::line(i as u32),
            )],
            move |ctx| {
                let v = ctx.read(src)?;
                ctx.write(dst, v.wrapping_add(1))
            },
        );
        ids[i] = register(&mut d, block);
    }
    let top = d.hierarchy.top();
    d.hierarchy
        .add_constraints(top, ids.windows(2).map(|p| (p[0], p[1])))
        .expect("ring constraints are acyclic");
    d
}

/// Default configuration with the given tick mode.
pub fn bench_config(mode: TickMode) -> SimConfig {
    SimConfig {
        tick_mode: mode,
        ..SimConfig::default()
    }
}
