//! Consumer interface: op handoff, returns, and next-fetch-addr.

use crate::common::harness::{TestContext, WorkloadBuilder, scenario_config};

fn one_ft() -> TestContext {
    let workload = WorkloadBuilder::new()
        .inst(0x1000, 4)
        .inst(0x1004, 4)
        .jump(0x1008, 4, 0x2000)
        .inst(0x2000, 4)
        .jump(0x2004, 4, 0x3000)
        .inst(0x3000, 4)
        .build();
    let mut ctx = TestContext::new(&workload);
    ctx.produce(2);
    ctx
}

// ══════════════════════════════════════════════════════════
// 1. Op handoff
// ══════════════════════════════════════════════════════════

/// `fetch_op` pops the head FT on demand and streams its ops.
#[test]
fn fetch_op_streams_across_fts() {
    let mut ctx = one_ft();
    assert!(ctx.sim.frontend.can_fetch_op());

    let mut addrs = Vec::new();
    while let Some((id, _)) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core) {
        addrs.push(ctx.sim.core.pool.get(id).addr);
        ctx.sim.core.pool.free(id);
    }
    assert_eq!(addrs, vec![0x1000, 0x1004, 0x1008, 0x2000, 0x2004]);
    assert!(!ctx.sim.frontend.can_fetch_op());
}

/// `fetch_op` then `return_op` restores the cursor and availability.
#[test]
fn fetch_then_return_round_trips() {
    let mut ctx = one_ft();

    let (first, _) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    let (second, end) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    assert!(!end);
    let could_fetch = ctx.sim.frontend.can_fetch_op();

    ctx.sim.frontend.return_op(&ctx.sim.core, second);
    assert_eq!(ctx.sim.frontend.can_fetch_op(), could_fetch);

    let (again, end_again) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    assert_eq!(again, second);
    assert_eq!(end_again, end);
    assert_ne!(first, second);
}

/// FT-granularity handoff exposes the window geometry.
#[test]
fn fetch_ft_reports_the_window() {
    let mut ctx = one_ft();
    assert!(ctx.sim.frontend.can_fetch_ft());
    let (start, length) = ctx.sim.frontend.fetch_ft(&mut ctx.sim.core).unwrap();
    assert_eq!((start, length), (0x1000, 12));
    let (start, length) = ctx.sim.frontend.fetch_ft(&mut ctx.sim.core).unwrap();
    assert_eq!((start, length), (0x2000, 8));
    assert!(!ctx.sim.frontend.can_fetch_ft());
}

// ══════════════════════════════════════════════════════════
// 2. Next fetch address
// ══════════════════════════════════════════════════════════

/// With nothing staged, the next fetch address defers to the upstream
/// source; once FTs exist it tracks the next op to be handed out.
#[test]
fn next_fetch_addr_tracks_the_cursor() {
    let workload = WorkloadBuilder::new()
        .inst(0x1000, 4)
        .inst(0x1004, 4)
        .jump(0x1008, 4, 0x2000)
        .inst(0x2000, 4)
        .build();
    let mut ctx = TestContext::new(&workload);

    // Empty: upstream entry PC.
    assert_eq!(ctx.sim.frontend.next_fetch_addr(&ctx.sim.core), 0x1000);

    ctx.produce(1);
    assert_eq!(ctx.sim.frontend.next_fetch_addr(&ctx.sim.core), 0x1000);

    let (id, _) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    ctx.sim.core.pool.free(id);
    // The in-use FT cursor now points at the second op.
    assert_eq!(ctx.sim.frontend.next_fetch_addr(&ctx.sim.core), 0x1004);
}

// ══════════════════════════════════════════════════════════
// 3. Prefetcher re-anchoring
// ══════════════════════════════════════════════════════════

/// With predictor-confidence tracking on, popping the FT an iterator sits at
/// the head of re-anchors the prefetcher on the popped FT's first op.
#[test]
fn pop_reanchors_the_prefetcher() {
    let workload = WorkloadBuilder::new()
        .inst(0x1000, 4)
        .jump(0x1004, 4, 0x2000)
        .inst(0x2000, 4)
        .build();
    let mut config = scenario_config();
    config.frontend.fdip_bp_confidence = true;
    let mut ctx = TestContext::with_config(&workload, &config);

    let _it = ctx.sim.frontend.new_iter();
    ctx.produce(1);
    assert!(ctx.sim.core.fdip.cur_op().is_none());

    ctx.sim.frontend.fetch_ft(&mut ctx.sim.core).unwrap();
    let anchor = ctx.sim.core.fdip.cur_op().expect("prefetcher not re-anchored");
    assert_eq!(ctx.sim.core.pool.get(anchor).addr, 0x1000);
}
