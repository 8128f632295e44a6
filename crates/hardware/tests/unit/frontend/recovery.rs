//! Misprediction recovery.
//!
//! Recovery tears down every in-flight FT, releases unconsumed ops back to
//! the pool, resets all iterators, rewinds the op numbering, and redirects
//! the upstream source; the first op produced afterwards must resume at the
//! recovery fetch address.

use crate::common::harness::{TestContext, WorkloadBuilder};
use fetch_core::core::frontend::{RecoverAt, RecoveryInfo};
use fetch_core::sim::trace::MispredictAt;

/// Straight-line code, then an indirect branch whose target is mispredicted
/// until execute, with the correct path continuing at 0x2100.
fn mispredicted_branch() -> TestContext {
    let workload = WorkloadBuilder::new()
        .inst(0x2000, 4)
        .indirect(0x2004, 4, 0x2100)
        .mispredict(MispredictAt::Exec)
        .inst(0x2100, 4)
        .inst(0x2104, 4)
        .build();
    TestContext::new(&workload)
}

/// Drives the front-end to the off-path state with the mispredicted branch
/// consumed, returning the consumed op handles.
fn go_off_path(ctx: &mut TestContext) -> Vec<fetch_core::core::OpId> {
    // Cycle 1 produces the FT ending at the mispredicted branch and
    // redirects the source down the predicted (wrong) path.
    ctx.produce(1);
    assert!(ctx.sim.frontend.is_off_path());
    assert_eq!(ctx.sim.frontend.num_fts(), 1);

    // Cycle 2 fills a wrong-path FT from synthesized ops.
    ctx.produce(1);
    assert!(ctx.sim.frontend.num_fts() >= 1);

    let mut consumed = Vec::new();
    let (id, _) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    consumed.push(id);
    let (id, end) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    assert!(end);
    assert!(ctx.sim.core.pool.get(id).oracle.recover_at_exec);
    consumed.push(id);
    consumed
}

fn recovery_for_branch(ctx: &TestContext, consumed: &[fetch_core::core::OpId]) -> RecoveryInfo {
    let branch = ctx.sim.core.pool.get(consumed[1]);
    RecoveryInfo {
        fetch_addr: 0x2100,
        op_num: branch.op_num,
        inst_uid: branch.inst_uid,
        at: RecoverAt::Exec,
    }
}

// ══════════════════════════════════════════════════════════
// 1. Full rollback
// ══════════════════════════════════════════════════════════

/// Recovery empties the FTQ, resets iterators and numbering, releases
/// residual ops, and resumes fetch at the recovery address.
#[test]
fn recovery_rolls_the_front_end_back() {
    let mut ctx = mispredicted_branch();
    let it = ctx.sim.frontend.new_iter();

    // Cycle 1 stages the FT ending at the mispredicted branch and goes
    // off-path; cycle 2 stages wrong-path ops in the builder.
    ctx.produce(2);
    assert!(ctx.sim.frontend.is_off_path());
    assert_eq!(ctx.sim.frontend.num_fts(), 1);
    let staged = ctx.sim.core.pool.live();
    assert!(staged > 2);

    // Walk the iterator onto the branch, then park it past the last FT.
    let (first, _) = ctx.sim.frontend.iter_get(it).unwrap();
    assert_eq!(ctx.sim.core.pool.get(first).addr, 0x2000);
    let (branch, end) = ctx.sim.frontend.iter_advance(it).unwrap();
    assert!(end);
    let (branch_num, branch_uid) = {
        let op = ctx.sim.core.pool.get(branch);
        assert!(op.oracle.recover_at_exec);
        (op.op_num, op.inst_uid)
    };
    assert!(ctx.sim.frontend.iter_advance(it).is_none());
    assert_eq!(ctx.sim.frontend.iter_offset(it), 2);

    let info = RecoveryInfo {
        fetch_addr: 0x2100,
        op_num: branch_num,
        inst_uid: branch_uid,
        at: RecoverAt::Exec,
    };
    ctx.sim.core.cycle = 5;
    ctx.sim.frontend.recover(&mut ctx.sim.core, &info);

    assert!(!ctx.sim.frontend.is_off_path());
    assert_eq!(ctx.sim.frontend.num_fts(), 0);
    assert!(!ctx.sim.frontend.can_fetch_op());
    assert_eq!(ctx.sim.frontend.next_op_num(), branch_num + 1);
    assert_eq!(ctx.sim.frontend.iter_offset(it), 0);
    assert_eq!(ctx.sim.frontend.iter_ft_offset(it), 0);
    assert_eq!(ctx.sim.core.stats.recover_exec, 1);
    assert_eq!(ctx.sim.core.stats.recover_decode, 0);
    // Redirect happened on cycle 1, recovery on cycle 5.
    assert_eq!(ctx.sim.core.stats.offpath_cycles, 4);

    // Nothing was consumed, so recovery released every staged op.
    assert_eq!(ctx.sim.core.pool.live(), 0);

    // The next produced op resumes exactly at the recovery address (the
    // producer asserts this internally). Two cycles close a full line into
    // the FTQ so the iterator can see it.
    ctx.produce(2);
    let (resumed, _) = ctx.sim.frontend.iter_get(it).unwrap();
    assert_eq!(ctx.sim.core.pool.get(resumed).addr, 0x2100);
    assert!(!ctx.sim.core.pool.get(resumed).off_path);
}

/// A second recovery with no intervening producer tick only clears pending
/// state; off-path cycles are not double counted.
#[test]
fn back_to_back_recovery_is_a_no_op() {
    let mut ctx = mispredicted_branch();
    let consumed = go_off_path(&mut ctx);

    let info = recovery_for_branch(&ctx, &consumed);
    ctx.sim.core.cycle = 5;
    ctx.sim.frontend.recover(&mut ctx.sim.core, &info);
    let live_after_first = ctx.sim.core.pool.live();

    ctx.sim.core.cycle = 6;
    ctx.sim.frontend.recover(&mut ctx.sim.core, &info);

    assert_eq!(ctx.sim.core.stats.offpath_cycles, 4);
    assert_eq!(ctx.sim.core.stats.recover_exec, 2);
    assert_eq!(ctx.sim.frontend.num_fts(), 0);
    assert_eq!(ctx.sim.frontend.next_op_num(), info.op_num + 1);
    assert_eq!(ctx.sim.core.pool.live(), live_after_first);
}

// ══════════════════════════════════════════════════════════
// 2. Numbering
// ══════════════════════════════════════════════════════════

/// Op numbering is strictly monotonic between recoveries.
#[test]
fn op_num_is_strictly_monotonic() {
    let mut builder = WorkloadBuilder::new();
    for i in 0..64 {
        builder = builder.inst(0x1000 + i * 4, 4);
    }
    let mut ctx = TestContext::new(&builder.build());
    ctx.produce(4);

    let mut last = 0;
    while let Some((id, _)) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core) {
        let num = ctx.sim.core.pool.get(id).op_num;
        assert!(num > last);
        last = num;
        ctx.sim.core.pool.free(id);
    }
}

// ══════════════════════════════════════════════════════════
// 3. End to end through the back-end model
// ══════════════════════════════════════════════════════════

/// The full simulator resolves a scripted exec-time misprediction, recovers,
/// and runs the workload to exit.
#[test]
fn simulator_recovers_and_completes() {
    let workload = WorkloadBuilder::new()
        .inst(0x2000, 4)
        .indirect(0x2004, 4, 0x2100)
        .mispredict(MispredictAt::Exec)
        .inst(0x2100, 4)
        .exit(0x2104, 4)
        .build();
    let mut ctx = TestContext::new(&workload);

    assert!(ctx.sim.run(500));
    assert_eq!(ctx.sim.core.stats.recover_exec, 1);
    assert!(ctx.sim.core.stats.offpath_cycles > 0);
    assert!(ctx.sim.core.stats.cycles_off_path > 0);
    assert!(ctx.sim.core.stats.fetched_ins_off_path > 0);
}

/// A decode-time misprediction lands in the decode recovery counter.
#[test]
fn decode_recovery_is_classified() {
    let workload = WorkloadBuilder::new()
        .inst(0x2000, 4)
        .indirect(0x2004, 4, 0x2100)
        .mispredict(MispredictAt::Decode)
        .inst(0x2100, 4)
        .exit(0x2104, 4)
        .build();
    let mut ctx = TestContext::new(&workload);

    assert!(ctx.sim.run(500));
    assert_eq!(ctx.sim.core.stats.recover_decode, 1);
    assert_eq!(ctx.sim.core.stats.recover_exec, 0);
}
