//! Upstream source seam.
//!
//! Exercises the producer against a mocked instruction source and the
//! workload file loader against a real temporary file.

use mockall::mock;
use mockall::predicate::eq;

use crate::common::harness::{TestContext, WorkloadBuilder};
use fetch_core::common::Addr;
use fetch_core::core::op::Op;
use fetch_core::sim::source::{InstructionSource, SourceWrapper};
use fetch_core::sim::trace::Workload;

mock! {
    pub Upstream {}

    impl InstructionSource for Upstream {
        fn can_fetch_op(&self) -> bool;
        fn fetch_op(&mut self, op: &mut Op);
        fn redirect(&mut self, inst_uid: u64, pc: Addr);
        fn recover(&mut self, inst_uid: u64);
        fn next_fetch_addr(&self) -> Addr;
        fn retire(&mut self, inst_uid: u64);
    }
}

/// An unfetchable upstream breaks the producer cycle without allocating.
#[test]
fn unfetchable_upstream_breaks_cleanly() {
    let workload = WorkloadBuilder::new().inst(0x1000, 4).build();
    let mut ctx = TestContext::new(&workload);

    let mut upstream = MockUpstream::new();
    upstream.expect_can_fetch_op().return_const(false);
    ctx.sim.core.src = SourceWrapper::Custom(Box::new(upstream));

    ctx.produce(1);
    assert_eq!(ctx.sim.core.pool.live(), 0);
    assert_eq!(ctx.sim.frontend.next_op_num(), 1);
    assert_eq!(ctx.sim.core.stats.fetched_ins_on_path, 0);
}

/// The producer pulls exactly the ops the upstream will yield and stamps
/// sequence numbers onto them.
#[test]
fn producer_pulls_and_stamps_ops() {
    let workload = WorkloadBuilder::new().inst(0x1000, 4).build();
    let mut ctx = TestContext::new(&workload);

    let mut upstream = MockUpstream::new();
    upstream
        .expect_can_fetch_op()
        .times(1)
        .return_const(true);
    upstream.expect_can_fetch_op().return_const(false);
    upstream.expect_fetch_op().times(1).returning(|op| {
        op.addr = 0x8000;
        op.size = 4;
        op.bom = true;
        op.eom = true;
        op.inst_uid = 7;
        op.oracle.npc = 0x8004;
    });
    ctx.sim.core.src = SourceWrapper::Custom(Box::new(upstream));

    ctx.produce(1);
    assert_eq!(ctx.sim.core.pool.live(), 1);
    assert_eq!(ctx.sim.frontend.next_op_num(), 2);
    assert_eq!(ctx.sim.core.stats.fetched_ins_on_path, 1);
}

/// Retiring a barrier op forwards retirement upstream with its UID.
#[test]
fn retire_forwards_upstream() {
    let workload = WorkloadBuilder::new().barrier(0x4000, 4).build();
    let mut ctx = TestContext::new(&workload);
    ctx.produce(1);

    let (id, _) = ctx.sim.frontend.fetch_op(&mut ctx.sim.core).unwrap();
    let uid = ctx.sim.core.pool.get(id).inst_uid;

    let mut upstream = MockUpstream::new();
    upstream.expect_retire().with(eq(uid)).times(1).return_const(());
    ctx.sim.core.src = SourceWrapper::Custom(Box::new(upstream));

    ctx.sim.frontend.retire(&mut ctx.sim.core, id);
    assert!(!ctx.sim.frontend.is_stalled());
    ctx.sim.core.pool.free(id);
}

/// Workload JSON loads from a file on disk.
#[test]
fn workload_loads_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{
            "entry": 4096,
            "insts": [
                {{ "addr": 4096 }},
                {{ "addr": 4100, "cf": "Br", "target": 4096, "taken": true }}
            ]
        }}"#
    )
    .expect("write workload");

    let workload = Workload::from_file(file.path()).expect("load workload");
    assert_eq!(workload.entry, 4096);
    assert_eq!(workload.insts.len(), 2);

    // The loaded workload actually drives the front-end.
    let mut ctx = TestContext::new(&workload);
    ctx.produce(1);
    assert_eq!(ctx.sim.frontend.num_fts(), 1);
}
