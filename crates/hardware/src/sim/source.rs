//! Upstream instruction sources.
//!
//! The front-end pulls ops from a source through a narrow interface: fetch,
//! speculative redirect, non-speculative recover, and retire. `ScriptedSource`
//! replays a workload image as an oracle: on the correct path it follows the
//! image's true control flow; once redirected off the image it synthesizes
//! straight-line filler ops so off-path fetch stays fully modeled.

use std::collections::BTreeMap;

use crate::common::Addr;
use crate::core::op::{CfType, Op, OracleInfo};
use crate::sim::trace::{MispredictAt, TraceInst, Workload};

/// Upstream instruction source interface.
///
/// One instance serves one core. `fetch_op` populates every op field except
/// the sequence number and path mark, which the producer stamps.
pub trait InstructionSource {
    /// Whether another op can be produced right now.
    fn can_fetch_op(&self) -> bool;

    /// Populates `op` with the next micro-op on the current fetch path.
    fn fetch_op(&mut self, op: &mut Op);

    /// Speculative redirect: continue fetching at `pc`.
    fn redirect(&mut self, inst_uid: u64, pc: Addr);

    /// Non-speculative rollback to just after the op identified by
    /// `inst_uid`.
    fn recover(&mut self, inst_uid: u64);

    /// PC of the next op `fetch_op` would produce.
    fn next_fetch_addr(&self) -> Addr;

    /// The op identified by `inst_uid` retired.
    fn retire(&mut self, inst_uid: u64);
}

/// Enum wrapper for static dispatch of instruction sources.
///
/// `Custom` is the escape hatch for embedders (and test doubles) that bring
/// their own source; the built-in kinds dispatch statically.
pub enum SourceWrapper {
    Scripted(ScriptedSource),
    Custom(Box<dyn InstructionSource>),
}

impl InstructionSource for SourceWrapper {
    #[inline(always)]
    fn can_fetch_op(&self) -> bool {
        match self {
            Self::Scripted(s) => s.can_fetch_op(),
            Self::Custom(s) => s.can_fetch_op(),
        }
    }

    #[inline(always)]
    fn fetch_op(&mut self, op: &mut Op) {
        match self {
            Self::Scripted(s) => s.fetch_op(op),
            Self::Custom(s) => s.fetch_op(op),
        }
    }

    #[inline(always)]
    fn redirect(&mut self, inst_uid: u64, pc: Addr) {
        match self {
            Self::Scripted(s) => s.redirect(inst_uid, pc),
            Self::Custom(s) => s.redirect(inst_uid, pc),
        }
    }

    #[inline(always)]
    fn recover(&mut self, inst_uid: u64) {
        match self {
            Self::Scripted(s) => s.recover(inst_uid),
            Self::Custom(s) => s.recover(inst_uid),
        }
    }

    #[inline(always)]
    fn next_fetch_addr(&self) -> Addr {
        match self {
            Self::Scripted(s) => s.next_fetch_addr(),
            Self::Custom(s) => s.next_fetch_addr(),
        }
    }

    #[inline(always)]
    fn retire(&mut self, inst_uid: u64) {
        match self {
            Self::Scripted(s) => s.retire(inst_uid),
            Self::Custom(s) => s.retire(inst_uid),
        }
    }
}

/// Byte size of the filler ops synthesized off the program image.
const FILLER_SIZE: u64 = 4;

/// Oracle source replaying a workload image.
pub struct ScriptedSource {
    image: BTreeMap<Addr, TraceInst>,
    fetch_pc: Addr,
    /// Micro-op index within the current macro-instruction.
    uop_index: u32,
    next_uid: u64,
    /// True next PC after each fetched instruction, keyed by UID. Consulted
    /// by `recover`, pruned by `retire`.
    npc_by_uid: BTreeMap<u64, Addr>,
    /// The on-path exit instruction has been fetched.
    exhausted: bool,
}

impl ScriptedSource {
    /// Builds a source from a workload.
    pub fn new(workload: &Workload) -> Self {
        let image = workload
            .insts
            .iter()
            .map(|inst| (inst.addr, inst.clone()))
            .collect();
        Self {
            image,
            fetch_pc: workload.entry,
            uop_index: 0,
            next_uid: 1,
            npc_by_uid: BTreeMap::new(),
            exhausted: false,
        }
    }

    fn fill_from_inst(op: &mut Op, inst: &TraceInst, uop_index: u32) {
        let last = uop_index + 1 >= inst.uops.max(1);
        op.addr = inst.addr;
        op.size = inst.size;
        op.bom = uop_index == 0;
        op.eom = last;
        // Control flow and barrier semantics ride on the final micro-op.
        if last {
            op.cf_type = if inst.syscall { CfType::Sys } else { inst.cf };
            op.target = inst.target;
            op.bar_fetch = inst.bar_fetch;
            op.is_syscall = inst.syscall;
            op.exit = inst.exit;
            op.oracle = OracleInfo {
                npc: inst.next_pc(),
                dir_taken: inst.taken,
                recover_at_decode: inst.mispredict == Some(MispredictAt::Decode),
                recover_at_exec: inst.mispredict == Some(MispredictAt::Exec),
                btb_miss: inst.mispredict == Some(MispredictAt::Decode),
                ..OracleInfo::default()
            };
        } else {
            op.oracle.npc = inst.addr;
        }
    }
}

impl InstructionSource for ScriptedSource {
    fn can_fetch_op(&self) -> bool {
        !self.exhausted
    }

    fn fetch_op(&mut self, op: &mut Op) {
        op.inst_uid = self.next_uid;
        self.next_uid += 1;

        match self.image.get(&self.fetch_pc) {
            Some(inst) => {
                let inst = inst.clone();
                Self::fill_from_inst(op, &inst, self.uop_index);
                if op.eom {
                    let npc = inst.next_pc();
                    self.npc_by_uid.insert(op.inst_uid, npc);
                    if inst.exit {
                        self.exhausted = true;
                    }
                    self.fetch_pc = npc;
                    self.uop_index = 0;
                } else {
                    self.uop_index += 1;
                }
            }
            None => {
                // Off the image: synthesize a straight-line filler op.
                op.addr = self.fetch_pc;
                op.size = FILLER_SIZE;
                op.bom = true;
                op.eom = true;
                op.oracle.npc = self.fetch_pc + FILLER_SIZE;
                self.npc_by_uid.insert(op.inst_uid, op.oracle.npc);
                self.fetch_pc += FILLER_SIZE;
            }
        }
    }

    fn redirect(&mut self, _inst_uid: u64, pc: Addr) {
        self.fetch_pc = pc;
        self.uop_index = 0;
    }

    fn recover(&mut self, inst_uid: u64) {
        let npc = *self
            .npc_by_uid
            .get(&inst_uid)
            .expect("recovery references an unknown instruction UID");
        self.fetch_pc = npc;
        self.uop_index = 0;
        // An off-path walk may have crossed the exit instruction.
        self.exhausted = false;
    }

    fn next_fetch_addr(&self) -> Addr {
        self.fetch_pc
    }

    fn retire(&mut self, inst_uid: u64) {
        // Nothing older than a retired instruction can be a recovery point.
        self.npc_by_uid = self.npc_by_uid.split_off(&(inst_uid + 1));
    }
}
