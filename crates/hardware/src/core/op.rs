//! Micro-operation definition.
//!
//! An `Op` is one micro-op of a macro-instruction as delivered by the
//! upstream instruction source. The front-end reads its address, size, and
//! control-flow metadata to compose fetch targets; the oracle block carries
//! the true outcome so the predictor seam can flag mispredictions.

use crate::common::Addr;
use serde::Deserialize;

/// Control-flow classification of an op.
///
/// Only the final micro-op of a macro-instruction carries a control-flow
/// type; earlier micro-ops are `NotCf`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CfType {
    /// Not a control-flow op.
    #[default]
    NotCf,
    /// Unconditional direct branch.
    Br,
    /// Conditional direct branch.
    CondBr,
    /// Direct call.
    Call,
    /// Indirect branch.
    IndirectBr,
    /// Indirect call.
    IndirectCall,
    /// Return.
    Ret,
    /// System call.
    Sys,
}

impl CfType {
    /// Returns true for any control-flow op.
    #[inline]
    pub fn is_cf(self) -> bool {
        self != CfType::NotCf
    }
}

/// Oracle metadata: the true outcome of an op and the prediction verdict.
///
/// `npc` and `dir_taken` come from the instruction source (the truth);
/// `pred_taken`, `mispred`, and the recover flags are stamped by the branch
/// predictor seam when the producer requests a prediction.
#[derive(Clone, Copy, Debug, Default)]
pub struct OracleInfo {
    /// True next PC after this op's macro-instruction.
    pub npc: Addr,
    /// True direction of a conditional branch.
    pub dir_taken: bool,
    /// Predicted direction.
    pub pred_taken: bool,
    /// The prediction disagrees with the oracle outcome.
    pub mispred: bool,
    /// The target was absent from the BTB.
    pub btb_miss: bool,
    /// The back-end will resolve this misprediction at decode.
    pub recover_at_decode: bool,
    /// The back-end will resolve this misprediction at execute.
    pub recover_at_exec: bool,
}

/// One micro-operation as staged by the front-end.
///
/// Owned by the op pool; the front-end and back-end pass `OpId` handles and
/// read the fields through the pool.
#[derive(Clone, Debug, Default)]
pub struct Op {
    /// Address of the op's macro-instruction.
    pub addr: Addr,
    /// Macro-instruction size in bytes (shared by all its micro-ops).
    pub size: u64,
    /// Branch target of a direct control-flow op, 0 otherwise.
    pub target: Addr,
    /// First micro-op of its macro-instruction.
    pub bom: bool,
    /// Last micro-op of its macro-instruction.
    pub eom: bool,
    /// Control-flow classification.
    pub cf_type: CfType,
    /// Carries a fetch-barrier (serializing) bit.
    pub bar_fetch: bool,
    /// Is a system call.
    pub is_syscall: bool,
    /// Marks application exit.
    pub exit: bool,
    /// Fetched while on a speculative wrong path.
    pub off_path: bool,
    /// Per-core monotonic sequence number, stamped by the producer.
    pub op_num: u64,
    /// Upstream instruction UID, used for redirect/recover/retire.
    pub inst_uid: u64,
    /// Oracle outcome and prediction verdict.
    pub oracle: OracleInfo,
}

impl Op {
    /// Returns true if this op is any kind of control-flow op.
    #[inline]
    pub fn is_cf(&self) -> bool {
        self.cf_type.is_cf()
    }

    /// Returns true if this op stalls fetch behind itself (syscall or
    /// serializing instruction).
    #[inline]
    pub fn is_fetch_barrier(&self) -> bool {
        self.bar_fetch || self.is_syscall
    }

    /// Address one past the last byte of the macro-instruction.
    #[inline]
    pub fn end_addr(&self) -> Addr {
        self.addr + self.size
    }
}
