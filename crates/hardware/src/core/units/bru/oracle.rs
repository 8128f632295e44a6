//! Oracle branch predictor.
//!
//! Follows the true path exactly, except where the workload scripts a
//! misprediction: an op arriving with a recovery flag already set is
//! predicted down the wrong path, which is what sends the front-end
//! off-path until the back-end resolves it.

use super::predictor::OpBranchPredictor;
use crate::common::Addr;
use crate::core::op::{CfType, Op};

/// Oracle predictor state. Stateless; the truth travels with the op.
#[derive(Default)]
pub struct OraclePredictor;

impl OraclePredictor {
    /// Creates an oracle predictor.
    pub fn new() -> Self {
        Self
    }
}

impl OpBranchPredictor for OraclePredictor {
    fn predict_op(&mut self, op: &mut Op, _cf_index: u32, _fetch_addr: Addr) -> Addr {
        let scripted = op.oracle.recover_at_decode || op.oracle.recover_at_exec;
        if !scripted {
            op.oracle.pred_taken = op.oracle.dir_taken;
            op.oracle.mispred = false;
            return op.oracle.npc;
        }

        op.oracle.mispred = true;
        if op.cf_type == CfType::CondBr {
            // Wrong direction: the predicted path is the one not taken.
            op.oracle.pred_taken = !op.oracle.dir_taken;
            if op.oracle.pred_taken {
                if op.target != 0 { op.target } else { op.oracle.npc }
            } else {
                op.end_addr()
            }
        } else {
            // Wrong target: direction is right, the target resolves later.
            op.oracle.pred_taken = op.oracle.dir_taken;
            op.end_addr()
        }
    }
}
