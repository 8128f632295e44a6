//! Global-history (gshare) branch predictor at op granularity.
//!
//! Direction comes from a pattern history table of 2-bit saturating counters
//! indexed by the branch PC xor-folded with global history. Targets are
//! ideal: a predicted-taken branch goes to its true target unless the
//! workload marks a BTB miss, in which case the target resolves at decode.
//! Counters and history train immediately with the oracle direction.

use super::predictor::OpBranchPredictor;
use crate::common::Addr;
use crate::core::op::{CfType, Op};

/// Gshare predictor state.
pub struct GShareOpPredictor {
    /// Pattern history table of 2-bit saturating counters.
    table: Vec<u8>,
    /// Mask used to index the table.
    table_mask: u64,
    /// Global branch history register.
    history: u64,
    /// Bits of history folded into the index.
    history_mask: u64,
    /// Prediction-port budget per cycle.
    preds_per_cycle: u32,
    /// Predictions issued in the current cycle.
    preds_this_cycle: u32,
}

impl GShareOpPredictor {
    /// Creates a gshare predictor.
    ///
    /// # Arguments
    ///
    /// * `table_bits` - Log2 of the pattern history table size.
    /// * `history_bits` - Global history bits folded into the index.
    /// * `preds_per_cycle` - Prediction-port budget per cycle.
    pub fn new(table_bits: usize, history_bits: usize, preds_per_cycle: u32) -> Self {
        let size = 1usize << table_bits;
        Self {
            // Weakly not-taken.
            table: vec![1; size],
            table_mask: (size - 1) as u64,
            history: 0,
            history_mask: (1u64 << history_bits) - 1,
            preds_per_cycle,
            preds_this_cycle: 0,
        }
    }

    #[inline]
    fn index(&self, pc: Addr) -> usize {
        (((pc >> 1) ^ (self.history & self.history_mask)) & self.table_mask) as usize
    }

    fn predict_direction(&self, pc: Addr) -> bool {
        self.table[self.index(pc)] >= 2
    }

    fn train(&mut self, pc: Addr, taken: bool) {
        let idx = self.index(pc);
        let counter = &mut self.table[idx];
        if taken {
            if *counter < 3 {
                *counter += 1;
            }
        } else if *counter > 0 {
            *counter -= 1;
        }
        self.history = ((self.history << 1) | taken as u64) & self.history_mask;
    }
}

impl OpBranchPredictor for GShareOpPredictor {
    fn predict_op(&mut self, op: &mut Op, _cf_index: u32, fetch_addr: Addr) -> Addr {
        self.preds_this_cycle += 1;

        // Workload-scripted flags are the oracle predictor's input; this
        // mechanism computes its own verdict.
        op.oracle.recover_at_decode = false;
        op.oracle.recover_at_exec = false;
        op.oracle.mispred = false;

        let pred_taken = match op.cf_type {
            CfType::CondBr => {
                let taken = self.predict_direction(fetch_addr);
                self.train(fetch_addr, op.oracle.dir_taken);
                taken
            }
            // Unconditional control flow always redirects.
            _ => true,
        };
        op.oracle.pred_taken = pred_taken;

        if op.cf_type == CfType::CondBr && pred_taken != op.oracle.dir_taken {
            // Wrong direction resolves at execute.
            op.oracle.mispred = true;
            op.oracle.recover_at_exec = true;
            return if pred_taken {
                if op.target != 0 { op.target } else { op.oracle.npc }
            } else {
                op.end_addr()
            };
        }

        if op.oracle.btb_miss && pred_taken {
            // Right direction, unknown target; decode supplies the target.
            op.oracle.mispred = true;
            op.oracle.recover_at_decode = true;
            return op.end_addr();
        }

        op.oracle.npc
    }

    fn is_predictable(&self) -> bool {
        self.preds_this_cycle < self.preds_per_cycle
    }

    fn begin_cycle(&mut self) {
        self.preds_this_cycle = 0;
    }
}
