//! Fetch target: an ordered, contiguous run of ops sharing one I-cache fetch
//! window.
//!
//! A fetch target (FT) is built op by op, closes for one of four reasons, and
//! is then queued for the I-cache. The consumer streams ops out through a
//! read cursor; recovery releases whatever the consumer has not taken.

use crate::common::Addr;
use crate::core::op_pool::{OpId, OpPool};

/// Why a fetch target closed. `Init` means still open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FtEndedBy {
    /// Still accepting ops.
    #[default]
    Init,
    /// The closing op crossed or filled its I-cache line.
    IcacheLineBoundary,
    /// The closing op is a control-flow op predicted taken.
    TakenBranch,
    /// The closing op is a syscall or serializing instruction.
    BarFetch,
    /// The closing op marks application exit.
    AppExit,
}

/// A fetch target: ops, window geometry, close reason, and the consumer's
/// read cursor.
#[derive(Debug, Default)]
pub struct FetchTarget {
    ops: Vec<OpId>,
    read_cursor: usize,
    start: Addr,
    length: Addr,
    ended_by: FtEndedBy,
}

impl FetchTarget {
    /// PC of the first byte of the first op. Zero while empty.
    #[inline]
    pub fn start(&self) -> Addr {
        self.start
    }

    /// Bytes from `start` to the end of the last op. Zero while open.
    #[inline]
    pub fn length(&self) -> Addr {
        self.length
    }

    /// Close reason, `Init` while open.
    #[inline]
    pub fn ended_by(&self) -> FtEndedBy {
        self.ended_by
    }

    /// Number of ops in the target.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// The op at `pos`, for iterator lookups.
    #[inline]
    pub fn op_at(&self, pos: usize) -> OpId {
        self.ops[pos]
    }

    /// The next op the consumer would receive, if any.
    pub fn next_op(&self) -> Option<OpId> {
        self.ops.get(self.read_cursor).copied()
    }

    /// Appends `op` and, if `ended_by` is not `Init`, closes the target.
    ///
    /// # Panics
    ///
    /// The first op must be a begin-of-macro op. Later ops must either start a
    /// new macro-instruction exactly where the previous one ended or share the
    /// previous op's address (micro-ops of one macro-instruction). Closing is
    /// only legal on an end-of-macro op, and only once.
    pub fn add_op(&mut self, pool: &OpPool, id: OpId, ended_by: FtEndedBy) {
        let op = pool.get(id);
        match self.ops.last() {
            None => {
                assert!(op.bom && self.start == 0);
                self.start = op.addr;
            }
            Some(&prev_id) => {
                let prev = pool.get(prev_id);
                if op.bom {
                    assert_eq!(
                        prev.end_addr(),
                        op.addr,
                        "non-contiguous op appended to fetch target"
                    );
                } else {
                    assert_eq!(prev.addr, op.addr, "micro-ops of one inst must share an address");
                }
            }
        }
        self.ops.push(id);
        if ended_by != FtEndedBy::Init {
            assert!(op.eom && self.length == 0);
            assert!(self.start != 0);
            self.length = op.end_addr() - self.start;
            assert_eq!(self.ended_by, FtEndedBy::Init);
            self.ended_by = ended_by;
        }
    }

    /// True while the consumer has not taken every op.
    #[inline]
    pub fn can_fetch_op(&self) -> bool {
        self.read_cursor < self.ops.len()
    }

    /// Hands the next op to the consumer. The bool is true for the last op of
    /// the target.
    pub fn fetch_op(&mut self) -> Option<(OpId, bool)> {
        if self.read_cursor >= self.ops.len() {
            return None;
        }
        let id = self.ops[self.read_cursor];
        self.read_cursor += 1;
        Some((id, self.read_cursor == self.ops.len()))
    }

    /// Takes back the most recently fetched op, moving the cursor back by one.
    ///
    /// # Panics
    ///
    /// `id` must be the op last handed out. Returning the first op of a
    /// target is not supported (the target would have to be reinstated at the
    /// FTQ head); callers must stop one short.
    pub fn return_op(&mut self, id: OpId) {
        assert!(
            self.read_cursor > 1,
            "returning the first op of a fetch target is not supported"
        );
        assert_eq!(id, self.ops[self.read_cursor - 1], "op returned out of order");
        self.read_cursor -= 1;
    }

    /// Releases every op the consumer has not taken and resets all state.
    pub fn free_ops_and_clear(&mut self, pool: &mut OpPool) {
        while self.read_cursor < self.ops.len() {
            pool.free(self.ops[self.read_cursor]);
            self.read_cursor += 1;
        }
        self.ops.clear();
        self.read_cursor = 0;
        self.start = 0;
        self.length = 0;
        self.ended_by = FtEndedBy::Init;
    }
}
