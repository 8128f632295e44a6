//! FTQ iterator state.
//!
//! Iterators are lookahead cursors the prefetcher advances over the FTQ
//! independently of the I-cache consumer. The split `(ft_pos, op_pos)` form
//! survives FT-level pops (both fields are rebased when the consumer takes
//! the head FT); the flattened position is the offset exposed to prefetchers.

/// Handle to an iterator registered with a front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterId(pub(crate) usize);

/// One lookahead cursor over the FTQ.
///
/// `ft_pos == queue length` is the legal "parked" position: the iterator has
/// seen every queued FT and waits at op 0 of whatever arrives next.
#[derive(Clone, Copy, Debug, Default)]
pub struct FtqIter {
    /// Index of the current FT within the FTQ.
    pub(crate) ft_pos: usize,
    /// Index within that FT's ops.
    pub(crate) op_pos: usize,
    /// Running count of ops advanced past, across FTs.
    pub(crate) flattened_op_pos: u64,
}

impl FtqIter {
    /// Resets to the head of the FTQ.
    pub(crate) fn reset(&mut self) {
        self.ft_pos = 0;
        self.op_pos = 0;
        self.flattened_op_pos = 0;
    }
}
