//! Op pool: slab allocator handing out `OpId` handles.
//!
//! Every op the front-end stages is allocated here and released here exactly
//! once: either by recovery (the front-end frees residual ops) or by the
//! back-end after retirement (ownership moves downstream with `fetch_op`).
//! The pool tracks live counts so tests can assert the no-leak property.

use crate::core::op::Op;

/// Handle to an op in the pool.
///
/// Plain index; the pool asserts liveness on every access, so a stale handle
/// fails fast rather than aliasing a recycled slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpId(u32);

impl OpId {
    /// Raw slot index, for diagnostics.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slab of ops with a free list.
pub struct OpPool {
    slots: Vec<Op>,
    in_use: Vec<bool>,
    free: Vec<u32>,
    live: usize,
    total_allocs: u64,
    total_frees: u64,
}

impl Default for OpPool {
    fn default() -> Self {
        Self::new()
    }
}

impl OpPool {
    /// Creates an empty pool; slots are grown on demand.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            in_use: Vec::new(),
            free: Vec::new(),
            live: 0,
            total_allocs: 0,
            total_frees: 0,
        }
    }

    /// Allocates a zeroed op and returns its handle.
    pub fn alloc(&mut self) -> OpId {
        self.live += 1;
        self.total_allocs += 1;
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Op::default();
                self.in_use[idx as usize] = true;
                OpId(idx)
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Op::default());
                self.in_use.push(true);
                OpId(idx)
            }
        }
    }

    /// Releases an op back to the pool.
    ///
    /// # Panics
    ///
    /// Panics on double free.
    pub fn free(&mut self, id: OpId) {
        assert!(self.in_use[id.index()], "double free of op {:?}", id);
        self.in_use[id.index()] = false;
        self.free.push(id.0);
        self.live -= 1;
        self.total_frees += 1;
    }

    /// Borrows a live op.
    #[inline]
    pub fn get(&self, id: OpId) -> &Op {
        assert!(self.in_use[id.index()], "access to freed op {:?}", id);
        &self.slots[id.index()]
    }

    /// Mutably borrows a live op.
    #[inline]
    pub fn get_mut(&mut self, id: OpId) -> &mut Op {
        assert!(self.in_use[id.index()], "access to freed op {:?}", id);
        &mut self.slots[id.index()]
    }

    /// Number of ops currently allocated and not yet freed.
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Total allocations since construction.
    #[inline]
    pub fn total_allocs(&self) -> u64 {
        self.total_allocs
    }

    /// Total frees since construction.
    #[inline]
    pub fn total_frees(&self) -> u64 {
        self.total_frees
    }
}
