//! Front-end core: operations, the op pool, the decoupled fetch engine, and
//! its prediction units.

/// The decoupled fetch front-end (FT builder, FTQ, iterators, recovery).
pub mod frontend;
/// Micro-operation definition and oracle metadata.
pub mod op;
/// Slab allocator handing out `OpId` handles.
pub mod op_pool;
/// Prediction units (branch predictors, FDIP feedback).
pub mod units;

pub use op::Op;
pub use op_pool::{OpId, OpPool};
