//! Common types used throughout the front-end.

/// An instruction fetch address.
///
/// The front-end does constant arithmetic on addresses (line rounding, length
/// accumulation, contiguity checks), so this is a plain alias rather than a
/// wrapper type. Everything the front-end touches is a fetch PC; no second
/// address space exists here to confuse it with.
pub type Addr = u64;
