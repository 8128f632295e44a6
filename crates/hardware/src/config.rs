//! Configuration system for the fetch front-end simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the front-end. It provides:
//! 1. **Defaults:** Baseline hardware constants (FTQ depth, cycle budgets, line size).
//! 2. **Structures:** Hierarchical config for the front-end, branch predictor, and back-end model.
//! 3. **Enums:** Front-end kind, branch predictor kind, and adaptive FTQ mode.
//!
//! Configuration is supplied as JSON (`serde_json`) or use `Config::default()`.

use serde::Deserialize;

/// Default configuration constants for the front-end.
///
/// These values define the baseline configuration when not explicitly
/// overridden in a JSON configuration file.
mod defaults {
    /// Default FTQ depth bound in fetch targets.
    ///
    /// Used directly when the adaptive controller is off, and as the starting
    /// depth when it is on.
    pub const FTQ_BLOCK_NUM: u64 = 32;

    /// Lower clamp for the adaptive FTQ depth controller.
    pub const UFTQ_MIN_BLOCK_NUM: u64 = 8;

    /// Upper clamp for the adaptive FTQ depth controller.
    pub const UFTQ_MAX_BLOCK_NUM: u64 = 128;

    /// Taken control-flow ops the producer may place per cycle.
    ///
    /// Models the taken-branch throughput of the prediction pipeline.
    pub const TAKEN_CFS_PER_CYCLE: u64 = 2;

    /// Instruction bytes the producer may place per cycle.
    ///
    /// Compared with `>=` because instruction sizes do not align with the
    /// budget; the op that crosses the budget still completes.
    pub const BYTES_PER_CYCLE: u64 = 32;

    /// I-cache line size in bytes (64 bytes).
    ///
    /// A fetch target never spans an I-cache line boundary.
    pub const ICACHE_LINE_SIZE: u64 = 64;

    /// Producer watchdog limit in consecutive zero-progress ticks.
    ///
    /// Exceeding this aborts the simulation as hung.
    pub const PROGRESS_LIMIT: u64 = 100_000;

    /// Per-cycle prediction-port budget for predictors that advertise one.
    pub const BP_PREDICTIONS_PER_CYCLE: u32 = 8;

    /// Log2 of the gshare pattern history table size (4096 entries).
    pub const GSHARE_TABLE_BITS: usize = 12;

    /// Global history bits folded into the gshare index.
    pub const GSHARE_HISTORY_BITS: usize = 12;

    /// Ops the back-end model consumes from the front-end per cycle.
    pub const FETCH_WIDTH: usize = 6;

    /// Cycles from consumption to a decode-time misprediction resolution.
    pub const DECODE_LATENCY: u64 = 4;

    /// Cycles from consumption to an execute-time misprediction resolution.
    pub const EXEC_LATENCY: u64 = 12;

    /// Cycles from consumption to retirement for a well-behaved op.
    pub const RETIRE_LATENCY: u64 = 16;
}

/// Front-end kinds; selects how the upstream instruction source behaves.
///
/// In trace mode the source replays a recorded or scripted program and the
/// producer redirects it down predicted paths while off-path. An
/// execution-driven source follows redirects on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FrontendKind {
    /// Trace or scripted replay source.
    #[default]
    Trace,
    /// Execution-driven (emulator-backed) source.
    ExecutionDriven,
}

/// Branch prediction mechanism selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BranchPredictorKind {
    /// Oracle predictor: follows the true path except where the workload
    /// scripts a misprediction. Does not advertise a per-cycle limit.
    #[default]
    Oracle,
    /// Global-history predictor with an ideal target backing store.
    GShare,
}

/// Adaptive FTQ depth controller mode.
///
/// Selects which prefetcher feedback ratio drives depth resizing at each
/// recovery. `Off` keeps the configured fixed depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AdjustableFtq {
    /// Fixed FTQ depth.
    #[default]
    Off,
    /// Resize from the prefetch utility ratio.
    Utility,
    /// Resize from the prefetch timeliness ratio.
    Timeliness,
    /// Combined polynomial of both hypothetical resizings.
    Combined,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Deserializing from JSON:
///
/// ```
/// use fetch_core::config::{AdjustableFtq, Config};
///
/// let json = r#"{
///     "frontend": {
///         "ftq_block_num": 16,
///         "taken_cfs_per_cycle": 1,
///         "bytes_per_cycle": 32,
///         "adjustable_ftq": "Utility"
///     },
///     "bp": { "kind": "GShare" }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.frontend.ftq_block_num, 16);
/// assert_eq!(config.frontend.adjustable_ftq, AdjustableFtq::Utility);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Front-end (FTQ and producer) parameters.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Branch predictor parameters.
    #[serde(default)]
    pub bp: BranchConfig,
    /// Back-end consumer model parameters.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Front-end (FTQ and producer) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Upstream source kind.
    #[serde(default)]
    pub kind: FrontendKind,

    /// FTQ depth bound in fetch targets.
    #[serde(default = "FrontendConfig::default_ftq_block_num")]
    pub ftq_block_num: u64,

    /// Adaptive depth lower clamp.
    #[serde(default = "FrontendConfig::default_uftq_min")]
    pub uftq_min_block_num: u64,

    /// Adaptive depth upper clamp.
    #[serde(default = "FrontendConfig::default_uftq_max")]
    pub uftq_max_block_num: u64,

    /// Taken control-flow budget per producer cycle.
    #[serde(default = "FrontendConfig::default_taken_cfs")]
    pub taken_cfs_per_cycle: u64,

    /// Byte budget per producer cycle.
    #[serde(default = "FrontendConfig::default_bytes")]
    pub bytes_per_cycle: u64,

    /// I-cache line size in bytes.
    #[serde(default = "FrontendConfig::default_line_size")]
    pub icache_line_size: u64,

    /// Adaptive FTQ depth controller mode.
    #[serde(default)]
    pub adjustable_ftq: AdjustableFtq,

    /// Re-anchor the prefetcher on FT pops when its iterator sits at the head.
    #[serde(default)]
    pub fdip_bp_confidence: bool,

    /// Watchdog limit in consecutive zero-progress producer ticks.
    #[serde(default = "FrontendConfig::default_progress_limit")]
    pub progress_limit: u64,
}

impl FrontendConfig {
    fn default_ftq_block_num() -> u64 {
        defaults::FTQ_BLOCK_NUM
    }

    fn default_uftq_min() -> u64 {
        defaults::UFTQ_MIN_BLOCK_NUM
    }

    fn default_uftq_max() -> u64 {
        defaults::UFTQ_MAX_BLOCK_NUM
    }

    fn default_taken_cfs() -> u64 {
        defaults::TAKEN_CFS_PER_CYCLE
    }

    fn default_bytes() -> u64 {
        defaults::BYTES_PER_CYCLE
    }

    fn default_line_size() -> u64 {
        defaults::ICACHE_LINE_SIZE
    }

    fn default_progress_limit() -> u64 {
        defaults::PROGRESS_LIMIT
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            kind: FrontendKind::default(),
            ftq_block_num: defaults::FTQ_BLOCK_NUM,
            uftq_min_block_num: defaults::UFTQ_MIN_BLOCK_NUM,
            uftq_max_block_num: defaults::UFTQ_MAX_BLOCK_NUM,
            taken_cfs_per_cycle: defaults::TAKEN_CFS_PER_CYCLE,
            bytes_per_cycle: defaults::BYTES_PER_CYCLE,
            icache_line_size: defaults::ICACHE_LINE_SIZE,
            adjustable_ftq: AdjustableFtq::default(),
            fdip_bp_confidence: false,
            progress_limit: defaults::PROGRESS_LIMIT,
        }
    }
}

/// Branch predictor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchConfig {
    /// Prediction mechanism.
    #[serde(default)]
    pub kind: BranchPredictorKind,

    /// Per-cycle prediction-port budget (for kinds that advertise one).
    #[serde(default = "BranchConfig::default_predictions_per_cycle")]
    pub predictions_per_cycle: u32,

    /// Log2 of the gshare pattern history table size.
    #[serde(default = "BranchConfig::default_table_bits")]
    pub gshare_table_bits: usize,

    /// Global history bits folded into the gshare index.
    #[serde(default = "BranchConfig::default_history_bits")]
    pub gshare_history_bits: usize,
}

impl BranchConfig {
    fn default_predictions_per_cycle() -> u32 {
        defaults::BP_PREDICTIONS_PER_CYCLE
    }

    fn default_table_bits() -> usize {
        defaults::GSHARE_TABLE_BITS
    }

    fn default_history_bits() -> usize {
        defaults::GSHARE_HISTORY_BITS
    }
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            kind: BranchPredictorKind::default(),
            predictions_per_cycle: defaults::BP_PREDICTIONS_PER_CYCLE,
            gshare_table_bits: defaults::GSHARE_TABLE_BITS,
            gshare_history_bits: defaults::GSHARE_HISTORY_BITS,
        }
    }
}

/// Back-end consumer model configuration.
///
/// The back-end model stands in for the I-cache, decode, and execute stages:
/// it consumes ops from the front-end at a fixed width, resolves scripted
/// mispredictions after a decode or execute latency, and retires in order.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Ops consumed from the front-end per cycle.
    #[serde(default = "BackendConfig::default_fetch_width")]
    pub fetch_width: usize,

    /// Consumption-to-resolution latency for decode-time recoveries.
    #[serde(default = "BackendConfig::default_decode_latency")]
    pub decode_latency: u64,

    /// Consumption-to-resolution latency for execute-time recoveries.
    #[serde(default = "BackendConfig::default_exec_latency")]
    pub exec_latency: u64,

    /// Consumption-to-retirement latency.
    #[serde(default = "BackendConfig::default_retire_latency")]
    pub retire_latency: u64,
}

impl BackendConfig {
    fn default_fetch_width() -> usize {
        defaults::FETCH_WIDTH
    }

    fn default_decode_latency() -> u64 {
        defaults::DECODE_LATENCY
    }

    fn default_exec_latency() -> u64 {
        defaults::EXEC_LATENCY
    }

    fn default_retire_latency() -> u64 {
        defaults::RETIRE_LATENCY
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::FETCH_WIDTH,
            decode_latency: defaults::DECODE_LATENCY,
            exec_latency: defaults::EXEC_LATENCY,
            retire_latency: defaults::RETIRE_LATENCY,
        }
    }
}
