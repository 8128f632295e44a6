//! Workload description: the program image a scripted source replays.
//!
//! A workload is a static image of macro-instructions keyed by address, plus
//! an entry PC. Control flow carries its true direction and target, so the
//! source can serve as an oracle; mispredictions are scripted per
//! instruction and consumed by the oracle predictor.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::Addr;
use crate::core::op::CfType;

/// Which back-end stage a scripted misprediction resolves at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MispredictAt {
    /// Wrong or missing target, fixed at decode.
    Decode,
    /// Wrong direction, fixed at execute.
    Exec,
}

/// One macro-instruction of the program image.
#[derive(Clone, Debug, Deserialize)]
pub struct TraceInst {
    /// Instruction address.
    pub addr: Addr,

    /// Instruction size in bytes.
    #[serde(default = "TraceInst::default_size")]
    pub size: u64,

    /// Number of micro-ops the instruction cracks into.
    #[serde(default = "TraceInst::default_uops")]
    pub uops: u32,

    /// Control-flow classification (on the final micro-op).
    #[serde(default)]
    pub cf: CfType,

    /// Branch target for direct control flow.
    #[serde(default)]
    pub target: Addr,

    /// True direction; unconditional control flow sets this.
    #[serde(default)]
    pub taken: bool,

    /// Serializing instruction (fence); fetch stalls behind it.
    #[serde(default)]
    pub bar_fetch: bool,

    /// System call; implies a fetch barrier.
    #[serde(default)]
    pub syscall: bool,

    /// Application exit marker.
    #[serde(default)]
    pub exit: bool,

    /// Scripted misprediction, honored by the oracle predictor.
    #[serde(default)]
    pub mispredict: Option<MispredictAt>,
}

impl Default for TraceInst {
    fn default() -> Self {
        Self {
            addr: 0,
            size: Self::default_size(),
            uops: Self::default_uops(),
            cf: CfType::default(),
            target: 0,
            taken: false,
            bar_fetch: false,
            syscall: false,
            exit: false,
            mispredict: None,
        }
    }
}

impl TraceInst {
    fn default_size() -> u64 {
        4
    }

    fn default_uops() -> u32 {
        1
    }

    /// True next PC after this instruction.
    pub fn next_pc(&self) -> Addr {
        if self.cf.is_cf() && self.taken {
            self.target
        } else {
            self.addr + self.size
        }
    }
}

/// A complete workload: entry PC plus the program image.
#[derive(Clone, Debug, Deserialize)]
pub struct Workload {
    /// First fetch PC.
    pub entry: Addr,
    /// Program image instructions. Order does not matter; they are keyed by
    /// address.
    pub insts: Vec<TraceInst>,
}

impl Workload {
    /// Parses a workload from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("workload parse error: {e}"))
    }

    /// Loads a workload from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read workload {}: {e}", path.display()))?;
        Self::from_json(&text)
    }
}
