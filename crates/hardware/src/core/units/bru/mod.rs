//! Branch prediction unit implementations for the fetch front-end.
//!
//! The producer consults the predictor once per control-flow op to obtain a
//! predicted next PC; the predictor stamps the op's oracle block with the
//! prediction verdict (direction, misprediction, recovery stage).

pub use self::predictor::OpBranchPredictor;

/// Branch predictor trait.
pub mod predictor;

/// Oracle predictor (follows the true path, honors scripted mispredictions).
pub mod oracle;

/// Global-history direction predictor with an ideal target store.
pub mod gshare;

use self::gshare::GShareOpPredictor;
use self::oracle::OraclePredictor;
use crate::common::Addr;
use crate::config::{BranchPredictorKind, Config};
use crate::core::op::Op;

/// Enum wrapper for static dispatch of branch predictors.
/// This avoids vtable lookups in the producer's inner loop.
pub enum BranchPredictorWrapper {
    Oracle(OraclePredictor),
    GShare(GShareOpPredictor),
}

impl BranchPredictorWrapper {
    /// Creates a predictor wrapper from the configuration.
    pub fn new(config: &Config) -> Self {
        match config.bp.kind {
            BranchPredictorKind::Oracle => Self::Oracle(OraclePredictor::new()),
            BranchPredictorKind::GShare => Self::GShare(GShareOpPredictor::new(
                config.bp.gshare_table_bits,
                config.bp.gshare_history_bits,
                config.bp.predictions_per_cycle,
            )),
        }
    }

    /// Whether this mechanism advertises a per-cycle prediction limit.
    ///
    /// The producer skips its "predictor exhausted" break condition for
    /// mechanisms that do not.
    pub fn advertises_prediction_limit(&self) -> bool {
        match self {
            Self::Oracle(_) => false,
            Self::GShare(_) => true,
        }
    }
}

impl OpBranchPredictor for BranchPredictorWrapper {
    #[inline(always)]
    fn predict_op(&mut self, op: &mut Op, cf_index: u32, fetch_addr: Addr) -> Addr {
        match self {
            Self::Oracle(bp) => bp.predict_op(op, cf_index, fetch_addr),
            Self::GShare(bp) => bp.predict_op(op, cf_index, fetch_addr),
        }
    }

    #[inline(always)]
    fn is_predictable(&self) -> bool {
        match self {
            Self::Oracle(bp) => bp.is_predictable(),
            Self::GShare(bp) => bp.is_predictable(),
        }
    }

    #[inline(always)]
    fn begin_cycle(&mut self) {
        match self {
            Self::Oracle(bp) => bp.begin_cycle(),
            Self::GShare(bp) => bp.begin_cycle(),
        }
    }
}
