//! Adaptive FTQ depth controller.
//!
//! Resizes the FTQ depth bound once per recovery from prefetcher feedback:
//! the utility ratio (fraction of prefetches actually used) and the
//! timeliness ratio (fraction delivered before demand). Three modes: resize
//! from either ratio alone, or combine both hypothetical resizings through a
//! calibrated polynomial.

use crate::config::AdjustableFtq;

/// Utility ratio pivot. Below it the queue shrinks, above it grows.
const UTILITY_RATIO_THRESHOLD: f64 = 0.70;
/// Timeliness ratio pivot.
const TIMELINESS_RATIO_THRESHOLD: f64 = 0.77;

/// One-sided proportional resize toward `threshold`.
fn resize_toward(depth: u64, ratio: f64, threshold: f64) -> i64 {
    let depth = depth as i64;
    let step = (depth as f64 * (ratio - threshold).abs()).round() as i64;
    if ratio < threshold {
        depth - step
    } else if ratio > threshold {
        depth + step
    } else {
        depth
    }
}

fn clamp(depth: i64, min: u64, max: u64) -> u64 {
    if depth < min as i64 {
        min
    } else if depth > max as i64 {
        max
    } else {
        depth as u64
    }
}

/// Computes the new FTQ depth bound for one recovery.
///
/// `mode` must not be `Off`. In combined mode the two hypothetical depths are
/// both computed from the original `depth`, then fed through the calibrated
/// fit; the coefficients are the system's tuned values and are load-bearing.
pub fn adjusted_depth(
    mode: AdjustableFtq,
    depth: u64,
    utility_ratio: f64,
    timeliness_ratio: f64,
    min: u64,
    max: u64,
) -> u64 {
    match mode {
        AdjustableFtq::Off => unreachable!("depth controller invoked while disabled"),
        AdjustableFtq::Utility => clamp(
            resize_toward(depth, utility_ratio, UTILITY_RATIO_THRESHOLD),
            min,
            max,
        ),
        AdjustableFtq::Timeliness => clamp(
            resize_toward(depth, timeliness_ratio, TIMELINESS_RATIO_THRESHOLD),
            min,
            max,
        ),
        AdjustableFtq::Combined => {
            let qdaur = resize_toward(depth, utility_ratio, UTILITY_RATIO_THRESHOLD) as f64;
            let qdatr = resize_toward(depth, timeliness_ratio, TIMELINESS_RATIO_THRESHOLD) as f64;
            let fitted = -2.3 * qdaur - 31.2 * qdatr
                + 0.007 * qdaur * qdaur
                + 0.1 * qdatr * qdatr
                + 0.3 * qdaur * qdatr;
            clamp(fitted.round() as i64, min, max)
        }
    }
}
