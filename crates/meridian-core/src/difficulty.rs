//! The three versioned difficulty-retarget formulas (V1/V2/V3).
//!
//! All three share the shape `new = old * numerator / denominator`, where
//! `numerator`/`denominator` encode how far the observed block spacing
//! diverged from [`TARGET_SPACING`]. V1 is the original formula (no floor
//! on a negative spacing); V2 adds the floor; V3 (activated at fork
//! "RetargetCorrection") averages the last [`TARGET_AVERAGE_BLOCK_COUNT`]
//! blocks instead of just the last two, which damps single-block timestamp
//! manipulation.
//!
//! Each PoW/PoS kind retargets against its own sub-chain: `prev` is the
//! most recent block of the same kind, `prev_prev` the one before that.

use crate::constants::{
    RETARGET_V1_HEIGHT_LIMIT, RETARGET_V3_K, RETARGET_V3_L, RETARGET_V3_M, TARGET_SPACING,
    TARGET_TIMESPAN,
};
use crate::error::RetargetError;
use crate::types::U256;

/// `N = TargetTimeSpan / TargetSpacing`, the interval count the V1/V2
/// formulas weight against.
pub fn interval_count() -> i64 {
    TARGET_TIMESPAN / TARGET_SPACING
}

/// Assert the frozen retarget parameter set. The V3 ±3-5% stability bound
/// only holds for `FutureDrift=600, TargetSpacing=30, TargetTimeSpan=7200`;
/// any other combination must be rejected rather than silently miscomputed.
pub fn assert_parameter_set() -> Result<(), RetargetError> {
    if crate::constants::FUTURE_DRIFT == 600 && TARGET_SPACING == 30 && TARGET_TIMESPAN == 7200 {
        Ok(())
    } else {
        Err(RetargetError::InvalidParameterSet)
    }
}

fn clamp_to_limit(target: U256, limit: U256) -> U256 {
    if target > limit || target.is_zero() {
        limit
    } else {
        target
    }
}

/// Scale `old` by `numerator / denominator`, both expressed as
/// non-negative seconds, using 128-bit intermediate arithmetic (the
/// products involved never approach 256 bits for realistic spacings).
fn scale(old: U256, numerator: i64, denominator: i64) -> U256 {
    if denominator <= 0 {
        return old;
    }
    let numerator = numerator.max(0) as u64;
    let denominator = denominator as u64;
    // old * numerator / denominator via U256 limb multiply + long division.
    let scaled = match old.checked_mul_u64(numerator) {
        Some(v) => v,
        None => U256::MAX,
    };
    scaled.div(&U256::from_u64(denominator))
}

/// **V1** (height < [`RETARGET_V1_HEIGHT_LIMIT`]): no floor on a negative
/// spacing, so a `prev_prev` timestamp after `prev` drives the target
/// down. Preserved exactly at these heights per the spec's explicit
/// instruction not to "fix" the historical formula.
pub fn retarget_v1(old_target: U256, prev_time: i64, prev_prev_time: i64, limit: U256) -> U256 {
    let spacing = prev_time - prev_prev_time;
    let n = interval_count();
    let s = TARGET_SPACING;
    let numerator = (n - 1) * s + 2 * spacing;
    let denominator = (n + 1) * s;
    clamp_to_limit(scale(old_target, numerator, denominator), limit)
}

/// **V2**: as V1, but a negative spacing is floored to `S`, and a
/// non-positive scaled result resets to `limit` rather than underflowing.
pub fn retarget_v2(old_target: U256, prev_time: i64, prev_prev_time: i64, limit: U256) -> U256 {
    let spacing = (prev_time - prev_prev_time).max(TARGET_SPACING);
    let n = interval_count();
    let s = TARGET_SPACING;
    let numerator = (n - 1) * s + 2 * spacing;
    if numerator <= 0 {
        return limit;
    }
    let denominator = (n + 1) * s;
    clamp_to_limit(scale(old_target, numerator, denominator), limit)
}

/// **V3** (fork "RetargetCorrection" active): `spacing` is the mean of
/// adjacent differences across the sorted times of the last
/// `min(TARGET_AVERAGE_BLOCK_COUNT, height - fork_height - 1)` blocks of
/// this kind (lower bound 2 blocks / 1 interval).
pub fn retarget_v3(old_target: U256, recent_times_oldest_first: &[i64], limit: U256) -> U256 {
    let spacing = mean_spacing(recent_times_oldest_first);
    let n = interval_count();
    let s = TARGET_SPACING;
    let k = RETARGET_V3_K;
    let l = RETARGET_V3_L;
    let m = RETARGET_V3_M;
    let numerator = (n - l + k) * s + (m + l) * spacing;
    let denominator = (n + k) * s + m * spacing;
    if numerator <= 0 || denominator <= 0 {
        return limit;
    }
    clamp_to_limit(scale(old_target, numerator, denominator), limit)
}

/// Mean of consecutive differences of a sorted, oldest-first time series.
/// With fewer than 2 timestamps, returns `TARGET_SPACING` (no adjustment).
fn mean_spacing(times_oldest_first: &[i64]) -> i64 {
    if times_oldest_first.len() < 2 {
        return TARGET_SPACING;
    }
    let mut sorted = times_oldest_first.to_vec();
    sorted.sort_unstable();
    let diffs_sum: i64 = sorted.windows(2).map(|w| w[1] - w[0]).sum();
    let diffs_count = (sorted.len() - 1) as i64;
    diffs_sum / diffs_count
}

/// Selects and applies the version active at `height`/`fork_active`.
/// `height` and block kind together determine genesis/first-of-kind
/// short-circuits: the spec requires returning `limit` for genesis, the
/// first block of a kind, and the second block of a kind (insufficient
/// history to retarget).
pub enum RetargetInputs<'a> {
    /// Fewer than two same-kind ancestors exist: genesis or first block.
    InsufficientHistory,
    /// V1/V2 need exactly the last two same-kind timestamps.
    TwoPoint { prev_time: i64, prev_prev_time: i64 },
    /// V3 needs the recent window of same-kind timestamps, oldest first.
    Windowed(&'a [i64]),
}

pub fn next_target(
    height: u64,
    retarget_correction_active: bool,
    inputs: RetargetInputs<'_>,
    old_target: U256,
    limit: U256,
) -> U256 {
    match inputs {
        RetargetInputs::InsufficientHistory => limit,
        RetargetInputs::TwoPoint { prev_time, prev_prev_time } => {
            if retarget_correction_active {
                // V3 still wants a window; with only two points available
                // (early post-fork chain) fall back to V2's two-point form,
                // mirroring the "insufficient history" windowed case.
                retarget_v2(old_target, prev_time, prev_prev_time, limit)
            } else if height < RETARGET_V1_HEIGHT_LIMIT {
                retarget_v1(old_target, prev_time, prev_prev_time, limit)
            } else {
                retarget_v2(old_target, prev_time, prev_prev_time, limit)
            }
        }
        RetargetInputs::Windowed(times) => retarget_v3(old_target, times, limit),
    }
}
