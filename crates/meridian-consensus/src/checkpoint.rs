//! Header checkpoint verification and the side-branch anti-spam floor.
//!
//! Provides functions to verify that blocks at checkpoint heights match the
//! expected hash, to reject reorgs that would unwind past a checkpoint, and
//! to reject side branches that arrive long after the last checkpoint with
//! less work/stake than the elapsed time should have produced.
//!
//! # Attack vectors
//!
//! - **Long-range rewrite:** Without checkpoints an attacker with sufficient
//!   hash power could rewrite arbitrarily deep history. Checkpoints pin known-
//!   good blocks so that reorgs below the last checkpoint are rejected outright.
//!
//! - **Checkpoint spoofing:** The checkpoint list is compiled into the binary.
//!   An attacker would need to distribute a modified binary to exploit this,
//!   which is outside our threat model.
//!
//! - **Side-branch memory exhaustion:** a peer can flood the index with
//!   low-difficulty blocks that don't extend the active tip, since those
//!   only need to pass structural checks, not full contextual validation.
//!   [`minimum_required_target`] bounds how cheap a side branch is allowed
//!   to be, scaled by how long it has been since the last checkpoint.
//!
//! # Usage
//!
//! The node layer should call [`check_checkpoint`] (or
//! [`check_checkpoint_with`] for testing) when connecting a new block whose
//! height is known. It should call [`is_below_checkpoint`] before accepting a
//! reorg that would disconnect blocks at or below the last checkpoint height.
//! It should call [`minimum_required_target`] when a candidate block does not
//! extend the active tip, to floor how little work/stake it may carry.
//!
//! [`ConsensusEngine::accept_block`](crate::engine::ConsensusEngine::accept_block)
//! applies all three checks: [`check_checkpoint`] when a tentative node is
//! assigned, [`meets_minimum_required_target`] against the checkpoint
//! node's own bits/time before a non-extending candidate is even parked as
//! an orphan, and [`is_below_checkpoint`] as a reorg guard.

use meridian_core::constants::{CHECKPOINTS, TARGET_TIMESPAN};
use meridian_core::error::BlockError;
use meridian_core::types::{Hash256, U256};

/// Verify that a block at the given `height` has the expected checkpoint hash.
///
/// If `height` matches a checkpoint height, the block hash must match exactly.
/// If there is no checkpoint at `height`, the function succeeds unconditionally.
///
/// # Errors
///
/// Returns [`BlockError::CheckpointMismatch`] when the hash does not match
/// the checkpoint at the given height.
pub fn check_checkpoint(height: u64, hash: &Hash256) -> Result<(), BlockError> {
    check_checkpoint_with(CHECKPOINTS, height, hash)
}

/// Like [`check_checkpoint`] but takes an explicit checkpoint list.
///
/// This is the testable core: production code passes [`CHECKPOINTS`], while
/// tests can supply their own list.
pub fn check_checkpoint_with(
    checkpoints: &[(u64, [u8; 32])],
    height: u64,
    hash: &Hash256,
) -> Result<(), BlockError> {
    for &(cp_height, cp_hash) in checkpoints {
        if cp_height == height {
            if hash.0 != cp_hash {
                return Err(BlockError::CheckpointMismatch);
            }
            return Ok(());
        }
    }
    Ok(())
}

/// Return the height of the most recent checkpoint, or 0 if there are none.
pub fn last_checkpoint_height() -> u64 {
    last_checkpoint_height_with(CHECKPOINTS)
}

/// Like [`last_checkpoint_height`] but with an explicit checkpoint list.
pub fn last_checkpoint_height_with(checkpoints: &[(u64, [u8; 32])]) -> u64 {
    checkpoints.iter().map(|(h, _)| *h).max().unwrap_or(0)
}

/// Returns `true` if `height` is at or below the last checkpoint height.
///
/// The node should reject any reorg that would disconnect blocks at or below
/// this height, because those blocks are pinned by a checkpoint.
pub fn is_below_checkpoint(height: u64) -> bool {
    is_below_checkpoint_with(CHECKPOINTS, height)
}

/// Like [`is_below_checkpoint`] but with an explicit checkpoint list.
pub fn is_below_checkpoint_with(checkpoints: &[(u64, [u8; 32])], height: u64) -> bool {
    let last = last_checkpoint_height_with(checkpoints);
    last > 0 && height <= last
}

/// The loosest target a side branch arriving `delta_time` seconds after the
/// last checkpoint block (which had `checkpoint_bits`) may carry.
///
/// Mirrors the anti-spam floor the original client applies to blocks that
/// don't extend the best chain: right after a checkpoint the floor tracks
/// the checkpoint's own difficulty, and it loosens (the allowed target
/// doubles) for every [`TARGET_TIMESPAN`] that elapses, capped at the
/// PoW/PoS limit. A candidate whose own target exceeds this floor is too
/// cheap to be worth holding as an orphan/side branch and should be
/// rejected outright rather than parked.
pub fn minimum_required_target(checkpoint_bits: u32, delta_time: i64) -> U256 {
    let limit = U256::MAX;
    let mut target = U256::from_compact(checkpoint_bits);
    let mut remaining = delta_time;
    while remaining > 0 && target < limit {
        target = target.checked_mul_u64(2).unwrap_or(limit).min(limit);
        remaining -= TARGET_TIMESPAN;
    }
    target
}

/// Returns `true` if `candidate_bits` carries at least as much work/stake as
/// [`minimum_required_target`] demands — i.e. the candidate's target is no
/// looser than the floor.
pub fn meets_minimum_required_target(checkpoint_bits: u32, delta_time: i64, candidate_bits: u32) -> bool {
    U256::from_compact(candidate_bits) <= minimum_required_target(checkpoint_bits, delta_time)
}
