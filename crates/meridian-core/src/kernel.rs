//! Proof-of-stake kernel evaluation and stake-modifier bookkeeping.
//!
//! A PoS block is valid when its coinstake's chosen input (the "stake")
//! satisfies `kernel_hash ≤ weight(stake) · target`, where `kernel_hash`
//! mixes the stake modifier, the stake input's block time, the
//! transaction's own time/hash/vout, and the time the stake is spent. The
//! modifier is a 64-bit value carried in every PoS [`BlockIndexNode`] that
//! prevents an attacker from precomputing future kernels.

use crate::constants::{MODIFIER_INTERVAL, STAKE_MAX_AGE, STAKE_MIN_AGE};
use crate::error::KernelError;
use crate::types::{Hash256, OutPoint, U256};

/// Everything the kernel hash needs about the candidate stake input.
pub struct StakeCandidate {
    pub stake_modifier: u64,
    pub prevout: OutPoint,
    pub prevout_block_time: u32,
    pub prevout_tx_time: u32,
    pub stake_time: u32,
    pub value: u64,
}

/// `H(modifier || t(o.block) || o.tx.nTime || o.tx_hash || o.vout_index || t_tx)`.
pub fn kernel_hash(candidate: &StakeCandidate) -> Hash256 {
    let mut data = Vec::with_capacity(8 + 4 + 4 + 32 + 8 + 4);
    data.extend_from_slice(&candidate.stake_modifier.to_le_bytes());
    data.extend_from_slice(&candidate.prevout_block_time.to_le_bytes());
    data.extend_from_slice(&candidate.prevout_tx_time.to_le_bytes());
    data.extend_from_slice(candidate.prevout.txid.as_bytes());
    data.extend_from_slice(&candidate.prevout.index.to_le_bytes());
    data.extend_from_slice(&candidate.stake_time.to_le_bytes());
    Hash256(blake3::hash(&data).into())
}

/// `value(o) · min(t_tx − t(o), STAKE_MAX_AGE)`, zero if the stake has not
/// reached `STAKE_MIN_AGE`.
pub fn stake_weight(candidate: &StakeCandidate) -> Option<U256> {
    let age = candidate.stake_time.checked_sub(candidate.prevout_block_time)? as u64;
    if age < STAKE_MIN_AGE {
        return None;
    }
    let capped_age = age.min(STAKE_MAX_AGE);
    U256::from_u64(candidate.value).checked_mul_u64(capped_age)
}

/// Evaluate the kernel: accept if `kernel_hash ≤ weight · target`.
///
/// Returns the kernel hash on success (to be recorded as the node's
/// `hash_of_proof`), or the specific [`KernelError`] on rejection.
pub fn evaluate(candidate: &StakeCandidate, target: U256) -> Result<Hash256, KernelError> {
    let weight = stake_weight(candidate).ok_or(KernelError::StakeTooYoung)?;
    if weight.is_zero() {
        return Err(KernelError::KernelAboveTarget);
    }
    let hash = kernel_hash(candidate);
    // kernel_hash <= weight * target  <=>  kernel_hash / weight <= target,
    // avoiding an intermediate weight*target product that could overflow 256 bits.
    if hash.as_u256().div(&weight) <= target {
        Ok(hash)
    } else {
        Err(KernelError::KernelAboveTarget)
    }
}

/// Tracks `(prevout, stake_time)` pairs already used by an accepted or
/// orphan-pending PoS block, enforcing the duplicate-stake rule (§4.3 step 2,
/// scenario S4).
#[derive(Default, Clone, Debug)]
pub struct SeenStakes {
    seen: std::collections::HashSet<(OutPoint, u32)>,
}

impl SeenStakes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, prevout: &OutPoint, time: u32) -> bool {
        self.seen.contains(&(prevout.clone(), time))
    }

    pub fn insert(&mut self, prevout: OutPoint, time: u32) -> bool {
        self.seen.insert((prevout, time))
    }

    pub fn remove(&mut self, prevout: &OutPoint, time: u32) -> bool {
        self.seen.remove(&(prevout.clone(), time))
    }
}

/// A single ancestor's modifier-relevant fields, as seen by
/// [`next_stake_modifier`]. Kept separate from `BlockIndexNode` so the
/// generator stays a pure function the block-index layer feeds, rather
/// than depending on it.
#[derive(Clone, Copy, Debug)]
pub struct ModifierAncestor {
    pub hash: Hash256,
    pub time: u32,
    pub stake_modifier: u64,
    pub stake_modifier_generated: bool,
    pub entropy_bit: bool,
}

/// The modifier a new block should carry, and whether this block is the
/// one that regenerated it (`stake-modifier-generated`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifierResult {
    pub stake_modifier: u64,
    pub stake_modifier_generated: bool,
}

/// `H(candidate_hash || prev_modifier)`, the kernel-weighted selection
/// hash used to pick the block a new modifier is derived from.
fn selection_hash(candidate_hash: Hash256, prev_modifier: u64) -> Hash256 {
    let mut data = Vec::with_capacity(32 + 8);
    data.extend_from_slice(candidate_hash.as_bytes());
    data.extend_from_slice(&prev_modifier.to_le_bytes());
    Hash256(blake3::hash(&data).into())
}

/// Derive the stake modifier a block at `block_time` should carry, given
/// its ancestors from its parent back towards genesis (nearest first).
///
/// A new modifier is generated only the first time a block's time
/// crosses a `MODIFIER_INTERVAL` boundary relative to the parent's own
/// generation time; every other block just inherits the parent's
/// modifier unchanged. When a boundary is crossed, the candidate blocks
/// spanning the `MODIFIER_INTERVAL` ending at the parent are ranked by
/// [`selection_hash`] and the highest-ranked one's entropy bit feeds the
/// new modifier. Genesis (no ancestors at all) gets the fixed modifier
/// `0`, ungenerated.
pub fn next_stake_modifier<I>(block_time: u32, ancestors: I) -> ModifierResult
where
    I: IntoIterator<Item = ModifierAncestor>,
{
    let mut iter = ancestors.into_iter();
    let parent = match iter.next() {
        Some(parent) => parent,
        None => {
            return ModifierResult {
                stake_modifier: 0,
                stake_modifier_generated: false,
            }
        }
    };

    let parent_interval = parent.time as u64 / MODIFIER_INTERVAL;
    let this_interval = block_time as u64 / MODIFIER_INTERVAL;
    if !parent.stake_modifier_generated || this_interval <= parent_interval {
        return ModifierResult {
            stake_modifier: parent.stake_modifier,
            stake_modifier_generated: false,
        };
    }

    let prev_modifier = parent.stake_modifier;
    let parent_time = parent.time;
    let selection_cutoff = parent.time.saturating_sub(MODIFIER_INTERVAL as u32);

    let mut window = vec![parent];
    for ancestor in iter {
        if ancestor.time < selection_cutoff {
            break;
        }
        window.push(ancestor);
    }

    let selected = window
        .iter()
        .max_by_key(|a| selection_hash(a.hash, prev_modifier))
        .expect("window always holds at least the parent");

    let mut data = Vec::with_capacity(8 + 1 + 4);
    data.extend_from_slice(&prev_modifier.to_le_bytes());
    data.push(selected.entropy_bit as u8);
    data.extend_from_slice(&parent_time.to_le_bytes());
    let digest = blake3::hash(&data);
    let stake_modifier = u64::from_le_bytes(digest.as_bytes()[0..8].try_into().unwrap());

    ModifierResult {
        stake_modifier,
        stake_modifier_generated: true,
    }
}

/// A 32-bit checksum committed alongside the modifier, used to detect
/// modifier-derivation disagreement across implementations without
/// exposing the full 64-bit value in the header.
pub fn stake_modifier_checksum(modifier: u64) -> u32 {
    let digest = blake3::hash(&modifier.to_le_bytes());
    u32::from_le_bytes(digest.as_bytes()[0..4].try_into().unwrap())
}
