//! In-memory pool of unconfirmed transactions.
//!
//! The mempool is the gate between "a transaction someone handed us" and
//! "a transaction a miner or staker may spend into a block". [`Mempool::accept`]
//! runs the full admission pipeline (structural checks, standardness policy,
//! conflict/duplicate detection, input resolution and signature verification,
//! minimum relay fee, free-transaction rate limiting, and NTP1 symbol
//! uniqueness) and only inserts on success. Everything else (`contains`,
//! `select_transactions`, `remove_confirmed_block`, ...) assumes its input has
//! already passed `accept`.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::constants::{
    FREE_RELAY_BYTES_PER_MINUTE, FREE_RELAY_HALF_LIFE_SECS, FUTURE_DRIFT, LOCKTIME_THRESHOLD,
    MAX_SCRIPT_SIG_SIZE, MAX_STANDARD_TX_SIZE, MIN_RELAY_FEE_PER_KB,
};
use crate::error::{MempoolError, TransactionError};
use crate::ntp1::{self, SymbolRegistry};
use crate::types::{Block, Hash256, OutPoint, Transaction, UtxoEntry};
use crate::validation;

/// Default maximum number of transactions in the mempool.
pub const DEFAULT_MAX_COUNT: usize = 5_000;

/// Default maximum total serialized bytes in the mempool (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Fee rate precision multiplier.
///
/// Fee rate is stored as `fee * FEE_RATE_PRECISION / size`, giving
/// milli-coin per byte for fine-grained ordering.
const FEE_RATE_PRECISION: u128 = 1_000;

/// Compute fee rate in milli-coin per byte. Uses a u128 intermediate to
/// prevent overflow for large fees.
fn compute_fee_rate(fee: u64, size: usize) -> u64 {
    if size == 0 {
        return u64::MAX;
    }
    let rate = (fee as u128) * FEE_RATE_PRECISION / (size as u128);
    rate.min(u64::MAX as u128) as u64
}

/// Minimum relay fee for a transaction of the given serialized size,
/// rounded up to the next whole kilobyte.
pub fn min_relay_fee(size: usize) -> u64 {
    let kb = (size as u64).div_ceil(1000).max(1);
    kb * MIN_RELAY_FEE_PER_KB
}

/// Whether a transaction is final at `height`/`time` and therefore eligible
/// for inclusion. Mirrors the nLockTime convention: a transaction with
/// lock-time zero, or whose inputs are all maximal-sequence, is always
/// final; otherwise lock-time is interpreted as a height below
/// [`LOCKTIME_THRESHOLD`] or a Unix time at or above it.
pub fn is_final(tx: &Transaction, height: u64, time: u32) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    if tx.inputs.iter().all(|i| i.sequence == u32::MAX) {
        return true;
    }
    if tx.lock_time < LOCKTIME_THRESHOLD {
        height + 1 >= tx.lock_time
    } else {
        (time as u64) >= tx.lock_time
    }
}

/// Policy-level standardness check (§4.2.3), distinct from the consensus
/// structural check in [`validation::validate_transaction_structure`].
/// A non-standard transaction is consensus-valid but will not be relayed
/// or mined by a policy-conforming node.
fn is_standard(tx: &Transaction, size: usize, height: u64, now: u32) -> Result<(), MempoolError> {
    if tx.version != 1 {
        return Err(MempoolError::NotStandard(format!(
            "unsupported version {}",
            tx.version
        )));
    }
    if !is_final(tx, height, now) {
        return Err(MempoolError::NotStandard("non-final transaction".into()));
    }
    if (tx.time as i64) > now as i64 + FUTURE_DRIFT {
        return Err(MempoolError::NotStandard("timestamp too far in future".into()));
    }
    if size >= MAX_STANDARD_TX_SIZE {
        return Err(MempoolError::NotStandard(format!(
            "size {size} exceeds standard limit"
        )));
    }
    for input in &tx.inputs {
        if input.signature.len() > MAX_SCRIPT_SIG_SIZE {
            return Err(MempoolError::NotStandard("oversized input script".into()));
        }
    }
    let op_return_count = tx.outputs.iter().filter(|o| o.is_op_return()).count();
    if op_return_count > 1 {
        return Err(MempoolError::NotStandard("multiple OP_RETURN outputs".into()));
    }
    Ok(())
}

fn classify_transaction_error(e: TransactionError) -> MempoolError {
    match e {
        TransactionError::UnknownUtxo(_) => MempoolError::MissingInputs,
        TransactionError::ImmatureCoinbase { .. } => MempoolError::MissingInputs,
        other => MempoolError::NotStandard(other.to_string()),
    }
}

/// Exponentially-decaying counter used to rate-limit fee-free transactions
/// (§4.4 step 10). Non-local submissions share one module-local budget of
/// [`FREE_RELAY_BYTES_PER_MINUTE`], decaying with a half-life of
/// [`FREE_RELAY_HALF_LIFE_SECS`].
#[derive(Debug, Clone)]
struct FreeRelayLimiter {
    used_bytes: f64,
    last_update: u32,
}

impl FreeRelayLimiter {
    fn new() -> Self {
        Self { used_bytes: 0.0, last_update: 0 }
    }

    fn decay(&mut self, now: u32) {
        if now > self.last_update {
            let elapsed = (now - self.last_update) as f64;
            let half_lives = elapsed / FREE_RELAY_HALF_LIFE_SECS as f64;
            self.used_bytes *= 0.5f64.powf(half_lives);
            self.last_update = now;
        }
    }

    /// Attempt to admit `size` bytes of free relay at `now`. Local
    /// submissions always succeed without consuming the budget.
    fn try_consume(&mut self, now: u32, size: usize, is_local: bool) -> bool {
        if is_local {
            return true;
        }
        self.decay(now);
        let cap = (FREE_RELAY_BYTES_PER_MINUTE as f64) * 10.0;
        if self.used_bytes + size as f64 > cap {
            false
        } else {
            self.used_bytes += size as f64;
            true
        }
    }
}

/// A transaction stored in the mempool with precomputed metadata.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The unconfirmed transaction.
    pub tx: Transaction,
    /// Precomputed transaction ID.
    pub txid: Hash256,
    /// Transaction fee in base units (`total_input - total_output`).
    pub fee: u64,
    /// Serialized size in bytes.
    pub size: usize,
    /// Arrival time (Unix seconds), used for orphan/eviction bookkeeping.
    pub arrival_time: u32,
    /// Fee rate in milli-coin per byte.
    fee_rate: u64,
}

impl MempoolEntry {
    /// Fee rate in milli-coin per byte.
    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }
}

/// In-memory pool of unconfirmed transactions.
///
/// Stores transactions that have passed [`Mempool::accept`], indexed by
/// txid and by spent outpoint. Maintains a fee-rate-ordered index for
/// block-template selection and lowest-priority eviction under size
/// pressure.
///
/// Not thread-safe — callers should wrap in a lock if concurrent access is
/// needed (§5 requires the chain mutex to be held before any pool write).
pub struct Mempool {
    entries: HashMap<Hash256, MempoolEntry>,
    by_outpoint: HashMap<OutPoint, Hash256>,
    by_fee_rate: BTreeSet<(u64, Hash256)>,
    max_count: usize,
    max_bytes: usize,
    total_bytes: usize,
    free_relay: FreeRelayLimiter,
}

impl Mempool {
    /// Create a new mempool with the given size limits.
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_outpoint: HashMap::new(),
            by_fee_rate: BTreeSet::new(),
            max_count,
            max_bytes,
            total_bytes: 0,
            free_relay: FreeRelayLimiter::new(),
        }
    }

    /// Create a new mempool with default size limits.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_COUNT, DEFAULT_MAX_BYTES)
    }

    /// Run the full acceptance pipeline (§4.4) and, on success, insert `tx`
    /// into the pool.
    ///
    /// - `current_height` / `now` anchor standardness and lock-time checks.
    /// - `get_utxo` resolves an input's previous output against the
    ///   confirmed chain state.
    /// - `is_confirmed` reports whether a txid already appears in a block
    ///   on the active chain (step 6, rejects resurrected transactions).
    /// - `ntp1_registry` / `ntp1_active` gate the cross-chain token-symbol
    ///   uniqueness check; when the Tachyon fork is inactive, NTP1 payloads
    ///   are accepted without a uniqueness check.
    /// - `is_local` exempts a submission from the free-relay rate limiter.
    pub fn accept<F, G>(
        &mut self,
        tx: Transaction,
        current_height: u64,
        now: u32,
        get_utxo: F,
        is_confirmed: G,
        ntp1_registry: &SymbolRegistry,
        ntp1_active: bool,
        is_local: bool,
    ) -> Result<Hash256, MempoolError>
    where
        F: Fn(&OutPoint) -> Option<UtxoEntry>,
        G: Fn(&Hash256) -> bool,
    {
        // 1. Stateless structural checks.
        validation::validate_transaction_structure(&tx)
            .map_err(|e| MempoolError::NotStandard(e.to_string()))?;

        // 2. Coinbase/coinstake transactions only ever arrive inside a block.
        if tx.is_coinbase() || tx.is_coinstake() {
            return Err(MempoolError::NotStandard(
                "coinbase/coinstake cannot enter the mempool".into(),
            ));
        }

        let encoded = bincode::encode_to_vec(&tx, bincode::config::standard())
            .map_err(|e| MempoolError::Internal(e.to_string()))?;
        let txid = Hash256(blake3::hash(&encoded).into());
        let size = encoded.len();

        // 3. Standardness policy.
        is_standard(&tx, size, current_height, now)?;

        // 4. Already in pool.
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_string()));
        }

        // 5. Conflicts with a pool member (replacement disabled).
        for input in &tx.inputs {
            if let Some(conflicting) = self.by_outpoint.get(&input.previous_output) {
                return Err(MempoolError::Conflict {
                    new_txid: txid.to_string(),
                    existing_txid: conflicting.to_string(),
                    outpoint: input.previous_output.to_string(),
                });
            }
        }

        // 6. Already confirmed on the active chain.
        if is_confirmed(&txid) {
            return Err(MempoolError::AlreadyConfirmed(txid.to_string()));
        }

        // 7/11. Input resolution, maturity, value conservation, and
        // signature verification against the confirmed chain.
        let validated = validation::validate_transaction(&tx, &get_utxo, current_height)
            .map_err(classify_transaction_error)?;

        // 9/10. Minimum relay fee, with a decaying free-relay allowance.
        let required_fee = min_relay_fee(size);
        if validated.fee < required_fee && !self.free_relay.try_consume(now, size, is_local) {
            return Err(MempoolError::FreeRelayLimitExceeded);
        }

        // 12. NTP1 symbol uniqueness, gated by the Tachyon fork.
        if ntp1_active {
            let view = ntp1::derive_ntp1_view(&tx, txid);
            let symbols = ntp1::issuance_symbols(&view);
            if !symbols.is_empty() {
                ntp1_registry
                    .validate_suffix(&[(txid, symbols)])
                    .map_err(|e| MempoolError::NotStandard(e.to_string()))?;
            }
        }

        self.insert_checked(tx, txid, validated.fee, size, now)
    }

    /// Insert a pre-validated transaction, evicting lowest-fee-rate entries
    /// if the pool is at capacity. Shared by [`Mempool::accept`].
    fn insert_checked(
        &mut self,
        tx: Transaction,
        txid: Hash256,
        fee: u64,
        size: usize,
        arrival_time: u32,
    ) -> Result<Hash256, MempoolError> {
        let fee_rate = compute_fee_rate(fee, size);

        while (self.entries.len() >= self.max_count || self.total_bytes + size > self.max_bytes)
            && !self.entries.is_empty()
        {
            if let Some(&(lowest_rate, lowest_txid)) = self.by_fee_rate.iter().next() {
                if lowest_rate >= fee_rate {
                    return Err(MempoolError::PoolFull);
                }
                self.remove_entry(lowest_txid);
            } else {
                break;
            }
        }

        if self.entries.len() >= self.max_count || self.total_bytes + size > self.max_bytes {
            return Err(MempoolError::PoolFull);
        }

        for input in &tx.inputs {
            self.by_outpoint.insert(input.previous_output.clone(), txid);
        }
        self.by_fee_rate.insert((fee_rate, txid));
        self.total_bytes += size;
        self.entries.insert(
            txid,
            MempoolEntry { tx, txid, fee, size, arrival_time, fee_rate },
        );

        Ok(txid)
    }

    /// Remove a transaction from the mempool by txid.
    pub fn remove(&mut self, txid: &Hash256) -> Option<MempoolEntry> {
        self.remove_entry(*txid)
    }

    fn remove_entry(&mut self, txid: Hash256) -> Option<MempoolEntry> {
        let entry = self.entries.remove(&txid)?;
        for input in &entry.tx.inputs {
            self.by_outpoint.remove(&input.previous_output);
        }
        self.by_fee_rate.remove(&(entry.fee_rate, txid));
        self.total_bytes -= entry.size;
        Some(entry)
    }

    /// Check if a transaction with the given txid is in the pool.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// Get a mempool entry by txid.
    pub fn get(&self, txid: &Hash256) -> Option<&MempoolEntry> {
        self.entries.get(txid)
    }

    /// Whether any of a transaction's inputs conflict with pool entries.
    pub fn has_conflict(&self, tx: &Transaction) -> bool {
        tx.inputs
            .iter()
            .any(|input| self.by_outpoint.contains_key(&input.previous_output))
    }

    /// The txids of pool entries that conflict with the given transaction.
    pub fn conflicting_txids(&self, tx: &Transaction) -> Vec<Hash256> {
        let mut seen = HashSet::new();
        tx.inputs
            .iter()
            .filter_map(|input| self.by_outpoint.get(&input.previous_output).copied())
            .filter(|txid| seen.insert(*txid))
            .collect()
    }

    /// Select transactions for a block template, highest fee rate first.
    ///
    /// Greedily fills up to `max_block_bytes` of serialized transaction
    /// data, skipping individual transactions too large for the remaining
    /// space (smaller transactions may still fit).
    pub fn select_transactions(&self, max_block_bytes: usize) -> Vec<&MempoolEntry> {
        let mut selected = Vec::new();
        let mut remaining = max_block_bytes;

        for (_, txid) in self.by_fee_rate.iter().rev() {
            if remaining == 0 {
                break;
            }
            if let Some(entry) = self.entries.get(txid) {
                if entry.size <= remaining {
                    selected.push(entry);
                    remaining -= entry.size;
                }
            }
        }

        selected
    }

    /// Remove transactions confirmed in a block and any pool transactions
    /// that now conflict with it. Call this when a block is connected to
    /// the active chain.
    pub fn remove_confirmed_block(&mut self, block: &Block) {
        let mut confirmed_txids = HashSet::new();
        let mut spent = HashSet::new();

        for tx in &block.transactions {
            if let Ok(txid) = tx.txid() {
                confirmed_txids.insert(txid);
            }
            for input in &tx.inputs {
                if !input.previous_output.is_null() {
                    spent.insert(input.previous_output.clone());
                }
            }
        }

        for txid in &confirmed_txids {
            self.remove_entry(*txid);
        }

        let conflicting: Vec<Hash256> = spent
            .iter()
            .filter_map(|op| self.by_outpoint.get(op).copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        for txid in conflicting {
            self.remove_entry(txid);
        }
    }

    /// Number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total serialized bytes of all transactions in the pool.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Maximum transaction count limit.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Maximum total bytes limit.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Total fees of all transactions in the pool.
    pub fn total_fees(&self) -> u64 {
        self.entries.values().map(|e| e.fee).sum()
    }

    /// Iterate over all entries (arbitrary order).
    pub fn iter(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.entries.values()
    }

    /// Collect all txids in the pool.
    pub fn txids(&self) -> Vec<Hash256> {
        self.entries.keys().copied().collect()
    }
}
