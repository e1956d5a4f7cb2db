//! Block validation for the Meridian hybrid PoW/PoS protocol.
//!
//! Two levels of validation:
//!
//! - **Structural** ([`validate_block_structure`]): context-free checks on
//!   block format, coinbase/coinstake positioning, merkle root (and the
//!   CVE-2012-2459 mutation guard), and per-transaction structure.
//! - **Contextual** ([`validate_block`]): full validation including header
//!   linkage, median-time-past, proof-of-work or the PoS kernel, BIP30
//!   duplicate-txid protection, double-spend detection, and reward limits.
//!
//! A block is proof-of-stake when [`Block::signature`](crate::types::Block)
//! is non-empty; its second transaction must then be the coinstake and the
//! first (coinbase) carries no value. A proof-of-work block carries no
//! signature and mints its reward entirely through the first transaction.
//!
//! The genesis block (height 0) is **not** validated through this module.
//! Use [`genesis::is_genesis`](crate::genesis) instead.

use std::collections::HashSet;

use crate::constants::FUTURE_DRIFT;
use crate::crypto::PublicKey;
use crate::error::{BlockError, TransactionError};
use crate::kernel::{self, StakeCandidate};
use crate::merkle;
use crate::reward::{self, StakeInput};
use crate::types::{Block, Hash256, OutPoint, U256, UtxoEntry};
use crate::validation;

/// Context required for full block validation, supplied by the caller from
/// chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    /// Height of the block being validated.
    pub height: u64,
    /// Expected previous block hash (the parent's header hash).
    pub prev_hash: Hash256,
    /// Median of the last [`crate::constants::MEDIAN_TIME_SPAN`] ancestor
    /// timestamps; the new block's timestamp must exceed this.
    pub median_time_past: u32,
    /// Current wall-clock time in Unix seconds (for future timestamp check).
    pub current_time: u32,
    /// Expected PoW/PoS target for this height (decoded from difficulty).
    pub target: U256,
    /// Stake modifier in effect for this height's PoS kernel, if any.
    pub stake_modifier: u64,
}

/// Summary of a successfully validated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBlock {
    /// Sum of all ordinary (non-coinbase, non-coinstake) transaction fees.
    pub total_fees: u64,
    /// Coinbase output value (PoW blocks) or newly minted coin-age reward
    /// (PoS blocks, `coinstake output - coinstake input`).
    pub reward_claimed: u64,
}

/// Validate block structure (context-free).
///
/// Checks:
/// - At least one transaction (the coinbase)
/// - First transaction is coinbase, no other transaction is
/// - A signed block (PoS) carries a coinstake as its second transaction
/// - No duplicate transaction IDs within the block
/// - Merkle root in header matches the computed root, and the transaction
///   list does not exhibit the CVE-2012-2459 mutation ambiguity
/// - All transactions pass structural validation
pub fn validate_block_structure(block: &Block) -> Result<(), BlockError> {
    if block.transactions.is_empty() {
        return Err(BlockError::NoCoinbase);
    }

    if !block.transactions[0].is_coinbase() {
        return Err(BlockError::FirstTxNotCoinbase);
    }

    for tx in block.transactions.iter().skip(1) {
        if tx.is_coinbase() {
            return Err(BlockError::MultipleCoinbase);
        }
    }

    let is_pos = !block.signature.is_empty();
    if is_pos && block.coinstake().is_none() {
        return Err(BlockError::MissingCoinstake);
    }

    for (i, tx) in block.transactions.iter().enumerate() {
        validation::validate_transaction_structure(tx)
            .map_err(|e| BlockError::TransactionError { index: i, source: e })?;
    }

    let mut txids = HashSet::with_capacity(block.transactions.len());
    let mut txid_vec = Vec::with_capacity(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        let txid = tx
            .txid()
            .map_err(|e| BlockError::TransactionError { index: i, source: e })?;
        if !txids.insert(txid) {
            return Err(BlockError::DuplicateTxid(txid.to_string()));
        }
        txid_vec.push(txid);
    }

    if merkle::has_mutation_vulnerability(&txid_vec) {
        return Err(BlockError::MerkleMutated);
    }

    let computed_root = merkle::merkle_root(&txid_vec);
    if block.header.merkle_root != computed_root {
        return Err(BlockError::InvalidMerkleRoot);
    }

    let encoded = bincode::encode_to_vec(block, bincode::config::standard()).map_err(|e| {
        BlockError::TransactionError {
            index: 0,
            source: TransactionError::Serialization(e.to_string()),
        }
    })?;
    if encoded.len() > crate::constants::MAX_BLOCK_SIZE {
        return Err(BlockError::OversizedBlock {
            size: encoded.len(),
            max: crate::constants::MAX_BLOCK_SIZE,
        });
    }

    if !is_pos {
        let hash = block.header.hash();
        if hash.as_u256() > block.header.target() {
            return Err(BlockError::InvalidPoW);
        }
    }

    Ok(())
}

/// Validate a block against the chain state (contextual).
///
/// `get_utxo` resolves UTXOs from the state **before** this block.
/// `txid_has_unspent_outputs` implements the BIP30 guard: it reports
/// whether a transaction with the given id already exists on chain with at
/// least one of its outputs still unspent, in which case reintroducing the
/// same id is rejected.
pub fn validate_block<F, G>(
    block: &Block,
    context: &BlockContext,
    get_utxo: F,
    txid_has_unspent_outputs: G,
) -> Result<ValidatedBlock, BlockError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
    G: Fn(&Hash256) -> bool,
{
    validate_block_structure(block)?;

    if block.header.prev_hash != context.prev_hash {
        return Err(BlockError::InvalidPrevHash);
    }

    if block.header.timestamp <= context.median_time_past {
        return Err(BlockError::TimestampNotAfterMtp);
    }
    let max_time = (context.current_time as i64).saturating_add(FUTURE_DRIFT);
    if (block.header.timestamp as i64) > max_time {
        return Err(BlockError::TimestampTooFar(
            block.header.timestamp as i64 - context.current_time as i64,
        ));
    }

    for tx in &block.transactions {
        let txid = tx
            .txid()
            .map_err(|e| BlockError::TransactionError { index: 0, source: e })?;
        if txid_has_unspent_outputs(&txid) {
            return Err(BlockError::Bip30Violation(txid.to_string()));
        }
    }

    let is_pos = block.is_proof_of_stake();

    if !is_pos {
        let expected_bits = context.target.to_compact();
        if block.header.bits != expected_bits {
            return Err(BlockError::InvalidDifficulty {
                got: block.header.bits,
                expected: expected_bits,
            });
        }
    }

    let mut block_spent: HashSet<OutPoint> = HashSet::new();
    let mut total_fees: u64 = 0;
    let ordinary_start = if is_pos { 2 } else { 1 };

    if is_pos {
        for input in &block.transactions[1].inputs {
            block_spent.insert(input.previous_output.clone());
        }
    }

    for (i, tx) in block.transactions.iter().enumerate().skip(ordinary_start) {
        for input in &tx.inputs {
            if !block_spent.insert(input.previous_output.clone()) {
                return Err(BlockError::DoubleSpend(input.previous_output.to_string()));
            }
        }

        let validated = validation::validate_transaction(tx, &get_utxo, context.height)
            .map_err(|e| BlockError::TransactionError { index: i, source: e })?;
        total_fees = total_fees.checked_add(validated.fee).ok_or(BlockError::TransactionError {
            index: i,
            source: TransactionError::ValueOverflow,
        })?;
    }

    let reward_claimed = if is_pos {
        validate_coinstake(block, context, &get_utxo, total_fees)?
    } else {
        validate_coinbase_reward(block, context, total_fees)?
    };

    Ok(ValidatedBlock { total_fees, reward_claimed })
}

/// PoW coinbase reward check: value claimed must not exceed
/// `reward::pow_subsidy(height) + total_fees`.
fn validate_coinbase_reward(
    block: &Block,
    context: &BlockContext,
    total_fees: u64,
) -> Result<u64, BlockError> {
    let coinbase = &block.transactions[0];
    let coinbase_value = coinbase
        .total_output_value()
        .ok_or(BlockError::TransactionError { index: 0, source: TransactionError::ValueOverflow })?;

    let max_reward = reward::pow_subsidy(context.height)
        .checked_add(total_fees)
        .ok_or(BlockError::TransactionError { index: 0, source: TransactionError::ValueOverflow })?;

    if coinbase_value > max_reward {
        return Err(BlockError::InvalidReward { got: coinbase_value, expected: max_reward });
    }

    Ok(coinbase_value)
}

/// PoS path: verify the block signature, the kernel, the stake-input
/// maturity, and the coin-age reward ceiling. Returns the newly minted
/// amount (`coinstake output total - coinstake input total`).
fn validate_coinstake<F>(
    block: &Block,
    context: &BlockContext,
    get_utxo: &F,
    total_fees: u64,
) -> Result<u64, BlockError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    let coinbase_value = block.transactions[0]
        .total_output_value()
        .ok_or(BlockError::TransactionError { index: 0, source: TransactionError::ValueOverflow })?;
    if coinbase_value != 0 {
        return Err(BlockError::InvalidReward { got: coinbase_value, expected: 0 });
    }

    let coinstake = &block.transactions[1];

    verify_block_signature(block, coinstake)?;

    let mut total_input: u64 = 0;
    let mut stake_inputs = Vec::with_capacity(coinstake.inputs.len());
    let mut kernel_candidate: Option<StakeCandidate> = None;

    for (i, input) in coinstake.inputs.iter().enumerate() {
        let utxo = get_utxo(&input.previous_output).ok_or_else(|| BlockError::TransactionError {
            index: 1,
            source: TransactionError::UnknownUtxo(input.previous_output.to_string()),
        })?;

        if (utxo.is_coinbase || utxo.is_coinstake) && !utxo.is_mature(context.height) {
            return Err(BlockError::TransactionError {
                index: 1,
                source: TransactionError::ImmatureCoinbase { index: i },
            });
        }

        crate::crypto::verify_transaction_input(coinstake, i, &utxo.output.pubkey_hash).map_err(
            |_| BlockError::TransactionError {
                index: 1,
                source: TransactionError::InvalidSignature { index: i },
            },
        )?;

        if i == 0 {
            kernel_candidate = Some(StakeCandidate {
                stake_modifier: context.stake_modifier,
                prevout: input.previous_output.clone(),
                prevout_block_time: utxo.block_time,
                prevout_tx_time: utxo.block_time,
                stake_time: coinstake.time,
                value: utxo.output.value,
            });
        }

        stake_inputs.push(StakeInput {
            value: utxo.output.value,
            age_seconds: utxo.coin_age_seconds(coinstake.time),
        });

        total_input = total_input
            .checked_add(utxo.output.value)
            .ok_or(BlockError::TransactionError { index: 1, source: TransactionError::ValueOverflow })?;
    }

    let candidate = kernel_candidate.ok_or(BlockError::InvalidKernel)?;
    kernel::evaluate(&candidate, context.target).map_err(|_| BlockError::InvalidKernel)?;

    let total_output = coinstake
        .total_output_value()
        .ok_or(BlockError::TransactionError { index: 1, source: TransactionError::ValueOverflow })?;

    let max_reward = reward::coin_age_reward(&stake_inputs)
        .checked_add(total_fees)
        .ok_or(BlockError::TransactionError { index: 1, source: TransactionError::ValueOverflow })?;
    let max_output = total_input
        .checked_add(max_reward)
        .ok_or(BlockError::TransactionError { index: 1, source: TransactionError::ValueOverflow })?;

    if total_output > max_output {
        return Err(BlockError::InvalidReward { got: total_output, expected: max_output });
    }

    Ok(total_output.saturating_sub(total_input))
}

/// Verify the block's PoS signature: the coinstake's first input's public
/// key must hash to the coinstake's reward output, and must have signed
/// the block header hash.
fn verify_block_signature(block: &Block, coinstake: &crate::types::Transaction) -> Result<(), BlockError> {
    let first_input = coinstake.inputs.first().ok_or(BlockError::InvalidBlockSignature)?;
    let pk_bytes: [u8; 32] = first_input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| BlockError::InvalidBlockSignature)?;
    let pk = PublicKey::from_bytes(&pk_bytes).map_err(|_| BlockError::InvalidBlockSignature)?;

    if pk.pubkey_hash() != coinstake.outputs[1].pubkey_hash {
        return Err(BlockError::InvalidBlockSignature);
    }

    let sig_bytes: [u8; 64] = block
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| BlockError::InvalidBlockSignature)?;

    pk.verify(block.header.hash().as_bytes(), &sig_bytes)
        .map_err(|_| BlockError::InvalidBlockSignature)
}
