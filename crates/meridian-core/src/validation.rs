//! Transaction validation for the Meridian protocol.
//!
//! Two levels of validation:
//!
//! - **Structural** ([`validate_transaction_structure`]): context-free checks on
//!   transaction format and internal consistency. No external state required.
//! - **Contextual** ([`validate_transaction`]): UTXO-aware checks including
//!   signature verification, coinbase/coinstake maturity, and value conservation.
//!
//! Coinbase and coinstake transactions are only structurally validated
//! here; their reward amounts are checked during block validation
//! (meridian-consensus), since that requires the height and — for
//! coinstake — the coin-age of the spent stake.

use std::collections::HashSet;

use crate::constants::{COINBASE_MATURITY, MAX_COINBASE_SCRIPT_LEN, MAX_MONEY, MAX_TX_SIZE, MIN_COINBASE_SCRIPT_LEN};
use crate::crypto;
use crate::error::TransactionError;
use crate::types::{OutPoint, Transaction, UtxoEntry};

/// Summary of a successfully validated transaction.
///
/// Returned by [`validate_transaction`] after all checks pass. Contains
/// the computed fee and value totals for use in block template assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Total value of all spent inputs in mrills.
    pub total_input: u64,
    /// Total value of all created outputs in mrills.
    pub total_output: u64,
    /// Transaction fee in mrills (`total_input - total_output`).
    pub fee: u64,
}

/// Validate transaction structure (context-free).
///
/// Checks that apply to every transaction:
/// - Non-empty inputs and outputs
/// - All output values are non-zero, except a coinbase's outputs (a PoS
///   block's coinbase is conventionally empty) and a coinstake's marker
///   output
/// - Total output value does not overflow and stays within [`MAX_MONEY`]
/// - Serialized size is within [`MAX_TX_SIZE`]
///
/// Additional coinbase-specific checks (via [`validate_coinbase_structure`]):
/// - Exactly one input with null outpoint
/// - Coinbase script within [`MIN_COINBASE_SCRIPT_LEN`]..=[`MAX_COINBASE_SCRIPT_LEN`]
///
/// Additional spending (regular or coinstake) checks:
/// - No null outpoints
/// - No duplicate input outpoints
/// - Each input carries 64-byte signature and 32-byte public key
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    let is_coinbase = tx.is_coinbase();
    let is_coinstake = tx.is_coinstake();
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 && !is_coinbase && !(i == 0 && is_coinstake) {
            return Err(TransactionError::ZeroValueOutput(i));
        }
    }

    let total = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;
    if total > MAX_MONEY {
        return Err(TransactionError::AmountExceedsMaxMoney);
    }

    let encoded = bincode::encode_to_vec(tx, bincode::config::standard())
        .map_err(|e| TransactionError::Serialization(e.to_string()))?;
    if encoded.len() > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction {
            size: encoded.len(),
            max: MAX_TX_SIZE,
        });
    }

    if tx.is_coinbase() {
        validate_coinbase_structure(tx)?;
    } else {
        validate_spending_structure(tx)?;
    }

    Ok(())
}

/// Validate coinbase-specific structure.
///
/// - Exactly one input with null outpoint
/// - Coinbase script (signature field) within
///   [`MIN_COINBASE_SCRIPT_LEN`]..=[`MAX_COINBASE_SCRIPT_LEN`] bytes
fn validate_coinbase_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.len() != 1 {
        return Err(TransactionError::InvalidCoinbase(
            "must have exactly one input".into(),
        ));
    }

    if !tx.inputs[0].previous_output.is_null() {
        return Err(TransactionError::InvalidCoinbase(
            "input must be null outpoint".into(),
        ));
    }

    let script_len = tx.inputs[0].signature.len();
    if !(MIN_COINBASE_SCRIPT_LEN..=MAX_COINBASE_SCRIPT_LEN).contains(&script_len) {
        return Err(TransactionError::InvalidCoinbase(format!(
            "script length {script_len} outside [{MIN_COINBASE_SCRIPT_LEN}, {MAX_COINBASE_SCRIPT_LEN}]",
        )));
    }

    Ok(())
}

/// Validate a spending (regular or coinstake) transaction's structure.
///
/// - No null outpoints
/// - No duplicate input outpoints
/// - 64-byte signature and 32-byte public key on each input
fn validate_spending_structure(tx: &Transaction) -> Result<(), TransactionError> {
    let mut seen = HashSet::with_capacity(tx.inputs.len());

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.previous_output.is_null() {
            return Err(TransactionError::NullOutpointInRegularTx(i));
        }

        if !seen.insert(&input.previous_output) {
            return Err(TransactionError::DuplicateInput(
                input.previous_output.to_string(),
            ));
        }

        if input.signature.len() != 64 {
            return Err(TransactionError::InvalidSignature { index: i });
        }

        if input.public_key.len() != 32 {
            return Err(TransactionError::InvalidSignature { index: i });
        }
    }

    Ok(())
}

/// Validate a transaction against the UTXO set (contextual).
///
/// Performs full validation including structural checks plus:
/// - All input outpoints reference existing, unspent UTXOs
/// - Coinbase/coinstake UTXOs have sufficient maturity
/// - Ed25519 signatures verify against the UTXO's pubkey hash
/// - Total input value covers total output value (fee >= 0)
///
/// Returns a [`ValidatedTransaction`] with the computed fee on success.
///
/// **Note:** Coinbase and coinstake transactions cannot be contextually
/// validated by this function — they mint new coins rather than merely
/// conserving value, which block validation checks separately via
/// [`crate::reward`]. Pass regular transactions only.
///
/// The `get_utxo` function looks up a UTXO by outpoint, allowing the caller
/// to provide any source (RocksDB, in-memory map, etc.).
pub fn validate_transaction<F>(
    tx: &Transaction,
    get_utxo: F,
    current_height: u64,
) -> Result<ValidatedTransaction, TransactionError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    if tx.is_coinbase() {
        return Err(TransactionError::InvalidCoinbase(
            "coinbase cannot be contextually validated standalone".into(),
        ));
    }
    if tx.is_coinstake() {
        return Err(TransactionError::InvalidCoinbase(
            "coinstake cannot be contextually validated standalone".into(),
        ));
    }

    validate_transaction_structure(tx)?;

    let mut total_input: u64 = 0;

    for (i, input) in tx.inputs.iter().enumerate() {
        let utxo = get_utxo(&input.previous_output).ok_or_else(|| {
            TransactionError::UnknownUtxo(input.previous_output.to_string())
        })?;

        if (utxo.is_coinbase || utxo.is_coinstake) && !utxo.is_mature(current_height) {
            let _ = COINBASE_MATURITY; // documents the maturity rule `is_mature` enforces
            return Err(TransactionError::ImmatureCoinbase { index: i });
        }

        crypto::verify_transaction_input(tx, i, &utxo.output.pubkey_hash)
            .map_err(|_| TransactionError::InvalidSignature { index: i })?;

        total_input = total_input
            .checked_add(utxo.output.value)
            .ok_or(TransactionError::ValueOverflow)?;
    }

    let total_output = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;

    if total_input < total_output {
        return Err(TransactionError::InsufficientFunds {
            have: total_input,
            need: total_output,
        });
    }

    Ok(ValidatedTransaction {
        total_input,
        total_output,
        fee: total_input - total_output,
    })
}
