//! NTP1 coloured-coin token layer: op-return-encoded issuance, transfer,
//! and burn, plus the cross-chain token-symbol uniqueness check gated by
//! the "Tachyon" fork.
//!
//! The wire encoding of an NTP1 op-return payload is treated as an
//! external, pure-function concern (the spec calls out the script VM as a
//! non-goal); this module decodes the minimal fields needed to enforce the
//! uniqueness invariant and exposes a typed view for storage/indexing.

use std::collections::HashSet;

use crate::error::Ntp1Error;
use crate::types::{Hash256, Transaction};

/// Decoded token operation carried by a transaction's op-return output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenOp {
    Issuance { symbol: String, amount: u64 },
    Transfer { token_id: Hash256, amount: u64 },
    Burn { token_id: Hash256, amount: u64 },
}

/// Derived NTP1 view of a base transaction, stored alongside it in the
/// ChainStore and indexed by `symbol -> issuing tx-hashes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ntp1Transaction {
    pub txid: Hash256,
    pub ops: Vec<TokenOp>,
}

/// Payload tag bytes distinguishing operation kinds within an op-return.
const TAG_ISSUANCE: u8 = 0x01;
const TAG_TRANSFER: u8 = 0x02;
const TAG_BURN: u8 = 0x03;

/// Decode a single op-return payload into a [`TokenOp`].
///
/// Layout: `tag(1) || amount(8 LE) || rest`, where `rest` is the upper-cased
/// UTF-8 symbol for issuance, or a 32-byte token-id for transfer/burn.
pub fn decode_op_return(payload: &[u8]) -> Result<TokenOp, Ntp1Error> {
    if payload.len() < 9 {
        return Err(Ntp1Error::MalformedPayload);
    }
    let tag = payload[0];
    let mut amount_bytes = [0u8; 8];
    amount_bytes.copy_from_slice(&payload[1..9]);
    let amount = u64::from_le_bytes(amount_bytes);
    let rest = &payload[9..];
    match tag {
        TAG_ISSUANCE => {
            let symbol = std::str::from_utf8(rest)
                .map_err(|_| Ntp1Error::MalformedPayload)?
                .to_uppercase();
            if symbol.is_empty() {
                return Err(Ntp1Error::MalformedPayload);
            }
            Ok(TokenOp::Issuance { symbol, amount })
        }
        TAG_TRANSFER | TAG_BURN => {
            if rest.len() != 32 {
                return Err(Ntp1Error::MalformedPayload);
            }
            let mut id = [0u8; 32];
            id.copy_from_slice(rest);
            let token_id = Hash256(id);
            Ok(if tag == TAG_TRANSFER {
                TokenOp::Transfer { token_id, amount }
            } else {
                TokenOp::Burn { token_id, amount }
            })
        }
        _ => Err(Ntp1Error::MalformedPayload),
    }
}

/// Extract the NTP1 view of a transaction by decoding every op-return output.
/// Outputs that fail to decode are skipped rather than failing the whole
/// transaction — NTP1 metadata is additive over the base value-transfer
/// semantics, so a malformed payload degrades to "not an NTP1 transaction"
/// for that output, matching the original's documented "log and return
/// empty" recovery contract.
pub fn derive_ntp1_view(tx: &Transaction, txid: Hash256) -> Ntp1Transaction {
    let ops = tx
        .outputs
        .iter()
        .filter(|o| o.is_op_return())
        .filter_map(|o| decode_op_return(&o.op_return).ok())
        .collect();
    Ntp1Transaction { txid, ops }
}

/// Upper-cased issuance symbols carried by a transaction, for uniqueness
/// checking.
pub fn issuance_symbols(view: &Ntp1Transaction) -> Vec<&str> {
    view.ops
        .iter()
        .filter_map(|op| match op {
            TokenOp::Issuance { symbol, .. } => Some(symbol.as_str()),
            _ => None,
        })
        .collect()
}

/// Enforces token-symbol uniqueness, case-insensitively, both within a
/// connecting suffix of blocks and against the already-committed active
/// chain (§4.3 "Token uniqueness"). Blacklisted issuance tx-hashes are
/// exempted, matching the "not blacklisted" carve-out in the spec.
#[derive(Default)]
pub struct SymbolRegistry {
    /// symbol -> issuing tx-hashes already committed on the active chain.
    committed: std::collections::HashMap<String, Vec<Hash256>>,
    blacklist: HashSet<Hash256>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blacklist(&mut self, txid: Hash256) {
        self.blacklist.insert(txid);
    }

    pub fn record_committed(&mut self, symbol: &str, txid: Hash256) {
        self.committed.entry(symbol.to_string()).or_default().push(txid);
    }

    fn is_symbol_taken(&self, symbol: &str, exclude: Hash256) -> bool {
        self.committed
            .get(symbol)
            .map(|txids| {
                txids
                    .iter()
                    .any(|id| *id != exclude && !self.blacklist.contains(id))
            })
            .unwrap_or(false)
    }

    /// Validate a connecting suffix of transactions in block order. Returns
    /// an error on the first intra-suffix or cross-chain collision.
    pub fn validate_suffix(
        &self,
        suffix: &[(Hash256, Vec<&str>)],
    ) -> Result<(), Ntp1Error> {
        let mut seen_in_suffix: HashSet<String> = HashSet::new();
        for (txid, symbols) in suffix {
            for symbol in symbols {
                if !seen_in_suffix.insert(symbol.to_string()) {
                    return Err(Ntp1Error::DuplicateSymbol(symbol.to_string()));
                }
                if self.is_symbol_taken(symbol, *txid) {
                    return Err(Ntp1Error::DuplicateSymbol(symbol.to_string()));
                }
            }
        }
        Ok(())
    }
}
