//! Core protocol types: transactions, blocks, UTXOs, and the 256-bit
//! integer used for proof-of-work/proof-of-stake targets.
//!
//! All monetary values are in mrills (1 MER = 10^8 mrills).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block header hashes (SHA-256),
/// and merkle roots (BLAKE3).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Interpret this hash as a big-endian 256-bit integer, for comparison
    /// against a PoW/PoS target.
    pub fn as_u256(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 256-bit unsigned integer stored as four big-endian `u64` limbs
/// (`limbs[0]` is most significant). Used for chain-trust accumulation,
/// PoW/PoS targets, and their compact ("bits") encoding.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct U256 {
    limbs: [u64; 4],
}

impl U256 {
    pub const ZERO: Self = Self { limbs: [0; 4] };
    pub const ONE: Self = Self { limbs: [0, 0, 0, 1] };
    pub const MAX: Self = Self { limbs: [u64::MAX; 4] };

    pub fn from_u64(v: u64) -> Self {
        Self { limbs: [0, 0, 0, v] }
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for i in 0..4 {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            limbs[i] = u64::from_be_bytes(chunk);
        }
        Self { limbs }
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..4 {
            out[i * 8..i * 8 + 8].copy_from_slice(&self.limbs[i].to_be_bytes());
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.limbs == [0; 4]
    }

    /// Index of the most-significant set bit, or `None` if zero.
    fn bit_length(&self) -> Option<u32> {
        for (i, limb) in self.limbs.iter().enumerate() {
            if *limb != 0 {
                return Some(((3 - i) as u32) * 64 + (64 - limb.leading_zeros()));
            }
        }
        None
    }

    pub fn checked_add(&self, other: &U256) -> Option<U256> {
        let mut out = [0u64; 4];
        let mut carry: u128 = 0;
        for i in (0..4).rev() {
            let sum = self.limbs[i] as u128 + other.limbs[i] as u128 + carry;
            out[i] = sum as u64;
            carry = sum >> 64;
        }
        if carry != 0 {
            None
        } else {
            Some(Self { limbs: out })
        }
    }

    pub fn saturating_add(&self, other: &U256) -> U256 {
        self.checked_add(other).unwrap_or(U256::MAX)
    }

    /// `2^256 / (self + 1)`, saturating at `U256::MAX` when `self` is zero.
    /// Used to convert a target into its chain-trust contribution.
    pub fn chain_work(&self) -> U256 {
        // work = ~self / (self + 1) + 1, the standard Bitcoin-style
        // computation avoiding 257-bit arithmetic.
        let target_plus_one = match self.checked_add(&U256::ONE) {
            Some(t) => t,
            None => return U256::ONE, // self == MAX
        };
        if target_plus_one.is_zero() {
            return U256::MAX;
        }
        let not_self = self.not();
        not_self.div(&target_plus_one).saturating_add(&U256::ONE)
    }

    fn not(&self) -> U256 {
        U256 {
            limbs: [
                !self.limbs[0],
                !self.limbs[1],
                !self.limbs[2],
                !self.limbs[3],
            ],
        }
    }

    /// Long division, schoolbook bit-by-bit. Sufficient for the rare
    /// chain-trust / kernel-weight divisions performed per block.
    pub fn div(&self, divisor: &U256) -> U256 {
        if divisor.is_zero() {
            return U256::MAX;
        }
        let mut quotient = U256::ZERO;
        let mut remainder = U256::ZERO;
        let bits = self.bit_length().unwrap_or(0);
        for i in (0..bits).rev() {
            remainder = remainder.shl1();
            if self.bit(i) {
                remainder = remainder.or_bit0();
            }
            if remainder >= *divisor {
                remainder = remainder.sub(divisor);
                quotient = quotient.set_bit(i);
            }
        }
        quotient
    }

    fn bit(&self, index: u32) -> bool {
        let limb = 3 - (index / 64) as usize;
        (self.limbs[limb] >> (index % 64)) & 1 == 1
    }

    fn set_bit(mut self, index: u32) -> U256 {
        let limb = 3 - (index / 64) as usize;
        self.limbs[limb] |= 1u64 << (index % 64);
        self
    }

    fn shl1(&self) -> U256 {
        let mut out = [0u64; 4];
        let mut carry = 0u64;
        for i in (0..4).rev() {
            out[i] = (self.limbs[i] << 1) | carry;
            carry = self.limbs[i] >> 63;
        }
        U256 { limbs: out }
    }

    fn or_bit0(mut self) -> U256 {
        self.limbs[3] |= 1;
        self
    }

    fn sub(&self, other: &U256) -> U256 {
        let mut out = [0u64; 4];
        let mut borrow: i128 = 0;
        for i in (0..4).rev() {
            let diff = self.limbs[i] as i128 - other.limbs[i] as i128 - borrow;
            if diff < 0 {
                out[i] = (diff + (1i128 << 64)) as u64;
                borrow = 1;
            } else {
                out[i] = diff as u64;
                borrow = 0;
            }
        }
        U256 { limbs: out }
    }

    pub fn checked_mul_u64(&self, rhs: u64) -> Option<U256> {
        let mut out = [0u64; 4];
        let mut carry: u128 = 0;
        for i in (0..4).rev() {
            let prod = self.limbs[i] as u128 * rhs as u128 + carry;
            out[i] = prod as u64;
            carry = prod >> 64;
        }
        if carry != 0 {
            None
        } else {
            Some(Self { limbs: out })
        }
    }

    /// Decode a 32-bit "compact" target representation (à la Bitcoin's
    /// `nBits`): the high byte is an exponent, the low three bytes a
    /// mantissa. `mantissa * 256^(exponent-3)`.
    pub fn from_compact(bits: u32) -> U256 {
        let exponent = (bits >> 24) as i32;
        let mantissa = (bits & 0x007f_ffff) as u64;
        let negative = bits & 0x0080_0000 != 0;
        if negative || mantissa == 0 {
            return U256::ZERO;
        }
        let mantissa = U256::from_u64(mantissa);
        if exponent <= 3 {
            let shift = (3 - exponent) * 8;
            mantissa.shr(shift as u32)
        } else {
            let shift = (exponent - 3) * 8;
            mantissa.shl(shift as u32)
        }
    }

    /// Encode this value into the compact representation, rounding the
    /// mantissa down to 3 significant bytes.
    pub fn to_compact(&self) -> u32 {
        let bytes = self.to_be_bytes();
        let mut first_nonzero = None;
        for (i, b) in bytes.iter().enumerate() {
            if *b != 0 {
                first_nonzero = Some(i);
                break;
            }
        }
        let first_nonzero = match first_nonzero {
            Some(i) => i,
            None => return 0,
        };
        let mut size = (32 - first_nonzero) as u32;
        let mut mantissa: u32;
        if size <= 3 {
            let mut m = 0u32;
            for b in &bytes[first_nonzero..] {
                m = (m << 8) | (*b as u32);
            }
            mantissa = m << (8 * (3 - size));
        } else {
            mantissa = ((bytes[first_nonzero] as u32) << 16)
                | ((bytes[first_nonzero + 1] as u32) << 8)
                | (bytes[first_nonzero + 2] as u32);
        }
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }
        (size << 24) | mantissa
    }

    /// Left shift. Implemented bit-at-a-time; only used for compact-bits
    /// decoding, which runs once per block, so this need not be optimal.
    fn shl(&self, bits: u32) -> U256 {
        if bits == 0 {
            return *self;
        }
        if bits >= 256 {
            return U256::ZERO;
        }
        let mut result = U256::ZERO;
        let bl = self.bit_length().unwrap_or(0);
        for i in 0..bl {
            if self.bit(i) && i + bits < 256 {
                result = result.set_bit(i + bits);
            }
        }
        result
    }

    fn shr(&self, bits: u32) -> U256 {
        if bits == 0 {
            return *self;
        }
        if bits >= 256 {
            return U256::ZERO;
        }
        let mut result = U256::ZERO;
        let bl = self.bit_length().unwrap_or(0);
        for i in bits..bl.max(bits) {
            if i >= bits && self.bit(i) {
                result = result.set_bit(i - bits);
            }
        }
        result
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_bytes()))
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Ed25519 signature (64 bytes). Empty for coinbase inputs.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes). Empty for coinbase inputs.
    pub public_key: Vec<u8>,
    /// Relative-locktime / replace-ability sequence number.
    pub sequence: u32,
}

/// A transaction output, creating a new UTXO.
///
/// `pubkey_hash` doubles as the (pure, hash-commitment) "script": spending
/// requires a signature from the key whose BLAKE3 hash matches. An empty
/// output (`value == 0` and `pubkey_hash == Hash256::ZERO`) is the coinstake
/// marker convention described on [`Transaction::is_coinstake`].
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in mrills (1 MER = 10^8 mrills).
    pub value: u64,
    /// BLAKE3 hash of the recipient's Ed25519 public key, or an NTP1
    /// op-return payload when [`TxOutput::is_op_return`] is true.
    pub pubkey_hash: Hash256,
    /// Raw op-return payload for NTP1 token metadata. Empty for ordinary
    /// value-transfer outputs.
    pub op_return: Vec<u8>,
}

impl TxOutput {
    pub fn is_op_return(&self) -> bool {
        !self.op_return.is_empty()
    }

    /// The coinstake marker: zero value, zero pubkey hash, no op-return.
    pub fn is_empty_marker(&self) -> bool {
        self.value == 0 && self.pubkey_hash.is_zero() && self.op_return.is_empty()
    }
}

/// A transaction transferring value between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Per-transaction Unix timestamp (this chain, unlike Bitcoin, carries
    /// a timestamp on every transaction; it feeds the PoS kernel hash).
    pub time: u32,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height or timestamp before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// A transaction is coinbase when it has exactly one input whose
    /// previous outpoint is null.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// A transaction is coinstake (PoS convention) when it has at least
    /// two outputs, the first is the empty marker, and the second commits
    /// to the staker's key. At most one of {coinbase, coinstake} may hold.
    pub fn is_coinstake(&self) -> bool {
        if self.is_coinbase() {
            return false;
        }
        self.outputs.len() >= 2
            && self.outputs[0].is_empty_marker()
            && !self.outputs[1].pubkey_hash.is_zero()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Block header containing the proof-of-work/proof-of-stake puzzle.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// BLAKE3 merkle root of the block's transactions.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u32,
    /// Compact-encoded difficulty target ("bits").
    pub bits: u32,
    /// Proof-of-work nonce. Unused (left at 0) for PoS blocks.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing.
    const HASH_SIZE: usize = 8 + 32 + 32 + 4 + 4 + 8;

    /// Compute the block header hash (double SHA-256).
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.bits.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }

    /// Decode [`BlockHeader::bits`] into its 256-bit target.
    pub fn target(&self) -> U256 {
        U256::from_compact(self.bits)
    }
}

/// A complete block: header, transactions, and (for PoS blocks) a
/// signature authenticating the block against the coinstake's staker key.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    /// Block header with proof-of-work/proof-of-stake target.
    pub header: BlockHeader,
    /// Ordered list of transactions. First transaction must be coinbase
    /// (PoW) or an empty-coinbase plus coinstake as the second tx (PoS).
    pub transactions: Vec<Transaction>,
    /// Block signature, present only for PoS blocks. Signs the block
    /// hash with the key recovered from the coinstake's second output.
    pub signature: Vec<u8>,
}

impl Block {
    /// First transaction, conventionally coinbase (possibly a
    /// zero-value coinbase in a PoS block).
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// The coinstake transaction, if this is a PoS block.
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }
}

/// An entry in the unspent transaction output set.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UtxoEntry {
    /// The unspent output.
    pub output: TxOutput,
    /// Height of the block containing this UTXO.
    pub block_height: u64,
    /// Unix time of the block containing this UTXO (used for coin-age).
    pub block_time: u32,
    /// Whether this output is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Whether this output is from a coinstake transaction.
    pub is_coinstake: bool,
}

impl UtxoEntry {
    /// Check if this UTXO has matured and can be spent.
    ///
    /// Coinbase/coinstake outputs require
    /// [`COINBASE_MATURITY`](crate::constants::COINBASE_MATURITY)
    /// confirmations. Ordinary outputs are always mature.
    pub fn is_mature(&self, current_height: u64) -> bool {
        if !self.is_coinbase && !self.is_coinstake {
            return true;
        }
        current_height.saturating_sub(self.block_height) >= crate::constants::COINBASE_MATURITY
    }

    /// Coin-age in seconds at `spend_time`, capped at `STAKE_MAX_AGE`.
    pub fn coin_age_seconds(&self, spend_time: u32) -> u64 {
        spend_time.saturating_sub(self.block_time) as u64
    }
}

/// A block's position in the block-index tree. Mutable per-node consensus
/// state tracked alongside the immutable [`BlockHeader`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockIndexNode {
    pub hash: Hash256,
    pub height: u64,
    pub prev_hash: Option<Hash256>,
    /// Valid only when this node is on the active chain; `None` at the tip.
    pub next_hash: Option<Hash256>,
    pub chain_trust: U256,
    pub mint: u64,
    pub money_supply: u64,
    pub is_proof_of_stake: bool,
    pub stake_entropy_bit: bool,
    pub stake_modifier: u64,
    pub stake_modifier_checksum: u32,
    pub stake_modifier_generated: bool,
    pub stake_prevout: Option<OutPoint>,
    pub stake_time: u32,
    /// Kernel hash for PoS, block hash for PoW.
    pub hash_of_proof: Hash256,
    pub header: BlockHeader,
}

impl BlockIndexNode {
    pub fn on_active_chain(&self, tip_hash: Hash256, is_active: impl Fn(Hash256) -> bool) -> bool {
        self.hash == tip_hash || is_active(self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;

    fn sample_pubkey_hash() -> Hash256 {
        Hash256([0xAA; 32])
    }

    fn sample_input() -> TxInput {
        TxInput {
            previous_output: OutPoint {
                txid: Hash256([0x11; 32]),
                index: 0,
            },
            signature: vec![0u8; 64],
            public_key: vec![0u8; 32],
            sequence: u32::MAX,
        }
    }

    fn sample_output(value: u64) -> TxOutput {
        TxOutput {
            value,
            pubkey_hash: sample_pubkey_hash(),
            op_return: vec![],
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            time: 1_700_000_000,
            inputs: vec![sample_input()],
            outputs: vec![sample_output(50 * COIN)],
            lock_time: 0,
        }
    }

    fn sample_coinbase() -> Transaction {
        Transaction {
            version: 1,
            time: 1_700_000_000,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: vec![],
                public_key: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![sample_output(50 * COIN)],
            lock_time: 0,
        }
    }

    fn sample_coinstake() -> Transaction {
        Transaction {
            version: 1,
            time: 1_700_000_000,
            inputs: vec![sample_input()],
            outputs: vec![
                TxOutput { value: 0, pubkey_hash: Hash256::ZERO, op_return: vec![] },
                sample_output(10 * COIN),
            ],
            lock_time: 0,
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 1_700_000_000,
            bits: U256::MAX.to_compact(),
            nonce: 0,
        }
    }

    // --- U256 ---

    #[test]
    fn u256_zero_and_max() {
        assert!(U256::ZERO.is_zero());
        assert!(!U256::MAX.is_zero());
        assert!(U256::MAX > U256::ZERO);
    }

    #[test]
    fn u256_from_to_be_bytes_roundtrip() {
        let bytes = [0x42u8; 32];
        let v = U256::from_be_bytes(bytes);
        assert_eq!(v.to_be_bytes(), bytes);
    }

    #[test]
    fn u256_compact_roundtrip_small() {
        let v = U256::from_u64(0x1234);
        let bits = v.to_compact();
        let back = U256::from_compact(bits);
        assert_eq!(back, v);
    }

    #[test]
    fn u256_compact_roundtrip_shifted() {
        let v = U256::from_u64(0x00ffff).checked_mul_u64(1 << 16).unwrap();
        let bits = v.to_compact();
        let back = U256::from_compact(bits);
        assert_eq!(back, v);
    }

    #[test]
    fn u256_chain_work_monotonic() {
        let easy = U256::from_compact(U256::MAX.to_compact());
        let hard = U256::from_u64(1000);
        assert!(hard.chain_work() > easy.chain_work());
    }

    #[test]
    fn u256_div_basic() {
        let a = U256::from_u64(100);
        let b = U256::from_u64(7);
        assert_eq!(a.div(&b), U256::from_u64(14));
    }

    #[test]
    fn u256_ordering() {
        assert!(U256::from_u64(5) < U256::from_u64(10));
        assert!(U256::from_u64(10) > U256::from_u64(5));
    }

    // --- Hash256 ---

    #[test]
    fn hash256_zero_is_zero() {
        let h = Hash256::ZERO;
        assert!(h.is_zero());
        assert_eq!(h, Hash256::default());
    }

    #[test]
    fn hash256_display_hex() {
        let h = Hash256([0xAB; 32]);
        let s = format!("{h}");
        assert_eq!(s.len(), 64);
        assert_eq!(&s[0..2], "ab");
    }

    // --- OutPoint ---

    #[test]
    fn outpoint_null_detection() {
        assert!(OutPoint::null().is_null());
    }

    // --- Transaction classification ---

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn coinstake_detection() {
        assert!(sample_coinstake().is_coinstake());
        assert!(!sample_tx().is_coinstake());
        assert!(!sample_coinbase().is_coinstake());
    }

    #[test]
    fn coinbase_and_coinstake_mutually_exclusive() {
        let cb = sample_coinbase();
        assert!(cb.is_coinbase() != cb.is_coinstake() || !cb.is_coinstake());
        assert!(!(cb.is_coinbase() && cb.is_coinstake()));
    }

    #[test]
    fn total_output_value_overflow_returns_none() {
        let tx = Transaction {
            version: 1,
            time: 0,
            inputs: vec![],
            outputs: vec![
                TxOutput { value: u64::MAX, pubkey_hash: Hash256::ZERO, op_return: vec![] },
                TxOutput { value: 1, pubkey_hash: Hash256::ZERO, op_return: vec![] },
            ],
            lock_time: 0,
        };
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn txid_changes_with_time() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        tx2.time += 1;
        assert_ne!(tx1.txid().unwrap(), tx2.txid().unwrap());
    }

    // --- BlockHeader ---

    #[test]
    fn block_header_hash_deterministic() {
        let h = sample_header();
        assert_eq!(h.hash(), h.hash());
    }

    #[test]
    fn block_header_target_decodes() {
        let h = sample_header();
        assert!(h.target() > U256::ZERO);
    }

    // --- Block ---

    #[test]
    fn block_pow_has_no_coinstake() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase()],
            signature: vec![],
        };
        assert!(!block.is_proof_of_stake());
    }

    #[test]
    fn block_pos_has_coinstake() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase(), sample_coinstake()],
            signature: vec![0xAB; 64],
        };
        assert!(block.is_proof_of_stake());
        assert!(block.coinstake().is_some());
    }

    // --- UtxoEntry ---

    #[test]
    fn utxo_coinbase_not_mature_early() {
        let entry = UtxoEntry {
            output: sample_output(50 * COIN),
            block_height: 100,
            block_time: 1_700_000_000,
            is_coinbase: true,
            is_coinstake: false,
        };
        assert!(!entry.is_mature(150));
        assert!(entry.is_mature(200));
    }

    #[test]
    fn utxo_coin_age_caps_nothing_itself() {
        let entry = UtxoEntry {
            output: sample_output(50 * COIN),
            block_height: 100,
            block_time: 1_000,
            is_coinbase: false,
            is_coinstake: false,
        };
        assert_eq!(entry.coin_age_seconds(1_100), 100);
    }

    // --- Bincode round-trips ---

    #[test]
    fn bincode_round_trip_transaction() {
        let tx = sample_tx();
        let encoded = bincode::encode_to_vec(&tx, bincode::config::standard()).unwrap();
        let (decoded, _): (Transaction, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn bincode_round_trip_block_header() {
        let header = sample_header();
        let encoded = bincode::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let (decoded, _): (BlockHeader, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn bincode_round_trip_block() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase(), sample_tx()],
            signature: vec![],
        };
        let encoded = bincode::encode_to_vec(&block, bincode::config::standard()).unwrap();
        let (decoded, _): (Block, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(block, decoded);
    }
}
