//! Genesis block definition for the Meridian network.
//!
//! The genesis block is the first block in the chain (height 0): a single
//! zero-value coinbase carrying a launch message, mined at the PoW limit
//! target so every node can reproduce it without search.

use std::sync::LazyLock;

use crate::merkle;
use crate::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput, U256};

/// Genesis block timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u32 = 1_767_225_600;

/// Message embedded in the genesis coinbase (like Bitcoin's "The Times" headline).
pub const GENESIS_MESSAGE: &[u8] = b"Meridian genesis: a ledger with two ways to earn trust.";

/// Cached genesis data, computed once on first access.
struct GenesisData {
    block: Block,
    hash: Hash256,
    coinbase_txid: Hash256,
}

static GENESIS: LazyLock<GenesisData> = LazyLock::new(build_genesis);

fn build_genesis() -> GenesisData {
    let coinbase = build_genesis_coinbase();
    let coinbase_txid = coinbase
        .txid()
        .expect("genesis coinbase is hardcoded valid data");
    let mr = merkle::merkle_root(&[coinbase_txid]);

    let block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: mr,
            timestamp: GENESIS_TIMESTAMP,
            bits: U256::MAX.to_compact(),
            nonce: 0,
        },
        transactions: vec![coinbase],
        signature: vec![],
    };
    let hash = block.header.hash();

    GenesisData { block, hash, coinbase_txid }
}

/// The genesis coinbase carries the launch message and pays nothing: the
/// chain has no premine, so all supply is either PoW subsidy or PoS
/// coin-age reward issued after height 0.
fn build_genesis_coinbase() -> Transaction {
    Transaction {
        version: 1,
        time: GENESIS_TIMESTAMP,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: GENESIS_MESSAGE.to_vec(),
            public_key: vec![],
            sequence: u32::MAX,
        }],
        outputs: vec![TxOutput { value: 0, pubkey_hash: Hash256::ZERO, op_return: vec![] }],
        lock_time: 0,
    }
}

/// The genesis block (height 0).
pub fn genesis_block() -> &'static Block {
    &GENESIS.block
}

/// The genesis block header hash.
pub fn genesis_hash() -> Hash256 {
    GENESIS.hash
}

/// The transaction ID of the genesis coinbase.
pub fn genesis_coinbase_txid() -> Hash256 {
    GENESIS.coinbase_txid
}

/// Check whether a block is the genesis block by comparing header hashes.
pub fn is_genesis(block: &Block) -> bool {
    block.header.hash() == GENESIS.hash
}
