//! End-to-end integration tests for Meridian.
//!
//! Each test boots a full node (without networking), mines blocks, and
//! verifies the complete lifecycle including chain state, UTXO set,
//! coinbase maturity, difficulty adjustment, and transaction propagation
//! through the mempool.

use std::sync::Arc;

use meridian_core::constants::*;
use meridian_core::genesis;
use meridian_core::types::*;
use meridian_node_lib::config::NodeConfig;
use meridian_node_lib::node::Node;
use meridian_tests::helpers::*;

/// Create a test node backed by a temp directory, without P2P networking.
fn test_node() -> (Arc<Node>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    let node = Node::without_network(config).unwrap();
    (node, dir)
}

/// Try nonces until the header hash satisfies its own target.
fn mine_header(block: &mut Block) {
    let target = block.header.target();
    loop {
        if block.header.hash().as_u256() <= target {
            return;
        }
        block.header.nonce += 1;
    }
}

/// Mine the next block on a node using a unique miner address derived from
/// the current chain height. This avoids coinbase txid collisions when the
/// same reward and pubkey_hash would otherwise repeat.
fn mine_next_block(node: &Node) -> Block {
    let (height, tip_hash) = node.chain_tip().unwrap();
    let tip_header = node.get_block_header(&tip_hash).unwrap().unwrap();
    let next_ts = tip_header.timestamp + TARGET_SPACING as u32;

    let miner_seed = ((height + 1) & 0xFF) as u8;
    let mut block = node
        .create_block_template(&pkh(miner_seed), next_ts)
        .unwrap();
    mine_header(&mut block);
    block
}

/// Mine the next block using a specific miner pubkey hash.
fn mine_next_block_to(node: &Node, miner: &Hash256) -> Block {
    let (_height, tip_hash) = node.chain_tip().unwrap();
    let tip_header = node.get_block_header(&tip_hash).unwrap().unwrap();
    let next_ts = tip_header.timestamp + TARGET_SPACING as u32;

    let mut block = node.create_block_template(miner, next_ts).unwrap();
    mine_header(&mut block);
    block
}

#[test]
fn e2e_mine_five_blocks() {
    let (node, _dir) = test_node();

    for _ in 0..5 {
        let block = mine_next_block(&node);
        node.process_block(block, 0).unwrap();
    }

    let (height, _) = node.chain_tip().unwrap();
    assert_eq!(height, 5, "chain tip should be at height 5");

    let supply = node.circulating_supply().unwrap();
    assert!(
        supply > 0,
        "circulating supply should be positive after mining"
    );

    // Genesis coinbase + 5 mined coinbases (each with a unique pkh).
    let utxos = node.iter_utxos().unwrap();
    assert_eq!(
        utxos.len(),
        6,
        "should have 6 UTXOs (genesis + 5 mined), got {}",
        utxos.len()
    );
}

#[test]
fn e2e_coinbase_maturity_tracking() {
    let (node, _dir) = test_node();

    let miner = pkh(0xBB);

    let block1 = mine_next_block_to(&node, &miner);
    let coinbase_txid = block1.transactions[0].txid().unwrap();
    node.process_block(block1, 0).unwrap();

    let outpoint = OutPoint {
        txid: coinbase_txid,
        index: 0,
    };

    let utxos = node.iter_utxos().unwrap();
    let entry = utxos
        .iter()
        .find(|(op, _)| *op == outpoint)
        .map(|(_, e)| e.clone())
        .expect("coinbase UTXO should exist at height 1");

    assert!(entry.is_coinbase, "should be flagged as coinbase");
    assert_eq!(entry.block_height, 1, "block_height should be 1");

    assert!(
        !entry.is_mature(1),
        "coinbase should NOT be mature at height 1"
    );
    assert!(
        entry.is_mature(1 + COINBASE_MATURITY),
        "coinbase should be mature at height {}",
        1 + COINBASE_MATURITY
    );

    for _ in 0..COINBASE_MATURITY {
        let block = mine_next_block(&node);
        node.process_block(block, 0).unwrap();
    }

    let (height, _) = node.chain_tip().unwrap();
    assert_eq!(height, COINBASE_MATURITY + 1);

    let utxos = node.iter_utxos().unwrap();
    let entry = utxos
        .iter()
        .find(|(op, _)| *op == outpoint)
        .map(|(_, e)| e.clone())
        .expect("coinbase UTXO should still exist");
    assert!(
        entry.is_mature(height),
        "coinbase should be mature at height {}",
        height
    );
}

#[test]
fn e2e_many_blocks_accepted() {
    let (node, _dir) = test_node();

    let target_blocks = 20u64;
    for _ in 0..target_blocks {
        let block = mine_next_block(&node);
        node.process_block(block, 0).unwrap();
    }

    let (height, _) = node.chain_tip().unwrap();
    assert_eq!(
        height, target_blocks,
        "all {} blocks should be accepted",
        target_blocks
    );
}

#[test]
fn e2e_invalid_block_rejected() {
    let (node, _dir) = test_node();

    let (initial_height, initial_hash) = node.chain_tip().unwrap();
    assert_eq!(initial_height, 0);

    // Block with no transactions (no coinbase) is structurally invalid.
    let block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash: genesis::genesis_hash(),
            merkle_root: Hash256::ZERO,
            timestamp: genesis::GENESIS_TIMESTAMP + TARGET_SPACING as u32,
            bits: U256::MAX.to_compact(),
            nonce: 0,
        },
        transactions: vec![],
        signature: vec![],
    };
    assert!(node.process_block(block, 0).is_err());

    let (height, hash) = node.chain_tip().unwrap();
    assert_eq!(height, initial_height);
    assert_eq!(hash, initial_hash);
}

#[test]
fn e2e_supply_increases_monotonically() {
    let (node, _dir) = test_node();

    let mut prev_supply = node.circulating_supply().unwrap();

    for _ in 0..5 {
        let block = mine_next_block(&node);
        node.process_block(block, 0).unwrap();
        let supply = node.circulating_supply().unwrap();
        assert!(
            supply > prev_supply,
            "supply should increase: was {}, now {}",
            prev_supply,
            supply
        );
        prev_supply = supply;
    }
}

#[test]
fn e2e_block_retrieval_by_hash() {
    let (node, _dir) = test_node();

    let block = mine_next_block(&node);
    let hash = block.header.hash();
    node.process_block(block.clone(), 0).unwrap();

    let retrieved_block = node.get_block(&hash).unwrap();
    assert!(retrieved_block.is_some(), "block should be retrievable");
    assert_eq!(retrieved_block.unwrap(), block);

    let retrieved_header = node.get_block_header(&hash).unwrap();
    assert!(retrieved_header.is_some(), "header should be retrievable");
    assert_eq!(retrieved_header.unwrap(), block.header);
}

#[test]
fn e2e_block_hash_by_height() {
    let (node, _dir) = test_node();

    let hash0 = node.get_block_hash(0).unwrap().unwrap();
    assert_eq!(hash0, genesis::genesis_hash());

    let block1 = mine_next_block(&node);
    let expected_hash1 = block1.header.hash();
    node.process_block(block1, 0).unwrap();

    let hash1 = node.get_block_hash(1).unwrap().unwrap();
    assert_eq!(hash1, expected_hash1);

    assert!(node.get_block_hash(999).unwrap().is_none());
}

#[test]
fn e2e_mempool_empty_after_mining() {
    let (node, _dir) = test_node();

    for _ in 0..3 {
        let block = mine_next_block(&node);
        node.process_block(block, 0).unwrap();
    }

    let (count, bytes, fees) = node.mempool_info();
    assert_eq!(count, 0, "mempool should be empty");
    assert_eq!(bytes, 0);
    assert_eq!(fees, 0);
}

#[test]
fn e2e_no_peers_without_network() {
    let (node, _dir) = test_node();
    assert_eq!(node.peer_count(), 0);
}

#[test]
fn e2e_utxo_query_by_address() {
    let (node, _dir) = test_node();

    let miner = pkh(0xBB);

    let block = mine_next_block_to(&node, &miner);
    node.process_block(block, 0).unwrap();

    let utxos = node.get_utxos_by_address(&miner).unwrap();
    assert_eq!(
        utxos.len(),
        1,
        "miner should have 1 coinbase UTXO, got {}",
        utxos.len()
    );

    let (_op, entry) = &utxos[0];
    assert!(entry.is_coinbase);
    assert_eq!(entry.output.pubkey_hash, miner);
    assert!(entry.output.value > 0);
}

#[test]
fn e2e_chain_tip_consistency() {
    let (node, _dir) = test_node();

    let mut last_block_hash = genesis::genesis_hash();

    for i in 1..=5u64 {
        let block = mine_next_block(&node);
        let hash = block.header.hash();
        node.process_block(block, 0).unwrap();

        let (height, tip_hash) = node.chain_tip().unwrap();
        assert_eq!(height, i);
        assert_eq!(tip_hash, hash);

        last_block_hash = hash;
    }

    let (_, final_hash) = node.chain_tip().unwrap();
    assert_eq!(final_hash, last_block_hash);
}

#[test]
fn e2e_transaction_submission_spends_mature_coinbase() {
    let (node, _dir) = test_node();
    let miner = pkh(0xCC);

    let mut blocks = Vec::new();
    for _ in 0..=COINBASE_MATURITY {
        let block = mine_next_block_to(&node, &miner);
        node.process_block(block.clone(), 0).unwrap();
        blocks.push(block);
    }

    let (height, _) = node.chain_tip().unwrap();
    let utxos = node.get_utxos_by_address(&miner).unwrap();
    let (outpoint, entry) = utxos
        .iter()
        .find(|(_, e)| e.is_coinbase && e.is_mature(height))
        .expect("should have at least one mature coinbase UTXO");

    let recipient = pkh(0xDD);
    let spend_value = entry.output.value - min_relay_fee_for(200);
    let tx = make_tx(vec![outpoint.clone()], vec![(spend_value, recipient)]);

    let encoded = bincode::encode_to_vec(&tx, bincode::config::standard())
        .expect("serialization should succeed");
    let (decoded, _): (Transaction, _) =
        bincode::decode_from_slice(&encoded, bincode::config::standard())
            .expect("deserialization should succeed");
    assert_eq!(decoded.txid().unwrap(), tx.txid().unwrap());

    let txid = node.process_transaction(decoded, 0).unwrap();
    assert!(node.get_mempool_tx(&txid).is_some());
}

/// Conservative fee estimate (matches `mempool::min_relay_fee`'s per-KB rule
/// without depending on its private rounding).
fn min_relay_fee_for(size_bytes: u64) -> u64 {
    let kb = size_bytes.div_ceil(1000).max(1);
    kb * MIN_RELAY_FEE_PER_KB
}

#[test]
fn e2e_coinbase_txid_varies_with_height() {
    let (node, _dir) = test_node();
    let miner = pkh(0xAA);

    let mut txids = Vec::new();
    for _ in 0..3 {
        let block = mine_next_block_to(&node, &miner);
        txids.push(block.transactions[0].txid().unwrap());
        node.process_block(block, 0).unwrap();
    }

    // lock_time carries the height, so every coinbase txid is distinct even
    // when mined to the same address.
    assert_ne!(txids[0], txids[1]);
    assert_ne!(txids[1], txids[2]);

    let utxos = node.get_utxos_by_address(&miner).unwrap();
    assert_eq!(utxos.len(), 3, "all three coinbase UTXOs should survive");
}
