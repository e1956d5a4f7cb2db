//! Adversarial property-based test suite for Meridian.
//!
//! These tests attempt to break protocol invariants under randomized inputs.
//! Each property test uses at least 256 cases with proptest shrinking to
//! produce minimal failing examples.
//!
//! Attack vectors tested:
//! - Timestamp manipulation (future/past blocks)
//! - Transaction value overflow
//! - UTXO set consistency across connect/disconnect cycles
//! - Supply monotonicity (coins cannot appear from nothing)
//! - Coinbase inflation (reward cap enforcement)
//! - Mempool double-insert / idempotency
//! - Difficulty retarget bounds under adversarial timing
//! - UTXO count bookkeeping accuracy
//! - Merkle root and block hash determinism
//! - Reward halving correctness

use meridian_core::block_validation::{self, BlockContext};
use meridian_core::chain_state::{ChainStore, MemoryChainStore};
use meridian_core::constants::*;
use meridian_core::crypto::{self, KeyPair};
use meridian_core::difficulty::{self, RetargetInputs};
use meridian_core::error::{BlockError, MempoolError};
use meridian_core::mempool::Mempool;
use meridian_core::merkle;
use meridian_core::ntp1::SymbolRegistry;
use meridian_core::reward;
use meridian_core::types::*;
use proptest::prelude::*;

fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// Coinbase with a unique `lock_time` so distinct heights never collide.
fn make_coinbase(value: u64, pubkey_hash: Hash256, height: u64) -> Transaction {
    Transaction {
        version: 1,
        time: 0,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: height.to_le_bytes().to_vec(),
            public_key: vec![],
            sequence: 0,
        }],
        outputs: vec![TxOutput {
            value,
            pubkey_hash,
            op_return: vec![],
        }],
        lock_time: height,
    }
}

fn make_block(prev_hash: Hash256, timestamp: u32, txs: Vec<Transaction>) -> Block {
    let txids: Vec<Hash256> = txs.iter().map(|tx| tx.txid().unwrap()).collect();
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: merkle::merkle_root(&txids),
            timestamp,
            bits: U256::MAX.to_compact(),
            nonce: 0,
        },
        transactions: txs,
        signature: vec![],
    }
}

// ---------------------------------------------------------------------------
// Test 1: fuzz_block_header_timestamp
//
// Attack vector: an adversary submits blocks with manipulated timestamps to
// exploit difficulty adjustment or cause chain splits. Timestamps at or
// before the median-time-past, or too far beyond current time, must be
// rejected by `validate_block`.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fuzz_block_header_timestamp(
        mtp in 1_000_000u32..2_000_000_000u32,
        offset in -1000i64..=1000i64,
    ) {
        let current_time = mtp.saturating_add(TARGET_SPACING as u32);
        let block_ts = (mtp as i64 + offset).clamp(0, u32::MAX as i64) as u32;

        let cb = make_coinbase(INITIAL_SUBSIDY, pkh(0xAA), 1);
        let block = make_block(Hash256([0x11; 32]), block_ts, vec![cb]);

        let context = BlockContext {
            height: 1,
            prev_hash: Hash256([0x11; 32]),
            median_time_past: mtp,
            current_time,
            target: U256::MAX,
            stake_modifier: 0,
        };

        let result = block_validation::validate_block(
            &block,
            &context,
            |_| None,
            |_| false,
        );

        let max_time = (current_time as i64).saturating_add(FUTURE_DRIFT);
        let should_be_valid = (block_ts as i64) > (mtp as i64) && (block_ts as i64) <= max_time;

        prop_assert_eq!(
            result.is_ok(), should_be_valid,
            "timestamp {} (mtp={}, max={}) validity mismatch: {:?}",
            block_ts, mtp, max_time, result
        );
    }
}

// ---------------------------------------------------------------------------
// Test 2: fuzz_transaction_output_overflow
//
// Attack vector: an adversary constructs outputs summing past u64::MAX to
// wrap circulating supply. `total_output_value` must use checked arithmetic
// and report `None` rather than silently wrapping.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fuzz_transaction_output_overflow(
        values in prop::collection::vec(0u64..=MAX_MONEY, 1..=5),
    ) {
        let tx = Transaction {
            version: 1,
            time: 0,
            inputs: vec![TxInput {
                previous_output: OutPoint { txid: Hash256([0x11; 32]), index: 0 },
                signature: vec![0; 64],
                public_key: vec![0; 32],
                sequence: 0,
            }],
            outputs: values
                .iter()
                .map(|&v| TxOutput { value: v, pubkey_hash: pkh(0xBB), op_return: vec![] })
                .collect(),
            lock_time: 0,
        };

        let total = tx.total_output_value();
        let manual_sum: Option<u64> = values.iter().try_fold(0u64, |acc, &v| acc.checked_add(v));
        prop_assert_eq!(total, manual_sum, "total_output_value mismatch for values {:?}", values);
    }
}

// ---------------------------------------------------------------------------
// Test 3: connect_disconnect_roundtrip
//
// Attack vector: an adversary triggers chain reorganizations by connecting
// and disconnecting blocks. The UTXO set must return to its initial state
// after a full disconnect cycle.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn connect_disconnect_roundtrip(num_blocks in 1u64..=10) {
        let mut store = MemoryChainStore::new();

        let initial_utxo_count = store.utxo_count();
        let initial_tip = store.chain_tip().unwrap();
        prop_assert_eq!(initial_utxo_count, 0);
        prop_assert_eq!(initial_tip, (0, Hash256::ZERO));

        let mut prev_hash = Hash256::ZERO;
        let base_ts = 1_000_000u32;
        for h in 0..num_blocks {
            let cb = make_coinbase(50 * COIN, pkh(h as u8), h);
            let block = make_block(prev_hash, base_ts + (h as u32) * 60, vec![cb]);
            prev_hash = block.header.hash();
            let result = store.connect_block(&block, h);
            prop_assert!(result.is_ok(), "connect_block failed at height {}: {:?}", h, result);
        }

        prop_assert_eq!(
            store.utxo_count(), num_blocks as usize,
            "UTXO count after connecting {} blocks", num_blocks
        );

        for _ in 0..num_blocks {
            let result = store.disconnect_tip();
            prop_assert!(result.is_ok(), "disconnect_tip failed: {:?}", result);
        }

        prop_assert_eq!(
            store.utxo_count(), initial_utxo_count,
            "UTXO count not restored after disconnect cycle"
        );
        prop_assert_eq!(
            store.chain_tip().unwrap(), initial_tip,
            "chain tip not restored after disconnect cycle"
        );
        prop_assert!(store.is_empty(), "store should be empty after full disconnect");
    }
}

// ---------------------------------------------------------------------------
// Test 4: supply_monotonicity
//
// Attack vector: an adversary attempts to create a chain that decreases
// circulating supply. Tracking claimed coinbase value manually (since
// MemoryChainStore has no supply counter of its own), the running total
// must never decrease as blocks connect.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn supply_monotonicity(num_blocks in 1u64..=20, reward_fraction in 1u64..=100) {
        let mut store = MemoryChainStore::new();
        let mut prev_hash = Hash256::ZERO;
        let base_ts = 1_000_000u32;
        let mut cumulative_supply: u64 = 0;

        for h in 0..num_blocks {
            let full_reward = reward::pow_subsidy(h);
            let claimed = if full_reward == 0 {
                0
            } else {
                (full_reward / 100).max(1) * reward_fraction.min(100)
            };
            if claimed == 0 {
                continue;
            }

            let cb = make_coinbase(claimed, pkh(h as u8), h);
            let block = make_block(prev_hash, base_ts + (h as u32) * 60, vec![cb]);
            prev_hash = block.header.hash();

            let prev_supply = cumulative_supply;
            store.connect_block(&block, h).unwrap();
            cumulative_supply += claimed;

            prop_assert!(
                cumulative_supply >= prev_supply,
                "supply decreased from {} to {} at height {}",
                prev_supply, cumulative_supply, h
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Test 5: coinbase_value_cap
//
// Attack vector: a miner creates a coinbase transaction claiming more than
// the allowed PoW subsidy plus fees. `validate_block` must reject the block
// with `InvalidReward`.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn coinbase_value_cap(height in 1u64..=10_000_000, excess in 1u64..=1_000_000) {
        let expected_reward = reward::pow_subsidy(height);
        let claimed = expected_reward.saturating_add(excess);
        if claimed <= expected_reward {
            return Ok(());
        }

        let cb = make_coinbase(claimed, pkh(0xAA), height);
        let block = make_block(Hash256([0x11; 32]), 1_000_001 + (height as u32 % 1000) * 60, vec![cb]);

        let context = BlockContext {
            height,
            prev_hash: Hash256([0x11; 32]),
            median_time_past: 1_000_000,
            current_time: block.header.timestamp + TARGET_SPACING as u32,
            target: U256::MAX,
            stake_modifier: 0,
        };

        let result = block_validation::validate_block(&block, &context, |_| None, |_| false);

        prop_assert!(
            matches!(result, Err(BlockError::InvalidReward { .. })),
            "block with excess coinbase {} at height {} should be rejected, got: {:?}",
            claimed, height, result
        );
    }
}

// ---------------------------------------------------------------------------
// Test 6: mempool_idempotency
//
// Attack vector: a node receives the same transaction from multiple peers.
// Re-inserting a duplicate must not corrupt mempool state; it must be
// rejected with `AlreadyExists` and leave the pool unchanged.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn mempool_idempotency(seed in 1u8..=254, spend_fraction in 1u64..=99) {
        let spender = KeyPair::from_secret_bytes([seed; 32]);
        let source_outpoint = OutPoint { txid: Hash256([seed; 32]), index: 0 };
        let input_value = 50 * COIN;
        let spend_value = (input_value * spend_fraction) / 100;

        let mut tx = Transaction {
            version: 1,
            time: 0,
            inputs: vec![TxInput {
                previous_output: source_outpoint.clone(),
                signature: vec![],
                public_key: vec![],
                sequence: 0,
            }],
            outputs: vec![TxOutput { value: spend_value, pubkey_hash: Hash256::ZERO, op_return: vec![] }],
            lock_time: 0,
        };
        crypto::sign_transaction_input(&mut tx, 0, &spender).unwrap();

        let utxo = UtxoEntry {
            output: TxOutput { value: input_value, pubkey_hash: spender.public_key().pubkey_hash(), op_return: vec![] },
            block_height: 0,
            block_time: 0,
            is_coinbase: false,
            is_coinstake: false,
        };

        let registry = SymbolRegistry::new();
        let mut pool = Mempool::new(100, 1_000_000);

        let txid = pool
            .accept(tx.clone(), 1, 1_000, |_| Some(utxo.clone()), |_| false, &registry, false, true)
            .unwrap();
        let count_after_first = pool.len();
        let bytes_after_first = pool.total_bytes();
        let fees_after_first = pool.total_fees();

        let result = pool.accept(tx, 1, 1_000, |_| Some(utxo.clone()), |_| false, &registry, false, true);
        prop_assert!(
            matches!(result, Err(MempoolError::AlreadyExists(_))),
            "duplicate insert should return AlreadyExists, got: {:?}", result
        );

        prop_assert_eq!(pool.len(), count_after_first, "pool length changed after duplicate");
        prop_assert_eq!(pool.total_bytes(), bytes_after_first, "pool bytes changed after duplicate");
        prop_assert_eq!(pool.total_fees(), fees_after_first, "pool fees changed after duplicate");
        prop_assert!(pool.contains(&txid), "original tx missing after duplicate rejection");
    }
}

// ---------------------------------------------------------------------------
// Test 7: difficulty_retarget_bounds
//
// Attack vector: a miner manipulates block timestamps to drive the retarget
// window outside sane bounds. `retarget_v3`'s output must stay clamped to
// `[limit/4, limit]` through `clamp_to_limit`, regardless of adversarial
// timestamp spacing.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn difficulty_retarget_bounds(
        old_target_raw in 1u64..=u64::MAX,
        start_ts in 1_000_000i64..2_000_000_000i64,
        interval in 0i64..=600i64,
        num_entries in 2usize..=61,
    ) {
        let old_target = U256::from_u64(old_target_raw);
        let limit = U256::from_u64(u64::MAX);
        let timestamps: Vec<i64> = (0..num_entries)
            .map(|i| start_ts + (i as i64) * interval)
            .collect();

        let new_target = difficulty::next_target(
            200,
            true,
            RetargetInputs::Windowed(&timestamps),
            old_target,
            limit,
        );

        prop_assert!(new_target <= limit, "target {:?} exceeds limit {:?}", new_target, limit);
    }
}

// ---------------------------------------------------------------------------
// Test 8: utxo_count_consistency
//
// Attack vector: a subtle bug in UTXO bookkeeping could allow an attacker to
// create phantom UTXOs or hide spent ones. After connecting a block, the
// UTXO count delta must equal `utxos_created - utxos_spent` as reported by
// `ConnectBlockResult`.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn utxo_count_consistency(num_extra_blocks in 0u64..=5, num_outputs_per_coinbase in 1usize..=3) {
        let mut store = MemoryChainStore::new();
        let base_ts = 1_000_000u32;
        let value_per_output = 50 * COIN / (num_outputs_per_coinbase as u64);
        if value_per_output == 0 {
            return Ok(());
        }

        let mut prev_hash = Hash256::ZERO;

        for h in 0..=num_extra_blocks {
            let outputs: Vec<TxOutput> = (0..num_outputs_per_coinbase)
                .map(|i| TxOutput {
                    value: value_per_output,
                    pubkey_hash: pkh((h as u8).wrapping_add(i as u8)),
                    op_return: vec![],
                })
                .collect();

            let cb = Transaction {
                version: 1,
                time: 0,
                inputs: vec![TxInput {
                    previous_output: OutPoint::null(),
                    signature: h.to_le_bytes().to_vec(),
                    public_key: vec![],
                    sequence: 0,
                }],
                outputs,
                lock_time: h,
            };

            let block = make_block(prev_hash, base_ts + (h as u32) * 60, vec![cb]);

            let utxo_count_before = store.utxo_count();
            let result = store.connect_block(&block, h).unwrap();
            let utxo_count_after = store.utxo_count();

            let expected_delta = result.utxos_created as isize - result.utxos_spent as isize;
            let actual_delta = utxo_count_after as isize - utxo_count_before as isize;

            prop_assert_eq!(
                actual_delta, expected_delta,
                "UTXO count delta mismatch at height {}: expected {} (created={}, spent={}), got {}",
                h, expected_delta, result.utxos_created, result.utxos_spent, actual_delta
            );

            prev_hash = block.header.hash();
        }
    }
}

// ---------------------------------------------------------------------------
// Test 9: merkle_root_determinism
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merkle_root_determinism(num_txids in 1usize..=20, seed in 0u8..=255) {
        let txids: Vec<Hash256> = (0..num_txids)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0] = seed;
                bytes[1] = i as u8;
                bytes[2] = (i >> 8) as u8;
                Hash256(bytes)
            })
            .collect();

        let root1 = merkle::merkle_root(&txids);
        let root2 = merkle::merkle_root(&txids);

        prop_assert_eq!(root1, root2, "merkle root not deterministic");
        prop_assert!(!root1.is_zero(), "merkle root of non-empty leaves should not be zero");
    }
}

// ---------------------------------------------------------------------------
// Test 10: block_hash_determinism
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn block_hash_determinism(
        version in 0u64..=10,
        timestamp in 0u32..=u32::MAX,
        nonce in 0u64..=u64::MAX,
        bits in 0u32..=u32::MAX,
    ) {
        let header = BlockHeader {
            version,
            prev_hash: Hash256([0x11; 32]),
            merkle_root: Hash256([0x22; 32]),
            timestamp,
            bits,
            nonce,
        };

        let hash1 = header.hash();
        let hash2 = header.hash();

        prop_assert_eq!(hash1, hash2, "block header hash not deterministic");
    }
}

// ---------------------------------------------------------------------------
// Test 11: reward_halving_correctness
//
// Attack vector: a miner attempts to claim full reward past a halving
// boundary. The reward schedule must enforce correct halving at every
// interval boundary.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn reward_halving_correctness(height in 0u64..=34 * SUBSIDY_HALVING_INTERVAL) {
        let r = reward::pow_subsidy(height);
        let epoch = height / SUBSIDY_HALVING_INTERVAL;

        if epoch >= 64 {
            prop_assert_eq!(r, 0, "reward should be 0 at epoch {}", epoch);
        } else {
            let expected = INITIAL_SUBSIDY >> epoch;
            prop_assert_eq!(
                r, expected,
                "reward mismatch at height {} (epoch {}): got {}, expected {}",
                height, epoch, r, expected
            );
        }

        prop_assert!(r <= INITIAL_SUBSIDY, "reward {} exceeds INITIAL_SUBSIDY", r);
    }
}
