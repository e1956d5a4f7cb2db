//! The block Acceptor: validates and connects incoming blocks, manages the
//! orphan pools, and drives chain reorganization.
//!
//! A [`ConsensusEngine`] owns the in-memory [`BlockIndex`] tree alongside a
//! [`ChainStore`] that materializes only the currently-active chain's UTXO
//! set and block bodies. Side-branch block bodies are cached separately in
//! `bodies` so that a later reorg can replay them; a side branch receives
//! only structural validation on arrival; the connect step replays full
//! contextual validation against the evolving UTXO set the moment a branch
//! is promoted to best chain.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use meridian_core::block_validation::{self, BlockContext};
use meridian_core::chain_state::{BlockIndex, ChainStore};
use meridian_core::constants::{
    DOS_SCORE_CONSENSUS, DOS_SCORE_RECENT_CONSENSUS, FUTURE_DRIFT, MAX_ORPHAN_BLOCKS,
    MAX_ORPHAN_TRANSACTIONS, MAX_ORPHAN_TX_SIZE, TARGET_AVERAGE_BLOCK_COUNT,
};
use meridian_core::error::{BlockError, ChainStateError, KernelError, MeridianError};
use meridian_core::forks::NetForks;
use meridian_core::genesis;
use meridian_core::kernel::{self, SeenStakes};
use meridian_core::mempool::Mempool;
use meridian_core::ntp1::{self, SymbolRegistry};
use meridian_core::reward;
use meridian_core::types::{Block, BlockHeader, BlockIndexNode, Hash256, OutPoint, Transaction, TxInput, TxOutput, U256};

use crate::checkpoint;
use crate::orphan::{OrphanBlockPool, OrphanTxPool};

/// Number of buffered events a lagging subscriber may fall behind by before
/// it starts missing notifications.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of [`ConsensusEngine::accept_block`] on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The block's hash was already known; nothing changed.
    Duplicate,
    /// The block's parent is unknown; it was parked awaiting the parent.
    Orphan,
    /// The block extended a chain that did not overtake the best tip.
    SideBranch { hash: Hash256, height: u64 },
    /// The block became (part of) the new best chain.
    Connected { hash: Hash256, height: u64, disconnected: usize, connected: usize },
}

/// Chain-state change notifications, broadcast in the order described by
/// the concurrency model: every disconnect (newest block first) before any
/// connect (oldest block first), ending with the new tip.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    BlockDisconnected(Arc<Block>),
    BlockConnected(Arc<Block>),
    NewTip { hash: Hash256, height: u64 },
}

/// A block the Acceptor refused, carrying enough information for the
/// network layer to decide whether to penalize the peer that sent it.
#[derive(Debug, Clone)]
pub struct RejectedBlock {
    pub hash: Hash256,
    pub error: String,
    pub dos_score: Option<u32>,
}

impl std::fmt::Display for RejectedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {} rejected: {}", self.hash, self.error)
    }
}

/// Validates and connects blocks against an in-memory index and a
/// [`ChainStore`], implementing the block-acceptance procedure: duplicate
/// and duplicate-stake rejection, orphan parking, context-dependent header
/// checks, chain-trust comparison, and reorg.
pub struct ConsensusEngine<S: ChainStore> {
    index: BlockIndex,
    store: S,
    /// Bodies of every known, non-orphan block — including side branches
    /// the `ChainStore` doesn't materialize — so a reorg can replay them.
    bodies: HashMap<Hash256, Block>,
    orphan_blocks: OrphanBlockPool,
    orphan_txs: OrphanTxPool,
    seen_stakes: SeenStakes,
    ntp1_registry: SymbolRegistry,
    forks: NetForks,
    mempool: Mempool,
    events: broadcast::Sender<ChainEvent>,
}

impl<S: ChainStore> ConsensusEngine<S> {
    /// Build a new engine, connecting genesis to `store` if it is empty.
    pub fn new(mut store: S, forks: NetForks) -> Result<Self, MeridianError> {
        let genesis_block = genesis::genesis_block().clone();
        let genesis_hash = genesis::genesis_hash();

        if store.is_empty() {
            store.connect_block(&genesis_block, 0)?;
        }

        let mut index = BlockIndex::new();
        let genesis_node = BlockIndexNode {
            hash: genesis_hash,
            height: 0,
            prev_hash: None,
            next_hash: None,
            chain_trust: genesis_block.header.target().chain_work(),
            mint: 0,
            money_supply: 0,
            is_proof_of_stake: false,
            stake_entropy_bit: false,
            stake_modifier: 0,
            stake_modifier_checksum: kernel::stake_modifier_checksum(0),
            stake_modifier_generated: false,
            stake_prevout: None,
            stake_time: 0,
            hash_of_proof: genesis_hash,
            header: genesis_block.header.clone(),
        };
        index.insert_or_get(genesis_node);
        index.set_best_tip(genesis_hash)?;

        let mut bodies = HashMap::new();
        bodies.insert(genesis_hash, genesis_block);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            index,
            store,
            bodies,
            orphan_blocks: OrphanBlockPool::new(MAX_ORPHAN_BLOCKS),
            orphan_txs: OrphanTxPool::new(MAX_ORPHAN_TRANSACTIONS, MAX_ORPHAN_TX_SIZE),
            seen_stakes: SeenStakes::new(),
            ntp1_registry: SymbolRegistry::new(),
            forks,
            mempool: Mempool::with_defaults(),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    pub fn best_tip(&self) -> Option<&BlockIndexNode> {
        self.index.best_tip()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn mempool_mut(&mut self) -> &mut Mempool {
        &mut self.mempool
    }

    /// Access the underlying chain store (active-chain UTXO set and block
    /// bodies). Used by callers that need read-only chain queries beyond
    /// what the engine exposes directly (locators, address index, pruning).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn orphan_block_count(&self) -> usize {
        self.orphan_blocks.len()
    }

    pub fn orphan_tx_count(&self) -> usize {
        self.orphan_txs.len()
    }

    /// Park a loose transaction whose inputs could not be resolved. Returns
    /// `false` if it was dropped for being oversized.
    pub fn park_orphan_tx(&mut self, txid: Hash256, tx: meridian_core::types::Transaction, size: usize) -> bool {
        self.orphan_txs.insert(txid, tx, size)
    }

    /// Validate `tx` against the active chain's UTXO set and admit it to the
    /// mempool. `is_local` exempts the submission from the free-relay rate
    /// limiter (set for RPC submissions from the node's own wallet).
    pub fn submit_transaction(
        &mut self,
        tx: meridian_core::types::Transaction,
        now: u32,
        is_local: bool,
    ) -> Result<Hash256, MeridianError> {
        let (height, _) = self.store.chain_tip()?;
        let ntp1_active = self.forks.ntp1_enforced(height + 1);
        let store = &self.store;
        self.mempool
            .accept(
                tx,
                height,
                now,
                |op| store.get_utxo(op).ok().flatten(),
                |txid| store.get_utxo(&OutPoint { txid: *txid, index: 0 }).ok().flatten().is_some(),
                &self.ntp1_registry,
                ntp1_active,
                is_local,
            )
            .map_err(MeridianError::from)
    }

    /// Build a PoW block template extending the current best tip.
    ///
    /// Pays the height's subsidy plus the fees of the selected mempool
    /// transactions to `coinbase_pubkey_hash`. The caller is responsible for
    /// finding a `nonce` that satisfies the returned header's target.
    pub fn create_pow_template(
        &self,
        coinbase_pubkey_hash: Hash256,
        timestamp: u32,
    ) -> Result<Block, MeridianError> {
        let tip = self
            .index
            .best_tip()
            .ok_or(ChainStateError::EmptyChain)?
            .clone();
        let height = tip.height + 1;
        let target = self.next_required_target(&tip, false);

        let selected = self.mempool.select_transactions(meridian_core::constants::MAX_BLOCK_SIZE);
        let fees: u64 = selected.iter().map(|e| e.fee).sum();
        let subsidy = reward::pow_subsidy(height).saturating_add(fees);

        let coinbase = Transaction {
            version: 1,
            time: timestamp,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: height.to_le_bytes().to_vec(),
                public_key: vec![],
                sequence: 0,
            }],
            outputs: vec![TxOutput { value: subsidy, pubkey_hash: coinbase_pubkey_hash, op_return: vec![] }],
            lock_time: 0,
        };

        let mut transactions = vec![coinbase];
        transactions.extend(selected.into_iter().map(|entry| entry.tx.clone()));

        let txids = transactions
            .iter()
            .map(|tx| tx.txid())
            .collect::<Result<Vec<_>, _>>()?;
        let merkle_root = meridian_core::merkle::merkle_root(&txids);

        Ok(Block {
            header: BlockHeader {
                version: 1,
                prev_hash: tip.hash,
                merkle_root,
                timestamp,
                bits: target.to_compact(),
                nonce: 0,
            },
            transactions,
            signature: vec![],
        })
    }

    /// Run the block-acceptance procedure.
    ///
    /// `now` is the caller's adjusted clock, used for the future-timestamp
    /// check and recorded as the stake-seen time.
    pub fn accept_block(&mut self, block: Block, now: u32) -> Result<AcceptOutcome, RejectedBlock> {
        let hash = block.header.hash();

        // 1. Already known.
        if self.index.contains(&hash) {
            return Ok(AcceptOutcome::Duplicate);
        }

        let parent_known = self.index.contains(&block.header.prev_hash);

        // 2. Duplicate stake. The short-circuit mirrors
        // setStakeSeen/setStakeSeenOrphan: it keys off whether some
        // already-parked orphan is waiting on *this block's own hash* as
        // its parent, not on whether this block's own parent is known. A
        // block about to be orphaned itself can still have a waiting
        // orphan child, and that case must still be rejected.
        if let Some(coinstake) = block.coinstake() {
            if let Some(first_input) = coinstake.inputs.first() {
                let prevout = first_input.previous_output.clone();
                let has_waiting_orphan_child = !self.orphan_blocks.children_of(&hash).is_empty();
                if !has_waiting_orphan_child && self.seen_stakes.contains(&prevout, coinstake.time) {
                    return Err(RejectedBlock {
                        hash,
                        error: MeridianError::Kernel(KernelError::DuplicateStake {
                            outpoint: prevout.to_string(),
                            time: coinstake.time,
                        })
                        .to_string(),
                        dos_score: Some(DOS_SCORE_CONSENSUS),
                    });
                }
            }
        }

        // 2b. Side-branch anti-spam floor: a block that doesn't extend the
        // active tip (known parent or not) must carry at least as much
        // work/stake as the time elapsed since the last checkpoint demands,
        // so a peer can't flood the index with cheap side branches.
        if let Some(best) = self.index.best_tip() {
            if block.header.prev_hash != best.hash {
                let last_checkpoint_height = checkpoint::last_checkpoint_height();
                if last_checkpoint_height > 0 {
                    let checkpoint_node = self
                        .index
                        .iter_active_from_tip(best.hash)
                        .into_iter()
                        .find(|n| n.height == last_checkpoint_height);
                    if let Some(checkpoint_node) = checkpoint_node {
                        let delta_time = block.header.timestamp as i64 - checkpoint_node.header.timestamp as i64;
                        if !checkpoint::meets_minimum_required_target(checkpoint_node.header.bits, delta_time, block.header.bits) {
                            return Err(RejectedBlock {
                                hash,
                                error: MeridianError::Block(BlockError::InsufficientWorkSinceCheckpoint).to_string(),
                                dos_score: Some(DOS_SCORE_CONSENSUS),
                            });
                        }
                    }
                }
            }
        }

        // 3. Orphan: park it and wait for the ancestor.
        if !parent_known {
            debug!(%hash, prev = %block.header.prev_hash, "parking orphan block");
            self.record_seen_stake(&block);
            self.orphan_blocks.insert(hash, block);
            return Ok(AcceptOutcome::Orphan);
        }

        let outcome = self
            .accept_known_parent(block, now)
            .map_err(|e| RejectedBlock { hash, dos_score: classify_dos_score(&e), error: e.to_string() })?;

        if !matches!(outcome, AcceptOutcome::Duplicate | AcceptOutcome::Orphan) {
            self.reconsider_orphans(hash, now);
        }

        Ok(outcome)
    }

    fn record_seen_stake(&mut self, block: &Block) {
        if let Some(coinstake) = block.coinstake() {
            if let Some(first_input) = coinstake.inputs.first() {
                self.seen_stakes.insert(first_input.previous_output.clone(), coinstake.time);
            }
        }
    }

    /// Steps 4-8: context checks, tentative index node, dry-run validation,
    /// chain-trust comparison, and (if the new block wins) reorg.
    fn accept_known_parent(&mut self, block: Block, now: u32) -> Result<AcceptOutcome, MeridianError> {
        let hash = block.header.hash();
        let prev = self
            .index
            .get(&block.header.prev_hash)
            .cloned()
            .ok_or_else(|| ChainStateError::UnknownParent(block.header.prev_hash.to_string()))?;

        let is_pos = block.is_proof_of_stake();
        let height = prev.height + 1;

        // 4a. Difficulty must match what this chain expects next.
        let expected_target = self.next_required_target(&prev, is_pos);
        if !is_pos {
            let expected_bits = expected_target.to_compact();
            if block.header.bits != expected_bits {
                return Err(BlockError::InvalidDifficulty { got: block.header.bits, expected: expected_bits }.into());
            }
        }

        // 4b. Not too far in the future.
        let max_time = (now as i64).saturating_add(FUTURE_DRIFT);
        if (block.header.timestamp as i64) > max_time {
            return Err(BlockError::TimestampTooFar(block.header.timestamp as i64 - now as i64).into());
        }

        // 4c. Strictly after median-time-past, when enough ancestors exist
        // to compute one; early chain heights have no MTP constraint yet.
        if let Some(mtp) = self.index.median_time_past(prev.hash) {
            if block.header.timestamp <= mtp {
                return Err(BlockError::TimestampNotAfterMtp.into());
            }
        }

        checkpoint::check_checkpoint(height, &hash)?;

        // 5. Tentative index node.
        let chain_trust = prev.chain_trust.saturating_add(&expected_target.chain_work());
        let ancestors = self.index.iter_active_from_tip(prev.hash).into_iter().map(|n| kernel::ModifierAncestor {
            hash: n.hash,
            time: n.header.timestamp,
            stake_modifier: n.stake_modifier,
            stake_modifier_generated: n.stake_modifier_generated,
            entropy_bit: n.stake_entropy_bit,
        });
        let modifier = kernel::next_stake_modifier(block.header.timestamp, ancestors);

        let mut node = BlockIndexNode {
            hash,
            height,
            prev_hash: Some(prev.hash),
            next_hash: None,
            chain_trust,
            mint: 0,
            money_supply: 0,
            is_proof_of_stake: is_pos,
            stake_entropy_bit: block.header.nonce & 1 == 1,
            stake_modifier: modifier.stake_modifier,
            stake_modifier_checksum: kernel::stake_modifier_checksum(modifier.stake_modifier),
            stake_modifier_generated: modifier.stake_modifier_generated,
            stake_prevout: None,
            stake_time: 0,
            hash_of_proof: hash,
            header: block.header.clone(),
        };
        if let Some(coinstake) = block.coinstake() {
            if let Some(first_input) = coinstake.inputs.first() {
                node.stake_prevout = Some(first_input.previous_output.clone());
                node.stake_time = coinstake.time;
            }
        }

        // 6. Dry-run validation.
        self.validate_candidate(&block, &node, &prev, now)?;

        self.index.insert_or_get(node.clone());
        self.record_seen_stake(&block);
        self.bodies.insert(hash, block);

        // 7. Chain-trust comparison decides reorg vs. side branch.
        let best_trust = self.index.best_tip().map(|t| t.chain_trust).unwrap_or(U256::ZERO);
        if chain_trust > best_trust {
            let (disconnected, connected) = self.reorganize_to(hash)?;
            info!(%hash, height, disconnected, connected, "chain reorganized to new tip");
            Ok(AcceptOutcome::Connected { hash, height, disconnected, connected })
        } else {
            debug!(%hash, height, "accepted as side branch");
            Ok(AcceptOutcome::SideBranch { hash, height })
        }
    }

    /// Validate `block` before it enters the index. A block extending the
    /// current active tip is validated fully against live chain state; a
    /// side branch only gets structural validation — its full contextual
    /// check happens if and when it is connected during a reorg.
    fn validate_candidate(&self, block: &Block, node: &BlockIndexNode, prev: &BlockIndexNode, now: u32) -> Result<(), MeridianError> {
        let (_, active_tip_hash) = self.store.chain_tip()?;
        let extends_active_tip = prev.hash == active_tip_hash
            || (active_tip_hash == Hash256::ZERO && prev.height == 0 && self.store.is_empty());

        if extends_active_tip {
            let context = BlockContext {
                height: node.height,
                prev_hash: prev.hash,
                median_time_past: self.index.median_time_past(prev.hash).unwrap_or(0),
                current_time: now,
                target: node.header.target(),
                stake_modifier: node.stake_modifier,
            };
            block_validation::validate_block(block, &context, |op| self.store.get_utxo(op).ok().flatten(), |txid| {
                self.store.get_utxo(&OutPoint { txid: *txid, index: 0 }).ok().flatten().is_some()
            })?;
        } else {
            block_validation::validate_block_structure(block)?;
        }
        Ok(())
    }

    /// The difficulty target the chain expects at `prev.height + 1` for a
    /// block of the given kind, per `§4.2.3`: looks back over same-kind
    /// ancestors on `prev`'s chain and dispatches to the active retarget
    /// formula.
    fn next_required_target(&self, prev: &BlockIndexNode, is_pos: bool) -> U256 {
        let limit = U256::MAX;
        let height = prev.height + 1;

        let ancestors: Vec<&BlockIndexNode> = self
            .index
            .iter_active_from_tip(prev.hash)
            .into_iter()
            .filter(|n| n.is_proof_of_stake == is_pos)
            .take(TARGET_AVERAGE_BLOCK_COUNT as usize + 1)
            .collect();

        if ancestors.len() < 2 {
            return difficulty_next(height, false, meridian_core::difficulty::RetargetInputs::InsufficientHistory, limit, limit);
        }

        let retarget_correction_active = self.forks.retarget_correction_active(height);
        let old_target = ancestors[0].header.target();

        if retarget_correction_active && ancestors.len() >= 3 {
            let times: Vec<i64> = ancestors.iter().rev().map(|n| n.header.timestamp as i64).collect();
            difficulty_next(height, true, meridian_core::difficulty::RetargetInputs::Windowed(&times), old_target, limit)
        } else {
            let prev_time = ancestors[0].header.timestamp as i64;
            let prev_prev_time = ancestors[1].header.timestamp as i64;
            difficulty_next(
                height,
                retarget_correction_active,
                meridian_core::difficulty::RetargetInputs::TwoPoint { prev_time, prev_prev_time },
                old_target,
                limit,
            )
        }
    }

    /// Move the active chain to `new_tip_hash`: find the fork point, undo
    /// blocks back to (but not including) it, then replay the new suffix.
    /// On any failure while replaying, best-effort restore the original
    /// chain and propagate the error, leaving `best_tip` untouched.
    fn reorganize_to(&mut self, new_tip_hash: Hash256) -> Result<(usize, usize), MeridianError> {
        let (_, store_tip_hash) = self.store.chain_tip()?;
        let current_tip_hash = if store_tip_hash == Hash256::ZERO && self.store.is_empty() {
            self.index.best_tip().map(|n| n.hash).unwrap_or(store_tip_hash)
        } else {
            store_tip_hash
        };

        let fork_point = self
            .index
            .find_fork_point(current_tip_hash, new_tip_hash)
            .ok_or_else(|| ChainStateError::UnknownParent(new_tip_hash.to_string()))?;
        let fork_node = self
            .index
            .get(&fork_point)
            .cloned()
            .ok_or_else(|| ChainStateError::BlockNotFound(fork_point.to_string()))?;

        if checkpoint::is_below_checkpoint(fork_node.height) {
            return Err(BlockError::ReorgBelowCheckpoint.into());
        }

        let disconnect_chain = self.chain_back_to(current_tip_hash, fork_point)?;
        let connect_chain = {
            let mut rev = self.chain_back_to(new_tip_hash, fork_point)?;
            rev.reverse();
            rev
        };

        let mut disconnected = 0usize;
        for hash in &disconnect_chain {
            let block = self.bodies.get(hash).cloned().ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
            self.store.disconnect_tip()?;
            let _ = self.events.send(ChainEvent::BlockDisconnected(Arc::new(block)));
            disconnected += 1;
        }

        if self.forks.ntp1_enforced(fork_node.height + 1) {
            if let Err(e) = self.check_ntp1_suffix(&connect_chain) {
                self.reconnect_disconnected(&disconnect_chain)?;
                return Err(e.into());
            }
        }

        let mut connected = 0usize;
        for (i, hash) in connect_chain.iter().enumerate() {
            let height = fork_node.height + 1 + i as u64;
            if let Err(e) = self.connect_one(hash, height) {
                self.reconnect_disconnected(&disconnect_chain)?;
                return Err(e);
            }
            connected += 1;
        }

        self.index.set_best_tip(new_tip_hash)?;
        let _ = self.events.send(ChainEvent::NewTip { hash: new_tip_hash, height: fork_node.height + connect_chain.len() as u64 });

        Ok((disconnected, connected))
    }

    /// Hashes from `tip` back to (but excluding) `ancestor`, newest first.
    fn chain_back_to(&self, tip: Hash256, ancestor: Hash256) -> Result<Vec<Hash256>, MeridianError> {
        let mut chain = Vec::new();
        let mut cursor = tip;
        while cursor != ancestor {
            chain.push(cursor);
            let node = self.index.get(&cursor).cloned().ok_or_else(|| ChainStateError::BlockNotFound(cursor.to_string()))?;
            cursor = node.prev_hash.ok_or_else(|| ChainStateError::BlockNotFound(cursor.to_string()))?;
        }
        Ok(chain)
    }

    fn check_ntp1_suffix(&self, connect_chain: &[Hash256]) -> Result<(), MeridianError> {
        let mut owned: Vec<(Hash256, Vec<String>)> = Vec::new();
        for hash in connect_chain {
            let block = self.bodies.get(hash).ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
            for tx in &block.transactions {
                let txid = tx.txid()?;
                let view = ntp1::derive_ntp1_view(tx, txid);
                let symbols: Vec<String> = ntp1::issuance_symbols(&view).into_iter().map(str::to_owned).collect();
                if !symbols.is_empty() {
                    owned.push((txid, symbols));
                }
            }
        }
        let borrowed: Vec<(Hash256, Vec<&str>)> =
            owned.iter().map(|(id, syms)| (*id, syms.iter().map(String::as_str).collect())).collect();
        self.ntp1_registry.validate_suffix(&borrowed)?;
        Ok(())
    }

    /// Fully (re-)validate and connect a single block already known to the
    /// index, recording its NTP1 issuances and notifying subscribers.
    fn connect_one(&mut self, hash: &Hash256, height: u64) -> Result<(), MeridianError> {
        let block = self.bodies.get(hash).cloned().ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
        let node = self.index.get(hash).cloned().ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
        let prev_hash = node.prev_hash.ok_or_else(|| ChainStateError::UnknownParent(hash.to_string()))?;

        let context = BlockContext {
            height,
            prev_hash,
            median_time_past: self.index.median_time_past(prev_hash).unwrap_or(0),
            current_time: block.header.timestamp,
            target: node.header.target(),
            stake_modifier: node.stake_modifier,
        };

        block_validation::validate_block(&block, &context, |op| self.store.get_utxo(op).ok().flatten(), |txid| {
            self.store.get_utxo(&OutPoint { txid: *txid, index: 0 }).ok().flatten().is_some()
        })?;

        self.store.connect_block(&block, height)?;

        if self.forks.ntp1_enforced(height) {
            for tx in &block.transactions {
                let txid = tx.txid()?;
                let view = ntp1::derive_ntp1_view(tx, txid);
                for symbol in ntp1::issuance_symbols(&view) {
                    self.ntp1_registry.record_committed(symbol, txid);
                }
            }
        }

        self.mempool.remove_confirmed_block(&block);
        let _ = self.events.send(ChainEvent::BlockConnected(Arc::new(block)));
        Ok(())
    }

    /// Best-effort replay of a disconnected suffix (newest-first input,
    /// replayed oldest-first) after an aborted reorg.
    fn reconnect_disconnected(&mut self, disconnected_newest_first: &[Hash256]) -> Result<(), MeridianError> {
        for hash in disconnected_newest_first.iter().rev() {
            let block = self.bodies.get(hash).cloned().ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
            let node = self.index.get(hash).cloned().ok_or_else(|| ChainStateError::BlockNotFound(hash.to_string()))?;
            if let Err(e) = self.store.connect_block(&block, node.height) {
                warn!(hash = %hash, error = %e, "failed to restore chain after aborted reorg");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Re-submit every orphan directly waiting on `parent`, recursing
    /// through any of their own now-resolvable descendants.
    fn reconsider_orphans(&mut self, parent: Hash256, now: u32) {
        for child_hash in self.orphan_blocks.children_of(&parent) {
            if let Some(block) = self.orphan_blocks.remove(&child_hash) {
                let _ = self.accept_block(block, now);
            }
        }
    }
}

/// Thin wrapper so call sites don't need to import `difficulty` separately.
fn difficulty_next(
    height: u64,
    retarget_correction_active: bool,
    inputs: meridian_core::difficulty::RetargetInputs<'_>,
    old_target: U256,
    limit: U256,
) -> U256 {
    meridian_core::difficulty::next_target(height, retarget_correction_active, inputs, old_target, limit)
}

/// Map a rejection reason to a DoS score per `§4.3` step 9: protocol
/// violations that could only come from a malicious or badly broken peer
/// score the full consensus penalty; failures that honest nodes can hit
/// under normal clock skew score lower or not at all.
fn classify_dos_score(error: &MeridianError) -> Option<u32> {
    match error {
        MeridianError::Block(e) => match e {
            BlockError::TimestampTooFar(_) | BlockError::TimestampNotAfterMtp | BlockError::Bip30Violation(_) => {
                Some(DOS_SCORE_RECENT_CONSENSUS)
            }
            BlockError::CheckpointMismatch | BlockError::ReorgBelowCheckpoint | BlockError::UnknownParent(_) => None,
            _ => Some(DOS_SCORE_CONSENSUS),
        },
        MeridianError::Kernel(_) | MeridianError::Ntp1(_) => Some(DOS_SCORE_CONSENSUS),
        _ => None,
    }
}
