//! Chain state: the block-index tree and the UTXO-set persistence port.
//!
//! Two independent concerns live here, matching the component split in the
//! design notes:
//!
//! - [`BlockIndex`] is the in-memory tree of every known [`BlockIndexNode`],
//!   keyed by header hash, with `prev`/`next` links. It tracks the best
//!   (highest chain-trust) tip and answers ancestry queries — it does not
//!   know about UTXOs or transactions at all.
//! - [`ChainStore`] is the persistence port for the UTXO set and raw block
//!   bodies along the *active* chain, mirroring the previous single-chain
//!   store. The production node backs it with RocksDB; [`MemoryChainStore`]
//!   is for tests.
//!
//! Reorganization (disconnecting the stale suffix, connecting the new one)
//! is coordinated one level up, in the consensus engine, by calling
//! `disconnect_tip`/`connect_block` against [`ChainStore`] while `BlockIndex`
//! tracks which path is best.

use std::collections::HashMap;

use crate::types::{
    Block, BlockHeader, BlockIndexNode, Hash256, OutPoint, Transaction, UtxoEntry,
};
use crate::error::{ChainStateError, MeridianError};

// ----------------------------------------------------------------------
// BlockIndex: the tree of all known headers
// ----------------------------------------------------------------------

/// In-memory index of every block header ever seen, connected or not,
/// organised as a tree via `prev_hash`/`next_hash`. Supports multiple
/// competing branches; [`BlockIndex::best_tip`] names the currently
/// preferred one by accumulated chain trust.
#[derive(Default)]
pub struct BlockIndex {
    nodes: HashMap<Hash256, BlockIndexNode>,
    best_tip: Option<Hash256>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if its hash is new, otherwise return the existing one
    /// unchanged. Callers that need to update an existing node's mutable
    /// fields (next_hash, stake_modifier, ...) should use [`Self::update`].
    pub fn insert_or_get(&mut self, node: BlockIndexNode) -> &BlockIndexNode {
        self.nodes.entry(node.hash).or_insert(node)
    }

    pub fn get(&self, hash: &Hash256) -> Option<&BlockIndexNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Apply `f` to the node at `hash`, if present.
    pub fn update(&mut self, hash: &Hash256, f: impl FnOnce(&mut BlockIndexNode)) -> bool {
        match self.nodes.get_mut(hash) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }

    pub fn best_tip(&self) -> Option<&BlockIndexNode> {
        self.best_tip.and_then(|h| self.nodes.get(&h))
    }

    pub fn set_best_tip(&mut self, hash: Hash256) -> Result<(), ChainStateError> {
        if !self.nodes.contains_key(&hash) {
            return Err(ChainStateError::BlockNotFound(hash.to_string()));
        }
        self.best_tip = Some(hash);
        Ok(())
    }

    /// The node with strictly greater chain trust than the current best
    /// tip, if one exists among all known nodes. Used by the acceptor to
    /// decide whether a newly connected branch should become active.
    pub fn candidate_best(&self) -> Option<&BlockIndexNode> {
        let current = self.best_tip();
        self.nodes
            .values()
            .filter(|n| current.is_none_or(|c| n.chain_trust > c.chain_trust))
            .max_by_key(|n| n.chain_trust)
    }

    /// Walk from `tip_hash` back to genesis (inclusive), in descending
    /// height order.
    pub fn iter_active_from_tip(&self, tip_hash: Hash256) -> Vec<&BlockIndexNode> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&tip_hash);
        while let Some(node) = current {
            out.push(node);
            current = node.prev_hash.and_then(|h| self.nodes.get(&h));
        }
        out
    }

    /// Find the common ancestor of two branches, walking both back to
    /// equal height first. Returns `None` if either hash is unknown.
    pub fn find_fork_point(&self, a: Hash256, b: Hash256) -> Option<Hash256> {
        let mut na = self.nodes.get(&a)?;
        let mut nb = self.nodes.get(&b)?;
        let mut ha = na;
        let mut hb = nb;
        while ha.height > hb.height {
            ha = self.nodes.get(&ha.prev_hash?)?;
        }
        while hb.height > ha.height {
            hb = self.nodes.get(&hb.prev_hash?)?;
        }
        na = ha;
        nb = hb;
        while na.hash != nb.hash {
            na = self.nodes.get(&na.prev_hash?)?;
            nb = self.nodes.get(&nb.prev_hash?)?;
        }
        Some(na.hash)
    }

    /// Median of the timestamps of the last [`MEDIAN_TIME_SPAN`](crate::constants::MEDIAN_TIME_SPAN)
    /// ancestors of `hash` (inclusive), used to reject blocks that do not
    /// advance the clock.
    pub fn median_time_past(&self, hash: Hash256) -> Option<u32> {
        let span = crate::constants::MEDIAN_TIME_SPAN;
        let mut times: Vec<u32> = Vec::with_capacity(span);
        let mut current = self.nodes.get(&hash);
        for _ in 0..span {
            let node = current?;
            times.push(node.header.timestamp);
            current = node.prev_hash.and_then(|h| self.nodes.get(&h));
        }
        times.sort_unstable();
        Some(times[times.len() / 2])
    }

    /// Fraction of the last `window` blocks (ending at `hash`) whose
    /// version is at least `min_version`, used for soft-fork activation
    /// thresholds ("super-majority" gating, §4.6).
    pub fn super_majority(&self, hash: Hash256, min_version: u64, window: usize) -> f64 {
        let mut seen = 0usize;
        let mut matching = 0usize;
        let mut current = self.nodes.get(&hash);
        while let Some(node) = current {
            if seen >= window {
                break;
            }
            seen += 1;
            if node.header.version >= min_version {
                matching += 1;
            }
            current = node.prev_hash.and_then(|h| self.nodes.get(&h));
        }
        if seen == 0 {
            0.0
        } else {
            matching as f64 / seen as f64
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ----------------------------------------------------------------------
// ChainStore: UTXO set + raw block storage along the active chain
// ----------------------------------------------------------------------

/// Result of connecting a block to the chain state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectBlockResult {
    pub utxos_created: usize,
    pub utxos_spent: usize,
}

/// Result of disconnecting the tip block from the chain state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectBlockResult {
    pub utxos_restored: usize,
    pub utxos_removed: usize,
}

/// Undo data for reverting a connected block during a reorg.
#[derive(Clone, Debug)]
struct BlockUndo {
    spent_utxos: Vec<(OutPoint, UtxoEntry)>,
}

/// Mutable chain state storage interface for the *active* chain's UTXO set
/// and block bodies. Assumes every block passed to
/// [`connect_block`](ChainStore::connect_block) was already accepted by the
/// [`BlockIndex`]/consensus engine — this layer performs only the minimal
/// height/duplicate sanity checks needed to catch a caller bug.
///
/// Not thread-safe — callers wrap in a `Mutex`/`RwLock` as needed.
pub trait ChainStore: Send + Sync {
    fn connect_block(&mut self, block: &Block, height: u64) -> Result<ConnectBlockResult, MeridianError>;

    fn disconnect_tip(&mut self) -> Result<DisconnectBlockResult, MeridianError>;

    fn get_utxo(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, MeridianError>;

    fn contains_utxo(&self, outpoint: &OutPoint) -> Result<bool, MeridianError> {
        Ok(self.get_utxo(outpoint)?.is_some())
    }

    /// Current chain tip as `(height, block_hash)`, or `(0, Hash256::ZERO)`
    /// if empty.
    fn chain_tip(&self) -> Result<(u64, Hash256), MeridianError>;

    fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, MeridianError>;

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, MeridianError>;

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, MeridianError>;

    fn utxo_count(&self) -> usize;

    fn is_empty(&self) -> bool;

    fn iter_utxos(&self) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        Ok(Vec::new())
    }
}

/// In-memory chain state storage for testing. No persistence, unbounded
/// memory growth — the production node backs [`ChainStore`] with RocksDB.
pub struct MemoryChainStore {
    utxos: HashMap<OutPoint, UtxoEntry>,
    blocks: HashMap<Hash256, Block>,
    headers: HashMap<Hash256, BlockHeader>,
    height_to_hash: HashMap<u64, Hash256>,
    undo_data: HashMap<Hash256, BlockUndo>,
    tip_height: u64,
    tip_hash: Hash256,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
            blocks: HashMap::new(),
            headers: HashMap::new(),
            height_to_hash: HashMap::new(),
            undo_data: HashMap::new(),
            tip_height: 0,
            tip_hash: Hash256::ZERO,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_data.len()
    }

    fn spend_inputs(&mut self, tx: &Transaction, undo: &mut BlockUndo) -> Result<usize, MeridianError> {
        if tx.is_coinbase() {
            return Ok(0);
        }
        let mut spent = 0;
        for input in &tx.inputs {
            let entry = self.utxos.remove(&input.previous_output).ok_or_else(|| {
                ChainStateError::MissingUtxo(input.previous_output.to_string())
            })?;
            undo.spent_utxos.push((input.previous_output.clone(), entry));
            spent += 1;
        }
        Ok(spent)
    }

    fn create_outputs(&mut self, tx: &Transaction, height: u64, block_time: u32) -> Result<usize, MeridianError> {
        let txid = tx.txid()?;
        let is_coinbase = tx.is_coinbase();
        let is_coinstake = tx.is_coinstake();
        let mut created = 0;
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint { txid, index: index as u64 };
            let entry = UtxoEntry {
                output: output.clone(),
                block_height: height,
                block_time,
                is_coinbase,
                is_coinstake,
            };
            self.utxos.insert(outpoint, entry);
            created += 1;
        }
        Ok(created)
    }
}

impl Default for MemoryChainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainStore for MemoryChainStore {
    fn connect_block(&mut self, block: &Block, height: u64) -> Result<ConnectBlockResult, MeridianError> {
        if self.tip_hash == Hash256::ZERO {
            if height != 0 {
                return Err(ChainStateError::HeightMismatch { expected: 0, got: height }.into());
            }
        } else if height != self.tip_height + 1 {
            return Err(ChainStateError::HeightMismatch { expected: self.tip_height + 1, got: height }.into());
        }

        let block_hash = block.header.hash();
        if self.blocks.contains_key(&block_hash) {
            return Err(ChainStateError::DuplicateBlock(block_hash.to_string()).into());
        }

        let mut undo = BlockUndo { spent_utxos: Vec::new() };
        let mut total_spent = 0;
        let mut total_created = 0;
        for tx in &block.transactions {
            total_spent += self.spend_inputs(tx, &mut undo)?;
            total_created += self.create_outputs(tx, height, block.header.timestamp)?;
        }

        self.headers.insert(block_hash, block.header.clone());
        self.blocks.insert(block_hash, block.clone());
        self.height_to_hash.insert(height, block_hash);
        self.undo_data.insert(block_hash, undo);
        self.tip_height = height;
        self.tip_hash = block_hash;

        Ok(ConnectBlockResult { utxos_created: total_created, utxos_spent: total_spent })
    }

    fn disconnect_tip(&mut self) -> Result<DisconnectBlockResult, MeridianError> {
        if self.tip_hash == Hash256::ZERO {
            return Err(ChainStateError::EmptyChain.into());
        }
        let tip_hash = self.tip_hash;
        let tip_height = self.tip_height;

        let block = self.blocks.get(&tip_hash).cloned()
            .ok_or_else(|| ChainStateError::BlockNotFound(tip_hash.to_string()))?;
        let undo = self.undo_data.remove(&tip_hash)
            .ok_or_else(|| ChainStateError::UndoDataMissing(tip_hash.to_string()))?;

        let mut total_removed = 0;
        for tx in block.transactions.iter().rev() {
            let txid = tx.txid()?;
            for (index, _) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint { txid, index: index as u64 };
                if self.utxos.remove(&outpoint).is_some() {
                    total_removed += 1;
                }
            }
        }

        let total_restored = undo.spent_utxos.len();
        for (outpoint, entry) in undo.spent_utxos {
            self.utxos.insert(outpoint, entry);
        }

        self.height_to_hash.remove(&tip_height);
        if tip_height == 0 {
            self.tip_height = 0;
            self.tip_hash = Hash256::ZERO;
        } else {
            self.tip_height = tip_height - 1;
            self.tip_hash = block.header.prev_hash;
        }

        Ok(DisconnectBlockResult { utxos_restored: total_restored, utxos_removed: total_removed })
    }

    fn get_utxo(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, MeridianError> {
        Ok(self.utxos.get(outpoint).cloned())
    }

    fn chain_tip(&self) -> Result<(u64, Hash256), MeridianError> {
        Ok((self.tip_height, self.tip_hash))
    }

    fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, MeridianError> {
        Ok(self.headers.get(hash).cloned())
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, MeridianError> {
        Ok(self.blocks.get(hash).cloned())
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, MeridianError> {
        Ok(self.height_to_hash.get(&height).copied())
    }

    fn utxo_count(&self) -> usize {
        self.utxos.len()
    }

    fn is_empty(&self) -> bool {
        self.tip_hash == Hash256::ZERO
    }

    fn iter_utxos(&self) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        Ok(self.utxos.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
