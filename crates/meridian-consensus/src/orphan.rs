//! Orphan pools (§4.5): blocks and transactions whose dependencies have
//! not arrived yet.
//!
//! The block pool is a bounded map keyed by hash with a secondary
//! `prev_hash -> children` index so the Acceptor can find and reconsider a
//! newly-connected block's waiting descendants. On overflow it evicts by
//! picking a random entry and walking forward through the `prev_hash`
//! chain to a leaf of the orphan forest, rather than evicting the randomly
//! chosen block itself — this keeps shallow (more likely useful) orphans
//! around longer than deep speculative chains.

use std::collections::HashMap;

use meridian_core::types::{Block, Hash256, Transaction};
use rand::seq::IteratorRandom;

/// Bounded orphan block pool, indexed by hash and by missing parent.
pub struct OrphanBlockPool {
    blocks: HashMap<Hash256, Block>,
    children: HashMap<Hash256, Vec<Hash256>>,
    max_blocks: usize,
}

impl OrphanBlockPool {
    pub fn new(max_blocks: usize) -> Self {
        Self { blocks: HashMap::new(), children: HashMap::new(), max_blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Park `block` under its (currently unknown) parent. Evicts a leaf of
    /// the orphan forest first if the pool is already full.
    pub fn insert(&mut self, hash: Hash256, block: Block) {
        if self.blocks.len() >= self.max_blocks && !self.blocks.contains_key(&hash) {
            self.evict_one();
        }
        self.children.entry(block.header.prev_hash).or_default().push(hash);
        self.blocks.insert(hash, block);
    }

    /// Remove and return `hash`'s orphan entry, detaching it from its
    /// parent's child list.
    pub fn remove(&mut self, hash: &Hash256) -> Option<Block> {
        let block = self.blocks.remove(hash)?;
        if let Some(siblings) = self.children.get_mut(&block.header.prev_hash) {
            siblings.retain(|h| h != hash);
        }
        Some(block)
    }

    /// Hashes of orphans directly waiting on `parent`.
    pub fn children_of(&self, parent: &Hash256) -> Vec<Hash256> {
        self.children.get(parent).cloned().unwrap_or_default()
    }

    fn evict_one(&mut self) {
        let Some(&start) = self.blocks.keys().choose(&mut rand::thread_rng()) else {
            return;
        };
        let mut current = start;
        loop {
            match self.children.get(&current).and_then(|kids| kids.first().copied()) {
                Some(child) if self.blocks.contains_key(&child) => current = child,
                _ => break,
            }
        }
        self.remove(&current);
    }
}

/// Bounded orphan transaction pool: transactions whose inputs could not be
/// resolved yet. Oversized transactions are dropped outright rather than
/// parked, since a legitimate standard transaction never exceeds the
/// threshold.
pub struct OrphanTxPool {
    txs: HashMap<Hash256, Transaction>,
    max_count: usize,
    max_tx_size: usize,
}

impl OrphanTxPool {
    pub fn new(max_count: usize, max_tx_size: usize) -> Self {
        Self { txs: HashMap::new(), max_count, max_tx_size }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.txs.contains_key(txid)
    }

    /// Attempt to park `tx`. Returns `false` without inserting if it's
    /// oversized; evicts a random existing entry first if full.
    pub fn insert(&mut self, txid: Hash256, tx: Transaction, size: usize) -> bool {
        if size > self.max_tx_size {
            return false;
        }
        if self.txs.len() >= self.max_count && !self.txs.contains_key(&txid) {
            if let Some(&victim) = self.txs.keys().choose(&mut rand::thread_rng()) {
                self.txs.remove(&victim);
            }
        }
        self.txs.insert(txid, tx);
        true
    }

    pub fn remove(&mut self, txid: &Hash256) -> Option<Transaction> {
        self.txs.remove(txid)
    }
}
