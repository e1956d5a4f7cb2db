//! RocksDB-backed persistent chain state storage.
//!
//! Implements [`ChainStore`] using RocksDB column families for blocks, headers,
//! UTXOs, height index, undo data, and metadata. All mutations use atomic
//! [`WriteBatch`] for crash safety.
//!
//! On first open, automatically connects the genesis block.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Options, SliceTransform, WriteBatch, DB};

use meridian_core::chain_state::{ChainStore, ConnectBlockResult, DisconnectBlockResult};
use meridian_core::error::{ChainStateError, MeridianError};
use meridian_core::genesis;
use meridian_core::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, UtxoEntry};

// --- Column family names ---

const CF_BLOCKS: &str = "blocks";
const CF_HEADERS: &str = "headers";
const CF_UTXOS: &str = "utxos";
const CF_HEIGHT_INDEX: &str = "height_index";
const CF_UNDO: &str = "undo";
const CF_METADATA: &str = "metadata";
const CF_ADDRESS_INDEX: &str = "address_index";

/// All column family names.
const ALL_CFS: &[&str] = &[
    CF_BLOCKS,
    CF_HEADERS,
    CF_UTXOS,
    CF_HEIGHT_INDEX,
    CF_UNDO,
    CF_METADATA,
    CF_ADDRESS_INDEX,
];

// --- Metadata keys ---

const META_TIP_HEIGHT: &[u8] = b"tip_height";
const META_TIP_HASH: &[u8] = b"tip_hash";
const META_CIRCULATING_SUPPLY: &[u8] = b"circulating_supply";
const META_UTXO_COUNT: &[u8] = b"utxo_count";

/// Undo data for reverting a connected block.
///
/// Stores the UTXOs consumed by the block's transactions so they can be
/// restored during chain reorganization.
#[derive(bincode::Encode, bincode::Decode)]
struct BlockUndo {
    /// Spent UTXOs in the order they were consumed.
    spent_utxos: Vec<(OutPoint, UtxoEntry)>,
}

/// RocksDB-backed persistent chain state storage.
///
/// Stores blocks, headers, UTXOs, height index, undo data, and aggregate
/// metadata in separate column families. All mutations are atomic via
/// [`WriteBatch`].
///
/// On first open, automatically connects the genesis block.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist. If the database is
    /// empty (no tip), automatically connects the genesis block.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MeridianError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| {
                let mut opts = Options::default();
                // Address index keys are pubkey_hash(32) || txid(32) || index(8).
                if *name == CF_ADDRESS_INDEX {
                    opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(32));
                }
                ColumnFamilyDescriptor::new(*name, opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| MeridianError::Storage(e.to_string()))?;

        let mut store = Self { db };

        // Auto-connect genesis if the chain is empty.
        if store.is_empty() {
            let genesis = genesis::genesis_block();
            store.connect_block(genesis, 0)?;
        }

        store.migrate_address_index()?;

        Ok(store)
    }

    /// Current circulating supply in mrills.
    pub fn circulating_supply(&self) -> Result<u64, MeridianError> {
        self.get_meta_u64(META_CIRCULATING_SUPPLY)
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), MeridianError> {
        self.db
            .flush()
            .map_err(|e| MeridianError::Storage(e.to_string()))
    }

    /// Trigger manual compaction across all column families.
    ///
    /// Compaction merges SSTables, reclaims space from deleted keys, and
    /// improves read performance. Call this during low-activity periods (e.g.
    /// on startup after IBD completes).
    pub fn compact(&self) -> Result<(), MeridianError> {
        for cf_name in ALL_CFS {
            let cf = self.cf_handle(cf_name)?;
            self.db
                .compact_range_cf(&cf, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    /// Delete full block data for blocks older than `keep_recent` blocks
    /// from the current tip. Headers and undo data are preserved.
    ///
    /// Returns the number of blocks pruned.
    pub fn prune_blocks(&self, keep_recent: u64) -> Result<u64, MeridianError> {
        let (tip_height, _) = self.chain_tip()?;

        // Blocks at heights 1..=cutoff are eligible for pruning. Height 0
        // (genesis) is never pruned.
        let cutoff = tip_height.saturating_sub(keep_recent);
        if cutoff == 0 {
            return Ok(0);
        }

        let cf_blocks = self.cf_handle(CF_BLOCKS)?;
        let cf_height = self.cf_handle(CF_HEIGHT_INDEX)?;
        let mut batch = WriteBatch::default();
        let mut pruned_count = 0u64;

        for height in 1..=cutoff {
            let hash_bytes = match self
                .db
                .get_cf(&cf_height, Self::height_key(height))
                .map_err(|e| MeridianError::Storage(e.to_string()))?
            {
                Some(bytes) if bytes.len() == 32 => bytes,
                _ => continue,
            };

            if self
                .db
                .get_cf(&cf_blocks, &hash_bytes)
                .map_err(|e| MeridianError::Storage(e.to_string()))?
                .is_some()
            {
                batch.delete_cf(cf_blocks, &hash_bytes);
                pruned_count += 1;
            }
        }

        if pruned_count > 0 {
            self.db
                .write(batch)
                .map_err(|e| MeridianError::Storage(e.to_string()))?;
            tracing::info!("pruned {} full block(s) up to height {}", pruned_count, cutoff);
        }

        Ok(pruned_count)
    }

    /// Returns true if the block at the given height has been pruned
    /// (header exists but full block data does not).
    pub fn is_block_pruned(&self, height: u64) -> Result<bool, MeridianError> {
        let hash = match self.get_block_hash(height)? {
            Some(h) => h,
            None => return Ok(false),
        };

        if self.get_block_header(&hash)?.is_none() {
            return Ok(false);
        }

        let cf_blocks = self.cf_handle(CF_BLOCKS)?;
        let has_full_data = self
            .db
            .get_cf(&cf_blocks, hash.as_bytes())
            .map_err(|e| MeridianError::Storage(e.to_string()))?
            .is_some();

        Ok(!has_full_data)
    }

    // --- Internal helpers ---

    fn get_meta_u64(&self, key: &[u8]) -> Result<u64, MeridianError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self
            .db
            .get_cf(&cf, key)
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 8 => {
                Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
            }
            Some(_) => Err(MeridianError::Storage("invalid metadata value length".into())),
            None => Ok(0),
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, MeridianError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| MeridianError::Storage(format!("missing column family: {name}")))
    }

    fn encode_outpoint(outpoint: &OutPoint) -> Result<Vec<u8>, MeridianError> {
        bincode::encode_to_vec(outpoint, bincode::config::standard())
            .map_err(|e| MeridianError::Storage(e.to_string()))
    }

    fn height_key(height: u64) -> [u8; 8] {
        height.to_be_bytes()
    }

    /// Encode an address index key: pubkey_hash || txid || index(BE).
    fn encode_address_index_key(pubkey_hash: &Hash256, outpoint: &OutPoint) -> [u8; 72] {
        let mut key = [0u8; 72];
        key[0..32].copy_from_slice(pubkey_hash.as_bytes());
        key[32..64].copy_from_slice(outpoint.txid.as_bytes());
        key[64..72].copy_from_slice(&outpoint.index.to_be_bytes());
        key
    }

    fn coinbase_value(block: &Block) -> u64 {
        block
            .coinbase()
            .map(|cb| cb.outputs.iter().map(|o| o.value).sum())
            .unwrap_or(0)
    }

    /// Process a transaction's inputs: mark outpoints for deletion, collect undo data.
    ///
    /// Returns the number of UTXOs spent.
    fn collect_spent_utxos(
        &self,
        tx: &Transaction,
        undo: &mut BlockUndo,
    ) -> Result<usize, MeridianError> {
        if tx.is_coinbase() {
            return Ok(0);
        }

        let cf_utxos = self.cf_handle(CF_UTXOS)?;
        let mut spent = 0;

        for input in &tx.inputs {
            let key = Self::encode_outpoint(&input.previous_output)?;
            if let Some(data) = self
                .db
                .get_cf(&cf_utxos, &key)
                .map_err(|e| MeridianError::Storage(e.to_string()))?
            {
                let (entry, _): (UtxoEntry, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| MeridianError::Storage(e.to_string()))?;
                undo.spent_utxos
                    .push((input.previous_output.clone(), entry));
                spent += 1;
            }
        }

        Ok(spent)
    }

    /// One-time migration: build address index from existing UTXOs.
    fn migrate_address_index(&self) -> Result<(), MeridianError> {
        let cf_addr = self.cf_handle(CF_ADDRESS_INDEX)?;

        let mut iter = self.db.iterator_cf(&cf_addr, rocksdb::IteratorMode::Start);
        if iter.next().is_some() {
            return Ok(()); // Already populated.
        }
        drop(iter);

        let utxo_count = self.get_meta_u64(META_UTXO_COUNT)?;
        if utxo_count == 0 {
            return Ok(());
        }

        tracing::info!("migrating address index for {} UTXOs", utxo_count);

        let cf_utxos = self.cf_handle(CF_UTXOS)?;
        let mut batch = WriteBatch::default();
        let mut count = 0u64;

        let iter = self.db.iterator_cf(&cf_utxos, rocksdb::IteratorMode::Start);
        for item in iter {
            let (key_bytes, value_bytes) = item.map_err(|e| MeridianError::Storage(e.to_string()))?;
            let (outpoint, _): (OutPoint, _) =
                bincode::decode_from_slice(&key_bytes, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;
            let (entry, _): (UtxoEntry, _) =
                bincode::decode_from_slice(&value_bytes, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;

            let addr_key = Self::encode_address_index_key(&entry.output.pubkey_hash, &outpoint);
            batch.put_cf(cf_addr, addr_key, []);
            count += 1;
        }

        if count > 0 {
            self.db.write(batch).map_err(|e| MeridianError::Storage(e.to_string()))?;
            tracing::info!("address index migration complete: {} entries", count);
        }

        Ok(())
    }

    /// Get all UTXOs for a given pubkey hash using the address index.
    ///
    /// Uses RocksDB prefix iteration over CF_ADDRESS_INDEX for O(k) lookup
    /// where k is the number of UTXOs owned by this address.
    pub fn get_utxos_by_address(
        &self,
        pubkey_hash: &Hash256,
    ) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        let cf_addr = self.cf_handle(CF_ADDRESS_INDEX)?;
        let cf_utxos = self.cf_handle(CF_UTXOS)?;
        let prefix = pubkey_hash.as_bytes();

        let mut result = Vec::new();
        let iter = self.db.prefix_iterator_cf(&cf_addr, prefix);

        for item in iter {
            let (key_bytes, _) = item.map_err(|e| MeridianError::Storage(e.to_string()))?;

            if key_bytes.len() != 72 || &key_bytes[0..32] != prefix {
                break;
            }

            let mut txid_bytes = [0u8; 32];
            txid_bytes.copy_from_slice(&key_bytes[32..64]);
            let index = u64::from_be_bytes(key_bytes[64..72].try_into().unwrap());
            let outpoint = OutPoint {
                txid: Hash256(txid_bytes),
                index,
            };

            let utxo_key = Self::encode_outpoint(&outpoint)?;
            if let Some(utxo_data) = self.db.get_cf(&cf_utxos, &utxo_key)
                .map_err(|e| MeridianError::Storage(e.to_string()))?
            {
                let (entry, _): (UtxoEntry, _) =
                    bincode::decode_from_slice(&utxo_data, bincode::config::standard())
                        .map_err(|e| MeridianError::Storage(e.to_string()))?;
                result.push((outpoint, entry));
            }
        }

        Ok(result)
    }

    /// Get a geometric block locator for chain synchronization.
    ///
    /// Returns hashes in the pattern: tip, tip-1, tip-2, tip-4, tip-8, ..., genesis.
    /// This allows efficient common ancestor discovery with O(log n) hashes.
    pub fn get_block_locator(&self) -> Result<Vec<Hash256>, MeridianError> {
        let (tip_height, tip_hash) = self.chain_tip()?;
        if tip_hash == Hash256::ZERO {
            return Ok(vec![Hash256::ZERO]);
        }

        let mut locator = Vec::new();
        let mut step = 1u64;
        let mut height = tip_height;

        loop {
            if let Some(hash) = self.get_block_hash(height)? {
                locator.push(hash);
            }

            if height == 0 {
                break;
            }

            // Geometric backoff: 1, 1, 2, 4, 8, 16, ...
            if height <= step {
                height = 0;
            } else {
                height -= step;
            }

            if locator.len() > 10 {
                step *= 2;
            }
        }

        if locator.last() != Some(&Hash256::ZERO) {
            if let Some(genesis_hash) = self.get_block_hash(0)? {
                if !locator.contains(&genesis_hash) {
                    locator.push(genesis_hash);
                }
            }
        }

        Ok(locator)
    }

    /// Look up the height at which a given hash appears in the height index.
    ///
    /// Iterates the height index from the most-recent end backwards, since
    /// recent blocks are the common case for locator and header-sync queries.
    /// Returns `None` if the hash is not in the main chain.
    fn get_height_for_hash(&self, hash: &Hash256) -> Result<Option<u64>, MeridianError> {
        let cf_height = self.cf_handle(CF_HEIGHT_INDEX)?;
        let iter = self
            .db
            .iterator_cf(&cf_height, rocksdb::IteratorMode::End);
        for item in iter {
            let (key_bytes, value_bytes) =
                item.map_err(|e| MeridianError::Storage(e.to_string()))?;
            if value_bytes.len() == 32 {
                let stored_hash = Hash256(value_bytes[..32].try_into().unwrap());
                if stored_hash == *hash && key_bytes.len() == 8 {
                    let height =
                        u64::from_be_bytes(key_bytes[..8].try_into().unwrap());
                    return Ok(Some(height));
                }
            }
        }
        Ok(None)
    }

    /// Find the first locator hash that we have on our active chain.
    ///
    /// Returns (height, hash) of the common ancestor, or None if no match.
    pub fn find_common_ancestor(
        &self,
        locator: &[Hash256],
    ) -> Result<Option<(u64, Hash256)>, MeridianError> {
        for hash in locator {
            if self.get_block_header(hash)?.is_none() {
                continue;
            }
            if let Some(height) = self.get_height_for_hash(hash)? {
                return Ok(Some((height, *hash)));
            }
            // We have the header but it is not on our active chain (stale/orphan).
        }

        Ok(None)
    }

    /// Get up to `max_count` headers after the given hash.
    ///
    /// Caps at 2000 headers maximum per request. Uses the height index for an
    /// O(result_count) scan rather than O(chain_length).
    pub fn get_headers_after(
        &self,
        hash: &Hash256,
        max_count: usize,
    ) -> Result<Vec<BlockHeader>, MeridianError> {
        const MAX_HEADERS_PER_REQUEST: usize = 2000;
        let limit = max_count.min(MAX_HEADERS_PER_REQUEST);

        let start_height = match self.get_height_for_hash(hash)? {
            Some(h) => h,
            None => return Ok(vec![]),
        };

        let cf_height = self.cf_handle(CF_HEIGHT_INDEX)?;
        let mut headers = Vec::new();

        let start_key = Self::height_key(start_height + 1);
        let iter = self.db.iterator_cf(
            &cf_height,
            rocksdb::IteratorMode::From(&start_key, rocksdb::Direction::Forward),
        );

        for item in iter {
            if headers.len() >= limit {
                break;
            }
            let (_, value_bytes) = item.map_err(|e| MeridianError::Storage(e.to_string()))?;
            if value_bytes.len() == 32 {
                let h = Hash256(value_bytes[..32].try_into().unwrap());
                if let Some(header) = self.get_block_header(&h)? {
                    headers.push(header);
                }
            }
        }

        Ok(headers)
    }
}

impl ChainStore for RocksStore {
    fn connect_block(
        &mut self,
        block: &Block,
        height: u64,
    ) -> Result<ConnectBlockResult, MeridianError> {
        let (tip_height, tip_hash) = self.chain_tip()?;
        if tip_hash == Hash256::ZERO {
            if height != 0 {
                return Err(ChainStateError::HeightMismatch {
                    expected: 0,
                    got: height,
                }
                .into());
            }
        } else if height != tip_height + 1 {
            return Err(ChainStateError::HeightMismatch {
                expected: tip_height + 1,
                got: height,
            }
            .into());
        }

        let block_hash = block.header.hash();

        let cf_blocks = self.cf_handle(CF_BLOCKS)?;
        if self
            .db
            .get_cf(&cf_blocks, block_hash.as_bytes())
            .map_err(|e| MeridianError::Storage(e.to_string()))?
            .is_some()
        {
            return Err(ChainStateError::DuplicateBlock(block_hash.to_string()).into());
        }

        let mut undo = BlockUndo { spent_utxos: Vec::new() };
        let mut total_spent = 0;
        for tx in &block.transactions {
            total_spent += self.collect_spent_utxos(tx, &mut undo)?;
        }

        let mut batch = WriteBatch::default();

        let cf_blocks = self.cf_handle(CF_BLOCKS)?;
        let cf_headers = self.cf_handle(CF_HEADERS)?;
        let cf_utxos = self.cf_handle(CF_UTXOS)?;
        let cf_height = self.cf_handle(CF_HEIGHT_INDEX)?;
        let cf_undo = self.cf_handle(CF_UNDO)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let cf_addr_index = self.cf_handle(CF_ADDRESS_INDEX)?;

        for (outpoint, entry) in &undo.spent_utxos {
            let key = Self::encode_outpoint(outpoint)?;
            batch.delete_cf(cf_utxos, &key);

            let addr_key = Self::encode_address_index_key(&entry.output.pubkey_hash, outpoint);
            batch.delete_cf(cf_addr_index, addr_key);
        }

        let mut total_created = 0u64;
        for tx in &block.transactions {
            let txid = tx.txid().map_err(MeridianError::from)?;
            let is_coinbase = tx.is_coinbase();
            let is_coinstake = tx.is_coinstake();

            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint {
                    txid,
                    index: index as u64,
                };
                let entry = UtxoEntry {
                    output: output.clone(),
                    block_height: height,
                    block_time: block.header.timestamp,
                    is_coinbase,
                    is_coinstake,
                };
                let key = Self::encode_outpoint(&outpoint)?;
                let value = bincode::encode_to_vec(&entry, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;
                batch.put_cf(cf_utxos, &key, &value);
                total_created += 1;

                let addr_key = Self::encode_address_index_key(&output.pubkey_hash, &outpoint);
                batch.put_cf(cf_addr_index, addr_key, []);
            }
        }

        let block_bytes = bincode::encode_to_vec(block, bincode::config::standard())
            .map_err(|e| MeridianError::Storage(e.to_string()))?;
        let header_bytes =
            bincode::encode_to_vec(&block.header, bincode::config::standard())
                .map_err(|e| MeridianError::Storage(e.to_string()))?;
        batch.put_cf(cf_blocks, block_hash.as_bytes(), &block_bytes);
        batch.put_cf(cf_headers, block_hash.as_bytes(), &header_bytes);

        batch.put_cf(cf_height, Self::height_key(height), block_hash.as_bytes());

        let undo_bytes = bincode::encode_to_vec(&undo, bincode::config::standard())
            .map_err(|e| MeridianError::Storage(e.to_string()))?;
        batch.put_cf(cf_undo, block_hash.as_bytes(), &undo_bytes);

        batch.put_cf(cf_meta, META_TIP_HEIGHT, height.to_le_bytes());
        batch.put_cf(cf_meta, META_TIP_HASH, block_hash.as_bytes());

        let current_utxo_count = self.get_meta_u64(META_UTXO_COUNT)?;
        let new_utxo_count = current_utxo_count + total_created - total_spent as u64;
        batch.put_cf(cf_meta, META_UTXO_COUNT, new_utxo_count.to_le_bytes());

        let current_supply = self.get_meta_u64(META_CIRCULATING_SUPPLY)?;
        let coinbase_val = Self::coinbase_value(block);
        let new_supply = current_supply.saturating_add(coinbase_val);
        batch.put_cf(cf_meta, META_CIRCULATING_SUPPLY, new_supply.to_le_bytes());

        self.db
            .write(batch)
            .map_err(|e| MeridianError::Storage(e.to_string()))?;

        Ok(ConnectBlockResult {
            utxos_created: total_created as usize,
            utxos_spent: total_spent,
        })
    }

    fn disconnect_tip(&mut self) -> Result<DisconnectBlockResult, MeridianError> {
        let (tip_height, tip_hash) = self.chain_tip()?;
        if tip_hash == Hash256::ZERO {
            return Err(ChainStateError::EmptyChain.into());
        }

        let block = self
            .get_block(&tip_hash)?
            .ok_or_else(|| ChainStateError::BlockNotFound(tip_hash.to_string()))?;

        let cf_undo = self.cf_handle(CF_UNDO)?;
        let undo_bytes = self
            .db
            .get_cf(&cf_undo, tip_hash.as_bytes())
            .map_err(|e| MeridianError::Storage(e.to_string()))?
            .ok_or_else(|| ChainStateError::UndoDataMissing(tip_hash.to_string()))?;
        let (undo, _): (BlockUndo, _) =
            bincode::decode_from_slice(&undo_bytes, bincode::config::standard())
                .map_err(|e| MeridianError::Storage(e.to_string()))?;

        let mut batch = WriteBatch::default();

        let cf_utxos = self.cf_handle(CF_UTXOS)?;
        let cf_height = self.cf_handle(CF_HEIGHT_INDEX)?;
        let cf_undo = self.cf_handle(CF_UNDO)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let cf_addr_index = self.cf_handle(CF_ADDRESS_INDEX)?;

        let mut total_removed = 0u64;
        for tx in block.transactions.iter().rev() {
            let txid = tx.txid().map_err(MeridianError::from)?;
            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint {
                    txid,
                    index: index as u64,
                };
                let key = Self::encode_outpoint(&outpoint)?;
                if self
                    .db
                    .get_cf(&cf_utxos, &key)
                    .map_err(|e| MeridianError::Storage(e.to_string()))?
                    .is_some()
                {
                    batch.delete_cf(cf_utxos, &key);

                    let addr_key = Self::encode_address_index_key(&output.pubkey_hash, &outpoint);
                    batch.delete_cf(cf_addr_index, addr_key);

                    total_removed += 1;
                }
            }
        }

        let total_restored = undo.spent_utxos.len();
        for (outpoint, entry) in &undo.spent_utxos {
            let key = Self::encode_outpoint(outpoint)?;
            let value = bincode::encode_to_vec(entry, bincode::config::standard())
                .map_err(|e| MeridianError::Storage(e.to_string()))?;
            batch.put_cf(cf_utxos, &key, &value);

            let addr_key = Self::encode_address_index_key(&entry.output.pubkey_hash, outpoint);
            batch.put_cf(cf_addr_index, addr_key, []);
        }

        batch.delete_cf(cf_undo, tip_hash.as_bytes());
        batch.delete_cf(cf_height, Self::height_key(tip_height));

        if tip_height == 0 {
            batch.put_cf(cf_meta, META_TIP_HEIGHT, 0u64.to_le_bytes());
            batch.put_cf(cf_meta, META_TIP_HASH, Hash256::ZERO.as_bytes());
        } else {
            batch.put_cf(cf_meta, META_TIP_HEIGHT, (tip_height - 1).to_le_bytes());
            batch.put_cf(cf_meta, META_TIP_HASH, block.header.prev_hash.as_bytes());
        }

        let current_utxo_count = self.get_meta_u64(META_UTXO_COUNT)?;
        let new_utxo_count = current_utxo_count + total_restored as u64 - total_removed;
        batch.put_cf(cf_meta, META_UTXO_COUNT, new_utxo_count.to_le_bytes());

        let current_supply = self.get_meta_u64(META_CIRCULATING_SUPPLY)?;
        let coinbase_val = Self::coinbase_value(&block);
        let new_supply = current_supply.saturating_sub(coinbase_val);
        batch.put_cf(cf_meta, META_CIRCULATING_SUPPLY, new_supply.to_le_bytes());

        self.db
            .write(batch)
            .map_err(|e| MeridianError::Storage(e.to_string()))?;

        Ok(DisconnectBlockResult {
            utxos_restored: total_restored,
            utxos_removed: total_removed as usize,
        })
    }

    fn get_utxo(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, MeridianError> {
        let cf = self.cf_handle(CF_UTXOS)?;
        let key = Self::encode_outpoint(outpoint)?;
        match self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(data) => {
                let (entry, _): (UtxoEntry, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| MeridianError::Storage(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn chain_tip(&self) -> Result<(u64, Hash256), MeridianError> {
        let cf = self.cf_handle(CF_METADATA)?;
        let hash = match self
            .db
            .get_cf(&cf, META_TIP_HASH)
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 32 => Hash256(bytes.try_into().unwrap()),
            _ => return Ok((0, Hash256::ZERO)),
        };

        if hash == Hash256::ZERO {
            return Ok((0, Hash256::ZERO));
        }

        let height = self.get_meta_u64(META_TIP_HEIGHT)?;
        Ok((height, hash))
    }

    fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, MeridianError> {
        let cf = self.cf_handle(CF_HEADERS)?;
        match self
            .db
            .get_cf(&cf, hash.as_bytes())
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(data) => {
                let (header, _): (BlockHeader, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| MeridianError::Storage(e.to_string()))?;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, MeridianError> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        match self
            .db
            .get_cf(&cf, hash.as_bytes())
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(data) => {
                let (block, _): (Block, _) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| MeridianError::Storage(e.to_string()))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, MeridianError> {
        let cf = self.cf_handle(CF_HEIGHT_INDEX)?;
        match self
            .db
            .get_cf(&cf, Self::height_key(height))
            .map_err(|e| MeridianError::Storage(e.to_string()))?
        {
            Some(bytes) if bytes.len() == 32 => Ok(Some(Hash256(bytes.try_into().unwrap()))),
            _ => Ok(None),
        }
    }

    fn utxo_count(&self) -> usize {
        self.get_meta_u64(META_UTXO_COUNT).unwrap_or(0) as usize
    }

    fn is_empty(&self) -> bool {
        match self.chain_tip() {
            Ok((_, hash)) => hash == Hash256::ZERO,
            Err(_) => true,
        }
    }

    fn iter_utxos(&self) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        let cf = self.cf_handle(CF_UTXOS)?;
        let mut utxos = Vec::new();

        let iter = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);
        for item in iter {
            let (key_bytes, value_bytes) = item.map_err(|e| MeridianError::Storage(e.to_string()))?;
            let (outpoint, _): (OutPoint, _) =
                bincode::decode_from_slice(&key_bytes, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;
            let (entry, _): (UtxoEntry, _) =
                bincode::decode_from_slice(&value_bytes, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;
            utxos.push((outpoint, entry));
        }

        Ok(utxos)
    }
}
