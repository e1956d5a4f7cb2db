//! Full node composition and event loop.
//!
//! The [`Node`] struct wires together the [`ConsensusEngine`] (which owns
//! the `RocksStore` chain state, the orphan pools, and the mempool), the P2P
//! network, and a sync state machine into a running full node.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Number of blocks a peer must be ahead of us to trigger IBD mode (~1 day at 10min/block).
const IBD_THRESHOLD_BLOCKS: u64 = 144;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use meridian_consensus::engine::{AcceptOutcome, ConsensusEngine};
use meridian_core::error::MeridianError;
use meridian_core::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, UtxoEntry};
use meridian_network::{
    NetworkEvent, NetworkNode, MeridianRequest, MeridianResponse, StorageQuery, SyncAction, SyncManager,
    SyncState,
};

use crate::config::NodeConfig;
use crate::storage::RocksStore;

/// Runtime metrics for the node.
///
/// All fields use [`AtomicU64`] with [`Ordering::Relaxed`] — these are
/// approximate counters, not used for consensus or consistency guarantees.
pub struct NodeMetrics {
    /// Total blocks connected since startup.
    pub blocks_connected: AtomicU64,
    /// Total chain reorganizations since startup.
    pub reorgs: AtomicU64,
    /// Current mempool size (updated on each insert/eviction).
    pub mempool_size: AtomicU64,
    /// Current peer count.
    pub peer_count: AtomicU64,
}

impl NodeMetrics {
    /// Create a new [`NodeMetrics`] with all counters zeroed.
    pub fn new() -> Self {
        Self {
            blocks_connected: AtomicU64::new(0),
            reorgs: AtomicU64::new(0),
            mempool_size: AtomicU64::new(0),
            peer_count: AtomicU64::new(0),
        }
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// The full node, composing the consensus engine, mempool, and network.
pub struct Node {
    /// Block acceptance, reorganization, orphan pools, and mempool.
    engine: Mutex<ConsensusEngine<RocksStore>>,
    /// Chain synchronization state machine.
    sync_manager: Mutex<SyncManager>,
    /// P2P network node (optional — None if network disabled).
    network: Option<NetworkNode>,
    /// Receiver for network events (behind tokio Mutex for async recv).
    event_rx: Option<tokio::sync::Mutex<broadcast::Receiver<NetworkEvent>>>,
    /// Receiver for storage queries from peers (behind tokio Mutex for async recv).
    query_rx: Option<tokio::sync::Mutex<mpsc::UnboundedReceiver<StorageQuery>>>,
    /// Node configuration.
    config: NodeConfig,
    /// Runtime metrics counters.
    metrics: NodeMetrics,
    /// Whether we are in Initial Block Download mode.
    ///
    /// Set to `true` when a peer tip is [`IBD_THRESHOLD_BLOCKS`] or more ahead
    /// of our current height. Cleared once we catch up within that threshold.
    is_ibd: AtomicBool,
    /// The best peer height seen since the last IBD-activation check.
    ///
    /// Updated whenever we receive a `ChainTip` response; used to detect
    /// when we have caught up and can exit IBD mode.
    best_peer_height: AtomicU64,
}

impl Node {
    fn build_engine(config: &NodeConfig) -> Result<ConsensusEngine<RocksStore>, MeridianError> {
        let store = RocksStore::open(config.db_path())?;
        ConsensusEngine::new(store, config.forks.clone())
    }

    /// Create a new node with the given configuration.
    ///
    /// Opens storage (auto-connects genesis if empty), creates the consensus
    /// engine, and starts the P2P network.
    pub async fn new(config: NodeConfig) -> Result<std::sync::Arc<Self>, MeridianError> {
        let engine = Mutex::new(Self::build_engine(&config)?);

        let (network, event_rx, query_rx) = match NetworkNode::start(config.network.clone()).await {
            Ok((net, rx, qrx)) => (
                Some(net),
                Some(tokio::sync::Mutex::new(rx)),
                Some(tokio::sync::Mutex::new(qrx)),
            ),
            Err(e) => {
                warn!("failed to start network: {e}; running without P2P");
                (None, None, None)
            }
        };

        let node = std::sync::Arc::new(Self {
            engine,
            sync_manager: Mutex::new(SyncManager::new()),
            network,
            event_rx,
            query_rx,
            config,
            metrics: NodeMetrics::new(),
            is_ibd: AtomicBool::new(false),
            best_peer_height: AtomicU64::new(0),
        });

        Ok(node)
    }

    /// Create a node without networking (for testing or offline tooling).
    pub fn without_network(config: NodeConfig) -> Result<std::sync::Arc<Self>, MeridianError> {
        let engine = Mutex::new(Self::build_engine(&config)?);

        let node = std::sync::Arc::new(Self {
            engine,
            sync_manager: Mutex::new(SyncManager::new()),
            network: None,
            event_rx: None,
            query_rx: None,
            config,
            metrics: NodeMetrics::new(),
            is_ibd: AtomicBool::new(false),
            best_peer_height: AtomicU64::new(0),
        });

        Ok(node)
    }

    /// Returns `true` if the node is currently in Initial Block Download mode.
    ///
    /// During IBD incoming transactions from peers are ignored and transaction
    /// relay is suppressed to reduce overhead while catching up.
    pub fn is_ibd(&self) -> bool {
        self.is_ibd.load(Ordering::Relaxed)
    }

    /// Process an incoming block: run the full acceptance procedure
    /// (duplicate/orphan/side-branch/reorg), then update metrics and
    /// broadcast to peers on success.
    pub fn process_block(&self, block: Block, now: u32) -> Result<AcceptOutcome, MeridianError> {
        let outcome = {
            let mut engine = self.engine.lock();
            engine
                .accept_block(block.clone(), now)
                .map_err(|rejected| MeridianError::Storage(rejected.to_string()))?
        };

        match &outcome {
            AcceptOutcome::Connected { height, .. } => {
                info!(height, "connected block");
                self.metrics.blocks_connected.fetch_add(1, Ordering::Relaxed);
                self.update_mempool_metric();

                if let Some(ref net) = self.network {
                    if let Err(e) = meridian_core::traits::NetworkService::broadcast_block(net, &block) {
                        debug!("failed to broadcast block: {e}");
                    }
                }

                if self.is_ibd() {
                    if *height % 1000 == 0 {
                        info!(height, "IBD progress");
                    }
                    let best_peer = self.best_peer_height.load(Ordering::Relaxed);
                    if best_peer == 0 || best_peer.saturating_sub(*height) < IBD_THRESHOLD_BLOCKS {
                        self.is_ibd.store(false, Ordering::Relaxed);
                        info!(height, "exiting IBD mode");
                    }
                }
            }
            AcceptOutcome::SideBranch { hash, height } => {
                debug!(%hash, height, "accepted block as side branch");
            }
            AcceptOutcome::Orphan => {
                debug!("parked block as orphan");
            }
            AcceptOutcome::Duplicate => {}
        }

        Ok(outcome)
    }

    fn update_mempool_metric(&self) {
        let count = self.engine.lock().mempool().len();
        self.metrics.mempool_size.store(count as u64, Ordering::Relaxed);
    }

    /// Process and admit a new transaction to the mempool.
    ///
    /// Validates against the active UTXO set, parks it as an orphan if its
    /// inputs are not yet resolvable, and otherwise broadcasts it to peers.
    pub fn process_transaction(&self, tx: Transaction, now: u32) -> Result<Hash256, MeridianError> {
        let result = {
            let mut engine = self.engine.lock();
            engine.submit_transaction(tx.clone(), now, false)
        };

        match result {
            Ok(txid) => {
                self.update_mempool_metric();
                debug!(%txid, "added transaction to mempool");

                if !self.is_ibd() {
                    if let Some(ref net) = self.network {
                        if let Err(e) =
                            meridian_core::traits::NetworkService::broadcast_transaction(net, &tx)
                        {
                            debug!("failed to broadcast transaction: {e}");
                        }
                    }
                }

                Ok(txid)
            }
            Err(MeridianError::Mempool(meridian_core::error::MempoolError::MissingInputs)) => {
                let txid = tx.txid().map_err(MeridianError::from)?;
                let encoded = bincode::encode_to_vec(&tx, bincode::config::standard())
                    .map_err(|e| MeridianError::Storage(e.to_string()))?;
                let size = encoded.len();
                self.engine.lock().park_orphan_tx(txid, tx, size);
                debug!(%txid, "storing transaction as orphan (unknown UTXO)");
                Ok(txid)
            }
            Err(e) => Err(e),
        }
    }

    /// Run the main event loop, processing network events and storage queries.
    ///
    /// This method runs indefinitely, dispatching incoming blocks and
    /// transactions from the P2P network and answering peer storage queries.
    /// Two interval tickers drive the sync state machine: a 5-second tick
    /// to advance sync and a 30-second tick to check for request timeouts.
    pub async fn run(self: &std::sync::Arc<Self>) {
        let event_rx = match &self.event_rx {
            Some(rx) => rx,
            None => {
                warn!("no network event receiver; event loop idle");
                loop {
                    tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
                }
            }
        };

        if self.query_rx.is_some() {
            let node = std::sync::Arc::clone(self);
            tokio::spawn(async move {
                let mut rx = node.query_rx.as_ref().unwrap().lock().await;
                while let Some(query) = rx.recv().await {
                    let response = node.handle_storage_query(&query.request);
                    if let Some(ref net) = node.network {
                        if let Err(e) = net.send_response(query.response_channel, response) {
                            debug!("failed to send response to peer: {e}");
                        }
                    }
                }
            });
        }

        let mut sync_tick = tokio::time::interval(tokio::time::Duration::from_secs(5));
        let mut timeout_tick = tokio::time::interval(tokio::time::Duration::from_secs(30));

        loop {
            let maybe_event = {
                let mut rx = event_rx.lock().await;
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => Some(Ok(event)),
                            Err(e) => Some(Err(e)),
                        }
                    }
                    _ = sync_tick.tick() => None,
                    _ = timeout_tick.tick() => {
                        self.sync_manager.lock().check_timeouts();
                        None
                    }
                }
            };

            let now = now_unix();

            match maybe_event {
                Some(Ok(event)) => match event {
                    NetworkEvent::BlockReceived(block) => {
                        if let Err(e) = self.process_block(block, now) {
                            debug!("rejected block from peer: {e}");
                        }
                    }
                    NetworkEvent::TransactionReceived(tx) => {
                        if self.is_ibd() {
                            debug!("skipping transaction during IBD");
                        } else if let Err(e) = self.process_transaction(tx, now) {
                            debug!("rejected transaction from peer: {e}");
                        }
                    }
                    NetworkEvent::BlockRequested(hash) => {
                        debug!(%hash, "peer requested block via gossipsub");
                    }
                    NetworkEvent::HeadersRequested(locator) => {
                        debug!(count = locator.len(), "peer requested headers via gossipsub");
                    }
                    NetworkEvent::PeerConnected(peer_id) => {
                        info!(%peer_id, "peer connected");
                        self.sync_manager.lock().on_peer_connected(peer_id);
                    }
                    NetworkEvent::PeerDisconnected(peer_id) => {
                        info!(%peer_id, "peer disconnected");
                        self.sync_manager.lock().on_peer_disconnected(peer_id);
                    }
                    NetworkEvent::ChainTipRequested(peer_id) => {
                        debug!(%peer_id, "peer requested chain tip");
                    }
                    NetworkEvent::RequestResponse { peer, response } => {
                        debug!(%peer, "received response from peer");
                        match response {
                            MeridianResponse::ChainTip { height, hash } => {
                                debug!(%peer, height, %hash, "peer chain tip");
                                self.sync_manager.lock().on_peer_tip(peer, height, hash);

                                let prev_best = self.best_peer_height.load(Ordering::Relaxed);
                                if height > prev_best {
                                    self.best_peer_height.store(height, Ordering::Relaxed);
                                }
                                let our_height = self.chain_tip().map(|(h, _)| h).unwrap_or(0);
                                if height.saturating_sub(our_height) >= IBD_THRESHOLD_BLOCKS {
                                    self.is_ibd.store(true, Ordering::Relaxed);
                                    info!(our_height, peer_height = height, "entering IBD mode");
                                }
                            }
                            MeridianResponse::Headers(headers) => {
                                debug!(%peer, count = headers.len(), "received headers from peer");
                                self.sync_manager.lock().on_headers_received(headers);
                            }
                            MeridianResponse::Block(Some(block)) => {
                                debug!(%peer, "received block from peer via request-response");
                                self.sync_manager.lock().on_block_received(block.clone());
                                if let Err(e) = self.process_block(block, now) {
                                    debug!("failed to connect synced block: {e}");
                                }
                            }
                            MeridianResponse::Block(None) => {
                                debug!(%peer, "peer returned no block for request");
                            }
                        }
                    }
                },
                Some(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(skipped = n, "lagged behind on network events");
                }
                Some(Err(broadcast::error::RecvError::Closed)) => {
                    info!("network event channel closed, shutting down");
                    break;
                }
                None => {
                    let our_height = self.chain_tip().map(|(h, _)| h).unwrap_or(0);
                    let actions = {
                        let locator = self.get_block_locator().unwrap_or_default();
                        self.sync_manager.lock().next_actions(our_height, || locator.clone())
                    };
                    for action in actions {
                        match action {
                            SyncAction::RequestChainTip(peer) => {
                                if let Some(ref net) = self.network {
                                    if let Err(e) = net.send_request(peer, MeridianRequest::GetChainTip) {
                                        debug!("failed to send GetChainTip: {e}");
                                    }
                                }
                            }
                            SyncAction::RequestHeaders { peer, locator } => {
                                if let Some(ref net) = self.network {
                                    if let Err(e) =
                                        net.send_request(peer, MeridianRequest::GetHeaders(locator))
                                    {
                                        debug!("failed to send GetHeaders: {e}");
                                    }
                                }
                            }
                            SyncAction::RequestBlock { peer, hash } => {
                                if let Some(ref net) = self.network {
                                    if let Err(e) = net.send_request(peer, MeridianRequest::GetBlock(hash)) {
                                        debug!("failed to send GetBlock: {e}");
                                    }
                                }
                            }
                            SyncAction::ConnectBlock(block) => {
                                if let Err(e) = self.process_block(block, now) {
                                    debug!("failed to connect block from sync: {e}");
                                }
                            }
                            SyncAction::SyncComplete => {
                                info!("sync complete");
                            }
                            SyncAction::Wait => {}
                        }
                    }
                }
            }
        }
    }

    /// Handle a storage query from a peer, returning the appropriate response.
    fn handle_storage_query(&self, request: &MeridianRequest) -> MeridianResponse {
        match request {
            MeridianRequest::GetChainTip => {
                let (height, hash) = self.chain_tip().unwrap_or((0, Hash256::ZERO));
                MeridianResponse::ChainTip { height, hash }
            }
            MeridianRequest::GetHeaders(locator) => {
                let ancestor = self.find_common_ancestor(locator).unwrap_or(None);
                match ancestor {
                    Some((_height, hash)) => {
                        let headers = self.get_headers_after(&hash, 2000).unwrap_or_default();
                        MeridianResponse::Headers(headers)
                    }
                    None => MeridianResponse::Headers(vec![]),
                }
            }
            MeridianRequest::GetBlock(hash) => {
                let block = self.get_block(hash).unwrap_or(None);
                MeridianResponse::Block(block)
            }
        }
    }

    // --- Query methods for RPC ---

    /// Current chain tip as `(height, block_hash)`.
    pub fn chain_tip(&self) -> Result<(u64, Hash256), MeridianError> {
        self.with_store(|store| store.chain_tip())
    }

    /// Get a full block by hash.
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>, MeridianError> {
        self.with_store(|store| store.get_block(hash))
    }

    /// Get a block header by hash.
    pub fn get_block_header(&self, hash: &Hash256) -> Result<Option<BlockHeader>, MeridianError> {
        self.with_store(|store| store.get_block_header(hash))
    }

    /// Get the block hash at a given height.
    pub fn get_block_hash(&self, height: u64) -> Result<Option<Hash256>, MeridianError> {
        self.with_store(|store| store.get_block_hash(height))
    }

    /// Run a closure against the underlying `RocksStore` while holding the
    /// engine lock. Exposed as a narrow seam since `ConsensusEngine` does not
    /// hand out its store directly.
    fn with_store<T>(&self, f: impl FnOnce(&RocksStore) -> Result<T, MeridianError>) -> Result<T, MeridianError> {
        let engine = self.engine.lock();
        f(engine.store())
    }

    /// Mempool info: transaction count, total bytes, total fees.
    pub fn mempool_info(&self) -> (usize, usize, u64) {
        let engine = self.engine.lock();
        let pool = engine.mempool();
        (pool.len(), pool.total_bytes(), pool.total_fees())
    }

    /// Get a mempool transaction by txid.
    pub fn get_mempool_tx(&self, txid: &Hash256) -> Option<Transaction> {
        let engine = self.engine.lock();
        engine.mempool().get(txid).map(|entry| entry.tx.clone())
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.network
            .as_ref()
            .map(meridian_core::traits::NetworkService::peer_count)
            .unwrap_or(0)
    }

    /// Current circulating supply in mrills.
    pub fn circulating_supply(&self) -> Result<u64, MeridianError> {
        self.with_store(|store| store.circulating_supply())
    }

    /// Node configuration reference.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current synchronization state.
    pub fn sync_state(&self) -> SyncState {
        self.sync_manager.lock().state().clone()
    }

    /// Runtime metrics for this node instance.
    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    /// Create a PoW block template for mining.
    pub fn create_block_template(
        &self,
        coinbase_pubkey_hash: &Hash256,
        timestamp: u32,
    ) -> Result<Block, MeridianError> {
        self.engine.lock().create_pow_template(*coinbase_pubkey_hash, timestamp)
    }

    /// Iterate over all UTXOs (for address-based queries).
    pub fn iter_utxos(&self) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        self.with_store(|store| store.iter_utxos())
    }

    /// Get UTXOs for an address using the indexed lookup.
    pub fn get_utxos_by_address(
        &self,
        pubkey_hash: &Hash256,
    ) -> Result<Vec<(OutPoint, UtxoEntry)>, MeridianError> {
        self.with_store(|store| store.get_utxos_by_address(pubkey_hash))
    }

    /// Get a geometric block locator for chain sync.
    pub fn get_block_locator(&self) -> Result<Vec<Hash256>, MeridianError> {
        self.with_store(|store| store.get_block_locator())
    }

    /// Find the common ancestor from a peer's block locator.
    pub fn find_common_ancestor(
        &self,
        locator: &[Hash256],
    ) -> Result<Option<(u64, Hash256)>, MeridianError> {
        self.with_store(|store| store.find_common_ancestor(locator))
    }

    /// Get headers after a given hash (up to max_count, capped at 2000).
    pub fn get_headers_after(
        &self,
        hash: &Hash256,
        max_count: usize,
    ) -> Result<Vec<BlockHeader>, MeridianError> {
        self.with_store(|store| store.get_headers_after(hash, max_count))
    }

    /// Number of orphan blocks currently held in the orphan pool.
    ///
    /// Exposed primarily for monitoring and testing.
    pub fn orphan_count(&self) -> usize {
        self.engine.lock().orphan_block_count()
    }

    /// Number of orphan transactions currently held in the orphan pool.
    pub fn orphan_tx_count(&self) -> usize {
        self.engine.lock().orphan_tx_count()
    }

    /// Number of UTXOs currently in the UTXO set.
    ///
    /// Uses a full scan — for RPC informational use only.
    pub fn utxo_count(&self) -> usize {
        self.with_store(|store| Ok(store.iter_utxos()?.len())).unwrap_or(0)
    }
}

fn now_unix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
