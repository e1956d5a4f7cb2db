//! Trait interfaces for the Meridian protocol.
//!
//! These traits define the contracts between crates:
//! - [`NetworkService`] — P2P networking (meridian-network implements)

use crate::error::NetworkError;
use crate::types::{Block, BlockHeader, Hash256, Transaction, U256};

/// P2P network operations.
///
/// Abstracts block and transaction propagation over libp2p.
/// Implementations handle the actual transport, peer management,
/// and Gossipsub protocol. Implemented by meridian-network.
pub trait NetworkService: Send + Sync {
    /// Broadcast a validated block to all connected peers.
    fn broadcast_block(&self, block: &Block) -> Result<(), NetworkError>;

    /// Broadcast a validated transaction to all connected peers.
    fn broadcast_transaction(&self, tx: &Transaction) -> Result<(), NetworkError>;

    /// Number of currently connected peers.
    fn peer_count(&self) -> usize;

    /// Whether the node has at least one connected peer.
    ///
    /// Default implementation: `peer_count() > 0`.
    fn is_connected(&self) -> bool {
        self.peer_count() > 0
    }

    /// Request a specific block from peers by hash.
    fn request_block(&self, hash: &Hash256) -> Result<(), NetworkError>;

    /// Request block headers starting from the given locator hashes.
    ///
    /// Locator hashes are ordered newest-first, allowing peers to find
    /// the common ancestor and send headers from there.
    fn request_headers(&self, locator: &[Hash256]) -> Result<(), NetworkError>;
}
