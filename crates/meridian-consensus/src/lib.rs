//! # meridian-consensus — block acceptance, reorganization, and mempool admission.
//!
//! Builds on `meridian-core`'s stateless validation and scoring functions to
//! provide the stateful pieces: the block-acceptance procedure (duplicate
//! and duplicate-stake rejection, orphan parking, chain-trust comparison,
//! and reorganization) in [`engine`], checkpoint pinning in [`checkpoint`],
//! and the bounded orphan pools in [`orphan`].

pub mod checkpoint;
pub mod engine;
pub mod orphan;

pub use engine::{AcceptOutcome, ChainEvent, ConsensusEngine, RejectedBlock};
