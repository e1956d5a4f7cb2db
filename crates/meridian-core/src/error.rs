//! Error types for the Meridian consensus engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown UTXO: {0}")] UnknownUtxo(String),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: usize, max: usize },
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("invalid coinbase: {0}")] InvalidCoinbase(String),
    #[error("serialization: {0}")] Serialization(String),
    #[error("immature coinbase or coinstake UTXO at input {index}")] ImmatureCoinbase { index: usize },
    #[error("zero-value output at index {0}")] ZeroValueOutput(usize),
    #[error("null outpoint in non-coinbase input {0}")] NullOutpointInRegularTx(usize),
    #[error("output amount exceeds MAX_MONEY")] AmountExceedsMaxMoney,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid PoW")] InvalidPoW,
    #[error("invalid PoS kernel")] InvalidKernel,
    #[error("invalid prev hash")] InvalidPrevHash,
    #[error("timestamp too far: {0}")] TimestampTooFar(i64),
    #[error("timestamp not after median-time-past")] TimestampNotAfterMtp,
    #[error("invalid merkle root")] InvalidMerkleRoot,
    #[error("merkle tree mutated (CVE-2012-2459)")] MerkleMutated,
    #[error("invalid reward: got {got}, expected max {expected}")] InvalidReward { got: u64, expected: u64 },
    #[error("oversized: {size} > {max}")] OversizedBlock { size: usize, max: usize },
    #[error("no coinbase")] NoCoinbase,
    #[error("first transaction is not coinbase")] FirstTxNotCoinbase,
    #[error("multiple coinbase transactions")] MultipleCoinbase,
    #[error("PoS block missing coinstake as second transaction")] MissingCoinstake,
    #[error("PoS block signature invalid")] InvalidBlockSignature,
    #[error("duplicate txid: {0}")] DuplicateTxid(String),
    #[error("double spend across transactions: {0}")] DoubleSpend(String),
    #[error("invalid difficulty: got {got}, expected {expected}")] InvalidDifficulty { got: u32, expected: u32 },
    #[error("BIP30 violation: tx-hash {0} reintroduced with unspent outputs")] Bip30Violation(String),
    #[error("tx error in {index}: {source}")] TransactionError { index: usize, source: TransactionError },
    #[error("block hash does not match checkpoint")] CheckpointMismatch,
    #[error("unknown parent block: {0}")] UnknownParent(String),
    #[error("reorg would unwind past a checkpoint")] ReorgBelowCheckpoint,
    #[error("side branch carries insufficient work/stake since the last checkpoint")] InsufficientWorkSinceCheckpoint,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("stake input younger than STAKE_MIN_AGE")] StakeTooYoung,
    #[error("kernel hash exceeds weighted target")] KernelAboveTarget,
    #[error("stake input not found: {0}")] MissingStakeInput(String),
    #[error("stake modifier not yet generated for this block")] ModifierNotGenerated,
    #[error("duplicate stake: outpoint {outpoint} at time {time}")] DuplicateStake { outpoint: String, time: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetargetError {
    #[error("invalid retarget parameter set: FutureDrift/TargetSpacing/TargetTimeSpan mismatch")]
    InvalidParameterSet,
    #[error("insufficient history for retarget at height {0}")] InsufficientHistory(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ntp1Error {
    #[error("duplicate token symbol: {0}")] DuplicateSymbol(String),
    #[error("malformed NTP1 op-return payload")] MalformedPayload,
    #[error("token amount overflow")] AmountOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForkError {
    #[error("unknown fork: {0}")] UnknownFork(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("message too large: {size}")] MessageTooLarge { size: usize },
    #[error("timeout")] Timeout,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already in pool: {0}")] AlreadyExists(String),
    #[error("conflicts with pool tx {existing_txid} on outpoint {outpoint}")] Conflict { new_txid: String, existing_txid: String, outpoint: String },
    #[error("already confirmed on chain: {0}")] AlreadyConfirmed(String),
    #[error("pool full")] PoolFull,
    #[error("not standard: {0}")] NotStandard(String),
    #[error("fee below minimum relay fee")] FeeTooLow,
    #[error("free-relay rate limit exceeded")] FreeRelayLimitExceeded,
    #[error("missing inputs")] MissingInputs,
    #[error("internal: {0}")] Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("empty chain: no blocks connected")] EmptyChain,
    #[error("block not found: {0}")] BlockNotFound(String),
    #[error("undo data missing for block: {0}")] UndoDataMissing(String),
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
    #[error("duplicate block: {0}")] DuplicateBlock(String),
    #[error("missing UTXO: {0}")] MissingUtxo(String),
    #[error("unknown parent block: {0}")] UnknownParent(String),
}

/// The kind of validation failure, used for reject-message classification
/// and misbehaviour scoring. Mirrors the closed set of outcomes a
/// transaction or block validator may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    Consensus,
    RecentConsensus,
    NotStandard,
    MissingInputs,
    InvalidInputs,
    DoubleSpend,
    Conflict,
    MempoolPolicy,
    Ntp1,
    DuplicateStake,
    Checkpoint,
}

impl ValidationKind {
    /// DoS score contributed by a failure of this kind; `None` means the
    /// source is never penalised (transient or policy-only failures).
    pub fn dos_score(&self) -> Option<u32> {
        match self {
            ValidationKind::Consensus
            | ValidationKind::InvalidInputs
            | ValidationKind::DuplicateStake => Some(crate::constants::DOS_SCORE_CONSENSUS),
            ValidationKind::RecentConsensus => Some(crate::constants::DOS_SCORE_RECENT_CONSENSUS),
            ValidationKind::NotStandard
            | ValidationKind::MissingInputs
            | ValidationKind::DoubleSpend
            | ValidationKind::Conflict
            | ValidationKind::MempoolPolicy
            | ValidationKind::Ntp1
            | ValidationKind::Checkpoint => None,
        }
    }
}

/// Carries `{kind, reason-tag, debug-message}` for a rejected transaction
/// or block, as returned to the top-level message dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationState {
    pub kind: ValidationKind,
    pub reason: String,
    pub debug_message: String,
}

impl ValidationState {
    pub fn new(kind: ValidationKind, reason: impl Into<String>, debug_message: impl Into<String>) -> Self {
        Self { kind, reason: reason.into(), debug_message: debug_message.into() }
    }
}

#[derive(Error, Debug)]
pub enum MeridianError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Kernel(#[from] KernelError),
    #[error(transparent)] Retarget(#[from] RetargetError),
    #[error(transparent)] Ntp1(#[from] Ntp1Error),
    #[error(transparent)] Fork(#[from] ForkError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Mempool(#[from] MempoolError),
    #[error(transparent)] ChainState(#[from] ChainStateError),
    #[error("storage: {0}")] Storage(String),
}
