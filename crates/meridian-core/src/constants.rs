//! Protocol constants. All monetary values in mrills (1 MER = 10^8 mrills).

pub const COIN: u64 = 100_000_000;

/// Cap on PoW-subsidy-issued coins; PoS coin-age rewards are issued
/// separately and are not bounded by this constant.
pub const MAX_SUBSIDY_SUPPLY: u64 = 21_000_000 * COIN;

/// Upper bound on any single output or output sum, a sanity ceiling
/// independent of the eventual total supply.
pub const MAX_MONEY: u64 = 2_000_000_000 * COIN;

pub const INITIAL_SUBSIDY: u64 = 50 * COIN;
pub const SUBSIDY_HALVING_INTERVAL: u64 = 210_000;

pub const MAGIC_BYTES: [u8; 4] = *b"MRDN";
pub const DEFAULT_P2P_PORT: u16 = 18444;
pub const DEFAULT_RPC_PORT: u16 = 18443;

pub const MAX_BLOCK_SIZE: usize = 1_048_576;
pub const MAX_STANDARD_TX_SIZE: usize = 100_000;
pub const MAX_TX_SIZE: usize = 100_000;
pub const MAX_INPUTS: usize = 1000;
pub const MAX_OUTPUTS: usize = 1000;
pub const MAX_SCRIPT_SIG_SIZE: usize = 500;

pub const COINBASE_MATURITY: u64 = 100;
pub const MIN_COINBASE_SCRIPT_LEN: usize = 2;
pub const MAX_COINBASE_SCRIPT_LEN: usize = 100;
pub const MAX_LOCATOR_SIZE: usize = 64;
pub const LOCKTIME_THRESHOLD: u64 = 500_000_000;
pub const MIN_RELAY_FEE_PER_KB: u64 = 1000;

/// Maximum seconds a block timestamp may exceed the local adjusted clock.
pub const FUTURE_DRIFT: i64 = 600;
/// Target spacing between blocks, seconds.
pub const TARGET_SPACING: i64 = 30;
/// Retarget window span, seconds. `TARGET_TIMESPAN / TARGET_SPACING` gives
/// `N`, the interval count used by the V1/V2/V3 formulas.
pub const TARGET_TIMESPAN: i64 = 7200;
/// Number of blocks averaged by the V3 retarget formula.
pub const TARGET_AVERAGE_BLOCK_COUNT: u64 = 24;

/// V3 retarget formula constants (frozen; changing them breaks the
/// documented ±3-5% stability bound).
pub const RETARGET_V3_K: i64 = 15;
pub const RETARGET_V3_L: i64 = 7;
pub const RETARGET_V3_M: i64 = 90;

/// Height below which the V1 retarget (no negative-spacing guard) applies.
pub const RETARGET_V1_HEIGHT_LIMIT: u64 = 2000;

/// Minimum age (seconds) an output must have before it is eligible as a
/// PoS stake input.
pub const STAKE_MIN_AGE: u64 = 60 * 60; // 1 hour
/// Coin-age weighting cap (seconds): age beyond this no longer adds weight.
pub const STAKE_MAX_AGE: u64 = 60 * 60 * 24 * 90; // 90 days

/// Seconds of chain time between stake-modifier regenerations. A new
/// modifier is only selected the first time a block's timestamp crosses
/// one of these boundaries relative to its parent's own generation time;
/// frozen at 6 hours, the value carried by every PPCoin-lineage chain.
pub const MODIFIER_INTERVAL: u64 = 6 * 60 * 60;

/// Number of ancestor timestamps (inclusive of the node itself) averaged
/// for median-time-past.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Bound on the orphan block pool (by block count).
pub const MAX_ORPHAN_BLOCKS: usize = 750;
/// Bound on the orphan (loose) transaction pool.
pub const MAX_ORPHAN_TRANSACTIONS: usize = 100;
/// Orphan transactions larger than this are dropped outright.
pub const MAX_ORPHAN_TX_SIZE: usize = 5_000;

/// `MAX_INV_SZ` from the network port contract.
pub const MAX_INV_SIZE: usize = 50_000;
/// Misbehaviour score at which a peer is banned.
pub const BAN_SCORE_THRESHOLD: u32 = 100;
pub const DOS_SCORE_CONSENSUS: u32 = 100;
pub const DOS_SCORE_RECENT_CONSENSUS: u32 = 10;

/// Per-peer sliding-window rate limits, messages/requests per 60 seconds.
pub const RATE_LIMIT_BLOCKS_PER_MIN: u32 = 30;
pub const RATE_LIMIT_TXS_PER_MIN: u32 = 300;
pub const RATE_LIMIT_HEADERS_PER_MIN: u32 = 10;

/// Free-transaction relay rate limit, in bytes/minute, before decay-based
/// throttling rejects further low-fee relay.
pub const FREE_RELAY_BYTES_PER_MINUTE: u64 = 10 * 1000;
/// Half-life, in seconds, of the decaying free-relay counter.
pub const FREE_RELAY_HALF_LIFE_SECS: u64 = 600;

/// Hard-coded `(height, block_hash)` pairs pinning known-good history.
/// Empty until a release cuts and records its own checkpoints.
pub const CHECKPOINTS: &[(u64, [u8; 32])] = &[];
