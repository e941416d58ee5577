//! Protocol Constants
//!
//! Centralized constants for aggsig signer nodes.
//! Wire-format sizes, default intervals and protocol limits live here so
//! every crate agrees on them.
//!
//! # Categories
//!
//! - **Version**: Protocol version strings
//! - **Cryptography**: Domain separation tag, EIP-2537 sizes
//! - **Timeouts**: Default timer and timeout values
//! - **Limits**: History size, TTL and port bounds

// ============================================================================
// Protocol Versions
// ============================================================================

/// Gossip protocol version carried in every message
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Capability advertised by nodes able to produce BLS partial signatures
pub const CAPABILITY_BLS_SIGNING: &str = "bls-signing";

// ============================================================================
// Cryptography
// ============================================================================

/// Domain separation tag for hash-to-curve. Must match on every node and on
/// the on-chain verifier.
pub const DEFAULT_DST: &str = "BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Maximum DST length allowed by expand_message_xmd
pub const MAX_DST_LEN: usize = 255;

/// Size of a BLS secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of one EIP-2537 field element slot (16 zero bytes + 48-byte element)
pub const EIP2537_FIELD_SIZE: usize = 64;

/// Zero padding in front of each field element
pub const EIP2537_FIELD_PADDING: usize = 16;

/// EIP-2537 encoded G1 point size
pub const EIP2537_G1_SIZE: usize = 128;

/// EIP-2537 encoded G2 point size
pub const EIP2537_G2_SIZE: usize = 256;

// ============================================================================
// Timeouts (milliseconds)
// ============================================================================

/// Interval between discovery rounds
pub const DEFAULT_GOSSIP_INTERVAL_MS: u64 = 30_000;

/// Interval between heartbeat / health-check rounds
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Interval between reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 60_000;

/// Silence after which an active node is suspected
pub const DEFAULT_SUSPICION_TIMEOUT_MS: u64 = 30_000;

/// Silence after which a suspected node is considered inactive
pub const DEFAULT_CLEANUP_TIMEOUT_MS: u64 = 120_000;

/// Per-probe timeout for HTTP health checks
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;

/// Timeout for establishing a gossip connection
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Base delay between connection retries (doubled each attempt)
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Upper bound for the retry backoff
pub const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Timeout for a remote partial-signature request
pub const DEFAULT_SIGN_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Limits
// ============================================================================

/// Number of message ids remembered for de-duplication
pub const DEFAULT_MAX_MESSAGE_HISTORY: usize = 1_000;

/// Relay hop budget for originated messages
pub const DEFAULT_MAX_TTL: u8 = 3;

/// Hard upper bound for the configured TTL
pub const MAX_ALLOWED_TTL: u8 = 16;

/// Connection attempts made for each bootstrap peer at startup
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Outbound queue depth per gossip connection
pub const CONNECTION_QUEUE_SIZE: usize = 256;

/// Lowest explicit port accepted for peer endpoints
pub const DEFAULT_MIN_PORT: u16 = 1024;

/// Highest explicit port accepted for peer endpoints
pub const DEFAULT_MAX_PORT: u16 = 65535;

// ============================================================================
// Selection scoring
// ============================================================================

/// Base score of every healthy candidate
pub const SCORE_BASE: f64 = 100.0;

/// Maximum penalty (in seconds of silence) applied to a candidate
pub const SCORE_MAX_AGE_PENALTY: f64 = 50.0;

/// Maximum bonus granted for heartbeats
pub const SCORE_MAX_HEARTBEAT_BONUS: u64 = 20;

/// Upper bound (exclusive) of the random jitter term
pub const SCORE_JITTER: f64 = 20.0;
