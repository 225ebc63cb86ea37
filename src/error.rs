use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the transaction engine.
///
/// Recoverable variants (`ChainIdMismatch`, `SignerDisconnected`, network
/// errors during endpoint failover) are retried locally at most once; every
/// other variant is returned to the caller as-is so UI or automation layers
/// can present a specific message.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The address has never received funds on this chain. Fatal, no retry.
    #[error("account {address} not found on chain (never funded)")]
    AccountNotFound { address: String },

    /// Unknown account envelope. The fetcher degrades to address-only data
    /// where it can; signing against such an account is fatal.
    #[error("unsupported account type {type_url}")]
    UnsupportedAccountType { type_url: String },

    #[error("account query failed with HTTP {status}: {body}")]
    AccountFetch { status: u16, body: String },

    /// A message in the batch could not be encoded. Aborts the whole batch.
    #[error("failed to encode {type_url}: {reason}")]
    Encoding { type_url: String, reason: String },

    #[error("unknown message type {type_url}")]
    UnknownMessageType { type_url: String },

    /// Non-fatal: callers fall back to the statically supplied fee.
    #[error("gas simulation failed: {0}")]
    Simulation(String),

    #[error("insufficient balance of {denom}: need {required}, have {available} (short {shortfall})")]
    InsufficientBalance {
        denom: String,
        required: String,
        available: String,
        shortfall: String,
    },

    #[error("live network id {actual} does not match configured chain id {expected}")]
    ChainIdMismatch { expected: String, actual: String },

    /// Transient key-holder disconnect. Retried exactly once.
    #[error("signer disconnected")]
    SignerDisconnected,

    #[error("signing failed: {0}")]
    Signing(String),

    /// The chain accepted the HTTP request but rejected execution. The raw
    /// log is surfaced verbatim, never paraphrased.
    #[error("transaction rejected with code {code}: {raw_log}")]
    BroadcastRejected {
        code: u32,
        tx_hash: String,
        raw_log: String,
    },

    #[error("broadcast failed with HTTP {status}: {body}")]
    BroadcastHttp { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("all {attempted} endpoint(s) failed or timed out")]
    NetworkTimeout { attempted: usize },

    #[error("invalid chain metadata: {0}")]
    InvalidProfile(String),

    /// Key derivation or address encoding failed.
    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid amount {value}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("pool liquidity too low: requested {requested} against reserve {reserve}")]
    InsufficientLiquidity { requested: String, reserve: String },

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Revoking without a known grantee would silently no-op on chain, so it
    /// is rejected up front.
    #[error("no active authorization found for {granter} on {validator}")]
    NoActiveGrant { granter: String, validator: String },
}

impl EngineError {
    /// Whether trying the next endpoint in the failover list makes sense.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EngineError::Network(_)
                | EngineError::NetworkTimeout { .. }
                | EngineError::AccountFetch { status: 500..=599, .. }
                | EngineError::BroadcastHttp { status: 500..=599, .. }
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}
