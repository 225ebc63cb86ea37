// Library exports for cosmotx

pub mod account;
pub mod broadcast;
pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod gas;
pub mod grants;
pub mod pipeline;
pub mod proto;
pub mod signdoc;
pub mod signer;
pub mod swap;
pub mod wallet;

// Re-export main types for convenience
pub use account::{Account, AccountFetcher};
pub use broadcast::{BroadcastMode, BroadcastResult, Broadcaster};
pub use chain::{ChainProfile, CurveKind, RawChainMeta};
pub use codec::MsgPayload;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use gas::GasEstimator;
pub use pipeline::{TxOutcome, TxPipeline, TxRequest};
pub use signdoc::StdFee;
pub use signer::{EvmSigner, SignedTx, StandardSigner, TxSigner};
pub use wallet::LocalWallet;
