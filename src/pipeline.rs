//! The single transaction pipeline: every outbound transaction, whatever the
//! message mix, goes through [`TxPipeline::execute_transaction`].
//!
//! Attempts against one (chain, address) pair are serialized so concurrent
//! callers cannot race the account sequence. REST endpoints are tried in
//! declared order and an endpoint is only skipped on transport failure; a
//! definitive rejection from the chain ends the attempt immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::account::{Account, AccountFetcher};
use crate::broadcast::{BroadcastMode, BroadcastResult, Broadcaster};
use crate::chain::ChainProfile;
use crate::codec::{self, MsgPayload};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::gas::{self, GasEstimator};
use crate::proto::Any;
use crate::signdoc::StdFee;
use crate::signer::{self, SignedTx, TxSigner};

const SIGNER_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// One transaction to execute.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub messages: Vec<MsgPayload>,
    pub memo: String,
    pub mode: BroadcastMode,
    /// Skip simulation and go straight to the static fallback fee.
    pub skip_simulation: bool,
}

impl TxRequest {
    pub fn new(messages: Vec<MsgPayload>) -> Self {
        Self {
            messages,
            memo: String::new(),
            mode: BroadcastMode::Sync,
            skip_simulation: false,
        }
    }
}

/// What a successful pipeline run produced.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub result: BroadcastResult,
    pub fee: StdFee,
    /// REST endpoint the transaction ultimately went through.
    pub endpoint: String,
}

pub struct TxPipeline {
    http: reqwest::Client,
    config: EngineConfig,
    locks: StdMutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl TxPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// The serialization point for one (chain, address) pair. Entries are
    /// created on first use and live for the pipeline's lifetime.
    fn lock_for(&self, chain_id: &str, address: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((chain_id.to_string(), address.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run the whole flow: verify chain id, fetch account state, encode,
    /// price, preflight the balance, sign and broadcast.
    pub async fn execute_transaction(
        &self,
        profile: &ChainProfile,
        address: &str,
        signer: &dyn TxSigner,
        request: TxRequest,
    ) -> Result<TxOutcome> {
        let lock = self.lock_for(&profile.chain_id, address);
        let _guard = lock.lock().await;

        // Drift check is advisory when no RPC endpoint answers, fatal when
        // one answers with a different network id. A mismatch is re-checked
        // once to rule out a misrouted load balancer before failing. The
        // profile itself is caller-owned: re-resolving stale chain metadata
        // and retrying is the caller's job, because only the caller knows
        // where the metadata came from.
        for check in 0..2 {
            match profile
                .verify_live_chain_id(&self.http, self.config.status_timeout())
                .await
            {
                Ok(()) => break,
                Err(e @ EngineError::ChainIdMismatch { .. }) => {
                    if check == 1 {
                        return Err(e);
                    }
                    log::warn!("chain id mismatch, re-checking once: {e}");
                }
                Err(e) => {
                    log::warn!("chain id check inconclusive, proceeding: {e}");
                    break;
                }
            }
        }

        let anys = codec::encode_batch(&request.messages)?;

        let mut attempted = 0;
        let mut last_err = None;
        for rest in &profile.rest_endpoints {
            attempted += 1;
            match self
                .attempt(rest, profile, address, signer, &request, &anys)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transport() => {
                    log::warn!("endpoint {rest} failed in transit, trying next: {e}");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(EngineError::NetworkTimeout { attempted }))
    }

    /// One full attempt against a single REST endpoint.
    async fn attempt(
        &self,
        rest: &str,
        profile: &ChainProfile,
        address: &str,
        signer: &dyn TxSigner,
        request: &TxRequest,
        anys: &[Any],
    ) -> Result<TxOutcome> {
        let fetcher = AccountFetcher::new(self.http.clone(), self.config.account_timeout());
        let account = fetcher.fetch(rest, address, profile.curve).await?;
        log::debug!(
            "account {address}: number={}, sequence={}",
            account.account_number,
            account.sequence
        );

        let fee = self
            .derive_fee(rest, profile, &account, signer, anys, request)
            .await;

        self.preflight_balance(rest, profile, address, &request.messages, &fee)
            .await?;

        let signed = self
            .sign_with_retry(profile, &account, signer, anys, &fee, &request.memo)
            .await?;

        let broadcaster = Broadcaster::new(
            self.http.clone(),
            self.config.broadcast_timeout(),
            self.config.broadcast.proxy_base_url.clone(),
        );
        let result = broadcaster
            .broadcast(rest, &signed.to_bytes(), request.mode)
            .await?;
        if !result.success() {
            if let Some(expected) = parse_expected_sequence(&result.raw_log) {
                log::warn!(
                    "sequence mismatch on {}: chain expects {expected}, tx used {}",
                    profile.chain_id,
                    account.sequence
                );
            }
        }
        let result = result.into_result()?;
        Ok(TxOutcome {
            result,
            fee,
            endpoint: rest.to_string(),
        })
    }

    /// Simulation is opportunistic. Whatever goes wrong, the transaction
    /// still goes out with the static fallback fee.
    async fn derive_fee(
        &self,
        rest: &str,
        profile: &ChainProfile,
        account: &Account,
        signer: &dyn TxSigner,
        anys: &[Any],
        request: &TxRequest,
    ) -> StdFee {
        let fallback_gas = self.config.gas.fallback_gas_limit;
        if request.skip_simulation {
            return static_fallback_fee(profile, fallback_gas);
        }
        let estimator = GasEstimator::new(
            self.http.clone(),
            self.config.simulate_timeout(),
            self.config.gas.adjustment,
        );
        match estimator
            .estimate(rest, profile, account, signer, anys, fallback_gas)
            .await
        {
            Ok(fee) => fee,
            Err(e) => {
                log::warn!("gas estimation failed, using static fee: {e}");
                static_fallback_fee(profile, fallback_gas)
            }
        }
    }

    /// Check the fee denom balance covers the fee plus any spend of the same
    /// denom. A failed query is logged and skipped; the chain remains the
    /// authority.
    async fn preflight_balance(
        &self,
        rest: &str,
        profile: &ChainProfile,
        address: &str,
        messages: &[MsgPayload],
        fee: &StdFee,
    ) -> Result<()> {
        let Some(fee_coin) = fee.amount.first() else {
            return Ok(()); // zero-fee tx, nothing to check
        };
        let fee_amount: u128 = match fee_coin.amount.parse() {
            Ok(v) => v,
            Err(_) => return Ok(()),
        };
        let required = fee_amount.saturating_add(spend_in_denom(messages, &fee_coin.denom));

        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            rest.trim_end_matches('/'),
            address,
            fee_coin.denom
        );
        let available = match self.query_balance(&url).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("balance preflight skipped ({e})");
                return Ok(());
            }
        };
        if available < required {
            return Err(EngineError::InsufficientBalance {
                denom: fee_coin.denom.clone(),
                required: required.to_string(),
                available: available.to_string(),
                shortfall: (required - available).to_string(),
            });
        }
        Ok(())
    }

    async fn query_balance(&self, url: &str) -> Result<u128> {
        let resp = self
            .http
            .get(url)
            .timeout(self.config.account_timeout())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(EngineError::Network(format!(
                "balance query returned HTTP {}",
                resp.status()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Network(format!("unreadable balance response: {e}")))?;
        let amount = body
            .pointer("/balance/amount")
            .and_then(Value::as_str)
            .unwrap_or("0");
        amount
            .parse()
            .map_err(|e| EngineError::Network(format!("unreadable balance amount: {e}")))
    }

    /// A disconnected signer gets exactly one more chance after a short
    /// pause. Any other signing failure is final.
    async fn sign_with_retry(
        &self,
        profile: &ChainProfile,
        account: &Account,
        signer: &dyn TxSigner,
        anys: &[Any],
        fee: &StdFee,
        memo: &str,
    ) -> Result<SignedTx> {
        match signer::sign_tx(profile, account, signer, anys, fee, memo) {
            Err(EngineError::SignerDisconnected) => {
                log::warn!("signer disconnected, retrying once");
                tokio::time::sleep(SIGNER_RETRY_PAUSE).await;
                signer::sign_tx(profile, account, signer, anys, fee, memo)
            }
            other => other,
        }
    }
}

/// Static fee for when simulation is unavailable: declared gas price, then
/// registry fee-token hints, then the flat minimum fee, then nothing.
pub fn static_fallback_fee(profile: &ChainProfile, gas_limit: u64) -> StdFee {
    if profile.gasless {
        return StdFee::zero(gas_limit);
    }
    let denom = profile.primary_asset().denom.clone();
    if let Some((price, price_denom)) = &profile.declared_gas_price {
        return gas::fee_from_gas(gas_limit, *price, price_denom);
    }
    if let Some(token) = profile.fee_token(&denom) {
        if let Some(price) = token.fixed_min_gas_price.or(token.low_gas_price) {
            return gas::fee_from_gas(gas_limit, price, &denom);
        }
    }
    if let Some(flat) = profile.min_tx_fee {
        return StdFee::new(
            vec![crate::proto::Coin {
                denom,
                amount: flat.to_string(),
            }],
            gas_limit,
        );
    }
    log::warn!(
        "chain {} has no fee information at all, sending zero fee",
        profile.chain_id
    );
    StdFee::zero(gas_limit)
}

/// Total base units of `denom` the messages themselves spend, on top of the
/// fee. Only message kinds that move funds out of the sender count.
fn spend_in_denom(messages: &[MsgPayload], denom: &str) -> u128 {
    let mut total: u128 = 0;
    let mut add = |d: &str, amount: &str| {
        if d == denom {
            if let Ok(v) = amount.parse::<u128>() {
                total = total.saturating_add(v);
            }
        }
    };
    for msg in messages {
        match msg {
            MsgPayload::Send(m) => {
                for coin in &m.amount {
                    add(&coin.denom, &coin.amount);
                }
            }
            MsgPayload::Delegate(m) => {
                if let Some(coin) = &m.amount {
                    add(&coin.denom, &coin.amount);
                }
            }
            MsgPayload::Swap(m) => add(&m.offer_denom, &m.offer_amount),
            MsgPayload::IbcTransfer(m) => {
                if let Some(coin) = &m.token {
                    add(&coin.denom, &coin.amount);
                }
            }
            _ => {}
        }
    }
    total
}

/// Pull the chain's expected sequence out of an "account sequence mismatch,
/// expected X, got Y" rejection log.
pub fn parse_expected_sequence(raw_log: &str) -> Option<u64> {
    if !raw_log.contains("account sequence") {
        return None;
    }
    let start = raw_log.find("expected ")?;
    let remaining = &raw_log[start + "expected ".len()..];
    let end = remaining.find(',')?;
    remaining[..end].trim().parse().ok()
}
