//! Transaction submission over REST. A 2xx HTTP response never implies
//! transaction success: the embedded execution code decides.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    Sync,
    Async,
    Block,
}

impl BroadcastMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastMode::Sync => "BROADCAST_MODE_SYNC",
            BroadcastMode::Async => "BROADCAST_MODE_ASYNC",
            BroadcastMode::Block => "BROADCAST_MODE_BLOCK",
        }
    }
}

/// Outcome of a broadcast attempt that reached the chain.
#[derive(Debug, Clone)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
}

impl BroadcastResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Promote a non-zero execution code to the rejection error, raw log
    /// verbatim.
    pub fn into_result(self) -> Result<BroadcastResult> {
        if self.code != 0 {
            return Err(EngineError::BroadcastRejected {
                code: self.code,
                tx_hash: self.tx_hash,
                raw_log: self.raw_log,
            });
        }
        Ok(self)
    }
}

pub struct Broadcaster {
    http: reqwest::Client,
    timeout: Duration,
    /// Same-origin proxy base for browser-context callers blocked by CORS.
    proxy_base: Option<String>,
}

impl Broadcaster {
    pub fn new(http: reqwest::Client, timeout: Duration, proxy_base: Option<String>) -> Self {
        Self {
            http,
            timeout,
            proxy_base,
        }
    }

    /// Submit signed tx bytes. Tries the chain's REST endpoint first and
    /// falls back to the proxy only on transport failure (an HTTP or
    /// execution rejection is final, not a transport problem).
    pub async fn broadcast(
        &self,
        rest_endpoint: &str,
        tx_bytes: &[u8],
        mode: BroadcastMode,
    ) -> Result<BroadcastResult> {
        let body = json!({
            "tx_bytes": BASE64.encode(tx_bytes),
            "mode": mode.as_str(),
        });

        let direct = self.post_tx(rest_endpoint, &body).await;
        match direct {
            Err(ref e) if e.is_transport() => {
                if let Some(proxy) = &self.proxy_base {
                    log::warn!("direct broadcast failed ({e}), retrying through proxy");
                    return self.post_tx(proxy, &body).await;
                }
                direct
            }
            other => other,
        }
    }

    async fn post_tx(&self, base: &str, body: &Value) -> Result<BroadcastResult> {
        let url = format!("{}/cosmos/tx/v1beta1/txs", base.trim_end_matches('/'));
        log::info!("broadcasting transaction to {url}");

        let resp = self
            .http
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(EngineError::BroadcastHttp {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| EngineError::Network(format!("unreadable broadcast response: {e}")))?;
        parse_tx_response(&value)
    }
}

pub fn parse_tx_response(value: &Value) -> Result<BroadcastResult> {
    let tx_response = value
        .get("tx_response")
        .ok_or_else(|| EngineError::Network("broadcast response carried no tx_response".into()))?;
    let code = tx_response
        .get("code")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let tx_hash = tx_response
        .get("txhash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let raw_log = tx_response
        .get("raw_log")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if code != 0 {
        log::warn!("transaction {tx_hash} rejected with code {code}: {raw_log}");
    } else {
        log::info!("transaction accepted: {tx_hash}");
    }

    Ok(BroadcastResult {
        tx_hash,
        code,
        raw_log,
    })
}
