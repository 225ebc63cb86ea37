//! Account state queries over REST. Auth-module responses wrap the actual
//! account in one of several envelopes; this module unwraps them all into
//! one [`Account`] in a panic-safe way.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use std::time::Duration;

use crate::chain::CurveKind;
use crate::error::{EngineError, Result};

/// Current on-chain state for one address. Must be re-fetched before every
/// transaction construction: the sequence is consumed on each broadcast.
#[derive(Debug, Clone)]
pub struct Account {
    pub address: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Declared public key, when the envelope carried a parseable one. For
    /// fresh accounts and some EVM-style envelopes this is absent and the
    /// signer supplies the key at sign time instead.
    pub pub_key: Option<AccountPubKey>,
    pub curve: CurveKind,
}

#[derive(Debug, Clone)]
pub struct AccountPubKey {
    pub type_url: String,
    pub key: Vec<u8>,
}

pub struct AccountFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl AccountFetcher {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Query `{rest}/cosmos/auth/v1beta1/accounts/{address}`.
    ///
    /// HTTP 404 means the address has never received funds and maps to
    /// `AccountNotFound`; any other non-2xx response is `AccountFetch`.
    pub async fn fetch(
        &self,
        rest_endpoint: &str,
        address: &str,
        curve: CurveKind,
    ) -> Result<Account> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/accounts/{}",
            rest_endpoint.trim_end_matches('/'),
            address
        );
        log::debug!("fetching account state from {url}");

        let resp = self.http.get(&url).timeout(self.timeout).send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(EngineError::AccountNotFound {
                address: address.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::AccountFetch {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Network(format!("unreadable account response: {e}")))?;

        parse_account_envelope(&body, address, curve)
    }
}

/// Unwrap the account envelope in priority order: a direct base account, a
/// vesting wrapper (then its inner base account), an eth-style wrapper, and
/// finally any generic wrapper that carries a `base_account` object.
pub fn parse_account_envelope(body: &Value, address: &str, curve: CurveKind) -> Result<Account> {
    let envelope = body.get("account").unwrap_or(body);
    let type_url = envelope
        .get("@type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let base = match unwrap_base(envelope) {
        Some(b) => b,
        // Some EVM chains return number/sequence at the top level of an
        // otherwise unknown wrapper; salvage those before giving up. The
        // public key is supplied by the signer at sign time instead.
        None if curve == CurveKind::Evm && envelope.get("sequence").is_some() => {
            log::warn!("unrecognized EVM account envelope {type_url}, using top-level fields");
            envelope
        }
        None => {
            return Err(EngineError::UnsupportedAccountType { type_url });
        }
    };

    let account_number = read_u64(base, "account_number").unwrap_or(0);
    let sequence = read_u64(base, "sequence").unwrap_or(0);
    let found_address = base
        .get("address")
        .and_then(Value::as_str)
        .unwrap_or(address)
        .to_string();

    let pub_key = base.get("pub_key").and_then(parse_pub_key);

    log::debug!(
        "account {found_address}: number={account_number} sequence={sequence} key={}",
        if pub_key.is_some() { "declared" } else { "absent" }
    );

    Ok(Account {
        address: found_address,
        account_number,
        sequence,
        pub_key,
        curve,
    })
}

/// Walk the known nesting shapes down to the object that carries
/// address/number/sequence.
fn unwrap_base(envelope: &Value) -> Option<&Value> {
    // plain base account: the fields live right here
    if envelope.get("sequence").is_some() || envelope.get("account_number").is_some() {
        if envelope.get("base_account").is_none() && envelope.get("base_vesting_account").is_none()
        {
            return Some(envelope);
        }
    }
    // eth-wrapped or generically-wrapped: { base_account: {...} }
    if let Some(inner) = envelope.get("base_account") {
        return unwrap_base(inner);
    }
    // vesting-wrapped: { base_vesting_account: { base_account: {...} } }
    if let Some(vesting) = envelope.get("base_vesting_account") {
        return unwrap_base(vesting);
    }
    None
}

fn read_u64(obj: &Value, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn parse_pub_key(pk: &Value) -> Option<AccountPubKey> {
    let type_url = pk.get("@type").and_then(Value::as_str)?.to_string();
    let key_b64 = pk.get("key").and_then(Value::as_str)?;
    let key = BASE64.decode(key_b64).ok()?;
    Some(AccountPubKey { type_url, key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_account_json() -> Value {
        json!({
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": "cosmos1abc",
            "pub_key": {
                "@type": "/cosmos.crypto.secp256k1.PubKey",
                "key": "AgEC/w=="
            },
            "account_number": "12345",
            "sequence": "5"
        })
    }

    #[test]
    fn plain_base_account() {
        let body = json!({ "account": base_account_json() });
        let acc = parse_account_envelope(&body, "cosmos1abc", CurveKind::Standard).unwrap();
        assert_eq!(acc.address, "cosmos1abc");
        assert_eq!(acc.account_number, 12345);
        assert_eq!(acc.sequence, 5);
        let pk = acc.pub_key.unwrap();
        assert_eq!(pk.type_url, "/cosmos.crypto.secp256k1.PubKey");
        assert_eq!(pk.key, vec![0x02, 0x01, 0x02, 0xff]);
    }

    #[test]
    fn vesting_wrapped_matches_unwrapped() {
        let wrapped = json!({
            "account": {
                "@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
                "base_vesting_account": {
                    "base_account": base_account_json(),
                    "original_vesting": []
                },
                "start_time": "1600000000"
            }
        });
        let plain = json!({ "account": base_account_json() });

        let a = parse_account_envelope(&wrapped, "cosmos1abc", CurveKind::Standard).unwrap();
        let b = parse_account_envelope(&plain, "cosmos1abc", CurveKind::Standard).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.sequence, b.sequence);
        assert_eq!(a.account_number, b.account_number);
    }

    #[test]
    fn eth_wrapped_account() {
        let body = json!({
            "account": {
                "@type": "/ethermint.types.v1.EthAccount",
                "base_account": base_account_json(),
                "code_hash": "0xdead"
            }
        });
        let acc = parse_account_envelope(&body, "inj1abc", CurveKind::Evm).unwrap();
        assert_eq!(acc.sequence, 5);
        assert_eq!(acc.curve, CurveKind::Evm);
    }

    #[test]
    fn generic_wrapper_falls_through() {
        let body = json!({
            "account": {
                "@type": "/some.custom.v1.ModuleAccount",
                "base_account": {
                    "address": "cosmos1mod",
                    "account_number": 9,
                    "sequence": 2
                }
            }
        });
        let acc = parse_account_envelope(&body, "cosmos1mod", CurveKind::Standard).unwrap();
        assert_eq!(acc.account_number, 9);
        assert_eq!(acc.sequence, 2);
        assert!(acc.pub_key.is_none());
    }

    #[test]
    fn evm_unknown_envelope_salvages_sequence() {
        let body = json!({
            "account": {
                "@type": "/strange.types.v9.WeirdAccount",
                "address": "evmos1abc",
                "account_number": "4",
                "sequence": "11",
                "odd_extra": { "base_account": null }
            }
        });
        let acc = parse_account_envelope(&body, "evmos1abc", CurveKind::Evm).unwrap();
        assert_eq!(acc.sequence, 11);
        assert!(acc.pub_key.is_none());
    }

    #[test]
    fn unknown_envelope_is_unsupported_for_standard() {
        let body = json!({
            "account": {
                "@type": "/strange.types.v9.WeirdAccount",
                "opaque": true
            }
        });
        assert!(matches!(
            parse_account_envelope(&body, "cosmos1abc", CurveKind::Standard),
            Err(EngineError::UnsupportedAccountType { .. })
        ));
    }
}
