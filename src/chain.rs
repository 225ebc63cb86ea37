//! Chain metadata normalization. Raw registry metadata comes in wildly
//! different shapes; everything downstream works against one canonical
//! [`ChainProfile`] with the account-curve kind decided exactly once here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Which secp256k1 flavor an address's signing key uses. Affects HD
/// derivation, address derivation, and the pubkey type tag in AuthInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    Standard,
    Evm,
}

/// Chains whose registry coin type is the Cosmos default (118) but whose
/// accounts nonetheless use ethsecp256k1 keys. Kept as an explicit list; the
/// curve kind is never re-derived per call site.
pub const EVM_CURVE_EXCEPTIONS: &[&str] = &[
    "dymension_1100-1",
    "haqq_11235-1",
    "shido_9008-1",
];

const ETH_COIN_TYPE: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMeta {
    pub denom: String,
    pub exponent: u32,
    pub symbol: String,
    #[serde(default)]
    pub primary: bool,
}

/// Per-fee-token gas price hints as published by chain registries. All
/// optional; the estimator walks them in a fixed priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeToken {
    pub denom: String,
    #[serde(default)]
    pub fixed_min_gas_price: Option<f64>,
    #[serde(default)]
    pub low_gas_price: Option<f64>,
    #[serde(default)]
    pub average_gas_price: Option<f64>,
    #[serde(default)]
    pub high_gas_price: Option<f64>,
}

/// Raw, untrusted chain metadata as deserialized from a registry entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawChainMeta {
    pub chain_id: String,
    pub bech32_prefix: String,
    #[serde(default = "default_coin_type")]
    pub coin_type: u32,
    pub assets: Vec<AssetMeta>,
    #[serde(default)]
    pub fee_tokens: Vec<FeeToken>,
    #[serde(default)]
    pub rpc_endpoints: Vec<String>,
    #[serde(default)]
    pub rest_endpoints: Vec<String>,
    /// Static fallback fee in base units of the primary asset, used when no
    /// gas price hint exists anywhere.
    #[serde(default)]
    pub min_tx_fee: Option<u128>,
    /// Chain-declared gas price, e.g. "0.025uatom".
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gasless: bool,
}

fn default_coin_type() -> u32 {
    118
}

/// Canonical chain profile. Built once per chain selection and immutable for
/// the duration of a transaction attempt.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub chain_id: String,
    pub bech32_prefix: String,
    pub coin_type: u32,
    pub curve: CurveKind,
    pub assets: Vec<AssetMeta>,
    pub fee_tokens: Vec<FeeToken>,
    pub rpc_endpoints: Vec<String>,
    pub rest_endpoints: Vec<String>,
    pub min_tx_fee: Option<u128>,
    /// Parsed chain-declared gas price, highest priority for fee derivation.
    pub declared_gas_price: Option<(f64, String)>,
    pub gasless: bool,
}

impl ChainProfile {
    /// Validate and normalize raw metadata. Pure transform, no I/O.
    pub fn resolve(raw: RawChainMeta) -> Result<Self> {
        if raw.chain_id.is_empty() {
            return Err(EngineError::InvalidProfile("missing chain id".to_string()));
        }
        if raw.bech32_prefix.is_empty() {
            return Err(EngineError::InvalidProfile(
                "missing bech32 prefix".to_string(),
            ));
        }
        if raw.rest_endpoints.is_empty() && raw.rpc_endpoints.is_empty() {
            return Err(EngineError::InvalidProfile(format!(
                "chain {} has no usable RPC or REST endpoint",
                raw.chain_id
            )));
        }
        if raw.rest_endpoints.is_empty() {
            return Err(EngineError::InvalidProfile(format!(
                "chain {} has no REST endpoint for account/tx queries",
                raw.chain_id
            )));
        }
        let primaries = raw.assets.iter().filter(|a| a.primary).count();
        if primaries != 1 {
            return Err(EngineError::InvalidProfile(format!(
                "chain {} declares {} primary assets, expected exactly 1",
                raw.chain_id, primaries
            )));
        }

        let curve = if raw.coin_type == ETH_COIN_TYPE
            || EVM_CURVE_EXCEPTIONS.contains(&raw.chain_id.as_str())
        {
            CurveKind::Evm
        } else {
            CurveKind::Standard
        };

        let declared_gas_price = match &raw.gas_price {
            Some(s) => Some(parse_gas_price(s)?),
            None => None,
        };

        Ok(ChainProfile {
            chain_id: raw.chain_id,
            bech32_prefix: raw.bech32_prefix,
            coin_type: raw.coin_type,
            curve,
            assets: raw.assets,
            fee_tokens: raw.fee_tokens,
            rpc_endpoints: raw.rpc_endpoints,
            rest_endpoints: raw.rest_endpoints,
            min_tx_fee: raw.min_tx_fee,
            declared_gas_price,
            gasless: raw.gasless,
        })
    }

    /// The single asset used for staking and fee fallback.
    pub fn primary_asset(&self) -> &AssetMeta {
        // resolve() guarantees exactly one
        self.assets
            .iter()
            .find(|a| a.primary)
            .expect("profile resolved without a primary asset")
    }

    pub fn asset(&self, denom: &str) -> Option<&AssetMeta> {
        self.assets.iter().find(|a| a.denom == denom)
    }

    pub fn fee_token(&self, denom: &str) -> Option<&FeeToken> {
        self.fee_tokens.iter().find(|t| t.denom == denom)
    }

    /// Query the live network id from the first reachable RPC endpoint and
    /// compare it against this profile. A mismatch means the cached profile
    /// is stale (chain-id drift) and any cached account state for addresses
    /// on this chain must be discarded.
    pub async fn verify_live_chain_id(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
    ) -> Result<()> {
        let mut attempted = 0;
        for rpc in &self.rpc_endpoints {
            attempted += 1;
            let url = format!("{}/status", rpc.trim_end_matches('/'));
            let resp = match http.get(&url).timeout(timeout).send().await {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("rpc status check failed on {url}: {e}");
                    continue;
                }
            };
            if !resp.status().is_success() {
                log::warn!("rpc status check on {url} returned HTTP {}", resp.status());
                continue;
            }
            let body: serde_json::Value = match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("rpc status body unreadable on {url}: {e}");
                    continue;
                }
            };
            let network = body
                .pointer("/result/node_info/network")
                .or_else(|| body.pointer("/node_info/network"))
                .and_then(|v| v.as_str());
            match network {
                Some(live) if live == self.chain_id => return Ok(()),
                Some(live) => {
                    return Err(EngineError::ChainIdMismatch {
                        expected: self.chain_id.clone(),
                        actual: live.to_string(),
                    })
                }
                None => {
                    log::warn!("rpc status on {url} carried no network id");
                    continue;
                }
            }
        }
        Err(EngineError::NetworkTimeout { attempted })
    }
}

/// Parse a gas price string like "0.025uatom" or "500000000inj" into
/// (numeric price, denom).
pub fn parse_gas_price(price_str: &str) -> Result<(f64, String)> {
    let split_pos = price_str
        .chars()
        .position(|c| c.is_alphabetic())
        .ok_or_else(|| EngineError::InvalidProfile(format!("invalid gas price {price_str:?}")))?;
    let (amount_str, denom) = price_str.split_at(split_pos);
    let amount: f64 = amount_str
        .parse()
        .map_err(|_| EngineError::InvalidProfile(format!("invalid gas price {price_str:?}")))?;
    if amount < 0.0 || denom.is_empty() {
        return Err(EngineError::InvalidProfile(format!(
            "invalid gas price {price_str:?}"
        )));
    }
    Ok((amount, denom.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(chain_id: &str, coin_type: u32) -> RawChainMeta {
        RawChainMeta {
            chain_id: chain_id.to_string(),
            bech32_prefix: "cosmos".to_string(),
            coin_type,
            assets: vec![AssetMeta {
                denom: "uatom".to_string(),
                exponent: 6,
                symbol: "ATOM".to_string(),
                primary: true,
            }],
            fee_tokens: vec![],
            rpc_endpoints: vec!["https://rpc.example.com".to_string()],
            rest_endpoints: vec!["https://rest.example.com".to_string()],
            min_tx_fee: Some(5000),
            gas_price: Some("0.025uatom".to_string()),
            gasless: false,
        }
    }

    #[test]
    fn standard_chain_resolves() {
        let profile = ChainProfile::resolve(raw("cosmoshub-4", 118)).unwrap();
        assert_eq!(profile.curve, CurveKind::Standard);
        assert_eq!(profile.primary_asset().symbol, "ATOM");
        assert_eq!(profile.declared_gas_price, Some((0.025, "uatom".to_string())));
    }

    #[test]
    fn coin_type_60_means_evm() {
        let profile = ChainProfile::resolve(raw("injective-1", 60)).unwrap();
        assert_eq!(profile.curve, CurveKind::Evm);
    }

    #[test]
    fn exception_list_overrides_coin_type() {
        let profile = ChainProfile::resolve(raw("dymension_1100-1", 118)).unwrap();
        assert_eq!(profile.curve, CurveKind::Evm);
    }

    #[test]
    fn missing_endpoints_rejected() {
        let mut meta = raw("cosmoshub-4", 118);
        meta.rpc_endpoints.clear();
        meta.rest_endpoints.clear();
        assert!(matches!(
            ChainProfile::resolve(meta),
            Err(EngineError::InvalidProfile(_))
        ));
    }

    #[test]
    fn primary_asset_must_be_unique() {
        let mut meta = raw("cosmoshub-4", 118);
        meta.assets.push(AssetMeta {
            denom: "uion".to_string(),
            exponent: 6,
            symbol: "ION".to_string(),
            primary: true,
        });
        assert!(ChainProfile::resolve(meta).is_err());

        let mut meta = raw("cosmoshub-4", 118);
        meta.assets[0].primary = false;
        assert!(ChainProfile::resolve(meta).is_err());
    }

    #[test]
    fn gas_price_parsing() {
        assert_eq!(parse_gas_price("10award").unwrap(), (10.0, "award".to_string()));
        assert_eq!(
            parse_gas_price("0.025uatom").unwrap(),
            (0.025, "uatom".to_string())
        );
        assert_eq!(
            parse_gas_price("500000000inj").unwrap(),
            (500000000.0, "inj".to_string())
        );
        assert!(parse_gas_price("12345").is_err());
        assert!(parse_gas_price("").is_err());
    }
}
