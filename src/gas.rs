//! Fee sizing. An optional dry-run against the simulate endpoint discovers
//! real gas cost; the final fee comes from buffered gas times the best
//! available per-unit price. Every failure along the way is non-fatal: the
//! caller keeps its statically supplied fee.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;

use crate::account::Account;
use crate::chain::{parse_gas_price, ChainProfile};
use crate::codec::wire;
use crate::error::{EngineError, Result};
use crate::proto::{Any, Coin};
use crate::signdoc::StdFee;
use crate::signer::{self, TxSigner};

/// Gas-used multiplier applied before pricing. Simulation undercounts on
/// busy chains, so anything below 1.3 risks out-of-gas on the real run.
pub const MIN_GAS_ADJUSTMENT: f64 = 1.3;

pub struct GasEstimator {
    http: reqwest::Client,
    timeout: Duration,
    adjustment: f64,
}

impl GasEstimator {
    pub fn new(http: reqwest::Client, timeout: Duration, adjustment: f64) -> Self {
        Self {
            http,
            timeout,
            adjustment: adjustment.max(MIN_GAS_ADJUSTMENT),
        }
    }

    /// Simulate the transaction and derive a final fee. On any failure the
    /// caller falls back to its static fee, so this returns `Result` only
    /// for the caller to log, never to abort on.
    pub async fn estimate(
        &self,
        rest_endpoint: &str,
        profile: &ChainProfile,
        account: &Account,
        signer: &dyn TxSigner,
        messages: &[Any],
        declared_gas_limit: u64,
    ) -> Result<StdFee> {
        // gasless chains mandate zero-fee txs; nothing to discover
        if profile.gasless {
            return Ok(StdFee::zero(declared_gas_limit));
        }

        let gas_used = self
            .simulate(rest_endpoint, profile, account, signer, messages, declared_gas_limit)
            .await?;
        let gas_with_buffer = (gas_used as f64 * self.adjustment).ceil() as u64;
        log::debug!(
            "simulation: gas_used={gas_used}, buffered={gas_with_buffer} (x{})",
            self.adjustment
        );

        self.price_fee(rest_endpoint, profile, gas_with_buffer).await
    }

    /// Throwaway signing pass with a nominal 1-unit fee, posted to the
    /// simulate endpoint. Returns the reported gas_used.
    async fn simulate(
        &self,
        rest_endpoint: &str,
        profile: &ChainProfile,
        account: &Account,
        signer: &dyn TxSigner,
        messages: &[Any],
        declared_gas_limit: u64,
    ) -> Result<u64> {
        let nominal_fee = StdFee::new(
            vec![Coin {
                denom: profile.primary_asset().denom.clone(),
                amount: "1".to_string(),
            }],
            declared_gas_limit,
        );
        let signed = signer::sign_tx(profile, account, signer, messages, &nominal_fee, "")
            .map_err(|e| EngineError::Simulation(format!("throwaway signing failed: {e}")))?;

        let url = format!(
            "{}/cosmos/tx/v1beta1/simulate",
            rest_endpoint.trim_end_matches('/')
        );
        let body = json!({ "tx_bytes": BASE64.encode(signed.to_bytes()) });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Simulation(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::Simulation(format!("HTTP {status}: {text}")));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Simulation(e.to_string()))?;

        read_gas_used(&value)
            .ok_or_else(|| EngineError::Simulation("no gas_info.gas_used in response".to_string()))
    }

    /// Resolve the per-gas-unit price, in priority order: chain-declared gas
    /// price, fixed minimum from fee-token metadata, low gas price from
    /// fee-token metadata, then the static minimum-fee fallback.
    async fn price_fee(
        &self,
        rest_endpoint: &str,
        profile: &ChainProfile,
        gas_limit: u64,
    ) -> Result<StdFee> {
        let primary = &profile.primary_asset().denom;

        if let Some((price, denom)) = self.node_min_gas_price(rest_endpoint).await {
            return Ok(fee_from_gas(gas_limit, price, &denom));
        }
        if let Some((price, denom)) = &profile.declared_gas_price {
            return Ok(fee_from_gas(gas_limit, *price, denom));
        }
        if let Some(token) = profile.fee_token(primary) {
            if let Some(price) = token.fixed_min_gas_price.or(token.low_gas_price) {
                return Ok(fee_from_gas(gas_limit, price, &token.denom));
            }
        }
        if let Some(min_fee) = profile.min_tx_fee {
            // flat fallback amount, not per-gas
            return Ok(StdFee::new(
                vec![Coin {
                    denom: primary.clone(),
                    amount: min_fee.to_string(),
                }],
                gas_limit,
            ));
        }
        Err(EngineError::Simulation(format!(
            "no gas price source for chain {}",
            profile.chain_id
        )))
    }

    /// Query the node's own minimum-gas-price config, e.g. "10award".
    async fn node_min_gas_price(&self, rest_endpoint: &str) -> Option<(f64, String)> {
        let url = format!(
            "{}/cosmos/base/node/v1beta1/config",
            rest_endpoint.trim_end_matches('/')
        );
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let value: Value = resp.json().await.ok()?;
        let raw = value.get("minimum_gas_price")?.as_str()?;
        match parse_gas_price(raw) {
            Ok(parsed) if parsed.0 > 0.0 => Some(parsed),
            _ => None,
        }
    }
}

/// Fixed-point scale used for fee math, matching the 18-decimal expansion of
/// [`wire::dec_to_fixed`].
const FEE_SCALE: u128 = 1_000_000_000_000_000_000;

/// `ceil(gas × price)` as an integer-string fee amount.
///
/// The multiplication runs on the price's 18-decimal integer mantissa, so the
/// result stays exact past the 2^53 point where f64 products start dropping
/// low bits. Prices outside the mantissa's range fall back to float math.
pub fn fee_from_gas(gas_limit: u64, price_per_unit: f64, denom: &str) -> StdFee {
    let amount = price_mantissa_18(price_per_unit)
        .and_then(|mantissa| u128::from(gas_limit).checked_mul(mantissa))
        .map(|product| product / FEE_SCALE + u128::from(product % FEE_SCALE != 0))
        .unwrap_or_else(|| (gas_limit as f64 * price_per_unit).ceil() as u128);
    StdFee::new(
        vec![Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }],
        gas_limit,
    )
}

/// Price scaled by 10^18, exactly as the shortest decimal rendering of the
/// float reads. `Display` never emits scientific notation, so the rendering
/// feeds straight into the decimal-shift parser.
fn price_mantissa_18(price: f64) -> Option<u128> {
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    wire::dec_to_fixed(&price.to_string()).ok()?.parse().ok()
}

fn read_gas_used(value: &Value) -> Option<u64> {
    let gas_used = value.pointer("/gas_info/gas_used")?;
    match gas_used {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fee_calc_matches_reference_scenario() {
        // gas limit 300000 at 0.025 => ceil(7500) = 7500
        let fee = fee_from_gas(300_000, 0.025, "uatom");
        assert_eq!(fee.amount[0].amount, "7500");
        assert_eq!(fee.amount[0].denom, "uatom");
        assert_eq!(fee.gas_limit, 300_000);
    }

    #[test]
    fn fee_rounds_up() {
        let fee = fee_from_gas(100_001, 0.025, "uatom");
        // 2500.025 rounds up to 2501
        assert_eq!(fee.amount[0].amount, "2501");
    }

    #[test]
    fn fee_is_monotonic_in_gas() {
        let mut last = 0u128;
        for gas in [50_000u64, 100_000, 200_000, 400_000, 800_000] {
            let fee = fee_from_gas(gas, 0.037, "uatom");
            let amount: u128 = fee.amount[0].amount.parse().unwrap();
            assert!(amount >= last);
            last = amount;
        }
    }

    #[test]
    fn adjustment_is_floored_at_minimum() {
        let est = GasEstimator::new(reqwest::Client::new(), Duration::from_secs(5), 1.0);
        assert!(est.adjustment >= MIN_GAS_ADJUSTMENT);
    }

    #[test]
    fn gas_used_parses_both_shapes() {
        assert_eq!(
            read_gas_used(&json!({"gas_info": {"gas_used": "84213"}})),
            Some(84_213)
        );
        assert_eq!(
            read_gas_used(&json!({"gas_info": {"gas_used": 84213}})),
            Some(84_213)
        );
        assert_eq!(read_gas_used(&json!({"gas_info": {}})), None);
    }

    #[test]
    fn fee_is_exact_beyond_f64_precision() {
        // 7654321 * 25978427601 = 198847223933313921, an odd product above
        // 2^53 that float multiplication would round to an even neighbor.
        let fee = fee_from_gas(7_654_321, 25_978_427_601.0, "aevmos");
        let expected = 7_654_321u128 * 25_978_427_601u128;
        assert_eq!(fee.amount[0].amount, expected.to_string());
    }

    #[test]
    fn fractional_price_stays_exact() {
        // 0.025 renders as "0.025" exactly, so the mantissa path must agree
        // with the historical float result on the common case.
        let fee = fee_from_gas(123_456_789, 0.025, "uatom");
        // 123456789 * 25 / 1000 = 3086419.725, rounded up
        assert_eq!(fee.amount[0].amount, "3086420");
    }

    #[test]
    fn fee_amount_has_no_decimal_point() {
        let fee = fee_from_gas(123_457, 0.003, "award");
        assert!(!fee.amount[0].amount.contains('.'));
        assert!(!fee.amount[0].amount.contains('e'));
    }
}
