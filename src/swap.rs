//! Constant-product AMM quote math and the unit conversions around it.
//!
//! Quotes operate on human-readable amounts; everything that ends up on the
//! wire goes through the base-unit conversions below, which use pure string
//! arithmetic so tokens with 18-plus decimal places never touch floating
//! point.

use crate::error::{EngineError, Result};

/// One hop of a swap route.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolHop {
    pub pool_id: String,
    /// Reserve on the side being paid in, human units.
    pub input_reserve: f64,
    /// Reserve on the side being paid out, human units.
    pub output_reserve: f64,
}

/// A derived quote. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub input_amount: f64,
    pub route: Vec<PoolHop>,
    /// Human units of the output asset.
    pub output_amount: f64,
    /// Base units of the output asset, after slippage, floored, at least 1.
    pub min_receive: String,
}

/// Constant-product output: `input × outputReserve / (inputReserve + input)`.
pub fn quote(input: f64, input_reserve: f64, output_reserve: f64) -> Result<f64> {
    for (name, v) in [
        ("input", input),
        ("input reserve", input_reserve),
        ("output reserve", output_reserve),
    ] {
        if !v.is_finite() || v <= 0.0 {
            return Err(EngineError::InvalidAmount {
                value: v.to_string(),
                reason: format!("{name} must be a positive finite number"),
            });
        }
    }
    Ok(input * output_reserve / (input_reserve + input))
}

/// Compose the formula across a multi-hop route.
pub fn quote_route(input: f64, route: &[PoolHop]) -> Result<f64> {
    if route.is_empty() {
        return Err(EngineError::InvalidAmount {
            value: input.to_string(),
            reason: "swap route is empty".to_string(),
        });
    }
    let mut amount = input;
    for hop in route {
        amount = quote(amount, hop.input_reserve, hop.output_reserve)?;
    }
    Ok(amount)
}

/// Build the full quote including the slippage-floored minimum receive.
pub fn build_quote(
    input: f64,
    route: Vec<PoolHop>,
    output_exponent: u32,
    slippage_percent: f64,
) -> Result<SwapQuote> {
    let output_amount = quote_route(input, &route)?;
    let min_receive = minimum_receive(output_amount, output_exponent, slippage_percent)?;
    Ok(SwapQuote {
        input_amount: input,
        route,
        output_amount,
        min_receive,
    })
}

/// `floor(output × 10^exponent × (1 - slippage/100))`, clamped to at least
/// one base unit so a swap can never ask for zero.
pub fn minimum_receive(
    output_human: f64,
    output_exponent: u32,
    slippage_percent: f64,
) -> Result<String> {
    if !(0.0..=100.0).contains(&slippage_percent) {
        return Err(EngineError::InvalidAmount {
            value: slippage_percent.to_string(),
            reason: "slippage percent must be within 0..=100".to_string(),
        });
    }
    if !output_human.is_finite() || output_human < 0.0 {
        return Err(EngineError::InvalidAmount {
            value: output_human.to_string(),
            reason: "output amount must be non-negative".to_string(),
        });
    }
    let base: u128 = to_base_units(&format_human(output_human), output_exponent)?
        .parse()
        .map_err(|_| EngineError::InvalidAmount {
            value: output_human.to_string(),
            reason: "output amount exceeds the representable range".to_string(),
        })?;

    // slippage applied in basis points, integer arithmetic throughout
    let slippage_bps = (slippage_percent * 100.0).round() as u128;
    let min = base.saturating_mul(10_000 - slippage_bps) / 10_000;
    Ok(min.max(1).to_string())
}

/// Fail fast when the receiving side of the pool cannot cover the requested
/// input expressed in its own terms.
pub fn check_receiving_liquidity(input_in_output_terms: f64, output_reserve: f64) -> Result<()> {
    if input_in_output_terms >= output_reserve {
        return Err(EngineError::InsufficientLiquidity {
            requested: input_in_output_terms.to_string(),
            reserve: output_reserve.to_string(),
        });
    }
    Ok(())
}

/// Human decimal string to base-unit integer string: shift the decimal point
/// `exponent` places, truncating excess fractional digits toward zero.
pub fn to_base_units(human: &str, exponent: u32) -> Result<String> {
    let human = human.trim();
    let invalid = |reason: &str| EngineError::InvalidAmount {
        value: human.to_string(),
        reason: reason.to_string(),
    };
    if human.is_empty() {
        return Err(invalid("empty amount"));
    }
    let (int_part, frac_part) = match human.split_once('.') {
        Some((i, f)) => (i, f),
        None => (human, ""),
    };
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("not a plain decimal number"));
    }

    let exponent = exponent as usize;
    let mut digits = String::with_capacity(int_part.len() + exponent);
    digits.push_str(int_part);
    if frac_part.len() >= exponent {
        // shift consumes part of the fraction; the rest is truncated
        digits.push_str(&frac_part[..exponent]);
    } else {
        digits.push_str(frac_part);
        for _ in frac_part.len()..exponent {
            digits.push('0');
        }
    }
    let trimmed = digits.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Base-unit integer string back to a human decimal string.
pub fn from_base_units(base: &str, exponent: u32) -> Result<String> {
    let invalid = |reason: &str| EngineError::InvalidAmount {
        value: base.to_string(),
        reason: reason.to_string(),
    };
    if base.is_empty() || !base.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a plain integer string"));
    }
    let exponent = exponent as usize;
    if exponent == 0 {
        let trimmed = base.trim_start_matches('0');
        return Ok(if trimmed.is_empty() { "0" } else { trimmed }.to_string());
    }
    let padded = if base.len() <= exponent {
        format!("{}{}", "0".repeat(exponent - base.len() + 1), base)
    } else {
        base.to_string()
    };
    let split = padded.len() - exponent;
    let int_part = padded[..split].trim_start_matches('0');
    let frac_part = padded[split..].trim_end_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    Ok(if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    })
}

/// Render an f64 human amount with enough digits for conversion without
/// scientific notation.
fn format_human(v: f64) -> String {
    let s = format!("{v:.18}");
    let s = s.trim_end_matches('0');
    s.trim_end_matches('.').to_string()
}
