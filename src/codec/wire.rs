//! Hand-written protobuf wire codecs for the message shapes that exist in no
//! published proto registry: the AMM swap message, validator unjail, and
//! edit-validator-commission. These are kept as explicit writer/reader
//! functions so the exact byte layout is visible and testable.

use crate::error::{EngineError, Result};

pub const TYPE_URL_MSG_SWAP: &str = "/amm.v1.MsgSwap";
pub const TYPE_URL_MSG_UNJAIL: &str = "/cosmos.slashing.v1beta1.MsgUnjail";
pub const TYPE_URL_MSG_EDIT_VALIDATOR: &str = "/cosmos.staking.v1beta1.MsgEditValidator";

/// Sentinel the chain expects for description fields that are not being
/// modified. Sending an empty string would blank the field instead.
pub const DO_NOT_MODIFY: &str = "[do-not-modify]";

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

// ---------------------------------------------------------------------------
// Writer primitives
// ---------------------------------------------------------------------------

pub fn put_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_uvarint(buf, ((field as u64) << 3) | wire_type as u64);
}

/// Length-delimited UTF-8 string field. Empty strings are omitted, matching
/// proto3 default-value semantics (required for deterministic output).
pub fn put_string(buf: &mut Vec<u8>, field: u32, s: &str) {
    if s.is_empty() {
        return;
    }
    put_key(buf, field, WIRE_LEN);
    put_uvarint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Length-delimited embedded message field. Empty payloads are still written
/// (an empty nested message is distinct from an absent one).
pub fn put_message(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_uvarint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

// ---------------------------------------------------------------------------
// Reader primitives
// ---------------------------------------------------------------------------

pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn uvarint(&mut self) -> std::result::Result<u64, String> {
        let mut v: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| "truncated varint".to_string())?;
            self.pos += 1;
            if shift >= 64 {
                return Err("varint overflow".to_string());
            }
            v |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(v);
            }
            shift += 7;
        }
    }

    /// Next field key, or None at end of buffer.
    pub fn next_key(&mut self) -> std::result::Result<Option<(u32, u8)>, String> {
        if self.is_empty() {
            return Ok(None);
        }
        let key = self.uvarint()?;
        let field = (key >> 3) as u32;
        let wire_type = (key & 0x7) as u8;
        if field == 0 {
            return Err("field number 0 is invalid".to_string());
        }
        Ok(Some((field, wire_type)))
    }

    pub fn bytes(&mut self) -> std::result::Result<&'a [u8], String> {
        let len = self.uvarint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| "truncated length-delimited field".to_string())?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn string(&mut self) -> std::result::Result<String, String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| "invalid UTF-8 in string field".to_string())
    }

    pub fn skip(&mut self, wire_type: u8) -> std::result::Result<(), String> {
        match wire_type {
            WIRE_VARINT => {
                self.uvarint()?;
            }
            WIRE_FIXED64 => {
                self.pos = self
                    .pos
                    .checked_add(8)
                    .filter(|&e| e <= self.buf.len())
                    .ok_or_else(|| "truncated fixed64".to_string())?;
            }
            WIRE_LEN => {
                self.bytes()?;
            }
            WIRE_FIXED32 => {
                self.pos = self
                    .pos
                    .checked_add(4)
                    .filter(|&e| e <= self.buf.len())
                    .ok_or_else(|| "truncated fixed32".to_string())?;
            }
            other => return Err(format!("unknown wire type {other}")),
        }
        Ok(())
    }
}

fn decode_err(type_url: &str, reason: impl Into<String>) -> EngineError {
    EngineError::Encoding {
        type_url: type_url.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// MsgSwap
// ---------------------------------------------------------------------------

/// AMM swap message. All five fields are length-delimited UTF-8 strings,
/// written in ascending field-number order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MsgSwap {
    pub creator: String,
    pub contract: String,
    pub offer_denom: String,
    pub offer_amount: String,
    pub min_receive: String,
}

impl MsgSwap {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.creator.is_empty() || self.offer_amount.is_empty() {
            return Err(decode_err(
                TYPE_URL_MSG_SWAP,
                "creator and offer_amount are required",
            ));
        }
        validate_integer_amount(&self.offer_amount)
            .map_err(|reason| decode_err(TYPE_URL_MSG_SWAP, reason))?;
        let mut buf = Vec::new();
        put_string(&mut buf, 1, &self.creator);
        put_string(&mut buf, 2, &self.contract);
        put_string(&mut buf, 3, &self.offer_denom);
        put_string(&mut buf, 4, &self.offer_amount);
        put_string(&mut buf, 5, &self.min_receive);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut msg = MsgSwap::default();
        let mut r = WireReader::new(bytes);
        loop {
            match r.next_key().map_err(|e| decode_err(TYPE_URL_MSG_SWAP, e))? {
                None => break,
                Some((field, WIRE_LEN)) => {
                    let s = r.string().map_err(|e| decode_err(TYPE_URL_MSG_SWAP, e))?;
                    match field {
                        1 => msg.creator = s,
                        2 => msg.contract = s,
                        3 => msg.offer_denom = s,
                        4 => msg.offer_amount = s,
                        5 => msg.min_receive = s,
                        _ => {}
                    }
                }
                Some((_, wt)) => r.skip(wt).map_err(|e| decode_err(TYPE_URL_MSG_SWAP, e))?,
            }
        }
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// MsgUnjail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MsgUnjail {
    pub validator_addr: String,
}

impl MsgUnjail {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.validator_addr.is_empty() {
            return Err(decode_err(TYPE_URL_MSG_UNJAIL, "validator_addr is required"));
        }
        let mut buf = Vec::new();
        put_string(&mut buf, 1, &self.validator_addr);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut msg = MsgUnjail::default();
        let mut r = WireReader::new(bytes);
        loop {
            match r.next_key().map_err(|e| decode_err(TYPE_URL_MSG_UNJAIL, e))? {
                None => break,
                Some((1, WIRE_LEN)) => {
                    msg.validator_addr =
                        r.string().map_err(|e| decode_err(TYPE_URL_MSG_UNJAIL, e))?;
                }
                Some((_, wt)) => r.skip(wt).map_err(|e| decode_err(TYPE_URL_MSG_UNJAIL, e))?,
            }
        }
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// MsgEditValidator
// ---------------------------------------------------------------------------

/// Validator description block. Fields not being modified must carry the
/// `[do-not-modify]` sentinel, never an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorDescription {
    pub moniker: String,
    pub identity: String,
    pub website: String,
    pub security_contact: String,
    pub details: String,
}

impl Default for ValidatorDescription {
    fn default() -> Self {
        Self {
            moniker: DO_NOT_MODIFY.to_string(),
            identity: DO_NOT_MODIFY.to_string(),
            website: DO_NOT_MODIFY.to_string(),
            security_contact: DO_NOT_MODIFY.to_string(),
            details: DO_NOT_MODIFY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MsgEditValidator {
    pub description: ValidatorDescription,
    pub validator_address: String,
    /// Fixed-point commission rate scaled by 10^18, e.g. "0.05" becomes
    /// "50000000000000000". None leaves the rate untouched.
    pub commission_rate: Option<String>,
    pub min_self_delegation: Option<String>,
}

impl MsgEditValidator {
    /// Build an edit message that only changes the commission rate, with all
    /// description fields carrying the unchanged sentinel.
    pub fn commission_only(validator_address: &str, rate_decimal: &str) -> Result<Self> {
        let fixed = dec_to_fixed(rate_decimal)
            .map_err(|reason| decode_err(TYPE_URL_MSG_EDIT_VALIDATOR, reason))?;
        Ok(Self {
            description: ValidatorDescription::default(),
            validator_address: validator_address.to_string(),
            commission_rate: Some(fixed),
            min_self_delegation: None,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.validator_address.is_empty() {
            return Err(decode_err(
                TYPE_URL_MSG_EDIT_VALIDATOR,
                "validator_address is required",
            ));
        }
        if let Some(rate) = &self.commission_rate {
            validate_integer_amount(rate)
                .map_err(|reason| decode_err(TYPE_URL_MSG_EDIT_VALIDATOR, reason))?;
        }
        let mut desc = Vec::new();
        put_string(&mut desc, 1, &self.description.moniker);
        put_string(&mut desc, 2, &self.description.identity);
        put_string(&mut desc, 3, &self.description.website);
        put_string(&mut desc, 4, &self.description.security_contact);
        put_string(&mut desc, 5, &self.description.details);

        let mut buf = Vec::new();
        put_message(&mut buf, 1, &desc);
        put_string(&mut buf, 2, &self.validator_address);
        if let Some(rate) = &self.commission_rate {
            put_string(&mut buf, 3, rate);
        }
        if let Some(min) = &self.min_self_delegation {
            put_string(&mut buf, 4, min);
        }
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let err = |e| decode_err(TYPE_URL_MSG_EDIT_VALIDATOR, e);
        let mut msg = MsgEditValidator {
            description: ValidatorDescription {
                moniker: String::new(),
                identity: String::new(),
                website: String::new(),
                security_contact: String::new(),
                details: String::new(),
            },
            ..Default::default()
        };
        let mut r = WireReader::new(bytes);
        loop {
            match r.next_key().map_err(err)? {
                None => break,
                Some((1, WIRE_LEN)) => {
                    let inner = r.bytes().map_err(err)?;
                    let mut dr = WireReader::new(inner);
                    loop {
                        match dr.next_key().map_err(err)? {
                            None => break,
                            Some((field, WIRE_LEN)) => {
                                let s = dr.string().map_err(err)?;
                                match field {
                                    1 => msg.description.moniker = s,
                                    2 => msg.description.identity = s,
                                    3 => msg.description.website = s,
                                    4 => msg.description.security_contact = s,
                                    5 => msg.description.details = s,
                                    _ => {}
                                }
                            }
                            Some((_, wt)) => dr.skip(wt).map_err(err)?,
                        }
                    }
                }
                Some((2, WIRE_LEN)) => msg.validator_address = r.string().map_err(err)?,
                Some((3, WIRE_LEN)) => msg.commission_rate = Some(r.string().map_err(err)?),
                Some((4, WIRE_LEN)) => msg.min_self_delegation = Some(r.string().map_err(err)?),
                Some((_, wt)) => r.skip(wt).map_err(err)?,
            }
        }
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// Amount helpers
// ---------------------------------------------------------------------------

/// Amounts on the wire are bare integer strings: no sign, no decimal point,
/// no scientific notation.
pub fn validate_integer_amount(s: &str) -> std::result::Result<(), String> {
    if s.is_empty() {
        return Err("amount is empty".to_string());
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("amount {s:?} is not a plain integer string"));
    }
    Ok(())
}

/// Convert a decimal string ("0.05") to the chain's 10^18 fixed-point integer
/// representation ("50000000000000000") using pure string arithmetic. Never
/// goes through floating point.
pub fn dec_to_fixed(decimal: &str) -> std::result::Result<String, String> {
    let decimal = decimal.trim();
    if decimal.is_empty() {
        return Err("empty decimal string".to_string());
    }
    let (int_part, frac_part) = match decimal.split_once('.') {
        Some((i, f)) => (i, f),
        None => (decimal, ""),
    };
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!("invalid decimal string {decimal:?}"));
    }
    if frac_part.len() > 18 {
        return Err(format!(
            "decimal {decimal:?} has more than 18 fractional digits"
        ));
    }
    let mut out = String::with_capacity(int_part.len() + 18);
    out.push_str(int_part);
    out.push_str(frac_part);
    for _ in frac_part.len()..18 {
        out.push('0');
    }
    let trimmed = out.trim_start_matches('0');
    Ok(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}
