//! Assembles the canonical body and auth-info bytes a signer signs over.
//! Given identical inputs the output is byte-identical, which the two-pass
//! simulate-then-final flow depends on.

use prost::Message;

use crate::account::Account;
use crate::chain::CurveKind;
use crate::codec::wire::validate_integer_amount;
use crate::error::{EngineError, Result};
use crate::proto::{
    mode_info, Any, AuthInfo, Coin, Fee, ModeInfo, PubKey, SignDoc, SignerInfo, TxBody,
    SIGN_MODE_DIRECT, TYPE_URL_PUBKEY_ETHSECP256K1, TYPE_URL_PUBKEY_SECP256K1,
};

/// The unsigned document: framing bytes plus the exact bytes to sign.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTx {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub sign_bytes: Vec<u8>,
}

/// Fee as supplied by callers: integer-string amounts plus a gas limit.
#[derive(Debug, Clone, PartialEq)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

impl StdFee {
    pub fn new(amount: Vec<Coin>, gas_limit: u64) -> Self {
        Self { amount, gas_limit }
    }

    pub fn zero(gas_limit: u64) -> Self {
        Self {
            amount: vec![],
            gas_limit,
        }
    }

    fn validate(&self) -> Result<()> {
        for coin in &self.amount {
            validate_integer_amount(&coin.amount).map_err(|reason| EngineError::InvalidAmount {
                value: coin.amount.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    fn to_proto(&self) -> Fee {
        Fee {
            amount: self.amount.clone(),
            gas_limit: self.gas_limit,
            payer: String::new(),
            granter: String::new(),
        }
    }
}

/// Pick the pubkey `Any` type tag. An account's own declared key type always
/// wins; otherwise the profile's curve kind selects the default tag. The key
/// bytes themselves are identical for both tags.
pub fn pub_key_any(account: &Account, signer_pub_key: &[u8]) -> Any {
    let (type_url, key) = match &account.pub_key {
        Some(declared) => (declared.type_url.clone(), declared.key.clone()),
        None => {
            let url = match account.curve {
                CurveKind::Standard => TYPE_URL_PUBKEY_SECP256K1,
                CurveKind::Evm => TYPE_URL_PUBKEY_ETHSECP256K1,
            };
            (url.to_string(), signer_pub_key.to_vec())
        }
    };
    Any {
        type_url,
        value: PubKey { key }.encode_to_vec(),
    }
}

/// Build the SignDoc for `(account, messages, fee, memo, chain_id)`.
///
/// The sequence embedded is the account's current one, not incremented; the
/// chain increments it after acceptance.
pub fn build(
    account: &Account,
    signer_pub_key: &[u8],
    messages: &[Any],
    fee: &StdFee,
    memo: &str,
    chain_id: &str,
) -> Result<UnsignedTx> {
    if messages.is_empty() {
        return Err(EngineError::Encoding {
            type_url: String::new(),
            reason: "transaction body must carry at least one message".to_string(),
        });
    }
    fee.validate()?;

    let tx_body = TxBody {
        messages: messages.to_vec(),
        memo: memo.to_string(),
        timeout_height: 0,
        extension_options: vec![],
        non_critical_extension_options: vec![],
    };

    let signer_info = SignerInfo {
        public_key: Some(pub_key_any(account, signer_pub_key)),
        mode_info: Some(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single {
                mode: SIGN_MODE_DIRECT,
            })),
        }),
        sequence: account.sequence,
    };

    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(fee.to_proto()),
    };

    let body_bytes = tx_body.encode_to_vec();
    let auth_info_bytes = auth_info.encode_to_vec();

    let sign_doc = SignDoc {
        body_bytes: body_bytes.clone(),
        auth_info_bytes: auth_info_bytes.clone(),
        chain_id: chain_id.to_string(),
        account_number: account.account_number,
    };
    let sign_bytes = sign_doc.encode_to_vec();

    Ok(UnsignedTx {
        body_bytes,
        auth_info_bytes,
        sign_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountPubKey;
    use crate::codec::{self, MsgPayload};
    use crate::proto::MsgSend;

    fn account(curve: CurveKind) -> Account {
        Account {
            address: "cosmos1abc".to_string(),
            account_number: 7,
            sequence: 3,
            pub_key: None,
            curve,
        }
    }

    fn messages() -> Vec<Any> {
        codec::encode_batch(&[MsgPayload::Send(MsgSend {
            from_address: "cosmos1abc".to_string(),
            to_address: "cosmos1def".to_string(),
            amount: vec![Coin {
                denom: "uatom".to_string(),
                amount: "100".to_string(),
            }],
        })])
        .unwrap()
    }

    fn fee() -> StdFee {
        StdFee::new(
            vec![Coin {
                denom: "uatom".to_string(),
                amount: "7500".to_string(),
            }],
            300_000,
        )
    }

    #[test]
    fn build_is_deterministic() {
        let acc = account(CurveKind::Standard);
        let pk = [2u8; 33];
        let a = build(&acc, &pk, &messages(), &fee(), "memo", "cosmoshub-4").unwrap();
        let b = build(&acc, &pk, &messages(), &fee(), "memo", "cosmoshub-4").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sign_bytes, b.sign_bytes);
    }

    #[test]
    fn curve_kind_selects_pubkey_tag() {
        let pk = [2u8; 33];
        let std_any = pub_key_any(&account(CurveKind::Standard), &pk);
        let evm_any = pub_key_any(&account(CurveKind::Evm), &pk);
        assert_eq!(std_any.type_url, TYPE_URL_PUBKEY_SECP256K1);
        assert_eq!(evm_any.type_url, TYPE_URL_PUBKEY_ETHSECP256K1);
        // same byte encoding for both tags
        assert_eq!(std_any.value, evm_any.value);
    }

    #[test]
    fn declared_key_type_overrides_curve_default() {
        let mut acc = account(CurveKind::Evm);
        acc.pub_key = Some(AccountPubKey {
            type_url: "/injective.crypto.v1beta1.ethsecp256k1.PubKey".to_string(),
            key: vec![3u8; 33],
        });
        let any = pub_key_any(&acc, &[2u8; 33]);
        assert_eq!(any.type_url, "/injective.crypto.v1beta1.ethsecp256k1.PubKey");
        let decoded = PubKey::decode(&any.value[..]).unwrap();
        assert_eq!(decoded.key, vec![3u8; 33]);
    }

    #[test]
    fn sequence_is_embedded_unincremented() {
        let acc = account(CurveKind::Standard);
        let tx = build(&acc, &[2u8; 33], &messages(), &fee(), "", "cosmoshub-4").unwrap();
        let auth = AuthInfo::decode(&tx.auth_info_bytes[..]).unwrap();
        assert_eq!(auth.signer_infos[0].sequence, 3);
    }

    #[test]
    fn decimal_fee_amount_rejected() {
        let acc = account(CurveKind::Standard);
        let bad_fee = StdFee::new(
            vec![Coin {
                denom: "uatom".to_string(),
                amount: "75.5".to_string(),
            }],
            300_000,
        );
        assert!(build(&acc, &[2u8; 33], &messages(), &bad_fee, "", "c").is_err());

        let sci_fee = StdFee::new(
            vec![Coin {
                denom: "inj".to_string(),
                amount: "1e18".to_string(),
            }],
            300_000,
        );
        assert!(build(&acc, &[2u8; 33], &messages(), &sci_fee, "", "c").is_err());
    }

    #[test]
    fn empty_message_list_rejected() {
        let acc = account(CurveKind::Standard);
        assert!(build(&acc, &[2u8; 33], &[], &fee(), "", "c").is_err());
    }
}
