//! Message codec registry: maps a protobuf type URL to an encode/decode
//! pair. Standard bank/staking/distribution/gov/authz/IBC shapes are backed
//! by the prost structs in [`crate::proto`]; the swap, unjail and
//! edit-validator messages use the hand-written codecs in [`wire`].

pub mod wire;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use prost::Message;

use crate::error::{EngineError, Result};
use crate::proto::{self, Any};

pub use wire::{MsgEditValidator, MsgSwap, MsgUnjail, ValidatorDescription, DO_NOT_MODIFY};

/// Every message the engine can carry in a transaction body.
#[derive(Debug, Clone, PartialEq)]
pub enum MsgPayload {
    Send(proto::MsgSend),
    Delegate(proto::MsgDelegate),
    Undelegate(proto::MsgUndelegate),
    BeginRedelegate(proto::MsgBeginRedelegate),
    WithdrawReward(proto::MsgWithdrawDelegatorReward),
    WithdrawCommission(proto::MsgWithdrawValidatorCommission),
    Vote(proto::MsgVote),
    Grant(proto::MsgGrant),
    Revoke(proto::MsgRevoke),
    Exec(proto::MsgExec),
    IbcTransfer(proto::MsgTransfer),
    Swap(MsgSwap),
    Unjail(MsgUnjail),
    EditValidator(MsgEditValidator),
}

impl MsgPayload {
    pub fn type_url(&self) -> &'static str {
        match self {
            MsgPayload::Send(_) => proto::TYPE_URL_MSG_SEND,
            MsgPayload::Delegate(_) => proto::TYPE_URL_MSG_DELEGATE,
            MsgPayload::Undelegate(_) => proto::TYPE_URL_MSG_UNDELEGATE,
            MsgPayload::BeginRedelegate(_) => proto::TYPE_URL_MSG_BEGIN_REDELEGATE,
            MsgPayload::WithdrawReward(_) => proto::TYPE_URL_MSG_WITHDRAW_REWARD,
            MsgPayload::WithdrawCommission(_) => proto::TYPE_URL_MSG_WITHDRAW_COMMISSION,
            MsgPayload::Vote(_) => proto::TYPE_URL_MSG_VOTE,
            MsgPayload::Grant(_) => proto::TYPE_URL_MSG_GRANT,
            MsgPayload::Revoke(_) => proto::TYPE_URL_MSG_REVOKE,
            MsgPayload::Exec(_) => proto::TYPE_URL_MSG_EXEC,
            MsgPayload::IbcTransfer(_) => proto::TYPE_URL_MSG_TRANSFER,
            MsgPayload::Swap(_) => wire::TYPE_URL_MSG_SWAP,
            MsgPayload::Unjail(_) => wire::TYPE_URL_MSG_UNJAIL,
            MsgPayload::EditValidator(_) => wire::TYPE_URL_MSG_EDIT_VALIDATOR,
        }
    }
}

type EncodeFn = fn(&MsgPayload) -> Result<Vec<u8>>;
type DecodeFn = fn(&[u8]) -> Result<MsgPayload>;

pub struct MessageCodec {
    pub type_url: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

fn wrong_variant(type_url: &str) -> EngineError {
    EngineError::Encoding {
        type_url: type_url.to_string(),
        reason: "payload variant does not match codec type".to_string(),
    }
}

fn prost_decode_err(type_url: &str, e: prost::DecodeError) -> EngineError {
    EngineError::Encoding {
        type_url: type_url.to_string(),
        reason: e.to_string(),
    }
}

macro_rules! prost_codec {
    ($variant:ident, $msg:ty, $url:expr) => {
        MessageCodec {
            type_url: $url,
            encode: |p| match p {
                MsgPayload::$variant(m) => Ok(m.encode_to_vec()),
                _ => Err(wrong_variant($url)),
            },
            decode: |b| {
                <$msg>::decode(b)
                    .map(MsgPayload::$variant)
                    .map_err(|e| prost_decode_err($url, e))
            },
        }
    };
}

macro_rules! wire_codec {
    ($variant:ident, $msg:ty, $url:expr) => {
        MessageCodec {
            type_url: $url,
            encode: |p| match p {
                MsgPayload::$variant(m) => m.encode(),
                _ => Err(wrong_variant($url)),
            },
            decode: |b| <$msg>::decode(b).map(MsgPayload::$variant),
        }
    };
}

static REGISTRY: Lazy<HashMap<&'static str, MessageCodec>> = Lazy::new(|| {
    let codecs = [
        prost_codec!(Send, proto::MsgSend, proto::TYPE_URL_MSG_SEND),
        prost_codec!(Delegate, proto::MsgDelegate, proto::TYPE_URL_MSG_DELEGATE),
        prost_codec!(Undelegate, proto::MsgUndelegate, proto::TYPE_URL_MSG_UNDELEGATE),
        prost_codec!(
            BeginRedelegate,
            proto::MsgBeginRedelegate,
            proto::TYPE_URL_MSG_BEGIN_REDELEGATE
        ),
        prost_codec!(
            WithdrawReward,
            proto::MsgWithdrawDelegatorReward,
            proto::TYPE_URL_MSG_WITHDRAW_REWARD
        ),
        prost_codec!(
            WithdrawCommission,
            proto::MsgWithdrawValidatorCommission,
            proto::TYPE_URL_MSG_WITHDRAW_COMMISSION
        ),
        prost_codec!(Vote, proto::MsgVote, proto::TYPE_URL_MSG_VOTE),
        prost_codec!(Grant, proto::MsgGrant, proto::TYPE_URL_MSG_GRANT),
        prost_codec!(Revoke, proto::MsgRevoke, proto::TYPE_URL_MSG_REVOKE),
        prost_codec!(Exec, proto::MsgExec, proto::TYPE_URL_MSG_EXEC),
        prost_codec!(IbcTransfer, proto::MsgTransfer, proto::TYPE_URL_MSG_TRANSFER),
        wire_codec!(Swap, MsgSwap, wire::TYPE_URL_MSG_SWAP),
        wire_codec!(Unjail, MsgUnjail, wire::TYPE_URL_MSG_UNJAIL),
        wire_codec!(
            EditValidator,
            MsgEditValidator,
            wire::TYPE_URL_MSG_EDIT_VALIDATOR
        ),
    ];
    codecs.into_iter().map(|c| (c.type_url, c)).collect()
});

pub fn lookup(type_url: &str) -> Result<&'static MessageCodec> {
    REGISTRY.get(type_url).ok_or_else(|| EngineError::UnknownMessageType {
        type_url: type_url.to_string(),
    })
}

pub fn registered_type_urls() -> Vec<&'static str> {
    let mut urls: Vec<_> = REGISTRY.keys().copied().collect();
    urls.sort_unstable();
    urls
}

/// Encode one message into its `Any` wrapper.
pub fn encode_any(msg: &MsgPayload) -> Result<Any> {
    let codec = lookup(msg.type_url())?;
    let value = (codec.encode)(msg)?;
    Ok(Any {
        type_url: codec.type_url.to_string(),
        value,
    })
}

/// Decode an `Any` back into its payload.
pub fn decode_any(any: &Any) -> Result<MsgPayload> {
    let codec = lookup(&any.type_url)?;
    (codec.decode)(&any.value)
}

/// Encode an ordered batch. Any failure aborts the whole batch; a partially
/// encoded transaction must never reach the signer.
pub fn encode_batch(msgs: &[MsgPayload]) -> Result<Vec<Any>> {
    if msgs.is_empty() {
        return Err(EngineError::Encoding {
            type_url: String::new(),
            reason: "a transaction must carry at least one message".to_string(),
        });
    }
    msgs.iter().map(encode_any).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Coin;

    fn sample_send() -> MsgPayload {
        MsgPayload::Send(proto::MsgSend {
            from_address: "cosmos1from".to_string(),
            to_address: "cosmos1to".to_string(),
            amount: vec![Coin {
                denom: "uatom".to_string(),
                amount: "1000".to_string(),
            }],
        })
    }

    #[test]
    fn all_registered_urls_resolve() {
        for url in registered_type_urls() {
            assert!(lookup(url).is_ok(), "missing codec for {url}");
        }
        assert_eq!(registered_type_urls().len(), 14);
    }

    #[test]
    fn roundtrip_every_kind() {
        let msgs = vec![
            sample_send(),
            MsgPayload::Delegate(proto::MsgDelegate {
                delegator_address: "cosmos1d".to_string(),
                validator_address: "cosmosvaloper1v".to_string(),
                amount: Some(Coin {
                    denom: "uatom".to_string(),
                    amount: "5".to_string(),
                }),
            }),
            MsgPayload::Vote(proto::MsgVote {
                proposal_id: 12,
                voter: "cosmos1v".to_string(),
                option: proto::VoteOption::Yes as i32,
            }),
            MsgPayload::Revoke(proto::MsgRevoke {
                granter: "cosmos1g".to_string(),
                grantee: "cosmos1e".to_string(),
                msg_type_url: proto::TYPE_URL_MSG_DELEGATE.to_string(),
            }),
            MsgPayload::IbcTransfer(proto::MsgTransfer {
                source_port: "transfer".to_string(),
                source_channel: "channel-141".to_string(),
                token: Some(Coin {
                    denom: "uatom".to_string(),
                    amount: "77".to_string(),
                }),
                sender: "cosmos1s".to_string(),
                receiver: "osmo1r".to_string(),
                timeout_height: Some(proto::Height {
                    revision_number: 1,
                    revision_height: 9_000_000,
                }),
                timeout_timestamp: 0,
                memo: String::new(),
            }),
            MsgPayload::Swap(MsgSwap {
                creator: "cosmos1c".to_string(),
                contract: "cosmos1pool".to_string(),
                offer_denom: "uatom".to_string(),
                offer_amount: "100".to_string(),
                min_receive: "49".to_string(),
            }),
            MsgPayload::Unjail(MsgUnjail {
                validator_addr: "cosmosvaloper1v".to_string(),
            }),
            MsgPayload::EditValidator(
                MsgEditValidator::commission_only("cosmosvaloper1v", "0.1").unwrap(),
            ),
        ];
        for msg in msgs {
            let any = encode_any(&msg).unwrap();
            assert_eq!(any.type_url, msg.type_url());
            assert_eq!(decode_any(&any).unwrap(), msg);
        }
    }

    #[test]
    fn unknown_type_url_is_rejected() {
        let any = Any {
            type_url: "/made.up.v1.MsgNothing".to_string(),
            value: vec![],
        };
        assert!(matches!(
            decode_any(&any),
            Err(EngineError::UnknownMessageType { .. })
        ));
    }

    #[test]
    fn batch_encode_is_atomic() {
        let bad = MsgPayload::Swap(MsgSwap::default()); // missing creator
        let batch = vec![sample_send(), bad, sample_send()];
        assert!(encode_batch(&batch).is_err());

        let good = vec![sample_send(), sample_send()];
        assert_eq!(encode_batch(&good).unwrap().len(), 2);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(encode_batch(&[]).is_err());
    }

    #[test]
    fn batch_preserves_order() {
        let batch = vec![
            MsgPayload::Unjail(MsgUnjail {
                validator_addr: "v1".to_string(),
            }),
            sample_send(),
        ];
        let anys = encode_batch(&batch).unwrap();
        assert_eq!(anys[0].type_url, wire::TYPE_URL_MSG_UNJAIL);
        assert_eq!(anys[1].type_url, proto::TYPE_URL_MSG_SEND);
    }
}
