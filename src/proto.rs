//! Cosmos SDK transaction framing and the standard message shapes, declared
//! directly as prost structs with explicit field tags so no protoc step is
//! needed. Field numbers follow the published Cosmos SDK / IBC protos and
//! must never be changed: the chain verifies signatures over these exact
//! bytes.

pub use prost_types::{Any, Timestamp};

// ---------------------------------------------------------------------------
// Transaction framing (cosmos.tx.v1beta1, cosmos.base.v1beta1)
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<Any>,
    #[prost(message, repeated, tag = "2047")]
    pub non_critical_extension_options: Vec<Any>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ModeInfo {
    #[prost(oneof = "mode_info::Sum", tags = "1")]
    pub sum: Option<mode_info::Sum>,
}

pub mod mode_info {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Single {
        #[prost(int32, tag = "1")]
        pub mode: i32,
    }

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Sum {
        #[prost(message, tag = "1")]
        Single(Single),
    }
}

/// SIGN_MODE_DIRECT from cosmos.tx.signing.v1beta1.SignMode.
pub const SIGN_MODE_DIRECT: i32 = 1;

#[derive(Clone, PartialEq, prost::Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

/// Compressed secp256k1 public key. Both the standard and the ethsecp256k1
/// variants carry the same single `key` field; only the `Any` type URL
/// differs.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

pub const TYPE_URL_PUBKEY_SECP256K1: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const TYPE_URL_PUBKEY_ETHSECP256K1: &str = "/ethermint.crypto.v1.ethsecp256k1.PubKey";

// ---------------------------------------------------------------------------
// Bank
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

// ---------------------------------------------------------------------------
// Staking
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgDelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
    #[prost(message, optional, tag = "3")]
    pub amount: Option<Coin>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgUndelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
    #[prost(message, optional, tag = "3")]
    pub amount: Option<Coin>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgBeginRedelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_src_address: String,
    #[prost(string, tag = "3")]
    pub validator_dst_address: String,
    #[prost(message, optional, tag = "4")]
    pub amount: Option<Coin>,
}

/// Scoped delegation authorization (cosmos.staking.v1beta1.StakeAuthorization).
#[derive(Clone, PartialEq, prost::Message)]
pub struct StakeAuthorization {
    #[prost(message, optional, tag = "1")]
    pub max_tokens: Option<Coin>,
    #[prost(oneof = "stake_authorization::Policy", tags = "2, 3")]
    pub validators: Option<stake_authorization::Policy>,
    #[prost(int32, tag = "4")]
    pub authorization_type: i32,
}

pub mod stake_authorization {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Validators {
        #[prost(string, repeated, tag = "1")]
        pub address: Vec<String>,
    }

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Policy {
        #[prost(message, tag = "2")]
        AllowList(Validators),
        #[prost(message, tag = "3")]
        DenyList(Validators),
    }
}

/// AuthorizationType.AUTHORIZATION_TYPE_DELEGATE
pub const AUTHORIZATION_TYPE_DELEGATE: i32 = 1;

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgWithdrawDelegatorReward {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgWithdrawValidatorCommission {
    #[prost(string, tag = "1")]
    pub validator_address: String,
}

// ---------------------------------------------------------------------------
// Gov
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgVote {
    #[prost(uint64, tag = "1")]
    pub proposal_id: u64,
    #[prost(string, tag = "2")]
    pub voter: String,
    #[prost(int32, tag = "3")]
    pub option: i32,
}

/// cosmos.gov.v1beta1.VoteOption values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum VoteOption {
    Unspecified = 0,
    Yes = 1,
    Abstain = 2,
    No = 3,
    NoWithVeto = 4,
}

// ---------------------------------------------------------------------------
// Authz
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericAuthorization {
    #[prost(string, tag = "1")]
    pub msg: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Grant {
    #[prost(message, optional, tag = "1")]
    pub authorization: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub expiration: Option<Timestamp>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgGrant {
    #[prost(string, tag = "1")]
    pub granter: String,
    #[prost(string, tag = "2")]
    pub grantee: String,
    #[prost(message, optional, tag = "3")]
    pub grant: Option<Grant>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgRevoke {
    #[prost(string, tag = "1")]
    pub granter: String,
    #[prost(string, tag = "2")]
    pub grantee: String,
    #[prost(string, tag = "3")]
    pub msg_type_url: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgExec {
    #[prost(string, tag = "1")]
    pub grantee: String,
    #[prost(message, repeated, tag = "2")]
    pub msgs: Vec<Any>,
}

// ---------------------------------------------------------------------------
// IBC transfer (ibc.applications.transfer.v1)
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct Height {
    #[prost(uint64, tag = "1")]
    pub revision_number: u64,
    #[prost(uint64, tag = "2")]
    pub revision_height: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgTransfer {
    #[prost(string, tag = "1")]
    pub source_port: String,
    #[prost(string, tag = "2")]
    pub source_channel: String,
    #[prost(message, optional, tag = "3")]
    pub token: Option<Coin>,
    #[prost(string, tag = "4")]
    pub sender: String,
    #[prost(string, tag = "5")]
    pub receiver: String,
    #[prost(message, optional, tag = "6")]
    pub timeout_height: Option<Height>,
    #[prost(uint64, tag = "7")]
    pub timeout_timestamp: u64,
    #[prost(string, tag = "8")]
    pub memo: String,
}

// ---------------------------------------------------------------------------
// Type URLs
// ---------------------------------------------------------------------------

pub const TYPE_URL_MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const TYPE_URL_MSG_DELEGATE: &str = "/cosmos.staking.v1beta1.MsgDelegate";
pub const TYPE_URL_MSG_UNDELEGATE: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
pub const TYPE_URL_MSG_BEGIN_REDELEGATE: &str = "/cosmos.staking.v1beta1.MsgBeginRedelegate";
pub const TYPE_URL_MSG_WITHDRAW_REWARD: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const TYPE_URL_MSG_WITHDRAW_COMMISSION: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission";
pub const TYPE_URL_MSG_VOTE: &str = "/cosmos.gov.v1beta1.MsgVote";
pub const TYPE_URL_MSG_GRANT: &str = "/cosmos.authz.v1beta1.MsgGrant";
pub const TYPE_URL_MSG_REVOKE: &str = "/cosmos.authz.v1beta1.MsgRevoke";
pub const TYPE_URL_MSG_EXEC: &str = "/cosmos.authz.v1beta1.MsgExec";
pub const TYPE_URL_MSG_TRANSFER: &str = "/ibc.applications.transfer.v1.MsgTransfer";
pub const TYPE_URL_STAKE_AUTHORIZATION: &str = "/cosmos.staking.v1beta1.StakeAuthorization";
pub const TYPE_URL_GENERIC_AUTHORIZATION: &str = "/cosmos.authz.v1beta1.GenericAuthorization";

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn coin_roundtrip() {
        let coin = Coin {
            denom: "uatom".to_string(),
            amount: "7500".to_string(),
        };
        let bytes = coin.encode_to_vec();
        let back = Coin::decode(&bytes[..]).unwrap();
        assert_eq!(coin, back);
    }

    #[test]
    fn tx_raw_roundtrip() {
        let raw = TxRaw {
            body_bytes: vec![1, 2, 3],
            auth_info_bytes: vec![4, 5],
            signatures: vec![vec![9; 64]],
        };
        let bytes = raw.encode_to_vec();
        let back = TxRaw::decode(&bytes[..]).unwrap();
        assert_eq!(raw, back);
    }

    #[test]
    fn empty_coin_encodes_to_nothing() {
        // proto3 default values must be omitted from the wire so that
        // identical logical inputs always produce identical bytes.
        let coin = Coin::default();
        assert!(coin.encode_to_vec().is_empty());
    }

    #[test]
    fn stake_authorization_allow_list_wire() {
        let auth = StakeAuthorization {
            max_tokens: None,
            validators: Some(stake_authorization::Policy::AllowList(
                stake_authorization::Validators {
                    address: vec!["cosmosvaloper1abc".to_string()],
                },
            )),
            authorization_type: AUTHORIZATION_TYPE_DELEGATE,
        };
        let bytes = auth.encode_to_vec();
        let back = StakeAuthorization::decode(&bytes[..]).unwrap();
        assert_eq!(auth, back);
        // allow_list lives at field 2; first byte is tag 2, wire type 2
        assert_eq!(bytes[0], 0x12);
    }
}
