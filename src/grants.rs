//! Authz grant construction for validator auto-compound setups.
//!
//! A grant batch authorizes a grantee (typically a restaking bot) to delegate
//! on the granter's behalf, scoped to a single validator through a
//! StakeAuthorization allow list, optionally alongside generic authorizations
//! for voting and commission withdrawal. Every grant in a batch shares one
//! expiration.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use prost::Message;

use crate::codec::MsgPayload;
use crate::error::{EngineError, Result};
use crate::proto::{
    self, stake_authorization, Any, GenericAuthorization, Grant, MsgGrant, MsgRevoke,
    StakeAuthorization, Timestamp, AUTHORIZATION_TYPE_DELEGATE,
};

/// Extra permissions that can ride along with the delegate grant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrantScopes {
    pub vote: bool,
    pub withdraw_commission: bool,
}

/// A grant the engine has set up, tracked so revocation can be validated.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantRecord {
    pub grantee: String,
    pub expiration: DateTime<Utc>,
    pub scopes: GrantScopes,
}

fn timestamp(at: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

fn wrap_grant(granter: &str, grantee: &str, authorization: Any, expires: DateTime<Utc>) -> MsgGrant {
    MsgGrant {
        granter: granter.to_string(),
        grantee: grantee.to_string(),
        grant: Some(Grant {
            authorization: Some(authorization),
            expiration: Some(timestamp(expires)),
        }),
    }
}

/// Build the grant batch for an auto-compound setup. The delegate grant is
/// always present and is scoped to `validator` alone; `scopes` adds generic
/// authorizations sharing the same expiration.
pub fn build_auto_compound_grants(
    granter: &str,
    grantee: &str,
    validator: &str,
    duration: Duration,
    scopes: GrantScopes,
) -> Result<Vec<MsgPayload>> {
    if granter.is_empty() || grantee.is_empty() || validator.is_empty() {
        return Err(EngineError::InvalidGrant(
            "granter, grantee and validator are all required".to_string(),
        ));
    }
    if grantee == granter {
        return Err(EngineError::InvalidGrant(
            "granter and grantee must differ".to_string(),
        ));
    }
    if duration <= Duration::zero() {
        return Err(EngineError::InvalidGrant(
            "grant duration must be positive".to_string(),
        ));
    }
    let expires = Utc::now() + duration;

    let stake_auth = StakeAuthorization {
        max_tokens: None,
        validators: Some(stake_authorization::Policy::AllowList(
            stake_authorization::Validators {
                address: vec![validator.to_string()],
            },
        )),
        authorization_type: AUTHORIZATION_TYPE_DELEGATE,
    };
    let mut msgs = vec![MsgPayload::Grant(wrap_grant(
        granter,
        grantee,
        Any {
            type_url: proto::TYPE_URL_STAKE_AUTHORIZATION.to_string(),
            value: stake_auth.encode_to_vec(),
        },
        expires,
    ))];

    let generic = |msg_type: &str| {
        let auth = GenericAuthorization {
            msg: msg_type.to_string(),
        };
        wrap_grant(
            granter,
            grantee,
            Any {
                type_url: proto::TYPE_URL_GENERIC_AUTHORIZATION.to_string(),
                value: auth.encode_to_vec(),
            },
            expires,
        )
    };
    if scopes.vote {
        msgs.push(MsgPayload::Grant(generic(proto::TYPE_URL_MSG_VOTE)));
    }
    if scopes.withdraw_commission {
        msgs.push(MsgPayload::Grant(generic(
            proto::TYPE_URL_MSG_WITHDRAW_COMMISSION,
        )));
    }
    Ok(msgs)
}

/// Build the revoke batch mirroring a previously recorded grant. The grantee
/// comes from the record; revoking blindly would silently no-op on chain when
/// no grant exists, so the caller must have one tracked.
pub fn build_revoke(granter: &str, record: &GrantRecord) -> Result<Vec<MsgPayload>> {
    let revoke = |msg_type: &str| {
        MsgPayload::Revoke(MsgRevoke {
            granter: granter.to_string(),
            grantee: record.grantee.clone(),
            msg_type_url: msg_type.to_string(),
        })
    };
    let mut msgs = vec![revoke(proto::TYPE_URL_MSG_DELEGATE)];
    if record.scopes.vote {
        msgs.push(revoke(proto::TYPE_URL_MSG_VOTE));
    }
    if record.scopes.withdraw_commission {
        msgs.push(revoke(proto::TYPE_URL_MSG_WITHDRAW_COMMISSION));
    }
    Ok(msgs)
}

/// Tracks which grants exist, keyed by chain, validator and granter.
pub trait GrantStore: Send + Sync {
    fn get(&self, chain_id: &str, validator: &str, granter: &str) -> Option<GrantRecord>;
    fn put(&mut self, chain_id: &str, validator: &str, granter: &str, record: GrantRecord);
    fn remove(&mut self, chain_id: &str, validator: &str, granter: &str) -> Option<GrantRecord>;
}

/// In-memory store. Suitable for a single process; anything longer lived
/// belongs to the embedding application.
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    grants: HashMap<(String, String, String), GrantRecord>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(chain_id: &str, validator: &str, granter: &str) -> (String, String, String) {
    (
        chain_id.to_string(),
        validator.to_string(),
        granter.to_string(),
    )
}

impl GrantStore for MemoryGrantStore {
    fn get(&self, chain_id: &str, validator: &str, granter: &str) -> Option<GrantRecord> {
        self.grants.get(&key(chain_id, validator, granter)).cloned()
    }

    fn put(&mut self, chain_id: &str, validator: &str, granter: &str, record: GrantRecord) {
        self.grants.insert(key(chain_id, validator, granter), record);
    }

    fn remove(&mut self, chain_id: &str, validator: &str, granter: &str) -> Option<GrantRecord> {
        self.grants.remove(&key(chain_id, validator, granter))
    }
}

/// Look up the active grant for a revocation, failing when none is tracked.
pub fn revoke_from_store(
    store: &impl GrantStore,
    chain_id: &str,
    granter: &str,
    validator: &str,
) -> Result<Vec<MsgPayload>> {
    let record = store
        .get(chain_id, validator, granter)
        .ok_or_else(|| EngineError::NoActiveGrant {
            granter: granter.to_string(),
            validator: validator.to_string(),
        })?;
    build_revoke(granter, &record)
}
