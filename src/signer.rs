//! Signature production. The standard path hashes the SignDoc with SHA-256
//! and emits a 64-byte compact signature; the EVM path hashes with Keccak-256
//! and emits the 65-byte recoverable form those chains verify. The signer is
//! an injected capability, never ambient global state.

use prost::Message;
use secp256k1::{All, Message as SecpMessage, Secp256k1};
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::account::Account;
use crate::chain::{ChainProfile, CurveKind};
use crate::error::{EngineError, Result};
use crate::proto::{Any, TxRaw};
use crate::signdoc::{self, StdFee, UnsignedTx};
use crate::wallet::LocalWallet;

/// Key-holder capability. Implementations may be backed by local key
/// material or by an external holder that can transiently disconnect, in
/// which case `sign` returns `SignerDisconnected` and the pipeline retries
/// once.
pub trait TxSigner: Send + Sync {
    fn curve(&self) -> CurveKind;
    /// Compressed 33-byte public key.
    fn public_key(&self) -> [u8; 33];
    /// Raw signature over the SignDoc bytes.
    fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Direct signer for standard secp256k1 accounts.
pub struct StandardSigner {
    wallet: LocalWallet,
    secp: Secp256k1<All>,
}

impl StandardSigner {
    pub fn new(wallet: LocalWallet) -> Result<Self> {
        if wallet.curve != CurveKind::Standard {
            return Err(EngineError::Signing(
                "wallet key was derived for the EVM curve kind".to_string(),
            ));
        }
        Ok(Self {
            wallet,
            secp: Secp256k1::new(),
        })
    }

    pub fn address(&self) -> &str {
        &self.wallet.address
    }
}

impl TxSigner for StandardSigner {
    fn curve(&self) -> CurveKind {
        CurveKind::Standard
    }

    fn public_key(&self) -> [u8; 33] {
        self.wallet
            .public_key_compressed()
            .expect("wallet holds a valid key")
    }

    fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>> {
        let hash: [u8; 32] = Sha256::digest(sign_bytes).into();
        let message = SecpMessage::from_digest_slice(&hash)
            .map_err(|e| EngineError::Signing(e.to_string()))?;
        let private_key = self
            .wallet
            .private_key()
            .map_err(|e| EngineError::Signing(e.to_string()))?;
        let sig = self.secp.sign_ecdsa(&message, &private_key);
        Ok(sig.serialize_compact().to_vec())
    }
}

/// Signer for ethsecp256k1 accounts. Produces the 65-byte recoverable
/// signature (64 bytes + Ethereum-style recovery id).
pub struct EvmSigner {
    wallet: LocalWallet,
    secp: Secp256k1<All>,
}

impl EvmSigner {
    pub fn new(wallet: LocalWallet) -> Result<Self> {
        if wallet.curve != CurveKind::Evm {
            return Err(EngineError::Signing(
                "wallet key was derived for the standard curve kind".to_string(),
            ));
        }
        Ok(Self {
            wallet,
            secp: Secp256k1::new(),
        })
    }

    pub fn address(&self) -> &str {
        &self.wallet.address
    }
}

impl TxSigner for EvmSigner {
    fn curve(&self) -> CurveKind {
        CurveKind::Evm
    }

    fn public_key(&self) -> [u8; 33] {
        self.wallet
            .public_key_compressed()
            .expect("wallet holds a valid key")
    }

    fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Keccak::v256();
        let mut hash = [0u8; 32];
        hasher.update(sign_bytes);
        hasher.finalize(&mut hash);

        let message = SecpMessage::from_digest_slice(&hash)
            .map_err(|e| EngineError::Signing(e.to_string()))?;
        let private_key = self
            .wallet
            .private_key()
            .map_err(|e| EngineError::Signing(e.to_string()))?;
        let recoverable = self.secp.sign_ecdsa_recoverable(&message, &private_key);
        let (recovery_id, signature) = recoverable.serialize_compact();

        // recovery id on the wire is 27 or 28: only the parity survives
        let mut sig_bytes = Vec::with_capacity(65);
        sig_bytes.extend_from_slice(&signature);
        sig_bytes.push((recovery_id.to_i32() % 2) as u8 + 27);
        Ok(sig_bytes)
    }
}

/// A fully signed transaction envelope, immutable once produced.
#[derive(Debug, Clone)]
pub struct SignedTx {
    raw: TxRaw,
}

impl SignedTx {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.raw.encode_to_vec()
    }

    /// Transaction hash as the chain will report it: uppercase hex of
    /// sha256 over the raw bytes. Known before broadcast.
    pub fn tx_hash(&self) -> String {
        hex::encode_upper(Sha256::digest(self.to_bytes()))
    }

    pub fn signature(&self) -> &[u8] {
        &self.raw.signatures[0]
    }
}

/// Build the SignDoc for `(account, messages, fee, memo)` and sign it.
///
/// For both curve kinds the AuthInfo is constructed explicitly here (generic
/// direct-signing helpers are not curve-aware), with the pubkey tag picked by
/// [`signdoc::pub_key_any`].
pub fn sign_tx(
    profile: &ChainProfile,
    account: &Account,
    signer: &dyn TxSigner,
    messages: &[Any],
    fee: &StdFee,
    memo: &str,
) -> Result<SignedTx> {
    let unsigned = build_unsigned(profile, account, signer, messages, fee, memo)?;
    finalize(unsigned, signer)
}

pub fn build_unsigned(
    profile: &ChainProfile,
    account: &Account,
    signer: &dyn TxSigner,
    messages: &[Any],
    fee: &StdFee,
    memo: &str,
) -> Result<UnsignedTx> {
    signdoc::build(
        account,
        &signer.public_key(),
        messages,
        fee,
        memo,
        &profile.chain_id,
    )
}

pub fn finalize(unsigned: UnsignedTx, signer: &dyn TxSigner) -> Result<SignedTx> {
    let signature = signer.sign(&unsigned.sign_bytes)?;
    Ok(SignedTx {
        raw: TxRaw {
            body_bytes: unsigned.body_bytes,
            auth_info_bytes: unsigned.auth_info_bytes,
            signatures: vec![signature],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, MsgPayload};
    use crate::proto::{Coin, MsgSend};

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn profile(curve: CurveKind) -> ChainProfile {
        use crate::chain::{AssetMeta, RawChainMeta};
        ChainProfile::resolve(RawChainMeta {
            chain_id: "test-1".to_string(),
            bech32_prefix: "cosmos".to_string(),
            coin_type: if curve == CurveKind::Evm { 60 } else { 118 },
            assets: vec![AssetMeta {
                denom: "utest".to_string(),
                exponent: 6,
                symbol: "TEST".to_string(),
                primary: true,
            }],
            fee_tokens: vec![],
            rpc_endpoints: vec!["https://rpc.test".to_string()],
            rest_endpoints: vec!["https://rest.test".to_string()],
            min_tx_fee: None,
            gas_price: None,
            gasless: false,
        })
        .unwrap()
    }

    fn account(curve: CurveKind) -> Account {
        Account {
            address: "cosmos1abc".to_string(),
            account_number: 1,
            sequence: 0,
            pub_key: None,
            curve,
        }
    }

    fn messages() -> Vec<Any> {
        codec::encode_batch(&[MsgPayload::Send(MsgSend {
            from_address: "cosmos1abc".to_string(),
            to_address: "cosmos1def".to_string(),
            amount: vec![Coin {
                denom: "utest".to_string(),
                amount: "10".to_string(),
            }],
        })])
        .unwrap()
    }

    #[test]
    fn standard_signature_is_64_bytes_and_deterministic() {
        let wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Standard)
                .unwrap();
        let signer = StandardSigner::new(wallet).unwrap();
        let profile = profile(CurveKind::Standard);
        let acc = account(CurveKind::Standard);
        let fee = StdFee::zero(200_000);

        let tx1 = sign_tx(&profile, &acc, &signer, &messages(), &fee, "").unwrap();
        let tx2 = sign_tx(&profile, &acc, &signer, &messages(), &fee, "").unwrap();
        assert_eq!(tx1.signature().len(), 64);
        assert_eq!(tx1.to_bytes(), tx2.to_bytes());
    }

    #[test]
    fn evm_signature_is_65_bytes_with_eth_recovery_id() {
        let wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "inj", CurveKind::Evm).unwrap();
        let signer = EvmSigner::new(wallet).unwrap();
        let profile = profile(CurveKind::Evm);
        let acc = account(CurveKind::Evm);

        let tx = sign_tx(&profile, &acc, &signer, &messages(), &StdFee::zero(250_000), "").unwrap();
        let sig = tx.signature();
        assert_eq!(sig.len(), 65);
        assert!(sig[64] == 27 || sig[64] == 28);
    }

    #[test]
    fn curve_mismatch_rejected_at_construction() {
        let evm_wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "inj", CurveKind::Evm).unwrap();
        assert!(StandardSigner::new(evm_wallet).is_err());

        let std_wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Standard)
                .unwrap();
        assert!(EvmSigner::new(std_wallet).is_err());
    }

    #[test]
    fn signed_tx_decodes_as_tx_raw() {
        let wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Standard)
                .unwrap();
        let signer = StandardSigner::new(wallet).unwrap();
        let tx = sign_tx(
            &profile(CurveKind::Standard),
            &account(CurveKind::Standard),
            &signer,
            &messages(),
            &StdFee::zero(200_000),
            "round trip",
        )
        .unwrap();
        let decoded = TxRaw::decode(&tx.to_bytes()[..]).unwrap();
        assert_eq!(decoded.signatures.len(), 1);
        assert!(!decoded.body_bytes.is_empty());

        let hash = tx.tx_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_uppercase());
    }
}
