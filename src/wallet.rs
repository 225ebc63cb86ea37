//! Local key material behind the signers. BIP-39 mnemonic in, BIP-32 HD
//! derivation down the coin-type path matching the chain's curve kind, and a
//! bech32 address derived the way that curve's chains expect. Private key
//! bytes are zeroized on drop.

use bech32::Hrp;
use bip32::{ChildNumber, XPrv};
use bip39::Mnemonic;
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::CurveKind;
use crate::error::{EngineError, Result};

const COIN_TYPE_COSMOS: u32 = 118;
const COIN_TYPE_ETH: u32 = 60;

fn wallet_err(context: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Wallet(format!("{context}: {e}"))
}

/// Offline wallet for one address.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct LocalWallet {
    #[zeroize(skip)]
    pub address: String,
    #[zeroize(skip)]
    pub curve: CurveKind,

    private_key_bytes: [u8; 32],
    public_key_bytes: [u8; 65],
}

impl LocalWallet {
    /// Derive a wallet from a BIP-39 mnemonic. The curve kind selects both
    /// the HD coin type (118 or 60) and the address derivation scheme.
    pub fn from_mnemonic(
        mnemonic_str: &str,
        passphrase: &str,
        prefix: &str,
        curve: CurveKind,
    ) -> Result<Self> {
        let mnemonic =
            Mnemonic::parse(mnemonic_str).map_err(|e| wallet_err("invalid mnemonic", e))?;
        let seed = mnemonic.to_seed(passphrase);

        let coin_type = match curve {
            CurveKind::Standard => COIN_TYPE_COSMOS,
            CurveKind::Evm => COIN_TYPE_ETH,
        };
        let private_key = derive_private_key(&seed, coin_type)?;

        let secp = Secp256k1::new();
        let secret_key =
            SecretKey::from_slice(&private_key).map_err(|e| wallet_err("invalid private key", e))?;
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        let address = match curve {
            CurveKind::Standard => standard_address(&public_key, prefix)?,
            CurveKind::Evm => evm_address(&public_key, prefix)?,
        };

        let mut private_key_bytes = [0u8; 32];
        private_key_bytes.copy_from_slice(&private_key);
        let public_key_bytes = public_key.serialize_uncompressed();

        let mut temp_key = private_key;
        temp_key.zeroize();

        Ok(Self {
            address,
            curve,
            private_key_bytes,
            public_key_bytes,
        })
    }

    pub fn from_mnemonic_no_passphrase(
        mnemonic_str: &str,
        prefix: &str,
        curve: CurveKind,
    ) -> Result<Self> {
        Self::from_mnemonic(mnemonic_str, "", prefix, curve)
    }

    /// Caller is responsible for secure handling.
    pub fn private_key(&self) -> Result<SecretKey> {
        SecretKey::from_slice(&self.private_key_bytes)
            .map_err(|e| wallet_err("invalid private key", e))
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        let secp = Secp256k1::new();
        Ok(PublicKey::from_secret_key(&secp, &self.private_key()?))
    }

    /// Compressed 33-byte public key, as embedded in SignerInfo.
    pub fn public_key_compressed(&self) -> Result<[u8; 33]> {
        Ok(self.public_key()?.serialize())
    }
}

/// BIP-32 derivation down m/44'/{coin_type}'/0'/0/0.
fn derive_private_key(seed: &[u8], coin_type: u32) -> Result<[u8; 32]> {
    let child = |index: u32, hardened: bool| {
        ChildNumber::new(index, hardened).map_err(|e| wallet_err("invalid derivation index", e))
    };
    let xprv = XPrv::new(seed).map_err(|e| wallet_err("failed to create xprv from seed", e))?;
    let derived = xprv
        .derive_child(child(44, true)?)
        .and_then(|k| k.derive_child(ChildNumber::new(coin_type, true)?))
        .and_then(|k| k.derive_child(ChildNumber::new(0, true)?))
        .and_then(|k| k.derive_child(ChildNumber::new(0, false)?))
        .and_then(|k| k.derive_child(ChildNumber::new(0, false)?))
        .map_err(|e| wallet_err("failed to derive key", e))?;
    Ok(derived.to_bytes())
}

/// Standard Cosmos address: ripemd160(sha256(compressed pubkey)), bech32.
fn standard_address(public_key: &PublicKey, prefix: &str) -> Result<String> {
    let compressed = public_key.serialize();
    let sha = Sha256::digest(compressed);
    let ripe = Ripemd160::digest(sha);

    let hrp = Hrp::parse(prefix).map_err(|e| wallet_err("invalid bech32 prefix", e))?;
    bech32::encode::<bech32::Bech32>(hrp, &ripe).map_err(|e| wallet_err("bech32 encoding", e))
}

/// Ethereum-style address: keccak256(uncompressed pubkey coords)[12..],
/// bech32-encoded with the chain prefix.
fn evm_address(public_key: &PublicKey, prefix: &str) -> Result<String> {
    let pubkey_bytes = public_key.serialize_uncompressed();
    let coords = &pubkey_bytes[1..];

    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(coords);
    hasher.finalize(&mut hash);
    let addr_bytes = &hash[12..32];

    let hrp = Hrp::parse(prefix).map_err(|e| wallet_err("invalid bech32 prefix", e))?;
    bech32::encode::<bech32::Bech32>(hrp, addr_bytes).map_err(|e| wallet_err("bech32 encoding", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn standard_wallet_generation() {
        let wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Standard)
                .unwrap();
        assert!(wallet.address.starts_with("cosmos1"));
        // 20-byte payload bech32 address: prefix + '1' + 38 data chars
        assert_eq!(wallet.address.len(), "cosmos".len() + 39);
        assert_eq!(wallet.public_key_bytes[0], 0x04);
    }

    #[test]
    fn evm_wallet_generation() {
        let wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "inj", CurveKind::Evm).unwrap();
        assert!(wallet.address.starts_with("inj1"));
        assert_eq!(wallet.address.len(), 42);
    }

    #[test]
    fn curves_derive_different_keys() {
        let std_wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Standard)
                .unwrap();
        let evm_wallet =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "cosmos", CurveKind::Evm).unwrap();
        // different coin-type path means different key material
        assert_ne!(
            std_wallet.public_key_compressed().unwrap(),
            evm_wallet.public_key_compressed().unwrap()
        );
    }

    #[test]
    fn deterministic_generation() {
        let w1 = LocalWallet::from_mnemonic(MNEMONIC, "", "cosmos", CurveKind::Standard).unwrap();
        let w2 = LocalWallet::from_mnemonic(MNEMONIC, "", "cosmos", CurveKind::Standard).unwrap();
        assert_eq!(w1.address, w2.address);

        let w3 =
            LocalWallet::from_mnemonic(MNEMONIC, "extra", "cosmos", CurveKind::Standard).unwrap();
        assert_ne!(w1.address, w3.address);
    }

    #[test]
    fn bad_inputs_surface_typed_wallet_errors() {
        let err = LocalWallet::from_mnemonic_no_passphrase(
            "not a valid mnemonic phrase at all",
            "cosmos",
            CurveKind::Standard,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Wallet(_)));

        let err =
            LocalWallet::from_mnemonic_no_passphrase(MNEMONIC, "Bad Prefix!", CurveKind::Standard)
                .unwrap_err();
        assert!(matches!(err, EngineError::Wallet(_)));
    }
}
