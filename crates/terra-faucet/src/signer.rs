//! secp256k1 transaction signing for the faucet account.

use crate::address::{AccountId, AddressError};
use crate::tx::{PubKey, StdSignDoc, StdSignature, StdTx, PUBKEY_SECP256K1_TYPE};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Signing failures. Any of these point at bad key material or a malformed
/// document, never at a transient condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("cannot encode sign document: {0}")]
    Encoding(String),
}

/// Chain-side parameters a signature commits to
#[derive(Debug, Clone, Copy)]
pub struct SignContext<'a> {
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
}

/// Signer holding the faucet's private key
#[derive(Clone)]
pub struct TxSigner {
    key: SigningKey,
    public_key: Vec<u8>,
    account: AccountId,
}

impl std::fmt::Debug for TxSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSigner")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl TxSigner {
    /// Load from a hex private key, with or without `0x`
    pub fn from_hex(private_key: &str) -> Result<Self, SigningError> {
        let private_key = private_key.trim();
        let private_key = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(private_key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let key =
            SigningKey::from_slice(&bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    pub fn from_key(key: SigningKey) -> Self {
        let public_key = key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        let account = AccountId::new(account_id_from_public_key(&public_key));
        Self {
            key,
            public_key,
            account,
        }
    }

    /// Raw account bytes of the faucet
    pub fn account_id(&self) -> &AccountId {
        &self.account
    }

    /// Bech32 address of the faucet under `prefix`
    pub fn address(&self, prefix: &str) -> Result<String, AddressError> {
        self.account.to_bech32(prefix)
    }

    /// Compressed SEC1 public key
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn amino_public_key(&self) -> PubKey {
        PubKey {
            kind: PUBKEY_SECP256K1_TYPE.to_string(),
            value: base64::encode(&self.public_key),
        }
    }

    /// SHA-256 + ECDSA over `bytes`, returned as the 64-byte low-S `r || s`
    pub fn sign_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(bytes);
        let signature = signature.normalize_s().unwrap_or(signature);
        signature.to_bytes().to_vec()
    }

    /// Sign an unsigned transaction skeleton.
    ///
    /// Transfer amounts are sorted before the sign document is built; the
    /// returned transaction carries exactly the messages that were signed.
    pub fn sign_tx(&self, mut tx: StdTx, ctx: SignContext<'_>) -> Result<StdTx, SigningError> {
        tx.sort_amounts()
            .map_err(|e| SigningError::Encoding(format!("malformed transfer amount: {}", e)))?;

        let sign_bytes = StdSignDoc::new(&tx, ctx.chain_id, ctx.account_number, ctx.sequence)
            .to_sign_bytes()
            .map_err(|e| SigningError::Encoding(e.to_string()))?;
        let signature = self.sign_bytes(&sign_bytes);

        tx.signatures = Some(vec![StdSignature {
            pub_key: self.amino_public_key(),
            signature: base64::encode(signature),
        }]);
        Ok(tx)
    }
}

/// RIPEMD-160(SHA-256(pubkey)), the account bytes of a secp256k1 key
pub fn account_id_from_public_key(public_key: &[u8]) -> Vec<u8> {
    let sha = Sha256::digest(public_key);
    Ripemd160::digest(sha).to_vec()
}

/// Check a signed transaction's first signature against the sign document
/// implied by `ctx`.
pub fn verify_tx(tx: &StdTx, ctx: SignContext<'_>) -> bool {
    let Some(signature) = tx.signatures.as_ref().and_then(|sigs| sigs.first()) else {
        return false;
    };
    let Ok(sign_bytes) =
        StdSignDoc::new(tx, ctx.chain_id, ctx.account_number, ctx.sequence).to_sign_bytes()
    else {
        return false;
    };

    let key = base64::decode(&signature.pub_key.value)
        .ok()
        .and_then(|bytes| VerifyingKey::from_sec1_bytes(&bytes).ok());
    let sig = base64::decode(&signature.signature)
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok());

    match (key, sig) {
        (Some(key), Some(sig)) => key.verify(&sign_bytes, &sig).is_ok(),
        _ => false,
    }
}
