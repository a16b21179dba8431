//! Wallet signature recovery
//!
//! Signatures over certificate fingerprints carry the signer's ed25519
//! public key alongside the detached signature: the blob is
//! `hex(public key (32 bytes) || signature (64 bytes))`. Recovery verifies
//! the signature over the message and returns the bs58-encoded public key as
//! the wallet address, so a forged blob can never recover to someone else's
//! wallet.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::types::{Result, TraceError};

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Signature recovery contract.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Recover the signer's wallet address from a message and signature
    /// blob. Fails with `Unauthorized` when the signature does not verify.
    async fn recover_signer(&self, message: &[u8], signature_hex: &str) -> Result<String>;
}

/// bs58 wallet address of an ed25519 public key.
pub fn wallet_address(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

/// Produce a signature blob (`pubkey || sig`, hex) over a message.
///
/// Used by dev tooling and tests; production signatures are made by external
/// wallets.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> String {
    let signature = key.sign(message);
    let mut blob = Vec::with_capacity(PUBLIC_KEY_LEN + SIGNATURE_LEN);
    blob.extend_from_slice(key.verifying_key().as_bytes());
    blob.extend_from_slice(&signature.to_bytes());
    hex::encode(blob)
}

/// Local ed25519 signature verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self
    }

    fn parse_blob(signature_hex: &str) -> Result<(VerifyingKey, Signature)> {
        let bytes = hex::decode(signature_hex)
            .map_err(|_| TraceError::Unauthorized("signature is not valid hex".into()))?;

        if bytes.len() != PUBLIC_KEY_LEN + SIGNATURE_LEN {
            return Err(TraceError::Unauthorized(format!(
                "signature blob must be {} bytes, got {}",
                PUBLIC_KEY_LEN + SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let key_bytes: [u8; PUBLIC_KEY_LEN] = bytes[..PUBLIC_KEY_LEN]
            .try_into()
            .expect("length checked above");
        let sig_bytes: [u8; SIGNATURE_LEN] = bytes[PUBLIC_KEY_LEN..]
            .try_into()
            .expect("length checked above");

        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| TraceError::Unauthorized("invalid public key in signature".into()))?;
        let signature = Signature::from_bytes(&sig_bytes);

        Ok((key, signature))
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn recover_signer(&self, message: &[u8], signature_hex: &str) -> Result<String> {
        let (key, signature) = Self::parse_blob(signature_hex)?;

        key.verify(message, &signature)
            .map_err(|_| TraceError::Unauthorized("signature does not verify".into()))?;

        Ok(wallet_address(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[tokio::test]
    async fn test_recover_signer_round_trip() {
        let key = SigningKey::generate(&mut OsRng);
        let blob = sign_message(&key, b"fingerprint");

        let verifier = Ed25519Verifier::new();
        let address = verifier.recover_signer(b"fingerprint", &blob).await.unwrap();
        assert_eq!(address, wallet_address(&key.verifying_key()));
    }

    #[tokio::test]
    async fn test_wrong_message_is_unauthorized() {
        let key = SigningKey::generate(&mut OsRng);
        let blob = sign_message(&key, b"fingerprint");

        let verifier = Ed25519Verifier::new();
        let err = verifier.recover_signer(b"other message", &blob).await.unwrap_err();
        assert!(matches!(err, TraceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_swapped_pubkey_does_not_recover() {
        // Signature from one key, public key from another: must not verify
        let signer = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);

        let sig = signer.sign(b"fingerprint");
        let mut blob = Vec::new();
        blob.extend_from_slice(other.verifying_key().as_bytes());
        blob.extend_from_slice(&sig.to_bytes());

        let verifier = Ed25519Verifier::new();
        let err = verifier
            .recover_signer(b"fingerprint", &hex::encode(blob))
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_malformed_blob_rejected() {
        let verifier = Ed25519Verifier::new();
        assert!(verifier.recover_signer(b"m", "zzzz").await.is_err());
        assert!(verifier.recover_signer(b"m", "abcd").await.is_err());
    }
}
