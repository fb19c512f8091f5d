//! Cryptographic primitives for the Radix client
//!
//! secp256k1 key pairs, compact ECDSA signatures split into `r`/`s`, and the
//! [`RadixIdentity`] seam through which externally held keys sign atoms.

use crate::error::CryptoError;
use crate::primitives::{Hash256, RadixAddress};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                CryptoError::InvalidSecretKey(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                CryptoError::InvalidSecretKey(e.to_string())
            }
        })?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    pub fn address(&self, magic: i32) -> RadixAddress {
        RadixAddress::new(magic, &self.public_key)
    }

    /// Signs an already computed 32-byte digest. The atom hash is passed
    /// through unchanged; no further hashing happens here.
    pub fn sign_hash(&self, hash: &Hash256) -> Result<EcdsaSignature, CryptoError> {
        let message = Message::from_digest_slice(hash.as_bytes())
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(EcdsaSignature::from_compact(&signature.serialize_compact()))
    }
}

/// ECDSA signature as the `(r, s)` scalar pair carried in atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EcdsaSignature {
    pub const SERIALIZER: &'static str = "crypto.ecdsa_signature";

    pub fn from_compact(bytes: &[u8; COMPACT_SIGNATURE_SIZE]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        EcdsaSignature { r, s }
    }

    pub fn to_compact(&self) -> [u8; COMPACT_SIGNATURE_SIZE] {
        let mut out = [0u8; COMPACT_SIGNATURE_SIZE];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Verifies this signature over `hash` for the given public key.
    pub fn verify(&self, hash: &Hash256, public_key: &PublicKey) -> Result<(), CryptoError> {
        let message = Message::from_digest_slice(hash.as_bytes())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let mut signature = Signature::from_compact(&self.to_compact())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        // High-S signatures from other signers are accepted.
        signature.normalize_s();
        SECP256K1_CONTEXT
            .verify_ecdsa(&message, &signature, public_key)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

/// Verifies a signature given raw compressed public key bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    hash: &Hash256,
    signature: &EcdsaSignature,
) -> Result<(), CryptoError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(CryptoError::InvalidPublicKey(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    signature.verify(hash, &public_key)
}

/// Key-holding collaborator. Key storage and derivation live outside this
/// crate; the client only needs a public key and a way to sign a hash.
#[async_trait]
pub trait RadixIdentity: Send + Sync {
    fn public_key(&self) -> PublicKey;

    async fn sign(&self, hash: &Hash256) -> Result<EcdsaSignature, CryptoError>;

    fn address(&self, magic: i32) -> RadixAddress {
        RadixAddress::new(magic, &self.public_key())
    }
}

/// Identity backed by an in-memory key pair.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    keypair: KeyPair,
}

impl LocalIdentity {
    pub fn new(keypair: KeyPair) -> Self {
        LocalIdentity { keypair }
    }

    pub fn generate() -> Self {
        LocalIdentity::new(KeyPair::generate())
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

#[async_trait]
impl RadixIdentity for LocalIdentity {
    fn public_key(&self) -> PublicKey {
        self.keypair.public_key
    }

    async fn sign(&self, hash: &Hash256) -> Result<EcdsaSignature, CryptoError> {
        self.keypair.sign_hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.public_key_bytes().len(), PUBLIC_KEY_SIZE);
        assert_eq!(keypair.secret_key.as_ref().len(), SECRET_KEY_SIZE);
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate();
        let hash = Hash256::of(b"Hello, Radix!");

        let signature = keypair.sign_hash(&hash).unwrap();
        let result = verify_signature(&keypair.public_key_bytes(), &hash, &signature);
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::generate();
        let hash = Hash256::of(b"Test message");

        let signature = keypair1.sign_hash(&hash).unwrap();
        let result = verify_signature(&keypair2.public_key_bytes(), &hash, &signature);
        assert_eq!(result, Err(CryptoError::VerificationFailed));
    }

    #[test]
    fn test_tampered_hash() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign_hash(&Hash256::of(b"Original")).unwrap();
        let result = verify_signature(
            &keypair.public_key_bytes(),
            &Hash256::of(b"Tampered"),
            &signature,
        );
        assert_eq!(result, Err(CryptoError::VerificationFailed));
    }

    #[test]
    fn test_compact_split() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign_hash(&Hash256::of(b"split")).unwrap();
        let compact = signature.to_compact();
        assert_eq!(&compact[..32], &signature.r);
        assert_eq!(EcdsaSignature::from_compact(&compact), signature);
    }

    #[test]
    fn test_invalid_key_length() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign_hash(&Hash256::of(b"x")).unwrap();
        let result = verify_signature(&keypair.public_key_bytes()[1..], &Hash256::of(b"x"), &signature);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Public key must be exactly"));
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }

    #[tokio::test]
    async fn test_local_identity_signs() {
        let identity = LocalIdentity::generate();
        let hash = Hash256::of(b"atom");
        let signature = identity.sign(&hash).await.unwrap();
        assert!(signature.verify(&hash, &identity.public_key()).is_ok());
    }
}
