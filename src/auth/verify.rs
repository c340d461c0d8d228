//! Address recovery for `personal_sign` (EIP-191) signatures.
//!
//! The signer's address is never sent by the client. It is recovered from
//! the secp256k1 signature over the prefixed message hash.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Length of an `r ‖ s ‖ v` signature in bytes.
pub const SIGNATURE_LEN: usize = 65;

/// Why a signature could not be turned into an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signature encoding: {0}")]
    Encoding(String),

    #[error("invalid signature length: expected 65 bytes, got {0}")]
    Length(usize),

    #[error("invalid recovery id: {0}")]
    RecoveryId(u8),

    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// Resolves a signed message to the address that produced the signature.
///
/// No allow-list or balance policy is applied here; callers decide what a
/// recovered address is permitted to do.
pub trait AddressRecovery: Send + Sync {
    fn recover_address(&self, message: &str, signature: &str) -> Result<String, SignatureError>;
}

/// Ethereum `personal_sign` recovery over secp256k1.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignVerifier;

impl AddressRecovery for PersonalSignVerifier {
    fn recover_address(&self, message: &str, signature: &str) -> Result<String, SignatureError> {
        let signature = decode_signature(signature)?;
        let hash = hash_personal_message(message.as_bytes());
        recover_from_prehash(&hash, &signature)
    }
}

/// Compute Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash a message the way wallets do for `personal_sign`:
/// `keccak256("\x19Ethereum Signed Message:\n" ++ len ++ message)`.
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Decode a hex signature, with or without a `0x` prefix.
pub fn decode_signature(signature: &str) -> Result<[u8; SIGNATURE_LEN], SignatureError> {
    let hex_part = signature
        .strip_prefix("0x")
        .or_else(|| signature.strip_prefix("0X"))
        .unwrap_or(signature);

    let bytes = hex::decode(hex_part).map_err(|e| SignatureError::Encoding(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| SignatureError::Length(len))
}

/// Recover the checksummed address from a 32-byte prehash and a 65-byte signature.
///
/// `v` may be 0/1 or 27/28. High-S signatures are normalized first.
pub fn recover_from_prehash(
    hash: &[u8; 32],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<String, SignatureError> {
    let y_odd = match signature[64] {
        0 | 27 => false,
        1 | 28 => true,
        other => return Err(SignatureError::RecoveryId(other)),
    };

    let mut sig = Signature::from_slice(&signature[..64])
        .map_err(|e| SignatureError::Recovery(format!("invalid signature: {}", e)))?;
    let mut recovery_id = RecoveryId::new(y_odd, false);

    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!y_odd, false);
    }

    let verifying_key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| SignatureError::Recovery(e.to_string()))?;

    Ok(address_of(&verifying_key))
}

/// Ethereum address of a public key: last 20 bytes of keccak256 over the
/// uncompressed point (without the 0x04 prefix), EIP-55 checksummed.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    to_checksum_address(&address)
}

/// EIP-55 mixed-case encoding.
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
