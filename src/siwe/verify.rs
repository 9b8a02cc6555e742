//! EIP-191 signature recovery for sign-in messages.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

use super::SiweError;

/// Keccak-256 over the `personal_sign` prefixed message bytes.
#[must_use]
pub fn eip191_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Canonical lowercase address for a secp256k1 public key:
/// the last 20 bytes of the Keccak-256 of the uncompressed point.
#[must_use]
pub fn address_from_pubkey(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Recover the signer address from a 65-byte `r || s || v` hex signature
/// over the raw message text.
///
/// # Errors
/// `SiweError::BadSignature` for any undecodable or unrecoverable
/// signature; the caller compares the returned address itself.
pub fn recover_address(message: &str, signature: &str) -> Result<String, SiweError> {
    let raw = hex::decode(signature.trim().trim_start_matches("0x"))
        .map_err(|_| SiweError::BadSignature)?;
    if raw.len() != 65 {
        return Err(SiweError::BadSignature);
    }
    // Wallets emit v as 27/28; raw recovery ids are 0/1.
    let v = match raw[64] {
        byte @ (0 | 1) => byte,
        byte @ (27 | 28) => byte - 27,
        _ => return Err(SiweError::BadSignature),
    };
    let recovery = RecoveryId::from_byte(v).ok_or(SiweError::BadSignature)?;
    let signature = Signature::from_slice(&raw[..64]).map_err(|_| SiweError::BadSignature)?;

    let digest = eip191_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery)
        .map_err(|_| SiweError::BadSignature)?;
    Ok(address_from_pubkey(&key))
}
