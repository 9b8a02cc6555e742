//! Sign-In-With-Ethereum style wallet-ownership proof.
//!
//! A structured plaintext message carrying a server-issued nonce is signed
//! by the wallet; the server recovers the signer from the signature and
//! compares it against the claimed address in canonical lowercase form.

pub mod message;
pub mod verify;

pub use message::SiweMessage;
pub use verify::{address_from_pubkey, eip191_digest, recover_address};

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use thiserror::Error;

/// Nonce length matches the shape wallets already produce and accept.
pub const NONCE_LENGTH: usize = 17;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SiweError {
    #[error("malformed sign-in message: {0}")]
    Malformed(&'static str),
    #[error("malformed signature")]
    BadSignature,
}

/// Random alphanumeric nonce scoped to one pending wallet verification.
#[must_use]
pub fn generate_nonce() -> String {
    OsRng
        .sample_iter(Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Canonical lowercase form used for every comparison and store write.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// 0x-prefixed, 20-byte hex address check (any case).
#[must_use]
pub fn valid_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 40 && hex_part.bytes().all(|byte| byte.is_ascii_hexdigit())
}
