//! TOTP engine: RFC 6238, SHA-1, 6 digits, 30-second period.
//!
//! Enrollment generates a fresh secret and a provisioning descriptor with
//! no persistence side effect; the secret is committed to the identity
//! store only after the first successful verification.

use rand::{rngs::OsRng, RngCore};
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::error;

use crate::auth::AuthError;

const SECRET_BYTES: usize = 20;
const DIGITS: usize = 6;
const PERIOD_SECONDS: u64 = 30;

/// Everything the client needs to enroll an authenticator app.
#[derive(Debug)]
pub struct Enrollment {
    /// Transportable base32 encoding of the secret.
    pub secret: String,
    /// otpauth:// provisioning descriptor.
    pub otpauth_url: String,
    /// Scannable rendering of the descriptor, as a PNG data URL.
    pub qr_code: String,
}

/// Reject codes that are not exactly six ASCII digits before they ever
/// reach the engine.
#[must_use]
pub fn valid_code_format(code: &str) -> bool {
    code.len() == DIGITS && code.bytes().all(|byte| byte.is_ascii_digit())
}

pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    /// Generate a fresh 160-bit secret and its provisioning descriptor.
    ///
    /// # Errors
    /// `AuthError::InvalidInput` for an unusable account label,
    /// `AuthError::Unavailable` if QR rendering fails.
    pub fn enroll(&self, account: &str) -> Result<Enrollment, AuthError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let totp = self.build(bytes.to_vec(), account)?;
        let qr = totp.get_qr_base64().map_err(|err| {
            error!("Failed to render enrollment QR: {err}");
            AuthError::Unavailable
        })?;
        Ok(Enrollment {
            secret: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_code: format!("data:image/png;base64,{qr}"),
        })
    }

    /// Validate `code` against `secret_base32`, tolerating one period of
    /// clock drift on each side.
    ///
    /// # Errors
    /// `AuthError::InvalidInput` when the secret is not valid base32.
    pub fn validate(
        &self,
        secret_base32: &str,
        code: &str,
        account: &str,
    ) -> Result<bool, AuthError> {
        self.validate_at(secret_base32, code, account, unix_now())
    }

    fn validate_at(
        &self,
        secret_base32: &str,
        code: &str,
        account: &str,
        now: u64,
    ) -> Result<bool, AuthError> {
        let secret = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|_| AuthError::InvalidInput("invalid TOTP secret".to_string()))?;
        let totp = self.build(secret, account)?;

        // Fold the comparisons over every candidate period so that neither
        // the match position nor the code content shortcuts the loop.
        let mut matched = 0u8;
        for timestamp in [
            now.saturating_sub(PERIOD_SECONDS),
            now,
            now + PERIOD_SECONDS,
        ] {
            let candidate = totp.generate(timestamp);
            matched |= u8::from(constant_time_eq(candidate.as_bytes(), code.as_bytes()));
        }
        Ok(matched == 1)
    }

    fn build(&self, secret: Vec<u8>, account: &str) -> Result<TOTP, AuthError> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            1,
            PERIOD_SECONDS,
            secret,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| {
            error!("Failed to build TOTP instance: {err}");
            AuthError::InvalidInput("invalid TOTP parameters".to_string())
        })
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Constant-time byte comparison; the result depends only on the lengths
/// and the full contents.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
