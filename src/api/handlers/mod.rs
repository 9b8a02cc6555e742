pub mod health;
pub mod home;
pub mod login;
pub mod siwe;
pub mod sso;
pub mod totp;
pub mod wallet;

use regex::Regex;

/// Loose shape check for the email-equivalent identity key asserted by the
/// external provider.
pub(crate) fn valid_email(input: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(input))
}

/// Canonical identity key: trimmed, lowercase.
pub(crate) fn normalize_identity(input: &str) -> String {
    input.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.example.org"));
        assert!(!valid_email("alice"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("a lice@example.com"));
        assert!(!valid_email("@example.com"));
    }

    #[test]
    fn identity_normalization() {
        assert_eq!(normalize_identity(" Alice@Example.COM "), "alice@example.com");
    }
}
