use secrecy::SecretString;

/// Arguments shared across actions.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub issuer: String,
    pub sso_verify_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub cookie_secure: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(issuer: String, sso_verify_url: String, session_secret: SecretString) -> Self {
        Self {
            issuer,
            sso_verify_url,
            session_secret,
            session_ttl_seconds: 86_400,
            cookie_secure: false,
        }
    }
}
