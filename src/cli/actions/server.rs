use crate::api;
use crate::auth::AuthConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let config = AuthConfig::new(
                globals.issuer.clone(),
                globals.sso_verify_url.clone(),
                globals.session_secret.clone(),
            )
            .with_session_ttl_seconds(globals.session_ttl_seconds)
            .with_cookie_secure(globals.cookie_secure);

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
