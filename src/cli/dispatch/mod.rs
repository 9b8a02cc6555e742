use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{anyhow, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let issuer = matches
        .get_one::<String>("issuer")
        .cloned()
        .unwrap_or_else(|| "WalletGate".to_string());

    let sso_verify_url = matches
        .get_one::<String>("sso-url")
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --sso-url"))?;

    let session_secret = matches
        .get_one::<String>("session-secret")
        .cloned()
        .map(SecretString::from)
        .ok_or_else(|| anyhow!("missing required argument: --session-secret"))?;

    let mut globals = GlobalArgs::new(issuer, sso_verify_url, session_secret);
    if let Some(ttl) = matches.get_one::<i64>("session-ttl").copied() {
        globals.session_ttl_seconds = ttl;
    }
    globals.cookie_secure = matches.get_flag("secure-cookies");

    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
    };

    Ok((action, globals))
}
