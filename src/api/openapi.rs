use utoipa::OpenApi;

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "walletgate",
        description = "Multi-factor authentication gateway: external identity, TOTP, and wallet-ownership proof with permanent identity/wallet binding"
    ),
    paths(
        handlers::health::health,
        handlers::home::home,
        handlers::login::login,
        handlers::sso::callback,
        handlers::totp::setup,
        handlers::totp::status,
        handlers::totp::verify,
        handlers::siwe::nonce,
        handlers::siwe::verify,
        handlers::wallet::link_status,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::home::HomeResponse,
        handlers::login::FlowStatusResponse,
        handlers::sso::SsoCallbackRequest,
        handlers::sso::SsoCallbackResponse,
        handlers::totp::TotpSetupResponse,
        handlers::totp::TotpStatusResponse,
        handlers::totp::TotpVerifyRequest,
        handlers::totp::TotpVerifyResponse,
        handlers::siwe::NonceResponse,
        handlers::siwe::SiweVerifyRequest,
        handlers::siwe::SiweVerifyResponse,
        handlers::wallet::WalletLinkResponse,
    )),
    tags(
        (name = "auth", description = "Session flow endpoints"),
        (name = "totp", description = "Second-factor enrollment and verification"),
        (name = "siwe", description = "Wallet-ownership proof and binding"),
        (name = "health", description = "Service health"),
        (name = "protected", description = "Gated application surface")
    )
)]
pub struct ApiDoc;
