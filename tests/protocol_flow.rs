//! End-to-end flow over the in-memory store: identity, TOTP, wallet proof,
//! gate behavior, replay, and binding conflicts.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use k256::ecdsa::SigningKey;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use totp_rs::{Algorithm, Secret, TOTP};
use tower::ServiceExt;

use walletgate::api;
use walletgate::auth::{token::SESSION_COOKIE_NAME, AuthConfig, AuthState, Session};
use walletgate::siwe::{address_from_pubkey, eip191_digest, SiweMessage};
use walletgate::store::MemoryStore;

fn config() -> AuthConfig {
    AuthConfig::new(
        "WalletGate".to_string(),
        "http://sso.invalid/verify".to_string(),
        SecretString::from("integration-test-secret".to_string()),
    )
}

fn state() -> Arc<AuthState> {
    state_with(config())
}

fn state_with(config: AuthConfig) -> Arc<AuthState> {
    Arc::new(AuthState::new(config, Arc::new(MemoryStore::new())))
}

fn cookie_for(state: &AuthState, session: &Session) -> String {
    let token = state.signer().encode(session).expect("encode session");
    format!("{SESSION_COOKIE_NAME}={token}")
}

fn identity_cookie(state: &AuthState, identity: &str) -> String {
    cookie_for(state, &Session::new(identity.to_string(), 3600))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post(path: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn session_cookie_from(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("session cookie")
        .to_string()
}

fn current_code(secret_base32: &str, account: &str) -> String {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .expect("base32 secret");
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some("WalletGate".to_string()),
        account.to_string(),
    )
    .expect("totp")
    .generate_current()
    .expect("code")
}

fn signed_message(key: &SigningKey, nonce: &str) -> (String, String) {
    let message = SiweMessage {
        domain: "app.example.com".to_string(),
        address: address_from_pubkey(key.verifying_key()),
        statement: Some("Link your wallet.".to_string()),
        uri: "https://app.example.com".to_string(),
        version: "1".to_string(),
        chain_id: 1,
        nonce: nonce.to_string(),
        issued_at: "2026-08-25T10:00:00Z".to_string(),
    }
    .to_string();

    let digest = eip191_digest(&message);
    let (signature, recovery) = key.sign_prehash_recoverable(&digest).expect("sign");
    let mut raw = signature.to_bytes().to_vec();
    raw.push(recovery.to_byte() + 27);
    (message, format!("0x{}", hex::encode(raw)))
}

/// Drive one identity through TOTP setup and verification, returning the
/// advanced session cookie.
async fn pass_totp(app: &Router, state: &AuthState, identity: &str) -> String {
    let cookie = identity_cookie(state, identity);

    let (status, _, setup) = send(app, get("/auth/totp/setup", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let secret = setup["secret"].as_str().expect("secret").to_string();

    let code = current_code(&secret, identity);
    let (status, headers, body) = send(
        app,
        post(
            "/auth/totp/verify",
            Some(&cookie),
            &json!({ "code": code, "secret": secret }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["is_setup"], json!(true));
    session_cookie_from(&headers)
}

async fn fetch_nonce(app: &Router, cookie: &str) -> String {
    let (status, _, body) = send(app, get("/auth/siwe/nonce", Some(cookie))).await;
    assert_eq!(status, StatusCode::OK);
    body["nonce"].as_str().expect("nonce").to_string()
}

#[tokio::test]
async fn unauthenticated_requests_redirect_to_the_entry_point() {
    let app = api::router(state());
    let (status, headers, _) = send(&app, get("/", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn entry_point_reports_the_next_step() {
    let app = api::router(state());
    let (status, _, body) = send(&app, get("/login", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], json!("unauthenticated"));
    assert_eq!(body["next"], json!("sso"));
}

#[tokio::test]
async fn wallet_endpoints_require_the_totp_step() {
    let state = state();
    let app = api::router(state.clone());
    let cookie = identity_cookie(&state, "alice@example.com");

    let (status, _, _) = send(&app, get("/auth/siwe/nonce", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": "x", "signature": "0x00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn totp_verify_without_setup_or_secret_is_rejected() {
    let state = state();
    let app = api::router(state.clone());
    let cookie = identity_cookie(&state, "alice@example.com");

    let (status, _, body) = send(
        &app,
        post("/auth/totp/verify", Some(&cookie), &json!({ "code": "123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("TOTP not configured"));
}

#[tokio::test]
async fn full_flow_reaches_the_protected_surface() {
    let state = state();
    let app = api::router(state.clone());
    let identity = "alice@example.com";
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");

    let totp_cookie = pass_totp(&app, &state, identity).await;

    let nonce = fetch_nonce(&app, &totp_cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, headers, body) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&totp_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["is_new_link"], json!(true));
    assert_eq!(body["next"], json!("complete"));
    let full_cookie = session_cookie_from(&headers);

    // The protected surface opens, and the entry point bounces home.
    let (status, _, home) = send(&app, get("/", Some(&full_cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(home["identity"], json!(identity));
    assert_eq!(
        home["wallet_address"],
        json!(address_from_pubkey(key.verifying_key()))
    );

    let (status, headers, _) = send(&app, get("/login", Some(&full_cookie))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/")
    );

    // The binding is visible from the identity-proven step onward.
    let (status, _, link) = send(&app, get("/auth/wallet", Some(&totp_cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(link["has_linked_wallet"], json!(true));
}

#[tokio::test]
async fn a_consumed_nonce_cannot_be_replayed() {
    let state = state();
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");

    let totp_cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &totp_cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let payload = json!({ "message": message, "signature": signature });

    let (status, _, _) = send(&app, post("/auth/siwe/verify", Some(&totp_cookie), &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, post("/auth/siwe/verify", Some(&totp_cookie), &payload)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn a_reissued_nonce_invalidates_the_previous_one() {
    let state = state();
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");

    let totp_cookie = pass_totp(&app, &state, "alice@example.com").await;
    let stale = fetch_nonce(&app, &totp_cookie).await;
    let _fresh = fetch_nonce(&app, &totp_cookie).await;

    let (message, signature) = signed_message(&key, &stale);
    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&totp_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn a_nonce_older_than_its_lifetime_is_rejected() {
    // A negative lifetime makes every issued nonce already expired, which
    // pins the rejection branch without waiting out the real five minutes.
    let state = state_with(config().with_nonce_ttl_seconds(-1));
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");

    let totp_cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &totp_cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, _, body) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&totp_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.contains("nonce expired")));

    // Expiry consumed the nonce; the retry path needs a fresh one.
    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&totp_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn totp_setup_is_refused_once_enrolled() {
    let state = state();
    let app = api::router(state.clone());
    let identity = "alice@example.com";

    pass_totp(&app, &state, identity).await;

    let cookie = identity_cookie(&state, identity);
    let (status, _, body) = send(&app, get("/auth/totp/setup", Some(&cookie))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("TOTP already configured"));

    // The committed secret still verifies; enrollment state is unchanged.
    let (status, _, body) = send(&app, get("/auth/totp/verify", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totp_enabled"], json!(true));
}

#[tokio::test]
async fn a_claimed_wallet_is_refused_for_another_identity() {
    let state = state();
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");
    let address = address_from_pubkey(key.verifying_key());

    let alice_cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &alice_cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&alice_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let bob_cookie = pass_totp(&app, &state, "bob@example.com").await;
    let nonce = fetch_nonce(&app, &bob_cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, _, body) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&bob_cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["connected_wallet"], json!(address));
}

#[tokio::test]
async fn a_second_wallet_is_refused_and_the_binding_reported() {
    let state = state();
    let app = api::router(state.clone());
    let first_key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");
    let second_key = SigningKey::from_slice(&[0x43u8; 32]).expect("key");

    let cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &cookie).await;
    let (message, signature) = signed_message(&first_key, &nonce);
    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let nonce = fetch_nonce(&app, &cookie).await;
    let (message, signature) = signed_message(&second_key, &nonce);
    let (status, _, body) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["linked_wallet"],
        json!(address_from_pubkey(first_key.verifying_key()))
    );
    assert_eq!(
        body["connected_wallet"],
        json!(address_from_pubkey(second_key.verifying_key()))
    );
}

#[tokio::test]
async fn repeat_proof_of_the_bound_wallet_confirms() {
    let state = state();
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");

    let cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let nonce = fetch_nonce(&app, &cookie).await;
    let (message, signature) = signed_message(&key, &nonce);
    let (status, _, body) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new_link"], json!(false));
}

#[tokio::test]
async fn a_signature_from_a_different_key_is_rejected() {
    let state = state();
    let app = api::router(state.clone());
    let key = SigningKey::from_slice(&[0x42u8; 32]).expect("key");
    let other = SigningKey::from_slice(&[0x44u8; 32]).expect("key");

    let cookie = pass_totp(&app, &state, "alice@example.com").await;
    let nonce = fetch_nonce(&app, &cookie).await;

    // Message claims one address; the signature comes from another key.
    let (message, _) = signed_message(&key, &nonce);
    let digest = eip191_digest(&message);
    let (signature, recovery) = other.sign_prehash_recoverable(&digest).expect("sign");
    let mut raw = signature.to_bytes().to_vec();
    raw.push(recovery.to_byte() + 27);
    let signature = format!("0x{}", hex::encode(raw));

    let (status, _, _) = send(
        &app,
        post(
            "/auth/siwe/verify",
            Some(&cookie),
            &json!({ "message": message, "signature": signature }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_is_public() {
    let app = api::router(state());
    let (status, headers, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("X-App"));
    assert_eq!(body["name"], json!("walletgate"));
}
