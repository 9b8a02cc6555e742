//! HTTP surface: router construction, middleware stack, and server startup.

pub mod handlers;
mod openapi;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{gate, AuthConfig, AuthState};
use crate::store::{IdentityStore, MemoryStore, PgStore};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Start the server.
///
/// Without a DSN the store is in-memory: bindings survive the process, not
/// the host. With one, the schema is migrated on startup.
///
/// # Errors
/// Returns an error if the store or listener cannot be set up.
pub async fn new(port: u16, dsn: Option<String>, config: AuthConfig) -> Result<()> {
    let store: Arc<dyn IdentityStore> = match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;
            let store = PgStore::new(pool);
            store.migrate().await.context("Failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            info!("No DSN configured, using the in-memory identity store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AuthState::new(config, store));
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the full application router around a shared state handle.
#[must_use]
pub fn router(state: Arc<AuthState>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/", get(handlers::home::home))
        .route("/login", get(handlers::login::login))
        .route("/health", get(handlers::health::health))
        .route("/auth/sso/callback", post(handlers::sso::callback))
        .route("/auth/totp/setup", get(handlers::totp::setup))
        .route(
            "/auth/totp/verify",
            get(handlers::totp::status).post(handlers::totp::verify),
        )
        .route("/auth/siwe/nonce", get(handlers::siwe::nonce))
        .route("/auth/siwe/verify", post(handlers::siwe::verify))
        .route("/auth/wallet", get(handlers::wallet::link_status))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(middleware::from_fn(gate::enforce))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Gracefully shutdown");
}
