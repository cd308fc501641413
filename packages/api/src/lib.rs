//! # API crate: HTTP backend for the notes service
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Argon2 passwords, JWT access tokens, Google OAuth, TOTP, the [`auth::AuthUser`] extractor |
//! | [`device`] | User-Agent parsing for session records |
//! | [`error`] | [`ApiError`] and its `{"message": ...}` response body |
//! | [`routes`] | One axum router per resource |
//! | [`settings`] | Layered configuration |
//! | [`state`] | [`AppState`] shared by every handler |
//!
//! Persistence goes through the [`store::Store`] trait, so [`app`] runs the
//! same against PostgreSQL and the in-memory backend.

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod auth;
pub mod device;
pub mod error;
pub mod routes;
pub mod settings;
pub mod state;

pub use error::{ApiError, Message};
pub use settings::Settings;
pub use state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let origin = match HeaderValue::from_str(state.settings.frontend.url.trim_end_matches('/')) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %redact_path(request.uri().path()),
        )
    });

    routes::router()
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

/// Replace path segments that look like a JWT.
pub fn redact_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let parts: Vec<&str> = segment.split('.').collect();
            let is_jwt = parts.len() == 3
                && parts.iter().all(|p| {
                    !p.is_empty()
                        && p.bytes()
                            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
                });
            if is_jwt {
                ":token"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let address = state.settings.server.address();
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
