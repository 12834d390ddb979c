//! Purpose: Provide the HTTP bridge server for memoport.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based single-endpoint server; dispatches on method, not path.
//! Invariants: Every request branch is terminal; no retries, no rollback.
//! Invariants: Loopback-only bind unless explicitly allowed.
//! Invariants: The CSRF token is acquired per request and passed through
//! Invariants: unchanged to the import step.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::future::IntoFuture;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use memoport::core::error::{Error, ErrorKind};
use memoport::core::page::memo_batch;
use memoport::core::request::parse_text_body;
use memoport::core::title::generate_title;
use memoport::upstream::{NoteImporter, UpstreamClient};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub api_token: String,
    pub project: String,
    pub session_id: String,
    pub upstream_base_url: String,
    pub allow_non_loopback: bool,
}

#[derive(Clone)]
struct AppState {
    api_token: String,
    importer: Arc<dyn NoteImporter>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let importer = UpstreamClient::new(
        config.upstream_base_url,
        config.project,
        config.session_id,
    )?;
    let state = Arc::new(AppState {
        api_token: config.api_token,
        importer: Arc::new(importer),
    });

    let app = Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.api_token.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("api token must not be empty")
            .with_hint("Provide --api-token or set MEMOPORT_API_TOKEN."));
    }
    if config.project.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("project must not be empty")
            .with_hint("Provide --project or set MEMOPORT_PROJECT."));
    }
    if config.session_id.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("upstream session id must not be empty")
            .with_hint("Provide --session-id or set MEMOPORT_SESSION_ID."));
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

/// The whole service: one pass per request, every branch terminal.
async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    if method != Method::POST {
        return json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    // Body bytes stay unexamined until the method and auth gates have passed.
    // A non-UTF-8 body can never be valid JSON.
    let Ok(body) = std::str::from_utf8(&body) else {
        return error_response(Error::new(ErrorKind::Usage).with_message("Invalid JSON"));
    };
    let text = match parse_text_body(body) {
        Ok(text) => text,
        Err(err) => return error_response(err),
    };

    let title = generate_title();
    let batch = memo_batch(&title, &text);

    // The ureq pipeline blocks; keep it off the async workers. At most two
    // sequential outbound calls, no parallelism within a request.
    let importer = state.importer.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let csrf_token = importer.fetch_csrf_token()?;
        importer.import_pages(&batch, &csrf_token)
    })
    .await;

    match outcome {
        Ok(Ok(())) => json_response(json!({ "ok": true, "title": title })),
        Ok(Err(err)) => error_response(err),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("Unknown error")
                .with_source(err),
        ),
    }
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(unauthorized());
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {}", state.api_token);
    if value != expected {
        return Err(unauthorized());
    }
    Ok(())
}

fn unauthorized() -> Error {
    // Missing, malformed, and mismatched credentials are indistinguishable.
    Error::new(ErrorKind::Permission).with_message("Unauthorized")
}

fn json_response(payload: serde_json::Value) -> Response {
    Json(payload).into_response()
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Upstream | ErrorKind::Internal | ErrorKind::Io => StatusCode::BAD_GATEWAY,
    };
    json_error(status, err.message().unwrap_or("Unknown error"))
}
