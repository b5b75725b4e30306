//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests are routed by
//! path prefix to the route modules, which dispatch on method and segments.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{JwtValidator, RoleGate};
use crate::config::Args;
use crate::routes::{self, FullBody};
use crate::services::Library;
use crate::types::LibraryError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub library: Library,
    /// Bearer token validation
    pub jwt: JwtValidator,
    /// Minimum role per operation
    pub gate: RoleGate,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, library: Library) -> Result<Self, LibraryError> {
        let jwt = args.jwt_validator()?;
        let gate = args.role_gate();
        Ok(Self {
            args,
            library,
            jwt,
            gate,
            started_at: Instant::now(),
        })
    }
}

pub async fn run(state: Arc<AppState>) -> Result<(), LibraryError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Scriptorium listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory stores, ledger and dev token secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<FullBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(&state),

        // Version info for deployment verification
        (&Method::GET, "/version") => routes::version_info(),

        _ if path == "/participants"
            || path.starts_with("/participants/")
            || path.starts_with("/authors/")
            || path.starts_with("/validators/")
            || path == "/faucet"
            || path.starts_with("/dev/") =>
        {
            routes::handle_participants_request(req, state, &path).await
        }

        _ if path == "/works"
            || path.starts_with("/works/")
            || path == "/purchases"
            || path == "/internal/purchases" =>
        {
            routes::handle_works_request(req, state, &path).await
        }

        _ if path == "/bookmarks" || path.starts_with("/bookmarks/") => {
            routes::handle_bookmarks_request(req, state, &path).await
        }

        _ if path == "/reviews" || path.starts_with("/reviews/") => {
            routes::handle_reviews_request(req, state, &path).await
        }

        _ => routes::not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_HEADERS,
        hyper::header::HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        hyper::header::HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}
