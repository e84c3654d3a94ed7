//! HTTP API gateway for numthread.
//!
//! Exposes the discussion API under `/api`: account registration and login,
//! discussion listing with assembled reply trees, and authenticated writes
//! for discussions and comments.
//!
//! Built on Axum.

pub mod api;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    routing::{get, post},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use numthread_config::AppConfig;
use numthread_core::store::DiscussionStore;
use numthread_security::{AuditLogger, TokenSigner, TracingSink};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub store: Arc<dyn DiscussionStore>,
    pub signer: TokenSigner,
    pub audit: AuditLogger,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(config: AppConfig, store: Arc<dyn DiscussionStore>) -> Self {
        let signer = TokenSigner::from_config(&config.auth);
        Self {
            config,
            store,
            signer,
            audit: AuditLogger::with_sinks(vec![Box::new(TracingSink)]),
        }
    }
}

/// Build the router with all API routes.
///
/// Layers applied, outermost first:
/// - HTTP trace logging
/// - CORS restricted to `gateway.allowed_origins`
/// - Sliding-window rate limiting per client (health checks exempt)
/// - Request body size limit
///
/// Discussion and comment creation additionally require a bearer token.
pub fn build_router(state: SharedState) -> Router {
    let gateway = &state.config.gateway;
    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute,
        Duration::from_secs(60),
    ));
    let cors = cors_layer(&gateway.allowed_origins);
    let body_limit = gateway.body_limit_bytes;

    let protected = Router::new()
        .route("/api/discussions", post(api::create_discussion))
        .route("/api/comments", post(api::create_comment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_auth,
        ));

    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/login", post(api::login))
        .route("/api/discussions", get(api::list_discussions))
        .route("/api/discussions/{id}", get(api::get_discussion))
        .merge(protected)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            let state = state.clone();
            rate_limit_middleware(limiter, state, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Opens the configured store, binds `gateway.host:gateway.port` and serves
/// until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = numthread_store::open_store(&config.database).await?;
    info!(backend = store.name(), "Store ready");

    let state = Arc::new(GatewayState::new(config, store));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

// --- Rate Limiter ---

/// In-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (verified user or peer address).
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the request is allowed.
    fn check(&self, client_key: &str) -> bool {
        self.check_at(client_key, Instant::now())
    }

    fn check_at(&self, client_key: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict idle clients once the map grows large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Key requests by the user a valid bearer token names, then peer address,
/// then "anonymous". An unverified `Authorization` value never picks the
/// bucket.
fn client_key(req: &axum::extract::Request, signer: &TokenSigner) -> String {
    if let Some(claims) = api::bearer_token(req.headers()).and_then(|t| signer.verify(t).ok()) {
        return format!("user:{}", claims.sub);
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Answers 429 once a client exceeds its budget. `/api/health` is exempt so
/// monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    state: SharedState,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, api::ApiError> {
    if req.uri().path() == "/api/health" {
        return Ok(next.run(req).await);
    }

    let key = client_key(&req, &state.signer);
    if !limiter.check(&key) {
        warn!(client = %key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        return Err(api::error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
        ));
    }

    Ok(next.run(req).await)
}
