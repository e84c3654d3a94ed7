//! REST handlers for `/api`.
//!
//! Every failure is answered with `{"error": "<message>"}`. Request bodies
//! that do not deserialize are reported as 400 with the same shape instead of
//! axum's plain-text rejections.

use axum::{
    Extension, Json,
    extract::{Path, Request, State, rejection::JsonRejection, rejection::PathRejection},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use numthread_core::error::{Error, OperationError, StoreError};
use numthread_core::model::{Comment, CommentDraft, DiscussionId, StoreCounts, User};
use numthread_core::{DiscussionWithTree, thread};
use numthread_security::{AuditEvent, AuditOutcome, hash_password, verify_password};

use crate::SharedState;

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscussionRequest {
    pub start_number: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub counts: StoreCounts,
}

// ── Error mapping ─────────────────────────────────────────────────────────

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Log the cause and answer with a generic 500.
fn internal(err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "Request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn domain_error(err: Error) -> ApiError {
    let status = match &err {
        Error::Operation(
            OperationError::UnknownDiscussion(_) | OperationError::UnresolvedParent { .. },
        ) => StatusCode::NOT_FOUND,
        Error::Operation(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Store(_) | Error::Serialization(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        return internal(err);
    }
    error_response(status, err.to_string())
}

/// Unwrap a JSON body. Oversized bodies get 413, anything else unreadable
/// gets 400 with `message`.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(
            error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"),
        ),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected request body");
            Err(error_response(StatusCode::BAD_REQUEST, message))
        }
    }
}

fn invalid_credentials() -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "Invalid credentials")
}

// ── Authentication ────────────────────────────────────────────────────────

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a valid bearer token and attach the caller's [`User`] to the request.
///
/// Missing token → 401, bad signature or expired → 403, token for a user
/// that no longer exists → 401.
pub(crate) async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route = req.uri().path().to_string();
    let deny = |actor: &str, reason: &str| {
        state.audit.log(
            AuditEvent::AuthFailure {
                route: route.clone(),
            },
            actor,
            AuditOutcome::Denied,
            Some(reason.into()),
        );
    };

    let Some(token) = bearer_token(req.headers()) else {
        deny("anonymous", "missing token");
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Access token required",
        ));
    };

    let claims = match state.signer.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            deny("anonymous", &e.to_string());
            return Err(error_response(StatusCode::FORBIDDEN, "Invalid token"));
        }
    };

    let Some(user) = state.store.find_user(claims.sub).await.map_err(internal)? else {
        deny(&claims.username, "user not found");
        return Err(error_response(StatusCode::UNAUTHORIZED, "User not found"));
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request = json_body(payload, "Username and password required")?;
    let (Some(username), Some(password)) = (
        request.username.filter(|u| !u.trim().is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Username and password required",
        ));
    };

    let taken = || {
        state.audit.log(
            AuditEvent::Register,
            &username,
            AuditOutcome::Failure,
            Some("username taken".into()),
        );
        error_response(StatusCode::BAD_REQUEST, "Username already exists")
    };

    if state
        .store
        .find_credentials(&username)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(taken());
    }

    let cost = state.config.auth.bcrypt_cost;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    // A concurrent registration can still win between the check and the insert.
    let user = match state.store.create_user(&username, &password_hash).await {
        Ok(user) => user,
        Err(StoreError::UsernameTaken(_)) => return Err(taken()),
        Err(e) => return Err(internal(e)),
    };

    let token = state.signer.issue(&user).map_err(internal)?;
    state
        .audit
        .log(AuditEvent::Register, &user.username, AuditOutcome::Success, None);
    info!(user = %user.id, username = %user.username, "User registered");

    Ok(Json(AuthResponse { token, user }))
}

pub(crate) async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request = json_body(payload, "Invalid request body")?;
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(invalid_credentials());
    };

    let failed = |reason: &str| {
        state.audit.log(
            AuditEvent::Login,
            &username,
            AuditOutcome::Failure,
            Some(reason.into()),
        );
        invalid_credentials()
    };

    let Some(stored) = state
        .store
        .find_credentials(&username)
        .await
        .map_err(internal)?
    else {
        return Err(failed("unknown user"));
    };

    let password_hash = stored.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(internal)?;
    if !valid {
        return Err(failed("wrong password"));
    }

    let token = state.signer.issue(&stored.user).map_err(internal)?;
    state
        .audit
        .log(AuditEvent::Login, &username, AuditOutcome::Success, None);

    Ok(Json(AuthResponse {
        token,
        user: stored.user,
    }))
}

pub(crate) async fn list_discussions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<DiscussionWithTree>>, ApiError> {
    let aggregation = thread::load_discussions(state.store.as_ref())
        .await
        .map_err(domain_error)?;
    Ok(Json(aggregation.discussions))
}

pub(crate) async fn get_discussion(
    State(state): State<SharedState>,
    id: Result<Path<DiscussionId>, PathRejection>,
) -> Result<Json<DiscussionWithTree>, ApiError> {
    let Ok(Path(id)) = id else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid discussion id",
        ));
    };

    thread::load_discussion(state.store.as_ref(), id)
        .await
        .map_err(domain_error)?
        .and_then(|aggregation| aggregation.discussions.into_iter().next())
        .map(Json)
        .ok_or_else(|| domain_error(OperationError::UnknownDiscussion(id).into()))
}

pub(crate) async fn create_discussion(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    payload: Result<Json<NewDiscussionRequest>, JsonRejection>,
) -> Result<Json<DiscussionWithTree>, ApiError> {
    let request = json_body(payload, "Start number must be a number")?;

    let discussion = thread::start_discussion(state.store.as_ref(), &user, request.start_number)
        .await
        .map_err(domain_error)?;

    Ok(Json(DiscussionWithTree {
        discussion,
        comments: Vec::new(),
    }))
}

pub(crate) async fn create_comment(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    payload: Result<Json<CommentDraft>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    let draft = json_body(payload, "Invalid comment data")?;

    let comment = thread::post_comment(state.store.as_ref(), &user, draft)
        .await
        .map_err(domain_error)?;
    Ok(Json(comment))
}

pub(crate) async fn health(
    State(state): State<SharedState>,
) -> Result<Json<HealthResponse>, ApiError> {
    let counts = state.store.counts().await.map_err(internal)?;
    Ok(Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        counts,
    }))
}
