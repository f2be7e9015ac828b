//! Request routing and handlers
//!
//! The router enforces three things before any handler runs: only GET,
//! POST and DELETE exist (anything else is 400), no target may contain
//! `..` (400), and every route except `POST /login` requires a live token
//! (401). Request bodies are parsed by hand so malformed JSON and missing
//! fields consistently answer 400.

use axum::{
    extract::{Path, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tower_http::trace::TraceLayer;

use vigil::protocol::{BackupRequest, LoginRequest, ProbeFolderRequest};

use crate::auth::{self, AuthUser, TOKEN_LEN};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/probefolder/", post(probe_folder_root))
        .route("/probefolder/*path", post(probe_folder))
        .route("/probefile/*path", get(probe_file))
        .route("/backup/", post(backup_root).delete(delete_root))
        .route("/backup/*path", post(backup).delete(delete_path))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/login", post(login))
        .merge(protected)
        .layer(middleware::from_fn(guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Outermost request filter: method allow-list and path-traversal check,
/// both answered with 400 before any routing happens.
async fn guard(request: Request, next: Next) -> Response {
    let method = request.method();
    if method != Method::GET && method != Method::POST && method != Method::DELETE {
        return (StatusCode::BAD_REQUEST, "Unknown HTTP-method").into_response();
    }
    if request.uri().path().contains("..") {
        return (StatusCode::BAD_REQUEST, "Bad path").into_response();
    }
    next.run(request).await
}

/// `POST /login`: verify credentials, issue a fresh token, answer it as
/// the plain-text body.
async fn login(State(state): State<AppState>, body: String) -> ApiResult<Response> {
    let request: LoginRequest = serde_json::from_str(&body)
        .map_err(|_| ApiError::BadRequest("Missing login parameters".to_string()))?;

    if !auth::verify_user_password(&state.pool, &request.username, &request.password).await? {
        return Err(ApiError::Unauthorized("Authentication failed".to_string()));
    }

    let token = auth::create_token(TOKEN_LEN);
    if !auth::save_token_to_user(&state.pool, &request.username, &token).await? {
        return Err(ApiError::Internal(
            "Error in creating token to user".to_string(),
        ));
    }

    tracing::info!("user {} logged in", request.username);
    Ok(token.into_response())
}

/// `POST /logout`: invalidate the caller's token.
async fn logout(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    if auth::logout_user(&state.pool, &username).await? {
        tracing::info!("user {} logged out", username);
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::Internal("Error during logout".to_string()))
    }
}

/// `POST /probefolder/<rel>`: reconcile the mirror directory against the
/// client's children listing; 404 when the directory is absent.
async fn probe_folder(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    Path(rel): Path<String>,
    body: String,
) -> ApiResult<StatusCode> {
    probe_folder_at(&state, &username, &rel, &body)
}

async fn probe_folder_root(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    body: String,
) -> ApiResult<StatusCode> {
    probe_folder_at(&state, &username, "", &body)
}

fn probe_folder_at(
    state: &AppState,
    username: &str,
    rel: &str,
    body: &str,
) -> ApiResult<StatusCode> {
    let request: ProbeFolderRequest = serde_json::from_str(body)
        .map_err(|_| ApiError::BadRequest("Bad request body".to_string()))?;

    if state.mirror.probe_directory(username, rel, &request.children)? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

/// `GET /probefile/<rel>`: the mirror's digest as the body, 404 when no
/// regular file is there.
async fn probe_file(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    Path(rel): Path<String>,
) -> ApiResult<Response> {
    match state.mirror.file_digest(&username, &rel)? {
        Some(digest) => Ok(digest.into_response()),
        None => Err(ApiError::NotFound),
    }
}

/// `POST /backup/<rel>`: store a file (base64 body) or create a folder.
async fn backup(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    Path(rel): Path<String>,
    body: String,
) -> ApiResult<StatusCode> {
    backup_at(&state, &username, &rel, &body)
}

async fn backup_root(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    body: String,
) -> ApiResult<StatusCode> {
    backup_at(&state, &username, "", &body)
}

fn backup_at(state: &AppState, username: &str, rel: &str, body: &str) -> ApiResult<StatusCode> {
    let request: BackupRequest = serde_json::from_str(body)
        .map_err(|_| ApiError::BadRequest("Missing parameters".to_string()))?;

    match request {
        BackupRequest::File { encodedfile } => {
            let bytes = STANDARD
                .decode(encodedfile.as_bytes())
                .map_err(|_| ApiError::BadRequest("Bad file encoding".to_string()))?;
            state.mirror.save_file(username, rel, &bytes)?;
            tracing::debug!("saved file {} for {}", rel, username);
        }
        BackupRequest::Folder => {
            state.mirror.new_directory(username, rel)?;
            tracing::debug!("created folder {} for {}", rel, username);
        }
    }
    Ok(StatusCode::OK)
}

/// `DELETE /backup/<rel>`: recursive delete; 404 when nothing was there.
async fn delete_path(
    State(state): State<AppState>,
    Extension(AuthUser(username)): Extension<AuthUser>,
    Path(rel): Path<String>,
) -> ApiResult<StatusCode> {
    if state.mirror.delete(&username, &rel)? {
        tracing::debug!("deleted {} for {}", rel, username);
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

/// `DELETE /backup/` names the sandbox root and is always refused.
async fn delete_root() -> ApiResult<StatusCode> {
    Err(ApiError::BadRequest("Bad path".to_string()))
}
