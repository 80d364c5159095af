//! # API REST
//!
//! REST surface of the amendment discussion collaborator.
//!
//! Handles:
//! - HTTP endpoints with axum over an in-memory collaborator
//! - OpenAPI documentation served at `/api-docs/openapi.json`
//! - REST-specific concerns (JSON error bodies, CORS)
//!
//! Failures are answered with `{ "detail": "<message>" }` and the collaborator's status code.

#![warn(rust_2018_idioms)]

use amend_core::constants::DEFAULT_MENTION_LIMIT;
use amend_core::model::CommentEdit;
use amend_core::{
    ApiError, CollaboratorApi, Comment, CommentId, CommentKind, CommentsPage, EmployeeId, Emoji,
    EntityId, MemoryCollaborator, MentionCandidate, NewComment, QaOverallResult, QaStatus,
    QaWorkflowState, Reaction, ReactionSummary,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, patch},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};

/// Largest directory page a single search may ask for.
const MAX_SEARCH_LIMIT: usize = 50;

/// Application state for the REST API server.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<MemoryCollaborator>,
}

impl AppState {
    pub fn new(api: Arc<MemoryCollaborator>) -> Self {
        Self { api }
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiInfoRes {
    pub name: String,
    pub version: String,
    pub docs: String,
}

type Failure = (StatusCode, Json<ErrorRes>);

fn failure(status: StatusCode, detail: impl Into<String>) -> Failure {
    (
        status,
        Json(ErrorRes {
            detail: detail.into(),
        }),
    )
}

fn from_api_error(e: ApiError) -> Failure {
    let status = match &e {
        ApiError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
        ApiError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("collaborator error: {}", e);
    }
    failure(status, e.detail())
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CreateCommentQuery {
    /// Comment being replied to.
    pub parent_comment_id: Option<CommentId>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ToggleReactionQuery {
    /// One of the six supported glyphs, or its short name.
    pub emoji: String,
    /// Reacting employee.
    pub employee_id: EmployeeId,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive name fragment.
    #[serde(default)]
    pub q: String,
    /// Maximum results, default 10.
    pub limit: Option<usize>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api_info,
        health,
        list_comments,
        create_comment,
        update_comment,
        delete_comment,
        reaction_summary,
        list_reactions,
        toggle_reaction,
        search_directory,
        get_qa,
        update_qa,
    ),
    components(schemas(
        ApiInfoRes,
        HealthRes,
        ErrorRes,
        Comment,
        CommentKind,
        CommentsPage,
        NewComment,
        CommentEdit,
        Reaction,
        ReactionSummary,
        MentionCandidate,
        QaWorkflowState,
        QaStatus,
        QaOverallResult,
    ))
)]
pub struct ApiDoc;

/// Build the router for every collaborator endpoint.
///
/// CORS is left to the caller so each binary can apply its own origin policy.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route(
            "/entities/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/entities/:id/qa", get(get_qa).patch(update_qa))
        .route("/comments/:id", patch(update_comment).delete(delete_comment))
        .route(
            "/comments/:id/reactions",
            get(list_reactions).post(toggle_reaction),
        )
        .route("/comments/:id/reactions/summary", get(reaction_summary))
        .route("/directory/search", get(search_directory))
        .with_state(state)
}

/// CORS policy from a comma-separated origin list.
///
/// Unset means `http://localhost:3000`; `*` allows any origin.
///
/// # Errors
///
/// Returns an error if an origin is not a valid header value.
pub fn cors_from_env_value(
    value: Option<String>,
) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let raw = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    if raw == "*" {
        return Ok(CorsLayer::permissive());
    }
    let origins = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(HeaderValue::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

// ============================================================================
// SERVICE
// ============================================================================

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "API information", body = ApiInfoRes)
    )
)]
/// Service name, version and where the OpenAPI document lives.
///
/// # Returns
/// * `Json<ApiInfoRes>` - Static API information
async fn api_info() -> Json<ApiInfoRes> {
    Json(ApiInfoRes {
        name: "Amendment Discussion API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        docs: "/api-docs/openapi.json".into(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used by monitoring and load balancer health checks.
///
/// # Returns
/// * `Json<HealthRes>` - Health status response
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Amendment discussion API is alive".into(),
    })
}

/// The generated OpenAPI document for the documented routes.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// ============================================================================
// COMMENTS
// ============================================================================

#[utoipa::path(
    get,
    path = "/entities/{id}/comments",
    params(("id" = i64, Path, description = "Amendment id")),
    responses(
        (status = 200, description = "All comments on the amendment, flat", body = CommentsPage)
    )
)]
/// List every comment on an amendment as a flat list
///
/// Replies carry their `parentCommentId`; clients build the thread themselves.
///
/// # Returns
/// * `Ok(Json<CommentsPage>)` - All comments, in creation order
/// * `Err(Failure)` - Collaborator failure with its `detail`
///
/// # Errors
/// Returns `500 Internal Server Error` if the store cannot be read.
#[axum::debug_handler]
async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<CommentsPage>, Failure> {
    let items = state.api.list_comments(id).await.map_err(from_api_error)?;
    Ok(Json(CommentsPage { items }))
}

#[utoipa::path(
    post,
    path = "/entities/{id}/comments",
    params(("id" = i64, Path, description = "Amendment id"), CreateCommentQuery),
    request_body = NewComment,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 422, description = "Empty body or unknown parent", body = ErrorRes)
    )
)]
/// Create a comment, or a reply when `parentCommentId` is given.
///
/// # Returns
/// * `Ok((201, Json<Comment>))` - The stored comment with its assigned id
/// * `Err(Failure)` - Validation failure with its `detail`
///
/// # Errors
/// Returns `422 Unprocessable Entity` if:
/// - the body text is blank, or
/// - the parent comment does not exist on the same amendment.
#[axum::debug_handler]
async fn create_comment(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Query(query): Query<CreateCommentQuery>,
    Json(req): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), Failure> {
    let created = state
        .api
        .create_comment(id, &req, query.parent_comment_id)
        .await
        .map_err(from_api_error)?;
    tracing::info!(entity_id = id, comment_id = created.id, "comment created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = CommentEdit,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 404, description = "No such comment", body = ErrorRes),
        (status = 422, description = "Empty body", body = ErrorRes)
    )
)]
/// Replace the text of a comment and mark it edited
///
/// # Returns
/// * `Ok(Json<Comment>)` - The updated comment
/// * `Err(Failure)` - Lookup or validation failure with its `detail`
///
/// # Errors
/// Returns:
/// - `404 Not Found` if the comment does not exist, or
/// - `422 Unprocessable Entity` if the new text is blank.
#[axum::debug_handler]
async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    Json(req): Json<CommentEdit>,
) -> Result<Json<Comment>, Failure> {
    let updated = state
        .api
        .update_comment(id, &req.body_text)
        .await
        .map_err(from_api_error)?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment deleted; replies are kept"),
        (status = 404, description = "No such comment", body = ErrorRes)
    )
)]
/// Delete a single comment
///
/// Replies are not removed; they keep pointing at the deleted id.
///
/// # Errors
/// Returns `404 Not Found` if the comment does not exist.
#[axum::debug_handler]
async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<StatusCode, Failure> {
    state.api.delete_comment(id).await.map_err(from_api_error)?;
    tracing::info!(comment_id = id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// REACTIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/comments/{id}/reactions/summary",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Count per emoji", body = ReactionSummary),
        (status = 404, description = "No such comment", body = ErrorRes)
    )
)]
/// Count of reactions per emoji on a comment
///
/// # Returns
/// * `Ok(Json<ReactionSummary>)` - Glyph to count, zero counts omitted
///
/// # Errors
/// Returns `404 Not Found` if the comment does not exist.
#[axum::debug_handler]
async fn reaction_summary(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<Json<ReactionSummary>, Failure> {
    let summary = state
        .api
        .reaction_summary(id)
        .await
        .map_err(from_api_error)?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/comments/{id}/reactions",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Every reaction on the comment", body = [Reaction]),
        (status = 404, description = "No such comment", body = ErrorRes)
    )
)]
/// Every individual reaction on a comment, with who set it
///
/// # Errors
/// Returns `404 Not Found` if the comment does not exist.
#[axum::debug_handler]
async fn list_reactions(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
) -> Result<Json<Vec<Reaction>>, Failure> {
    let reactions = state.api.list_reactions(id).await.map_err(from_api_error)?;
    Ok(Json(reactions))
}

#[utoipa::path(
    post,
    path = "/comments/{id}/reactions",
    params(("id" = i64, Path, description = "Comment id"), ToggleReactionQuery),
    responses(
        (status = 204, description = "Reaction added if absent, removed if present"),
        (status = 404, description = "No such comment", body = ErrorRes),
        (status = 422, description = "Unsupported emoji", body = ErrorRes)
    )
)]
/// Add the employee's reaction if absent, remove it if present
///
/// # Returns
/// * `Ok(204)` - The toggle was applied
/// * `Err(Failure)` - Lookup or validation failure with its `detail`
///
/// # Errors
/// Returns:
/// - `404 Not Found` if the comment does not exist, or
/// - `422 Unprocessable Entity` if `emoji` is not one of the supported glyphs.
#[axum::debug_handler]
async fn toggle_reaction(
    State(state): State<AppState>,
    Path(id): Path<CommentId>,
    Query(query): Query<ToggleReactionQuery>,
) -> Result<StatusCode, Failure> {
    let emoji = Emoji::parse(&query.emoji)
        .map_err(|e| failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    state
        .api
        .toggle_reaction(id, query.employee_id, emoji)
        .await
        .map_err(from_api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[utoipa::path(
    get,
    path = "/directory/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching employees", body = [MentionCandidate])
    )
)]
/// Search the employee directory by name fragment for @mentions
///
/// `limit` defaults to the client mention limit and is capped at [`MAX_SEARCH_LIMIT`].
///
/// # Returns
/// * `Ok(Json<Vec<MentionCandidate>>)` - Matches in directory order
#[axum::debug_handler]
async fn search_directory(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<MentionCandidate>>, Failure> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MENTION_LIMIT)
        .min(MAX_SEARCH_LIMIT);
    let found = state
        .api
        .search_directory(&query.q, limit)
        .await
        .map_err(from_api_error)?;
    Ok(Json(found))
}

// ============================================================================
// QA WORKFLOW
// ============================================================================

#[utoipa::path(
    get,
    path = "/entities/{id}/qa",
    params(("id" = i64, Path, description = "Amendment id")),
    responses(
        (status = 200, description = "Current QA state", body = QaWorkflowState)
    )
)]
/// Current QA workflow state of an amendment
///
/// Amendments without saved QA state report the default `Not Started` state.
///
/// # Returns
/// * `Ok(Json<QaWorkflowState>)` - The stored or default state
#[axum::debug_handler]
async fn get_qa(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<QaWorkflowState>, Failure> {
    let qa = state.api.get_qa(id).await.map_err(from_api_error)?;
    Ok(Json(qa))
}

#[utoipa::path(
    patch,
    path = "/entities/{id}/qa",
    params(("id" = i64, Path, description = "Amendment id")),
    request_body = QaWorkflowState,
    responses(
        (status = 200, description = "QA state saved", body = QaWorkflowState)
    )
)]
/// Replace the QA state of an amendment with the full state sent.
///
/// Clients send the whole state on every change, so the last write wins.
///
/// # Returns
/// * `Ok(Json<QaWorkflowState>)` - The state as saved
#[axum::debug_handler]
async fn update_qa(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(req): Json<QaWorkflowState>,
) -> Result<Json<QaWorkflowState>, Failure> {
    let saved = state.api.update_qa(id, &req).await.map_err(from_api_error)?;
    tracing::info!(entity_id = id, status = %req.qa_status, "QA state updated");
    Ok(Json(saved))
}
