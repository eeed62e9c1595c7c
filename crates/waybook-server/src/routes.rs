//! HTTP surface: the workbook, history, response, and connection routes.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthedUser;
use crate::error::ApiError;
use crate::state::AppState;
use waybook_engine::{
    connections, history, progress, save, HistoryRequest, SaveRequest,
};
use waybook_types::{
    ConnectionResult, HistoryPage, Response, ResponseTarget, SaveAck, WorkbookPage,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/workbook", get(get_workbook))
        .route("/workbook/history", get(get_history))
        .route(
            "/workbook/response",
            get(get_responses).post(post_response).put(put_response),
        )
        .route("/data/connection", get(get_connection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    from_sequence: Option<u64>,
    to_sequence: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveBody {
    prompt_id: Option<i64>,
    tool_id: Option<i64>,
    exercise_id: String,
    activity_id: Option<i64>,
    response_text: String,
}

impl SaveBody {
    fn into_request(self) -> Result<SaveRequest, ApiError> {
        let target = ResponseTarget::from_parts(self.prompt_id, self.tool_id)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let exercise = self
            .exercise_id
            .parse()
            .map_err(|e: waybook_types::ExerciseRefError| ApiError::bad_request(e.to_string()))?;
        Ok(SaveRequest {
            target,
            exercise,
            activity_id: self.activity_id,
            text: self.response_text,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsesQuery {
    exercise_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionQuery {
    connection_id: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_workbook(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<WorkbookPage>, ApiError> {
    let db = state.db();
    let page = progress::workbook_page(&db, &state.cfg, &*state.pii, auth.session, auth.user)?;
    Ok(Json(page))
}

async fn get_history(
    State(state): State<AppState>,
    auth: AuthedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let req = HistoryRequest {
        from_sequence: query.from_sequence,
        to_sequence: query.to_sequence,
        limit: query.limit,
    };
    let db = state.db();
    let page = history::history_page(&db, &state.cfg, &*state.pii, auth.session, auth.user, req)?;
    Ok(Json(page))
}

async fn post_response(
    State(state): State<AppState>,
    auth: AuthedUser,
    Json(body): Json<SaveBody>,
) -> Result<Json<SaveAck>, ApiError> {
    save_and_ack(state, auth, body, false).await
}

async fn put_response(
    State(state): State<AppState>,
    auth: AuthedUser,
    Json(body): Json<SaveBody>,
) -> Result<Json<SaveAck>, ApiError> {
    save_and_ack(state, auth, body, true).await
}

async fn save_and_ack(
    state: AppState,
    auth: AuthedUser,
    body: SaveBody,
    require_existing: bool,
) -> Result<Json<SaveAck>, ApiError> {
    let req = body.into_request()?;
    let db = state.db();
    let ack = save::save_response(
        &db,
        &state.cfg,
        &*state.pii,
        auth.session,
        auth.user,
        &req,
        require_existing,
    )?;
    info!(user = %auth.user, progress = ack.new_progress, updated = ack.updated, "response saved");
    Ok(Json(ack))
}

async fn get_responses(
    State(state): State<AppState>,
    auth: AuthedUser,
    Query(query): Query<ResponsesQuery>,
) -> Result<Json<Vec<Response>>, ApiError> {
    let raw = query
        .exercise_id
        .ok_or_else(|| ApiError::bad_request("exerciseId is required"))?;
    let exercise = raw
        .parse()
        .map_err(|e: waybook_types::ExerciseRefError| ApiError::bad_request(e.to_string()))?;
    let db = state.db();
    let responses = db
        .list_responses(auth.user, Some(exercise))
        .map_err(waybook_engine::EngineError::Store)?;
    let responses =
        waybook_engine::decrypt_responses(responses, &state.cfg, &*state.pii, auth.session);
    Ok(Json(responses))
}

async fn get_connection(
    State(state): State<AppState>,
    auth: AuthedUser,
    Query(query): Query<ConnectionQuery>,
) -> Result<Json<ConnectionResult>, ApiError> {
    let connection_id = query
        .connection_id
        .ok_or_else(|| ApiError::bad_request("connectionId is required"))?;
    let db = state.db();
    let result = connections::resolve(&db, auth.user, connection_id)?;
    Ok(Json(result))
}
