//! HTTP bridge between chat clients and the session store.
//!
//! Clients post player input and poll `/players/{id}/messages` for what the
//! game sent them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use saboteur_core::PlayerId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::ids::LobbyCode;
use crate::messenger::{MessageRef, OutboundMessage};
use crate::state_machine::store::{SessionView, StoreError};
use crate::state_machine::GameState;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub player_id: PlayerId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ButtonRequest {
    pub player_id: PlayerId,
    /// Action token from the pressed button.
    pub action: String,
    /// Message the button was attached to.
    #[serde(default)]
    pub message_id: Option<MessageRef>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    pub player_id: PlayerId,
    /// Opaque reference to the uploaded file.
    pub proof: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub code: LobbyCode,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: GameState,
}

/// Store errors rendered as JSON with a matching status code.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::UnknownLobby(_) => StatusCode::NOT_FOUND,
            StoreError::NotInSession(_) => StatusCode::FORBIDDEN,
            StoreError::LobbyFull(_)
            | StoreError::GameInProgress(_)
            | StoreError::AlreadyInSession(..) => StatusCode::CONFLICT,
        };
        debug!("Request refused: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session))
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/leave", post(leave_session))
        .route("/sessions/{code}/chat", post(chat))
        .route("/sessions/{code}/button", post(press_button))
        .route("/sessions/{code}/photo", post(submit_photo))
        .route("/sessions/{code}/new-round", post(new_round))
        .route("/players/{id}/messages", get(player_messages))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "saboteur"
    }))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let code = state.store.create_session(req.player_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { code })))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let view = state.store.snapshot(&LobbyCode::parse(&code)).await?;
    Ok(Json(view))
}

async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<SessionView>> {
    let code = LobbyCode::parse(&code);
    state.store.join(&code, req.player_id, &req.name).await?;
    Ok(Json(state.store.snapshot(&code).await?))
}

async fn leave_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<StatusCode> {
    let code = LobbyCode::parse(&code);
    if state.store.session_of(req.player_id).await.as_ref() != Some(&code) {
        return Err(StoreError::NotInSession(req.player_id).into());
    }
    state.store.leave(req.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<StateResponse>> {
    let state = state
        .store
        .handle_chat_message(&LobbyCode::parse(&code), req.player_id, &req.text)
        .await?;
    Ok(Json(StateResponse { state }))
}

async fn press_button(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<ButtonRequest>,
) -> ApiResult<Json<StateResponse>> {
    let state = state
        .store
        .handle_button_press(&LobbyCode::parse(&code), req.player_id, &req.action, req.message_id)
        .await?;
    Ok(Json(StateResponse { state }))
}

async fn submit_photo(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<PhotoRequest>,
) -> ApiResult<Json<StateResponse>> {
    let state = state
        .store
        .handle_photo_submission(&LobbyCode::parse(&code), req.player_id, &req.proof)
        .await?;
    Ok(Json(StateResponse { state }))
}

async fn new_round(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<Json<StateResponse>> {
    let state = state
        .store
        .new_round(&LobbyCode::parse(&code), req.player_id)
        .await?;
    Ok(Json(StateResponse { state }))
}

async fn player_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Json<Vec<OutboundMessage>> {
    Json(state.outbox.messages_for(PlayerId(id)).await)
}
