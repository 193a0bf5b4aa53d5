use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use toolchat_loop::TurnSummary;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub content: String,
    pub turn: TurnSummary,
}

/// Runs one prompt to completion and returns the final assistant text.
pub async fn handler(
    state: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let ChatRequest {
        message,
        session_id,
    } = req.into_inner();

    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let session = state.session(&session_id).await;
    let mut conversation = session
        .try_lock_owned()
        .map_err(|_| ApiError::SessionBusy(session_id.clone()))?;

    let cancel = state.begin_turn(&session_id).await;
    log::info!("[{}] chat request ({} chars)", session_id, message.len());

    // The turn outlives a disconnected client so the session is always
    // released in a consistent state.
    let task_state = state.clone();
    let task_session_id = session_id.clone();
    let task = actix_web::rt::spawn(async move {
        let report = task_state
            .orchestrator
            .run_turn_with_report(&mut conversation, &message, cancel)
            .await;
        task_state.end_turn(&task_session_id).await;
        drop(conversation);
        report
    });
    let report = task
        .await
        .map_err(|e| ApiError::Internal(format!("turn task failed: {}", e)))?;

    let turn = report.summary();
    let content = report.outcome?;

    Ok(HttpResponse::Ok().json(ChatResponse {
        session_id,
        content,
        turn,
    }))
}
