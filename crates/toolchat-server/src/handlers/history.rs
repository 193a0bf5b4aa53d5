use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Returns the conversation as stored. A session in the middle of a turn
/// reports busy rather than exposing an unfinished tool round.
pub async fn handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    let session = state
        .existing_session(&session_id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;

    let conversation = session
        .try_lock()
        .map_err(|_| ApiError::SessionBusy(session_id))?;

    Ok(HttpResponse::Ok().json(&*conversation))
}
