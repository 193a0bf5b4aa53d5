use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

pub async fn handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();
    log::info!("[{}] stop request received", session_id);

    if state.cancel(&session_id).await {
        Ok(HttpResponse::Ok().json(StopResponse {
            success: true,
            message: "Turn cancelled".to_string(),
        }))
    } else {
        log::warn!("[{}] no turn in flight", session_id);
        Err(ApiError::SessionNotFound(session_id))
    }
}
