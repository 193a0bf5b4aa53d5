use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();

    if state.remove_session(&session_id).await {
        log::info!("[{}] session deleted", session_id);
        Ok(HttpResponse::Ok().finish())
    } else {
        Err(ApiError::SessionNotFound(session_id))
    }
}
