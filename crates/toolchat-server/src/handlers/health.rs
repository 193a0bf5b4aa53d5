use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>) -> HttpResponse {
    let sessions = state.sessions.read().await.len();
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "sessions": sessions,
        "servers": state.mcp_manager.server_infos(),
    }))
}
