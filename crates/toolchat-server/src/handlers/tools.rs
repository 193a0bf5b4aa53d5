use actix_web::{web, HttpResponse};
use serde::Serialize;
use toolchat_core::ToolConflict;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub provider: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct UnavailableProvider {
    pub provider: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
    pub conflicts: Vec<ToolConflict>,
    pub unavailable: Vec<UnavailableProvider>,
}

/// Runs a discovery cycle and reports the merged catalog.
pub async fn handler(state: web::Data<AppState>) -> HttpResponse {
    let catalog = state.orchestrator.discover_tools().await;

    let tools = catalog
        .index
        .routes()
        .iter()
        .map(|route| ToolInfo {
            name: route.descriptor.name.clone(),
            description: route.descriptor.description.clone(),
            provider: route.provider.id().to_string(),
            parameters: route.descriptor.to_schema().function.parameters,
        })
        .collect();

    let unavailable = catalog
        .failures
        .iter()
        .map(|(provider, error)| UnavailableProvider {
            provider: provider.clone(),
            error: error.to_string(),
        })
        .collect();

    HttpResponse::Ok().json(ToolListResponse {
        tools,
        conflicts: catalog.index.conflicts().to_vec(),
        unavailable,
    })
}
