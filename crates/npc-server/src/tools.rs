//! `/tools/*` handlers: session tool registration and introspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use npc_core::ToolDeclaration;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToolRegistrationRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolRegistrationResponse {
    pub session_id: String,
    pub tools_count: usize,
    pub registered_at: String,
    pub success: bool,
    pub message: String,
    pub tool_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    pub session_id: String,
    pub tools_count: usize,
    pub tool_names: Vec<String>,
    pub tools: Vec<ToolDeclaration>,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDeleteResponse {
    pub session_id: String,
    pub success: bool,
    pub message: String,
}

/// Reject declarations the model could not make sense of.
fn validate_tools(tools: &[ToolDeclaration]) -> Result<(), ApiError> {
    if tools.is_empty() {
        return Err(ApiError::validation("At least one tool must be provided"));
    }
    for (index, tool) in tools.iter().enumerate() {
        if tool.name.is_empty() {
            return Err(ApiError::validation("Tool name is required")
                .with_detail("tool_index", index.to_string()));
        }
        if tool.description.is_empty() {
            return Err(ApiError::validation("Tool description is required")
                .with_detail("tool_index", index.to_string())
                .with_detail("tool_name", tool.name.clone()));
        }
        for (param_name, param) in &tool.parameters {
            if param.description.is_empty() {
                return Err(ApiError::validation("Parameter description is required")
                    .with_detail("tool_name", tool.name.clone())
                    .with_detail("parameter_name", param_name.clone()));
            }
        }
    }
    Ok(())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    payload: Result<Json<ToolRegistrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ToolRegistrationResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_request_id(&request_id))?;

    if req.session_id.is_empty() {
        return Err(ApiError::validation("Session ID is required").with_request_id(&request_id));
    }
    validate_tools(&req.tools).map_err(|e| e.with_request_id(&request_id))?;

    let tool_names: Vec<String> = req.tools.iter().map(|t| t.name.clone()).collect();
    let tools_count = req.tools.len();

    state
        .sessions
        .register_session(&req.session_id, req.tools)
        .await
        .map_err(|e| {
            error!(session_id = %req.session_id, error = %e, "failed to register tools");
            ApiError::internal("Failed to register tools").with_request_id(&request_id)
        })?;

    info!(
        session_id = %req.session_id,
        tools_count,
        tool_names = ?tool_names,
        "tools registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(ToolRegistrationResponse {
            session_id: req.session_id,
            tools_count,
            registered_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            success: true,
            message: "Tools registered successfully".into(),
            tool_names,
        }),
    ))
}

pub async fn session_info(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let tools = state
        .sessions
        .get_session_tools(&session_id)
        .await
        .map_err(|_| ApiError::not_found("Session not found").with_request_id(&request_id))?;

    Ok(Json(SessionInfoResponse {
        session_id,
        tools_count: tools.len(),
        tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        tools,
        success: true,
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDeleteResponse>, ApiError> {
    state
        .sessions
        .delete_session(&session_id)
        .await
        .map_err(|_| ApiError::not_found("Session not found").with_request_id(&request_id))?;
    info!(session_id = %session_id, "session deleted");
    Ok(Json(SessionDeleteResponse {
        session_id,
        success: true,
        message: "Session deleted successfully".into(),
    }))
}
