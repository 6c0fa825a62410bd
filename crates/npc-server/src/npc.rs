//! `/npc/*` handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use npc_core::{Npc, NpcId, Perception, ToolProvider};
use npc_runtime::{CombinedRegistry, TickInput, TickResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterNpcRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub background_story: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NpcMessageResponse {
    pub npc_id: NpcId,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ActRequest {
    #[serde(default)]
    pub npc_id: NpcId,
    /// Session whose tools are added to the global ones for this tick.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub perception: Perception,
}

#[derive(Debug, Serialize)]
pub struct ActResponse {
    pub npc_id: NpcId,
    #[serde(flatten)]
    pub result: TickResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NpcListResponse {
    pub npcs: BTreeMap<NpcId, Npc>,
    pub success: bool,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NpcGetResponse {
    pub npc_id: NpcId,
    pub npc: Npc,
    pub success: bool,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    payload: Result<Json<RegisterNpcRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NpcMessageResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_request_id(&request_id))?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required").with_request_id(&request_id));
    }
    if req.background_story.trim().is_empty() {
        return Err(
            ApiError::validation("Background story is required").with_request_id(&request_id)
        );
    }

    let npc_id = state.npcs.register(req.name.clone(), req.background_story);
    info!(npc_id = %npc_id, name = %req.name, "NPC registered");

    Ok((
        StatusCode::CREATED,
        Json(NpcMessageResponse {
            npc_id,
            success: true,
            message: "NPC registered successfully".into(),
        }),
    ))
}

pub async fn act(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    payload: Result<Json<ActRequest>, JsonRejection>,
) -> Result<Json<ActResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::from(e).with_request_id(&request_id))?;

    if req.npc_id.is_empty() {
        return Err(ApiError::validation("NPC ID is required").with_request_id(&request_id));
    }
    let npc = state.npcs.get(&req.npc_id).map_err(|_| {
        ApiError::not_found("NPC not found")
            .with_detail("npc_id", req.npc_id.clone())
            .with_request_id(&request_id)
    })?;

    let tools = effective_tools(&state, req.session_id.as_deref()).await;
    let input = TickInput::new(req.perception)
        .with_tools(tools)
        .with_caller(req.npc_id.clone());

    let result = state.orchestrator.act(&npc, input).await;
    if !result.success {
        let message = result
            .error_message
            .clone()
            .unwrap_or_else(|| "NPC tick failed".to_string());
        return Err(ApiError::tick_failed(message, result.provider_error.as_ref())
            .with_detail("npc_id", req.npc_id)
            .with_request_id(&request_id));
    }

    info!(npc_id = %req.npc_id, rounds = result.rounds.len(), "NPC acted");
    Ok(Json(ActResponse {
        npc_id: req.npc_id,
        result,
    }))
}

/// Global tools, overlaid with the session's tools when the session exists.
async fn effective_tools(state: &AppState, session_id: Option<&str>) -> Arc<dyn ToolProvider> {
    let global: Arc<dyn ToolProvider> = state.registry.clone();
    let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
        return global;
    };
    match state.sessions.get_session_tools(session_id).await {
        Ok(session_tools) => {
            let combined: Arc<dyn ToolProvider> = Arc::new(CombinedRegistry::new(
                state.registry.clone(),
                session_tools,
            ));
            combined
        }
        Err(e) => {
            warn!(session_id, error = %e, "session tools unavailable, using global tools");
            global
        }
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<NpcListResponse> {
    let npcs = state.npcs.list();
    Json(NpcListResponse {
        count: npcs.len(),
        npcs,
        success: true,
    })
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(npc_id): Path<String>,
) -> Result<Json<NpcGetResponse>, ApiError> {
    let npc = state
        .npcs
        .get(&npc_id)
        .map_err(|_| ApiError::not_found("NPC not found").with_request_id(&request_id))?;
    Ok(Json(NpcGetResponse {
        npc_id,
        npc,
        success: true,
    }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    Path(npc_id): Path<String>,
) -> Result<Json<NpcMessageResponse>, ApiError> {
    state
        .npcs
        .delete(&npc_id)
        .map_err(|_| ApiError::not_found("NPC not found").with_request_id(&request_id))?;
    let had_memories = state.scratchpad.remove(&npc_id);
    info!(npc_id = %npc_id, had_memories, "NPC deleted");
    Ok(Json(NpcMessageResponse {
        npc_id,
        success: true,
        message: "NPC deleted successfully".into(),
    }))
}
