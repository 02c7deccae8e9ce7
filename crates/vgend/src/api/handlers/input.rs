//! Human input hand-off

use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct InputResponse {
    pub status: String,
    pub message: String,
}

/// Deliver a reviewer's input to a run suspended on its gate. Empty input
/// accepts the artifact under review.
pub async fn provide_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<InputRequest>,
) -> ApiResult<Json<InputResponse>> {
    state.registry().supply_input(&id, body.input)?;
    tracing::debug!(run_id = %id, "human input delivered");
    Ok(Json(InputResponse {
        status: "success".to_string(),
        message: "Input provided successfully".to_string(),
    }))
}
