//! Run submission, lookup and removal

use std::collections::BTreeMap;

use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use vgen_core::{RunRequest, RunState, RunStatus, RunType};

/// Submit run request
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRunRequest {
    #[serde(default)]
    pub problem: Option<String>,

    #[serde(default)]
    pub run_type: Option<String>,

    #[serde(default)]
    pub source_run: Option<String>,
}

impl SubmitRunRequest {
    /// A missing or blank problem falls back to the built-in default.
    fn into_run_request(self) -> ApiResult<RunRequest> {
        let run_type = match self.run_type.as_deref() {
            Some(value) => value.parse::<RunType>()?,
            None => RunType::Full,
        };
        let mut request = RunRequest {
            run_type,
            source_run: self.source_run,
            ..RunRequest::default()
        };
        if let Some(problem) = self.problem.filter(|p| !p.trim().is_empty()) {
            request.problem = problem;
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitRunResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub message: String,
}

/// Register a run and start it in the background.
pub async fn submit_run(
    State(state): State<AppState>,
    Json(body): Json<SubmitRunRequest>,
) -> ApiResult<Json<SubmitRunResponse>> {
    let request = body.into_run_request()?;
    let run_type = request.run_type;
    let submitted = state.orchestrator.submit(request)?;

    tracing::info!(run_id = %submitted.run_id, %run_type, "run submitted");

    Ok(Json(SubmitRunResponse {
        message: format!("Run {} started", submitted.run_id),
        status: submitted.state.status,
        run_id: submitted.run_id,
    }))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunState>> {
    Ok(Json(state.registry().get(&id)?))
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<String>,
    pub details: BTreeMap<String, RunState>,
}

pub async fn list_runs(State(state): State<AppState>) -> Json<ListRunsResponse> {
    let runs = state.registry().list();
    Json(ListRunsResponse {
        runs: runs.iter().map(|run| run.run_id.clone()).collect(),
        details: runs
            .into_iter()
            .map(|run| (run.run_id.clone(), run))
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct DeleteRunResponse {
    pub run_id: String,
    pub status: String,
}

/// Drop a run from the registry. Its artifacts stay on disk.
pub async fn delete_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteRunResponse>> {
    let removed = state.registry().remove(&id)?;
    tracing::info!(run_id = %id, status = removed.status.as_str(), "run removed");
    Ok(Json(DeleteRunResponse {
        run_id: id,
        status: "removed".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_blank_problem_uses_default() {
        let request = SubmitRunRequest {
            problem: Some("   ".to_string()),
            ..Default::default()
        }
        .into_run_request()
        .unwrap();
        assert_eq!(request.problem, vgen_core::prompts::DEFAULT_PROBLEM);
        assert_eq!(request.run_type, RunType::Full);
    }

    #[test]
    fn test_unknown_run_type_is_bad_request() {
        let err = SubmitRunRequest {
            run_type: Some("synthesis".to_string()),
            ..Default::default()
        }
        .into_run_request()
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("synthesis")));
    }
}
