//! JSON endpoints for scripted access with a personal access key.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::collections::HashMap;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, DatasetDto, JsonError};
use crate::constants::audit;
use crate::services::{QueryError, QueryResult};

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MissingParameter(_) | QueryError::NoSession => {
                ApiError::validation(err.to_string())
            }
            QueryError::Timeout(_) | QueryError::Livy(_) => ApiError::livy_error(err.to_string()),
        }
    }
}

/// GET /api/datasets
pub async fn list_datasets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<DatasetDto>>>, JsonError> {
    let datasets = state.store().list_datasets().await?;
    let dtos = datasets.into_iter().map(DatasetDto::from).collect();
    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /api/query/{id}/run
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(values): Json<HashMap<String, String>>,
) -> Result<Json<ApiResponse<QueryResult>>, JsonError> {
    let query = state
        .store()
        .get_query(id)
        .await?
        .ok_or_else(|| ApiError::query_not_found(id))?;

    state
        .store()
        .log_action(&user.username, audit::RUN_QUERY, Some(&query.name))
        .await?;

    let result = state
        .shared
        .queries
        .run(&query.sql, &values)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(result)))
}
