use axum::{
    Extension, Form,
    extract::{Path, State},
    response::Html,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::flash::{Category, flash};
use super::views::{self, PageContext};
use super::{ApiError, AppState};
use crate::constants::audit;
use crate::db::SavedQuery;
use crate::services::{QueryError, QueryResult, query_service::extract_parameters};

async fn load_query(state: &AppState, id: i32) -> Result<SavedQuery, ApiError> {
    state
        .store()
        .get_query(id)
        .await?
        .ok_or_else(|| ApiError::query_not_found(id))
}

/// GET /query/{id}/run
pub async fn run_query_form(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let query = load_query(&state, id).await?;
    let parameters = extract_parameters(&query.sql);

    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::run_query_page(
        &ctx,
        &query,
        &parameters,
        &HashMap::new(),
        None,
    ))
}

/// POST /query/{id}/run
///
/// Query failures are flashed and the form is shown again with the
/// submitted values.
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    session: Session,
    Form(values): Form<HashMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let query = load_query(&state, id).await?;
    let parameters = extract_parameters(&query.sql);

    state
        .store()
        .log_action(&user.username, audit::RUN_QUERY, Some(&query.name))
        .await?;

    let result: Option<QueryResult> = match state.shared.queries.run(&query.sql, &values).await {
        Ok(result) => Some(result),
        Err(e @ (QueryError::MissingParameter(_) | QueryError::NoSession)) => {
            tracing::debug!(query_id = id, "Query not run: {e}");
            flash(&session, Category::Danger, e.to_string()).await;
            None
        }
        Err(e @ QueryError::Timeout(_)) => {
            tracing::warn!(query_id = id, "Query execution failed: {e}");
            flash(&session, Category::Danger, e.to_string()).await;
            None
        }
        Err(e @ QueryError::Livy(_)) => {
            tracing::error!(query_id = id, "Query execution failed: {e}");
            flash(&session, Category::Danger, "Error running query").await;
            None
        }
    };

    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::run_query_page(
        &ctx,
        &query,
        &parameters,
        &values,
        result.as_ref(),
    ))
}
