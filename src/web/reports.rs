use axum::{
    Extension,
    body::Body,
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::views::{self, PageContext};
use super::{ApiError, AppState, ReportFileQuery};
use crate::constants::audit;
use crate::services::reports;

const REPORT_CSP: &str =
    "default-src 'self' data: 'unsafe-inline'; frame-ancestors 'none'; base-uri 'self'";

async fn reports_base(state: &AppState) -> Result<PathBuf, ApiError> {
    let settings = state.store().global_config().await?;
    Ok(PathBuf::from(settings.reports_location))
}

/// GET /report?name=value&...
pub async fn report(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<Vec<(String, String)>>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let base = reports_base(&state).await?;
    let listing = reports::browse(&base, &params).await?;

    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::report_page(&ctx, &listing))
}

/// GET /report_file?file=path
pub async fn report_file(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ReportFileQuery>,
) -> Result<Response, ApiError> {
    let file = query
        .file
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::validation("Missing 'file' parameter"))?;

    let base = reports_base(&state).await?;
    let content = reports::read_report(&base, &file).await?;

    state
        .store()
        .log_action(&user.username, audit::VIEW_REPORT, Some(&file))
        .await?;

    // No charset: the report's own <meta charset> decides.
    Ok((
        [
            (header::CONTENT_TYPE, "text/html"),
            (header::CONTENT_SECURITY_POLICY, REPORT_CSP),
        ],
        Body::from(content),
    )
        .into_response())
}
