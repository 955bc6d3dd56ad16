use axum::{Extension, extract::State, response::Html};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::flash::{Category, flash};
use super::views::{self, PageContext};
use super::{ApiError, AppState};

/// GET /current_session
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let status = state.shared.sessions.current().await?;
    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::current_session_page(&ctx, &status))
}

/// POST /current_session
///
/// A failed refresh still renders the page with the last stored status.
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let status = match state.shared.sessions.update_session_status().await {
        Ok(status) => {
            flash(&session, Category::Success, "Session status has been updated!").await;
            status
        }
        Err(e) => {
            tracing::error!(username = %user.username, "Error updating session status: {e:#}");
            flash(&session, Category::Danger, "Error updating session status").await;
            state.shared.sessions.current().await?
        }
    };

    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::current_session_page(&ctx, &status))
}
