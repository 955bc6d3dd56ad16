use axum::{
    Extension,
    extract::State,
    response::Html,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::views::{self, PageContext};
use super::{ApiError, AppState};

/// GET / and /home
pub async fn index(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Html<String> {
    let ctx = PageContext::load(&session, Some(user)).await;
    views::index_page(&ctx)
}

/// GET /datasets
pub async fn datasets(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let datasets = state.store().list_datasets().await?;
    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::datasets_page(&ctx, &datasets))
}

/// GET /apidoc
pub async fn api_doc(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Html<String> {
    let ctx = PageContext::load(&session, Some(user)).await;
    views::api_doc_page(&ctx)
}
