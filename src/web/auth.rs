use axum::{
    Extension, Form,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::flash::{Category, flash};
use super::views::{self, PageContext};
use super::{ApiError, AppState, JsonError, LoginForm};
use crate::constants::{audit, roles, session::USER_KEY};
use crate::db::User;
use crate::services::auth_service::AuthError;

/// The logged-in user, inserted into request extensions by the middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

async fn session_user(state: &AppState, session: &Session) -> Result<Option<User>, ApiError> {
    let Some(username) = session.get::<String>(USER_KEY).await? else {
        return Ok(None);
    };

    // A user removed from the database invalidates the session.
    let user = state.store().get_user_by_username(&username).await?;
    if user.is_none() {
        session.flush().await?;
    }
    Ok(user)
}

// ============================================================================
// Middleware
// ============================================================================

/// Pages: anonymous visitors are sent to the login form.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = session_user(&state, &session).await? else {
        flash(&session, Category::Info, "Please log in to access this page.").await;
        return Ok(Redirect::to("/login").into_response());
    };

    tracing::Span::current().record("user_id", user.username.as_str());
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Report pages need the `admin` or `report-viewer` role. Runs inside
/// [`require_login`].
pub async fn require_report_viewer(request: Request, next: Next) -> Result<Response, ApiError> {
    let allowed = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| user.has_any_role(&[roles::ADMIN, roles::REPORT_VIEWER]));

    if !allowed {
        return Err(ApiError::Forbidden(
            "You do not have permission to view reports".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// API: accepts the session cookie, an `X-Api-Key` header or an
/// `Authorization: Bearer <key>` header.
pub async fn require_access_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, JsonError> {
    let mut user = session_user(&state, &session).await?;

    if user.is_none()
        && let Some(key) = extract_access_key(&headers)
    {
        user = state.store().verify_access_key(&key).await?;
    }

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("Invalid or missing access key".to_string()).into());
    };

    tracing::Span::current().record("user_id", user.username.as_str());
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn extract_access_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get("X-Api-Key")
        && let Ok(key_str) = key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, ApiError> {
    if session_user(&state, &session).await?.is_some() {
        flash(&session, Category::Info, "You are already logged in.").await;
        return Ok(Redirect::to("/").into_response());
    }

    let ctx = PageContext::load(&session, None).await;
    Ok(views::login_page(&ctx, "").into_response())
}

fn validate_login(form: &LoginForm) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if form.username.trim().is_empty() {
        errors.push("Username: This field is required.");
    }
    if form.password.is_empty() {
        errors.push("Password: This field is required.");
    }
    errors
}

async fn rerender_login(session: &Session, username: &str) -> Html<String> {
    let ctx = PageContext::load(session, None).await;
    views::login_page(&ctx, username)
}

/// Credential errors are shown as-is; storage failures only reach the log.
fn login_failure_message(username: &str, err: &AuthError) -> String {
    match err {
        AuthError::Database(detail) => {
            tracing::error!(username, "Login failed: {detail}");
            "Error authenticating user".to_string()
        }
        AuthError::Directory(detail) => {
            tracing::warn!(username, "Login failed: {detail}");
            err.to_string()
        }
        AuthError::InvalidCredentials => {
            tracing::info!(username, "Login failed: {err}");
            err.to_string()
        }
    }
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let username = form.username.trim();

    let errors = validate_login(&form);
    if !errors.is_empty() {
        for message in errors {
            flash(&session, Category::Danger, message).await;
        }
        return Ok(rerender_login(&session, username).await.into_response());
    }

    let user = match state
        .shared
        .authenticator
        .authenticate(username, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            flash(&session, Category::Danger, login_failure_message(username, &e)).await;
            return Ok(rerender_login(&session, username).await.into_response());
        }
    };

    session.cycle_id().await?;
    session.insert(USER_KEY, &user.username).await?;

    if let Err(e) = state
        .store()
        .log_action(&user.username, audit::LOGIN, None)
        .await
    {
        tracing::warn!("Failed to record login: {e}");
    }

    tracing::info!(username = %user.username, "User logged in");
    flash(&session, Category::Success, "You have successfully logged in.").await;
    Ok(Redirect::to("/").into_response())
}

/// GET /logout
pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    session.flush().await?;
    Ok(Redirect::to("/login"))
}

/// GET /accesskey
pub async fn access_key_form(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Html<String> {
    let access_key = user.access_key.clone();
    let ctx = PageContext::load(&session, Some(user)).await;
    views::access_key_page(&ctx, access_key.as_deref())
}

/// POST /accesskey
pub async fn regenerate_access_key(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    session: Session,
) -> Result<Html<String>, ApiError> {
    let key = state.store().regenerate_access_key(&user.username).await?;
    state
        .store()
        .log_action(&user.username, audit::REGENERATE_ACCESS_KEY, None)
        .await?;

    flash(&session, Category::Success, "Private access key has been regenerated!").await;

    user.access_key = Some(key);
    let access_key = user.access_key.clone();
    let ctx = PageContext::load(&session, Some(user)).await;
    Ok(views::access_key_page(&ctx, access_key.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn access_key_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_access_key(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123 "));
        assert_eq!(extract_access_key(&headers).as_deref(), Some("abc123"));

        headers.insert("X-Api-Key", HeaderValue::from_static("fromheader"));
        assert_eq!(extract_access_key(&headers).as_deref(), Some("fromheader"));

        let mut basic = HeaderMap::new();
        basic.insert("Authorization", HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(extract_access_key(&basic), None);
    }

    #[test]
    fn login_form_requires_both_fields() {
        let empty = LoginForm::default();
        assert_eq!(
            validate_login(&empty),
            vec![
                "Username: This field is required.",
                "Password: This field is required."
            ]
        );

        let filled = LoginForm {
            username: "jdoe".to_string(),
            password: "secret".to_string(),
        };
        assert!(validate_login(&filled).is_empty());
    }

    #[test]
    fn storage_failures_are_not_shown_on_login() {
        let err = AuthError::Database("Failed to create user jdoe: UNIQUE constraint failed".into());
        let message = login_failure_message("jdoe", &err);
        assert_eq!(message, "Error authenticating user");
        assert!(!message.contains("UNIQUE"));

        assert_eq!(
            login_failure_message("jdoe", &AuthError::InvalidCredentials),
            "Wrong user/password combination!"
        );
        assert_eq!(
            login_failure_message("jdoe", &AuthError::Directory("connection refused".into())),
            "Error authenticating with LDAP server"
        );
    }
}
