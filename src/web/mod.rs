use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

use crate::config::Config;
use crate::state::SharedState;

mod api;
mod assets;
pub mod auth;
mod error;
pub mod flash;
mod observability;
mod pages;
mod queries;
mod reports;
mod session;
mod system;
mod types;
pub mod views;

pub use error::{ApiError, JsonError};
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_idle_minutes,
        )));

    let api_routes = Router::new()
        .route("/datasets", get(api::list_datasets))
        .route("/query/{id}/run", post(api::run_query))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_access_key,
        ));

    Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/version", get(system::version))
        .route("/static/{*path}", get(assets::serve_asset))
        .nest("/api", api_routes)
        .layer(session_layer)
        .with_state(state)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let report_routes = Router::new()
        .route("/report", get(reports::report))
        .route("/report_file", get(reports::report_file))
        .route_layer(middleware::from_fn(auth::require_report_viewer));

    Router::new()
        .route("/", get(pages::index))
        .route("/home", get(pages::index))
        .route("/logout", get(auth::logout))
        .route(
            "/accesskey",
            get(auth::access_key_form).post(auth::regenerate_access_key),
        )
        .route("/datasets", get(pages::datasets))
        .route("/apidoc", get(pages::api_doc))
        .route(
            "/current_session",
            get(session::current_session).post(session::update_session),
        )
        .route(
            "/query/{id}/run",
            get(queries::run_query_form).post(queries::run_query),
        )
        .route("/metrics", get(system::get_metrics))
        .merge(report_routes)
        .route_layer(middleware::from_fn_with_state(state, auth::require_login))
}
