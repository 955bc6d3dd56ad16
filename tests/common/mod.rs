#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use dataplate::config::Config;
use dataplate::constants::demo;
use dataplate::state::SharedState;
use dataplate::web::{self, AppState};
use http_body_util::BodyExt;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub dir: PathBuf,
}

impl TestApp {
    pub fn reports_dir(&self) -> PathBuf {
        self.dir.join("reports")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Logs in as the demo user and returns the session cookie.
    pub async fn login(&self) -> String {
        let body = format!(
            "username={}&password={}",
            urlencoding::encode(demo::USERNAME),
            demo::PASSWORD
        );
        let response = self.post_form("/login", &body, None).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        session_cookie(&response).expect("login sets a session cookie")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

pub fn test_config(dir: &std::path::Path, livy_url: &str) -> Config {
    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", dir.join("dataplate.db").display());
    config.general.max_db_connections = 2;
    config.server.secure_cookies = false;
    config.auth.backend = "demo".to_string();
    config.livy.url = livy_url.to_string();
    config.livy.statement_poll_interval_ms = 10;
    config.livy.statement_timeout_seconds = 5;
    config.livy.request_timeout_seconds = 5;
    config.reports.location = dir.join("reports").display().to_string();
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_app_with(livy_url: &str) -> TestApp {
    spawn_app_with_config(livy_url, |_| {}).await
}

pub async fn spawn_app_with_config(livy_url: &str, customize: impl FnOnce(&mut Config)) -> TestApp {
    let dir = std::env::temp_dir().join(format!("dataplate-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("reports")).unwrap();

    let mut config = test_config(&dir, livy_url);
    customize(&mut config);
    let shared = Arc::new(SharedState::new(config).await.unwrap());
    let state = web::create_app_state(shared, None);
    let app = web::router(state.clone());

    TestApp { app, state, dir }
}

/// A Livy URL nothing listens on.
pub const UNREACHABLE_LIVY: &str = "http://127.0.0.1:1";

pub async fn spawn_app() -> TestApp {
    spawn_app_with(UNREACHABLE_LIVY).await
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("id="))
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
