use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::LivyConfig;

/// Session lifecycle states reported by Livy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Starting,
    Idle,
    Busy,
    ShuttingDown,
    Error,
    Dead,
    Killed,
    Success,
    #[serde(other)]
    Unknown,
}

impl SessionState {
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(
            self,
            Self::NotStarted | Self::Starting | Self::Idle | Self::Busy
        )
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::ShuttingDown => "shutting_down",
            Self::Error => "error",
            Self::Dead => "dead",
            Self::Killed => "killed",
            Self::Success => "success",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivySession {
    pub id: i64,

    pub state: SessionState,

    #[serde(default)]
    pub app_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatementState {
    Waiting,
    Running,
    Available,
    Error,
    Cancelling,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl StatementState {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Available | Self::Error | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
    pub id: i64,

    pub state: StatementState,

    #[serde(default)]
    pub output: Option<StatementOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementOutput {
    pub status: String,

    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default)]
    pub ename: Option<String>,

    #[serde(default)]
    pub evalue: Option<String>,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    kind: &'a str,
}

#[derive(Serialize)]
struct SubmitStatementRequest<'a> {
    code: &'a str,
    kind: &'a str,
}

#[derive(Debug, Clone)]
pub struct LivyClient {
    client: Client,
    base_url: Url,
    session_kind: String,
}

impl LivyClient {
    pub fn new(config: &LivyConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.url).context("Invalid Livy URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("Dataplate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Livy HTTP client")?;

        Ok(Self {
            client,
            base_url,
            session_kind: config.session_kind.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Livy endpoint: {path}"))
    }

    /// Returns `None` when Livy no longer knows the session.
    pub async fn get_session(&self, id: i64) -> Result<Option<LivySession>> {
        let url = self.endpoint(&format!("sessions/{id}"))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to connect to Livy")?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(session_id = id, "Livy session not found");
            return Ok(None);
        }

        let response = error_for_status(response).await?;
        let session = response
            .json()
            .await
            .context("Failed to parse Livy session")?;
        Ok(Some(session))
    }

    pub async fn create_session(&self) -> Result<LivySession> {
        let url = self.endpoint("sessions")?;

        let response = self
            .client
            .post(url)
            .json(&CreateSessionRequest {
                kind: &self.session_kind,
            })
            .send()
            .await
            .context("Failed to connect to Livy")?;

        let response = error_for_status(response).await?;
        let session: LivySession = response
            .json()
            .await
            .context("Failed to parse created Livy session")?;

        debug!(session_id = session.id, state = %session.state, "Created Livy session");
        Ok(session)
    }

    pub async fn submit_sql(&self, session_id: i64, sql: &str) -> Result<Statement> {
        let url = self.endpoint(&format!("sessions/{session_id}/statements"))?;

        let response = self
            .client
            .post(url)
            .json(&SubmitStatementRequest {
                code: sql,
                kind: "sql",
            })
            .send()
            .await
            .context("Failed to connect to Livy")?;

        let response = error_for_status(response).await?;
        response
            .json()
            .await
            .context("Failed to parse Livy statement")
    }

    pub async fn get_statement(&self, session_id: i64, statement_id: i64) -> Result<Statement> {
        let url = self.endpoint(&format!(
            "sessions/{session_id}/statements/{statement_id}"
        ))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to connect to Livy")?;

        let response = error_for_status(response).await?;
        response
            .json()
            .await
            .context("Failed to parse Livy statement")
    }

    pub async fn cancel_statement(&self, session_id: i64, statement_id: i64) -> Result<()> {
        let url = self.endpoint(&format!(
            "sessions/{session_id}/statements/{statement_id}/cancel"
        ))?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Failed to connect to Livy")?;

        error_for_status(response).await?;
        debug!(session_id, statement_id, "Cancelled Livy statement");
        Ok(())
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    bail!("Livy request failed: status={status}, body={body}")
}
