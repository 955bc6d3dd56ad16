//! Saved query templates and their execution on the Livy session.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clients::livy::{LivyClient, Statement, StatementOutput, StatementState};
use crate::config::LivyConfig;

use super::session_service::LivySessionService;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Missing value for parameter '{0}'")]
    MissingParameter(String),

    #[error("No active compute session, refresh it on the session page first")]
    NoSession,

    #[error("Query did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Compute session error: {0}")]
    Livy(String),
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Livy(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Text {
        text: String,
    },
    Failed {
        name: String,
        message: String,
    },
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("Invalid regex pattern defined in code"))
}

/// Distinct `${name}` placeholders, in order of first appearance.
#[must_use]
pub fn extract_parameters(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(sql) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Substitute every placeholder. Values are inserted verbatim.
pub fn render_sql(sql: &str, values: &HashMap<String, String>) -> Result<String, QueryError> {
    if let Some(missing) = extract_parameters(sql)
        .into_iter()
        .find(|name| !values.contains_key(name))
    {
        return Err(QueryError::MissingParameter(missing));
    }

    Ok(placeholder_regex()
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a finished statement's output.
#[must_use]
pub fn interpret_output(output: &StatementOutput) -> QueryResult {
    if output.status != "ok" {
        return QueryResult::Failed {
            name: output.ename.clone().unwrap_or_else(|| output.status.clone()),
            message: output.evalue.clone().unwrap_or_default(),
        };
    }

    let Some(data) = &output.data else {
        return QueryResult::Text {
            text: String::new(),
        };
    };

    if let Some(table) = data.get("application/json") {
        let columns = table["schema"]["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| f["name"].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = table["data"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_to_string).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        return QueryResult::Table { columns, rows };
    }

    let text = data
        .get("text/plain")
        .map(cell_to_string)
        .unwrap_or_default();
    QueryResult::Text { text }
}

pub struct QueryRunner {
    livy: Arc<LivyClient>,
    sessions: Arc<LivySessionService>,
    poll_interval: Duration,
    timeout: Duration,
}

impl QueryRunner {
    #[must_use]
    pub fn new(livy: Arc<LivyClient>, sessions: Arc<LivySessionService>, config: &LivyConfig) -> Self {
        Self {
            livy,
            sessions,
            poll_interval: Duration::from_millis(config.statement_poll_interval_ms),
            timeout: Duration::from_secs(config.statement_timeout_seconds),
        }
    }

    /// Render the template with `values` and run it.
    pub async fn run(
        &self,
        sql_template: &str,
        values: &HashMap<String, String>,
    ) -> Result<QueryResult, QueryError> {
        let sql = render_sql(sql_template, values)?;

        let session = self
            .sessions
            .active_session()
            .await?
            .ok_or(QueryError::NoSession)?;

        let statement = self.livy.submit_sql(session.id, &sql).await?;
        debug!(session_id = session.id, statement_id = statement.id, "Submitted SQL statement");

        let finished = self.wait_for(session.id, statement).await?;

        Ok(match (&finished.state, &finished.output) {
            (_, Some(output)) => interpret_output(output),
            (StatementState::Cancelled, None) => QueryResult::Failed {
                name: "Cancelled".to_string(),
                message: "The statement was cancelled".to_string(),
            },
            (StatementState::Error, None) => QueryResult::Failed {
                name: "Error".to_string(),
                message: "The statement failed without output".to_string(),
            },
            (_, None) => QueryResult::Text {
                text: String::new(),
            },
        })
    }

    async fn wait_for(&self, session_id: i64, mut statement: Statement) -> Result<Statement, QueryError> {
        let deadline = Instant::now() + self.timeout;

        while !statement.state.is_finished() {
            if Instant::now() >= deadline {
                if let Err(e) = self.livy.cancel_statement(session_id, statement.id).await {
                    warn!(session_id, statement_id = statement.id, "Failed to cancel timed out statement: {e}");
                }
                return Err(QueryError::Timeout(self.timeout.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;
            statement = self.livy.get_statement(session_id, statement.id).await?;
        }

        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(json: &str) -> StatementOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parameters_in_first_appearance_order() {
        let sql = "SELECT * FROM t WHERE day = '${day}' AND region = '${region}' OR day2 = '${day}'";
        assert_eq!(extract_parameters(sql), vec!["day", "region"]);
        assert!(extract_parameters("SELECT 1").is_empty());
        assert!(extract_parameters("SELECT '${not valid}'").is_empty());
    }

    #[test]
    fn render_substitutes_all_occurrences() {
        let values = HashMap::from([
            ("day".to_string(), "2024-01-01".to_string()),
            ("region".to_string(), "us".to_string()),
        ]);

        let sql = render_sql("SELECT ${day}, ${region}, ${day}", &values).unwrap();
        assert_eq!(sql, "SELECT 2024-01-01, us, 2024-01-01");
    }

    #[test]
    fn render_requires_every_parameter() {
        let values = HashMap::from([("day".to_string(), "x".to_string())]);
        let err = render_sql("SELECT ${day}, ${region}", &values).unwrap_err();
        assert!(matches!(err, QueryError::MissingParameter(ref name) if name == "region"));
    }

    #[test]
    fn table_output_is_flattened() {
        let result = interpret_output(&output(
            r#"{
                "status": "ok",
                "data": {
                    "application/json": {
                        "schema": {"type": "struct", "fields": [
                            {"name": "region", "type": "string"},
                            {"name": "total", "type": "long"}
                        ]},
                        "data": [["us", 10], ["eu", null]]
                    }
                }
            }"#,
        ));

        assert_eq!(
            result,
            QueryResult::Table {
                columns: vec!["region".to_string(), "total".to_string()],
                rows: vec![
                    vec!["us".to_string(), "10".to_string()],
                    vec!["eu".to_string(), String::new()],
                ],
            }
        );
    }

    #[test]
    fn error_and_text_outputs() {
        let failed = interpret_output(&output(
            r#"{"status": "error", "ename": "ParseException", "evalue": "bad syntax"}"#,
        ));
        assert_eq!(
            failed,
            QueryResult::Failed {
                name: "ParseException".to_string(),
                message: "bad syntax".to_string(),
            }
        );

        let text = interpret_output(&output(
            r#"{"status": "ok", "data": {"text/plain": "res0: Int = 1"}}"#,
        ));
        assert_eq!(
            text,
            QueryResult::Text {
                text: "res0: Int = 1".to_string()
            }
        );
    }
}
