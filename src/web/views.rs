//! Server-side HTML rendering.
//!
//! Every value coming from users, the database or the filesystem goes
//! through [`text`] or [`attr`] before it reaches the markup.

use std::collections::HashMap;
use std::fmt::Write;

use axum::http::StatusCode;
use axum::response::Html;
use html_escape::{encode_double_quoted_attribute, encode_text};

use tower_sessions::Session;

use super::flash::{Flash, take_flashes};
use crate::db::{Dataset, SavedQuery, User};
use crate::services::{FacetFilter, QueryResult, ReportListing, SessionStatus};

fn text(s: &str) -> std::borrow::Cow<'_, str> {
    encode_text(s)
}

fn attr(s: &str) -> std::borrow::Cow<'_, str> {
    encode_double_quoted_attribute(s)
}

/// Per-request data every page needs.
#[derive(Debug, Default)]
pub struct PageContext {
    pub user: Option<User>,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    /// Consumes the pending flash messages of the session.
    pub async fn load(session: &Session, user: Option<User>) -> Self {
        Self {
            user,
            flashes: take_flashes(session).await,
        }
    }
}

fn navigation(user: Option<&User>) -> String {
    let Some(user) = user else {
        return String::from(r#"<nav><a href="/login">Log in</a></nav>"#);
    };

    format!(
        concat!(
            r#"<nav><a href="/">Home</a> <a href="/datasets">Datasets</a> "#,
            r#"<a href="/report">Reports</a> <a href="/current_session">Session</a> "#,
            r#"<a href="/accesskey">Access key</a> <a href="/apidoc">API</a> "#,
            r#"<span class="user">{}</span> <a href="/logout">Log out</a></nav>"#
        ),
        text(&user.fullname)
    )
}

fn layout(ctx: &PageContext, title: &str, body: &str) -> Html<String> {
    let mut flashes = String::new();
    for flash in &ctx.flashes {
        let _ = write!(
            flashes,
            r#"<div class="flash flash-{}">{}</div>"#,
            flash.category.as_str(),
            text(&flash.message)
        );
    }

    Html(format!(
        concat!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">",
            "<title>{title} - Dataplate</title>",
            "<link rel=\"stylesheet\" href=\"/static/style.css\"></head>",
            "<body>{nav}<main><h1>{title}</h1>{flashes}{body}</main></body></html>"
        ),
        title = text(title),
        nav = navigation(ctx.user.as_ref()),
        flashes = flashes,
        body = body,
    ))
}

#[must_use]
pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        &PageContext::default(),
        title,
        &format!(r#"<p class="error">{}</p>"#, text(message)),
    )
    .0
}

#[must_use]
pub fn login_page(ctx: &PageContext, username: &str) -> Html<String> {
    let body = format!(
        concat!(
            r#"<form method="post" action="/login" class="login">"#,
            r#"<label>Username <input name="username" value="{}" autofocus></label>"#,
            r#"<label>Password <input name="password" type="password"></label>"#,
            r#"<button type="submit">Log in</button></form>"#
        ),
        attr(username)
    );
    layout(ctx, "Log in", &body)
}

#[must_use]
pub fn index_page(ctx: &PageContext) -> Html<String> {
    let name = ctx.user.as_ref().map_or("", |u| u.fullname.as_str());
    let body = format!(
        concat!(
            "<p>Welcome, {}.</p><ul>",
            r#"<li><a href="/datasets">Browse datasets</a></li>"#,
            r#"<li><a href="/report">Browse reports</a></li>"#,
            r#"<li><a href="/current_session">Compute session status</a></li>"#,
            "</ul>"
        ),
        text(name)
    );
    layout(ctx, "Data Access", &body)
}

#[must_use]
pub fn access_key_page(ctx: &PageContext, access_key: Option<&str>) -> Html<String> {
    let key = access_key.map_or_else(
        || "<p>No access key has been generated yet.</p>".to_string(),
        |key| format!(r#"<p>Your access key: <code class="access-key">{}</code></p>"#, text(key)),
    );

    let body = format!(
        concat!(
            "{}",
            r#"<form method="post" action="/accesskey">"#,
            r#"<button type="submit">Regenerate access key</button></form>"#,
            "<p>Regenerating invalidates the previous key.</p>"
        ),
        key
    );
    layout(ctx, "Access Key", &body)
}

#[must_use]
pub fn datasets_page(ctx: &PageContext, datasets: &[Dataset]) -> Html<String> {
    if datasets.is_empty() {
        return layout(ctx, "Datasets", "<p>No datasets registered.</p>");
    }

    let mut rows = String::new();
    for dataset in datasets {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
            text(&dataset.name),
            text(dataset.description.as_deref().unwrap_or("")),
            text(&dataset.format),
            text(&dataset.location),
        );
    }

    let body = format!(
        concat!(
            "<table><thead><tr><th>Name</th><th>Description</th><th>Format</th>",
            "<th>Location</th></tr></thead><tbody>{}</tbody></table>"
        ),
        rows
    );
    layout(ctx, "Datasets", &body)
}

#[must_use]
pub fn api_doc_page(ctx: &PageContext) -> Html<String> {
    let body = concat!(
        "<p>API calls authenticate with your access key, sent either as an ",
        "<code>X-Api-Key</code> header or as <code>Authorization: Bearer &lt;key&gt;</code>. ",
        r#"Generate a key on the <a href="/accesskey">access key</a> page.</p>"#,
        "<h2>GET /api/datasets</h2>",
        "<p>Lists registered datasets ordered by name.</p>",
        "<pre>curl -H 'X-Api-Key: KEY' https://HOST/api/datasets</pre>",
        "<h2>POST /api/query/{id}/run</h2>",
        "<p>Runs a saved query on the current compute session. The JSON body maps ",
        "each <code>${parameter}</code> of the query to its value.</p>",
        "<pre>curl -H 'X-Api-Key: KEY' -H 'Content-Type: application/json' \\\n",
        "     -d '{\"day\": \"2024-01-01\"}' https://HOST/api/query/1/run</pre>",
        "<p>Responses are wrapped as <code>{\"success\": true, \"data\": ...}</code> ",
        "or <code>{\"success\": false, \"error\": \"...\"}</code>.</p>"
    );
    layout(ctx, "API Documentation", body)
}

#[must_use]
pub fn current_session_page(ctx: &PageContext, status: &SessionStatus) -> Html<String> {
    let session = status
        .session_id
        .map_or_else(|| "none".to_string(), |id| id.to_string());

    let body = format!(
        concat!(
            "<dl><dt>Session</dt><dd class=\"session-id\">{}</dd>",
            "<dt>State</dt><dd class=\"session-state\">{}</dd>",
            "<dt>Last checked</dt><dd>{}</dd></dl>",
            r#"<form method="post" action="/current_session">"#,
            r#"<button type="submit">Update session status</button></form>"#
        ),
        text(&session),
        text(status.state.as_deref().unwrap_or("unknown")),
        text(status.updated_at.as_deref().unwrap_or("never")),
    );
    layout(ctx, "Current Session", &body)
}

fn query_result_html(result: &QueryResult) -> String {
    match result {
        QueryResult::Table { columns, rows } => {
            let mut html = String::from("<table class=\"result\"><thead><tr>");
            for column in columns {
                let _ = write!(html, "<th>{}</th>", text(column));
            }
            html.push_str("</tr></thead><tbody>");
            for row in rows {
                html.push_str("<tr>");
                for cell in row {
                    let _ = write!(html, "<td>{}</td>", text(cell));
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody></table>");
            html
        }
        QueryResult::Text { text: output } => format!("<pre>{}</pre>", text(output)),
        QueryResult::Failed { name, message } => format!(
            r#"<p class="error"><strong>{}</strong>: {}</p>"#,
            text(name),
            text(message)
        ),
    }
}

#[must_use]
pub fn run_query_page(
    ctx: &PageContext,
    query: &SavedQuery,
    parameters: &[String],
    values: &HashMap<String, String>,
    result: Option<&QueryResult>,
) -> Html<String> {
    let mut inputs = String::new();
    for name in parameters {
        let value = values.get(name).map_or("", String::as_str);
        let _ = write!(
            inputs,
            r#"<label>{} <input name="{}" value="{}"></label>"#,
            text(name),
            attr(name),
            attr(value)
        );
    }

    let mut body = format!(
        concat!(
            "<p>{}</p><pre class=\"sql\">{}</pre>",
            r#"<form method="post" action="/query/{}/run">{}"#,
            r#"<button type="submit">Run</button></form>"#
        ),
        text(query.description.as_deref().unwrap_or("")),
        text(&query.sql),
        query.id,
        inputs
    );

    if let Some(result) = result {
        body.push_str("<h2>Result</h2>");
        body.push_str(&query_result_html(result));
    }

    layout(ctx, &query.name, &body)
}

fn report_query_string(filters: &[FacetFilter]) -> String {
    filters
        .iter()
        .map(|f| {
            format!(
                "{}={}",
                urlencoding::encode(&f.name),
                urlencoding::encode(&f.value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[must_use]
pub fn report_page(ctx: &PageContext, listing: &ReportListing) -> Html<String> {
    let mut body = String::new();

    if !listing.pinned.is_empty() {
        body.push_str("<h2>Filters</h2><ul class=\"pinned\">");
        for filter in &listing.pinned {
            let rest: Vec<FacetFilter> = listing
                .pinned
                .iter()
                .filter(|f| f.name != filter.name)
                .cloned()
                .collect();
            let _ = write!(
                body,
                r#"<li>{} = {} <a href="/report?{}">remove</a></li>"#,
                text(&filter.name),
                text(&filter.value),
                attr(&report_query_string(&rest))
            );
        }
        body.push_str("</ul>");
    }

    if !listing.facets.is_empty() {
        body.push_str("<h2>Narrow down</h2>");
        for (name, values) in &listing.facets {
            let _ = write!(body, "<div class=\"facet\"><h3>{}</h3><ul>", text(name));
            for value in values {
                let mut next = listing.pinned.clone();
                next.push(FacetFilter {
                    name: name.clone(),
                    value: value.clone(),
                });
                let _ = write!(
                    body,
                    r#"<li><a href="/report?{}">{}</a></li>"#,
                    attr(&report_query_string(&next)),
                    text(value)
                );
            }
            body.push_str("</ul></div>");
        }
    }

    body.push_str("<h2>Reports</h2>");
    if listing.files.is_empty() {
        body.push_str("<p>No reports at this level.</p>");
    } else {
        body.push_str("<ul class=\"reports\">");
        for file in &listing.files {
            let _ = write!(
                body,
                r#"<li><a href="/report_file?file={}">{}</a></li>"#,
                attr(&urlencoding::encode(file)),
                text(file)
            );
        }
        body.push_str("</ul>");
    }

    layout(ctx, "Reports", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn user_content_is_escaped() {
        let ctx = PageContext {
            user: None,
            flashes: vec![Flash {
                category: super::super::flash::Category::Danger,
                message: "<script>alert(1)</script>".to_string(),
            }],
        };

        let Html(page) = login_page(&ctx, "\"><b>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("flash-danger"));
        assert!(!page.contains("\"><b>"));
    }

    #[test]
    fn report_links_carry_current_filters() {
        let listing = ReportListing {
            files: vec!["region=us/daily report.html".to_string()],
            pinned: vec![FacetFilter {
                name: "region".to_string(),
                value: "us".to_string(),
            }],
            facets: BTreeMap::from([(
                "env".to_string(),
                BTreeSet::from(["prod".to_string()]),
            )]),
        };

        let Html(page) = report_page(&PageContext::default(), &listing);
        assert!(page.contains(r#"href="/report?region=us&amp;env=prod""#));
        assert!(page.contains("/report_file?file=region%3Dus%2Fdaily%20report.html"));
        assert!(page.contains(r#"<a href="/report?">remove</a>"#));
    }
}
