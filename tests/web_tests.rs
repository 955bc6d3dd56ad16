mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{body_bytes, body_json, body_string, location, session_cookie, spawn_app};
use dataplate::constants::{audit, demo, roles};

#[tokio::test]
async fn version_is_public() {
    let app = spawn_app().await;

    let response = app.get("/version", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let body = body_string(response).await;
    assert_eq!(body, format!("Version: {}", env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn pages_redirect_anonymous_visitors_to_login() {
    let app = spawn_app().await;

    for uri in ["/", "/home", "/datasets", "/accesskey", "/current_session", "/report"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login", "{uri}");
    }

    let response = app.get("/datasets", None).await;
    let cookie = session_cookie(&response).unwrap();
    let page = body_string(app.get("/login", Some(&cookie)).await).await;
    assert!(page.contains("Please log in to access this page."));
}

#[tokio::test]
async fn demo_login_logout_flow() {
    let app = spawn_app().await;
    let cookie = app.login().await;

    let response = app.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("You have successfully logged in."));
    assert!(page.contains(demo::DISPLAY_NAME));

    // Flash messages are shown once.
    let page = body_string(app.get("/home", Some(&cookie)).await).await;
    assert!(!page.contains("You have successfully logged in."));

    let response = app.get("/login", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = app.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = app.get("/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let actions = app
        .state
        .store()
        .recent_actions(demo::USERNAME, 10)
        .await
        .unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action, audit::LOGIN);
}

#[tokio::test]
async fn wrong_credentials_rerender_the_form() {
    let app = spawn_app().await;

    let response = app
        .post_form("/login", "username=demo%40dataplate.io&password=nope", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("Wrong user/password combination!"));
    assert!(page.contains(r#"value="demo@dataplate.io""#));

    let response = app.post_form("/login", "username=&password=", None).await;
    let page = body_string(response).await;
    assert!(page.contains("Username: This field is required."));
    assert!(page.contains("Password: This field is required."));

    assert!(
        app.state
            .store()
            .get_user_by_username(demo::USERNAME)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn datasets_are_listed_by_name() {
    let app = spawn_app().await;
    let store = app.state.store();
    store
        .add_dataset("zeta_events", "s3a://lake/zeta", "parquet", None)
        .await
        .unwrap();
    store
        .add_dataset("alpha_users", "s3a://lake/alpha", "delta", Some("<b>users</b>"))
        .await
        .unwrap();

    let cookie = app.login().await;
    let page = body_string(app.get("/datasets", Some(&cookie)).await).await;

    let alpha = page.find("alpha_users").unwrap();
    let zeta = page.find("zeta_events").unwrap();
    assert!(alpha < zeta);
    assert!(page.contains("&lt;b&gt;users&lt;/b&gt;"));
}

#[tokio::test]
async fn reports_require_a_role() {
    let app = spawn_app().await;
    let cookie = app.login().await;

    let response = app.get("/report", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.get("/report_file?file=a.html", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.state
        .store()
        .grant_role(demo::USERNAME, roles::REPORT_VIEWER)
        .await
        .unwrap();

    let response = app.get("/report", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn report_browser_and_file_access() {
    let app = spawn_app().await;
    let reports = app.reports_dir();
    std::fs::create_dir_all(reports.join("region=us").join("env=prod")).unwrap();
    std::fs::write(reports.join("a.html"), "<h1>Top level</h1>").unwrap();
    std::fs::write(
        reports.join("region=us").join("env=prod").join("daily.html"),
        "<h1>Daily</h1>",
    )
    .unwrap();

    let cookie = app.login().await;
    app.state
        .store()
        .grant_role(demo::USERNAME, roles::ADMIN)
        .await
        .unwrap();

    let page = body_string(app.get("/report?region=us", Some(&cookie)).await).await;
    assert!(page.contains(r#"href="/report?region=us&amp;env=prod""#));
    assert!(!page.contains("/report?region=us&amp;region="));

    let response = app.get("/report_file?file=a.html", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    assert_eq!(body_string(response).await, "<h1>Top level</h1>");

    let response = app
        .get(
            "/report_file?file=%2Fregion%3Dus%2Fenv%3Dprod%2Fdaily.html",
            Some(&cookie),
        )
        .await;
    assert_eq!(body_string(response).await, "<h1>Daily</h1>");

    let response = app.get("/report_file", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .get("/report_file?file=..%2Fdataplate.db", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/report_file?file=missing.html", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/report?region=..", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let actions = app
        .state
        .store()
        .recent_actions(demo::USERNAME, 10)
        .await
        .unwrap();
    assert!(
        actions
            .iter()
            .any(|a| a.action == audit::VIEW_REPORT && a.details.as_deref() == Some("a.html"))
    );
}

#[tokio::test]
async fn latin1_reports_are_served_byte_for_byte() {
    let app = spawn_app().await;
    let latin1: &[u8] = b"<meta charset=\"iso-8859-1\"><h1>Caf\xe9</h1>";
    std::fs::write(app.reports_dir().join("latin1.html"), latin1).unwrap();

    let cookie = app.login().await;
    app.state
        .store()
        .grant_role(demo::USERNAME, roles::ADMIN)
        .await
        .unwrap();

    let response = app.get("/report_file?file=latin1.html", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, latin1);
}

#[tokio::test]
async fn access_key_api() {
    let app = spawn_app().await;
    app.state
        .store()
        .add_dataset("events", "s3a://lake/events", "parquet", None)
        .await
        .unwrap();

    let response = app.get("/api/datasets", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);

    let response = app
        .send(
            Request::builder()
                .uri("/api/datasets")
                .header("X-Api-Key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = app.login().await;
    let page = body_string(app.get("/accesskey", Some(&cookie)).await).await;
    assert!(page.contains("No access key has been generated yet."));

    let response = app.post_form("/accesskey", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("Private access key has been regenerated!"));

    let key = app
        .state
        .store()
        .get_user_by_username(demo::USERNAME)
        .await
        .unwrap()
        .unwrap()
        .access_key
        .unwrap();
    assert_eq!(key.len(), 64);
    assert!(page.contains(&key));

    for (name, value) in [
        ("X-Api-Key", key.clone()),
        ("Authorization", format!("Bearer {key}")),
    ] {
        let response = app
            .send(
                Request::builder()
                    .uri("/api/datasets")
                    .header(name, value)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["name"], "events");
    }

    // Regenerating invalidates the previous key.
    app.post_form("/accesskey", "", Some(&cookie)).await;
    let response = app
        .send(
            Request::builder()
                .uri("/api/datasets")
                .header("X-Api-Key", key)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn query_form_lists_parameters() {
    let app = spawn_app().await;
    let query = app
        .state
        .store()
        .add_query(
            "Daily totals",
            "SELECT * FROM t WHERE day = '${day}' AND region = '${region}'",
            None,
        )
        .await
        .unwrap();

    let cookie = app.login().await;

    let response = app.get("/query/9999/run", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = body_string(
        app.get(&format!("/query/{}/run", query.id), Some(&cookie))
            .await,
    )
    .await;
    assert!(page.contains(r#"name="day""#));
    assert!(page.contains(r#"name="region""#));
    assert!(page.contains("Daily totals"));
}

#[tokio::test]
async fn static_assets_are_embedded() {
    let app = spawn_app().await;

    let response = app.get("/static/style.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

    let response = app.get("/static/missing.js", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = spawn_app().await;

    let response = app.get("/login", None).await;
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("content-security-policy"));
}
