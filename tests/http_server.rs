//! HTTP front-end tests driving the axum server with reqwest.

use std::time::Duration;

use axum::http::StatusCode;

mod common;

const APP: &str = r#"
[[filters]]
name = "Logger"
class = "request-log"

[[filters]]
name = "Auth"
class = "require-header"
init_params = { header = "x-admin", status = "403" }

[[filters]]
name = "Powered"
class = "response-header"
init_params = { name = "x-powered-by", value = "filter-pipeline" }

[[filter_mappings]]
filter_name = "Logger"
url_patterns = ["/*"]

[[filter_mappings]]
filter_name = "Auth"
servlet_names = ["AdminServlet"]

[[filter_mappings]]
filter_name = "Powered"
url_patterns = ["*.html"]

[[servlets]]
name = "AdminServlet"
class = "static-text"
url_patterns = ["/admin/*"]
init_params = { body = "admin console" }

[[servlets]]
name = "echo"
class = "echo"
url_patterns = ["/echo/*", "*.html"]

[[servlets]]
name = "async"
class = "async-echo"
url_patterns = ["/async/*"]
async_supported = true

[[servlets]]
name = "failing"
class = "failing"
url_patterns = ["/fail"]
"#;

#[tokio::test]
async fn test_echo_through_filters() {
    let server = common::start_server(APP).await;
    let client = common::client();

    let res = client
        .post(server.url("/echo/hello?x=1"))
        .header("x-request-id", "req-42")
        .body("payload")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "req-42");
    assert!(res.headers().get("x-powered-by").is_none());
    assert_eq!(res.text().await.unwrap(), "POST /echo/hello dispatcher=REQUEST\npayload");

    let res = client.get(server.url("/pages/index.html")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-powered-by"], "filter-pipeline");
    assert!(res.headers().contains_key("x-request-id"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_filter_short_circuit_status() {
    let server = common::start_server(APP).await;
    let client = common::client();

    let res = client.get(server.url("/admin/panel")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.text().await.unwrap(), "missing required header: x-admin\n");

    let res = client
        .get(server.url("/admin/panel"))
        .header("x-admin", "yes")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "admin console");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_error_statuses() {
    let server = common::start_server(APP).await;
    let client = common::client();

    let res = client.get(server.url("/unmapped")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/fail")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_async_resumption_over_http() {
    let server = common::start_server(APP).await;
    let res = common::client().get(server.url("/async/job")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "resumed /async/job\n");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_config_update_is_applied() {
    let server = common::start_server(APP).await;
    let client = common::client();

    let res = client.get(server.url("/unmapped")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server
        .config_updates
        .send(common::config(
            r#"
            default_servlet = "static"

            [[servlets]]
            name = "static"
            class = "static-text"
            init_params = { body = "reloaded" }
            "#,
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = client.get(server.url("/unmapped")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "reloaded");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let server = common::start_server(APP).await;
    server.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop");
    assert!(result.unwrap().is_ok());
}
