//! Container-level tests: resolution, dispatch, async, pooling, reload.

use filter_pipeline::chain::{last_serviced_request, ChainError, ServletRequest, ServletResponse};
use filter_pipeline::container::{DispatchTarget, ServiceError};
use filter_pipeline::routing::DispatcherType;

mod common;

const ADMIN: &str = r#"
default_servlet = "echo"

[[filters]]
name = "Logger"
class = "request-log"

[[filters]]
name = "Auth"
class = "require-header"
init_params = { header = "x-admin" }

[[filter_mappings]]
filter_name = "Logger"
url_patterns = ["/*"]

[[filter_mappings]]
filter_name = "Auth"
servlet_names = ["AdminServlet"]

[[servlets]]
name = "AdminServlet"
class = "static-text"
url_patterns = ["/admin/*"]
init_params = { body = "admin console" }

[[servlets]]
name = "echo"
class = "echo"
"#;

#[test]
fn test_logger_then_auth_for_admin_servlet() {
    let pipeline = common::pipeline(ADMIN);
    let registry = pipeline.registry();
    let request = ServletRequest::builder("GET", "/admin/users").build();

    let admin = registry.map_servlet("/admin/users").unwrap();
    let chain = pipeline.create_filter_chain(&request, &admin);
    assert_eq!(chain.filter_names(), vec!["Logger", "Auth"]);

    let echo = registry.find_wrapper("echo").unwrap();
    let chain = pipeline.create_filter_chain(&request, &echo);
    assert_eq!(chain.filter_names(), vec!["Logger"]);
}

#[test]
fn test_auth_short_circuits_without_header() {
    let pipeline = common::pipeline(ADMIN);

    let denied = common::service(&pipeline, &ServletRequest::builder("GET", "/admin/users").build());
    assert_eq!(denied.status(), 401);
    assert_eq!(common::body(&denied), "missing required header: x-admin\n");

    let allowed = common::service(
        &pipeline,
        &ServletRequest::builder("GET", "/admin/users").header("x-admin", "1").build(),
    );
    assert_eq!(allowed.status(), 200);
    assert_eq!(common::body(&allowed), "admin console");
}

#[test]
fn test_default_servlet_and_not_found() {
    let pipeline = common::pipeline(ADMIN);
    let response = common::service(&pipeline, &ServletRequest::builder("POST", "/anything").body("hi").build());
    assert_eq!(common::body(&response), "POST /anything dispatcher=REQUEST\nhi");

    let pipeline = common::pipeline(
        r#"
        [[servlets]]
        name = "echo"
        class = "echo"
        url_patterns = ["/echo/*"]
        "#,
    );
    let request = ServletRequest::builder("GET", "/nowhere").build();
    let err = pipeline.service(&request, &ServletResponse::new()).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(path) if path == "/nowhere"));
}

const FORWARD: &str = r#"
[[filters]]
name = "RequestTag"
class = "response-header"
init_params = { name = "x-request-filter", value = "yes" }

[[filters]]
name = "ForwardTag"
class = "response-header"
init_params = { name = "x-forward-filter", value = "yes" }

[[filter_mappings]]
filter_name = "RequestTag"
url_patterns = ["/*"]

[[filter_mappings]]
filter_name = "ForwardTag"
url_patterns = ["/echo/*"]
dispatchers = ["FORWARD", "INCLUDE"]

[[servlets]]
name = "forward"
class = "forwarding"
url_patterns = ["/go"]
init_params = { target = "/echo/target?from=go" }

[[servlets]]
name = "include"
class = "forwarding"
url_patterns = ["/inc"]
init_params = { target = "/echo/included", mode = "include" }

[[servlets]]
name = "echo"
class = "echo"
url_patterns = ["/echo/*"]
"#;

#[test]
fn test_forward_runs_forward_filters_against_target_path() {
    let pipeline = common::pipeline(FORWARD);
    let request = ServletRequest::builder("GET", "/go").build();
    let response = common::service(&pipeline, &request);

    assert_eq!(common::body(&response), "GET /go dispatcher=FORWARD\n");
    assert_eq!(response.header("x-request-filter").as_deref(), Some("yes"));
    assert_eq!(response.header("x-forward-filter").as_deref(), Some("yes"));
    assert_eq!(request.dispatcher_type(), DispatcherType::Request);
    assert_eq!(request.dispatch_path().as_deref(), Some("/go"));
}

#[test]
fn test_include_appends_to_response() {
    let pipeline = common::pipeline(FORWARD);
    let response = ServletResponse::new();
    response.write_str("before|").unwrap();
    let request = ServletRequest::builder("GET", "/inc").build();
    pipeline.service(&request, &response).unwrap();

    assert_eq!(common::body(&response), "before|GET /inc dispatcher=INCLUDE\n");
}

#[test]
fn test_request_filters_skip_internal_dispatch() {
    let pipeline = common::pipeline(FORWARD);
    let request = ServletRequest::builder("GET", "/echo/direct").build();
    pipeline.service(&request, &ServletResponse::new()).unwrap();

    let response = ServletResponse::new();
    pipeline
        .dispatch(&request, &response, DispatcherType::Error, DispatchTarget::Named("echo".into()))
        .unwrap();
    assert_eq!(common::body(&response), "GET /echo/direct dispatcher=ERROR\n");
    assert!(response.header("x-request-filter").is_none());
    assert!(response.header("x-forward-filter").is_none());
}

#[test]
fn test_forwarding_cycle_fails_the_request() {
    let pipeline = common::pipeline(
        r#"
        [[servlets]]
        name = "ping"
        class = "forwarding"
        url_patterns = ["/ping"]
        init_params = { target = "/pong" }

        [[servlets]]
        name = "pong"
        class = "forwarding"
        url_patterns = ["/pong"]
        init_params = { target = "/ping?again=1" }

        [[servlets]]
        name = "loop"
        class = "forwarding"
        url_patterns = ["/loop"]
        init_params = { target = "/loop" }
        "#,
    );

    for path in ["/loop", "/ping"] {
        let request = ServletRequest::builder("GET", path).build();
        let err = pipeline.service(&request, &ServletResponse::new()).unwrap_err();
        match err {
            ServiceError::Chain(ChainError::Runtime(message)) => assert!(message.contains("nested more than"), "{message}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(request.dispatch_depth(), 0);
        assert_eq!(request.dispatcher_type(), DispatcherType::Request);
    }

    // the pipeline keeps serving after a runaway request
    let request = ServletRequest::builder("GET", "/loop").build();
    assert!(pipeline.service(&request, &ServletResponse::new()).is_err());
}

const ASYNC: &str = r#"
[[servlets]]
name = "async"
class = "async-echo"
url_patterns = ["/async/*"]
async_supported = true

[[servlets]]
name = "sync"
class = "async-echo"
url_patterns = ["/sync/*"]
"#;

#[test]
fn test_async_request_is_resumed() {
    let pipeline = common::pipeline(ASYNC);
    let request = ServletRequest::builder("GET", "/async/job").async_supported(true).build();
    let response = common::service(&pipeline, &request);

    assert_eq!(common::body(&response), "resumed /async/job\n");
    assert!(!request.is_async_started());
    assert_eq!(request.dispatcher_type(), DispatcherType::Request);
}

#[test]
fn test_start_async_refused_by_servlet() {
    let pipeline = common::pipeline(ASYNC);
    let request = ServletRequest::builder("GET", "/sync/job").async_supported(true).build();
    let err = pipeline.service(&request, &ServletResponse::new()).unwrap_err();

    match err {
        ServiceError::Chain(ChainError::Runtime(message)) => assert!(message.ends_with("[async-echo]"), "{message}"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!request.is_async_supported());
}

#[test]
fn test_non_async_filter_downgrade_is_sticky() {
    let toml = format!(
        r#"
        [[filters]]
        name = "Blocking"
        class = "response-header"
        async_supported = false
        init_params = {{ name = "x-blocking", value = "1" }}

        [[filter_mappings]]
        filter_name = "Blocking"
        url_patterns = ["/async/*"]
        {ASYNC}
        "#
    );
    let pipeline = common::pipeline(&toml);
    let request = ServletRequest::builder("GET", "/async/job").async_supported(true).build();
    let err = pipeline.service(&request, &ServletResponse::new()).unwrap_err();

    match err {
        ServiceError::Chain(ChainError::Runtime(message)) => {
            assert!(message.contains("[response-header]"), "{message}")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!request.is_async_supported());
}

#[test]
fn test_chains_are_pooled_per_servlet() {
    let pipeline = common::pipeline(ADMIN);
    for _ in 0..3 {
        common::service(&pipeline, &ServletRequest::builder("GET", "/x").build());
    }
    assert_eq!(pipeline.pool().idle_count("echo"), 1);
    assert_eq!(pipeline.pool().idle_count("AdminServlet"), 0);
}

#[test]
fn test_privileged_execution_wraps_failures_and_disables_pooling() {
    let pipeline = common::pipeline(
        r#"
        default_servlet = "failing"

        [security]
        privileged_execution = true

        [[servlets]]
        name = "failing"
        class = "failing"
        "#,
    );
    let request = ServletRequest::builder("GET", "/").build();
    let err = pipeline.service(&request, &ServletResponse::new()).unwrap_err();

    match err {
        ServiceError::Chain(ChainError::Servlet(e)) => {
            assert_eq!(e.message(), "Servlet execution threw an exception");
            assert!(e.root_cause().unwrap().to_string().contains("backend exploded"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pipeline.pool().idle_count("failing"), 0);
}

#[test]
fn test_unexpected_servlet_failure_is_wrapped() {
    let pipeline = common::pipeline(
        r#"
        default_servlet = "failing"

        [[servlets]]
        name = "failing"
        class = "failing"
        "#,
    );
    let err = pipeline
        .service(&ServletRequest::builder("GET", "/").build(), &ServletResponse::new())
        .unwrap_err();
    match err {
        ServiceError::Chain(ChainError::Servlet(e)) => assert_eq!(e.message(), "Servlet execution threw an exception"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_last_serviced_tracking() {
    let tracked = r#"
        default_servlet = "tracking"

        [isolation]
        track_last_serviced = true

        [[servlets]]
        name = "tracking"
        class = "tracking"
    "#;
    let pipeline = common::pipeline(tracked);
    let response = common::service(&pipeline, &ServletRequest::builder("GET", "/").build());
    assert_eq!(common::body(&response), "tracked=true");
    assert!(last_serviced_request().is_none());

    pipeline
        .reload(&common::config(&tracked.replace("track_last_serviced = true", "track_last_serviced = false")))
        .unwrap();
    let response = common::service(&pipeline, &ServletRequest::builder("GET", "/").build());
    assert_eq!(common::body(&response), "tracked=false");
}

#[test]
fn test_reload_swaps_registry() {
    let pipeline = common::pipeline(ADMIN);
    let before = pipeline.registry();

    pipeline
        .reload(&common::config(
            r#"
            default_servlet = "static"

            [[servlets]]
            name = "static"
            class = "static-text"
            init_params = { body = "reloaded" }
            "#,
        ))
        .unwrap();

    let response = common::service(&pipeline, &ServletRequest::builder("GET", "/admin/users").build());
    assert_eq!(common::body(&response), "reloaded");
    // snapshots taken before the reload are untouched
    assert!(before.find_wrapper("AdminServlet").is_some());
    assert_eq!(pipeline.pool().idle_count("echo"), 0);
}

#[test]
fn test_mapping_to_undefined_filter_is_skipped() {
    let pipeline = common::pipeline(
        r#"
        default_servlet = "echo"

        [[filter_mappings]]
        filter_name = "Ghost"
        url_patterns = ["/*"]

        [[servlets]]
        name = "echo"
        class = "echo"
        "#,
    );
    let response = common::service(&pipeline, &ServletRequest::builder("GET", "/a").build());
    assert_eq!(common::body(&response), "GET /a dispatcher=REQUEST\n");
}
