//! End-to-end dispatch through the kernel with the in-memory transport.

mod common;

use std::sync::Arc;
use std::thread;

use axum::http::StatusCode;
use serde_json::{json, Value};

use portkernel::http::{Request, Verb};
use portkernel::lifecycle::{HaltFlag, HaltNotice};
use portkernel::metadata::{DocMeta, HandlerMeta, MethodMeta};
use portkernel::pipeline::{BootError, Flow, KernelBuilder};
use portkernel::port::{Output, PortTable};
use portkernel::routing::ListFilter;

use common::{config, kernel, kernel_with, metas, ACCOUNT, ARTICLE};

/// The `[trace_id, ...]` detail of an error body, whatever the envelope.
fn detail(body: &Value) -> Vec<Value> {
    let detail = match body {
        Value::Array(parts) => parts[2].clone(),
        Value::Object(map) => map["more"].clone(),
        _ => Value::Null,
    };
    detail.as_array().cloned().unwrap_or_default()
}

#[test]
fn test_exact_route_beats_parameterized() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::get("/v1/articles/latest"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json(), json!({"latest": true}));

    let sent = kernel.dispatch(Request::get("/v1/articles/12"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json(), json!({"id": 12}));
}

#[test]
fn test_multi_parameter_route() {
    let sent = kernel().dispatch(Request::get("/v1/articles/7/comments/9/"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json(), json!({"id": "7", "cid": "9"}));
}

#[test]
fn test_literal_question_mark_is_a_parameter_value() {
    let kernel = kernel();

    let found = kernel.registry().find("/v1/articles/?", Verb::Get).unwrap();
    assert_eq!(found.route.method, "show");
    assert_eq!(found.route.params.get("id"), Some("?"));

    let sent = kernel.dispatch(Request::get("/v1/articles/?"));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail(&sent.json())[1]["rule"], json!("TYPE"));

    let sent = kernel.dispatch(Request::get("/v1/articles/?/comments/?"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json(), json!({"id": "?", "cid": "?"}));
}

#[test]
fn test_suffix_selects_output_mime() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::get("/v1/articles/12.xml"));
    assert_eq!(sent.status, StatusCode::OK);
    assert!(sent.headers["content-type"].starts_with("application/xml"));
    assert!(sent.body.contains("<id>12</id>"));

    // html is not among the route's suffixes: the whole match fails.
    let sent = kernel.dispatch(Request::get("/v1/articles/12.html"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_suffix_rejection_stops_at_first_candidate() {
    const DOCS: &str = "Demo\\Port\\Doc";
    let meta = HandlerMeta::port(
        DOCS,
        "demo",
        DocMeta::new().with("ROUTE", "docs").with("VERB", "GET"),
    )
    .method(
        MethodMeta::new(
            "view",
            DocMeta::new()
                .with("TITLE", "View a doc")
                .with("ROUTE", "{id}/view")
                .with("SUFFIX", "json"),
        )
        .param("id"),
    )
    .method(
        MethodMeta::new(
            "part",
            DocMeta::new()
                .with("TITLE", "One part of a doc")
                .with("ROUTE", "{id}/{part}")
                .with("SUFFIX", "xml"),
        )
        .param("id")
        .param("part"),
    );
    let mut table = PortTable::new();
    table
        .register(DOCS, "view", |_, args| Ok(Flow::Next(Output::Data(json!({ "id": args[0] })))))
        .register(DOCS, "part", |_, args| {
            Ok(Flow::Next(Output::Data(json!({ "id": args[0], "part": args[1] }))))
        });
    let kernel = KernelBuilder::new(&config())
        .halt(Arc::new(HaltFlag::new()))
        .build(&[meta], table)
        .expect("doc metadata assembles");

    let sent = kernel.dispatch(Request::get("/docs/7/view.json"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json(), json!({"id": "7"}));

    let sent = kernel.dispatch(Request::get("/docs/7/intro.xml"));
    assert_eq!(sent.status, StatusCode::OK);
    assert!(sent.body.contains("<part>intro</part>"));

    // `docs/{id}/view` is tried first and refuses xml. `docs/{id}/{part}`
    // would accept it but is never consulted.
    assert!(kernel.registry().find("/docs/7/view.xml", Verb::Get).is_none());
    let sent = kernel.dispatch(Request::get("/docs/7/view.xml"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_unknown_route_is_404() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::get("/v1/nothing"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
    let body = sent.json();
    assert_eq!(body[0], json!(404));
    assert_eq!(body[1], json!("ROUTE_NOT_FOUND"));
    let detail = detail(&body);
    assert_eq!(detail.len(), 2);
    assert_eq!(detail[1], json!({"verb": "GET", "path": "/v1/nothing"}));

    // Verb bound elsewhere, and a method the kernel does not route.
    let sent = kernel.dispatch(Request::new(Some(Verb::Delete), "/v1/articles"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
    let sent = kernel.dispatch(Request::new(None, "/v1/articles"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_pagination_and_classic_wrapout() {
    let sent = kernel().dispatch(
        Request::get("/v1/articles")
            .with_query("__paginate_size", "2")
            .with_query("__paginate_page", "2"),
    );
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(
        sent.json(),
        json!({
            "code": 0,
            "info": "ok",
            "data": [
                {"id": 3, "title": "Article 3"},
                {"id": 4, "title": "Article 4"},
            ],
            "paginator": {"page": 2, "size": 2, "count": 2, "total": 5},
        })
    );
}

#[test]
fn test_global_pipe_is_merged_into_every_port() {
    let kernel = kernel();

    // `sorting` comes from the global domain; demo wraps errors with classic.
    let sent = kernel.dispatch(Request::get("/v1/articles").with_query("__sort_field", "title"));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    let body = sent.json();
    assert_eq!(body["code"], json!(400));
    assert_eq!(body["info"], json!("INVALID_SORTING_FIELD"));
    assert_eq!(detail(&body)[1]["allow"], json!(["created_at"]));

    // A compatible alias of an allowed property is accepted.
    let sent = kernel.dispatch(Request::get("/v1/articles").with_query("__sort", "field:ctime,order:desc"));
    assert_eq!(sent.status, StatusCode::OK);

    // billing has no local WRAPERR and neither has the global domain.
    let sent = kernel.dispatch(Request::get("/accounts").with_query("__sort_field", "x"));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert_eq!(sent.json()[1], json!("INVALID_SORTING_FIELD"));
}

#[test]
fn test_nopipein_excludes_merged_pipe() {
    let sent = kernel().dispatch(Request::get("/v1/articles/latest").with_query("__sort_field", "anything"));
    assert_eq!(sent.status, StatusCode::OK);
}

#[test]
fn test_validation_failure_is_400() {
    let sent = kernel().dispatch(Request::get("/v1/articles/abc"));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    let body = sent.json();
    assert_eq!(body["info"], json!("VALIDATION_FAILED"));
    let failure = &detail(&body)[1];
    assert_eq!(failure["argument"], json!("id"));
    assert_eq!(failure["rule"], json!("TYPE"));
}

#[test]
fn test_create_checks_mime_rules_and_status() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::post("/v1/articles").with_json(json!({"title": "Hello"})));
    assert_eq!(sent.status, StatusCode::CREATED);
    assert_eq!(sent.json(), json!({"title": "Hello"}));

    let mut body = serde_json::Map::new();
    body.insert("title".to_string(), json!("Hello"));
    let sent = kernel.dispatch(Request::post("/v1/articles").with_body_map(body));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert_eq!(sent.json()["info"], json!("INVALID_REQUEST_MIME"));

    let sent = kernel.dispatch(Request::post("/v1/articles").with_json(json!({"title": "Hi"})));
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail(&sent.json())[1]["rule"], json!("MIN"));

    // title is read from the body only.
    let sent = kernel.dispatch(
        Request::post("/v1/articles")
            .with_json(json!({}))
            .with_query("title", "Hello"),
    );
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail(&sent.json())[1]["rule"], json!("NEED"));
}

#[test]
fn test_panic_becomes_invoke_exception() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::get("/v1/articles/boom"));
    assert_eq!(sent.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = sent.json();
    assert_eq!(body["info"], json!("INVOKE_EXCEPTION"));
    assert_eq!(detail(&body).len(), 1);

    // With a debug key the cause is included.
    let sent = kernel.dispatch(Request::get("/v1/articles/boom").with_header("X-Debug-Key", "letmein"));
    let detail = detail(&sent.json());
    assert_eq!(detail.len(), 2);
    assert!(detail[1].as_str().unwrap().contains("handler exploded"));
}

#[test]
fn test_handler_error_becomes_invoke_exception() {
    let sent = kernel().dispatch(Request::get("/v1/articles/broken"));
    assert_eq!(sent.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sent.json()["info"], json!("INVOKE_EXCEPTION"));
}

#[test]
fn test_handler_short_circuit_keeps_its_response() {
    let sent = kernel().dispatch(Request::get("/v1/articles/gone"));
    assert_eq!(sent.status, StatusCode::GONE);
    assert_eq!(sent.json(), json!("moved away"));
}

#[test]
fn test_halt_answers_503_for_routed_requests() {
    let halt = Arc::new(HaltFlag::new());
    let kernel = kernel_with(&config(), halt.clone());

    halt.set(Some(HaltNotice {
        since: "2026-01-01T00:00:00Z".to_string(),
        message: "Maintenance".to_string(),
    }));
    let sent = kernel.dispatch(Request::get("/v1/articles"));
    assert_eq!(sent.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = sent.json();
    assert_eq!(body["info"], json!("Maintenance"));
    assert_eq!(detail(&body)[1], json!({"since": "2026-01-01T00:00:00Z"}));

    // Unrouted requests still get 404.
    let sent = kernel.dispatch(Request::get("/v1/nothing"));
    assert_eq!(sent.status, StatusCode::NOT_FOUND);

    halt.set(None);
    let sent = kernel.dispatch(Request::get("/v1/articles"));
    assert_eq!(sent.status, StatusCode::OK);
}

#[test]
fn test_cors_preflight_short_circuits_options() {
    let kernel = kernel();

    let sent = kernel.dispatch(Request::new(Some(Verb::Options), "/anything/at/all"));
    assert_eq!(sent.status, StatusCode::NO_CONTENT);
    assert_eq!(sent.headers["access-control-allow-origin"], "https://example.test");
    assert!(sent.body.is_empty());

    // Other verbs carry the headers and continue.
    let sent = kernel.dispatch(Request::get("/v1/articles/latest"));
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.headers["access-control-allow-origin"], "https://example.test");
}

#[test]
fn test_requests_are_isolated() {
    let kernel = kernel();

    let failed = kernel.dispatch(Request::get("/v1/articles/boom"));
    let ok = kernel.dispatch(Request::get("/v1/articles/latest"));
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json(), json!({"latest": true}));
}

#[test]
fn test_concurrent_dispatch() {
    let kernel = Arc::new(kernel());

    let workers: Vec<_> = (1..=8)
        .map(|id| {
            let kernel = kernel.clone();
            thread::spawn(move || kernel.dispatch(Request::get(&format!("/v1/articles/{id}"))))
        })
        .collect();

    for (id, worker) in (1..=8).zip(workers) {
        let sent = worker.join().unwrap();
        assert_eq!(sent.status, StatusCode::OK);
        assert_eq!(sent.json(), json!({ "id": id }));
    }
}

#[test]
fn test_boot_errors() {
    let config = config();

    let mut partial = PortTable::new();
    partial
        .register(ARTICLE, "list", |_, _| unreachable!())
        .register(ACCOUNT, "summary", |_, _| unreachable!());
    let Err(err) = KernelBuilder::new(&config).build(&metas(), partial) else {
        panic!("kernel built without every handler");
    };
    assert!(matches!(err, BootError::HandlerMissing(_)));

    let mut config = config.clone();
    config.kernel.preflight.push("firewall".to_string());
    let Err(err) = KernelBuilder::new(&config)
        .halt(Arc::new(HaltFlag::new()))
        .build(&metas(), common::handlers())
    else {
        panic!("kernel built with an unknown preflight");
    };
    assert!(matches!(err, BootError::PreflightNotExists(name) if name == "firewall"));
}

#[test]
fn test_registry_projections() {
    let kernel = kernel();
    let registry = kernel.registry();

    assert!(registry.port(ARTICLE, "_helper").is_none());
    assert_eq!(registry.port_count(), 9);

    let demo = registry.list(&ListFilter {
        domains: vec!["demo".to_string()],
        ..ListFilter::default()
    });
    assert_eq!(demo.len(), 8);
    let unversioned = registry.list(&ListFilter {
        versions: vec!["_".to_string()],
        ..ListFilter::default()
    });
    assert_eq!(unversioned.len(), 1);
    assert_eq!(unversioned[0].route, "/accounts");

    let docs = registry.docs(&config());
    assert_eq!(docs["v1"]["demo"].title, "Demo");
    assert_eq!(docs["_"]["billing"].title, "billing");
}
