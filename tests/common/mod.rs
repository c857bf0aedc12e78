//! Shared fixtures for integration tests: a small article domain with
//! in-code handlers and a kernel builder that never touches the disk.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};

use portkernel::config::{parse_config, KernelConfig};
use portkernel::lifecycle::HaltFlag;
use portkernel::metadata::{DocMeta, HandlerMeta, MethodMeta};
use portkernel::pipeline::{Flow, Kernel, KernelBuilder};
use portkernel::port::{Output, Page, PortTable};

pub const ARTICLE: &str = "Demo\\Port\\Article";
pub const ACCOUNT: &str = "Demo\\Port\\Account";

/// Configuration used by most tests: cors preflight on, a domain-global
/// PIPEIN and a domain-local WRAPERR for `demo`.
pub const CONFIG: &str = r#"
[kernel]
preflight = ["cors", "debug"]
debug_keys = ["letmein"]

[cors]
allow_origin = ["https://example.test"]

[domain.port]
PIPEIN = "sorting"

[domains.demo]
title = "Demo"

[domains.demo.port]
WRAPERR = "classic"
"#;

pub fn config() -> KernelConfig {
    parse_config(CONFIG).expect("fixture config is valid")
}

pub fn article_meta() -> HandlerMeta {
    HandlerMeta::port(
        ARTICLE,
        "demo",
        DocMeta::new()
            .with("VERSION", "v1")
            .with("ROUTE", "articles")
            .with("VERB", "GET")
            .with("PIPEIN", "paginate"),
    )
    .property("id", DocMeta::new().with("TITLE", "Id").with("TYPE", "pint"))
    .property(
        "title",
        DocMeta::new()
            .with("TITLE", "Title")
            .with("TYPE", "string")
            .with("MIN", 3)
            .with("LOCATION", "BODY"),
    )
    .property(
        "created_at",
        DocMeta::new()
            .with("TITLE", "Created at")
            .with("TYPE", "uint")
            .with("COMPATIBLE", "ctime"),
    )
    .method(MethodMeta::new(
        "list",
        DocMeta::new()
            .with("TITLE", "List articles")
            .with("PIPEOUT", "response_support")
            .with("WRAPOUT", "classic")
            .with("CODEOK", 0)
            .with("INFOOK", "ok")
            .with_extra("PIPEIN", json!({"sorting": {"ALLOW": "created_at"}})),
    ))
    .method(MethodMeta::new(
        "latest",
        DocMeta::new()
            .with("TITLE", "Latest article")
            .with("ROUTE", "latest")
            .with("NOPIPEIN", "sorting"),
    ))
    .method(
        MethodMeta::new(
            "show",
            DocMeta::new()
                .with("TITLE", "Show article")
                .with("ROUTE", "{id}")
                .with("SUFFIX", "json,xml")
                .with("ARGUMENT", "id")
                .with_extra("ARGUMENT", json!({"id": {"NEED:0": ""}})),
        )
        .param("id"),
    )
    .method(
        MethodMeta::new(
            "comment",
            DocMeta::new()
                .with("TITLE", "Show comment")
                .with("ROUTE", "{id}/comments/{cid}"),
        )
        .param("id")
        .param("cid"),
    )
    .method(MethodMeta::new(
        "create",
        DocMeta::new()
            .with("TITLE", "Create article")
            .with("VERB", "POST")
            .with("ARGUMENT", "title")
            .with("STATUSOK", 201)
            .with("MIMEIN", "json"),
    ))
    .method(MethodMeta::new(
        "boom",
        DocMeta::new().with("TITLE", "Always panics").with("ROUTE", "boom"),
    ))
    .method(MethodMeta::new(
        "broken",
        DocMeta::new().with("TITLE", "Always fails").with("ROUTE", "broken"),
    ))
    .method(MethodMeta::new(
        "gone",
        DocMeta::new().with("TITLE", "Answers itself").with("ROUTE", "gone"),
    ))
    .method(MethodMeta::new(
        "_helper",
        DocMeta::new().with("TITLE", "Never routed").with("ROUTE", "helper"),
    ))
}

pub fn account_meta() -> HandlerMeta {
    HandlerMeta::port(
        ACCOUNT,
        "billing",
        DocMeta::new().with("ROUTE", "accounts").with("VERB", "GET"),
    )
    .method(MethodMeta::new(
        "summary",
        DocMeta::new().with("TITLE", "Account summary"),
    ))
}

pub fn metas() -> Vec<HandlerMeta> {
    vec![article_meta(), account_meta()]
}

fn articles() -> Vec<Value> {
    (1..=5).map(|id| json!({"id": id, "title": format!("Article {id}")})).collect()
}

pub fn handlers() -> PortTable {
    let mut table = PortTable::new();
    table
        .register(ARTICLE, "list", |call, _| {
            let stash = call.stashed("paginate").cloned().unwrap_or(Value::Null);
            let page = stash["page"].as_u64().unwrap_or(1);
            let size = stash["size"].as_u64().unwrap_or(10);
            let all = articles();
            let list = all
                .iter()
                .skip(((page - 1) * size) as usize)
                .take(size as usize)
                .cloned()
                .collect();
            Ok(Flow::Next(Output::Page(Page::new(list, page, size, all.len() as u64))))
        })
        .register(ARTICLE, "latest", |_, _| Ok(Flow::Next(Output::Data(json!({"latest": true})))))
        .register(ARTICLE, "show", |_, args| {
            Ok(Flow::Next(Output::Data(json!({ "id": args[0] }))))
        })
        .register(ARTICLE, "comment", |_, args| {
            Ok(Flow::Next(Output::Data(json!({ "id": args[0], "cid": args[1] }))))
        })
        .register(ARTICLE, "create", |call, _| {
            let title = call.value("title").unwrap_or(Value::Null);
            Ok(Flow::Next(Output::Data(json!({ "title": title }))))
        })
        .register(ARTICLE, "boom", |_, _| panic!("handler exploded"))
        .register(ARTICLE, "broken", |_, _| Err("database unavailable".into()))
        .register(ARTICLE, "gone", |call, _| {
            call.response
                .set_status(axum::http::StatusCode::GONE)
                .set_body(json!("moved away"));
            Ok(Flow::Respond)
        })
        .register(ACCOUNT, "summary", |_, _| Ok(Flow::Next(Output::Data(json!({"balance": 0})))));
    table
}

/// Kernel over the fixture domain with an in-memory halt flag.
pub fn kernel_with(config: &KernelConfig, halt: Arc<HaltFlag>) -> Kernel {
    KernelBuilder::new(config)
        .halt(halt)
        .build(&metas(), handlers())
        .expect("fixture metadata assembles")
}

pub fn kernel() -> Kernel {
    kernel_with(&config(), Arc::new(HaltFlag::new()))
}
