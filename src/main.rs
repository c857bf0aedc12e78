//! Port kernel demo server.
//!
//! Hosts a small set of in-code ports behind the axum adapter so the kernel
//! can be exercised end to end with curl:
//!
//! ```text
//! GET  /v1/ping            → "pong"
//! GET  /v1/echo/{word}     → {"word": ...}
//! POST /v1/echo            → the validated `word` argument
//! ```
//!
//! Halting works while it runs: `portctl halt -m maintenance`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use portkernel::config::{load_config, KernelConfig};
use portkernel::lifecycle::{HaltFlag, HaltWatcher, Shutdown};
use portkernel::metadata::{DocMeta, HandlerMeta, MethodMeta};
use portkernel::observability::logging;
use portkernel::pipeline::{Flow, KernelBuilder};
use portkernel::port::{Output, PortTable};
use portkernel::KernelServer;

const ECHO: &str = "Demo\\Port\\Echo";

#[derive(Parser)]
#[command(name = "portkernel")]
#[command(about = "Serve the demo ports through the port kernel", long_about = None)]
struct Args {
    /// Kernel configuration file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "portkernel.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        KernelConfig::default()
    };
    let _ = logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        preflight = ?config.kernel.preflight,
        "Configuration loaded"
    );

    let halt = Arc::new(HaltFlag::from_file(&config.kernel.halt_file));
    let _watcher = HaltWatcher::new(halt.clone()).run()?;

    let kernel = KernelBuilder::new(&config)
        .halt(halt)
        .build(&demo_metas(), demo_handlers())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = KernelServer::new(Arc::new(kernel), &config.listener);
    let signal = shutdown.clone();
    tokio::spawn(async move { signal.trigger_on_ctrl_c().await });
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_metas() -> Vec<HandlerMeta> {
    vec![HandlerMeta::port(
        ECHO,
        "demo",
        DocMeta::new().with("VERSION", "v1").with("ROUTE", "echo"),
    )
    .property(
        "word",
        DocMeta::new()
            .with("TITLE", "Word")
            .with("TYPE", "string")
            .with("MAX", 64),
    )
    .method(MethodMeta::new(
        "ping",
        DocMeta::new()
            .with("TITLE", "Ping")
            .with("VERB", "GET")
            .with("ROUTE", "/ping")
            .with_extra("ROUTE", json!({"EXTENDS": false})),
    ))
    .method(
        MethodMeta::new(
            "show",
            DocMeta::new()
                .with("TITLE", "Echo a path segment")
                .with("VERB", "GET")
                .with("ROUTE", "{word}"),
        )
        .param("word"),
    )
    .method(MethodMeta::new(
        "submit",
        DocMeta::new()
            .with("TITLE", "Echo a submitted word")
            .with("VERB", "POST")
            .with("ARGUMENT", "word"),
    ))]
}

fn demo_handlers() -> PortTable {
    let mut table = PortTable::new();
    table
        .register(ECHO, "ping", |_, _| Ok(Flow::Next(Output::Data(json!("pong")))))
        .register(ECHO, "show", |_, args| {
            let word = args.into_iter().next().unwrap_or(Value::Null);
            Ok(Flow::Next(Output::Data(json!({ "word": word }))))
        })
        .register(ECHO, "submit", |call, _| {
            Ok(Flow::Next(Output::Data(call.value("word").unwrap_or(Value::Null))))
        });
    table
}
