use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use portkernel::assembler::Assembler;
use portkernel::config::{load_config, KernelConfig};
use portkernel::http::verb::Verb;
use portkernel::http::WrapperRegistry;
use portkernel::lifecycle::halt::{clear_marker, read_marker, write_marker};
use portkernel::lifecycle::HaltNotice;
use portkernel::metadata::load_manifest;
use portkernel::observability::logging;
use portkernel::pipeline::PipeRegistry;
use portkernel::port::DeclaredPorts;
use portkernel::routing::{ListFilter, Registry};

#[derive(Parser)]
#[command(name = "portctl")]
#[command(about = "Offline tooling for the port kernel", long_about = None)]
struct Cli {
    /// Kernel configuration file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "portkernel.toml")]
    config: PathBuf,

    /// Handler metadata manifest (overrides `kernel.manifest`).
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes
    Routes {
        /// Only these verbs (repeatable)
        #[arg(long)]
        verb: Vec<Verb>,
        /// Only these versions; `_` selects unversioned routes
        #[arg(long)]
        version: Vec<String>,
        /// Only these domains
        #[arg(long)]
        domain: Vec<String>,
        /// Print the number of routes only
        #[arg(long)]
        count: bool,
    },
    /// Print the documentation tree as JSON
    Dump {
        /// Write to this file instead of stdout
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Assemble the manifest and report problems
    Check,
    /// Halt the service: routed requests get 503 until `resume`
    Halt {
        #[arg(short, long, default_value = "Service halted")]
        message: String,
        /// Replace an existing halt marker
        #[arg(long)]
        force: bool,
    },
    /// Remove the halt marker
    Resume,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(&cli.config)?;
    let _ = logging::init(&config.observability);

    match cli.command {
        Commands::Routes {
            verb,
            version,
            domain,
            count,
        } => {
            let registry = assemble(&config, cli.manifest.as_deref())?;
            let filter = ListFilter {
                verbs: verb,
                versions: version,
                domains: domain,
            };
            let listing = registry.list(&filter);
            if count {
                let total: usize = listing.iter().map(|l| l.verbs.len()).sum();
                println!("{total}");
                return Ok(());
            }
            for entry in listing {
                let verbs = entry
                    .verbs
                    .iter()
                    .map(Verb::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                println!("{:<24} {:<40} {} ({})", verbs, entry.route, entry.target, entry.title);
            }
        }
        Commands::Dump { save } => {
            let registry = assemble(&config, cli.manifest.as_deref())?;
            let docs = serde_json::to_string_pretty(&registry.docs(&config))?;
            match save {
                Some(path) => {
                    fs::write(&path, docs)?;
                    println!("Documentation written to {}", path.display());
                }
                None => println!("{docs}"),
            }
        }
        Commands::Check => {
            let registry = assemble(&config, cli.manifest.as_deref())?;
            println!(
                "OK: {} routes, {} ports",
                registry.route_count(),
                registry.port_count()
            );
        }
        Commands::Halt { message, force } => {
            let path = &config.kernel.halt_file;
            if let Some(existing) = read_marker(path)? {
                if !force {
                    eprintln!(
                        "Error: already halted since {} ({}); use --force to replace",
                        existing.since, existing.message
                    );
                    std::process::exit(1);
                }
            }
            let notice = HaltNotice::now(&message);
            write_marker(path, &notice)?;
            println!("Halted since {}: {}", notice.since, notice.message);
        }
        Commands::Resume => {
            if clear_marker(&config.kernel.halt_file)? {
                println!("Resumed");
            } else {
                println!("Not halted");
            }
        }
    }

    Ok(())
}

fn read_config(path: &Path) -> Result<KernelConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_config(path)?)
    } else {
        Ok(KernelConfig::default())
    }
}

/// Assemble without handlers: every declared port class is trusted.
fn assemble(config: &KernelConfig, manifest: Option<&Path>) -> Result<Registry, Box<dyn std::error::Error>> {
    let path = manifest
        .or(config.kernel.manifest.as_deref())
        .ok_or("no manifest given (use --manifest or kernel.manifest)")?;
    let metas = load_manifest(path)?;
    let pipes = PipeRegistry::builtin(config);
    let wrappers = WrapperRegistry::with_config(&config.wrappers);
    let assembly = Assembler::new(config, &DeclaredPorts, &pipes, &wrappers)
        .assemble(&metas)
        .map_err(|err| format!("{}: {err}", err.code()))?;
    Ok(assembly.registry)
}
