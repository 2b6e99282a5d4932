//! Filter pipeline server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────────┐
//!                       │                   FILTER PIPELINE                      │
//!                       │                                                        │
//!   Client Request      │  ┌─────────┐    ┌───────────┐    ┌────────────────┐    │
//!   ────────────────────┼─▶│  http   │───▶│ container │───▶│    routing     │    │
//!                       │  │ server  │    │ pipeline  │    │ (filter names) │    │
//!                       │  └─────────┘    └─────┬─────┘    └───────┬────────┘    │
//!                       │                       │                  │             │
//!                       │                       ▼                  ▼             │
//!                       │                 ┌───────────┐    ┌────────────────┐    │
//!                       │                 │  chain    │◀───│    registry    │    │
//!                       │                 │ f0 → f1 → │    │ filters,       │    │
//!                       │                 │ servlet   │    │ servlets       │    │
//!   Client Response     │  ┌─────────┐    └─────┬─────┘    └────────────────┘    │
//!   ◀───────────────────┼──│response │◀─────────┘                                │
//!                       │  └─────────┘                                           │
//!                       │                                                        │
//!                       │  Cross-cutting: config (+ reload), observability,      │
//!                       │                 lifecycle                              │
//!                       └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use filter_pipeline::lifecycle::startup;
use filter_pipeline::registry::ComponentFactory;

#[derive(Parser)]
#[command(name = "filter-pipeline")]
#[command(about = "Servlet-style filter pipeline server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    startup::run(&cli.config, ComponentFactory::with_builtins()).await?;
    Ok(())
}
