use std::path::PathBuf;

use clap::{Parser, Subcommand};

use filter_pipeline::config::loader::load_config;
use filter_pipeline::config::PipelineConfig;
use filter_pipeline::registry::{ComponentFactory, Registry};
use filter_pipeline::routing::{resolve, DispatcherType, FilterMapping};

#[derive(Parser)]
#[command(name = "pipeline-cli")]
#[command(about = "Offline inspection of a filter pipeline configuration", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list its components
    Check,
    /// Print the filters applied to a request, in execution order
    Resolve {
        /// Request path; omit for a named dispatch
        #[arg(short, long)]
        path: Option<String>,

        /// Target servlet; defaults to the servlet mapped to the path
        #[arg(short, long)]
        servlet: Option<String>,

        /// Dispatcher type (REQUEST, FORWARD, INCLUDE, ASYNC, ERROR)
        #[arg(short, long, default_value = "REQUEST")]
        dispatcher: DispatcherType,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check => {
            let registry = Registry::from_config(&config, &ComponentFactory::with_builtins())?;
            println!("Configuration OK");
            println!("  filters:         {}", config.filters.len());
            println!("  filter mappings: {}", config.filter_mappings.len());
            for wrapper in registry.wrappers() {
                println!("  servlet {} ({}) {:?}", wrapper.name(), wrapper.class_name(), wrapper.url_patterns());
            }
        }
        Commands::Resolve { path, servlet, dispatcher } => {
            let mappings = config
                .filter_mappings
                .iter()
                .map(FilterMapping::from_config)
                .collect::<Result<Vec<_>, _>>()?;

            let servlet = match (servlet, &path) {
                (Some(name), _) => Some(name),
                (None, Some(path)) => {
                    let registry = Registry::from_config(&config, &ComponentFactory::with_builtins())?;
                    registry.map_servlet(path).map(|w| w.name().to_string())
                }
                (None, None) => None,
            };

            let names = resolve(&mappings, dispatcher, path.as_deref(), servlet.as_deref());
            println!(
                "{} {} → {}",
                dispatcher,
                path.as_deref().unwrap_or("-"),
                servlet.as_deref().unwrap_or("-")
            );
            for line in chain_lines(&config, &names) {
                println!("  {line}");
            }
        }
    }

    Ok(())
}

/// Numbered chain listing. Mapped names without a filter definition are shown
/// but not numbered, since the chain skips them.
fn chain_lines(config: &PipelineConfig, names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return vec!["(no filters)".to_string()];
    }
    let mut position = 0;
    names
        .iter()
        .map(|name| {
            if config.filters.iter().any(|f| f.name == *name) {
                position += 1;
                format!("{position}. {name}")
            } else {
                format!("-  {name} (undefined, skipped)")
            }
        })
        .collect()
}
