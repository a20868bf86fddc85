//! Gemara Store - command-line access to a local artifact store
//!
//! Stores, lists and validates layered Gemara governance documents.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gemara_store::{
    config::GemaraConfig,
    layer::Layer,
    schema::{DocumentValidator, SchemaValidator},
    ArtifactStore, ScopeFilter,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gemara-store")]
#[command(author = "Gemara Store Contributors")]
#[command(version)]
#[command(about = "Layered governance artifact store with schema validation")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GEMARA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a YAML/JSON artifact ("-" reads stdin)
    Store {
        /// Target layer (1-4)
        #[arg(short, long)]
        layer: u32,

        /// Artifact file
        file: PathBuf,

        /// Validate against the layer schema before storing
        #[arg(long)]
        validate: bool,
    },

    /// Print a stored artifact
    Get {
        #[arg(short, long)]
        layer: u32,

        id: String,

        /// Print the file as stored instead of the parsed document
        #[arg(long)]
        raw: bool,
    },

    /// List indexed artifacts
    List {
        /// Layer to list; 0 lists every layer
        #[arg(short, long, default_value = "0")]
        layer: u32,
    },

    /// Rebuild the index from disk
    Rescan,

    /// Delete an artifact
    Delete {
        #[arg(short, long)]
        layer: u32,

        id: String,
    },

    /// Validate a file, or a stored artifact with --id
    Validate {
        #[arg(short, long)]
        layer: u32,

        /// Document file ("-" reads stdin)
        #[arg(required_unless_present = "id")]
        file: Option<PathBuf>,

        /// Stored artifact id
        #[arg(long, conflicts_with = "file")]
        id: Option<String>,
    },

    /// Search ids and titles
    Search {
        term: String,

        /// Layer to search; 0 searches every layer
        #[arg(short, long, default_value = "0")]
        layer: u32,
    },

    /// Find guidance and controls applicable to a scope
    Applicable {
        /// Technology domains
        #[arg(long = "technology")]
        technologies: Vec<String>,

        /// Jurisdictions
        #[arg(long = "boundary")]
        boundaries: Vec<String>,

        /// Industry sectors / providers
        #[arg(long = "provider")]
        providers: Vec<String>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gemara_store={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => GemaraConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GemaraConfig::default(),
    };

    match cli.command {
        Commands::Store {
            layer,
            file,
            validate,
        } => {
            let store = open_store(&config)?;
            let text = read_input(&file)?;
            let id = if validate || config.validation.validate_on_store {
                store.store_validated(layer, &text)?
            } else {
                store.store_raw_yaml(layer, &text)?
            };
            println!("{}", id);
        }
        Commands::Get { layer, id, raw } => {
            let store = open_store(&config)?;
            if raw {
                print!("{}", store.retrieve_raw(layer, &id)?);
            } else {
                print!("{}", store.retrieve(layer, &id)?.to_yaml()?);
            }
        }
        Commands::List { layer } => {
            let store = open_store(&config)?;
            print_json(&store.list(layer)?)?;
        }
        Commands::Rescan => {
            let store = open_store(&config)?;
            println!("{} artifacts indexed", store.rescan()?);
        }
        Commands::Delete { layer, id } => {
            open_store(&config)?.delete(layer, &id)?;
            println!("deleted {}", id);
        }
        Commands::Validate { layer, file, id } => {
            let validator = SchemaValidator::from_config(&config.schema)?;
            let layer = Layer::try_from(layer)?;
            let text = match (id, file) {
                (Some(id), _) => open_store(&config)?.retrieve_raw(layer.number(), &id)?,
                (None, Some(file)) => read_input(&file)?,
                (None, None) => anyhow::bail!("a file or --id is required"),
            };
            let report = validator.report(&text, layer);
            print_json(&report)?;
            if !report.result.valid {
                std::process::exit(1);
            }
        }
        Commands::Search { term, layer } => {
            let store = open_store(&config)?;
            print_json(&store.search(layer, &term)?)?;
        }
        Commands::Applicable {
            technologies,
            boundaries,
            providers,
        } => {
            let store = open_store(&config)?;
            let filter = ScopeFilter::new(technologies, boundaries, providers);
            print_json(&store.find_applicable(&filter)?)?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

/// Open the configured store with the configured validator attached
fn open_store(config: &GemaraConfig) -> Result<ArtifactStore> {
    let validator: Arc<dyn DocumentValidator> = Arc::new(SchemaValidator::from_config(&config.schema)?);
    let store = ArtifactStore::open(config)
        .with_context(|| format!("opening store at {}", config.storage.base_dir.display()))?
        .with_validator(validator);
    Ok(store)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_config(config: Option<&GemaraConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
