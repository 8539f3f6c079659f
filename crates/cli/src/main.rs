//! fieldgraph CLI — the main entry point.
//!
//! Commands:
//! - `check`     — Load a scene and report what it contains
//! - `describe`  — Print the commands that rebuild a scene's fields
//! - `eval`      — Evaluate a field at a node or element location
//! - `config`    — Show, locate or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldgraph_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "fieldgraph",
    about = "fieldgraph — finite element field graph evaluation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scene and report its contents
    Check {
        /// Scene file (TOML)
        scene: PathBuf,
    },

    /// Print canonical field commands
    Describe {
        /// Scene file (TOML)
        scene: PathBuf,

        /// Only this field
        #[arg(short, long)]
        field: Option<String>,
    },

    /// Evaluate a field
    Eval {
        /// Scene file (TOML)
        scene: PathBuf,

        /// Field to evaluate
        #[arg(short, long)]
        field: String,

        /// Evaluate at this mesh node
        #[arg(long, conflicts_with_all = ["element", "xi"])]
        node: Option<u32>,

        /// Evaluate inside this element (requires --xi)
        #[arg(long, requires = "xi")]
        element: Option<u32>,

        /// Element local coordinates, comma separated
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        xi: Vec<f64>,

        /// Evaluation time
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,

        /// Also compute first derivatives with respect to xi
        #[arg(short, long)]
        derivatives: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { scene } => commands::check::run(&scene, &config?)?,
        Commands::Describe { scene, field } => commands::describe::run(&scene, field.as_deref(), &config?)?,
        Commands::Eval {
            scene,
            field,
            node,
            element,
            xi,
            time,
            derivatives,
            json,
        } => {
            let target = match (node, element) {
                (Some(node), _) => commands::eval::Target::Node(node),
                (None, Some(element)) => commands::eval::Target::Element { element, xi },
                (None, None) => return Err("either --node or --element is required".into()),
            };
            let request = commands::eval::Request {
                field,
                target,
                time,
                derivatives,
                json,
            };
            commands::eval::run(&scene, &request, &config?)?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config?)?,
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Validate => commands::config_cmd::validate(config)?,
        },
    }

    Ok(())
}
