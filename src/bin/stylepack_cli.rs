//! Stylepack CLI - Bridge interface for scripts and plugins
//!
//! Commands: export, translate, validate
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on load failure, 2 on export or validation failure

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stylepack_core::{
    AssetRegistry, ExportConfig, ExportContext, ProgressEvent, ProjectSnapshot, Symbol,
    SymbolTranslator,
};

#[derive(Parser)]
#[command(name = "stylepack-cli")]
#[command(about = "Stylepack CLI - Symbology Translation Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a project snapshot as a style package
    Export {
        /// Project snapshot JSON
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// ExportConfig JSON file; `--output` wins over its output_dir
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print written documents
        #[arg(long)]
        pretty: bool,
    },

    /// Translate one symbol to symbol layer records
    Translate {
        /// JSON payload ({"context": ExportContext, "symbol": Symbol})
        #[arg(short, long)]
        payload: String,
    },

    /// Check every vector layer's renderer definition
    Validate {
        /// Project snapshot JSON
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

#[derive(Deserialize)]
struct TranslatePayload {
    context: ExportContext,
    symbol: Symbol,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!(r#"{{"success": false, "error": "{e}"}}"#),
    }
}

fn failure(error: impl std::fmt::Display, code: u8) -> ExitCode {
    print_json(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }));
    ExitCode::from(code)
}

fn load_config(path: Option<&Path>, output: PathBuf, pretty: bool) -> Result<ExportConfig, String> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
            serde_json::from_str::<ExportConfig>(&text)
                .map_err(|e| format!("Invalid config: {e}"))?
        }
        None => ExportConfig::new(&output),
    };
    config.output_dir = output;
    config.pretty |= pretty;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Export {
            snapshot,
            output,
            config,
            pretty,
        } => {
            let snapshot = match ProjectSnapshot::load(&snapshot) {
                Ok(s) => s,
                Err(e) => return failure(format!("Failed to load snapshot: {e}"), 1),
            };
            let config = match load_config(config.as_deref(), output, pretty) {
                Ok(c) => c,
                Err(e) => return failure(e, 1),
            };

            let (pipeline, layers) = snapshot.into_pipeline(config);
            let handle = match pipeline.spawn(layers) {
                Ok(h) => h,
                Err(e) => return failure(e, 2),
            };
            for event in handle.events() {
                if let ProgressEvent::LayerProcessed { index, name } = event {
                    tracing::debug!(index, layer = name.as_str(), "progress");
                }
            }

            match handle.join() {
                Ok(report) => {
                    print_json(&serde_json::json!({
                        "success": true,
                        "report": report,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e, 2),
            }
        }

        Commands::Translate { payload } => {
            let payload: TranslatePayload = match serde_json::from_str(&payload) {
                Ok(p) => p,
                Err(e) => return failure(format!("Invalid payload: {e}"), 1),
            };

            // Names only; nothing is copied.
            let mut assets = AssetRegistry::new("assets");
            match SymbolTranslator::new(&payload.context, &mut assets).translate(&payload.symbol) {
                Ok(records) => {
                    print_json(&serde_json::json!({
                        "success": true,
                        "symbols": records,
                    }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e, 2),
            }
        }

        Commands::Validate { snapshot } => {
            let snapshot = match ProjectSnapshot::load(&snapshot) {
                Ok(s) => s,
                Err(e) => return failure(format!("Failed to load snapshot: {e}"), 1),
            };

            let validator = stylepack_core::Validator::new();
            let results: Vec<_> = snapshot
                .vector_layers()
                .map(|layer| validator.validate(layer))
                .collect();
            let valid = results.iter().all(|r| r.valid);

            print_json(&serde_json::json!({
                "valid": valid,
                "layers": results,
            }));
            if valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    }
}
