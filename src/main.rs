//! overlay-engine CLI - expand overlay files into resolved overlay definitions

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use overlay_engine::error::{EngineError, FixSuggestion, Result};
use overlay_engine::{overlay_keys, select_for_preview, EngineConfig, OverlayExpander, TemplateLibrary, Value, Variables};

#[derive(Parser)]
#[command(name = "overlay-engine")]
#[command(about = "Resolve overlay templates into preview-ready overlay definitions")]
#[command(version)]
struct Cli {
    /// Log resolution details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand an overlay file and print the resolved overlays
    Expand {
        /// Path to the overlay .yml file
        file: PathBuf,

        /// Template variable, repeatable (value parsed as a YAML scalar)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Template variables as a JSON object (--var entries win)
        #[arg(long = "vars", value_name = "JSON")]
        vars_json: Option<String>,

        #[command(flatten)]
        location: Location,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Keep one overlay per group, as a single-poster preview would
        #[arg(long)]
        preview: bool,
    },

    /// List overlay names declared in a file without expanding them
    Keys {
        /// Path to the overlay .yml file
        file: PathBuf,
    },

    /// List overlay files found in the defaults directory
    List {
        #[command(flatten)]
        location: Location,
    },
}

#[derive(Args)]
struct Location {
    /// Install root of the automation tool (defaults live in <root>/defaults/overlays)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Directory holding templates.yml (overrides --root)
    #[arg(long)]
    defaults_dir: Option<PathBuf>,
}

impl Location {
    fn config(&self) -> EngineConfig {
        let mut config = match &self.root {
            Some(root) => EngineConfig::from_root(root),
            None => EngineConfig::from_env(),
        };
        if let Some(dir) = &self.defaults_dir {
            config = config.with_defaults_dir(dir);
        }
        config
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Expand {
            file,
            vars,
            vars_json,
            location,
            format,
            preview,
        } => expand(&file, &vars, vars_json.as_deref(), &location, format, preview),
        Commands::Keys { file } => {
            list_keys(&file);
            Ok(())
        }
        Commands::List { location } => {
            list_files(&location);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn expand(
    file: &Path,
    vars: &[String],
    vars_json: Option<&str>,
    location: &Location,
    format: OutputFormat,
    preview: bool,
) -> Result<()> {
    let user_vars = collect_variables(vars, vars_json)?;
    let expander = OverlayExpander::from_config(&location.config());

    let mut overlays = expander.expand(file, &user_vars);
    if preview {
        overlays = select_for_preview(overlays);
    }

    if overlays.is_empty() {
        eprintln!("{} No overlays found in '{}'", "!".yellow(), file.display());
        return Ok(());
    }

    let rendered = match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&overlays).map_err(|e| EngineError::Serialize(e.to_string()))?
        }
        OutputFormat::Yaml => serde_yaml::to_string(&overlays).map_err(|e| EngineError::Serialize(e.to_string()))?,
    };
    println!("{}", rendered);
    Ok(())
}

fn list_keys(file: &Path) {
    for key in overlay_keys(file) {
        println!("{}", key);
    }
}

fn list_files(location: &Location) {
    let library = TemplateLibrary::new(location.config().defaults_dir);
    for path in library.overlay_files() {
        let shown = path.strip_prefix(library.defaults_dir()).unwrap_or(&path);
        println!("{}", shown.display());
    }
}

/// Merge `--vars` JSON with repeated `--var key=value` flags.
fn collect_variables(vars: &[String], vars_json: Option<&str>) -> Result<Variables> {
    let mut collected = Variables::new();
    if let Some(json) = vars_json {
        match serde_json::from_str::<Value>(json)? {
            Value::Mapping(map) => collected.extend(map),
            _ => {
                return Err(EngineError::InvalidVariable {
                    input: json.to_string(),
                    reason: "--vars must be a JSON object".to_string(),
                })
            }
        }
    }
    for raw in vars {
        let (key, value) = parse_var(raw)?;
        collected.insert(key, value);
    }
    Ok(collected)
}

fn parse_var(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(EngineError::InvalidVariable {
            input: raw.to_string(),
            reason: "missing '='".to_string(),
        });
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(EngineError::InvalidVariable {
            input: raw.to_string(),
            reason: "empty variable name".to_string(),
        });
    }
    let value = match serde_yaml::from_str::<Value>(value) {
        Ok(parsed @ (Value::Bool(_) | Value::Number(_))) => parsed,
        _ => Value::from(value),
    };
    Ok((key.to_string(), value))
}
