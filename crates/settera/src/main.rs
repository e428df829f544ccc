//! settera - inspect a settings schema against a set of values.
//!
//! Prints which settings a UI would show for given values, the schema
//! defaults, or the effective store configuration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use settera::{SetteraSchema, StoreConfig};
use tracing::debug;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Command::Visible { schema, values } => handle_visible(&schema, values.as_deref(), cli.json),
        Command::Defaults { schema } => handle_defaults(&schema),
        Command::Config { file } => handle_config(file.as_deref()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "settera",
    author,
    version,
    about = "Inspect settings schemas: visibility, defaults and store configuration."
)]
struct Cli {
    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "SETTERA_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the settings visible for the given values
    Visible {
        /// Schema file (JSON)
        #[arg(long, short = 's')]
        schema: PathBuf,

        /// Values file (JSON object); schema defaults fill the gaps
        #[arg(long, short = 'v')]
        values: Option<PathBuf>,
    },

    /// Print the default value of every setting that declares one
    Defaults {
        /// Schema file (JSON)
        #[arg(long, short = 's')]
        schema: PathBuf,
    },

    /// Print the effective store configuration as TOML
    Config {
        /// Config file (TOML)
        #[arg(long, short = 'c')]
        file: Option<PathBuf>,
    },
}

fn init_logging(json: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("settera=info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
            .ok();
    }
}

fn load_schema(path: &Path) -> Result<SetteraSchema> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading schema {}", path.display()))?;
    SetteraSchema::from_json(&content).with_context(|| format!("parsing schema {}", path.display()))
}

fn load_values(path: &Path) -> Result<Map<String, Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading values {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing values {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("values file {} must contain a JSON object", path.display()),
    }
}

fn handle_visible(schema: &Path, values: Option<&Path>, json: bool) -> Result<()> {
    let schema = load_schema(schema)?;
    let values = match values {
        Some(path) => load_values(path)?,
        None => Map::new(),
    };
    let merged = schema.merge_defaults(&values);
    let visible = schema.visible_keys(&merged);
    debug!(
        "{} of {} settings visible",
        visible.len(),
        schema.settings().len()
    );

    let mut stdout = io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&visible)?)?;
    } else {
        for key in visible {
            writeln!(stdout, "{key}")?;
        }
    }
    Ok(())
}

fn handle_defaults(schema: &Path) -> Result<()> {
    let schema = load_schema(schema)?;
    let defaults = Value::Object(schema.default_values());
    writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&defaults)?)?;
    Ok(())
}

fn handle_config(file: Option<&Path>) -> Result<()> {
    let config = StoreConfig::load(file).context("loading store configuration")?;
    let rendered = toml::to_string_pretty(&config).context("serializing config to TOML")?;
    write!(io::stdout(), "{rendered}")?;
    Ok(())
}
