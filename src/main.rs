use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use recovery_props::config::DEFAULT_LOG_FILTER;
use recovery_props::{
    util, Config, Database, ExperienceId, JsonCodec, KeyValueStore, PropsCodec,
    RecoveryPropsStore, ScopedRecoveryStore,
};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Inspect and edit recovery props saved by crashed applications
#[derive(Debug, Parser)]
#[command(name = "recovery-props", version, about)]
struct Cli {
    /// Data directory (defaults to ~/.recovery-props)
    #[arg(long, global = true, env = "RECOVERY_PROPS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every unconsumed snapshot
    List,
    /// Print the snapshot for an experience without consuming it
    Show { experience: Option<String> },
    /// Store a JSON object as the snapshot for an experience
    Set {
        experience: String,
        /// JSON object text, or `-` to read it from stdin
        props: String,
    },
    /// Print the snapshot for an experience and delete it
    Consume { experience: Option<String> },
    /// Delete the snapshot for an experience, or all of them
    Clear {
        experience: Option<String>,
        #[arg(long, conflicts_with = "experience")]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    // Config warnings go to the log file under the default filter until the
    // configured one is known
    let config = tracing::subscriber::with_default(log_subscriber(None)?, Config::load);
    tracing::subscriber::set_global_default(log_subscriber(Some(&config.log_filter))?)
        .context("Failed to install log subscriber")?;

    let db = Database::open_with_config(&config).context("Failed to open recovery database")?;
    let store = RecoveryPropsStore::new(db.connection());

    match cli.command {
        Command::List => {
            let entries = store.list()?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Show { experience } => {
            let id = resolve_experience(experience, &config)?;
            match store.get(id.as_str())? {
                Some(props) => print_props(&props)?,
                None => println!("null"),
            }
        }
        Command::Set { experience, props } => {
            let id = ExperienceId::new(experience)?;
            let text = if props == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
            } else {
                props
            };
            let parsed = JsonCodec
                .decode(&text)
                .context("Props must be a JSON object")?;
            ScopedRecoveryStore::new(store, id).set_recovery_props(&JsonCodec.encode(&parsed)?)?;
        }
        Command::Consume { experience } => {
            let id = resolve_experience(experience, &config)?;
            match ScopedRecoveryStore::new(store, id).consume_recovery_props()? {
                Some(props) => print_props(&props)?,
                None => println!("null"),
            }
        }
        Command::Clear { experience, all } => {
            if all {
                let removed = store.clear_all()?;
                tracing::info!(removed, "Cleared all recovery props");
            } else {
                let id = resolve_experience(experience, &config)?;
                ScopedRecoveryStore::new(store, id).clear()?;
            }
        }
    }

    Ok(())
}

fn log_subscriber(log_filter: Option<&str>) -> Result<impl tracing::Subscriber + Send + Sync> {
    // Log to file (~/.recovery-props/logs/recovery-props.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .finish())
}

fn resolve_experience(experience: Option<String>, config: &Config) -> Result<ExperienceId> {
    match (experience, &config.default_experience) {
        (Some(id), _) => Ok(ExperienceId::new(id)?),
        (None, Some(id)) => Ok(id.clone()),
        (None, None) => bail!("No experience given and no default_experience configured"),
    }
}

fn print_props(encoded: &str) -> Result<()> {
    let value: Value = serde_json::from_str(encoded).context("Stored props are not valid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
