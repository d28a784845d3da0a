//! RentalCar CLI
//!
//! Command-line interface for the RentalCar alert service.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rentalcar::alerting::{self, Verdict};
use rentalcar::config::LoggingConfig;
use rentalcar::messaging::{FcmPlatform, PushPlatform};
use rentalcar::models::{InboundMessage, Topic};
use rentalcar::token::TokenStore;
use rentalcar::{token, App, Config};
use tracing::info;

/// RentalCar - speed alerts for rental cars
#[derive(Parser)]
#[command(name = "rentalcar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "RENTALCAR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the alert service
    Serve {
        /// Host to bind to
        #[arg(long, env = "RENTALCAR_HOST")]
        host: Option<String>,

        /// HTTP API port
        #[arg(long, env = "RENTALCAR_HTTP_PORT")]
        port: Option<u16>,
    },

    /// Evaluate a payload (JSON object) from a file or stdin
    Evaluate {
        /// Payload file (stdin if not specified)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List configured topics
    Topics,

    /// Subscribe this installation to a topic
    Subscribe {
        /// Topic name, e.g. CarA
        topic: String,
    },

    /// Unsubscribe this installation from a topic
    Unsubscribe {
        /// Topic name, e.g. CarA
        topic: String,
    },

    /// Manage the registration token
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Print the stored token
    Show,

    /// Replace the stored token
    Set {
        /// New registration token
        token: String,
    },

    /// Fetch the token from the push platform and store it
    Refresh,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match parse_cli(None, std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Evaluate { file } => run_evaluate(file, cli.format),
        Commands::Topics => {
            run_topics(&config);
            Ok(())
        }
        Commands::Subscribe { topic } => run_subscription(&config, &topic, true).await,
        Commands::Unsubscribe { topic } => run_subscription(&config, &topic, false).await,
        Commands::Token { command } => run_token(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Load `.env` (or `dotenv` when given), then parse arguments.
///
/// The env file must be loaded first so clap's `env` fallbacks can see it.
fn parse_cli<I, T>(dotenv: Option<&Path>, args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let _ = match dotenv {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    Cli::try_parse_from(args)
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { config.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        "Starting RentalCar on {}:{}",
        config.server.host, config.server.port
    );

    let app = App::from_config(config)?;
    app.run().await?;
    Ok(())
}

fn run_evaluate(file: Option<PathBuf>, format: OutputFormat) -> anyhow::Result<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let message: InboundMessage =
        serde_json::from_str(&input).context("payload must be a JSON object of strings")?;
    let verdict = alerting::assess(message.payload());

    match format {
        OutputFormat::Text => match &verdict {
            Verdict::Alert(alert) => {
                println!("ALERT");
                println!("  title: {}", alert.title);
                println!("  body:  {}", alert.body);
            }
            Verdict::Suppressed(reason) => println!("no alert: {reason}"),
        },
        OutputFormat::Json => {
            let value = match &verdict {
                Verdict::Alert(alert) => serde_json::json!({
                    "alert": true,
                    "title": alert.title,
                    "body": alert.body,
                }),
                Verdict::Suppressed(reason) => serde_json::json!({
                    "alert": false,
                    "reason": reason.reason(),
                    "detail": reason.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn run_topics(config: &Config) {
    for topic in &config.topics {
        println!("{:<12} {}", topic.name, topic.label);
    }
}

async fn run_subscription(config: &Config, name: &str, subscribe: bool) -> anyhow::Result<()> {
    let topic = config
        .topics
        .iter()
        .find(|t| t.name == name)
        .map(Topic::from)
        .unwrap_or_else(|| Topic::new(name, name));

    let tokens = token::open(&config.token)?;
    let platform = FcmPlatform::new(&config.platform, tokens)?;

    let (verb, result) = if subscribe {
        ("subscribe", platform.subscribe(&topic).await)
    } else {
        ("unsubscribe", platform.unsubscribe(&topic).await)
    };

    match result {
        Ok(()) => {
            println!("{} {verb} successfully.", topic.label);
            Ok(())
        }
        Err(e) => {
            println!("{} {verb} failed.", topic.label);
            Err(e.into())
        }
    }
}

async fn run_token(config: Config, command: TokenCommands) -> anyhow::Result<()> {
    match command {
        TokenCommands::Show => {
            let tokens = token::open(&config.token)?;
            let current = tokens.get();
            if current.is_empty() {
                println!("(no token stored)");
            } else {
                println!("{current}");
            }
        }
        TokenCommands::Set { token: value } => {
            let tokens = token::open(&config.token)?;
            tokens.set(value)?;
            println!("Token updated");
        }
        TokenCommands::Refresh => {
            let app = App::from_config(config)?;
            match app.service().refresh_token().await {
                Some(token) => println!("{token}"),
                None => anyhow::bail!("could not fetch a registration token"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dotenv_supplies_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        let mut file = std::fs::File::create(&env_file).unwrap();
        writeln!(file, "RENTALCAR_CONFIG=/etc/rentalcar/from-dotenv.toml").unwrap();

        let cli = parse_cli(Some(&env_file), ["rentalcar", "topics"]).unwrap();
        std::env::remove_var("RENTALCAR_CONFIG");

        assert_eq!(
            cli.config,
            Some(PathBuf::from("/etc/rentalcar/from-dotenv.toml"))
        );
    }

    #[test]
    fn test_flag_overrides_env() {
        let cli = parse_cli(
            Some(Path::new("/nonexistent/.env")),
            ["rentalcar", "--config", "cli.toml", "topics"],
        )
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("cli.toml")));
    }
}
