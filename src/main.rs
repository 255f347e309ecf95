use std::{env, io, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use colored::Colorize;
use huddle_collab::{run_heartbeat, Collab, DirectoryError, JwtAuthenticator, MemoryDirectory};
use huddle_core::Config;
use huddle_server::DEFAULT_PORT;
use log::{error, info};
use thiserror::Error;

mod logging;

const DEFAULT_USERS_FILE: &str = "users.json";

/// Everything the process needs to start, read from the environment
#[derive(Debug)]
struct Settings {
    port: u16,
    jwt_secret: String,
    users_file: PathBuf,
    config: Config,
}

#[derive(Debug, Error)]
enum HuddleError {
    #[error("{name} is not set")]
    MissingVariable { name: &'static str },

    #[error("{name} has an invalid value: {value}")]
    InvalidVariable { name: &'static str, value: String },

    #[error("Could not load users: {0}")]
    Users(#[from] DirectoryError),

    #[error("Server stopped: {0}")]
    Server(#[from] io::Error),
}

impl HuddleError {
    fn hint(&self) -> String {
        match self {
            HuddleError::MissingVariable { name } => {
                format!("Set {name} in the environment, then try again.")
            }
            HuddleError::InvalidVariable { name, .. } => {
                format!("{name} must be a whole, non-negative number.")
            }
            HuddleError::Users(_) => format!(
                "HUDDLE_USERS_FILE must point to a JSON array of users (defaults to {DEFAULT_USERS_FILE})."
            ),
            HuddleError::Server(_) => {
                "Make sure HUDDLE_SERVER_PORT is free and can be bound.".to_string()
            }
        }
    }
}

/// Parses an optional variable, keeping `default` when it is not set
fn parse_var<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, HuddleError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| HuddleError::InvalidVariable { name, value }),
    }
}

fn env_var<T: FromStr>(name: &'static str, default: T) -> Result<T, HuddleError> {
    parse_var(name, env::var(name).ok(), default)
}

fn env_secs(name: &'static str, default: Duration) -> Result<Duration, HuddleError> {
    env_var(name, default.as_secs()).map(Duration::from_secs)
}

impl Settings {
    fn from_env() -> Result<Self, HuddleError> {
        let defaults = Config::default();

        let config = Config {
            stream_cooldown: env_secs("HUDDLE_STREAM_COOLDOWN_SECS", defaults.stream_cooldown)?,
            max_streams_per_user: env_var(
                "HUDDLE_MAX_STREAMS_PER_USER",
                defaults.max_streams_per_user,
            )?,
            max_active_streams: env_var("HUDDLE_MAX_ACTIVE_STREAMS", defaults.max_active_streams)?,
            max_viewers_per_stream: env_var(
                "HUDDLE_MAX_VIEWERS_PER_STREAM",
                defaults.max_viewers_per_stream,
            )?,
            heartbeat_interval: env_secs("HUDDLE_HEARTBEAT_SECS", defaults.heartbeat_interval)?,
            ..defaults
        };

        let jwt_secret = env::var("HUDDLE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(HuddleError::MissingVariable {
                name: "HUDDLE_JWT_SECRET",
            })?;

        Ok(Self {
            port: env_var("HUDDLE_SERVER_PORT", DEFAULT_PORT)?,
            users_file: env_var("HUDDLE_USERS_FILE", PathBuf::from(DEFAULT_USERS_FILE))?,
            jwt_secret,
            config,
        })
    }
}

async fn run() -> Result<(), HuddleError> {
    let settings = Settings::from_env()?;

    let directory = MemoryDirectory::from_json_file(&settings.users_file)?;
    info!(
        "Loaded {} user(s) from {}",
        directory.user_count(),
        settings.users_file.display()
    );

    let authenticator = JwtAuthenticator::new(&settings.jwt_secret, directory);
    let collab = Arc::new(Collab::new(settings.config, authenticator));

    tokio::spawn(run_heartbeat(collab.clone()));

    huddle_server::run_server(collab, settings.port).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let verbose = env::var("HUDDLE_LOG_DEBUG").is_ok_and(|v| v == "1" || v == "true");

    if let Err(error) = logging::init_logger(verbose) {
        eprintln!("Could not set up logging: {error}");
    }

    if let Err(error) = run().await {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "huddle failed to start!".bold().red()
        );
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
