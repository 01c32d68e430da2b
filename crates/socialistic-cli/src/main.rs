//! socialistic - command-line client for the socialistic developer network.
//!
//! Every invocation restores the persisted session, runs one command and
//! exits. Use `RUST_LOG` to control log output (e.g. `RUST_LOG=debug`).

mod commands;
mod output;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use socialistic_core::api::ClientEvent;
use socialistic_core::{ApiClient, Config, SessionManager};

/// Log file prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "socialistic.log";

#[derive(Parser)]
#[command(name = "socialistic")]
#[command(about = "Share code and follow developers on socialistic", long_about = None)]
#[command(version)]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "SOCIALISTIC_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long, env = "SOCIALISTIC_EMAIL")]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the post feed
    Feed {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Publish a post
    Post {
        content: String,
        /// File whose contents are attached as a code snippet
        #[arg(long)]
        code_file: Option<PathBuf>,
        /// Programming language name, e.g. "Rust"
        #[arg(long)]
        language: Option<String>,
    },
    /// Like a post
    Like { post_id: i64 },
    /// Remove a like
    Unlike { post_id: i64 },
    /// Show a user's profile and recent posts
    Profile { user_id: i64 },
    /// Follow a user
    Follow { user_id: i64 },
    /// Stop following a user
    Unfollow { user_id: i64 },
    /// Edit your own profile
    EditProfile {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        github: Option<String>,
        #[arg(long)]
        stackoverflow: Option<String>,
    },
    /// List known programming languages
    Languages,
    /// List a user's followers
    Followers { user_id: i64 },
    /// List who a user follows
    Following { user_id: i64 },
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr unless `log_dir` is configured, in which case they are
/// written to a daily rolling file. The returned guard flushes on drop.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_env();
    if let Some(url) = cli.api_url {
        config.api_base_url = Some(url);
    }

    let log_guard = init_tracing(&config);
    info!(api = %config.api_base_url(), "socialistic starting");

    let storage = config.open_storage()?;
    let api = ApiClient::from_config(&config, storage)?;

    // Subscribe before any request so an expiry during bootstrap is seen too
    let mut events = api.subscribe();
    let session = SessionManager::init(api).await;

    let result = commands::run(cli.command, &session, &config).await;

    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::SessionExpired => {
                eprintln!("Your session has expired. Run `socialistic login` to sign in again.");
            }
        }
    }

    if let Err(e) = result {
        warn!(error = %e, "Command failed");
        eprintln!("{}", output::error_message(&e));
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
