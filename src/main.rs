use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use local_notes::{cli, config, server};

#[derive(Parser)]
#[command(name = "local-notes", version, about = "Personal notes server with an MCP tool surface for agents")]
struct Cli {
    /// Config file (defaults to ~/.local-notes/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (MCP over SSE + REST API)
    Serve,
    /// Manage users and their API keys
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Move every note from one owner to another
    Merge {
        /// Source: a username or "anonymous"
        #[arg(long)]
        from: String,
        /// Destination: a username or "anonymous"
        #[arg(long)]
        to: String,
    },
    /// Print a user's notes as JSON (anonymous notes when --user is omitted)
    Export {
        #[arg(long)]
        user: Option<String>,
    },
    /// Show database health and counts
    Stats,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user and print its API key
    Add {
        username: String,
        #[arg(long)]
        admin: bool,
    },
    /// List users with note counts
    List,
    /// Issue a fresh API key for a user
    RotateKey { username: String },
    /// Change a user's name
    Rename { username: String, new_username: String },
    /// Delete a user and all of its notes
    Delete { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::NotesConfig::load_from(path)?,
        None => config::NotesConfig::load()?,
    };

    // Logs go to stderr so `export` output on stdout stays clean JSON.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_http(config).await?,
        Command::User { action } => match action {
            UserAction::Add { username, admin } => cli::user::add(&config, &username, admin)?,
            UserAction::List => cli::user::list(&config)?,
            UserAction::RotateKey { username } => cli::user::rotate_key(&config, &username)?,
            UserAction::Rename { username, new_username } => {
                cli::user::rename(&config, &username, &new_username)?
            }
            UserAction::Delete { username } => cli::user::delete(&config, &username)?,
        },
        Command::Merge { from, to } => cli::merge::merge(&config, &from, &to)?,
        Command::Export { user } => cli::export::export(&config, user.as_deref())?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
