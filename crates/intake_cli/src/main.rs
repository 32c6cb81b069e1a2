//! Intake CLI - pull documents from GitHub and Confluence.

mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "confluence")]
use crate::commands::confluence::ConfluenceCredentials;
#[cfg(feature = "github")]
use crate::commands::github::GithubCredentials;
#[cfg(feature = "github")]
use crate::commands::limits::OutputFormat;
use crate::commands::shared::PullOptions;

#[derive(Parser)]
#[command(name = "intake")]
#[command(version)]
#[command(about = "A resilient document puller for GitHub and Confluence")]
#[command(
    long_about = "Intake pulls issues, pull requests, commits, releases and repositories from \
GitHub, and spaces, pages, blog posts, attachments, comments and tasks from Confluence, \
normalizing them into one document shape. Rate limits are respected, transient failures are \
retried, and a pull that partially fails still returns what it collected."
)]
#[command(after_long_help = r#"EXAMPLES
    Pull issues and pull requests from one repository:
        $ intake github pull rust-lang/cargo --types issues,prs

    Pull everything changed since the last run:
        $ intake github pull tokio-rs --since 2024-06-01T00:00:00Z

    Pull a Confluence space with a five minute budget:
        $ intake confluence pull ENG --timeout 300 --output eng.json

    Show GitHub rate limits:
        $ intake github limits

    Generate shell completions:
        $ intake completions bash > ~/.local/share/bash-completion/completions/intake

CONFIGURATION
    Intake reads configuration from:
      1. ~/.config/intake/config.toml (or $XDG_CONFIG_HOME/intake/config.toml)
      2. ./intake.toml
      3. Environment variables (INTAKE_* prefix, nested keys joined with __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    INTAKE_GITHUB_TOKEN           GitHub personal access token
    INTAKE_GITHUB_API_URL         GitHub API root (default: https://api.github.com)
    INTAKE_CONFLUENCE_BASE_URL    Confluence site URL
    INTAKE_CONFLUENCE_EMAIL       Atlassian account email
    INTAKE_CONFLUENCE_TOKEN       Atlassian API token
    INTAKE_PULL__TIMEOUT_SECS     Whole-pull timeout in seconds
    RUST_LOG                      Log filter (default: intake=info,intake_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GitHub operations
    #[cfg(feature = "github")]
    Github {
        #[command(subcommand)]
        action: GithubAction,
    },
    /// Confluence operations
    #[cfg(feature = "confluence")]
    Confluence {
        #[command(subcommand)]
        action: ConfluenceAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "github")]
#[derive(Subcommand)]
enum GithubAction {
    /// Pull documents from repositories
    Pull {
        /// `owner` for every repository of an account, or one or more
        /// `owner/name` (default: github.repositories from config)
        targets: Vec<String>,

        #[command(flatten)]
        credentials: GithubCredentials,

        #[command(flatten)]
        pull: PullOptions,
    },
    /// Show current rate limit status
    Limits {
        #[command(flatten)]
        credentials: GithubCredentials,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[cfg(feature = "confluence")]
#[derive(Subcommand)]
enum ConfluenceAction {
    /// Pull documents from one space, or from every visible space
    Pull {
        /// Space key (omit to pull every space the account can see)
        space: Option<String>,

        #[command(flatten)]
        credentials: ConfluenceCredentials,

        #[command(flatten)]
        pull: PullOptions,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean for JSON output
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("intake=info,intake_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "github")]
        Commands::Github { action } => {
            commands::github::handle_github(action, &config).await?;
        }
        #[cfg(feature = "confluence")]
        Commands::Confluence { action } => {
            commands::confluence::handle_confluence(action, &config).await?;
        }
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output)?;
        }
    }

    Ok(())
}
