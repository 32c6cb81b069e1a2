use intake::github::{DEFAULT_API_URL, GitHubClient};
use intake::{RepoRef, Scope, SourceKind};

use crate::GithubAction;
use crate::commands::limits::{github_budget_rows, print_rows};
use crate::commands::shared::{build_spec, require, run_pull};
use crate::config::Config;

const TOKEN_HINT: &str = "Pass --token or set INTAKE_GITHUB_TOKEN.";

pub(crate) async fn handle_github(
    action: GithubAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        GithubAction::Pull {
            targets,
            credentials,
            pull,
        } => {
            let targets = if targets.is_empty() {
                config.github.repositories.clone()
            } else {
                targets
            };
            let scope = scope_from_targets(&targets)?;
            let client = client(credentials, config)?;
            let spec = build_spec(scope, &pull, config);
            run_pull(client, &spec, pull.output.as_deref()).await?;
        }
        GithubAction::Limits {
            credentials,
            output,
        } => {
            let client = client(credentials, config)?;
            let response = client.get_rate_limits().await?;
            let rows = github_budget_rows(
                &response,
                config.rate_limit.low_watermark,
                chrono::Utc::now(),
            );
            print_rows(rows, output)?;
        }
    }

    Ok(())
}

/// GitHub credentials, read from flags, then the environment, then config.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GithubCredentials {
    /// GitHub API token
    #[arg(long, env = "INTAKE_GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API root for GitHub Enterprise (default: api.github.com)
    #[arg(long, env = "INTAKE_GITHUB_API_URL")]
    api_url: Option<String>,
}

fn client(
    credentials: GithubCredentials,
    config: &Config,
) -> Result<GitHubClient, Box<dyn std::error::Error>> {
    let token = require(
        credentials.token.or_else(|| config.github.token.clone()),
        SourceKind::GitHub,
        "token",
        TOKEN_HINT,
    )?;
    let api_url = credentials
        .api_url
        .or_else(|| config.github.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let client =
        GitHubClient::with_api_url(&token, &api_url, config.client_options(SourceKind::GitHub))?;
    Ok(client)
}

/// Turn `owner` / `owner/name` arguments into a pull scope.
///
/// A single bare owner pulls every repository of that account; anything else
/// must be a list of `owner/name` references.
fn scope_from_targets(targets: &[String]) -> Result<Scope, Box<dyn std::error::Error>> {
    match targets {
        [] => Err("No repositories given. Pass owner or owner/name, or set github.repositories in the config file.".into()),
        [single] if !single.contains('/') => Ok(Scope::Owner {
            owner: single.trim().to_string(),
            repo: None,
        }),
        [single] => {
            let repo: RepoRef = single.parse()?;
            Ok(Scope::Owner {
                owner: repo.owner,
                repo: Some(repo.name),
            })
        }
        many => {
            let repos = many
                .iter()
                .map(|t| t.parse::<RepoRef>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Scope::Repositories { repos })
        }
    }
}
