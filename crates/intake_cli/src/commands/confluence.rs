use intake::confluence::ConfluenceClient;
use intake::{Scope, SourceKind};

use crate::ConfluenceAction;
use crate::commands::shared::{build_spec, require, run_pull};
use crate::config::Config;

pub(crate) async fn handle_confluence(
    action: ConfluenceAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfluenceAction::Pull {
            space,
            credentials,
            pull,
        } => {
            let scope = Scope::Space {
                key: space.map(|key| key.trim().to_string()),
            };
            let client = client(credentials, config)?;
            let spec = build_spec(scope, &pull, config);
            run_pull(client, &spec, pull.output.as_deref()).await?;
        }
    }

    Ok(())
}

/// Confluence credentials, read from flags, then the environment, then config.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ConfluenceCredentials {
    /// Site URL, e.g. https://acme.atlassian.net
    #[arg(long, env = "INTAKE_CONFLUENCE_BASE_URL")]
    base_url: Option<String>,

    /// Account email used for basic auth
    #[arg(long, env = "INTAKE_CONFLUENCE_EMAIL")]
    email: Option<String>,

    /// Atlassian API token
    #[arg(long, env = "INTAKE_CONFLUENCE_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

fn client(
    credentials: ConfluenceCredentials,
    config: &Config,
) -> Result<ConfluenceClient, Box<dyn std::error::Error>> {
    let base_url = require(
        credentials.base_url.or_else(|| config.confluence.base_url.clone()),
        SourceKind::Confluence,
        "site URL",
        "Pass --base-url or set INTAKE_CONFLUENCE_BASE_URL.",
    )?;
    let email = require(
        credentials.email.or_else(|| config.confluence.email.clone()),
        SourceKind::Confluence,
        "email",
        "Pass --email or set INTAKE_CONFLUENCE_EMAIL.",
    )?;
    let token = require(
        credentials.token.or_else(|| config.confluence.token.clone()),
        SourceKind::Confluence,
        "API token",
        "Pass --token or set INTAKE_CONFLUENCE_TOKEN.",
    )?;

    let client = ConfluenceClient::new(
        &base_url,
        &email,
        &token,
        config.client_options(SourceKind::Confluence),
    )?;
    Ok(client)
}
