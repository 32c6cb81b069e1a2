use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use intake::{IngestError, PullOrchestrator, PullOutcome, PullSpec, ResourceType, Scope, SourceClient, SourceKind};

use crate::config::Config;
use crate::progress::{LoggingReporter, as_callback};

/// Options shared by every `pull` subcommand.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PullOptions {
    /// Resource types to pull, comma separated (default: every type of the source)
    #[arg(short = 't', long = "types", value_delimiter = ',', value_parser = parse_resource_type)]
    pub(crate) types: Vec<ResourceType>,

    /// Only pull items changed after this instant (RFC 3339)
    #[arg(short = 's', long)]
    pub(crate) since: Option<DateTime<Utc>>,

    /// Resume from the `next_since` of a previous pull (used when --since is absent)
    #[arg(short = 'C', long, conflicts_with = "since")]
    pub(crate) cursor: Option<String>,

    /// Give up after this many seconds and return what was collected (default from config)
    #[arg(short = 'T', long)]
    pub(crate) timeout: Option<u64>,

    /// Write the outcome JSON to this file instead of stdout
    #[arg(short, long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) fn parse_resource_type(value: &str) -> Result<ResourceType, String> {
    value.parse().map_err(|e: IngestError| e.to_string())
}

/// Build the pull request for `scope` from command-line options and config.
pub(crate) fn build_spec(scope: Scope, opts: &PullOptions, config: &Config) -> PullSpec {
    let source = scope.source_kind();
    let types: Vec<ResourceType> = if opts.types.is_empty() {
        source.resource_order().to_vec()
    } else {
        opts.types.clone()
    };

    let mut spec = PullSpec::new(scope, types);
    if let Some(since) = opts.since {
        spec = spec.since(since);
    } else if let Some(ref cursor) = opts.cursor {
        spec = spec.cursor(cursor.clone());
    }

    let timeout = match opts.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.pull_timeout(),
    };
    if let Some(timeout) = timeout {
        spec = spec.timeout(timeout);
    }
    spec
}

/// Run a pull with logging progress and write the outcome.
pub(crate) async fn run_pull<C: SourceClient>(
    client: C,
    spec: &PullSpec,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = Arc::new(LoggingReporter::new());
    let callback = as_callback(&reporter);

    let puller = PullOrchestrator::new(client);
    let outcome = puller.pull(spec, Some(&callback)).await?;

    log_summary(&outcome);
    write_outcome(&outcome, output)?;
    Ok(())
}

fn log_summary(outcome: &PullOutcome) {
    for report in &outcome.resources {
        for failure in &report.failures {
            tracing::warn!(
                resource = %report.resource_type,
                target = %failure.target,
                error = %failure.message,
                "Failed"
            );
        }
    }
    tracing::info!(
        documents = outcome.documents.len(),
        next_since = %outcome.next_since.to_rfc3339(),
        rate_limit_remaining = outcome.rate_limit_remaining,
        deadline_reached = outcome.deadline_reached,
        "Pull finished"
    );
}

pub(crate) fn render_outcome(outcome: &PullOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(outcome)
}

fn write_outcome(outcome: &PullOutcome, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = render_outcome(outcome)?;
    match output {
        Some(path) => {
            std::fs::write(path, json.as_bytes())?;
            tracing::info!(path = %path.display(), "Wrote outcome");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Reject a missing credential with a hint naming its flag and variable.
pub(crate) fn require(
    value: Option<String>,
    source: SourceKind,
    what: &str,
    hint: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Ok(v),
        None => Err(format!("No {source} {what} configured. {hint}").into()),
    }
}
