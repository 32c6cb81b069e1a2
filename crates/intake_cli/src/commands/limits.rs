use chrono::{DateTime, Utc};
use clap::ValueEnum;
use intake::RateLimitInfo;
use intake::github::GitHubRateLimitResponse;

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// One rate-limit budget as shown to the user.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct BudgetRow {
    #[tabled(rename = "Budget")]
    pub budget: String,
    #[tabled(rename = "Remaining")]
    pub remaining: usize,
    #[tabled(rename = "Limit")]
    pub limit: usize,
    #[tabled(rename = "Used %")]
    pub used_percent: String,
    #[tabled(rename = "Resets In")]
    pub resets_in: String,
    /// Pulls wait for the reset once remaining drops below the watermark.
    #[tabled(rename = "Pulls Wait")]
    pub pulls_wait: bool,
}

impl BudgetRow {
    pub(crate) fn new(
        budget: &str,
        info: &RateLimitInfo,
        low_watermark: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let used = info.limit.saturating_sub(info.remaining);
        let used_percent = if info.limit > 0 {
            format!("{:.1}%", used as f64 * 100.0 / info.limit as f64)
        } else {
            "-".to_string()
        };
        let until_reset = info.reset_at.signed_duration_since(now);
        let resets_in = if until_reset.num_seconds() > 0 {
            format_duration(until_reset)
        } else {
            "now".to_string()
        };

        Self {
            budget: budget.to_string(),
            remaining: info.remaining,
            limit: info.limit,
            used_percent,
            resets_in,
            pulls_wait: info.remaining < low_watermark,
        }
    }
}

/// Rows for every budget in a `GET /rate_limit` response, core first.
pub(crate) fn github_budget_rows(
    response: &GitHubRateLimitResponse,
    low_watermark: usize,
    now: DateTime<Utc>,
) -> Vec<BudgetRow> {
    let mut rows = Vec::new();
    if let Some(core) = response.core() {
        rows.push(BudgetRow::new("core", &core.to_info(), low_watermark, now));
    }
    if let Some(ref resources) = response.resources {
        let optional = [("search", &resources.search), ("graphql", &resources.graphql)];
        for (name, resource) in optional {
            if let Some(resource) = resource {
                rows.push(BudgetRow::new(name, &resource.to_info(), low_watermark, now));
            }
        }
    }
    rows
}

pub(crate) fn print_rows(rows: Vec<BudgetRow>, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    let (hours, mins, secs) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    match (hours, mins, secs) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, _) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}
