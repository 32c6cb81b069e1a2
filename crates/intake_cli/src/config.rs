//! Configuration file support for intake.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags (credentials also read `INTAKE_GITHUB_TOKEN`,
//!    `INTAKE_CONFLUENCE_EMAIL`, ... through clap)
//! 2. Environment variables (prefixed with `INTAKE_`, nested keys joined with
//!    `__`, e.g. `INTAKE_PULL__TIMEOUT_SECS`)
//! 3. Config file (./intake.toml, then ~/.config/intake/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use INTAKE_GITHUB_TOKEN env var
//! api_url = "https://api.github.com"
//! repositories = ["rust-lang/cargo", "tokio-rs/tokio"]
//!
//! [confluence]
//! base_url = "https://acme.atlassian.net"
//! email = "me@acme.com"
//! token = "..."  # or use INTAKE_CONFLUENCE_TOKEN env var
//!
//! [pull]
//! timeout_secs = 600
//! page_size = 100
//! max_pages = 10
//! commit_cap = 50
//! requests_per_second = 10
//!
//! [retry]
//! max_attempts = 3
//! rate_limit_window_secs = 60
//! backoff_base_ms = 1000
//! backoff_cap_ms = 30000
//!
//! [rate_limit]
//! low_watermark = 10
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use intake::platform::{ClientOptions, rate_limits};
use intake::sync::{
    DEFAULT_COMMIT_CAP, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, RATE_LIMIT_WINDOW_MS,
};
use intake::{RetryPolicy, SourceKind};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Confluence configuration.
    pub confluence: ConfluenceConfig,
    /// Pull bounds and pacing.
    pub pull: PullConfig,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Rate-limit budget handling.
    pub rate_limit: RateLimitConfig,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    pub token: Option<String>,
    /// API root for GitHub Enterprise; defaults to api.github.com.
    pub api_url: Option<String>,
    /// `owner/name` repositories pulled when no scope is given on the
    /// command line.
    pub repositories: Vec<String>,
}

/// Confluence configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    /// Site URL, e.g. `https://acme.atlassian.net`.
    pub base_url: Option<String>,
    /// Account email used for basic auth.
    pub email: Option<String>,
    /// Atlassian API token.
    pub token: Option<String>,
}

/// Pull bounds and pacing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    /// Whole-pull timeout; 0 disables it.
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
    pub commit_cap: usize,
    /// Proactive pacing; 0 disables it. Defaults per source when unset.
    pub requests_per_second: Option<u32>,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            commit_cap: DEFAULT_COMMIT_CAP,
            requests_per_second: None,
        }
    }
}

/// Retry policy.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub rate_limit_window_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_window_secs: RATE_LIMIT_WINDOW_MS / 1000,
            backoff_base_ms: INITIAL_BACKOFF_MS,
            backoff_cap_ms: MAX_BACKOFF_MS,
        }
    }
}

/// Rate-limit budget handling.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls wait for the window reset below this many remaining requests.
    pub low_watermark: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            low_watermark: rate_limits::DEFAULT_LOW_WATERMARK,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/intake/config.toml)
    /// 3. Local config file (./intake.toml)
    /// 4. Environment variables with INTAKE_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("intake.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./intake.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., INTAKE_PULL__TIMEOUT_SECS -> pull.timeout_secs
        builder = builder.add_source(Self::environment());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    fn environment() -> Environment {
        Environment::with_prefix("INTAKE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "intake").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Library options for one source, with config overrides applied.
    pub fn client_options(&self, kind: SourceKind) -> ClientOptions {
        let mut options = ClientOptions::for_source(kind);
        options.retry = RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.rate_limit_window_secs),
            Duration::from_millis(self.retry.backoff_base_ms),
            Duration::from_millis(self.retry.backoff_cap_ms),
        );
        options.rate_limit = options
            .rate_limit
            .with_low_watermark(self.rate_limit.low_watermark);
        if let Some(rps) = self.pull.requests_per_second {
            options.requests_per_second = (rps > 0).then_some(rps);
        }
        options.fetch.page_size = self.pull.page_size.max(1);
        options.fetch.max_pages = self.pull.max_pages.max(1);
        options.fetch.commit_cap = self.pull.commit_cap;
        options
    }

    /// Whole-pull timeout, if configured.
    pub fn pull_timeout(&self) -> Option<Duration> {
        (self.pull.timeout_secs > 0).then(|| Duration::from_secs(self.pull.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert!(config.github.repositories.is_empty());
        assert!(config.confluence.base_url.is_none());
        assert_eq!(config.pull.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.rate_limit_window_secs, 60);
        assert_eq!(config.rate_limit.low_watermark, 10);
        assert_eq!(config.pull_timeout(), None);
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [github]
            token = "ghp_abc"
            api_url = "https://ghe.example.com/api/v3"
            repositories = ["o/a", "o/b"]

            [confluence]
            base_url = "https://acme.atlassian.net"
            email = "me@acme.com"
            token = "atl"

            [pull]
            timeout_secs = 120
            page_size = 50
            requests_per_second = 0

            [retry]
            max_attempts = 5
            backoff_base_ms = 500

            [rate_limit]
            low_watermark = 25
        "#,
        );

        assert_eq!(config.github.token.as_deref(), Some("ghp_abc"));
        assert_eq!(config.github.repositories, vec!["o/a", "o/b"]);
        assert_eq!(config.confluence.email.as_deref(), Some("me@acme.com"));
        assert_eq!(config.pull_timeout(), Some(Duration::from_secs(120)));

        let options = config.client_options(SourceKind::GitHub);
        assert_eq!(options.fetch.page_size, 50);
        assert_eq!(options.fetch.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(options.requests_per_second, None);
        assert_eq!(options.retry.max_attempts, 5);
        assert_eq!(
            options.retry.delay_for(intake::ErrorKind::ServerOrNetwork, 1),
            Some(Duration::from_millis(500))
        );
        assert_eq!(options.rate_limit.low_watermark, 25);
    }

    #[test]
    fn test_client_options_keep_source_defaults() {
        let config = Config::default();
        let confluence = config.client_options(SourceKind::Confluence);
        assert_eq!(
            confluence.rate_limit.assumed_limit,
            rate_limits::CONFLUENCE_ASSUMED_LIMIT
        );
        assert_eq!(
            confluence.requests_per_second,
            Some(rate_limits::CONFLUENCE_DEFAULT_RPS)
        );
        assert_eq!(confluence.retry, RetryPolicy::default());
    }

    #[test]
    fn test_config_merging_order() {
        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                "[pull]\npage_size = 20\nmax_pages = 3",
                FileFormat::Toml,
            ))
            .add_source(config::File::from_str("[pull]\npage_size = 40", FileFormat::Toml))
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.pull.page_size, 40);
        assert_eq!(config.pull.max_pages, 3);
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[pull\npage_size = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config = from_toml("[pull]\npage_size = 10\nunknown_field = true");
        assert_eq!(config.pull.page_size, 10);
    }

    #[test]
    fn test_default_config_path_names_intake() {
        if let Some(path) = Config::default_config_path() {
            assert!(path.to_string_lossy().contains("intake"));
        }
    }
}
