use anyhow::{bail, Context, Result};
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, File, FileFormat};
use engage_types::{GenerationProvider, UnparsedTimestampPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

/// Unipile account used for search, profile lookups, post listing and commenting
#[derive(Debug, Clone, Deserialize)]
pub struct Unipile {
    pub dsn: String,
    pub account_id: String,
    pub api_key: String,
    /// Saved Sales Navigator search that defines the target list
    pub search_url: String,
    pub max_people: usize,
    pub posts_limit: u32,
    pub timeout_secs: u64,
}

impl Unipile {
    pub fn base_url(&self) -> String {
        normalize_dsn(&self.dsn)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Slack {
    pub bot_token: String,
    /// Recipient of review messages (a user id opens a DM)
    pub user_id: String,
    pub timeout_secs: u64,
}

impl Slack {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    pub provider: GenerationProvider,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub prompt_path: Option<String>,
    pub timeout_secs: u64,
}

impl Generation {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the optional prompt file. A configured but unreadable file is an error.
    pub fn load_prompt(&self) -> Result<Option<String>> {
        match self.prompt_path.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read prompt file {}", path))?;
                Ok(Some(text))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub lookback_days: i64,
    /// Number of reviews a single batch run may enqueue
    pub budget: usize,
    pub dry_run: bool,
    pub debug: bool,
    pub unparsed_timestamps: UnparsedTimestampPolicy,
}

impl Run {
    /// Debug runs keep unparseable posts around so they can be inspected
    pub fn effective_unparsed_policy(&self) -> UnparsedTimestampPolicy {
        if self.debug {
            UnparsedTimestampPolicy::Retain
        } else {
            self.unparsed_timestamps
        }
    }
}

/// Randomized delays between upstream calls, in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct Pacing {
    pub enabled: bool,
    pub upsert_every: usize,
    pub upsert_min_ms: u64,
    pub upsert_max_ms: u64,
    pub target_min_ms: u64,
    pub target_max_ms: u64,
    pub review_min_ms: u64,
    pub review_max_ms: u64,
    pub publish_min_ms: u64,
    pub publish_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workers {
    pub concurrency: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub unipile: Unipile,
    pub slack: Slack,
    pub generation: Generation,
    pub run: Run,
    pub pacing: Pacing,
    pub workers: Workers,
}

/// Environment variables that override file settings
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DATABASE_PATH", "database.path"),
    ("UNIPILE_DSN", "unipile.dsn"),
    ("UNIPILE_ACCOUNT_ID", "unipile.account_id"),
    ("UNIPILE_API_KEY", "unipile.api_key"),
    ("SALESNAV_URL", "unipile.search_url"),
    ("SLACK_BOT_TOKEN", "slack.bot_token"),
    ("SLACK_USER_ID", "slack.user_id"),
    ("ANTHROPIC_API_KEY", "generation.api_key"),
    ("ANTHROPIC_MODEL", "generation.model"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = with_defaults(Config::builder())?;

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in engage-server directory (for development)
        let dev_path = PathBuf::from("engage-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        // 2. Override with environment variables (highest priority)
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }
        if let Ok(flag) = std::env::var("DRY_RUN") {
            let on = flag.trim() == "1" || flag.trim().eq_ignore_ascii_case("true");
            builder = builder.set_override("run.dry_run", on)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Build settings from defaults plus an inline TOML document, ignoring the
    /// environment
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        with_defaults(Config::builder())?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Settings that need nothing but defaults
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_toml_str("")
    }

    /// Names of required settings the search and feed stages are missing
    pub fn missing_for_source(&self) -> Vec<&'static str> {
        let mut missing = self.missing_unipile();
        if blank(&self.unipile.search_url) {
            missing.push("unipile.search_url (SALESNAV_URL)");
        }
        missing
    }

    /// Names of required settings a batch run is missing
    pub fn missing_for_batch(&self) -> Vec<&'static str> {
        let mut missing = self.missing_for_source();
        missing.extend(self.missing_slack());
        if self.generation.provider == GenerationProvider::Anthropic
            && blank(&self.generation.api_key)
        {
            missing.push("generation.api_key (ANTHROPIC_API_KEY)");
        }
        missing
    }

    /// Names of required settings the interactive server is missing
    pub fn missing_for_server(&self) -> Vec<&'static str> {
        let mut missing = self.missing_slack();
        if !self.run.dry_run {
            missing.extend(self.missing_unipile());
        }
        missing
    }

    pub fn ensure_source_ready(&self) -> Result<()> {
        refuse_if_missing(self.missing_for_source())
    }

    pub fn ensure_batch_ready(&self) -> Result<()> {
        refuse_if_missing(self.missing_for_batch())
    }

    pub fn ensure_server_ready(&self) -> Result<()> {
        refuse_if_missing(self.missing_for_server())
    }

    fn missing_unipile(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.unipile.dsn) {
            missing.push("unipile.dsn (UNIPILE_DSN)");
        }
        if blank(&self.unipile.account_id) {
            missing.push("unipile.account_id (UNIPILE_ACCOUNT_ID)");
        }
        if blank(&self.unipile.api_key) {
            missing.push("unipile.api_key (UNIPILE_API_KEY)");
        }
        missing
    }

    fn missing_slack(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.slack.bot_token) {
            missing.push("slack.bot_token (SLACK_BOT_TOKEN)");
        }
        if blank(&self.slack.user_id) {
            missing.push("slack.user_id (SLACK_USER_ID)");
        }
        missing
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    // Default to 0.0.0.0 for production deployment (allows external connections)
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("database.path", "engage.db")?
        .set_default("unipile.dsn", "")?
        .set_default("unipile.account_id", "")?
        .set_default("unipile.api_key", "")?
        .set_default("unipile.search_url", "")?
        .set_default("unipile.max_people", 200)?
        .set_default("unipile.posts_limit", 20)?
        .set_default("unipile.timeout_secs", 60)?
        .set_default("slack.bot_token", "")?
        .set_default("slack.user_id", "")?
        .set_default("slack.timeout_secs", 20)?
        .set_default("generation.provider", "anthropic")?
        .set_default("generation.api_key", "")?
        .set_default("generation.model", "claude-sonnet-4-5")?
        .set_default("generation.max_tokens", 200)?
        .set_default("generation.temperature", 0.7)?
        .set_default("generation.timeout_secs", 60)?
        .set_default("run.lookback_days", 30)?
        .set_default("run.budget", 5)?
        .set_default("run.dry_run", false)?
        .set_default("run.debug", false)?
        .set_default("run.unparsed_timestamps", "drop")?
        .set_default("pacing.enabled", true)?
        .set_default("pacing.upsert_every", 3)?
        .set_default("pacing.upsert_min_ms", 1500)?
        .set_default("pacing.upsert_max_ms", 3500)?
        .set_default("pacing.target_min_ms", 2000)?
        .set_default("pacing.target_max_ms", 4000)?
        .set_default("pacing.review_min_ms", 3000)?
        .set_default("pacing.review_max_ms", 6000)?
        .set_default("pacing.publish_min_ms", 800)?
        .set_default("pacing.publish_max_ms", 2000)?
        .set_default("workers.concurrency", 4)?
        .set_default("workers.queue_capacity", 256)
}

fn refuse_if_missing(missing: Vec<&'static str>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        bail!("Missing required settings: {}", missing.join(", "))
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Normalize a Unipile DSN into a base URL: trimmed, no trailing slash, with a scheme
pub fn normalize_dsn(dsn: &str) -> String {
    let dsn = dsn.trim().trim_end_matches('/');
    if dsn.starts_with("http://") || dsn.starts_with("https://") {
        dsn.to_string()
    } else {
        format!("https://{}", dsn)
    }
}
