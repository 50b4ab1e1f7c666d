// src/config.rs
//! Run configuration: a TOML file plus environment overrides.
//!
//! Every field has a serde default, so a partial `config/scout.toml` works.
//! Env overrides apply after the file load; an invalid value is warn-logged
//! and ignored instead of failing startup.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/scout.toml";
pub const ENV_CONFIG_PATH: &str = "SCOUT_CONFIG_PATH";

const ENV_SCORE_THRESHOLD: &str = "SCOUT_SCORE_THRESHOLD";
const ENV_MAX_CLUSTERS: &str = "SCOUT_MAX_CLUSTERS";
const ENV_SIMILARITY_THRESHOLD: &str = "SCOUT_SIMILARITY_THRESHOLD";
const ENV_INTERVAL_SECS: &str = "SCOUT_INTERVAL_SECS";

fn default_score_threshold() -> u8 {
    5
}
fn default_max_clusters() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.75
}
fn default_judge_timeout_secs() -> u64 {
    20
}
fn default_interval_secs() -> u64 {
    3600
}
fn default_reports_dir() -> String {
    "reports".to_string()
}
fn default_feeds() -> Vec<FeedEntry> {
    vec![FeedEntry {
        id: "google-news".to_string(),
        url: "https://news.google.com/rss?hl=en-US&gl=US&ceid=US:en".to_string(),
    }]
}

fn default_ai_enabled() -> bool {
    true
}
fn default_ai_provider() -> String {
    "openai".to_string()
}
fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ai_api_key() -> String {
    "ENV".to_string()
}
fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// One feed to scout, `[[feeds]]` in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub url: String,
}

/// `[ai]` block: which reasoning capability backs the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default = "default_ai_enabled")]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY at load time.
    #[serde(default = "default_ai_api_key")]
    pub api_key: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: default_ai_enabled(),
            provider: default_ai_provider(),
            model: default_ai_model(),
            api_key: default_ai_api_key(),
            base_url: default_ai_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Stories scoring at or above this make the report. 0-10.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u8,
    /// At most this many clusters reach the judge per run.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
    /// Title similarity at or above this joins two items into one cluster.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_judge_timeout_secs")]
    pub judge_timeout_secs: u64,
    /// Scheduler tick, seconds. Default hourly.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedEntry>,
    #[serde(default)]
    pub ai: AiSettings,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            max_clusters: default_max_clusters(),
            similarity_threshold: default_similarity_threshold(),
            judge_timeout_secs: default_judge_timeout_secs(),
            interval_secs: default_interval_secs(),
            reports_dir: default_reports_dir(),
            feeds: default_feeds(),
            ai: AiSettings::default(),
        }
    }
}

impl ScoutConfig {
    /// Load using env var + fallback:
    /// 1) $SCOUT_CONFIG_PATH (must exist when set)
    /// 2) config/scout.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                );
            }
            return Self::load_from_path(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_path(&default_path);
        }
        tracing::info!(
            target: "scout::config",
            path = DEFAULT_CONFIG_PATH,
            "config file not found, using defaults"
        );
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.resolve_ai_env();
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg: Self =
            toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        cfg.sanitize();
        cfg.apply_env_overrides();
        cfg.resolve_ai_env();
        Ok(cfg)
    }

    /// Keep file-provided values inside their contracts.
    fn sanitize(&mut self) {
        self.ai.provider = self.ai.provider.to_lowercase();
        if self.score_threshold > 10 {
            tracing::warn!(
                target: "scout::config",
                value = self.score_threshold,
                "score_threshold above 10, clamped"
            );
            self.score_threshold = 10;
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            tracing::warn!(
                target: "scout::config",
                value = self.similarity_threshold,
                "similarity_threshold outside [0, 1], using default"
            );
            self.similarity_threshold = default_similarity_threshold();
        }
    }

    /// Env overrides, applied after the file. Invalid values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u8>(ENV_SCORE_THRESHOLD) {
            self.score_threshold = v.min(10);
        }
        if let Some(v) = env_parse::<usize>(ENV_MAX_CLUSTERS) {
            self.max_clusters = v;
        }
        if let Some(v) = env_parse::<f32>(ENV_SIMILARITY_THRESHOLD) {
            self.similarity_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_parse::<u64>(ENV_INTERVAL_SECS) {
            self.interval_secs = v.max(1);
        }
    }

    /// Resolve the "ENV" api-key indirection and the base-url override.
    /// A missing key is not fatal here; the provider fails per call and the
    /// run surfaces `ScoringUnavailable`.
    pub fn resolve_ai_env(&mut self) {
        if self.ai.api_key.trim().eq_ignore_ascii_case("env") {
            match std::env::var("OPENAI_API_KEY") {
                Ok(k) if !k.trim().is_empty() => self.ai.api_key = k.trim().to_string(),
                _ => {
                    if self.ai.enabled && self.ai.provider == "openai" {
                        tracing::warn!(
                            target: "scout::config",
                            "OPENAI_API_KEY not set; judge calls will fail"
                        );
                    }
                    self.ai.api_key = String::new();
                }
            }
        }
        if let Ok(u) = std::env::var("OPENAI_API_BASE_URL") {
            if !u.trim().is_empty() {
                self.ai.base_url = u.trim().to_string();
            }
        }
    }
}

// parse optional env value; invalid input warns and yields None
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(
                target: "scout::config",
                key,
                value = %raw,
                "invalid env override ignored"
            );
            None
        }
    }
}
