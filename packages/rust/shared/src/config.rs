//! Application configuration for Newsreel.
//!
//! User config lives at `~/.newsreel/newsreel.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; sections name the env var that
//! holds each key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NewsreelError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsreel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsreel";

// ---------------------------------------------------------------------------
// Config structs (matching newsreel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Lead discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Vector-similarity deduplication settings.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Curation scoring weights and selection bounds.
    #[serde(default)]
    pub curation: CurationConfig,

    /// Stage runner retry/timeout policy.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// OpenAI settings (chat, embeddings, TTS).
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Perplexity settings (discovery, research).
    #[serde(default)]
    pub perplexity: PerplexityConfig,

    /// CDN object-store settings for audio uploads.
    #[serde(default)]
    pub cdn: CdnConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database path. Defaults to `<config dir>/newsreel.db` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { db_path: None }
    }
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Topic categories requested from the discovery collaborator.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Maximum leads requested per category.
    #[serde(default = "default_max_leads")]
    pub max_leads_per_category: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            max_leads_per_category: default_max_leads(),
        }
    }
}

fn default_categories() -> Vec<String> {
    ["politics", "technology", "business", "science", "world"]
        .map(String::from)
        .to_vec()
}
fn default_max_leads() -> u32 {
    5
}

/// `[dedup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Minimum cosine similarity for two leads to count as duplicates.
    /// Inclusive: a neighbor exactly at the threshold is a duplicate.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Maximum neighbors fetched per similarity query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.85
}
fn default_top_k() -> usize {
    5
}

/// `[curation.weights]` — relative weight of each scoring criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
    #[serde(default = "default_trust_weight")]
    pub source_trust: f64,
    #[serde(default = "default_priority_weight")]
    pub category_priority: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            recency: default_recency_weight(),
            source_trust: default_trust_weight(),
            category_priority: default_priority_weight(),
        }
    }
}

fn default_recency_weight() -> f64 {
    0.4
}
fn default_trust_weight() -> f64 {
    0.35
}
fn default_priority_weight() -> f64 {
    0.25
}

/// `[curation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Criterion weights; normalized at scoring time.
    #[serde(default)]
    pub weights: CriteriaWeights,

    /// Recency half-life: a lead this many hours old scores half the
    /// recency of a brand-new one.
    #[serde(default = "default_half_life_hours")]
    pub recency_half_life_hours: f64,

    /// Per-source trust scores on a 0–10 scale.
    #[serde(default)]
    pub source_trust: HashMap<String, f64>,

    /// Per-category priority scores on a 0–10 scale.
    #[serde(default)]
    pub category_priority: HashMap<String, f64>,

    /// Trust assigned to sources missing from the table.
    #[serde(default = "default_middle_score")]
    pub default_trust: f64,

    /// Priority assigned to categories missing from the table.
    #[serde(default = "default_middle_score")]
    pub default_priority: f64,

    /// Maximum leads selected for research.
    #[serde(default = "default_max_select")]
    pub max_select: usize,

    /// When a score floor is set and nothing clears it, fall back to the
    /// top this-many leads by score instead of selecting nothing.
    #[serde(default = "default_min_select")]
    pub min_select: usize,

    /// Optional minimum weighted score a lead must reach to be selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            weights: CriteriaWeights::default(),
            recency_half_life_hours: default_half_life_hours(),
            source_trust: HashMap::new(),
            category_priority: HashMap::new(),
            default_trust: default_middle_score(),
            default_priority: default_middle_score(),
            max_select: default_max_select(),
            min_select: default_min_select(),
            min_score: None,
        }
    }
}

fn default_half_life_hours() -> f64 {
    24.0
}
fn default_middle_score() -> f64 {
    5.0
}
fn default_max_select() -> usize {
    5
}
fn default_min_select() -> usize {
    3
}

/// `[runner]` section — per-lead retry/timeout policy for every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Per-lead deadline in seconds for one transform attempt.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt, for transient/timeout failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubles per retry.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_ms() -> u64 {
    500
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Chat model used for story writing.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Sampling temperature for story writing.
    #[serde(default = "default_writing_temperature")]
    pub writing_temperature: f64,

    /// Embedding model for deduplication.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimensions.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// TTS model for audio synthesis.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Anchor roster; one is picked at random per story.
    #[serde(default = "default_anchors")]
    pub anchors: Vec<AnchorVoice>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            chat_model: default_chat_model(),
            writing_temperature: default_writing_temperature(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            tts_model: default_tts_model(),
            anchors: default_anchors(),
        }
    }
}

/// One entry in the anchor roster: API voice name plus on-air name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorVoice {
    pub voice: String,
    pub name: String,
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_writing_temperature() -> f64 {
    0.7
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimensions() -> usize {
    1536
}
fn default_tts_model() -> String {
    "gpt-4o-mini-tts".into()
}
fn default_anchors() -> Vec<AnchorVoice> {
    vec![
        AnchorVoice {
            voice: "alloy".into(),
            name: "Alex Morgan".into(),
        },
        AnchorVoice {
            voice: "echo".into(),
            name: "Evan Reed".into(),
        },
        AnchorVoice {
            voice: "nova".into(),
            name: "Nora Vale".into(),
        },
    ]
}

/// `[perplexity]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_perplexity_key_env")]
    pub api_key_env: String,

    /// Model used for discovery and research calls.
    #[serde(default = "default_perplexity_model")]
    pub model: String,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_perplexity_key_env(),
            model: default_perplexity_model(),
        }
    }
}

fn default_perplexity_key_env() -> String {
    "PERPLEXITY_API_KEY".into()
}
fn default_perplexity_model() -> String {
    "sonar-pro".into()
}

/// `[cdn]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Base URL uploads are PUT to.
    #[serde(default)]
    pub upload_url: String,

    /// Public base URL returned for uploaded objects.
    #[serde(default)]
    pub public_url: String,

    /// Name of the env var holding the upload bearer token.
    #[serde(default = "default_cdn_token_env")]
    pub token_env: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            upload_url: String::new(),
            public_url: String::new(),
            token_env: default_cdn_token_env(),
        }
    }
}

fn default_cdn_token_env() -> String {
    "NEWSREEL_CDN_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsreel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsreelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsreel/newsreel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else `<config dir>/newsreel.db`.
pub fn db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.defaults.db_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join("newsreel.db")),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsreelError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        NewsreelError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsreelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsreelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsreelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Validate ranges that would otherwise surface as confusing stage failures.
pub fn validate(config: &AppConfig) -> Result<()> {
    let tau = config.dedup.similarity_threshold;
    if !(tau > 0.0 && tau <= 1.0) {
        return Err(NewsreelError::config(format!(
            "dedup.similarity_threshold must be in (0, 1], got {tau}"
        )));
    }
    if config.dedup.top_k == 0 {
        return Err(NewsreelError::config("dedup.top_k must be at least 1"));
    }

    let w = &config.curation.weights;
    let sum = w.recency + w.source_trust + w.category_priority;
    if !(sum > 0.0) || [w.recency, w.source_trust, w.category_priority]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(NewsreelError::config(
            "curation.weights must be non-negative and sum to a positive value",
        ));
    }
    if config.curation.max_select == 0 {
        return Err(NewsreelError::config("curation.max_select must be at least 1"));
    }

    Ok(())
}

/// Check that a section's API key env var is set and non-empty.
pub fn validate_api_key(section: &str, var_name: &str) -> Result<()> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(NewsreelError::config(format!(
            "{section} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("similarity_threshold"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.dedup.similarity_threshold, 0.85);
        assert_eq!(parsed.dedup.top_k, 5);
        assert_eq!(parsed.curation.max_select, 5);
        assert_eq!(parsed.openai.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[dedup]
similarity_threshold = 0.9

[curation.source_trust]
reuters = 9.0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.dedup.similarity_threshold, 0.9);
        assert_eq!(config.dedup.top_k, 5);
        assert_eq!(config.curation.source_trust.get("reuters"), Some(&9.0));
        assert_eq!(config.runner.max_retries, 2);
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.dedup.similarity_threshold = 1.5;
        assert!(validate(&config).is_err());

        config.dedup.similarity_threshold = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_zero_weights() {
        let mut config = AppConfig::default();
        config.curation.weights = CriteriaWeights {
            recency: 0.0,
            source_trust: 0.0,
            category_priority: 0.0,
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn api_key_validation() {
        // Use a unique env var name to avoid interfering with other tests
        let result = validate_api_key("OpenAI", "NR_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
