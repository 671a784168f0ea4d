use serde::{Deserialize, Serialize};

use crate::job::DEFAULT_MUSIC_TRACKS;
use crate::secrets::{resolve_secret, resolve_secret_optional, SecretError};
use secrecy::SecretString;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    /// Defaults to `~/.reelgen/data/reelgen.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub stock: StockConfig,
    #[serde(default)]
    pub music: MusicConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

fn default_workspace_root() -> String {
    dirs::home_dir()
        .map(|h| h.join(".reelgen").join("reels"))
        .unwrap_or_else(|| std::env::temp_dir().join("reelgen"))
        .to_string_lossy()
        .into_owned()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            workspace_root: default_workspace_root(),
            database_path: None,
            worker_count: default_worker_count(),
            fanout: FanoutConfig::default(),
            timeouts: TimeoutConfig::default(),
            stock: StockConfig::default(),
            music: MusicConfig::default(),
            logging: LoggingConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    #[serde(default = "default_max_concurrent_segments")]
    pub max_concurrent_segments: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_concurrent_segments() -> usize {
    20
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrent_segments: default_max_concurrent_segments(),
            retry: RetryConfig::default(),
        }
    }
}

/// Delay schedule shared by the prompt and image phases of a segment:
/// one `first_delay_ms` wait, then `escalations` waits of
/// `step_delay_ms * i` for `i = 1..=escalations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_first_delay_ms")]
    pub first_delay_ms: u64,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_escalations")]
    pub escalations: u32,
}

fn default_first_delay_ms() -> u64 {
    5_000
}

fn default_step_delay_ms() -> u64 {
    10_000
}

fn default_escalations() -> u32 {
    6
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: default_first_delay_ms(),
            step_delay_ms: default_step_delay_ms(),
            escalations: default_escalations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound on a single collaborator call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_call_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Fall back to generated images when the matched clips are shorter
    /// than the narration.
    #[serde(default = "default_true")]
    pub require_full_coverage: bool,
    /// Clips requested per transcript segment.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
}

fn default_true() -> bool {
    true
}

fn default_overfetch_factor() -> usize {
    2
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            require_full_coverage: true,
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicConfig {
    #[serde(default = "default_tracks")]
    pub tracks: Vec<String>,
}

fn default_tracks() -> Vec<String> {
    DEFAULT_MUSIC_TRACKS.iter().map(|t| t.to_string()).collect()
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            tracks: default_tracks(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    #[default]
    Http,
    /// Deterministic in-process collaborators; nothing leaves the machine.
    Stub,
}

/// Where a credential comes from. The first non-empty source wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretRef {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub env_var: Option<String>,
}

impl SecretRef {
    pub fn from_env(name: &str) -> Self {
        Self {
            value: None,
            file: None,
            env_var: Some(name.to_string()),
        }
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }

    /// For endpoints that may run without authentication.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub mode: ServiceMode,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub aligner: AlignerConfig,
    #[serde(default)]
    pub stock: StockSearchConfig,
    #[serde(default)]
    pub images: ImageServiceConfig,
    #[serde(default)]
    pub stitcher: StitcherConfig,
}

/// Chat completion and speech endpoints (script, prompts, narration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_key")]
    pub api_key: SecretRef,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key() -> SecretRef {
    SecretRef::from_env("OPENAI_API_KEY")
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_tts_model() -> String {
    "tts-1-hd".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: default_openai_key(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerConfig {
    #[serde(default = "default_aligner_url")]
    pub url: String,
}

fn default_aligner_url() -> String {
    "http://127.0.0.1:5000/generate_asr".to_string()
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            url: default_aligner_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSearchConfig {
    #[serde(default = "default_stock_url")]
    pub url: String,
    #[serde(default = "default_stock_key")]
    pub api_key: SecretRef,
}

fn default_stock_url() -> String {
    "https://api.pexels.com/videos/search".to_string()
}

fn default_stock_key() -> SecretRef {
    SecretRef::from_env("PEXELS_API_KEY")
}

impl Default for StockSearchConfig {
    fn default() -> Self {
        Self {
            url: default_stock_url(),
            api_key: default_stock_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageServiceConfig {
    #[serde(default = "default_image_url")]
    pub url: String,
    #[serde(default = "default_image_key")]
    pub api_key: SecretRef,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub width: u32,
    #[serde(default = "default_image_size")]
    pub height: u32,
}

fn default_image_url() -> String {
    "https://cloud.olakrutrim.com/v1/images/generations/diffusion".to_string()
}

fn default_image_key() -> SecretRef {
    SecretRef::from_env("IMAGE_API_KEY")
}

fn default_image_model() -> String {
    "diffusion1XL".to_string()
}

fn default_image_size() -> u32 {
    1024
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            url: default_image_url(),
            api_key: default_image_key(),
            model: default_image_model(),
            width: default_image_size(),
            height: default_image_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitcherConfig {
    #[serde(default = "default_stitcher_url")]
    pub url: String,
}

fn default_stitcher_url() -> String {
    "http://127.0.0.1:8080/create_slideshow".to_string()
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            url: default_stitcher_url(),
        }
    }
}
