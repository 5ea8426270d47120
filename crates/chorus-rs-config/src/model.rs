//! Configuration schema for Chorus.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root runtime config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChorusConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl ChorusConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ChorusConfigBuilder {
        ChorusConfigBuilder::new()
    }
}

/// Builder for assembling a `ChorusConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ChorusConfigBuilder {
    config: ChorusConfig,
}

impl ChorusConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ChorusConfig::default(),
        }
    }

    /// Replace the storage layout.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the LLM backend configuration.
    pub fn llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = llm;
        self
    }

    /// Replace the streaming cadence configuration.
    pub fn streaming(mut self, streaming: StreamingConfig) -> Self {
        self.config.streaming = streaming;
        self
    }

    /// Replace the context window policy.
    pub fn context(mut self, context: ContextConfig) -> Self {
        self.config.context = context;
        self
    }

    /// Replace the time formatting configuration.
    pub fn time(mut self, time: TimeConfig) -> Self {
        self.config.time = time;
        self
    }

    /// Replace the chat behavior configuration.
    pub fn chat(mut self, chat: ChatConfig) -> Self {
        self.config.chat = chat;
        self
    }

    /// Replace the memory configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the supervisor configuration.
    pub fn supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.config.supervisor = supervisor;
        self
    }

    /// Finalize and return the built `ChorusConfig`.
    pub fn build(self) -> ChorusConfig {
        self.config
    }
}

/// On-disk layout for per-bot files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root; relative paths resolve against the working directory.
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_memory_dir")]
    pub memory_dir: String,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            memory_dir: default_memory_dir(),
            config_dir: default_config_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl StorageConfig {
    /// Storage rooted at an explicit directory.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(root.as_ref().to_string_lossy().to_string()),
            ..Self::default()
        }
    }

    /// Resolve every storage directory against `cwd`.
    pub fn resolve(&self, cwd: &Path) -> StoragePaths {
        let root = match self.root.as_deref() {
            Some(root) if Path::new(root).is_absolute() => PathBuf::from(root),
            Some(root) => cwd.join(root),
            None => cwd.to_path_buf(),
        };
        StoragePaths {
            memory_dir: root.join(&self.memory_dir),
            config_dir: root.join(&self.config_dir),
            log_dir: root.join(&self.log_dir),
        }
    }
}

/// Absolute storage directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub memory_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

fn default_memory_dir() -> String {
    "LTM".to_string()
}

fn default_config_dir() -> String {
    "Configs".to_string()
}

fn default_log_dir() -> String {
    "Logs".to_string()
}

/// OpenAI-compatible backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Streaming model used for chat turns.
    #[serde(default = "default_smart_model")]
    pub smart: ModelConfig,
    /// Model used for task queries and response summaries.
    #[serde(default = "default_fast_model")]
    pub fast: ModelConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            smart: default_smart_model(),
            fast: default_fast_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Model name and sampling temperature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub temperature: f32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_smart_model() -> ModelConfig {
    ModelConfig {
        name: "gpt-4".to_string(),
        temperature: 0.65,
    }
}

fn default_fast_model() -> ModelConfig {
    ModelConfig {
        name: "gpt-3.5-turbo".to_string(),
        temperature: 0.1,
    }
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Cadence of outward message edits while a reply streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Upper bound between checks while waiting for the first content.
    #[serde(default = "default_first_content_poll_ms")]
    pub first_content_poll_ms: u64,
    /// Minimum spacing between outward edits.
    #[serde(default = "default_edit_interval_ms")]
    pub edit_interval_ms: u64,
    /// Hard limit on a single generation.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            first_content_poll_ms: default_first_content_poll_ms(),
            edit_interval_ms: default_edit_interval_ms(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_first_content_poll_ms() -> u64 {
    200
}

fn default_edit_interval_ms() -> u64 {
    300
}

fn default_generation_timeout_secs() -> u64 {
    300
}

/// How much history accompanies each generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextWindow {
    /// Send the whole conversation.
    #[default]
    Full,
    /// Send only the last `n` messages.
    Recent(usize),
}

/// Context window policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextConfig {
    #[serde(default)]
    pub window: ContextWindow,
}

/// Timezone and format used for every time stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Suffix appended to stamps shown to the model.
    #[serde(default = "default_time_label")]
    pub label: String,
    /// `strftime` format.
    #[serde(default = "default_time_format")]
    pub format: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            label: default_time_label(),
            format: default_time_format(),
        }
    }
}

fn default_timezone() -> String {
    "US/Eastern".to_string()
}

fn default_time_label() -> String {
    "EST".to_string()
}

fn default_time_format() -> String {
    "%m-%d-%Y %I:%M %p".to_string()
}

/// Chat turn behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Formatting hint appended to the system prompt for platform turns.
    #[serde(default = "default_venue_hint")]
    pub venue_hint: String,
    #[serde(default)]
    pub admins: Vec<AdminConfig>,
    /// Phrase that makes an admin message hard-reset memory.
    #[serde(default = "default_reset_phrase")]
    pub reset_phrase: String,
    /// Text shown to users when a turn fails.
    #[serde(default = "default_failure_notice")]
    pub failure_notice: String,
    /// Instruction for the condensed audit summary.
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,
    /// Message posted when the bot joins a venue.
    #[serde(default = "default_join_greeting")]
    pub join_greeting: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            venue_hint: default_venue_hint(),
            admins: Vec::new(),
            reset_phrase: default_reset_phrase(),
            failure_notice: default_failure_notice(),
            summary_prompt: default_summary_prompt(),
            join_greeting: default_join_greeting(),
        }
    }
}

impl ChatConfig {
    /// Find the admin entry matching a platform handle.
    pub fn admin(&self, handle: &str) -> Option<&AdminConfig> {
        self.admins.iter().find(|admin| admin.handle == handle)
    }
}

/// Operator account with elevated commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminConfig {
    /// Handle as reported by the platform.
    pub handle: String,
    /// Name the bot should use for this admin.
    #[serde(default)]
    pub alias: Option<String>,
}

fn default_venue_hint() -> String {
    "\n\nRemember that the Assistant and User are communicating via a group chat, so keep your \
     messages very brief, concise, around 1-2 paragraphs or less in length and use appropriate \
     formatting (eg *italic text*)."
        .to_string()
}

fn default_reset_phrase() -> String {
    "reset memory".to_string()
}

fn default_failure_notice() -> String {
    "Sorry, something went wrong while generating a reply. Please try again.".to_string()
}

fn default_summary_prompt() -> String {
    "Shorten the given text aggressively and densely. Respond only with this shortened version."
        .to_string()
}

fn default_join_greeting() -> String {
    "Hello, I am your new bot!".to_string()
}

/// Memory persistence behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    /// Move an unreadable snapshot aside and start fresh instead of failing.
    #[serde(default)]
    pub recover_corrupt: bool,
}

/// Worker supervision timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Delay between launching consecutive bots.
    #[serde(default = "default_launch_stagger_secs")]
    pub launch_stagger_secs: u64,
    /// First restart delay; doubles per consecutive failure.
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            launch_stagger_secs: default_launch_stagger_secs(),
            restart_backoff_secs: default_restart_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_launch_stagger_secs() -> u64 {
    2
}

fn default_restart_backoff_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    300
}
