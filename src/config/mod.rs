pub mod validation;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use self::validation::validate_registry;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Canonical identifier for the give-up tool. Unknown or unparseable
/// responses are rewritten into an invocation of this tool.
pub const FALLBACK_TOOL: &str = "final_answer";

/// Tuning knobs for the parser wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Consecutive total-exhaustion results before the breaker opens.
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open before tiers run again.
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
    /// Attempt budget for the schema tier (transient failures only).
    #[serde(default = "default_tier1_max_attempts")]
    pub tier1_max_attempts: u32,
    /// Base backoff between schema-tier attempts.
    #[serde(default = "default_tier1_backoff_ms")]
    pub tier1_backoff_ms: u64,
    /// Human-readable answer carried by the give-up command.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_breaker_failure_threshold() -> u32 {
    10
}
fn default_breaker_cooldown_ms() -> u64 {
    30_000
}
fn default_tier1_max_attempts() -> u32 {
    3
}
fn default_tier1_backoff_ms() -> u64 {
    25
}
fn default_fallback_message() -> String {
    "I could not parse a valid tool invocation from the model response. \
     Please rephrase the request or try again."
        .to_string()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
            tier1_max_attempts: default_tier1_max_attempts(),
            tier1_backoff_ms: default_tier1_backoff_ms(),
            fallback_message: default_fallback_message(),
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.breaker_cooldown_ms)
    }

    #[must_use]
    pub fn tier1_backoff(&self) -> Duration {
        Duration::from_millis(self.tier1_backoff_ms)
    }
}

/// Declared JSON type for a tool-input key, used by full schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    #[must_use]
    pub fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// One tool entry in the registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpecConfig {
    pub name: String,
    /// Keys that must be present in `tool_input`.
    #[serde(default)]
    pub required: Vec<String>,
    /// Optional declared types for keys, checked by the schema tier only.
    #[serde(default)]
    pub types: Vec<KeyTypeConfig>,
    /// Alternate names the legacy tier rewrites to `name`.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyTypeConfig {
    pub key: String,
    pub kind: ValueKind,
}

/// Registry configuration as loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub tools: Vec<ToolSpecConfig>,
}

impl RegistryConfig {
    /// Parse a registry from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on YAML syntax errors or validation failures.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = serde_yaml::from_str(text)?;
        validate_registry(&config)?;
        Ok(config)
    }

    /// Load and validate a registry from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on I/O, YAML, or validation failures.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// The default registry table: the three tools the agent loop dispatches.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            tools: vec![
                ToolSpecConfig {
                    name: FALLBACK_TOOL.to_string(),
                    required: vec!["answer".to_string()],
                    types: vec![KeyTypeConfig {
                        key: "answer".to_string(),
                        kind: ValueKind::String,
                    }],
                    synonyms: vec![
                        "final".to_string(),
                        "answer".to_string(),
                        "finish_answer".to_string(),
                    ],
                },
                ToolSpecConfig {
                    name: "execute_local_python".to_string(),
                    required: vec!["code".to_string()],
                    types: vec![KeyTypeConfig {
                        key: "code".to_string(),
                        kind: ValueKind::String,
                    }],
                    synonyms: vec!["run_python".to_string(), "python".to_string()],
                },
                ToolSpecConfig {
                    name: "read_file".to_string(),
                    required: vec!["file_path".to_string()],
                    types: vec![KeyTypeConfig {
                        key: "file_path".to_string(),
                        kind: ValueKind::String,
                    }],
                    synonyms: vec![],
                },
            ],
        }
    }
}
