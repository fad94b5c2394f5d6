use rustc_hash::FxHashSet;

use super::{ConfigError, RegistryConfig};

/// Validate a registry configuration before it is turned into a live table.
///
/// Rules:
/// - at least one tool entry
/// - tool names non-empty and unique
/// - required keys non-empty
/// - synonyms non-empty, unique across the registry, and never colliding
///   with a canonical tool name
///
/// # Errors
///
/// Returns `ConfigError::Validation` naming the first violation.
pub fn validate_registry(config: &RegistryConfig) -> Result<(), ConfigError> {
    if config.tools.is_empty() {
        return Err(ConfigError::Validation(
            "registry must declare at least one tool".to_string(),
        ));
    }

    let mut names: FxHashSet<&str> = FxHashSet::default();
    for tool in &config.tools {
        if tool.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tool name must be non-empty".to_string(),
            ));
        }
        if !names.insert(tool.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate tool name '{}'",
                tool.name
            )));
        }
        for key in &tool.required {
            if key.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tool '{}' declares an empty required key",
                    tool.name
                )));
            }
        }
    }

    let mut synonyms: FxHashSet<&str> = FxHashSet::default();
    for tool in &config.tools {
        for synonym in &tool.synonyms {
            if synonym.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tool '{}' declares an empty synonym",
                    tool.name
                )));
            }
            if names.contains(synonym.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "synonym '{}' collides with a canonical tool name",
                    synonym
                )));
            }
            if !synonyms.insert(synonym.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "synonym '{}' declared more than once",
                    synonym
                )));
            }
        }
    }

    Ok(())
}
