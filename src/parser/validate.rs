//! Structural validation of decoded candidates against the minimal
//! `{tool, tool_input}` contract and the per-tool required-key table.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::config::{RegistryConfig, ValueKind};
use crate::error::SalvageError;

use super::ParsedCommand;

/// A registered tool: its required input keys and optional key types.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub required: Vec<String>,
    pub key_types: Vec<(String, ValueKind)>,
}

/// The advisory registry of known tools.
///
/// Known names get required-key (and, in the schema tier, type) checks;
/// unknown names pass structural validation open-world but are flagged so
/// callers can log them.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    specs: FxHashMap<String, ToolSpec>,
    synonyms: FxHashMap<String, String>,
}

/// Whether the validated tool name was found in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryVerdict {
    Known,
    Unknown,
}

impl ToolRegistry {
    #[must_use]
    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut specs = FxHashMap::default();
        let mut synonyms = FxHashMap::default();
        for tool in &config.tools {
            for synonym in &tool.synonyms {
                synonyms.insert(synonym.clone(), tool.name.clone());
            }
            specs.insert(
                tool.name.clone(),
                ToolSpec {
                    name: tool.name.clone(),
                    required: tool.required.clone(),
                    key_types: tool
                        .types
                        .iter()
                        .map(|t| (t.key.clone(), t.kind))
                        .collect(),
                },
            );
        }
        Self { specs, synonyms }
    }

    /// The default three-tool table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_config(&RegistryConfig::builtin())
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    /// Resolve a synonym to its canonical tool name. Unrecognized names come
    /// back unchanged.
    #[must_use]
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.synonyms.get(name).map_or(name, String::as_str)
    }

    /// Whether any registered tool declares required keys or key types.
    ///
    /// When nothing does, full schema validation degenerates to the
    /// structural check and the schema tier is not registered separately.
    #[must_use]
    pub fn has_schemas(&self) -> bool {
        self.specs
            .values()
            .any(|spec| !spec.required.is_empty() || !spec.key_types.is_empty())
    }
}

/// Check the minimal invocation shape and build a [`ParsedCommand`].
///
/// Rules: the value is an object, `tool` is a non-empty string, and
/// `tool_input` is an object (not a string, not an array).
///
/// # Errors
///
/// Returns [`SalvageError::Validation`] naming the first violated rule.
pub(crate) fn structural(value: &Value) -> Result<ParsedCommand, SalvageError> {
    let Some(obj) = value.as_object() else {
        return Err(SalvageError::Validation(format!(
            "expected a JSON object, got {}",
            kind_label(value)
        )));
    };

    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SalvageError::Validation("missing or empty 'tool' string".to_string())
        })?;

    let tool_input = match obj.get("tool_input") {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(SalvageError::Validation(format!(
                "'tool_input' must be an object, got {}",
                kind_label(other)
            )));
        }
        None => {
            return Err(SalvageError::Validation(
                "missing 'tool_input' object".to_string(),
            ));
        }
    };

    Ok(ParsedCommand {
        tool: tool.to_string(),
        tool_input,
    })
}

/// Required-key check against the registry (secondary and regex tiers).
///
/// # Errors
///
/// Returns [`SalvageError::Validation`] when a registered tool is missing a
/// required input key.
pub(crate) fn check_required(
    command: &ParsedCommand,
    registry: &ToolRegistry,
) -> Result<RegistryVerdict, SalvageError> {
    let Some(spec) = registry.spec(&command.tool) else {
        return Ok(RegistryVerdict::Unknown);
    };
    for key in &spec.required {
        if !command.tool_input.contains_key(key) {
            return Err(SalvageError::Validation(format!(
                "tool '{}' requires input key '{}'",
                spec.name, key
            )));
        }
    }
    Ok(RegistryVerdict::Known)
}

/// Full per-tool schema check: required keys plus declared key types
/// (schema tier only).
///
/// # Errors
///
/// Returns [`SalvageError::Validation`] on a missing key or type mismatch.
pub(crate) fn check_schema(
    command: &ParsedCommand,
    registry: &ToolRegistry,
) -> Result<RegistryVerdict, SalvageError> {
    let verdict = check_required(command, registry)?;
    let Some(spec) = registry.spec(&command.tool) else {
        return Ok(verdict);
    };
    for (key, kind) in &spec.key_types {
        if let Some(value) = command.tool_input.get(key) {
            if !kind.matches(value) {
                return Err(SalvageError::Validation(format!(
                    "tool '{}' input key '{}' must be {}, got {}",
                    spec.name,
                    key,
                    kind.label(),
                    kind_label(value)
                )));
            }
        }
    }
    Ok(verdict)
}

/// Human-readable label for a JSON value kind.
fn kind_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structural_accepts_minimal_shape() {
        let value = json!({"tool": "anything", "tool_input": {"k": 1}});
        let command = structural(&value).unwrap();
        assert_eq!(command.tool, "anything");
        assert_eq!(command.tool_input["k"], 1);
    }

    #[test]
    fn structural_rejects_string_tool_input() {
        let value = json!({"tool": "x", "tool_input": "not a map"});
        assert!(structural(&value).is_err());
    }

    #[test]
    fn structural_rejects_empty_tool_name() {
        let value = json!({"tool": "  ", "tool_input": {}});
        assert!(structural(&value).is_err());
    }

    #[test]
    fn required_key_enforced_for_known_tool() {
        let registry = ToolRegistry::builtin();
        let missing = structural(&json!({"tool": "read_file", "tool_input": {}})).unwrap();
        assert!(check_required(&missing, &registry).is_err());

        let ok = structural(&json!({
            "tool": "read_file",
            "tool_input": {"file_path": "a.txt"}
        }))
        .unwrap();
        assert_eq!(
            check_required(&ok, &registry).unwrap(),
            RegistryVerdict::Known
        );
    }

    #[test]
    fn unknown_tool_passes_open_world() {
        let registry = ToolRegistry::builtin();
        let command = structural(&json!({"tool": "mystery", "tool_input": {}})).unwrap();
        assert_eq!(
            check_required(&command, &registry).unwrap(),
            RegistryVerdict::Unknown
        );
    }

    #[test]
    fn schema_check_rejects_wrong_type() {
        let registry = ToolRegistry::builtin();
        let command = structural(&json!({
            "tool": "execute_local_python",
            "tool_input": {"code": 42}
        }))
        .unwrap();
        assert!(check_schema(&command, &registry).is_err());
    }

    #[test]
    fn synonyms_resolve_to_canonical() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.canonical_name("final"), "final_answer");
        assert_eq!(registry.canonical_name("unknown"), "unknown");
    }
}
