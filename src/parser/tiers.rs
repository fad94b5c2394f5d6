//! The ordered parsing strategies. Tiers 1-4 implement [`ParseTier`] and are
//! registered into the chain at parser construction; the legacy terminal
//! handler never fails and lives behind its own entry point.

use std::sync::LazyLock;
use std::time::Duration;

use memchr::memchr;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::SalvageError;
use crate::json_scan;

use super::extract::{extract_candidates, CandidateBias, Candidates};
use super::sanitize::sanitize;
use super::validate::{self, RegistryVerdict, ToolRegistry};
use super::{ParsedCommand, Tier};

/// Shared per-call context handed to every tier.
pub(crate) struct TierContext<'a> {
    pub registry: &'a ToolRegistry,
    pub config: &'a ParserConfig,
}

/// One parsing strategy in the fallback chain.
pub(crate) trait ParseTier: Send + Sync {
    fn tier(&self) -> Tier;

    /// Attempt to produce a structurally valid command from `text`.
    ///
    /// Implementations bump `attempts` once per pipeline pass so the outcome
    /// reports real work done (the schema tier may pass several times).
    fn try_parse(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> Result<ParsedCommand, SalvageError>;
}

/// Assemble the tier chain for a registry.
///
/// The schema tier is only registered when the registry actually declares
/// per-tool schemas; otherwise it would duplicate the secondary tier and
/// burn its retry budget for nothing.
pub(crate) fn build_chain(registry: &ToolRegistry) -> Vec<Box<dyn ParseTier>> {
    let mut chain: Vec<Box<dyn ParseTier>> = Vec::with_capacity(4);
    if registry.has_schemas() {
        chain.push(Box::new(SchemaTier));
    }
    chain.push(Box::new(SecondaryTier));
    chain.push(Box::new(SchemaGuidedRegexTier));
    chain.push(Box::new(BroadRegexTier));
    chain
}

fn flag_unknown(verdict: RegistryVerdict, command: &ParsedCommand, tier: Tier) {
    if verdict == RegistryVerdict::Unknown {
        warn!(tool = %command.tool, ?tier, "unknown tool passed structural validation");
    }
}

/// Run sanitize -> decode over one candidate.
fn decode_candidate(candidate: &str) -> Result<serde_json::Value, SalvageError> {
    let cleaned = sanitize(candidate);
    if cleaned.is_empty() {
        return Err(SalvageError::Sanitize(
            "candidate reduced to nothing".to_string(),
        ));
    }
    serde_json::from_str(&cleaned).map_err(|e| SalvageError::Decode(e.to_string()))
}

/// Try the full pipeline over an ordered candidate list, first valid wins.
fn first_valid(
    candidates: &Candidates<'_>,
    ctx: &TierContext<'_>,
    tier: Tier,
    full_schema: bool,
) -> Result<ParsedCommand, SalvageError> {
    let mut last_err = SalvageError::Extract("no JSON-like span found".to_string());
    if candidates.is_empty() {
        return Err(last_err);
    }
    for candidate in candidates {
        match decode_candidate(candidate.text).and_then(|value| {
            let command = validate::structural(&value)?;
            let verdict = if full_schema {
                validate::check_schema(&command, ctx.registry)?
            } else {
                validate::check_required(&command, ctx.registry)?
            };
            Ok((command, verdict))
        }) {
            Ok((command, verdict)) => {
                flag_unknown(verdict, &command, tier);
                return Ok(command);
            }
            Err(err) => {
                debug!(origin = ?candidate.origin, error = %err, ?tier, "candidate rejected");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

// ---------------------------------------------------------------------------
// Tier 1: schema-validated decode with retry
// ---------------------------------------------------------------------------

pub(crate) struct SchemaTier;

impl ParseTier for SchemaTier {
    fn tier(&self) -> Tier {
        Tier::Schema
    }

    fn try_parse(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> Result<ParsedCommand, SalvageError> {
        let max_attempts = ctx.config.tier1_max_attempts.max(1);
        let mut last_err: Option<SalvageError> = None;
        for attempt in 1..=max_attempts {
            *attempts += 1;
            let candidates = extract_candidates(text, CandidateBias::FencedFirst);
            match first_valid(&candidates, ctx, Tier::Schema, true) {
                Ok(command) => return Ok(command),
                Err(err) => {
                    let retryable = err.is_retryable();
                    // Same input, same failure: the pipeline is
                    // deterministic, further passes cannot change it.
                    let repeated = last_err
                        .as_ref()
                        .is_some_and(|prev| prev.to_string() == err.to_string());
                    last_err = Some(err);
                    if !retryable || repeated {
                        break;
                    }
                    if attempt < max_attempts {
                        backoff(ctx.config.tier1_backoff(), attempt);
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| SalvageError::Extract("no JSON-like span found".to_string())))
    }
}

fn backoff(base: Duration, attempt: u32) {
    if base.is_zero() {
        return;
    }
    let jitter = Duration::from_millis(fastrand::u64(0..=base.as_millis().min(64) as u64));
    std::thread::sleep(base * attempt + jitter);
}

// ---------------------------------------------------------------------------
// Tier 2: secondary structured decode, label-anchored bias
// ---------------------------------------------------------------------------

pub(crate) struct SecondaryTier;

impl ParseTier for SecondaryTier {
    fn tier(&self) -> Tier {
        Tier::Secondary
    }

    fn try_parse(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> Result<ParsedCommand, SalvageError> {
        *attempts += 1;
        let candidates = extract_candidates(text, CandidateBias::LabelFirst);
        first_valid(&candidates, ctx, Tier::Secondary, false)
    }
}

// ---------------------------------------------------------------------------
// Tier 3: schema-guided regex extraction
// ---------------------------------------------------------------------------

static LABEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Markdown-decorated or bare action labels, half/full-width colon.
        r"(?i)\*{0,2}action\*{0,2}\s*[:：]",
        r"(?i)next action\s*[:：]",
        r"(?i)tool call\s*[:：]",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

pub(crate) struct SchemaGuidedRegexTier;

impl ParseTier for SchemaGuidedRegexTier {
    fn tier(&self) -> Tier {
        Tier::SchemaGuidedRegex
    }

    fn try_parse(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> Result<ParsedCommand, SalvageError> {
        *attempts += 1;
        let mut last_err =
            SalvageError::Extract("no action-label framing matched".to_string());
        for pattern in LABEL_PATTERNS.iter() {
            let Some(found) = pattern.find_iter(text).last() else {
                continue;
            };
            let Some(candidate) = object_after(text, found.end()) else {
                continue;
            };
            match decode_candidate(candidate).and_then(|value| {
                let command = validate::structural(&value)?;
                let verdict = validate::check_required(&command, ctx.registry)?;
                Ok((command, verdict))
            }) {
                Ok((command, verdict)) => {
                    flag_unknown(verdict, &command, Tier::SchemaGuidedRegex);
                    return Ok(command);
                }
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

/// Balanced object starting at the first `{` at or after `from`; truncated
/// objects run to the end of the text for the sanitizer to repair.
fn object_after(text: &str, from: usize) -> Option<&str> {
    let rel = memchr(b'{', &text.as_bytes()[from..])?;
    let open = from + rel;
    match json_scan::object_end(text.as_bytes(), open) {
        Some(end) => text.get(open..end),
        None => text.get(open..),
    }
}

// ---------------------------------------------------------------------------
// Tier 4: broad regex fallback over the full text
// ---------------------------------------------------------------------------

pub(crate) struct BroadRegexTier;

impl ParseTier for BroadRegexTier {
    fn tier(&self) -> Tier {
        Tier::BroadRegex
    }

    fn try_parse(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> Result<ParsedCommand, SalvageError> {
        *attempts += 1;
        let mut last_err = SalvageError::Extract("no generic pattern matched".to_string());

        let mut matches: Vec<&str> = Vec::new();
        // Pattern 1: any fenced block, regardless of language label.
        matches.extend(fenced_blocks(text));
        // Pattern 2: balanced objects mentioning a tool key.
        let spans = json_scan::top_level_objects(text);
        for span in &spans {
            let slice = &text[span.clone()];
            if json_scan::mentions_key(slice, "tool") {
                matches.push(slice);
            }
        }
        // Pattern 3: every balanced object, left to right.
        for span in &spans {
            matches.push(&text[span.clone()]);
        }

        if matches.is_empty() {
            return Err(last_err);
        }
        for candidate in matches {
            match decode_candidate(candidate).and_then(|value| {
                let command = validate::structural(&value)?;
                let verdict = validate::check_required(&command, ctx.registry)?;
                Ok((command, verdict))
            }) {
                Ok((command, verdict)) => {
                    flag_unknown(verdict, &command, Tier::BroadRegex);
                    return Ok(command);
                }
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

/// Contents of every fenced block in order, any language label accepted.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut cursor = 0usize;
    while let Some(rel) = memchr::memmem::find(&bytes[cursor..], b"```") {
        let lang_start = cursor + rel + 3;
        let Some(nl_rel) = memchr(b'\n', &bytes[lang_start..]) else {
            break;
        };
        let content_start = lang_start + nl_rel + 1;
        let Some(close_rel) = memchr::memmem::find(&bytes[content_start..], b"```") else {
            break;
        };
        let content_end = content_start + close_rel;
        if let Some(block) = text.get(content_start..content_end) {
            blocks.push(block);
        }
        cursor = content_end + 3;
    }
    blocks
}

// ---------------------------------------------------------------------------
// Tier 5: legacy best-effort decode (terminal, never fails)
// ---------------------------------------------------------------------------

/// Alternate key spellings the legacy tier accepts for the tool name and
/// its input map.
const TOOL_KEYS: &[&str] = &["tool", "action", "tool_name", "name"];
const INPUT_KEYS: &[&str] = &["tool_input", "action_input", "input", "args", "arguments"];

pub(crate) struct LegacyTier;

impl LegacyTier {
    /// Most permissive pass: accept any valid JSON object that names a
    /// tool, normalize synonyms, skip structural validation. When nothing
    /// salvageable exists, emit the canned give-up command and report the
    /// exhaustion so the wrapper can feed the breaker and stats.
    pub(crate) fn salvage(
        &self,
        text: &str,
        ctx: &TierContext<'_>,
        attempts: &mut u32,
    ) -> (ParsedCommand, Option<SalvageError>, bool) {
        *attempts += 1;
        let candidates = extract_candidates(text, CandidateBias::Permissive);
        for candidate in &candidates {
            let Ok(value) = decode_candidate(candidate.text) else {
                continue;
            };
            let Some(obj) = value.as_object() else {
                continue;
            };
            let Some(raw_name) = TOOL_KEYS
                .iter()
                .find_map(|key| obj.get(*key).and_then(serde_json::Value::as_str))
                .map(str::trim)
                .filter(|name| !name.is_empty())
            else {
                continue;
            };
            let tool = ctx.registry.canonical_name(raw_name).to_string();
            if tool != raw_name {
                debug!(from = raw_name, to = %tool, "normalized tool-name synonym");
            }
            let tool_input = INPUT_KEYS
                .iter()
                .find_map(|key| obj.get(*key).and_then(serde_json::Value::as_object))
                .cloned()
                .unwrap_or_default();
            return (ParsedCommand { tool, tool_input }, None, false);
        }

        warn!("all parse tiers exhausted, emitting give-up command");
        let error = SalvageError::Exhausted(
            "no tool invocation could be salvaged from the response".to_string(),
        );
        (
            ParsedCommand::give_up(&ctx.config.fallback_message),
            Some(error),
            true,
        )
    }
}
