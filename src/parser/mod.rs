//! Multi-tier recovery parsing of tool invocations from LLM output.
//!
//! The public entry point is [`SalvageParser::parse`], which never panics
//! and never returns an unusable result: the final tier is a hand-rolled
//! fallback that at minimum produces a "give up gracefully" command.
//!
//! Key invariants:
//! - First tier to produce a structurally valid command wins.
//! - A structurally valid command names a non-empty tool and carries an
//!   object `tool_input` with the tool's registered required keys.
//! - The circuit breaker only sheds load; it never weakens the
//!   guaranteed-result contract.

mod breaker;
mod extract;
mod sanitize;
mod stats;
mod tiers;
pub mod validate;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ParserConfig, FALLBACK_TOOL};
use crate::error::SalvageError;

use breaker::FailureBreaker;
use stats::StatsRecorder;
use tiers::{build_chain, LegacyTier, ParseTier, TierContext};

pub use stats::ParserStats;
pub use validate::{RegistryVerdict, ToolRegistry, ToolSpec};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which strategy produced the returned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Schema,
    Secondary,
    SchemaGuidedRegex,
    BroadRegex,
    Legacy,
    CircuitBreaker,
}

/// The validated tool invocation: a tool name plus its input mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub tool: String,
    pub tool_input: serde_json::Map<String, serde_json::Value>,
}

impl ParsedCommand {
    /// The fixed safe command returned when nothing could be salvaged.
    #[must_use]
    pub fn give_up(message: &str) -> Self {
        let mut tool_input = serde_json::Map::with_capacity(1);
        tool_input.insert(
            "answer".to_string(),
            serde_json::Value::String(message.to_string()),
        );
        Self {
            tool: FALLBACK_TOOL.to_string(),
            tool_input,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tool": self.tool,
            "tool_input": self.tool_input,
        })
    }
}

/// Result of one top-level parse call.
///
/// `success` is always true at this boundary; trouble shows up as
/// `tier_used == Legacy` / `CircuitBreaker` or a non-null `error` carried
/// for diagnostics.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub success: bool,
    pub command: ParsedCommand,
    pub tier_used: Tier,
    pub attempts: u32,
    pub error: Option<String>,
    pub latency: Duration,
}

impl ParseOutcome {
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1_000.0
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// The guaranteed-result wrapper around the tier chain.
///
/// Each instance owns its breaker and statistics; multiple instances are
/// fully independent. A single instance is safe to share across threads —
/// internal state lives behind locks.
pub struct SalvageParser {
    config: ParserConfig,
    registry: ToolRegistry,
    chain: Vec<Box<dyn ParseTier>>,
    legacy: LegacyTier,
    breaker: FailureBreaker,
    stats: StatsRecorder,
}

impl SalvageParser {
    #[must_use]
    pub fn new(registry: ToolRegistry, config: ParserConfig) -> Self {
        let chain = build_chain(&registry);
        let breaker = FailureBreaker::new(
            config.breaker_failure_threshold,
            config.breaker_cooldown(),
        );
        Self {
            config,
            registry,
            chain,
            legacy: LegacyTier,
            breaker,
            stats: StatsRecorder::new(),
        }
    }

    /// Parser over the builtin registry with default tuning.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ToolRegistry::builtin(), ParserConfig::default())
    }

    /// Parse a model response into a tool invocation. Never panics, always
    /// returns an actionable command.
    pub fn parse(&self, response_text: &str) -> ParseOutcome {
        let start = Instant::now();

        if !self.breaker.allows() {
            let latency = start.elapsed();
            self.stats.record_call(Tier::CircuitBreaker, false, latency);
            debug!("circuit breaker open, returning canned fallback");
            return ParseOutcome {
                success: true,
                command: ParsedCommand::give_up(&self.config.fallback_message),
                tier_used: Tier::CircuitBreaker,
                attempts: 0,
                error: Some("circuit breaker open, tier chain skipped".to_string()),
                latency,
            };
        }

        let ctx = TierContext {
            registry: &self.registry,
            config: &self.config,
        };
        let mut attempts = 0u32;
        let mut last_error: Option<SalvageError> = None;

        for tier in &self.chain {
            match tier.try_parse(response_text, &ctx, &mut attempts) {
                Ok(command) => {
                    let latency = start.elapsed();
                    self.breaker.record_success();
                    self.stats.record_call(tier.tier(), true, latency);
                    debug!(tier = ?tier.tier(), tool = %command.tool, attempts, "parse succeeded");
                    return ParseOutcome {
                        success: true,
                        command,
                        tier_used: tier.tier(),
                        attempts,
                        error: last_error.map(|e| e.to_string()),
                        latency,
                    };
                }
                Err(err) => {
                    self.stats.record_error(err.kind());
                    debug!(tier = ?tier.tier(), error = %err, "tier failed, falling through");
                    last_error = Some(err);
                }
            }
        }

        let (command, exhaustion, gave_up) = self.legacy.salvage(response_text, &ctx, &mut attempts);
        if gave_up {
            self.breaker.record_failure();
            if let Some(err) = &exhaustion {
                self.stats.record_error(err.kind());
            }
        } else {
            self.breaker.record_success();
        }
        let latency = start.elapsed();
        self.stats.record_call(Tier::Legacy, !gave_up, latency);

        ParseOutcome {
            success: true,
            command,
            tier_used: Tier::Legacy,
            attempts,
            error: exhaustion
                .map(|e| e.to_string())
                .or_else(|| last_error.map(|e| e.to_string())),
            latency,
        }
    }

    /// Cumulative statistics for this instance.
    #[must_use]
    pub fn stats(&self) -> ParserStats {
        self.stats.snapshot(self.breaker.is_open())
    }

    /// Clear all counters and close the circuit breaker.
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.breaker.reset();
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl Default for SalvageParser {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
