//! Circuit breaker behavior at the public API boundary.

use std::time::Duration;

use tool_salvage::{ParserConfig, SalvageParser, Tier, ToolRegistry};

const GOOD: &str = r#"{"tool": "final_answer", "tool_input": {"answer": "ok"}}"#;
const GARBAGE: &str = "no tool call anywhere in this response";

fn parser_with(threshold: u32, cooldown_ms: u64) -> SalvageParser {
    let config = ParserConfig {
        breaker_failure_threshold: threshold,
        breaker_cooldown_ms: cooldown_ms,
        tier1_backoff_ms: 0,
        ..ParserConfig::default()
    };
    SalvageParser::new(ToolRegistry::builtin(), config)
}

#[test]
fn opens_after_consecutive_exhaustions() {
    let parser = parser_with(3, 30_000);
    for _ in 0..3 {
        let outcome = parser.parse(GARBAGE);
        assert_eq!(outcome.tier_used, Tier::Legacy);
    }

    // Breaker is now open: even a perfectly good response is shed.
    let shed = parser.parse(GOOD);
    assert_eq!(shed.tier_used, Tier::CircuitBreaker);
    assert_eq!(shed.command.tool, "final_answer");
    assert_eq!(shed.attempts, 0);
    assert!(shed.success);
    assert!(parser.stats().circuit_breaker_active);
}

#[test]
fn interleaved_success_keeps_the_breaker_closed() {
    let parser = parser_with(3, 30_000);
    for _ in 0..2 {
        parser.parse(GARBAGE);
    }
    parser.parse(GOOD);
    for _ in 0..2 {
        parser.parse(GARBAGE);
    }

    let outcome = parser.parse(GOOD);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert!(!parser.stats().circuit_breaker_active);
}

#[test]
fn closes_after_cooldown_and_serves_normally() {
    let parser = parser_with(2, 50);
    parser.parse(GARBAGE);
    parser.parse(GARBAGE);
    assert_eq!(parser.parse(GOOD).tier_used, Tier::CircuitBreaker);

    std::thread::sleep(Duration::from_millis(70));

    let outcome = parser.parse(GOOD);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert!(!parser.stats().circuit_breaker_active);
}

#[test]
fn legacy_salvage_counts_as_success_for_the_breaker() {
    // Alternate key spellings resolve in the legacy tier; that is a
    // salvaged result, not an exhaustion, so the breaker stays closed.
    let parser = parser_with(2, 30_000);
    for _ in 0..4 {
        let outcome = parser.parse(r#"{"action": "final", "action_input": {"answer": "x"}}"#);
        assert_eq!(outcome.tier_used, Tier::Legacy);
        assert_eq!(outcome.command.tool, "final_answer");
    }
    assert!(!parser.stats().circuit_breaker_active);
    assert_eq!(parser.parse(GOOD).tier_used, Tier::Schema);
}

#[test]
fn shed_calls_are_counted_in_stats() {
    let parser = parser_with(1, 30_000);
    parser.parse(GARBAGE);
    parser.parse(GOOD);
    parser.parse(GOOD);

    let stats = parser.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.method_usage[&Tier::CircuitBreaker], 2);
    assert_eq!(stats.method_usage[&Tier::Legacy], 1);
    assert_eq!(stats.successful_parses, 0);
}

#[test]
fn reset_stats_also_closes_the_breaker() {
    let parser = parser_with(1, 30_000);
    parser.parse(GARBAGE);
    assert!(parser.stats().circuit_breaker_active);

    parser.reset_stats();
    assert!(!parser.stats().circuit_breaker_active);
    assert_eq!(parser.parse(GOOD).tier_used, Tier::Schema);
}
