use std::sync::Arc;
use std::time::Duration;

use crate::config::{ParserConfig, FALLBACK_TOOL};

use super::{SalvageParser, Tier, ToolRegistry};

/// Config with zeroed backoff so fallthrough tests don't sleep.
fn fast_config() -> ParserConfig {
    ParserConfig {
        tier1_backoff_ms: 0,
        ..ParserConfig::default()
    }
}

fn fast_parser() -> SalvageParser {
    SalvageParser::new(ToolRegistry::builtin(), fast_config())
}

#[test]
fn clean_json_parses_on_schema_tier() {
    let parser = fast_parser();
    let outcome =
        parser.parse(r#"{"tool": "read_file", "tool_input": {"file_path": "notes.txt"}}"#);
    assert!(outcome.success);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert_eq!(outcome.command.tool, "read_file");
    assert_eq!(outcome.command.tool_input["file_path"], "notes.txt");
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.error.is_none());
}

#[test]
fn fenced_block_with_surrounding_prose() {
    let parser = fast_parser();
    let text = "Sure, I'll read the file.\n```json\n{\"tool\": \"read_file\", \
                \"tool_input\": {\"file_path\": \"a.txt\"}}\n```\nLet me know!";
    let outcome = parser.parse(text);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert_eq!(outcome.command.tool, "read_file");
}

#[test]
fn single_quoted_pseudo_json_recovers() {
    let parser = fast_parser();
    let outcome =
        parser.parse(r#"{'tool': 'final_answer', 'tool_input': {'answer': "it's done"}}"#);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert_eq!(outcome.command.tool_input["answer"], "it's done");
}

#[test]
fn action_label_framing_parses() {
    let parser = fast_parser();
    let text = "Thought: I should answer now.\nAction: {\"tool\": \"final_answer\", \
                \"tool_input\": {\"answer\": \"42\"}}";
    let outcome = parser.parse(text);
    assert!(outcome.success);
    assert_eq!(outcome.command.tool, "final_answer");
    assert_eq!(outcome.command.tool_input["answer"], "42");
}

#[test]
fn truncated_tail_is_cut_not_closed() {
    let parser = fast_parser();
    let text = r#"{"tool": "final_answer", "tool_input": {"answer": "hi"}} {"oops":"#;
    let outcome = parser.parse(text);
    assert_eq!(outcome.command.tool, "final_answer");
    assert_eq!(outcome.command.tool_input["answer"], "hi");
}

#[test]
fn type_mismatch_falls_through_to_secondary() {
    // Schema tier rejects the number-typed `code`; the secondary tier only
    // checks required keys and accepts it.
    let parser = fast_parser();
    let outcome = parser.parse(r#"{"tool": "execute_local_python", "tool_input": {"code": 42}}"#);
    assert_eq!(outcome.tier_used, Tier::Secondary);
    assert_eq!(outcome.command.tool, "execute_local_python");
    assert!(outcome.error.is_some());
    // The schema tier notices the repeated identical failure on its second
    // pass and stops, so: 2 schema attempts + 1 secondary.
    assert_eq!(outcome.attempts, 3);
}

#[test]
fn unknown_tool_passes_open_world() {
    let parser = fast_parser();
    let outcome = parser.parse(r#"{"tool": "mystery_tool", "tool_input": {"x": 1}}"#);
    assert_eq!(outcome.tier_used, Tier::Schema);
    assert_eq!(outcome.command.tool, "mystery_tool");
}

#[test]
fn missing_required_key_lands_on_legacy() {
    // `read_file` without `file_path` fails tiers 1-4; the legacy tier
    // accepts it as-is since it skips structural validation.
    let parser = fast_parser();
    let outcome = parser.parse(r#"{"tool": "read_file", "tool_input": {}}"#);
    assert_eq!(outcome.tier_used, Tier::Legacy);
    assert_eq!(outcome.command.tool, "read_file");
    assert!(outcome.error.is_some());
}

#[test]
fn legacy_normalizes_alternate_keys_and_synonyms() {
    let parser = fast_parser();
    let outcome = parser.parse(r#"{"action": "final", "action_input": {"answer": "done"}}"#);
    assert_eq!(outcome.tier_used, Tier::Legacy);
    assert_eq!(outcome.command.tool, FALLBACK_TOOL);
    assert_eq!(outcome.command.tool_input["answer"], "done");
}

#[test]
fn garbage_yields_give_up_command() {
    let parser = fast_parser();
    let outcome = parser.parse("I'm sorry, I don't know what to do here.");
    assert!(outcome.success);
    assert_eq!(outcome.tier_used, Tier::Legacy);
    assert_eq!(outcome.command.tool, FALLBACK_TOOL);
    assert!(outcome.command.tool_input["answer"].is_string());
    assert!(outcome.error.is_some());
}

#[test]
fn empty_input_yields_give_up_command() {
    let parser = fast_parser();
    let outcome = parser.parse("");
    assert!(outcome.success);
    assert_eq!(outcome.command.tool, FALLBACK_TOOL);
}

#[test]
fn outcome_reserializes_to_the_same_command() {
    let parser = fast_parser();
    let first = parser.parse(r#"{'tool': 'final_answer', 'tool_input': {'answer': 'ok'}}"#);
    let rendered = format!("Action: {}", first.command.to_json());
    let second = parser.parse(&rendered);
    assert_eq!(second.command, first.command);
}

#[test]
fn breaker_opens_after_threshold_and_recovers() {
    let config = ParserConfig {
        breaker_failure_threshold: 2,
        breaker_cooldown_ms: 40,
        tier1_backoff_ms: 0,
        ..ParserConfig::default()
    };
    let parser = SalvageParser::new(ToolRegistry::builtin(), config);

    parser.parse("nothing useful");
    parser.parse("still nothing");

    let shed = parser.parse(r#"{"tool": "read_file", "tool_input": {"file_path": "a"}}"#);
    assert_eq!(shed.tier_used, Tier::CircuitBreaker);
    assert_eq!(shed.command.tool, FALLBACK_TOOL);
    assert_eq!(shed.attempts, 0);
    assert!(parser.stats().circuit_breaker_active);

    std::thread::sleep(Duration::from_millis(60));
    let recovered = parser.parse(r#"{"tool": "read_file", "tool_input": {"file_path": "a"}}"#);
    assert_eq!(recovered.tier_used, Tier::Schema);
    assert!(!parser.stats().circuit_breaker_active);
}

#[test]
fn successful_parse_resets_failure_streak() {
    let config = ParserConfig {
        breaker_failure_threshold: 2,
        breaker_cooldown_ms: 30_000,
        tier1_backoff_ms: 0,
        ..ParserConfig::default()
    };
    let parser = SalvageParser::new(ToolRegistry::builtin(), config);

    parser.parse("nothing useful");
    parser.parse(r#"{"tool": "final_answer", "tool_input": {"answer": "x"}}"#);
    parser.parse("nothing useful");

    let outcome = parser.parse(r#"{"tool": "final_answer", "tool_input": {"answer": "x"}}"#);
    assert_eq!(outcome.tier_used, Tier::Schema);
}

#[test]
fn stats_track_tiers_and_errors() {
    let parser = fast_parser();
    parser.parse(r#"{"tool": "final_answer", "tool_input": {"answer": "x"}}"#);
    parser.parse("no invocation here");

    let stats = parser.stats();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.successful_parses, 1);
    assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats.method_usage[&Tier::Schema], 1);
    assert_eq!(stats.method_usage[&Tier::Legacy], 1);
    assert!(!stats.error_breakdown.is_empty());
    assert!(!stats.circuit_breaker_active);

    parser.reset_stats();
    let stats = parser.stats();
    assert_eq!(stats.total_attempts, 0);
    assert!(stats.method_usage.is_empty());
}

#[test]
fn independent_instances_do_not_share_state() {
    let a = fast_parser();
    let b = fast_parser();
    a.parse("garbage");
    assert_eq!(a.stats().total_attempts, 1);
    assert_eq!(b.stats().total_attempts, 0);
}

#[test]
fn shared_instance_is_thread_safe() {
    let parser = Arc::new(fast_parser());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let parser = Arc::clone(&parser);
            std::thread::spawn(move || {
                let text = format!(
                    r#"{{"tool": "final_answer", "tool_input": {{"answer": "{i}"}}}}"#
                );
                parser.parse(&text)
            })
        })
        .collect();
    for handle in handles {
        let outcome = handle.join().unwrap();
        assert_eq!(outcome.command.tool, "final_answer");
    }
    assert_eq!(parser.stats().total_attempts, 4);
}
