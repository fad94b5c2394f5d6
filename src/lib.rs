//! tool-salvage: best-effort recovery of tool invocations from LLM output.
//!
//! Production LLM agents receive tool calls as free-form text: fenced JSON,
//! `Action:` framing, single-quoted pseudo-JSON, truncated objects, or prose
//! with a JSON island somewhere inside. This crate turns that text into a
//! validated `{tool, tool_input}` command through a chain of progressively
//! more permissive parsing tiers, with a circuit breaker and per-instance
//! statistics around the whole thing.
//!
//! ```
//! use tool_salvage::parser::SalvageParser;
//!
//! let parser = SalvageParser::with_defaults();
//! let outcome = parser.parse(r#"Action: {"tool": "final_answer", "tool_input": {"answer": "42"}}"#);
//! assert_eq!(outcome.command.tool, "final_answer");
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod parser;

pub(crate) mod json_scan;

pub use config::{ParserConfig, RegistryConfig};
pub use error::SalvageError;
pub use parser::{ParseOutcome, ParsedCommand, SalvageParser, Tier, ToolRegistry};
