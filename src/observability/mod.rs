//! Tracing setup for applications embedding the parser.
//!
//! The library itself only emits events; installing a subscriber is the
//! host's job. This helper covers the common case of a level name coming
//! from host configuration, with `RUST_LOG` taking precedence when set.

use tracing_subscriber::EnvFilter;

/// Install a formatted tracing subscriber filtered to `log_level`.
///
/// Accepts the usual tracing level names plus the aliases `WARNING` and
/// `CRITICAL`; `DISABLED` installs nothing. Returns whether a subscriber
/// was installed — false when disabled or when one is already set.
pub fn init_tracing(log_level: &str) -> bool {
    let level = log_level.trim().to_uppercase();
    if level == "DISABLED" || level.is_empty() {
        return false;
    }

    let directive = match level.as_str() {
        "WARNING" => "warn",
        "CRITICAL" => "error",
        other => other,
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_installs_nothing() {
        assert!(!init_tracing("DISABLED"));
        assert!(!init_tracing(""));
        assert!(!init_tracing("  disabled  "));
    }
}
