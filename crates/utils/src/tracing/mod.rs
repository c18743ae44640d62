use shmcache_core::SHMCACHE_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// `RUST_LOG` wins, then `SHMCACHE_LOG`, then `default_directive`. Output goes
/// to stderr so command output on stdout stays machine readable.
pub fn init(default_directive: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = build_filter(default_directive)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_filter(default_directive: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    if let Ok(directives) = std::env::var(SHMCACHE_LOG_VAR) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(default_directive)
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for one cache operation
pub fn cache_span(operation: &'static str, namespace: &str) -> Span {
    span!(Level::DEBUG, "shmcache", operation = operation, namespace = %namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_shmcache_log_is_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        std::env::set_var(SHMCACHE_LOG_VAR, "debug");
        let filter = build_filter("warn").unwrap();
        std::env::remove_var(SHMCACHE_LOG_VAR);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_default_directive_fallback() {
        std::env::remove_var("RUST_LOG");
        std::env::remove_var(SHMCACHE_LOG_VAR);
        let filter = build_filter("warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }
}
