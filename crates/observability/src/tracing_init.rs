//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format for process logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Structured JSON lines, for log shipping.
    #[default]
    Json,
    /// Human-readable output, for local development.
    Plain,
}

impl LogFormat {
    /// Read the format from `CONTABANK_LOG_FORMAT` (`json`/`plain`),
    /// defaulting to JSON.
    pub fn from_env() -> Self {
        match std::env::var("CONTABANK_LOG_FORMAT").ok().as_deref() {
            Some("plain") => Self::Plain,
            _ => Self::Json,
        }
    }
}

/// Initialize tracing/logging for the process, format taken from the
/// environment. Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env());
}

/// Initialize tracing/logging with an explicit format. Level filtering is
/// configurable via `RUST_LOG`, defaulting to `info`.
pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_a_noop() {
        init_with(LogFormat::Plain);
        init_with(LogFormat::Json);
        tracing::info!("still alive");
    }
}
