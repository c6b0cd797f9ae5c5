//! # natter-logging
//!
//! Installs the global `tracing` subscriber. Output goes to standard error
//! so the chat client's standard output only carries chat text.
//!
//! `RUST_LOG` takes precedence over the configured level.

#![deny(unsafe_code)]

use natter_settings::{LogFormat, LoggingSettings};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Build the event filter: `RUST_LOG` if set and valid, else the configured
/// level, else `info`.
pub fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging. Call once at startup.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TryInitError> {
    let filter = build_filter(settings);

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(fmt_layer).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_level_falls_back_to_info() {
        let settings = LoggingSettings {
            level: "[[not a directive".into(),
            format: LogFormat::Text,
        };
        // RUST_LOG may be set in the test environment; either way a filter is built.
        let filter = build_filter(&settings);
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn second_init_is_an_error() {
        let settings = LoggingSettings::default();
        let _ = init_logging(&settings);
        assert!(init_logging(&settings).is_err());
    }
}
