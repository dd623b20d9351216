//! stderr logging through `env_logger`.
//!
//! `RETISCAN_LOG` takes the usual `target=level` directives; when unset the
//! level stored in settings applies.

use crate::settings::LogLevel;
use env_logger::Builder;
use log::LevelFilter;

pub const LOG_ENV: &str = "RETISCAN_LOG";

fn builder(env_spec: Option<&str>, fallback: LogLevel) -> Builder {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::from(fallback))
        .format_timestamp_millis();
    if let Some(spec) = env_spec.filter(|s| !s.trim().is_empty()) {
        builder.parse_filters(spec);
    }
    builder
}

/// Installs the global logger. Calling it twice keeps the first logger.
pub fn init(fallback: LogLevel) {
    let env_spec = std::env::var(LOG_ENV).ok();
    if builder(env_spec.as_deref(), fallback).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_spec_overrides_fallback() {
        let logger = builder(Some("retiscan_app_lib::classifier=trace,warn"), LogLevel::Error).build();
        assert_eq!(logger.filter(), LevelFilter::Trace);
    }

    #[test]
    fn blank_spec_uses_settings_level() {
        let logger = builder(Some("  "), LogLevel::Debug).build();
        assert_eq!(logger.filter(), LevelFilter::Debug);
        let logger = builder(None, LogLevel::Warn).build();
        assert_eq!(logger.filter(), LevelFilter::Warn);
    }
}
