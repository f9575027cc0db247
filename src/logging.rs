//! Logging setup for the provider.
//!
//! Every CRUD step emits `tracing` events with structured fields (`id`,
//! `name`, `env`, `role`). This module installs the subscriber that renders
//! them. Output goes to **stderr**; stdout belongs to the host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives, e.g. `info` or `hemmer_provider_ghost=debug`.
//!
//! ```bash
//! # Show every request the client builds
//! RUST_LOG=hemmer_provider_ghost::client=debug ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with a caller-chosen fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Install the subscriber if none is set yet. Returns `false` when one was.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

/// `RUST_LOG` if present and valid, else `default_level`.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only
    // try_init_logging is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_ghost=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_ghost::client=debug").is_ok());
    }

    #[test]
    fn test_default_level_filter() {
        let filter = env_filter("debug");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_try_init_logging_twice() {
        let _ = try_init_logging();
        // A subscriber is in place now, whoever installed it
        assert!(!try_init_logging());
    }
}
