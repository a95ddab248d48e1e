//! Logging integration for ormbook.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-pattern spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "ormbook_db_backends=debug"). In debug mode a pretty, human-readable format
/// is used; otherwise a structured JSON format is used. Installing a second
/// subscriber is a silent no-op, so tests may call this repeatedly.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one query pattern run.
///
/// Every SQL statement logged while the span is entered carries the pattern
/// number and title.
///
/// # Examples
///
/// ```
/// use ormbook_core::logging::pattern_span;
///
/// let span = pattern_span(3, "Filter by name");
/// let _guard = span.enter();
/// tracing::info!("running pattern");
/// ```
pub fn pattern_span(number: u8, title: &str) -> tracing::Span {
    tracing::info_span!("pattern", number, title)
}
