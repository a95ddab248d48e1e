//! Settings for ormbook.
//!
//! [`Settings`] holds everything the showcase needs at runtime: which database
//! to open, how verbose logging is, and a few knobs for the pattern runner.
//! Every field has a default so partial configuration files work.

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine. Only `"sqlite"` can be opened.
    pub engine: String,
    /// The database file path, or `:memory:` for an in-memory database.
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: ":memory:".to_string(),
        }
    }
}

/// The complete set of runtime settings.
///
/// # Examples
///
/// ```
/// use ormbook_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.database.name, ":memory:");
/// assert_eq!(settings.having_threshold, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log filter directive (e.g. "info", "debug", "ormbook_db=trace").
    pub log_level: String,
    /// The database to run patterns against.
    pub database: DatabaseSettings,
    /// Print the compiled SQL next to each pattern's result.
    pub show_sql: bool,
    /// Insert the demo users and profiles after creating the tables.
    pub seed_fixtures: bool,
    /// The `COUNT(id) > n` threshold used by the HAVING pattern.
    pub having_threshold: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            show_sql: false,
            seed_fixtures: true,
            having_threshold: 5,
        }
    }
}

impl Settings {
    /// Returns `true` when the configured database lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.database.name == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert!(!s.show_sql);
        assert!(s.seed_fixtures);
        assert_eq!(s.having_threshold, 5);
    }

    #[test]
    fn test_default_database() {
        let s = Settings::default();
        assert_eq!(s.database.engine, "sqlite");
        assert_eq!(s.database.name, ":memory:");
        assert!(s.is_in_memory());
    }

    #[test]
    fn test_file_database_is_not_in_memory() {
        let mut s = Settings::default();
        s.database.name = "example.db".to_string();
        assert!(!s.is_in_memory());
    }

    #[test]
    fn test_serde_roundtrip_keeps_fields() {
        let mut s = Settings::default();
        s.show_sql = true;
        s.having_threshold = 2;
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
