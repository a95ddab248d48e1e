//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML file (overriding defaults, keys may be partial).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `ORMBOOK_DEBUG` | `debug` |
//! | `ORMBOOK_LOG_LEVEL` | `log_level` |
//! | `ORMBOOK_DATABASE_NAME` | `database.name` |
//! | `ORMBOOK_SHOW_SQL` | `show_sql` |
//! | `ORMBOOK_HAVING_THRESHOLD` | `having_threshold` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use ormbook_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("ormbook.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::{OrmError, OrmResult};
use crate::settings::Settings;

/// Engines that a `DatabaseConfig` can be built from.
const SUPPORTED_ENGINES: &[&str] = &["sqlite"];

/// Loads settings from a TOML string.
///
/// Fields missing from the TOML keep their default values, including
/// individual keys inside the `[database]` table.
pub fn from_toml_str(toml_str: &str) -> OrmResult<Settings> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| OrmError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    let json_value = toml_to_json(toml_value);
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        OrmError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    let settings: Settings = serde_json::from_value(merged).map_err(|e| {
        OrmError::ConfigurationError(format!("Failed to deserialize settings from TOML: {e}"))
    })?;
    validate(&settings)?;
    Ok(settings)
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> OrmResult<Settings> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        OrmError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> OrmResult<Settings> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `ORMBOOK_*` environment variable overrides to a settings struct.
///
/// Booleans accept "true"/"1"/"yes" (case-insensitive). A threshold that does
/// not parse as an integer is ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides using an arbitrary variable lookup.
///
/// [`apply_env_overrides`] calls this with the process environment; tests pass
/// a closure over a map so they never touch global state.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ORMBOOK_DEBUG") {
        settings.debug = parse_bool(&val);
    }

    if let Some(val) = lookup("ORMBOOK_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("ORMBOOK_DATABASE_NAME") {
        settings.database.name = val;
    }

    if let Some(val) = lookup("ORMBOOK_SHOW_SQL") {
        settings.show_sql = parse_bool(&val);
    }

    if let Some(val) = lookup("ORMBOOK_HAVING_THRESHOLD") {
        if let Ok(n) = val.trim().parse::<i64>() {
            settings.having_threshold = n;
        }
    }
}

/// Rejects settings that cannot be acted on.
pub fn validate(settings: &Settings) -> OrmResult<()> {
    if !SUPPORTED_ENGINES.contains(&settings.database.engine.as_str()) {
        return Err(OrmError::ImproperlyConfigured(format!(
            "Unsupported database engine '{}'; expected one of: {}",
            settings.database.engine,
            SUPPORTED_ENGINES.join(", ")
        )));
    }
    if settings.database.name.trim().is_empty() {
        return Err(OrmError::ImproperlyConfigured(
            "database.name must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "debug"
            show_sql = true
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "debug");
        assert!(settings.show_sql);
        // Defaults preserved
        assert_eq!(settings.having_threshold, 5);
        assert!(settings.seed_fixtures);
    }

    #[test]
    fn test_from_toml_str_partial_database_table() {
        let toml = r#"
            [database]
            name = "patterns.db"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.database.name, "patterns.db");
        assert_eq!(settings.database.engine, "sqlite");
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = from_toml_str("[[invalid toml content");
        assert!(matches!(result, Err(OrmError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("having_threshold = \"lots\"");
        assert!(matches!(result, Err(OrmError::ConfigurationError(_))));
    }

    #[test]
    fn test_unknown_engine_is_improperly_configured() {
        let toml = r#"
            [database]
            engine = "oracle"
        "#;
        let result = from_toml_str(toml);
        assert!(matches!(result, Err(OrmError::ImproperlyConfigured(_))));
    }

    #[test]
    fn test_empty_database_name_rejected() {
        let mut settings = Settings::default();
        settings.database.name = "  ".to_string();
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "having_threshold = 2").unwrap();
        writeln!(file, "seed_fixtures = false").unwrap();

        let settings = from_toml_file(file.path()).unwrap();
        assert_eq!(settings.having_threshold, 2);
        assert!(!settings.seed_fixtures);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/ormbook.toml");
        assert!(matches!(result, Err(OrmError::ConfigurationError(_))));
    }

    // ── Overrides ──────────────────────────────────────────────────

    #[test]
    fn test_overrides_apply_on_top_of_file_values() {
        let mut settings = from_toml_str("log_level = \"warn\"\nhaving_threshold = 9").unwrap();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[
                ("ORMBOOK_LOG_LEVEL", "trace"),
                ("ORMBOOK_DATABASE_NAME", "/tmp/x.db"),
                ("ORMBOOK_SHOW_SQL", "YES"),
            ]),
        );
        assert_eq!(settings.log_level, "trace");
        assert_eq!(settings.database.name, "/tmp/x.db");
        assert!(settings.show_sql);
        assert_eq!(settings.having_threshold, 9);
    }

    #[test]
    fn test_override_debug_values() {
        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, lookup_from(&[("ORMBOOK_DEBUG", "0")]));
        assert!(!settings.debug);
        apply_overrides_from(&mut settings, lookup_from(&[("ORMBOOK_DEBUG", "True")]));
        assert!(settings.debug);
    }

    #[test]
    fn test_override_threshold_ignores_garbage() {
        let mut settings = Settings::default();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[("ORMBOOK_HAVING_THRESHOLD", "many")]),
        );
        assert_eq!(settings.having_threshold, 5);
        apply_overrides_from(
            &mut settings,
            lookup_from(&[("ORMBOOK_HAVING_THRESHOLD", " 1 ")]),
        );
        assert_eq!(settings.having_threshold, 1);
    }

    #[test]
    fn test_no_overrides_leaves_settings_alone() {
        let mut settings = Settings::default();
        apply_overrides_from(&mut settings, |_| None);
        assert_eq!(settings, Settings::default());
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": 1, "db": {"engine": "sqlite", "name": ":memory:"}});
        let over = serde_json::json!({"db": {"name": "f.db"}});
        let merged = merge_json(base, over);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["db"]["engine"], "sqlite");
        assert_eq!(merged["db"]["name"], "f.db");
    }
}
