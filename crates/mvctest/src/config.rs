//! Test configuration and hosting environment resolution.
//!
//! Configuration is a flat, case-insensitive `key -> string` map. JSON
//! sources are flattened with `:` separators, so
//!
//! ```json
//! { "General": { "Environment": "Staging" } }
//! ```
//!
//! yields `general:environment = Staging`. Sources are applied in order;
//! later sources win.

use crate::error::ConfigurationError;
use indexmap::IndexMap;
use mvctest_host::HostingEnvironment;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File read from the working directory when present.
pub const TEST_CONFIG_FILE: &str = "testconfig.json";

/// Environment used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "Test";

const AUTOMATIC_STARTUP_KEY: &str = "general:automatic_startup";
const STARTUP_TYPE_KEY: &str = "general:startup_type";
const ENVIRONMENT_KEY: &str = "general:environment";
const APPLICATION_NAME_KEY: &str = "general:application_name";

/// Adds configuration sources after the defaults.
pub type ConfigurationHook = Arc<dyn Fn(&mut ConfigurationBuilder) + Send + Sync>;

/// Flattened configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    // Lowercased key -> (key as written, value).
    values: IndexMap<String, (String, String)>,
}

impl Configuration {
    /// Empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, ignoring case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Sets `key`, replacing any value stored under the same key in any case.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.values
            .insert(key.to_ascii_lowercase(), (key, value.into()));
    }

    /// Values whose key starts with `section:`, keyed by the remainder.
    #[must_use]
    pub fn section(&self, section: &str) -> Configuration {
        let prefix = format!("{}:", section.to_ascii_lowercase());
        let mut result = Configuration::new();
        for (lower, (key, value)) in &self.values {
            if lower.starts_with(&prefix) {
                result.set(&key[prefix.len()..], value.clone());
            }
        }
        result
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn flatten(&mut self, prefix: &str, value: &Value) {
        let join = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{prefix}:{segment}")
            }
        };
        match value {
            Value::Object(map) => {
                for (key, nested) in map {
                    self.flatten(&join(key), nested);
                }
            }
            Value::Array(items) => {
                for (idx, nested) in items.iter().enumerate() {
                    self.flatten(&join(&idx.to_string()), nested);
                }
            }
            Value::String(s) => self.set(prefix, s.clone()),
            Value::Null => self.set(prefix, ""),
            other => self.set(prefix, other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    JsonFile { path: PathBuf, optional: bool },
    JsonText { name: String, text: String },
    InMemory(Vec<(String, String)>),
}

/// Ordered configuration sources.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    sources: Vec<Source>,
}

impl ConfigurationBuilder {
    /// Builder without sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a JSON file. A missing optional file is skipped.
    pub fn add_json_file(&mut self, path: impl Into<PathBuf>, optional: bool) -> &mut Self {
        self.sources.push(Source::JsonFile {
            path: path.into(),
            optional,
        });
        self
    }

    /// Adds JSON text. `name` appears in parse errors.
    pub fn add_json_str(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.sources.push(Source::JsonText {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    /// Adds literal key/value pairs.
    pub fn add_in_memory<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.sources.push(Source::InMemory(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no source was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Reads every source in order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a required file is missing, a
    /// file cannot be read, or a source is not a JSON object.
    pub fn build(&self) -> Result<Configuration, ConfigurationError> {
        let mut configuration = Configuration::new();
        for source in &self.sources {
            match source {
                Source::JsonFile { path, optional } => {
                    let Some(text) = read_file(path, *optional)? else {
                        continue;
                    };
                    apply_json(&mut configuration, &path.display().to_string(), &text)?;
                }
                Source::JsonText { name, text } => apply_json(&mut configuration, name, text)?,
                Source::InMemory(pairs) => {
                    for (key, value) in pairs {
                        configuration.set(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(configuration)
    }
}

fn read_file(path: &Path, optional: bool) -> Result<Option<String>, ConfigurationError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if optional && err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigurationError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }),
    }
}

fn apply_json(
    configuration: &mut Configuration,
    source_name: &str,
    text: &str,
) -> Result<(), ConfigurationError> {
    let parse_error = |message: String| ConfigurationError::Parse {
        source_name: source_name.to_string(),
        message,
    };
    let value: Value = serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?;
    if !value.is_object() {
        return Err(parse_error("top-level value must be an object".to_string()));
    }
    configuration.flatten("", &value);
    Ok(())
}

/// Loads `testconfig.json` from `directory` (if present), then whatever
/// `hook` adds.
///
/// # Errors
///
/// Returns [`ConfigurationError`] for unreadable or malformed sources.
pub fn load_configuration_from(
    directory: &Path,
    hook: Option<&ConfigurationHook>,
) -> Result<Configuration, ConfigurationError> {
    let mut builder = ConfigurationBuilder::new();
    builder.add_json_file(directory.join(TEST_CONFIG_FILE), true);
    if let Some(hook) = hook {
        hook(&mut builder);
    }
    builder.build()
}

/// [`load_configuration_from`] the working directory.
///
/// # Errors
///
/// Returns [`ConfigurationError`] for unreadable or malformed sources.
pub fn load_configuration(
    hook: Option<&ConfigurationHook>,
) -> Result<Configuration, ConfigurationError> {
    let directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    load_configuration_from(&directory, hook)
}

/// Harness settings read from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    /// Search for a startup type when none was set explicitly.
    pub automatic_startup: bool,
    /// Startup type to search for, by full path or short name.
    pub startup_type: Option<String>,
    /// Hosting environment name.
    pub environment_name: String,
    /// Overrides the declared application identity.
    pub application_name: Option<String>,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            automatic_startup: true,
            startup_type: None,
            environment_name: DEFAULT_ENVIRONMENT.to_string(),
            application_name: None,
        }
    }
}

impl TestConfiguration {
    /// Reads the `general` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] when
    /// `general:automatic_startup` is not a boolean.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigurationError> {
        let non_empty = |key: &str| {
            configuration
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let automatic_startup = match non_empty(AUTOMATIC_STARTUP_KEY) {
            None => true,
            Some(raw) if raw.eq_ignore_ascii_case("true") => true,
            Some(raw) if raw.eq_ignore_ascii_case("false") => false,
            Some(raw) => {
                return Err(ConfigurationError::InvalidValue {
                    key: AUTOMATIC_STARTUP_KEY.to_string(),
                    value: raw,
                    expected: "`true` or `false`",
                })
            }
        };

        Ok(Self {
            automatic_startup,
            startup_type: non_empty(STARTUP_TYPE_KEY),
            environment_name: non_empty(ENVIRONMENT_KEY)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            application_name: non_empty(APPLICATION_NAME_KEY),
        })
    }

    /// Name searched for during automatic startup discovery.
    #[must_use]
    pub fn startup_name(&self) -> String {
        self.startup_type
            .clone()
            .unwrap_or_else(|| format!("{}Startup", self.environment_name))
    }
}

/// The environment the application is built for.
///
/// The configured application name wins over `declared_application`; a
/// missing identity is tolerated.
#[must_use]
pub fn resolve_environment(
    test_config: &TestConfiguration,
    declared_application: Option<&str>,
) -> HostingEnvironment {
    let application_name = test_config
        .application_name
        .clone()
        .or_else(|| declared_application.map(str::to_string));
    HostingEnvironment::new(test_config.environment_name.clone(), application_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn json_is_flattened_case_insensitively() {
        let mut builder = ConfigurationBuilder::new();
        builder.add_json_str(
            "inline",
            r#"{"General": {"Environment": "Staging", "Retries": 3, "Flags": [true, null]}}"#,
        );
        let config = builder.build().unwrap();
        assert_eq!(config.get("general:environment"), Some("Staging"));
        assert_eq!(config.get("GENERAL:RETRIES"), Some("3"));
        assert_eq!(config.get("general:flags:0"), Some("true"));
        assert_eq!(config.get("general:flags:1"), Some(""));
        assert_eq!(config.section("general").get("environment"), Some("Staging"));
    }

    #[test]
    fn later_sources_win() {
        let mut builder = ConfigurationBuilder::new();
        builder
            .add_json_str("a", r#"{"general": {"environment": "Staging"}}"#)
            .add_in_memory([("General:Environment", "Production")]);
        let config = builder.build().unwrap();
        assert_eq!(config.get("general:environment"), Some("Production"));
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn missing_optional_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_configuration_from(dir.path(), None).unwrap();
        assert!(config.is_empty());

        let mut builder = ConfigurationBuilder::new();
        builder.add_json_file(dir.path().join("absent.json"), false);
        assert!(matches!(builder.build(), Err(ConfigurationError::Io { .. })));
    }

    #[test]
    fn test_config_file_and_hook_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(TEST_CONFIG_FILE),
            r#"{"general": {"environment": "Staging", "startup_type": "CustomStartup"}}"#,
        )
        .unwrap();
        let hook: ConfigurationHook = Arc::new(|builder: &mut ConfigurationBuilder| {
            builder.add_in_memory([("general:environment", "Development")]);
        });

        let config = load_configuration_from(dir.path(), Some(&hook)).unwrap();
        let test_config = TestConfiguration::from_configuration(&config).unwrap();
        assert_eq!(test_config.environment_name, "Development");
        assert_eq!(test_config.startup_name(), "CustomStartup");
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TEST_CONFIG_FILE), "{ not json").unwrap();
        let err = load_configuration_from(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));

        let mut builder = ConfigurationBuilder::new();
        builder.add_json_str("array", "[1, 2]");
        assert!(matches!(builder.build(), Err(ConfigurationError::Parse { .. })));
    }

    #[test]
    fn test_configuration_defaults() {
        let test_config = TestConfiguration::from_configuration(&Configuration::new()).unwrap();
        assert_eq!(test_config, TestConfiguration::default());
        assert!(test_config.automatic_startup);
        assert_eq!(test_config.startup_name(), "TestStartup");
    }

    #[test]
    fn automatic_startup_must_be_boolean() {
        let mut config = Configuration::new();
        config.set("General:Automatic_Startup", "FALSE");
        assert!(!TestConfiguration::from_configuration(&config).unwrap().automatic_startup);

        config.set("general:automatic_startup", "sometimes");
        let err = TestConfiguration::from_configuration(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn environment_resolution() {
        let mut test_config = TestConfiguration::default();
        let env = resolve_environment(&test_config, Some("my_app"));
        assert_eq!(env.environment_name, "Test");
        assert_eq!(env.application_name.as_deref(), Some("my_app"));

        assert_eq!(resolve_environment(&test_config, None).application_name, None);

        test_config.application_name = Some("override".into());
        let env = resolve_environment(&test_config, Some("my_app"));
        assert_eq!(env.application_name.as_deref(), Some("override"));
    }
}
