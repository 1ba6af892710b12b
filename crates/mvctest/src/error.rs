//! Error types for building the test application.
//!
//! Route misses, ambiguity and invalid input are not errors: they are
//! reported on the resolution result. Only two things stop a build:
//! unusable configuration and failing startup code.

use mvctest_host::StartupError;
use std::fmt;

/// The configuration could not be loaded or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A configuration file exists but could not be read.
    Io {
        /// File path.
        path: String,
        /// OS error text.
        message: String,
    },
    /// A source is not valid JSON or not a JSON object.
    Parse {
        /// File path or source name.
        source_name: String,
        /// Parser error text.
        message: String,
    },
    /// A known key holds a value of the wrong shape.
    InvalidValue {
        /// Flattened key, e.g. `general:automatic_startup`.
        key: String,
        /// The offending value.
        value: String,
        /// What was expected instead.
        expected: &'static str,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "failed to read configuration file `{path}`: {message}")
            }
            Self::Parse {
                source_name,
                message,
            } => write!(f, "invalid configuration in `{source_name}`: {message}"),
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(
                f,
                "configuration key `{key}` has value `{value}`, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Why the test application could not be made ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// Loading configuration failed.
    Configuration(ConfigurationError),
    /// Startup code or a hook failed. The original error is kept as is.
    Startup(StartupError),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::Startup(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Startup(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for BootstrapError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<StartupError> for BootstrapError {
    fn from(err: StartupError) -> Self {
        Self::Startup(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn configuration_error_messages() {
        let err = ConfigurationError::InvalidValue {
            key: "general:automatic_startup".into(),
            value: "maybe".into(),
            expected: "a boolean",
        };
        assert_eq!(
            err.to_string(),
            "configuration key `general:automatic_startup` has value `maybe`, expected a boolean"
        );

        let err = ConfigurationError::Parse {
            source_name: "testconfig.json".into(),
            message: "EOF while parsing".into(),
        };
        assert!(err.to_string().contains("testconfig.json"));
    }

    #[test]
    fn startup_errors_pass_through_unchanged() {
        let original = StartupError::new("database unavailable").with_startup("TestStartup");
        let err = BootstrapError::from(original.clone());
        assert_eq!(err, BootstrapError::Startup(original.clone()));
        assert_eq!(err.to_string(), original.to_string());
        assert!(err.source().is_some());
    }
}
