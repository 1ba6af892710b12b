//! Error types.
//!
//! Validation errors follow the `type` / `loc` / `msg` / `input` / `ctx`
//! layout so they can be serialized for diagnostics. The remaining types
//! are the failures the host reports to its callers: a missing required
//! service, a failing startup delegate, an ambiguous action selection and a
//! malformed route template.
//!
//! # Example
//!
//! ```
//! use mvctest_host::error::{loc, ValidationError};
//!
//! let error = ValidationError::missing(loc::body_field("String"));
//! assert_eq!(error.error_type, "missing");
//! assert_eq!(error.model_state_key(), "String");
//! ```

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Location Items
// ============================================================================

/// A single item in an error location path.
///
/// Items are either field names or array indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocItem {
    /// Field name (string).
    Field(String),
    /// Array index (integer).
    Index(usize),
}

impl LocItem {
    /// Create a field location item.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Create an index location item.
    #[must_use]
    pub fn index(idx: usize) -> Self {
        Self::Index(idx)
    }
}

impl From<&str> for LocItem {
    fn from(s: &str) -> Self {
        Self::Field(s.to_owned())
    }
}

impl From<String> for LocItem {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<usize> for LocItem {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl Serialize for LocItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Field(s) => serializer.serialize_str(s),
            Self::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// Location prefixes for the binding sources.
pub mod loc {
    use super::LocItem;

    /// Source prefixes stripped when building model-state keys.
    pub const SOURCES: &[&str] = &["path", "query", "body"];

    /// Route value location: `["path", "param_name"]`
    #[must_use]
    pub fn path(param: &str) -> Vec<LocItem> {
        vec![LocItem::field("path"), LocItem::field(param)]
    }

    /// Query parameter location: `["query", "param_name"]`
    #[must_use]
    pub fn query(param: &str) -> Vec<LocItem> {
        vec![LocItem::field("query"), LocItem::field(param)]
    }

    /// Request body root location: `["body"]`
    #[must_use]
    pub fn body() -> Vec<LocItem> {
        vec![LocItem::field("body")]
    }

    /// Body field location: `["body", "field"]`
    #[must_use]
    pub fn body_field(field: &str) -> Vec<LocItem> {
        vec![LocItem::field("body"), LocItem::field(field)]
    }
}

/// Validation error type strings.
pub mod error_types {
    /// Required field is missing.
    pub const MISSING: &str = "missing";
    /// String is too short.
    pub const STRING_TOO_SHORT: &str = "string_too_short";
    /// String is too long.
    pub const STRING_TOO_LONG: &str = "string_too_long";
    /// Value is not a valid string.
    pub const STRING_TYPE: &str = "string_type";
    /// Value is not a valid integer.
    pub const INT_TYPE: &str = "int_type";
    /// Value is not a valid float.
    pub const FLOAT_TYPE: &str = "float_type";
    /// Value is not a valid boolean.
    pub const BOOL_TYPE: &str = "bool_type";
    /// Value is less than minimum.
    pub const GREATER_THAN_EQUAL: &str = "greater_than_equal";
    /// Value is greater than maximum.
    pub const LESS_THAN_EQUAL: &str = "less_than_equal";
    /// Generic value error (e.g. invalid email).
    pub const VALUE_ERROR: &str = "value_error";
    /// JSON parsing failed.
    pub const JSON_INVALID: &str = "json_invalid";
    /// JSON shape does not fit the target model.
    pub const JSON_TYPE: &str = "json_type";
    /// No input formatter can read the body.
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "unsupported_media_type";
}

// ============================================================================
// Validation Errors
// ============================================================================

/// A single validation error.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// Error type identifier (e.g., "missing", "int_type").
    #[serde(rename = "type")]
    pub error_type: &'static str,

    /// Location path, e.g. `["body", "String"]`.
    pub loc: Vec<LocItem>,

    /// Human-readable error message.
    pub msg: String,

    /// The input value that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Additional context about the violated constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<HashMap<String, serde_json::Value>>,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(error_type: &'static str, loc: Vec<LocItem>) -> Self {
        Self {
            error_type,
            loc,
            msg: Self::default_message(error_type),
            input: None,
            ctx: None,
        }
    }

    /// Create a "missing" error for a required field.
    #[must_use]
    pub fn missing(loc: Vec<LocItem>) -> Self {
        Self::new(error_types::MISSING, loc)
    }

    /// Create a type error (e.g., expected int, got string).
    #[must_use]
    pub fn type_error(loc: Vec<LocItem>, expected_type: &'static str) -> Self {
        let error_type = match expected_type {
            "string" => error_types::STRING_TYPE,
            "int" | "integer" => error_types::INT_TYPE,
            "float" | "number" => error_types::FLOAT_TYPE,
            "bool" | "boolean" => error_types::BOOL_TYPE,
            _ => error_types::VALUE_ERROR,
        };
        Self::new(error_type, loc).with_msg(format!("Input should be a valid {expected_type}"))
    }

    /// Create a "string_too_short" error.
    #[must_use]
    pub fn string_too_short(loc: Vec<LocItem>, min_length: usize) -> Self {
        Self::new(error_types::STRING_TOO_SHORT, loc)
            .with_msg(format!(
                "String should have at least {min_length} character{}",
                if min_length == 1 { "" } else { "s" }
            ))
            .with_ctx_value("min_length", serde_json::json!(min_length))
    }

    /// Create a "string_too_long" error.
    #[must_use]
    pub fn string_too_long(loc: Vec<LocItem>, max_length: usize) -> Self {
        Self::new(error_types::STRING_TOO_LONG, loc)
            .with_msg(format!(
                "String should have at most {max_length} character{}",
                if max_length == 1 { "" } else { "s" }
            ))
            .with_ctx_value("max_length", serde_json::json!(max_length))
    }

    /// Create a "greater_than_equal" error for minimum value constraint.
    #[must_use]
    pub fn greater_than_equal<T: fmt::Display>(loc: Vec<LocItem>, min: T) -> Self {
        let min_str = min.to_string();
        Self::new(error_types::GREATER_THAN_EQUAL, loc)
            .with_msg(format!("Input should be greater than or equal to {min_str}"))
            .with_ctx_value("ge", serde_json::json!(min_str))
    }

    /// Create a "less_than_equal" error for maximum value constraint.
    #[must_use]
    pub fn less_than_equal<T: fmt::Display>(loc: Vec<LocItem>, max: T) -> Self {
        let max_str = max.to_string();
        Self::new(error_types::LESS_THAN_EQUAL, loc)
            .with_msg(format!("Input should be less than or equal to {max_str}"))
            .with_ctx_value("le", serde_json::json!(max_str))
    }

    /// Create a "value_error" for invalid email format.
    #[must_use]
    pub fn invalid_email(loc: Vec<LocItem>) -> Self {
        Self::new(error_types::VALUE_ERROR, loc).with_msg("Value is not a valid email address")
    }

    /// Create a JSON parsing error.
    #[must_use]
    pub fn json_invalid(loc: Vec<LocItem>, message: impl Into<String>) -> Self {
        Self::new(error_types::JSON_INVALID, loc).with_msg(message)
    }

    /// Create an "unsupported_media_type" error for a body no formatter reads.
    #[must_use]
    pub fn unsupported_media_type(loc: Vec<LocItem>, content_type: &str) -> Self {
        Self::new(error_types::UNSUPPORTED_MEDIA_TYPE, loc)
            .with_msg(format!("Unsupported content type '{content_type}'."))
            .with_ctx_value("content_type", serde_json::json!(content_type))
    }

    /// Create a generic "value_error" with custom message.
    #[must_use]
    pub fn value_error(loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Self::new(error_types::VALUE_ERROR, loc).with_msg(msg)
    }

    /// Set the human-readable message.
    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    /// Set the input value.
    #[must_use]
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Add a context key-value pair.
    #[must_use]
    pub fn with_ctx_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.ctx
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Add location items in front of the path.
    #[must_use]
    pub fn with_loc_prefix(mut self, prefix: Vec<LocItem>) -> Self {
        let mut new_loc = prefix;
        new_loc.extend(self.loc);
        self.loc = new_loc;
        self
    }

    /// The key this error is recorded under in a model state.
    ///
    /// The binding source prefix is dropped, fields are joined with `.` and
    /// indices are rendered as `[i]`: `["body", "items", 0, "name"]` becomes
    /// `items[0].name`.
    #[must_use]
    pub fn model_state_key(&self) -> String {
        let mut items = self.loc.as_slice();
        if let Some(LocItem::Field(first)) = items.first() {
            if loc::SOURCES.contains(&first.as_str()) {
                items = &items[1..];
            }
        }

        let mut key = String::new();
        for item in items {
            match item {
                LocItem::Field(name) => {
                    if !key.is_empty() {
                        key.push('.');
                    }
                    key.push_str(name);
                }
                LocItem::Index(i) => key.push_str(&format!("[{i}]")),
            }
        }
        key
    }

    fn default_message(error_type: &str) -> String {
        match error_type {
            error_types::MISSING => "Field required".to_owned(),
            error_types::STRING_TOO_SHORT => "String too short".to_owned(),
            error_types::STRING_TOO_LONG => "String too long".to_owned(),
            error_types::STRING_TYPE => "Input should be a valid string".to_owned(),
            error_types::INT_TYPE => "Input should be a valid integer".to_owned(),
            error_types::FLOAT_TYPE => "Input should be a valid number".to_owned(),
            error_types::BOOL_TYPE => "Input should be a valid boolean".to_owned(),
            error_types::JSON_INVALID => "Invalid JSON".to_owned(),
            error_types::VALUE_ERROR => "Value error".to_owned(),
            _ => "Validation error".to_owned(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model_state_key(), self.msg)
    }
}

/// Collection of validation errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    /// The collected errors.
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create empty validation errors.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Create from a single error.
    #[must_use]
    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Add an error.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Get an iterator over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Add a prefix to all error locations.
    #[must_use]
    pub fn with_loc_prefix(mut self, prefix: Vec<LocItem>) -> Self {
        for error in &mut self.errors {
            let mut new_loc = prefix.clone();
            new_loc.extend(std::mem::take(&mut error.loc));
            error.loc = new_loc;
        }
        self
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<T: IntoIterator<Item = ValidationError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error", self.errors.len())?;
        if self.errors.len() != 1 {
            write!(f, "s")?;
        }
        for error in &self.errors {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Host Errors
// ============================================================================

/// A required service was not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingServiceError {
    /// Type name of the requested service.
    pub service: &'static str,
}

impl fmt::Display for MissingServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no service registered for `{}`", self.service)
    }
}

impl std::error::Error for MissingServiceError {}

/// Failure raised by user startup code or a configuration hook.
///
/// The harness never swallows these: they surface unchanged to whoever
/// triggered the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    /// Name of the startup or hook that failed (if known).
    pub startup: Option<String>,
    /// The underlying error message.
    pub message: String,
}

impl StartupError {
    /// Create a new startup error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            startup: None,
            message: message.into(),
        }
    }

    /// Attach the startup name, keeping an existing one.
    #[must_use]
    pub fn with_startup(mut self, name: impl Into<String>) -> Self {
        if self.startup.is_none() {
            self.startup = Some(name.into());
        }
        self
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.startup {
            Some(name) => write!(f, "startup `{}` failed: {}", name, self.message),
            None => write!(f, "startup failed: {}", self.message),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<MissingServiceError> for StartupError {
    fn from(err: MissingServiceError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<TemplateError> for StartupError {
    fn from(err: TemplateError) -> Self {
        Self::new(err.to_string())
    }
}

/// More than one action satisfied the route data and every constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousActionError {
    /// Display names of the matching actions, in registration order.
    pub candidates: Vec<String>,
}

impl fmt::Display for AmbiguousActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Multiple actions matched. The following actions matched route data and had all constraints satisfied:\n\n{}",
            self.candidates.join("\n")
        )
    }
}

impl std::error::Error for AmbiguousActionError {}

/// A route template could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// The offending template.
    pub template: String,
    /// What is wrong with it.
    pub reason: String,
}

impl TemplateError {
    pub(crate) fn new(template: &str, reason: impl Into<String>) -> Self {
        Self {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route template '{}': {}", self.template, self.reason)
    }
}

impl std::error::Error for TemplateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_state_key_strips_source_prefix() {
        assert_eq!(ValidationError::missing(loc::path("id")).model_state_key(), "id");
        assert_eq!(ValidationError::missing(loc::query("q")).model_state_key(), "q");
        assert_eq!(
            ValidationError::missing(vec![
                LocItem::field("body"),
                LocItem::field("address"),
                LocItem::field("zip"),
            ])
            .model_state_key(),
            "address.zip"
        );
    }

    #[test]
    fn model_state_key_renders_indices() {
        let error = ValidationError::missing(vec![
            LocItem::field("body"),
            LocItem::field("items"),
            LocItem::index(0),
            LocItem::field("name"),
        ]);
        assert_eq!(error.model_state_key(), "items[0].name");
    }

    #[test]
    fn validation_error_serializes_type_and_loc() {
        let error = ValidationError::type_error(loc::path("id"), "int")
            .with_input(serde_json::json!("Test"));
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["type"], "int_type");
        assert_eq!(json["loc"], serde_json::json!(["path", "id"]));
        assert_eq!(json["input"], "Test");
        assert!(json.get("ctx").is_none());
    }

    #[test]
    fn validation_errors_display_lists_each_error() {
        let errors: ValidationErrors = vec![
            ValidationError::missing(loc::body_field("String")),
            ValidationError::string_too_short(loc::body_field("Name"), 3),
        ]
        .into_iter()
        .collect();
        let text = errors.to_string();
        assert!(text.starts_with("2 validation errors"));
        assert!(text.contains("String: Field required"));
        assert!(text.contains("Name: String should have at least 3 characters"));
    }

    #[test]
    fn unsupported_media_type_records_content_type() {
        let error = ValidationError::unsupported_media_type(loc::body(), "application/xml");
        assert_eq!(error.error_type, "unsupported_media_type");
        assert_eq!(error.model_state_key(), "");
        assert_eq!(error.msg, "Unsupported content type 'application/xml'.");
        assert_eq!(
            error.ctx.as_ref().map(|ctx| ctx["content_type"].clone()),
            Some(serde_json::json!("application/xml"))
        );
    }

    #[test]
    fn startup_error_keeps_first_name() {
        let err = StartupError::new("boom").with_startup("TestStartup").with_startup("Other");
        assert_eq!(err.to_string(), "startup `TestStartup` failed: boom");
    }

    #[test]
    fn ambiguous_action_text_lists_candidates() {
        let err = AmbiguousActionError {
            candidates: vec!["a::B::c (a)".into(), "a::B::d (a)".into()],
        };
        let text = err.to_string();
        assert!(text.starts_with("Multiple actions matched."));
        assert!(text.ends_with("\n\na::B::c (a)\na::B::d (a)"));
    }
}
