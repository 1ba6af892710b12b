//! MVC options and request body formatters.

use crate::controllers::ControllerModelConvention;
use crate::error::{loc, ValidationError};
use std::fmt;
use std::sync::Arc;

/// Options read by controller discovery and model binding.
///
/// Configured through [`ServiceCollection::configure`](crate::services::ServiceCollection::configure).
#[derive(Clone, Default)]
pub struct MvcOptions {
    /// Applied to every discovered controller, in order.
    pub conventions: Vec<Arc<dyn ControllerModelConvention>>,
    /// Body readers, tried in order.
    pub input_formatters: Vec<Arc<dyn InputFormatter>>,
}

impl MvcOptions {
    /// The first formatter that can read `content_type`.
    #[must_use]
    pub fn formatter_for(&self, content_type: &str) -> Option<&Arc<dyn InputFormatter>> {
        self.input_formatters
            .iter()
            .find(|formatter| formatter.can_read(content_type))
    }
}

impl fmt::Debug for MvcOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatters: Vec<_> = self.input_formatters.iter().map(|i| i.name()).collect();
        f.debug_struct("MvcOptions")
            .field("conventions", &self.conventions.len())
            .field("input_formatters", &formatters)
            .finish()
    }
}

/// Reads a request body into a JSON value.
pub trait InputFormatter: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Media types this formatter reads. `type/*+suffix` matches any
    /// subtype with that suffix.
    fn supported_media_types(&self) -> &[&'static str];

    /// Returns true if the formatter reads `content_type`.
    fn can_read(&self, content_type: &str) -> bool {
        let media_type = essence(content_type);
        self.supported_media_types()
            .iter()
            .any(|supported| media_type_matches(supported, &media_type))
    }

    /// Parses a non-empty body.
    ///
    /// # Errors
    ///
    /// Returns an error located at the body root when the body cannot be
    /// read.
    fn read(&self, body: &[u8]) -> Result<serde_json::Value, ValidationError>;
}

/// `type/subtype` in lowercase, parameters dropped.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn media_type_matches(supported: &str, media_type: &str) -> bool {
    let Some((supported_type, supported_sub)) = supported.split_once('/') else {
        return false;
    };
    let Some((actual_type, actual_sub)) = media_type.split_once('/') else {
        return false;
    };
    if supported_type != "*" && supported_type != actual_type {
        return false;
    }
    match supported_sub.strip_prefix('*') {
        Some("") => true,
        Some(suffix) => actual_sub.ends_with(suffix),
        None => supported_sub == actual_sub,
    }
}

/// Reads JSON bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInputFormatter;

impl InputFormatter for JsonInputFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supported_media_types(&self) -> &[&'static str] {
        &["application/json", "text/json", "application/*+json"]
    }

    fn read(&self, body: &[u8]) -> Result<serde_json::Value, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::json_invalid(loc::body(), e.to_string()))
    }
}

/// Reads `text/plain` bodies as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringInputFormatter;

impl InputFormatter for StringInputFormatter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supported_media_types(&self) -> &[&'static str] {
        &["text/plain"]
    }

    fn read(&self, body: &[u8]) -> Result<serde_json::Value, ValidationError> {
        String::from_utf8(body.to_vec())
            .map(serde_json::Value::String)
            .map_err(|e| ValidationError::value_error(loc::body(), e.to_string()))
    }
}
