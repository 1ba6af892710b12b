//! Synthetic HTTP request types.
//!
//! A [`SyntheticRequest`] describes the shape of a request (method, path,
//! query string, headers, body, content type) without any transport behind
//! it. The harness treats it as a read-only value.

use std::fmt;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// GET method.
    #[default]
    Get,
    /// POST method.
    Post,
    /// PUT method.
    Put,
    /// DELETE method.
    Delete,
    /// PATCH method.
    Patch,
    /// OPTIONS method.
    Options,
    /// HEAD method.
    Head,
    /// TRACE method.
    Trace,
}

impl Method {
    /// Parse method from bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"GET" => Some(Self::Get),
            b"POST" => Some(Self::Post),
            b"PUT" => Some(Self::Put),
            b"DELETE" => Some(Self::Delete),
            b"PATCH" => Some(Self::Patch),
            b"OPTIONS" => Some(Self::Options),
            b"HEAD" => Some(Self::Head),
            b"TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    /// Parse a method name, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_bytes(s.to_ascii_uppercase().as_bytes())
    }

    /// Return the canonical uppercase method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The description of a request handed to the resolution engine.
///
/// Header names are normalized to lowercase at insertion time.
///
/// # Example
///
/// ```
/// use mvctest_host::request::{Method, SyntheticRequest};
///
/// let request = SyntheticRequest::post("/Normal/ActionWithModel/5")
///     .query_string("?text=test")
///     .json_body(r#"{"Integer":5}"#);
///
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.content_type(), Some("application/json"));
/// assert_eq!(request.query_pairs(), vec![("text".to_string(), "test".to_string())]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticRequest {
    method: Method,
    path: String,
    query_string: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    content_type: Option<String>,
}

impl SyntheticRequest {
    /// Creates a request with the given method and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            method,
            path,
            ..Self::default()
        }
    }

    /// GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// PATCH request.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Sets the raw query string. A leading `?` is optional.
    #[must_use]
    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query_string = query.strip_prefix('?').unwrap_or(&query).to_string();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        if name == "content-type" {
            self.content_type = Some(value.clone());
        }
        self.headers.push((name, value));
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a `text/plain` body.
    #[must_use]
    pub fn text_body(self, text: impl Into<String>) -> Self {
        self.with_content_type("text/plain").body(text.into().into_bytes())
    }

    /// Sets an `application/json` body.
    #[must_use]
    pub fn json_body(self, json: impl Into<String>) -> Self {
        self.with_content_type("application/json")
            .body(json.into().into_bytes())
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the path (always starts with `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string without the leading `?`.
    #[must_use]
    pub fn raw_query(&self) -> &str {
        &self.query_string
    }

    /// Returns the headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first value of a header (case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the body bytes, if any.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Decoded query pairs in order of appearance.
    ///
    /// Pairs whose percent-encoding is invalid are skipped.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_query(&self.query_string)
    }
}

/// Parses `a=1&b=2` into decoded pairs.
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((url_decode(name)?, url_decode(value)?))
        })
        .collect()
}

/// URL-decode a percent-encoded string.
///
/// Returns `None` if the string contains invalid percent-encoding.
#[must_use]
pub fn url_decode(s: &str) -> Option<String> {
    let mut result = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();

    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let hi = bytes.next()?;
            let lo = bytes.next()?;
            let hi = char::from(hi).to_digit(16)?;
            let lo = char::from(lo).to_digit(16)?;
            result.push((hi * 16 + lo) as u8);
        } else if byte == b'+' {
            // Handle + as space (form encoding)
            result.push(b' ');
        } else {
            result.push(byte);
        }
    }

    String::from_utf8(result).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_ignores_case() {
        assert_eq!(Method::parse("post"), Some(Method::Post));
        assert_eq!(Method::parse("Get"), Some(Method::Get));
        assert_eq!(Method::parse("BREW"), None);
    }

    #[test]
    fn path_is_rooted() {
        assert_eq!(SyntheticRequest::get("Home/Index").path(), "/Home/Index");
        assert_eq!(SyntheticRequest::get("/").path(), "/");
    }

    #[test]
    fn query_string_strips_question_mark() {
        let request = SyntheticRequest::get("/").query_string("?first=test&second=5");
        assert_eq!(request.raw_query(), "first=test&second=5");
        assert_eq!(
            request.query_pairs(),
            vec![
                ("first".to_string(), "test".to_string()),
                ("second".to_string(), "5".to_string())
            ]
        );
    }

    #[test]
    fn query_values_are_decoded() {
        let pairs = parse_query("name=John%20Doe&tag=a+b&flag");
        assert_eq!(pairs[0], ("name".to_string(), "John Doe".to_string()));
        assert_eq!(pairs[1], ("tag".to_string(), "a b".to_string()));
        assert_eq!(pairs[2], ("flag".to_string(), String::new()));
    }

    #[test]
    fn invalid_percent_encoding_is_skipped() {
        assert!(parse_query("bad=%zz").is_empty());
        assert_eq!(url_decode("%4"), None);
    }

    #[test]
    fn content_type_header_sets_content_type() {
        let request = SyntheticRequest::post("/").header("Content-Type", "text/plain");
        assert_eq!(request.content_type(), Some("text/plain"));
        assert_eq!(request.header_value("CONTENT-TYPE"), Some("text/plain"));
    }
}
