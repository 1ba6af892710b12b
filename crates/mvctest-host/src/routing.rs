//! Route templates and the route table.
//!
//! Template grammar, one `/`-separated segment at a time:
//!
//! - `Home` - literal, matched case-insensitively
//! - `{id}` - parameter
//! - `{id?}` - optional parameter
//! - `{action=Index}` - parameter with a default value
//! - `{id:int}` - parameter with an inline converter (`int`, `float`,
//!   `bool`, `uuid`/`guid`, `alpha`); combinable as `{id:int?}` or
//!   `{id:int=5}`
//! - `{*path}` - catch-all, last segment only
//!
//! A [`Router`] is an ordered, frozen list of [`RouteEntry`]s: conventional
//! routes mapped by name, and the attribute route collecting every action
//! that declares its own template.

use crate::controllers::{ActionDescriptor, ActionDescriptorCache};
use crate::error::TemplateError;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Converters
// ============================================================================

/// Inline parameter converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Any value (default).
    Str,
    /// Integer (i64).
    Int,
    /// Floating-point (f64).
    Float,
    /// `true` or `false`, any case.
    Bool,
    /// UUID format.
    Uuid,
    /// ASCII letters only.
    Alpha,
}

impl Converter {
    /// Check if a value matches this converter.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Str => true,
            Self::Int => value.parse::<i64>().is_ok(),
            Self::Float => value.parse::<f64>().is_ok(),
            Self::Bool => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
            Self::Uuid => is_uuid(value),
            Self::Alpha => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()),
        }
    }

    /// Parse a converter name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "str" | "string" => Some(Self::Str),
            "int" | "long" => Some(Self::Int),
            "float" | "double" | "decimal" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "uuid" | "guid" => Some(Self::Uuid),
            "alpha" => Some(Self::Alpha),
            _ => None,
        }
    }
}

fn is_uuid(s: &str) -> bool {
    // 8-4-4-4-12 hex digits
    if s.len() != 36 {
        return false;
    }
    let parts: Vec<_> = s.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    parts[0].len() == 8
        && parts[1].len() == 4
        && parts[2].len() == 4
        && parts[3].len() == 4
        && parts[4].len() == 12
        && parts
            .iter()
            .all(|p| p.chars().all(|c| c.is_ascii_hexdigit()))
}

// ============================================================================
// Route values
// ============================================================================

/// Ordered route values with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues {
    values: Vec<(String, String)>,
}

impl RouteValues {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a value, replacing any existing one in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.values.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => slot.1 = value,
            None => self.values.push((key, value)),
        }
    }

    /// Returns true if `key` has a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut values = Self::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}

// ============================================================================
// Templates
// ============================================================================

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameter {
    /// Parameter name.
    pub name: String,
    /// Inline converter.
    pub converter: Converter,
    /// `{name?}`
    pub optional: bool,
    /// `{name=value}`
    pub default: Option<String>,
    /// `{*name}`
    pub catch_all: bool,
}

impl TemplateParameter {
    fn may_be_omitted(&self) -> bool {
        self.optional || self.catch_all || self.default.is_some()
    }
}

/// A parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Literal text.
    Literal(String),
    /// A parameter.
    Parameter(TemplateParameter),
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    template: String,
    segments: Vec<TemplateSegment>,
}

impl RouteTemplate {
    /// Parses a template.
    ///
    /// Leading `/` and `~/` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for empty segments, unbalanced braces,
    /// segments mixing text and parameters, unknown converters, duplicate
    /// parameter names, a catch-all that is not last, or a required segment
    /// after an optional one.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let trimmed = template.trim_start_matches('~').trim_matches('/');
        let mut segments = Vec::new();
        if !trimmed.is_empty() {
            for raw in trimmed.split('/') {
                segments.push(parse_segment(template, raw)?);
            }
        }

        let mut names: Vec<&str> = Vec::new();
        let mut seen_optional = false;
        let count = segments.len();
        for (idx, segment) in segments.iter().enumerate() {
            match segment {
                TemplateSegment::Parameter(param) => {
                    if names.iter().any(|n| n.eq_ignore_ascii_case(&param.name)) {
                        return Err(TemplateError::new(
                            template,
                            format!("parameter '{}' appears more than once", param.name),
                        ));
                    }
                    names.push(&param.name);
                    if param.catch_all && idx + 1 != count {
                        return Err(TemplateError::new(
                            template,
                            "a catch-all parameter must be the last segment",
                        ));
                    }
                    if param.optional {
                        seen_optional = true;
                    } else if seen_optional && param.default.is_none() && !param.catch_all {
                        return Err(TemplateError::new(
                            template,
                            "an optional parameter must not be followed by a required segment",
                        ));
                    }
                }
                TemplateSegment::Literal(_) => {
                    if seen_optional {
                        return Err(TemplateError::new(
                            template,
                            "an optional parameter must not be followed by a required segment",
                        ));
                    }
                }
            }
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    /// The template text as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Number of literal segments.
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, TemplateSegment::Literal(_)))
            .count()
    }

    /// Number of parameter segments.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.segments.len() - self.literal_count()
    }

    /// Matches `path`, returning the captured and default values.
    ///
    /// Literals compare case-insensitively; captured values are
    /// percent-decoded.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<RouteValues> {
        let ranges = segment_ranges(path);
        let mut values = RouteValues::new();
        let mut path_idx = 0;

        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(expected) => {
                    let (start, end) = *ranges.get(path_idx)?;
                    if !path[start..end].eq_ignore_ascii_case(expected) {
                        return None;
                    }
                    path_idx += 1;
                }
                TemplateSegment::Parameter(param) => {
                    let Some(&(start, end)) = ranges.get(path_idx) else {
                        if !param.may_be_omitted() {
                            return None;
                        }
                        if let Some(default) = &param.default {
                            values.insert(param.name.clone(), default.clone());
                        }
                        continue;
                    };

                    let raw = if param.catch_all {
                        let last_end = ranges.last().map_or(end, |(_, e)| *e);
                        path_idx = ranges.len();
                        &path[start..last_end]
                    } else {
                        path_idx += 1;
                        &path[start..end]
                    };
                    let value = decode_segment(raw);
                    if !param.catch_all && !param.converter.matches(&value) {
                        return None;
                    }
                    values.insert(param.name.clone(), value);
                }
            }
        }

        if path_idx != ranges.len() {
            return None;
        }
        Some(values)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn parse_segment(template: &str, raw: &str) -> Result<TemplateSegment, TemplateError> {
    if raw.is_empty() {
        return Err(TemplateError::new(template, "empty segment"));
    }

    let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
        if raw.contains('{') || raw.contains('}') {
            return Err(TemplateError::new(
                template,
                format!("segment '{raw}' mixes literal text and parameters"),
            ));
        }
        return Ok(TemplateSegment::Literal(raw.to_string()));
    };
    if inner.contains('{') || inner.contains('}') {
        return Err(TemplateError::new(template, format!("unbalanced braces in '{raw}'")));
    }

    let (catch_all, inner) = match inner.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let (inner, default) = match inner.split_once('=') {
        Some((head, default)) => (head, Some(default.to_string())),
        None => (inner, None),
    };
    let (inner, optional) = match inner.strip_suffix('?') {
        Some(head) => (head, true),
        None => (inner, false),
    };
    let (name, converter) = match inner.split_once(':') {
        Some((name, conv)) => {
            let converter = Converter::parse(conv).ok_or_else(|| {
                TemplateError::new(template, format!("unknown converter '{conv}'"))
            })?;
            (name, converter)
        }
        None => (inner, Converter::Str),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(TemplateError::new(template, format!("invalid parameter name in '{raw}'")));
    }
    if optional && default.is_some() {
        return Err(TemplateError::new(
            template,
            format!("parameter '{name}' cannot be optional and have a default"),
        ));
    }

    Ok(TemplateSegment::Parameter(TemplateParameter {
        name: name.to_string(),
        converter,
        optional,
        default,
        catch_all,
    }))
}

fn segment_ranges(path: &str) -> Vec<(usize, usize)> {
    let bytes = path.as_bytes();
    let mut ranges = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        while idx < bytes.len() && bytes[idx] == b'/' {
            idx += 1;
        }
        if idx >= bytes.len() {
            break;
        }
        let start = idx;
        while idx < bytes.len() && bytes[idx] != b'/' {
            idx += 1;
        }
        ranges.push((start, idx));
    }
    ranges
}

/// Percent-decodes a path segment. `+` is kept; invalid input is returned
/// unchanged.
fn decode_segment(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = raw.get(idx + 1..idx + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| raw.to_string())
}

// ============================================================================
// Route entries
// ============================================================================

/// A value constraint on a conventional route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteConstraint {
    /// The value must satisfy a converter.
    Type(Converter),
    /// The value must equal one of the alternatives (case-insensitive).
    OneOf(Vec<String>),
}

impl RouteConstraint {
    /// `int`, `bool`, ... become converter constraints; anything else is a
    /// `|`-separated list of allowed values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match Converter::parse(s) {
            Some(converter) if !s.is_empty() => Self::Type(converter),
            _ => Self::OneOf(s.split('|').map(str::to_string).collect()),
        }
    }

    /// Check a value.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Type(converter) => converter.matches(value),
            Self::OneOf(allowed) => allowed.iter().any(|a| a.eq_ignore_ascii_case(value)),
        }
    }
}

/// A named conventional route.
#[derive(Debug, Clone)]
pub struct ConventionalRoute {
    name: String,
    template: RouteTemplate,
    defaults: RouteValues,
    constraints: Vec<(String, RouteConstraint)>,
}

impl ConventionalRoute {
    /// Parses `template` into a route.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            name: name.into(),
            template: RouteTemplate::parse(template)?,
            defaults: RouteValues::new(),
            constraints: Vec::new(),
        })
    }

    /// Adds a default value for keys the template does not capture.
    #[must_use]
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key, value);
        self
    }

    /// Adds a value constraint.
    #[must_use]
    pub fn constraint(mut self, key: impl Into<String>, constraint: RouteConstraint) -> Self {
        self.constraints.push((key.into(), constraint));
        self
    }

    /// Route name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template.
    #[must_use]
    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    /// Matches `path`, applying defaults and constraints.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<RouteValues> {
        let mut values = self.template.match_path(path)?;
        for (key, value) in self.defaults.iter() {
            if !values.contains_key(key) {
                values.insert(key, value);
            }
        }
        let satisfied = self.constraints.iter().all(|(key, constraint)| {
            values.get(key).map_or(true, |value| constraint.accepts(value))
        });
        satisfied.then_some(values)
    }
}

#[derive(Debug, Clone)]
struct AttributeEntry {
    template: RouteTemplate,
    actions: Vec<Arc<ActionDescriptor>>,
}

/// The route for every action that declares its own template.
///
/// Templates are tried in precedence order: more literal segments first,
/// then fewer parameters, then registration order. Actions sharing a
/// template are candidates of the same match.
#[derive(Debug, Clone, Default)]
pub struct AttributeRoute {
    entries: Vec<AttributeEntry>,
}

impl AttributeRoute {
    /// Collects the attribute-routed actions of `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when an action template is malformed.
    pub fn from_cache(cache: &ActionDescriptorCache) -> Result<Self, TemplateError> {
        let mut entries: Vec<AttributeEntry> = Vec::new();
        for action in cache.descriptors() {
            let Some(template) = action.attribute_route() else {
                continue;
            };
            match entries
                .iter_mut()
                .find(|e| e.template.as_str().eq_ignore_ascii_case(template))
            {
                Some(entry) => entry.actions.push(Arc::clone(action)),
                None => entries.push(AttributeEntry {
                    template: RouteTemplate::parse(template)?,
                    actions: vec![Arc::clone(action)],
                }),
            }
        }
        entries.sort_by(|a, b| {
            b.template
                .literal_count()
                .cmp(&a.template.literal_count())
                .then(a.template.parameter_count().cmp(&b.template.parameter_count()))
        });
        Ok(Self { entries })
    }

    /// Number of distinct templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no action is attribute routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Templates in precedence order.
    pub fn templates(&self) -> impl Iterator<Item = &RouteTemplate> {
        self.entries.iter().map(|e| &e.template)
    }
}

/// Which candidates a match offers to action selection.
#[derive(Debug, Clone)]
pub enum MatchScope {
    /// Actions without attribute routes, filtered by route values.
    Conventional,
    /// Exactly these attribute-routed actions.
    Attribute(Vec<Arc<ActionDescriptor>>),
}

/// One way a route entry matched a path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Captured and default values.
    pub values: RouteValues,
    /// Candidate scope.
    pub scope: MatchScope,
    /// Name of the conventional route, or the attribute template.
    pub route: String,
}

/// An entry of the route table.
#[derive(Debug, Clone)]
pub enum RouteEntry {
    /// The attribute route.
    Attribute(AttributeRoute),
    /// A conventional route.
    Conventional(ConventionalRoute),
}

impl RouteEntry {
    /// Every way this entry matches `path`, best first.
    #[must_use]
    pub fn matches(&self, path: &str) -> Vec<RouteMatch> {
        match self {
            Self::Conventional(route) => route
                .match_path(path)
                .map(|values| RouteMatch {
                    values,
                    scope: MatchScope::Conventional,
                    route: route.name.clone(),
                })
                .into_iter()
                .collect(),
            Self::Attribute(route) => route
                .entries
                .iter()
                .filter_map(|entry| {
                    entry.template.match_path(path).map(|values| RouteMatch {
                        values,
                        scope: MatchScope::Attribute(entry.actions.clone()),
                        route: entry.template.as_str().to_string(),
                    })
                })
                .collect(),
        }
    }

    /// Returns true for the attribute route.
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::Attribute(_))
    }
}

/// A frozen, ordered route table.
#[derive(Debug, Clone)]
pub struct Router {
    entries: Arc<[RouteEntry]>,
}

impl Router {
    /// Entries in evaluation order.
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every match across all entries, in evaluation order.
    #[must_use]
    pub fn matches(&self, path: &str) -> Vec<RouteMatch> {
        self.entries.iter().flat_map(|e| e.matches(path)).collect()
    }
}

/// Collects route entries before they are frozen into a [`Router`].
#[derive(Debug, Clone, Default)]
pub struct RouteBuilder {
    routes: Vec<RouteEntry>,
}

impl RouteBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded with existing entries.
    #[must_use]
    pub fn from_routes(routes: Vec<RouteEntry>) -> Self {
        Self { routes }
    }

    /// Appends a conventional route.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn map_route(&mut self, name: &str, template: &str) -> Result<&mut Self, TemplateError> {
        self.map_route_with(name, template, &[], &[])
    }

    /// Appends a conventional route with extra defaults and constraints.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn map_route_with(
        &mut self,
        name: &str,
        template: &str,
        defaults: &[(&str, &str)],
        constraints: &[(&str, &str)],
    ) -> Result<&mut Self, TemplateError> {
        let mut route = ConventionalRoute::new(name, template)?;
        for (key, value) in defaults {
            route = route.default_value(*key, *value);
        }
        for (key, constraint) in constraints {
            route = route.constraint(*key, RouteConstraint::parse(constraint));
        }
        self.routes.push(RouteEntry::Conventional(route));
        Ok(self)
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: RouteEntry) -> &mut Self {
        self.routes.push(entry);
        self
    }

    /// Inserts an entry at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, entry: RouteEntry) -> &mut Self {
        let index = index.min(self.routes.len());
        self.routes.insert(index, entry);
        self
    }

    /// Entries so far.
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if nothing was mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the entries.
    #[must_use]
    pub fn build(self) -> Router {
        Router {
            entries: self.routes.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(pairs: &[(&str, &str)]) -> RouteValues {
        pairs.iter().copied().collect()
    }

    #[test]
    fn default_route_fills_defaults() {
        let template = RouteTemplate::parse("{controller=Home}/{action=Index}/{id?}").unwrap();
        assert_eq!(
            template.match_path("/"),
            Some(values(&[("controller", "Home"), ("action", "Index")]))
        );
        assert_eq!(
            template.match_path("/Normal/ActionWithParameters/5"),
            Some(values(&[
                ("controller", "Normal"),
                ("action", "ActionWithParameters"),
                ("id", "5")
            ]))
        );
        assert_eq!(template.match_path("/a/b/c/d"), None);
    }

    #[test]
    fn literals_ignore_case() {
        let template = RouteTemplate::parse("/AttributeController/AttributeAction").unwrap();
        assert!(template.match_path("/attributecontroller/ATTRIBUTEACTION").is_some());
        assert!(template.match_path("/AttributeController").is_none());
    }

    #[test]
    fn converters_constrain_matches() {
        let template = RouteTemplate::parse("items/{id:int}").unwrap();
        assert!(template.match_path("/items/42").is_some());
        assert!(template.match_path("/items/abc").is_none());

        let template = RouteTemplate::parse("items/{id:int=5}").unwrap();
        assert_eq!(template.match_path("/items").unwrap().get("id"), Some("5"));
    }

    #[test]
    fn catch_all_takes_the_rest() {
        let template = RouteTemplate::parse("files/{*path}").unwrap();
        assert_eq!(
            template.match_path("/files/a/b/c.txt").unwrap().get("path"),
            Some("a/b/c.txt")
        );
        assert!(template.match_path("/files").unwrap().get("path").is_none());
    }

    #[test]
    fn captured_values_are_decoded() {
        let template = RouteTemplate::parse("{name}").unwrap();
        assert_eq!(template.match_path("/John%20Doe").unwrap().get("name"), Some("John Doe"));
        assert_eq!(template.match_path("/a+b").unwrap().get("name"), Some("a+b"));
        assert_eq!(template.match_path("/100%").unwrap().get("name"), Some("100%"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        for bad in [
            "a//b",
            "{id",
            "x{id}",
            "{}",
            "{id:nope}",
            "{id}/{ID}",
            "{*rest}/tail",
            "{id?}/tail",
            "{id?=5}",
        ] {
            assert!(RouteTemplate::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn conventional_route_applies_defaults_and_constraints() {
        let route = ConventionalRoute::new("custom", "CustomRoute/{id?}")
            .unwrap()
            .default_value("controller", "Normal")
            .default_value("action", "FromRouteAction")
            .constraint("id", RouteConstraint::parse("int"));

        let matched = route.match_path("/CustomRoute").unwrap();
        assert_eq!(matched.get("controller"), Some("Normal"));
        assert_eq!(matched.get("action"), Some("FromRouteAction"));
        assert!(route.match_path("/CustomRoute/7").is_some());
        assert!(route.match_path("/CustomRoute/x").is_none());
    }

    #[test]
    fn one_of_constraint_ignores_case() {
        let constraint = RouteConstraint::parse("Files|Images");
        assert!(constraint.accepts("files"));
        assert!(!constraint.accepts("videos"));
    }

    #[test]
    fn route_builder_inserts_and_freezes() {
        let mut builder = RouteBuilder::new();
        builder.map_route("default", "{controller=Home}/{action=Index}/{id?}").unwrap();
        builder.insert(0, RouteEntry::Attribute(AttributeRoute::default()));
        let router = builder.build();
        assert_eq!(router.len(), 2);
        assert!(router.entries()[0].is_attribute());
        assert_eq!(router.matches("/").len(), 1);
    }

    proptest! {
        #[test]
        fn matching_never_panics(path in "(/[a-zA-Z0-9%+._-]{0,6}){0,5}") {
            let template = RouteTemplate::parse("{controller=Home}/{action=Index}/{id:int?}").unwrap();
            let _ = template.match_path(&path);
        }

        #[test]
        fn parsing_never_panics(template in "[a-z{}=?:*/]{0,16}") {
            let _ = RouteTemplate::parse(&template);
        }
    }
}
