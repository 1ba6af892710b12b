//! Model binding and model state.
//!
//! Binding maps route values, query pairs and the request body onto an
//! action's parameters. Problems never abort binding: they end up in the
//! [`ModelState`] and the affected argument is left out (or `null` for body
//! models).

use crate::controllers::{ActionDescriptor, BindingSource, ParameterDescriptor, ParameterType};
use crate::error::{error_types, loc, LocItem, ValidationError, ValidationErrors};
use crate::hosting::RouteContext;
use crate::options::MvcOptions;
use crate::routing::RouteValues;
use crate::validation::Validate;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Model state
// ============================================================================

/// Per-key binding and validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelState {
    errors: IndexMap<String, Vec<String>>,
}

impl ModelState {
    /// Creates a valid, empty model state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no error was recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records an error under `key`.
    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_default().push(message.into());
    }

    /// Records a validation error under its location key.
    pub fn add_validation_error(&mut self, error: &ValidationError) {
        self.add_error(error.model_state_key(), error.msg.clone());
    }

    /// Errors recorded under `key` (case-insensitive).
    #[must_use]
    pub fn errors_for(&self, key: &str) -> &[String] {
        self.errors
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map_or(&[], |(_, v)| v.as_slice())
    }

    /// Returns true if `key` has errors.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        !self.errors_for(key).is_empty()
    }

    /// Keys in the order they were first recorded.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// All errors by key.
    #[must_use]
    pub fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    /// Number of keys with errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Appends the errors of `other`.
    pub fn merge(&mut self, other: ModelState) {
        for (key, messages) in other.errors {
            self.errors.entry(key).or_default().extend(messages);
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return f.write_str("valid");
        }
        let mut first = true;
        for (key, messages) in &self.errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{key}: {message}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Model binders
// ============================================================================

/// A body value after typed binding.
#[derive(Debug, Clone)]
pub struct BoundModel {
    /// The model re-serialized from its typed form.
    pub value: Value,
    /// Validation errors, locations relative to the model root.
    pub errors: ValidationErrors,
}

type BindFn = Arc<dyn Fn(Value) -> Result<BoundModel, ValidationError> + Send + Sync>;

/// Converts a parsed body into a typed model and validates it.
#[derive(Clone)]
pub struct ModelBinder {
    type_name: &'static str,
    bind: BindFn,
}

impl ModelBinder {
    /// Binder for `T`.
    ///
    /// An object missing a field that `T` requires still binds: the field is
    /// set to `null` in the bound value and reported as `missing`.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Serialize + Validate + 'static,
    {
        Self {
            type_name: crate::controllers::short_type_name(std::any::type_name::<T>()),
            bind: Arc::new(|value: Value| {
                let model: T = match serde_json::from_value(value.clone()) {
                    Ok(model) => model,
                    Err(e) => return partial_model(value, &e),
                };
                let errors = match model.validate() {
                    Ok(()) => ValidationErrors::new(),
                    Err(errors) => *errors,
                };
                let value = serde_json::to_value(&model).map_err(|e| {
                    ValidationError::new(error_types::JSON_TYPE, Vec::new()).with_msg(e.to_string())
                })?;
                Ok(BoundModel { value, errors })
            }),
        }
    }

    /// Binder that accepts any JSON.
    #[must_use]
    pub fn json() -> Self {
        Self::of::<Value>()
    }

    /// Short name of the model type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Binds a parsed body.
    ///
    /// # Errors
    ///
    /// Returns a `json_type` error when the value does not fit the model.
    pub fn bind(&self, value: Value) -> Result<BoundModel, ValidationError> {
        (self.bind)(value)
    }
}

/// Keeps an object whose only problem is a missing field.
///
/// Deserialization stops at the first missing field, so only that one is
/// reported.
fn partial_model(mut value: Value, error: &serde_json::Error) -> Result<BoundModel, ValidationError> {
    let message = error.to_string();
    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| field.to_string());
    let shape_error = || ValidationError::new(error_types::JSON_TYPE, Vec::new()).with_msg(message.clone());
    let Some(field) = missing else {
        return Err(shape_error());
    };
    let Some(object) = value.as_object_mut() else {
        return Err(shape_error());
    };
    object.entry(field.clone()).or_insert(Value::Null);
    Ok(BoundModel {
        value,
        errors: ValidationErrors::single(ValidationError::missing(vec![LocItem::field(field)])),
    })
}

impl fmt::Debug for ModelBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBinder")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Action binding
// ============================================================================

/// Bound arguments plus the model state they produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingResult {
    /// Present arguments in parameter order.
    pub arguments: IndexMap<String, Value>,
    /// Binding and validation errors.
    pub model_state: ModelState,
}

/// Binds every parameter of `action`.
#[must_use]
pub fn bind_action(
    action: &ActionDescriptor,
    route_values: &RouteValues,
    context: &RouteContext,
    options: &MvcOptions,
) -> BindingResult {
    let mut result = BindingResult::default();
    for parameter in action.parameters() {
        let bound = match parameter.kind() {
            ParameterType::Model(binder) => {
                Some(bind_body(parameter, binder, context, options, &mut result.model_state))
            }
            scalar => bind_scalar(parameter, scalar, route_values, context, &mut result.model_state),
        };
        if let Some(value) = bound {
            result.arguments.insert(parameter.name().to_string(), value);
        }
    }
    result
}

fn lookup_raw(
    parameter: &ParameterDescriptor,
    route_values: &RouteValues,
    context: &RouteContext,
) -> Option<(Vec<LocItem>, String)> {
    let name = parameter.name();
    let from_route = || route_values.get(name).map(|v| (loc::path(name), v.to_string()));
    let from_query = || {
        context
            .query_pairs()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| (loc::query(name), v.clone()))
    };
    match parameter.binding_source() {
        BindingSource::Route => from_route(),
        BindingSource::Query => from_query(),
        BindingSource::Default | BindingSource::Body => from_route().or_else(from_query),
    }
}

fn convert_scalar(kind: &ParameterType, raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    match kind {
        ParameterType::Int => trimmed.parse::<i64>().ok().map(Value::from),
        ParameterType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ParameterType::Bool => {
            if trimmed.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        ParameterType::String => Some(Value::String(raw.to_string())),
        ParameterType::Model(_) => None,
    }
}

fn bind_scalar(
    parameter: &ParameterDescriptor,
    kind: &ParameterType,
    route_values: &RouteValues,
    context: &RouteContext,
    model_state: &mut ModelState,
) -> Option<Value> {
    let name = parameter.name();
    let Some((location, raw)) = lookup_raw(parameter, route_values, context) else {
        if parameter.is_required() {
            let location = match parameter.binding_source() {
                BindingSource::Query => loc::query(name),
                _ => loc::path(name),
            };
            let error = ValidationError::missing(location).with_msg(format!(
                "A value for the '{name}' parameter or property was not provided."
            ));
            model_state.add_validation_error(&error);
        }
        return None;
    };

    let converted = convert_scalar(kind, &raw);
    if converted.is_none() && parameter.is_required() {
        let error = ValidationError::type_error(location, kind.type_name())
            .with_msg(format!("The value '{raw}' is not valid for {name}."))
            .with_input(Value::String(raw));
        model_state.add_validation_error(&error);
    }
    converted
}

fn bind_body(
    parameter: &ParameterDescriptor,
    binder: &ModelBinder,
    context: &RouteContext,
    options: &MvcOptions,
    model_state: &mut ModelState,
) -> Value {
    let body = context.request().body_bytes().unwrap_or_default();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }

    let content_type = context.request().content_type().unwrap_or_default();
    let Some(formatter) = options.formatter_for(content_type) else {
        let error = ValidationError::unsupported_media_type(loc::body(), content_type);
        add_body_error(model_state, parameter, &error);
        return Value::Null;
    };

    let parsed = match formatter.read(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            add_body_error(model_state, parameter, &error);
            return Value::Null;
        }
    };

    match binder.bind(parsed) {
        Ok(bound) => {
            for error in bound.errors.with_loc_prefix(loc::body()) {
                add_body_error(model_state, parameter, &error);
            }
            bound.value
        }
        Err(error) => {
            add_body_error(model_state, parameter, &error.with_loc_prefix(loc::body()));
            Value::Null
        }
    }
}

/// Errors at the body root are keyed by the parameter name.
fn add_body_error(model_state: &mut ModelState, parameter: &ParameterDescriptor, error: &ValidationError) {
    if error.model_state_key().is_empty() {
        model_state.add_error(parameter.name(), error.msg.clone());
    } else {
        model_state.add_validation_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{
        add_application_part, ActionDescriptorCache, ActionModel, ApplicationPart,
        ControllerDescriptor,
    };
    use crate::hosting::RouteContext;
    use crate::options::{JsonInputFormatter, StringInputFormatter};
    use crate::request::SyntheticRequest;
    use crate::services::ServiceCollection;
    use crate::validation::required;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct RequestModel {
        #[serde(rename = "Integer")]
        integer: i64,
        #[serde(rename = "String")]
        string: Option<String>,
    }

    impl Validate for RequestModel {
        fn validate(&self) -> Result<(), Box<ValidationErrors>> {
            let mut errors = ValidationErrors::new();
            required(&mut errors, "String", self.string.as_deref());
            errors.into_result()
        }
    }

    #[derive(Default)]
    struct NormalController;

    fn action(model: ActionModel) -> Arc<ActionDescriptor> {
        let part = ApplicationPart::new("app")
            .controller(ControllerDescriptor::of::<NormalController>().action(model));
        let mut services = ServiceCollection::new();
        add_application_part(&mut services, Arc::new(part));
        let cache = ActionDescriptorCache::build(&services.build_provider());
        Arc::clone(&cache.descriptors()[0])
    }

    fn options() -> MvcOptions {
        MvcOptions {
            conventions: Vec::new(),
            input_formatters: vec![Arc::new(JsonInputFormatter), Arc::new(StringInputFormatter)],
        }
    }

    fn bind(model: ActionModel, values: &[(&str, &str)], request: SyntheticRequest) -> BindingResult {
        let route_values: RouteValues = values.iter().copied().collect();
        bind_action(&action(model), &route_values, &RouteContext::new(request), &options())
    }

    #[test]
    fn required_int_conversion_failure_is_model_error() {
        let model = ActionModel::new("ActionWithParameters")
            .param(ParameterDescriptor::new("id", ParameterType::Int).required());
        let result = bind(model, &[("id", "Test")], SyntheticRequest::get("/"));
        assert!(result.arguments.is_empty());
        assert!(!result.model_state.is_valid());
        assert_eq!(
            result.model_state.errors_for("id"),
            ["The value 'Test' is not valid for id."]
        );
    }

    #[test]
    fn optional_conversion_failure_is_silent() {
        let model = ActionModel::new("QueryString")
            .param(ParameterDescriptor::new("second", ParameterType::Int));
        let result = bind(model, &[], SyntheticRequest::get("/").query_string("second=x"));
        assert!(result.arguments.is_empty());
        assert!(result.model_state.is_valid());
    }

    #[test]
    fn missing_required_value_is_reported() {
        let model = ActionModel::new("Required")
            .param(ParameterDescriptor::query("id", ParameterType::Int).required());
        let result = bind(model, &[("id", "5")], SyntheticRequest::get("/"));
        assert!(result.arguments.is_empty());
        assert!(result.model_state.contains_key("id"));
    }

    #[test]
    fn route_values_win_over_query() {
        let model = ActionModel::new("Mixed")
            .param(ParameterDescriptor::new("id", ParameterType::Int))
            .param(ParameterDescriptor::new("text", ParameterType::String));
        let request = SyntheticRequest::get("/").query_string("id=9&TEXT=test");
        let result = bind(model, &[("id", "5")], request);
        assert_eq!(result.arguments["id"], Value::from(5));
        assert_eq!(result.arguments["text"], Value::from("test"));
    }

    fn model_action() -> ActionModel {
        ActionModel::new("ActionWithModel")
            .param(ParameterDescriptor::new("id", ParameterType::Int))
            .param(ParameterDescriptor::body("model", ModelBinder::of::<RequestModel>()))
    }

    #[test]
    fn complete_body_binds_valid_model() {
        let request = SyntheticRequest::post("/").json_body(r#"{"Integer":5,"String":"Test"}"#);
        let result = bind(model_action(), &[("id", "5")], request);
        assert_eq!(result.arguments.len(), 2);
        assert_eq!(result.arguments["model"]["String"], "Test");
        assert!(result.model_state.is_valid());
    }

    #[test]
    fn partial_body_binds_invalid_model() {
        let request = SyntheticRequest::post("/").json_body(r#"{"Integer":5}"#);
        let result = bind(model_action(), &[("id", "5")], request);
        assert_eq!(result.arguments["model"]["Integer"], 5);
        assert!(result.arguments["model"]["String"].is_null());
        assert!(!result.model_state.is_valid());
        assert_eq!(result.model_state.keys().collect::<Vec<_>>(), vec!["String"]);
    }

    #[test]
    fn empty_body_binds_null_model() {
        let request = SyntheticRequest::post("/").with_content_type("application/json");
        let result = bind(model_action(), &[("id", "5")], request);
        assert!(result.arguments["model"].is_null());
        assert!(result.model_state.is_valid());
    }

    #[test]
    fn malformed_json_is_keyed_by_parameter() {
        let request = SyntheticRequest::post("/").json_body("{oops");
        let result = bind(model_action(), &[], request);
        assert!(result.arguments["model"].is_null());
        assert!(result.model_state.contains_key("model"));
    }

    #[test]
    fn wrong_shape_is_keyed_by_parameter() {
        let request = SyntheticRequest::post("/").json_body(r#"{"Integer":"five"}"#);
        let result = bind(model_action(), &[], request);
        assert!(result.arguments["model"].is_null());
        assert!(result.model_state.contains_key("model"));
    }

    #[test]
    fn unreadable_content_type_is_reported() {
        let request = SyntheticRequest::post("/")
            .with_content_type("application/xml")
            .body("<x/>");
        let result = bind(model_action(), &[], request);
        assert!(result.arguments["model"].is_null());
        assert_eq!(
            result.model_state.errors_for("model"),
            ["Unsupported content type 'application/xml'."]
        );
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct StrictModel {
        #[serde(rename = "Integer")]
        integer: i64,
        #[serde(rename = "String")]
        string: String,
    }

    impl Validate for StrictModel {
        fn validate(&self) -> Result<(), Box<ValidationErrors>> {
            Ok(())
        }
    }

    #[test]
    fn missing_non_optional_field_keeps_partial_model() {
        let model = ActionModel::new("Strict")
            .param(ParameterDescriptor::body("model", ModelBinder::of::<StrictModel>()));
        let request = SyntheticRequest::post("/").json_body(r#"{"Integer":5}"#);
        let result = bind(model, &[], request);
        assert_eq!(result.arguments["model"]["Integer"], 5);
        assert!(result.arguments["model"]["String"].is_null());
        assert_eq!(result.model_state.keys().collect::<Vec<_>>(), vec!["String"]);
        assert_eq!(result.model_state.errors_for("String"), ["Field required"]);
    }

    #[test]
    fn binder_reports_missing_field_relative_to_model() {
        let bound = ModelBinder::of::<StrictModel>()
            .bind(serde_json::json!({"String": "Test"}))
            .unwrap();
        assert_eq!(bound.value["String"], "Test");
        assert!(bound.value["Integer"].is_null());
        let error = bound.errors.iter().next().unwrap();
        assert_eq!(error.error_type, "missing");
        assert_eq!(error.model_state_key(), "Integer");
    }

    #[test]
    fn binder_rejects_wrong_field_type() {
        let error = ModelBinder::of::<StrictModel>()
            .bind(serde_json::json!({"Integer": "five", "String": "Test"}))
            .unwrap_err();
        assert_eq!(error.error_type, "json_type");
    }

    #[test]
    fn text_body_binds_string_model() {
        let model = ActionModel::new("Text")
            .param(ParameterDescriptor::body("content", ModelBinder::of::<String>()));
        let result = bind(model, &[], SyntheticRequest::post("/").text_body("hello"));
        assert_eq!(result.arguments["content"], "hello");
    }

    #[test]
    fn model_state_merge_and_display() {
        let mut state = ModelState::new();
        state.add_error("a", "first");
        let mut other = ModelState::new();
        other.add_error("a", "second");
        other.add_error("b", "third");
        state.merge(other);
        assert_eq!(state.error_count(), 3);
        assert_eq!(state.to_string(), "a: first; a: second; b: third");
    }
}
