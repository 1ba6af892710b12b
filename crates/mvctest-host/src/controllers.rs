//! Controllers, actions and their discovery.
//!
//! Rust has no runtime type scanning, so controllers are declared up front:
//! an [`ApplicationPart`] names a crate ("assembly") and lists the
//! [`ControllerDescriptor`]s it offers. At provider build time the
//! [`ActionDescriptorCache`] walks the registered parts, applies the
//! discovery rules of [`ControllerFeatureProvider`], lets every
//! [`ControllerModelConvention`] see (and adjust) each controller, and
//! flattens the result into [`ActionDescriptor`]s.

use crate::binding::ModelBinder;
use crate::hosting::StartupType;
use crate::options::MvcOptions;
use crate::request::Method;
use crate::services::{
    ImplementationId, ServiceCollection, ServiceDescriptor, ServiceKey, ServiceLifetime,
    ServiceProvider,
};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

type Activator = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

// ============================================================================
// Controller identity
// ============================================================================

/// Identity of a controller type.
#[derive(Clone, Copy)]
pub struct ControllerType {
    id: TypeId,
    full_name: &'static str,
}

impl ControllerType {
    /// Identity of `C`.
    #[must_use]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            full_name: std::any::type_name::<C>(),
        }
    }

    /// The `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full type path, e.g. `my_app::controllers::HomeController`.
    #[must_use]
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Last path segment, e.g. `HomeController`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        short_type_name(self.full_name)
    }

    /// The crate that defines the type.
    #[must_use]
    pub fn assembly(&self) -> &'static str {
        crate_of(self.full_name)
    }
}

impl PartialEq for ControllerType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ControllerType {}

impl std::hash::Hash for ControllerType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name)
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Last segment of a type path, ignoring generic arguments.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// First segment of a type path.
pub(crate) fn crate_of(full: &'static str) -> &'static str {
    full.split("::").next().unwrap_or(full)
}

/// A controller created through the service provider.
#[derive(Clone)]
pub struct ControllerInstance {
    controller_type: ControllerType,
    value: Arc<dyn Any + Send + Sync>,
}

impl ControllerInstance {
    pub(crate) fn new(controller_type: ControllerType, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            controller_type,
            value,
        }
    }

    /// The controller type.
    #[must_use]
    pub fn controller_type(&self) -> ControllerType {
        self.controller_type
    }

    /// The instance as `C`, if that is its type.
    #[must_use]
    pub fn downcast<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.value.downcast_ref::<Arc<C>>().cloned()
    }
}

impl fmt::Debug for ControllerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerInstance")
            .field("controller_type", &self.controller_type)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// Route values only.
    Route,
    /// Query string only.
    Query,
    /// Request body through an input formatter.
    Body,
    /// Route values, then the query string.
    Default,
}

/// The target type of a parameter.
#[derive(Debug, Clone)]
pub enum ParameterType {
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// `true` / `false`.
    Bool,
    /// Any string.
    String,
    /// A structured model.
    Model(ModelBinder),
}

impl ParameterType {
    /// Name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Model(binder) => binder.type_name(),
        }
    }
}

/// One action parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    name: String,
    source: BindingSource,
    kind: ParameterType,
    required: bool,
}

impl ParameterDescriptor {
    /// Parameter bound from route values, then the query string.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParameterType) -> Self {
        let source = match kind {
            ParameterType::Model(_) => BindingSource::Body,
            _ => BindingSource::Default,
        };
        Self {
            name: name.into(),
            source,
            kind,
            required: false,
        }
    }

    /// Route-bound parameter.
    #[must_use]
    pub fn route(name: impl Into<String>, kind: ParameterType) -> Self {
        Self::new(name, kind).source(BindingSource::Route)
    }

    /// Query-bound parameter.
    #[must_use]
    pub fn query(name: impl Into<String>, kind: ParameterType) -> Self {
        Self::new(name, kind).source(BindingSource::Query)
    }

    /// Body-bound model.
    #[must_use]
    pub fn body(name: impl Into<String>, binder: ModelBinder) -> Self {
        Self::new(name, ParameterType::Model(binder))
    }

    /// Overrides the binding source.
    #[must_use]
    pub fn source(mut self, source: BindingSource) -> Self {
        self.source = source;
        self
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Renames the parameter.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The binding source.
    #[must_use]
    pub fn binding_source(&self) -> BindingSource {
        self.source
    }

    /// The target type.
    #[must_use]
    pub fn kind(&self) -> &ParameterType {
        &self.kind
    }

    /// Whether a missing or unconvertible value is a model-state error.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// An action as declared on a controller.
#[derive(Debug, Clone)]
pub struct ActionModel {
    method: &'static str,
    name: String,
    http_methods: Vec<Method>,
    template: Option<String>,
    route_values: Vec<(String, String)>,
    parameters: Vec<ParameterDescriptor>,
}

impl ActionModel {
    /// Declares the action implemented by `method`. The action name
    /// defaults to the method identifier.
    #[must_use]
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            name: method.to_string(),
            http_methods: Vec::new(),
            template: None,
            route_values: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Overrides the action name used for routing.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restricts the action to the given HTTP methods.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.http_methods.extend(methods);
        self
    }

    /// Restricts the action to GET.
    #[must_use]
    pub fn http_get(self) -> Self {
        self.methods([Method::Get])
    }

    /// Restricts the action to POST.
    #[must_use]
    pub fn http_post(self) -> Self {
        self.methods([Method::Post])
    }

    /// Attribute route template, combined with the controller prefix.
    #[must_use]
    pub fn route(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Requires route value `key` to equal `value` for conventional matches.
    #[must_use]
    pub fn route_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.push((key.into(), value.into()));
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Renames the action.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Method identifier.
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Action name.
    #[must_use]
    pub fn action_name(&self) -> &str {
        &self.name
    }

    /// Parameters, mutable for conventions.
    pub fn parameters_mut(&mut self) -> &mut [ParameterDescriptor] {
        &mut self.parameters
    }
}

/// A controller as declared by an application part.
#[derive(Clone)]
pub struct ControllerDescriptor {
    controller_type: ControllerType,
    name: String,
    route_prefix: Option<String>,
    route_values: Vec<(String, String)>,
    non_controller: bool,
    activator: Activator,
    actions: Vec<ActionModel>,
}

impl ControllerDescriptor {
    /// Declares `C`. The controller name is the type name without a
    /// trailing `Controller`.
    #[must_use]
    pub fn of<C: Default + Send + Sync + 'static>() -> Self {
        let controller_type = ControllerType::of::<C>();
        let short = controller_type.name();
        let name = short.strip_suffix("Controller").unwrap_or(short);
        Self {
            controller_type,
            name: name.to_string(),
            route_prefix: None,
            route_values: Vec::new(),
            non_controller: false,
            activator: Arc::new(|| Arc::new(Arc::new(C::default())) as Arc<dyn Any + Send + Sync>),
            actions: Vec::new(),
        }
    }

    /// Overrides the controller name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attribute route prefix for every action.
    #[must_use]
    pub fn route(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = Some(prefix.into());
        self
    }

    /// Requires route value `key` to equal `value` for every action.
    #[must_use]
    pub fn route_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.push((key.into(), value.into()));
        self
    }

    /// Excludes the type from controller discovery.
    #[must_use]
    pub fn non_controller(mut self) -> Self {
        self.non_controller = true;
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn action(mut self, action: ActionModel) -> Self {
        self.actions.push(action);
        self
    }

    /// Renames the controller.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The controller type.
    #[must_use]
    pub fn controller_type(&self) -> ControllerType {
        self.controller_type
    }

    /// The controller name.
    #[must_use]
    pub fn controller_name(&self) -> &str {
        &self.name
    }

    /// Whether discovery skips the type.
    #[must_use]
    pub fn is_non_controller(&self) -> bool {
        self.non_controller
    }

    /// Declared actions.
    #[must_use]
    pub fn actions(&self) -> &[ActionModel] {
        &self.actions
    }

    /// Declared actions, mutable for conventions.
    pub fn actions_mut(&mut self) -> &mut [ActionModel] {
        &mut self.actions
    }

    /// Creates a new instance.
    #[must_use]
    pub fn activate(&self) -> ControllerInstance {
        ControllerInstance::new(self.controller_type, (self.activator)())
    }
}

impl fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("controller_type", &self.controller_type)
            .field("name", &self.name)
            .field("route_prefix", &self.route_prefix)
            .field("non_controller", &self.non_controller)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Application parts
// ============================================================================

/// The controllers and startup types a crate offers to the host.
#[derive(Debug, Clone)]
pub struct ApplicationPart {
    name: String,
    controllers: Vec<ControllerDescriptor>,
    startups: Vec<StartupType>,
}

impl ApplicationPart {
    /// Creates an empty part for the crate `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controllers: Vec::new(),
            startups: Vec::new(),
        }
    }

    /// Adds a controller.
    #[must_use]
    pub fn controller(mut self, controller: ControllerDescriptor) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Offers a startup type for automatic discovery.
    #[must_use]
    pub fn startup(mut self, startup: StartupType) -> Self {
        self.startups.push(startup);
        self
    }

    /// The crate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared controllers (including non-controllers).
    #[must_use]
    pub fn controllers(&self) -> &[ControllerDescriptor] {
        &self.controllers
    }

    /// Startup types offered for discovery.
    #[must_use]
    pub fn startups(&self) -> &[StartupType] {
        &self.startups
    }
}

/// The application parts known to the host.
///
/// Registered as options: every startup or hook adds parts with
/// [`add_application_part`].
#[derive(Debug, Clone, Default)]
pub struct ApplicationPartManager {
    parts: Vec<Arc<ApplicationPart>>,
}

impl ApplicationPartManager {
    /// Adds a part unless one with the same name is present.
    pub fn add_part(&mut self, part: Arc<ApplicationPart>) {
        if !self.parts.iter().any(|p| p.name == part.name) {
            self.parts.push(part);
        }
    }

    /// Registered parts in order.
    #[must_use]
    pub fn parts(&self) -> &[Arc<ApplicationPart>] {
        &self.parts
    }
}

/// Registers `part` with the host's [`ApplicationPartManager`].
pub fn add_application_part(services: &mut ServiceCollection, part: Arc<ApplicationPart>) {
    services.configure::<ApplicationPartManager>(move |manager| {
        manager.add_part(Arc::clone(&part));
    });
}

/// An explicit list of controller types.
///
/// When registered and non-empty it replaces part scanning: only the
/// listed types are considered.
#[derive(Debug, Clone, Default)]
pub struct ControllerTypeList {
    types: Vec<ControllerType>,
}

impl ControllerTypeList {
    /// Creates a list.
    #[must_use]
    pub fn new(types: impl IntoIterator<Item = ControllerType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    /// The listed types.
    #[must_use]
    pub fn types(&self) -> &[ControllerType] {
        &self.types
    }

    /// Returns true if nothing is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Decides which declared types are controllers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerFeatureProvider;

impl ControllerFeatureProvider {
    /// Controllers from `parts`, in declaration order, deduplicated.
    ///
    /// A type is a controller unless flagged `non_controller`. A non-empty
    /// `type_list` limits the result to the listed types.
    #[must_use]
    pub fn discover(
        &self,
        parts: &[Arc<ApplicationPart>],
        type_list: Option<&ControllerTypeList>,
    ) -> Vec<ControllerDescriptor> {
        let allowed: Option<HashSet<ControllerType>> = type_list
            .filter(|list| !list.is_empty())
            .map(|list| list.types().iter().copied().collect());

        let mut seen = HashSet::new();
        parts
            .iter()
            .flat_map(|part| part.controllers.iter())
            .filter(|controller| !controller.non_controller)
            .filter(|controller| {
                allowed
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(&controller.controller_type))
            })
            .filter(|controller| seen.insert(controller.controller_type))
            .cloned()
            .collect()
    }
}

/// Observer invoked once per discovered controller while the action
/// descriptor cache is built. Conventions may rename controllers, actions
/// and parameters.
pub trait ControllerModelConvention: Send + Sync {
    /// Inspect or adjust a discovered controller.
    fn apply(&self, controller: &mut ControllerDescriptor);
}

/// Registers every controller of `parts` as a transient service.
///
/// Returns the registered types.
pub fn add_controllers_as_services(
    services: &mut ServiceCollection,
    parts: &[Arc<ApplicationPart>],
) -> Vec<ControllerType> {
    let controllers = ControllerFeatureProvider.discover(parts, None);
    let mut registered = Vec::with_capacity(controllers.len());
    for controller in controllers {
        let ty = controller.controller_type;
        let key = ServiceKey::from_parts(ty.type_id(), ty.full_name());
        if services.contains_key(key) {
            continue;
        }
        let activator = Arc::clone(&controller.activator);
        services.add(ServiceDescriptor::erased(
            key,
            ImplementationId::from_parts(ty.type_id(), ty.full_name()),
            ServiceLifetime::Transient,
            move |_| activator(),
        ));
        registered.push(ty);
    }
    registered
}

// ============================================================================
// Action descriptors
// ============================================================================

/// Stable index of an action within its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

/// A routable action after discovery and conventions.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    id: ActionId,
    controller_type: ControllerType,
    controller_name: String,
    action_name: String,
    method: &'static str,
    http_methods: Vec<Method>,
    attribute_route: Option<String>,
    route_values: Vec<(String, String)>,
    parameters: Vec<ParameterDescriptor>,
    display_name: String,
}

impl ActionDescriptor {
    fn from_model(id: ActionId, controller: &ControllerDescriptor, action: &ActionModel) -> Self {
        let controller_type = controller.controller_type;

        let mut route_values = vec![
            ("controller".to_string(), controller.name.clone()),
            ("action".to_string(), action.name.clone()),
        ];
        for (key, value) in controller.route_values.iter().chain(&action.route_values) {
            match route_values
                .iter_mut()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
            {
                Some(existing) => existing.1 = value.clone(),
                None => route_values.push((key.clone(), value.clone())),
            }
        }

        let attribute_route = combine_templates(
            controller.route_prefix.as_deref(),
            action.template.as_deref(),
        )
        .map(|template| {
            template
                .replace("[controller]", &controller.name)
                .replace("[action]", &action.name)
        });

        Self {
            id,
            controller_type,
            controller_name: controller.name.clone(),
            action_name: action.name.clone(),
            method: action.method,
            http_methods: action.http_methods.clone(),
            attribute_route,
            route_values,
            parameters: action.parameters.clone(),
            display_name: format!(
                "{}::{} ({})",
                controller_type.full_name(),
                action.method,
                controller_type.assembly()
            ),
        }
    }

    /// Id within the cache.
    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// The controller type.
    #[must_use]
    pub fn controller_type(&self) -> ControllerType {
        self.controller_type
    }

    /// The controller name.
    #[must_use]
    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    /// The action name.
    #[must_use]
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    /// The implementing method.
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Allowed HTTP methods. Empty means any.
    #[must_use]
    pub fn http_methods(&self) -> &[Method] {
        &self.http_methods
    }

    /// Returns true if the action accepts `method`.
    #[must_use]
    pub fn accepts(&self, method: Method) -> bool {
        self.http_methods.is_empty() || self.http_methods.contains(&method)
    }

    /// Full attribute route template, if attribute routed.
    #[must_use]
    pub fn attribute_route(&self) -> Option<&str> {
        self.attribute_route.as_deref()
    }

    /// Route values a conventional match must carry.
    #[must_use]
    pub fn route_values(&self) -> &[(String, String)] {
        &self.route_values
    }

    /// Parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// `"{controller path}::{method} ({crate})"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

fn combine_templates(prefix: Option<&str>, template: Option<&str>) -> Option<String> {
    match (prefix, template) {
        (_, Some(template)) if template.starts_with('/') || template.starts_with("~/") => Some(
            template
                .trim_start_matches('~')
                .trim_matches('/')
                .to_string(),
        ),
        (Some(prefix), Some(template)) => {
            let prefix = prefix.trim_matches('/');
            let template = template.trim_matches('/');
            if prefix.is_empty() {
                Some(template.to_string())
            } else if template.is_empty() {
                Some(prefix.to_string())
            } else {
                Some(format!("{prefix}/{template}"))
            }
        }
        (Some(prefix), None) => Some(prefix.trim_matches('/').to_string()),
        (None, Some(template)) => Some(template.trim_matches('/').to_string()),
        (None, None) => None,
    }
}

/// Every action the host can route to, built once per provider.
#[derive(Debug)]
pub struct ActionDescriptorCache {
    controllers: Vec<ControllerType>,
    descriptors: Vec<Arc<ActionDescriptor>>,
}

impl ActionDescriptorCache {
    /// Builds the cache from the provider's parts, type list and options.
    ///
    /// Every configured convention sees each discovered controller once.
    #[must_use]
    pub fn build(provider: &ServiceProvider) -> Self {
        let parts = provider.options::<ApplicationPartManager>();
        let type_list = provider.get::<ControllerTypeList>();
        let feature = provider
            .get::<ControllerFeatureProvider>()
            .map_or(ControllerFeatureProvider, |f| *f);
        let options = provider.options::<MvcOptions>();

        let mut controllers = Vec::new();
        let mut descriptors = Vec::new();
        for mut controller in feature.discover(parts.parts(), type_list.as_deref()) {
            for convention in &options.conventions {
                convention.apply(&mut controller);
            }
            controllers.push(controller.controller_type);
            for action in &controller.actions {
                let id = ActionId(descriptors.len());
                descriptors.push(Arc::new(ActionDescriptor::from_model(id, &controller, action)));
            }
        }

        Self {
            controllers,
            descriptors,
        }
    }

    /// All actions in discovery order.
    #[must_use]
    pub fn descriptors(&self) -> &[Arc<ActionDescriptor>] {
        &self.descriptors
    }

    /// Discovered controller types.
    #[must_use]
    pub fn controllers(&self) -> &[ControllerType] {
        &self.controllers
    }

    /// Actions of one controller.
    pub fn for_controller(
        &self,
        controller: ControllerType,
    ) -> impl Iterator<Item = &Arc<ActionDescriptor>> {
        self.descriptors
            .iter()
            .filter(move |d| d.controller_type == controller)
    }

    /// Looks up an action by id.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&Arc<ActionDescriptor>> {
        self.descriptors.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceCollection;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct HomeController;

    #[derive(Default)]
    struct RouteController;

    #[derive(Default)]
    struct Helper;

    fn part() -> ApplicationPart {
        ApplicationPart::new("app")
            .controller(
                ControllerDescriptor::of::<HomeController>()
                    .action(ActionModel::new("Index"))
                    .action(ActionModel::new("ActionWithChangedName").name("AnotherName")),
            )
            .controller(
                ControllerDescriptor::of::<RouteController>()
                    .route("AttributeController")
                    .action(ActionModel::new("Index").route("AttributeAction"))
                    .action(
                        ActionModel::new("Action")
                            .http_get()
                            .route("[action]/{id}")
                            .param(ParameterDescriptor::route("id", ParameterType::Int)),
                    ),
            )
            .controller(ControllerDescriptor::of::<Helper>().non_controller())
    }

    #[test]
    fn controller_name_strips_suffix() {
        let descriptor = ControllerDescriptor::of::<HomeController>();
        assert_eq!(descriptor.controller_name(), "Home");
        assert_eq!(ControllerType::of::<HomeController>().name(), "HomeController");
        assert_eq!(ControllerType::of::<HomeController>().assembly(), "mvctest_host");
    }

    #[test]
    fn discovery_skips_non_controllers_and_duplicates() {
        let parts = vec![Arc::new(part()), Arc::new(part())];
        let found = ControllerFeatureProvider.discover(&parts, None);
        let names: Vec<_> = found.iter().map(|c| c.controller_name().to_string()).collect();
        assert_eq!(names, vec!["Home", "Route"]);
    }

    #[test]
    fn type_list_limits_discovery() {
        let parts = vec![Arc::new(part())];
        let list = ControllerTypeList::new([ControllerType::of::<RouteController>()]);
        let found = ControllerFeatureProvider.discover(&parts, Some(&list));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].controller_type(), ControllerType::of::<RouteController>());
    }

    #[test]
    fn attribute_templates_are_combined() {
        let mut services = ServiceCollection::new();
        add_application_part(&mut services, Arc::new(part()));
        let provider = services.build_provider();
        let cache = ActionDescriptorCache::build(&provider);

        let routes: Vec<_> = cache
            .for_controller(ControllerType::of::<RouteController>())
            .map(|d| d.attribute_route().unwrap_or_default().to_string())
            .collect();
        assert_eq!(routes, vec!["AttributeController/AttributeAction", "AttributeController/Action/{id}"]);

        let renamed = &cache.descriptors()[1];
        assert_eq!(renamed.action_name(), "AnotherName");
        assert_eq!(renamed.method(), "ActionWithChangedName");
        assert!(renamed.display_name().ends_with("HomeController::ActionWithChangedName (mvctest_host)"));
    }

    #[test]
    fn combine_templates_handles_overrides() {
        assert_eq!(combine_templates(Some("api"), Some("/root")), Some("root".into()));
        assert_eq!(combine_templates(Some("api/"), Some("items")), Some("api/items".into()));
        assert_eq!(combine_templates(Some("api"), None), Some("api".into()));
        assert_eq!(combine_templates(None, None), None);
    }

    struct Recording(Mutex<Vec<ControllerType>>);

    impl ControllerModelConvention for Recording {
        fn apply(&self, controller: &mut ControllerDescriptor) {
            self.0.lock().push(controller.controller_type());
        }
    }

    struct Rename;

    impl ControllerModelConvention for Rename {
        fn apply(&self, controller: &mut ControllerDescriptor) {
            if controller.controller_name() == "Home" {
                controller.set_name("Changed");
            }
        }
    }

    #[test]
    fn conventions_see_each_controller_once() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let observer = Arc::clone(&recording);
        let mut services = ServiceCollection::new();
        add_application_part(&mut services, Arc::new(part()));
        services.configure::<MvcOptions>(move |o| {
            o.conventions.push(observer.clone());
            o.conventions.push(Arc::new(Rename));
        });
        let cache = ActionDescriptorCache::build(&services.build_provider());

        assert_eq!(recording.0.lock().len(), 2);
        assert_eq!(cache.descriptors()[0].controller_name(), "Changed");
        assert_eq!(cache.descriptors()[0].route_values()[0].1, "Changed");
    }

    #[test]
    fn controllers_as_services_are_transient() {
        let mut services = ServiceCollection::new();
        let registered = add_controllers_as_services(&mut services, &[Arc::new(part())]);
        assert_eq!(registered.len(), 2);

        let provider = services.build_provider();
        let a = provider.controller(&ControllerType::of::<HomeController>()).unwrap();
        let b = provider.controller(&ControllerType::of::<HomeController>()).unwrap();
        assert!(!Arc::ptr_eq(
            &a.downcast::<HomeController>().unwrap(),
            &b.downcast::<HomeController>().unwrap()
        ));
        assert!(provider.controller(&ControllerType::of::<Helper>()).is_none());
        assert!(provider.get::<HomeController>().is_some());
    }
}
