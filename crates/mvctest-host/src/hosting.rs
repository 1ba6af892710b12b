//! Hosting: environment, startup contract and the application pipeline.
//!
//! A [`Startup`] contributes services (`configure_services`) and then
//! configures the request pipeline (`configure`) through an
//! [`ApplicationBuilder`]. The only pipeline feature the host models is
//! MVC routing: [`ApplicationBuilder::use_mvc`] collects the route table,
//! always placing the attribute route first.

use crate::controllers::{
    crate_of, short_type_name, ActionDescriptorCache, ControllerFeatureProvider,
};
use crate::error::StartupError;
use crate::invoker::{ActionInvokerProvider, ControllerActionInvokerProvider};
use crate::options::{JsonInputFormatter, MvcOptions};
use crate::providers::add_temp_data;
use crate::request::SyntheticRequest;
use crate::routing::{AttributeRoute, RouteBuilder, RouteEntry};
use crate::selection::ActionSelector;
use crate::services::{ServiceCollection, ServiceLifetime, ServiceProvider};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Template of the route added by [`ApplicationBuilder::use_mvc_with_default_route`].
pub const DEFAULT_ROUTE_TEMPLATE: &str = "{controller=Home}/{action=Index}/{id?}";

/// Name of the default conventional route.
pub const DEFAULT_ROUTE_NAME: &str = "default";

// ============================================================================
// Environment
// ============================================================================

/// Where the application believes it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingEnvironment {
    /// Environment name, e.g. `Test` or `Development`.
    pub environment_name: String,
    /// Application identity. `None` when none was declared.
    pub application_name: Option<String>,
}

impl HostingEnvironment {
    /// Creates an environment.
    #[must_use]
    pub fn new(environment_name: impl Into<String>, application_name: Option<String>) -> Self {
        Self {
            environment_name: environment_name.into(),
            application_name,
        }
    }

    /// Returns true if the environment is `name`, ignoring case.
    #[must_use]
    pub fn is_environment(&self, name: &str) -> bool {
        self.environment_name.eq_ignore_ascii_case(name)
    }
}

// ============================================================================
// Request context
// ============================================================================

/// A request as seen by routing and binding.
#[derive(Debug, Clone)]
pub struct RouteContext {
    request: SyntheticRequest,
    path: String,
    query: Vec<(String, String)>,
}

impl RouteContext {
    /// Wraps `request`, normalising its path and parsing its query once.
    #[must_use]
    pub fn new(request: SyntheticRequest) -> Self {
        let path = if request.path().starts_with('/') {
            request.path().to_string()
        } else {
            format!("/{}", request.path())
        };
        let query = request.query_pairs();
        Self {
            request,
            path,
            query,
        }
    }

    /// The underlying request.
    #[must_use]
    pub fn request(&self) -> &SyntheticRequest {
        &self.request
    }

    /// Request path with a leading `/`. Segments are decoded by the
    /// route templates.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query pairs in request order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Creates the [`RouteContext`] for a request.
pub trait RequestContextFactory: Send + Sync {
    /// Wraps `request`.
    fn create(&self, request: &SyntheticRequest) -> RouteContext;
}

/// Plain [`RouteContext::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestContextFactory;

impl RequestContextFactory for DefaultRequestContextFactory {
    fn create(&self, request: &SyntheticRequest) -> RouteContext {
        RouteContext::new(request.clone())
    }
}

// ============================================================================
// Startup
// ============================================================================

/// User-supplied application configuration.
pub trait Startup: Send + Sync {
    /// Registers services. The default registers MVC.
    ///
    /// # Errors
    ///
    /// Any error aborts the build and reaches the caller unchanged.
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), StartupError> {
        add_mvc(services);
        Ok(())
    }

    /// Configures the pipeline. The default does nothing.
    ///
    /// # Errors
    ///
    /// Any error aborts the build and reaches the caller unchanged.
    fn configure(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        let _ = app;
        Ok(())
    }
}

type StartupConstructor = Arc<dyn Fn(&HostingEnvironment) -> Arc<dyn Startup> + Send + Sync>;

/// A startup type that can be named, discovered and instantiated.
#[derive(Clone)]
pub struct StartupType {
    id: TypeId,
    full_name: &'static str,
    constructor: StartupConstructor,
}

impl StartupType {
    /// Startup `S` created with `S::default()`.
    #[must_use]
    pub fn of<S: Startup + Default + 'static>() -> Self {
        Self::new::<S>(|_| S::default())
    }

    /// Startup `S` created from the hosting environment.
    #[must_use]
    pub fn new<S: Startup + 'static>(constructor: fn(&HostingEnvironment) -> S) -> Self {
        Self {
            id: TypeId::of::<S>(),
            full_name: std::any::type_name::<S>(),
            constructor: Arc::new(move |env: &HostingEnvironment| {
                Arc::new(constructor(env)) as Arc<dyn Startup>
            }),
        }
    }

    /// Short type name, e.g. `TestStartup`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        short_type_name(self.full_name)
    }

    /// Full type path.
    #[must_use]
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// The crate that defines the type.
    #[must_use]
    pub fn assembly(&self) -> &'static str {
        crate_of(self.full_name)
    }

    /// Creates an instance for `environment`.
    #[must_use]
    pub fn instantiate(&self, environment: &HostingEnvironment) -> Arc<dyn Startup> {
        (self.constructor)(environment)
    }
}

impl PartialEq for StartupType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StartupType {}

impl fmt::Debug for StartupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StartupType").field(&self.full_name).finish()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Marks a registry that went through [`add_mvc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MvcMarkerService;

/// Builds the request pipeline during `Startup::configure`.
pub struct ApplicationBuilder {
    services: Arc<ServiceProvider>,
    steps: Vec<String>,
    routes: Option<RouteBuilder>,
}

impl ApplicationBuilder {
    /// Builder over the application's services.
    #[must_use]
    pub fn new(services: Arc<ServiceProvider>) -> Self {
        Self {
            services,
            steps: Vec::new(),
            routes: None,
        }
    }

    /// The application's services.
    #[must_use]
    pub fn application_services(&self) -> &Arc<ServiceProvider> {
        &self.services
    }

    /// Records a named pipeline step.
    pub fn use_step(&mut self, name: impl Into<String>) -> &mut Self {
        self.steps.push(name.into());
        self
    }

    /// Step names in registration order.
    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Adds MVC routing. `configure` maps conventional routes; the
    /// attribute route is inserted ahead of them.
    ///
    /// # Errors
    ///
    /// Fails when MVC services are missing or a template is malformed.
    pub fn use_mvc<F>(&mut self, configure: F) -> Result<&mut Self, StartupError>
    where
        F: FnOnce(&mut RouteBuilder) -> Result<(), StartupError>,
    {
        if !self.services.contains::<MvcMarkerService>() {
            return Err(StartupError::new(
                "unable to find the required services; call `add_mvc` in `configure_services`",
            ));
        }
        let cache = self.services.get_required::<ActionDescriptorCache>()?;
        let attribute = AttributeRoute::from_cache(&cache)?;

        let mut routes = self.routes.take().unwrap_or_default();
        configure(&mut routes)?;
        routes.insert(0, RouteEntry::Attribute(attribute));
        self.routes = Some(routes);
        self.steps.push("mvc".to_string());
        Ok(self)
    }

    /// [`use_mvc`](Self::use_mvc) with the default conventional route.
    ///
    /// # Errors
    ///
    /// Same as [`use_mvc`](Self::use_mvc).
    pub fn use_mvc_with_default_route(&mut self) -> Result<&mut Self, StartupError> {
        self.use_mvc(|routes| {
            routes.map_route(DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE)?;
            Ok(())
        })
    }

    /// Routes collected by `use_mvc`, if it ran.
    #[must_use]
    pub fn routes(&self) -> Option<&RouteBuilder> {
        self.routes.as_ref()
    }

    /// Takes the collected routes, leaving none behind.
    pub fn take_routes(&mut self) -> Option<RouteBuilder> {
        self.routes.take()
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("steps", &self.steps)
            .field("routes", &self.routes.as_ref().map(RouteBuilder::len))
            .finish_non_exhaustive()
    }
}

/// Registers the MVC services.
///
/// Safe to call more than once: every registration is conditional.
pub fn add_mvc(services: &mut ServiceCollection) {
    services.configure::<MvcOptions>(|options| {
        if options.formatter_for("application/json").is_none() {
            options.input_formatters.push(Arc::new(JsonInputFormatter));
        }
    });
    services.try_add_singleton::<ControllerFeatureProvider, ControllerFeatureProvider>(|_| {
        Arc::new(ControllerFeatureProvider)
    });
    services.try_add_singleton::<ActionDescriptorCache, ActionDescriptorCache>(|sp| {
        Arc::new(ActionDescriptorCache::build(sp))
    });
    services.try_add_singleton::<ActionSelector, ActionSelector>(|_| Arc::new(ActionSelector));
    services.try_add_singleton::<dyn RequestContextFactory, DefaultRequestContextFactory>(|_| {
        Arc::new(DefaultRequestContextFactory)
    });
    services.try_add_enumerable::<dyn ActionInvokerProvider, ControllerActionInvokerProvider>(
        ServiceLifetime::Transient,
        |sp| Arc::new(ControllerActionInvokerProvider::new(sp.options(), sp.downgrade())),
    );
    add_temp_data(services);
    services.try_add_singleton::<MvcMarkerService, MvcMarkerService>(|_| Arc::new(MvcMarkerService));
}
