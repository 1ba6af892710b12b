//! Builds the service registries and the route table of a test application.
//!
//! [`assemble`] produces the primary registry (full action invocation) and
//! a route-only registry (binding without invocation). Registration happens
//! in a fixed order so that user code always runs before the harness
//! substitutes host defaults. [`configure_application`] then runs the
//! pipeline configuration and freezes the route table.

use crate::substitutes::{replace_memory_cache, replace_session_store, replace_temp_data_provider};
use crate::validity::{HandlerValidityConvention, HandlerValiditySet};
use mvctest_host::{
    add_application_part, add_controllers_as_services, add_mvc, ActionDescriptorCache,
    ActionInvokerProvider, ApplicationBuilder, ApplicationPart, ApplicationPartManager,
    AttributeRoute, ControllerTypeList, DefaultModelBindingActionInvokerFactory,
    DefaultRequestContextFactory, DistributedSessionStore, HostingEnvironment, Logger,
    LoggerFactory, MemoryCache, ModelBindingActionInvokerFactory,
    ModelBindingActionInvokerProvider, MvcOptions, RequestContextFactory, RouteBuilder,
    RouteEntry, Router, ServiceCollection, ServiceLifetime, ServiceProvider,
    SessionStateTempDataProvider, SessionStore, Startup, StartupError, StartupType,
    StringInputFormatter, SystemMemoryCache, TempDataProvider, DEFAULT_ROUTE_NAME,
    DEFAULT_ROUTE_TEMPLATE,
};
use std::fmt;
use std::sync::Arc;

/// Adds services after the startup registered its own.
pub type ServicesHook = Arc<dyn Fn(&mut ServiceCollection) -> Result<(), StartupError> + Send + Sync>;

/// Adds pipeline steps after the startup configured the pipeline.
pub type PipelineHook =
    Arc<dyn Fn(&mut ApplicationBuilder) -> Result<(), StartupError> + Send + Sync>;

/// Adds routes after the pipeline registered its own.
pub type RoutesHook = Arc<dyn Fn(&mut RouteBuilder) -> Result<(), StartupError> + Send + Sync>;

/// Caller customisations applied during a build.
#[derive(Clone, Default)]
pub struct BuildHooks {
    /// Runs after `configure_services`.
    pub services: Option<ServicesHook>,
    /// Runs after `configure`.
    pub pipeline: Option<PipelineHook>,
    /// Runs after the pipeline's routes were collected.
    pub routes: Option<RoutesHook>,
}

impl fmt::Debug for BuildHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildHooks")
            .field("services", &self.services.is_some())
            .field("pipeline", &self.pipeline.is_some())
            .field("routes", &self.routes.is_some())
            .finish()
    }
}

/// A startup type together with its instance for this build.
#[derive(Clone)]
pub struct LoadedStartup {
    /// The type.
    pub startup_type: StartupType,
    /// The instance created for the build's environment.
    pub instance: Arc<dyn Startup>,
}

impl LoadedStartup {
    /// Instantiates `startup_type` for `environment`.
    #[must_use]
    pub fn load(startup_type: StartupType, environment: &HostingEnvironment) -> Self {
        let instance = startup_type.instantiate(environment);
        Self {
            startup_type,
            instance,
        }
    }
}

impl fmt::Debug for LoadedStartup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoadedStartup")
            .field(&self.startup_type)
            .finish()
    }
}

/// Everything [`assemble`] needs.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    /// The resolved environment.
    pub environment: &'a HostingEnvironment,
    /// The application's own controllers and startups.
    pub application: Option<&'a Arc<ApplicationPart>>,
    /// The startup, if any.
    pub startup: Option<&'a LoadedStartup>,
    /// Caller customisations.
    pub hooks: &'a BuildHooks,
    /// Logging for the build and the registries.
    pub loggers: &'a LoggerFactory,
}

/// The registries produced by [`assemble`].
#[derive(Debug, Clone)]
pub struct AssembledServices {
    /// Registrations the primary registry was built from.
    pub collection: ServiceCollection,
    /// Primary registry.
    pub services: Arc<ServiceProvider>,
    /// Route-only registry.
    pub route_services: Arc<ServiceProvider>,
    /// Handler types the host discovered. Frozen.
    pub handler_validity: Arc<HandlerValiditySet>,
}

/// Builds both registries.
///
/// # Errors
///
/// Returns the error of a failing `configure_services` or services hook
/// unchanged.
pub fn assemble(input: AssemblyInput<'_>) -> Result<AssembledServices, StartupError> {
    let logger = input.loggers.logger("mvctest::assembler");
    let handler_validity = Arc::new(HandlerValiditySet::new(
        input.loggers.logger("mvctest::validity"),
    ));

    let mut services = baseline_services(&input, &handler_validity);

    match input.startup {
        Some(startup) => {
            logger.debug_with_fields("configuring services", |e| {
                e.field("startup", startup.startup_type.full_name())
            });
            startup.instance.configure_services(&mut services)?;
        }
        None => add_mvc(&mut services),
    }

    if let Some(hook) = &input.hooks.services {
        hook(&mut services)?;
    }

    install_testing_conventions(&mut services, &handler_validity);
    substitute_data_providers(&mut services, &logger);
    add_startup_controllers(&mut services, &input, &logger);
    let route_services = build_route_services(&mut services, &logger);

    let primary = services.build_provider();
    // Materialise both caches so conventions have run before the freeze.
    let _ = primary.get::<ActionDescriptorCache>();
    let _ = route_services.get::<ActionDescriptorCache>();
    handler_validity.freeze();
    logger.debug_with_fields("registries built", |e| {
        e.field("descriptors", services.len())
            .field("handlers", handler_validity.len())
    });

    Ok(AssembledServices {
        collection: services,
        services: primary,
        route_services,
        handler_validity,
    })
}

fn baseline_services(
    input: &AssemblyInput<'_>,
    handler_validity: &Arc<HandlerValiditySet>,
) -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services.add_value(input.environment.clone());
    services.add_value(input.loggers.clone());
    services.try_add_singleton::<dyn RequestContextFactory, DefaultRequestContextFactory>(|_| {
        Arc::new(DefaultRequestContextFactory)
    });
    if let Some(part) = input.application {
        add_application_part(&mut services, Arc::clone(part));
    }
    services.add_instance(Arc::clone(handler_validity));
    services.try_add_singleton::<ActionDescriptorCache, ActionDescriptorCache>(|sp| {
        Arc::new(ActionDescriptorCache::build(sp))
    });
    services
}

fn install_testing_conventions(
    services: &mut ServiceCollection,
    handler_validity: &Arc<HandlerValiditySet>,
) {
    let convention = Arc::new(HandlerValidityConvention::new(Arc::clone(handler_validity)));
    services.configure::<MvcOptions>(move |options| {
        options.conventions.push(convention.clone());
        if options.formatter_for("text/plain").is_none() {
            options.input_formatters.push(Arc::new(StringInputFormatter));
        }
    });
}

/// Swaps a stateful provider for its in-memory stand-in only when the
/// effective registration is still the host default.
fn substitute_data_providers(services: &mut ServiceCollection, logger: &Logger) {
    let temp_data = services
        .implementation_of::<dyn TempDataProvider>()
        .is_some_and(|i| i.is::<SessionStateTempDataProvider>());
    let caching = services
        .implementation_of::<dyn MemoryCache>()
        .is_some_and(|i| i.is::<SystemMemoryCache>());
    let session = services
        .implementation_of::<dyn SessionStore>()
        .is_some_and(|i| i.is::<DistributedSessionStore>());

    if temp_data {
        replace_temp_data_provider(services);
        logger.debug_with_fields("provider substituted", |e| e.field("capability", "temp_data"));
    }
    if caching {
        replace_memory_cache(services);
        logger.debug_with_fields("provider substituted", |e| e.field("capability", "caching"));
    }
    if session {
        replace_session_store(services);
        logger.debug_with_fields("provider substituted", |e| e.field("capability", "session"));
    }
}

/// Registers the startup crate's controllers as services when the startup
/// lives outside the application and no explicit type list exists.
fn add_startup_controllers(services: &mut ServiceCollection, input: &AssemblyInput<'_>, logger: &Logger) {
    let Some(startup) = input.startup else {
        return;
    };
    let startup_crate = startup.startup_type.assembly();
    if input.environment.application_name.as_deref() == Some(startup_crate) {
        return;
    }

    let probe = services.build_provider();
    if probe
        .get_all::<ControllerTypeList>()
        .iter()
        .any(|list| !list.is_empty())
    {
        return;
    }

    let parts: Vec<Arc<ApplicationPart>> = probe
        .options::<ApplicationPartManager>()
        .parts()
        .iter()
        .filter(|part| part.name() == startup_crate)
        .cloned()
        .collect();
    let registered = add_controllers_as_services(services, &parts);
    logger.debug_with_fields("controllers registered as services", |e| {
        e.field("crate", startup_crate).field("count", registered.len())
    });
}

/// Builds the route-only registry. Invoker services injected for it are
/// removed from `services` again.
fn build_route_services(services: &mut ServiceCollection, logger: &Logger) -> Arc<ServiceProvider> {
    let inject = !services.contains::<dyn ModelBindingActionInvokerFactory>();
    if inject {
        services.try_add_enumerable::<dyn ActionInvokerProvider, ModelBindingActionInvokerProvider>(
            ServiceLifetime::Transient,
            |sp| {
                let factory = sp
                    .get::<dyn ModelBindingActionInvokerFactory>()
                    .unwrap_or_else(|| {
                        Arc::new(DefaultModelBindingActionInvokerFactory::new(sp.options()))
                    });
                Arc::new(ModelBindingActionInvokerProvider::new(factory))
            },
        );
        services.try_add_singleton::<dyn ModelBindingActionInvokerFactory, DefaultModelBindingActionInvokerFactory>(
            |sp| Arc::new(DefaultModelBindingActionInvokerFactory::new(sp.options())),
        );
    }

    let route_services = services.build_provider();

    if inject {
        services.remove_all::<dyn ModelBindingActionInvokerFactory>();
        let removed = services
            .remove_implementation::<dyn ActionInvokerProvider, ModelBindingActionInvokerProvider>();
        logger.trace_with_fields("route-only invoker services removed", |e| {
            e.field("providers", removed)
        });
    }
    route_services
}

/// Runs pipeline configuration and freezes the route table.
///
/// Without a startup, or when nothing registered a route, the default
/// conventional route is added and the attribute route is put first.
///
/// # Errors
///
/// Returns the error of a failing `configure`, pipeline hook or routes
/// hook unchanged, and reports malformed route templates.
pub fn configure_application(
    services: &Arc<ServiceProvider>,
    startup: Option<&LoadedStartup>,
    hooks: &BuildHooks,
) -> Result<Router, StartupError> {
    let mut app = ApplicationBuilder::new(Arc::clone(services));
    if let Some(startup) = startup {
        startup.instance.configure(&mut app)?;
    }
    if let Some(hook) = &hooks.pipeline {
        hook(&mut app)?;
    }

    let mut routes = app.take_routes().unwrap_or_default();
    if let Some(hook) = &hooks.routes {
        hook(&mut routes)?;
    }

    if startup.is_none() || routes.is_empty() {
        routes.map_route(DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE)?;
        let cache = services.get_required::<ActionDescriptorCache>()?;
        routes.insert(0, RouteEntry::Attribute(AttributeRoute::from_cache(&cache)?));
    }
    Ok(routes.build())
}
