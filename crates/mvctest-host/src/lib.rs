//! Minimal MVC host for in-process request routing.
//!
//! This crate provides the host framework contracts a test harness
//! orchestrates around:
//! - [`ServiceCollection`] / [`ServiceProvider`] dependency registration
//! - controllers, actions and [`ApplicationPart`] discovery
//! - route templates, the [`Router`] and [`ActionSelector`]
//! - model binding into [`ModelState`] through action invoker providers
//! - the [`Startup`] contract and the [`ApplicationBuilder`] pipeline
//!
//! # Design Principles
//!
//! - No runtime reflection: controllers and startups are declared
//! - No transport: requests are [`SyntheticRequest`] values
//! - All shared types are `Send + Sync`

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::type_complexity)]

pub mod binding;
pub mod controllers;
pub mod error;
pub mod hosting;
pub mod invoker;
pub mod logging;
pub mod options;
pub mod providers;
pub mod request;
pub mod routing;
pub mod selection;
pub mod services;
pub mod validation;

pub use binding::{bind_action, BindingResult, ModelBinder, ModelState};
pub use controllers::{
    add_application_part, add_controllers_as_services, ActionDescriptor, ActionDescriptorCache,
    ActionId, ActionModel, ApplicationPart, ApplicationPartManager, BindingSource,
    ControllerDescriptor, ControllerFeatureProvider, ControllerInstance, ControllerModelConvention,
    ControllerType, ControllerTypeList, ParameterDescriptor, ParameterType,
};
pub use error::{
    AmbiguousActionError, LocItem, MissingServiceError, StartupError, TemplateError,
    ValidationError, ValidationErrors,
};
pub use hosting::{
    add_mvc, ApplicationBuilder, DefaultRequestContextFactory, HostingEnvironment,
    MvcMarkerService, RequestContextFactory, RouteContext, Startup, StartupType,
    DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE,
};
pub use invoker::{
    create_invoker, ActionContext, ActionInvoker, ActionInvokerProvider,
    ControllerActionInvokerProvider, DefaultModelBindingActionInvokerFactory,
    ModelBindingActionInvokerFactory, ModelBindingActionInvokerProvider,
};
pub use logging::{LogCapture, LogConfig, LogEntry, LogLevel, Logger, LoggerFactory};
pub use options::{InputFormatter, JsonInputFormatter, MvcOptions, StringInputFormatter};
pub use providers::{
    add_memory_cache, add_session, add_temp_data, DistributedSessionStore, MemoryCache,
    ProviderError, SessionStateTempDataProvider, SessionStore, StateValues, SystemMemoryCache,
    TempDataProvider,
};
pub use request::{Method, SyntheticRequest};
pub use routing::{
    AttributeRoute, ConventionalRoute, MatchScope, RouteBuilder, RouteConstraint, RouteEntry,
    RouteMatch, RouteTemplate, RouteValues, Router,
};
pub use selection::ActionSelector;
pub use services::{
    ImplementationId, ServiceCollection, ServiceDescriptor, ServiceKey, ServiceLifetime,
    ServiceProvider,
};
pub use validation::Validate;
