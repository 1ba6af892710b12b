//! In-process test application for MVC-style handlers.
//!
//! This crate builds a host application once per test configuration and
//! answers routing questions against it without a server:
//! - [`TestApplication`] owns the lazily built, atomically published
//!   [`ApplicationSnapshot`]
//! - [`assemble`] produces the primary and route-only service registries
//! - [`resolve`] maps a [`SyntheticRequest`] to an action and its bound
//!   arguments, or reports why it could not
//!
//! # Example
//!
//! ```ignore
//! use mvctest::{SyntheticRequest, TestApplication};
//!
//! let app = TestApplication::global();
//! app.set_application_part(my_app::application_part());
//! let resolution = app.resolve(&SyntheticRequest::get("/Home/Index"))?;
//! assert_eq!(resolution.action_name(), Some("Index"));
//! ```
//!
//! # Design Principles
//!
//! - Snapshots are immutable once published
//! - A reset never mutates a snapshot, it only swaps the published pointer
//! - Startup failures surface unchanged

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::type_complexity)]
#![allow(clippy::missing_fields_in_debug)]

pub mod application;
pub mod assembler;
pub mod config;
pub mod error;
pub mod resolver;
pub mod substitutes;
pub mod validity;

pub use application::{find_startup, ApplicationSnapshot, BootstrapState, TestApplication};
pub use assembler::{
    assemble, configure_application, AssembledServices, AssemblyInput, BuildHooks, LoadedStartup,
    PipelineHook, RoutesHook, ServicesHook,
};
pub use config::{
    load_configuration, load_configuration_from, resolve_environment, Configuration,
    ConfigurationBuilder, ConfigurationHook, TestConfiguration, DEFAULT_ENVIRONMENT,
    TEST_CONFIG_FILE,
};
pub use error::{BootstrapError, ConfigurationError};
pub use resolver::{
    resolve, ResolvedAction, RouteResolution, UnresolvedRoute, ACTION_NOT_MATCHED, ROUTE_NOT_FOUND,
};
pub use substitutes::{
    replace_memory_cache, replace_session_store, replace_temp_data_provider, InMemoryCache,
    InMemorySessionStore, InMemoryTempDataProvider,
};
pub use validity::{HandlerValidityConvention, HandlerValiditySet};

// Host types tests use alongside the harness.
pub use mvctest_host::{
    ActionModel, ApplicationBuilder, ApplicationPart, ControllerDescriptor, ControllerType,
    HostingEnvironment, Method, ModelBinder, ModelState, ParameterDescriptor, ParameterType,
    RouteBuilder, ServiceCollection, Startup, StartupError, StartupType, SyntheticRequest,
};
