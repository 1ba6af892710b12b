//! Process-wide test application.
//!
//! A [`TestApplication`] lazily builds an [`ApplicationSnapshot`] (primary
//! registry, route-only registry, route table and handler validity set)
//! and publishes it atomically. Readers take the published snapshot
//! without locking; at most one thread builds at a time.
//!
//! Changing the startup type or the application part discards everything
//! derived from the previous configuration. Snapshots already handed out
//! stay valid and unchanged.

use crate::assembler::{
    assemble, configure_application, AssemblyInput, BuildHooks, LoadedStartup, PipelineHook,
    RoutesHook, ServicesHook,
};
use crate::config::{
    load_configuration_from, resolve_environment, Configuration, ConfigurationHook,
    TestConfiguration,
};
use crate::error::BootstrapError;
use crate::resolver::{self, RouteResolution};
use crate::validity::HandlerValiditySet;
use arc_swap::ArcSwapOption;
use mvctest_host::{
    ApplicationPart, ControllerType, HostingEnvironment, Logger, LoggerFactory, Router,
    ServiceProvider, StartupType, SyntheticRequest,
};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

const ABSENT: u8 = 0;
const BUILDING: u8 = 1;
const READY: u8 = 2;

/// Returns the state to `Absent` when a build ends without publishing,
/// including when startup code panics.
struct BuildGuard<'a> {
    state: &'a AtomicU8,
    published: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.state.store(ABSENT, Ordering::Release);
        }
    }
}

/// Lifecycle of the published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Nothing published.
    Absent,
    /// A thread is running the build.
    Building,
    /// A snapshot is published.
    Ready,
}

impl BootstrapState {
    fn from_u8(value: u8) -> Self {
        match value {
            BUILDING => Self::Building,
            READY => Self::Ready,
            _ => Self::Absent,
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Building => "building",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Everything one build produced. Immutable once published.
pub struct ApplicationSnapshot {
    /// Primary registry.
    pub services: Arc<ServiceProvider>,
    /// Route-only registry.
    pub route_services: Arc<ServiceProvider>,
    /// Frozen route table.
    pub router: Router,
    /// Handler types the host discovered. Frozen.
    pub handler_validity: Arc<HandlerValiditySet>,
    /// The environment the snapshot was built for.
    pub environment: HostingEnvironment,
    /// The startup used, if any.
    pub startup: Option<StartupType>,
    /// Build counter value, starting at 1.
    pub generation: u64,
}

impl ApplicationSnapshot {
    /// Resolves `request` against this snapshot.
    #[must_use]
    pub fn resolve(&self, request: &SyntheticRequest) -> RouteResolution {
        resolver::resolve(&self.route_services, &self.router, request)
    }
}

impl fmt::Debug for ApplicationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationSnapshot")
            .field("generation", &self.generation)
            .field("environment", &self.environment)
            .field("startup", &self.startup.as_ref().map(StartupType::full_name))
            .field("routes", &self.router.len())
            .field("handler_validity", &self.handler_validity)
            .finish_non_exhaustive()
    }
}

/// Which startup the next build uses.
#[derive(Clone, Default)]
enum StartupSelection {
    /// Discover one when automatic startup is enabled.
    #[default]
    Unset,
    /// Chosen by the caller; `None` builds without a startup.
    Explicit(Option<StartupType>),
}

/// Inputs of the next build. Guarded by the build lock.
#[derive(Default)]
struct BuildInputs {
    startup: StartupSelection,
    application: Option<Arc<ApplicationPart>>,
    configuration_hook: Option<ConfigurationHook>,
    hooks: BuildHooks,
    configuration: Option<Configuration>,
}

/// Lazily built, resettable test application.
pub struct TestApplication {
    snapshot: ArcSwapOption<ApplicationSnapshot>,
    inputs: Mutex<BuildInputs>,
    state: AtomicU8,
    generation: AtomicU64,
    directory: Option<PathBuf>,
    loggers: LoggerFactory,
    logger: Logger,
}

impl Default for TestApplication {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApplication {
    /// Application reading `testconfig.json` from the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(None, LoggerFactory::default())
    }

    /// Application reading `testconfig.json` from `directory`.
    #[must_use]
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self::with_parts(Some(directory.into()), LoggerFactory::default())
    }

    /// Replaces the logger factory handed to every build.
    #[must_use]
    pub fn with_loggers(self, loggers: LoggerFactory) -> Self {
        Self::with_parts(self.directory, loggers)
    }

    fn with_parts(directory: Option<PathBuf>, loggers: LoggerFactory) -> Self {
        Self {
            snapshot: ArcSwapOption::empty(),
            inputs: Mutex::new(BuildInputs::default()),
            state: AtomicU8::new(ABSENT),
            generation: AtomicU64::new(0),
            directory,
            logger: loggers.logger("mvctest::application"),
            loggers,
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static TestApplication {
        static GLOBAL: OnceLock<TestApplication> = OnceLock::new();
        GLOBAL.get_or_init(TestApplication::new)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BootstrapState {
        BootstrapState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of snapshots built so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the published snapshot, building it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if configuration loading or startup code
    /// fails. Nothing is published then and the next call retries. A panic
    /// in startup code propagates after the state returns to `Absent`.
    pub fn ensure_ready(&self) -> Result<Arc<ApplicationSnapshot>, BootstrapError> {
        if let Some(snapshot) = self.snapshot.load_full() {
            return Ok(snapshot);
        }

        let mut inputs = self.inputs.lock();
        if let Some(snapshot) = self.snapshot.load_full() {
            return Ok(snapshot);
        }

        self.state.store(BUILDING, Ordering::Release);
        let mut guard = BuildGuard {
            state: &self.state,
            published: false,
        };
        match self.build(&mut inputs) {
            Ok(snapshot) => {
                self.snapshot.store(Some(Arc::clone(&snapshot)));
                self.state.store(READY, Ordering::Release);
                guard.published = true;
                self.logger.info_with_fields("test application ready", |e| {
                    e.field("generation", snapshot.generation)
                        .field("environment", &snapshot.environment.environment_name)
                        .field(
                            "startup",
                            snapshot.startup.as_ref().map_or("none", StartupType::full_name),
                        )
                });
                Ok(snapshot)
            }
            Err(err) => {
                self.logger
                    .error_with_fields("test application build failed", |e| e.field("error", &err));
                Err(err)
            }
        }
    }

    /// The published snapshot.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready).
    pub fn snapshot(&self) -> Result<Arc<ApplicationSnapshot>, BootstrapError> {
        self.ensure_ready()
    }

    /// Primary registry.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready).
    pub fn services(&self) -> Result<Arc<ServiceProvider>, BootstrapError> {
        Ok(Arc::clone(&self.ensure_ready()?.services))
    }

    /// Route-only registry.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready).
    pub fn route_services(&self) -> Result<Arc<ServiceProvider>, BootstrapError> {
        Ok(Arc::clone(&self.ensure_ready()?.route_services))
    }

    /// Route table.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready).
    pub fn router(&self) -> Result<Router, BootstrapError> {
        Ok(self.ensure_ready()?.router.clone())
    }

    /// Returns true if the host discovered `handler` as a controller.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready).
    pub fn is_handler_valid(&self, handler: ControllerType) -> Result<bool, BootstrapError> {
        Ok(self.ensure_ready()?.handler_validity.is_valid(handler))
    }

    /// Resolves `request` against the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`ensure_ready`](Self::ensure_ready). Resolution failures are
    /// reported on the returned [`RouteResolution`].
    pub fn resolve(&self, request: &SyntheticRequest) -> Result<RouteResolution, BootstrapError> {
        Ok(self.ensure_ready()?.resolve(request))
    }

    /// Resets and selects the startup for the next build. `None` builds
    /// without one.
    pub fn set_startup_type(&self, startup: Option<StartupType>) {
        let mut inputs = self.inputs.lock();
        self.reset(&mut inputs);
        inputs.startup = StartupSelection::Explicit(startup);
    }

    /// Resets and declares the application's controllers and startups. The
    /// startup selection is cleared too, so select a startup afterwards.
    pub fn set_application_part(&self, part: Arc<ApplicationPart>) {
        let mut inputs = self.inputs.lock();
        self.reset(&mut inputs);
        inputs.application = Some(part);
    }

    /// Adds configuration sources after `testconfig.json`.
    ///
    /// The configuration feeds every later step, so the current snapshot is
    /// discarded.
    pub fn set_additional_configuration(&self, hook: Option<ConfigurationHook>) {
        let mut inputs = self.inputs.lock();
        inputs.configuration_hook = hook;
        self.invalidate(&mut inputs);
    }

    /// Runs after `configure_services` at the next build.
    pub fn set_additional_services(&self, hook: Option<ServicesHook>) {
        self.inputs.lock().hooks.services = hook;
    }

    /// Runs after `configure` at the next build.
    pub fn set_additional_pipeline(&self, hook: Option<PipelineHook>) {
        self.inputs.lock().hooks.pipeline = hook;
    }

    /// Runs after the pipeline's routes were collected at the next build.
    pub fn set_additional_routes(&self, hook: Option<RoutesHook>) {
        self.inputs.lock().hooks.routes = hook;
    }

    /// Looks for the environment's startup in the application part and
    /// builds with it.
    ///
    /// Returns `Ok(None)` when automatic startup is disabled or no startup
    /// matched; nothing is built then.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if configuration loading or the build
    /// fails.
    pub fn try_initialize(&self) -> Result<Option<Arc<ApplicationSnapshot>>, BootstrapError> {
        {
            let mut inputs = self.inputs.lock();
            let test_config = TestConfiguration::from_configuration(self.configuration(&mut inputs)?)?;
            if !test_config.automatic_startup {
                return Ok(None);
            }
            let Some(found) = discover_startup(&inputs, &test_config) else {
                self.logger.debug_with_fields("no startup found", |e| {
                    e.field("startup", test_config.startup_name())
                });
                return Ok(None);
            };

            let unchanged = matches!(
                &inputs.startup,
                StartupSelection::Explicit(Some(current)) if *current == found
            );
            if !unchanged {
                self.invalidate(&mut inputs);
                inputs.startup = StartupSelection::Explicit(Some(found));
            }
        }
        self.ensure_ready().map(Some)
    }

    fn reset(&self, inputs: &mut BuildInputs) {
        inputs.startup = StartupSelection::Unset;
        inputs.hooks = BuildHooks::default();
        self.invalidate(inputs);
        self.logger.debug("test application reset");
    }

    fn invalidate(&self, inputs: &mut BuildInputs) {
        inputs.configuration = None;
        self.snapshot.store(None);
        self.state.store(ABSENT, Ordering::Release);
    }

    fn configuration<'a>(
        &self,
        inputs: &'a mut BuildInputs,
    ) -> Result<&'a Configuration, BootstrapError> {
        if inputs.configuration.is_none() {
            let directory = match &self.directory {
                Some(directory) => directory.clone(),
                None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            };
            let loaded = load_configuration_from(&directory, inputs.configuration_hook.as_ref())?;
            inputs.configuration = Some(loaded);
        }
        Ok(inputs.configuration.get_or_insert_with(Configuration::new))
    }

    fn build(&self, inputs: &mut BuildInputs) -> Result<Arc<ApplicationSnapshot>, BootstrapError> {
        let test_config = TestConfiguration::from_configuration(self.configuration(inputs)?)?;
        let environment = resolve_environment(
            &test_config,
            inputs.application.as_ref().map(|part| part.name()),
        );

        let startup_type = match &inputs.startup {
            StartupSelection::Explicit(startup) => startup.clone(),
            StartupSelection::Unset if test_config.automatic_startup => {
                discover_startup(inputs, &test_config)
            }
            StartupSelection::Unset => None,
        };
        let startup = startup_type.map(|startup| LoadedStartup::load(startup, &environment));

        self.logger.debug_with_fields("building test application", |e| {
            e.field("environment", &environment.environment_name).field(
                "startup",
                startup
                    .as_ref()
                    .map_or("none", |s| s.startup_type.full_name()),
            )
        });

        let assembled = assemble(AssemblyInput {
            environment: &environment,
            application: inputs.application.as_ref(),
            startup: startup.as_ref(),
            hooks: &inputs.hooks,
            loggers: &self.loggers,
        })?;
        let router = configure_application(&assembled.services, startup.as_ref(), &inputs.hooks)?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(Arc::new(ApplicationSnapshot {
            services: assembled.services,
            route_services: assembled.route_services,
            router,
            handler_validity: assembled.handler_validity,
            environment,
            startup: startup.map(|s| s.startup_type),
            generation,
        }))
    }
}

impl fmt::Debug for TestApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestApplication")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

fn discover_startup(inputs: &BuildInputs, test_config: &TestConfiguration) -> Option<StartupType> {
    let part = inputs.application.as_ref()?;
    find_startup(part, &test_config.startup_name())
}

/// Finds the startup named `name` among `part`'s startups.
///
/// A full path (`crate::module::Type`, or a path relative to the part) wins;
/// otherwise the short type name must match exactly one startup.
#[must_use]
pub fn find_startup(part: &ApplicationPart, name: &str) -> Option<StartupType> {
    let qualified = format!("{}::{}", part.name(), name);
    if let Some(startup) = part
        .startups()
        .iter()
        .find(|s| s.full_name() == name || s.full_name() == qualified)
    {
        return Some(startup.clone());
    }

    let mut by_name = part.startups().iter().filter(|s| s.name() == name);
    match (by_name.next(), by_name.next()) {
        (Some(startup), None) => Some(startup.clone()),
        _ => None,
    }
}
