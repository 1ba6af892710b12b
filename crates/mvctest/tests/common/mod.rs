//! Controllers, models and startups shared by the integration tests.

#![allow(dead_code)]

use mvctest::{
    ActionModel, ApplicationBuilder, ApplicationPart, ControllerDescriptor, ModelBinder,
    ParameterDescriptor, ParameterType, ServiceCollection, Startup, StartupError, StartupType,
    TestApplication,
};
use mvctest_host::validation::{email, length, range, required};
use mvctest_host::{add_mvc, LoggerFactory, Validate, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestModel {
    #[serde(rename = "Integer")]
    pub integer: i64,
    #[serde(rename = "String")]
    pub string: Option<String>,
}

impl Validate for RequestModel {
    fn validate(&self) -> Result<(), Box<ValidationErrors>> {
        let mut errors = ValidationErrors::new();
        required(&mut errors, "String", self.string.as_deref());
        errors.into_result()
    }
}

/// Every field is required; a body omitting one still binds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactModel {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Age")]
    pub age: i64,
}

impl Validate for ContactModel {
    fn validate(&self) -> Result<(), Box<ValidationErrors>> {
        let mut errors = ValidationErrors::new();
        length(&mut errors, "Name", &self.name, Some(2), Some(50));
        email(&mut errors, "Email", &self.email);
        range(&mut errors, "Age", self.age, Some(0), Some(150));
        errors.into_result()
    }
}

// =============================================================================
// Controllers
// =============================================================================

#[derive(Default)]
pub struct HomeController;

#[derive(Default)]
pub struct NormalController;

#[derive(Default)]
pub struct RouteController;

/// Declared in the application but not a controller.
#[derive(Default)]
pub struct HelperService;

fn home() -> ControllerDescriptor {
    ControllerDescriptor::of::<HomeController>()
        .action(ActionModel::new("Index"))
        .action(ActionModel::new("Contact"))
}

fn normal() -> ControllerDescriptor {
    ControllerDescriptor::of::<NormalController>()
        .action(ActionModel::new("ActionWithName").name("AnotherName"))
        .action(
            ActionModel::new("ActionWithParameters")
                .param(ParameterDescriptor::new("id", ParameterType::Int).required()),
        )
        .action(
            ActionModel::new("ActionWithStringParameters")
                .param(ParameterDescriptor::new("id", ParameterType::String)),
        )
        .action(
            ActionModel::new("ActionWithMultipleParameters")
                .param(ParameterDescriptor::new("id", ParameterType::Int))
                .param(ParameterDescriptor::new("text", ParameterType::String))
                .param(ParameterDescriptor::body("model", ModelBinder::of::<RequestModel>())),
        )
        .action(ActionModel::new("GetMethod").http_get())
        .action(
            ActionModel::new("QueryString")
                .http_post()
                .param(ParameterDescriptor::query("first", ParameterType::String))
                .param(ParameterDescriptor::query("second", ParameterType::Int)),
        )
        .action(
            ActionModel::new("ActionWithModel")
                .param(ParameterDescriptor::new("id", ParameterType::Int))
                .param(ParameterDescriptor::body("model", ModelBinder::of::<RequestModel>())),
        )
        .action(
            ActionModel::new("ActionWithContact")
                .http_post()
                .param(ParameterDescriptor::body("model", ModelBinder::of::<ContactModel>())),
        )
        .action(ActionModel::new("ActionWithOverloads"))
        .action(
            ActionModel::new("ActionWithOverloadsById")
                .name("ActionWithOverloads")
                .param(ParameterDescriptor::new("id", ParameterType::Int)),
        )
}

fn route() -> ControllerDescriptor {
    ControllerDescriptor::of::<RouteController>()
        .route("AttributeController")
        .action(ActionModel::new("Index").route("AttributeAction"))
        .action(ActionModel::new("WithParameter").route("Parameter/{id:int}").param(
            ParameterDescriptor::route("id", ParameterType::Int),
        ))
}

// =============================================================================
// Startups
// =============================================================================

/// Registers MVC and leaves routing to the defaults.
#[derive(Default)]
pub struct TestStartup;

impl Startup for TestStartup {}

/// Maps a single prefixed conventional route.
#[derive(Default)]
pub struct CustomRoutesStartup;

impl Startup for CustomRoutesStartup {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), StartupError> {
        add_mvc(services);
        Ok(())
    }

    fn configure(&self, app: &mut ApplicationBuilder) -> Result<(), StartupError> {
        app.use_mvc(|routes| {
            routes.map_route("custom", "custom/{controller}/{action}/{id?}")?;
            Ok(())
        })?;
        Ok(())
    }
}

/// Fails while registering services.
#[derive(Default)]
pub struct BrokenStartup;

impl Startup for BrokenStartup {
    fn configure_services(&self, _services: &mut ServiceCollection) -> Result<(), StartupError> {
        Err(StartupError::new("connection string missing"))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The test crate's controllers and startups.
pub fn application_part() -> Arc<ApplicationPart> {
    Arc::new(
        ApplicationPart::new(env!("CARGO_CRATE_NAME"))
            .controller(home())
            .controller(normal())
            .controller(route())
            .controller(ControllerDescriptor::of::<HelperService>().non_controller())
            .startup(StartupType::of::<TestStartup>())
            .startup(StartupType::of::<CustomRoutesStartup>())
            .startup(StartupType::of::<BrokenStartup>()),
    )
}

/// Points `app` at the test crate and selects `startup`.
pub fn prepare(app: &TestApplication, startup: Option<StartupType>) {
    app.set_application_part(application_part());
    app.set_startup_type(startup);
}

/// A private application using [`TestStartup`].
pub fn test_application() -> TestApplication {
    let app = TestApplication::new().with_loggers(LoggerFactory::null());
    prepare(&app, Some(StartupType::of::<TestStartup>()));
    app
}
