//! Action invoker providers.
//!
//! Providers are an enumerable service: each is asked, in `order()`, to
//! create the invoker for a selected action, and the first one that does
//! wins. The default controller provider prepares full invocation
//! (controller activation plus binding). The model-binding provider only
//! binds, which is all route resolution needs.

use crate::binding::{bind_action, BindingResult};
use crate::controllers::{ActionDescriptor, ControllerInstance};
use crate::hosting::RouteContext;
use crate::options::MvcOptions;
use crate::routing::RouteValues;
use crate::services::ServiceProvider;
use std::fmt;
use std::sync::{Arc, Weak};

/// Everything known about a selected action.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The selected action.
    pub action: Arc<ActionDescriptor>,
    /// Values produced by the route match.
    pub route_values: RouteValues,
    /// The request being routed.
    pub route_context: RouteContext,
}

/// Prepares one action execution.
pub trait ActionInvoker: Send + Sync {
    /// The action this invoker runs.
    fn action(&self) -> &Arc<ActionDescriptor>;

    /// Binds the action's arguments.
    fn bind_arguments(&self) -> BindingResult;
}

/// Creates invokers for selected actions.
pub trait ActionInvokerProvider: Send + Sync {
    /// Lower runs first.
    fn order(&self) -> i32;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns an invoker, or `None` to let later providers decide.
    fn create_invoker(&self, context: &ActionContext) -> Option<Box<dyn ActionInvoker>>;
}

/// Asks `providers` in order and returns the first invoker produced.
#[must_use]
pub fn create_invoker(
    providers: &[Arc<dyn ActionInvokerProvider>],
    context: &ActionContext,
) -> Option<Box<dyn ActionInvoker>> {
    let mut ordered: Vec<&Arc<dyn ActionInvokerProvider>> = providers.iter().collect();
    ordered.sort_by_key(|provider| provider.order());
    ordered
        .into_iter()
        .find_map(|provider| provider.create_invoker(context))
}

// ============================================================================
// Controller invocation
// ============================================================================

/// Default provider registered by `add_mvc`.
pub struct ControllerActionInvokerProvider {
    services: Weak<ServiceProvider>,
    options: Arc<MvcOptions>,
}

impl ControllerActionInvokerProvider {
    /// Order of the default provider.
    pub const ORDER: i32 = -1000;

    /// Provider using the given options. Controllers are activated through
    /// `services` when they are registered there.
    #[must_use]
    pub fn new(options: Arc<MvcOptions>, services: Weak<ServiceProvider>) -> Self {
        Self { services, options }
    }
}

impl fmt::Debug for ControllerActionInvokerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerActionInvokerProvider")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ActionInvokerProvider for ControllerActionInvokerProvider {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn name(&self) -> &'static str {
        "controller"
    }

    fn create_invoker(&self, context: &ActionContext) -> Option<Box<dyn ActionInvoker>> {
        let controller = self
            .services
            .upgrade()
            .and_then(|services| services.controller(&context.action.controller_type()));
        Some(Box::new(ControllerActionInvoker {
            context: context.clone(),
            options: Arc::clone(&self.options),
            controller,
        }))
    }
}

/// Invoker for full controller execution.
pub struct ControllerActionInvoker {
    context: ActionContext,
    options: Arc<MvcOptions>,
    controller: Option<ControllerInstance>,
}

impl ControllerActionInvoker {
    /// The controller instance, when it could be activated from services.
    #[must_use]
    pub fn controller(&self) -> Option<&ControllerInstance> {
        self.controller.as_ref()
    }
}

impl ActionInvoker for ControllerActionInvoker {
    fn action(&self) -> &Arc<ActionDescriptor> {
        &self.context.action
    }

    fn bind_arguments(&self) -> BindingResult {
        bind_action(
            &self.context.action,
            &self.context.route_values,
            &self.context.route_context,
            &self.options,
        )
    }
}

// ============================================================================
// Model binding only
// ============================================================================

/// Creates binding-only invokers.
pub trait ModelBindingActionInvokerFactory: Send + Sync {
    /// Creates the invoker for `context`.
    fn create_invoker(&self, context: &ActionContext) -> Box<dyn ActionInvoker>;

    /// Binds the arguments for `context` directly.
    fn bind(&self, context: &ActionContext) -> BindingResult {
        self.create_invoker(context).bind_arguments()
    }
}

/// Binds with the formatters configured in [`MvcOptions`].
#[derive(Debug, Clone)]
pub struct DefaultModelBindingActionInvokerFactory {
    options: Arc<MvcOptions>,
}

impl DefaultModelBindingActionInvokerFactory {
    /// Factory using `options`.
    #[must_use]
    pub fn new(options: Arc<MvcOptions>) -> Self {
        Self { options }
    }
}

impl ModelBindingActionInvokerFactory for DefaultModelBindingActionInvokerFactory {
    fn create_invoker(&self, context: &ActionContext) -> Box<dyn ActionInvoker> {
        Box::new(ModelBindingActionInvoker {
            context: context.clone(),
            options: Arc::clone(&self.options),
        })
    }
}

/// Invoker that stops after binding.
#[derive(Debug)]
pub struct ModelBindingActionInvoker {
    context: ActionContext,
    options: Arc<MvcOptions>,
}

impl ActionInvoker for ModelBindingActionInvoker {
    fn action(&self) -> &Arc<ActionDescriptor> {
        &self.context.action
    }

    fn bind_arguments(&self) -> BindingResult {
        bind_action(
            &self.context.action,
            &self.context.route_values,
            &self.context.route_context,
            &self.options,
        )
    }
}

/// Enumerable provider exposing a [`ModelBindingActionInvokerFactory`].
pub struct ModelBindingActionInvokerProvider {
    factory: Arc<dyn ModelBindingActionInvokerFactory>,
}

impl ModelBindingActionInvokerProvider {
    /// Runs ahead of the controller provider.
    pub const ORDER: i32 = ControllerActionInvokerProvider::ORDER - 1;

    /// Provider delegating to `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn ModelBindingActionInvokerFactory>) -> Self {
        Self { factory }
    }
}

impl fmt::Debug for ModelBindingActionInvokerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBindingActionInvokerProvider")
            .finish_non_exhaustive()
    }
}

impl ActionInvokerProvider for ModelBindingActionInvokerProvider {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn name(&self) -> &'static str {
        "model-binding"
    }

    fn create_invoker(&self, context: &ActionContext) -> Option<Box<dyn ActionInvoker>> {
        Some(self.factory.create_invoker(context))
    }
}
