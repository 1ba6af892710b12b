//! Route resolution: synthetic request in, inspectable outcome out.
//!
//! Route entries are tried in table order. The first entry whose match
//! selects exactly one action wins; a match that selects several actions
//! ends resolution as ambiguous. Misses, ambiguity and invalid input are
//! all reported on [`RouteResolution`], never as errors.

use indexmap::IndexMap;
use mvctest_host::{
    bind_action, create_invoker, ActionContext, ActionDescriptor, ActionDescriptorCache,
    ActionInvokerProvider, ActionSelector, ControllerType, LoggerFactory, ModelState, MvcOptions,
    RequestContextFactory, RouteContext, RouteMatch, RouteValues, Router, ServiceProvider,
    SyntheticRequest,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Reason reported when no route entry matches the path.
pub const ROUTE_NOT_FOUND: &str = "route not found";

/// Reason reported when routes matched but no action accepted the request.
pub const ACTION_NOT_MATCHED: &str = "action could not be matched";

/// Why a request did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedRoute {
    /// No route entry matched the path.
    RouteNotFound,
    /// A route matched, but action selection left no candidate.
    ActionNotMatched,
    /// Action selection left more than one candidate.
    Ambiguous {
        /// Display names of the candidates.
        candidates: Vec<String>,
        /// The selector's diagnostic, verbatim.
        diagnostic: String,
    },
}

impl UnresolvedRoute {
    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UnresolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RouteNotFound => f.write_str(ROUTE_NOT_FOUND),
            Self::ActionNotMatched => f.write_str(ACTION_NOT_MATCHED),
            Self::Ambiguous { diagnostic, .. } => write!(
                f,
                "exception was thrown when trying to select an action: '{diagnostic}'"
            ),
        }
    }
}

/// A request that resolved to exactly one action.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    action: Arc<ActionDescriptor>,
    route: String,
    route_values: RouteValues,
    arguments: IndexMap<String, Value>,
    model_state: ModelState,
}

impl ResolvedAction {
    /// The selected action.
    #[must_use]
    pub fn action(&self) -> &Arc<ActionDescriptor> {
        &self.action
    }

    /// Name of the conventional route, or the attribute template, that matched.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Values captured by the route.
    #[must_use]
    pub fn route_values(&self) -> &RouteValues {
        &self.route_values
    }

    /// Bound arguments in parameter order.
    #[must_use]
    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    /// Binding and validation errors.
    #[must_use]
    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone)]
pub enum RouteResolution {
    /// Exactly one action was selected and bound.
    Resolved(ResolvedAction),
    /// Resolution failed.
    Unresolved(UnresolvedRoute),
}

impl RouteResolution {
    /// Returns true if an action was selected.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The resolved action, if any.
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedAction> {
        match self {
            Self::Resolved(resolved) => Some(resolved),
            Self::Unresolved(_) => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub fn unresolved(&self) -> Option<&UnresolvedRoute> {
        match self {
            Self::Resolved(_) => None,
            Self::Unresolved(unresolved) => Some(unresolved),
        }
    }

    /// Why resolution failed.
    #[must_use]
    pub fn unresolved_reason(&self) -> Option<String> {
        self.unresolved().map(UnresolvedRoute::reason)
    }

    /// The handler (controller) type.
    #[must_use]
    pub fn handler_type(&self) -> Option<ControllerType> {
        self.resolved().map(|r| r.action.controller_type())
    }

    /// The handler (controller) name.
    #[must_use]
    pub fn handler_name(&self) -> Option<&str> {
        self.resolved().map(|r| r.action.controller_name())
    }

    /// The action name.
    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        self.resolved().map(|r| r.action.action_name())
    }

    /// Bound arguments.
    #[must_use]
    pub fn action_arguments(&self) -> Option<&IndexMap<String, Value>> {
        self.resolved().map(ResolvedAction::arguments)
    }

    /// Model state after binding.
    #[must_use]
    pub fn model_state(&self) -> Option<&ModelState> {
        self.resolved().map(ResolvedAction::model_state)
    }

    /// Argument `name` converted to `T`. `None` when absent or not a `T`.
    #[must_use]
    pub fn argument<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.action_arguments()?.get(name)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Resolves `request` against `router` using the route-only registry.
#[must_use]
pub fn resolve(
    route_services: &ServiceProvider,
    router: &Router,
    request: &SyntheticRequest,
) -> RouteResolution {
    let logger = route_services
        .get::<LoggerFactory>()
        .map_or_else(LoggerFactory::null, |factory| (*factory).clone())
        .logger("mvctest::resolver");

    let context = route_services
        .get::<dyn RequestContextFactory>()
        .map_or_else(|| RouteContext::new(request.clone()), |f| f.create(request));
    let selector = route_services
        .get::<ActionSelector>()
        .map_or(ActionSelector, |selector| *selector);

    let matches = router.matches(context.path());
    if matches.is_empty() {
        logger.debug_with_fields(ROUTE_NOT_FOUND, |e| e.field("path", context.path()));
        return RouteResolution::Unresolved(UnresolvedRoute::RouteNotFound);
    }

    // The cache is materialised while the registries are assembled.
    let Some(cache) = route_services.get::<ActionDescriptorCache>() else {
        logger.warn_with_fields("no action descriptor cache registered", |e| {
            e.field("path", context.path())
        });
        return RouteResolution::Unresolved(UnresolvedRoute::ActionNotMatched);
    };

    for route_match in matches {
        match selector.select(&cache, &route_match, request) {
            Ok(Some(action)) => {
                logger.debug_with_fields("route resolved", |e| {
                    e.field("route", &route_match.route)
                        .field("action", action.display_name())
                });
                return RouteResolution::Resolved(bind(route_services, action, route_match, &context));
            }
            Ok(None) => {}
            Err(ambiguous) => {
                logger.debug_with_fields("ambiguous action", |e| {
                    e.field("route", &route_match.route)
                        .field("candidates", ambiguous.candidates.len())
                });
                return RouteResolution::Unresolved(UnresolvedRoute::Ambiguous {
                    diagnostic: ambiguous.to_string(),
                    candidates: ambiguous.candidates,
                });
            }
        }
    }

    logger.debug_with_fields(ACTION_NOT_MATCHED, |e| {
        e.field("path", context.path())
            .field("method", request.method())
    });
    RouteResolution::Unresolved(UnresolvedRoute::ActionNotMatched)
}

fn bind(
    route_services: &ServiceProvider,
    action: Arc<ActionDescriptor>,
    route_match: RouteMatch,
    context: &RouteContext,
) -> ResolvedAction {
    let action_context = ActionContext {
        action: Arc::clone(&action),
        route_values: route_match.values.clone(),
        route_context: context.clone(),
    };
    let providers = route_services.get_all::<dyn ActionInvokerProvider>();
    let result = match create_invoker(&providers, &action_context) {
        Some(invoker) => invoker.bind_arguments(),
        None => bind_action(
            &action,
            &route_match.values,
            context,
            &route_services.options::<MvcOptions>(),
        ),
    };

    ResolvedAction {
        action,
        route: route_match.route,
        route_values: route_match.values,
        arguments: result.arguments,
        model_state: result.model_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvctest_host::{LogCapture, LogConfig, RouteBuilder, ServiceCollection};

    fn default_router() -> Router {
        let mut routes = RouteBuilder::new();
        routes
            .map_route("default", "{controller=Home}/{action=Index}/{id?}")
            .unwrap();
        routes.build()
    }

    #[test]
    fn missing_action_cache_is_not_rebuilt() {
        let capture = LogCapture::new();
        let mut services = ServiceCollection::new();
        services.add_value(LoggerFactory::capturing(LogConfig::testing(), capture.clone()));
        let provider = services.build_provider();

        let resolution = resolve(&provider, &default_router(), &SyntheticRequest::get("/Home/Index"));
        assert_eq!(resolution.unresolved(), Some(&UnresolvedRoute::ActionNotMatched));
        assert!(capture.contains_message("no action descriptor cache registered"));
        assert!(provider.get::<ActionDescriptorCache>().is_none());
    }

    #[test]
    fn unmatched_path_is_route_not_found_without_services() {
        let provider = ServiceCollection::new().build_provider();
        let resolution = resolve(&provider, &default_router(), &SyntheticRequest::get("/a/b/c/d"));
        assert_eq!(resolution.unresolved(), Some(&UnresolvedRoute::RouteNotFound));
    }

    #[test]
    fn reasons() {
        assert_eq!(UnresolvedRoute::RouteNotFound.reason(), "route not found");
        assert_eq!(UnresolvedRoute::ActionNotMatched.reason(), "action could not be matched");
        let ambiguous = UnresolvedRoute::Ambiguous {
            candidates: vec!["a".into(), "b".into()],
            diagnostic: "Multiple actions matched.".into(),
        };
        assert_eq!(
            ambiguous.reason(),
            "exception was thrown when trying to select an action: 'Multiple actions matched.'"
        );
    }

    #[test]
    fn unresolved_has_no_handler_fields() {
        let resolution = RouteResolution::Unresolved(UnresolvedRoute::RouteNotFound);
        assert!(!resolution.is_resolved());
        assert_eq!(resolution.unresolved_reason().as_deref(), Some(ROUTE_NOT_FOUND));
        assert!(resolution.handler_type().is_none());
        assert!(resolution.handler_name().is_none());
        assert!(resolution.action_name().is_none());
        assert!(resolution.action_arguments().is_none());
        assert!(resolution.model_state().is_none());
        assert_eq!(resolution.argument::<i64>("id"), None);
    }
}
