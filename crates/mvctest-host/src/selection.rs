//! Action selection for a route match.

use crate::controllers::{ActionDescriptor, ActionDescriptorCache};
use crate::error::AmbiguousActionError;
use crate::request::SyntheticRequest;
use crate::routing::{MatchScope, RouteMatch, RouteValues};
use std::sync::Arc;

/// Picks the single action a route match refers to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionSelector;

impl ActionSelector {
    /// Selects the action for `route_match`.
    ///
    /// Conventional matches consider every action without an attribute
    /// route whose required route values (`controller`, `action` and any
    /// declared extras) equal the matched values, ignoring case. Attribute
    /// matches consider the actions of the matched template. Candidates
    /// that do not accept the request method are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AmbiguousActionError`] when more than one candidate
    /// remains.
    pub fn select(
        &self,
        cache: &ActionDescriptorCache,
        route_match: &RouteMatch,
        request: &SyntheticRequest,
    ) -> Result<Option<Arc<ActionDescriptor>>, AmbiguousActionError> {
        let candidates: Vec<&Arc<ActionDescriptor>> = match &route_match.scope {
            MatchScope::Conventional => cache
                .descriptors()
                .iter()
                .filter(|action| action.attribute_route().is_none())
                .filter(|action| satisfies_route_values(action, &route_match.values))
                .collect(),
            MatchScope::Attribute(actions) => actions.iter().collect(),
        };

        let mut selected: Vec<&Arc<ActionDescriptor>> = candidates
            .into_iter()
            .filter(|action| action.accepts(request.method()))
            .collect();

        match selected.len() {
            0 => Ok(None),
            1 => Ok(selected.pop().cloned()),
            _ => Err(AmbiguousActionError {
                candidates: selected
                    .iter()
                    .map(|action| action.display_name().to_string())
                    .collect(),
            }),
        }
    }
}

fn satisfies_route_values(action: &ActionDescriptor, values: &RouteValues) -> bool {
    action.route_values().iter().all(|(key, required)| {
        values
            .get(key)
            .is_some_and(|value| value.eq_ignore_ascii_case(required))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{
        add_application_part, ActionModel, ApplicationPart, ControllerDescriptor,
    };
    use crate::routing::{AttributeRoute, RouteBuilder, RouteEntry};
    use crate::services::ServiceCollection;

    #[derive(Default)]
    struct NormalController;

    #[derive(Default)]
    struct RouteController;

    fn cache() -> ActionDescriptorCache {
        let part = ApplicationPart::new("app")
            .controller(
                ControllerDescriptor::of::<NormalController>()
                    .action(ActionModel::new("GetMethod").http_get())
                    .action(ActionModel::new("OverloadA").name("Overloaded"))
                    .action(ActionModel::new("OverloadB").name("Overloaded"))
                    .action(
                        ActionModel::new("Constrained")
                            .route_value("key", "value"),
                    ),
            )
            .controller(
                ControllerDescriptor::of::<RouteController>()
                    .route("AttributeController")
                    .action(ActionModel::new("Index").route("AttributeAction")),
            );
        let mut services = ServiceCollection::new();
        add_application_part(&mut services, Arc::new(part));
        ActionDescriptorCache::build(&services.build_provider())
    }

    fn first_match(cache: &ActionDescriptorCache, path: &str) -> RouteMatch {
        let mut builder = RouteBuilder::new();
        builder.map_route("default", "{controller=Home}/{action=Index}/{id?}").unwrap();
        builder.insert(0, RouteEntry::Attribute(AttributeRoute::from_cache(cache).unwrap()));
        builder.build().matches(path).remove(0)
    }

    #[test]
    fn method_filter_drops_candidates() {
        let cache = cache();
        let matched = first_match(&cache, "/Normal/GetMethod");
        let get = ActionSelector.select(&cache, &matched, &SyntheticRequest::get("/Normal/GetMethod"));
        assert_eq!(get.unwrap().unwrap().action_name(), "GetMethod");

        let post = ActionSelector.select(&cache, &matched, &SyntheticRequest::post("/Normal/GetMethod"));
        assert!(post.unwrap().is_none());
    }

    #[test]
    fn overloads_are_ambiguous() {
        let cache = cache();
        let matched = first_match(&cache, "/normal/overloaded");
        let err = ActionSelector
            .select(&cache, &matched, &SyntheticRequest::get("/normal/overloaded"))
            .unwrap_err();
        assert_eq!(err.candidates.len(), 2);
        assert!(err.candidates[0].contains("NormalController::OverloadA"));
        assert!(err.candidates[1].contains("NormalController::OverloadB"));
    }

    #[test]
    fn extra_route_values_must_be_present() {
        let cache = cache();
        let matched = first_match(&cache, "/Normal/Constrained");
        let selected = ActionSelector
            .select(&cache, &matched, &SyntheticRequest::get("/Normal/Constrained"))
            .unwrap();
        assert!(selected.is_none());
    }

    #[test]
    fn attribute_routed_actions_skip_conventional_matches() {
        let cache = cache();
        let conventional = first_match(&cache, "/Route/Index");
        let selected = ActionSelector
            .select(&cache, &conventional, &SyntheticRequest::get("/Route/Index"))
            .unwrap();
        assert!(selected.is_none());

        let attribute = first_match(&cache, "/AttributeController/AttributeAction");
        let selected = ActionSelector
            .select(&cache, &attribute, &SyntheticRequest::get("/AttributeController/AttributeAction"))
            .unwrap()
            .unwrap();
        assert_eq!(selected.controller_name(), "Route");
    }
}
