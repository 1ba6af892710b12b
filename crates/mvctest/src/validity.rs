//! Tracks which handler types the host accepted as controllers.
//!
//! The set is written while action descriptor caches are built (through
//! [`HandlerValidityConvention`]) and then frozen. After freezing it only
//! answers queries.

use mvctest_host::{ControllerDescriptor, ControllerModelConvention, ControllerType, Logger};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handler types discovered by the host.
pub struct HandlerValiditySet {
    types: RwLock<HashSet<ControllerType>>,
    frozen: AtomicBool,
    logger: Logger,
}

impl HandlerValiditySet {
    /// Empty, writable set.
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self {
            types: RwLock::new(HashSet::new()),
            frozen: AtomicBool::new(false),
            logger,
        }
    }

    /// Records `handler` as valid.
    ///
    /// Returns false once the set is frozen; the record is dropped.
    pub fn record(&self, handler: ControllerType) -> bool {
        // Holding the write lock orders records against `freeze`.
        let mut types = self.types.write();
        if self.frozen.load(Ordering::Acquire) {
            drop(types);
            self.logger.warn_with_fields("handler recorded after freeze", |e| {
                e.field("handler", handler.full_name())
            });
            return false;
        }
        types.insert(handler);
        true
    }

    /// Ends the write phase.
    pub fn freeze(&self) {
        let _types = self.types.write();
        self.frozen.store(true, Ordering::Release);
    }

    /// Returns true once [`freeze`](Self::freeze) ran.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns true if the host discovered `handler`.
    #[must_use]
    pub fn is_valid(&self, handler: ControllerType) -> bool {
        self.types.read().contains(&handler)
    }

    /// Number of recorded types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl fmt::Debug for HandlerValiditySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.types.read().iter().map(ControllerType::name).collect();
        names.sort_unstable();
        f.debug_struct("HandlerValiditySet")
            .field("types", &names)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Convention that records every discovered controller.
#[derive(Debug, Clone)]
pub struct HandlerValidityConvention {
    set: Arc<HandlerValiditySet>,
}

impl HandlerValidityConvention {
    /// Convention writing into `set`.
    #[must_use]
    pub fn new(set: Arc<HandlerValiditySet>) -> Self {
        Self { set }
    }
}

impl ControllerModelConvention for HandlerValidityConvention {
    fn apply(&self, controller: &mut ControllerDescriptor) {
        self.set.record(controller.controller_type());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvctest_host::{LogCapture, LogConfig, LoggerFactory};

    struct HomeController;
    struct NotAController;

    #[test]
    fn records_until_frozen() {
        let capture = LogCapture::new();
        let logger = LoggerFactory::capturing(LogConfig::testing(), capture.clone()).logger("validity");
        let set = HandlerValiditySet::new(logger);

        assert!(set.record(ControllerType::of::<HomeController>()));
        assert!(set.record(ControllerType::of::<HomeController>()));
        assert_eq!(set.len(), 1);

        set.freeze();
        assert!(set.is_frozen());
        assert!(!set.record(ControllerType::of::<NotAController>()));

        assert!(set.is_valid(ControllerType::of::<HomeController>()));
        assert!(!set.is_valid(ControllerType::of::<NotAController>()));
        assert!(capture.contains_message("handler recorded after freeze"));
    }

    #[test]
    fn convention_records_discovered_controllers() {
        #[derive(Default)]
        struct NormalController;

        let set = Arc::new(HandlerValiditySet::new(LoggerFactory::null().logger("validity")));
        let convention = HandlerValidityConvention::new(Arc::clone(&set));
        let mut controller = ControllerDescriptor::of::<NormalController>();
        convention.apply(&mut controller);
        assert!(set.is_valid(ControllerType::of::<NormalController>()));
        assert!(!set.is_empty());
    }
}
