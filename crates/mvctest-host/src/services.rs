//! Dependency registration and resolution.
//!
//! A [`ServiceCollection`] is an ordered list of [`ServiceDescriptor`]s. It
//! can be inspected and edited freely (add, try-add, replace, remove) until
//! [`ServiceCollection::build_provider`] turns a copy of it into an
//! immutable [`ServiceProvider`]. The collection stays usable afterwards, so
//! two providers may be built from the same registrations.
//!
//! Services are keyed by type, including trait objects:
//!
//! ```
//! use std::sync::Arc;
//! use mvctest_host::services::ServiceCollection;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton::<dyn Greeter, English>(|_| Arc::new(English));
//!
//! let provider = services.build_provider();
//! assert_eq!(provider.get::<dyn Greeter>().unwrap().greet(), "hello");
//! ```

use crate::controllers::{ControllerInstance, ControllerType};
use crate::error::MissingServiceError;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Type-erased service value. Always wraps an `Arc<S>` for the service type.
type AnyService = Arc<dyn Any + Send + Sync>;

type ServiceFactory = Arc<dyn Fn(&ServiceProvider) -> AnyService + Send + Sync>;

type OptionsAction = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Identity of a registered service type.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Key for `S` (which may be a trait object).
    #[must_use]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    /// Key from an already-erased type identity.
    #[must_use]
    pub fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of the concrete type behind a registration.
///
/// Used to tell whether a capability still carries the host default.
#[derive(Clone, Copy)]
pub struct ImplementationId {
    id: TypeId,
    name: &'static str,
}

impl ImplementationId {
    /// Identity of `I`.
    #[must_use]
    pub fn of<I: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<I>(),
            name: std::any::type_name::<I>(),
        }
    }

    /// Identity from an already-erased type.
    #[must_use]
    pub fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this is the identity of `I`.
    #[must_use]
    pub fn is<I: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<I>()
    }
}

impl PartialEq for ImplementationId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImplementationId {}

impl fmt::Debug for ImplementationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How long a resolved service lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// One instance per provider, created on first use.
    Singleton,
    /// A new instance per resolution.
    Transient,
}

/// One registration.
#[derive(Clone)]
pub struct ServiceDescriptor {
    service: ServiceKey,
    implementation: ImplementationId,
    lifetime: ServiceLifetime,
    factory: ServiceFactory,
}

impl ServiceDescriptor {
    fn new<S, F>(implementation: ImplementationId, lifetime: ServiceLifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            service: ServiceKey::of::<S>(),
            implementation,
            lifetime,
            factory: Arc::new(move |provider| Arc::new(factory(provider)) as AnyService),
        }
    }

    /// Registration for an erased service key.
    ///
    /// The factory must return an `Arc` of the type behind `service`,
    /// boxed as `Arc<dyn Any>`.
    pub(crate) fn erased(
        service: ServiceKey,
        implementation: ImplementationId,
        lifetime: ServiceLifetime,
        factory: impl Fn(&ServiceProvider) -> Arc<dyn Any + Send + Sync> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service,
            implementation,
            lifetime,
            factory: Arc::new(factory),
        }
    }

    /// The service type.
    #[must_use]
    pub fn service(&self) -> ServiceKey {
        self.service
    }

    /// The implementation type.
    #[must_use]
    pub fn implementation(&self) -> ImplementationId {
        self.implementation
    }

    /// The lifetime.
    #[must_use]
    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct OptionsConfigurator {
    options: TypeId,
    action: OptionsAction,
}

/// Ordered, editable service registrations.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    options: Vec<OptionsConfigurator>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Registers a singleton built by `factory`.
    pub fn add_singleton<S, I>(
        &mut self,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        self.add(ServiceDescriptor::new::<S, _>(
            ImplementationId::of::<I>(),
            ServiceLifetime::Singleton,
            factory,
        ))
    }

    /// Registers a transient built by `factory` on every resolution.
    pub fn add_transient<S, I>(
        &mut self,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        self.add(ServiceDescriptor::new::<S, _>(
            ImplementationId::of::<I>(),
            ServiceLifetime::Transient,
            factory,
        ))
    }

    /// Registers an existing instance. Every provider shares it.
    pub fn add_instance<S>(&mut self, instance: Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::new::<S, _>(
            ImplementationId::of::<S>(),
            ServiceLifetime::Singleton,
            move |_| Arc::clone(&instance),
        ))
    }

    /// Registers a plain value as a shared instance of its own type.
    pub fn add_value<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add_instance(Arc::new(value))
    }

    /// Registers a singleton unless `S` already has a registration.
    ///
    /// Returns whether the registration was added.
    pub fn try_add_singleton<S, I>(
        &mut self,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        if self.contains::<S>() {
            return false;
        }
        self.add_singleton::<S, I>(factory);
        true
    }

    /// Registers a transient unless `S` already has a registration.
    pub fn try_add_transient<S, I>(
        &mut self,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        if self.contains::<S>() {
            return false;
        }
        self.add_transient::<S, I>(factory);
        true
    }

    /// Adds one implementation of an enumerable service unless the same
    /// implementation is already registered for `S`.
    pub fn try_add_enumerable<S, I>(
        &mut self,
        lifetime: ServiceLifetime,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        let key = ServiceKey::of::<S>();
        let implementation = ImplementationId::of::<I>();
        if self
            .descriptors
            .iter()
            .any(|d| d.service == key && d.implementation == implementation)
        {
            return false;
        }
        self.add(ServiceDescriptor::new::<S, _>(implementation, lifetime, factory));
        true
    }

    /// Replaces the first registration of `S`, or appends when there is
    /// none. Later registrations of `S` are dropped.
    pub fn replace<S, I>(
        &mut self,
        lifetime: ServiceLifetime,
        factory: impl Fn(&ServiceProvider) -> Arc<S> + Send + Sync + 'static,
    ) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: 'static,
    {
        let descriptor =
            ServiceDescriptor::new::<S, _>(ImplementationId::of::<I>(), lifetime, factory);
        let key = ServiceKey::of::<S>();
        match self.descriptors.iter().position(|d| d.service == key) {
            Some(first) => {
                self.descriptors[first] = descriptor;
                let mut idx = 0;
                self.descriptors.retain(|d| {
                    let keep = d.service != key || idx == first;
                    idx += 1;
                    keep
                });
            }
            None => self.descriptors.push(descriptor),
        }
        self
    }

    /// Removes every registration of `S`. Returns how many were removed.
    pub fn remove_all<S: ?Sized + 'static>(&mut self) -> usize {
        let key = ServiceKey::of::<S>();
        let before = self.descriptors.len();
        self.descriptors.retain(|d| d.service != key);
        before - self.descriptors.len()
    }

    /// Removes the last registration of `S`.
    pub fn remove_last<S: ?Sized + 'static>(&mut self) -> Option<ServiceDescriptor> {
        let key = ServiceKey::of::<S>();
        let idx = self.descriptors.iter().rposition(|d| d.service == key)?;
        Some(self.descriptors.remove(idx))
    }

    /// Removes the registrations of `S` whose implementation is `I`.
    pub fn remove_implementation<S: ?Sized + 'static, I: 'static>(&mut self) -> usize {
        let key = ServiceKey::of::<S>();
        let implementation = ImplementationId::of::<I>();
        let before = self.descriptors.len();
        self.descriptors
            .retain(|d| !(d.service == key && d.implementation == implementation));
        before - self.descriptors.len()
    }

    /// Returns true if `S` has at least one registration.
    #[must_use]
    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.contains_key(ServiceKey::of::<S>())
    }

    /// Returns true if `key` has at least one registration.
    #[must_use]
    pub fn contains_key(&self, key: ServiceKey) -> bool {
        self.descriptors.iter().any(|d| d.service == key)
    }

    /// Number of registrations for `S`.
    #[must_use]
    pub fn count<S: ?Sized + 'static>(&self) -> usize {
        let key = ServiceKey::of::<S>();
        self.descriptors.iter().filter(|d| d.service == key).count()
    }

    /// Implementation of the registration that resolving `S` would use.
    #[must_use]
    pub fn implementation_of<S: ?Sized + 'static>(&self) -> Option<ImplementationId> {
        let key = ServiceKey::of::<S>();
        self.descriptors
            .iter()
            .rev()
            .find(|d| d.service == key)
            .map(|d| d.implementation)
    }

    /// Registrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    /// Total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Adds a configuration callback for the options type `T`.
    ///
    /// Callbacks run in registration order on top of `T::default()` the first
    /// time a provider is asked for `T`.
    pub fn configure<T>(&mut self, action: impl Fn(&mut T) + Send + Sync + 'static) -> &mut Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.options.push(OptionsConfigurator {
            options: TypeId::of::<T>(),
            action: Arc::new(move |target: &mut dyn Any| {
                if let Some(target) = target.downcast_mut::<T>() {
                    action(target);
                }
            }),
        });
        self
    }

    /// Builds an immutable provider from a snapshot of the registrations.
    #[must_use]
    pub fn build_provider(&self) -> Arc<ServiceProvider> {
        Arc::new_cyclic(|this| ServiceProvider {
            this: this.clone(),
            descriptors: self.descriptors.clone(),
            options: self.options.clone(),
            singletons: Mutex::new(HashMap::new()),
            resolved_options: Mutex::new(HashMap::new()),
        })
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("descriptors", &self.descriptors)
            .field("options", &self.options.len())
            .finish()
    }
}

/// Resolves services from a frozen set of registrations.
///
/// Singletons are created lazily and cached per provider. Factories run
/// without any internal lock held, so they may resolve other services.
pub struct ServiceProvider {
    this: Weak<ServiceProvider>,
    descriptors: Vec<ServiceDescriptor>,
    options: Vec<OptionsConfigurator>,
    singletons: Mutex<HashMap<usize, AnyService>>,
    resolved_options: Mutex<HashMap<TypeId, AnyService>>,
}

impl ServiceProvider {
    /// Resolves `S`. The last registration wins.
    #[must_use]
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        let key = ServiceKey::of::<S>();
        let idx = self.descriptors.iter().rposition(|d| d.service == key)?;
        Self::downcast::<S>(&self.resolve_at(idx))
    }

    /// Resolves `S` or reports it as missing.
    ///
    /// # Errors
    ///
    /// Returns [`MissingServiceError`] when `S` is not registered.
    pub fn get_required<S: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<S>, MissingServiceError> {
        self.get::<S>().ok_or(MissingServiceError {
            service: std::any::type_name::<S>(),
        })
    }

    /// Resolves every registration of `S` in registration order.
    #[must_use]
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<S>> {
        let key = ServiceKey::of::<S>();
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.service == key)
            .filter_map(|(idx, _)| Self::downcast::<S>(&self.resolve_at(idx)))
            .collect()
    }

    /// Returns true if `S` is registered.
    #[must_use]
    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        let key = ServiceKey::of::<S>();
        self.descriptors.iter().any(|d| d.service == key)
    }

    /// The configured options of type `T`.
    #[must_use]
    pub fn options<T: Default + Send + Sync + 'static>(&self) -> Arc<T> {
        let id = TypeId::of::<T>();
        if let Some(cached) = self.resolved_options.lock().get(&id) {
            if let Ok(options) = Arc::clone(cached).downcast::<T>() {
                return options;
            }
        }

        let mut value = T::default();
        for configurator in self.options.iter().filter(|c| c.options == id) {
            (configurator.action)(&mut value);
        }
        let built = Arc::new(value);
        let mut cache = self.resolved_options.lock();
        let entry = cache
            .entry(id)
            .or_insert_with(|| Arc::clone(&built) as AnyService);
        Arc::clone(entry).downcast::<T>().unwrap_or(built)
    }

    /// Instantiates a controller registered as a service.
    #[must_use]
    pub fn controller(&self, controller: &ControllerType) -> Option<ControllerInstance> {
        let key = ServiceKey::from_parts(controller.type_id(), controller.full_name());
        let idx = self.descriptors.iter().rposition(|d| d.service == key)?;
        Some(ControllerInstance::new(*controller, self.resolve_at(idx)))
    }

    /// A weak handle to this provider, for services that need to resolve
    /// lazily without keeping the provider alive.
    #[must_use]
    pub fn downgrade(&self) -> Weak<ServiceProvider> {
        self.this.clone()
    }

    /// The registrations this provider was built from.
    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    fn resolve_at(&self, idx: usize) -> AnyService {
        let descriptor = &self.descriptors[idx];
        match descriptor.lifetime {
            ServiceLifetime::Transient => (descriptor.factory)(self),
            ServiceLifetime::Singleton => {
                if let Some(existing) = self.singletons.lock().get(&idx) {
                    return Arc::clone(existing);
                }
                let created = (descriptor.factory)(self);
                // Another thread may have won the race while the factory ran.
                Arc::clone(self.singletons.lock().entry(idx).or_insert(created))
            }
        }
    }

    fn downcast<S: ?Sized + Send + Sync + 'static>(value: &AnyService) -> Option<Arc<S>> {
        value.downcast_ref::<Arc<S>>().cloned()
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("descriptors", &self.descriptors.len())
            .field("singletons", &self.singletons.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Store: Send + Sync {
        fn name(&self) -> &'static str;
    }

    #[derive(Default)]
    struct DefaultStore;
    impl Store for DefaultStore {
        fn name(&self) -> &'static str {
            "default"
        }
    }

    #[derive(Default)]
    struct CustomStore;
    impl Store for CustomStore {
        fn name(&self) -> &'static str {
            "custom"
        }
    }

    #[derive(Default)]
    struct Settings {
        values: Vec<u32>,
    }

    #[test]
    fn last_registration_wins() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<dyn Store, DefaultStore>(|_| Arc::new(DefaultStore));
        services.add_singleton::<dyn Store, CustomStore>(|_| Arc::new(CustomStore));

        assert!(services.implementation_of::<dyn Store>().unwrap().is::<CustomStore>());
        let provider = services.build_provider();
        assert_eq!(provider.get::<dyn Store>().unwrap().name(), "custom");
        let all: Vec<_> = provider.get_all::<dyn Store>().iter().map(|s| s.name()).collect();
        assert_eq!(all, vec!["default", "custom"]);
    }

    #[test]
    fn singleton_is_cached_per_provider() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut services = ServiceCollection::new();
        services.add_singleton::<Settings, Settings>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Settings::default())
        });

        let first = services.build_provider();
        let a = first.get::<Settings>().unwrap();
        let b = first.get::<Settings>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let second = services.build_provider();
        let c = second.get::<Settings>().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transient_is_rebuilt() {
        let mut services = ServiceCollection::new();
        services.add_transient::<Settings, Settings>(|_| Arc::new(Settings::default()));
        let provider = services.build_provider();
        let a = provider.get::<Settings>().unwrap();
        let b = provider.get::<Settings>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn instance_is_shared_between_providers() {
        let mut services = ServiceCollection::new();
        services.add_value(Settings { values: vec![1] });
        let a = services.build_provider().get::<Settings>().unwrap();
        let b = services.build_provider().get::<Settings>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn try_add_respects_existing() {
        let mut services = ServiceCollection::new();
        assert!(services.try_add_singleton::<dyn Store, DefaultStore>(|_| Arc::new(DefaultStore)));
        assert!(!services.try_add_singleton::<dyn Store, CustomStore>(|_| Arc::new(CustomStore)));
        assert_eq!(services.count::<dyn Store>(), 1);

        assert!(services.try_add_enumerable::<dyn Store, CustomStore>(
            ServiceLifetime::Singleton,
            |_| Arc::new(CustomStore)
        ));
        assert!(!services.try_add_enumerable::<dyn Store, CustomStore>(
            ServiceLifetime::Singleton,
            |_| Arc::new(CustomStore)
        ));
        assert_eq!(services.count::<dyn Store>(), 2);
    }

    #[test]
    fn replace_keeps_position_and_drops_duplicates() {
        let mut services = ServiceCollection::new();
        services.add_value(1u8);
        services.add_singleton::<dyn Store, DefaultStore>(|_| Arc::new(DefaultStore));
        services.add_value(2u16);
        services.add_singleton::<dyn Store, DefaultStore>(|_| Arc::new(DefaultStore));

        services.replace::<dyn Store, CustomStore>(ServiceLifetime::Singleton, |_| {
            Arc::new(CustomStore)
        });
        assert_eq!(services.count::<dyn Store>(), 1);
        assert_eq!(services.iter().nth(1).unwrap().service(), ServiceKey::of::<dyn Store>());
        assert!(services.implementation_of::<dyn Store>().unwrap().is::<CustomStore>());
    }

    #[test]
    fn remove_last_only_drops_one() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<dyn Store, DefaultStore>(|_| Arc::new(DefaultStore));
        services.add_singleton::<dyn Store, CustomStore>(|_| Arc::new(CustomStore));
        let removed = services.remove_last::<dyn Store>().unwrap();
        assert!(removed.implementation().is::<CustomStore>());
        assert_eq!(services.count::<dyn Store>(), 1);
        assert_eq!(services.remove_all::<dyn Store>(), 1);
        assert!(!services.contains::<dyn Store>());
    }

    #[test]
    fn options_apply_callbacks_in_order() {
        let mut services = ServiceCollection::new();
        services.configure::<Settings>(|s| s.values.push(1));
        services.configure::<Settings>(|s| s.values.push(2));
        let provider = services.build_provider();
        let options = provider.options::<Settings>();
        assert_eq!(options.values, vec![1, 2]);
        assert!(Arc::ptr_eq(&options, &provider.options::<Settings>()));
    }

    #[test]
    fn factories_can_resolve_dependencies() {
        let mut services = ServiceCollection::new();
        services.add_value(Settings { values: vec![7] });
        services.add_singleton::<u64, u64>(|sp| {
            let settings = sp.get::<Settings>().expect("settings registered");
            Arc::new(u64::from(settings.values[0]))
        });
        let provider = services.build_provider();
        assert_eq!(*provider.get::<u64>().unwrap(), 7);
    }

    #[test]
    fn missing_required_service_is_an_error() {
        let provider = ServiceCollection::new().build_provider();
        let err = provider.get_required::<dyn Store>().err().unwrap();
        assert!(err.to_string().contains("Store"));
    }
}
