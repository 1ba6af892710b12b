//! Deterministic stand-ins for the host's stateful providers.
//!
//! Each substitute keeps its state in memory, never expires anything and
//! needs no other service, so tests can seed and inspect it directly.

use mvctest_host::{
    MemoryCache, ProviderError, ServiceCollection, ServiceLifetime, SessionStore, StateValues,
    TempDataProvider,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Temp data kept per session id, without a session store.
#[derive(Debug, Default)]
pub struct InMemoryTempDataProvider {
    data: Mutex<HashMap<String, StateValues>>,
}

impl InMemoryTempDataProvider {
    /// Empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TempDataProvider for InMemoryTempDataProvider {
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError> {
        Ok(self.data.lock().get(session_id).cloned().unwrap_or_default())
    }

    fn save(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError> {
        let mut data = self.data.lock();
        if values.is_empty() {
            data.remove(session_id);
        } else {
            data.insert(session_id.to_string(), values);
        }
        Ok(())
    }
}

/// Cache whose entries never expire. The requested lifetime is kept for
/// inspection.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (Value, Option<Duration>)>>,
}

impl InMemoryCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime requested when `key` was stored.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.read().get(key).and_then(|(_, ttl)| *ttl)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl MemoryCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|(value, _)| value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.entries.write().insert(key.to_string(), (value, ttl));
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Sessions held in a map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, StateValues>>,
}

impl InMemorySessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of stored sessions, sorted.
    #[must_use]
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.sessions.lock().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError> {
        Ok(self
            .sessions
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError> {
        self.sessions.lock().insert(session_id.to_string(), values);
        Ok(())
    }
}

/// Replaces the temp data provider with [`InMemoryTempDataProvider`].
pub fn replace_temp_data_provider(services: &mut ServiceCollection) {
    services.replace::<dyn TempDataProvider, InMemoryTempDataProvider>(
        ServiceLifetime::Singleton,
        |_| Arc::new(InMemoryTempDataProvider::new()),
    );
}

/// Replaces the memory cache with [`InMemoryCache`].
pub fn replace_memory_cache(services: &mut ServiceCollection) {
    services.replace::<dyn MemoryCache, InMemoryCache>(ServiceLifetime::Singleton, |_| {
        Arc::new(InMemoryCache::new())
    });
}

/// Replaces the session store with [`InMemorySessionStore`].
pub fn replace_session_store(services: &mut ServiceCollection) {
    services.replace::<dyn SessionStore, InMemorySessionStore>(ServiceLifetime::Singleton, |_| {
        Arc::new(InMemorySessionStore::new())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvctest_host::{add_session, add_temp_data, DistributedSessionStore, SystemMemoryCache};
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> StateValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn temp_data_round_trips_and_clears() {
        let provider = InMemoryTempDataProvider::new();
        provider
            .save("s1", values(&[("message", json!("saved"))]))
            .unwrap();
        assert_eq!(provider.load("s1").unwrap()["message"], "saved");
        assert!(provider.load("s2").unwrap().is_empty());

        provider.save("s1", StateValues::new()).unwrap();
        assert!(provider.load("s1").unwrap().is_empty());
    }

    #[test]
    fn cache_never_expires() {
        let cache = InMemoryCache::new();
        cache.set("k", json!(1), Some(Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("k"), Some(json!(1)));
        assert_eq!(cache.ttl("k"), Some(Duration::from_nanos(1)));
        assert_eq!(cache.len(), 1);
        assert!(cache.remove("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn session_store_keeps_sessions_apart() {
        let store = InMemorySessionStore::new();
        store.commit("b", values(&[("n", json!(2))])).unwrap();
        store.commit("a", values(&[("n", json!(1))])).unwrap();
        assert_eq!(store.load("a").unwrap()["n"], 1);
        assert_eq!(store.session_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn replacements_swap_host_defaults() {
        let mut services = ServiceCollection::new();
        add_session(&mut services);
        add_temp_data(&mut services);
        assert!(services
            .implementation_of::<dyn MemoryCache>()
            .unwrap()
            .is::<SystemMemoryCache>());
        assert!(services
            .implementation_of::<dyn SessionStore>()
            .unwrap()
            .is::<DistributedSessionStore>());

        replace_temp_data_provider(&mut services);
        replace_memory_cache(&mut services);
        replace_session_store(&mut services);

        assert!(services
            .implementation_of::<dyn TempDataProvider>()
            .unwrap()
            .is::<InMemoryTempDataProvider>());
        assert!(services
            .implementation_of::<dyn MemoryCache>()
            .unwrap()
            .is::<InMemoryCache>());
        assert_eq!(services.count::<dyn SessionStore>(), 1);

        let provider = services.build_provider();
        let temp_data = provider.get::<dyn TempDataProvider>().unwrap();
        temp_data.save("s", values(&[("x", json!(true))])).unwrap();
        assert_eq!(temp_data.load("s").unwrap()["x"], true);
    }
}
