//! Stateful request-scoped capabilities: temporary data, in-memory caching
//! and session storage.
//!
//! The host defaults here depend on wall-clock expiry or on session
//! middleware being configured, which makes them awkward in tests.

use crate::services::ServiceCollection;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Values stored for a session or a temp data round trip.
pub type StateValues = IndexMap<String, Value>;

/// A provider could not serve a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Capability that failed.
    pub provider: &'static str,
    /// What went wrong.
    pub message: String,
}

impl ProviderError {
    /// Creates an error for `provider`.
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Temp data
// ============================================================================

/// Stores values that survive exactly one subsequent request.
pub trait TempDataProvider: Send + Sync {
    /// Loads and clears the values saved for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing store is unavailable.
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError>;

    /// Saves values for the next request of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing store is unavailable.
    fn save(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError>;
}

/// Host default: keeps temp data in the session.
///
/// Fails when no [`SessionStore`] is registered.
pub struct SessionStateTempDataProvider {
    sessions: Option<Arc<dyn SessionStore>>,
}

impl SessionStateTempDataProvider {
    const KEY: &'static str = "__temp_data";

    /// Provider backed by `sessions`.
    #[must_use]
    pub fn new(sessions: Option<Arc<dyn SessionStore>>) -> Self {
        Self { sessions }
    }

    fn sessions(&self) -> Result<&Arc<dyn SessionStore>, ProviderError> {
        self.sessions.as_ref().ok_or_else(|| {
            ProviderError::new("temp data", "session has not been configured for this application")
        })
    }
}

impl fmt::Debug for SessionStateTempDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStateTempDataProvider")
            .field("has_sessions", &self.sessions.is_some())
            .finish()
    }
}

impl TempDataProvider for SessionStateTempDataProvider {
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError> {
        let sessions = self.sessions()?;
        let mut session = sessions.load(session_id)?;
        let stored = session.shift_remove(Self::KEY);
        sessions.commit(session_id, session)?;
        match stored {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Ok(StateValues::new()),
        }
    }

    fn save(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError> {
        let sessions = self.sessions()?;
        let mut session = sessions.load(session_id)?;
        session.insert(
            Self::KEY.to_string(),
            Value::Object(values.into_iter().collect()),
        );
        sessions.commit(session_id, session)
    }
}

// ============================================================================
// Memory cache
// ============================================================================

/// A process-local key/value cache.
pub trait MemoryCache: Send + Sync {
    /// Looks up a live entry.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores an entry, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Removes an entry. Returns whether it existed.
    fn remove(&self, key: &str) -> bool;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Returns true if there are no live entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Host default: wall-clock expiring cache.
#[derive(Default)]
pub struct SystemMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SystemMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for SystemMemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemMemoryCache")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl MemoryCache for SystemMemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.is_live(now));
        entries.len()
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Loads and commits session values by id.
pub trait SessionStore: Send + Sync {
    /// Values of `session_id`. Unknown ids yield an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing store is unavailable.
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError>;

    /// Replaces the values of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backing store is unavailable.
    fn commit(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError>;
}

/// Host default: sessions serialized into a [`MemoryCache`] with an idle
/// timeout.
pub struct DistributedSessionStore {
    cache: Arc<dyn MemoryCache>,
    idle_timeout: Duration,
}

impl DistributedSessionStore {
    /// Default idle timeout.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

    /// Store backed by `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn MemoryCache>) -> Self {
        Self {
            cache,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Overrides the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }
}

impl fmt::Debug for DistributedSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedSessionStore")
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionStore for DistributedSessionStore {
    fn load(&self, session_id: &str) -> Result<StateValues, ProviderError> {
        match self.cache.get(&Self::key(session_id)) {
            Some(Value::String(serialized)) => serde_json::from_str(&serialized)
                .map_err(|e| ProviderError::new("session", format!("corrupt session data: {e}"))),
            Some(_) => Err(ProviderError::new("session", "corrupt session data")),
            None => Ok(StateValues::new()),
        }
    }

    fn commit(&self, session_id: &str, values: StateValues) -> Result<(), ProviderError> {
        let serialized = serde_json::to_string(&values)
            .map_err(|e| ProviderError::new("session", e.to_string()))?;
        self.cache.set(
            &Self::key(session_id),
            Value::String(serialized),
            Some(self.idle_timeout),
        );
        Ok(())
    }
}

/// Registers the host memory cache unless one is registered.
pub fn add_memory_cache(services: &mut ServiceCollection) {
    services.try_add_singleton::<dyn MemoryCache, SystemMemoryCache>(|_| {
        Arc::new(SystemMemoryCache::new())
    });
}

/// Registers the host session store (and the memory cache it needs)
/// unless one is registered.
pub fn add_session(services: &mut ServiceCollection) {
    add_memory_cache(services);
    services.try_add_transient::<dyn SessionStore, DistributedSessionStore>(|sp| {
        let cache = sp
            .get::<dyn MemoryCache>()
            .unwrap_or_else(|| Arc::new(SystemMemoryCache::new()));
        Arc::new(DistributedSessionStore::new(cache))
    });
}

/// Registers the host temp data provider unless one is registered.
pub fn add_temp_data(services: &mut ServiceCollection) {
    services.try_add_singleton::<dyn TempDataProvider, SessionStateTempDataProvider>(|sp| {
        Arc::new(SessionStateTempDataProvider::new(sp.get::<dyn SessionStore>()))
    });
}
