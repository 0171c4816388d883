//! Event handler trait + subscription registry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::StreamError;
use crate::types::{DispatchContext, EventRecord};

/// Trait for user-provided event handlers.
///
/// Handlers run synchronously on the poll loop task; a slow handler delays
/// the next iteration. Returning an error (or panicking) only affects this
/// handler's delivery of this event.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &EventRecord, ctx: &DispatchContext) -> Result<(), StreamError>;
}

/// Adapter turning a closure into an [`EventHandler`]. Built by [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&EventRecord, &DispatchContext) -> Result<(), StreamError> + Send + Sync,
{
    fn handle(&self, event: &EventRecord, ctx: &DispatchContext) -> Result<(), StreamError> {
        (self.0)(event, ctx)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&EventRecord, &DispatchContext) -> Result<(), StreamError> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

// ─── Keys and ids ─────────────────────────────────────────────────────────────

/// Which events of an account a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Only events with this exact name.
    Exact(String),
    /// Every event of the account.
    Any,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => write!(f, "{name}"),
            Self::Any => write!(f, "*"),
        }
    }
}

/// Registry-unique subscription identifier. Ids increase with registration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

type HandlerSet = BTreeMap<SubscriptionId, Arc<dyn EventHandler>>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    accounts: HashMap<String, HashMap<EventKey, HandlerSet>>,
}

impl RegistryInner {
    fn insert(&mut self, account: &str, key: EventKey, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.accounts
            .entry(account.to_string())
            .or_default()
            .entry(key)
            .or_default()
            .insert(id, handler);
        id
    }

    fn remove(&mut self, account: &str, key: &EventKey, id: SubscriptionId) -> bool {
        let Some(keys) = self.accounts.get_mut(account) else {
            return false;
        };
        let removed = match keys.get_mut(key) {
            Some(set) => {
                let removed = set.remove(&id).is_some();
                if set.is_empty() {
                    keys.remove(key);
                }
                removed
            }
            None => false,
        };
        if keys.is_empty() {
            self.accounts.remove(account);
        }
        removed
    }
}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Account → event key → handlers.
///
/// Cheap to clone; clones share the same subscriptions. Safe to mutate from
/// any thread while the poll loop dispatches.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events named `event` emitted by `account`.
    pub fn subscribe(
        &self,
        account: impl Into<String>,
        event: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        self.add(account.into(), EventKey::Exact(event.into()), handler)
    }

    /// Subscribe `handler` to every event emitted by `account`.
    pub fn subscribe_all(
        &self,
        account: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        self.add(account.into(), EventKey::Any, handler)
    }

    fn add(&self, account: String, key: EventKey, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = lock(&self.inner).insert(&account, key.clone(), handler);
        tracing::debug!(%account, key = %key, id = %id, "subscription added");
        Subscription {
            id,
            account,
            key,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription by its parts. Returns `true` if it was present.
    pub fn remove(&self, account: &str, key: &EventKey, id: SubscriptionId) -> bool {
        let removed = lock(&self.inner).remove(account, key, id);
        if removed {
            tracing::debug!(%account, key = %key, id = %id, "subscription removed");
        }
        removed
    }

    /// Handlers matching `event_name` on `account`: exact-name subscriptions
    /// first, then wildcard ones, each in registration order.
    ///
    /// Returns a snapshot, so handlers may (un)subscribe while being invoked.
    pub fn matching(&self, account: &str, event_name: &str) -> Vec<Arc<dyn EventHandler>> {
        let inner = lock(&self.inner);
        let Some(keys) = inner.accounts.get(account) else {
            return vec![];
        };
        let exact = keys.get(&EventKey::Exact(event_name.to_string()));
        let any = keys.get(&EventKey::Any);
        exact
            .into_iter()
            .chain(any)
            .flat_map(|set| set.values().cloned())
            .collect()
    }

    /// Accounts with at least one active subscription.
    pub fn watched_accounts(&self) -> HashSet<String> {
        lock(&self.inner).accounts.keys().cloned().collect()
    }

    pub fn is_watched(&self, account: &str) -> bool {
        lock(&self.inner).accounts.contains_key(account)
    }

    /// Total number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        lock(&self.inner)
            .accounts
            .values()
            .flat_map(|keys| keys.values())
            .map(|set| set.len())
            .sum()
    }
}

// ─── Subscription handle ─────────────────────────────────────────────────────

/// Handle returned by a subscribe call.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    account: String,
    key: EventKey,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    /// Remove this subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => {
                let removed = lock(&inner).remove(&self.account, &self.key, self.id);
                if removed {
                    tracing::debug!(account = %self.account, key = %self.key, id = %self.id, "unsubscribed");
                }
                removed
            }
            None => false,
        }
    }
}

impl fmt::Debug for RegistryInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryInner")
            .field("next_id", &self.next_id)
            .field("accounts", &self.accounts.len())
            .finish()
    }
}
