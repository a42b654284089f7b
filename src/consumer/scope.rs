//! # Batch Scope
//!
//! Per-batch context handed to every handler invocation. One scope is
//! created per receive call and shared by all messages of that batch, then
//! dropped when the batch is done.
//!
//! Handlers that need batch-lived state (a connection, a cache, an
//! accumulator) keep it in the scope's extension map:
//!
//! ```rust
//! use queue_dispatch::consumer::BatchScope;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let scope = BatchScope::new("orders", 3);
//! let counter = scope.get_or_insert_with(|| AtomicU32::new(0));
//! counter.fetch_add(1, Ordering::Relaxed);
//!
//! // Same instance for the rest of the batch
//! assert_eq!(scope.get_or_insert_with(|| AtomicU32::new(0)).load(Ordering::Relaxed), 1);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Context shared by all messages from one receive batch
#[derive(Clone)]
pub struct BatchScope {
    batch_id: Uuid,
    queue_id: Arc<str>,
    received_at: DateTime<Utc>,
    batch_size: usize,
    extensions: Arc<RwLock<Extensions>>,
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("batch_id", &self.batch_id)
            .field("queue_id", &self.queue_id)
            .field("received_at", &self.received_at)
            .field("batch_size", &self.batch_size)
            .field("extension_count", &self.extensions.read().len())
            .finish()
    }
}

impl BatchScope {
    pub fn new(queue_id: &str, batch_size: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            queue_id: Arc::from(queue_id),
            received_at: Utc::now(),
            batch_size,
            extensions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Store a value for the rest of the batch, replacing any previous value
    /// of the same type
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.extensions
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Fetch a value stored earlier in this batch
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.extensions
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Fetch the batch's instance of `T`, creating it on first use
    pub fn get_or_insert_with<T, F>(&self, create: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>() {
            return existing;
        }
        let mut extensions = self.extensions.write();
        let entry = extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(create()))
            .clone();
        drop(extensions);
        match entry.downcast::<T>() {
            Ok(value) => value,
            // Keys are TypeIds, so a stored value always has type T
            Err(_) => unreachable!("extension stored under mismatched TypeId"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct TenantId(String);

    #[test]
    fn test_scope_metadata() {
        let scope = BatchScope::new("orders", 4);
        assert_eq!(scope.queue_id(), "orders");
        assert_eq!(scope.batch_size(), 4);
        assert!(scope.received_at() <= Utc::now());
    }

    #[test]
    fn test_scopes_are_distinct() {
        let first = BatchScope::new("orders", 1);
        let second = BatchScope::new("orders", 1);
        assert_ne!(first.batch_id(), second.batch_id());

        first.insert(TenantId("acme".into()));
        assert!(second.get::<TenantId>().is_none());
    }

    #[test]
    fn test_clones_share_extensions() {
        let scope = BatchScope::new("orders", 2);
        let clone = scope.clone();
        clone.insert(TenantId("acme".into()));
        assert_eq!(scope.get::<TenantId>().as_deref(), Some(&TenantId("acme".into())));
    }

    #[test]
    fn test_get_or_insert_with_creates_once() {
        let scope = BatchScope::new("orders", 2);
        let mut created = 0;
        let first = scope.get_or_insert_with(|| {
            created += 1;
            TenantId("acme".into())
        });
        let second = scope.get_or_insert_with(|| TenantId("other".into()));
        assert_eq!(created, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
