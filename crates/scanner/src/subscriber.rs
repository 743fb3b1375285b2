use std::sync::{Arc, PoisonError, RwLock};

use blockwatch_core::{BlockPos, BlockState};

use crate::error::ScanError;

/// Consumer of block and chunk change notifications.
///
/// Every method may be called concurrently from several tasks and must be
/// thread-safe. `record_block` in particular is invoked from one task per
/// chunk layer during full scans.
pub trait BlockChangeSubscriber: Send + Sync {
    /// If false, `record_block` is only called for single-block updates, never
    /// while a whole chunk is scanned.
    fn should_call_record_block_on_chunk_update(&self) -> bool {
        true
    }

    /// Registers a block and lets the subscriber decide what to do with it.
    ///
    /// `pos` is a value copy and may be stored as-is. `cleared` is true when the
    /// call is part of a full chunk scan that `chunk_update` announced.
    fn record_block(&self, pos: BlockPos, state: BlockState, cleared: bool);

    /// A chunk was loaded or entirely replaced; called before its blocks are recorded.
    fn chunk_update(&self, x: i32, z: i32);

    /// A chunk was unloaded.
    fn clear_chunk(&self, x: i32, z: i32);

    /// Everything is gone (world change, disconnect, unsubscribe).
    fn clear_all_chunks(&self);

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a registered subscriber.
pub type SubscriberHandle = Arc<dyn BlockChangeSubscriber>;

/// Identity comparison on the subscriber allocation, ignoring vtables.
fn same_subscriber(a: &SubscriberHandle, b: &SubscriberHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Copy-on-write set of subscribers.
///
/// Readers take an `Arc` snapshot and iterate it without holding the lock, so
/// a dispatch never observes a registration that is half applied.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Arc<Vec<SubscriberHandle>>>,
}

impl SubscriberRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current subscribers.
    pub fn snapshot(&self) -> Arc<Vec<SubscriberHandle>> {
        Arc::clone(
            &self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Add a subscriber; fails if the same instance is already registered.
    pub fn insert(&self, subscriber: SubscriberHandle) -> Result<(), ScanError> {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard
            .iter()
            .any(|existing| same_subscriber(existing, &subscriber))
        {
            return Err(ScanError::AlreadySubscribed {
                name: subscriber.name().to_string(),
            });
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(subscriber);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn remove(&self, subscriber: &SubscriberHandle) -> bool {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !guard
            .iter()
            .any(|existing| same_subscriber(existing, subscriber))
        {
            return false;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|existing| !same_subscriber(existing, subscriber))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Whether this exact instance is registered.
    pub fn contains(&self, subscriber: &SubscriberHandle) -> bool {
        self.snapshot()
            .iter()
            .any(|existing| same_subscriber(existing, subscriber))
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns true when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl BlockChangeSubscriber for Nop {
        fn record_block(&self, _pos: BlockPos, _state: BlockState, _cleared: bool) {}
        fn chunk_update(&self, _x: i32, _z: i32) {}
        fn clear_chunk(&self, _x: i32, _z: i32) {}
        fn clear_all_chunks(&self) {}
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let registry = SubscriberRegistry::new();
        let sub: SubscriberHandle = Arc::new(Nop);
        registry.insert(Arc::clone(&sub)).unwrap();

        let err = registry.insert(Arc::clone(&sub)).unwrap_err();
        assert!(matches!(err, ScanError::AlreadySubscribed { .. }));
        assert!(err.to_string().contains("Nop"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_instances_of_same_type_coexist() {
        let registry = SubscriberRegistry::new();
        registry.insert(Arc::new(Nop)).unwrap();
        registry.insert(Arc::new(Nop)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_writes() {
        let registry = SubscriberRegistry::new();
        let first: SubscriberHandle = Arc::new(Nop);
        registry.insert(Arc::clone(&first)).unwrap();

        let before = registry.snapshot();
        registry.insert(Arc::new(Nop)).unwrap();
        assert!(registry.remove(&first));

        assert_eq!(before.len(), 1);
        assert!(same_subscriber(&before[0], &first));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&first));
    }

    #[test]
    fn remove_unknown_is_noop() {
        let registry = SubscriberRegistry::new();
        let sub: SubscriberHandle = Arc::new(Nop);
        assert!(!registry.remove(&sub));
        assert!(registry.is_empty());
    }

    #[test]
    fn default_name_is_type_name() {
        let sub = Nop;
        assert!(sub.name().ends_with("Nop"));
    }
}
