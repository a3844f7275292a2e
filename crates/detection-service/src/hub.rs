//! Listener Hub
//!
//! Fans each state snapshot out to subscribers in subscription order.
//! Delivery happens outside the listener lock, so a listener may
//! unsubscribe itself (or anyone else) while being called.
//!
//! Only one thread delivers at a time and it takes the snapshot itself,
//! so listeners never see state go backwards. A publish that finds
//! delivery in progress (including one made from inside a listener) leaves
//! a pending flag; the delivering thread picks it up with a fresh snapshot
//! before it lets go.

use crate::state::AggregateState;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use tracing::{error, warn};

/// Result returned by a listener
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// State listener callback
pub type Listener = dyn Fn(&AggregateState) -> ListenerResult + Send + Sync;

type ListenerList = Mutex<Vec<(u64, Arc<Listener>)>>;

fn lock(list: &ListenerList) -> MutexGuard<'_, Vec<(u64, Arc<Listener>)>> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`ListenerHub::subscribe`]
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).retain(|(id, _)| *id != self.id);
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Subscriber registry
#[derive(Default)]
pub struct ListenerHub {
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
    delivering: Mutex<()>,
    pending: AtomicBool,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and deliver the current state to it.
    ///
    /// Delivery is immediate unless another delivery is in progress, in
    /// which case that one reaches the new listener before it finishes.
    pub fn subscribe<S>(&self, listener: Arc<Listener>, snapshot: S) -> Subscription
    where
        S: Fn() -> AggregateState,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::clone(&listener)));

        match self.try_deliver() {
            Some(guard) => {
                deliver(id, &listener, &snapshot());
                drop(guard);
                if self.pending.load(Ordering::SeqCst) {
                    self.drain(&snapshot);
                }
            }
            None => {
                self.pending.store(true, Ordering::SeqCst);
                self.drain(&snapshot);
            }
        }

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver the state produced by `snapshot` to every listener
    pub fn publish<S>(&self, snapshot: S)
    where
        S: Fn() -> AggregateState,
    {
        self.pending.store(true, Ordering::SeqCst);
        self.drain(&snapshot);
    }

    fn try_deliver(&self) -> Option<MutexGuard<'_, ()>> {
        match self.delivering.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Deliver until no publish is pending, or hand off to the current
    /// delivering thread
    fn drain(&self, snapshot: &dyn Fn() -> AggregateState) {
        loop {
            let Some(guard) = self.try_deliver() else {
                return;
            };
            while self.pending.swap(false, Ordering::SeqCst) {
                let state = snapshot();
                let listeners: Vec<_> = lock(&self.listeners).clone();
                for (id, listener) in &listeners {
                    deliver(*id, listener, &state);
                }
            }
            drop(guard);

            // A publish may have landed between the last swap and the unlock
            if !self.pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener
    pub fn clear(&self) {
        lock(&self.listeners).clear();
    }
}

fn deliver(id: u64, listener: &Arc<Listener>, state: &AggregateState) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(state))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Error in detection listener {}: {}", id, e),
        Err(_) => error!("Detection listener {} panicked", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, AtomicUsize};

    fn counter_listener(count: &Arc<AtomicUsize>) -> Arc<Listener> {
        let count = Arc::clone(count);
        Arc::new(move |_: &AggregateState| -> ListenerResult {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_subscribe_delivers_snapshot() {
        let hub = ListenerHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        hub.subscribe(counter_listener(&count), AggregateState::default);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let hub = ListenerHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            hub.subscribe(
                Arc::new(move |_: &AggregateState| -> ListenerResult {
                    order.lock().unwrap().push(tag);
                    Ok(())
                }),
                AggregateState::default,
            );
        }
        order.lock().unwrap().clear();

        hub.publish(AggregateState::default);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_listeners_do_not_block_others() {
        let hub = ListenerHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        hub.subscribe(
            Arc::new(|_: &AggregateState| -> ListenerResult { Err("listener broke".into()) }),
            AggregateState::default,
        );
        hub.subscribe(
            Arc::new(|_: &AggregateState| -> ListenerResult { panic!("listener panicked") }),
            AggregateState::default,
        );
        hub.subscribe(counter_listener(&count), AggregateState::default);

        hub.publish(AggregateState::default);
        hub.publish(AggregateState::default);

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(hub.len(), 3);
    }

    #[test]
    fn test_unsubscribe_idempotent() {
        let hub = ListenerHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = hub.subscribe(counter_listener(&count), AggregateState::default);

        sub.unsubscribe();
        sub.unsubscribe();
        hub.publish(AggregateState::default);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let hub = ListenerHub::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let (slot_ref, calls_ref) = (Arc::clone(&slot), Arc::clone(&calls));
        let sub = hub.subscribe(
            Arc::new(move |_: &AggregateState| -> ListenerResult {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot_ref.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            }),
            AggregateState::default,
        );
        *slot.lock().unwrap() = Some(sub);

        hub.publish(AggregateState::default);
        hub.publish(AggregateState::default);

        // Snapshot on subscribe, then one publish before it removed itself
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(hub.is_empty());
    }

    fn state_at(version: i64) -> AggregateState {
        AggregateState {
            last_checked_at: Utc.timestamp_opt(version, 0).single(),
            ..Default::default()
        }
    }

    fn version_recorder(seen: &Arc<Mutex<Vec<i64>>>) -> Arc<Listener> {
        let seen = Arc::clone(seen);
        Arc::new(move |state: &AggregateState| -> ListenerResult {
            let version = state.last_checked_at.map(|t| t.timestamp()).unwrap_or(-1);
            seen.lock().unwrap().push(version);
            Ok(())
        })
    }

    #[test]
    fn test_publish_from_inside_listener_follows_current_delivery() {
        let hub = Arc::new(ListenerHub::new());
        let version = Arc::new(AtomicI64::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let snapshot = {
            let version = Arc::clone(&version);
            move || state_at(version.load(Ordering::SeqCst))
        };

        let (weak_hub, version_ref, fired) =
            (Arc::downgrade(&hub), Arc::clone(&version), Arc::new(AtomicBool::new(false)));
        let snapshot_ref = snapshot.clone();
        hub.subscribe(
            Arc::new(move |state: &AggregateState| -> ListenerResult {
                let at_one = state.last_checked_at.map(|t| t.timestamp()) == Some(1);
                if at_one && !fired.swap(true, Ordering::SeqCst) {
                    version_ref.store(2, Ordering::SeqCst);
                    if let Some(hub) = weak_hub.upgrade() {
                        hub.publish(&snapshot_ref);
                    }
                }
                Ok(())
            }),
            &snapshot,
        );
        hub.subscribe(version_recorder(&seen), &snapshot);

        version.store(1, Ordering::SeqCst);
        hub.publish(&snapshot);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_concurrent_publishers_never_go_backwards() {
        let hub = ListenerHub::new();
        let version = AtomicI64::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let snapshot = || state_at(version.load(Ordering::SeqCst));
        hub.subscribe(version_recorder(&seen), snapshot);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        version.fetch_add(1, Ordering::SeqCst);
                        hub.publish(snapshot);
                    }
                });
            }
        });

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "out of order: {seen:?}");
        assert_eq!(seen.last(), Some(&200));
    }
}
