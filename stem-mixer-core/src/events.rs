//! Listener registration shared by host surfaces and the session components.
//!
//! Registration is scoped: components collect every registration they make
//! into a [`Disposer`], which releases all of them exactly once, either
//! explicitly or when it is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

struct HubInner<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<E>)>,
}

/// Minimal synchronous event emitter.
///
/// Listeners are invoked outside the hub's lock, so a listener may register
/// or remove listeners (including itself) while being called.
pub struct EventHub<E> {
    inner: Mutex<HubInner<E>>,
}

impl<E> EventHub<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                next_id: 1,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the listener was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects release actions and runs each of them exactly once.
#[must_use = "dropping a Disposer immediately releases what it holds"]
pub struct Disposer {
    actions: Vec<Box<dyn FnOnce() + Send + 'static>>,
}

impl Disposer {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    pub fn push<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.push(Box::new(action));
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every pending action in reverse registration order.
    pub fn dispose(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct VisibilityInner {
    hidden: AtomicBool,
    changes: EventHub<bool>,
}

/// Host "surface hidden" signal.
///
/// Cloning yields another handle to the same signal. The host calls
/// [`HostVisibility::set_hidden`]; components subscribe to transitions.
#[derive(Clone)]
pub struct HostVisibility {
    inner: Arc<VisibilityInner>,
}

impl HostVisibility {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(VisibilityInner {
                hidden: AtomicBool::new(false),
                changes: EventHub::new(),
            }),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.load(Ordering::SeqCst)
    }

    /// Update the signal; listeners fire only on an actual transition.
    pub fn set_hidden(&self, hidden: bool) {
        let previous = self.inner.hidden.swap(hidden, Ordering::SeqCst);
        if previous != hidden {
            log::debug!("host surface {}", if hidden { "hidden" } else { "visible" });
            self.inner.changes.emit(&hidden);
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.changes.subscribe(move |hidden: &bool| listener(*hidden))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.changes.unsubscribe(id)
    }

    /// Subscribe and hand the registration to `disposer`.
    pub fn subscribe_scoped<F>(&self, disposer: &mut Disposer, listener: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.subscribe(listener);
        let this = self.clone();
        disposer.push(move || {
            this.unsubscribe(id);
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.changes.listener_count()
    }
}

impl Default for HostVisibility {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_every_listener() {
        let hub = EventHub::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            hub.subscribe(move |v| {
                total.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }
        hub.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_unknown_is_false() {
        let hub = EventHub::<()>::new();
        let id = hub.subscribe(|_| {});
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let hub = Arc::new(EventHub::<()>::new());
        let slot = Arc::new(Mutex::new(None::<ListenerId>));
        let hub_ref = Arc::clone(&hub);
        let slot_ref = Arc::clone(&slot);
        let id = hub.subscribe(move |_| {
            if let Some(id) = *slot_ref.lock() {
                hub_ref.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);
        hub.emit(&());
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn disposer_runs_once_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut disposer = Disposer::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            disposer.push(move || order.lock().push(i));
        }
        disposer.dispose();
        disposer.dispose();
        drop(disposer);
        assert_eq!(*order.lock(), vec![2, 1, 0]);
    }

    #[test]
    fn visibility_fires_only_on_transition() {
        let visibility = HostVisibility::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut disposer = Disposer::new();
        let c = Arc::clone(&count);
        visibility.subscribe_scoped(&mut disposer, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        visibility.set_hidden(false);
        visibility.set_hidden(true);
        visibility.set_hidden(true);
        visibility.set_hidden(false);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(disposer);
        assert_eq!(visibility.listener_count(), 0);
    }
}
