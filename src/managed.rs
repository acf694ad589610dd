//! Capability contract for instances stored in a registry or a scope.
//!
//! Every stored value implements [`Managed`]. The trait answers two runtime
//! capability queries, [`Managed::as_disposable`] and [`Managed::as_notifier`],
//! which default to "not supported". A type opts into automatic cleanup or
//! change notification by overriding them.
//!
//! ```rust
//! use lifecycle_registry::{ChangeNotifier, Disposable, Managed, Notifier};
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: AtomicI32,
//!     notifier: Notifier,
//! }
//!
//! impl Counter {
//!     fn increment(&self) {
//!         self.value.fetch_add(1, Ordering::SeqCst);
//!         self.notifier.notify_listeners();
//!     }
//! }
//!
//! impl Managed for Counter {
//!     fn as_disposable(&self) -> Option<&dyn Disposable> {
//!         Some(&self.notifier)
//!     }
//!
//!     fn as_notifier(&self) -> Option<&dyn ChangeNotifier> {
//!         Some(&self.notifier)
//!     }
//! }
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use downcast_rs::{impl_downcast, DowncastSync};
use parking_lot::Mutex;

/// A value that can live in a registry or be bound to a scope.
///
/// The capability queries are resolved through the vtable, so they keep
/// working after the value has been type-erased to `Arc<dyn Managed>`.
pub trait Managed: DowncastSync {
    /// Name of the concrete type, used in keys and diagnostics for values
    /// registered through their runtime type.
    fn managed_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the disposal capability, if the value supports it.
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        None
    }

    /// Returns the change-notification capability, if the value supports it.
    fn as_notifier(&self) -> Option<&dyn ChangeNotifier> {
        None
    }
}

impl_downcast!(sync Managed);

/// Values that release resources when their owner leaves the tree.
pub trait Disposable: Send + Sync {
    /// Releases the value's resources. Called at most once by the registry.
    fn dispose(&self);
}

/// Values that broadcast state changes to subscribed listeners.
pub trait ChangeNotifier: Send + Sync {
    /// Subscribes `listener`. Adding the same listener twice subscribes it twice.
    fn add_listener(&self, listener: Listener);

    /// Removes one subscription of `listener`. Returns `false` if none was found.
    fn remove_listener(&self, listener: &Listener) -> bool;
}

/// A change callback with pointer identity.
///
/// Two `Listener`s are equal only if they are clones of the same handle,
/// which is what makes (notifier, listener) pairs usable as subscription keys.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn() + Send + Sync>);

impl Listener {
    /// Wraps a callback into a new listener identity.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Invokes the callback.
    pub fn call(&self) {
        (self.0)();
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Listener {}

impl Hash for Listener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.addr()).finish()
    }
}

/// Reusable listener list implementing [`ChangeNotifier`] and [`Disposable`].
///
/// Models embed a `Notifier` and forward their capability queries to it.
#[derive(Default)]
pub struct Notifier {
    listeners: Mutex<Vec<Listener>>,
    disposed: AtomicBool,
}

impl Notifier {
    /// Creates a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls every subscribed listener.
    ///
    /// Listeners run on a snapshot taken before the first call, outside the
    /// internal lock, so they may subscribe or unsubscribe freely.
    pub fn notify_listeners(&self) {
        let snapshot = self.listeners.lock().clone();
        for listener in snapshot {
            listener.call();
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if any listener is subscribed.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.listeners.lock().is_empty()
    }

    /// Returns `true` once [`Disposable::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl ChangeNotifier for Notifier {
    fn add_listener(&self, listener: Listener) {
        if self.is_disposed() {
            tracing::warn!("listener added to a disposed notifier, ignoring");
            return;
        }
        self.listeners.lock().push(listener);
    }

    fn remove_listener(&self, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.iter().position(|l| l == listener) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }
}

impl Disposable for Notifier {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.listeners.lock().clear();
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

macro_rules! impl_managed_for {
    ($($ty:ty),* $(,)?) => {
        $(impl Managed for $ty {})*
    };
}

impl_managed_for!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
    String, &'static str,
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener() -> (Listener, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let listener = Listener::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (listener, calls)
    }

    #[test]
    fn listener_identity_is_pointer_based() {
        let a = Listener::new(|| {});
        let b = Listener::new(|| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn notify_reaches_every_listener() {
        let notifier = Notifier::new();
        let (first, first_calls) = counting_listener();
        let (second, second_calls) = counting_listener();
        notifier.add_listener(first);
        notifier.add_listener(second);

        notifier.notify_listeners();
        notifier.notify_listeners();

        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_listener_removes_one_match() {
        let notifier = Notifier::new();
        let (listener, calls) = counting_listener();
        notifier.add_listener(listener.clone());
        notifier.add_listener(listener.clone());

        assert!(notifier.remove_listener(&listener));
        assert_eq!(notifier.listener_count(), 1);

        notifier.notify_listeners();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(notifier.remove_listener(&listener));
        assert!(!notifier.remove_listener(&listener));
    }

    #[test]
    fn dispose_drops_listeners_and_rejects_new_ones() {
        let notifier = Notifier::new();
        let (listener, calls) = counting_listener();
        notifier.add_listener(listener.clone());

        notifier.dispose();
        notifier.add_listener(listener);
        notifier.notify_listeners();

        assert!(notifier.is_disposed());
        assert!(!notifier.has_listeners());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_notify() {
        let notifier = Arc::new(Notifier::new());
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let notifier_clone = notifier.clone();
        let slot_clone = slot.clone();
        let listener = Listener::new(move || {
            if let Some(me) = slot_clone.lock().take() {
                notifier_clone.remove_listener(&me);
            }
        });
        *slot.lock() = Some(listener.clone());
        notifier.add_listener(listener);

        notifier.notify_listeners();
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn primitives_have_no_capabilities() {
        let value: Arc<dyn Managed> = Arc::new(42i32);
        assert!(value.as_disposable().is_none());
        assert!(value.as_notifier().is_none());
        assert_eq!(value.managed_type_name(), "i32");
    }

    #[test]
    fn erased_values_downcast_back() {
        let value: Arc<dyn Managed> = Arc::new("hello".to_string());
        assert!(value.is::<String>());
        let text = value.downcast_arc::<String>().ok().unwrap();
        assert_eq!(&*text, "hello");
    }
}
