//! A component that tracks its own change subscriptions.
//!
//! An [`Observer`] is embedded in a consumer. It resolves instances through a
//! [`Lookup`], subscribes listeners to change notifiers at most once per
//! `(object, listener)` pair, and removes the subscriptions again on
//! [`Observer::cancel_subscriptions`]. Cancelling is the consumer's job;
//! dropping an observer with live subscriptions only logs a warning.
//!
//! ```rust
//! use lifecycle_registry::{ChangeNotifier, Listener, Lookup, Managed, Notifier, Observer};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Model { notifier: Notifier }
//! impl Managed for Model {
//!     fn as_notifier(&self) -> Option<&dyn ChangeNotifier> { Some(&self.notifier) }
//! }
//!
//! let model = Arc::new(Model::default());
//! let mut observer = Observer::new();
//! let listener = Listener::new(|| println!("changed"));
//!
//! observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();
//! observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();
//! assert_eq!(model.notifier.listener_count(), 1);
//!
//! observer.cancel_subscriptions();
//! assert_eq!(model.notifier.listener_count(), 0);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::{
    lookup, GlobalRegistry, Listener, Managed, Registration, RegistryApi, RegistryError, Scope,
};

/// Where an [`Observer`] resolves an instance from.
pub enum Lookup<'a, T: Managed> {
    /// The unnamed `T` in the observer's registry.
    Global,
    /// The `T` registered under a name in the observer's registry.
    Named(&'a str),
    /// The nearest scoped `T` above a scope.
    Scoped(&'a Scope),
    /// An instance the caller already holds.
    Direct(Arc<T>),
}

impl<T: Managed> fmt::Debug for Lookup<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Global => f.write_str("Global"),
            Lookup::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Lookup::Scoped(scope) => f.debug_tuple("Scoped").field(&scope.id()).finish(),
            Lookup::Direct(_) => f.write_str("Direct"),
        }
    }
}

struct Subscription {
    object: Arc<dyn Managed>,
    listener: Listener,
}

impl Subscription {
    fn matches(&self, object: *const (), listener: &Listener) -> bool {
        Arc::as_ptr(&self.object).cast::<()>() == object && self.listener == *listener
    }

    fn cancel(&self) {
        if let Some(notifier) = self.object.as_notifier() {
            notifier.remove_listener(&self.listener);
        }
    }
}

/// Subscription bookkeeping for one consumer.
pub struct Observer<R: RegistryApi = GlobalRegistry> {
    registry: R,
    subscriptions: Vec<Subscription>,
}

impl Observer {
    /// An observer resolving global lookups in the global registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: GlobalRegistry,
            subscriptions: Vec::new(),
        }
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegistryApi> Observer<R> {
    /// Resolves global lookups in `registry` instead, keeping subscriptions.
    #[must_use]
    pub fn with_registry<R2: RegistryApi>(mut self, registry: R2) -> Observer<R2> {
        Observer {
            registry,
            subscriptions: std::mem::take(&mut self.subscriptions),
        }
    }

    /// Resolves `lookup` and subscribes `listener` to it.
    ///
    /// Subscribing the same listener to the same object twice is a no-op.
    ///
    /// # Errors
    ///
    /// - the lookup's own error ([`RegistryError::NotRegistered`] or
    ///   [`RegistryError::NotFound`])
    /// - [`RegistryError::WrongCapability`] if the instance cannot notify
    pub fn listen_to<T: Managed>(
        &mut self,
        lookup: Lookup<'_, T>,
        listener: &Listener,
    ) -> Result<Arc<T>, RegistryError> {
        let instance = self.resolve(lookup)?;
        let Some(notifier) = instance.as_notifier() else {
            return Err(RegistryError::not_a_notifier(std::any::type_name::<T>()));
        };

        let object: Arc<dyn Managed> = instance.clone();
        if self
            .subscriptions
            .iter()
            .any(|s| s.matches(Arc::as_ptr(&object).cast(), listener))
        {
            return Ok(instance);
        }

        notifier.add_listener(listener.clone());
        self.subscriptions.push(Subscription {
            object,
            listener: listener.clone(),
        });
        tracing::trace!(
            type_name = std::any::type_name::<T>(),
            subscriptions = self.subscriptions.len(),
            "observer subscribed"
        );
        Ok(instance)
    }

    /// Resolves `lookup` without subscribing.
    ///
    /// # Errors
    ///
    /// The lookup's own error.
    pub fn get<T: Managed>(&self, lookup: Lookup<'_, T>) -> Result<Arc<T>, RegistryError> {
        self.resolve(lookup)
    }

    /// Publishes the nearest scoped `T` in the registry as a pre-built entry.
    ///
    /// The scoped binding keeps ownership; the registry entry never disposes.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if no scoped `T` exists, or
    /// [`RegistryError::AlreadyRegistered`] if the key is live.
    pub fn register<T: Managed>(&self, scope: &Scope, name: Option<&str>) -> Result<(), RegistryError> {
        let instance = lookup::get::<T>(scope)?;
        self.registry
            .register_with(Registration::arc(instance).with_name(name).dispose(false))
    }

    /// Removes an entry published by [`Observer::register`] without disposing.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if the key is not live.
    pub fn unregister<T: Managed>(&self, name: Option<&str>) -> Result<(), RegistryError> {
        self.registry.unregister::<T>(name, false)
    }

    /// Removes the subscription of `listener` to `object`.
    ///
    /// Returns `false` if there was none.
    pub fn cancel_subscription(&mut self, object: &dyn Managed, listener: &Listener) -> bool {
        let object = std::ptr::from_ref(object).cast::<()>();
        let Some(index) = self
            .subscriptions
            .iter()
            .position(|s| s.matches(object, listener))
        else {
            return false;
        };
        self.subscriptions.remove(index).cancel();
        true
    }

    /// Removes every subscription.
    pub fn cancel_subscriptions(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        tracing::trace!(subscriptions = self.subscriptions.len(), "observer cancelling subscriptions");
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn resolve<T: Managed>(&self, source: Lookup<'_, T>) -> Result<Arc<T>, RegistryError> {
        match source {
            Lookup::Global => self.registry.get::<T>(),
            Lookup::Named(name) => self.registry.get_named::<T>(name),
            Lookup::Scoped(scope) => lookup::get::<T>(scope),
            Lookup::Direct(instance) => Ok(instance),
        }
    }
}

impl<R: RegistryApi> Drop for Observer<R> {
    fn drop(&mut self) {
        if !self.subscriptions.is_empty() {
            tracing::warn!(
                subscriptions = self.subscriptions.len(),
                "observer dropped with live subscriptions"
            );
        }
    }
}

impl<R: RegistryApi> fmt::Debug for Observer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_registry, ChangeNotifier, Notifier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Model {
        notifier: Notifier,
    }

    impl Managed for Model {
        fn as_notifier(&self) -> Option<&dyn ChangeNotifier> {
            Some(&self.notifier)
        }
    }

    fn counting_listener() -> (Listener, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let listener = Listener::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (listener, calls)
    }

    #[test]
    fn test_listen_to_is_idempotent() {
        let model = Arc::new(Model::default());
        let mut observer = Observer::new();
        let (listener, calls) = counting_listener();

        observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();
        observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();

        assert_eq!(observer.subscription_count(), 1);
        model.notifier.notify_listeners();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        observer.cancel_subscriptions();
    }

    #[test]
    fn test_distinct_listeners_are_distinct_subscriptions() {
        let model = Arc::new(Model::default());
        let mut observer = Observer::new();
        let (first, _) = counting_listener();
        let (second, _) = counting_listener();

        observer.listen_to(Lookup::Direct(model.clone()), &first).unwrap();
        observer.listen_to(Lookup::Direct(model.clone()), &second).unwrap();

        assert_eq!(observer.subscription_count(), 2);
        assert_eq!(model.notifier.listener_count(), 2);
        observer.cancel_subscriptions();
    }

    #[test]
    fn test_cancel_subscription_removes_one() {
        let model = Arc::new(Model::default());
        let mut observer = Observer::new();
        let (listener, calls) = counting_listener();

        observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();
        assert!(observer.cancel_subscription(&*model, &listener));
        assert!(!observer.cancel_subscription(&*model, &listener));

        model.notifier.notify_listeners();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer.subscription_count(), 0);
    }

    #[test]
    fn test_cancel_subscriptions_stops_notifications() {
        let model = Arc::new(Model::default());
        let mut observer = Observer::new();
        let (listener, calls) = counting_listener();

        observer.listen_to(Lookup::Direct(model.clone()), &listener).unwrap();
        observer.cancel_subscriptions();
        model.notifier.notify_listeners();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.notifier.listener_count(), 0);
    }

    #[test]
    fn test_listen_to_non_notifier_fails() {
        let mut observer = Observer::new();
        let (listener, _) = counting_listener();

        let result = observer.listen_to(Lookup::Direct(Arc::new(5i32)), &listener);
        assert!(matches!(result, Err(RegistryError::WrongCapability { .. })));
        assert_eq!(observer.subscription_count(), 0);
    }

    #[test]
    fn test_named_lookup_in_isolated_registry() {
        define_registry!(observer_named);

        observer_named::register_with(Registration::value(Model::default()).named("main")).unwrap();

        let mut observer = Observer::new().with_registry(observer_named::API);
        let (listener, calls) = counting_listener();

        let model = observer.listen_to::<Model>(Lookup::Named("main"), &listener).unwrap();
        model.notifier.notify_listeners();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let missing = observer.get::<Model>(Lookup::Global);
        assert!(matches!(missing, Err(RegistryError::NotRegistered { .. })));

        observer.cancel_subscriptions();
    }
}
