//! Several registrations owned by one tree node.
//!
//! A [`MultiRegistrar`] holds an ordered list of [`Registration`]s of any
//! types. Mounting registers them in list order and either all of them stay
//! registered or none do. Unmounting unregisters them in reverse order, so a
//! later delegate that depends on an earlier one is torn down first.

use std::fmt;

use crate::entry::RegistryKey;
use crate::{GlobalRegistry, Managed, Registration, RegistryApi, RegistryError, Scope};

type RegisterFn<R> = Box<dyn FnOnce(&R) -> Result<(), RegistryError> + Send>;

struct Delegate<R> {
    key: RegistryKey,
    dispose: bool,
    register: RegisterFn<R>,
}

/// Configuration of a node that owns several instances.
pub struct MultiRegistrar<R: RegistryApi = GlobalRegistry> {
    delegates: Vec<Delegate<R>>,
    registry: R,
}

impl MultiRegistrar {
    /// An empty list targeting the global registry.
    #[must_use]
    pub fn new() -> Self {
        Self::in_registry(GlobalRegistry)
    }
}

impl Default for MultiRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegistryApi + 'static> MultiRegistrar<R> {
    /// An empty list targeting `registry`.
    #[must_use]
    pub fn in_registry(registry: R) -> Self {
        Self {
            delegates: Vec::new(),
            registry,
        }
    }

    /// Appends a delegate.
    #[must_use]
    pub fn with<T: Managed>(mut self, registration: Registration<T>) -> Self {
        self.push(registration);
        self
    }

    /// Appends a delegate in place.
    pub fn push<T: Managed>(&mut self, registration: Registration<T>) {
        self.delegates.push(Delegate {
            key: registration.key(),
            dispose: registration.disposes(),
            register: Box::new(move |registry: &R| registry.register_with(registration)),
        });
    }

    /// Number of delegates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    /// Returns `true` if no delegates were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    /// Registers every delegate in order and mounts the node below `parent`.
    ///
    /// # Errors
    ///
    /// The first delegate error. Delegates registered before it are
    /// unregistered again before returning.
    pub fn mount(self, parent: &Scope) -> Result<MountedMultiRegistrar<R>, RegistryError> {
        let mut registered: Vec<(RegistryKey, bool)> = Vec::with_capacity(self.delegates.len());

        for delegate in self.delegates {
            if let Err(error) = (delegate.register)(&self.registry) {
                tracing::debug!(
                    key = %delegate.key,
                    %error,
                    rolled_back = registered.len(),
                    "multi registrar mount failed"
                );
                for (key, dispose) in registered.iter().rev() {
                    if let Err(rollback_error) = self.registry.unregister_key(key, *dispose) {
                        tracing::warn!(%key, error = %rollback_error, "rollback failed");
                    }
                }
                return Err(error);
            }
            registered.push((delegate.key, delegate.dispose));
        }

        let scope = parent.child();
        tracing::debug!(delegates = registered.len(), scope = scope.id(), "multi registrar mounted");

        Ok(MountedMultiRegistrar {
            scope,
            registered,
            registry: self.registry,
            released: false,
        })
    }
}

impl<R: RegistryApi> fmt::Debug for MultiRegistrar<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.delegates.iter().map(|d| &d.key))
            .finish()
    }
}

/// A mounted [`MultiRegistrar`].
pub struct MountedMultiRegistrar<R: RegistryApi = GlobalRegistry> {
    scope: Scope,
    registered: Vec<(RegistryKey, bool)>,
    registry: R,
    released: bool,
}

impl<R: RegistryApi> MountedMultiRegistrar<R> {
    /// The node's own scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Keys of the registered delegates, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &RegistryKey> {
        self.registered.iter().map(|(key, _)| key)
    }

    /// Unregisters every delegate in reverse order.
    ///
    /// # Errors
    ///
    /// The first unregister error. Remaining delegates are still unregistered.
    pub fn unmount(mut self) -> Result<(), RegistryError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), RegistryError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut first_error = None;
        for (key, dispose) in self.registered.iter().rev() {
            if let Err(error) = self.registry.unregister_key(key, *dispose) {
                tracing::debug!(%key, %error, "multi registrar delegate failed to unregister");
                first_error.get_or_insert(error);
            }
        }
        tracing::debug!(delegates = self.registered.len(), scope = self.scope.id(), "multi registrar unmounted");

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<R: RegistryApi> Drop for MountedMultiRegistrar<R> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::warn!(%error, "failed to release multi registrar on drop");
        }
    }
}

impl<R: RegistryApi> fmt::Debug for MountedMultiRegistrar<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedMultiRegistrar")
            .field("scope", &self.scope)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
