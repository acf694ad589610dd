//! Tree-bound registration.
//!
//! A [`Registrar`] is the configuration of a tree node that owns one
//! instance. Mounting it under a parent [`Scope`] creates the node's own scope
//! and either registers the instance in a registry (global mode) or attaches a
//! [`ScopedBinding`] to the node (scoped mode). The returned
//! [`MountedRegistrar`] holds the unregister obligation: [`unmount`] releases
//! the instance, and dropping it without unmounting does the same.
//!
//! Registration completes before `mount` returns the node scope, so nothing
//! below the node can observe it unregistered. The host unmounts only after
//! detaching the subtree.
//!
//! [`unmount`]: MountedRegistrar::unmount
//!
//! # Example
//!
//! ```rust
//! use lifecycle_registry::{is_registered, Registrar, Registration, Scope};
//!
//! #[derive(Debug)]
//! struct Session { user: String }
//! impl lifecycle_registry::Managed for Session {}
//!
//! let root = Scope::root();
//! let node = Registrar::global(Registration::lazy(|| Session { user: "ada".into() }))
//!     .mount(&root)
//!     .unwrap();
//!
//! assert!(is_registered::<Session>(None));
//! assert_eq!(node.get().unwrap().user, "ada");
//!
//! node.unmount().unwrap();
//! assert!(!is_registered::<Session>(None));
//! ```

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entry::RegistryKey;
use crate::scope::ScopedBinding;
use crate::{GlobalRegistry, Managed, Registration, RegistryApi, RegistryError, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Global,
    Scoped,
}

/// Configuration of a node that owns one instance of `T`.
pub struct Registrar<T: Managed, R: RegistryApi = GlobalRegistry> {
    registration: Registration<T>,
    mode: Mode,
    registry: R,
}

impl<T: Managed> Registrar<T> {
    /// A node exposing its instance through the global registry.
    #[must_use]
    pub fn global(registration: Registration<T>) -> Self {
        Self {
            registration,
            mode: Mode::Global,
            registry: GlobalRegistry,
        }
    }

    /// A node exposing its instance to its subtree only.
    ///
    /// Scoped lookups have no name axis; a name on the registration is ignored.
    #[must_use]
    pub fn scoped(registration: Registration<T>) -> Self {
        Self {
            registration,
            mode: Mode::Scoped,
            registry: GlobalRegistry,
        }
    }
}

impl<T: Managed, R: RegistryApi> Registrar<T, R> {
    /// Targets `registry` instead of the global registry in global mode.
    #[must_use]
    pub fn with_registry<R2: RegistryApi>(self, registry: R2) -> Registrar<T, R2> {
        Registrar {
            registration: self.registration,
            mode: self.mode,
            registry,
        }
    }

    /// Returns `true` for scoped mode.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.mode == Mode::Scoped
    }

    /// Mounts the node below `parent`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidConstruction`] for a registration with both
    ///   or neither of builder and instance
    /// - [`RegistryError::AlreadyRegistered`] in global mode if the key is live
    pub fn mount(self, parent: &Scope) -> Result<MountedRegistrar<T, R>, RegistryError> {
        let dispose = self.registration.disposes();
        let scope = parent.child();

        let (key, binding) = match self.mode {
            Mode::Global => {
                let key = self.registration.key();
                self.registry.register_with(self.registration)?;
                (key, None)
            }
            Mode::Scoped => {
                let (_, initializer) = self.registration.into_initializer()?;
                let binding = ScopedBinding::new::<T>(initializer);
                scope.attach(binding.clone());
                (RegistryKey::of::<T>(None), Some(binding))
            }
        };

        tracing::debug!(
            %key,
            scoped = binding.is_some(),
            scope = scope.id(),
            "registrar mounted"
        );

        Ok(MountedRegistrar {
            scope,
            key,
            dispose,
            registry: self.registry,
            binding,
            released: false,
            _marker: PhantomData,
        })
    }
}

impl<T: Managed, R: RegistryApi> fmt::Debug for Registrar<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("registration", &self.registration)
            .field("mode", &self.mode)
            .finish()
    }
}

/// A mounted [`Registrar`]: the live node holding the unregister obligation.
pub struct MountedRegistrar<T: Managed, R: RegistryApi = GlobalRegistry> {
    scope: Scope,
    key: RegistryKey,
    dispose: bool,
    registry: R,
    binding: Option<Arc<ScopedBinding>>,
    released: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Managed, R: RegistryApi> MountedRegistrar<T, R> {
    /// The node's own scope; children of the node are created below it.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The registry key (unnamed for scoped nodes).
    #[must_use]
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    /// Returns `true` for scoped mode.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.binding.is_some()
    }

    /// The scoped binding, in scoped mode.
    #[must_use]
    pub fn binding(&self) -> Option<&Arc<ScopedBinding>> {
        self.binding.as_ref()
    }

    /// Returns the owned instance, building it on first access.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] in global mode if the entry was
    /// removed behind the node's back.
    pub fn get(&self) -> Result<Arc<T>, RegistryError> {
        match &self.binding {
            Some(binding) => binding.instance_as::<T>(),
            None => self.registry.get_keyed::<T>(self.key.name()),
        }
    }

    /// Marks the scoped binding's dependents for refresh after the node
    /// itself was updated. No-op in global mode.
    pub fn notify_dependents(&self) {
        if let Some(binding) = &self.binding {
            binding.mark_needs_notify();
        }
    }

    /// Unmounts the node, releasing its instance.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] in global mode if the entry was
    /// already removed by someone else.
    pub fn unmount(mut self) -> Result<(), RegistryError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), RegistryError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        tracing::debug!(key = %self.key, scope = self.scope.id(), "registrar unmounting");
        match self.binding.take() {
            Some(binding) => {
                self.scope.detach(TypeId::of::<T>());
                binding.release(self.dispose);
                Ok(())
            }
            None => self.registry.unregister_key(&self.key, self.dispose),
        }
    }
}

impl<T: Managed, R: RegistryApi> Drop for MountedRegistrar<T, R> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::warn!(key = %self.key, %error, "failed to release registrar on drop");
        }
    }
}

impl<T: Managed, R: RegistryApi> fmt::Debug for MountedRegistrar<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedRegistrar")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("scoped", &self.is_scoped())
            .field("dispose", &self.dispose)
            .finish()
    }
}
