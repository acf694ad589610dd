//! Scoped lookups along a [`Scope`] chain.
//!
//! [`get`] resolves the nearest scoped binding without creating a dependency.
//! [`listen`] additionally registers a [`Dependent`] that is marked dirty
//! whenever the bound instance notifies a change.
//!
//! ```rust
//! use lifecycle_registry::{lookup, Dependent, Registrar, Registration, Scope};
//!
//! let root = Scope::root();
//! let mounted = Registrar::scoped(Registration::lazy(|| 42i32)).mount(&root).unwrap();
//!
//! let consumer = mounted.scope().child();
//! assert_eq!(*lookup::get::<i32>(&consumer).unwrap(), 42);
//!
//! // i32 cannot notify, so listening to it is rejected.
//! assert!(lookup::listen::<i32>(&consumer, &Dependent::new()).is_err());
//! ```

use std::sync::Arc;

use crate::{Dependent, Managed, RegistryError, Scope};

/// Returns the nearest scoped `T`, building it on first access.
///
/// # Errors
///
/// [`RegistryError::NotFound`] if no ancestor binds `T`.
pub fn get<T: Managed>(scope: &Scope) -> Result<Arc<T>, RegistryError> {
    let binding = scope.binding_of::<T>()?;
    tracing::trace!(type_name = binding.type_name(), scope = scope.id(), "scoped get");
    binding.instance_as::<T>()
}

/// Like [`get`], but returns `None` when no ancestor binds `T`.
#[must_use]
pub fn maybe_get<T: Managed>(scope: &Scope) -> Option<Arc<T>> {
    get::<T>(scope).ok()
}

/// Returns the nearest scoped `T` and registers `dependent` for refreshes.
///
/// # Errors
///
/// - [`RegistryError::NotFound`] if no ancestor binds `T`
/// - [`RegistryError::WrongCapability`] if the instance cannot notify changes
pub fn listen<T: Managed>(scope: &Scope, dependent: &Dependent) -> Result<Arc<T>, RegistryError> {
    let binding = scope.binding_of::<T>()?;
    let instance = binding.instance_as::<T>()?;
    if instance.as_notifier().is_none() {
        return Err(RegistryError::not_a_notifier(binding.type_name()));
    }
    binding.add_dependent(dependent);
    tracing::trace!(
        type_name = binding.type_name(),
        scope = scope.id(),
        dependent = dependent.id(),
        "scoped listen"
    );
    Ok(instance)
}
