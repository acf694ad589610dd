//! The process-wide registry.
//!
//! [`GlobalRegistry`] is the default target of registrars and observers. Its
//! table starts empty at process start and only shrinks through per-key
//! unregistration. The free functions in this module delegate to it.
//!
//! # Examples
//!
//! ```
//! use lifecycle_registry::{get, is_registered, register_lazy, unregister};
//! use std::sync::Arc;
//!
//! register_lazy(|| "Hello, World!".to_string()).unwrap();
//! assert!(is_registered::<String>(None));
//!
//! let message: Arc<String> = get().unwrap();
//! assert_eq!(&*message, "Hello, World!");
//!
//! unregister::<String>(None, true).unwrap();
//! assert!(!is_registered::<String>(None));
//! ```

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::entry::RegistryTable;
use crate::registry_trait::{Storage, TraceCallback};
use crate::{Managed, Registration, RegistryApi, RegistryError, RegistryEvent};

/// Global registry table.
static GLOBAL_STORAGE: Storage = LazyLock::new(|| Mutex::new(RegistryTable::new()));

/// Holds an optional user-defined tracing callback for the global registry.
static GLOBAL_TRACE: TraceCallback = LazyLock::new(|| Mutex::new(None));

/// Handle to the process-wide registry.
///
/// Zero-sized; every handle refers to the same table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRegistry;

impl RegistryApi for GlobalRegistry {
    fn storage() -> &'static Storage {
        &GLOBAL_STORAGE
    }

    fn trace() -> &'static TraceCallback {
        &GLOBAL_TRACE
    }
}

/// Registers an instance described by `registration` in the global registry.
///
/// # Errors
///
/// See [`RegistryApi::register_with`].
pub fn register_with<T: Managed>(registration: Registration<T>) -> Result<(), RegistryError> {
    GlobalRegistry.register_with(registration)
}

/// Registers an already-built, unnamed value in the global registry.
///
/// # Errors
///
/// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
pub fn register<T: Managed>(value: T) -> Result<(), RegistryError> {
    GlobalRegistry.register(value)
}

/// Registers an `Arc<T>` in the global registry.
///
/// # Errors
///
/// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
pub fn register_arc<T: Managed>(value: Arc<T>) -> Result<(), RegistryError> {
    GlobalRegistry.register_arc(value)
}

/// Registers an unnamed value built on first access.
///
/// # Errors
///
/// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
pub fn register_lazy<T: Managed>(
    builder: impl FnOnce() -> T + Send + 'static,
) -> Result<(), RegistryError> {
    GlobalRegistry.register_lazy(builder)
}

/// Registers `instance` under its runtime type.
///
/// # Errors
///
/// [`RegistryError::AlreadyRegistered`] if the key is live.
pub fn register_dyn(instance: Arc<dyn Managed>, name: Option<&str>) -> Result<(), RegistryError> {
    GlobalRegistry.register_dyn(instance, name)
}

/// Removes the entry for `T` and `name`, disposing a built instance if asked.
///
/// # Errors
///
/// [`RegistryError::NotRegistered`] if the key is not live.
pub fn unregister<T: Managed>(name: Option<&str>, dispose: bool) -> Result<(), RegistryError> {
    GlobalRegistry.unregister::<T>(name, dispose)
}

/// Removes the entry keyed by the runtime type of `instance`.
///
/// # Errors
///
/// [`RegistryError::NotRegistered`] if the key is not live.
pub fn unregister_dyn(
    instance: &dyn Managed,
    name: Option<&str>,
    dispose: bool,
) -> Result<(), RegistryError> {
    GlobalRegistry.unregister_dyn(instance, name, dispose)
}

/// Retrieves the unnamed `T`, building it on first access.
///
/// # Errors
///
/// [`RegistryError::NotRegistered`] if no unnamed `T` is registered.
pub fn get<T: Managed>() -> Result<Arc<T>, RegistryError> {
    GlobalRegistry.get::<T>()
}

/// Retrieves the `T` registered under `name`.
///
/// # Errors
///
/// [`RegistryError::NotRegistered`] if no such `T` is registered.
pub fn get_named<T: Managed>(name: &str) -> Result<Arc<T>, RegistryError> {
    GlobalRegistry.get_named::<T>(name)
}

/// Retrieves a clone of the unnamed `T`.
///
/// # Errors
///
/// [`RegistryError::NotRegistered`] if no unnamed `T` is registered.
pub fn get_cloned<T: Managed + Clone>() -> Result<T, RegistryError> {
    GlobalRegistry.get_cloned::<T>()
}

/// Returns `true` if `T` is registered under an optional name. Never builds.
pub fn is_registered<T: Managed>(name: Option<&str>) -> bool {
    GlobalRegistry.is_registered::<T>(name)
}

/// Returns `true` if the runtime type of `instance` is registered.
pub fn is_registered_dyn(instance: &dyn Managed, name: Option<&str>) -> bool {
    GlobalRegistry.is_registered_dyn(instance, name)
}

/// Sets a tracing callback that will be invoked on every global registry interaction.
///
/// # Example
/// ```rust
/// use lifecycle_registry::{set_trace_callback, RegistryEvent};
///
/// set_trace_callback(|event| println!("[registry-trace] {}", event));
/// ```
pub fn set_trace_callback(callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
    GlobalRegistry.set_trace_callback(callback);
}

/// Clears the tracing callback (disables registry tracing).
pub fn clear_trace_callback() {
    GlobalRegistry.clear_trace_callback();
}

#[doc(hidden)]
pub fn clear() {
    GlobalRegistry.clear();
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
