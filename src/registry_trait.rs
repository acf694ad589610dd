//! Core trait defining registry behavior.
//!
//! This module provides the `RegistryApi` trait with default implementations for
//! keyed registration, lazy retrieval, disposal, and tracing of instances.
//!
//! The registry is keyed by type (`TypeId`) plus an optional name. Each key can
//! hold at most one live entry: registering a live key fails with
//! [`RegistryError::AlreadyRegistered`] and leaves the table unchanged.

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::entry::{RegistryEntry, RegistryKey, RegistryTable};
use crate::lazy::LazyInitializer;
use crate::{Managed, Registration, RegistryError, RegistryEvent};

/// Type alias for the storage static. `define_registry!` declares its
/// statics with it.
pub type Storage = LazyLock<Mutex<RegistryTable>>;

/// Type alias for the trace callback storage.
pub type TraceCallback = LazyLock<Mutex<Option<Arc<dyn Fn(&RegistryEvent) + Send + Sync>>>>;

/// Core trait defining registry behavior.
///
/// Provides default implementations for all registry operations, requiring only
/// two accessor methods (`storage` and `trace`) to be implemented by the implementor.
///
/// Retrieval is where lazy entries get built. The table lock is released
/// before any builder, disposal routine, or trace callback runs, so those may
/// use the registry themselves.
pub trait RegistryApi {
    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Access the trace callback static.
    ///
    /// This method must be implemented to provide access to the registry's trace callback.
    fn trace() -> &'static TraceCallback;

    /// Set a tracing callback for registry operations.
    ///
    /// The callback will be invoked for every registry operation (register,
    /// unregister, get, contains, clear).
    fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        *Self::trace().lock() = Some(Arc::new(callback));
    }

    /// Clear the tracing callback.
    ///
    /// After calling this, no tracing events will be emitted.
    /// Note: This does not affect registered values, only the tracing callback.
    fn clear_trace_callback(&self) {
        *Self::trace().lock() = None;
    }

    /// Convenience wrapper to emit a registry event using the current callback.
    ///
    /// The callback runs after the trace lock is released, so it may replace
    /// or clear itself.
    fn emit_event(&self, event: &RegistryEvent) {
        let callback = Self::trace().lock().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------------------------------------

    /// Access the storage static.
    ///
    /// This method must be implemented to provide access to the registry's storage.
    fn storage() -> &'static Storage;

    /// Register an instance described by `registration`.
    ///
    /// A lazy registration is not built until the first `get`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidConstruction`] if the registration has both
    ///   or neither of builder and instance
    /// - [`RegistryError::AlreadyRegistered`] if the key is live
    fn register_with<T: Managed>(&self, registration: Registration<T>) -> Result<(), RegistryError> {
        let lazy = registration.is_lazy();
        let (key, initializer) = registration.into_initializer()?;
        insert_entry(self, RegistryEntry::new(key, initializer), lazy)
    }

    /// Register an already-built, unnamed value.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
    fn register<T: Managed>(&self, value: T) -> Result<(), RegistryError> {
        self.register_with(Registration::value(value))
    }

    /// Register an Arc-wrapped, unnamed value.
    ///
    /// More efficient than `register` when you already have an `Arc`,
    /// as it avoids creating an additional allocation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
    fn register_arc<T: Managed>(&self, value: Arc<T>) -> Result<(), RegistryError> {
        self.register_with(Registration::arc(value))
    }

    /// Register an unnamed value built on first access.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if a `T` is already registered.
    fn register_lazy<T: Managed>(
        &self,
        builder: impl FnOnce() -> T + Send + 'static,
    ) -> Result<(), RegistryError> {
        self.register_with(Registration::lazy(builder))
    }

    /// Register `instance` under its concrete runtime type.
    ///
    /// Useful when the caller only holds a trait object: the entry is keyed
    /// by the value's actual type, so `get::<Concrete>()` finds it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if the key is live.
    fn register_dyn(&self, instance: Arc<dyn Managed>, name: Option<&str>) -> Result<(), RegistryError> {
        let key = RegistryKey::of_instance(&*instance, name);
        let initializer = LazyInitializer::from_instance(instance).with_type_name(key.type_name());
        insert_entry(self, RegistryEntry::new(key, initializer), false)
    }

    /// Remove the entry for `T` and `name`.
    ///
    /// With `dispose`, a built instance that is [`Disposable`](crate::Disposable)
    /// is disposed. An entry that was never built is not built for this.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if the key is not live.
    fn unregister<T: Managed>(&self, name: Option<&str>, dispose: bool) -> Result<(), RegistryError> {
        self.unregister_key(&RegistryKey::of::<T>(name), dispose)
    }

    /// Remove the entry keyed by the runtime type of `instance`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if the key is not live.
    fn unregister_dyn(
        &self,
        instance: &dyn Managed,
        name: Option<&str>,
        dispose: bool,
    ) -> Result<(), RegistryError> {
        self.unregister_key(&RegistryKey::of_instance(instance, name), dispose)
    }

    /// Remove the entry for `key`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if the key is not live.
    fn unregister_key(&self, key: &RegistryKey, dispose: bool) -> Result<(), RegistryError> {
        let entry = Self::storage().lock().remove(key)?;

        let disposed = dispose && entry.dispose();
        tracing::debug!(%key, disposed, "unregistered");

        self.emit_event(&RegistryEvent::Unregister {
            type_name: key.type_name(),
            name: key.name().map(str::to_owned),
            disposed,
        });

        Ok(())
    }

    /// Retrieve the unnamed `T`, building it on first access.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotRegistered`] if no unnamed `T` is registered
    /// - [`RegistryError::TypeMismatch`] (extremely rare)
    fn get<T: Managed>(&self) -> Result<Arc<T>, RegistryError> {
        self.get_keyed::<T>(None)
    }

    /// Retrieve the `T` registered under `name`, building it on first access.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotRegistered`] if no such `T` is registered
    /// - [`RegistryError::TypeMismatch`] (extremely rare)
    fn get_named<T: Managed>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.get_keyed::<T>(Some(name))
    }

    /// Retrieve the `T` registered under an optional name.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotRegistered`] if the key is not live
    /// - [`RegistryError::TypeMismatch`] (extremely rare)
    fn get_keyed<T: Managed>(&self, name: Option<&str>) -> Result<Arc<T>, RegistryError> {
        let key = RegistryKey::of::<T>(name);
        let entry = Self::storage().lock().get(&key);

        let result = match entry {
            Some(entry) => entry.instance_as::<T>(),
            None => Err(RegistryError::NotRegistered { key: key.clone() }),
        };

        tracing::trace!(%key, found = result.is_ok(), "get");
        self.emit_event(&RegistryEvent::Get {
            type_name: key.type_name(),
            name: key.name().map(str::to_owned),
            found: result.is_ok(),
        });

        result
    }

    /// Retrieve a cloned value from the registry.
    ///
    /// Returns an owned value by cloning the value stored in the registry.
    /// The type `T` must implement `Clone`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    fn get_cloned<T: Managed + Clone>(&self) -> Result<T, RegistryError> {
        let arc = self.get::<T>()?;
        Ok((*arc).clone())
    }

    /// Check if an unnamed `T` is registered. Never builds.
    fn contains<T: Managed>(&self) -> bool {
        self.is_registered::<T>(None)
    }

    /// Check if `T` is registered under an optional name. Never builds.
    fn is_registered<T: Managed>(&self, name: Option<&str>) -> bool {
        self.is_registered_key(&RegistryKey::of::<T>(name))
    }

    /// Check if the runtime type of `instance` is registered under an optional name.
    fn is_registered_dyn(&self, instance: &dyn Managed, name: Option<&str>) -> bool {
        self.is_registered_key(&RegistryKey::of_instance(instance, name))
    }

    /// Check if `key` is live. Never builds.
    fn is_registered_key(&self, key: &RegistryKey) -> bool {
        let found = Self::storage().lock().contains(key);

        self.emit_event(&RegistryEvent::Contains {
            type_name: key.type_name(),
            name: key.name().map(str::to_owned),
            found,
        });

        found
    }

    /// Number of live entries.
    fn len(&self) -> usize {
        Self::storage().lock().len()
    }

    /// Returns `true` if no entry is live.
    fn is_empty(&self) -> bool {
        Self::storage().lock().is_empty()
    }

    /// Clear all registered values from the registry.
    ///
    /// This method is primarily intended for testing. It removes all entries
    /// without disposing them and does NOT affect:
    /// - Already-retrieved `Arc<T>` references (they remain valid)
    /// - The tracing callback (use `clear_trace_callback()` to clear that)
    #[doc(hidden)]
    fn clear(&self) {
        self.emit_event(&RegistryEvent::Clear {});
        Self::storage().lock().clear();
    }
}

fn insert_entry<R: RegistryApi + ?Sized>(
    registry: &R,
    entry: RegistryEntry,
    lazy: bool,
) -> Result<(), RegistryError> {
    let key = entry.key().clone();
    R::storage().lock().insert(entry)?;

    tracing::debug!(%key, lazy, "registered");
    registry.emit_event(&RegistryEvent::Register {
        type_name: key.type_name(),
        name: key.name().map(str::to_owned),
        lazy,
    });

    Ok(())
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::{Disposable, Managed, Notifier, Registration, RegistryError};

    use super::{RegistryApi, RegistryTable, Storage, TraceCallback};

    use parking_lot::Mutex;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, LazyLock};

    static STORAGE: Storage = LazyLock::new(|| Mutex::new(RegistryTable::new()));

    static TRACE: TraceCallback = LazyLock::new(|| Mutex::new(None));

    struct Api;

    impl RegistryApi for Api {
        fn storage() -> &'static Storage {
            &STORAGE
        }

        fn trace() -> &'static TraceCallback {
            &TRACE
        }
    }

    const API: Api = Api;

    #[derive(Default)]
    struct Resource {
        notifier: Notifier,
    }

    impl Managed for Resource {
        fn as_disposable(&self) -> Option<&dyn Disposable> {
            Some(&self.notifier)
        }
    }

    #[test]
    #[serial]
    fn test_register_and_get_primitive() -> Result<(), RegistryError> {
        // Clear any previous state
        API.clear();

        API.register(42i32)?;

        // Retrieve it 1
        let num: Arc<i32> = API.get()?;
        assert_eq!(*num, 42);

        // Retrieve it 2
        let num_2 = API.get::<i32>()?;
        assert_eq!(*num_2, 42);

        Ok(())
    }

    #[test]
    #[serial]
    fn test_get_nonexistent() {
        API.clear();

        let result: Result<Arc<String>, RegistryError> = API.get();
        assert_eq!(
            result.unwrap_err().to_string(),
            "not registered: alloc::string::String"
        );
    }

    #[test]
    #[serial]
    fn test_duplicate_register_leaves_table_unchanged() {
        API.clear();

        API.register(10i32).unwrap();
        let result = API.register(20i32);

        assert!(matches!(
            result,
            Err(RegistryError::AlreadyRegistered { .. })
        ));
        assert_eq!(*API.get::<i32>().unwrap(), 10);
        assert_eq!(API.len(), 1);
    }

    #[test]
    #[serial]
    fn test_lazy_entry_builds_on_first_get() {
        API.clear();
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_clone = builds.clone();

        API.register_lazy(move || {
            builds_clone.fetch_add(1, Ordering::SeqCst);
            "built".to_string()
        })
        .unwrap();

        assert!(API.contains::<String>());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        assert_eq!(&*API.get::<String>().unwrap(), "built");
        assert_eq!(&*API.get::<String>().unwrap(), "built");
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[serial]
    fn test_builder_may_resolve_other_keys() {
        API.clear();

        API.register(2u32).unwrap();
        API.register_lazy(|| {
            let base = API.get::<u32>().unwrap();
            u64::from(*base) * 21
        })
        .unwrap();

        assert_eq!(*API.get::<u64>().unwrap(), 42);
    }

    #[test]
    #[serial]
    fn test_unregister_disposes_built_instance() {
        API.clear();

        API.register(Resource::default()).unwrap();
        let resource = API.get::<Resource>().unwrap();

        API.unregister::<Resource>(None, true).unwrap();
        assert!(resource.notifier.is_disposed());
        assert!(!API.contains::<Resource>());
    }

    #[test]
    #[serial]
    fn test_unregister_without_dispose() {
        API.clear();

        API.register(Resource::default()).unwrap();
        let resource = API.get::<Resource>().unwrap();

        API.unregister::<Resource>(None, false).unwrap();
        assert!(!resource.notifier.is_disposed());
    }

    #[test]
    #[serial]
    fn test_unregister_missing_key() {
        API.clear();

        let result = API.unregister::<Resource>(Some("ghost"), true);
        assert!(matches!(result, Err(RegistryError::NotRegistered { .. })));
    }

    #[test]
    #[serial]
    fn test_named_entries_are_independent() {
        API.clear();

        API.register_with(Registration::value(1i64).named("a")).unwrap();
        API.register_with(Registration::value(2i64).named("b")).unwrap();

        assert!(!API.contains::<i64>());
        assert_eq!(*API.get_named::<i64>("a").unwrap(), 1);
        assert_eq!(*API.get_named::<i64>("b").unwrap(), 2);

        API.unregister::<i64>(Some("a"), true).unwrap();
        assert!(!API.is_registered::<i64>(Some("a")));
        assert!(API.is_registered::<i64>(Some("b")));
    }

    #[test]
    #[serial]
    fn test_register_dyn_uses_runtime_type() {
        API.clear();

        let instance: Arc<dyn Managed> = Arc::new(7u16);
        API.register_dyn(instance.clone(), None).unwrap();

        assert!(API.contains::<u16>());
        assert!(API.is_registered_dyn(&*instance, None));
        assert_eq!(*API.get::<u16>().unwrap(), 7);

        API.unregister_dyn(&*instance, None, true).unwrap();
        assert!(!API.contains::<u16>());
    }

    #[test]
    #[serial]
    fn test_get_cloned() {
        API.clear();
        API.register("hello".to_string()).unwrap();
        let value: String = API.get_cloned::<String>().unwrap();
        assert_eq!(value, "hello");
    }

    #[test]
    #[serial]
    fn test_trace_callback_events() {
        API.clear();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        API.set_trace_callback(move |e| {
            events_clone.lock().push(e.to_string());
        });

        API.register(5u8).unwrap();
        let _ = API.get::<u8>();
        let _ = API.contains::<u8>();
        API.unregister::<u8>(None, false).unwrap();

        API.clear_trace_callback();

        let captured = events.lock();
        assert_eq!(
            *captured,
            vec![
                "register { type_name: u8, lazy: false }",
                "get { type_name: u8, found: true }",
                "contains { type_name: u8, found: true }",
                "unregister { type_name: u8, disposed: false }",
            ]
        );
    }

    #[test]
    #[serial]
    fn test_clear_trace_callback_stops_events() {
        API.clear();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        API.set_trace_callback(move |e| {
            events_clone.lock().push(e.to_string());
        });
        API.register(10u16).unwrap();
        API.clear_trace_callback();

        // These should NOT be traced
        let _ = API.get::<u16>();
        let _ = API.contains::<u16>();

        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    #[serial]
    fn test_register_arc_directly() {
        API.clear();
        let value = Arc::new(42i32);
        let clone = value.clone();
        API.register_arc(value).unwrap();

        let retrieved: Arc<i32> = API.get().unwrap();
        assert_eq!(*retrieved, 42);
        assert_eq!(Arc::strong_count(&clone), 3); // clone + registry + retrieved
    }
}
