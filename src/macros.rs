//! Macros for creating isolated registries.
//!
//! The process-wide [`GlobalRegistry`](crate::GlobalRegistry) covers most
//! applications. `define_registry!` creates additional registries with their
//! own table and trace callback, for example to keep test suites apart.

/// Creates a complete, isolated registry with a single macro invocation.
///
/// The macro generates a module containing:
/// - Storage static (hidden)
/// - Trace callback static (hidden)
/// - An `Api` struct that implements `RegistryApi`, usable as the target of
///   registrars and observers
/// - Free functions delegating to `Api`
///
/// # Examples
///
/// ```rust
/// use lifecycle_registry::define_registry;
/// use std::sync::Arc;
///
/// define_registry!(services);
///
/// services::register(42i32).unwrap();
/// services::register_lazy(|| "Hello".to_string()).unwrap();
///
/// let num: Arc<i32> = services::get().unwrap();
/// let msg: Arc<String> = services::get().unwrap();
///
/// assert_eq!(*num, 42);
/// assert_eq!(&**msg, "Hello");
/// ```
///
/// # Multiple Registries
///
/// ```rust
/// use lifecycle_registry::define_registry;
///
/// define_registry!(database);
/// define_registry!(cache);
///
/// // Each registry is completely isolated
/// database::register("db_connection".to_string()).unwrap();
/// cache::register("redis_connection".to_string()).unwrap();
///
/// assert!(database::get::<String>().is_ok());
/// assert!(cache::get::<String>().is_ok());
/// ```
///
/// # Trait-Based Usage
///
/// ```rust
/// use lifecycle_registry::{define_registry, Registrar, Registration, Scope};
///
/// define_registry!(app);
///
/// let mounted = Registrar::global(Registration::value(100i32))
///     .with_registry(app::API)
///     .mount(&Scope::root())
///     .unwrap();
/// assert_eq!(*app::get::<i32>().unwrap(), 100);
/// mounted.unmount().unwrap();
/// ```
#[macro_export]
macro_rules! define_registry {
    ($name:ident) => {
        pub mod $name {
            use std::sync::{Arc, LazyLock};

            // Storage for registered values (module-private)
            static STORAGE: $crate::registry_trait::Storage =
                LazyLock::new(|| $crate::__private::Mutex::new($crate::RegistryTable::new()));

            // Trace callback storage (module-private)
            static TRACE: $crate::registry_trait::TraceCallback =
                LazyLock::new(|| $crate::__private::Mutex::new(None));

            /// Zero-sized type that implements the registry API.
            ///
            /// All registry operations are provided by the `RegistryApi` trait's
            /// default implementations. This struct only provides access to the statics.
            #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
            pub struct Api;

            impl $crate::RegistryApi for Api {
                fn storage() -> &'static $crate::registry_trait::Storage {
                    &STORAGE
                }

                fn trace() -> &'static $crate::registry_trait::TraceCallback {
                    &TRACE
                }
            }

            /// Convenient constant for accessing the registry API.
            pub const API: Api = Api;

            // Free functions for ergonomic usage - they delegate to API

            /// Register an instance described by a registration.
            pub fn register_with<T: $crate::Managed>(
                registration: $crate::Registration<T>,
            ) -> Result<(), $crate::RegistryError> {
                use $crate::RegistryApi;
                API.register_with(registration)
            }

            /// Register a value in the registry.
            pub fn register<T: $crate::Managed>(value: T) -> Result<(), $crate::RegistryError> {
                use $crate::RegistryApi;
                API.register(value)
            }

            /// Register an Arc-wrapped value in the registry.
            pub fn register_arc<T: $crate::Managed>(
                value: Arc<T>,
            ) -> Result<(), $crate::RegistryError> {
                use $crate::RegistryApi;
                API.register_arc(value)
            }

            /// Register a value built on first access.
            pub fn register_lazy<T: $crate::Managed>(
                builder: impl FnOnce() -> T + Send + 'static,
            ) -> Result<(), $crate::RegistryError> {
                use $crate::RegistryApi;
                API.register_lazy(builder)
            }

            /// Remove a value from the registry.
            pub fn unregister<T: $crate::Managed>(
                name: Option<&str>,
                dispose: bool,
            ) -> Result<(), $crate::RegistryError> {
                use $crate::RegistryApi;
                API.unregister::<T>(name, dispose)
            }

            /// Retrieve a value from the registry.
            pub fn get<T: $crate::Managed>() -> Result<Arc<T>, $crate::RegistryError> {
                use $crate::RegistryApi;
                API.get()
            }

            /// Retrieve a named value from the registry.
            pub fn get_named<T: $crate::Managed>(
                name: &str,
            ) -> Result<Arc<T>, $crate::RegistryError> {
                use $crate::RegistryApi;
                API.get_named(name)
            }

            /// Retrieve a cloned value from the registry.
            pub fn get_cloned<T: $crate::Managed + Clone>() -> Result<T, $crate::RegistryError> {
                use $crate::RegistryApi;
                API.get_cloned()
            }

            /// Check if a key is registered in the registry.
            pub fn is_registered<T: $crate::Managed>(name: Option<&str>) -> bool {
                use $crate::RegistryApi;
                API.is_registered::<T>(name)
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::RegistryEvent) + Send + Sync + 'static,
            ) {
                use $crate::RegistryApi;
                API.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                use $crate::RegistryApi;
                API.clear_trace_callback()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::RegistryApi;
    use std::sync::Arc;

    #[test]
    fn test_define_registry_macro() {
        define_registry!(test_reg);

        test_reg::register(100i32).unwrap();
        let value: Arc<i32> = test_reg::get().unwrap();
        assert_eq!(*value, 100);

        assert!(test_reg::is_registered::<i32>(None));
        assert!(!test_reg::is_registered::<f64>(None));
    }

    #[test]
    fn test_multiple_registries() {
        define_registry!(reg_a);
        define_registry!(reg_b);

        reg_a::register(1i32).unwrap();
        reg_b::register(2i32).unwrap();

        let a_val: Arc<i32> = reg_a::get().unwrap();
        let b_val: Arc<i32> = reg_b::get().unwrap();

        assert_eq!(*a_val, 1);
        assert_eq!(*b_val, 2);
    }

    #[test]
    fn test_api_constant_is_a_registry() {
        define_registry!(api_reg);

        api_reg::API.register_lazy(|| 9u8).unwrap();
        assert_eq!(api_reg::API.len(), 1);
        assert_eq!(*api_reg::get::<u8>().unwrap(), 9);
    }

    #[test]
    fn test_tracing() {
        define_registry!(trace_test);

        use std::sync::Mutex;
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        trace_test::set_trace_callback(move |event| {
            events_clone.lock().unwrap().push(format!("{}", event));
        });

        trace_test::register(42i32).unwrap();
        let _: Arc<i32> = trace_test::get().unwrap();
        let _ = trace_test::is_registered::<i32>(None);

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        assert!(recorded[0].contains("register"));
        assert!(recorded[1].contains("get"));
        assert!(recorded[2].contains("contains"));
    }
}
