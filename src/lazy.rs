//! Build-once, memoized instance holder.
//!
//! A [`LazyInitializer`] is created either from a builder (lazy) or from an
//! already-built instance. The builder runs on the first [`instance`] call,
//! the result is memoized, and the optional post-init hook fires exactly once
//! with the freshly built value. Pre-built instances never fire the hook.
//!
//! [`instance`]: LazyInitializer::instance

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::RegistryError;

/// Zero-argument factory producing a shared instance.
pub type Builder<T> = Box<dyn FnOnce() -> Arc<T> + Send>;

/// Hook invoked with an instance right after its first build.
pub type InitHook<T> = Box<dyn FnOnce(&Arc<T>) + Send>;

struct LazyState<T: ?Sized> {
    builder: Option<Builder<T>>,
    instance: Option<Arc<T>>,
    on_init: Option<InitHook<T>>,
}

/// Holds a builder or an instance and produces the instance on first access.
pub struct LazyInitializer<T: ?Sized> {
    type_name: &'static str,
    state: Mutex<LazyState<T>>,
}

impl<T: ?Sized> LazyInitializer<T> {
    /// Creates an initializer from exactly one of `builder` or `instance`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidConstruction`] if both or neither are supplied.
    pub fn try_new(
        builder: Option<Builder<T>>,
        instance: Option<Arc<T>>,
    ) -> Result<Self, RegistryError> {
        let type_name = std::any::type_name::<T>();
        match (builder, instance) {
            (Some(_), Some(_)) => Err(RegistryError::both_sources(type_name)),
            (None, None) => Err(RegistryError::no_source(type_name)),
            (builder, instance) => Ok(Self {
                type_name,
                state: Mutex::new(LazyState {
                    builder,
                    instance,
                    on_init: None,
                }),
            }),
        }
    }

    /// Creates a lazy initializer around a boxed builder.
    pub fn from_builder(builder: Builder<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            state: Mutex::new(LazyState {
                builder: Some(builder),
                instance: None,
                on_init: None,
            }),
        }
    }

    /// Creates an already-initialized holder around `instance`.
    pub fn from_instance(instance: Arc<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            state: Mutex::new(LazyState {
                builder: None,
                instance: Some(instance),
                on_init: None,
            }),
        }
    }

    /// Overrides the type name reported in diagnostics.
    #[must_use]
    pub fn with_type_name(mut self, type_name: &'static str) -> Self {
        self.type_name = type_name;
        self
    }

    /// Sets the hook fired after the first build.
    ///
    /// Has no effect on initializers created from an instance, or once the
    /// instance has been built.
    #[must_use]
    pub fn on_init(self, hook: impl FnOnce(&Arc<T>) + Send + 'static) -> Self {
        {
            let mut state = self.state.lock();
            if state.instance.is_none() {
                state.on_init = Some(Box::new(hook));
            }
        }
        self
    }

    /// Returns the instance, building it on the first call.
    ///
    /// The build runs under the initializer's lock, so concurrent callers
    /// wait and observe the same value. A builder must not resolve the
    /// initializer it belongs to.
    pub fn instance(&self) -> Arc<T> {
        let (instance, hook) = {
            let mut state = self.state.lock();
            if let Some(instance) = &state.instance {
                return instance.clone();
            }
            let instance = match state.builder.take() {
                Some(builder) => builder(),
                None => unreachable!("lazy initializer for {} has no source", self.type_name),
            };
            tracing::debug!(type_name = self.type_name, "lazily built instance");
            state.instance = Some(instance.clone());
            (instance, state.on_init.take())
        };

        if let Some(hook) = hook {
            hook(&instance);
        }
        instance
    }

    /// Returns the instance only if it has already been built.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.state.lock().instance.clone()
    }

    /// Returns `true` once an instance exists.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().instance.is_some()
    }

    /// Diagnostic type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl<T: ?Sized> fmt::Debug for LazyInitializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyInitializer")
            .field("type_name", &self.type_name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
