//! Configuration for one registry slot.
//!
//! A [`Registration`] names the slot and says where its instance comes from:
//! a builder (preferred, enables lazy construction) or a ready-made value.
//! It also carries the dispose flag applied when the owner unregisters it.
//!
//! ```rust
//! use lifecycle_registry::Registration;
//!
//! let registration = Registration::lazy(|| 42i32).named("answer").dispose(false);
//! assert_eq!(registration.name(), Some("answer"));
//! assert!(!registration.disposes());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::entry::RegistryKey;
use crate::lazy::{Builder, LazyInitializer};
use crate::{Managed, RegistryError};

/// Describes how to register a `T`.
pub struct Registration<T: Managed> {
    name: Option<String>,
    builder: Option<Box<dyn FnOnce() -> T + Send>>,
    instance: Option<Arc<T>>,
    dispose: bool,
}

impl<T: Managed> Registration<T> {
    /// Creates a registration with no source yet.
    ///
    /// Registering it fails with [`RegistryError::InvalidConstruction`] unless
    /// exactly one of [`with_builder`](Self::with_builder) or
    /// [`with_arc`](Self::with_arc) is applied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            builder: None,
            instance: None,
            dispose: true,
        }
    }

    /// Registration whose instance is built on first access.
    #[must_use]
    pub fn lazy(builder: impl FnOnce() -> T + Send + 'static) -> Self {
        Self::new().with_builder(builder)
    }

    /// Registration around an already-built value.
    #[must_use]
    pub fn value(value: T) -> Self {
        Self::new().with_arc(Arc::new(value))
    }

    /// Registration around an already-shared value.
    #[must_use]
    pub fn arc(instance: Arc<T>) -> Self {
        Self::new().with_arc(instance)
    }

    /// Sets the builder.
    #[must_use]
    pub fn with_builder(mut self, builder: impl FnOnce() -> T + Send + 'static) -> Self {
        self.builder = Some(Box::new(builder));
        self
    }

    /// Sets the pre-built instance.
    #[must_use]
    pub fn with_arc(mut self, instance: Arc<T>) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Sets the instance name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the optional instance name.
    #[must_use]
    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_owned);
        self
    }

    /// Sets whether the owner disposes the instance on unregistration.
    /// Defaults to `true`.
    #[must_use]
    pub fn dispose(mut self, dispose: bool) -> Self {
        self.dispose = dispose;
        self
    }

    /// The instance name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the owner disposes the instance on unregistration.
    #[must_use]
    pub fn disposes(&self) -> bool {
        self.dispose
    }

    /// Returns `true` if the instance will be built on first access.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.builder.is_some() && self.instance.is_none()
    }

    /// The slot this registration targets.
    #[must_use]
    pub fn key(&self) -> RegistryKey {
        RegistryKey::of::<T>(self.name())
    }

    /// Validates the source and converts it into a type-erased initializer.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidConstruction`] if both or neither of builder
    /// and instance were supplied.
    pub(crate) fn into_initializer(
        self,
    ) -> Result<(RegistryKey, LazyInitializer<dyn Managed>), RegistryError> {
        let key = self.key();
        let initializer = match (self.builder, self.instance) {
            (Some(_), Some(_)) => return Err(RegistryError::both_sources(key.type_name())),
            (None, None) => return Err(RegistryError::no_source(key.type_name())),
            (Some(build), None) => {
                let builder: Builder<dyn Managed> =
                    Box::new(move || Arc::new(build()) as Arc<dyn Managed>);
                LazyInitializer::from_builder(builder)
            }
            (None, Some(instance)) => LazyInitializer::from_instance(instance as Arc<dyn Managed>),
        };
        Ok((key, initializer.with_type_name(std::any::type_name::<T>())))
    }
}

impl<T: Managed> Default for Registration<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Managed> fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("type_name", &std::any::type_name::<T>())
            .field("name", &self.name)
            .field("has_builder", &self.builder.is_some())
            .field("has_instance", &self.instance.is_some())
            .field("dispose", &self.dispose)
            .finish()
    }
}
