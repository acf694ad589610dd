//! # Lifecycle Registry
//!
//! A lazy, lifecycle-bound object registry for tree-structured UIs.
//!
//! Tree nodes ([`Registrar`]s) declare ownership of an instance, expose it by
//! type and optional name, and tear it down when they leave the tree. Instances
//! are built on first access. A scoped mode binds an instance to a subtree
//! instead of the global table and marks listening consumers dirty whenever
//! the instance notifies a change.
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_registry::{get, Registrar, Registration, Scope};
//! use std::sync::Arc;
//!
//! let root = Scope::root();
//! let node = Registrar::global(Registration::lazy(|| "Hello, World!".to_string()))
//!     .mount(&root)
//!     .unwrap();
//!
//! let message: Arc<String> = get().unwrap();
//! assert_eq!(&*message, "Hello, World!");
//!
//! node.unmount().unwrap();
//! assert!(get::<String>().is_err());
//! ```
//!
//! ## Features
//!
//! - **Lazy**: builders run once, on first access, never during unregistration
//! - **Lifecycle-bound**: unmounting a node unregisters and disposes its instances
//! - **Scoped**: subtree-local bindings resolved along the [`Scope`] chain
//! - **Change tracking**: [`lookup::listen`] and [`Observer`] bridge change notifiers
//! - **Isolated registries**: [`define_registry!`] creates independent tables
//! - **Tracing support**: `tracing` logs plus a per-registry [`RegistryEvent`] callback
//!
//! ## Main Entry Points
//!
//! - [`Registrar`] / [`MultiRegistrar`] - Mount and unmount owned instances
//! - [`register_with`], [`get`], [`get_named`], [`unregister`] - Global registry access
//! - [`lookup::get`] / [`lookup::listen`] - Scoped lookups
//! - [`Observer`] - Subscription bookkeeping for consumers
//! - [`set_trace_callback`] - Set up tracing for registry operations

mod entry;
mod lazy;
mod macros;
mod managed;
mod multi_registrar;
mod observer;
mod registrar;
mod registration;
mod registry;
mod registry_error;
mod registry_event;
mod scope;

pub mod lookup;
pub mod registry_trait;

#[doc(hidden)]
pub mod __private {
    pub use parking_lot::Mutex;
}

pub use entry::{RegistryEntry, RegistryKey, RegistryTable};
pub use lazy::{Builder, InitHook, LazyInitializer};
pub use managed::{ChangeNotifier, Disposable, Listener, Managed, Notifier};
pub use multi_registrar::{MountedMultiRegistrar, MultiRegistrar};
pub use observer::{Lookup, Observer};
pub use registrar::{MountedRegistrar, Registrar};
pub use registration::Registration;
pub use registry::{
    clear, clear_trace_callback, get, get_cloned, get_named, is_registered, is_registered_dyn,
    register, register_arc, register_dyn, register_lazy, register_with, set_trace_callback,
    unregister, unregister_dyn, GlobalRegistry,
};
pub use registry_error::RegistryError;
pub use registry_event::RegistryEvent;
pub use registry_trait::RegistryApi;
pub use scope::{Dependent, Scope, ScopedBinding};
