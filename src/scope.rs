//! Scope chain, scoped bindings, and dependents.
//!
//! The host tree is modelled as a chain of [`Scope`] nodes. Each node may
//! carry [`ScopedBinding`]s, and a lookup walks from a node up through its
//! ancestors, closest binding first. A [`Dependent`] is a consumer position
//! that asked to be refreshed: bindings mark it dirty when their instance
//! changes, and the host scheduler polls or is called back.
//!
//! ```text
//! Scope (root)
//! └── Scope  [ScopedBinding<Counter>]   <- registrar node
//!     └── Scope                          <- consumer: finds Counter
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::lazy::LazyInitializer;
use crate::{Listener, Managed, RegistryError};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// -------------------------------------------------------------------------------------------------
// Scope
// -------------------------------------------------------------------------------------------------

struct ScopeInner {
    id: u64,
    depth: usize,
    parent: Option<Scope>,
    bindings: Mutex<HashMap<TypeId, Arc<ScopedBinding>>>,
}

/// A position in the host tree.
///
/// Cloning a `Scope` clones the handle; both refer to the same node.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Creates a root node with no parent.
    #[must_use]
    pub fn root() -> Self {
        Self::with_parent(None)
    }

    /// Creates a child node below this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<Scope>) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);
        Self {
            inner: Arc::new(ScopeInner {
                id: next_id(),
                depth,
                parent,
                bindings: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Unique node id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Distance from the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// The parent node, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Attaches `binding` to this node, returning the binding it replaces.
    pub(crate) fn attach(&self, binding: Arc<ScopedBinding>) -> Option<Arc<ScopedBinding>> {
        self.inner.bindings.lock().insert(binding.type_id, binding)
    }

    /// Detaches the binding for `type_id` from this node.
    pub(crate) fn detach(&self, type_id: TypeId) -> Option<Arc<ScopedBinding>> {
        self.inner.bindings.lock().remove(&type_id)
    }

    /// Finds the nearest binding for `type_id`, starting at this node.
    #[must_use]
    pub fn find_binding(&self, type_id: TypeId) -> Option<Arc<ScopedBinding>> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(binding) = scope.inner.bindings.lock().get(&type_id) {
                return Some(binding.clone());
            }
            current = scope.parent();
        }
        None
    }

    /// Finds the nearest binding for `T`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if no node in the chain binds `T`.
    pub fn binding_of<T: Managed>(&self) -> Result<Arc<ScopedBinding>, RegistryError> {
        self.find_binding(TypeId::of::<T>())
            .ok_or(RegistryError::NotFound {
                type_name: std::any::type_name::<T>(),
            })
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("depth", &self.inner.depth)
            .field("bindings", &self.inner.bindings.lock().len())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Dependent
// -------------------------------------------------------------------------------------------------

struct DependentInner {
    id: u64,
    dirty: AtomicBool,
    schedule: Option<Box<dyn Fn() + Send + Sync>>,
}

/// A consumer that can be marked for refresh.
///
/// The host either polls [`take_dirty`](Self::take_dirty) after a frame or
/// installs a schedule callback with [`with_schedule`](Self::with_schedule),
/// which fires each time the dependent goes from clean to dirty.
#[derive(Clone)]
pub struct Dependent {
    inner: Arc<DependentInner>,
}

impl Dependent {
    /// Creates a clean dependent without a schedule callback.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a clean dependent that calls `schedule` when it becomes dirty.
    #[must_use]
    pub fn with_schedule(schedule: impl Fn() + Send + Sync + 'static) -> Self {
        Self::build(Some(Box::new(schedule)))
    }

    fn build(schedule: Option<Box<dyn Fn() + Send + Sync>>) -> Self {
        Self {
            inner: Arc::new(DependentInner {
                id: next_id(),
                dirty: AtomicBool::new(false),
                schedule,
            }),
        }
    }

    /// Unique dependent id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns `true` if a refresh is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Clears the pending refresh, returning whether one was pending.
    pub fn take_dirty(&self) -> bool {
        self.inner.dirty.swap(false, Ordering::SeqCst)
    }

    /// Marks the dependent for refresh.
    pub fn mark_dirty(&self) {
        if !self.inner.dirty.swap(true, Ordering::SeqCst) {
            if let Some(schedule) = &self.inner.schedule {
                schedule();
            }
        }
    }

    fn downgrade(&self) -> Weak<DependentInner> {
        Arc::downgrade(&self.inner)
    }
}

impl Default for Dependent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dependent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependent")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// ScopedBinding
// -------------------------------------------------------------------------------------------------

/// An instance bound to a scope node instead of the global table.
///
/// The binding owns its own [`LazyInitializer`]. Once the instance exists and
/// is a [`ChangeNotifier`](crate::ChangeNotifier), the binding subscribes to
/// it; every change sets the `should_notify` flag and marks all registered
/// dependents dirty.
pub struct ScopedBinding {
    type_id: TypeId,
    type_name: &'static str,
    initializer: LazyInitializer<dyn Managed>,
    listener: Listener,
    should_notify: AtomicBool,
    dependents: Mutex<Vec<Weak<DependentInner>>>,
}

impl ScopedBinding {
    /// Creates a binding for `T` around `initializer`.
    pub(crate) fn new<T: Managed>(initializer: LazyInitializer<dyn Managed>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ScopedBinding>| {
            let weak = weak.clone();
            let listener = Listener::new(move || {
                if let Some(binding) = weak.upgrade() {
                    binding.mark_needs_notify();
                }
            });

            let initializer = match initializer.peek() {
                Some(instance) => {
                    attach_listener(&instance, &listener);
                    initializer
                }
                None => {
                    let hook_listener = listener.clone();
                    initializer.on_init(move |instance| attach_listener(instance, &hook_listener))
                }
            };

            Self {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                initializer,
                listener,
                should_notify: AtomicBool::new(false),
                dependents: Mutex::new(Vec::new()),
            }
        })
    }

    /// Type name of the bound instance.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the instance, building it on first access.
    pub fn instance(&self) -> Arc<dyn Managed> {
        self.initializer.instance()
    }

    /// Returns the typed instance, building it on first access.
    ///
    /// # Errors
    ///
    /// [`RegistryError::TypeMismatch`] if the instance is not a `T`.
    pub fn instance_as<T: Managed>(&self) -> Result<Arc<T>, RegistryError> {
        self.instance()
            .downcast_arc::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                type_name: std::any::type_name::<T>(),
            })
    }

    /// Returns `true` once the instance has been built.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initializer.is_initialized()
    }

    /// Registers `dependent` for refreshes. Registering twice is a no-op.
    pub fn add_dependent(&self, dependent: &Dependent) {
        let mut dependents = self.dependents.lock();
        dependents.retain(|d| d.strong_count() > 0);
        let id = dependent.id();
        let already_registered = dependents
            .iter()
            .any(|d| d.upgrade().is_some_and(|inner| inner.id == id));
        if !already_registered {
            dependents.push(dependent.downgrade());
        }
    }

    /// Number of live dependents.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.dependents
            .lock()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }

    /// Sets the notify flag and marks every live dependent dirty.
    ///
    /// Called by the instance's change notifications, or directly by the
    /// host when the binding itself was updated.
    pub fn mark_needs_notify(&self) {
        self.should_notify.store(true, Ordering::SeqCst);

        let dependents: Vec<Dependent> = {
            let mut dependents = self.dependents.lock();
            dependents.retain(|d| d.strong_count() > 0);
            dependents
                .iter()
                .filter_map(Weak::upgrade)
                .map(|inner| Dependent { inner })
                .collect()
        };

        tracing::trace!(type_name = self.type_name, dependents = dependents.len(), "notifying dependents");
        for dependent in dependents {
            dependent.mark_dirty();
        }
    }

    /// Returns `true` if a change is pending acknowledgement.
    #[must_use]
    pub fn should_notify(&self) -> bool {
        self.should_notify.load(Ordering::SeqCst)
    }

    /// Acknowledges the pending change, returning whether one was pending.
    pub fn take_should_notify(&self) -> bool {
        self.should_notify.swap(false, Ordering::SeqCst)
    }

    /// Unsubscribes from the instance and drops all dependents.
    ///
    /// With `dispose`, a built instance that is disposable is disposed.
    /// Returns `true` if `dispose` was called. Never triggers a build.
    pub(crate) fn release(&self, dispose: bool) -> bool {
        self.dependents.lock().clear();

        let Some(instance) = self.initializer.peek() else {
            return false;
        };
        if let Some(notifier) = instance.as_notifier() {
            notifier.remove_listener(&self.listener);
        }
        if !dispose {
            return false;
        }
        match instance.as_disposable() {
            Some(disposable) => {
                tracing::debug!(type_name = self.type_name, "disposing scoped instance");
                disposable.dispose();
                true
            }
            None => false,
        }
    }
}

fn attach_listener(instance: &Arc<dyn Managed>, listener: &Listener) {
    if let Some(notifier) = instance.as_notifier() {
        notifier.add_listener(listener.clone());
    }
}

impl fmt::Debug for ScopedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedBinding")
            .field("type_name", &self.type_name)
            .field("initialized", &self.is_initialized())
            .field("should_notify", &self.should_notify())
            .field("dependents", &self.dependent_count())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
