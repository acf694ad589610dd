//! Registry keys, entries, and the two-level storage table.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use downcast_rs::Downcast;
use hashbrown::HashMap;

use crate::lazy::LazyInitializer;
use crate::{Managed, RegistryError};

/// Identifies a registry slot: a type plus an optional instance name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<String>,
}

impl RegistryKey {
    /// Creates the key for type `T` and an optional name.
    #[must_use]
    pub fn of<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: name.map(str::to_owned),
        }
    }

    /// Creates the key for the runtime type of `instance`.
    #[must_use]
    pub fn of_instance(instance: &dyn Managed, name: Option<&str>) -> Self {
        Self {
            type_id: std::any::Any::type_id(Downcast::as_any(instance)),
            type_name: instance.managed_type_name(),
            name: name.map(str::to_owned),
        }
    }

    /// The `TypeId` half of the key.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The optional instance name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

/// A stored registration: its key plus the lazily built instance.
#[derive(Debug)]
pub struct RegistryEntry {
    key: RegistryKey,
    initializer: LazyInitializer<dyn Managed>,
}

impl RegistryEntry {
    pub(crate) fn new(key: RegistryKey, initializer: LazyInitializer<dyn Managed>) -> Self {
        Self { key, initializer }
    }

    /// The entry's key.
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    /// Returns the instance, building it if this is the first access.
    pub fn instance(&self) -> Arc<dyn Managed> {
        self.initializer.instance()
    }

    /// Returns the typed instance, building it if needed.
    ///
    /// # Errors
    ///
    /// [`RegistryError::TypeMismatch`] if the stored value is not a `T`.
    pub fn instance_as<T: Managed>(&self) -> Result<Arc<T>, RegistryError> {
        self.instance()
            .downcast_arc::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                type_name: std::any::type_name::<T>(),
            })
    }

    /// Returns `true` once the instance has been built.
    pub fn is_initialized(&self) -> bool {
        self.initializer.is_initialized()
    }

    /// Disposes the instance if it was built and is disposable.
    ///
    /// Returns `true` if `dispose` was called. Never triggers a build.
    pub(crate) fn dispose(&self) -> bool {
        let Some(instance) = self.initializer.peek() else {
            return false;
        };
        match instance.as_disposable() {
            Some(disposable) => {
                tracing::debug!(key = %self.key, "disposing instance");
                disposable.dispose();
                true
            }
            None => false,
        }
    }
}

/// Storage table: `TypeId` buckets holding entries keyed by optional name.
///
/// Buckets are removed as soon as their last entry is.
#[derive(Debug, Default)]
pub struct RegistryTable {
    buckets: HashMap<TypeId, HashMap<Option<String>, Arc<RegistryEntry>>>,
}

impl RegistryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, failing if its key is already live.
    pub(crate) fn insert(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if self.contains(&entry.key) {
            return Err(RegistryError::AlreadyRegistered { key: entry.key });
        }
        self.buckets
            .entry(entry.key.type_id)
            .or_default()
            .insert(entry.key.name.clone(), Arc::new(entry));
        Ok(())
    }

    /// Removes and returns the entry for `key`.
    pub(crate) fn remove(&mut self, key: &RegistryKey) -> Result<Arc<RegistryEntry>, RegistryError> {
        let not_registered = || RegistryError::NotRegistered { key: key.clone() };
        let bucket = self.buckets.get_mut(&key.type_id).ok_or_else(not_registered)?;
        let entry = bucket.remove(&key.name).ok_or_else(not_registered)?;
        if bucket.is_empty() {
            self.buckets.remove(&key.type_id);
        }
        Ok(entry)
    }

    /// Returns the entry for `key`, if live.
    pub(crate) fn get(&self, key: &RegistryKey) -> Option<Arc<RegistryEntry>> {
        self.buckets
            .get(&key.type_id)
            .and_then(|bucket| bucket.get(&key.name))
            .cloned()
    }

    /// Returns `true` if `key` is live.
    pub(crate) fn contains(&self, key: &RegistryKey) -> bool {
        self.buckets
            .get(&key.type_id)
            .is_some_and(|bucket| bucket.contains_key(&key.name))
    }

    /// Number of live entries across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    /// Returns `true` if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of type buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drops every entry without disposing.
    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Disposable, Notifier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Closable {
        notifier: Notifier,
    }

    impl Managed for Closable {
        fn as_disposable(&self) -> Option<&dyn Disposable> {
            Some(&self.notifier)
        }
    }

    fn prebuilt<T: Managed>(name: Option<&str>, value: T) -> RegistryEntry {
        RegistryEntry::new(
            RegistryKey::of::<T>(name),
            LazyInitializer::from_instance(Arc::new(value) as Arc<dyn Managed>),
        )
    }

    #[test]
    fn key_display_includes_name() {
        assert_eq!(RegistryKey::of::<u8>(None).to_string(), "u8");
        assert_eq!(RegistryKey::of::<u8>(Some("a")).to_string(), "u8(\"a\")");
    }

    #[test]
    fn runtime_key_matches_static_key() {
        let value: Arc<dyn Managed> = Arc::new(5u64);
        assert_eq!(
            RegistryKey::of_instance(&*value, Some("x")),
            RegistryKey::of::<u64>(Some("x"))
        );
    }

    #[test]
    fn insert_rejects_duplicate_keys() {
        let mut table = RegistryTable::new();
        table.insert(prebuilt(None, 1i32)).unwrap();

        let result = table.insert(prebuilt(None, 2i32));
        assert!(matches!(
            result,
            Err(RegistryError::AlreadyRegistered { .. })
        ));

        let entry = table.get(&RegistryKey::of::<i32>(None)).unwrap();
        assert_eq!(*entry.instance_as::<i32>().unwrap(), 1);
    }

    #[test]
    fn names_share_a_bucket() {
        let mut table = RegistryTable::new();
        table.insert(prebuilt(Some("a"), 1i32)).unwrap();
        table.insert(prebuilt(Some("b"), 2i32)).unwrap();
        table.insert(prebuilt(None, 3i32)).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.bucket_count(), 1);
    }

    #[test]
    fn removing_last_entry_drops_bucket() {
        let mut table = RegistryTable::new();
        table.insert(prebuilt(Some("a"), 1i32)).unwrap();
        table.insert(prebuilt(Some("b"), 2i32)).unwrap();

        table.remove(&RegistryKey::of::<i32>(Some("a"))).unwrap();
        assert_eq!(table.bucket_count(), 1);

        table.remove(&RegistryKey::of::<i32>(Some("b"))).unwrap();
        assert_eq!(table.bucket_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_missing_key_fails() {
        let mut table = RegistryTable::new();
        let result = table.remove(&RegistryKey::of::<i32>(None));
        assert_eq!(
            result.unwrap_err(),
            RegistryError::NotRegistered {
                key: RegistryKey::of::<i32>(None)
            }
        );
    }

    #[test]
    fn instance_as_reports_mismatch() {
        let entry = prebuilt(None, 1i32);
        assert_eq!(
            entry.instance_as::<u32>().unwrap_err(),
            RegistryError::TypeMismatch { type_name: "u32" }
        );
    }

    #[test]
    fn dispose_skips_unbuilt_entries() {
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_clone = builds.clone();
        let entry = RegistryEntry::new(
            RegistryKey::of::<Closable>(None),
            LazyInitializer::from_builder(Box::new(move || {
                builds_clone.fetch_add(1, Ordering::SeqCst);
                Arc::new(Closable::default()) as Arc<dyn Managed>
            })),
        );

        assert!(!entry.dispose());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let instance = entry.instance_as::<Closable>().unwrap();
        assert!(entry.dispose());
        assert!(instance.notifier.is_disposed());
    }
}
