use std::fmt;

/// Events emitted by the registry during operations.
///
/// These events are passed to the tracing callback set via `set_trace_callback`.
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use lifecycle_registry::RegistryEvent;
///
/// let event = RegistryEvent::Register { type_name: "i32", name: None, lazy: true };
/// assert_eq!(event.to_string(), "register { type_name: i32, lazy: true }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A value was registered in the registry.
    Register {
        /// The type name of the registered value (e.g., "i32", "alloc::string::String")
        type_name: &'static str,
        /// The instance name, if any
        name: Option<String>,
        /// Whether the value will be built on first access
        lazy: bool,
    },

    /// A value was removed from the registry.
    Unregister {
        /// The type name of the removed value
        type_name: &'static str,
        /// The instance name, if any
        name: Option<String>,
        /// Whether the instance was disposed on removal
        disposed: bool,
    },

    /// A value was requested from the registry.
    Get {
        /// The type name that was requested
        type_name: &'static str,
        /// The instance name, if any
        name: Option<String>,
        /// Whether the value was found in the registry
        found: bool,
    },

    /// A key existence check was performed.
    Contains {
        /// The type name that was checked
        type_name: &'static str,
        /// The instance name, if any
        name: Option<String>,
        /// Whether the key exists in the registry
        found: bool,
    },

    /// The registry was cleared.
    Clear {},
}

/// Writes ` name: "..."` when a name is present.
struct NamePart<'a>(&'a Option<String>);

impl fmt::Display for NamePart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, ", name: {name:?}"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::Register {
                type_name,
                name,
                lazy,
            } => write!(
                f,
                "register {{ type_name: {type_name}{}, lazy: {lazy} }}",
                NamePart(name)
            ),
            RegistryEvent::Unregister {
                type_name,
                name,
                disposed,
            } => write!(
                f,
                "unregister {{ type_name: {type_name}{}, disposed: {disposed} }}",
                NamePart(name)
            ),
            RegistryEvent::Get {
                type_name,
                name,
                found,
            } => write!(
                f,
                "get {{ type_name: {type_name}{}, found: {found} }}",
                NamePart(name)
            ),
            RegistryEvent::Contains {
                type_name,
                name,
                found,
            } => write!(
                f,
                "contains {{ type_name: {type_name}{}, found: {found} }}",
                NamePart(name)
            ),
            RegistryEvent::Clear {} => write!(f, "Clearing the Registry"),
        }
    }
}
