use crate::entry::RegistryKey;

/// Errors returned by registry, scope, and observer operations.
///
/// Every variant describes a programming mistake (a duplicate or missing
/// registration, a wrong configuration) rather than a transient condition, so
/// none of them is retried. Operations that fail leave the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A live entry already exists for the key.
    #[error("already registered: {key}")]
    AlreadyRegistered {
        /// The key that was registered twice.
        key: RegistryKey,
    },

    /// No entry exists for the key.
    #[error("not registered: {key}")]
    NotRegistered {
        /// The key that was looked up.
        key: RegistryKey,
    },

    /// No scoped binding of the type exists in the scope chain.
    #[error("no scoped binding found for {type_name}")]
    NotFound {
        /// The type that was looked up.
        type_name: &'static str,
    },

    /// A lazy initializer or registration was configured inconsistently.
    #[error("invalid construction of {type_name}: {reason}")]
    InvalidConstruction {
        /// The type being constructed.
        type_name: &'static str,
        /// What was wrong with the configuration.
        reason: &'static str,
    },

    /// The instance lacks a capability the operation requires.
    #[error("{type_name} does not support {capability}")]
    WrongCapability {
        /// The type of the instance.
        type_name: &'static str,
        /// The missing capability.
        capability: &'static str,
    },

    /// A stored instance did not have the requested type.
    #[error("type mismatch in registry for type: {type_name}")]
    TypeMismatch {
        /// The requested type.
        type_name: &'static str,
    },
}

impl RegistryError {
    pub(crate) fn both_sources(type_name: &'static str) -> Self {
        RegistryError::InvalidConstruction {
            type_name,
            reason: "both a builder and an instance were supplied",
        }
    }

    pub(crate) fn no_source(type_name: &'static str) -> Self {
        RegistryError::InvalidConstruction {
            type_name,
            reason: "neither a builder nor an instance was supplied",
        }
    }

    pub(crate) fn not_a_notifier(type_name: &'static str) -> Self {
        RegistryError::WrongCapability {
            type_name,
            capability: "change notification",
        }
    }
}
