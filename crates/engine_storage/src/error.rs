//! Storage-layer error types.

use engine_component::Entity;

/// Errors reported by pools and the registry.
///
/// Absence of a pool or component is not an error; those paths report
/// `None`/`false`. Every variant here signals a programming defect, never a
/// recoverable runtime condition. Callers must not continue using a pool or
/// registry state they know to be misused: the free-list and
/// component-destruction bookkeeping assume these calls never went through.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A caller's claimed component type does not match the pool's
    /// registered type identity.
    #[error("cannot {operation} {requested} in pool for {pool}")]
    TypeContradiction {
        /// Name of the type the pool was created for.
        pool: String,
        /// Name of the type the caller claimed.
        requested: String,
        /// The operation that was attempted (`"allocate"`, `"free"`, …).
        operation: &'static str,
    },

    /// The entity id lies outside the registry's entity array.
    #[error("{0} is out of range")]
    EntityOutOfRange(Entity),

    /// The entity was already destroyed.
    #[error("{0} is already destroyed")]
    EntityDestroyed(Entity),

    /// A type-erased allocation was requested from a pool whose capability
    /// record carries no default-construct callback.
    #[error("pool for {0} has no default constructor")]
    NoDefaultConstructor(String),
}
