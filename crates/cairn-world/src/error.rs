//! Error types for the `cairn-world` crate.

use cairn_core::KernelError;

/// Errors that can occur while building or inspecting a world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The kernel rejected an operation.
    #[error("kernel error: {source}")]
    Kernel {
        /// The underlying kernel error.
        #[from]
        source: KernelError,
    },

    /// No cave with this name is registered.
    #[error("cave not found: {0}")]
    CaveNotFound(String),

    /// A cave's payload is missing a counter or holds the wrong type.
    #[error("cave {cave} has a corrupt {field} counter")]
    CorruptCave {
        /// The cave.
        cave: String,
        /// The offending field.
        field: &'static str,
    },
}
