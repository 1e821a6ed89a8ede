//! Error types for store operations.

use thiserror::Error;

/// Errors raised by stores and their helpers.
///
/// Only [`StoreError::AlreadyBound`] is fatal: binding surfaces it as a panic.
/// The rest come out of the `try_*` mutation variants; the plain variants log
/// them and report "no update".
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is already attached to a render cycle.
    #[error("store {id} cannot be supplied more than once")]
    AlreadyBound { id: String },

    /// A partial update needs object-shaped data on both sides.
    #[error("{what} of store `{store_type}` is not an object")]
    NotAnObject {
        store_type: String,
        what: &'static str,
    },

    /// Data could not be converted to or from its JSON view.
    #[error("failed to convert store data: {0}")]
    Serde(#[from] serde_json::Error),

    /// An update timing string other than `nextFrame` or `now`.
    #[error("invalid update timing `{0}`")]
    InvalidTiming(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
