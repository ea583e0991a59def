//! Core value types for account synchronization.
//!
//! This crate defines the store-agnostic building blocks used by every
//! other crate in the workspace:
//! - Account identifiers (stable principal names)
//! - Field values, including byte blobs and unordered string sets
//! - Multivalued equivalence between field values
//! - The tagged JSON encoding used by the persistent store
//! - Deletion markers embedded in retired remote addresses
//!
//! Nothing here knows about schemas, directories or remote services.

mod codec;
mod ids;
mod timestamp;
mod value;

pub use codec::{decode_value, encode_value, EXT_BYTES, EXT_SET, EXT_TAG};
pub use ids::AccountId;
pub use timestamp::DeletionMarker;
pub use value::{multivalued_equals, FieldValue};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tagged wrapper carried an extension tag this codec does not know.
    #[error("unknown value extension: {0}")]
    UnknownExtension(String),

    #[error("malformed value: {0}")]
    MalformedValue(String),

    #[error("invalid account identifier: {0:?}")]
    InvalidIdentifier(String),
}
