//! Account model for directory-to-remote synchronization.
//!
//! Defines the types every other sync component builds on:
//! - [`Schema`]: the immutable field partition (storage / detail /
//!   create-only), directory attribute sources and remote attribute mapping
//! - [`AccountRecord`]: a map-backed account with typed accessors and a
//!   tagged JSON persistent form
//! - [`full_equals`], [`details_differ`], [`remote_equivalent`]: the three
//!   comparison levels used to decide what needs synchronizing
//! - [`DirectoryEntry`] and [`RemoteAccount`]: the shapes records are
//!   built from and converted to
//!
//! The schema is built once at startup and passed by reference; nothing in
//! this crate holds global state.

mod directory;
mod equivalence;
mod error;
mod record;
mod remote;
mod schema;
mod template;

pub use directory::DirectoryEntry;
pub use equivalence::{details_differ, differing_fields, full_equals, remote_equivalent};
pub use error::{ModelError, ModelResult, SchemaError, StateError};
pub use record::AccountRecord;
pub use remote::{AccountStatus, ClassOfServiceMap, RemoteAccount};
pub use schema::{
    fields, AttributeSource, FieldCategory, FieldDef, RemoteMapping, Schema, SchemaConfig,
};
pub use template::FieldTemplate;
