//! Mail alias resolution.
//!
//! - [`AliasResolver`] keeps every alias pointing straight at its main
//!   account, merging alias chains as they are inserted
//! - [`AliasTable`] parses `alias: target` text tables and feeds the
//!   resolver with their in-domain, single-target entries

mod error;
mod resolver;
mod table;

pub use error::{AliasError, AliasResult};
pub use resolver::AliasResolver;
pub use table::AliasTable;
