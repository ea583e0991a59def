//! Rule DSL for selecting and classifying accounts.
//!
//! Rules are parenthesized S-expressions:
//!
//! ```text
//! (and (eq cos "staff") (not (empty groups)))
//! ```
//!
//! Operators: `true`, `false`, `eq`, `ne`, `empty`, `contains`, `not`,
//! `and`, `or`, `xor`. Compilation has two phases: [`parser::parse`] builds
//! a nested-list tree, then the builder checks each operator's operands
//! against its signature and every attribute against the [`Schema`].
//! Compiled rules are reused for every record.
//!
//! [`Schema`]: acctsync_model::Schema

mod error;
pub mod parser;
mod rule;
mod ruleset;

pub use error::{RuleError, RuleResult};
pub use rule::Rule;
pub use ruleset::ClassOfServiceRules;

/// Rule text that accepts every account.
pub const MATCH_ALL: &str = "(true)";
