//! Error types for rule compilation.

use thiserror::Error;

/// Result type for rule compilation.
pub type RuleResult<T> = Result<T, RuleError>;

/// A rule failed to compile. Rules come from configuration, so these are
/// fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Malformed parentheses, quoting or characters. `position` is the
    /// 1-based character offset at which the problem was detected.
    #[error("rule {rule}, character {position}: {message}")]
    Syntax {
        rule: String,
        position: usize,
        message: String,
    },

    /// The rule text contains no expression.
    #[error("rule {rule}: empty rule")]
    Empty { rule: String },

    #[error("rule {rule}: unknown operator {operator}")]
    UnknownOperator { rule: String, operator: String },

    #[error("rule {rule}: operator {operator} expects {expected} operand(s), found {found}")]
    Arity {
        rule: String,
        operator: String,
        expected: String,
        found: usize,
    },

    /// An operand was a word where a sub-rule was expected, or the reverse.
    #[error("rule {rule}: operator {operator}, operand {index}: {expected} expected")]
    OperandKind {
        rule: String,
        operator: String,
        index: usize,
        expected: &'static str,
    },

    #[error("rule {rule}: unknown attribute {attribute}")]
    UnknownAttribute { rule: String, attribute: String },
}
