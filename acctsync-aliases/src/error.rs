use thiserror::Error;

pub type AliasResult<T> = Result<T, AliasError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AliasError {
    /// Following the target leads back to it, or an address aliases itself.
    #[error("{0}: alias cycle")]
    Cycle(String),

    /// The alias is already bound to another account.
    #[error("{alias}: duplicate alias (bound to {existing}, requested {requested})")]
    Duplicate {
        alias: String,
        existing: String,
        requested: String,
    },

    /// Aliases were requested for an address that is itself an alias.
    #[error("{0}: is an alias")]
    IsAnAlias(String),
}
