//! The remote account service and snapshots of its contents.

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;
use acctsync_model::{AccountRecord, ClassOfServiceMap, RemoteAccount, Schema};
use acctsync_types::AccountId;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A failed remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The session token is no longer valid; the call may be retried after
    /// a session reset.
    #[error("session expired")]
    AuthExpired,

    /// The service rejected the call.
    #[error("remote fault {code}: {message}")]
    Fault { code: String, message: String },
}

impl RemoteError {
    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Remote account management, keyed by mail address.
///
/// Calls block. Implementations own their session and must be able to drop
/// it on [`RemoteAccountService::reset_session`]; the next call opens a new
/// one.
pub trait RemoteAccountService {
    /// Creates an account with an initial credential.
    fn create_account(&mut self, account: &RemoteAccount, credential: &str) -> RemoteResult<()>;

    /// Replaces the attributes and class of service of an account.
    fn modify_account(&mut self, account: &RemoteAccount) -> RemoteResult<()>;

    fn rename_account(&mut self, name: &str, new_name: &str) -> RemoteResult<()>;

    fn activate_account(&mut self, name: &str) -> RemoteResult<()>;

    fn close_account(&mut self, name: &str) -> RemoteResult<()>;

    fn set_credential(&mut self, name: &str, credential: &str) -> RemoteResult<()>;

    fn add_alias(&mut self, name: &str, alias: &str) -> RemoteResult<()>;

    fn remove_alias(&mut self, name: &str, alias: &str) -> RemoteResult<()>;

    fn get_account(&mut self, name: &str) -> RemoteResult<RemoteAccount>;

    /// One page of account names. A page shorter than `limit` is the last.
    fn list_accounts(&mut self, offset: usize, limit: usize) -> RemoteResult<Vec<String>>;

    fn delete_account(&mut self, name: &str) -> RemoteResult<()>;

    /// Every class of service as `(name, id)`.
    fn list_classes_of_service(&mut self) -> RemoteResult<Vec<(String, String)>>;

    /// Drops the current session.
    fn reset_session(&mut self);
}

// ── Classes of service ───────────────────────────────────────────

/// Reads the class-of-service table. Failure is fatal.
pub fn fetch_classes_of_service<R>(remote: &mut R, retry: &RetryPolicy) -> SyncResult<ClassOfServiceMap>
where
    R: RemoteAccountService + ?Sized,
{
    let pairs = retry
        .run(remote, "list_classes_of_service", |r| r.list_classes_of_service())
        .map_err(|e| SyncError::Fatal(format!("cannot read classes of service: {e}")))?;
    debug!(count = pairs.len(), "classes of service loaded");
    Ok(ClassOfServiceMap::new(pairs))
}

/// Fails unless every name is a known class of service.
pub fn verify_classes_of_service<'a>(
    coses: &ClassOfServiceMap,
    names: impl IntoIterator<Item = &'a str>,
) -> SyncResult<()> {
    let missing: Vec<&str> = names.into_iter().filter(|n| !coses.contains(n)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SyncError::Fatal(format!(
            "unknown classes of service: {}",
            missing.join(", ")
        )))
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Every remote account that carries an identifier, converted to records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub accounts: BTreeMap<AccountId, AccountRecord>,
}

impl RemoteSnapshot {
    /// Pages through the remote accounts and reads each one.
    ///
    /// Any failure is fatal: drift detection on a partial snapshot would
    /// report accounts as missing.
    pub fn fetch<R>(
        remote: &mut R,
        retry: &RetryPolicy,
        schema: &Schema,
        coses: &ClassOfServiceMap,
        page_size: usize,
    ) -> SyncResult<Self>
    where
        R: RemoteAccountService + ?Sized,
    {
        if page_size == 0 {
            return Err(SyncError::Config("remote page size must be positive".into()));
        }
        info!("reading remote account list");
        let mut names = Vec::new();
        loop {
            let offset = names.len();
            let page = retry
                .run(remote, "list_accounts", |r| r.list_accounts(offset, page_size))
                .map_err(|e| SyncError::Fatal(format!("cannot list remote accounts: {e}")))?;
            let last = page.len() < page_size;
            names.extend(page);
            if last {
                break;
            }
        }
        debug!(count = names.len(), "remote account list read");

        let mut accounts = BTreeMap::new();
        for name in &names {
            let account = retry
                .run(remote, "get_account", |r| r.get_account(name))
                .map_err(|e| SyncError::Fatal(format!("cannot read remote account {name}: {e}")))?;
            let record = AccountRecord::from_remote(schema, coses, &account)
                .map_err(|e| SyncError::Fatal(format!("remote account {name}: {e}")))?;
            let Some(id) = record.id() else {
                debug!(name = %name, "remote account has no identifier, ignored");
                continue;
            };
            if accounts.insert(id.clone(), record).is_some() {
                warn!(id = %id, name = %name, "identifier carried by several remote accounts");
            }
        }
        info!(count = accounts.len(), "remote snapshot loaded");
        Ok(Self { accounts })
    }
}
