//! Three-way drift classification between the directory, the local cache
//! and the remote service.
//!
//! Every identifier found in any of the three snapshots gets exactly one
//! [`DriftState`]. Identifiers are routed by presence pattern to one
//! classifier each; the classifiers run in a fixed order and skip
//! identifiers already handled. Corrective actions only ever write to the
//! local cache: the directory and the remote service are read-only here.

use crate::error::{SyncError, SyncResult};
use acctsync_model::{fields, full_equals, remote_equivalent, AccountRecord, Schema};
use acctsync_storage::LocalStore;
use acctsync_types::AccountId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Credential given to records rebuilt from the remote service, so that the
/// next forward run pushes the directory credential.
pub const INVALID_CREDENTIAL: &str = "{INVALID}";

/// Classification of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DriftState {
    // Directory, cache and remote
    PendingReactivation,
    InSync,
    PendingUpdate,
    RemoteDrift,
    StaleCache,
    ThreeWayConflict,
    // Directory and cache
    RemoteVanished,
    NeedsRemoteCreation,
    RemoteMissing,
    // Directory and remote
    MissingFromCache,
    // Cache and remote
    Retired,
    PendingRetirement,
    RetiredRemotely,
    OrphanDrift,
    // Single store
    NeedsCreation,
    PurgedRemotely,
    OrphanLocal,
    RemoteOnlyRetired,
    RemoteOnly,
    // Classification failures
    InternalError,
    NoResult,
}

/// A write to the local cache that repairs a drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectiveAction {
    /// Copy the remote-visible fields from the remote record.
    PatchFromRemote,
    /// Copy the remote-visible fields from the directory record.
    PatchFromDirectory,
    /// Rebuild the cached record from the remote one.
    InsertFromRemote,
    DeleteLocal,
}

impl DriftState {
    pub const ALL: [Self; 21] = [
        Self::PendingReactivation,
        Self::InSync,
        Self::PendingUpdate,
        Self::RemoteDrift,
        Self::StaleCache,
        Self::ThreeWayConflict,
        Self::RemoteVanished,
        Self::NeedsRemoteCreation,
        Self::RemoteMissing,
        Self::MissingFromCache,
        Self::Retired,
        Self::PendingRetirement,
        Self::RetiredRemotely,
        Self::OrphanDrift,
        Self::NeedsCreation,
        Self::PurgedRemotely,
        Self::OrphanLocal,
        Self::RemoteOnlyRetired,
        Self::RemoteOnly,
        Self::InternalError,
        Self::NoResult,
    ];

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PendingReactivation => "pending-reactivation",
            Self::InSync => "in-sync",
            Self::PendingUpdate => "pending-update",
            Self::RemoteDrift => "remote-drift",
            Self::StaleCache => "stale-cache",
            Self::ThreeWayConflict => "three-way-conflict",
            Self::RemoteVanished => "remote-vanished",
            Self::NeedsRemoteCreation => "needs-remote-creation",
            Self::RemoteMissing => "remote-missing",
            Self::MissingFromCache => "missing-from-cache",
            Self::Retired => "retired",
            Self::PendingRetirement => "pending-retirement",
            Self::RetiredRemotely => "retired-remotely",
            Self::OrphanDrift => "orphan-drift",
            Self::NeedsCreation => "needs-creation",
            Self::PurgedRemotely => "purged-remotely",
            Self::OrphanLocal => "orphan-local",
            Self::RemoteOnlyRetired => "remote-only-retired",
            Self::RemoteOnly => "remote-only",
            Self::InternalError => "internal-error",
            Self::NoResult => "no-result",
        }
    }

    /// Whether the state is an inconsistency a forward run will not fix.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::PendingReactivation
                | Self::InSync
                | Self::PendingUpdate
                | Self::Retired
                | Self::PendingRetirement
                | Self::NeedsCreation
                | Self::PurgedRemotely
                | Self::RemoteOnlyRetired
        )
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PendingReactivation => "retired account back in the directory, awaiting reactivation",
            Self::InSync => "all stores agree",
            Self::PendingUpdate => "directory changed, awaiting update",
            Self::RemoteDrift => "remote account modified outside synchronization",
            Self::StaleCache => "cache out of date, remote matches directory",
            Self::ThreeWayConflict => "directory, cache and remote all differ",
            Self::RemoteVanished => "retired account deleted remotely",
            Self::NeedsRemoteCreation => "cached account missing remotely",
            Self::RemoteMissing => "cached account missing remotely and out of date",
            Self::MissingFromCache => "remote account missing from cache",
            Self::Retired => "retired account",
            Self::PendingRetirement => "account left the directory, awaiting retirement",
            Self::RetiredRemotely => "account retired outside synchronization",
            Self::OrphanDrift => "account left the directory and remote differs from cache",
            Self::NeedsCreation => "new directory account, awaiting creation",
            Self::PurgedRemotely => "retired account purged remotely",
            Self::OrphanLocal => "cached account unknown elsewhere",
            Self::RemoteOnlyRetired => "retired remote account unknown elsewhere",
            Self::RemoteOnly => "remote account unknown elsewhere",
            Self::InternalError => "classification failed",
            Self::NoResult => "not classified",
        }
    }

    /// The corrective action attached to the state, if any.
    #[must_use]
    pub fn action(&self) -> Option<CorrectiveAction> {
        match self {
            Self::RemoteDrift | Self::ThreeWayConflict | Self::RetiredRemotely | Self::OrphanDrift => {
                Some(CorrectiveAction::PatchFromRemote)
            }
            Self::StaleCache => Some(CorrectiveAction::PatchFromDirectory),
            Self::MissingFromCache => Some(CorrectiveAction::InsertFromRemote),
            Self::RemoteVanished | Self::PurgedRemotely | Self::OrphanLocal => {
                Some(CorrectiveAction::DeleteLocal)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DriftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The verdict for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub state: DriftState,
    /// Whether the corrective action was written to the cache.
    pub applied: bool,
    /// Failure message for [`DriftState::InternalError`].
    pub detail: Option<String>,
}

/// Result of a classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub classifications: BTreeMap<AccountId, Classification>,
}

impl ReconcileReport {
    /// Number of identifiers per state code.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for c in self.classifications.values() {
            *counts.entry(c.state.code()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn state(&self, id: &str) -> Option<DriftState> {
        self.classifications.get(id).map(|c| c.state)
    }

    /// Identifiers in an error state.
    pub fn errors(&self) -> impl Iterator<Item = (&AccountId, &Classification)> {
        self.classifications.iter().filter(|(_, c)| c.state.is_error())
    }
}

/// Presence of an identifier in each snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    DirectoryCacheRemote,
    DirectoryCache,
    DirectoryRemote,
    CacheRemote,
    DirectoryOnly,
    CacheOnly,
    RemoteOnly,
}

impl Presence {
    const ORDER: [Self; 7] = [
        Self::DirectoryCacheRemote,
        Self::DirectoryCache,
        Self::DirectoryRemote,
        Self::CacheRemote,
        Self::DirectoryOnly,
        Self::CacheOnly,
        Self::RemoteOnly,
    ];

    fn of(d: bool, l: bool, r: bool) -> Option<Self> {
        match (d, l, r) {
            (true, true, true) => Some(Self::DirectoryCacheRemote),
            (true, true, false) => Some(Self::DirectoryCache),
            (true, false, true) => Some(Self::DirectoryRemote),
            (false, true, true) => Some(Self::CacheRemote),
            (true, false, false) => Some(Self::DirectoryOnly),
            (false, true, false) => Some(Self::CacheOnly),
            (false, false, true) => Some(Self::RemoteOnly),
            (false, false, false) => None,
        }
    }
}

/// The three snapshots of one identifier.
struct Views<'s> {
    directory: Option<&'s AccountRecord>,
    cache: Option<&'s AccountRecord>,
    remote: Option<&'s AccountRecord>,
}

impl<'s> Views<'s> {
    fn need(record: Option<&'s AccountRecord>, store: &str) -> SyncResult<&'s AccountRecord> {
        record.ok_or_else(|| SyncError::Fatal(format!("no {store} record")))
    }

    fn d(&self) -> SyncResult<&'s AccountRecord> {
        Self::need(self.directory, "directory")
    }

    fn l(&self) -> SyncResult<&'s AccountRecord> {
        Self::need(self.cache, "cache")
    }

    fn r(&self) -> SyncResult<&'s AccountRecord> {
        Self::need(self.remote, "remote")
    }
}

/// Classifies identifiers and repairs the local cache.
pub struct ReconciliationClassifier<'a> {
    schema: &'a Schema,
    store: &'a dyn LocalStore,
    dry_run: bool,
}

impl<'a> ReconciliationClassifier<'a> {
    pub fn new(schema: &'a Schema, store: &'a dyn LocalStore) -> Self {
        Self {
            schema,
            store,
            dry_run: false,
        }
    }

    /// Classify without writing corrective actions.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Classifies every identifier of the three snapshots.
    ///
    /// Never fails: a classifier error becomes
    /// [`DriftState::InternalError`] for that identifier alone.
    #[must_use]
    pub fn classify(
        &self,
        directory: &BTreeMap<AccountId, AccountRecord>,
        cache: &BTreeMap<AccountId, AccountRecord>,
        remote: &BTreeMap<AccountId, AccountRecord>,
    ) -> ReconcileReport {
        let all: BTreeSet<&AccountId> = directory.keys().chain(cache.keys()).chain(remote.keys()).collect();
        let mut processed: BTreeSet<&AccountId> = BTreeSet::new();
        let mut report = ReconcileReport::default();

        for presence in Presence::ORDER {
            for &id in &all {
                if processed.contains(id) {
                    continue;
                }
                let views = Views {
                    directory: directory.get(id),
                    cache: cache.get(id),
                    remote: remote.get(id),
                };
                let here = Presence::of(
                    views.directory.is_some(),
                    views.cache.is_some(),
                    views.remote.is_some(),
                );
                if here != Some(presence) {
                    continue;
                }
                processed.insert(id);
                let classification = match self.classify_one(presence, id, &views) {
                    Ok(c) => c,
                    Err(e) => {
                        error!(id = %id, error = %e, "classification failed");
                        Classification {
                            state: DriftState::InternalError,
                            applied: false,
                            detail: Some(e.to_string()),
                        }
                    }
                };
                report.classifications.insert(id.clone(), classification);
            }
        }

        for id in all.iter().filter(|id| !processed.contains(*id)) {
            warn!(id = %id, "identifier not classified");
            report.classifications.insert(
                (*id).clone(),
                Classification {
                    state: DriftState::NoResult,
                    applied: false,
                    detail: None,
                },
            );
        }

        info!(
            total = report.classifications.len(),
            errors = report.errors().count(),
            counts = ?report.counts(),
            "classification finished"
        );
        report
    }

    fn classify_one(&self, presence: Presence, id: &AccountId, v: &Views<'_>) -> SyncResult<Classification> {
        let state = match presence {
            Presence::DirectoryCacheRemote => self.all_three(v.d()?, v.l()?, v.r()?),
            Presence::DirectoryCache => self.directory_and_cache(v.d()?, v.l()?),
            Presence::DirectoryRemote => DriftState::MissingFromCache,
            Presence::CacheRemote => self.cache_and_remote(v.l()?, v.r()?),
            Presence::DirectoryOnly => DriftState::NeedsCreation,
            Presence::CacheOnly => {
                if v.l()?.is_marked_for_deletion() {
                    DriftState::PurgedRemotely
                } else {
                    DriftState::OrphanLocal
                }
            }
            Presence::RemoteOnly => {
                if v.r()?.is_marked_for_deletion() {
                    DriftState::RemoteOnlyRetired
                } else {
                    DriftState::RemoteOnly
                }
            }
        };
        debug!(id = %id, state = %state, "classified");

        let applied = match state.action() {
            Some(action) if !self.dry_run => {
                self.apply(id, action, v)?;
                true
            }
            _ => false,
        };
        Ok(Classification {
            state,
            applied,
            detail: None,
        })
    }

    fn all_three(&self, d: &AccountRecord, l: &AccountRecord, r: &AccountRecord) -> DriftState {
        let s = self.schema;
        let cache_matches_remote = remote_equivalent(s, l, r);
        if cache_matches_remote && l.is_marked_for_deletion() && r.is_marked_for_deletion() {
            return DriftState::PendingReactivation;
        }
        let cache_current = full_equals(s, d, l);
        match (cache_current, cache_matches_remote) {
            (true, true) => DriftState::InSync,
            (false, true) => DriftState::PendingUpdate,
            (true, false) => DriftState::RemoteDrift,
            (false, false) if remote_equivalent(s, d, r) => DriftState::StaleCache,
            (false, false) => DriftState::ThreeWayConflict,
        }
    }

    fn directory_and_cache(&self, d: &AccountRecord, l: &AccountRecord) -> DriftState {
        if l.is_marked_for_deletion() {
            DriftState::RemoteVanished
        } else if full_equals(self.schema, d, l) {
            DriftState::NeedsRemoteCreation
        } else {
            DriftState::RemoteMissing
        }
    }

    fn cache_and_remote(&self, l: &AccountRecord, r: &AccountRecord) -> DriftState {
        let equivalent = remote_equivalent(self.schema, l, r);
        match (equivalent, l.is_marked_for_deletion()) {
            (true, true) => DriftState::Retired,
            (true, false) => DriftState::PendingRetirement,
            (false, _) if r.is_marked_for_deletion() => DriftState::RetiredRemotely,
            (false, _) => DriftState::OrphanDrift,
        }
    }

    // ── Corrective actions ───────────────────────────────────────

    fn apply(&self, id: &AccountId, action: CorrectiveAction, v: &Views<'_>) -> SyncResult<()> {
        match action {
            CorrectiveAction::PatchFromRemote => self.patch(id, v.l()?, v.r()?),
            CorrectiveAction::PatchFromDirectory => self.patch(id, v.l()?, v.d()?),
            CorrectiveAction::InsertFromRemote => {
                let mut record = v.r()?.clone();
                record.set_id(id);
                record.set(fields::CREDENTIAL, INVALID_CREDENTIAL);
                info!(id = %id, "inserting cache record from remote");
                self.store.put(&record)?;
                Ok(())
            }
            CorrectiveAction::DeleteLocal => {
                info!(id = %id, "deleting cache record");
                self.store.delete(id)?;
                Ok(())
            }
        }
    }

    /// Overwrites the cached remote-visible fields with those of `source`.
    fn patch(&self, id: &AccountId, cached: &AccountRecord, source: &AccountRecord) -> SyncResult<()> {
        let mut record = cached.clone();
        let names = [fields::MAIL, fields::DELETION_MARKER, fields::ALIASES]
            .into_iter()
            .chain(self.schema.detail_fields());
        record.copy_fields_from(source, names);
        info!(id = %id, "patching cache record");
        self.store.put(&record)?;
        Ok(())
    }
}
