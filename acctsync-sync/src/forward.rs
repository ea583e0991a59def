//! Forward synchronization: directory -> remote service, mirrored in the
//! local cache.
//!
//! A run has three passes, always in this order:
//!
//! 1. **create** accounts only the directory knows;
//! 2. **update** accounts whose cached record differs from the directory,
//!    through a fixed pipeline of steps;
//! 3. **retire** cached accounts that left the directory: close them and
//!    rename them to an address carrying a deletion marker.
//!
//! The cache only ever records what the remote service confirmed. Every
//! confirmed step is persisted before the next one starts, so an
//! interrupted run resumes from where it stopped. A failure on one account
//! never affects another; storage failures abort the run.

use crate::error::SyncResult;
use crate::remote::RemoteAccountService;
use crate::retry::RetryPolicy;
use acctsync_model::{details_differ, fields, full_equals, AccountRecord, ClassOfServiceMap, Schema};
use acctsync_storage::LocalStore;
use acctsync_types::{multivalued_equals, AccountId, DeletionMarker};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Update pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStep {
    Reactivate,
    Rename,
    Credential,
    Details,
    Aliases,
}

impl UpdateStep {
    pub const PIPELINE: [Self; 5] = [
        Self::Reactivate,
        Self::Rename,
        Self::Credential,
        Self::Details,
        Self::Aliases,
    ];
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reactivate => "reactivate",
            Self::Rename => "rename",
            Self::Credential => "credential",
            Self::Details => "details",
            Self::Aliases => "aliases",
        })
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Accounts created remotely.
    pub created: Vec<AccountId>,
    /// Accounts whose update pipeline completed.
    pub updated: Vec<AccountId>,
    /// Accounts closed and marked for deletion.
    pub retired: Vec<AccountId>,
    /// Accounts left unsynchronized by a failure, with the failing stage.
    pub failed: Vec<(AccountId, String)>,
    /// Alias additions or removals that failed.
    pub alias_failures: usize,
}

impl SyncReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.alias_failures == 0
    }
}

/// Outcome of a single pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    /// Nothing to do.
    Unchanged,
    /// Remote call confirmed and persisted.
    Applied,
    Failed,
}

/// Converges the remote service toward the directory.
pub struct ForwardSynchronizer<'a, R: RemoteAccountService + ?Sized> {
    schema: &'a Schema,
    coses: &'a ClassOfServiceMap,
    store: &'a dyn LocalStore,
    remote: &'a mut R,
    retry: RetryPolicy,
}

impl<'a, R: RemoteAccountService + ?Sized> ForwardSynchronizer<'a, R> {
    pub fn new(
        schema: &'a Schema,
        coses: &'a ClassOfServiceMap,
        store: &'a dyn LocalStore,
        remote: &'a mut R,
    ) -> Self {
        Self {
            schema,
            coses,
            store,
            remote,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs all three passes, marking retired accounts with the current time.
    pub fn run(&mut self, directory: &BTreeMap<AccountId, AccountRecord>) -> SyncResult<SyncReport> {
        self.run_at(directory, DeletionMarker::now())
    }

    /// Runs all three passes, marking retired accounts with `now`.
    pub fn run_at(
        &mut self,
        directory: &BTreeMap<AccountId, AccountRecord>,
        now: DeletionMarker,
    ) -> SyncResult<SyncReport> {
        let mut local = self.store.load_all()?;
        let mut report = SyncReport::default();

        // ── Create ───────────────────────────────────────────────
        let new: Vec<&AccountId> = directory.keys().filter(|id| !local.contains_key(*id)).collect();
        info!(count = new.len(), "new accounts");
        for id in new {
            if self.create(id, &directory[id], &mut report)? {
                report.created.push(id.clone());
            } else {
                report.failed.push((id.clone(), "create".into()));
            }
        }

        // ── Update ───────────────────────────────────────────────
        let changed: Vec<AccountId> = directory
            .iter()
            .filter(|(id, d)| {
                local
                    .get(*id)
                    .is_some_and(|l| !full_equals(self.schema, d, l))
            })
            .map(|(id, _)| id.clone())
            .collect();
        info!(count = changed.len(), "accounts to update");
        for id in changed {
            let Some(cached) = local.get_mut(&id) else {
                continue;
            };
            match self.update(&id, cached, &directory[&id], &mut report)? {
                None => report.updated.push(id),
                Some(step) => report.failed.push((id, step.to_string())),
            }
        }

        // ── Retire ───────────────────────────────────────────────
        let gone: Vec<AccountId> = local
            .iter()
            .filter(|(id, l)| !directory.contains_key(*id) && !l.is_marked_for_deletion())
            .map(|(id, _)| id.clone())
            .collect();
        info!(count = gone.len(), "accounts to retire");
        for id in gone {
            let Some(cached) = local.get_mut(&id) else {
                continue;
            };
            if self.retire(&id, cached, now)? {
                report.retired.push(id);
            } else {
                report.failed.push((id, "retire".into()));
            }
        }

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            retired = report.retired.len(),
            failed = report.failed.len(),
            "sync run finished"
        );
        Ok(report)
    }

    // ── Create ───────────────────────────────────────────────────

    /// Creates the account, caches it without aliases, then adds the aliases
    /// one by one.
    fn create(&mut self, id: &AccountId, record: &AccountRecord, report: &mut SyncReport) -> SyncResult<bool> {
        let account = match record.to_remote(self.schema, self.coses, true) {
            Ok(a) => a,
            Err(e) => {
                error!(id = %id, error = %e, "cannot build remote account");
                return Ok(false);
            }
        };
        let Some(credential) = record.credential_text() else {
            error!(id = %id, "account has no usable credential");
            return Ok(false);
        };

        info!(id = %id, mail = %account.name, "creating account");
        if let Err(e) = self
            .retry
            .run(&mut *self.remote, "create_account", |r| r.create_account(&account, &credential))
        {
            error!(id = %id, error = %e, "account creation failed");
            return Ok(false);
        }

        let mut cached = record.clone();
        cached.set_aliases(BTreeSet::new());
        self.store.put(&cached)?;
        report.alias_failures += self.add_aliases(id, &mut cached, &record.aliases())?;
        Ok(true)
    }

    // ── Update ───────────────────────────────────────────────────

    /// Runs the update pipeline. Returns the failing step, if any.
    fn update(
        &mut self,
        id: &AccountId,
        cached: &mut AccountRecord,
        wanted: &AccountRecord,
        report: &mut SyncReport,
    ) -> SyncResult<Option<UpdateStep>> {
        for step in UpdateStep::PIPELINE {
            let outcome = match step {
                UpdateStep::Reactivate => self.reactivate(id, cached)?,
                UpdateStep::Rename => self.rename(id, cached, wanted)?,
                UpdateStep::Credential => self.rotate_credential(id, cached, wanted)?,
                UpdateStep::Details => self.push_details(id, cached, wanted)?,
                UpdateStep::Aliases => self.patch_aliases(id, cached, wanted, report)?,
            };
            if outcome == StepOutcome::Failed {
                warn!(id = %id, step = %step, "update interrupted");
                return Ok(Some(step));
            }
        }
        self.refresh_cached_fields(id, cached, wanted)?;
        Ok(None)
    }

    fn reactivate(&mut self, id: &AccountId, cached: &mut AccountRecord) -> SyncResult<StepOutcome> {
        if !cached.is_marked_for_deletion() {
            return Ok(StepOutcome::Unchanged);
        }
        let Some(mail) = cached.mail().map(str::to_string) else {
            error!(id = %id, "cached account has no mail");
            return Ok(StepOutcome::Failed);
        };
        info!(id = %id, mail = %mail, "reactivating account");
        if let Err(e) = self.retry.run(&mut *self.remote, "activate_account", |r| r.activate_account(&mail)) {
            error!(id = %id, error = %e, "cannot reactivate account");
            return Ok(StepOutcome::Failed);
        }
        cached.set_deletion_marker(None);
        self.store.put(cached)?;
        Ok(StepOutcome::Applied)
    }

    fn rename(&mut self, id: &AccountId, cached: &mut AccountRecord, wanted: &AccountRecord) -> SyncResult<StepOutcome> {
        let (Some(from), Some(to)) = (cached.mail().map(str::to_string), wanted.mail()) else {
            error!(id = %id, "account has no mail");
            return Ok(StepOutcome::Failed);
        };
        if from == to {
            return Ok(StepOutcome::Unchanged);
        }
        info!(id = %id, from = %from, to = %to, "renaming account");
        if let Err(e) = self.retry.run(&mut *self.remote, "rename_account", |r| r.rename_account(&from, to)) {
            error!(id = %id, error = %e, "cannot rename account");
            return Ok(StepOutcome::Failed);
        }
        cached.set_mail(to);
        self.store.put(cached)?;
        Ok(StepOutcome::Applied)
    }

    fn rotate_credential(
        &mut self,
        id: &AccountId,
        cached: &mut AccountRecord,
        wanted: &AccountRecord,
    ) -> SyncResult<StepOutcome> {
        if multivalued_equals(cached.credential(), wanted.credential()) {
            return Ok(StepOutcome::Unchanged);
        }
        let (Some(mail), Some(credential)) = (cached.mail().map(str::to_string), wanted.credential_text()) else {
            error!(id = %id, "account has no mail or no usable credential");
            return Ok(StepOutcome::Failed);
        };
        info!(id = %id, mail = %mail, "credential changed");
        if let Err(e) = self
            .retry
            .run(&mut *self.remote, "set_credential", |r| r.set_credential(&mail, &credential))
        {
            error!(id = %id, error = %e, "cannot change credential");
            return Ok(StepOutcome::Failed);
        }
        cached.set_opt(fields::CREDENTIAL, wanted.credential().cloned());
        self.store.put(cached)?;
        Ok(StepOutcome::Applied)
    }

    fn push_details(
        &mut self,
        id: &AccountId,
        cached: &mut AccountRecord,
        wanted: &AccountRecord,
    ) -> SyncResult<StepOutcome> {
        if !details_differ(self.schema, cached, wanted) {
            return Ok(StepOutcome::Unchanged);
        }
        let account = match wanted.to_remote(self.schema, self.coses, false) {
            Ok(a) => a,
            Err(e) => {
                error!(id = %id, error = %e, "cannot build remote account");
                return Ok(StepOutcome::Failed);
            }
        };
        info!(id = %id, mail = %account.name, "details changed");
        if let Err(e) = self.retry.run(&mut *self.remote, "modify_account", |r| r.modify_account(&account)) {
            error!(id = %id, error = %e, "cannot modify account");
            return Ok(StepOutcome::Failed);
        }
        let detail_fields: Vec<&str> = self.schema.detail_fields().collect();
        cached.copy_fields_from(wanted, detail_fields);
        self.store.put(cached)?;
        Ok(StepOutcome::Applied)
    }

    /// Adds missing and removes stale aliases, one confirmed call at a time.
    /// Individual alias failures do not stop the pipeline.
    fn patch_aliases(
        &mut self,
        id: &AccountId,
        cached: &mut AccountRecord,
        wanted: &AccountRecord,
        report: &mut SyncReport,
    ) -> SyncResult<StepOutcome> {
        let have = cached.aliases();
        let want = wanted.aliases();
        if have == want {
            return Ok(StepOutcome::Unchanged);
        }
        let added: BTreeSet<String> = want.difference(&have).cloned().collect();
        let removed: BTreeSet<String> = have.difference(&want).cloned().collect();
        report.alias_failures += self.add_aliases(id, cached, &added)?;
        report.alias_failures += self.remove_aliases(id, cached, &removed)?;
        Ok(StepOutcome::Applied)
    }

    /// Copies the fields the remote service does not hold.
    fn refresh_cached_fields(
        &mut self,
        id: &AccountId,
        cached: &mut AccountRecord,
        wanted: &AccountRecord,
    ) -> SyncResult<()> {
        const REMOTE_MANAGED: [&str; 5] = [
            fields::ID,
            fields::MAIL,
            fields::CREDENTIAL,
            fields::DELETION_MARKER,
            fields::ALIASES,
        ];
        let local_only: Vec<&str> = self
            .schema
            .field_names()
            .filter(|f| !REMOTE_MANAGED.contains(f))
            .filter(|f| !self.schema.detail_fields().any(|d| d == *f))
            .collect();
        let before = cached.clone();
        cached.copy_fields_from(wanted, local_only);
        if *cached != before {
            debug!(id = %id, "cached-only fields refreshed");
            self.store.put(cached)?;
        }
        Ok(())
    }

    // ── Retire ───────────────────────────────────────────────────

    /// Removes the aliases, closes the account and renames it with a
    /// deletion marker. The cache is written only once all of this is
    /// confirmed.
    fn retire(&mut self, id: &AccountId, cached: &mut AccountRecord, now: DeletionMarker) -> SyncResult<bool> {
        let Some(mail) = cached.mail().map(str::to_string) else {
            error!(id = %id, "cached account has no mail");
            return Ok(false);
        };
        info!(id = %id, mail = %mail, "retiring account");

        for alias in cached.aliases() {
            if let Err(e) = self
                .retry
                .run(&mut *self.remote, "remove_alias", |r| r.remove_alias(&mail, &alias))
            {
                error!(id = %id, alias = %alias, error = %e, "cannot remove alias");
                return Ok(false);
            }
        }
        if let Err(e) = self.retry.run(&mut *self.remote, "close_account", |r| r.close_account(&mail)) {
            error!(id = %id, error = %e, "cannot close account");
            return Ok(false);
        }
        let retired = now.retired_address(&mail);
        if let Err(e) = self
            .retry
            .run(&mut *self.remote, "rename_account", |r| r.rename_account(&mail, &retired))
        {
            error!(id = %id, to = %retired, error = %e, "cannot rename closed account");
            return Ok(false);
        }
        debug!(id = %id, to = %retired, "account renamed");

        cached.set_aliases(BTreeSet::new());
        cached.set_deletion_marker(Some(now));
        cached.set_mail(retired);
        self.store.put(cached)?;
        Ok(true)
    }

    // ── Aliases ──────────────────────────────────────────────────

    /// Adds aliases the cache does not list yet. Returns the failure count.
    fn add_aliases(&mut self, id: &AccountId, cached: &mut AccountRecord, aliases: &BTreeSet<String>) -> SyncResult<usize> {
        let Some(mail) = cached.mail().map(str::to_string) else {
            return Ok(aliases.len());
        };
        let mut current = cached.aliases();
        let mut failures = 0;
        for alias in aliases.iter().filter(|a| !current.contains(*a)).cloned().collect::<Vec<_>>() {
            info!(id = %id, mail = %mail, alias = %alias, "adding alias");
            match self.retry.run(&mut *self.remote, "add_alias", |r| r.add_alias(&mail, &alias)) {
                Ok(()) => {
                    current.insert(alias);
                    cached.set_aliases(current.clone());
                    self.store.put(cached)?;
                }
                Err(e) => {
                    error!(id = %id, alias = %alias, error = %e, "cannot add alias");
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }

    /// Removes aliases the cache lists. Returns the failure count.
    fn remove_aliases(&mut self, id: &AccountId, cached: &mut AccountRecord, aliases: &BTreeSet<String>) -> SyncResult<usize> {
        let Some(mail) = cached.mail().map(str::to_string) else {
            return Ok(aliases.len());
        };
        let mut current = cached.aliases();
        let mut failures = 0;
        for alias in aliases.iter().filter(|a| current.contains(*a)).cloned().collect::<Vec<_>>() {
            info!(id = %id, mail = %mail, alias = %alias, "removing alias");
            match self.retry.run(&mut *self.remote, "remove_alias", |r| r.remove_alias(&mail, &alias)) {
                Ok(()) => {
                    current.remove(&alias);
                    cached.set_aliases(current.clone());
                    self.store.put(cached)?;
                }
                Err(e) => {
                    error!(id = %id, alias = %alias, error = %e, "cannot remove alias");
                    failures += 1;
                }
            }
        }
        Ok(failures)
    }
}
