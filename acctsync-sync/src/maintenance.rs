//! Maintenance operations on the local cache and the remote service.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteAccountService;
use crate::retry::RetryPolicy;
use acctsync_model::{AccountRecord, ClassOfServiceMap, Schema};
use acctsync_rules::Rule;
use acctsync_storage::LocalStore;
use acctsync_types::{AccountId, DeletionMarker};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

const SECONDS_PER_DAY: i64 = 86_400;

// ── Purge ────────────────────────────────────────────────────────

/// Outcome of [`purge_retired`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub purged: Vec<AccountId>,
    pub failed: Vec<AccountId>,
}

/// Accounts retired at least `threshold_days` before `now`.
pub fn purge_candidates(
    store: &dyn LocalStore,
    threshold_days: i64,
    now: DeletionMarker,
) -> SyncResult<Vec<(AccountId, AccountRecord)>> {
    if threshold_days <= 0 {
        return Err(SyncError::Fatal(format!(
            "invalid deletion threshold {threshold_days}"
        )));
    }
    let threshold = threshold_days.saturating_mul(SECONDS_PER_DAY);
    info!(days = threshold_days, "deletion threshold");
    Ok(store
        .load_all()?
        .into_iter()
        .filter(|(_, r)| {
            r.deletion_marker()
                .is_some_and(|m| m.age_at(now.secs()) >= threshold)
        })
        .collect())
}

/// Deletes old retired accounts remotely, then from the cache.
///
/// A record is removed from the cache only once the remote deletion is
/// confirmed.
pub fn purge_retired<R>(
    store: &dyn LocalStore,
    remote: &mut R,
    retry: &RetryPolicy,
    threshold_days: i64,
    now: DeletionMarker,
) -> SyncResult<PurgeReport>
where
    R: RemoteAccountService + ?Sized,
{
    let mut report = PurgeReport::default();
    let candidates = purge_candidates(store, threshold_days, now)?;
    info!(count = candidates.len(), "accounts to purge");
    for (id, record) in candidates {
        let Some(mail) = record.mail() else {
            error!(id = %id, "retired account has no mail");
            report.failed.push(id);
            continue;
        };
        info!(id = %id, mail = %mail, "deleting account");
        match retry.run(&mut *remote, "delete_account", |r| r.delete_account(mail)) {
            Ok(()) => {
                store.delete(&id)?;
                report.purged.push(id);
            }
            Err(e) => {
                error!(id = %id, error = %e, "account deletion failed");
                report.failed.push(id);
            }
        }
    }
    Ok(report)
}

// ── Import / export ──────────────────────────────────────────────

/// Outcome of [`load_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub added: Vec<AccountId>,
    pub overwritten: Vec<AccountId>,
    /// Already cached and left alone.
    pub kept: Vec<AccountId>,
    /// Rejected by the selection rule.
    pub excluded: usize,
}

/// Parses an export: a JSON object mapping identifiers to records.
pub fn parse_export(schema: &Schema, json: &str) -> SyncResult<BTreeMap<AccountId, AccountRecord>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SyncError::Fatal(format!("invalid record export: {e}")))?;
    let Value::Object(entries) = value else {
        return Err(SyncError::Fatal("record export is not a JSON object".into()));
    };
    let mut records = BTreeMap::new();
    for (key, raw) in entries {
        let id = AccountId::parse(&key)
            .map_err(|e| SyncError::Fatal(format!("record export: {e}")))?;
        let mut record = AccountRecord::from_json(schema, &raw)
            .map_err(|e| SyncError::Fatal(format!("record export, account {id}: {e}")))?;
        if record.id().as_ref() != Some(&id) {
            debug!(id = %id, "record identifier taken from export key");
            record.set_id(&id);
        }
        records.insert(id, record);
    }
    Ok(records)
}

/// Imports records from an export into the cache.
///
/// Only records matching `selection` are considered. Cached records are
/// kept unless `overwrite` is set.
pub fn load_records(
    store: &dyn LocalStore,
    schema: &Schema,
    json: &str,
    selection: &Rule,
    overwrite: bool,
) -> SyncResult<LoadReport> {
    let incoming = parse_export(schema, json)?;
    let cached = store.load_all()?;
    let mut report = LoadReport::default();
    let mut writes = Vec::new();

    for (id, record) in incoming {
        if !selection.check(&record) {
            report.excluded += 1;
            continue;
        }
        if cached.contains_key(&id) {
            if !overwrite {
                info!(id = %id, "record already cached");
                report.kept.push(id);
                continue;
            }
            info!(id = %id, "overwriting cached record");
            report.overwritten.push(id);
        } else {
            info!(id = %id, "adding record");
            report.added.push(id);
        }
        writes.push(record);
    }
    store.put_many(&writes)?;
    Ok(report)
}

/// Encodes records in the export format.
pub fn export_records(
    schema: &Schema,
    records: &BTreeMap<AccountId, AccountRecord>,
) -> SyncResult<String> {
    let object: Map<String, Value> = records
        .iter()
        .map(|(id, r)| (id.to_string(), r.to_json(schema)))
        .collect();
    serde_json::to_string_pretty(&Value::Object(object))
        .map_err(|e| SyncError::Fatal(format!("cannot encode records: {e}")))
}

// ── Class-of-service renames ─────────────────────────────────────

/// Reads `old,new` rows. Rows of another width and repeated old names are
/// fatal.
pub fn parse_cos_substitutions(text: &str) -> SyncResult<BTreeMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut substitutions = BTreeMap::new();
    for (index, row) in reader.records().enumerate() {
        let line = index + 1;
        let row = row.map_err(|e| SyncError::Fatal(format!("line {line}: {e}")))?;
        if row.len() != 2 {
            return Err(SyncError::Fatal(format!(
                "line {line}: 2 fields expected, {} found",
                row.len()
            )));
        }
        let (old, new) = (row[0].trim().to_string(), row[1].trim().to_string());
        if substitutions.contains_key(&old) {
            return Err(SyncError::Fatal(format!(
                "line {line}: several entries for class of service {old}"
            )));
        }
        if old == new {
            warn!(line, cos = %old, "class of service renamed to itself");
        }
        substitutions.insert(old, new);
    }
    Ok(substitutions)
}

/// Renames classes of service in the cache. Returns the number of records
/// changed.
///
/// Every new name must exist in `coses`; with `check_remote` unset, missing
/// names are only warned about.
pub fn rename_classes_of_service(
    store: &dyn LocalStore,
    substitutions: &BTreeMap<String, String>,
    coses: &ClassOfServiceMap,
    check_remote: bool,
) -> SyncResult<usize> {
    let missing: Vec<&str> = substitutions
        .values()
        .filter(|n| !coses.contains(n))
        .map(String::as_str)
        .collect();
    for name in &missing {
        if check_remote {
            error!(cos = %name, "class of service not found remotely");
        } else {
            warn!(cos = %name, "class of service not found remotely");
        }
    }
    if check_remote && !missing.is_empty() {
        return Err(SyncError::Fatal(format!(
            "unknown classes of service: {}",
            missing.join(", ")
        )));
    }

    let mut changed = 0;
    for (id, mut record) in store.load_all()? {
        let Some(new) = record.cos().and_then(|c| substitutions.get(c)).cloned() else {
            continue;
        };
        debug!(id = %id, cos = %new, "class of service renamed");
        record.set_cos(new);
        store.put(&record)?;
        changed += 1;
    }
    info!(count = changed, "records updated");
    Ok(changed)
}
