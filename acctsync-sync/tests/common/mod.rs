//! Shared fixtures: an in-memory remote service with scripted failures, a
//! canned directory and a cache that can be made to fail.

#![allow(dead_code)]

use acctsync_model::{
    fields, AccountRecord, AccountStatus, ClassOfServiceMap, DirectoryEntry, RemoteAccount, Schema,
    SchemaConfig,
};
use acctsync_storage::{LocalStore, SqliteStore, StorageError, StorageResult};
use acctsync_sync::{DirectorySource, RemoteAccountService, RemoteError, RemoteResult, SyncError, SyncResult};
use acctsync_types::AccountId;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

pub const DOMAIN: &str = "example.org";

pub fn make_schema() -> Schema {
    Schema::new(&SchemaConfig::new(DOMAIN, DOMAIN)).unwrap()
}

pub fn make_coses() -> ClassOfServiceMap {
    ClassOfServiceMap::new(cos_pairs())
}

pub fn cos_pairs() -> Vec<(String, String)> {
    vec![
        ("default".to_string(), "cos-0".to_string()),
        ("staff".to_string(), "cos-1".to_string()),
    ]
}

/// Routes log output through the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn make_store() -> SqliteStore {
    init_tracing();
    SqliteStore::open_in_memory(make_schema()).unwrap()
}

pub fn id(s: &str) -> AccountId {
    AccountId::parse(s).unwrap()
}

pub fn addr(uid: &str) -> String {
    format!("{uid}@{DOMAIN}")
}

/// A directory-side record as the loader would produce it.
pub fn make_record(uid: &str) -> AccountRecord {
    let mut r = AccountRecord::new();
    r.set(fields::ID, addr(uid));
    r.set_mail(addr(uid));
    r.set(fields::SURNAME, "Doe");
    r.set(fields::GIVEN_NAME, uid.to_string());
    r.set(fields::DISPLAY_NAME, format!("{uid} Doe"));
    r.set(fields::CREDENTIAL, format!("{{SSHA}}{uid}"));
    r.set_cos("default");
    r
}

pub fn by_id(records: impl IntoIterator<Item = AccountRecord>) -> BTreeMap<AccountId, AccountRecord> {
    records
        .into_iter()
        .map(|r| (r.id().unwrap(), r))
        .collect()
}

pub fn aliases<const N: usize>(items: [&str; N]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Remote ───────────────────────────────────────────────────────

/// In-memory remote service.
///
/// Every call is logged as `"<op> <args...>"`. A scripted failure fires
/// when the call's operation matches and one of its arguments equals the
/// scripted key; it keeps firing until cleared.
#[derive(Debug, Default)]
pub struct FakeRemote {
    pub accounts: BTreeMap<String, RemoteAccount>,
    pub credentials: BTreeMap<String, String>,
    pub coses: Vec<(String, String)>,
    pub calls: Vec<String>,
    pub resets: usize,
    failures: Vec<(String, String, RemoteError)>,
    expired: usize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            coses: cos_pairs(),
            ..Self::default()
        }
    }

    pub fn fail(&mut self, op: &str, key: &str, error: RemoteError) {
        self.failures.push((op.to_string(), key.to_string(), error));
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// The next `n` calls fail with an expired session.
    pub fn expire_sessions(&mut self, n: usize) {
        self.expired = n;
    }

    /// Seeds an account the way the service would store it after a create.
    pub fn seed(&mut self, schema: &Schema, record: &AccountRecord) {
        let mut account = record.to_remote(schema, &make_coses(), true).unwrap();
        account.aliases = record.aliases();
        self.accounts.insert(account.name.clone(), account);
    }

    pub fn calls_to(&self, op: &str) -> Vec<&str> {
        let prefix = format!("{op} ");
        self.calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    fn enter(&mut self, op: &str, args: &[&str]) -> RemoteResult<()> {
        self.calls.push(format!("{op} {}", args.join(" ")));
        if self.expired > 0 {
            self.expired -= 1;
            return Err(RemoteError::AuthExpired);
        }
        let scripted = self
            .failures
            .iter()
            .find(|(o, key, _)| o == op && args.contains(&key.as_str()));
        match scripted {
            Some((_, _, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn account_mut(&mut self, name: &str) -> RemoteResult<&mut RemoteAccount> {
        self.accounts
            .get_mut(name)
            .ok_or_else(|| RemoteError::fault("account.NO_SUCH_ACCOUNT", name))
    }
}

impl RemoteAccountService for FakeRemote {
    fn create_account(&mut self, account: &RemoteAccount, credential: &str) -> RemoteResult<()> {
        self.enter("create_account", &[&account.name])?;
        if self.accounts.contains_key(&account.name) {
            return Err(RemoteError::fault("account.ACCOUNT_EXISTS", &account.name));
        }
        let mut stored = account.clone();
        stored.aliases.clear();
        self.accounts.insert(account.name.clone(), stored);
        self.credentials.insert(account.name.clone(), credential.to_string());
        Ok(())
    }

    fn modify_account(&mut self, account: &RemoteAccount) -> RemoteResult<()> {
        self.enter("modify_account", &[&account.name])?;
        let stored = self.account_mut(&account.name)?;
        stored.attributes.extend(account.attributes.clone());
        stored.cos_id = account.cos_id.clone();
        Ok(())
    }

    fn rename_account(&mut self, name: &str, new_name: &str) -> RemoteResult<()> {
        self.enter("rename_account", &[name, new_name])?;
        let mut account = self
            .accounts
            .remove(name)
            .ok_or_else(|| RemoteError::fault("account.NO_SUCH_ACCOUNT", name))?;
        account.name = new_name.to_string();
        self.accounts.insert(new_name.to_string(), account);
        Ok(())
    }

    fn activate_account(&mut self, name: &str) -> RemoteResult<()> {
        self.enter("activate_account", &[name])?;
        self.account_mut(name)?.status = AccountStatus::Active;
        Ok(())
    }

    fn close_account(&mut self, name: &str) -> RemoteResult<()> {
        self.enter("close_account", &[name])?;
        self.account_mut(name)?.status = AccountStatus::Closed;
        Ok(())
    }

    fn set_credential(&mut self, name: &str, credential: &str) -> RemoteResult<()> {
        self.enter("set_credential", &[name])?;
        self.account_mut(name)?;
        self.credentials.insert(name.to_string(), credential.to_string());
        Ok(())
    }

    fn add_alias(&mut self, name: &str, alias: &str) -> RemoteResult<()> {
        self.enter("add_alias", &[name, alias])?;
        self.account_mut(name)?.aliases.insert(alias.to_string());
        Ok(())
    }

    fn remove_alias(&mut self, name: &str, alias: &str) -> RemoteResult<()> {
        self.enter("remove_alias", &[name, alias])?;
        self.account_mut(name)?.aliases.remove(alias);
        Ok(())
    }

    fn get_account(&mut self, name: &str) -> RemoteResult<RemoteAccount> {
        self.enter("get_account", &[name])?;
        self.account_mut(name).map(|a| a.clone())
    }

    fn list_accounts(&mut self, offset: usize, limit: usize) -> RemoteResult<Vec<String>> {
        self.enter("list_accounts", &[&offset.to_string(), &limit.to_string()])?;
        Ok(self.accounts.keys().skip(offset).take(limit).cloned().collect())
    }

    fn delete_account(&mut self, name: &str) -> RemoteResult<()> {
        self.enter("delete_account", &[name])?;
        self.accounts
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RemoteError::fault("account.NO_SUCH_ACCOUNT", name))
    }

    fn list_classes_of_service(&mut self) -> RemoteResult<Vec<(String, String)>> {
        self.enter("list_classes_of_service", &[])?;
        Ok(self.coses.clone())
    }

    fn reset_session(&mut self) {
        self.resets += 1;
    }
}

// ── Directory ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeDirectory {
    pub entries: Vec<DirectoryEntry>,
    pub groups: BTreeMap<String, BTreeSet<String>>,
    pub unreachable: bool,
}

impl FakeDirectory {
    pub fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        self.groups
            .insert(group.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }
}

impl DirectorySource for FakeDirectory {
    fn entries(&mut self) -> SyncResult<Vec<DirectoryEntry>> {
        if self.unreachable {
            return Err(SyncError::Directory("connection refused".into()));
        }
        Ok(self.entries.clone())
    }

    fn groups(&mut self) -> SyncResult<BTreeMap<String, BTreeSet<String>>> {
        if self.unreachable {
            return Err(SyncError::Directory("connection refused".into()));
        }
        Ok(self.groups.clone())
    }
}

/// A person entry with every required attribute.
pub fn make_entry(uid: &str) -> DirectoryEntry {
    DirectoryEntry::new()
        .with("uid", uid)
        .with("sn", "Doe")
        .with("givenName", uid)
        .with("userPassword", format!("{{SSHA}}{uid}").into_bytes())
}

// ── Cache ────────────────────────────────────────────────────────

/// A SQLite cache whose writes can be switched off.
pub struct FlakyStore {
    pub inner: SqliteStore,
    pub fail_writes: Cell<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: make_store(),
            fail_writes: Cell::new(false),
        }
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.get() {
            Err(StorageError::InvalidData("disk full".into()))
        } else {
            Ok(())
        }
    }
}

impl LocalStore for FlakyStore {
    fn load_all(&self) -> StorageResult<BTreeMap<AccountId, AccountRecord>> {
        self.inner.load_all()
    }

    fn get(&self, id: &AccountId) -> StorageResult<Option<AccountRecord>> {
        self.inner.get(id)
    }

    fn put(&self, record: &AccountRecord) -> StorageResult<()> {
        self.check()?;
        self.inner.put(record)
    }

    fn put_many(&self, records: &[AccountRecord]) -> StorageResult<()> {
        self.check()?;
        self.inner.put_many(records)
    }

    fn delete(&self, id: &AccountId) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(id)
    }

    fn put_data(&self, namespace: &str, key: &str, data: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.put_data(namespace, key, data)
    }

    fn get_data(&self, namespace: &str, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_data(namespace, key)
    }

    fn remove_data(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.remove_data(namespace, key)
    }

    fn list_data(&self, namespace: &str) -> StorageResult<Vec<(String, String)>> {
        self.inner.list_data(namespace)
    }
}
