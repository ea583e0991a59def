//! Loading the directory side of a sync run.

use crate::config::DirectorySettings;
use crate::error::SyncResult;
use acctsync_aliases::{AliasResolver, AliasTable};
use acctsync_model::{AccountRecord, DirectoryEntry, Schema};
use acctsync_rules::{ClassOfServiceRules, Rule};
use acctsync_types::AccountId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

/// Read access to the authoritative directory.
pub trait DirectorySource {
    /// Every person entry.
    fn entries(&mut self) -> SyncResult<Vec<DirectoryEntry>>;

    /// Group name -> member uids.
    fn groups(&mut self) -> SyncResult<BTreeMap<String, BTreeSet<String>>>;
}

/// Directory accounts ready to be synchronized, by identifier.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    pub accounts: BTreeMap<AccountId, AccountRecord>,
    pub aliases: AliasResolver,
}

/// Builds a [`DirectorySnapshot`] from a [`DirectorySource`].
pub struct DirectoryLoader<'a> {
    schema: &'a Schema,
    settings: &'a DirectorySettings,
    cos_rules: &'a ClassOfServiceRules,
    selection: &'a Rule,
    alias_table: AliasTable,
    domain_rewrite: Option<(String, String)>,
}

impl<'a> DirectoryLoader<'a> {
    pub fn new(
        schema: &'a Schema,
        settings: &'a DirectorySettings,
        cos_rules: &'a ClassOfServiceRules,
        selection: &'a Rule,
    ) -> Self {
        Self {
            schema,
            settings,
            cos_rules,
            selection,
            alias_table: AliasTable::default(),
            domain_rewrite: None,
        }
    }

    /// Extra aliases beyond those derived from directory mail attributes.
    #[must_use]
    pub fn with_alias_table(mut self, table: AliasTable) -> Self {
        self.alias_table = table;
        self
    }

    /// Rewrites addresses in domain `from` to domain `to`.
    #[must_use]
    pub fn with_domain_rewrite(mut self, from: &str, to: &str) -> Self {
        self.domain_rewrite = Some((from.to_string(), to.to_string()));
        self
    }

    /// Reads accounts and groups, then assigns classes of service, aliases
    /// and mail domains, and applies the selection rule.
    ///
    /// Source failures and alias conflicts are fatal; a bad entry is only
    /// skipped.
    pub fn load(&self, source: &mut dyn DirectorySource) -> SyncResult<DirectorySnapshot> {
        let groups = source.groups()?;
        let mut accounts = self.read_accounts(source)?;
        self.attach_groups(&mut accounts, &groups);
        for (id, account) in &mut accounts {
            let cos = self.cos_rules.assign(account).to_string();
            debug!(id = %id, cos = %cos, "class of service assigned");
            account.set_cos(cos);
        }

        let aliases = self.build_aliases(&accounts)?;
        remove_redirect_accounts(&mut accounts, &aliases);
        attach_aliases(&mut accounts, &aliases);
        if let Some((from, to)) = &self.domain_rewrite {
            rewrite_domains(&mut accounts, from, to);
        }

        let before = accounts.len();
        accounts.retain(|id, account| {
            let keep = self.selection.check(account);
            if !keep {
                debug!(id = %id, "account excluded by selection rule");
            }
            keep
        });
        info!(
            selected = accounts.len(),
            excluded = before - accounts.len(),
            "directory snapshot loaded"
        );
        Ok(DirectorySnapshot { accounts, aliases })
    }

    fn read_accounts(
        &self,
        source: &mut dyn DirectorySource,
    ) -> SyncResult<BTreeMap<AccountId, AccountRecord>> {
        let limit = self.settings.limit;
        if limit > 0 {
            warn!(limit, "directory load limited");
        }
        let domain_suffix = format!("@{}", self.settings.mail_domain);
        let mut accounts = BTreeMap::new();
        for entry in source.entries()? {
            let uid = entry.first_text("uid").unwrap_or("?").to_string();
            let record = match AccountRecord::from_directory(self.schema, &entry) {
                Ok(r) => r,
                Err(e) => {
                    error!(uid = %uid, error = %e, "cannot read directory entry");
                    continue;
                }
            };
            let Some(id) = record.id() else {
                error!(uid = %uid, "directory entry has an invalid identifier");
                continue;
            };
            if let Some(mail) = record.directory_mail() {
                if !mail.ends_with(&domain_suffix) {
                    warn!(uid = %uid, mail = %mail, "directory entry redirects elsewhere, skipped");
                    continue;
                }
            }
            debug!(id = %id, "directory account loaded");
            accounts.insert(id, record);
            if accounts.len() == limit {
                break;
            }
        }
        info!(count = accounts.len(), "directory accounts read");
        Ok(accounts)
    }

    fn attach_groups(
        &self,
        accounts: &mut BTreeMap<AccountId, AccountRecord>,
        groups: &BTreeMap<String, BTreeSet<String>>,
    ) {
        for (group, members) in groups {
            for uid in members {
                let id = format!("{}@{}", uid.trim(), self.settings.eppn_domain);
                match accounts.get_mut(id.as_str()) {
                    Some(account) => account.add_group(group),
                    None => warn!(group = %group, member = %id, "unknown group member"),
                }
            }
        }
    }

    fn build_aliases(
        &self,
        accounts: &BTreeMap<AccountId, AccountRecord>,
    ) -> SyncResult<AliasResolver> {
        let suffix = format!("@{}", self.settings.mail_domain);
        let mut aliases = AliasResolver::new();
        for (id, account) in accounts {
            let Some(mail) = account.directory_mail() else {
                continue;
            };
            if mail == id.as_str() || !mail.ends_with(&suffix) {
                continue;
            }
            aliases.add_alias(id.as_str(), mail)?;
        }
        self.alias_table.apply(&mut aliases, &self.settings.mail_domain)?;

        let addresses: BTreeSet<&str> = accounts
            .values()
            .filter_map(AccountRecord::mail)
            .chain(accounts.keys().map(AccountId::as_str))
            .collect();
        let dangling: Vec<&str> = aliases
            .aliased_accounts()
            .filter(|a| !addresses.contains(a))
            .collect();
        if !dangling.is_empty() {
            warn!(targets = %dangling.join(", "), "aliases defined for unknown accounts");
        }
        info!(count = aliases.len(), "aliases defined");
        Ok(aliases)
    }
}

/// Drops accounts whose identifier is an alias of another loaded account.
fn remove_redirect_accounts(
    accounts: &mut BTreeMap<AccountId, AccountRecord>,
    aliases: &AliasResolver,
) {
    let redirects: Vec<AccountId> = accounts
        .keys()
        .filter(|id| {
            let main = aliases.get_main_account(id.as_str());
            main != id.as_str() && accounts.contains_key(main)
        })
        .cloned()
        .collect();
    for id in &redirects {
        info!(id = %id, "account is an alias of another account, ignored");
        accounts.remove(id);
    }
}

fn attach_aliases(accounts: &mut BTreeMap<AccountId, AccountRecord>, aliases: &AliasResolver) {
    let mut claimed = BTreeSet::new();
    for (id, account) in accounts.iter_mut() {
        let main = aliases.get_main_account(id.as_str()).to_string();
        if !claimed.insert(main.clone()) {
            error!(id = %id, main = %main, "account reached through several addresses");
            continue;
        }
        match aliases.get_aliases(&main) {
            Ok(set) => {
                if !set.is_empty() {
                    debug!(id = %id, aliases = ?set, "aliases attached");
                }
                account.set_aliases(set);
            }
            Err(e) => error!(id = %id, error = %e, "cannot attach aliases"),
        }
    }
}

fn rewrite_domains(accounts: &mut BTreeMap<AccountId, AccountRecord>, from: &str, to: &str) {
    let from = format!("@{from}");
    let to = format!("@{to}");
    warn!(from = %from, to = %to, "rewriting mail domain");
    let fix = |addr: &str| match addr.strip_suffix(from.as_str()) {
        Some(local) => format!("{local}{to}"),
        None => addr.to_string(),
    };
    for account in accounts.values_mut() {
        if let Some(mail) = account.mail().map(&fix) {
            account.set_mail(mail);
        }
        let aliases = account.aliases().iter().map(|a| fix(a)).collect();
        account.set_aliases(aliases);
    }
}
