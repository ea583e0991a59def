//! Alias table text.
//!
//! ```text
//! # comment
//! postmaster: root
//! team: alice, bob
//! lists::include:/etc/mail/lists
//! ```
//!
//! Local parts on the left, targets (local parts or full addresses) on the
//! right. Include lines, malformed lines and repeated aliases are skipped
//! with a warning.

use crate::error::AliasResult;
use crate::resolver::AliasResolver;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Parsed alias table: alias local part -> targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl AliasTable {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        table.extend_from_text(text);
        table
    }

    /// Adds the lines of `text`. Aliases already present are kept.
    pub fn extend_from_text(&mut self, text: &str) {
        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let bits: Vec<&str> = line.split(':').collect();
            if bits.len() != 2 {
                if bits.len() == 4 && bits[1].is_empty() && bits[2] == "include" {
                    warn!(file = bits[3], "ignoring included alias file");
                } else {
                    warn!(line, "alias line has unknown format");
                }
                continue;
            }

            let alias = bits[0].trim();
            if alias.is_empty() {
                warn!(line, "alias line has no alias");
                continue;
            }
            if self.entries.contains_key(alias) {
                warn!(alias, "duplicate alias");
                continue;
            }
            let targets: BTreeSet<String> = bits[1]
                .split(',')
                .map(|t| t.chars().filter(|c| !c.is_whitespace()).collect::<String>())
                .filter(|t| !t.is_empty())
                .collect();
            if targets.is_empty() {
                warn!(alias, "alias has no target");
                continue;
            }
            debug!(alias, targets = ?targets, "alias read");
            self.entries.insert(alias.to_string(), targets);
        }
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds the table's aliases in `mail_domain`.
    ///
    /// Aliases with several targets, and targets outside the domain, are
    /// skipped. Targets without a domain are taken to be in it.
    pub fn apply(&self, resolver: &mut AliasResolver, mail_domain: &str) -> AliasResult<()> {
        let suffix = format!("@{mail_domain}");
        for (alias, targets) in &self.entries {
            let alias = format!("{alias}{suffix}");
            let mut iter = targets.iter();
            let (Some(target), None) = (iter.next(), iter.next()) else {
                info!(alias = %alias, "ignoring alias with multiple targets");
                continue;
            };
            let target = if target.contains('@') {
                target.clone()
            } else {
                format!("{target}{suffix}")
            };
            if !target.ends_with(&suffix) {
                info!(alias = %alias, target = %target, "ignoring external alias");
                continue;
            }
            resolver.add_alias(&target, &alias)?;
        }
        Ok(())
    }
}
