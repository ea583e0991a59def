use crate::error::{AliasError, AliasResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Alias -> main account mapping with its reverse index.
///
/// Every alias maps directly to a main account, never to another alias:
/// inserting `b -> c` when `a -> b` exists re-points `a` to `c`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasResolver {
    forward: BTreeMap<String, String>,
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl AliasResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `alias` to `target`, or to the account `target` is an alias of.
    ///
    /// Rebinding an alias to the account it already resolves to is a no-op.
    pub fn add_alias(&mut self, target: &str, alias: &str) -> AliasResult<()> {
        debug!(alias, target, "adding alias");
        if target == alias {
            return Err(AliasError::Cycle(alias.to_string()));
        }
        let resolved = self.resolve_chain(target)?;
        if resolved == alias {
            return Ok(());
        }

        if let Some(existing) = self.forward.get(alias) {
            if *existing == resolved {
                return Ok(());
            }
            return Err(AliasError::Duplicate {
                alias: alias.to_string(),
                existing: existing.clone(),
                requested: resolved,
            });
        }

        self.forward.insert(alias.to_string(), resolved.clone());
        let mut merged = self.reverse.remove(&resolved).unwrap_or_default();
        merged.insert(alias.to_string());

        // The new alias was a main account: its aliases follow it.
        if let Some(old) = self.reverse.remove(alias) {
            for old_alias in old {
                // `resolved` ends the chain, so it is never an alias itself.
                debug_assert_ne!(old_alias, resolved);
                self.forward.insert(old_alias.clone(), resolved.clone());
                merged.insert(old_alias);
            }
        }
        self.reverse.insert(resolved, merged);
        Ok(())
    }

    fn resolve_chain(&self, target: &str) -> AliasResult<String> {
        let mut current = target;
        let mut steps = 0;
        while let Some(next) = self.forward.get(current) {
            current = next;
            steps += 1;
            if current == target || steps > self.forward.len() {
                return Err(AliasError::Cycle(target.to_string()));
            }
        }
        Ok(current.to_string())
    }

    /// The main account for an address; the address itself if it is not an
    /// alias.
    #[must_use]
    pub fn get_main_account<'a>(&'a self, address: &'a str) -> &'a str {
        self.forward.get(address).map_or(address, String::as_str)
    }

    /// Aliases bound to a main account. Empty for unknown addresses.
    pub fn get_aliases(&self, address: &str) -> AliasResult<BTreeSet<String>> {
        match self.reverse.get(address) {
            Some(aliases) => Ok(aliases.clone()),
            None if self.forward.contains_key(address) => {
                Err(AliasError::IsAnAlias(address.to_string()))
            }
            None => Ok(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn is_alias(&self, address: &str) -> bool {
        self.forward.contains_key(address)
    }

    /// Main accounts that have at least one alias.
    pub fn aliased_accounts(&self) -> impl Iterator<Item = &str> {
        self.reverse.keys().map(String::as_str)
    }

    /// Every bound alias.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.forward.keys().map(String::as_str)
    }

    /// Number of bound aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
