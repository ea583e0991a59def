//! Layered settings: built-in defaults, then an optional TOML file, then
//! `ACCTSYNC_` environment variables (`__` separates nested keys, e.g.
//! `ACCTSYNC_REMOTE__PAGE_SIZE=50`).

use crate::error::{SyncError, SyncResult};
use acctsync_model::{Schema, SchemaConfig};
use acctsync_rules::{ClassOfServiceRules, Rule, MATCH_ALL};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of the environment variables read by [`SyncSettings::load`].
pub const ENV_PREFIX: &str = "ACCTSYNC_";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SyncSettings {
    #[serde(default)]
    pub directory: DirectorySettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub schema: SchemaSettings,

    /// Class-of-service rules, in evaluation order.
    #[serde(default)]
    pub cos_rules: Vec<CosRuleSetting>,

    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DirectorySettings {
    pub mail_domain: String,
    pub eppn_domain: String,
    /// Only accounts matching this rule are synchronized.
    pub match_rule: String,
    /// Maximum number of accounts to load; 0 for no limit.
    pub limit: usize,
    /// Local field -> directory attribute. An empty attribute leaves the
    /// field out of directory reads.
    pub extra_attributes: BTreeMap<String, String>,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            mail_domain: String::new(),
            eppn_domain: String::new(),
            match_rule: MATCH_ALL.to_string(),
            limit: 0,
            extra_attributes: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RemoteSettings {
    /// Mail domain on the remote service.
    pub domain: String,
    pub default_cos: String,
    pub page_size: usize,
    pub max_attempts: u32,
    /// Age in days after which retired accounts are purged; 0 disables.
    pub deletion_threshold_days: i64,
    /// Local field -> remote attribute, synchronized as detail fields.
    pub extra_attributes: BTreeMap<String, String>,
    /// Keep directory mail domains even if they differ from `domain`.
    pub dont_fix_domains: bool,
    /// Local field -> remote attribute, sent on creation only.
    pub create_only: BTreeMap<String, String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            domain: String::new(),
            default_cos: String::new(),
            page_size: 100,
            max_attempts: 3,
            deletion_threshold_days: 0,
            extra_attributes: BTreeMap::new(),
            dont_fix_domains: false,
            create_only: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SchemaSettings {
    /// Storage fields beyond the built-in ones.
    pub extra_fields: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CosRuleSetting {
    pub name: String,
    pub rule: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("acctsync.db"),
        }
    }
}

/// Rules compiled from settings.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    /// Selects the directory accounts to synchronize.
    pub selection: Rule,
    pub cos: ClassOfServiceRules,
}

impl SyncSettings {
    /// Loads and validates the settings, reading `path` if it exists.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if path.exists() {
                info!(path = %path.display(), "reading settings");
                figment = figment.merge(Toml::file(path));
            }
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Extracts and validates settings from any provider stack.
    pub fn from_figment(figment: Figment) -> SyncResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> SyncResult<()> {
        let require = |value: &str, key: &str| {
            if value.trim().is_empty() {
                Err(SyncError::Config(format!("{key} is required")))
            } else {
                Ok(())
            }
        };
        require(&self.directory.mail_domain, "directory.mail_domain")?;
        require(&self.directory.eppn_domain, "directory.eppn_domain")?;
        require(&self.remote.domain, "remote.domain")?;
        require(&self.remote.default_cos, "remote.default_cos")?;
        if self.remote.page_size == 0 {
            return Err(SyncError::Config("remote.page_size must be positive".into()));
        }
        if self.remote.max_attempts == 0 {
            return Err(SyncError::Config("remote.max_attempts must be positive".into()));
        }
        if self.remote.deletion_threshold_days < 0 {
            return Err(SyncError::Config(
                "remote.deletion_threshold_days must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Builds the account schema.
    pub fn build_schema(&self) -> SyncResult<Schema> {
        let config = SchemaConfig {
            eppn_domain: self.directory.eppn_domain.clone(),
            mail_domain: self.directory.mail_domain.clone(),
            extra_fields: self.schema.extra_fields.clone(),
            directory_attributes: self
                .directory
                .extra_attributes
                .iter()
                .filter(|(_, attribute)| !attribute.is_empty())
                .map(|(f, a)| (f.clone(), a.clone()))
                .collect(),
            remote_attributes: self.remote.extra_attributes.clone(),
            create_only_attributes: self.remote.create_only.clone(),
        };
        Ok(Schema::new(&config)?)
    }

    /// Compiles the selection rule and the class-of-service rules.
    pub fn compile_rules(&self, schema: &Schema) -> SyncResult<CompiledRules> {
        let selection = Rule::compile("match_rule", &self.directory.match_rule, schema)?;
        let cos = ClassOfServiceRules::compile(
            self.remote.default_cos.clone(),
            self.cos_rules
                .iter()
                .map(|r| (r.name.as_str(), r.rule.as_str())),
            schema,
        )?;
        Ok(CompiledRules { selection, cos })
    }

    /// The remote domain directory addresses are rewritten to, if any.
    #[must_use]
    pub fn domain_rewrite(&self) -> Option<(&str, &str)> {
        if self.remote.dont_fix_domains || self.remote.domain == self.directory.mail_domain {
            None
        } else {
            Some((self.directory.mail_domain.as_str(), self.remote.domain.as_str()))
        }
    }
}
