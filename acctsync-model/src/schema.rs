use crate::error::SchemaError;
use crate::template::FieldTemplate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Names of the fields every schema defines.
pub mod fields {
    pub const ID: &str = "id";
    pub const MAIL: &str = "mail";
    pub const SURNAME: &str = "surname";
    pub const GIVEN_NAME: &str = "given_name";
    pub const DISPLAY_NAME: &str = "display_name";
    /// Opaque credential fingerprint (password hash).
    pub const CREDENTIAL: &str = "credential";
    pub const GROUPS: &str = "groups";
    /// Mail address as found in the directory, before domain rewriting.
    pub const DIRECTORY_MAIL: &str = "directory_mail";
    pub const DELETION_MARKER: &str = "deletion_marker";
    pub const ALIASES: &str = "aliases";
    /// Class of service name.
    pub const COS: &str = "cos";

    pub const DEFAULTS: [&str; 11] = [
        ID,
        MAIL,
        SURNAME,
        GIVEN_NAME,
        DISPLAY_NAME,
        CREDENTIAL,
        GROUPS,
        DIRECTORY_MAIL,
        DELETION_MARKER,
        ALIASES,
        COS,
    ];
}

/// How a field takes part in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    /// Persisted and compared locally only.
    Storage,
    /// Pushed to the remote service and compared to detect updates.
    Detail,
    /// Sent to the remote service when the account is created, never diffed.
    CreateOnly,
}

/// A field of the account schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub category: FieldCategory,
}

/// Where a field's value comes from in a directory entry.
///
/// If both an attribute and a fallback template are present, the attribute
/// wins and the template is only rendered when the attribute is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSource {
    pub field: String,
    pub attribute: Option<String>,
    pub fallback: Option<FieldTemplate>,
    pub optional: bool,
}

impl AttributeSource {
    /// Required field read from a directory attribute.
    pub fn read(field: &str, attribute: &str) -> Self {
        Self {
            field: field.into(),
            attribute: Some(attribute.into()),
            fallback: None,
            optional: false,
        }
    }

    /// Optional field read from a directory attribute.
    pub fn optional(field: &str, attribute: &str) -> Self {
        Self {
            optional: true,
            ..Self::read(field, attribute)
        }
    }

    /// Required field always generated from a template.
    pub fn generated(field: &str, template: FieldTemplate) -> Self {
        Self {
            field: field.into(),
            attribute: None,
            fallback: Some(template),
            optional: false,
        }
    }

    /// Adds a fallback template used when the attribute is missing.
    #[must_use]
    pub fn or_else(mut self, template: FieldTemplate) -> Self {
        self.fallback = Some(template);
        self
    }
}

/// One remote attribute and the local field it mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMapping {
    pub remote: String,
    pub field: String,
    pub create_only: bool,
}

/// Externally supplied part of the schema definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Domain used to generate identifiers for entries without one.
    pub eppn_domain: String,
    /// Domain used to generate mail addresses.
    pub mail_domain: String,
    /// Additional storage fields.
    pub extra_fields: Vec<String>,
    /// Extra field -> directory attribute. Extra fields read this way are optional.
    pub directory_attributes: BTreeMap<String, String>,
    /// Field -> remote attribute. Each mapped field becomes a detail field.
    pub remote_attributes: BTreeMap<String, String>,
    /// Field -> remote attribute, sent on creation only.
    pub create_only_attributes: BTreeMap<String, String>,
}

impl SchemaConfig {
    pub fn new(eppn_domain: &str, mail_domain: &str) -> Self {
        Self {
            eppn_domain: eppn_domain.into(),
            mail_domain: mail_domain.into(),
            ..Self::default()
        }
    }
}

/// The field partition, directory sources and remote mapping for accounts.
///
/// Built once at startup and passed by reference; it has no mutators.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    sources: Vec<AttributeSource>,
    remote: Vec<RemoteMapping>,
    eppn_domain: String,
    mail_domain: String,
}

impl Schema {
    /// Builds the schema from the built-in defaults plus `config`.
    pub fn new(config: &SchemaConfig) -> Result<Self, SchemaError> {
        // ── Storage fields ───────────────────────────────────────
        let mut names: Vec<String> = fields::DEFAULTS.iter().map(|s| s.to_string()).collect();
        for extra in &config.extra_fields {
            if names.contains(extra) {
                return Err(SchemaError::DuplicateField(extra.clone()));
            }
            names.push(extra.clone());
        }
        let defined = |name: &str| names.iter().any(|n| n == name);

        // ── Directory sources ────────────────────────────────────
        let uid_at = |domain: &str| FieldTemplate::parse(&format!("{{uid}}@{domain}"));
        let mut sources = vec![
            AttributeSource::read(fields::ID, "eduPersonPrincipalName")
                .or_else(uid_at(&config.eppn_domain)?),
            AttributeSource::generated(fields::MAIL, uid_at(&config.mail_domain)?),
            AttributeSource::read(fields::SURNAME, "sn"),
            AttributeSource::read(fields::GIVEN_NAME, "givenName"),
            AttributeSource::read(fields::DISPLAY_NAME, "displayName")
                .or_else(FieldTemplate::parse("{givenName} {sn}")?),
            AttributeSource::optional(fields::DIRECTORY_MAIL, "mail"),
            AttributeSource::read(fields::CREDENTIAL, "userPassword"),
        ];
        for (field, attribute) in &config.directory_attributes {
            if sources.iter().any(|s| &s.field == field) {
                return Err(SchemaError::DuplicateField(field.clone()));
            }
            if !defined(field) {
                return Err(SchemaError::UnknownField(field.clone()));
            }
            sources.push(AttributeSource::optional(field, attribute));
        }

        // ── Remote mapping ───────────────────────────────────────
        let mut remote = vec![
            RemoteMapping {
                remote: "carLicense".into(),
                field: fields::ID.into(),
                create_only: true,
            },
            RemoteMapping {
                remote: "sn".into(),
                field: fields::SURNAME.into(),
                create_only: false,
            },
            RemoteMapping {
                remote: "givenName".into(),
                field: fields::GIVEN_NAME.into(),
                create_only: false,
            },
            RemoteMapping {
                remote: "displayName".into(),
                field: fields::DISPLAY_NAME.into(),
                create_only: false,
            },
        ];
        let mut details: BTreeSet<String> = [
            fields::SURNAME,
            fields::GIVEN_NAME,
            fields::DISPLAY_NAME,
            fields::COS,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let mut create_only: BTreeSet<String> = [fields::ID.to_string()].into();

        let extras = config
            .remote_attributes
            .iter()
            .map(|(f, r)| (f, r, false))
            .chain(config.create_only_attributes.iter().map(|(f, r)| (f, r, true)));
        for (field, remote_attr, is_create_only) in extras {
            if !defined(field) {
                return Err(SchemaError::UnknownField(field.clone()));
            }
            if remote.iter().any(|m| &m.remote == remote_attr) {
                return Err(SchemaError::DuplicateRemoteAttribute(remote_attr.clone()));
            }
            let (target, other) = if is_create_only {
                (&mut create_only, &details)
            } else {
                (&mut details, &create_only)
            };
            if other.contains(field) {
                return Err(SchemaError::ConflictingCategory(field.clone()));
            }
            target.insert(field.clone());
            remote.push(RemoteMapping {
                remote: remote_attr.clone(),
                field: field.clone(),
                create_only: is_create_only,
            });
        }

        // ── Partition ────────────────────────────────────────────
        let fields: Vec<FieldDef> = names
            .into_iter()
            .map(|name| {
                let category = if details.contains(&name) {
                    FieldCategory::Detail
                } else if create_only.contains(&name) {
                    FieldCategory::CreateOnly
                } else {
                    FieldCategory::Storage
                };
                FieldDef { name, category }
            })
            .collect();
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        debug!(
            fields = fields.len(),
            details = ?details,
            create_only = ?create_only,
            "account schema initialized"
        );

        Ok(Self {
            fields,
            index,
            sources,
            remote,
            eppn_domain: config.eppn_domain.clone(),
            mail_domain: config.mail_domain.clone(),
        })
    }

    /// All fields, defaults first, in definition order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fails with [`SchemaError::UnknownField`] if `name` is not defined.
    pub fn require(&self, name: &str) -> Result<(), SchemaError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(SchemaError::UnknownField(name.to_string()))
        }
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<FieldCategory> {
        self.index.get(name).map(|&i| self.fields[i].category)
    }

    /// Fields pushed to the remote service and compared for updates.
    pub fn detail_fields(&self) -> impl Iterator<Item = &str> {
        self.in_category(FieldCategory::Detail)
    }

    pub fn create_only_fields(&self) -> impl Iterator<Item = &str> {
        self.in_category(FieldCategory::CreateOnly)
    }

    fn in_category(&self, category: FieldCategory) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.category == category)
            .map(|f| f.name.as_str())
    }

    /// Directory attribute descriptors, in evaluation order.
    #[must_use]
    pub fn sources(&self) -> &[AttributeSource] {
        &self.sources
    }

    /// Remote attribute mappings, in definition order.
    #[must_use]
    pub fn remote_mappings(&self) -> &[RemoteMapping] {
        &self.remote
    }

    #[must_use]
    pub fn eppn_domain(&self) -> &str {
        &self.eppn_domain
    }

    #[must_use]
    pub fn mail_domain(&self) -> &str {
        &self.mail_domain
    }
}
