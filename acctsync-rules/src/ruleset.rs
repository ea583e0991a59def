//! Ordered class-of-service assignment.

use crate::error::RuleResult;
use crate::rule::Rule;
use acctsync_model::{AccountRecord, Schema};

/// Class-of-service rules, evaluated in order; the first match wins and the
/// default applies when none matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOfServiceRules {
    rules: Vec<(String, Rule)>,
    default: String,
}

impl ClassOfServiceRules {
    /// A rule set that always assigns `default`.
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default: default.into(),
        }
    }

    /// Compiles `(cos name, rule text)` pairs in order.
    pub fn compile<'a, I>(default: impl Into<String>, rules: I, schema: &Schema) -> RuleResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new(default);
        for (name, text) in rules {
            let rule = Rule::compile(name, text, schema)?;
            set.rules.push((name.to_string(), rule));
        }
        Ok(set)
    }

    /// Class of service for a record.
    #[must_use]
    pub fn assign(&self, record: &AccountRecord) -> &str {
        self.rules
            .iter()
            .find(|(_, rule)| rule.check(record))
            .map_or(self.default.as_str(), |(name, _)| name.as_str())
    }

    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Every class of service name this set can assign.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default.as_str()).chain(self.rules.iter().map(|(n, _)| n.as_str()))
    }
}
