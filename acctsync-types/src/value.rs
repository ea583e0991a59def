//! Field values and multivalued equivalence.

use std::collections::BTreeSet;
use std::fmt;

/// A single account field value.
///
/// Directory attributes may carry one or several values; several values are
/// kept as an unordered [`FieldValue::Set`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Opaque binary data, e.g. a password hash read from the directory.
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

impl FieldValue {
    /// Builds a set value from any iterator of strings.
    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for collection-valued fields.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Returns true for a collection with no elements.
    #[must_use]
    pub fn is_empty_collection(&self) -> bool {
        matches!(self, Self::Set(s) if s.is_empty())
    }

    /// Number of elements for a collection, 1 for a scalar.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Set(s) => s.len(),
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_empty_collection()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Set(s) => {
                f.write_str("{")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<BTreeSet<String>> for FieldValue {
    fn from(s: BTreeSet<String>) -> Self {
        Self::Set(s)
    }
}

/// Compares two optional field values with multivalued semantics.
///
/// - identical values are equal;
/// - an absent value equals an empty collection;
/// - a scalar `s` equals the one-element collection `{s}`;
/// - two collections compare as sets, two scalars by value;
/// - anything else differs.
#[must_use]
pub fn multivalued_equals(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    if a == b {
        return true;
    }
    let a_coll = a.is_some_and(FieldValue::is_collection);
    let b_coll = b.is_some_and(FieldValue::is_collection);
    if a_coll == b_coll {
        return false;
    }
    let (set, other) = if a_coll { (a, b) } else { (b, a) };
    let Some(FieldValue::Set(set)) = set else {
        return false;
    };
    match other {
        None => set.is_empty(),
        Some(FieldValue::Text(s)) => set.len() == 1 && set.contains(s),
        Some(_) => false,
    }
}
