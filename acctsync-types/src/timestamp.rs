//! Deletion markers.
//!
//! A retired account is closed on the remote service and renamed to
//! `del-<seconds>-<mail>`. The seconds value is the deletion marker; its
//! presence on a record means the account is soft-deleted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

const RETIRED_PREFIX: &str = "del-";

/// Seconds since the Unix epoch at which an account was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionMarker(i64);

impl DeletionMarker {
    /// Creates a marker for the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Creates a marker from a number of seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the seconds component.
    #[must_use]
    pub const fn secs(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed between this marker and `now`. Negative if the marker
    /// lies in the future. Saturates at the `i64` bounds.
    #[must_use]
    pub const fn age_at(&self, now: i64) -> i64 {
        now.saturating_sub(self.0)
    }

    /// Builds the address a retired account is renamed to.
    #[must_use]
    pub fn retired_address(&self, mail: &str) -> String {
        format!("{RETIRED_PREFIX}{}-{mail}", self.0)
    }

    /// Extracts the marker from a retired address, if the address has the
    /// `del-<digits>-` shape.
    #[must_use]
    pub fn parse_retired_address(address: &str) -> Option<Self> {
        let rest = address.strip_prefix(RETIRED_PREFIX)?;
        let (digits, _) = rest.split_once('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for DeletionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
