//! Data models for dayplan

mod day_key;
mod note;
mod plan;
mod sync_conflict;
mod todo;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use day_key::DayKey;
pub use note::Note;
pub use plan::{Plan, Subtask};
pub use sync_conflict::{ConflictResolution, RecordKind, SyncConflict};
pub use todo::Todo;

/// Priority shared by todos and plans. `None` on a record means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown priority '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

/// Stamp a fresh `updatedAt`, never moving it backwards.
pub(crate) fn stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = crate::util::now();
    previous.map_or(now, |previous| previous.max(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn stamp_never_goes_backwards() {
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(stamp(Some(future)), future);
        assert!(stamp(None) <= Utc::now());
    }
}
