use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phases of an election, derived from its voting window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// The voting window has not opened yet.
    Upcoming,
    /// Votes are being accepted.
    Ongoing,
    /// The voting window has closed.
    Completed,
}

impl ElectionStatus {
    /// Status of an election with window `[start, end)` at time `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now < end {
            Self::Ongoing
        } else {
            Self::Completed
        }
    }

    pub fn is_votable(self) -> bool {
        self == Self::Ongoing
    }
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_follows_window() {
        let start = Utc::now();
        let end = start + Duration::hours(1);

        assert_eq!(
            ElectionStatus::at(start, end, start - Duration::seconds(1)),
            ElectionStatus::Upcoming
        );
        assert_eq!(ElectionStatus::at(start, end, start), ElectionStatus::Ongoing);
        assert_eq!(
            ElectionStatus::at(start, end, end - Duration::seconds(1)),
            ElectionStatus::Ongoing
        );
        assert_eq!(ElectionStatus::at(start, end, end), ElectionStatus::Completed);
        assert!(!ElectionStatus::Completed.is_votable());
        assert_eq!(ElectionStatus::Ongoing.to_string(), "ongoing");
    }
}
