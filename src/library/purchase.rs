//! Purchase grants and bookmarks

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// How long a purchase unlocks content
pub const DEFAULT_PURCHASE_WINDOW_HOURS: i64 = 48;

pub fn default_purchase_window() -> TimeDelta {
    TimeDelta::hours(DEFAULT_PURCHASE_WINDOW_HOURS)
}

/// Time-bounded right of a reader to see a work's content.
///
/// Expired grants stay in the store; validity is computed on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseGrant {
    #[serde(skip_serializing, default)]
    pub id: String,
    #[serde(skip_serializing, default)]
    pub participant_id: String,
    #[serde(skip_serializing, default)]
    pub work_id: String,
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
}

impl PurchaseGrant {
    pub fn new(participant_id: &str, work_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id(),
            participant_id: participant_id.to_string(),
            work_id: work_id.to_string(),
            created_at: now,
        }
    }

    /// Valid while `now <= created_at + window`, at whole-second resolution
    pub fn is_valid_at(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.created_at.timestamp() >= now.timestamp() - window.num_seconds()
    }
}

pub fn has_valid_grant(grants: &[PurchaseGrant], now: DateTime<Utc>, window: TimeDelta) -> bool {
    grants.iter().any(|g| g.is_valid_at(now, window))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(skip_serializing, default)]
    pub id: String,
    #[serde(skip_serializing, default)]
    pub participant_id: String,
    #[serde(skip_serializing, default)]
    pub work_id: String,
    #[serde(rename = "created_date")]
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(participant_id: &str, work_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id(),
            participant_id: participant_id.to_string(),
            work_id: work_id.to_string(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_boundary_is_inclusive() {
        let t = Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap();
        let grant = PurchaseGrant::new("reader", "work", t);

        let window = default_purchase_window();

        assert!(grant.is_valid_at(t, window));
        assert!(grant.is_valid_at(t + TimeDelta::days(2), window));
        assert!(!grant.is_valid_at(t + TimeDelta::days(2) + TimeDelta::seconds(1), window));
    }

    #[test]
    fn test_any_valid_grant_counts() {
        let t = Utc.with_ymd_and_hms(2024, 5, 10, 8, 30, 0).unwrap();
        let grants = vec![
            PurchaseGrant::new("reader", "work", t - TimeDelta::days(10)),
            PurchaseGrant::new("reader", "work", t - TimeDelta::hours(1)),
        ];
        let window = default_purchase_window();
        assert!(has_valid_grant(&grants, t, window));
        assert!(!has_valid_grant(&grants[..1], t, window));
        assert!(!has_valid_grant(&[], t, window));
    }
}
