use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One persisted record: the domain payload plus bookkeeping.
///
/// Timestamps are written as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem<T> {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> CachedItem<T> {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, payload: T) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// True once the item is more than `retention_days` old.
    pub fn is_expired_at(&self, now: DateTime<Utc>, retention_days: u32) -> bool {
        self.age_at(now) > Duration::days(i64::from(retention_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
        let fresh = CachedItem::new("a", now - Duration::days(29), ());
        let edge = CachedItem::new("b", now - Duration::days(30), ());
        let stale = CachedItem::new("c", now - Duration::days(31), ());

        assert!(!fresh.is_expired_at(now, 30));
        assert!(!edge.is_expired_at(now, 30));
        assert!(stale.is_expired_at(now, 30));
    }

    #[test]
    fn timestamp_is_iso_8601_on_disk() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let json = serde_json::to_value(CachedItem::new("p1", at, 7)).unwrap();
        assert_eq!(json["timestamp"], "2025-01-02T03:04:05Z");
    }
}
