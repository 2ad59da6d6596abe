use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

/// Inclusive `[first, second]` range over order update timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub first: DateTime<Utc>,
    pub second: DateTime<Utc>,
}

impl Window {
    pub fn new(first: DateTime<Utc>, second: DateTime<Utc>) -> Self {
        Self { first, second }
    }

    /// Parse window bounds from request strings.
    ///
    /// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates, which are
    /// taken as midnight UTC. An inverted window is legal; it simply
    /// matches nothing.
    pub fn parse(first: &str, second: &str) -> DomainResult<Self> {
        Ok(Self {
            first: parse_bound(first)?,
            second: parse_bound(second)?,
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.first <= at && at <= self.second
    }
}

fn parse_bound(raw: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(DomainError::invalid_argument(format!(
        "unparseable date: {raw}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_bounds() {
        let window = Window::parse("2026-08-01T10:30:00Z", "2026-08-02T00:00:00+02:00").unwrap();
        assert_eq!(window.first, Utc.with_ymd_and_hms(2026, 8, 1, 10, 30, 0).unwrap());
        assert_eq!(window.second, Utc.with_ymd_and_hms(2026, 8, 1, 22, 0, 0).unwrap());
    }

    #[test]
    fn parses_bare_dates_as_midnight_utc() {
        let window = Window::parse("2026-08-01", "2026-08-03").unwrap();
        assert_eq!(window.first, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(window.second, Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_unparseable_bounds() {
        let err = Window::parse("not-a-date", "2026-08-01").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));

        let err = Window::parse("2026-08-01", "01/08/2026").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn bounds_are_inclusive() {
        let window = Window::parse("2026-08-01", "2026-08-02").unwrap();
        assert!(window.contains(window.first));
        assert!(window.contains(window.second));
        assert!(!window.contains(window.second + chrono::Duration::seconds(1)));
        assert!(!window.contains(window.first - chrono::Duration::seconds(1)));
    }

    #[test]
    fn inverted_window_matches_nothing() {
        let window = Window::parse("2026-08-02", "2026-08-01").unwrap();
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()));
        assert!(!window.contains(window.first));
        assert!(!window.contains(window.second));
    }
}
