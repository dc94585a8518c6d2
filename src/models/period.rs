use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BinningError, Result};

/// Time span over which a scene was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationTime {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ObservationTime {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Smallest span covering both
    pub fn union(&self, other: &ObservationTime) -> ObservationTime {
        ObservationTime {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Inclusive range of UTC calendar days.
///
/// A scene passes when it starts on or after the first instant of `start` and ends before
/// the day after `end`. Once either bound is set, scenes without an observation time fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(BinningError::Config(format!(
                    "end date {} is before start date {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn accepts(&self, time: Option<ObservationTime>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(time) = time else {
            return false;
        };

        if let Some(start) = self.start {
            if time.start < first_instant(start) {
                return false;
            }
        }
        if let Some(end) = self.end {
            // None only for the last representable day
            if let Some(next) = end.checked_add_days(Days::new(1)) {
                if time.end >= first_instant(next) {
                    return false;
                }
            }
        }
        true
    }
}

fn first_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn day(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_end_day_is_inclusive() {
        let range = DateRange::new(Some(day("2024-03-01")), Some(day("2024-03-02"))).unwrap();

        let inside = ObservationTime::new(at("2024-03-01T00:00:00Z"), at("2024-03-02T23:59:59Z"));
        assert!(range.accepts(Some(inside)));

        let early = ObservationTime::new(at("2024-02-29T23:50:00Z"), at("2024-03-01T00:10:00Z"));
        assert!(!range.accepts(Some(early)));

        let late = ObservationTime::new(at("2024-03-02T23:50:00Z"), at("2024-03-03T00:00:00Z"));
        assert!(!range.accepts(Some(late)));
    }

    #[test]
    fn test_open_ranges() {
        let scene = ObservationTime::new(at("2024-06-10T12:00:00Z"), at("2024-06-10T12:05:00Z"));
        assert!(DateRange::unbounded().accepts(None));
        assert!(DateRange::unbounded().accepts(Some(scene)));

        let from = DateRange::new(Some(day("2024-06-10")), None).unwrap();
        assert!(from.accepts(Some(scene)));
        assert!(!from.accepts(None));

        let until = DateRange::new(None, Some(day("2024-06-09"))).unwrap();
        assert!(!until.accepts(Some(scene)));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(matches!(
            DateRange::new(Some(day("2024-03-02")), Some(day("2024-03-01"))),
            Err(BinningError::Config(_))
        ));
    }

    #[test]
    fn test_observation_time_is_ordered() {
        let a = at("2024-01-01T10:00:00Z");
        let b = at("2024-01-01T09:00:00Z");
        let time = ObservationTime::new(a, b);
        assert_eq!((time.start, time.end), (b, a));

        let later = ObservationTime::new(at("2024-01-02T00:00:00Z"), at("2024-01-02T01:00:00Z"));
        assert_eq!(time.union(&later).end, later.end);
        assert_eq!(time.union(&later).start, b);
    }
}
