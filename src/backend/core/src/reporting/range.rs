//! Inclusive date ranges and channel-sized splitting.
//!
//! Ad platforms cap how many days one report request may cover, and the cap
//! differs per channel. A sync therefore asks for one wide lookback range and
//! splits it into consecutive chunks no longer than the channel's cap before
//! requesting anything.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AdsyncError, ErrorCode, Result};

/// An inclusive calendar date range. Both endpoints are covered days, so a
/// single-day range has `since == until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `since > until`.
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self> {
        if since > until {
            return Err(AdsyncError::new(
                ErrorCode::InvalidDateRange,
                format!("Date range start {} is after end {}", since, until),
            ));
        }
        Ok(Self { since, until })
    }

    /// Number of covered days. Never zero.
    pub fn days(&self) -> u64 {
        (self.until - self.since).num_days() as u64 + 1
    }

    /// Split into consecutive chunks of at most `max_period_days` days.
    ///
    /// Chunks tile the range exactly: the first starts at `since`, each next
    /// chunk starts the day after the previous one ends, and the last ends at
    /// `until`. Only the final chunk may be shorter than the cap. A range
    /// already within the cap comes back as a single chunk.
    pub fn split(&self, max_period_days: u32) -> Result<Vec<DateRange>> {
        if max_period_days == 0 {
            return Err(AdsyncError::new(
                ErrorCode::InvalidInput,
                "Maximum period must be at least one day",
            ));
        }

        let mut chunks = Vec::new();
        let mut start = self.since;
        while start <= self.until {
            let capped_end = start + Days::new(u64::from(max_period_days) - 1);
            let end = capped_end.min(self.until);
            chunks.push(DateRange {
                since: start,
                until: end,
            });
            match end.checked_add_days(Days::new(1)) {
                Some(next) => start = next,
                None => break,
            }
        }
        Ok(chunks)
    }

    /// The lookback range of `days` days ending yesterday, relative to
    /// `today`.
    pub fn lookback(today: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(AdsyncError::new(
                ErrorCode::InvalidInput,
                "Lookback must cover at least one day",
            ));
        }
        let until = today - Days::new(1);
        let since = until - Days::new(u64::from(days) - 1);
        Ok(Self { since, until })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.since, self.until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 1, 1)).unwrap();
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = DateRange::new(date(2021, 1, 2), date(2021, 1, 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDateRange);
    }

    #[test]
    fn test_split_within_cap_is_single_chunk() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 1, 5)).unwrap();
        let chunks = range.split(90).unwrap();
        assert_eq!(chunks, vec![range]);
    }

    #[test]
    fn test_split_one_day_over_cap() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 4, 1)).unwrap();
        let chunks = range.split(90).unwrap();
        assert_eq!(
            chunks,
            vec![
                DateRange::new(date(2021, 1, 1), date(2021, 3, 31)).unwrap(),
                DateRange::new(date(2021, 4, 1), date(2021, 4, 1)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_split_multiple_full_chunks() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 6, 30)).unwrap();
        let chunks = range.split(90).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].since, date(2021, 1, 1));
        assert_eq!(chunks[0].until, date(2021, 3, 31));
        assert_eq!(chunks[1].since, date(2021, 4, 1));
        assert_eq!(chunks[1].until, date(2021, 6, 29));
        assert_eq!(chunks[2].since, date(2021, 6, 30));
        assert_eq!(chunks[2].until, date(2021, 6, 30));
    }

    #[test]
    fn test_split_tiles_exactly() {
        let range = DateRange::new(date(2020, 2, 1), date(2021, 3, 17)).unwrap();
        let chunks = range.split(31).unwrap();

        assert_eq!(chunks.first().unwrap().since, range.since);
        assert_eq!(chunks.last().unwrap().until, range.until);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].since, pair[0].until + Days::new(1));
        }
        let covered: u64 = chunks.iter().map(|c| c.days()).sum();
        assert_eq!(covered, range.days());
        assert!(chunks.iter().all(|c| c.days() <= 31));
    }

    #[test]
    fn test_split_zero_cap_rejected() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 1, 5)).unwrap();
        assert!(range.split(0).is_err());
    }

    #[test]
    fn test_lookback_ends_yesterday() {
        let range = DateRange::lookback(date(2021, 6, 15), 7).unwrap();
        assert_eq!(range.until, date(2021, 6, 14));
        assert_eq!(range.since, date(2021, 6, 8));
        assert_eq!(range.days(), 7);
    }

    #[test]
    fn test_lookback_single_day() {
        let range = DateRange::lookback(date(2021, 6, 15), 1).unwrap();
        assert_eq!(range.since, date(2021, 6, 14));
        assert_eq!(range.until, date(2021, 6, 14));
    }

    #[test]
    fn test_lookback_across_year_boundary() {
        let range = DateRange::lookback(date(2022, 1, 3), 7).unwrap();
        assert_eq!(range.since, date(2021, 12, 27));
        assert_eq!(range.until, date(2022, 1, 2));
    }
}
