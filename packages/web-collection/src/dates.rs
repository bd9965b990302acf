//! Date-range chunking for time-bounded search.
//!
//! Search engines cap how many results one query returns, so a long date
//! range is split into chunks of at most a year and each chunk is searched
//! separately.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InputError;

/// Longest chunk, in days (inclusive).
pub const MAX_DAYS_PER_CHUNK: u64 = 366;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive date range; either bound may be open when chunking is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateChunk {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateChunk {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Unbounded on both sides.
    pub fn open() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Inclusive length in days, when both bounds are set.
    pub fn len_days(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_days() + 1),
            _ => None,
        }
    }
}

/// Parse a `YYYY-MM-DD` date, naming the argument on failure.
pub fn parse_date(argument: &'static str, value: &str) -> Result<NaiveDate, InputError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| InputError::InvalidDate {
        argument,
        value: value.to_string(),
    })
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Split `[start, end]` into contiguous chunks of at most a year.
///
/// Chunk count is `ceil(total / 366)` and chunks span `floor(total / count)`
/// days. The remainder is absorbed at the tail, one extra day per chunk from
/// the end, so no chunk exceeds 366 days; the last chunk ends exactly at `end`.
pub fn chunk_date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<DateChunk>, InputError> {
    if end < start {
        return Err(InputError::InvertedDateRange {
            start: format_date(start),
            end: format_date(end),
        });
    }

    let total_days = (end - start).num_days() as u64 + 1;
    let num_chunks = total_days.div_ceil(MAX_DAYS_PER_CHUNK).max(1);
    let days_per_chunk = total_days / num_chunks;
    let remainder = total_days % num_chunks;

    let mut chunks = Vec::with_capacity(num_chunks as usize);
    let mut current_start = start;

    for i in 0..num_chunks {
        let chunk_end = if i == num_chunks - 1 {
            end
        } else {
            let extra = u64::from(i >= num_chunks - remainder);
            current_start
                .checked_add_days(Days::new(days_per_chunk + extra - 1))
                .ok_or(InputError::DateOutOfRange)?
        };
        chunks.push(DateChunk::new(current_start, chunk_end));

        if chunk_end < end {
            current_start = chunk_end.succ_opt().ok_or(InputError::DateOutOfRange)?;
        }
    }

    Ok(chunks)
}

/// String-input form of [`chunk_date_range`].
pub fn get_date_chunks(start_date: &str, end_date: &str) -> Result<Vec<DateChunk>, InputError> {
    let start = parse_date("start_date", start_date)?;
    let end = parse_date("end_date", end_date)?;
    chunk_date_range(start, end)
}

/// Chunks to search for one retrieval run.
///
/// Without chunking, a single chunk carries whatever bounds were given.
/// Dates are validated either way.
pub fn date_chunks_for_retrieval(
    start_date: Option<&str>,
    end_date: Option<&str>,
    time_chunking: bool,
) -> Result<Vec<DateChunk>, InputError> {
    let start = start_date.map(|s| parse_date("start_date", s)).transpose()?;
    let end = end_date.map(|s| parse_date("end_date", s)).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(InputError::InvertedDateRange {
                start: format_date(start),
                end: format_date(end),
            });
        }
    }

    if !time_chunking {
        return Ok(vec![DateChunk { start, end }]);
    }

    let (Some(start), Some(end)) = (start, end) else {
        return Err(InputError::MissingDateBound);
    };
    let chunks = chunk_date_range(start, end)?;
    debug!(chunks = chunks.len(), "Created date chunks for time chunking");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_short_range_single_chunk() {
        let chunks = get_date_chunks("2020-01-01", "2020-01-10").unwrap();
        assert_eq!(chunks, vec![DateChunk::new(d("2020-01-01"), d("2020-01-10"))]);

        let unchunked =
            date_chunks_for_retrieval(Some("2020-01-01"), Some("2020-01-10"), false).unwrap();
        assert_eq!(unchunked, chunks);
    }

    #[test]
    fn test_single_day() {
        let chunks = get_date_chunks("2021-05-05", "2021-05-05").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len_days(), Some(1));
    }

    #[test]
    fn test_exactly_366_days_is_one_chunk() {
        let chunks = get_date_chunks("2020-01-01", "2020-12-31").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len_days(), Some(366));
    }

    #[test]
    fn test_400_days_two_chunks() {
        let start = d("2020-01-01");
        let end = start + chrono::Duration::days(399);
        let chunks = chunk_date_range(start, end).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], DateChunk::new(d("2020-01-01"), d("2020-07-18")));
        assert_eq!(chunks[0].len_days(), Some(200));
        assert_eq!(chunks[1].start, Some(d("2020-07-19")));
        assert_eq!(chunks[1].end, Some(end));
        assert_eq!(chunks[1].len_days(), Some(200));
    }

    #[test]
    fn test_remainder_goes_to_last_chunk() {
        // 1100 days -> 4 even chunks; 1101 days -> the last chunk takes the spare day
        let start = d("2000-01-01");
        let end = start + chrono::Duration::days(3 * 366 + 1);
        let chunks = chunk_date_range(start, end).unwrap();

        assert_eq!(chunks.len(), 4);
        let lens: Vec<_> = chunks.iter().map(|c| c.len_days().unwrap()).collect();
        assert_eq!(lens, vec![275, 275, 275, 275]);

        let end = start + chrono::Duration::days(3 * 366 + 2);
        let lens: Vec<_> = chunk_date_range(start, end)
            .unwrap()
            .iter()
            .map(|c| c.len_days().unwrap())
            .collect();
        assert_eq!(lens, vec![275, 275, 275, 276]);
    }

    #[test]
    fn test_large_remainder_stays_within_a_year() {
        // 1097 days -> 3 chunks of 365 with 2 days left over
        let start = d("2001-01-01");
        let end = start + chrono::Duration::days(1096);
        let lens: Vec<_> = chunk_date_range(start, end)
            .unwrap()
            .iter()
            .map(|c| c.len_days().unwrap())
            .collect();
        assert_eq!(lens, vec![365, 366, 366]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            get_date_chunks("2020-02-30", "2020-03-01"),
            Err(InputError::InvalidDate { argument: "start_date", .. })
        ));
        assert!(matches!(
            get_date_chunks("2020-03-01", "not a date"),
            Err(InputError::InvalidDate { argument: "end_date", .. })
        ));
        assert!(matches!(
            get_date_chunks("2020-03-02", "2020-03-01"),
            Err(InputError::InvertedDateRange { .. })
        ));
        assert_eq!(
            date_chunks_for_retrieval(Some("2020-01-01"), None, true),
            Err(InputError::MissingDateBound)
        );
    }

    #[test]
    fn test_unchunked_keeps_open_bounds() {
        let chunks = date_chunks_for_retrieval(None, Some("2022-06-01"), false).unwrap();
        assert_eq!(
            chunks,
            vec![DateChunk {
                start: None,
                end: Some(d("2022-06-01"))
            }]
        );
        assert_eq!(date_chunks_for_retrieval(None, None, false).unwrap(), vec![DateChunk::open()]);
    }

    proptest! {
        #[test]
        fn prop_chunks_partition_range(offset in 0i64..20_000, span in 0i64..5_000) {
            let start = d("1970-01-01") + chrono::Duration::days(offset);
            let end = start + chrono::Duration::days(span);
            let chunks = chunk_date_range(start, end).unwrap();

            prop_assert_eq!(chunks[0].start, Some(start));
            prop_assert_eq!(chunks.last().unwrap().end, Some(end));

            let mut total = 0;
            for pair in chunks.windows(2) {
                let next_start = pair[0].end.unwrap().succ_opt().unwrap();
                prop_assert_eq!(pair[1].start, Some(next_start));
            }
            for chunk in &chunks {
                let len = chunk.len_days().unwrap();
                prop_assert!(len >= 1 && len <= MAX_DAYS_PER_CHUNK as i64);
                total += len;
            }
            prop_assert_eq!(total, span + 1);
        }
    }
}
