//! Converts a stay interval into billable daytime and nighttime hours.
//!
//! Any hour in which the vehicle was present for any portion bills as a whole hour of that
//! hour's rate class. Calendar days are taken in UTC, matching the clock.

use std::ops::RangeInclusive;

use chrono::{DateTime, Timelike, Utc};

use super::domain::{DayNightWindow, StayHours};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("stay ends at {end} before it starts at {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Billable hours for a stay from `start` to `end`.
///
/// Same calendar day: every hour from `start`'s hour through `end`'s hour, inclusive. Later
/// days: the partial first day through 23:00, the partial last day from 00:00, and a full
/// day's split for every whole day in between.
pub fn compute_hours(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window: DayNightWindow,
) -> Result<StayHours, BillingError> {
    if end < start {
        return Err(BillingError::InvalidInterval { start, end });
    }
    if end == start {
        return Ok(StayHours::default());
    }

    let mut hours = StayHours::default();
    let days_spanned = (end.date_naive() - start.date_naive()).num_days();

    if days_spanned == 0 {
        tally(window, start.hour()..=end.hour(), &mut hours);
        return Ok(hours);
    }

    tally(window, start.hour()..=23, &mut hours);
    tally(window, 0..=end.hour(), &mut hours);

    let whole_days = (days_spanned - 1) as u32;
    hours.daily += whole_days * window.daytime_hours_per_day();
    hours.nightly += whole_days * window.nighttime_hours_per_day();

    Ok(hours)
}

fn tally(window: DayNightWindow, span: RangeInclusive<u32>, hours: &mut StayHours) {
    for hour in span {
        if window.is_daytime(hour) {
            hours.daily += 1;
        } else {
            hours.nightly += 1;
        }
    }
}
