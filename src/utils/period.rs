//! Billing period arithmetic.
//!
//! A period always ends on the last calendar day of a month. Everything here is
//! pure; callers pass "today" explicitly so the rules can be exercised without a clock.

use chrono::{Datelike, Months, NaiveDate, Utc};

/// Current calendar date (UTC) used as the evaluation date for period math.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Last day of the month `d` falls in.
///
/// Only `NaiveDate::MAX`'s month has no successor; it is already a month end.
pub fn last_day_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Last day of the month following `d`'s month. December rolls over into
/// January of the next year.
///
/// Saturates at `NaiveDate::MAX` when the following month is outside chrono's range.
pub fn next_month_last_day(d: NaiveDate) -> NaiveDate {
    last_day_of_month(d)
        .succ_opt()
        .map(last_day_of_month)
        .unwrap_or(NaiveDate::MAX)
}

/// Period end after one renewal. An unprovisioned record renews from `today`.
pub fn renewed_period_end(current: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    next_month_last_day(current.unwrap_or(today))
}
