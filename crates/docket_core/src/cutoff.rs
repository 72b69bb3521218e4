use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Days to look back from `weekday` so that a run picks up everything filed
/// since the previous business day.
///
/// The offsets are the portal operators' rule as observed: Sunday looks back
/// two days, Monday three, every other day (Saturday included) one.
pub fn days_back(weekday: Weekday) -> u64 {
    match weekday {
        Weekday::Sun => 2,
        Weekday::Mon => 3,
        _ => 1,
    }
}

/// Earliest filing date selected for a run started on `today`.
pub fn cutoff_date(today: NaiveDate) -> NaiveDate {
    let back = days_back(today.weekday());
    today
        .checked_sub_days(Days::new(back))
        .unwrap_or(NaiveDate::MIN)
}
