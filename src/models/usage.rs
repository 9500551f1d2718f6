use chrono::NaiveDate;
use serde::Serialize;

/// Per-(customer, calendar day) submission counters.
///
/// `participation_count` consumes the capped daily participation slots;
/// `summary_count` is the raw accepted-submission tally. Only the admission
/// path writes this record.
#[derive(Debug, Clone, Serialize)]
pub struct DailyUsageRecord {
    pub customer_id: String,
    pub date: NaiveDate,
    pub summary_count: i32,
    pub participation_count: i32,
}
