use chrono::Utc;

use crate::derive::derive_rates;
use crate::reading::Reading;

/// One timestamped reading as it enters a chart's history.
///
/// Built once by [`Snapshot::capture`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T: Reading> {
    /// Wall-clock time the response arrived, epoch milliseconds.
    pub timestamp_ms: u64,
    pub reading: T,
    /// Rate fields against the previous series entry; `None` for the first.
    pub rates: Option<T::Rates>,
}

impl<T: Reading> Snapshot<T> {
    /// Stamp `reading` and compute its rate fields from the series tail.
    pub fn capture(reading: T, timestamp_ms: u64, last: Option<&Snapshot<T>>) -> Self {
        let rates = derive_rates(&reading, last);
        Self {
            timestamp_ms,
            reading,
            rates,
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
