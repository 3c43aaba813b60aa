//! Generation counters persisted as a single JSON document.

mod clock;
mod record;
mod store;

#[cfg(test)]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use record::{CounterRecord, History, timestamp};
pub use store::{BumpOutcome, CounterStore, StoreError};
