use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of the calendar date and write timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Calendar date that `today` counts belong to.
    fn today(&self) -> NaiveDate;

    fn now(&self) -> DateTime<Utc>;
}

/// Local calendar date, UTC timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at noon UTC on a given date, for tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    date: NaiveDate,
}

#[cfg(test)]
impl FixedClock {
    pub fn on(date: NaiveDate) -> Self {
        Self { date }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }

    fn now(&self) -> DateTime<Utc> {
        self.date.and_time(chrono::NaiveTime::MIN).and_utc() + chrono::TimeDelta::hours(12)
    }
}
