use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted counter document.
///
/// Missing fields decode as zero so older or hand-edited files still load. A
/// missing `today_date` never equals the current date, so the next bump
/// resets `today`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterRecord {
    pub total: u64,
    pub today: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub history: History,
}

impl CounterRecord {
    /// A zeroed record dated `today`.
    pub fn fresh(today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            today: 0,
            today_date: Some(today),
            ts: Some(timestamp(now)),
            history: History::default(),
        }
    }

    /// A zeroed record dated `today` that has never been written.
    pub fn unwritten(today: NaiveDate) -> Self {
        Self {
            today_date: Some(today),
            ..Self::default()
        }
    }

    /// Count one generation made on `today`.
    pub fn count_generation(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        if self.today_date != Some(today) {
            self.today = 0;
            self.today_date = Some(today);
        }
        self.today += 1;
        self.total += 1;
        self.history.bump(today.weekday());
        self.ts = Some(timestamp(now));
    }
}

/// Per-weekday generation counts.
///
/// Buckets accumulate across weeks; nothing ever ages out. Keys other than
/// the seven weekdays are carried through rewrites unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct History {
    #[serde(rename = "Mon")]
    pub mon: u64,
    #[serde(rename = "Tue")]
    pub tue: u64,
    #[serde(rename = "Wed")]
    pub wed: u64,
    #[serde(rename = "Thu")]
    pub thu: u64,
    #[serde(rename = "Fri")]
    pub fri: u64,
    #[serde(rename = "Sat")]
    pub sat: u64,
    #[serde(rename = "Sun")]
    pub sun: u64,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl History {
    pub fn get(&self, day: Weekday) -> u64 {
        match day {
            Weekday::Mon => self.mon,
            Weekday::Tue => self.tue,
            Weekday::Wed => self.wed,
            Weekday::Thu => self.thu,
            Weekday::Fri => self.fri,
            Weekday::Sat => self.sat,
            Weekday::Sun => self.sun,
        }
    }

    fn bucket_mut(&mut self, day: Weekday) -> &mut u64 {
        match day {
            Weekday::Mon => &mut self.mon,
            Weekday::Tue => &mut self.tue,
            Weekday::Wed => &mut self.wed,
            Weekday::Thu => &mut self.thu,
            Weekday::Fri => &mut self.fri,
            Weekday::Sat => &mut self.sat,
            Weekday::Sun => &mut self.sun,
        }
    }

    pub fn bump(&mut self, day: Weekday) {
        *self.bucket_mut(day) += 1;
    }

    pub fn sum(&self) -> u64 {
        self.mon + self.tue + self.wed + self.thu + self.fri + self.sat + self.sun
    }
}

/// ISO-8601 UTC with microseconds and a `Z` suffix.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}
