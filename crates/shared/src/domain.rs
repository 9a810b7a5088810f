use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Faculty value stored for a slot nobody occupies.
pub const FREE_FACULTY: &str = "Free";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntryId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown day '{0}'")]
pub struct UnknownWeekday(pub String);

impl FromStr for Weekday {
    type Err = UnknownWeekday;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim();
        Weekday::ALL
            .into_iter()
            .find(|day| {
                day.as_str().eq_ignore_ascii_case(needle)
                    || day.as_str()[..3].eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownWeekday(raw.to_string()))
    }
}

impl TryFrom<String> for Weekday {
    type Error = UnknownWeekday;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Weekday> for String {
    fn from(value: Weekday) -> Self {
        value.as_str().to_string()
    }
}

/// One row of the lab schedule: who holds a location on a given day and slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub location: String,
    pub day: Weekday,
    pub time_slot: String,
    pub faculty: String,
    #[serde(default)]
    pub batch: Option<String>,
    pub capacity: i64,
}

impl ScheduleEntry {
    pub fn is_free(&self) -> bool {
        self.faculty == FREE_FACULTY
    }

    pub fn fields(&self) -> NewScheduleEntry {
        NewScheduleEntry {
            location: self.location.clone(),
            day: self.day,
            time_slot: self.time_slot.clone(),
            faculty: self.faculty.clone(),
            batch: self.batch.clone(),
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScheduleEntry {
    pub location: String,
    pub day: Weekday,
    pub time_slot: String,
    pub faculty: String,
    #[serde(default)]
    pub batch: Option<String>,
    pub capacity: i64,
}

/// Admin edit of an existing entry. `batch: Some(None)` clears the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch: Option<Option<String>>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.faculty.is_none() && self.batch.is_none()
    }
}

// Distinguishes an explicit `null` from a missing key.
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
