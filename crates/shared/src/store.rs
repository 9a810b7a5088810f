//! Contract between the schedule facade and whatever backend persists the
//! `lab_schedule` table.
//!
//! Backends hand back loosely typed JSON rows; mapping them onto
//! [`ScheduleEntry`](crate::domain::ScheduleEntry) happens in the facade.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::EntryId;

pub const SCHEDULE_TABLE: &str = "lab_schedule";

/// A raw row as returned by a store, keyed by column name.
pub type StoreRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Location,
    Day,
    TimeSlot,
    Faculty,
    Batch,
    Capacity,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Id,
        Column::Location,
        Column::Day,
        Column::TimeSlot,
        Column::Faculty,
        Column::Batch,
        Column::Capacity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Location => "location",
            Column::Day => "day",
            Column::TimeSlot => "time_slot",
            Column::Faculty => "faculty",
            Column::Batch => "batch",
            Column::Capacity => "capacity",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(Column, FilterValue),
    Gte(Column, i64),
}

/// Conjunction of filters over the schedule table, optionally sorted
/// ascending by one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<Column>,
}

impl SelectQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: Column, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn gte(mut self, column: Column, value: i64) -> Self {
        self.filters.push(Filter::Gte(column, value));
        self
    }

    pub fn order_by(mut self, column: Column) -> Self {
        self.order_by = Some(column);
        self
    }
}

/// Opaque backend failure. Stores do not classify errors further.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreFailure {
    pub message: String,
}

impl StoreFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<StoreRow>, StoreFailure>;

    /// Inserts one row and returns it as stored, including the assigned id.
    async fn insert(&self, row: StoreRow) -> Result<StoreRow, StoreFailure>;

    /// Replaces the given fields of row `id`. `Ok(None)` when no such row.
    async fn update(&self, id: EntryId, patch: StoreRow)
        -> Result<Option<StoreRow>, StoreFailure>;

    /// `Ok(false)` when no such row.
    async fn delete(&self, id: EntryId) -> Result<bool, StoreFailure>;

    async fn ping(&self) -> Result<(), StoreFailure>;
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
