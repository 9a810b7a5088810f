use std::{collections::BTreeSet, fmt, sync::Arc};

use serde_json::{json, Value};
use shared::{
    domain::{EntryId, EntryUpdate, NewScheduleEntry, ScheduleEntry, Weekday},
    error::{ApiError, ErrorCode},
    store::{Column, ScheduleStore, SelectQuery, StoreFailure, StoreRow},
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Handle the HTTP layer and the CLI hold; every operation goes through it.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn ScheduleStore>,
}

impl ApiContext {
    pub fn new(store: impl ScheduleStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("entry {0} not found")]
    NotFound(EntryId),
    #[error("store operation failed: {0}")]
    Store(#[from] StoreFailure),
}

impl FacadeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FacadeError::Validation(_) => ErrorCode::Validation,
            FacadeError::NotFound(_) => ErrorCode::NotFound,
            FacadeError::Store(_) => ErrorCode::Store,
        }
    }
}

impl From<FacadeError> for ApiError {
    fn from(value: FacadeError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Free,
    Occupied {
        faculty: String,
        batch: Option<String>,
    },
    Unknown,
}

/// Summarises a slot from the rows `check_availability` returned. Only the
/// first row counts when the store holds duplicates for one slot.
pub fn availability_of(entries: &[ScheduleEntry]) -> Availability {
    match entries.first() {
        None => Availability::Unknown,
        Some(entry) if entry.is_free() => Availability::Free,
        Some(entry) => Availability::Occupied {
            faculty: entry.faculty.clone(),
            batch: entry.batch.clone(),
        },
    }
}

pub struct SlotDescription<'a> {
    pub availability: &'a Availability,
    pub location: &'a str,
    pub day: Weekday,
    pub time_slot: &'a str,
}

impl fmt::Display for SlotDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (location, day, slot) = (self.location, self.day, self.time_slot);
        match self.availability {
            Availability::Free => write!(f, "{location} is available at {slot} on {day}."),
            Availability::Occupied { faculty, batch } => {
                write!(f, "{location} is occupied by {faculty}")?;
                if let Some(batch) = batch {
                    write!(f, " (Batch: {batch})")?;
                }
                write!(f, " at {slot} on {day}.")
            }
            Availability::Unknown => write!(
                f,
                "No information available for '{location}' at {slot} on {day}."
            ),
        }
    }
}

pub async fn health_check(ctx: &ApiContext) -> Result<(), FacadeError> {
    ctx.store.ping().await.map_err(FacadeError::from)
}

pub async fn list_all_entries(ctx: &ApiContext) -> Result<Vec<ScheduleEntry>, FacadeError> {
    fetch_entries(ctx, SelectQuery::all().order_by(Column::Location)).await
}

pub async fn list_locations(ctx: &ApiContext) -> Result<Vec<String>, FacadeError> {
    let entries = fetch_entries(ctx, SelectQuery::all().order_by(Column::Location)).await?;
    Ok(distinct_locations(entries))
}

pub async fn check_availability(
    ctx: &ApiContext,
    location: &str,
    day: Weekday,
    time_slot: &str,
) -> Result<Vec<ScheduleEntry>, FacadeError> {
    let query = SelectQuery::all()
        .eq(Column::Location, location)
        .eq(Column::Day, day.as_str())
        .eq(Column::TimeSlot, time_slot);
    let entries = fetch_entries(ctx, query).await?;
    if entries.len() > 1 {
        warn!(
            location,
            %day,
            time_slot,
            count = entries.len(),
            "slot holds more than one entry"
        );
    }
    Ok(entries)
}

pub async fn find_locations_by_min_capacity(
    ctx: &ApiContext,
    min_capacity: i64,
) -> Result<Vec<String>, FacadeError> {
    if min_capacity < 1 {
        return Err(FacadeError::Validation(format!(
            "minimum capacity must be a positive integer, got {min_capacity}"
        )));
    }
    let query = SelectQuery::all()
        .gte(Column::Capacity, min_capacity)
        .order_by(Column::Location);
    Ok(distinct_locations(fetch_entries(ctx, query).await?))
}

/// Exact, case-sensitive match on the faculty name, in weekday order.
pub async fn search_by_faculty(
    ctx: &ApiContext,
    faculty_name: &str,
) -> Result<Vec<ScheduleEntry>, FacadeError> {
    if faculty_name.trim().is_empty() {
        return Err(FacadeError::Validation("faculty name is required".into()));
    }
    let query = SelectQuery::all()
        .eq(Column::Faculty, faculty_name)
        .order_by(Column::Day);
    let mut entries = fetch_entries(ctx, query).await?;
    // The store sorts day labels as text; callers want calendar order.
    entries.sort_by_key(|entry| entry.day);
    Ok(entries)
}

pub async fn filter_locations_by_day(
    ctx: &ApiContext,
    day: Weekday,
) -> Result<Vec<String>, FacadeError> {
    let query = SelectQuery::all()
        .eq(Column::Day, day.as_str())
        .order_by(Column::Location);
    Ok(distinct_locations(fetch_entries(ctx, query).await?))
}

pub async fn filter_locations_by_time_slot(
    ctx: &ApiContext,
    time_slot: &str,
) -> Result<Vec<String>, FacadeError> {
    let query = SelectQuery::all()
        .eq(Column::TimeSlot, time_slot)
        .order_by(Column::Location);
    Ok(distinct_locations(fetch_entries(ctx, query).await?))
}

pub async fn add_entry(
    ctx: &ApiContext,
    entry: NewScheduleEntry,
) -> Result<ScheduleEntry, FacadeError> {
    validate_new_entry(&entry)?;
    let mut row = StoreRow::new();
    row.insert(Column::Location.as_str().into(), json!(entry.location));
    row.insert(Column::Day.as_str().into(), json!(entry.day.as_str()));
    row.insert(Column::TimeSlot.as_str().into(), json!(entry.time_slot));
    row.insert(Column::Faculty.as_str().into(), json!(entry.faculty));
    row.insert(Column::Batch.as_str().into(), json!(entry.batch));
    row.insert(Column::Capacity.as_str().into(), json!(entry.capacity));

    let created = entry_from_row(ctx.store.insert(row).await?)?;
    info!(
        id = %created.id,
        location = %created.location,
        day = %created.day,
        time_slot = %created.time_slot,
        "schedule entry created"
    );
    Ok(created)
}

pub async fn update_entry(
    ctx: &ApiContext,
    id: EntryId,
    update: EntryUpdate,
) -> Result<ScheduleEntry, FacadeError> {
    if update.is_empty() {
        return Err(FacadeError::Validation("no valid fields to update".into()));
    }

    let mut patch = StoreRow::new();
    if let Some(faculty) = update.faculty {
        require_text("faculty", &faculty)?;
        patch.insert(Column::Faculty.as_str().into(), json!(faculty));
    }
    if let Some(batch) = update.batch {
        patch.insert(Column::Batch.as_str().into(), json!(batch));
    }

    let updated = ctx
        .store
        .update(id, patch)
        .await?
        .ok_or(FacadeError::NotFound(id))?;
    let updated = entry_from_row(updated)?;
    info!(id = %updated.id, faculty = %updated.faculty, "schedule entry updated");
    Ok(updated)
}

pub async fn delete_entry(ctx: &ApiContext, id: EntryId) -> Result<(), FacadeError> {
    if !ctx.store.delete(id).await? {
        return Err(FacadeError::NotFound(id));
    }
    info!(%id, "schedule entry deleted");
    Ok(())
}

async fn fetch_entries(
    ctx: &ApiContext,
    query: SelectQuery,
) -> Result<Vec<ScheduleEntry>, FacadeError> {
    debug!(?query, "querying schedule store");
    let rows = ctx.store.select(&query).await?;
    rows.into_iter().map(entry_from_row).collect()
}

fn distinct_locations(entries: Vec<ScheduleEntry>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.location)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn entry_from_row(row: StoreRow) -> Result<ScheduleEntry, FacadeError> {
    let id_hint = row.get(Column::Id.as_str()).cloned().unwrap_or(Value::Null);
    let entry: ScheduleEntry = serde_json::from_value(Value::Object(row))
        .map_err(|err| malformed_row(&id_hint, &err.to_string()))?;
    if entry.location.trim().is_empty() {
        return Err(malformed_row(&id_hint, "location is blank"));
    }
    if entry.capacity < 1 {
        return Err(malformed_row(&id_hint, "capacity is not positive"));
    }
    Ok(entry)
}

fn malformed_row(id: &Value, reason: &str) -> FacadeError {
    warn!(%id, reason, "store returned a malformed schedule row");
    FacadeError::Store(StoreFailure::new(format!(
        "malformed schedule row (id {id}): {reason}"
    )))
}

/// Rejects blank required fields and non-positive capacity. Values are
/// stored exactly as given.
fn validate_new_entry(entry: &NewScheduleEntry) -> Result<(), FacadeError> {
    if entry.capacity < 1 {
        return Err(FacadeError::Validation(format!(
            "capacity must be a positive integer, got {}",
            entry.capacity
        )));
    }
    require_text("location", &entry.location)?;
    require_text("time_slot", &entry.time_slot)?;
    require_text("faculty", &entry.faculty)
}

fn require_text(field: &str, value: &str) -> Result<(), FacadeError> {
    if value.trim().is_empty() {
        return Err(FacadeError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
