use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

use shared::{
    domain::EntryId,
    store::{
        Column, Filter, FilterValue, ScheduleStore, SelectQuery, StoreFailure, StoreRow,
        SCHEDULE_TABLE,
    },
};

const ROW_COLUMNS: &str = "id, location, day, time_slot, faculty, batch, capacity";

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn select_rows(&self, query: &SelectQuery) -> Result<Vec<StoreRow>> {
        let mut sql = format!("SELECT {ROW_COLUMNS} FROM {SCHEDULE_TABLE}");
        let mut binds = Vec::with_capacity(query.filters.len());
        for (index, filter) in query.filters.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            match filter {
                Filter::Eq(column, value) => {
                    sql.push_str(column.as_str());
                    sql.push_str(" = ?");
                    binds.push(value.clone());
                }
                Filter::Gte(column, value) => {
                    sql.push_str(column.as_str());
                    sql.push_str(" >= ?");
                    binds.push(FilterValue::Integer(*value));
                }
            }
        }
        match query.order_by {
            Some(column) => sql.push_str(&format!(" ORDER BY {} ASC, id ASC", column.as_str())),
            None => sql.push_str(" ORDER BY id ASC"),
        }

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = match value {
                FilterValue::Text(text) => statement.bind(text),
                FilterValue::Integer(number) => statement.bind(number),
            };
        }
        let rows = statement
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to select from {SCHEDULE_TABLE}"))?;
        rows.iter().map(row_to_json).collect()
    }

    pub async fn insert_row(&self, row: &StoreRow) -> Result<StoreRow> {
        let assignments = writable_columns(row)?;
        if assignments.is_empty() {
            bail!("cannot insert an empty row");
        }

        let names = assignments
            .iter()
            .map(|(column, _)| column.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; assignments.len()].join(", ");
        let sql = format!(
            "INSERT INTO {SCHEDULE_TABLE} ({names}) VALUES ({placeholders}) RETURNING {ROW_COLUMNS}"
        );

        let mut statement = sqlx::query(&sql);
        for (column, value) in assignments {
            statement = bind_json(statement, column, value)?;
        }
        let created = statement
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to insert into {SCHEDULE_TABLE}"))?;
        row_to_json(&created)
    }

    pub async fn update_row(&self, id: EntryId, patch: &StoreRow) -> Result<Option<StoreRow>> {
        let assignments = writable_columns(patch)?;
        if assignments.is_empty() {
            bail!("update for entry {id} has no fields");
        }

        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {SCHEDULE_TABLE} SET {set_clause} WHERE id = ? RETURNING {ROW_COLUMNS}"
        );

        let mut statement = sqlx::query(&sql);
        for (column, value) in assignments {
            statement = bind_json(statement, column, value)?;
        }
        let updated = statement
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to update entry {id}"))?;
        updated.as_ref().map(row_to_json).transpose()
    }

    pub async fn delete_row(&self, id: EntryId) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {SCHEDULE_TABLE} WHERE id = ?"))
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete entry {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Loads a small sample timetable, for local development.
    pub async fn seed_demo_rows(&self) -> Result<usize> {
        let rows = [
            ("Lab A", "Monday", "9-10", "Free", None, 30),
            ("Lab A", "Monday", "10-11", "Dr. Rao", Some("CSE-A"), 30),
            ("Lab A", "Tuesday", "9-10", "Dr. Mehta", Some("ECE-B"), 30),
            ("Lab B", "Monday", "9-10", "Dr. Rao", Some("CSE-B"), 45),
            ("Lab B", "Wednesday", "11-12", "Free", None, 45),
            ("Seminar Hall", "Friday", "2-3", "Free", None, 120),
        ];
        for (location, day, time_slot, faculty, batch, capacity) in rows {
            let mut row = StoreRow::new();
            row.insert("location".into(), json!(location));
            row.insert("day".into(), json!(day));
            row.insert("time_slot".into(), json!(time_slot));
            row.insert("faculty".into(), json!(faculty));
            row.insert("batch".into(), json!(batch));
            row.insert("capacity".into(), json!(capacity));
            self.insert_row(&row).await?;
        }
        Ok(rows.len())
    }
}

#[async_trait]
impl ScheduleStore for Storage {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<StoreRow>, StoreFailure> {
        debug!(?query, "sqlite select");
        self.select_rows(query).await.map_err(store_failure)
    }

    async fn insert(&self, row: StoreRow) -> Result<StoreRow, StoreFailure> {
        self.insert_row(&row).await.map_err(store_failure)
    }

    async fn update(
        &self,
        id: EntryId,
        patch: StoreRow,
    ) -> Result<Option<StoreRow>, StoreFailure> {
        self.update_row(id, &patch).await.map_err(store_failure)
    }

    async fn delete(&self, id: EntryId) -> Result<bool, StoreFailure> {
        self.delete_row(id).await.map_err(store_failure)
    }

    async fn ping(&self) -> Result<(), StoreFailure> {
        self.health_check().await.map_err(store_failure)
    }
}

fn store_failure(err: anyhow::Error) -> StoreFailure {
    warn!(error = %format!("{err:#}"), "sqlite store operation failed");
    StoreFailure::new(format!("{err:#}"))
}

fn writable_columns(row: &StoreRow) -> Result<Vec<(Column, &Value)>> {
    row.iter()
        .map(|(name, value)| match Column::from_name(name) {
            Some(Column::Id) => Err(anyhow!("column 'id' is assigned by the store")),
            Some(column) => Ok((column, value)),
            None => Err(anyhow!("unknown column '{name}'")),
        })
        .collect()
}

fn bind_json<'q>(
    statement: SqliteQuery<'q>,
    column: Column,
    value: &Value,
) -> Result<SqliteQuery<'q>> {
    Ok(match value {
        Value::Null => statement.bind(None::<String>),
        Value::String(text) => statement.bind(text.clone()),
        Value::Bool(flag) => statement.bind(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => statement.bind(integer),
            None => statement.bind(
                number
                    .as_f64()
                    .ok_or_else(|| anyhow!("unrepresentable number for '{}'", column.as_str()))?,
            ),
        },
        Value::Array(_) | Value::Object(_) => {
            bail!("column '{}' cannot hold a nested value", column.as_str())
        }
    })
}

fn row_to_json(row: &SqliteRow) -> Result<StoreRow> {
    let mut out = StoreRow::new();
    out.insert("id".into(), json!(row.try_get::<i64, _>("id")?));
    out.insert("location".into(), json!(row.try_get::<String, _>("location")?));
    out.insert("day".into(), json!(row.try_get::<String, _>("day")?));
    out.insert("time_slot".into(), json!(row.try_get::<String, _>("time_slot")?));
    out.insert("faculty".into(), json!(row.try_get::<String, _>("faculty")?));
    out.insert("batch".into(), json!(row.try_get::<Option<String>, _>("batch")?));
    out.insert("capacity".into(), json!(row.try_get::<i64, _>("capacity")?));
    Ok(out)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create '{}' for sqlite database", parent.display()))
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
