use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use rest_store::{RestStore, RestStoreConfig};
use serde_json::{json, Value};
use shared::{
    domain::EntryId,
    store::{Column, ScheduleStore, SelectQuery, StoreRow},
};

const API_KEY: &str = "anon-test-key";

#[derive(Default)]
struct FakeTable {
    next_id: i64,
    rows: Vec<StoreRow>,
}

type Shared = Arc<Mutex<FakeTable>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

fn matches(row: &StoreRow, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(key, raw)| {
        if matches!(key.as_str(), "select" | "order" | "limit") {
            return true;
        }
        let cell = row.get(key).cloned().unwrap_or(Value::Null);
        if let Some(expected) = raw.strip_prefix("eq.") {
            match &cell {
                Value::String(text) => text == expected,
                Value::Number(number) => number.to_string() == expected,
                _ => false,
            }
        } else if let Some(bound) = raw.strip_prefix("gte.") {
            let bound: i64 = bound.parse().unwrap_or(i64::MAX);
            cell.as_i64().is_some_and(|v| v >= bound)
        } else {
            false
        }
    })
}

async fn list_rows(
    State(table): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<StoreRow>>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let table = table.lock().expect("lock");
    let mut rows: Vec<StoreRow> = table
        .rows
        .iter()
        .filter(|row| matches(row, &params))
        .cloned()
        .collect();
    if let Some(column) = params
        .get("order")
        .and_then(|order| order.split('.').next())
        .map(str::to_string)
    {
        rows.sort_by(|a, b| {
            let left = a.get(&column).map(Value::to_string).unwrap_or_default();
            let right = b.get(&column).map(Value::to_string).unwrap_or_default();
            left.cmp(&right)
        });
    }
    Ok(Json(rows))
}

async fn insert_rows(
    State(table): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Vec<StoreRow>>,
) -> Result<(StatusCode, Json<Vec<StoreRow>>), StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut table = table.lock().expect("lock");
    let mut created = Vec::new();
    for mut row in body {
        table.next_id += 1;
        row.insert("id".into(), json!(table.next_id));
        table.rows.push(row.clone());
        created.push(row);
    }
    Ok((StatusCode::CREATED, Json(created)))
}

async fn patch_rows(
    State(table): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(patch): Json<StoreRow>,
) -> Result<Json<Vec<StoreRow>>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut table = table.lock().expect("lock");
    let mut updated = Vec::new();
    for row in table.rows.iter_mut().filter(|row| matches(row, &params)) {
        for (key, value) in &patch {
            row.insert(key.clone(), value.clone());
        }
        updated.push(row.clone());
    }
    Ok(Json(updated))
}

async fn delete_rows(
    State(table): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<StoreRow>>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut table = table.lock().expect("lock");
    let (removed, kept): (Vec<_>, Vec<_>) = table
        .rows
        .drain(..)
        .partition(|row| matches(row, &params));
    table.rows = kept;
    Ok(Json(removed))
}

async fn spawn_fake() -> SocketAddr {
    let app = Router::new()
        .route(
            "/rest/v1/lab_schedule",
            get(list_rows)
                .post(insert_rows)
                .patch(patch_rows)
                .delete(delete_rows),
        )
        .with_state(Shared::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn lab_row(location: &str, capacity: i64) -> StoreRow {
    let mut row = StoreRow::new();
    row.insert("location".into(), json!(location));
    row.insert("day".into(), json!("Monday"));
    row.insert("time_slot".into(), json!("9-10"));
    row.insert("faculty".into(), json!("Free"));
    row.insert("batch".into(), Value::Null);
    row.insert("capacity".into(), json!(capacity));
    row
}

#[tokio::test]
async fn crud_round_trip_against_postgrest_fake() {
    let addr = spawn_fake().await;
    let store =
        RestStore::new(RestStoreConfig::new(format!("http://{addr}"), API_KEY)).expect("store");

    store.ping().await.expect("ping");

    let created = store.insert(lab_row("Lab B", 45)).await.expect("insert");
    store.insert(lab_row("Lab A", 30)).await.expect("insert");
    let id = EntryId(created["id"].as_i64().expect("id"));

    let ordered = store
        .select(&SelectQuery::all().order_by(Column::Location))
        .await
        .expect("select");
    assert_eq!(ordered[0]["location"], "Lab A");
    assert_eq!(ordered[1]["location"], "Lab B");

    let big = store
        .select(&SelectQuery::all().gte(Column::Capacity, 40))
        .await
        .expect("select");
    assert_eq!(big.len(), 1);

    let mut patch = StoreRow::new();
    patch.insert("faculty".into(), json!("Dr. X"));
    let updated = store
        .update(id, patch.clone())
        .await
        .expect("update")
        .expect("exists");
    assert_eq!(updated["faculty"], "Dr. X");
    assert!(store
        .update(EntryId(999), patch)
        .await
        .expect("update")
        .is_none());

    assert!(store.delete(id).await.expect("delete"));
    assert!(!store.delete(id).await.expect("second delete"));
}

#[tokio::test]
async fn rejected_requests_surface_status_and_body() {
    let addr = spawn_fake().await;
    let store =
        RestStore::new(RestStoreConfig::new(format!("http://{addr}"), "wrong-key")).expect("store");
    let failure = store.select(&SelectQuery::all()).await.expect_err("unauthorized");
    assert!(failure.message.contains("401"), "{}", failure.message);
}
