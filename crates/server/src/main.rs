use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use rest_store::{RestStore, RestStoreConfig};
use schedule_api::{
    add_entry, availability_of, check_availability, delete_entry, filter_locations_by_day,
    filter_locations_by_time_slot, find_locations_by_min_capacity, health_check,
    list_all_entries, list_locations, search_by_faculty, update_entry, ApiContext, Availability,
    FacadeError, SlotDescription,
};
use shared::{
    domain::{EntryId, EntryUpdate, NewScheduleEntry, ScheduleEntry, Weekday},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminLoginRequest, AdminLoginResponse, AvailabilityRequest, AvailabilityResponse,
        CapacityRequest, DayQuery, EntriesResponse, FacultyRequest, FacultyScheduleResponse,
        GreetingResponse, LocationsResponse, SlotStatus, TimeSlotQuery, TimetableResponse,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;

use auth::{AdminAuth, AuthError};
use config::{load_settings, normalize_database_url, Settings, StoreBackend};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    auth: AdminAuth,
}

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api = open_store(&settings).await?;
    if let Err(error) = health_check(&api).await {
        warn!(%error, "schedule store is not reachable yet");
    }

    let auth = AdminAuth::new(
        settings.admin_password.clone(),
        settings.token_secret.clone().unwrap_or_default(),
        settings.token_ttl_seconds,
    );
    if settings.admin_password.is_some() && settings.token_secret.is_none() {
        warn!("APP__TOKEN_SECRET is not set; admin login is disabled");
    } else if !auth.is_enabled() {
        warn!("no admin password configured; admin routes will reject every request");
    }

    let app = build_router(Arc::new(AppState { api, auth }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, backend = ?settings.store_backend, "schedule server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<ApiContext> {
    match settings.store_backend {
        StoreBackend::Sqlite => {
            let database_url = normalize_database_url(&settings.database_url);
            let storage = Storage::new(&database_url).await.map_err(|error| {
                error!(
                    %database_url,
                    %error,
                    "failed to open SQLite database; verify parent directory exists and permissions are correct"
                );
                error
            })?;
            Ok(ApiContext::new(storage))
        }
        StoreBackend::Rest => {
            let base_url = settings
                .rest_url
                .clone()
                .context("SUPABASE_URL (or rest_url) is required for the rest backend")?;
            let api_key = settings
                .rest_api_key
                .clone()
                .context("SUPABASE_ANON_KEY (or rest_api_key) is required for the rest backend")?;
            let store = RestStore::new(RestStoreConfig::new(base_url, api_key))?;
            info!(endpoint = %store.endpoint(), "using hosted schedule store");
            Ok(ApiContext::new(store))
        }
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(greet))
        .route("/healthz", get(healthz))
        .route("/locations", get(http_list_locations))
        .route("/availability", post(http_check_availability))
        .route("/locations/capacity", post(http_locations_by_capacity))
        .route("/timetable", get(http_timetable))
        .route("/locations/day", get(http_locations_by_day))
        .route("/locations/time", get(http_locations_by_time))
        .route("/locations/faculty", post(http_search_by_faculty))
        .route("/admin/login", post(admin_login))
        .route("/admin/entries", get(admin_list_entries).post(admin_create_entry))
        .route(
            "/admin/entries/:entry_id",
            put(admin_update_entry).delete(admin_delete_entry),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn facade_error(err: FacadeError) -> HttpError {
    let status = match &err {
        FacadeError::Validation(_) => StatusCode::BAD_REQUEST,
        FacadeError::NotFound(_) => StatusCode::NOT_FOUND,
        FacadeError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        error!(error = %err, "schedule store request failed");
    }
    (status, Json(err.into()))
}

fn auth_error(err: AuthError) -> HttpError {
    match err {
        AuthError::Mint(source) => {
            error!(error = %source, "failed to mint admin token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(ErrorCode::Internal, "failed to issue token")),
            )
        }
        other => (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(ErrorCode::Unauthorized, other.to_string())),
        ),
    }
}

fn parse_day(raw: &str) -> Result<Weekday, HttpError> {
    raw.parse::<Weekday>().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), HttpError> {
    state.auth.verify_headers(headers).map_err(auth_error)
}

async fn greet() -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: "Hello! Welcome to the Lab/Classroom Availability System!".into(),
    })
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match health_check(&state.api).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

async fn http_list_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LocationsResponse>, HttpError> {
    let locations = list_locations(&state.api).await.map_err(facade_error)?;
    Ok(Json(LocationsResponse { locations }))
}

async fn http_check_availability(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, HttpError> {
    let day = parse_day(&req.day)?;
    let entries = check_availability(&state.api, &req.location_name, day, &req.time_slot)
        .await
        .map_err(facade_error)?;

    let availability = availability_of(&entries);
    let message = SlotDescription {
        availability: &availability,
        location: &req.location_name,
        day,
        time_slot: &req.time_slot,
    }
    .to_string();

    let status = match availability {
        Availability::Free => SlotStatus::Free,
        Availability::Occupied { .. } => SlotStatus::Occupied,
        Availability::Unknown => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ApiError::new(ErrorCode::NotFound, message)),
            ))
        }
    };
    Ok(Json(AvailabilityResponse {
        status,
        message,
        entries,
    }))
}

async fn http_locations_by_capacity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CapacityRequest>,
) -> Result<Json<LocationsResponse>, HttpError> {
    let locations = find_locations_by_min_capacity(&state.api, req.capacity)
        .await
        .map_err(facade_error)?;
    Ok(Json(LocationsResponse { locations }))
}

async fn http_timetable(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TimetableResponse>, HttpError> {
    let timetable = list_all_entries(&state.api).await.map_err(facade_error)?;
    Ok(Json(TimetableResponse { timetable }))
}

async fn http_locations_by_day(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DayQuery>,
) -> Result<Json<LocationsResponse>, HttpError> {
    let day = parse_day(&q.day)?;
    let locations = filter_locations_by_day(&state.api, day)
        .await
        .map_err(facade_error)?;
    Ok(Json(LocationsResponse { locations }))
}

async fn http_locations_by_time(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimeSlotQuery>,
) -> Result<Json<LocationsResponse>, HttpError> {
    let locations = filter_locations_by_time_slot(&state.api, &q.time_slot)
        .await
        .map_err(facade_error)?;
    Ok(Json(LocationsResponse { locations }))
}

async fn http_search_by_faculty(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FacultyRequest>,
) -> Result<Json<FacultyScheduleResponse>, HttpError> {
    let schedule = search_by_faculty(&state.api, &req.faculty_name)
        .await
        .map_err(facade_error)?;
    Ok(Json(FacultyScheduleResponse { schedule }))
}

async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, HttpError> {
    let issued = state.auth.login(&req.password).map_err(|err| {
        warn!(error = %err, "admin login rejected");
        auth_error(err)
    })?;
    info!(expires_at = issued.expires_at, "admin session issued");
    Ok(Json(AdminLoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

async fn admin_list_entries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<EntriesResponse>, HttpError> {
    require_admin(&state, &headers)?;
    let entries = list_all_entries(&state.api).await.map_err(facade_error)?;
    Ok(Json(EntriesResponse { entries }))
}

async fn admin_create_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(entry): Json<NewScheduleEntry>,
) -> Result<(StatusCode, Json<ScheduleEntry>), HttpError> {
    require_admin(&state, &headers)?;
    let created = add_entry(&state.api, entry).await.map_err(facade_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn admin_update_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<i64>,
    Json(update): Json<EntryUpdate>,
) -> Result<Json<ScheduleEntry>, HttpError> {
    require_admin(&state, &headers)?;
    let updated = update_entry(&state.api, EntryId(entry_id), update)
        .await
        .map_err(facade_error)?;
    Ok(Json(updated))
}

async fn admin_delete_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    require_admin(&state, &headers)?;
    delete_entry(&state.api, EntryId(entry_id))
        .await
        .map_err(facade_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
