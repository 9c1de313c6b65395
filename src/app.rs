use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Local, NaiveDate, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::calendar::{self, MonthRef};
use crate::downloader;
use crate::loader;
use crate::record::Record;
use crate::roster::{RecordInput, Roster, RosterError, SummaryCounts};
use crate::tracker::ChangeTracker;
use crate::view::{Filter, SortColumn, ViewState};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const ALERT_EXPORT_FILENAME: &str = "アラートリスト.xlsx";
const PROCESSED_EXPORT_FILENAME: &str = "在留資格管理_processed.xlsx";

pub struct AppState {
    roster: Mutex<Roster>,
    tracker: Mutex<ChangeTracker>,
}

impl AppState {
    pub fn new(roster: Roster) -> Self {
        AppState {
            roster: Mutex::new(roster),
            tracker: Mutex::new(ChangeTracker::new()),
        }
    }
}

#[derive(Deserialize)]
struct DataQuery {
    filter: Option<Filter>,
    search: Option<String>,
    sort: Option<SortColumn>,
    ascending: Option<bool>,
}

#[derive(Deserialize)]
struct CalendarQuery {
    year: i32,
    month: u32,
}

#[derive(Serialize)]
struct DataResponse {
    data: Vec<Record>,
    filename: Option<String>,
    total: usize,
}

#[derive(Serialize)]
struct SummaryResponse {
    filename: Option<String>,
    #[serde(flatten)]
    counts: SummaryCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_exported_at: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_export_filename: Option<String>,
    dirty: bool,
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    filename: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            field: None,
        }),
    )
        .into_response()
}

fn roster_error(err: RosterError) -> Response {
    match err {
        RosterError::Validation { field, ref message } => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: message.clone(),
                field: Some(field),
            }),
        )
            .into_response(),
        RosterError::NotFound(_) => error_json(StatusCode::NOT_FOUND, &err.to_string()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn run(addr: &str, roster: Roster) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(roster));

    // Build router
    let app = Router::new()
        .route("/", get(service_info))
        .route("/api/data", get(get_data))
        .route("/api/summary", get(get_summary))
        .route("/api/calendar", get(get_calendar))
        .route("/api/upload", post(upload_roster))
        .route("/api/data/add", post(add_record))
        .route("/api/data/update/:id", put(update_record))
        .route("/api/data/delete/:id", delete(delete_record))
        .route("/api/export/alert", get(export_alert))
        .route("/api/export/processed", get(export_processed))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn service_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "residence-tracker",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_data(
    Query(params): Query<DataQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let mut roster = state.roster.lock().unwrap();
    roster.reclassify(today());

    let mut view = ViewState::new();
    if let Some(filter) = params.filter {
        view.apply_filter(filter);
    }
    if let Some(search) = &params.search {
        view.set_search(search);
    }
    if let Some(column) = params.sort {
        view.sort = Some(column);
        view.ascending = params.ascending.unwrap_or(true);
    }

    let data = view.visible(roster.records());
    Json(DataResponse {
        total: data.len(),
        filename: roster.filename.clone(),
        data,
    })
}

async fn get_summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (counts, filename) = {
        let mut roster = state.roster.lock().unwrap();
        roster.reclassify(today());
        (roster.summary(), roster.filename.clone())
    };
    let tracker = state.tracker.lock().unwrap();

    Json(SummaryResponse {
        filename,
        counts,
        last_exported_at: tracker.last_export(),
        last_export_filename: tracker.last_export_filename().map(|s| s.to_string()),
        dirty: tracker.is_dirty(),
    })
}

async fn get_calendar(
    Query(params): Query<CalendarQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let month = match MonthRef::new(params.year, params.month) {
        Some(month) => month,
        None => return error_json(StatusCode::BAD_REQUEST, "month must be between 1 and 12"),
    };

    let mut roster = state.roster.lock().unwrap();
    roster.reclassify(today());
    let calendar_data = calendar::project(roster.records(), month);

    Json(serde_json::json!({ "calendar_data": calendar_data })).into_response()
}

async fn upload_roster(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    // Read the whole upload before touching the shared state.
    let mut file_data = Vec::new();
    let mut file_name = String::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name().unwrap_or("") == "file" {
            file_name = field.file_name().unwrap_or("").to_string();
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "no file data received");
    }
    if !file_name.to_lowercase().ends_with(".csv") {
        return error_json(StatusCode::BAD_REQUEST, "select a CSV file (.csv)");
    }

    // Build the replacement roster first; a parse failure leaves the
    // previous roster untouched.
    let inputs = match loader::from_csv_reader(&file_data[..]) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("upload of {} failed: {}", file_name, e);
            return error_json(StatusCode::BAD_REQUEST, &format!("failed to read file: {}", e));
        }
    };
    let replacement = Roster::from_inputs(inputs, Some(file_name.clone()), today());
    info!("loaded {} records from {}", replacement.len(), file_name);

    *state.roster.lock().unwrap() = replacement;
    state.tracker.lock().unwrap().record_change(Utc::now());

    Json(UploadResponse {
        success: true,
        filename: file_name,
    })
    .into_response()
}

async fn add_record(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RecordInput>,
) -> Response {
    let result = state.roster.lock().unwrap().add(&input, today());
    match result {
        Ok(id) => {
            state.tracker.lock().unwrap().record_change(Utc::now());
            info!("added record {}", id);
            Json(MessageResponse {
                success: true,
                message: "record added".to_string(),
            })
            .into_response()
        }
        Err(e) => roster_error(e),
    }
}

async fn update_record(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(input): Json<RecordInput>,
) -> Response {
    let result = state.roster.lock().unwrap().update(id, &input, today());
    match result {
        Ok(()) => {
            state.tracker.lock().unwrap().record_change(Utc::now());
            info!("updated record {}", id);
            Json(MessageResponse {
                success: true,
                message: "record updated".to_string(),
            })
            .into_response()
        }
        Err(e) => roster_error(e),
    }
}

async fn delete_record(Path(id): Path<i64>, State(state): State<Arc<AppState>>) -> Response {
    let result = state.roster.lock().unwrap().delete(id);
    match result {
        Ok(_) => {
            state.tracker.lock().unwrap().record_change(Utc::now());
            info!("deleted record {}", id);
            Json(MessageResponse {
                success: true,
                message: "record deleted".to_string(),
            })
            .into_response()
        }
        Err(e) => roster_error(e),
    }
}

async fn export_alert(State(state): State<Arc<AppState>>) -> Response {
    let alerts = {
        let mut roster = state.roster.lock().unwrap();
        roster.reclassify(today());
        roster.alerts()
    };

    if alerts.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "no records past their deadlines");
    }

    match downloader::alert_xlsx(&alerts) {
        Ok(buffer) => attachment_response(buffer, ALERT_EXPORT_FILENAME),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn export_processed(State(state): State<Arc<AppState>>) -> Response {
    let records = {
        let mut roster = state.roster.lock().unwrap();
        roster.reclassify(today());
        roster.records().to_vec()
    };

    match downloader::processed_xlsx(&records) {
        Ok(buffer) => {
            state
                .tracker
                .lock()
                .unwrap()
                .record_export(Utc::now(), PROCESSED_EXPORT_FILENAME);
            attachment_response(buffer, PROCESSED_EXPORT_FILENAME)
        }
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn attachment_response(buffer: Vec<u8>, filename: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            downloader::content_disposition(filename),
        )
        .body(axum::body::Body::from(Bytes::from(buffer)))
        .unwrap()
}
