//! HTTP API.
//!
//! Mirrors the dashboard's backend: record list/create/update, CSV upload,
//! template download and per-period reports. All responses are JSON except
//! the template, which is served as a CSV attachment.

use std::net::SocketAddr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::listing::{self, Filters, ListQuery, Page, SortDirection, SortField, SortState};
use crate::models::{Period, Teacher, TeacherInput, Zone};
use crate::report::{self, PeriodReport};
use crate::store::Store;
use crate::template::{self, Semester};
use crate::upload;
use crate::zone;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub page_size: usize,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        AppState {
            store,
            page_size: listing::DEFAULT_PAGE_SIZE,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/teachers",
            get(list_teachers).post(create_teacher).put(update_teacher),
        )
        .route("/api/teachers/table", get(teacher_table))
        .route("/api/teachers/{id}", get(get_teacher))
        .route("/api/upload", post(upload_csv))
        .route("/api/template", get(download_template))
        .route("/api/reports", get(period_report))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let backend = state.store.backend();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    backend: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        backend: state.store.backend(),
    })
}

async fn list_teachers(State(state): State<AppState>) -> Result<Json<Vec<Teacher>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn get_teacher(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Teacher>, ApiError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

/// Validates a form submission and fills in derivable figures. A record
/// without an explicit zone takes the zone of its latest graded period.
fn prepare(input: &mut TeacherInput) -> Result<(), ApiError> {
    for field in [
        &mut input.teacher_id,
        &mut input.first_name,
        &mut input.last_name,
        &mut input.department,
    ] {
        *field = field.trim().to_string();
    }
    input.validate().map_err(ApiError::Validation)?;
    zone::precompute(input);
    if input.zone.is_none() {
        input.zone = zone::latest_zone(input);
    }
    Ok(())
}

async fn create_teacher(
    State(state): State<AppState>,
    payload: Result<Json<TeacherInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Teacher>), ApiError> {
    let Json(mut input) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    prepare(&mut input)?;
    let teacher = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(teacher)))
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Uuid,
}

async fn update_teacher(
    State(state): State<AppState>,
    id: Result<Query<IdQuery>, QueryRejection>,
    payload: Result<Json<TeacherInput>, JsonRejection>,
) -> Result<Json<Teacher>, ApiError> {
    let Query(IdQuery { id }) = id.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let Json(mut input) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    prepare(&mut input)?;
    state
        .store
        .update(id, input)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TableParams {
    pub search: Option<String>,
    pub department: Option<String>,
    pub zone: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    /// Column header clicked; flips `sort`/`order` when it names the active
    /// column, otherwise sorts ascending by it.
    pub toggle: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl TableParams {
    pub fn into_query(self, default_page_size: usize) -> Result<ListQuery, ApiError> {
        let bad = |err: anyhow::Error| ApiError::BadRequest(err.to_string());
        let zone = self
            .zone
            .filter(|z| !z.trim().is_empty())
            .map(|z| z.parse::<Zone>())
            .transpose()
            .map_err(bad)?;
        let parse_field = |raw: Option<String>| {
            raw.filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<SortField>())
                .transpose()
                .map_err(bad)
        };
        let field = parse_field(self.sort)?;
        let toggle = parse_field(self.toggle)?;
        let direction = match self.order.as_deref().map(str::trim) {
            None | Some("") | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "unknown sort order '{other}' (expected asc or desc)"
                )))
            }
        };

        Ok(ListQuery {
            filters: Filters {
                search: self.search,
                department: self.department,
                zone,
                status: self.status,
            },
            sort: sort_state(field.map(|field| SortState { field, direction }), toggle),
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(default_page_size).max(1),
        })
    }
}

fn sort_state(current: Option<SortState>, toggle: Option<SortField>) -> Option<SortState> {
    match toggle {
        Some(field) => Some(SortState::toggle(current, field)),
        None => current,
    }
}

/// One table page plus the sort that produced it, so the next header click
/// can be sent back as `sort`/`order`/`toggle`.
#[derive(Debug, Serialize)]
pub struct TablePage {
    #[serde(flatten)]
    pub page: Page<Teacher>,
    pub sort: Option<SortState>,
}

async fn teacher_table(
    State(state): State<AppState>,
    params: Result<Query<TableParams>, QueryRejection>,
) -> Result<Json<TablePage>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let query = params.into_query(state.page_size)?;
    let teachers = state.store.list().await?;
    Ok(Json(TablePage {
        page: listing::query(&teachers, &query),
        sort: query.sort,
    }))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
}

async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let bad = |err: axum::extract::multipart::MultipartError| ApiError::BadRequest(err.body_text());
    let mut file = None;
    let mut semester = Semester::First;

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad)?;
                file = Some((file_name, content_type, data));
            }
            "type" => {
                let value = field.text().await.map_err(bad)?;
                semester = value
                    .parse()
                    .map_err(|err: anyhow::Error| ApiError::BadRequest(err.to_string()))?;
            }
            _ => {}
        }
    }

    let Some((file_name, content_type, data)) = file else {
        return Err(ApiError::BadRequest("no file was uploaded".to_string()));
    };
    upload::check_file(&file_name, content_type.as_deref())?;
    let rows = upload::parse_csv(&data, semester)?;
    let summary = state.store.import(rows).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "Imported {} records from {} ({} new, {} updated)",
            summary.total(),
            file_name,
            summary.inserted,
            summary.updated
        ),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct TemplateParams {
    semester: Option<String>,
}

async fn download_template(
    params: Result<Query<TemplateParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let semester = match params.semester.as_deref() {
        Some(raw) => raw
            .parse::<Semester>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        None => Semester::First,
    };
    let body = template::render(semester)?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", template::file_name(semester)),
        ),
    ];
    Ok((headers, body))
}

#[derive(Debug, Default, Deserialize)]
struct ReportParams {
    period: Option<String>,
}

async fn period_report(
    State(state): State<AppState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<PeriodReport>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let period = match params.period.as_deref() {
        Some(raw) => raw
            .parse::<Period>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        None => Period::P1,
    };
    let teachers = state.store.list().await?;
    Ok(Json(report::build_period_report(&teachers, period)))
}
