//! HTTP surface of the frame-extraction service.
//!
//! Thin plumbing over the core pipeline: every handler validates its input,
//! calls into the registry/runner/builder, and maps the result to a
//! response. No extraction logic lives here.
//!
//! Routes:
//!
//! | Method | Path                    | Purpose                              |
//! |--------|-------------------------|--------------------------------------|
//! | POST   | `/extract-frames`       | upload a video, start an extraction  |
//! | GET    | `/task-status/{id}`     | poll a task snapshot                 |
//! | POST   | `/download-images`      | zip selected frames                  |
//! | POST   | `/upload-images`        | direct still-image intake            |
//! | POST   | `/save-classifications` | persist labels as CSV                |
//! | POST   | `/load-csv`             | read labels back from a CSV upload   |
//!
//! Local frame directories are additionally served as static files so
//! locators produced with remote storage disabled stay resolvable, and CORS
//! is wide open — the service fronts a trusted single-operator UI.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    archive::{ArchiveBuilder, ArchiveItem},
    error::StillcutError,
    labels::{self, LabelEntry},
    naming::sanitize_video_name,
    registry::TaskRegistry,
    runner::TaskRunner,
    store::ObjectStore,
};

/// Video container extensions accepted by `/extract-frames`.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Still-image extensions accepted by `/upload-images`.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// How often the background sweeper evicts stale terminal tasks.
const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a single upload. The axum default of 2 MB would reject
/// nearly any real video.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Response header carrying the number of archive items that failed.
pub const ARCHIVE_FAILED_HEADER: &str = "x-archive-failed";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Single source of truth for task status.
    pub registry: Arc<TaskRegistry>,
    /// Frame persistence back end.
    pub store: Arc<ObjectStore>,
    /// Spawns and drives extraction tasks.
    pub runner: TaskRunner,
    /// Directory for uploaded assets awaiting processing.
    pub scratch_dir: PathBuf,
    /// Directory for extracted frames and saved label CSVs.
    pub output_dir: PathBuf,
}

impl AppState {
    /// Build the shared state, creating the scratch/output directories.
    pub fn new(
        store: ObjectStore,
        scratch_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Result<Self, StillcutError> {
        std::fs::create_dir_all(&scratch_dir)?;
        std::fs::create_dir_all(&output_dir)?;

        let registry = Arc::new(TaskRegistry::new());
        let store = Arc::new(store);
        let runner = TaskRunner::new(registry.clone(), store.clone(), output_dir.clone());

        Ok(Self {
            registry,
            store,
            runner,
            scratch_dir,
            output_dir,
        })
    }
}

/// Build the application router.
///
/// Also spawns the registry eviction sweeper; `task_ttl` controls how long
/// terminal tasks remain pollable.
pub fn router(state: AppState, task_ttl: Duration) -> Router {
    spawn_eviction_sweeper(state.registry.clone(), task_ttl);

    Router::new()
        .route("/", get(service_banner))
        .route("/extract-frames", post(extract_frames))
        .route("/task-status/{task_id}", get(task_status))
        .route("/download-images", post(download_images))
        .route("/upload-images", post(upload_images))
        .route("/save-classifications", post(save_classifications))
        .route("/load-csv", post(load_csv))
        .nest_service("/temp", ServeDir::new(state.scratch_dir.clone()))
        .nest_service("/output", ServeDir::new(state.output_dir.clone()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn spawn_eviction_sweeper(registry: Arc<TaskRegistry>, ttl: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            registry.evict_terminal_older_than(ttl);
        }
    });
}

/// Map core errors onto HTTP status codes.
impl IntoResponse for StillcutError {
    fn into_response(self) -> Response {
        let status = match &self {
            StillcutError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            StillcutError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

async fn service_banner() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "stillcut frame extraction service" }))
}

#[derive(Debug, Serialize)]
struct ExtractFramesResponse {
    task_id: Uuid,
}

/// `POST /extract-frames` — multipart video upload.
///
/// Persists the upload to scratch, registers a queued task, spawns the
/// runner, and returns the task id without waiting for extraction.
async fn extract_frames(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractFramesResponse>, StillcutError> {
    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let (base_name, extension) = split_extension(&file_name);
        if !VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StillcutError::UnsupportedFormat(file_name));
        }

        let video_name = sanitize_video_name(&base_name);

        let task_id = state.registry.create();
        let video_path = state
            .scratch_dir
            .join(format!("{task_id}.{extension}"));

        // Stream the upload to scratch; a whole video must never sit in
        // memory.
        if let Err(error) = stream_field_to_file(&mut field, &video_path).await {
            let _ = tokio::fs::remove_file(&video_path).await;
            state.registry.fail(task_id, error.to_string());
            return Err(error);
        }

        state.runner.spawn_video_task(task_id, video_path, video_name);

        return Ok(Json(ExtractFramesResponse { task_id }));
    }

    Err(StillcutError::UnsupportedFormat(
        "missing 'file' field".to_string(),
    ))
}

/// `GET /task-status/{id}` — pure registry read, snapshot returned
/// verbatim.
async fn task_status(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<Uuid>,
) -> Result<Json<crate::TaskSnapshot>, StillcutError> {
    state
        .registry
        .get(task_id)
        .map(Json)
        .ok_or(StillcutError::TaskNotFound(task_id))
}

/// `POST /download-images` — build and return a zip of the requested
/// frames.
///
/// Always responds 200 with a complete-but-possibly-partial archive; the
/// number of failed items rides in the [`ARCHIVE_FAILED_HEADER`] header so
/// callers need not inspect the content to detect partial failure.
async fn download_images(
    State(state): State<AppState>,
    Json(items): Json<Vec<ArchiveItem>>,
) -> Result<Response, StillcutError> {
    let built = ArchiveBuilder::new(&state.store).build(&items).await?;
    let failed = built.manifest.failed();

    let headers = [
        (header::CONTENT_TYPE.as_str(), "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION.as_str(),
            "attachment; filename=\"classified_images.zip\"".to_string(),
        ),
        (ARCHIVE_FAILED_HEADER, failed.to_string()),
    ];

    Ok((StatusCode::OK, headers, built.bytes).into_response())
}

#[derive(Debug, Serialize)]
struct UploadedImage {
    id: Uuid,
    original_name: String,
    display_name: String,
    locator: String,
}

#[derive(Debug, Serialize)]
struct UploadImagesResponse {
    images: Vec<UploadedImage>,
}

/// `POST /upload-images` — direct intake of still images.
///
/// Unsupported extensions are skipped rather than rejected, matching the
/// submit-a-folder workflow the frontend uses.
async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadImagesResponse>, StillcutError> {
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let (base_name, extension) = split_extension(&file_name);
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        let id = Uuid::new_v4();
        let safe_name = sanitize_video_name(&base_name);
        // Keep the original name recognizable while guaranteeing
        // uniqueness with a uuid prefix slice.
        let id_hex = id.simple().to_string();
        let save_name = format!("{safe_name}-{}.{extension}", &id_hex[..8]);
        let path = state.scratch_dir.join(&save_name);

        let bytes = field.bytes().await.map_err(bad_multipart)?;
        tokio::fs::write(&path, &bytes).await?;

        images.push(UploadedImage {
            id,
            original_name: file_name.clone(),
            display_name: file_name,
            locator: path.to_string_lossy().into_owned(),
        });
    }

    Ok(Json(UploadImagesResponse { images }))
}

#[derive(Debug, Deserialize)]
struct SaveClassificationsRequest {
    classifications: Vec<LabelEntry>,
}

#[derive(Debug, Serialize)]
struct SaveClassificationsResponse {
    file_id: Uuid,
    path: String,
}

/// `POST /save-classifications` — persist labels to a CSV in the output
/// directory.
async fn save_classifications(
    State(state): State<AppState>,
    Json(request): Json<SaveClassificationsRequest>,
) -> Result<Json<SaveClassificationsResponse>, StillcutError> {
    let file_id = Uuid::new_v4();
    let path = state
        .output_dir
        .join(format!("classification_{file_id}.csv"));

    let mut buffer = Vec::new();
    labels::write_labels(&mut buffer, &request.classifications)?;
    tokio::fs::write(&path, buffer).await?;

    Ok(Json(SaveClassificationsResponse {
        file_id,
        path: path.to_string_lossy().into_owned(),
    }))
}

#[derive(Debug, Serialize)]
struct LoadCsvResponse {
    classifications: Vec<LabelEntry>,
}

/// `POST /load-csv` — parse labels out of an uploaded CSV.
async fn load_csv(
    State(_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<LoadCsvResponse>, StillcutError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(StillcutError::UnsupportedFormat(file_name));
        }

        let bytes = field.bytes().await.map_err(bad_multipart)?;
        let classifications = labels::read_labels(bytes.as_ref())?;
        return Ok(Json(LoadCsvResponse { classifications }));
    }

    Err(StillcutError::UnsupportedFormat(
        "missing CSV upload".to_string(),
    ))
}

/// Write one multipart field to `path` chunk by chunk.
async fn stream_field_to_file(
    field: &mut axum::extract::multipart::Field<'_>,
    path: &std::path::Path,
) -> Result<(), StillcutError> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Split `name.ext` into the base name and a lowercased extension.
fn split_extension(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) => (base.to_string(), ext.to_ascii_lowercase()),
        None => (file_name.to_string(), String::new()),
    }
}

fn bad_multipart(error: axum::extract::multipart::MultipartError) -> StillcutError {
    StillcutError::Io(std::io::Error::other(error.to_string()))
}
