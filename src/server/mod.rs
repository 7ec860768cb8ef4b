//! HTTP request layer.
//!
//! Maps core outcomes to transport status codes: enrolled → 200, duplicate
//! → 409, no face found → 400, identity not found → 404. Decode and
//! validation failures are 400, storage failures 500, encoder transport
//! failures 502.
//!
//! The core services are synchronous (filesystem and blocking HTTP client),
//! so every handler pushes its service call onto the blocking pool.

use crate::models::{EnrollOutcome, FaceBox, IdentifiedFace, IdentityName};
use crate::services::{EnrollRequest, EnrollmentService, IdentificationService};
use crate::registry::RegistryCache;
use crate::storage::ContentStore;
use crate::{Error, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state behind the router.
pub struct AppState {
    /// Write path service.
    pub enrollment: EnrollmentService,
    /// Read path service.
    pub identification: IdentificationService,
    /// Registry cache (listing).
    pub cache: Arc<RegistryCache>,
    /// Content store (artifact listing).
    pub store: Arc<ContentStore>,
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error wrapper carrying the transport status mapping.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) | Error::Decode(_) => StatusCode::BAD_REQUEST,
            Error::IdentityNotFound(_) => StatusCode::NOT_FOUND,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/detect", post(detect))
        .route("/enroll/{name}", post(enroll))
        .route("/learn/{name}", post(learn))
        .route("/identify", post(identify))
        .route("/identities", get(list_identities))
        .route("/identity/{name}", get(list_artifacts))
        .route("/identity/{name}", delete(delete_identity))
        .route("/identity/{name}/{artifact}", delete(delete_artifact))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the HTTP server until the process is stopped.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the runtime cannot be created or the
/// listener cannot bind.
pub fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::storage("create_runtime", e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "starting visage HTTP server");

    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::storage("bind", e))?;

        axum::serve(listener, router(state))
            .await
            .map_err(|e| Error::storage("serve", e))
    })
}

/// Runs a blocking service call on the blocking pool.
async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(Error::storage("join_blocking_task", e)))?
        .map_err(ApiError)
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    faces: Vec<FaceBox>,
}

async fn detect(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<DetectResponse>, ApiError> {
    let faces = blocking(move || state.identification.detect(&body)).await?;
    Ok(Json(DetectResponse { faces }))
}

async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let identity = IdentityName::new(name)?;
    let outcome = blocking(move || {
        state.enrollment.enroll(EnrollRequest {
            identity,
            image_bytes: body.to_vec(),
            embedding: None,
            face_box: None,
        })
    })
    .await?;
    Ok(enroll_response(outcome))
}

/// Body of a learn request: the caller already ran detection.
#[derive(Debug, Deserialize)]
struct LearnBody {
    /// Base64-encoded png or jpeg.
    image: String,
    /// Face location within the image.
    #[serde(rename = "box")]
    face_box: FaceBox,
    /// Precomputed embedding vector.
    embedding: Vec<f32>,
}

async fn learn(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<LearnBody>,
) -> std::result::Result<Response, ApiError> {
    let identity = IdentityName::new(name)?;
    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&body.image)
        .map_err(|e| Error::InvalidInput(format!("image is not valid base64: {e}")))?;

    let outcome = blocking(move || {
        state.enrollment.enroll(EnrollRequest {
            identity,
            image_bytes,
            embedding: Some(body.embedding),
            face_box: Some(body.face_box),
        })
    })
    .await?;
    Ok(enroll_response(outcome))
}

/// Maps an enrollment outcome to its transport status.
fn enroll_response(outcome: EnrollOutcome) -> Response {
    let status = match &outcome {
        EnrollOutcome::Enrolled { .. } => StatusCode::OK,
        EnrollOutcome::Duplicate { .. } => StatusCode::CONFLICT,
        EnrollOutcome::NoFaceFound => StatusCode::BAD_REQUEST,
    };
    (status, Json(outcome)).into_response()
}

#[derive(Debug, Deserialize)]
struct IdentifyParams {
    threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
struct IdentifyResponse {
    results: Vec<IdentifiedFace>,
}

async fn identify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdentifyParams>,
    body: Bytes,
) -> std::result::Result<Json<IdentifyResponse>, ApiError> {
    let results =
        blocking(move || state.identification.identify_image(&body, params.threshold)).await?;
    Ok(Json(IdentifyResponse { results }))
}

#[derive(Debug, Serialize)]
struct IdentitiesResponse {
    identities: Vec<String>,
}

async fn list_identities(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<IdentitiesResponse>, ApiError> {
    let identities = state.cache.list_identities().map_err(ApiError)?;
    Ok(Json(IdentitiesResponse { identities }))
}

#[derive(Debug, Serialize)]
struct ArtifactsResponse {
    artifacts: Vec<String>,
}

async fn list_artifacts(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> std::result::Result<Json<ArtifactsResponse>, ApiError> {
    let identity = IdentityName::new(name)?;
    let artifacts = blocking(move || state.store.list_artifacts(&identity)).await?;
    Ok(Json(ArtifactsResponse { artifacts }))
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn delete_identity(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let identity = IdentityName::new(name)?;
    let reported = identity.as_str().to_string();
    let existed = blocking(move || state.enrollment.delete_identity(&identity)).await?;
    if existed {
        Ok(Json(DeletedResponse { deleted: true }).into_response())
    } else {
        Err(ApiError(Error::IdentityNotFound(reported)))
    }
}

async fn delete_artifact(
    State(state): State<Arc<AppState>>,
    Path((name, artifact)): Path<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    let identity = IdentityName::new(name)?;
    let reported = identity.as_str().to_string();

    // Accept either the base name or a full artifact file name.
    let base = artifact
        .strip_suffix(".png")
        .or_else(|| artifact.strip_suffix(".json"))
        .unwrap_or(&artifact)
        .to_string();

    let existed = blocking(move || state.enrollment.remove_record(&identity, &base)).await?;
    if existed {
        Ok(Json(DeletedResponse { deleted: true }).into_response())
    } else {
        Err(ApiError(Error::IdentityNotFound(reported)))
    }
}
