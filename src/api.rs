//! REST API for the truck loading service.
//!
//! Provides HTTP endpoints to run the optimizer and to fetch the latest
//! arrangement. Uses Axum as the web framework and supports CORS.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::model::{BoxType, CargoBox, ContainerSpec, ValidationError, expand_box_types};
use crate::optimizer::{
    ArrangedBox, BoxInputSummary, EpsilonSchedule, PackEvent, PackingConfig, PackingResult,
    optimize, optimize_with_progress, summarize_inputs,
};

/// The most recent successful run, served by the GET endpoints.
#[derive(Clone, Debug)]
struct StoredRun {
    container: ContainerInfo,
    final_arrangement: Vec<ArrangedBox>,
}

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
    latest: Arc<RwLock<Option<StoredRun>>>,
}

impl ApiState {
    fn new(optimizer_config: OptimizerConfig) -> Self {
        Self {
            optimizer_config,
            latest: Arc::new(RwLock::new(None)),
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>truck_loadout API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Truck cargo space as sent by clients.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({
    "length": 240.0, "width": 96.0, "height": 96.0, "capacity": 45000.0
}))]
pub struct ContainerRequest {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    /// Weight capacity, reported but not enforced
    pub capacity: f64,
}

impl ContainerRequest {
    fn into_spec(self) -> Result<ContainerSpec, ValidationError> {
        ContainerSpec::new((self.length, self.width, self.height), self.capacity)
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "length": 240.0, "width": 96.0, "height": 96.0, "capacity": 45000.0 },
        "box_types": [
            { "name": "XS", "length": 8.0, "width": 6.0, "height": 2.0,
              "weight": 500.0, "quantity": 4, "fragile": true },
            { "name": "L", "length": 20.0, "width": 16.0, "height": 12.0,
              "weight": 8000.0, "quantity": 2 }
        ],
        "restarts": 5,
        "epsilon_schedule": "annealing",
        "seed": 42
    })
)]
pub struct PackRequest {
    pub container: ContainerRequest,
    pub box_types: Vec<BoxType>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub restarts: Option<usize>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub epsilon: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub epsilon_schedule: Option<EpsilonSchedule>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub seed: Option<u64>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    spec: ContainerSpec,
    boxes: Vec<CargoBox>,
    config: PackingConfig,
}

impl ValidatedPackRequest {
    fn box_count(&self) -> usize {
        self.boxes.len()
    }
}

#[derive(Debug)]
enum PackRequestValidationError {
    MissingBoxTypes,
    InvalidContainer(ValidationError),
    InvalidBoxes(ValidationError),
    InvalidOptions(ValidationError),
}

impl PackRequest {
    /// Validates the request and applies its overrides on top of `base`.
    fn into_validated(
        self,
        base: PackingConfig,
    ) -> Result<ValidatedPackRequest, PackRequestValidationError> {
        if self.box_types.is_empty() {
            return Err(PackRequestValidationError::MissingBoxTypes);
        }

        let spec = self
            .container
            .into_spec()
            .map_err(PackRequestValidationError::InvalidContainer)?;
        let boxes =
            expand_box_types(&self.box_types).map_err(PackRequestValidationError::InvalidBoxes)?;

        let mut config = base;
        if let Some(restarts) = self.restarts {
            config.restarts = restarts;
        }
        if let Some(epsilon) = self.epsilon {
            config.epsilon = epsilon;
        }
        if let Some(schedule) = self.epsilon_schedule {
            config.epsilon_schedule = schedule;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
            .validate()
            .map_err(PackRequestValidationError::InvalidOptions)?;
        config
            .validate_for(&spec)
            .map_err(PackRequestValidationError::InvalidContainer)?;

        Ok(ValidatedPackRequest {
            spec,
            boxes,
            config,
        })
    }
}

/// Container dimensions and capacity of a run.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ContainerInfo {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub wt_capacity: f64,
}

impl From<&ContainerSpec> for ContainerInfo {
    fn from(spec: &ContainerSpec) -> Self {
        Self {
            length: spec.dims.x,
            width: spec.dims.y,
            height: spec.dims.z,
            wt_capacity: spec.capacity,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UnplacedEntry {
    pub box_id: String,
    pub reason_code: String,
    pub reason: String,
}

/// Response of a packing run.
///
/// # Fields
/// * `final_arrangement` - Committed boxes of the best restart, in commit order
/// * `best_score` - Final score of the best restart, lower is better
/// * `restart_scores` - Final score of every restart
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub container: ContainerInfo,
    pub boxes_input: Vec<BoxInputSummary>,
    pub final_arrangement: Vec<ArrangedBox>,
    pub best_score: f64,
    pub placed_count: usize,
    pub unplaced_count: usize,
    pub unplaced: Vec<UnplacedEntry>,
    pub restart_scores: Vec<f64>,
    pub utilization_percent: f64,
    pub remaining_capacity: f64,
    pub seed: u64,
}

impl PackResponse {
    fn from_packing_result(result: &PackingResult, boxes: &[CargoBox]) -> Self {
        Self {
            container: ContainerInfo::from(&result.spec),
            boxes_input: summarize_inputs(boxes, &result.spec),
            final_arrangement: result.arrangement(),
            best_score: result.best_score,
            placed_count: result.placed_count(),
            unplaced_count: result.unplaced_count(),
            unplaced: result
                .unplaced
                .iter()
                .map(|entry| UnplacedEntry {
                    box_id: entry.cargo.id.clone(),
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            restart_scores: result.restart_scores.clone(),
            utilization_percent: result.utilization_percent(),
            remaining_capacity: result.remaining_capacity(),
            seed: result.seed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FinalArrangementResponse {
    pub final_arrangement: Vec<ArrangedBox>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn no_run_yet() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "No arrangement available",
        "Run POST /pack first",
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    base: PackingConfig,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(base) {
        Ok(validated) => Ok(validated),
        Err(PackRequestValidationError::MissingBoxTypes) => Err(validation_error(
            "At least one box type must be specified",
        )),
        Err(PackRequestValidationError::InvalidContainer(err)) => {
            Err(container_config_error(err.to_string()))
        }
        Err(PackRequestValidationError::InvalidBoxes(err))
        | Err(PackRequestValidationError::InvalidOptions(err)) => {
            Err(validation_error(err.to_string()))
        }
    }
}

impl StoredRun {
    fn from_result(result: &PackingResult) -> Self {
        Self {
            container: ContainerInfo::from(&result.spec),
            final_arrangement: result.arrangement(),
        }
    }
}

async fn store_run(state: &ApiState, result: &PackingResult) {
    *state.latest.write().await = Some(StoredRun::from_result(result));
}

/// Runs the optimizer for `/pack_stream`, passing each serialized event to `send`.
///
/// The `Finished` event is held back until the run is stored, so a client
/// reacting to it always finds the new arrangement.
fn run_streamed(
    request: ValidatedPackRequest,
    latest: &RwLock<Option<StoredRun>>,
    mut send: impl FnMut(String),
) {
    let ValidatedPackRequest {
        spec,
        boxes,
        config,
    } = request;

    let mut finished = None;
    let outcome = optimize_with_progress(&boxes, spec, config, |evt| {
        if matches!(evt, PackEvent::Finished { .. }) {
            finished = serde_json::to_string(evt).ok();
        } else if let Ok(json) = serde_json::to_string(evt) {
            send(json);
        }
    });

    match outcome {
        Ok(result) => {
            *latest.blocking_write() = Some(StoredRun::from_result(&result));
            if let Some(json) = finished {
                send(json);
            }
        }
        Err(err) => {
            log::warn!("Streamed packing run failed: {err}");
            if let Ok(json) = serde_json::to_string(&ErrorResponse::new(
                "Invalid input data",
                err.to_string(),
            )) {
                send(json);
            }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_pack,
        handle_pack_stream,
        handle_final_arrangement,
        handle_config
    ),
    components(
        schemas(
            PackRequest,
            ContainerRequest,
            BoxType,
            EpsilonSchedule,
            PackResponse,
            ContainerInfo,
            BoxInputSummary,
            ArrangedBox,
            UnplacedEntry,
            FinalArrangementResponse,
            ErrorResponse
        )
    ),
    tags((name = "loading", description = "Endpoints for truck loading optimization"))
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // API endpoints
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/final_arrangement", get(handle_final_arrangement))
        .route("/config", get(handle_config))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
///
/// Configures CORS for cross-origin requests from visualization clients.
pub async fn start_api_server(config: ApiConfig, optimizer_config: OptimizerConfig) {
    let app = router(ApiState::new(optimizer_config));

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("❌ Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    println!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /pack");
    println!("   - POST /pack_stream");
    println!("   - GET /final_arrangement");
    println!("   - GET /config");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        log::error!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /pack.
///
/// Expands the box types, runs all restarts on a blocking task and returns the
/// best arrangement. The result becomes the latest run.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Best arrangement found", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let base = state.optimizer_config.packing_config();
    let request = match parse_pack_request(payload, base) {
        Ok(request) => request,
        Err(response) => return response,
    };

    log::info!(
        "📥 New pack request: {} boxes, {} restarts",
        request.box_count(),
        request.config.restarts
    );
    let ValidatedPackRequest {
        spec,
        boxes,
        config,
    } = request;

    let joined = tokio::task::spawn_blocking(move || {
        let result = optimize(&boxes, spec, config);
        (result, boxes)
    })
    .await;
    let (result, boxes) = match joined {
        Ok((Ok(result), boxes)) => (result, boxes),
        Ok((Err(err), _)) => return validation_error(err.to_string()),
        Err(err) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Packing task failed",
                err.to_string(),
            );
        }
    };

    log::info!(
        "📦 Result: score {:.2}, {} placed, {} unplaced",
        result.best_score,
        result.placed_count(),
        result.unplaced_count()
    );
    store_run(&state, &result).await;

    let response = PackResponse::from_packing_result(&result, &boxes);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /pack_stream (SSE).
///
/// Streams pack events as Server-Sent Events while the restarts run. The
/// final arrangement becomes the latest run before the `Finished` event is sent.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Response {
    let base = state.optimizer_config.packing_config();
    let request = match parse_pack_request(payload, base) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let latest = Arc::clone(&state.latest);

    tokio::task::spawn_blocking(move || {
        run_streamed(request, &latest, |json| {
            // a closed receiver only drops the remaining events
            let _ = tx.blocking_send(json);
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /final_arrangement.
#[utoipa::path(
    get,
    path = "/final_arrangement",
    responses(
        (status = 200, description = "Arrangement of the latest run", body = FinalArrangementResponse),
        (status = NOT_FOUND, description = "Nothing packed yet", body = ErrorResponse)
    ),
    tag = "loading"
)]
async fn handle_final_arrangement(State(state): State<ApiState>) -> Response {
    match state.latest.read().await.as_ref() {
        Some(run) => Json(FinalArrangementResponse {
            final_arrangement: run.final_arrangement.clone(),
        })
        .into_response(),
        None => no_run_yet(),
    }
}

/// Handler for GET /config.
#[utoipa::path(
    get,
    path = "/config",
    responses(
        (status = 200, description = "Container of the latest run", body = ContainerInfo),
        (status = NOT_FOUND, description = "Nothing packed yet", body = ErrorResponse)
    ),
    tag = "loading"
)]
async fn handle_config(State(state): State<ApiState>) -> Response {
    match state.latest.read().await.as_ref() {
        Some(run) => Json(run.container.clone()).into_response(),
        None => no_run_yet(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REQUEST: &str = r#"{
        "container": {"length": 4.0, "width": 2.0, "height": 2.0, "capacity": 100.0},
        "box_types": [
            {"name": "cube", "length": 2.0, "width": 2.0, "height": 2.0,
             "weight": 10.0, "quantity": 2}
        ],
        "restarts": 2,
        "seed": 7
    }"#;

    fn state() -> ApiState {
        ApiState::new(OptimizerConfig::from(PackingConfig::default()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Body should be readable");
        serde_json::from_slice(&bytes).expect("Body should be JSON")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/pack", "/pack_stream", "/final_arrangement", "/config"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["PackRequest", "PackResponse", "ArrangedBox", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn pack_request_optional_fields_default_to_none() {
        let json = r#"{
            "container": {"length": 10.0, "width": 10.0, "height": 10.0, "capacity": 100.0},
            "box_types": [{"name": "a", "length": 1.0, "width": 1.0, "height": 1.0,
                           "weight": 1.0, "quantity": 1}]
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert!(request.restarts.is_none());
        assert!(request.epsilon.is_none());
        assert!(request.epsilon_schedule.is_none());
        assert!(request.seed.is_none());
        assert!(!request.box_types[0].fragile);
    }

    #[test]
    fn pack_request_parses_schedule_names() {
        let json = r#"{
            "container": {"length": 10.0, "width": 10.0, "height": 10.0, "capacity": 100.0},
            "box_types": [],
            "epsilon_schedule": "annealing"
        }"#;
        let request: PackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        assert_eq!(request.epsilon_schedule, Some(EpsilonSchedule::Annealing));
    }

    #[test]
    fn request_overrides_apply_on_top_of_server_config() {
        let request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        let base = PackingConfig::builder().epsilon(0.25).restarts(9).build();
        let validated = request.into_validated(base).expect("Should validate");

        assert_eq!(validated.config.restarts, 2);
        assert_eq!(validated.config.seed, Some(7));
        assert_eq!(validated.config.epsilon, 0.25);
        assert_eq!(validated.box_count(), 2);
        assert_eq!(validated.boxes[1].id, "Box_2");
    }

    #[test]
    fn invalid_requests_are_classified() {
        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.box_types.clear();
        assert!(matches!(
            request.into_validated(PackingConfig::default()),
            Err(PackRequestValidationError::MissingBoxTypes)
        ));

        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.container.height = -1.0;
        assert!(matches!(
            request.into_validated(PackingConfig::default()),
            Err(PackRequestValidationError::InvalidContainer(_))
        ));

        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.box_types[0].weight = -1.0;
        assert!(matches!(
            request.into_validated(PackingConfig::default()),
            Err(PackRequestValidationError::InvalidBoxes(_))
        ));

        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.box_types[0].weight = 0.0;
        assert!(request.into_validated(PackingConfig::default()).is_ok());

        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.container.length = 1e10;
        request.container.width = 1e10;
        assert!(matches!(
            request.into_validated(PackingConfig::default()),
            Err(PackRequestValidationError::InvalidContainer(_))
        ));

        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.epsilon = Some(2.0);
        assert!(matches!(
            request.into_validated(PackingConfig::default()),
            Err(PackRequestValidationError::InvalidOptions(_))
        ));
    }

    #[test]
    fn streamed_run_is_stored_before_finished_event() {
        let request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        let validated = request.into_validated(PackingConfig::default()).unwrap();
        let latest = RwLock::new(None);

        let mut messages: Vec<serde_json::Value> = Vec::new();
        run_streamed(validated, &latest, |json| {
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            if value["type"] == "Finished" {
                let stored = latest.try_read().expect("Run should not be locked");
                let run = stored.as_ref().expect("Run should be stored first");
                assert_eq!(run.final_arrangement.len(), 2);
            }
            messages.push(value);
        });

        assert_eq!(messages.last().map(|m| m["type"].clone()), Some("Finished".into()));
        let finished = messages.iter().filter(|m| m["type"] == "Finished").count();
        assert_eq!(finished, 1);
        assert!(messages.iter().any(|m| m["type"] == "BoxPlaced"));
    }

    #[tokio::test]
    async fn pack_stream_streams_events_and_stores_the_run() {
        let state = state();
        let request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();

        let response = handle_pack_stream(State(state.clone()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Stream should complete");
        let body = String::from_utf8(bytes.to_vec()).expect("Stream should be UTF-8");
        assert!(body.contains("\"type\":\"RestartStarted\""));
        assert!(body.contains("\"type\":\"Finished\""));

        let response = handle_final_arrangement(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["final_arrangement"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn pack_stream_rejects_invalid_requests_up_front() {
        let mut request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();
        request.box_types.clear();
        let response = handle_pack_stream(State(state()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn get_endpoints_return_not_found_before_first_run() {
        let state = state();
        let response = handle_final_arrangement(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = handle_config(State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pack_stores_latest_run() {
        let state = state();
        let request: PackRequest = serde_json::from_str(VALID_REQUEST).unwrap();

        let response = handle_pack(State(state.clone()), Ok(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["placed_count"], 2);
        assert_eq!(body["unplaced_count"], 0);
        assert_eq!(body["boxes_input"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["restart_scores"].as_array().map(Vec::len), Some(2));

        let response = handle_final_arrangement(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["final_arrangement"].as_array().map(Vec::len), Some(2));

        let response = handle_config(State(state)).await;
        let body = body_json(response).await;
        assert_eq!(body["length"], 4.0);
        assert_eq!(body["wt_capacity"], 100.0);
    }
}
