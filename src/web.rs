use crate::gemini::GenerativeModel;
use crate::model::{
    CompareRequest, ComparisonResult, ConceptResult, ErrorBody, Level, SearchRequest,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

pub type SharedState<M> = Arc<FacadeState<M>>;

const SEARCH_FAILURE: &str = "The AI service could not process the search.";
const COMPARE_FAILURE: &str = "The AI service could not process the comparison.";

static CONCEPT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING", "description": "Two or three line summary of the concept." },
            "levels": {
                "type": "OBJECT",
                "properties": {
                    "basic": { "type": "STRING", "description": "Plain explanation with an everyday analogy." },
                    "intermediate": { "type": "STRING", "description": "Core principles with technical terms." },
                    "advanced": { "type": "STRING", "description": "Formal models and current research." }
                },
                "required": ["basic", "intermediate", "advanced"]
            },
            "related": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Five related concepts."
            },
            "diagramCode": {
                "type": "STRING",
                "description": "Mermaid graph, flowchart or mindmap without code fences."
            },
            "timeline": {
                "type": "ARRAY",
                "description": "Milestones in chronological order.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "year": { "type": "STRING" },
                        "event": { "type": "STRING" }
                    },
                    "required": ["year", "event"]
                }
            }
        },
        "required": ["summary", "levels", "related", "diagramCode"]
    })
});

static COMPARISON_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING", "description": "Main differences and similarities." },
            "comparison": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "criteria": { "type": "STRING" },
                        "conceptA": { "type": "STRING" },
                        "conceptB": { "type": "STRING" }
                    },
                    "required": ["criteria", "conceptA", "conceptB"]
                }
            }
        },
        "required": ["summary", "comparison"]
    })
});

pub struct FacadeState<M> {
    pub model: M,
}

#[derive(Clone, Debug)]
pub struct FacadeConfig {
    pub addr: SocketAddr,
    /// Directory served for every path the API does not claim.
    pub static_dir: Option<PathBuf>,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            static_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve<M: GenerativeModel>(config: FacadeConfig, model: M) -> Result<(), WebError> {
    let state = Arc::new(FacadeState { model });
    let router = build_router(state, config.static_dir.clone());
    info!(
        %config.addr,
        static_dir = ?config.static_dir,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: String,
    details: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.clone(),
            details: message,
        }
    }

    fn internal(error: &str, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.to_string(),
            details: details.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(payload)).into_response()
    }
}

pub fn build_router<M: GenerativeModel>(
    state: SharedState<M>,
    static_dir: Option<PathBuf>,
) -> Router {
    let router = Router::new()
        .route("/api/search", post(api_search::<M>))
        .route("/api/compare", post(api_compare::<M>))
        .route("/healthz", get(health))
        .with_state(state);
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "nexapedia-facade" }))
}

async fn api_search<M: GenerativeModel>(
    State(state): State<SharedState<M>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ConceptResult>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("Field `query` is required"));
    }
    info!(%query, level = %request.level, "search request");
    let prompt = search_prompt(query, request.level);
    let result = generate::<M, ConceptResult>(&state.model, prompt, &CONCEPT_SCHEMA)
        .await
        .map_err(|details| {
            warn!(%query, %details, "search generation failed");
            ApiError::internal(SEARCH_FAILURE, details)
        })?;
    info!(%query, "search answered");
    Ok(Json(result))
}

async fn api_compare<M: GenerativeModel>(
    State(state): State<SharedState<M>>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let concept_a = request.concept_a.trim();
    let concept_b = request.concept_b.trim();
    if concept_a.is_empty() || concept_b.is_empty() {
        return Err(ApiError::bad_request(
            "Fields `conceptA` and `conceptB` are required",
        ));
    }
    info!(%concept_a, %concept_b, "compare request");
    let prompt = compare_prompt(concept_a, concept_b);
    let result = generate::<M, ComparisonResult>(&state.model, prompt, &COMPARISON_SCHEMA)
        .await
        .map_err(|details| {
            warn!(%details, "comparison generation failed");
            ApiError::internal(COMPARE_FAILURE, details)
        })?;
    info!(%concept_a, %concept_b, "comparison answered");
    Ok(Json(result))
}

/// Asks the model for a document and validates it against the wire type.
async fn generate<M, T>(model: &M, prompt: String, schema: &Value) -> Result<T, String>
where
    M: GenerativeModel,
    T: DeserializeOwned,
{
    let value = model
        .generate_json(prompt, schema)
        .await
        .map_err(|err| err.to_string())?;
    serde_json::from_value(value).map_err(|err| format!("response did not match schema: {err}"))
}

fn search_prompt(query: &str, level: Level) -> String {
    format!(
        "You are an encyclopedia assistant that summarizes, structures and visualizes knowledge. \
         Explain the concept \"{query}\" following the JSON schema. The reader asked for the \
         {level} level. Put a Mermaid diagram that starts with `graph TD`, `flowchart TD` or \
         `mindmap` in `diagramCode`, quoting node labels that contain spaces or symbols."
    )
}

fn compare_prompt(concept_a: &str, concept_b: &str) -> String {
    format!(
        "You are an encyclopedia assistant that compares concepts. Compare \"{concept_a}\" and \
         \"{concept_b}\" following the JSON schema, using at least five distinct criteria."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::ModelError;
    use axum::body::{self, Body};
    use axum::http::Request;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    struct FakeModel {
        answer: Result<Value, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn answering(answer: Value) -> Self {
            Self {
                answer: Ok(answer),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl GenerativeModel for FakeModel {
        async fn generate_json(&self, prompt: String, _schema: &Value) -> Result<Value, ModelError> {
            self.prompts.lock().push(prompt);
            self.answer.clone().map_err(ModelError::Request)
        }
    }

    fn test_router(model: FakeModel) -> (Router, SharedState<FakeModel>) {
        let state = Arc::new(FacadeState { model });
        (build_router(state.clone(), None), state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn api_search_forwards_level_and_validates() {
        let (router, state) = test_router(FakeModel::answering(json!({
            "summary": "S",
            "levels": {"basic": "B", "intermediate": "I", "advanced": "A"},
            "related": ["force"],
            "diagramCode": "graph TD; A-->B"
        })));
        let response = router
            .oneshot(post_json(
                "/api/search",
                json!({"query": "gravity", "level": "basic"}),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: ConceptResult = read_json(response).await;
        assert_eq!(payload.related, vec!["force"]);
        let prompts = state.model.prompts.lock();
        assert!(prompts[0].contains("\"gravity\""));
        assert!(prompts[0].contains("basic"));
    }

    #[tokio::test]
    async fn api_compare_returns_rows() {
        let (router, _) = test_router(FakeModel::answering(json!({
            "summary": "Both convert heat to work.",
            "comparison": [{"criteria": "Motion", "conceptA": "Reciprocating", "conceptB": "Rotary"}]
        })));
        let response = router
            .oneshot(post_json(
                "/api/compare",
                json!({"conceptA": "steam engine", "conceptB": "turbine"}),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: ComparisonResult = read_json(response).await;
        assert_eq!(payload.comparison[0].concept_b, "Rotary");
    }

    #[tokio::test]
    async fn model_failure_is_500_with_details() {
        let (router, _) = test_router(FakeModel::failing("quota exhausted"));
        let response = router
            .oneshot(post_json(
                "/api/compare",
                json!({"conceptA": "steam engine", "conceptB": "turbine"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: ErrorBody = read_json(response).await;
        assert_eq!(payload.error, COMPARE_FAILURE);
        assert!(payload.details.contains("quota exhausted"));
    }

    #[tokio::test]
    async fn off_schema_answer_is_500() {
        let (router, _) = test_router(FakeModel::answering(json!({"related": "not a list"})));
        let response = router
            .oneshot(post_json("/api/search", json!({"query": "gravity"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: ErrorBody = read_json(response).await;
        assert!(payload.details.contains("schema"));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_before_the_model() {
        let (router, state) = test_router(FakeModel::failing("unused"));
        let response = router
            .oneshot(post_json("/api/search", json!({"query": "  ", "level": "advanced"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.model.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (router, _) = test_router(FakeModel::failing("unused"));
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: Value = read_json(response).await;
        assert_eq!(payload["status"], "ok");
    }

    #[test]
    fn schemas_require_core_fields() {
        assert_eq!(CONCEPT_SCHEMA["required"][0], "summary");
        assert_eq!(COMPARISON_SCHEMA["required"][1], "comparison");
    }
}
