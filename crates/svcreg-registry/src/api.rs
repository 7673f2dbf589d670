//! HTTP API handlers using axum.
//!
//! Registry routes:
//!
//! - `POST /api/v1/register`, `POST /api/v1/unregister`
//! - `GET /api/v1/discover/:service`
//! - `GET /api/v1/services`
//! - `GET /api/v1/health`
//!
//! DHT routes served to nodes that joined this node's ring:
//!
//! - `GET /api/v1/dht/keys`
//! - `GET|PUT|DELETE /api/v1/dht/keys/:key`

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use std::sync::Arc;
use svcreg_common::{Error, ServiceName};
use tracing::{error, info};

use crate::{
    codec::decode_endpoint,
    dht::Dht,
    liveness::SweepStats,
    registry::{RegisterOutcome, Registry, UnregisterOutcome},
    types::{DiscoverResponse, EndpointRequest, ErrorResponse, HealthResponse, MutationResponse},
};

/// Shared state of the registry routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// Present when this node runs the liveness engine.
    pub liveness: Option<Arc<RwLock<SweepStats>>>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            liveness: None,
        }
    }

    pub fn with_liveness(mut self, stats: Arc<RwLock<SweepStats>>) -> Self {
        self.liveness = Some(stats);
        self
    }
}

/// Creates the full API router (registry + DHT routes).
pub fn create_router(state: AppState) -> Router {
    let dht = Arc::clone(state.registry.dht());

    Router::new()
        .route("/api/v1/register", post(register_handler))
        .route("/api/v1/unregister", post(unregister_handler))
        .route("/api/v1/discover/:service", get(discover_handler))
        .route("/api/v1/services", get(services_handler))
        .route("/api/v1/health", get(health_handler))
        .with_state(state)
        .merge(dht_router(dht))
}

/// Routes exposing a DHT store to remote nodes.
pub fn dht_router(dht: Arc<dyn Dht>) -> Router {
    Router::new()
        .route("/api/v1/dht/keys", get(dht_keys_handler))
        .route(
            "/api/v1/dht/keys/:key",
            get(dht_get_handler)
                .put(dht_put_handler)
                .delete(dht_delete_handler),
        )
        .with_state(dht)
}

async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<EndpointRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    info!("Register {} for service {}", req.endpoint, req.service);

    let message = match state.registry.try_register(&req.service, &req.endpoint).await? {
        RegisterOutcome::Added => format!("Registered endpoint for service {}", req.service),
        RegisterOutcome::AlreadyPresent => {
            format!("Endpoint already registered for service {}", req.service)
        }
    };

    Ok(Json(MutationResponse {
        success: true,
        message: Some(message),
    }))
}

async fn unregister_handler(
    State(state): State<AppState>,
    Json(req): Json<EndpointRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    info!("Unregister {} for service {}", req.endpoint, req.service);

    let message = match state.registry.try_unregister(&req.service, &req.endpoint).await? {
        UnregisterOutcome::Removed => format!("Unregistered endpoint from service {}", req.service),
        UnregisterOutcome::ServiceRemoved => {
            format!("Unregistered last endpoint; service {} removed", req.service)
        }
        UnregisterOutcome::NotRegistered => format!("Service {} not registered", req.service),
        UnregisterOutcome::EndpointNotFound => {
            format!("Endpoint not found for service {}", req.service)
        }
    };

    Ok(Json(MutationResponse {
        success: true,
        message: Some(message),
    }))
}

async fn discover_handler(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let service = ServiceName::from(service);
    info!("Discovering service: {}", service);

    let endpoints = state.registry.discover(&service).await?;
    let descriptors = endpoints
        .iter()
        .filter_map(|endpoint| decode_endpoint(endpoint).ok())
        .collect();

    Ok(Json(DiscoverResponse {
        service,
        endpoints,
        descriptors,
    }))
}

async fn services_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceName>>, ApiError> {
    Ok(Json(state.registry.services().await?))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        first_node: state.registry.is_first_node(),
        liveness: state.liveness.as_ref().map(|stats| stats.read().clone()),
    })
}

async fn dht_keys_handler(State(dht): State<Arc<dyn Dht>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(dht.keys().await?))
}

async fn dht_get_handler(
    State(dht): State<Arc<dyn Dht>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    match dht.get(&key).await? {
        Some(value) => Ok((StatusCode::OK, value).into_response()),
        None => Err(ApiError::NotFound(format!("Key {} not found", key))),
    }
}

async fn dht_put_handler(
    State(dht): State<Arc<dyn Dht>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    dht.set(&key, body.to_vec()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dht_delete_handler(
    State(dht): State<Arc<dyn Dht>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    dht.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::ServiceNotRegistered { .. } => ApiError::NotFound(err.to_string()),
            ref e if e.is_invalid_input() => ApiError::BadRequest(err.to_string()),
            ref e if e.is_dht_failure() => ApiError::Unavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        error!("API error: {} - {}", status, message);

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dht::MemoryDht;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt; // for `oneshot`

    fn app() -> (Router, MemoryDht) {
        let dht = MemoryDht::founding();
        let registry = Arc::new(Registry::new(Arc::new(dht.clone()), true));
        (create_router(AppState::new(registry)), dht)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_discover() {
        let (app, _) = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/register",
                r#"{"service":"Cache","endpoint":{"GRPC":"10.0.0.1:9000"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/v1/discover/Cache")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: DiscoverResponse = body_json(response).await;
        assert_eq!(body.endpoints.len(), 1);
        assert_eq!(body.endpoints[0].as_str(), "$GRPC$10.0.0.1:9000");
        assert_eq!(body.descriptors[0].address("GRPC"), Some("10.0.0.1:9000"));
    }

    #[tokio::test]
    async fn test_discover_unknown_is_404() {
        let (app, _) = app();
        let response = app.oneshot(get("/api/v1/discover/Unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_descriptor_rejected() {
        let (app, dht) = app();
        let response = app
            .oneshot(post_json(
                "/api/v1/register",
                r#"{"service":"Cache","endpoint":{}}"#,
            ))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(dht.is_empty());
    }

    #[tokio::test]
    async fn test_empty_service_name_rejected() {
        let (app, dht) = app();
        let response = app
            .oneshot(post_json(
                "/api/v1/register",
                r#"{"service":"","endpoint":{"GRPC":"10.0.0.1:9000"}}"#,
            ))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(dht.is_empty());
    }

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let response = ApiError::from(Error::invalid_service_name("", "empty")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(Error::dht_unavailable("get", "down")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unregister_endpoint() {
        let (app, dht) = app();
        let body = r#"{"service":"Cache","endpoint":{"GRPC":"10.0.0.1:9000"}}"#;

        app.clone().oneshot(post_json("/api/v1/register", body)).await.unwrap();
        let response = app.oneshot(post_json("/api/v1/unregister", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: MutationResponse = body_json(response).await;
        assert!(body.message.unwrap().contains("removed"));
        assert!(!dht.contains_key("Cache"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app();
        let response = app.oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert_eq!(body["first_node"], true);
    }

    #[tokio::test]
    async fn test_dht_routes() {
        let (app, dht) = app();

        let put = Request::builder()
            .method("PUT")
            .uri("/api/v1/dht/keys/Cache%20Service")
            .body(Body::from("value"))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(dht.contains_key("Cache Service"));

        let response = app.clone().oneshot(get("/api/v1/dht/keys/Cache%20Service")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"value");

        let response = app.clone().oneshot(get("/api/v1/dht/keys")).await.unwrap();
        let keys: Vec<String> = body_json(response).await;
        assert_eq!(keys, vec!["Cache Service"]);

        let response = app.clone().oneshot(get("/api/v1/dht/keys/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/v1/dht/keys/Cache%20Service")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(dht.is_empty());
    }
}
