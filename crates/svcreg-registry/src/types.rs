//! Request and response bodies of the HTTP API.

use crate::liveness::SweepStats;
use serde::{Deserialize, Serialize};
use svcreg_common::{EncodedEndpoint, EndpointDescriptor, ServiceName};

/// Body of `POST /api/v1/register` and `POST /api/v1/unregister`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub service: ServiceName,
    pub endpoint: EndpointDescriptor,
}

/// Response from register/unregister.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response from discovering a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub service: ServiceName,
    /// Encoded endpoints in registration order.
    pub endpoints: Vec<EncodedEndpoint>,
    /// The same endpoints decoded; malformed tokens are left out.
    pub descriptors: Vec<EndpointDescriptor>,
}

/// Node status reported by `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub first_node: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<SweepStats>,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_request_json() {
        let request: EndpointRequest = serde_json::from_str(
            r#"{"service":"Cache","endpoint":{"GRPC":"10.0.0.1:9000","HTTP":"10.0.0.1:8080"}}"#,
        )
        .unwrap();

        assert_eq!(request.service, ServiceName::from("Cache"));
        assert_eq!(request.endpoint.len(), 2);
    }

    #[test]
    fn test_endpoint_request_rejects_empty_service() {
        let result = serde_json::from_str::<EndpointRequest>(
            r#"{"service":"","endpoint":{"GRPC":"10.0.0.1:9000"}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_request_rejects_reserved_characters() {
        let result = serde_json::from_str::<EndpointRequest>(
            r#"{"service":"Cache","endpoint":{"GRPC":"10.0.0.1$9000"}}"#,
        );
        assert!(result.is_err());
    }
}
