//! HTTP client for a running study-companion server.
//!
//! The request/response bodies live here as well, so the server and any
//! client agree on one wire format.

use crate::core::aggregation::SessionStats;
use crate::core::timeline::TimelinePoint;
use crate::detection::{DetectionSample, FocusState};
use crate::session::{NewSession, NewSessionEvent, Session, SessionEvent, SessionPatch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the server listens.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host (default: 127.0.0.1)
    pub host: String,
    /// Server port
    pub port: u16,
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A server on the loopback interface.
    pub fn local(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }

    pub fn sessions_url(&self) -> String {
        format!("{}/api/sessions", self.url())
    }

    pub fn session_url(&self, id: Uuid) -> String {
        format!("{}/{}", self.sessions_url(), id)
    }

    pub fn detect_url(&self) -> String {
        format!("{}/api/detect", self.url())
    }
}

/// Client error types.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network/HTTP error
    #[error("network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ClientError {
    /// HTTP status of a server-side error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Result of posting an observed state to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    /// Whether a transition was appended
    pub recorded: bool,
    pub event: Option<SessionEvent>,
    pub session: Session,
}

/// Body of a detection request. When a session is named, the sample is
/// also recorded to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// A detection sample and, if a session was named, what was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub sample: DetectionSample,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordResponse>,
}

/// Query of a timeline request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineQuery {
    /// Seconds between points; the server defaults to one minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
}

/// Body of a forced-state request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub state: FocusState,
}

/// Async client for the session and detection API.
pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Test connection to the server.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.send(self.client.get(self.config.health_url())).await?;
        Self::json(response).await
    }

    pub async fn create_session(&self, user_id: Option<String>) -> Result<Session, ClientError> {
        let body = NewSession { user_id };
        let request = self.client.post(self.config.sessions_url()).json(&body);
        Self::json(self.send(request).await?).await
    }

    pub async fn current_session(&self) -> Result<Session, ClientError> {
        let url = format!("{}/current", self.config.sessions_url());
        Self::json(self.send(self.client.get(url)).await?).await
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Session, ClientError> {
        let request = self.client.get(self.config.session_url(id));
        Self::json(self.send(request).await?).await
    }

    pub async fn patch_session(
        &self,
        id: Uuid,
        patch: &SessionPatch,
    ) -> Result<Session, ClientError> {
        let request = self.client.patch(self.config.session_url(id)).json(patch);
        Self::json(self.send(request).await?).await
    }

    pub async fn end_session(&self, id: Uuid) -> Result<Session, ClientError> {
        let url = format!("{}/end", self.config.session_url(id));
        Self::json(self.send(self.client.post(url)).await?).await
    }

    pub async fn record_state(
        &self,
        id: Uuid,
        state: FocusState,
        confidence: f64,
    ) -> Result<RecordResponse, ClientError> {
        let url = format!("{}/events", self.config.session_url(id));
        let body = NewSessionEvent { state, confidence };
        Self::json(self.send(self.client.post(url).json(&body)).await?).await
    }

    pub async fn events(&self, id: Uuid) -> Result<Vec<SessionEvent>, ClientError> {
        let url = format!("{}/events", self.config.session_url(id));
        Self::json(self.send(self.client.get(url)).await?).await
    }

    pub async fn stats(&self, id: Uuid) -> Result<SessionStats, ClientError> {
        let url = format!("{}/stats", self.config.session_url(id));
        Self::json(self.send(self.client.get(url)).await?).await
    }

    /// The session's state sampled every `step` seconds.
    pub async fn timeline(
        &self,
        id: Uuid,
        step: Option<u64>,
    ) -> Result<Vec<TimelinePoint>, ClientError> {
        let url = format!("{}/timeline", self.config.session_url(id));
        let request = self.client.get(url).query(&TimelineQuery { step });
        Self::json(self.send(request).await?).await
    }

    /// Classify one frame, recording the result to `session_id` if given.
    pub async fn detect(&self, session_id: Option<Uuid>) -> Result<DetectResponse, ClientError> {
        let body = DetectRequest { session_id };
        let request = self.client.post(self.config.detect_url()).json(&body);
        Self::json(self.send(request).await?).await
    }

    pub async fn detection_history(&self) -> Result<Vec<DetectionSample>, ClientError> {
        let url = format!("{}/history", self.config.detect_url());
        Self::json(self.send(self.client.get(url)).await?).await
    }

    /// Force the detector into `state`.
    pub async fn trigger(&self, state: FocusState) -> Result<DetectionSample, ClientError> {
        let url = format!("{}/trigger", self.config.detect_url());
        let body = TriggerRequest { state };
        Self::json(self.send(self.client.post(url).json(&body)).await?).await
    }

    pub async fn reset_detector(&self) -> Result<(), ClientError> {
        let url = format!("{}/reset", self.config.detect_url());
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| format!("{} ({})", e.error, e.code))
            .unwrap_or(body);

        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_urls() {
        let config = ApiConfig::local(5000);
        let id = Uuid::nil();
        assert_eq!(config.url(), "http://127.0.0.1:5000");
        assert_eq!(config.health_url(), "http://127.0.0.1:5000/health");
        assert_eq!(config.sessions_url(), "http://127.0.0.1:5000/api/sessions");
        assert_eq!(
            config.session_url(id),
            "http://127.0.0.1:5000/api/sessions/00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(config.detect_url(), "http://127.0.0.1:5000/api/detect");
    }

    #[test]
    fn test_server_error_display() {
        let err = ClientError::Server {
            status: 404,
            message: "session not found (SESSION_NOT_FOUND)".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));
        assert_eq!(ClientError::Network("refused".into()).status(), None);
    }

    #[test]
    fn test_detect_request_omits_absent_session() {
        let json = serde_json::to_string(&DetectRequest::default()).unwrap();
        assert_eq!(json, "{}");

        let id = Uuid::new_v4();
        let json = serde_json::to_value(DetectRequest {
            session_id: Some(id),
        })
        .unwrap();
        assert_eq!(json["sessionId"], id.to_string());
    }
}
