// `/initial` endpoint client
//
// One JSON POST endpoint, discriminated by `post_name`. Success for FS_SETUP and
// SAVE_SOURCE_SYSTEMS is any 2xx; TEST_CONNECTION additionally carries a JSON body. Nothing is
// retried here: every failure is reported once and the user re-triggers the action.

use crate::models::requests::InitialRequest;
use crate::models::responses::{InitialResponse, TestConnectionResponse};

use async_trait::async_trait;
use log::{info, warn};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use std::time::{Duration, Instant};
use url::Url;

pub const INITIAL_PATH: &str = "initial";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse server response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Backend seam for the wizard. The HTTP implementation is the production one; tests substitute
/// recording fakes.
#[async_trait]
pub trait SetupBackend: Send + Sync {
    async fn send(&self, request: &InitialRequest) -> Result<InitialResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpSetupBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSetupBackend {
    /// `base_url` is the server root; requests go to `<base_url>/initial`.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint_for(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Join `initial` onto the base URL, keeping any path prefix the base already has.
pub fn endpoint_for(base_url: &Url) -> Result<Url, ApiError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(INITIAL_PATH)?)
}

#[async_trait]
impl SetupBackend for HttpSetupBackend {
    async fn send(&self, request: &InitialRequest) -> Result<InitialResponse, ApiError> {
        let started = Instant::now();
        let post_name = request.post_name();
        info!(
            "[PHASE: setup] [STEP: {}] POST {} requested",
            post_name.to_ascii_lowercase(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    "[PHASE: setup] [STEP: {}] Request failed before a response arrived: {}",
                    post_name.to_ascii_lowercase(),
                    e
                );
                ApiError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "[PHASE: setup] [STEP: {}] Server returned HTTP {} (duration_ms={})",
                post_name.to_ascii_lowercase(),
                status.as_u16(),
                started.elapsed().as_millis()
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply = match request {
            InitialRequest::TestConnection { .. } => {
                let bytes = response.bytes().await?;
                let parsed: TestConnectionResponse = serde_json::from_slice(&bytes)?;
                InitialResponse::ConnectionTest(parsed)
            }
            InitialRequest::FsSetup { .. } | InitialRequest::SaveSourceSystems { .. } => {
                InitialResponse::Ack
            }
        };

        info!(
            "[PHASE: setup] [STEP: {}] completed (status={}, duration_ms={})",
            post_name.to_ascii_lowercase(),
            status.as_u16(),
            started.elapsed().as_millis()
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::system::{SourceSystemsRegistry, SystemRecord, SystemType};
    use mockito::Matcher;

    fn backend_for(server: &mockito::ServerGuard) -> HttpSetupBackend {
        let base = Url::parse(&server.url()).expect("mock url");
        HttpSetupBackend::new(&base, Duration::from_secs(5)).expect("client")
    }

    // -------------------------------------------------------------------------
    // Endpoint resolution
    // -------------------------------------------------------------------------

    #[test]
    fn endpoint_is_initial_under_base() {
        let root = Url::parse("http://127.0.0.1:8888").expect("url");
        assert_eq!(
            endpoint_for(&root).expect("join").as_str(),
            "http://127.0.0.1:8888/initial"
        );

        let prefixed = Url::parse("https://admin.example.com/tool").expect("url");
        assert_eq!(
            endpoint_for(&prefixed).expect("join").as_str(),
            "https://admin.example.com/tool/initial"
        );
    }

    // -------------------------------------------------------------------------
    // Wire behaviour
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn fs_setup_posts_json_and_accepts_any_2xx() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/initial")
            .match_header("content-type", "application/json")
            .match_header("cache-control", "no-cache")
            .match_body(Matcher::Json(serde_json::json!({
                "post_name": "FS_SETUP",
                "path": "/srv/setup"
            })))
            .with_status(204)
            .create_async()
            .await;

        let result = backend_for(&server)
            .send(&InitialRequest::FsSetup {
                path: "/srv/setup".to_string(),
            })
            .await;

        mock.assert_async().await;
        assert_eq!(result.expect("2xx is success"), InitialResponse::Ack);
    }

    #[tokio::test]
    async fn test_connection_parses_status_and_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/initial")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "post_name": "TEST_CONNECTION",
                "system_type": "source",
                "system_info": { "system_name": "DB1" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"conn_status": false, "error_msg": "auth failed"}"#)
            .create_async()
            .await;

        let result = backend_for(&server)
            .send(&InitialRequest::TestConnection {
                system_info: SystemRecord {
                    system_name: "DB1".to_string(),
                    ..Default::default()
                },
                system_type: SystemType::Source,
            })
            .await;

        mock.assert_async().await;
        assert_eq!(
            result.expect("reply"),
            InitialResponse::ConnectionTest(TestConnectionResponse {
                conn_status: false,
                error_msg: Some("auth failed".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn non_2xx_maps_to_status_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/initial")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let result = backend_for(&server)
            .send(&InitialRequest::SaveSourceSystems {
                source_systems: SourceSystemsRegistry::default(),
            })
            .await;

        mock.assert_async().await;
        match result {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("Internal"), "body should be kept: {}", body);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_test_connection_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/initial")
            .with_status(200)
            .with_body("not json at all")
            .create_async()
            .await;

        let result = backend_for(&server)
            .send(&InitialRequest::TestConnection {
                system_info: SystemRecord::default(),
                system_type: SystemType::Target,
            })
            .await;

        mock.assert_async().await;
        assert!(
            matches!(result, Err(ApiError::Decode(_))),
            "expected decode error, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let base = Url::parse("http://127.0.0.1:9").expect("url");
        let backend = HttpSetupBackend::new(&base, Duration::from_secs(2)).expect("client");

        let result = backend
            .send(&InitialRequest::FsSetup {
                path: "/tmp".to_string(),
            })
            .await;
        assert!(
            matches!(result, Err(ApiError::Transport(_))),
            "expected transport error, got {:?}",
            result
        );
    }
}
