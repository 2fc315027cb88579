//! # HTTP Transport
//!
//! `reqwest`-backed [`Transport`] for the Phantom REST API. Every call is
//! reported as an [`Outcome`]; nothing here returns an error once the client
//! has been built.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ApiRequest, Method, Outcome, Transport};
use crate::config::ClientConfig;
use crate::constants::{AUTH_HEADER, REST_PREFIX};
use crate::error::{ClientError, ClientResult};

/// HTTP transport for the Phantom REST API
///
/// # Examples
///
/// ```rust
/// use phantom_client::{ClientConfig, HttpTransport};
///
/// let config = ClientConfig {
///     base_url: "https://phantom.example.com".to_string(),
///     auth_token: Some("token".to_string()),
///     ..ClientConfig::default()
/// };
/// let transport = HttpTransport::new(&config).unwrap();
/// assert_eq!(transport.base_url(), "https://phantom.example.com/");
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    timeout_ms: u64,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl HttpTransport {
    /// Build the HTTP client: timeout, TLS verification, user agent and the
    /// `ph-auth-token` header when a token is configured.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::config_error(format!("Invalid base URL: {e}")))?;
        // Joins are relative, so a gateway path prefix must end in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("phantom-client/{}", env!("CARGO_PKG_VERSION")));

        let mut client_builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl);

        if let Some(token) = config.auth_token.as_deref().filter(|t| !t.is_empty()) {
            let mut default_headers = reqwest::header::HeaderMap::new();
            default_headers.insert(
                AUTH_HEADER,
                token
                    .parse()
                    .map_err(|e| ClientError::config_error(format!("Invalid auth token: {e}")))?,
            );
            client_builder = client_builder.default_headers(default_headers);
            debug!("Configured token authentication");
        } else {
            warn!("No auth token configured; requests will be unauthenticated");
        }

        let client = client_builder.build().map_err(|e| {
            ClientError::config_error(format!("Failed to create HTTP client: {e}"))
        })?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            verify_ssl = config.verify_ssl,
            "Created Phantom HTTP transport"
        );

        Ok(Self {
            client,
            base_url,
            timeout_ms: config.timeout_ms,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url_for(&self, endpoint: &str) -> Result<Url, String> {
        let path = format!(
            "{}/{}",
            REST_PREFIX.trim_start_matches('/'),
            endpoint.trim_start_matches('/')
        );
        self.base_url.join(&path).map_err(|e| e.to_string())
    }

    /// Turn an HTTP response into an outcome
    async fn handle_response(request: &ApiRequest, response: reqwest::Response) -> Outcome {
        let status = response.status();

        if status.is_success() {
            match response.json::<Value>().await {
                Ok(body) => {
                    debug!(
                        request_id = %request.correlation_id,
                        endpoint = %request.endpoint,
                        status = %status,
                        "Request succeeded"
                    );
                    Outcome::success(request.correlation_id.clone(), body)
                }
                Err(e) => {
                    error!(
                        request_id = %request.correlation_id,
                        error = %e,
                        "Failed to parse response body"
                    );
                    Outcome::failed_request(
                        request,
                        Some(status.as_u16()),
                        format!("Invalid response format: {e}"),
                        None,
                    )
                }
            }
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(
                request_id = %request.correlation_id,
                endpoint = %request.endpoint,
                status = %status,
                error = %error_text,
                "Request failed"
            );
            let body = serde_json::from_str::<Value>(&error_text)
                .unwrap_or_else(|_| Value::String(error_text.clone()));
            Outcome::failed_request(
                request,
                Some(status.as_u16()),
                format!("HTTP {status}"),
                Some(body),
            )
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn dispatch(&self, request: ApiRequest) -> Outcome {
        let url = match self.url_for(&request.endpoint) {
            Ok(url) => url,
            Err(e) => {
                error!(endpoint = %request.endpoint, error = %e, "Failed to construct URL");
                return Outcome::failed_request(
                    &request,
                    None,
                    format!("Failed to construct URL: {e}"),
                    None,
                );
            }
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => Self::handle_response(&request, response).await,
            Err(e) => {
                warn!(
                    request_id = %request.correlation_id,
                    endpoint = %request.endpoint,
                    error = %e,
                    "Network error sending request"
                );
                Outcome::failed_request(
                    &request,
                    None,
                    format!("Failed to send request: {e}"),
                    None,
                )
            }
        }
    }
}
