use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::ApiError;
use crate::config::Config;
use crate::util::{validate_api_base, UrlValidationError};

/// Largest response body accepted from the backend.
pub const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const TOKEN_ENV: &str = "DRAMABOX_API_TOKEN";

/// HTTP client for the backend proxy and account endpoints.
///
/// Cheap to clone; clones share the connection pool. Every call either
/// yields parsed JSON or an [`ApiError`]; callers decide how to degrade.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
    token: Option<Arc<SecretString>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ApiClient {
    /// Build a client from configuration. `DRAMABOX_API_TOKEN` overrides
    /// `config.api_token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BaseUrl`] if `config.api_base_url` is not a valid
    /// `https` URL (plain `http` is allowed for loopback hosts only), or
    /// [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .or_else(|| config.api_token.clone())
            .filter(|t| !t.trim().is_empty())
            .map(|t| Arc::new(SecretString::from(t)));

        let mut client = Self::with_base_url(&config.api_base_url)?;
        client.timeout = config.request_timeout();
        client.token = token;
        Ok(client)
    }

    /// Build an unauthenticated client with default settings.
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        let base = validate_api_base(base_url)?;
        let http = reqwest::Client::builder()
            .redirect(Policy::limited(3))
            .user_agent(concat!("dramabox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            timeout: DEFAULT_TIMEOUT,
            token: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path)
            .map_err(UrlValidationError::InvalidUrl)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// `GET path?query` and parse the body as JSON.
    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path, query)?;
        tracing::debug!(url = %url, "GET");
        self.execute(self.http.get(url)).await
    }

    /// Send a JSON body with `method` and parse the JSON reply.
    pub(crate) async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path, &[])?;
        tracing::debug!(%method, url = %url, "Sending JSON");
        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?);
        self.execute(request).await
    }

    /// `DELETE path` without a body.
    pub(crate) async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(path, &[])?;
        tracing::debug!(url = %url, "DELETE");
        self.execute(self.http.delete(url)).await
    }

    /// Like [`send_json`](Self::send_json) but 4xx replies are returned with
    /// their status instead of failing, so callers can read the error body.
    pub(crate) async fn send_json_with_status(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value), ApiError> {
        let url = self.endpoint(path, &[])?;
        tracing::debug!(%method, url = %url, "Sending JSON");
        let request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?);

        let (status, text) = self.exchange(request).await?;
        if status.is_client_error() {
            let value = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Ok((status.as_u16(), value));
        }
        Ok((status.as_u16(), parse_success(status, &text)?))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let (status, text) = self.exchange(request).await?;
        parse_success(status, &text)
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        // The timeout budget covers the body as well as the headers.
        tokio::time::timeout(self.timeout, send_and_read(request))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout.as_secs()))?
    }
}

fn parse_success(status: StatusCode, text: &str) -> Result<Value, ApiError> {
    if !status.is_success() {
        return Err(ApiError::HttpStatus(status.as_u16()));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

async fn send_and_read(request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() && !status.is_client_error() {
        return Ok((status, String::new()));
    }
    let text = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
    Ok((status, text))
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ApiError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_json_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/proxy/search"))
            .and(query_param("query", "ceo wife"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let value = client
            .get_json("api/proxy/search", &[("query", "ceo wife"), ("page", "2")])
            .await
            .unwrap();
        assert_eq!(value, json!({ "data": [] }));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let err = client.get_json("api/proxy/foryou", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus(502)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let err = client.get_json("api/proxy/foryou", &[]).await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        assert_eq!(client.delete("api/history/7").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_send_json_body_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user"))
            .and(header("authorization", "Bearer t0ken"))
            .and(body_json(json!({ "telegram_id": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "telegram_id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = ApiClient::with_base_url(&server.uri()).unwrap();
        client.token = Some(Arc::new(SecretString::from("t0ken".to_string())));
        let reply = client
            .send_json(Method::POST, "api/user", &json!({ "telegram_id": 7 }))
            .await
            .unwrap();
        assert_eq!(reply["telegram_id"], 7);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = client.get_json("api/proxy/foryou", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_client_error_body_returned_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/referral"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid ref code" })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::with_base_url(&server.uri()).unwrap();
        let (status, body) = client
            .send_json_with_status(Method::POST, "api/referral", &json!({}))
            .await
            .unwrap();
        assert_eq!(status, 400);
        assert_eq!(body["error"], "invalid ref code");
    }

    #[test]
    fn test_insecure_base_rejected() {
        let err = ApiClient::with_base_url("http://drama.example.com").unwrap_err();
        assert!(matches!(err, ApiError::BaseUrl(_)));
    }

    #[test]
    fn test_debug_masks_token() {
        let mut client = ApiClient::with_base_url("https://drama.example.com").unwrap();
        client.token = Some(Arc::new(SecretString::from("hunter2".to_string())));
        let debug = format!("{client:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
