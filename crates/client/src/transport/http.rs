//! HTTP transport layer for the Odoo client.

use crate::config::CompanyProfile;
use crate::error::{ErrorKind, OdooError, OdooResult};
use crate::request::OperationRequest;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Idle connections kept per host.
const POOL_MAX_IDLE_PER_HOST: usize = 20;

/// One attempt of a call, kept for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Delay waited before this attempt.
    pub backoff: Duration,
    /// Wall-clock time spent on the attempt.
    pub elapsed: Duration,
    /// Failure kind, `None` on success.
    pub error: Option<ErrorKind>,
}

/// Outcome of a call together with its attempt history.
#[derive(Debug)]
pub struct Execution {
    pub result: OdooResult<Value>,
    pub attempts: Vec<Attempt>,
}

impl Execution {
    pub fn into_result(self) -> OdooResult<Value> {
        self.result
    }
}

/// HTTP transport bound to one company profile.
///
/// Each transport owns its own connection pool and default headers, so
/// connections are never shared across companies.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    profile: Arc<CompanyProfile>,
}

impl HttpTransport {
    /// Create a new HTTP transport for the given profile.
    pub fn new(profile: Arc<CompanyProfile>) -> OdooResult<Self> {
        let mut headers = header::HeaderMap::new();

        let mut auth = header::HeaderValue::from_str(&format!(
            "Bearer {}",
            profile.api_key.expose_secret()
        ))
        .map_err(|_| OdooError::Config("Invalid API key format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        headers.insert(
            header::HeaderName::from_static("x-odoo-database"),
            header::HeaderValue::from_str(&profile.database)
                .map_err(|_| OdooError::Config("Invalid database name".to_string()))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(profile.timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .user_agent(concat!("odoo-mcp/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| OdooError::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            company = %profile.name,
            database = %profile.database,
            url = %profile.base_url,
            "Initialized HTTP transport"
        );

        Ok(Self { client, profile })
    }

    /// Profile this transport was built from.
    pub fn profile(&self) -> &CompanyProfile {
        &self.profile
    }

    /// Build the endpoint URL for a model method.
    pub fn endpoint(&self, model: &str, method: &str) -> OdooResult<url::Url> {
        let mut base = self.profile.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(&format!("json/2/{}/{}", model, method))?)
    }

    /// Execute a request with timeout and retries, returning the decoded body.
    pub async fn execute(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> OdooResult<Value> {
        self.execute_traced(request, cancel).await.into_result()
    }

    /// Execute a request with timeout and retries, keeping the attempt history.
    pub async fn execute_traced(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> Execution {
        let mut attempts = Vec::new();

        let url = match self.endpoint(&request.model, request.method.as_str()) {
            Ok(url) => url,
            Err(e) => {
                return Execution {
                    result: Err(e),
                    attempts,
                }
            }
        };
        let body = Value::Object(request.payload.clone());
        let retry_config = &self.profile.retry_config;

        debug!(
            company = %self.profile.name,
            url = %url,
            payload = %truncate(&body.to_string(), 200),
            "POST request"
        );

        let mut retries = 0;
        let mut backoff = Duration::ZERO;

        loop {
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(OdooError::Cancelled),
                result = self.attempt(url.clone(), &body) => result,
            };
            let elapsed = started.elapsed();

            attempts.push(Attempt {
                number: retries + 1,
                backoff,
                elapsed,
                error: result.as_ref().err().map(OdooError::kind),
            });
            debug!(
                company = %self.profile.name,
                url = %url,
                attempt = retries + 1,
                elapsed_ms = elapsed.as_millis() as u64,
                ok = result.is_ok(),
                "Request attempt finished"
            );

            match result {
                Ok(value) => {
                    return Execution {
                        result: Ok(value),
                        attempts,
                    }
                }
                Err(e) if retries < retry_config.max_retries && e.is_retryable() => {
                    backoff = retry_config.backoff_for_attempt(retries);
                    warn!(
                        company = %self.profile.name,
                        url = %url,
                        error = %e,
                        attempt = retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!(company = %self.profile.name, url = %url, "Request cancelled during backoff");
                            return Execution {
                                result: Err(OdooError::Cancelled),
                                attempts,
                            };
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    retries += 1;
                }
                Err(e) => {
                    error!(
                        company = %self.profile.name,
                        url = %url,
                        kind = %e.kind(),
                        attempts = retries + 1,
                        "Request failed: {}",
                        e
                    );
                    return Execution {
                        result: Err(e),
                        attempts,
                    };
                }
            }
        }
    }

    /// Perform a single attempt: send, read, decode, check for an error envelope.
    async fn attempt(&self, url: url::Url, body: &Value) -> OdooResult<Value> {
        let timeout = self.profile.timeout;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| OdooError::from_transport(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OdooError::from_transport(e, timeout))?;

        if !status.is_success() {
            return Err(OdooError::from_response(status.as_u16(), &text));
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| OdooError::Decode(e.to_string()))?;

        if let Some(err) = OdooError::from_envelope(&value) {
            return Err(err);
        }

        Ok(value)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::request::{Method, SearchOptions};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE_BACKOFF: Duration = Duration::from_millis(10);

    fn create_profile(base_url: &str, max_retries: u32) -> Arc<CompanyProfile> {
        Arc::new(
            CompanyProfile::new("acme", base_url, "test_db", "test_key")
                .unwrap()
                .with_timeout(Duration::from_secs(5))
                .with_retry_config(RetryConfig {
                    max_retries,
                    initial_backoff: BASE_BACKOFF,
                    ..Default::default()
                }),
        )
    }

    fn create_transport(base_url: &str, max_retries: u32) -> HttpTransport {
        HttpTransport::new(create_profile(base_url, max_retries)).unwrap()
    }

    fn search_read_request() -> OperationRequest {
        OperationRequest::search_read("res.partner", vec![], &SearchOptions::default())
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/search_read"))
            .and(header("Authorization", "Bearer test_key"))
            .and(header("X-Odoo-Database", "test_db"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"domain": [["is_company", "=", true]], "limit": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 0);
        let options = SearchOptions {
            limit: Some(5),
            ..Default::default()
        };
        let request = OperationRequest::search_read(
            "res.partner",
            vec![json!(["is_company", "=", true])],
            &options,
        );

        let result = transport
            .execute(&request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn test_success_body_returned_unchanged() {
        let server = MockServer::start().await;
        let body = json!([
            {"id": 1, "name": "Azure Interior", "email": false, "child_ids": [7, 8]},
            {"id": 2, "name": "Deco Addict", "email": "deco@example.com", "child_ids": []}
        ]);

        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/search_read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 1);
        assert_eq!(execution.attempts[0].error, None);
        assert_eq!(execution.into_result().unwrap(), body);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 3);
        assert_eq!(execution.attempts[0].backoff, Duration::ZERO);
        assert_eq!(execution.attempts[1].backoff, BASE_BACKOFF);
        assert_eq!(execution.attempts[2].backoff, BASE_BACKOFF * 2);
        assert_eq!(execution.attempts[0].error, Some(ErrorKind::RetryableHttp));
        assert_eq!(execution.attempts[2].error, None);
        assert_eq!(execution.into_result().unwrap(), json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(4)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 4);
        assert_eq!(execution.attempts[3].backoff, BASE_BACKOFF * 4);
        match execution.into_result() {
            Err(OdooError::HttpStatus { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("Expected HttpStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"name": "werkzeug.exceptions.Unauthorized", "message": "Invalid apikey"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 1);
        match execution.into_result() {
            Err(OdooError::HttpStatus { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid apikey");
            }
            other => panic!("Expected HttpStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_on_404() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let result = transport
            .execute(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Http);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let result = transport
            .execute(&search_read_request(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(OdooError::Decode(_))));
    }

    #[tokio::test]
    async fn test_error_envelope_is_application_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": 200, "message": "Odoo Server Error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let result = transport
            .execute(&search_read_request(), &CancellationToken::new())
            .await;

        match result {
            Err(OdooError::Application { code, message }) => {
                assert_eq!(code, Some(json!(200)));
                assert_eq!(message, "Odoo Server Error");
            }
            other => panic!("Expected Application error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_consumes_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let profile = Arc::new(
            CompanyProfile::new("acme", &server.uri(), "test_db", "test_key")
                .unwrap()
                .with_timeout(Duration::from_millis(50))
                .with_retry_config(RetryConfig {
                    max_retries: 1,
                    initial_backoff: BASE_BACKOFF,
                    ..Default::default()
                }),
        );
        let transport = HttpTransport::new(profile).unwrap();
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 2);
        assert!(matches!(
            execution.into_result(),
            Err(OdooError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        // Nothing listens on port 1.
        let transport = create_transport("http://127.0.0.1:1", 2);
        let execution = transport
            .execute_traced(&search_read_request(), &CancellationToken::new())
            .await;

        assert_eq!(execution.attempts.len(), 3);
        assert!(execution
            .attempts
            .iter()
            .all(|a| a.error == Some(ErrorKind::Connection)));
        assert!(matches!(
            execution.into_result(),
            Err(OdooError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let transport = create_transport(&server.uri(), 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transport.execute(&search_read_request(), &cancel).await;
        assert!(matches!(result, Err(OdooError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let profile = Arc::new(
            CompanyProfile::new("acme", &server.uri(), "test_db", "test_key")
                .unwrap()
                .with_retry_config(RetryConfig {
                    max_retries: 3,
                    initial_backoff: Duration::from_secs(30),
                    ..Default::default()
                }),
        );
        let transport = HttpTransport::new(profile).unwrap();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let execution = transport
            .execute_traced(&search_read_request(), &cancel)
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(execution.attempts.len(), 1);
        assert!(matches!(execution.into_result(), Err(OdooError::Cancelled)));
    }

    #[test]
    fn test_endpoint() {
        let transport = create_transport("http://localhost:8069", 0);

        let url = transport.endpoint("res.partner", "search_read").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8069/json/2/res.partner/search_read");
    }

    #[test]
    fn test_endpoint_with_trailing_slash_and_prefix() {
        let transport = create_transport("http://localhost:8069/", 0);
        let url = transport.endpoint("account.move", Method::Create.as_str()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8069/json/2/account.move/create");

        let transport = create_transport("https://example.com/odoo", 0);
        let url = transport.endpoint("res.partner", "read").unwrap();
        assert_eq!(url.as_str(), "https://example.com/odoo/json/2/res.partner/read");
    }
}
