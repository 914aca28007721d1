//! Main client for the Odoo JSON-2 API.

use crate::config::CompanyProfile;
use crate::error::OdooResult;
use crate::request::{OperationRequest, SearchOptions};
use crate::transport::{Execution, HttpTransport};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Client for one company's Odoo backend.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct OdooClient {
    profile: Arc<CompanyProfile>,
    pub(crate) http: HttpTransport,
}

impl OdooClient {
    /// Create a client from a company profile.
    pub fn new(profile: Arc<CompanyProfile>) -> OdooResult<Self> {
        let http = HttpTransport::new(profile.clone())?;
        Ok(Self { profile, http })
    }

    /// Get the profile this client talks to.
    pub fn profile(&self) -> &CompanyProfile {
        &self.profile
    }

    /// Execute an arbitrary operation request.
    pub async fn execute(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> OdooResult<Value> {
        self.http.execute(request, cancel).await
    }

    /// Execute an operation request and keep its attempt history.
    pub async fn execute_traced(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> Execution {
        self.http.execute_traced(request, cancel).await
    }

    /// Search and read records.
    pub async fn search_read(
        &self,
        model: &str,
        domain: Vec<Value>,
        options: &SearchOptions,
    ) -> OdooResult<Value> {
        self.run(OperationRequest::search_read(model, domain, options)).await
    }

    /// Create a new record.
    pub async fn create(&self, model: &str, values: Map<String, Value>) -> OdooResult<Value> {
        self.run(OperationRequest::create(model, values)).await
    }

    /// Update existing records.
    pub async fn write(
        &self,
        model: &str,
        ids: Vec<i64>,
        values: Map<String, Value>,
    ) -> OdooResult<Value> {
        self.run(OperationRequest::write(model, ids, values)).await
    }

    /// Delete records.
    pub async fn unlink(&self, model: &str, ids: Vec<i64>) -> OdooResult<Value> {
        self.run(OperationRequest::unlink(model, ids)).await
    }

    /// Search for record ids.
    pub async fn search(
        &self,
        model: &str,
        domain: Vec<Value>,
        options: &SearchOptions,
    ) -> OdooResult<Value> {
        self.run(OperationRequest::search(model, domain, options)).await
    }

    /// Read specific records by id.
    pub async fn read(&self, model: &str, ids: Vec<i64>, fields: &[String]) -> OdooResult<Value> {
        self.run(OperationRequest::read(model, ids, fields)).await
    }

    /// Count records matching a domain.
    pub async fn search_count(&self, model: &str, domain: Vec<Value>) -> OdooResult<Value> {
        self.run(OperationRequest::search_count(model, domain)).await
    }

    async fn run(&self, request: OperationRequest) -> OdooResult<Value> {
        self.execute(&request, &CancellationToken::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> OdooClient {
        let profile = CompanyProfile::new("acme", base_url, "test_db", "test_key")
            .unwrap()
            .with_retry_config(RetryConfig::no_retry());
        OdooClient::new(Arc::new(profile)).unwrap()
    }

    #[test]
    fn test_client_keeps_profile() {
        let client = client("http://localhost:8069/");
        assert_eq!(client.profile().name, "acme");
        assert_eq!(client.profile().database, "test_db");
    }

    #[tokio::test]
    async fn test_create_record() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/create"))
            .and(body_json(json!({"values": {"name": "Test Partner", "email": "test@example.com"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([42])))
            .expect(1)
            .mount(&server)
            .await;

        let values = json!({"name": "Test Partner", "email": "test@example.com"})
            .as_object()
            .cloned()
            .unwrap();
        let result = client(&server.uri()).create("res.partner", values).await.unwrap();
        assert_eq!(result, json!([42]));
    }

    #[tokio::test]
    async fn test_write_and_unlink() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/write"))
            .and(body_json(json!({"ids": [1, 2], "values": {"phone": "555-1234"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/unlink"))
            .and(body_json(json!({"ids": [1, 2]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let values = json!({"phone": "555-1234"}).as_object().cloned().unwrap();
        assert_eq!(client.write("res.partner", vec![1, 2], values).await.unwrap(), json!(true));
        assert_eq!(client.unlink("res.partner", vec![1, 2]).await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_search_read_count() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([3, 5, 8])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/read"))
            .and(body_json(json!({"ids": [3], "fields": ["name"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3, "name": "Gemini Furniture"}])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/search_count"))
            .and(body_json(json!({"domain": [["active", "=", true]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/json/2/res.partner/search_read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Test"}])))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let options = SearchOptions::default();

        assert_eq!(
            client.search("res.partner", vec![], &options).await.unwrap(),
            json!([3, 5, 8])
        );
        assert_eq!(
            client
                .read("res.partner", vec![3], &["name".to_string()])
                .await
                .unwrap(),
            json!([{"id": 3, "name": "Gemini Furniture"}])
        );
        assert_eq!(
            client
                .search_count("res.partner", vec![json!(["active", "=", true])])
                .await
                .unwrap(),
            json!(42)
        );
        assert_eq!(
            client.search_read("res.partner", vec![], &options).await.unwrap(),
            json!([{"id": 1, "name": "Test"}])
        );
    }
}
