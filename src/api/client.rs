//! HTTP client for the test management backend
//!
//! Covers the two request/response operations the runner needs: fetching a
//! test plan and executing a generated script in one shot.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::Response;

use crate::common::config::ApiConfig;
use crate::common::{Error, Result};

use super::endpoints::{keys, params, EndpointResolver};
use super::types::{ErrorResponse, LogEntry, LogStatus, ScriptKind, TestPlan};

/// Marker printed by generated scripts when every step passed
pub const PASS_MARKER: &str = "Test Passed";
/// Marker printed by generated scripts when a step raised
pub const FAIL_MARKER: &str = "Test Failed";

/// Client for the backend's plain HTTP operations
pub struct ApiClient {
    http: reqwest::Client,
    resolver: EndpointResolver,
    bearer: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, resolver: EndpointResolver) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| Error::Config(format!("Invalid api_key: {e}")))?;
            headers.insert("X-Api-Key", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            resolver,
            bearer: None,
        })
    }

    /// Set or clear the bearer credential sent with every request
    pub fn set_bearer(&mut self, token: Option<&str>) {
        self.bearer = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Fetch the plan for a test case
    #[tracing::instrument(skip(self))]
    pub async fn fetch_plan(&self, test_case_id: &str) -> Result<TestPlan> {
        let url = self
            .resolver
            .http_url(keys::TEST_PLAN, &[(params::TEST_CASE_ID, test_case_id)])?;
        tracing::debug!(%url, "Fetching test plan");

        let response = self.authorize(self.http.get(url)).send().await?;
        let response = check_status(response, "Failed to fetch test plan.").await?;
        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), "Received test plan");

        let plan: TestPlan = serde_json::from_slice(&body)?;
        Ok(plan)
    }

    /// Upload a script and run it, returning the classified output lines
    #[tracing::instrument(skip(self, script))]
    pub async fn execute_script(
        &self,
        test_case_id: &str,
        script: &str,
        kind: ScriptKind,
    ) -> Result<Vec<LogEntry>> {
        let url = self
            .resolver
            .http_url(keys::EXECUTE_CODE, &[(params::SCRIPT_TYPE, kind.as_str())])?;

        let part = Part::text(script.to_string())
            .file_name(format!("{test_case_id}_script.py"))
            .mime_str("text/x-python")?;
        let form = Form::new().part("file", part);

        let response = self
            .authorize(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response, "Failed to execute script.").await?;
        let body = response.text().await?;
        tracing::debug!(
            preview = %body.chars().take(200).collect::<String>(),
            "Execution response received"
        );

        Ok(classify_output(&body))
    }
}

/// Turn a non-success response into `Error::Api`, preferring the server's
/// `detail` text over `fallback`
async fn check_status(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { detail: Some(detail) }) => detail,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            tracing::debug!("Error parsing error response: {}", e);
            fallback.to_string()
        }
    };
    Err(Error::api(status.as_u16(), &message))
}

/// Classify free-text execution output, one entry per non-empty line
pub fn classify_output(output: &str) -> Vec<LogEntry> {
    output
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let status = if line.contains(PASS_MARKER) {
                LogStatus::Success
            } else if line.contains(FAIL_MARKER) {
                LogStatus::Error
            } else {
                LogStatus::Info
            };
            LogEntry::now(status, line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::endpoints::EndpointTable;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ApiConfig {
            base_url: server.uri(),
            api_key: Some("key-1".to_string()),
            ..ApiConfig::default()
        };
        let resolver = EndpointResolver::new(EndpointTable::defaults(), &config.base_url).unwrap();
        let mut client = ApiClient::new(&config, resolver).unwrap();
        client.set_bearer(Some("tok"));
        client
    }

    #[test]
    fn test_classify_output_markers() {
        let entries = classify_output(
            "Step: Navigating...\r\n\nTest Passed - Execution completed successfully.\n  \nTest Failed - boom\n",
        );
        let statuses: Vec<_> = entries.iter().map(|e| e.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![LogStatus::Info, LogStatus::Success, LogStatus::Error]
        );
        assert_eq!(entries[0].message, "Step: Navigating...");
    }

    #[tokio::test]
    async fn test_fetch_plan_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/testplan/TC%200013"))
            .and(header("authorization", "Bearer tok"))
            .and(header("x-api-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"current testid": "TC 0013", "current - bdd steps": {"And clicks the login button": ""}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let plan = client_for(&server).fetch_plan("TC 0013").await.unwrap();
        assert_eq!(plan.test_case_id.as_deref(), Some("TC 0013"));
        assert_eq!(plan.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_plan_surfaces_server_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/testplan/TC9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"detail": "Test case TC9 not found"}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_plan("TC9").await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Test case TC9 not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_plan_generic_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_plan("TC9").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch test plan. (HTTP 500)");
    }

    #[tokio::test]
    async fn test_execute_script_classifies_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute-code"))
            .and(query_param("script_type", "playwright"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "Step: Entering username...\nTest Passed - Execution completed successfully.\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client_for(&server)
            .execute_script("TC1", "print('hi')\n", ScriptKind::Playwright)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, LogStatus::Success);
    }
}
