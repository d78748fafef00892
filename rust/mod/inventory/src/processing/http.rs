use serde::de::DeserializeOwned;

use stockroom_core::ServiceError;

use super::{TestResult, TestResultsApi};

/// Test-results service error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decode: {0}")]
    Decode(String),
}

impl From<ApiError> for ServiceError {
    fn from(e: ApiError) -> Self {
        ServiceError::Upstream(format!("test results service: {}", e))
    }
}

/// [`TestResultsApi`] over JSON/HTTP.
///
/// Routes: `GET {base}/test-results?processed=false`,
/// `POST {base}/test-results`, `PATCH {base}/test-results/{id}`.
pub struct HttpTestResults {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTestResults {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/test-results", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Server { status: code, message: body });
        }
        Ok(resp)
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        Self::check(resp)
            .await?
            .json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }
}

#[async_trait::async_trait]
impl TestResultsApi for HttpTestResults {
    async fn pending(&self) -> Result<Vec<TestResult>, ApiError> {
        let resp = self
            .http
            .get(self.collection_url())
            .query(&[("processed", "false")])
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn submit(&self, result: &TestResult) -> Result<TestResult, ApiError> {
        let resp = self.http.post(self.collection_url()).json(result).send().await?;
        Self::parse(resp).await
    }

    async fn mark_processed(&self, result_id: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .patch(self.item_url(result_id))
            .json(&serde_json::json!({ "processed": true }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
