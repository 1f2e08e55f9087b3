use crate::error::AppError;
use crate::model::{CompareRequest, ComparisonResult, ConceptResult, ErrorBody, SearchRequest};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";
pub const SEARCH_PATH: &str = "/api/search";
pub const COMPARE_PATH: &str = "/api/compare";

/// The two endpoints the controller consumes.
pub trait ConceptBackend: Send + Sync {
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<ConceptResult, AppError>> + Send;

    fn compare(
        &self,
        request: &CompareRequest,
    ) -> impl Future<Output = Result<ComparisonResult, AppError>> + Send;
}

/// JSON-over-HTTP client for the facade. No timeout or retry is applied
/// here; the transport owns both.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, AppError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "posting to backend");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| AppError::transport(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|body| match body.details.trim() {
                    "" => body.error,
                    details => format!("{}: {details}", body.error),
                });
            return Err(AppError::RequestFailed {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                details,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|err| AppError::transport(format!("invalid response from {url}: {err}")))
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

impl ConceptBackend for HttpBackend {
    async fn search(&self, request: &SearchRequest) -> Result<ConceptResult, AppError> {
        self.post(SEARCH_PATH, request).await
    }

    async fn compare(&self, request: &CompareRequest) -> Result<ComparisonResult, AppError> {
        self.post(COMPARE_PATH, request).await
    }
}
