use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{BreakdownId, CaseId, CaseStatus, ReviewStatus},
    error::ApiError,
    protocol::{
        BatchStatusRequest, BreakdownItem, BreakdownUpdate, ListPayload, Project, Requirement,
        StatusReply, StatusUpdateRequest, TestCase,
    },
};
use tracing::{debug, warn};

use crate::{
    config::ClientSettings,
    error::{ApiClientError, SettingsError},
    paged_table::PageSource,
    params::QueryParams,
};

/// HTTP client for the case management backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, SettingsError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiClientError> {
        debug!(path, "sending request");
        let response = request
            .send()
            .await
            .map_err(|source| ApiClientError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let source = ApiError::from_body(status.as_u16(), &body);
        warn!(path, status = status.as_u16(), detail = %source.message, "request rejected");
        Err(ApiClientError::Status {
            path: path.to_string(),
            source,
        })
    }

    async fn fetch_json<R: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<R, ApiClientError> {
        let response = self.execute(path, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiClientError::Transport {
                path: path.to_string(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiClientError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<ListPayload<T>, ApiClientError> {
        let request = self.http.get(self.url(path)).query(&params.to_query_pairs());
        self.fetch_json(path, request).await
    }

    pub async fn get_requirements(
        &self,
        params: &QueryParams,
    ) -> Result<ListPayload<Requirement>, ApiClientError> {
        self.get_list("/requirements", params).await
    }

    pub async fn get_all_test_cases(
        &self,
        params: &QueryParams,
    ) -> Result<ListPayload<TestCase>, ApiClientError> {
        self.get_list("/cases", params).await
    }

    pub async fn get_breakdown_list(
        &self,
        params: &QueryParams,
    ) -> Result<ListPayload<BreakdownItem>, ApiClientError> {
        self.get_list("/requirement_breakdown", params).await
    }

    pub async fn get_projects(&self) -> Result<ListPayload<Project>, ApiClientError> {
        self.get_list("/projects", &QueryParams::new()).await
    }

    pub async fn batch_update_case_status(
        &self,
        ids: &[CaseId],
        status: CaseStatus,
    ) -> Result<StatusReply, ApiClientError> {
        if ids.is_empty() {
            return Err(ApiClientError::InvalidRequest(
                "select at least one test case".into(),
            ));
        }
        let path = "/cases/batch_status";
        let body = BatchStatusRequest {
            ids: ids.iter().map(|id| id.0).collect(),
            status: status.to_string(),
        };
        self.fetch_json(path, self.http.put(self.url(path)).json(&body))
            .await
    }

    pub async fn update_breakdown_item(
        &self,
        id: BreakdownId,
        update: &BreakdownUpdate,
    ) -> Result<StatusReply, ApiClientError> {
        let path = format!("/requirement_breakdown/{id}");
        self.fetch_json(&path, self.http.put(self.url(&path)).json(update))
            .await
    }

    pub async fn batch_update_breakdown_status(
        &self,
        ids: &[BreakdownId],
        status: ReviewStatus,
    ) -> Result<StatusReply, ApiClientError> {
        if ids.is_empty() {
            return Err(ApiClientError::InvalidRequest(
                "select at least one breakdown item".into(),
            ));
        }
        let path = "/requirement_breakdown/batch_status";
        let body = BatchStatusRequest {
            ids: ids.iter().map(|id| id.0).collect(),
            status: status.to_string(),
        };
        self.fetch_json(path, self.http.put(self.url(path)).json(&body))
            .await
    }

    pub async fn update_breakdown_status(
        &self,
        id: BreakdownId,
        status: ReviewStatus,
    ) -> Result<StatusReply, ApiClientError> {
        let path = format!("/requirement_breakdown/{id}/status");
        let body = StatusUpdateRequest {
            status: status.to_string(),
        };
        self.fetch_json(&path, self.http.put(self.url(&path)).json(&body))
            .await
    }

    /// Downloads the export file as raw bytes.
    pub async fn export_test_cases(&self, params: &QueryParams) -> Result<Vec<u8>, ApiClientError> {
        let path = "/cases/export";
        let request = self
            .http
            .get(self.url(path))
            .query(&params.to_query_pairs());
        let response = self.execute(path, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiClientError::Transport {
                path: path.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

pub fn requirement_source(client: ApiClient) -> impl PageSource<Requirement> {
    move |params: QueryParams| {
        let client = client.clone();
        async move {
            client
                .get_requirements(&params)
                .await
                .map_err(anyhow::Error::from)
        }
    }
}

pub fn test_case_source(client: ApiClient) -> impl PageSource<TestCase> {
    move |params: QueryParams| {
        let client = client.clone();
        async move {
            client
                .get_all_test_cases(&params)
                .await
                .map_err(anyhow::Error::from)
        }
    }
}

pub fn breakdown_source(client: ApiClient) -> impl PageSource<BreakdownItem> {
    move |params: QueryParams| {
        let client = client.clone();
        async move {
            client
                .get_breakdown_list(&params)
                .await
                .map_err(anyhow::Error::from)
        }
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
