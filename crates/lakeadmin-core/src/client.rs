//! Thin bearer-authenticated JSON client for the workspace REST API.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ProvisionError, ProvisionResult};
use crate::settings::Settings;

/// Page size used for list endpoints when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Client bound to one workspace host and one access token.
///
/// Every request is issued and awaited before the next one starts; the
/// client holds no state besides its connection pool.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: usize,
}

impl WorkspaceClient {
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        let base_url = host.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.workspace.host, settings.workspace.token.clone())
            .with_page_size(settings.paging.page_size)
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// `path` is relative to `/api/`, e.g. `2.1/jobs/list`.
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    /// GET with query parameters, decoding the body into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProvisionResult<T> {
        let url = self.api_url(path);
        tracing::debug!(method = "GET", %url, ?query, "workspace request");
        let resp = self
            .request(Method::GET, &url)
            .query(query)
            .send()
            .await?;
        let value = handle_response(Method::GET, &url, resp).await?;
        decode(&url, value)
    }

    /// Sends a JSON body and returns the decoded JSON response.
    ///
    /// An empty response body is returned as `Value::Null`.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ProvisionResult<Value> {
        let url = self.api_url(path);
        tracing::debug!(method = %method, %url, "workspace request");
        let resp = self
            .request(method.clone(), &url)
            .json(body)
            .send()
            .await?;
        handle_response(method, &url, resp).await
    }

    /// Like [`send`](Self::send) but decodes the response into `T`.
    pub async fn send_as<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ProvisionResult<T> {
        let url = self.api_url(path);
        let value = self.send(method, path, body).await?;
        decode(&url, value)
    }

    /// Sends a JSON body and hands back the status together with the body,
    /// without treating any status as an error. Callers that tolerate
    /// specific failures (409 on membership) classify the status themselves.
    pub async fn send_raw<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ProvisionResult<RawResponse> {
        let url = self.api_url(path);
        tracing::debug!(method = %method, %url, "workspace request");
        let resp = self
            .request(method.clone(), &url)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(RawResponse {
            method,
            url,
            status,
            body,
        })
    }
}

/// Response captured by [`WorkspaceClient::send_raw`].
#[derive(Debug)]
pub struct RawResponse {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    /// Converts the response into the error every unexpected status maps to.
    pub fn into_error(self) -> ProvisionError {
        ProvisionError::RemoteApi {
            method: self.method,
            url: self.url,
            status: self.status.as_u16(),
            body: self.body,
        }
    }
}

async fn handle_response(
    method: Method,
    url: &str,
    resp: reqwest::Response,
) -> ProvisionResult<Value> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        tracing::debug!(%method, %url, status = status.as_u16(), "workspace request failed");
        return Err(ProvisionError::RemoteApi {
            method,
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| ProvisionError::decode(url, e))
}

fn decode<T: DeserializeOwned>(url: &str, value: Value) -> ProvisionResult<T> {
    // Some endpoints answer 200 with no body; treat that as an empty object.
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| ProvisionError::decode(url, e))
}
