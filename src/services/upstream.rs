//! HTTP client for the upstream analytics REST service

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Upstream responses longer than this are cut in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Thin JSON wrapper around `reqwest` rooted at the upstream base URL.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(self.request(Method::GET, path), path).await
    }

    pub async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::GET, path).query(query), path)
            .await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path).json(body), path)
            .await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, path).json(body), path)
            .await
    }

    /// DELETE; the response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        check_status(response, path).await.map(|_| ())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T> {
        let response = request.send().await?;
        let response = check_status(response, path).await?;
        let body = response.json::<T>().await.map_err(|e| {
            AppError::Http(format!("Malformed upstream response from {}: {}", path, e))
        })?;
        debug!(path = path, "Upstream request succeeded");
        Ok(body)
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    warn!(path = path, status = status.as_u16(), "Upstream request rejected");

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(format!("{} not found upstream", path)));
    }
    Err(AppError::Upstream {
        status: status.as_u16(),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = UpstreamClient::new("http://upstream:8080/");
        assert_eq!(
            client.url("/api/analytics/query"),
            "http://upstream:8080/api/analytics/query"
        );
        assert_eq!(
            client.url("api/analytics/reports/r1"),
            "http://upstream:8080/api/analytics/reports/r1"
        );
    }
}
