//! HTTP capability for scenarios
use crate::error::TransportError;
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{RequestConfig, Sample};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Time from sending the request until the full body was read.
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub timings: Timings,
}

impl HttpResponse {
    /// Anything outside 2xx/3xx counts as a failed request.
    pub fn is_expected(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn has_content(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Thin wrapper around a shared [`reqwest::Client`]; cheap to clone into every virtual user.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut req = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        let res = req.send().await.map_err(|e| classify(e, timeout))?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| classify(e, timeout))?;
        let timings = Timings {
            duration: start.elapsed(),
        };
        trace!("GET {url} -> {status} in {:?}", timings.duration);

        Ok(HttpResponse {
            status,
            body,
            timings,
        })
    }

    /// GET `path` relative to the configured base URL, with its headers and timeout.
    pub async fn get_path(
        &self,
        request: &RequestConfig,
        path: &str,
    ) -> Result<HttpResponse, TransportError> {
        let url = format!("{}/{}", request.base_url, path.trim_start_matches('/'));
        self.get(&url, &request.headers, request.timeout).await
    }

    /// Perform a GET and turn it into a [`Sample`] alongside the response.
    ///
    /// Transport errors (timeouts included) and unexpected status codes become failed samples;
    /// nothing is propagated.
    pub async fn sample(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> (Sample, Result<HttpResponse, TransportError>) {
        let start = Instant::now();
        let res = self.get(url, headers, timeout).await;
        let sample = match &res {
            Ok(response) if response.is_expected() => Sample::success(response.timings.duration),
            Ok(response) => Sample::failure(response.timings.duration),
            Err(TransportError::Timeout(after)) => Sample::failure(*after),
            Err(_) => Sample::failure(start.elapsed()),
        };
        (sample, res)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}
