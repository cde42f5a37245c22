use std::io::Write;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{DEFAULT_TIMEOUT, default_user_agent};
use crate::error::IngestError;

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub user_agent: &'a str,
    pub timeout: Duration,
}

/// Transport used by the downloader. Implementations stream the body into
/// `sink` and return the number of bytes written.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest<'_>, sink: &mut dyn Write)
    -> Result<u64, IngestError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_retries: usize,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_retries(0)
    }

    pub fn with_retries(max_retries: usize) -> Result<Self, IngestError> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            timeout: DEFAULT_TIMEOUT,
            max_retries,
        })
    }

    /// Client whose per-operation timeout matches `timeout`. Requests that
    /// ask for the configured timeout share one connection pool.
    fn client_for(&self, timeout: Duration) -> Result<Client, IngestError> {
        if timeout == self.timeout {
            return Ok(self.client.clone());
        }
        build_client(timeout)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, IngestError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        tracing::debug!(error = %err, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(IngestError::Http(err.to_string()));
                }
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        request: &FetchRequest<'_>,
        sink: &mut dyn Write,
    ) -> Result<u64, IngestError> {
        let user_agent = HeaderValue::from_str(request.user_agent)
            .map_err(|err| IngestError::Http(format!("invalid user agent: {err}")))?;
        let client = self.client_for(request.timeout)?;
        // Timeouts come from the client so they bound each read, not the body.
        let mut response = self.send_with_retries(|| {
            client
                .get(request.url)
                .header(USER_AGENT, user_agent.clone())
        })?;
        if !response.status().is_success() {
            return Err(IngestError::HttpStatus {
                url: request.url.to_string(),
                status: response.status().as_u16(),
            });
        }
        std::io::copy(&mut response, sink)
            .map_err(|err| IngestError::Http(format!("transfer of {} failed: {err}", request.url)))
    }
}

/// The blocking client applies `timeout` to the connect and to each wait on
/// the connection (response headers, every body read), so a slow transfer
/// that keeps making progress is never cut off.
fn build_client(timeout: Duration) -> Result<Client, IngestError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&default_user_agent())
            .map_err(|err| IngestError::Http(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|err| IngestError::Http(err.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
