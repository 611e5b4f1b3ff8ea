use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid url: {0}")]
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One asynchronous request issued by the page: either the refresh fetch or
/// an intercepted form submission.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub method: Method,
    /// Form-encoded body for POST submissions.
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(url: Url, body: String) -> Self {
        Self {
            url,
            method: Method::Post,
            body: Some(body),
        }
    }
}

/// HTTP collaborator. Futures are local: responses are applied to page state
/// that never leaves the UI thread.
pub trait HttpClient {
    fn request(&self, request: HttpRequest) -> LocalBoxFuture<'_, Result<String, FetchError>>;
}

/// Production client backed by reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn request(&self, request: HttpRequest) -> LocalBoxFuture<'_, Result<String, FetchError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let builder = match request.method {
                Method::Get => client.get(request.url.clone()),
                Method::Post => client.post(request.url.clone()),
            };
            let builder = match request.body {
                Some(body) => builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body),
                None => builder,
            };

            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            Ok(response.text().await?)
        })
    }
}
