use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    AnyError(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn any(error: impl ToString) -> Self {
        FetchError::AnyError(error.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

pub struct FetchRequest<'a> {
    pub url: &'a url::Url,
    pub headers: http::HeaderMap,
    pub json_body: String,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: http::StatusCode,
    pub bytes: Bytes,
}

pub type EventStream = BoxStream<'static, Result<Value, FetchError>>;

#[async_trait::async_trait]
pub trait FetcherInner: Send + Sync {
    async fn post(&self, request: FetchRequest<'_>) -> FetchResult<FetchResponse>;

    /// Subscriptions: one JSON response per event.
    async fn stream(&self, request: FetchRequest<'_>) -> FetchResult<EventStream>;
}

#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<dyn FetcherInner>,
}

impl Fetcher {
    pub fn new(fetcher: impl FetcherInner + 'static) -> Fetcher {
        Fetcher {
            inner: Arc::new(fetcher),
        }
    }

    pub async fn post(&self, request: FetchRequest<'_>) -> FetchResult<FetchResponse> {
        let Some(duration) = request.timeout else {
            return self.inner.post(request).await;
        };

        let timeout = async {
            tokio::time::sleep(duration).await;
            Err(FetchError::Timeout(duration))
        };

        let execution = self.inner.post(request);

        tokio::select! {
            result = timeout => { result }
            result = execution => { result }
        }
    }
}

impl std::ops::Deref for Fetcher {
    type Target = dyn FetcherInner;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

/// Plain HTTP transport. Subscriptions need a streaming transport and aren't supported.
pub struct NativeFetcher {
    client: reqwest::Client,
}

impl NativeFetcher {
    pub fn runtime_fetcher() -> Fetcher {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Fetcher {
        Fetcher::new(Self { client })
    }
}

#[async_trait::async_trait]
impl FetcherInner for NativeFetcher {
    async fn post(&self, request: FetchRequest<'_>) -> FetchResult<FetchResponse> {
        let response = self
            .client
            .post(request.url.clone())
            .body(request.json_body)
            .header("Content-Type", "application/json")
            .header("Accept", "application/graphql-response+json, application/json")
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| FetchError::AnyError(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::AnyError(e.to_string()))?;

        Ok(FetchResponse { status, bytes })
    }

    async fn stream(&self, _request: FetchRequest<'_>) -> FetchResult<EventStream> {
        Err(FetchError::any("Subscriptions aren't supported over plain HTTP"))
    }
}
