use std::time::Duration;

use futures_util::StreamExt;
use operation_artifact::ArtifactKind;

use crate::{
    BeforeFlow, ClientError, FetchError, FetchRequest, FetchResponse, Fetcher, GraphqlResponse, Plugin,
    RequestContext, ResolvedValue,
};

/// Terminal plugin: sends the request. Transport failures become values carrying a network
/// error so the backward phase still runs.
pub struct FetchPlugin {
    fetcher: Fetcher,
    url: url::Url,
    timeout: Option<Duration>,
}

impl FetchPlugin {
    pub fn new(fetcher: Fetcher, url: url::Url) -> Self {
        FetchPlugin {
            fetcher,
            url,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Plugin for FetchPlugin {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        let json_body = serde_json::to_string(&ctx.fetch_params.body).map_err(|err| ClientError::plugin(self.name(), err))?;

        let request = FetchRequest {
            url: &self.url,
            headers: ctx.fetch_params.headers.clone(),
            json_body,
            timeout: self.timeout,
        };

        tracing::debug!(url = %self.url, hash_only = ctx.state.hash_only, "Sending request");

        if ctx.artifact.kind == ArtifactKind::Subscription {
            return Ok(match self.fetcher.stream(request).await {
                Ok(events) => BeforeFlow::Stream(
                    events
                        .map(|event| match event {
                            Ok(json) => match serde_json::from_value::<GraphqlResponse>(json) {
                                Ok(response) => ResolvedValue::from_response(response),
                                Err(err) => ResolvedValue::from_network_error(FetchError::any(err)),
                            },
                            Err(error) => ResolvedValue::from_network_error(error),
                        })
                        .boxed(),
                ),
                Err(error) => {
                    tracing::warn!(%error, "Subscription failed");
                    BeforeFlow::Resolve(ResolvedValue::from_network_error(error))
                }
            });
        }

        let result = tokio::select! {
            biased;
            () = ctx.token.cancelled() => return Err(ClientError::Cancelled),
            result = self.fetcher.post(request) => result,
        };

        let value = match result {
            Ok(response) => into_value(response),
            Err(error) => {
                tracing::warn!(%error, "Request failed");
                ResolvedValue::from_network_error(error)
            }
        };

        Ok(BeforeFlow::Resolve(value))
    }
}

fn into_value(response: FetchResponse) -> ResolvedValue {
    let status = response.status;

    match serde_json::from_slice::<GraphqlResponse>(&response.bytes) {
        Ok(body) if status.is_success() || body.data.is_some() || !body.errors.is_empty() => {
            ResolvedValue::from_response(body)
        }
        Ok(_) => ResolvedValue::from_network_error(FetchError::any(format!("Request failed with status {status}"))),
        Err(err) => ResolvedValue::from_network_error(FetchError::any(format!(
            "Invalid GraphQL response (status {status}): {err}"
        ))),
    }
}
