use http::{HeaderName, HeaderValue};

use crate::{BeforeFlow, ClientError, FetchParamsFn, Plugin, RequestContext};

/// Computes the transport parameters of the invocation. Never touches the network.
pub struct FetchParamsPlugin {
    build: FetchParamsFn,
    headers: http::HeaderMap,
}

impl FetchParamsPlugin {
    pub fn new(build: FetchParamsFn) -> Self {
        FetchParamsPlugin {
            build,
            headers: http::HeaderMap::new(),
        }
    }

    /// Headers added to every request, unless the params function already set them.
    pub fn with_headers<'a>(mut self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, ClientError> {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| ClientError::Configuration(err.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|err| ClientError::Configuration(err.to_string()))?;
            self.headers.insert(name, value);
        }

        Ok(self)
    }
}

#[async_trait::async_trait]
impl Plugin for FetchParamsPlugin {
    fn name(&self) -> &str {
        "fetch_params"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        let mut params = (self.build)(&ctx.fetch_params_input());

        for (name, value) in &self.headers {
            if !params.headers.contains_key(name) {
                params.headers.insert(name.clone(), value.clone());
            }
        }

        ctx.fetch_params = params;

        Ok(BeforeFlow::Next)
    }
}
