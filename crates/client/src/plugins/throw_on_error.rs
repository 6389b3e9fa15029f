use client_config::ThrowOnErrorConfig;

use crate::{AfterFlow, ClientError, ErrorTransform, Plugin, RequestContext, ResolvedValue};

/// Raises the GraphQL errors of the configured operation kinds instead of resolving them.
pub struct ThrowOnErrorPlugin {
    config: ThrowOnErrorConfig,
    transform: ErrorTransform,
}

impl ThrowOnErrorPlugin {
    pub fn new(config: ThrowOnErrorConfig, transform: ErrorTransform) -> Self {
        ThrowOnErrorPlugin { config, transform }
    }
}

#[async_trait::async_trait]
impl Plugin for ThrowOnErrorPlugin {
    fn name(&self) -> &str {
        "throw_on_error"
    }

    async fn after_network(&self, ctx: &mut RequestContext, value: ResolvedValue) -> Result<AfterFlow, ClientError> {
        if value.has_errors() && self.config.applies_to(ctx.artifact.kind) {
            tracing::debug!(errors = value.errors.len(), "Raising GraphQL errors");
            return Err((self.transform)(&value));
        }

        Ok(AfterFlow::Resolve(value))
    }
}
