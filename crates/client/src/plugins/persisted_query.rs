use client_config::LogLevel;

use crate::{AfterFlow, BeforeFlow, ClientError, PersistedQueryExtension, Plugin, RequestContext, ResolvedValue};

/// Sends the hash of the document first, and the full text only once if the server doesn't
/// know the hash.
pub struct AutomaticPersistedQueries {
    fallback_log_level: LogLevel,
}

impl AutomaticPersistedQueries {
    pub fn new(fallback_log_level: LogLevel) -> Self {
        AutomaticPersistedQueries { fallback_log_level }
    }
}

#[async_trait::async_trait]
impl Plugin for AutomaticPersistedQueries {
    fn name(&self) -> &str {
        "automatic_persisted_queries"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        if ctx.state.persisted_retry {
            return Ok(BeforeFlow::Next);
        }

        let sha256_hash = match hex::decode(&ctx.artifact.hash) {
            Ok(hash) => hash,
            Err(error) => {
                tracing::warn!(%error, "Document hash isn't hex encoded, sending the full document");
                return Ok(BeforeFlow::Next);
            }
        };

        let body = &mut ctx.fetch_params.body;
        body.query = None;
        body.extensions.persisted_query = Some(PersistedQueryExtension { version: 1, sha256_hash });
        ctx.state.hash_only = true;

        Ok(BeforeFlow::Next)
    }

    async fn after_network(&self, ctx: &mut RequestContext, value: ResolvedValue) -> Result<AfterFlow, ClientError> {
        // A miss after the full text was sent is final.
        if !ctx.state.hash_only || ctx.state.persisted_retry || !value.is_persisted_query_not_found() {
            return Ok(AfterFlow::Resolve(value));
        }

        log_fallback(self.fallback_log_level, &ctx.artifact.name);

        ctx.fetch_params.body.query = Some(ctx.artifact.text.clone());
        ctx.state.hash_only = false;
        ctx.state.persisted_retry = true;

        Ok(AfterFlow::Next)
    }
}

fn log_fallback(level: LogLevel, operation: &str) {
    match level {
        LogLevel::Off => {}
        LogLevel::Trace => tracing::trace!(operation, "Persisted query not found, sending the full document"),
        LogLevel::Debug => tracing::debug!(operation, "Persisted query not found, sending the full document"),
        LogLevel::Info => tracing::info!(operation, "Persisted query not found, sending the full document"),
        LogLevel::Warn => tracing::warn!(operation, "Persisted query not found, sending the full document"),
        LogLevel::Error => tracing::error!(operation, "Persisted query not found, sending the full document"),
    }
}

/// Only ever sends the hash of the document, as `doc_id`, for servers holding a fixed list of
/// trusted documents.
pub struct FixedPersistedQueries;

#[async_trait::async_trait]
impl Plugin for FixedPersistedQueries {
    fn name(&self) -> &str {
        "fixed_persisted_queries"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        let body = &mut ctx.fetch_params.body;
        body.query = None;
        body.doc_id = Some(ctx.artifact.hash.clone());
        body.extensions.persisted_query = None;
        ctx.state.hash_only = true;

        Ok(BeforeFlow::Next)
    }
}
