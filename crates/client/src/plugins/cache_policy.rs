use std::sync::Arc;

use normalized_cache::{EntityKey, PageInfo, Store};
use operation_artifact::CachePolicy;

use crate::{AfterFlow, BeforeFlow, ClientError, Plugin, RequestContext, ResolvedValue, ValueSource};

/// Serves what the cache can according to the policy of the invocation, and writes network
/// responses into it.
pub struct CachePolicyPlugin {
    store: Arc<Store>,
}

impl CachePolicyPlugin {
    pub fn new(store: Arc<Store>) -> Self {
        CachePolicyPlugin { store }
    }

    fn page_info(&self, ctx: &RequestContext) -> Option<PageInfo> {
        let pagination = ctx.artifact.pagination.as_ref()?;

        self.store
            .list_state(&EntityKey::Root, &ctx.artifact.selection, &ctx.variables, &pagination.path)
            .map(|state| state.page_info)
    }
}

#[async_trait::async_trait]
impl Plugin for CachePolicyPlugin {
    fn name(&self) -> &str {
        "cache_policy"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        let policy = ctx.policy;

        if !policy.reads_cache() {
            return Ok(BeforeFlow::Next);
        }

        let read = self
            .store
            .read(&EntityKey::Root, &ctx.artifact.selection, &ctx.variables);

        if read.partial {
            tracing::debug!(%policy, "Cache MISS");

            return Ok(match policy {
                CachePolicy::CacheOnly => BeforeFlow::Resolve(ResolvedValue::from_cache(read)),
                _ => BeforeFlow::Next,
            });
        }

        tracing::debug!(%policy, "Cache HIT");

        let value = ResolvedValue::from_cache(read).with_page_info(self.page_info(ctx));

        Ok(match policy {
            CachePolicy::CacheAndNetwork => BeforeFlow::Deliver(value),
            _ => BeforeFlow::Resolve(value),
        })
    }

    async fn after_network(&self, ctx: &mut RequestContext, mut value: ResolvedValue) -> Result<AfterFlow, ClientError> {
        if value.source == ValueSource::Cache || !ctx.policy.writes_cache() {
            return Ok(AfterFlow::Resolve(value));
        }

        if ctx.token.is_cancelled() {
            tracing::debug!("Dropping the response of a cancelled invocation");
            return Err(ClientError::Cancelled);
        }

        let Some(data) = &value.data else {
            return Ok(AfterFlow::Resolve(value));
        };

        let outcome = self
            .store
            .write(&EntityKey::Root, &ctx.artifact.selection, data, &ctx.variables);

        if !outcome.errors.is_empty() {
            tracing::warn!(errors = outcome.errors.len(), "Response only partially written to the cache");
        }

        self.store.collect_garbage();

        // Pages are merged into one list, callers get all of it.
        if ctx.artifact.pagination.is_some() {
            let read = self
                .store
                .read(&EntityKey::Root, &ctx.artifact.selection, &ctx.variables);

            if !read.partial {
                value.data = Some(read.data);
            }

            value.page_info = self.page_info(ctx);
        }

        Ok(AfterFlow::Resolve(value))
    }
}
