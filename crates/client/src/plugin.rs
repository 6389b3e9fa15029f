use futures_util::stream::BoxStream;

use crate::{ClientError, RequestContext, ResolvedValue};

pub type ValueStream = BoxStream<'static, ResolvedValue>;

/// Outcome of a plugin's forward phase.
pub enum BeforeFlow {
    /// Pass the context on to the next plugin.
    Next,
    /// Settle right away with this value. Later plugins and the network are skipped, the
    /// backward phase starts from this plugin.
    Resolve(ResolvedValue),
    /// Hand this value to the caller now and keep going.
    Deliver(ResolvedValue),
    /// Terminal plugins of subscriptions: every event goes through the backward phase.
    Stream(ValueStream),
}

/// Outcome of a plugin's backward phase.
pub enum AfterFlow {
    /// Pass the value on to the previous plugin.
    Resolve(ResolvedValue),
    /// Send the request again, starting the forward phase right after this plugin.
    Next,
}

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn before_network(&self, _ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        Ok(BeforeFlow::Next)
    }

    async fn after_network(&self, _ctx: &mut RequestContext, value: ResolvedValue) -> Result<AfterFlow, ClientError> {
        Ok(AfterFlow::Resolve(value))
    }
}
