//! Runs one invocation through the plugin chain.
//!
//! Plugins see the request context in order before the network, and the produced value in
//! reverse order after it. Progress is an explicit [`Position`] advanced by the [`Signal`] every
//! hook returns, rather than nested continuations.

mod compose;
mod state;

use std::sync::Arc;

use futures_util::{stream::BoxStream, StreamExt};
use tracing::Instrument;

pub use compose::{compose, PluginSet};
pub use state::{Phase, Position, Signal};

use crate::{AfterFlow, BeforeFlow, ClientError, Plugin, RequestContext, ResolvedValue, ValueStream};

/// Receives values handed out before the final one, such as the cached value of a
/// `cache-and-network` query.
pub type DeliverySink = Arc<dyn Fn(ResolvedValue) + Send + Sync>;

pub type ResultStream = BoxStream<'static, Result<ResolvedValue, ClientError>>;

pub enum Execution {
    Settled(ResolvedValue),
    /// Subscriptions: every event, after the backward phase.
    Streaming(ResultStream),
}

#[derive(Clone)]
pub struct Pipeline {
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
}

impl Pipeline {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Pipeline {
            plugins: Arc::new(plugins),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn execute(&self, ctx: RequestContext, deliveries: Option<DeliverySink>) -> Result<Execution, ClientError> {
        let span = tracing::info_span!(
            "pipeline",
            operation = %ctx.artifact.name,
            kind = %ctx.artifact.kind,
            correlation = %ctx.token.id(),
        );

        self.run(ctx, deliveries).instrument(span).await
    }

    fn plugin(&self, index: usize) -> Result<&Arc<dyn Plugin>, ClientError> {
        self.plugins.get(index).ok_or(ClientError::NoValue)
    }

    async fn run(&self, mut ctx: RequestContext, deliveries: Option<DeliverySink>) -> Result<Execution, ClientError> {
        let len = self.len();
        let mut position = Position::start(len);
        let mut value: Option<ResolvedValue> = None;

        loop {
            if ctx.token.is_cancelled() {
                tracing::debug!("Invocation cancelled, skipping the remaining plugins");
                return Err(ClientError::Cancelled);
            }

            let Position::At { index, phase } = position else {
                break;
            };

            let plugin = self.plugin(index)?;

            let signal = match phase {
                Phase::Forward => {
                    tracing::trace!(plugin = plugin.name(), "before network");

                    match plugin.before_network(&mut ctx).await? {
                        BeforeFlow::Next => Signal::Next,
                        BeforeFlow::Deliver(delivered) => {
                            if let Some(deliveries) = &deliveries {
                                deliveries(delivered);
                            }
                            Signal::Next
                        }
                        BeforeFlow::Resolve(resolved) => {
                            value = Some(resolved);
                            Signal::Resolve
                        }
                        BeforeFlow::Stream(events) => {
                            tracing::debug!(plugin = plugin.name(), "Streaming events");
                            return Ok(Execution::Streaming(self.stream(ctx, index, events)));
                        }
                    }
                }
                Phase::Backward => {
                    tracing::trace!(plugin = plugin.name(), "after network");

                    let current = value.take().ok_or(ClientError::NoValue)?;

                    match plugin.after_network(&mut ctx, current).await? {
                        AfterFlow::Resolve(resolved) => {
                            value = Some(resolved);
                            Signal::Resolve
                        }
                        AfterFlow::Next => {
                            tracing::debug!(plugin = plugin.name(), "Dispatching the request again");
                            Signal::Next
                        }
                    }
                }
            };

            position = position.advance(signal, len);
        }

        match position {
            Position::Settled => value.map(Execution::Settled).ok_or(ClientError::NoValue),
            _ => Err(ClientError::NoValue),
        }
    }

    /// Backward phase of a subscription event, starting at the plugin producing the events.
    async fn backward(&self, ctx: &mut RequestContext, from: usize, event: ResolvedValue) -> Result<ResolvedValue, ClientError> {
        let mut value = event;

        for index in (0..=from).rev() {
            if ctx.token.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let plugin = self.plugin(index)?;

            match plugin.after_network(ctx, value).await? {
                AfterFlow::Resolve(resolved) => value = resolved,
                AfterFlow::Next => {
                    return Err(ClientError::plugin(
                        plugin.name(),
                        "subscription events can't be dispatched again",
                    ))
                }
            }
        }

        Ok(value)
    }

    fn stream(&self, ctx: RequestContext, from: usize, events: ValueStream) -> ResultStream {
        let pipeline = self.clone();
        let cancellation = ctx.token.cancellation().clone();
        let span = tracing::Span::current();

        futures_util::stream::unfold((ctx, events), move |(mut ctx, mut events)| {
            let pipeline = pipeline.clone();

            async move {
                let event = events.next().await?;
                let result = pipeline.backward(&mut ctx, from, event).await;
                Some((result, (ctx, events)))
            }
            .instrument(span.clone())
        })
        .take_until(cancellation.cancelled_owned())
        .boxed()
    }
}
