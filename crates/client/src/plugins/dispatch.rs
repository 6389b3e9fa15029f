use operation_artifact::{ArtifactKind, CachePolicy};

use crate::{BeforeFlow, ClientError, Plugin, RequestContext};

/// Routes by operation kind: mutations and subscriptions always reach the network.
pub struct DispatchPlugin;

#[async_trait::async_trait]
impl Plugin for DispatchPlugin {
    fn name(&self) -> &str {
        "dispatch"
    }

    async fn before_network(&self, ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        match ctx.artifact.kind {
            ArtifactKind::Query => {}
            ArtifactKind::Mutation | ArtifactKind::Subscription => {
                if ctx.policy != CachePolicy::NoCache {
                    ctx.policy = CachePolicy::NetworkOnly;
                }
            }
            ArtifactKind::Fragment => return Err(ClientError::NotExecutable(ctx.artifact.name.clone())),
        }

        Ok(BeforeFlow::Next)
    }
}
