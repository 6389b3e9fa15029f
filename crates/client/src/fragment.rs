use std::sync::Arc;

use normalized_cache::{EntityKey, PageInfo, SubscriptionId};
use operation_artifact::{ArtifactKind, CachePolicy, DocumentArtifact, NodeLookup, Variables};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::{
    document::{cache_watcher, page_info, publish, InFlight, StateSender},
    pagination::{page_variables, PageDirection},
    Client, ClientError, DocumentState, ExecuteOptions, PageLoad, ResolvedValue,
};

/// Handle of a fragment, reading the entity identified by the parent object it was created
/// with. Paginated fragments load their pages through a generated node lookup query.
pub struct FragmentHandle {
    client: Client,
    artifact: Arc<DocumentArtifact>,
    parent: Map<String, Value>,
    key: EntityKey,
    lookup: Option<(NodeLookup, Arc<DocumentArtifact>)>,
    state: StateSender,
    subscription: SubscriptionId,
    in_flight: InFlight,
}

impl FragmentHandle {
    pub(crate) fn new(client: Client, artifact: Arc<DocumentArtifact>, parent: Map<String, Value>) -> Result<Self, ClientError> {
        if artifact.kind != ArtifactKind::Fragment {
            return Err(ClientError::Configuration(format!("`{}` is not a fragment", artifact.name)));
        }

        let key = client
            .store()
            .key_config()
            .identify(&parent)
            .ok()
            .flatten()
            .ok_or_else(|| {
                ClientError::Configuration(format!(
                    "the parent of `{}` needs the typename and key fields of its entity",
                    artifact.name
                ))
            })?;

        let lookup = key.typename().and_then(|typename| {
            let lookup = client.config().node_lookup(typename);
            let query = artifact.node_lookup(&lookup)?;
            Some((lookup, Arc::new(query)))
        });

        let (state, _) = watch::channel(DocumentState::default());
        let state = Arc::new(state);

        let store = client.store();
        let read = store.read(&key, &artifact.selection, &Variables::new());

        if !read.partial {
            let page_info = page_info(store, &artifact, &key, &Variables::new());
            publish(&state, ResolvedValue::from_cache(read).with_page_info(page_info));
        }

        let subscription = cache_watcher(store, artifact.clone(), key.clone(), Variables::new(), state.clone());

        Ok(FragmentHandle {
            client,
            artifact,
            parent,
            key,
            lookup,
            state,
            subscription,
            in_flight: InFlight::default(),
        })
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Query loading further pages, present for paginated fragments.
    pub fn lookup_query(&self) -> Option<&Arc<DocumentArtifact>> {
        self.lookup.as_ref().map(|(_, query)| query)
    }

    /// Current cache content of the fragment.
    pub fn read(&self) -> ResolvedValue {
        let variables = Variables::new();
        let read = self.client.store().read(&self.key, &self.artifact.selection, &variables);
        ResolvedValue::from_cache(read).with_page_info(self.page_info())
    }

    pub fn watch(&self) -> watch::Receiver<DocumentState> {
        self.state.subscribe()
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        page_info(self.client.store(), &self.artifact, &self.key, &Variables::new())
    }

    pub fn cancel(&self) {
        self.in_flight.cancel_all();
    }

    pub async fn load_next_page(&self, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        self.load_page(PageDirection::Forward, page_size).await
    }

    pub async fn load_previous_page(&self, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        self.load_page(PageDirection::Backward, page_size).await
    }

    async fn load_page(&self, direction: PageDirection, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        let name = &self.artifact.name;

        let (Some(pagination), Some((lookup, query))) = (&self.artifact.pagination, &self.lookup) else {
            return Err(ClientError::NotPaginated(name.clone()));
        };

        let field = query
            .paginated_field()
            .ok_or_else(|| ClientError::NotPaginated(name.clone()))?;

        let store = self.client.store();

        let list = store
            .list_key(&self.key, &self.artifact.selection, &Variables::new(), &pagination.path)
            .ok_or_else(|| ClientError::NoPageLoaded(name.clone()))?;

        let Some(_guard) = store.begin_page_load(list) else {
            tracing::debug!(fragment = %name, "Page already loading, ignoring");
            return Ok(PageLoad::AlreadyLoading);
        };

        let state = store
            .list_state(&self.key, &self.artifact.selection, &Variables::new(), &pagination.path)
            .ok_or_else(|| ClientError::NoPageLoaded(name.clone()))?;

        let variables = lookup.variables(&self.parent).ok_or_else(|| {
            ClientError::Configuration(format!("the parent of `{name}` lacks the fields of its node lookup"))
        })?;

        let default_page_size = self.client.default_page_size(pagination);

        let Some(variables) = page_variables(field, &state, direction, page_size, default_page_size, variables) else {
            tracing::debug!(fragment = %name, ?direction, "No more pages");
            return Ok(PageLoad::Exhausted);
        };

        let token = self.in_flight.begin();
        let options = ExecuteOptions::variables(variables).with_policy(CachePolicy::NetworkOnly);
        let result = self
            .client
            .execute_with_token(query.clone(), options, token.clone())
            .await;
        self.in_flight.finish(&token);

        let value = result?;

        if value.has_errors() || value.network_error.is_some() {
            return Ok(PageLoad::Loaded(value));
        }

        Ok(PageLoad::Loaded(self.read()))
    }
}

impl Drop for FragmentHandle {
    fn drop(&mut self) {
        self.in_flight.cancel_all();
        self.client.store().unsubscribe(self.subscription);
    }
}
