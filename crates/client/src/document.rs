use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::StreamExt;
use normalized_cache::{EntityKey, PageInfo, ReadResult, Store, SubscriptionCallback, SubscriptionId};
use operation_artifact::{ArtifactKind, CachePolicy, DocumentArtifact, Variables};
use tokio::sync::watch;

use crate::{
    pagination::{page_variables, PageDirection},
    pipeline::{DeliverySink, Execution, ResultStream},
    Client, ClientError, CorrelationToken, ExecuteOptions, PageLoad, ResolvedValue,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest known state of a document, as seen by its watchers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    pub value: Option<ResolvedValue>,
    /// An invocation is in flight.
    pub fetching: bool,
    /// Error of the last invocation, cleared by the next successful one.
    pub error: Option<ClientError>,
}

pub(crate) type StateSender = Arc<watch::Sender<DocumentState>>;

/// Replaces the value when it differs, so watchers only wake up on actual changes.
pub(crate) fn publish(state: &watch::Sender<DocumentState>, value: ResolvedValue) {
    state.send_if_modified(|state| {
        if state.value.as_ref() == Some(&value) {
            return false;
        }

        state.value = Some(value);
        true
    });
}

pub(crate) fn page_info(store: &Store, artifact: &DocumentArtifact, root: &EntityKey, variables: &Variables) -> Option<PageInfo> {
    let pagination = artifact.pagination.as_ref()?;

    store
        .list_state(root, &artifact.selection, variables, &pagination.path)
        .map(|state| state.page_info)
}

/// Store subscription keeping `state` up to date with the cache. Partial reads are skipped, a
/// half evicted document keeps showing its last complete value.
pub(crate) fn cache_watcher(
    store: &Arc<Store>,
    artifact: Arc<DocumentArtifact>,
    root: EntityKey,
    variables: Variables,
    state: StateSender,
) -> SubscriptionId {
    let weak = Arc::downgrade(store);
    let selection = Arc::new(artifact.selection.clone());

    let callback_root = root.clone();
    let callback_variables = variables.clone();

    let callback: SubscriptionCallback = Arc::new(move |read: ReadResult| {
        if read.partial {
            return;
        }

        let page_info = weak
            .upgrade()
            .and_then(|store| page_info(&store, &artifact, &callback_root, &callback_variables));

        publish(&state, ResolvedValue::from_cache(read).with_page_info(page_info));
    });

    store.subscribe(root, selection, variables, callback)
}

type Tokens = Mutex<Vec<CorrelationToken>>;

/// Tokens of the invocations a handle started and that haven't completed yet.
#[derive(Default)]
pub(crate) struct InFlight {
    tokens: Arc<Tokens>,
}

impl InFlight {
    pub fn begin(&self) -> CorrelationToken {
        let token = CorrelationToken::new();
        lock(&self.tokens).push(token.clone());
        token
    }

    pub fn finish(&self, token: &CorrelationToken) {
        remove(&self.tokens, token);
    }

    /// Finishes `token` once the returned value is dropped, for invocations outliving the call
    /// that started them.
    pub fn finish_on_drop(&self, token: &CorrelationToken) -> FinishOnDrop {
        FinishOnDrop {
            tokens: Arc::downgrade(&self.tokens),
            token: token.clone(),
        }
    }

    pub fn cancel_all(&self) {
        for token in lock(&self.tokens).drain(..) {
            token.cancel();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.tokens).len()
    }
}

fn remove(tokens: &Tokens, token: &CorrelationToken) {
    lock(tokens).retain(|other| other.id() != token.id());
}

pub(crate) struct FinishOnDrop {
    tokens: Weak<Tokens>,
    token: CorrelationToken,
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        if let Some(tokens) = self.tokens.upgrade() {
            remove(&tokens, &self.token);
        }
    }
}

/// Handle of a query, mutation or subscription document.
///
/// Queries stay subscribed to the cache after their first successful invocation, watchers get
/// every change of the records they depend on. Dropping the handle cancels whatever it still
/// has in flight and ends the cache subscription.
pub struct DocumentHandle {
    client: Client,
    artifact: Arc<DocumentArtifact>,
    state: StateSender,
    variables: Mutex<Variables>,
    subscription: Mutex<Option<SubscriptionId>>,
    in_flight: InFlight,
}

impl DocumentHandle {
    pub(crate) fn new(client: Client, artifact: Arc<DocumentArtifact>) -> Self {
        let (state, _) = watch::channel(DocumentState::default());

        DocumentHandle {
            client,
            artifact,
            state: Arc::new(state),
            variables: Mutex::new(Variables::new()),
            subscription: Mutex::new(None),
            in_flight: InFlight::default(),
        }
    }

    pub fn artifact(&self) -> &Arc<DocumentArtifact> {
        &self.artifact
    }

    pub fn watch(&self) -> watch::Receiver<DocumentState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DocumentState {
        self.state.borrow().clone()
    }

    /// Variables of the last invocation.
    pub fn variables(&self) -> Variables {
        lock(&self.variables).clone()
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        page_info(self.client.store(), &self.artifact, &EntityKey::Root, &self.variables())
    }

    /// Cancels every invocation of this handle still in flight.
    pub fn cancel(&self) {
        self.in_flight.cancel_all();
    }

    /// Runs the document with new variables and policy.
    pub async fn execute(&self, options: ExecuteOptions) -> Result<ResolvedValue, ClientError> {
        let variables = options.variables.clone();
        *lock(&self.variables) = variables.clone();

        let value = self.run(options).await?;

        if self.artifact.kind == ArtifactKind::Query {
            self.watch_cache(variables);
        }

        Ok(value)
    }

    /// Starts the subscription of a subscription document. Every event also becomes the value
    /// of the handle.
    pub async fn listen(&self, options: ExecuteOptions) -> Result<ResultStream, ClientError> {
        *lock(&self.variables) = options.variables.clone();

        let token = self.in_flight.begin();
        let finish = self.in_flight.finish_on_drop(&token);
        let ctx = self.client.context(self.artifact.clone(), options).with_token(token);

        // On failure `finish` is dropped right away.
        let stream = match self.client.run(ctx, None).await? {
            Execution::Streaming(stream) => stream,
            Execution::Settled(value) => futures_util::stream::once(async move { Ok(value) }).boxed(),
        };

        let state = self.state.clone();

        // The token stays in flight, and cancellable through the handle, as long as the stream
        // is alive.
        Ok(stream
            .inspect(move |event| {
                let _ = &finish;

                if let Ok(value) = event {
                    publish(&state, value.clone());
                }
            })
            .boxed())
    }

    pub async fn load_next_page(&self, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        self.load_page(PageDirection::Forward, page_size).await
    }

    pub async fn load_previous_page(&self, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        self.load_page(PageDirection::Backward, page_size).await
    }

    async fn load_page(&self, direction: PageDirection, page_size: Option<usize>) -> Result<PageLoad, ClientError> {
        let name = &self.artifact.name;

        let (Some(pagination), Some(field)) = (&self.artifact.pagination, self.artifact.paginated_field()) else {
            return Err(ClientError::NotPaginated(name.clone()));
        };

        let store = self.client.store();
        let variables = self.variables();

        let list = store
            .list_key(&EntityKey::Root, &self.artifact.selection, &variables, &pagination.path)
            .ok_or_else(|| ClientError::NoPageLoaded(name.clone()))?;

        // Overlapping loads of one list are ignored, from this handle or any other.
        let Some(_guard) = store.begin_page_load(list) else {
            tracing::debug!(operation = %name, "Page already loading, ignoring");
            return Ok(PageLoad::AlreadyLoading);
        };

        let state = store
            .list_state(&EntityKey::Root, &self.artifact.selection, &variables, &pagination.path)
            .ok_or_else(|| ClientError::NoPageLoaded(name.clone()))?;

        let default_page_size = self.client.default_page_size(pagination);

        let Some(variables) = page_variables(field, &state, direction, page_size, default_page_size, variables) else {
            tracing::debug!(operation = %name, ?direction, "No more pages");
            return Ok(PageLoad::Exhausted);
        };

        let options = ExecuteOptions::variables(variables).with_policy(CachePolicy::NetworkOnly);
        self.run(options).await.map(PageLoad::Loaded)
    }

    async fn run(&self, options: ExecuteOptions) -> Result<ResolvedValue, ClientError> {
        let token = self.in_flight.begin();
        self.state.send_modify(|state| state.fetching = true);

        let state = self.state.clone();
        let deliveries: DeliverySink = Arc::new(move |value| publish(&state, value));

        let name = self.artifact.name.clone();
        let ctx = self
            .client
            .context(self.artifact.clone(), options)
            .with_token(token.clone());

        let result = match self.client.run(ctx, Some(deliveries)).await {
            Ok(Execution::Settled(value)) => Ok(value),
            Ok(Execution::Streaming(_)) => Err(ClientError::NotExecutable(name)),
            Err(error) => Err(error),
        };

        self.in_flight.finish(&token);

        self.state.send_modify(|state| {
            state.fetching = false;

            match &result {
                Ok(value) => {
                    state.value = Some(value.clone());
                    state.error = None;
                }
                Err(error) => state.error = Some(error.clone()),
            }
        });

        result
    }

    fn watch_cache(&self, variables: Variables) {
        let store = self.client.store();
        let id = cache_watcher(
            store,
            self.artifact.clone(),
            EntityKey::Root,
            variables,
            self.state.clone(),
        );

        if let Some(previous) = lock(&self.subscription).replace(id) {
            store.unsubscribe(previous);
        }
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.in_flight.cancel_all();

        if let Some(id) = lock(&self.subscription).take() {
            self.client.store().unsubscribe(id);
        }
    }
}
