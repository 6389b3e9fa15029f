use std::sync::Arc;

use client_config::{ClientConfig, PersistedQueryMode};
use futures_util::StreamExt;
use normalized_cache::{KeyConfig, Store, StoreSettings};
use operation_artifact::{CachePolicy, DocumentArtifact, PaginationInfo, Variables};
use serde_json::{Map, Value};

use crate::{
    default_error_transform, default_fetch_params,
    pipeline::{compose, DeliverySink, Execution, Pipeline, PluginSet, ResultStream},
    plugins::{
        AutomaticPersistedQueries, CachePolicyPlugin, DispatchPlugin, FetchParamsPlugin, FetchPlugin,
        FixedPersistedQueries, ThrowOnErrorPlugin,
    },
    ClientError, CorrelationToken, DocumentHandle, ErrorTransform, FetchParamsFn, Fetcher, FragmentHandle,
    NativeFetcher, Plugin, RequestContext, ResolvedValue,
};

/// Per invocation options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub variables: Variables,
    /// Overrides the policy of the document and the client default.
    pub policy: Option<CachePolicy>,
    pub metadata: Map<String, Value>,
}

impl ExecuteOptions {
    pub fn variables(variables: Variables) -> Self {
        ExecuteOptions {
            variables,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

pub struct ClientBuilder {
    config: ClientConfig,
    fetcher: Option<Fetcher>,
    fetch_params: Option<FetchParamsFn>,
    plugins: Vec<Arc<dyn Plugin>>,
    pipeline: Option<Vec<Arc<dyn Plugin>>>,
    error_transform: Option<ErrorTransform>,
    session: Map<String, Value>,
}

impl ClientBuilder {
    pub fn fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn fetch_params(mut self, fetch_params: FetchParamsFn) -> Self {
        self.fetch_params = Some(fetch_params);
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Replaces every plugin after the fetch params one, the fetch plugin included.
    pub fn pipeline(mut self, pipeline: Vec<Arc<dyn Plugin>>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Error raised for operations configured with `throw_on_error`.
    pub fn error_transform(mut self, transform: ErrorTransform) -> Self {
        self.error_transform = Some(transform);
        self
    }

    pub fn session(mut self, session: Map<String, Value>) -> Self {
        self.session = session;
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let ClientBuilder {
            config,
            fetcher,
            fetch_params,
            plugins,
            pipeline,
            error_transform,
            session,
        } = self;

        let url = config
            .url
            .clone()
            .ok_or_else(|| ClientError::Configuration("`url` is required".to_string()))?;

        let store = Arc::new(Store::new(key_config(&config), store_settings(&config)));

        let fetch_params_plugin = FetchParamsPlugin::new(fetch_params.unwrap_or_else(|| Arc::new(default_fetch_params) as FetchParamsFn))
            .with_headers(config.headers.iter().map(|(name, value)| (name.as_str(), value.as_str())))?;

        let injected: Vec<Arc<dyn Plugin>> = match config.persisted_queries.mode {
            PersistedQueryMode::Disabled => Vec::new(),
            PersistedQueryMode::Automatic => vec![Arc::new(AutomaticPersistedQueries::new(
                config.persisted_queries.fallback_log_level,
            ))],
            PersistedQueryMode::Fixed => vec![Arc::new(FixedPersistedQueries)],
        };

        let throw_on_error = config.throw_on_error.is_enabled().then(|| {
            let transform = error_transform.unwrap_or_else(|| Arc::new(default_error_transform) as ErrorTransform);
            Arc::new(ThrowOnErrorPlugin::new(config.throw_on_error.clone(), transform)) as Arc<dyn Plugin>
        });

        let fetch = FetchPlugin::new(fetcher.unwrap_or_else(NativeFetcher::runtime_fetcher), url)
            .with_timeout(config.request_timeout);

        let plugins = compose(PluginSet {
            throw_on_error,
            fetch_params: Arc::new(fetch_params_plugin),
            defaults: vec![Arc::new(DispatchPlugin), Arc::new(CachePolicyPlugin::new(store.clone()))],
            client: plugins,
            injected,
            fetch: Arc::new(fetch),
            pipeline,
        });

        let pipeline = Pipeline::new(plugins);
        tracing::debug!(plugins = ?pipeline.names(), "Client ready");

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                store,
                pipeline,
                session,
            }),
        })
    }
}

fn key_config(config: &ClientConfig) -> KeyConfig {
    config
        .types
        .iter()
        .filter_map(|(typename, type_config)| Some((typename, type_config.keys.as_ref()?)))
        .fold(KeyConfig::new(config.default_keys.iter().cloned()), |keys, (typename, type_keys)| {
            keys.with_type_keys(typename.clone(), type_keys.iter().cloned())
        })
}

fn store_settings(config: &ClientConfig) -> StoreSettings {
    StoreSettings {
        default_lifetime: config.cache.default_lifetime,
        default_list_position: config.pagination.default_list_position,
    }
}

struct ClientInner {
    config: ClientConfig,
    store: Arc<Store>,
    pipeline: Pipeline,
    session: Map<String, Value>,
}

/// Entry point: owns the cache and the plugin pipeline every document goes through.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            fetcher: None,
            fetch_params: None,
            plugins: Vec::new(),
            pipeline: None,
            error_transform: None,
            session: Map::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Handle of a query, mutation or subscription document.
    pub fn document(&self, artifact: Arc<DocumentArtifact>) -> DocumentHandle {
        DocumentHandle::new(self.clone(), artifact)
    }

    /// Handle of a fragment, read from the entity `parent` identifies. `parent` must carry the
    /// `__typename` and key fields of the entity.
    pub fn fragment(&self, artifact: Arc<DocumentArtifact>, parent: Map<String, Value>) -> Result<FragmentHandle, ClientError> {
        FragmentHandle::new(self.clone(), artifact, parent)
    }

    pub(crate) fn context(&self, artifact: Arc<DocumentArtifact>, options: ExecuteOptions) -> RequestContext {
        let policy = options
            .policy
            .or(artifact.policy)
            .unwrap_or(self.inner.config.default_cache_policy);

        RequestContext::new(artifact, options.variables, policy)
            .with_session(self.inner.session.clone())
            .with_metadata(options.metadata)
    }

    /// Page size used when neither the caller nor the last loaded page set one.
    pub(crate) fn default_page_size(&self, pagination: &PaginationInfo) -> usize {
        Some(pagination.page_size)
            .filter(|size| *size > 0)
            .unwrap_or(self.inner.config.pagination.default_page_size)
    }

    pub(crate) async fn run(
        &self,
        ctx: RequestContext,
        deliveries: Option<DeliverySink>,
    ) -> Result<Execution, ClientError> {
        self.inner.pipeline.execute(ctx, deliveries).await
    }

    /// Runs a query or mutation to its final value.
    pub async fn execute(&self, artifact: Arc<DocumentArtifact>, options: ExecuteOptions) -> Result<ResolvedValue, ClientError> {
        self.execute_with_token(artifact, options, CorrelationToken::new()).await
    }

    /// Same as [`Client::execute`], cancellable through `token`.
    pub async fn execute_with_token(
        &self,
        artifact: Arc<DocumentArtifact>,
        options: ExecuteOptions,
        token: CorrelationToken,
    ) -> Result<ResolvedValue, ClientError> {
        let name = artifact.name.clone();
        let ctx = self.context(artifact, options).with_token(token);

        match self.run(ctx, None).await? {
            Execution::Settled(value) => Ok(value),
            Execution::Streaming(_) => Err(ClientError::NotExecutable(name)),
        }
    }

    /// Starts a subscription. The stream ends when `token` is cancelled or the server stops.
    pub async fn subscribe(
        &self,
        artifact: Arc<DocumentArtifact>,
        options: ExecuteOptions,
        token: CorrelationToken,
    ) -> Result<ResultStream, ClientError> {
        let ctx = self.context(artifact, options).with_token(token);

        match self.run(ctx, None).await? {
            Execution::Streaming(stream) => Ok(stream),
            Execution::Settled(value) => Ok(futures_util::stream::once(async move { Ok(value) }).boxed()),
        }
    }
}
