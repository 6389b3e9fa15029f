use std::sync::Arc;

use crate::Plugin;

/// Every source of plugins of a client.
pub struct PluginSet {
    /// Present when some operation kinds raise their GraphQL errors.
    pub throw_on_error: Option<Arc<dyn Plugin>>,
    pub fetch_params: Arc<dyn Plugin>,
    /// Built-in plugins running before any other: dispatch then cache policy.
    pub defaults: Vec<Arc<dyn Plugin>>,
    /// Plugins given to the client.
    pub client: Vec<Arc<dyn Plugin>>,
    /// Plugins enabled through configuration, such as persisted queries.
    pub injected: Vec<Arc<dyn Plugin>>,
    pub fetch: Arc<dyn Plugin>,
    /// Replaces everything after the fetch params plugin.
    pub pipeline: Option<Vec<Arc<dyn Plugin>>>,
}

/// Final plugin order:
/// `[throw_on_error?, fetch_params] ++ (pipeline | defaults ++ client ++ injected ++ [fetch])`.
///
/// The throw-on-error plugin comes first so its backward phase sees the value last.
pub fn compose(set: PluginSet) -> Vec<Arc<dyn Plugin>> {
    let PluginSet {
        throw_on_error,
        fetch_params,
        defaults,
        client,
        injected,
        fetch,
        pipeline,
    } = set;

    let mut plugins: Vec<Arc<dyn Plugin>> = throw_on_error.into_iter().collect();
    plugins.push(fetch_params);

    match pipeline {
        Some(pipeline) => plugins.extend(pipeline),
        None => {
            plugins.extend(defaults);
            plugins.extend(client);
            plugins.extend(injected);
            plugins.push(fetch);
        }
    }

    plugins
}
