#![allow(unused_crate_dependencies, clippy::panic)]

mod cache;
mod pagination;
mod persisted_queries;
mod pipeline;
mod subscriptions;
mod transport;

#[ctor::ctor]
fn setup_logging() {
    let filter = tracing_subscriber::filter::EnvFilter::builder()
        .parse(std::env::var("RUST_LOG").unwrap_or("graphql_client=debug,normalized_cache=debug".to_string()))
        .unwrap();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .init();
}
