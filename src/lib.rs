pub mod app;
pub mod common;
pub mod config;
pub mod docs;
pub mod infrastructure;
pub mod modules;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod workers;

/// `RUST_LOG` wins; otherwise info, with request traces from tower-http.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
