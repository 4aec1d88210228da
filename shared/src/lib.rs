pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod auth;
pub mod http;

use config::Config;
use std::sync::Arc;
use store::Store;

/// Shared application state, built once per cold start.
pub struct AppState<S: Store> {
    pub store: S,
    pub config: Config,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, config: Config) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}
