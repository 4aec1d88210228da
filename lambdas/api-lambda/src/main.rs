use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{run, service_fn, Error, Request};
use std::sync::Arc;
use storefront_shared::config::{Config, StoreBackend};
use storefront_shared::store::{DynamoStore, MemoryStore, Store};
use storefront_shared::AppState;

mod admin;
mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_http::tracing::init_default_subscriber();

    let config = Config::from_env();
    tracing::info!("Starting storefront API with {:?} store", config.store_backend);

    match config.store_backend {
        StoreBackend::DynamoDb => {
            // Initialize AWS clients once at startup
            let aws_config = aws_config::load_from_env().await;
            let store = DynamoStore::new(DynamoClient::new(&aws_config), config.table_name.clone());
            serve(AppState::new(store, config)).await
        }
        StoreBackend::Memory => {
            tracing::warn!("In-memory store selected, data is lost when the instance stops");
            serve(AppState::new(MemoryStore::new(), config)).await
        }
    }
}

async fn serve<S: Store + 'static>(state: Arc<AppState<S>>) -> Result<(), Error> {
    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
