use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;
use storefront_shared::error::ShopResult;
use storefront_shared::http::{api_response, error_response, json_response, parse_json};
use storefront_shared::products::{self, ProductQuery};
use storefront_shared::store::{ProductSort, Store};
use storefront_shared::types::{CheckoutRequest, CheckoutResponse, Order};
use storefront_shared::{checkout, orders, AppState};

use crate::admin;

const PUBLIC_PAGE_SIZE: u32 = 6;

/// Main Lambda handler - routes storefront and admin requests
pub(crate) async fn function_handler<S: Store>(
    event: Request,
    state: Arc<AppState<S>>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("🛒 Storefront API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header(
                "Access-Control-Allow-Methods",
                "GET,POST,PUT,DELETE,OPTIONS",
            )
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Admin routes (API and page context) sit behind the session gate
    if let ["api", "admin", rest @ ..] = parts.as_slice() {
        return admin::api_routes(&event, &state, &method, rest).await;
    }
    if let ["admin", rest @ ..] = parts.as_slice() {
        return admin::page_routes(&event, &state, &method, rest).await;
    }

    match (&method, parts.as_slice()) {
        // GET /api/products?page=&limit=&category=&search=
        (&Method::GET, ["api", "products"]) => {
            let query = product_query(&event, PUBLIC_PAGE_SIZE, ProductSort::Oldest);
            api_response(
                StatusCode::OK,
                products::list_products(&state.store, &query).await,
            )
        }
        // GET /api/products/{id}
        (&Method::GET, ["api", "products", product_id]) => api_response(
            StatusCode::OK,
            products::get_product(&state.store, product_id).await,
        ),
        // POST /api/orders - checkout
        (&Method::POST, ["api", "orders"]) => match place_order(&state.store, event.body()).await {
            Ok(order) => json_response(
                StatusCode::CREATED,
                &CheckoutResponse {
                    success: true,
                    order_id: order.order_id,
                    message: "Order created successfully".to_string(),
                },
            ),
            Err(e) => {
                tracing::warn!("Checkout rejected: {}", e);
                error_response(&e)
            }
        },
        // GET /api/orders/{id} - order confirmation
        (&Method::GET, ["api", "orders", order_id]) => api_response(
            StatusCode::OK,
            orders::get_order(&state.store, order_id).await,
        ),
        _ => not_found(),
    }
}

/// Cart gate, then full validation, then persistence.
async fn place_order<S: Store>(store: &S, body: &Body) -> ShopResult<Order> {
    let req: CheckoutRequest = parse_json(body)?;
    checkout::ensure_cart_not_empty(&req)?;
    let validated = checkout::validate_checkout(&req)?;
    orders::create_order(store, validated).await
}

pub(crate) fn product_query(event: &Request, default_limit: u32, sort: ProductSort) -> ProductQuery {
    let params = event.query_string_parameters_ref();
    let param = |name: &str| params.and_then(|p| p.first(name));
    ProductQuery::from_params(
        param("page"),
        param("limit"),
        param("category"),
        param("search"),
        default_limit,
        sort,
    )
}

pub(crate) fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}
