use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use storefront_shared::auth::{self, SignedIn};
use storefront_shared::error::{ShopError, ShopResult};
use storefront_shared::http::{
    api_response, clear_session_cookie, error_response, json_response, parse_payload, redirect,
    redirect_with_cookie, session_cookie, session_token, with_cookie, with_query,
};
use storefront_shared::products;
use storefront_shared::store::{ProductSort, Store};
use storefront_shared::types::{AdminIdentity, LoginRequest, Order, RegisterRequest};
use storefront_shared::{orders, AppState};

use crate::http_handler::{not_found, product_query};

const ADMIN_PAGE_SIZE: u32 = 10;

fn login_cookie<S: Store>(state: &AppState<S>, signed_in: &SignedIn) -> String {
    session_cookie(
        &signed_in.token,
        state.config.session_ttl().num_seconds(),
        state.config.cookie_secure,
    )
}

async fn gate<S: Store>(event: &Request, state: &AppState<S>) -> ShopResult<AdminIdentity> {
    let token = session_token(event.headers());
    auth::authenticate(&state.store, token.as_deref()).await
}

/// `/api/admin/...`: JSON in, JSON out, 403 without a session.
pub(crate) async fn api_routes<S: Store>(
    event: &Request,
    state: &AppState<S>,
    method: &Method,
    parts: &[&str],
) -> Result<Response<Body>, Error> {
    let ttl = state.config.session_ttl();

    // Public admin endpoints
    match (method, parts) {
        (&Method::POST, ["login"]) => {
            let result = match parse_payload::<LoginRequest>(event) {
                Ok(req) => auth::login(&state.store, req, ttl).await,
                Err(e) => Err(e),
            };
            return match result {
                Ok(signed_in) => with_cookie(
                    json_response(StatusCode::OK, &signed_in.session.admin)?,
                    login_cookie(state, &signed_in),
                ),
                Err(e) => error_response(&e),
            };
        }
        (&Method::POST, ["register"]) => {
            let result = match parse_payload::<RegisterRequest>(event) {
                Ok(req) => auth::register(&state.store, req, ttl).await,
                Err(e) => Err(e),
            };
            return match result {
                Ok(signed_in) => with_cookie(
                    json_response(StatusCode::CREATED, &signed_in.session.admin)?,
                    login_cookie(state, &signed_in),
                ),
                Err(e) => error_response(&e),
            };
        }
        (&Method::POST, ["logout"]) => {
            let token = session_token(event.headers());
            return match auth::logout(&state.store, token.as_deref()).await {
                Ok(()) => with_cookie(
                    json_response(StatusCode::OK, &serde_json::json!({"message": "Logged out"}))?,
                    clear_session_cookie(state.config.cookie_secure),
                ),
                Err(e) => error_response(&e),
            };
        }
        _ => {}
    }

    let admin = match gate(event, state).await {
        Ok(admin) => admin,
        Err(e) => {
            tracing::warn!("Admin API access denied: {}", e);
            return error_response(&e);
        }
    };
    tracing::info!("Admin {} -> {} /{}", admin.email, method, parts.join("/"));

    match (method, parts) {
        // GET /api/admin/dashboard
        (&Method::GET, ["dashboard"]) => {
            let result = async {
                let catalog = products::catalog_stats(&state.store).await?;
                let all_orders = orders::list_orders(&state.store).await?;
                Ok::<_, ShopError>(serde_json::json!({
                    "admin": admin,
                    "catalog": catalog,
                    "orders": orders::order_stats(&all_orders),
                }))
            }
            .await;
            api_response(StatusCode::OK, result)
        }

        // --- PRODUCTS ---
        (&Method::GET, ["products"]) => {
            let query = product_query(event, ADMIN_PAGE_SIZE, ProductSort::Newest);
            api_response(
                StatusCode::OK,
                products::list_products(&state.store, &query).await,
            )
        }
        (&Method::POST, ["products"]) => {
            let result = match parse_payload(event) {
                Ok(req) => products::create_product(&state.store, req).await,
                Err(e) => Err(e),
            };
            api_response(StatusCode::CREATED, result)
        }
        (&Method::GET, ["products", product_id]) => api_response(
            StatusCode::OK,
            products::get_product(&state.store, product_id).await,
        ),
        (&Method::PUT, ["products", product_id]) => {
            let result = match parse_payload(event) {
                Ok(req) => products::update_product(&state.store, product_id, req).await,
                Err(e) => Err(e),
            };
            api_response(StatusCode::OK, result)
        }
        (&Method::DELETE, ["products", product_id]) => api_response(
            StatusCode::OK,
            products::delete_product(&state.store, product_id).await,
        ),

        // --- ORDERS ---
        (&Method::GET, ["orders"]) => {
            let result = orders::list_orders(&state.store).await.map(|all| {
                serde_json::json!({
                    "stats": orders::order_stats(&all),
                    "orders": all,
                })
            });
            api_response(StatusCode::OK, result)
        }
        (&Method::GET, ["orders", order_id]) => api_response(
            StatusCode::OK,
            orders::get_order(&state.store, order_id).await,
        ),
        (&Method::POST, ["orders", order_id, action @ ("confirm" | "cancel")]) => api_response(
            StatusCode::OK,
            order_action(state, order_id, action).await,
        ),
        _ => not_found(),
    }
}

/// `/admin/...`: form-driven pages. Outcomes are redirects, except a
/// missing order or product which answers 404.
pub(crate) async fn page_routes<S: Store>(
    event: &Request,
    state: &AppState<S>,
    method: &Method,
    parts: &[&str],
) -> Result<Response<Body>, Error> {
    let ttl = state.config.session_ttl();

    match (method, parts) {
        (&Method::POST, ["login"]) => {
            let result = match parse_payload::<LoginRequest>(event) {
                Ok(req) => auth::login(&state.store, req, ttl).await,
                Err(e) => Err(e),
            };
            return match result {
                Ok(signed_in) => {
                    redirect_with_cookie("/admin", Some(login_cookie(state, &signed_in)))
                }
                Err(e) => redirect(&with_query("/admin/login", "error", &page_message(&e))),
            };
        }
        (&Method::POST, ["register"]) => {
            let result = match parse_payload::<RegisterRequest>(event) {
                Ok(req) => auth::register(&state.store, req, ttl).await,
                Err(e) => Err(e),
            };
            return match result {
                Ok(signed_in) => {
                    redirect_with_cookie("/admin", Some(login_cookie(state, &signed_in)))
                }
                Err(e) => redirect(&with_query("/admin/register", "error", &page_message(&e))),
            };
        }
        (&Method::GET, ["logout"]) => {
            let token = session_token(event.headers());
            if let Err(e) = auth::logout(&state.store, token.as_deref()).await {
                tracing::error!("Logout failed: {}", e);
            }
            return redirect_with_cookie(
                "/admin/login",
                Some(clear_session_cookie(state.config.cookie_secure)),
            );
        }
        _ => {}
    }

    match gate(event, state).await {
        Ok(_) => {}
        Err(ShopError::Unauthorized(_)) => return redirect("/admin/login"),
        Err(e) => return error_response(&e),
    }

    match (method, parts) {
        (&Method::POST, ["orders", order_id, action @ ("confirm" | "cancel")]) => {
            match order_action(state, order_id, action).await {
                Ok(order) => {
                    let done = match action {
                        &"confirm" => "Order confirmed",
                        _ => "Order cancelled",
                    };
                    tracing::info!("Order {} -> {}", order.order_id, order.status);
                    redirect(&with_query("/admin/orders", "success", done))
                }
                Err(e @ ShopError::NotFound(_)) => error_response(&e),
                Err(e @ ShopError::InvalidTransition { .. }) => {
                    redirect(&with_query("/admin/orders", "error", &e.to_string()))
                }
                Err(e) => {
                    tracing::error!("Order {} {} failed: {}", order_id, action, e);
                    let failed = format!("Failed to {} order", action);
                    redirect(&with_query("/admin/orders", "error", &failed))
                }
            }
        }
        (&Method::POST, ["products", product_id, "delete"]) => {
            match products::delete_product(&state.store, product_id).await {
                Ok(_) => redirect(&with_query(
                    "/admin/products",
                    "success",
                    "Product deleted successfully",
                )),
                Err(e @ ShopError::NotFound(_)) => error_response(&e),
                Err(e) => {
                    tracing::error!("Deleting product {} failed: {}", product_id, e);
                    redirect(&with_query(
                        "/admin/products",
                        "error",
                        "Error deleting product",
                    ))
                }
            }
        }
        _ => not_found(),
    }
}

async fn order_action<S: Store>(
    state: &AppState<S>,
    order_id: &str,
    action: &str,
) -> ShopResult<Order> {
    match action {
        "confirm" => orders::confirm(&state.store, order_id).await,
        _ => orders::cancel(&state.store, order_id).await,
    }
}

/// What a form page can show the user.
fn page_message(err: &ShopError) -> String {
    match err {
        ShopError::ValidationFailed(errors) => errors.join(", "),
        ShopError::Unauthorized(message) | ShopError::Conflict(message) => message.clone(),
        ShopError::BadRequest(_) => "Invalid form submission".to_string(),
        _ => "Something went wrong, please try again".to_string(),
    }
}
