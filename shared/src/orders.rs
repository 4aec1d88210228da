use crate::checkout::ValidatedCheckout;
use crate::error::{ShopError, ShopResult};
use crate::store::Store;
use crate::types::{Order, OrderStats, OrderStatus};

/// Allowed status changes. Anything else is rejected.
const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Confirmed),
    (OrderStatus::Pending, OrderStatus::Cancelled),
];

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Persist a validated checkout as a new Pending order.
pub async fn create_order<S: Store>(store: &S, checkout: ValidatedCheckout) -> ShopResult<Order> {
    let order = Order {
        order_id: uuid::Uuid::new_v4().to_string(),
        customer_name: checkout.customer_name,
        email: checkout.email,
        items: checkout.items,
        total_amount: checkout.total_amount,
        recalculated: checkout.recalculated,
        status: OrderStatus::Pending,
        created_at: chrono::Utc::now(),
    };

    store.insert_order(&order).await?;

    tracing::info!(
        "Order {} created: {} item(s), total {:.2}{}",
        order.order_id,
        order.items.len(),
        order.total_amount,
        if order.recalculated { " (recalculated)" } else { "" }
    );
    Ok(order)
}

pub async fn get_order<S: Store>(store: &S, order_id: &str) -> ShopResult<Order> {
    store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ShopError::NotFound("Order".to_string()))
}

pub async fn list_orders<S: Store>(store: &S) -> ShopResult<Vec<Order>> {
    store.list_orders().await
}

pub async fn confirm<S: Store>(store: &S, order_id: &str) -> ShopResult<Order> {
    transition(store, order_id, OrderStatus::Confirmed).await
}

pub async fn cancel<S: Store>(store: &S, order_id: &str) -> ShopResult<Order> {
    transition(store, order_id, OrderStatus::Cancelled).await
}

async fn transition<S: Store>(store: &S, order_id: &str, next: OrderStatus) -> ShopResult<Order> {
    let current = get_order(store, order_id).await?;
    if !can_transition(current.status, next) {
        tracing::warn!(
            "Rejected status change for order {}: {} -> {}",
            order_id,
            current.status,
            next
        );
        return Err(ShopError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    match store
        .update_order_status(order_id, current.status, next)
        .await?
    {
        Some(updated) => {
            tracing::info!("Order {} is now {}", order_id, next);
            Ok(updated)
        }
        // Someone else moved it between our read and write
        None => {
            let latest = get_order(store, order_id).await?;
            Err(ShopError::InvalidTransition {
                from: latest.status,
                to: next,
            })
        }
    }
}

/// Per-status counts and revenue over every order that was not cancelled.
pub fn order_stats(orders: &[Order]) -> OrderStats {
    let mut stats = OrderStats {
        total: orders.len(),
        ..OrderStats::default()
    };
    for order in orders {
        match order.status {
            OrderStatus::Pending => stats.pending += 1,
            OrderStatus::Confirmed => stats.confirmed += 1,
            OrderStatus::Cancelled => stats.cancelled += 1,
        }
        if order.status != OrderStatus::Cancelled {
            stats.total_revenue += order.total_amount;
        }
    }
    stats
}
