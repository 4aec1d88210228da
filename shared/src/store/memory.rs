use super::{build_listing, ProductFilter, ProductListing, ProductSort, Store};
use crate::error::{ShopError, ShopResult};
use crate::types::{AdminUser, Order, OrderStatus, Product, Session};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store. Vectors keep insertion order so listings are stable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RwLock<Vec<Product>>,
    orders: RwLock<Vec<Order>>,
    admins: RwLock<HashMap<String, AdminUser>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        skip: usize,
        limit: usize,
    ) -> ShopResult<ProductListing> {
        let catalog = self.products.read().await.clone();
        Ok(build_listing(catalog, filter, sort, skip, limit))
    }

    async fn get_product(&self, product_id: &str) -> ShopResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.product_id == product_id).cloned())
    }

    async fn put_product(&self, product: &Product) -> ShopResult<()> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|p| p.product_id == product.product_id) {
            Some(existing) => *existing = product.clone(),
            None => products.push(product.clone()),
        }
        Ok(())
    }

    async fn delete_product(&self, product_id: &str) -> ShopResult<Option<Product>> {
        let mut products = self.products.write().await;
        let removed = products
            .iter()
            .position(|p| p.product_id == product_id)
            .map(|index| products.remove(index));
        Ok(removed)
    }

    async fn insert_order(&self, order: &Order) -> ShopResult<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> ShopResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|o| o.order_id == order_id).cloned())
    }

    async fn list_orders(&self) -> ShopResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.orders.read().await.iter().rev().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> ShopResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.status == expected)
        {
            Some(order) => {
                order.status = next;
                Ok(Some(order.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_admin_by_email(&self, email: &str) -> ShopResult<Option<AdminUser>> {
        let admins = self.admins.read().await;
        Ok(admins.get(&email.to_lowercase()).cloned())
    }

    async fn insert_admin(&self, admin: &AdminUser) -> ShopResult<()> {
        let mut admins = self.admins.write().await;
        let key = admin.email.to_lowercase();
        if admins.contains_key(&key) {
            return Err(ShopError::Conflict("Email already registered".to_string()));
        }
        admins.insert(key, admin.clone());
        Ok(())
    }

    async fn put_session(&self, session: &Session) -> ShopResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.token_digest.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, token_digest: &str) -> ShopResult<Option<Session>> {
        Ok(self.sessions.read().await.get(token_digest).cloned())
    }

    async fn delete_session(&self, token_digest: &str) -> ShopResult<()> {
        self.sessions.write().await.remove(token_digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            order_id: id.to_string(),
            customer_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            items: vec![],
            total_amount: 15.0,
            recalculated: false,
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_status_update_requires_expected_status() {
        let store = MemoryStore::new();
        store.insert_order(&order("o-1", OrderStatus::Confirmed)).await.unwrap();

        let skipped = store
            .update_order_status("o-1", OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert_eq!(
            store.get_order("o-1").await.unwrap().unwrap().status,
            OrderStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_admin_email_is_unique_case_insensitive() {
        let store = MemoryStore::new();
        let admin = AdminUser {
            admin_id: "a-1".to_string(),
            name: "Admin".to_string(),
            email: "admin@shop.com".to_string(),
            password_hash: "hash".to_string(),
            is_admin: true,
            created_at: Utc::now(),
        };
        store.insert_admin(&admin).await.unwrap();

        let duplicate = AdminUser {
            email: "ADMIN@shop.com".to_string(),
            ..admin
        };
        assert!(matches!(
            store.insert_admin(&duplicate).await,
            Err(ShopError::Conflict(_))
        ));
        assert!(store.get_admin_by_email("Admin@Shop.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_product_returns_none() {
        let store = MemoryStore::new();
        assert!(store.delete_product("nope").await.unwrap().is_none());
    }
}
