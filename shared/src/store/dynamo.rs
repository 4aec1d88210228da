use super::{build_listing, ProductFilter, ProductListing, ProductSort, Store};
use crate::error::{ShopError, ShopResult};
use crate::types::{AdminIdentity, AdminUser, Order, OrderItem, OrderStatus, Product, Session};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

type Item = HashMap<String, AttributeValue>;

const METADATA: &str = "METADATA";

/// Single-table layout: `PK = <ENTITY>#<id>`, `SK = METADATA`, plus an
/// `entity` attribute so scans can pick one record type.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Every item of one entity type, following pagination.
    async fn scan_entity(&self, entity: &str) -> ShopResult<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#entity = :entity")
                .expression_attribute_names("#entity", "entity")
                .expression_attribute_values(":entity", s(entity))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| ShopError::storage(&format!("Scan {} failed", entity), e))?;

            items.extend(resp.items().iter().cloned());

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn all_products(&self) -> ShopResult<Vec<Product>> {
        Ok(self
            .scan_entity("PRODUCT")
            .await?
            .iter()
            .filter_map(product_from_item)
            .collect())
    }

    async fn get_item(&self, pk: String) -> ShopResult<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(METADATA))
            .send()
            .await
            .map_err(|e| ShopError::storage(&format!("GetItem {} failed", pk), e))?;
        Ok(result.item().cloned())
    }
}

impl Store for DynamoStore {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        skip: usize,
        limit: usize,
    ) -> ShopResult<ProductListing> {
        // One scan per listing. `contains` is case-sensitive, so filtering
        // runs here rather than in a filter expression.
        let catalog = self.all_products().await?;
        Ok(build_listing(catalog, filter, sort, skip, limit))
    }

    async fn get_product(&self, product_id: &str) -> ShopResult<Option<Product>> {
        Ok(self
            .get_item(format!("PRODUCT#{}", product_id))
            .await?
            .as_ref()
            .and_then(product_from_item))
    }

    async fn put_product(&self, product: &Product) -> ShopResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(product_to_item(product)))
            .send()
            .await
            .map_err(|e| ShopError::storage("PutItem product failed", e))?;
        Ok(())
    }

    async fn delete_product(&self, product_id: &str) -> ShopResult<Option<Product>> {
        let out = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", s(format!("PRODUCT#{}", product_id)))
            .key("SK", s(METADATA))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| ShopError::storage("DeleteItem product failed", e))?;
        Ok(out.attributes().and_then(product_from_item))
    }

    async fn insert_order(&self, order: &Order) -> ShopResult<()> {
        let item = order_to_item(order)?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| ShopError::storage("PutItem order failed", e))?;
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> ShopResult<Option<Order>> {
        Ok(self
            .get_item(format!("ORDER#{}", order_id))
            .await?
            .as_ref()
            .and_then(order_from_item))
    }

    async fn list_orders(&self) -> ShopResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan_entity("ORDER")
            .await?
            .iter()
            .filter_map(order_from_item)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> ShopResult<Option<Order>> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", s(format!("ORDER#{}", order_id)))
            .key("SK", s(METADATA))
            .update_expression("SET #status = :next")
            .condition_expression("attribute_exists(PK) AND #status = :expected")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":next", s(next.as_str()))
            .expression_attribute_values(":expected", s(expected.as_str()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(out) => updated_order(order_id, out.attributes()).map(Some),
            Err(e) => {
                let lost_race = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if lost_race {
                    tracing::warn!(
                        "Order {} was not {} at update time, skipping",
                        order_id,
                        expected
                    );
                    Ok(None)
                } else {
                    Err(ShopError::storage("UpdateItem order status failed", e))
                }
            }
        }
    }

    async fn get_admin_by_email(&self, email: &str) -> ShopResult<Option<AdminUser>> {
        Ok(self
            .get_item(format!("ADMIN#{}", email.to_lowercase()))
            .await?
            .as_ref()
            .and_then(admin_from_item))
    }

    async fn insert_admin(&self, admin: &AdminUser) -> ShopResult<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", s(format!("ADMIN#{}", admin.email.to_lowercase())))
            .item("SK", s(METADATA))
            .item("entity", s("ADMIN"))
            .item("admin_id", s(admin.admin_id.clone()))
            .item("name", s(admin.name.clone()))
            .item("email", s(admin.email.clone()))
            .item("password_hash", s(admin.password_hash.clone()))
            .item("is_admin", AttributeValue::Bool(admin.is_admin))
            .item("created_at", s(admin.created_at.to_rfc3339()))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let exists = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if exists {
                    Err(ShopError::Conflict("Email already registered".to_string()))
                } else {
                    Err(ShopError::storage("PutItem admin failed", e))
                }
            }
        }
    }

    async fn put_session(&self, session: &Session) -> ShopResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", s(format!("SESSION#{}", session.token_digest)))
            .item("SK", s(METADATA))
            .item("entity", s("SESSION"))
            .item("admin_id", s(session.admin.id.clone()))
            .item("name", s(session.admin.name.clone()))
            .item("email", s(session.admin.email.clone()))
            // Also the table's TTL attribute
            .item("expires_at", n(session.expires_at.timestamp()))
            .send()
            .await
            .map_err(|e| ShopError::storage("PutItem session failed", e))?;
        Ok(())
    }

    async fn get_session(&self, token_digest: &str) -> ShopResult<Option<Session>> {
        let item = self.get_item(format!("SESSION#{}", token_digest)).await?;
        Ok(item.and_then(|item| {
            Some(Session {
                token_digest: token_digest.to_string(),
                admin: AdminIdentity {
                    id: get_s(&item, "admin_id")?,
                    name: get_s(&item, "name")?,
                    email: get_s(&item, "email")?,
                },
                expires_at: Utc.timestamp_opt(get_n(&item, "expires_at")?, 0).single()?,
            })
        }))
    }

    async fn delete_session(&self, token_digest: &str) -> ShopResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", s(format!("SESSION#{}", token_digest)))
            .key("SK", s(METADATA))
            .send()
            .await
            .map_err(|e| ShopError::storage("DeleteItem session failed", e))?;
        Ok(())
    }
}

// ========== ITEM MAPPING ==========

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn get_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn get_n<T: std::str::FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<T>().ok())
}

fn get_time(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    get_s(item, key)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn id_from_pk(item: &Item, prefix: &str) -> Option<String> {
    get_s(item, "PK").and_then(|pk| pk.strip_prefix(prefix).map(|id| id.to_string()))
}

fn product_to_item(product: &Product) -> Item {
    HashMap::from([
        ("PK".to_string(), s(format!("PRODUCT#{}", product.product_id))),
        ("SK".to_string(), s(METADATA)),
        ("entity".to_string(), s("PRODUCT")),
        ("name".to_string(), s(product.name.clone())),
        ("price".to_string(), n(product.price)),
        ("category".to_string(), s(product.category.clone())),
        ("image".to_string(), s(product.image.clone())),
        ("description".to_string(), s(product.description.clone())),
        ("created_at".to_string(), s(product.created_at.to_rfc3339())),
    ])
}

fn product_from_item(item: &Item) -> Option<Product> {
    let product = (|| {
        Some(Product {
            product_id: id_from_pk(item, "PRODUCT#")?,
            name: get_s(item, "name")?,
            price: get_n(item, "price")?,
            category: get_s(item, "category").unwrap_or_default(),
            image: get_s(item, "image").unwrap_or_default(),
            description: get_s(item, "description").unwrap_or_default(),
            created_at: get_time(item, "created_at")?,
        })
    })();
    if product.is_none() {
        tracing::warn!("Skipping malformed product item: {:?}", item.get("PK"));
    }
    product
}

fn order_to_item(order: &Order) -> ShopResult<Item> {
    let items = serde_json::to_string(&order.items)
        .map_err(|e| ShopError::storage("Serialize order items failed", e))?;
    Ok(HashMap::from([
        ("PK".to_string(), s(format!("ORDER#{}", order.order_id))),
        ("SK".to_string(), s(METADATA)),
        ("entity".to_string(), s("ORDER")),
        ("customer_name".to_string(), s(order.customer_name.clone())),
        ("email".to_string(), s(order.email.clone())),
        ("items".to_string(), s(items)),
        ("total_amount".to_string(), n(order.total_amount)),
        ("recalculated".to_string(), AttributeValue::Bool(order.recalculated)),
        ("status".to_string(), s(order.status.as_str())),
        ("created_at".to_string(), s(order.created_at.to_rfc3339())),
    ]))
}

fn order_from_item(item: &Item) -> Option<Order> {
    let items: Vec<OrderItem> = get_s(item, "items")
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();
    Some(Order {
        order_id: id_from_pk(item, "ORDER#")?,
        customer_name: get_s(item, "customer_name")?,
        email: get_s(item, "email")?,
        items,
        total_amount: get_n(item, "total_amount")?,
        recalculated: item
            .get("recalculated")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        status: get_s(item, "status").and_then(|raw| OrderStatus::parse(&raw))?,
        created_at: get_time(item, "created_at")?,
    })
}

/// The write went through, so an unreadable result is a storage fault and
/// not a lost race.
fn updated_order(order_id: &str, attributes: Option<&Item>) -> ShopResult<Order> {
    attributes.and_then(order_from_item).ok_or_else(|| {
        ShopError::storage(
            "UpdateItem order status returned an unreadable item",
            order_id,
        )
    })
}

fn admin_from_item(item: &Item) -> Option<AdminUser> {
    Some(AdminUser {
        admin_id: get_s(item, "admin_id")?,
        name: get_s(item, "name").unwrap_or_default(),
        email: get_s(item, "email")?,
        password_hash: get_s(item, "password_hash")?,
        is_admin: item
            .get("is_admin")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        created_at: get_time(item, "created_at").unwrap_or_else(Utc::now),
    })
}
