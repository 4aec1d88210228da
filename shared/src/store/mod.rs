//! Storage collaborator.
//!
//! Services only talk to [`Store`]. Production runs on the DynamoDB
//! single-table backend; tests and local runs use the in-memory one.

pub mod dynamo;
pub mod memory;

use crate::error::ShopResult;
use crate::types::{AdminUser, CategoryCount, Order, OrderStatus, Product, Session};
use std::future::Future;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Product query: exact category and case-insensitive name substring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category {
            if &product.category != category {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !product
                .name
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    /// Insertion order.
    #[default]
    Oldest,
    Newest,
}

/// One page of products with the totals a listing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductListing {
    /// Products matching the filter, before paging.
    pub total: usize,
    pub products: Vec<Product>,
    /// Every category in the catalog, ignoring the filter.
    pub categories: Vec<CategoryCount>,
}

/// Builds a listing from the whole catalog, shared by both backends.
pub(crate) fn build_listing(
    mut catalog: Vec<Product>,
    filter: &ProductFilter,
    sort: ProductSort,
    skip: usize,
    limit: usize,
) -> ProductListing {
    catalog.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let categories = group_categories(&catalog);
    let matching: Vec<Product> = catalog.into_iter().filter(|p| filter.matches(p)).collect();
    ProductListing {
        total: matching.len(),
        products: sort_and_page(matching, sort, skip, limit),
        categories,
    }
}

fn sort_and_page(
    mut products: Vec<Product>,
    sort: ProductSort,
    skip: usize,
    limit: usize,
) -> Vec<Product> {
    match sort {
        ProductSort::Oldest => products.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        ProductSort::Newest => {
            products.reverse();
            products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
    }
    products.into_iter().skip(skip).take(limit).collect()
}

fn group_categories(products: &[Product]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for product in products {
        match counts.iter_mut().find(|c| c.category == product.category) {
            Some(entry) => entry.count += 1,
            None => counts.push(CategoryCount {
                category: product.category.clone(),
                count: 1,
            }),
        }
    }
    counts
}

/// Document store over products, orders, admins and sessions.
pub trait Store: Send + Sync {
    // --- PRODUCTS ---
    /// Filtered page, match count and catalog categories from a single read.
    fn list_products(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        skip: usize,
        limit: usize,
    ) -> impl Future<Output = ShopResult<ProductListing>> + Send;

    fn get_product(&self, product_id: &str)
        -> impl Future<Output = ShopResult<Option<Product>>> + Send;

    /// Insert or replace.
    fn put_product(&self, product: &Product) -> impl Future<Output = ShopResult<()>> + Send;

    /// Returns the removed product, `None` if there was nothing to remove.
    fn delete_product(
        &self,
        product_id: &str,
    ) -> impl Future<Output = ShopResult<Option<Product>>> + Send;

    // --- ORDERS ---
    fn insert_order(&self, order: &Order) -> impl Future<Output = ShopResult<()>> + Send;

    fn get_order(&self, order_id: &str) -> impl Future<Output = ShopResult<Option<Order>>> + Send;

    /// All orders, newest first.
    fn list_orders(&self) -> impl Future<Output = ShopResult<Vec<Order>>> + Send;

    /// Sets `next` only if the stored status is still `expected`.
    /// `None` means the order is gone or its status moved underneath us.
    fn update_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> impl Future<Output = ShopResult<Option<Order>>> + Send;

    // --- ADMINS ---
    fn get_admin_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = ShopResult<Option<AdminUser>>> + Send;

    /// Fails with `Conflict` when the email is already registered.
    fn insert_admin(&self, admin: &AdminUser) -> impl Future<Output = ShopResult<()>> + Send;

    // --- SESSIONS ---
    fn put_session(&self, session: &Session) -> impl Future<Output = ShopResult<()>> + Send;

    fn get_session(
        &self,
        token_digest: &str,
    ) -> impl Future<Output = ShopResult<Option<Session>>> + Send;

    fn delete_session(&self, token_digest: &str) -> impl Future<Output = ShopResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn product(name: &str, category: &str, age_minutes: i64) -> Product {
        Product {
            product_id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            price: 10.0,
            category: category.to_string(),
            image: String::new(),
            description: String::new(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let filter = ProductFilter {
            category: None,
            search: Some("blog".to_string()),
        };
        assert!(filter.matches(&product("Technical Blog", "Technical", 0)));
        assert!(!filter.matches(&product("White Paper", "Technical", 0)));
    }

    #[test]
    fn test_filter_category_is_exact() {
        let filter = ProductFilter {
            category: Some("Marketing".to_string()),
            search: None,
        };
        assert!(filter.matches(&product("SEO Article", "Marketing", 0)));
        assert!(!filter.matches(&product("SEO Article", "marketing", 0)));
    }

    #[test]
    fn test_sort_and_page_newest_first() {
        let products = vec![
            product("Old", "A", 30),
            product("Middle", "A", 20),
            product("New", "A", 10),
        ];
        let page = sort_and_page(products, ProductSort::Newest, 1, 5);
        let names: Vec<_> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Middle", "Old"]);
    }

    #[test]
    fn test_group_categories() {
        let products = vec![
            product("One", "Creative", 3),
            product("Two", "Marketing", 2),
            product("Three", "Creative", 1),
        ];
        let groups = group_categories(&products);
        assert_eq!(
            groups,
            vec![
                CategoryCount { category: "Creative".to_string(), count: 2 },
                CategoryCount { category: "Marketing".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_listing_counts_before_paging() {
        let catalog = vec![
            product("Short Story", "Creative", 30),
            product("SEO Article", "Marketing", 20),
            product("Social Post", "Marketing", 10),
        ];
        let filter = ProductFilter {
            category: Some("Marketing".to_string()),
            search: None,
        };
        let listing = build_listing(catalog, &filter, ProductSort::Oldest, 1, 5);

        assert_eq!(listing.total, 2);
        assert_eq!(listing.products.len(), 1);
        assert_eq!(listing.products[0].name, "Social Post");
        assert_eq!(listing.categories.len(), 2);
        assert_eq!(listing.categories[0].category, "Creative");
    }
}
