use crate::checkout::as_number;
use crate::error::{ShopError, ShopResult};
use crate::store::{ProductFilter, ProductSort, Store};
use crate::types::{CatalogStats, Product, ProductPage, ProductRequest};

pub const DEFAULT_IMAGE: &str = "/images/products/placeholder.png";
pub const MAX_PAGE_SIZE: u32 = 100;
const RECENT_PRODUCTS: usize = 5;

/// Listing parameters after defaults and clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub page: u32,
    pub limit: u32,
    pub sort: ProductSort,
}

impl ProductQuery {
    /// Builds a query from raw query-string values. Unparsable numbers fall
    /// back to the defaults; empty strings mean "no filter".
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
        category: Option<&str>,
        search: Option<&str>,
        default_limit: u32,
        sort: ProductSort,
    ) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = limit
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE);
        let non_empty = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            filter: ProductFilter {
                category: non_empty(category),
                search: non_empty(search),
            },
            page,
            limit,
            sort,
        }
    }
}

pub async fn list_products<S: Store>(store: &S, query: &ProductQuery) -> ShopResult<ProductPage> {
    let skip = (query.page as usize - 1) * query.limit as usize;
    let listing = store
        .list_products(&query.filter, query.sort, skip, query.limit as usize)
        .await?;

    Ok(ProductPage {
        products: listing.products,
        current_page: query.page,
        total_pages: listing.total.div_ceil(query.limit as usize) as u32,
        total: listing.total,
        categories: listing.categories.into_iter().map(|c| c.category).collect(),
    })
}

pub async fn get_product<S: Store>(store: &S, product_id: &str) -> ShopResult<Product> {
    store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ShopError::NotFound("Product".to_string()))
}

pub async fn create_product<S: Store>(store: &S, req: ProductRequest) -> ShopResult<Product> {
    let fields = validate_product(&req)?;
    let product = Product {
        product_id: uuid::Uuid::new_v4().to_string(),
        name: fields.name,
        price: fields.price,
        category: fields.category,
        image: fields.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        description: fields.description,
        created_at: chrono::Utc::now(),
    };
    store.put_product(&product).await?;
    tracing::info!("Product {} created: {}", product.product_id, product.name);
    Ok(product)
}

pub async fn update_product<S: Store>(
    store: &S,
    product_id: &str,
    req: ProductRequest,
) -> ShopResult<Product> {
    let fields = validate_product(&req)?;
    let existing = get_product(store, product_id).await?;
    let product = Product {
        name: fields.name,
        price: fields.price,
        category: fields.category,
        // Keep the old image unless a new one was sent
        image: fields.image.unwrap_or(existing.image),
        description: fields.description,
        ..existing
    };
    store.put_product(&product).await?;
    tracing::info!("Product {} updated", product_id);
    Ok(product)
}

pub async fn delete_product<S: Store>(store: &S, product_id: &str) -> ShopResult<Product> {
    let removed = store
        .delete_product(product_id)
        .await?
        .ok_or_else(|| ShopError::NotFound("Product".to_string()))?;
    tracing::info!("Product {} deleted", product_id);
    Ok(removed)
}

/// Dashboard numbers: catalog size, categories by size, latest additions.
pub async fn catalog_stats<S: Store>(store: &S) -> ShopResult<CatalogStats> {
    let listing = store
        .list_products(
            &ProductFilter::default(),
            ProductSort::Newest,
            0,
            RECENT_PRODUCTS,
        )
        .await?;
    let mut categories = listing.categories;
    categories.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(CatalogStats {
        total_products: listing.total,
        categories,
        recent_products: listing.products,
    })
}

struct ProductFields {
    name: String,
    price: f64,
    category: String,
    image: Option<String>,
    description: String,
}

fn validate_product(req: &ProductRequest) -> ShopResult<ProductFields> {
    let mut errors = Vec::new();
    let required = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let name = required(&req.name);
    if name.is_none() {
        errors.push("Product name is required".to_string());
    }

    let price = match &req.price {
        None | Some(serde_json::Value::Null) => {
            errors.push("Price is required".to_string());
            None
        }
        Some(raw) => {
            let price = as_number(raw).filter(|p| *p > 0.0);
            if price.is_none() {
                errors.push("Price must be a positive number".to_string());
            }
            price
        }
    };

    let category = required(&req.category);
    if category.is_none() {
        errors.push("Category is required".to_string());
    }

    let description = required(&req.description);
    if description.is_none() {
        errors.push("Description is required".to_string());
    }

    match (name, price, category, description) {
        (Some(name), Some(price), Some(category), Some(description)) if errors.is_empty() => {
            Ok(ProductFields {
                name,
                price,
                category,
                image: required(&req.image),
                description,
            })
        }
        _ => Err(ShopError::ValidationFailed(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn request(name: &str, price: serde_json::Value, category: &str) -> ProductRequest {
        ProductRequest {
            name: Some(name.to_string()),
            price: Some(price),
            category: Some(category.to_string()),
            image: None,
            description: Some("Words for hire".to_string()),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, price, category) in [
            ("Slogans & Phrases", 150, "Creative"),
            ("SEO Article", 200, "Marketing"),
            ("Short Story", 100, "Creative"),
            ("Technical Blog", 250, "Technical"),
            ("Social Media Post", 50, "Marketing"),
            ("Email Newsletter", 120, "Marketing"),
        ] {
            create_product(&store, request(name, json!(price), category))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_listing_filters_and_paginates() {
        let store = seeded().await;
        let query = ProductQuery::from_params(
            Some("2"),
            Some("2"),
            Some("Marketing"),
            None,
            6,
            ProductSort::Oldest,
        );
        let page = list_products(&store, &query).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].name, "Email Newsletter");
        assert_eq!(page.categories, vec!["Creative", "Marketing", "Technical"]);
    }

    #[tokio::test]
    async fn test_search_ignores_case() {
        let store = seeded().await;
        let query = ProductQuery::from_params(None, None, None, Some("STORY"), 6, ProductSort::Oldest);
        let page = list_products(&store, &query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.products[0].name, "Short Story");
    }

    #[test]
    fn test_query_defaults() {
        let query = ProductQuery::from_params(
            Some("zero"),
            Some("5000"),
            Some(" "),
            Some(""),
            10,
            ProductSort::Newest,
        );
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.filter, ProductFilter::default());
    }

    #[tokio::test]
    async fn test_validation_collects_all_errors() {
        let store = MemoryStore::new();
        let err = create_product(&store, ProductRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ShopError::ValidationFailed(vec![
                "Product name is required".to_string(),
                "Price is required".to_string(),
                "Category is required".to_string(),
                "Description is required".to_string(),
            ])
        );

        let err = create_product(&store, request("Ok", json!("abc"), "Creative"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ShopError::ValidationFailed(vec!["Price must be a positive number".to_string()])
        );
    }

    #[tokio::test]
    async fn test_update_keeps_image_and_accepts_string_price() {
        let store = MemoryStore::new();
        let mut req = request("White Paper", json!(500), "Technical");
        req.image = Some("/images/products/paper.png".to_string());
        let created = create_product(&store, req).await.unwrap();

        let updated = update_product(
            &store,
            &created.product_id,
            request("White Paper v2", json!("450.50"), "Technical"),
        )
        .await
        .unwrap();

        assert_eq!(updated.price, 450.5);
        assert_eq!(updated.image, "/images/products/paper.png");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let store = MemoryStore::new();
        assert_eq!(
            delete_product(&store, "nope").await,
            Err(ShopError::NotFound("Product".to_string()))
        );
    }

    #[tokio::test]
    async fn test_catalog_stats() {
        let store = seeded().await;
        let stats = catalog_stats(&store).await.unwrap();

        assert_eq!(stats.total_products, 6);
        assert_eq!(stats.categories[0].category, "Marketing");
        assert_eq!(stats.categories[0].count, 3);
        assert_eq!(stats.recent_products.len(), 5);
    }
}
