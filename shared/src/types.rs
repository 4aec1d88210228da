use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ========== PRODUCT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub image: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Body of admin create/update calls. Fields stay loose so that every
/// problem can be reported at once instead of failing on the first bad type.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: Option<String>,
    pub price: Option<serde_json::Value>,
    pub category: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: usize,
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_products: usize,
    pub categories: Vec<CategoryCount>,
    pub recent_products: Vec<Product>,
}

// ========== ORDER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(OrderStatus::Pending),
            "Confirmed" => Some(OrderStatus::Confirmed),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item snapshot taken at checkout. Later product edits do not touch it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    #[serde(default)]
    pub recalculated: bool,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Raw checkout body as posted by the storefront.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer_name: Option<serde_json::Value>,
    pub email: Option<serde_json::Value>,
    pub items: Option<serde_json::Value>,
    pub total_amount: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub total_revenue: f64,
}

// ========== ADMIN ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub admin_id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// What the session remembers about the signed-in admin.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdminIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&AdminUser> for AdminIdentity {
    fn from(user: &AdminUser) -> Self {
        Self {
            id: user.admin_id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

// ========== SESSION ==========
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Digest of the cookie token; the raw token is never stored.
    pub token_digest: String,
    pub admin: AdminIdentity,
    pub expires_at: DateTime<Utc>,
}
