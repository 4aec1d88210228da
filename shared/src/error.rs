use crate::types::OrderStatus;
use thiserror::Error;

/// Errors surfaced by the storefront services.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShopError {
    /// Every rule violation found in the payload, in evaluation order.
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Invalid request body: {0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    /// Backend failure. The detail is for logs, never for clients.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ShopError {
    pub fn storage(context: &str, err: impl std::fmt::Debug) -> Self {
        let detail = format!("{}: {:?}", context, err);
        tracing::error!("{}", detail);
        ShopError::Storage(detail)
    }
}

pub type ShopResult<T> = Result<T, ShopError>;
