//! Checkout payload validation.
//!
//! The client-submitted total is advisory. The authoritative amount is
//! always `Σ price × quantity + SHIPPING_FEE`; a submitted total that is off
//! by more than a cent is silently replaced and the order is flagged.

use crate::error::{ShopError, ShopResult};
use crate::types::{CheckoutRequest, OrderItem};
use serde_json::Value;

pub const SHIPPING_FEE: f64 = 15.00;
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// A checkout payload that passed every rule, ready to become an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCheckout {
    pub customer_name: String,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub recalculated: bool,
}

/// Fails fast before any deeper validation work.
pub fn ensure_cart_not_empty(req: &CheckoutRequest) -> ShopResult<()> {
    match req.items.as_ref().and_then(Value::as_array) {
        Some(items) if !items.is_empty() => Ok(()),
        _ => Err(ShopError::EmptyCart),
    }
}

/// Checks every rule and collects all violations in evaluation order.
pub fn validate_checkout(req: &CheckoutRequest) -> ShopResult<ValidatedCheckout> {
    let mut errors = Vec::new();

    let customer_name = req
        .customer_name
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if customer_name.chars().count() < 2 {
        errors.push("Customer name must be at least 2 characters".to_string());
    }

    let email = req
        .email
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !is_valid_email(email) {
        errors.push("Please provide a valid email address".to_string());
    }

    let mut items = Vec::new();
    match req.items.as_ref().and_then(Value::as_array) {
        Some(raw_items) if !raw_items.is_empty() => {
            for (index, raw) in raw_items.iter().enumerate() {
                if let Some(item) = parse_item(index + 1, raw, &mut errors) {
                    items.push(item);
                }
            }
        }
        _ => errors.push("Cart is empty".to_string()),
    }

    let submitted_total = req.total_amount.as_ref().and_then(as_number);
    let submitted_total = match submitted_total {
        Some(total) if total > 0.0 => total,
        _ => {
            errors.push("Invalid total amount".to_string());
            0.0
        }
    };

    if !errors.is_empty() {
        return Err(ShopError::ValidationFailed(errors));
    }

    let expected = expected_total(&items);
    if !expected.is_finite() {
        tracing::warn!("Checkout rejected: item total overflows");
        return Err(ShopError::ValidationFailed(vec![
            "Invalid total amount".to_string(),
        ]));
    }
    let recalculated = (expected - submitted_total).abs() > TOTAL_TOLERANCE;
    if recalculated {
        tracing::info!(
            "Checkout total recalculated: submitted {:.2}, expected {:.2}",
            submitted_total,
            expected
        );
    }

    Ok(ValidatedCheckout {
        customer_name: customer_name.to_string(),
        email: email.trim().to_lowercase(),
        items,
        total_amount: if recalculated { expected } else { submitted_total },
        recalculated,
    })
}

/// Item subtotal plus shipping, rounded to cents.
pub fn expected_total(items: &[OrderItem]) -> f64 {
    let subtotal: f64 = items
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum();
    round_cents(subtotal + SHIPPING_FEE)
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the
/// domain with something on both sides of it.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Numbers, or strings holding a number (form posts send those).
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_item(position: usize, raw: &Value, errors: &mut Vec<String>) -> Option<OrderItem> {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if name.is_none() {
        errors.push(format!("Item {}: Name is required", position));
    }

    let price = raw.get("price").and_then(as_number).filter(|p| *p > 0.0);
    if price.is_none() {
        errors.push(format!("Item {}: Invalid price", position));
    }

    let quantity = raw
        .get("quantity")
        .and_then(as_number)
        .filter(|q| *q >= 1.0 && q.fract() == 0.0 && *q <= f64::from(u32::MAX))
        .map(|q| q as u32);
    if quantity.is_none() {
        errors.push(format!("Item {}: Invalid quantity", position));
    }

    let product_id = raw
        .get("productId")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(OrderItem {
        product_id,
        name: name?.to_string(),
        price: price?,
        quantity: quantity?,
    })
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> CheckoutRequest {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body(total: f64) -> Value {
        json!({
            "customerName": "Ada Lovelace",
            "email": "Ada@Example.com",
            "items": [{ "productId": "p-1", "name": "SEO Article", "price": 10, "quantity": 2 }],
            "totalAmount": total
        })
    }

    #[test]
    fn test_valid_payload_has_no_errors() {
        let validated = validate_checkout(&request(valid_body(35.0))).unwrap();
        assert_eq!(validated.customer_name, "Ada Lovelace");
        assert_eq!(validated.email, "ada@example.com");
        assert_eq!(validated.items.len(), 1);
        assert_eq!(validated.items[0].product_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_matching_total_is_not_recalculated() {
        let validated = validate_checkout(&request(valid_body(35.0))).unwrap();
        assert_eq!(validated.total_amount, 35.0);
        assert!(!validated.recalculated);

        // Within a cent counts as matching
        let validated = validate_checkout(&request(valid_body(35.005))).unwrap();
        assert!(!validated.recalculated);
    }

    #[test]
    fn test_tampered_total_is_recalculated() {
        let validated = validate_checkout(&request(valid_body(100.0))).unwrap();
        assert_eq!(validated.total_amount, 35.0);
        assert!(validated.recalculated);
    }

    #[test]
    fn test_empty_cart_gate() {
        assert_eq!(
            ensure_cart_not_empty(&request(json!({ "items": [] }))),
            Err(ShopError::EmptyCart)
        );
        assert_eq!(
            ensure_cart_not_empty(&request(json!({}))),
            Err(ShopError::EmptyCart)
        );
        assert_eq!(
            ensure_cart_not_empty(&request(json!({ "items": "not a list" }))),
            Err(ShopError::EmptyCart)
        );
        assert!(ensure_cart_not_empty(&request(valid_body(35.0))).is_ok());
    }

    #[test]
    fn test_all_errors_are_collected_in_order() {
        let body = json!({
            "customerName": " A ",
            "email": "not-an-email",
            "items": [
                { "name": "Ok", "price": 5, "quantity": 1 },
                { "name": "", "price": 0, "quantity": 0 }
            ],
            "totalAmount": -1
        });
        let err = validate_checkout(&request(body)).unwrap_err();
        assert_eq!(
            err,
            ShopError::ValidationFailed(vec![
                "Customer name must be at least 2 characters".to_string(),
                "Please provide a valid email address".to_string(),
                "Item 2: Name is required".to_string(),
                "Item 2: Invalid price".to_string(),
                "Item 2: Invalid quantity".to_string(),
                "Invalid total amount".to_string(),
            ])
        );
    }

    #[test]
    fn test_fractional_quantity_is_rejected() {
        let mut body = valid_body(35.0);
        body["items"][0]["quantity"] = json!(1.5);
        let err = validate_checkout(&request(body)).unwrap_err();
        assert_eq!(
            err,
            ShopError::ValidationFailed(vec!["Item 1: Invalid quantity".to_string()])
        );
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@com."));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@@b.com"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_expected_total_adds_shipping() {
        let items = vec![
            OrderItem { product_id: None, name: "A".into(), price: 0.1, quantity: 3 },
            OrderItem { product_id: None, name: "B".into(), price: 19.99, quantity: 1 },
        ];
        assert_eq!(expected_total(&items), 35.29);
    }

    #[test]
    fn test_overflowing_item_total_is_rejected() {
        let mut body = valid_body(35.0);
        body["items"][0]["price"] = json!(1e308);
        let err = validate_checkout(&request(body)).unwrap_err();
        assert_eq!(
            err,
            ShopError::ValidationFailed(vec!["Invalid total amount".to_string()])
        );
    }
}
