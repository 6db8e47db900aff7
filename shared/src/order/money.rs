//! Money calculation and order input validation using rust_decimal
//!
//! All sums are computed with `Decimal` internally and converted back to
//! `f64` for storage/serialization, so `0.1 + 0.2` style drift never leaks
//! into the total check.

use rust_decimal::prelude::*;

use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{NewOrder, OrderItem};

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed difference between a submitted total and Σ(price × qty)
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Maximum allowed unit price per item
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
pub const MAX_QUANTITY: u32 = 9999;
/// Maximum item name length
pub const MAX_NAME_LEN: usize = 200;
/// Maximum item note length
pub const MAX_NOTE_LEN: usize = 500;

/// Convert f64 to Decimal; non-finite values become zero
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64, rounded to cents
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Line total for one item
pub fn line_total(item: &OrderItem) -> Decimal {
    to_decimal(item.unit_price) * Decimal::from(item.quantity)
}

/// Σ(unit_price × quantity) over all items
pub fn items_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(line_total).sum()
}

/// Validate a single line item
pub fn validate_item(index: usize, item: &OrderItem) -> AppResult<()> {
    let invalid = |msg: String| {
        Err(AppError::with_message(ErrorCode::OrderInvalidItem, msg).with_detail("item", index))
    };

    if item.name.trim().is_empty() {
        return invalid("item name must not be empty".to_string());
    }
    if item.name.len() > MAX_NAME_LEN {
        return invalid(format!(
            "item name is too long ({} chars, max {MAX_NAME_LEN})",
            item.name.len()
        ));
    }
    if let Some(note) = &item.note
        && note.len() > MAX_NOTE_LEN
    {
        return invalid(format!(
            "item note is too long ({} chars, max {MAX_NOTE_LEN})",
            note.len()
        ));
    }
    if !item.unit_price.is_finite() || item.unit_price < 0.0 {
        return invalid(format!(
            "unit price must be a non-negative number, got {}",
            item.unit_price
        ));
    }
    if item.unit_price > MAX_PRICE {
        return invalid(format!(
            "unit price exceeds maximum allowed ({MAX_PRICE}), got {}",
            item.unit_price
        ));
    }
    if item.quantity == 0 || item.quantity > MAX_QUANTITY {
        return invalid(format!(
            "quantity must be between 1 and {MAX_QUANTITY}, got {}",
            item.quantity
        ));
    }
    Ok(())
}

/// Validate that `total` matches the items within [`TOTAL_TOLERANCE`]
pub fn validate_total(items: &[OrderItem], total: f64) -> AppResult<()> {
    if !total.is_finite() {
        return Err(AppError::with_message(
            ErrorCode::OrderTotalMismatch,
            format!("total must be a finite number, got {}", total),
        ));
    }
    let expected = items_total(items);
    let diff = (expected - to_decimal(total)).abs();
    if diff > TOTAL_TOLERANCE {
        return Err(AppError::with_message(
            ErrorCode::OrderTotalMismatch,
            format!("total {} does not match items sum {}", total, to_f64(expected)),
        )
        .with_detail("expected", to_f64(expected))
        .with_detail("submitted", total));
    }
    Ok(())
}

/// Full validation of a new order before it reaches the backend
pub fn validate_new_order(order: &NewOrder) -> AppResult<()> {
    if order.tenant_id.trim().is_empty() {
        return Err(AppError::new(ErrorCode::TenantNotSelected));
    }
    if order.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    for (index, item) in order.items.iter().enumerate() {
        validate_item(index, item)?;
    }
    validate_total(&order.items, order.total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit_price: f64, quantity: u32) -> OrderItem {
        OrderItem {
            name: name.to_string(),
            unit_price,
            quantity,
            note: None,
        }
    }

    fn new_order(items: Vec<OrderItem>, total: f64) -> NewOrder {
        NewOrder {
            tenant_id: "t1".to_string(),
            sub_scope: None,
            table_number: 5,
            items,
            total,
        }
    }

    #[test]
    fn test_items_total_is_exact() {
        let items = vec![item("Tea", 0.1, 1), item("Cake", 0.2, 1)];
        assert_eq!(items_total(&items), Decimal::new(3, 1));
        assert_eq!(to_f64(items_total(&items)), 0.3);
    }

    #[test]
    fn test_total_within_tolerance() {
        let items = vec![item("Burger", 12.5, 2), item("Fries", 3.99, 1)];
        assert!(validate_total(&items, 28.99).is_ok());
        assert!(validate_total(&items, 29.01).is_ok());
        assert!(validate_total(&items, 28.97).is_ok());
    }

    #[test]
    fn test_total_outside_tolerance_rejected() {
        let items = vec![item("Burger", 12.5, 2), item("Fries", 3.99, 1)];
        let err = validate_total(&items, 29.02).unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderTotalMismatch);
        assert!(validate_total(&items, 28.96).is_err());
        assert!(validate_total(&items, f64::NAN).is_err());
    }

    #[test]
    fn test_item_rules() {
        assert_eq!(
            validate_item(0, &item("", 1.0, 1)).unwrap_err().code,
            ErrorCode::OrderInvalidItem
        );
        assert!(validate_item(0, &item("Soup", -1.0, 1)).is_err());
        assert!(validate_item(0, &item("Soup", 1.0, 0)).is_err());
        assert!(validate_item(0, &item("Soup", f64::INFINITY, 1)).is_err());
        assert!(validate_item(0, &item("Soup", 0.0, 1)).is_ok());
    }

    #[test]
    fn test_validate_new_order() {
        assert_eq!(
            validate_new_order(&new_order(vec![], 0.0)).unwrap_err().code,
            ErrorCode::OrderEmpty
        );
        let mut order = new_order(vec![item("Soup", 4.5, 2)], 9.0);
        assert!(validate_new_order(&order).is_ok());
        order.tenant_id = " ".to_string();
        assert_eq!(
            validate_new_order(&order).unwrap_err().code,
            ErrorCode::TenantNotSelected
        );
    }
}
