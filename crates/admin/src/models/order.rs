//! Order views for fulfilment.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::{CouponId, CustomerId, Email, Money, OrderId, OrderItemId, OrderStatus, VariantId};

/// Order row in admin lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderSummary {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub total: Money,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// The customer who placed an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Shipping address snapshot taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

/// A line of an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_label: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Full order for the detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: OrderId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    pub shipping_address: ShippingAddress,
    pub customer: CustomerRef,
    pub items: Vec<OrderItem>,
    /// Statuses the order may move to next.
    pub allowed_transitions: Vec<OrderStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Statuses reachable from `status` in one step.
#[must_use]
pub fn next_statuses(status: OrderStatus) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .into_iter()
        .filter(|next| status.can_transition_to(*next))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_statuses() {
        assert_eq!(
            next_statuses(OrderStatus::Pending),
            vec![OrderStatus::Processing, OrderStatus::Cancelled]
        );
        assert_eq!(next_statuses(OrderStatus::Shipped), vec![OrderStatus::Delivered]);
        assert!(next_statuses(OrderStatus::Cancelled).is_empty());
    }
}
