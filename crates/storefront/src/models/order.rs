//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::{CouponId, CustomerId, Money, OrderId, OrderItemId, OrderStatus, VariantId};

use super::customer::Address;

/// Address copied onto an order at checkout.
///
/// Later edits to the customer's saved addresses do not change it.
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

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        }
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the variant has been deleted from the catalog.
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_label: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// A placed order with its lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
    pub coupon_id: Option<CouponId>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order as shown in the order history list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Money,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}
