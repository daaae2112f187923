//! Cart domain types.

use serde::Serialize;

use storehouse_core::{CartId, CartItemId, Money, ProductId, VariantId};

/// One line of a cart, joined with its variant and product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image_url: Option<String>,
    pub sku: String,
    pub variant_label: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
    /// Stock currently available for the variant.
    pub inventory: i32,
    /// False once the product has been withdrawn from sale.
    pub available: bool,
}

/// A customer's cart with computed totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// `None` until the first item is added.
    pub id: Option<CartId>,
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Money,
}

impl Cart {
    /// Cart for a customer who never added anything.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            item_count: 0,
            subtotal: Money::ZERO,
        }
    }

    /// Build a cart from its lines, computing totals.
    #[must_use]
    pub fn from_lines(id: CartId, items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = items.iter().map(|l| l.line_total).sum::<Money>().rounded();
        Self {
            id: Some(id),
            items,
            item_count,
            subtotal,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First line whose product can no longer be bought.
    #[must_use]
    pub fn unavailable_line(&self) -> Option<&CartLine> {
        self.items.iter().find(|line| !line.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, price_cents: i64, quantity: i32) -> CartLine {
        let unit_price = Money::from_cents(price_cents);
        CartLine {
            id: CartItemId::new(id),
            variant_id: VariantId::new(id),
            product_id: ProductId::new(1),
            product_name: "Linen Shirt".to_owned(),
            product_slug: "linen-shirt".to_owned(),
            image_url: None,
            sku: format!("SKU-{id}"),
            variant_label: "M".to_owned(),
            unit_price,
            quantity,
            line_total: unit_price.times(quantity),
            inventory: 10,
            available: true,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_lines(CartId::new(1), vec![line(1, 1999, 2), line(2, 550, 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, Money::from_cents(4548));
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_unavailable_line() {
        let mut withdrawn = line(2, 550, 1);
        withdrawn.available = false;
        let cart = Cart::from_lines(CartId::new(1), vec![line(1, 1999, 1), withdrawn]);
        assert_eq!(cart.unavailable_line().map(|l| l.sku.as_str()), Some("SKU-2"));

        let cart = Cart::from_lines(CartId::new(1), vec![line(1, 1999, 1)]);
        assert!(cart.unavailable_line().is_none());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal, Money::ZERO);
        assert!(cart.id.is_none());
    }
}
