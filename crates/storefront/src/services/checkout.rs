//! Order pricing.
//!
//! The same pricing runs for the coupon preview and for checkout, so the
//! customer is charged exactly what the preview showed for an unchanged cart.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::coupon::check_minimum;
use storehouse_core::{Coupon, CouponError, CouponRule, Money, calculate_discount};

use crate::config::ShippingConfig;

/// Price breakdown of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Quote {
    /// Price a cart subtotal, optionally with a coupon rule.
    #[must_use]
    pub fn compute(subtotal: Money, shipping: &ShippingConfig, rule: Option<&CouponRule>) -> Self {
        let subtotal = subtotal.rounded();
        let shipping = shipping.cost_for(subtotal);
        let discount = rule.map_or(Money::ZERO, |r| calculate_discount(r, subtotal, shipping));
        let total = (subtotal + shipping - discount).non_negative().rounded();

        Self {
            subtotal,
            discount,
            shipping,
            total,
        }
    }

    /// Price a cart with a coupon the customer entered.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError`] if the coupon is not usable at `now` or the
    /// subtotal is below its minimum purchase.
    pub fn with_coupon(
        subtotal: Money,
        shipping: &ShippingConfig,
        coupon: &Coupon,
        now: DateTime<Utc>,
    ) -> Result<Self, CouponError> {
        coupon.window().check_eligibility(now)?;
        let rule = coupon.rule();
        check_minimum(&rule, subtotal.rounded())?;
        Ok(Self::compute(subtotal, shipping, Some(&rule)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use storehouse_core::{CouponId, CouponType};

    use super::*;

    fn shipping() -> ShippingConfig {
        ShippingConfig {
            flat_rate: Money::from_cents(500),
            free_threshold: Some(Money::from_cents(10_000)),
        }
    }

    fn coupon(coupon_type: CouponType, value: i64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_owned(),
            description: None,
            coupon_type,
            value: Decimal::from(value),
            min_purchase: None,
            max_discount: None,
            usage_limit: None,
            usage_count: 0,
            is_active: true,
            starts_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quote_without_coupon() {
        let quote = Quote::compute(Money::from_cents(4000), &shipping(), None);
        assert_eq!(quote.shipping, Money::from_cents(500));
        assert_eq!(quote.discount, Money::ZERO);
        assert_eq!(quote.total, Money::from_cents(4500));
    }

    #[test]
    fn test_free_shipping_threshold() {
        let quote = Quote::compute(Money::from_cents(10_000), &shipping(), None);
        assert_eq!(quote.shipping, Money::ZERO);
        assert_eq!(quote.total, Money::from_cents(10_000));
    }

    #[test]
    fn test_percentage_coupon() {
        let c = coupon(CouponType::Percentage, 10);
        let quote = Quote::with_coupon(Money::from_cents(4000), &shipping(), &c, Utc::now()).unwrap();
        assert_eq!(quote.discount, Money::from_cents(400));
        assert_eq!(quote.total, Money::from_cents(4100));
    }

    #[test]
    fn test_free_shipping_coupon_cancels_shipping() {
        let c = coupon(CouponType::FreeShipping, 0);
        let quote = Quote::with_coupon(Money::from_cents(4000), &shipping(), &c, Utc::now()).unwrap();
        assert_eq!(quote.discount, Money::from_cents(500));
        assert_eq!(quote.total, Money::from_cents(4000));
    }

    #[test]
    fn test_fixed_coupon_never_makes_total_negative() {
        let c = coupon(CouponType::FixedAmount, 50);
        let quote = Quote::with_coupon(Money::from_cents(1000), &shipping(), &c, Utc::now()).unwrap();
        assert_eq!(quote.discount, Money::from_cents(1000));
        assert_eq!(quote.total, Money::from_cents(500));
    }

    #[test]
    fn test_coupon_below_minimum_is_rejected() {
        let c = Coupon {
            min_purchase: Some(Money::from_cents(5000)),
            ..coupon(CouponType::FixedAmount, 10)
        };
        assert_eq!(
            Quote::with_coupon(Money::from_cents(4999), &shipping(), &c, Utc::now()),
            Err(CouponError::BelowMinimum {
                minimum: Money::from_cents(5000)
            })
        );
    }

    #[test]
    fn test_inactive_coupon_is_rejected() {
        let c = Coupon {
            is_active: false,
            ..coupon(CouponType::Percentage, 10)
        };
        assert_eq!(
            Quote::with_coupon(Money::from_cents(4000), &shipping(), &c, Utc::now()),
            Err(CouponError::Inactive)
        );
    }
}
