//! Coupon discount calculation and eligibility.
//!
//! Discount math is kept apart from eligibility: [`calculate_discount`] is a
//! pure function of the coupon's rule and the cart figures, while
//! [`CouponWindow::check_eligibility`] decides whether the coupon may be used
//! at all right now. Checkout runs both, then consumes one use of the coupon
//! in the same database transaction that creates the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CouponId, CouponType, Money};

/// Reasons a coupon cannot be applied or created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// Coupon has been switched off by an admin.
    #[error("coupon is not active")]
    Inactive,
    /// Coupon's start date is in the future.
    #[error("coupon is not valid yet")]
    NotStarted,
    /// Coupon's expiry date has passed.
    #[error("coupon has expired")]
    Expired,
    /// Coupon has been redeemed `usage_limit` times.
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    /// Cart subtotal is below the coupon's minimum purchase.
    #[error("minimum purchase of {minimum} required")]
    BelowMinimum {
        /// Required subtotal.
        minimum: Money,
    },
    /// Coupon definition is inconsistent.
    #[error("invalid coupon: {0}")]
    InvalidRule(String),
}

/// The pricing part of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRule {
    /// How `value` is interpreted.
    pub coupon_type: CouponType,
    /// Percentage (0-100) or fixed amount; ignored for free shipping.
    pub value: Decimal,
    /// Subtotal the cart must reach before any discount applies.
    pub min_purchase: Option<Money>,
    /// Upper bound on the computed discount.
    pub max_discount: Option<Money>,
}

/// Compute the discount a coupon grants.
///
/// - Below `min_purchase` the discount is zero.
/// - Percentage coupons take `value` percent of the subtotal.
/// - Fixed-amount coupons take `value`, never more than the subtotal.
/// - Free-shipping coupons take the shipping amount.
///
/// The result is clamped to `max_discount` when set, is never negative, and
/// is rounded to cents.
///
/// ```
/// use rust_decimal::Decimal;
/// use storehouse_core::{CouponRule, CouponType, Money, calculate_discount};
///
/// let rule = CouponRule {
///     coupon_type: CouponType::Percentage,
///     value: Decimal::from(20),
///     min_purchase: None,
///     max_discount: Some(Money::from_cents(1500)),
/// };
/// // 20% of 100.00 is 20.00, clamped to 15.00
/// let discount = calculate_discount(&rule, Money::from_cents(10_000), Money::ZERO);
/// assert_eq!(discount, Money::from_cents(1500));
/// ```
#[must_use]
pub fn calculate_discount(rule: &CouponRule, subtotal: Money, shipping: Money) -> Money {
    if let Some(minimum) = rule.min_purchase
        && subtotal < minimum
    {
        return Money::ZERO;
    }

    let raw = match rule.coupon_type {
        CouponType::Percentage => {
            Money::new(subtotal.amount() * rule.value / Decimal::ONE_HUNDRED)
        }
        CouponType::FixedAmount => Money::new(rule.value).min(subtotal),
        CouponType::FreeShipping => shipping,
    };

    let capped = match rule.max_discount {
        Some(cap) => raw.min(cap),
        None => raw,
    };

    capped.non_negative().rounded()
}

/// Explain why a subtotal does not qualify, for customer-facing previews.
///
/// # Errors
///
/// Returns [`CouponError::BelowMinimum`] when the subtotal is under the
/// coupon's minimum purchase.
pub fn check_minimum(rule: &CouponRule, subtotal: Money) -> Result<(), CouponError> {
    match rule.min_purchase {
        Some(minimum) if subtotal < minimum => Err(CouponError::BelowMinimum { minimum }),
        _ => Ok(()),
    }
}

/// Validate a coupon definition before it is stored.
///
/// # Errors
///
/// Returns [`CouponError::InvalidRule`] if the value is out of range for the
/// coupon type or a bound is negative.
pub fn validate_rule(rule: &CouponRule) -> Result<(), CouponError> {
    match rule.coupon_type {
        CouponType::Percentage => {
            if rule.value <= Decimal::ZERO || rule.value > Decimal::ONE_HUNDRED {
                return Err(CouponError::InvalidRule(
                    "percentage must be greater than 0 and at most 100".to_owned(),
                ));
            }
        }
        CouponType::FixedAmount => {
            if rule.value <= Decimal::ZERO {
                return Err(CouponError::InvalidRule(
                    "fixed amount must be greater than 0".to_owned(),
                ));
            }
        }
        CouponType::FreeShipping => {}
    }

    if rule.min_purchase.is_some_and(|m| m < Money::ZERO) {
        return Err(CouponError::InvalidRule(
            "minimum purchase cannot be negative".to_owned(),
        ));
    }
    if rule.max_discount.is_some_and(|m| m <= Money::ZERO) {
        return Err(CouponError::InvalidRule(
            "maximum discount must be greater than 0".to_owned(),
        ));
    }

    Ok(())
}

/// The availability part of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponWindow {
    /// Admin on/off switch.
    pub is_active: bool,
    /// First instant the coupon may be used.
    pub starts_at: Option<DateTime<Utc>>,
    /// Instant after which the coupon may no longer be used.
    pub expires_at: Option<DateTime<Utc>>,
    /// Maximum redemptions, unlimited when `None`.
    pub usage_limit: Option<i32>,
    /// Redemptions so far.
    pub usage_count: i32,
}

impl CouponWindow {
    /// Check whether the coupon may be redeemed at `now`.
    ///
    /// This is advisory for previews; checkout re-checks the usage limit
    /// atomically when it increments `usage_count`.
    ///
    /// # Errors
    ///
    /// Returns the first failing condition as a [`CouponError`].
    pub fn check_eligibility(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Err(CouponError::NotStarted);
        }
        if self.expires_at.is_some_and(|end| now >= end) {
            return Err(CouponError::Expired);
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
        {
            return Err(CouponError::UsageLimitReached);
        }
        Ok(())
    }
}

/// A stored coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    /// Upper-case redemption code.
    pub code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub min_purchase: Option<Money>,
    pub max_discount: Option<Money>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Pricing part of the coupon.
    #[must_use]
    pub const fn rule(&self) -> CouponRule {
        CouponRule {
            coupon_type: self.coupon_type,
            value: self.value,
            min_purchase: self.min_purchase,
            max_discount: self.max_discount,
        }
    }

    /// Availability part of the coupon.
    #[must_use]
    pub const fn window(&self) -> CouponWindow {
        CouponWindow {
            is_active: self.is_active,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            usage_limit: self.usage_limit,
            usage_count: self.usage_count,
        }
    }
}

/// Normalize a customer-entered coupon code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
