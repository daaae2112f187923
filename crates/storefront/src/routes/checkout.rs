//! Coupon preview and order placement.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storehouse_core::{AddressId, ApiResponse, Money, coupon::normalize_code};

use crate::db::{CartRepository, CheckoutError, CheckoutRequest, CouponRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Cart, Order};
use crate::services::checkout::Quote;
use crate::state::AppState;

/// Coupon preview request body.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
}

/// Price breakdown of the current cart with a coupon applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPreview {
    pub code: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub quote: Quote,
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub address_id: AddressId,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        Self {
            address_id: body.address_id,
            coupon_code: body
                .coupon_code
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty()),
        }
    }
}

/// Preview a coupon against the current cart. Nothing is redeemed.
///
/// `POST /api/coupons/validate`
#[instrument(skip(state, customer, body))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<Json<ApiResponse<CouponPreview>>> {
    let code = normalize_code(&body.code);
    if code.is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }

    let cart = CartRepository::new(state.pool()).get(customer.id).await?;
    let subtotal = purchasable_subtotal(&cart)?;

    let coupon = CouponRepository::new(state.pool())
        .get_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    let quote = Quote::with_coupon(subtotal, &state.config().shipping, &coupon, Utc::now())?;

    Ok(Json(ApiResponse::ok(CouponPreview {
        code: coupon.code,
        description: coupon.description,
        quote,
    })))
}

/// Subtotal of a cart checkout would accept, with the same refusals.
fn purchasable_subtotal(cart: &Cart) -> std::result::Result<Money, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if let Some(line) = cart.unavailable_line() {
        return Err(CheckoutError::Unavailable {
            name: line.product_name.clone(),
        });
    }
    Ok(cart.subtotal)
}

/// Place an order from the current cart.
///
/// `POST /api/checkout`
#[instrument(skip(state, customer, body), fields(address_id = %body.address_id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let request = CheckoutRequest::from(body);
    let order = OrderRepository::new(state.pool())
        .checkout(customer.id, &request, &state.config().shipping)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storehouse_core::{CartId, CartItemId, ProductId, VariantId};

    use axum::response::IntoResponse;

    use super::*;
    use crate::models::CartLine;

    fn line(available: bool) -> CartLine {
        CartLine {
            id: CartItemId::new(1),
            variant_id: VariantId::new(1),
            product_id: ProductId::new(1),
            product_name: "Linen Shirt".to_owned(),
            product_slug: "linen-shirt".to_owned(),
            image_url: None,
            sku: "LS-M".to_owned(),
            variant_label: "M".to_owned(),
            unit_price: Money::from_cents(2500),
            quantity: 2,
            line_total: Money::from_cents(5000),
            inventory: 10,
            available,
        }
    }

    #[test]
    fn test_preview_refuses_what_checkout_refuses() {
        assert!(matches!(
            purchasable_subtotal(&Cart::empty()),
            Err(CheckoutError::EmptyCart)
        ));

        let withdrawn = Cart::from_lines(CartId::new(1), vec![line(false)]);
        let err = purchasable_subtotal(&withdrawn).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable { ref name } if name == "Linen Shirt"));
        assert_eq!(
            AppError::from(err).into_response().status(),
            StatusCode::CONFLICT
        );

        let cart = Cart::from_lines(CartId::new(1), vec![line(true)]);
        assert_eq!(purchasable_subtotal(&cart).unwrap(), Money::from_cents(5000));
    }

    #[test]
    fn test_blank_coupon_code_is_dropped() {
        let body: CheckoutBody =
            serde_json::from_str(r#"{"addressId": 3, "couponCode": "   "}"#).unwrap();
        let request = CheckoutRequest::from(body);
        assert_eq!(request.address_id, AddressId::new(3));
        assert_eq!(request.coupon_code, None);
    }
}
