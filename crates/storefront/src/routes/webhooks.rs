//! Identity-provider webhook receiver.
//!
//! Keeps the local `customer` table in step with the provider's users.
//! Deliveries are retried by the provider on any non-2xx response, so
//! unhandled event types are acknowledged rather than rejected.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;
use tracing::{Span, info, instrument, warn};

use storehouse_core::ApiResponse;

use crate::db::{CustomerProfile, CustomerRepository};
use crate::error::Result;
use crate::services::webhook::{
    ID_HEADER, IdentityEvent, SIGNATURE_HEADER, SignatureHeaders, TIMESTAMP_HEADER, UserData,
    WebhookError,
};
use crate::state::AppState;

/// What the receiver did with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Created,
    Updated,
    Deleted,
    Ignored,
}

/// Webhook acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub action: WebhookAction,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> std::result::Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

/// Local profile for a provider user, or `None` if the user cannot be stored.
///
/// A redelivery would carry the same user, so such events are acknowledged
/// and skipped instead of failed.
fn usable_profile(user: &UserData) -> Option<CustomerProfile> {
    user.profile()
        .inspect_err(|e| warn!(external_id = %user.id, error = %e, "Skipping unusable user"))
        .ok()
}

/// `POST /api/webhooks/identity`
///
/// Any signature problem is a 400 and nothing is written.
#[instrument(
    skip_all,
    fields(message_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>> {
    let signature = SignatureHeaders {
        id: header(&headers, ID_HEADER)?,
        timestamp: header(&headers, TIMESTAMP_HEADER)?,
        signature: header(&headers, SIGNATURE_HEADER)?,
    };
    Span::current().record("message_id", signature.id);

    if let Err(e) = state.webhooks().verify(signature, &body) {
        warn!(error = %e, "Rejected webhook delivery");
        return Err(e.into());
    }

    let event = IdentityEvent::parse(&body)?;
    let customers = CustomerRepository::new(state.pool());

    let action = match event {
        IdentityEvent::UserCreated(user) => {
            Span::current().record("event_type", "user.created");
            match usable_profile(&user) {
                Some(profile) => {
                    let (customer, inserted) = customers.create_from_profile(&profile).await?;
                    info!(customer_id = %customer.id, inserted, "Customer provisioned");
                    if inserted {
                        WebhookAction::Created
                    } else {
                        WebhookAction::Updated
                    }
                }
                None => WebhookAction::Ignored,
            }
        }
        IdentityEvent::UserUpdated(user) => {
            Span::current().record("event_type", "user.updated");
            match usable_profile(&user) {
                // An update can arrive before the create it follows
                Some(profile) => {
                    if customers.update_profile(&profile).await?.is_some() {
                        WebhookAction::Updated
                    } else {
                        customers.create_from_profile(&profile).await?;
                        WebhookAction::Created
                    }
                }
                None => WebhookAction::Ignored,
            }
        }
        IdentityEvent::UserDeleted { id } => {
            Span::current().record("event_type", "user.deleted");
            let deleted = customers.delete_by_external_id(&id).await?;
            info!(external_id = %id, deleted, "Customer removed");
            if deleted {
                WebhookAction::Deleted
            } else {
                WebhookAction::Ignored
            }
        }
        IdentityEvent::Other(event_type) => {
            Span::current().record("event_type", event_type.as_str());
            WebhookAction::Ignored
        }
    };

    Ok(Json(ApiResponse::ok(WebhookAck { action })))
}
