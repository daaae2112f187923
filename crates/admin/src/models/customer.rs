//! Customer views for user management.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::{CustomerId, CustomerRole, Email, Money};

use super::order::AdminOrderSummary;

/// A customer account as stored locally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub external_id: String,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub role: CustomerRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Whether this account may use the admin API.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == CustomerRole::Admin
    }
}

/// Row of the user list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    #[serde(flatten)]
    pub customer: Customer,
    pub order_count: i64,
}

/// A single customer with order statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub order_count: i64,
    /// Sum of totals over orders that were not cancelled.
    pub total_spent: Money,
    /// Five most recent orders, newest first.
    pub recent_orders: Vec<AdminOrderSummary>,
}
