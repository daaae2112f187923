//! Dashboard summary.

use std::collections::BTreeMap;

use serde::Serialize;

use storehouse_core::{Money, OrderStatus};

use super::order::AdminOrderSummary;

/// Store-wide figures for the dashboard landing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub customer_count: i64,
    pub product_count: i64,
    /// Every status is present, zero when no order has it.
    pub orders_by_status: BTreeMap<&'static str, i64>,
    /// Sum of totals over orders that were not cancelled.
    pub revenue: Money,
    pub recent_orders: Vec<AdminOrderSummary>,
}

/// Fill in missing statuses with zero counts.
#[must_use]
pub fn status_counts(rows: &[(OrderStatus, i64)]) -> BTreeMap<&'static str, i64> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| {
            let count = rows
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, n)| *n);
            (status.as_str(), count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_fill_missing() {
        let counts = status_counts(&[(OrderStatus::Pending, 3), (OrderStatus::Shipped, 1)]);
        assert_eq!(counts.len(), 5);
        assert_eq!(counts["pending"], 3);
        assert_eq!(counts["shipped"], 1);
        assert_eq!(counts["cancelled"], 0);
    }
}
