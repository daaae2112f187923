//! Customer and address domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storehouse_core::{AddressId, CustomerId, CustomerRole, Email};

/// A customer account, mirrored from the identity provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    /// Identity-provider user ID (the session token's `sub`).
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
    /// Full name when known, otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.to_string()
        } else {
            name
        }
    }
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields submitted by the customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Trim fields and reject blank required ones.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn normalized(mut self) -> Result<Self, String> {
        for (name, value) in [
            ("fullName", &mut self.full_name),
            ("line1", &mut self.line1),
            ("city", &mut self.city),
            ("state", &mut self.state),
            ("postalCode", &mut self.postal_code),
            ("country", &mut self.country),
        ] {
            *value = value.trim().to_owned();
            if value.is_empty() {
                return Err(format!("{name} is required"));
            }
        }
        self.line2 = self
            .line2
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        self.phone = self
            .phone
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        Ok(self)
    }
}
