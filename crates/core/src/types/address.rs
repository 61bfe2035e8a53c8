//! Postal address shared by checkout requests and commerce orders.

use serde::{Deserialize, Serialize};

use super::email::Email;

/// A billing or shipping address.
///
/// Every field defaults to empty so that an address recovered from
/// payment provider metadata degrades to `Address::default()` instead of
/// failing the whole order. Field names follow the commerce backend's
/// snake-case order schema; camelCase aliases accept storefront input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    pub company: String,
    #[serde(alias = "address1")]
    pub address_1: String,
    #[serde(alias = "address2")]
    pub address_2: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "postalCode", alias = "zip")]
    pub postcode: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_email")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
}

impl Address {
    /// Whether every field is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse an address from its serialized metadata form.
    ///
    /// Returns `None` on malformed input; callers decide whether that means
    /// "use an empty address" or "reject".
    #[must_use]
    pub fn from_metadata(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Serialize for carrying through payment provider metadata.
    #[must_use]
    pub fn to_metadata(&self) -> String {
        // Serializing a struct of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Replace the email on this address.
    #[must_use]
    pub fn with_email(mut self, email: Option<Email>) -> Self {
        self.email = email;
        self
    }
}

/// An invalid or blank email inside an address becomes `None`.
fn lenient_email<'de, D>(deserializer: D) -> Result<Option<Email>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(Email::parse_lenient(raw.as_deref()))
}
