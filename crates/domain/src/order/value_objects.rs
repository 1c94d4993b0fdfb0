//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::money::Money;
use crate::product::ProductId;

use super::{OrderError, PaymentStatus};

/// Who the order is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl CustomerDetails {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), OrderError> {
        if self.name.trim().is_empty() {
            return Err(OrderError::InvalidOrderDetails(
                "customer name is required".to_string(),
            ));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(OrderError::InvalidOrderDetails(format!(
                "invalid customer email: {email}"
            ))),
        }
    }
}

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    pub(crate) fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::InvalidOrderDetails(format!(
                    "shipping address {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_key: Option<String>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            variation_key: line.variation_key.clone(),
            product_name: line.product_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        }
    }
}

/// Outcome reported by the payment collaborator. Opaque beyond its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

impl PaymentResult {
    pub fn new(status: PaymentStatus) -> Self {
        Self {
            status,
            payment_id: None,
        }
    }

    pub fn paid(payment_id: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Paid,
            payment_id: Some(payment_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            line1: "12 MG Road".into(),
            line2: None,
            city: "Bengaluru".into(),
            state: "KA".into(),
            postal_code: "560001".into(),
            country: "IN".into(),
        }
    }

    #[test]
    fn test_customer_validation() {
        assert!(CustomerDetails::new("Asha", "asha@example.com").validate().is_ok());
        assert!(CustomerDetails::new("", "asha@example.com").validate().is_err());
        assert!(CustomerDetails::new("Asha", "asha.example.com").validate().is_err());
        assert!(CustomerDetails::new("Asha", "@example.com").validate().is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let mut missing_city = address();
        missing_city.city = " ".into();
        assert!(matches!(
            missing_city.validate(),
            Err(OrderError::InvalidOrderDetails(msg)) if msg.contains("city")
        ));
    }

    #[test]
    fn test_address_serialization() {
        let json = serde_json::to_value(address()).unwrap();
        assert_eq!(json["postalCode"], "560001");
        assert!(json.get("line2").is_none());
    }
}
