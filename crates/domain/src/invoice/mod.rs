//! Purchase invoices numbered per financial year.

mod sequencer;

pub use sequencer::{InvoiceSequencer, MAX_NUMBERING_ATTEMPTS};

use chrono::{Datelike, NaiveDate};
use doc_store::Document;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::money::{Money, Percentage};
use crate::pricing;

/// Errors that can occur during invoice operations.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("Invalid financial year: {0} (expected YYYY-YYYY with consecutive years)")]
    InvalidFinancialYear(String),

    #[error("Duplicate invoice number: {0}")]
    DuplicateInvoiceNumber(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invalid invoice: {0}")]
    InvalidInvoice(String),
}

impl InvoiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoiceError::InvalidFinancialYear(_) | InvoiceError::InvalidInvoice(_) => {
                ErrorKind::Validation
            }
            InvoiceError::DuplicateInvoiceNumber(_) => ErrorKind::Conflict,
            InvoiceError::InvoiceNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// An April-to-March accounting year, written `"2024-2025"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FinancialYear(i32);

impl FinancialYear {
    /// The year starting in April of `start_year`.
    pub fn starting(start_year: i32) -> Self {
        Self(start_year)
    }

    /// The financial year a date falls in.
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= 4 {
            Self(date.year())
        } else {
            Self(date.year() - 1)
        }
    }

    pub fn start_year(&self) -> i32 {
        self.0
    }

    /// Last two digits of the starting year, as used in invoice numbers.
    pub fn short_code(&self) -> String {
        format!("{:02}", self.0.rem_euclid(100))
    }

    /// Name of the store counter that numbers this year's invoices.
    pub fn counter_name(&self) -> String {
        format!("invoice:{self}")
    }
}

impl std::fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.0 + 1)
    }
}

impl std::str::FromStr for FinancialYear {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvoiceError::InvalidFinancialYear(s.to_string());

        let (first, second) = s.trim().split_once('-').ok_or_else(invalid)?;
        if first.len() != 4 || second.len() != 4 {
            return Err(invalid());
        }
        let first: i32 = first.parse().map_err(|_| invalid())?;
        let second: i32 = second.parse().map_err(|_| invalid())?;

        if second != first + 1 {
            return Err(invalid());
        }
        Ok(Self(first))
    }
}

impl Serialize for FinancialYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FinancialYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A recorded purchase invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(rename = "wholesalerId", alias = "wholesalerRef")]
    pub wholesaler_ref: String,
    pub purchase_date: NaiveDate,
    pub gross_amount: Money,
    pub gst_percentage: Percentage,
    pub gst_amount: Money,
    pub other_cost: Money,
    pub discount: Money,
    pub total_amount: Money,
    pub financial_year: FinancialYear,
}

impl Document for Invoice {
    const COLLECTION: &'static str = "invoices";

    fn partition(&self) -> Option<String> {
        Some(self.financial_year.to_string())
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.invoice_number.clone())
    }
}

/// Input for recording an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Caller-chosen number; ignored when `auto_generate` is set.
    pub invoice_number: Option<String>,
    pub wholesaler_ref: String,
    pub purchase_date: NaiveDate,
    pub gross_amount: Money,
    pub gst_percentage: Percentage,
    pub other_cost: Money,
    pub discount: Money,
    /// Defaults to the year containing `purchase_date`.
    pub financial_year: Option<FinancialYear>,
    pub auto_generate: bool,
}

impl NewInvoice {
    pub fn financial_year(&self) -> FinancialYear {
        self.financial_year
            .unwrap_or_else(|| FinancialYear::containing(self.purchase_date))
    }

    /// Checks the amounts and computes the stored invoice under `number`.
    pub(crate) fn price(&self, number: String) -> Result<Invoice, InvoiceError> {
        if self.wholesaler_ref.trim().is_empty() {
            return Err(InvoiceError::InvalidInvoice(
                "wholesaler is required".to_string(),
            ));
        }
        let amounts = [
            ("grossAmount", self.gross_amount),
            ("otherCost", self.other_cost),
            ("discount", self.discount),
        ];
        for (field, amount) in amounts {
            if amount.is_negative() {
                return Err(InvoiceError::InvalidInvoice(format!(
                    "{field} must not be negative"
                )));
            }
        }
        if self.gst_percentage.bps() < 0 || self.gst_percentage > Percentage::full() {
            return Err(InvoiceError::InvalidInvoice(
                "gstPercentage must be between 0 and 100".to_string(),
            ));
        }

        let total_amount = pricing::invoice_total(
            self.gross_amount,
            self.gst_percentage,
            self.other_cost,
            self.discount,
        );
        if total_amount.is_negative() {
            return Err(InvoiceError::InvalidInvoice(format!(
                "discount exceeds the invoice amount (total would be {total_amount})"
            )));
        }

        Ok(Invoice {
            invoice_number: number,
            wholesaler_ref: self.wholesaler_ref.trim().to_string(),
            purchase_date: self.purchase_date,
            gross_amount: self.gross_amount,
            gst_percentage: self.gst_percentage,
            gst_amount: pricing::gst_amount(self.gross_amount, self.gst_percentage),
            other_cost: self.other_cost,
            discount: self.discount,
            total_amount,
            financial_year: self.financial_year(),
        })
    }
}
