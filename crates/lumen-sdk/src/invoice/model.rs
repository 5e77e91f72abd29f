//! Invoice records as stored in the `invoices` table

use crate::derive::LineItem;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether tax applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    /// Tax invoice; the tax rate applies
    #[default]
    Gst,
    /// Bill of supply; no tax
    NonGst,
}

impl InvoiceType {
    pub fn is_taxable(&self) -> bool {
        matches!(self, InvoiceType::Gst)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Gst => "gst",
            InvoiceType::NonGst => "non_gst",
        }
    }
}

/// Name and contact block for the client or the studio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Tax registration number
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub estimate_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub client: PartyDetails,
    #[serde(default)]
    pub company: PartyDetails,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Percentage as typed, e.g. `"18"`
    #[serde(default)]
    pub tax_rate: String,
    #[serde(default)]
    pub invoice_type: InvoiceType,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub paid: Decimal,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub payments: Vec<Payment>,
    /// Stored status string; the form derives its own from the amounts
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Number of saves so far; zero for an invoice never saved
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Empty draft with the given tax rate
    pub fn draft(tax_rate: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            invoice_number: None,
            estimate_id: None,
            user_id: None,
            client: PartyDetails::default(),
            company: PartyDetails::default(),
            items: Vec::new(),
            tax_rate: tax_rate.into(),
            invoice_type: InvoiceType::default(),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            paid: Decimal::ZERO,
            balance: Decimal::ZERO,
            payments: Vec::new(),
            status: None,
            issue_date: None,
            due_date: None,
            version: 0,
            updated_at: None,
        }
    }
}

/// Snapshot written to `invoice_versions` before a save overwrites it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceVersion {
    pub invoice_id: Uuid,
    pub version: u32,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
