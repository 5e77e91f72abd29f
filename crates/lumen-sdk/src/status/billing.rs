//! Estimate and invoice status vocabularies

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Estimate negotiation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Pending,
    Negotiating,
    Approved,
    Declined,
}

impl EstimateStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "negotiating" => Some(Self::Negotiating),
            "approved" => Some(Self::Approved),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

impl Default for EstimateStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
}

impl InvoiceStatus {
    /// Status implied by how much of the total has been paid
    pub fn from_amounts(total: Decimal, paid: Decimal) -> Self {
        if paid <= Decimal::ZERO {
            Self::Pending
        } else if total > Decimal::ZERO && paid >= total {
            Self::Paid
        } else {
            Self::Partial
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "unpaid" => Some(Self::Pending),
            "partial" | "partially_paid" => Some(Self::Partial),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Paid => "paid",
        }
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
