//! Estimates, pricing and status-change requests

use crate::derive::{parse_amount, parse_amount_strict, round_money, subtotal, LineItem};
use crate::status::EstimateStatus;
use crate::validation::FieldErrors;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A priced package offered on an estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Currency-formatted price
    pub price: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Package {
    pub fn value(&self) -> Decimal {
        parse_amount(&self.price)
    }
}

/// How an estimate is priced. The amount comes from exactly one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pricing {
    /// One of several packages is selected
    Package { packages: Vec<Package>, selected: usize },
    /// Sum of itemized lines
    Items(Vec<LineItem>),
}

impl Pricing {
    pub fn amount(&self) -> Decimal {
        match self {
            Pricing::Package { packages, selected } => packages
                .get(*selected)
                .map(Package::value)
                .unwrap_or(Decimal::ZERO),
            Pricing::Items(items) => round_money(subtotal(items)),
        }
    }

    pub fn validate(&self, errors: &mut FieldErrors) {
        match self {
            Pricing::Package { packages, selected } => {
                if *selected >= packages.len() {
                    errors.push("selected_package", "no such package");
                }
                for (i, package) in packages.iter().enumerate() {
                    if package.name.trim().is_empty() {
                        errors.push(format!("packages[{}].name", i), "name is required");
                    }
                    errors.check_amount(format!("packages[{}].price", i), &package.price);
                }
            }
            Pricing::Items(items) => {
                if items.is_empty() {
                    errors.push("items", "add at least one item");
                }
                for (i, item) in items.iter().enumerate() {
                    errors.check_amount(format!("items[{}].amount", i), &item.amount);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub id: Uuid,
    pub client: ClientContact,
    pub pricing: Pricing,
    pub status: EstimateStatus,
    pub project_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Estimate {
    pub fn amount(&self) -> Decimal {
        self.pricing.amount()
    }

    /// Price of package `index`, if the estimate is package-priced
    pub fn package_amount(&self, index: usize) -> Option<Decimal> {
        match &self.pricing {
            Pricing::Package { packages, .. } => packages.get(index).map(Package::value),
            Pricing::Items(_) => None,
        }
    }
}

/// Row shape of the `estimates` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EstimateRow {
    pub id: Uuid,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub selected_package: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<EstimateRow> for Estimate {
    fn from(row: EstimateRow) -> Self {
        let pricing = match row.selected_package {
            Some(selected) if selected < row.packages.len() => Pricing::Package {
                packages: row.packages,
                selected,
            },
            _ => Pricing::Items(row.items),
        };
        Self {
            id: row.id,
            client: ClientContact {
                name: row.client_name,
                email: row.client_email,
                phone: row.client_phone,
            },
            pricing,
            status: row
                .status
                .as_deref()
                .and_then(EstimateStatus::parse)
                .unwrap_or_default(),
            project_id: row.project_id,
            created_at: row.created_at,
        }
    }
}

/// Input for a new estimate
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateDraft {
    pub client: ClientContact,
    pub pricing: Pricing,
}

impl EstimateDraft {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.client.name.trim().is_empty() {
            errors.push("client.name", "client name is required");
        }
        self.pricing.validate(&mut errors);
        errors
    }
}

/// Side effects requested together with an approval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOptions {
    /// Move the linked project (created if missing) to pre-production
    #[serde(default)]
    pub move_project: bool,
    /// Create an invoice for the estimate amount
    #[serde(default)]
    pub create_invoice: bool,
}

impl ApprovalOptions {
    pub fn all() -> Self {
        Self {
            move_project: true,
            create_invoice: true,
        }
    }

    pub fn any(&self) -> bool {
        self.move_project || self.create_invoice
    }
}

/// A status change as the views express it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusChange {
    Simple {
        status: EstimateStatus,
    },
    WithOptions {
        status: EstimateStatus,
        options: ApprovalOptions,
    },
    /// Older callers pass the amount and package directly; an approval in
    /// this shape always carries both side effects.
    Legacy {
        status: EstimateStatus,
        amount: String,
        #[serde(default)]
        package_index: Option<usize>,
    },
}

/// The single normalized form every [`StatusChange`] resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub status: EstimateStatus,
    pub options: ApprovalOptions,
    pub amount: Option<Decimal>,
    pub package_index: Option<usize>,
}

impl StatusChange {
    pub fn resolve(self) -> StatusRequest {
        match self {
            StatusChange::Simple { status } => StatusRequest {
                status,
                options: ApprovalOptions::default(),
                amount: None,
                package_index: None,
            },
            StatusChange::WithOptions { status, options } => StatusRequest {
                status,
                options,
                amount: None,
                package_index: None,
            },
            StatusChange::Legacy {
                status,
                amount,
                package_index,
            } => StatusRequest {
                status,
                options: if status == EstimateStatus::Approved {
                    ApprovalOptions::all()
                } else {
                    ApprovalOptions::default()
                },
                amount: parse_amount_strict(&amount).map(round_money),
                package_index,
            },
        }
    }
}

impl StatusRequest {
    /// Whether this request runs the approval workflow
    pub fn is_approval_workflow(&self) -> bool {
        self.status == EstimateStatus::Approved && self.options.any()
    }

    /// Amount to invoice: explicit amount, then the chosen package, then the
    /// estimate's own amount.
    pub fn effective_amount(&self, estimate: &Estimate) -> Decimal {
        self.amount
            .or_else(|| self.package_index.and_then(|i| estimate.package_amount(i)))
            .unwrap_or_else(|| estimate.amount())
    }
}
