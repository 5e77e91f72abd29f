//! Subtotal, tax, total and balance derivation

use super::money::{format_currency, parse_amount, parse_rate, round_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A billable line: description plus a currency-formatted amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: String,
}

impl LineItem {
    pub fn new(description: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
        }
    }

    /// Parsed amount (zero when malformed)
    pub fn value(&self) -> Decimal {
        parse_amount(&self.amount)
    }
}

/// Sum of all item amounts; malformed amounts contribute zero.
/// A sum too large to represent counts as zero as well.
pub fn subtotal(items: &[LineItem]) -> Decimal {
    checked_subtotal(items).unwrap_or(Decimal::ZERO)
}

fn checked_subtotal(items: &[LineItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.value()))
}

/// `subtotal * rate / 100`, rounded to cents (zero on overflow)
pub fn tax(subtotal: Decimal, rate: &str) -> Decimal {
    checked_tax(subtotal, rate).unwrap_or(Decimal::ZERO)
}

fn checked_tax(subtotal: Decimal, rate: &str) -> Option<Decimal> {
    let product = subtotal.checked_mul(parse_rate(rate))?;
    product.checked_div(Decimal::ONE_HUNDRED).map(round_money)
}

pub fn total(subtotal: Decimal, tax: Decimal) -> Decimal {
    subtotal.checked_add(tax).unwrap_or(Decimal::ZERO)
}

/// Outstanding amount, floored at zero
pub fn balance(total: Decimal, paid: Decimal) -> Decimal {
    total
        .checked_sub(paid)
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO)
}

/// Derived figures for a set of items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Derive totals. When `taxable` is false the rate is ignored.
    pub fn compute(items: &[LineItem], rate: &str, taxable: bool) -> Self {
        let subtotal = subtotal(items);
        let tax = if taxable { tax(subtotal, rate) } else { Decimal::ZERO };
        Self {
            subtotal,
            tax,
            total: total(subtotal, tax),
        }
    }

    /// Like [`Totals::compute`], but `None` when a figure is too large to
    /// represent instead of falling back to zero.
    pub fn try_compute(items: &[LineItem], rate: &str, taxable: bool) -> Option<Self> {
        let subtotal = checked_subtotal(items)?;
        let tax = if taxable {
            checked_tax(subtotal, rate)?
        } else {
            Decimal::ZERO
        };
        Some(Self {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
        })
    }

    pub fn balance(&self, paid: Decimal) -> Decimal {
        balance(self.total, paid)
    }

    pub fn display(&self, symbol: &str) -> DisplayTotals {
        DisplayTotals {
            subtotal: format_currency(symbol, self.subtotal),
            tax: format_currency(symbol, self.tax),
            total: format_currency(symbol, self.total),
        }
    }
}

/// Totals formatted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTotals {
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Pre-wedding shoot", "₹100.00"),
            LineItem::new("Album", "₹50.50"),
        ]
    }

    #[test]
    fn test_gst_invoice_totals() {
        let totals = Totals::compute(&items(), "18", true);
        assert_eq!(totals.subtotal, Decimal::new(15050, 2));
        assert_eq!(totals.tax, Decimal::new(2709, 2));
        assert_eq!(totals.total, Decimal::new(17759, 2));

        let shown = totals.display("₹");
        assert_eq!(shown.subtotal, "₹150.50");
        assert_eq!(shown.tax, "₹27.09");
        assert_eq!(shown.total, "₹177.59");
    }

    #[test]
    fn test_untaxed_invoice_ignores_rate() {
        let totals = Totals::compute(&items(), "18", false);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::new(15050, 2));
    }

    #[test]
    fn test_malformed_item_counts_as_zero() {
        let mut list = items();
        list.push(LineItem::new("Travel", "to be decided"));
        list.push(LineItem::new("Blank", ""));
        assert_eq!(subtotal(&list), Decimal::new(15050, 2));
    }

    #[test]
    fn test_balance_never_negative() {
        assert_eq!(balance(Decimal::new(10000, 2), Decimal::new(15000, 2)), Decimal::ZERO);
        assert_eq!(
            balance(Decimal::new(10000, 2), Decimal::new(2500, 2)),
            Decimal::new(7500, 2)
        );
    }

    #[test]
    fn test_oversized_input_does_not_panic() {
        let huge_rate = Totals::compute(
            &[LineItem::new("Coverage", "₹100.00")],
            "1000000000000000000000000000",
            true,
        );
        assert_eq!(huge_rate.subtotal, Decimal::new(10000, 2));
        assert_eq!(huge_rate.tax, Decimal::ZERO);
        assert_eq!(huge_rate.total, Decimal::new(10000, 2));

        let huge_items = vec![
            LineItem::new("A", "70000000000000000000000000000"),
            LineItem::new("B", "70000000000000000000000000000"),
        ];
        assert_eq!(Totals::compute(&huge_items, "18", true), Totals::default());
        assert_eq!(balance(Decimal::MAX, Decimal::MIN), Decimal::ZERO);
    }

    #[test]
    fn test_try_compute_reports_overflow() {
        assert!(Totals::try_compute(&items(), "18", true).is_some());
        assert!(Totals::try_compute(
            &[LineItem::new("Coverage", "₹100.00")],
            "1000000000000000000000000000",
            true
        )
        .is_none());
        // The rate is irrelevant when the invoice is not taxable
        assert!(Totals::try_compute(
            &[LineItem::new("Coverage", "₹100.00")],
            "1000000000000000000000000000",
            false
        )
        .is_some());
    }

    #[test]
    fn test_empty_items() {
        let totals = Totals::compute(&[], "18", true);
        assert_eq!(totals, Totals::default());
    }
}
