//! Editable invoice with live derivation

use super::model::{Invoice, InvoiceType, Payment};
use crate::derive::{
    balance, format_currency, parse_amount_strict, round_money, LineItem, TotalGuard, Totals,
};
use crate::error::{Result, SdkError};
use crate::status::InvoiceStatus;
use crate::validation::FieldErrors;
use rust_decimal::Decimal;

/// Figures shown next to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub status: InvoiceStatus,
}

/// Formatted [`FormTotals`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDisplay {
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub paid: String,
    pub balance: String,
}

/// Invoice being edited.
///
/// Every input change recomputes subtotal, tax, total and balance. The total
/// goes through a [`TotalGuard`], so a hand-entered total survives until the
/// items or rate change the derived value.
#[derive(Debug, Clone)]
pub struct InvoiceForm {
    original: Invoice,
    invoice: Invoice,
    guard: TotalGuard,
    currency_symbol: String,
}

impl InvoiceForm {
    /// Open `invoice` for editing. A saved invoice keeps its stored total,
    /// even when it no longer matches its items.
    pub fn new(invoice: Invoice, currency_symbol: impl Into<String>) -> Self {
        let guard = if invoice.version > 0 {
            let derived = derive_totals(&invoice);
            TotalGuard::resume(invoice.total, derived.total)
        } else {
            TotalGuard::with_current(invoice.total)
        };
        let mut form = Self {
            guard,
            original: invoice.clone(),
            invoice,
            currency_symbol: currency_symbol.into(),
        };
        form.invoice.paid = form.payments_total().max(form.invoice.paid);
        form.recompute();
        form
    }

    /// The invoice as loaded, before any edits
    pub fn original(&self) -> &Invoice {
        &self.original
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn is_new(&self) -> bool {
        self.original.version == 0
    }

    pub fn items(&self) -> &[LineItem] {
        &self.invoice.items
    }

    pub fn set_items(&mut self, items: Vec<LineItem>) {
        self.invoice.items = items;
        self.recompute();
    }

    pub fn add_item(&mut self, item: LineItem) {
        self.invoice.items.push(item);
        self.recompute();
    }

    /// Replace item `index`; out-of-range indexes are ignored
    pub fn set_item(&mut self, index: usize, item: LineItem) {
        if let Some(slot) = self.invoice.items.get_mut(index) {
            *slot = item;
            self.recompute();
        }
    }

    pub fn remove_item(&mut self, index: usize) -> Option<LineItem> {
        if index >= self.invoice.items.len() {
            return None;
        }
        let removed = self.invoice.items.remove(index);
        self.recompute();
        Some(removed)
    }

    pub fn set_tax_rate(&mut self, rate: impl Into<String>) {
        self.invoice.tax_rate = rate.into();
        self.recompute();
    }

    pub fn set_invoice_type(&mut self, invoice_type: InvoiceType) {
        self.invoice.invoice_type = invoice_type;
        self.recompute();
    }

    /// The user typed a total by hand
    pub fn override_total(&mut self, total: Decimal) {
        self.guard.override_total(round_money(total));
        self.invoice.total = self.guard.current();
        self.refresh_balance();
    }

    /// Append a payment the store has accepted
    pub(crate) fn apply_payment(&mut self, payment: Payment) {
        self.invoice.payments.push(payment);
        self.invoice.paid = self.payments_total();
        self.refresh_balance();
    }

    pub fn totals(&self) -> FormTotals {
        FormTotals {
            subtotal: self.invoice.subtotal,
            tax: self.invoice.tax,
            total: self.invoice.total,
            paid: self.invoice.paid,
            balance: self.invoice.balance,
            status: self.status(),
        }
    }

    pub fn display(&self) -> FormDisplay {
        let symbol = self.currency_symbol.as_str();
        FormDisplay {
            subtotal: format_currency(symbol, self.invoice.subtotal),
            tax: format_currency(symbol, self.invoice.tax),
            total: format_currency(symbol, self.invoice.total),
            paid: format_currency(symbol, self.invoice.paid),
            balance: format_currency(symbol, self.invoice.balance),
        }
    }

    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_amounts(self.invoice.total, self.invoice.paid)
    }

    /// Malformed input, per field. The derived figures treat these as zero;
    /// saving is refused while any remain.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.invoice.client.name.trim().is_empty() {
            errors.push("client.name", "client name is required");
        }
        if self.invoice.items.is_empty() {
            errors.push("items", "add at least one item");
        }
        for (i, item) in self.invoice.items.iter().enumerate() {
            if item.description.trim().is_empty() {
                errors.push(format!("items[{}].description", i), "description is required");
            }
            errors.check_amount(format!("items[{}].amount", i), &item.amount);
        }

        if self.invoice.invoice_type.is_taxable() {
            match parse_amount_strict(&self.invoice.tax_rate) {
                None => errors.push("tax_rate", "tax rate must be a number"),
                Some(rate) if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED => {
                    errors.push("tax_rate", "tax rate must be between 0 and 100")
                }
                Some(_) => {}
            }
        }

        let taxable = self.invoice.invoice_type.is_taxable();
        if Totals::try_compute(&self.invoice.items, &self.invoice.tax_rate, taxable).is_none() {
            errors.push("total", "amounts are too large");
        }

        if let (Some(issued), Some(due)) = (self.invoice.issue_date, self.invoice.due_date) {
            if due < issued {
                errors.push("due_date", "due date is before the issue date");
            }
        }
        errors
    }

    /// The invoice with derived fields filled in, ready to persist
    pub fn to_invoice(&self) -> Invoice {
        let mut invoice = self.invoice.clone();
        invoice.status = Some(self.status().as_str().to_string());
        invoice
    }

    /// Check a payment before it is sent
    pub fn check_payment(&self, payment: &Payment) -> Result<()> {
        if payment.amount <= Decimal::ZERO {
            return Err(SdkError::validation("payment.amount", "payment must be greater than zero"));
        }
        if round_money(payment.amount) != payment.amount {
            return Err(SdkError::validation("payment.amount", "payment has more than two decimals"));
        }
        Ok(())
    }

    fn payments_total(&self) -> Decimal {
        self.invoice.payments.iter().map(|p| p.amount).sum()
    }

    fn recompute(&mut self) {
        let totals = derive_totals(&self.invoice);
        self.invoice.subtotal = totals.subtotal;
        self.invoice.tax = totals.tax;
        if let Some(total) = self.guard.observe(totals.total) {
            self.invoice.total = total;
        }
        self.refresh_balance();
    }

    fn refresh_balance(&mut self) {
        self.invoice.balance = balance(self.invoice.total, self.invoice.paid);
    }
}

fn derive_totals(invoice: &Invoice) -> Totals {
    Totals::compute(
        &invoice.items,
        &invoice.tax_rate,
        invoice.invoice_type.is_taxable(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dec(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    fn form() -> InvoiceForm {
        let mut invoice = Invoice::draft("18");
        invoice.client.name = "Asha Mehta".into();
        let mut form = InvoiceForm::new(invoice, "₹");
        form.set_items(vec![
            LineItem::new("Coverage", "₹100.00"),
            LineItem::new("Album", "₹50.50"),
        ]);
        form
    }

    fn payment(amount: &str) -> Payment {
        Payment {
            amount: dec(amount),
            date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            method: Some("upi".into()),
            note: None,
        }
    }

    #[test]
    fn test_derived_totals() {
        let form = form();
        let totals = form.totals();
        assert_eq!(totals.subtotal, dec("150.50"));
        assert_eq!(totals.tax, dec("27.09"));
        assert_eq!(totals.total, dec("177.59"));
        assert_eq!(totals.balance, dec("177.59"));
        assert_eq!(totals.status, InvoiceStatus::Pending);
        assert_eq!(form.display().total, "₹177.59");
    }

    #[test]
    fn test_non_gst_has_no_tax() {
        let mut form = form();
        form.set_invoice_type(InvoiceType::NonGst);
        assert_eq!(form.totals().tax, Decimal::ZERO);
        assert_eq!(form.totals().total, dec("150.50"));
    }

    #[test]
    fn test_manual_total_survives_same_items() {
        let mut form = form();
        form.override_total(dec("170"));
        form.set_tax_rate("18");
        assert_eq!(form.totals().total, dec("170.00"));

        form.add_item(LineItem::new("Prints", "₹10.00"));
        assert_eq!(form.totals().total, dec("189.39"));
    }

    #[test]
    fn test_reopened_invoice_keeps_stored_total() {
        let mut saved = form().to_invoice();
        saved.total = dec("170.00");
        saved.version = 1;

        let mut reopened = InvoiceForm::new(saved, "₹");
        assert_eq!(reopened.totals().subtotal, dec("150.50"));
        assert_eq!(reopened.totals().total, dec("170.00"));
        assert_eq!(reopened.totals().balance, dec("170.00"));
        assert_eq!(reopened.to_invoice().total, dec("170.00"));

        reopened.set_tax_rate("18");
        assert_eq!(reopened.totals().total, dec("170.00"));

        reopened.add_item(LineItem::new("Prints", "₹10.00"));
        assert_eq!(reopened.totals().total, dec("189.39"));
    }

    #[test]
    fn test_oversized_amounts_flagged_not_panicking() {
        let mut form = form();
        form.set_items(vec![
            LineItem::new("Coverage", "70000000000000000000000000000"),
            LineItem::new("Album", "70000000000000000000000000000"),
        ]);
        assert_eq!(form.totals().total, Decimal::ZERO);
        assert!(form.validate().get("total").is_some());

        form.set_items(vec![LineItem::new("Coverage", "₹100.00")]);
        form.set_tax_rate("1000000000000000000000000000");
        assert_eq!(form.totals().tax, Decimal::ZERO);
        assert!(form.validate().get("total").is_some());
    }

    #[test]
    fn test_payments_drive_balance_and_status() {
        let mut form = form();
        form.apply_payment(payment("100"));
        assert_eq!(form.totals().balance, dec("77.59"));
        assert_eq!(form.status(), InvoiceStatus::Partial);

        form.apply_payment(payment("100"));
        assert_eq!(form.totals().balance, Decimal::ZERO);
        assert_eq!(form.status(), InvoiceStatus::Paid);
        assert_eq!(form.to_invoice().status.as_deref(), Some("paid"));
    }

    #[test]
    fn test_validation_flags_bad_fields() {
        let mut form = form();
        form.set_item(1, LineItem::new("Album", "fifty"));
        form.set_tax_rate("eighteen");

        // Derivation keeps going with zero for the bad inputs
        assert_eq!(form.totals().total, dec("100.00"));

        let errors = form.validate();
        assert!(errors.get("items[1].amount").is_some());
        assert!(errors.get("tax_rate").is_some());
        assert!(errors.get("items[0].amount").is_none());
    }

    #[test]
    fn test_tax_rate_ignored_for_non_gst_validation() {
        let mut form = form();
        form.set_invoice_type(InvoiceType::NonGst);
        form.set_tax_rate("");
        assert!(form.validate().is_empty());
    }

    #[test]
    fn test_payment_checks() {
        let form = form();
        assert!(form.check_payment(&payment("0")).is_err());
        assert!(form.check_payment(&payment("10.005")).is_err());
        assert!(form.check_payment(&payment("10.50")).is_ok());
    }
}
