use super::form::InvoiceForm;
use super::model::{Invoice, InvoiceVersion, Payment};
use crate::derive::money_string;
use crate::error::{Result, SdkError};
use crate::gateway::{decode_rows, DataGateway};
use crate::identity::IdentityProvider;
use crate::notify::{self, Notifier};
use lumen_gateway::{Order, RowQuery};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const INVOICES_TABLE: &str = "invoices";
pub(crate) const INVOICE_VERSIONS_TABLE: &str = "invoice_versions";
const SAVE_INVOICE: &str = "save_invoice_items_form_data";
const RECORD_PAYMENT: &str = "record_invoice_payment";

/// Loads, saves and takes payments against invoices. Nothing here is
/// optimistic: the form only changes after the store accepts a write.
pub struct InvoiceService {
    gateway: Arc<dyn DataGateway>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
}

impl InvoiceService {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            identity,
            notifier,
        }
    }

    /// All of the owner's invoices, newest first
    pub async fn list(&self) -> Result<Vec<Invoice>> {
        let result = async {
            let identity = self.identity.current().await?;
            let rows = self
                .gateway
                .select(
                    INVOICES_TABLE,
                    &RowQuery::new()
                        .eq("user_id", identity.user_id)
                        .order_by("updated_at", Order::Desc),
                )
                .await?;
            decode_rows::<Invoice>(rows)
        };
        self.reported("load invoices", result.await)
    }

    pub async fn get(&self, id: Uuid) -> Result<Invoice> {
        let result = async {
            let rows = self
                .gateway
                .select(INVOICES_TABLE, &RowQuery::new().eq("id", id).limit(1))
                .await?;
            decode_rows::<Invoice>(rows)?
                .pop()
                .ok_or_else(|| SdkError::NotFound(format!("invoice {}", id)))
        };
        self.reported("load invoice", result.await)
    }

    /// Earlier saved states of an invoice, newest first
    pub async fn versions(&self, invoice_id: Uuid) -> Result<Vec<InvoiceVersion>> {
        let result = async {
            let rows = self
                .gateway
                .select(
                    INVOICE_VERSIONS_TABLE,
                    &RowQuery::new()
                        .eq("invoice_id", invoice_id)
                        .order_by("version", Order::Desc),
                )
                .await?;
            decode_rows::<InvoiceVersion>(rows)
        };
        self.reported("load invoice versions", result.await)
    }

    /// Persist the form.
    ///
    /// Refused without a call while validation errors remain. A previously
    /// saved invoice is first copied into `invoice_versions`.
    pub async fn save(&self, form: &InvoiceForm) -> Result<Invoice> {
        form.validate().into_result()?;

        let mut invoice = form.to_invoice();
        if invoice.user_id.is_none() {
            match self.identity.current().await {
                Ok(identity) => invoice.user_id = Some(identity.user_id),
                Err(e) => return self.reported("save invoice", Err(e)),
            }
        }

        if !form.is_new() {
            self.snapshot(form.original()).await;
        }

        invoice.version = form.original().version + 1;
        let args = json!({
            "p_invoice_id": invoice.id,
            "p_user_id": invoice.user_id,
            "p_estimate_id": invoice.estimate_id,
            "p_invoice_number": invoice.invoice_number,
            "p_client": invoice.client,
            "p_company": invoice.company,
            "p_items": invoice.items,
            "p_tax_rate": invoice.tax_rate,
            "p_invoice_type": invoice.invoice_type.as_str(),
            "p_subtotal": money_string(invoice.subtotal),
            "p_tax": money_string(invoice.tax),
            "p_total": money_string(invoice.total),
            "p_paid": money_string(invoice.paid),
            "p_balance": money_string(invoice.balance),
            "p_status": invoice.status,
            "p_issue_date": invoice.issue_date,
            "p_due_date": invoice.due_date,
            "p_version": invoice.version,
        });

        let result = match self.gateway.rpc(SAVE_INVOICE, args).await {
            Ok(result) => result,
            Err(e) => return self.reported("save invoice", Err(e)),
        };

        tracing::info!(invoice_id = %invoice.id, version = invoice.version, "invoice saved");
        Ok(Self::stored_row(&result).unwrap_or(invoice))
    }

    /// Record a payment remotely, then append it to the form
    pub async fn record_payment(&self, form: &mut InvoiceForm, payment: Payment) -> Result<()> {
        form.check_payment(&payment)?;

        let invoice_id = form.invoice().id;
        let args = json!({
            "p_invoice_id": invoice_id,
            "p_amount": money_string(payment.amount),
            "p_date": payment.date,
            "p_method": payment.method,
            "p_note": payment.note,
        });
        if let Err(e) = self.gateway.rpc(RECORD_PAYMENT, args).await {
            return self.reported("record payment", Err(e));
        }

        tracing::info!(invoice_id = %invoice_id, amount = %payment.amount, "payment recorded");
        form.apply_payment(payment);
        Ok(())
    }

    async fn snapshot(&self, previous: &Invoice) {
        let snapshot = match serde_json::to_value(previous) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(invoice_id = %previous.id, error = %e, "invoice snapshot not serializable");
                return;
            }
        };
        let row = json!({
            "invoice_id": previous.id,
            "version": previous.version,
            "snapshot": snapshot,
            "created_at": chrono::Utc::now(),
        });
        // Best effort; the save goes ahead either way.
        if let Err(e) = self.gateway.insert(INVOICE_VERSIONS_TABLE, row).await {
            tracing::warn!(invoice_id = %previous.id, error = %e, "invoice version snapshot failed");
        }
    }

    /// The saved row, when the procedure echoes one back
    fn stored_row(result: &Value) -> Option<Invoice> {
        let row = match result {
            Value::Object(map) => map.get("data").unwrap_or(result),
            Value::Array(rows) => rows.first()?,
            _ => return None,
        };
        serde_json::from_value(row.clone()).ok()
    }

    fn reported<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            notify::report(self.notifier.as_ref(), context, e);
        }
        result
    }
}
