//! Invoices
//!
//! [`InvoiceForm`] keeps the derived figures current while the user edits;
//! [`InvoiceService`] loads, saves and records payments.

mod form;
mod model;
mod service;

pub use form::{FormDisplay, FormTotals, InvoiceForm};
pub use model::{Invoice, InvoiceType, InvoiceVersion, PartyDetails, Payment};
pub use service::InvoiceService;
