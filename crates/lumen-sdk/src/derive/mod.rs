//! Derivation engine
//!
//! Pure functions turning line items and a tax rate into subtotal, tax,
//! total and balance. Amount strings are tolerant: anything that does not
//! parse contributes zero. Strict parsing for form validation lives next to
//! the tolerant variant in [`money`].

pub mod guard;
pub mod money;
pub mod totals;

pub use guard::TotalGuard;
pub use money::{
    format_currency, money_string, parse_amount, parse_amount_strict, parse_rate, round_money,
    DEFAULT_CURRENCY_SYMBOL,
};
pub use totals::{balance, subtotal, tax, total, DisplayTotals, LineItem, Totals};
