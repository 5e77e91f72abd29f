//! Loop guard between a user-editable total and the total derived from items

use rust_decimal::Decimal;

/// Tracks the last derived total so that recomputation only overwrites the
/// visible total when the derived value actually changed.
///
/// A manual override survives re-derivations that produce the same value it
/// overrode; it is replaced once the items change the derived total.
#[derive(Debug, Clone, Default)]
pub struct TotalGuard {
    last_computed: Option<Decimal>,
    current: Decimal,
    overridden: bool,
}

impl TotalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a persisted total (e.g. an invoice loaded for editing)
    pub fn with_current(current: Decimal) -> Self {
        Self {
            last_computed: None,
            current,
            overridden: false,
        }
    }

    /// Resume editing a saved record. `derived` is what its items add up to
    /// now; a stored total that differs from it was entered by hand and is
    /// kept as an override.
    pub fn resume(stored: Decimal, derived: Decimal) -> Self {
        Self {
            last_computed: Some(derived),
            current: stored,
            overridden: stored != derived,
        }
    }

    /// Feed a freshly derived total. Returns the new visible total when it
    /// should change, `None` when nothing needs to be written.
    pub fn observe(&mut self, computed: Decimal) -> Option<Decimal> {
        if self.last_computed == Some(computed) {
            return None;
        }
        self.last_computed = Some(computed);

        if self.current == computed {
            self.overridden = false;
            return None;
        }

        self.current = computed;
        self.overridden = false;
        Some(computed)
    }

    /// The user typed a total by hand
    pub fn override_total(&mut self, value: Decimal) {
        self.current = value;
        self.overridden = true;
    }

    pub fn current(&self) -> Decimal {
        self.current
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden
    }
}
