//! Optimistic mutation controller
//!
//! Local patch, one remote call, then verify or roll back.

mod controller;

pub use controller::{MutationOutcome, OptimisticController};
