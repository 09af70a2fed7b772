//! Budget module - spend tracking against the project ceiling.
//!
//! # Key Concepts
//! - Pricing: per-token rates and the dollar budget
//! - UsageSnapshot: cumulative token counts and the derived spend fraction
//! - BudgetGate: refuses work once the spend fraction passes 1.0

mod gate;
mod pricing;

pub use gate::BudgetGate;
pub use pricing::{BudgetPricing, UsageSnapshot};
