//! Ad-spend attribution engine.
//!
//! One invocation of [`run_attribution`] performs a single batched pass for
//! one organization: load active campaign links and the orders inside the
//! lookback window, spread each campaign's window spend across the window's
//! orders, split lines matched by several links equally, then replace the
//! affected conversion rows and refresh per-product ROAS aggregates in one
//! transaction.
//!
//! The computation itself lives in [`compute`] as pure functions over loaded
//! rows, so the weighting and filtering rules are testable without a
//! database.

mod compute;
mod error;
mod run;
mod window;

pub use compute::{compute_conversions, ComputeInput};
pub use error::EngineError;
pub use run::{run_attribution, RunOutcome};
pub use window::{validate_days_back, AttributionWindow, DEFAULT_DAYS_BACK};
