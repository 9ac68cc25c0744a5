//! `lp-ops` - Broadcast-aware quantized elementwise multiply for lowp-engine.
//!
//! This crate provides:
//! - A `BroadcastPlan` mapping two operand shapes onto one output index
//!   space (numpy-style trailing alignment or explicit axis placement)
//! - The quantized multiply kernel (`mul`, in-place `mul_assign`) with
//!   requantized or dequantized output
//! - A float reference kernel (`mul_reference`) used as correctness oracle
//! - A step-scaled closeness comparator for quantized-vs-reference results
//!
//! Every invocation is a stateless, single-pass compute: plan, multiply,
//! requantize or dequantize. Nothing is cached or retained across calls.

pub mod broadcast;
pub mod compare;
pub mod error;
pub mod mul;
pub mod reference;

// Re-export primary types at the crate root for convenience.
pub use broadcast::BroadcastPlan;
pub use compare::{max_abs_diff, output_step, results_close, DEFAULT_TOL_STEPS};
pub use error::{OpError, Result};
pub use mul::{mul, mul_assign, OutputSpec};
pub use reference::mul_reference;
