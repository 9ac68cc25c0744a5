//! `lp-quant` - Affine quantization for lowp-engine tensors.
//!
//! This crate provides:
//! - `QuantizationParams` (scale + zero point) with range-based selection
//! - `quantize` / `dequantize` between float and I8/U8 tensors
//! - A `RangePolicy` controlling saturate-vs-fail behavior out of range

pub mod error;
pub mod params;
pub mod quantize;

// Re-export primary types at the crate root for convenience.
pub use error::{QuantError, Result};
pub use params::QuantizationParams;
pub use quantize::{dequantize, quantize, RangePolicy};
