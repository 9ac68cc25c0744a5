use lp_tensor::DType;

use crate::error::{QuantError, Result};

/// Affine quantization parameters for one tensor.
///
/// A quantized value `q` represents the real value `(q - zero_point) * scale`.
/// Parameters are owned per tensor and never shared mutably.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationParams {
    /// Step size between adjacent quantized levels. Always positive and finite.
    pub scale: f32,
    /// Quantized value representing real 0.0.
    pub zero_point: i32,
}

impl QuantizationParams {
    /// Create parameters from an explicit scale and zero point.
    ///
    /// # Errors
    /// Returns `InvalidScale` if `scale` is not a positive finite value.
    pub fn new(scale: f32, zero_point: i32) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(QuantError::InvalidScale(scale));
        }
        Ok(QuantizationParams { scale, zero_point })
    }

    /// Choose parameters covering the observed value range `[min, max]` for
    /// the given quantized dtype.
    ///
    /// The range is first widened to include 0 so that real zero is exactly
    /// representable, then the zero point is nudged onto the integer grid and
    /// clamped into the dtype's range. A degenerate single-point range falls
    /// back to a scale of 0.1.
    ///
    /// # Errors
    /// Returns `NotQuantized` for a float target dtype, or `InvalidRange`
    /// when `min > max` or either bound is not finite.
    pub fn from_min_max(min: f32, max: f32, dtype: DType) -> Result<Self> {
        let (qmin, qmax) = quant_range(dtype)?;
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(QuantError::InvalidRange { min, max });
        }

        let min = min.min(0.0);
        let max = max.max(0.0);

        let mut scale = (max - min) / (qmax - qmin) as f32;
        if scale == 0.0 {
            scale = 0.1;
        }

        // Nudge the real-valued zero point onto the integer grid.
        let zero_point_real = qmin as f32 - min / scale;
        let zero_point = zero_point_real
            .round_ties_even()
            .clamp(qmin as f32, qmax as f32) as i32;

        Ok(QuantizationParams { scale, zero_point })
    }

    /// Check that the zero point is representable in the given quantized dtype.
    ///
    /// # Errors
    /// Returns `NotQuantized` for float dtypes and `InvalidZeroPoint` when
    /// the zero point falls outside the dtype's range.
    pub fn validate_for(&self, dtype: DType) -> Result<()> {
        let (qmin, qmax) = quant_range(dtype)?;
        if self.zero_point < qmin || self.zero_point > qmax {
            return Err(QuantError::InvalidZeroPoint {
                zero_point: self.zero_point,
                qmin,
                qmax,
            });
        }
        Ok(())
    }

    /// Quantize a single value, saturating into `[qmin, qmax]`.
    ///
    /// Rounding is half-to-even, the same mode used when requantizing
    /// kernel outputs.
    pub fn quantize_one(&self, x: f32, qmin: i32, qmax: i32) -> i32 {
        let q = (x / self.scale).round_ties_even() + self.zero_point as f32;
        q.clamp(qmin as f32, qmax as f32) as i32
    }

    /// Quantize a single value, failing instead of saturating.
    ///
    /// # Errors
    /// Returns `OutOfRange` if the rounded value falls outside `[qmin, qmax]`.
    pub fn quantize_one_strict(&self, x: f32, qmin: i32, qmax: i32) -> Result<i32> {
        let q = (x / self.scale).round_ties_even() + self.zero_point as f32;
        if !q.is_finite() || q < qmin as f32 || q > qmax as f32 {
            return Err(QuantError::OutOfRange {
                value: x,
                qmin,
                qmax,
            });
        }
        Ok(q as i32)
    }

    /// Recover the real value represented by a quantized value.
    pub fn dequantize_one(&self, q: i32) -> f32 {
        (q - self.zero_point) as f32 * self.scale
    }
}

/// Look up `(qmin, qmax)` for a quantized dtype.
pub(crate) fn quant_range(dtype: DType) -> Result<(i32, i32)> {
    dtype
        .quant_range()
        .ok_or_else(|| QuantError::NotQuantized(dtype.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_rejects_bad_scale() {
        assert!(QuantizationParams::new(0.0, 0).is_err());
        assert!(QuantizationParams::new(-1.0, 0).is_err());
        assert!(QuantizationParams::new(f32::NAN, 0).is_err());
        assert!(QuantizationParams::new(f32::INFINITY, 0).is_err());
        assert!(QuantizationParams::new(0.5, 10).is_ok());
    }

    #[test]
    fn test_from_min_max_unit_scale_u8() {
        // [-100, 155] spans exactly 255 steps.
        let p = QuantizationParams::from_min_max(-100.0, 155.0, DType::U8).unwrap();
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.zero_point, 100);
        assert_eq!(p.quantize_one(-100.0, 0, 255), 0);
        assert_eq!(p.quantize_one(155.0, 0, 255), 255);
    }

    #[test]
    fn test_from_min_max_unit_scale_i8() {
        let p = QuantizationParams::from_min_max(-128.0, 127.0, DType::I8).unwrap();
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.zero_point, 0);
        assert_eq!(p.quantize_one(-128.0, -128, 127), -128);
        assert_eq!(p.quantize_one(127.0, -128, 127), 127);
    }

    #[test]
    fn test_from_min_max_widens_to_zero() {
        // A strictly positive range still represents 0 exactly.
        let p = QuantizationParams::from_min_max(10.0, 265.0, DType::U8).unwrap();
        assert_relative_eq!(p.dequantize_one(p.zero_point), 0.0);
        // min is widened down to 0, so the span is [0, 265].
        assert_relative_eq!(p.scale, 265.0 / 255.0);
        assert_eq!(p.zero_point, 0);
    }

    #[test]
    fn test_from_min_max_degenerate_range() {
        let p = QuantizationParams::from_min_max(0.0, 0.0, DType::I8).unwrap();
        assert_eq!(p.scale, 0.1);
    }

    #[test]
    fn test_from_min_max_rejects_invalid() {
        assert!(QuantizationParams::from_min_max(1.0, -1.0, DType::U8).is_err());
        assert!(QuantizationParams::from_min_max(f32::NAN, 1.0, DType::U8).is_err());
        assert!(QuantizationParams::from_min_max(0.0, 1.0, DType::F32).is_err());
    }

    #[test]
    fn test_quantize_one_saturates() {
        let p = QuantizationParams::new(1.0, 0).unwrap();
        assert_eq!(p.quantize_one(300.0, -128, 127), 127);
        assert_eq!(p.quantize_one(-300.0, -128, 127), -128);
    }

    #[test]
    fn test_quantize_one_strict_errors() {
        let p = QuantizationParams::new(1.0, 0).unwrap();
        assert!(p.quantize_one_strict(300.0, -128, 127).is_err());
        assert!(p.quantize_one_strict(-129.0, -128, 127).is_err());
        assert_eq!(p.quantize_one_strict(12.0, -128, 127).unwrap(), 12);
    }

    #[test]
    fn test_rounding_half_to_even() {
        let p = QuantizationParams::new(1.0, 0).unwrap();
        assert_eq!(p.quantize_one(2.5, -128, 127), 2);
        assert_eq!(p.quantize_one(3.5, -128, 127), 4);
        assert_eq!(p.quantize_one(-2.5, -128, 127), -2);
    }

    #[test]
    fn test_validate_for() {
        let p = QuantizationParams::new(1.0, 200).unwrap();
        assert!(p.validate_for(DType::U8).is_ok());
        assert!(p.validate_for(DType::I8).is_err());
        assert!(p.validate_for(DType::F32).is_err());
    }

    #[test]
    fn test_dequantize_one() {
        let p = QuantizationParams::new(0.5, 10).unwrap();
        assert_relative_eq!(p.dequantize_one(10), 0.0);
        assert_relative_eq!(p.dequantize_one(14), 2.0);
        assert_relative_eq!(p.dequantize_one(0), -5.0);
    }
}
