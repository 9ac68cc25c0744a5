use lp_tensor::{CpuStorage, DType, Tensor, TensorError};

use crate::error::{QuantError, Result};
use crate::params::{quant_range, QuantizationParams};

/// What to do when a value quantizes outside the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Clamp silently into `[qmin, qmax]`.
    #[default]
    Saturate,
    /// Fail with `OutOfRange`.
    Strict,
}

/// Quantize a float tensor into the given quantized dtype.
///
/// Each element is mapped via `round(x / scale) + zero_point` (half-to-even
/// rounding) and handled per the range policy.
///
/// # Errors
/// Fails if the input is not a float tensor, the target dtype is not
/// quantized, the zero point is not representable in the target dtype, or
/// (under `RangePolicy::Strict`) a value falls outside the target range.
pub fn quantize(
    tensor: &Tensor,
    params: &QuantizationParams,
    dtype: DType,
    policy: RangePolicy,
) -> Result<Tensor> {
    if !tensor.dtype().is_float() {
        return Err(QuantError::Tensor(TensorError::DTypeMismatch {
            expected: "f32 or f16".to_string(),
            got: tensor.dtype().to_string(),
        }));
    }
    let (qmin, qmax) = quant_range(dtype)?;
    params.validate_for(dtype)?;

    let values = tensor.to_f32_vec()?;
    let storage = match (dtype, policy) {
        (DType::I8, RangePolicy::Saturate) => CpuStorage::I8(
            values
                .iter()
                .map(|&x| params.quantize_one(x, qmin, qmax) as i8)
                .collect(),
        ),
        (DType::I8, RangePolicy::Strict) => CpuStorage::I8(
            values
                .iter()
                .map(|&x| params.quantize_one_strict(x, qmin, qmax).map(|q| q as i8))
                .collect::<Result<_>>()?,
        ),
        (DType::U8, RangePolicy::Saturate) => CpuStorage::U8(
            values
                .iter()
                .map(|&x| params.quantize_one(x, qmin, qmax) as u8)
                .collect(),
        ),
        (DType::U8, RangePolicy::Strict) => CpuStorage::U8(
            values
                .iter()
                .map(|&x| params.quantize_one_strict(x, qmin, qmax).map(|q| q as u8))
                .collect::<Result<_>>()?,
        ),
        // quant_range already rejected float targets.
        _ => unreachable!("non-quantized target dtype"),
    };
    Ok(Tensor::from_storage(storage, tensor.shape().clone()))
}

/// Dequantize an integer tensor back to f32.
///
/// Each element is mapped via `(q - zero_point) * scale`.
///
/// # Errors
/// Fails if the input is not a quantized tensor or the zero point is not
/// representable in the input's dtype.
pub fn dequantize(tensor: &Tensor, params: &QuantizationParams) -> Result<Tensor> {
    params.validate_for(tensor.dtype())?;
    let values: Vec<f32> = match tensor.storage() {
        CpuStorage::I8(v) => v.iter().map(|&q| params.dequantize_one(q as i32)).collect(),
        CpuStorage::U8(v) => v.iter().map(|&q| params.dequantize_one(q as i32)).collect(),
        // validate_for already rejected float dtypes.
        _ => unreachable!("non-quantized input dtype"),
    };
    Ok(Tensor::from_f32(values, tensor.shape().clone()))
}
