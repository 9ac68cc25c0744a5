use half::f16;
use lp_quant::QuantizationParams;
use lp_tensor::{CpuStorage, DType, Tensor, TensorError};

use crate::broadcast::BroadcastPlan;
use crate::error::{OpError, Result};

/// Requested output form for the quantized multiply kernel.
///
/// The two intents are mutually exclusive by construction: an invocation
/// either dequantizes the product or requantizes it, never both.
#[derive(Debug, Clone, Copy)]
pub enum OutputSpec<'a> {
    /// Produce an f32 tensor, dequantized immediately after the multiply.
    Dequantized,
    /// Requantize the product into `dtype` with caller-supplied params.
    Quantized {
        params: &'a QuantizationParams,
        dtype: DType,
    },
}

/// One operand resolved to a typed value source.
///
/// Quantized operands carry their scale and zero point as f64 so every
/// load lands directly in the f64 intermediate domain.
enum OperandValues<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
    I8(&'a [i8], f64, f64),
    U8(&'a [u8], f64, f64),
}

impl OperandValues<'_> {
    fn load(&self, off: usize) -> f64 {
        match self {
            OperandValues::F32(v) => v[off] as f64,
            OperandValues::F16(v) => v[off].to_f64(),
            OperandValues::I8(v, scale, zp) => (v[off] as f64 - zp) * scale,
            OperandValues::U8(v, scale, zp) => (v[off] as f64 - zp) * scale,
        }
    }
}

/// Resolve a tensor plus its declared quantization state into a value source.
///
/// The declared state (params present or absent) must agree with the
/// tensor's dtype: quantized dtypes require params, float dtypes forbid them.
fn operand_values<'a>(
    operand: &'static str,
    tensor: &'a Tensor,
    params: Option<&QuantizationParams>,
) -> Result<OperandValues<'a>> {
    match (tensor.storage(), params) {
        (CpuStorage::F32(v), None) => Ok(OperandValues::F32(v.as_slice())),
        (CpuStorage::F16(v), None) => Ok(OperandValues::F16(v.as_slice())),
        (CpuStorage::I8(v), Some(p)) => {
            p.validate_for(DType::I8)?;
            Ok(OperandValues::I8(
                v.as_slice(),
                p.scale as f64,
                p.zero_point as f64,
            ))
        }
        (CpuStorage::U8(v), Some(p)) => {
            p.validate_for(DType::U8)?;
            Ok(OperandValues::U8(
                v.as_slice(),
                p.scale as f64,
                p.zero_point as f64,
            ))
        }
        (_, Some(_)) => Err(OpError::UnexpectedQuantParams {
            operand,
            dtype: tensor.dtype().to_string(),
        }),
        (_, None) => Err(OpError::MissingQuantParams {
            operand,
            dtype: tensor.dtype().to_string(),
        }),
    }
}

fn check_operand_shape(tensor: &Tensor, planned: &[usize]) -> Result<()> {
    if tensor.shape().dims() != planned {
        return Err(TensorError::ShapeMismatch {
            expected: planned.to_vec(),
            got: tensor.shape().dims().to_vec(),
        }
        .into());
    }
    Ok(())
}

fn requantize(x: f64, scale: f64, zero_point: f64, qmin: i32, qmax: i32) -> i32 {
    let q = (x / scale).round_ties_even() + zero_point;
    q.clamp(qmin as f64, qmax as f64) as i32
}

/// Elementwise multiply over two quantized (or mixed quantized/float)
/// tensors, following a precomputed broadcast plan.
///
/// Each operand element is loaded as f64 (dequantized for quantized
/// operands), the product is formed in f64, and the result is either
/// stored as f32 or requantized into the output dtype with the
/// caller-supplied params (output params are never derived). Requantization
/// saturates into the output range.
///
/// # Errors
/// Fails with a shape error when an operand does not match the shape the
/// plan was built for, and with a type-mismatch error when an operand's
/// dtype disagrees with its declared quantization state or the quantized
/// output dtype is not an integer format.
pub fn mul(
    a: &Tensor,
    a_params: Option<&QuantizationParams>,
    b: &Tensor,
    b_params: Option<&QuantizationParams>,
    output: OutputSpec,
    plan: &BroadcastPlan,
) -> Result<Tensor> {
    check_operand_shape(a, plan.lhs_dims())?;
    check_operand_shape(b, plan.rhs_dims())?;
    let va = operand_values("lhs", a, a_params)?;
    let vb = operand_values("rhs", b, b_params)?;
    let n = plan.out_shape().numel();

    match output {
        OutputSpec::Dequantized => {
            let mut out = Vec::with_capacity(n);
            for (la, lb) in plan.offsets() {
                out.push((va.load(la) * vb.load(lb)) as f32);
            }
            Ok(Tensor::from_f32(out, plan.out_shape().clone()))
        }
        OutputSpec::Quantized { params, dtype } => {
            let (qmin, qmax) = dtype
                .quant_range()
                .ok_or_else(|| OpError::InvalidOutputDType(dtype.to_string()))?;
            params.validate_for(dtype)?;
            let scale = params.scale as f64;
            let zp = params.zero_point as f64;

            let storage = match dtype {
                DType::I8 => {
                    let mut out = Vec::with_capacity(n);
                    for (la, lb) in plan.offsets() {
                        let y = va.load(la) * vb.load(lb);
                        out.push(requantize(y, scale, zp, qmin, qmax) as i8);
                    }
                    CpuStorage::I8(out)
                }
                DType::U8 => {
                    let mut out = Vec::with_capacity(n);
                    for (la, lb) in plan.offsets() {
                        let y = va.load(la) * vb.load(lb);
                        out.push(requantize(y, scale, zp, qmin, qmax) as u8);
                    }
                    CpuStorage::U8(out)
                }
                // quant_range already rejected float output dtypes.
                _ => unreachable!("non-quantized output dtype"),
            };
            Ok(Tensor::from_storage(storage, plan.out_shape().clone()))
        }
    }
}

/// In-place multiply: overwrite `a`'s storage with the requantized product.
///
/// `a` must carry the full output shape (so it never broadcasts) and a
/// quantized dtype, which is also the output dtype. Combining in-place
/// execution with a dequantized output is unsupported; use [`mul`] for
/// that. Aliasing is safe because every output element reads its operand
/// elements before the store.
///
/// # Errors
/// Same taxonomy as [`mul`], plus a shape error when `a`'s shape differs
/// from the plan's output shape and an invalid-output error when `a` is a
/// float tensor.
pub fn mul_assign(
    a: &mut Tensor,
    a_params: &QuantizationParams,
    b: &Tensor,
    b_params: Option<&QuantizationParams>,
    out_params: &QuantizationParams,
    plan: &BroadcastPlan,
) -> Result<()> {
    check_operand_shape(a, plan.lhs_dims())?;
    check_operand_shape(b, plan.rhs_dims())?;
    if a.shape().dims() != plan.out_shape().dims() {
        return Err(TensorError::ShapeMismatch {
            expected: plan.out_shape().dims().to_vec(),
            got: a.shape().dims().to_vec(),
        }
        .into());
    }

    let dtype = a.dtype();
    let (qmin, qmax) = dtype
        .quant_range()
        .ok_or_else(|| OpError::InvalidOutputDType(dtype.to_string()))?;
    a_params.validate_for(dtype)?;
    out_params.validate_for(dtype)?;

    let vb = operand_values("rhs", b, b_params)?;
    let in_scale = a_params.scale as f64;
    let in_zp = a_params.zero_point as f64;
    let out_scale = out_params.scale as f64;
    let out_zp = out_params.zero_point as f64;

    // a's shape equals the output shape, so its plan offsets walk the
    // storage in flat row-major order: la is also the store index.
    match a.storage_mut() {
        CpuStorage::I8(v) => {
            for (la, lb) in plan.offsets() {
                let xa = (v[la] as f64 - in_zp) * in_scale;
                let y = xa * vb.load(lb);
                v[la] = requantize(y, out_scale, out_zp, qmin, qmax) as i8;
            }
        }
        CpuStorage::U8(v) => {
            for (la, lb) in plan.offsets() {
                let xa = (v[la] as f64 - in_zp) * in_scale;
                let y = xa * vb.load(lb);
                v[la] = requantize(y, out_scale, out_zp, qmin, qmax) as u8;
            }
        }
        // quant_range already rejected float destinations.
        _ => unreachable!("non-quantized in-place destination"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_tensor::Shape;

    fn unit(zero_point: i32) -> QuantizationParams {
        QuantizationParams::new(1.0, zero_point).unwrap()
    }

    #[test]
    fn test_quantized_mul_exact() {
        // Unit scale, zero offset: products are exact integers.
        let a = Tensor::from_i8(vec![-2, 3, 10], Shape::new(vec![3]));
        let b = Tensor::from_i8(vec![4, -5, 6], Shape::new(vec![3]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let y = mul(
            &a,
            Some(&p),
            &b,
            Some(&p),
            OutputSpec::Quantized {
                params: &p,
                dtype: DType::I8,
            },
            &plan,
        )
        .unwrap();
        assert_eq!(y.data_i8().unwrap(), &[-8, -15, 60]);
    }

    #[test]
    fn test_quantized_mul_saturates_output() {
        let a = Tensor::from_i8(vec![100], Shape::new(vec![1]));
        let b = Tensor::from_i8(vec![100], Shape::new(vec![1]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let y = mul(
            &a,
            Some(&p),
            &b,
            Some(&p),
            OutputSpec::Quantized {
                params: &p,
                dtype: DType::I8,
            },
            &plan,
        )
        .unwrap();
        assert_eq!(y.data_i8().unwrap(), &[127]);
    }

    #[test]
    fn test_dequantized_output() {
        let a = Tensor::from_u8(vec![110, 90], Shape::new(vec![2]));
        let b = Tensor::from_u8(vec![100, 100], Shape::new(vec![2]));
        // zero_point 100: real values are (q - 100).
        let p = unit(100);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let y = mul(&a, Some(&p), &b, Some(&p), OutputSpec::Dequantized, &plan).unwrap();
        assert_eq!(y.dtype(), DType::F32);
        assert_eq!(y.data_f32().unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_mixed_float_and_quantized() {
        let a = Tensor::from_f32(vec![0.5, -1.5], Shape::new(vec![2]));
        let b = Tensor::from_i8(vec![4, 4], Shape::new(vec![2]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let y = mul(&a, None, &b, Some(&p), OutputSpec::Dequantized, &plan).unwrap();
        assert_eq!(y.data_f32().unwrap(), &[2.0, -6.0]);
    }

    #[test]
    fn test_output_scale_applied() {
        let a = Tensor::from_i8(vec![10], Shape::new(vec![1]));
        let b = Tensor::from_i8(vec![10], Shape::new(vec![1]));
        let in_p = unit(0);
        let out_p = QuantizationParams::new(4.0, 0).unwrap();
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let y = mul(
            &a,
            Some(&in_p),
            &b,
            Some(&in_p),
            OutputSpec::Quantized {
                params: &out_p,
                dtype: DType::I8,
            },
            &plan,
        )
        .unwrap();
        // 100 / 4 = 25 steps.
        assert_eq!(y.data_i8().unwrap(), &[25]);
    }

    #[test]
    fn test_broadcast_multiply() {
        let a = Tensor::from_i8(vec![1, 2, 3, 4, 5, 6], Shape::new(vec![2, 3]));
        let b = Tensor::from_i8(vec![2, 3, 4], Shape::new(vec![3]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), true, None).unwrap();
        let y = mul(
            &a,
            Some(&p),
            &b,
            Some(&p),
            OutputSpec::Quantized {
                params: &p,
                dtype: DType::I8,
            },
            &plan,
        )
        .unwrap();
        assert_eq!(y.data_i8().unwrap(), &[2, 6, 12, 8, 15, 24]);
    }

    #[test]
    fn test_missing_params_rejected() {
        let a = Tensor::from_i8(vec![1], Shape::new(vec![1]));
        let b = Tensor::from_i8(vec![1], Shape::new(vec![1]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let err = mul(&a, None, &b, Some(&p), OutputSpec::Dequantized, &plan).unwrap_err();
        assert!(matches!(err, OpError::MissingQuantParams { .. }));
    }

    #[test]
    fn test_unexpected_params_rejected() {
        let a = Tensor::from_f32(vec![1.0], Shape::new(vec![1]));
        let b = Tensor::from_f32(vec![1.0], Shape::new(vec![1]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let err = mul(&a, Some(&p), &b, None, OutputSpec::Dequantized, &plan).unwrap_err();
        assert!(matches!(err, OpError::UnexpectedQuantParams { .. }));
    }

    #[test]
    fn test_float_output_dtype_rejected() {
        let a = Tensor::from_i8(vec![1], Shape::new(vec![1]));
        let b = Tensor::from_i8(vec![1], Shape::new(vec![1]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let err = mul(
            &a,
            Some(&p),
            &b,
            Some(&p),
            OutputSpec::Quantized {
                params: &p,
                dtype: DType::F32,
            },
            &plan,
        )
        .unwrap_err();
        assert!(matches!(err, OpError::InvalidOutputDType(_)));
    }

    #[test]
    fn test_plan_shape_mismatch_rejected() {
        let a = Tensor::from_i8(vec![1, 2], Shape::new(vec![2]));
        let b = Tensor::from_i8(vec![1, 2], Shape::new(vec![2]));
        let p = unit(0);
        let plan = BroadcastPlan::new(&Shape::new(vec![3]), &Shape::new(vec![3]), false, None)
            .unwrap();
        let err = mul(&a, Some(&p), &b, Some(&p), OutputSpec::Dequantized, &plan).unwrap_err();
        assert!(matches!(
            err,
            OpError::Tensor(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_mul_assign_matches_mul() {
        let a_data: Vec<i8> = vec![1, -2, 3, -4, 5, -6];
        let a = Tensor::from_i8(a_data.clone(), Shape::new(vec![2, 3]));
        let b = Tensor::from_i8(vec![2, -3, 4], Shape::new(vec![3]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), true, None).unwrap();

        let expected = mul(
            &a,
            Some(&p),
            &b,
            Some(&p),
            OutputSpec::Quantized {
                params: &p,
                dtype: DType::I8,
            },
            &plan,
        )
        .unwrap();

        let mut inplace = Tensor::from_i8(a_data, Shape::new(vec![2, 3]));
        mul_assign(&mut inplace, &p, &b, Some(&p), &p, &plan).unwrap();
        assert_eq!(
            inplace.data_i8().unwrap(),
            expected.data_i8().unwrap()
        );
    }

    #[test]
    fn test_mul_assign_rejects_broadcast_destination() {
        // The destination must carry the full output shape.
        let mut a = Tensor::from_i8(vec![1, 2, 3], Shape::new(vec![3]));
        let b = Tensor::from_i8(vec![1, 2, 3, 4, 5, 6], Shape::new(vec![2, 3]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), true, None).unwrap();
        let err = mul_assign(&mut a, &p, &b, Some(&p), &p, &plan).unwrap_err();
        assert!(matches!(
            err,
            OpError::Tensor(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_mul_assign_rejects_float_destination() {
        let mut a = Tensor::from_f32(vec![1.0], Shape::new(vec![1]));
        let b = Tensor::from_i8(vec![1], Shape::new(vec![1]));
        let p = unit(0);
        let plan = BroadcastPlan::new(a.shape(), b.shape(), false, None).unwrap();
        let err = mul_assign(&mut a, &p, &b, Some(&p), &p, &plan).unwrap_err();
        assert!(matches!(err, OpError::InvalidOutputDType(_)));
    }
}
