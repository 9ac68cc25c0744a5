use half::f16;
use lp_tensor::{CpuStorage, Tensor, TensorError};

use crate::broadcast::BroadcastPlan;
use crate::error::Result;

enum FloatValues<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
}

impl FloatValues<'_> {
    fn load(&self, off: usize) -> f32 {
        match self {
            FloatValues::F32(v) => v[off],
            FloatValues::F16(v) => v[off].to_f32(),
        }
    }
}

fn float_values(tensor: &Tensor) -> Result<FloatValues<'_>> {
    match tensor.storage() {
        CpuStorage::F32(v) => Ok(FloatValues::F32(v.as_slice())),
        CpuStorage::F16(v) => Ok(FloatValues::F16(v.as_slice())),
        _ => Err(TensorError::DTypeMismatch {
            expected: "f32 or f16".to_string(),
            got: tensor.dtype().to_string(),
        }
        .into()),
    }
}

/// Float elementwise multiply with the same broadcast semantics as the
/// quantized kernel. No quantization anywhere; this is the correctness
/// oracle the quantized pipeline is compared against.
///
/// # Errors
/// Fails with a shape error when an operand does not match the shape the
/// plan was built for, or a dtype error for non-float operands.
pub fn mul_reference(a: &Tensor, b: &Tensor, plan: &BroadcastPlan) -> Result<Tensor> {
    let check = |t: &Tensor, planned: &[usize]| -> Result<()> {
        if t.shape().dims() != planned {
            return Err(TensorError::ShapeMismatch {
                expected: planned.to_vec(),
                got: t.shape().dims().to_vec(),
            }
            .into());
        }
        Ok(())
    };
    check(a, plan.lhs_dims())?;
    check(b, plan.rhs_dims())?;

    let va = float_values(a)?;
    let vb = float_values(b)?;

    let mut out = Vec::with_capacity(plan.out_shape().numel());
    for (la, lb) in plan.offsets() {
        out.push(va.load(la) * vb.load(lb));
    }
    Ok(Tensor::from_f32(out, plan.out_shape().clone()))
}
