//! `lp-ffi` - C boundary for lowp-engine.
//!
//! Exposes the uint8 quantize -> multiply -> dequantize pipeline over raw
//! buffers. All functions return an `LPStatus`; on failure a description is
//! stored for retrieval via `lp_last_error`. Panics never cross the
//! boundary.

mod error;
mod types;

pub use error::*;
pub use types::*;

use std::ffi::CString;
use std::os::raw::c_char;

use lp_ops::{mul, BroadcastPlan, OutputSpec};
use lp_quant::{dequantize, quantize, RangePolicy};
use lp_tensor::{DType, Shape, Tensor};

/// Execute a closure that returns an `LPStatus`, catching any panics
/// and converting them into `LPStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> LPStatus + std::panic::UnwindSafe>(f: F) -> LPStatus {
    match std::panic::catch_unwind(f) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            LPStatus::ErrorInternal
        }
    }
}

/// Build a shape from a raw dims buffer. `ndim == 0` describes a scalar.
unsafe fn shape_from_raw(dims: *const usize, ndim: usize) -> Option<Shape> {
    if ndim > 0 && dims.is_null() {
        set_last_error("dims is null".to_string());
        return None;
    }
    let dims = if ndim == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(dims, ndim)
    };
    Some(Shape::from_slice(dims))
}

fn axis_from_raw(axis: i64) -> Option<usize> {
    if axis < 0 {
        None
    } else {
        Some(axis as usize)
    }
}

/// Quantize `len` f32 values into u8 with the given params, saturating
/// out-of-range values.
#[no_mangle]
pub unsafe extern "C" fn lp_quantize_u8(
    input: *const f32,
    len: usize,
    params: LPQuantParams,
    output: *mut u8,
) -> LPStatus {
    catch_panic(|| {
        if input.is_null() || output.is_null() {
            set_last_error("null argument".to_string());
            return LPStatus::ErrorInvalidArgument;
        }
        let p = match params.to_params() {
            Some(p) => p,
            None => return LPStatus::ErrorInvalidArgument,
        };
        let data = unsafe { std::slice::from_raw_parts(input, len) };
        let tensor = Tensor::from_f32(data.to_vec(), Shape::new(vec![len]));
        match quantize(&tensor, &p, DType::U8, RangePolicy::Saturate) {
            Ok(q) => {
                let out = unsafe { std::slice::from_raw_parts_mut(output, len) };
                out.copy_from_slice(q.data_u8().expect("quantize produced u8"));
                LPStatus::Ok
            }
            Err(e) => op_status(&e.into()),
        }
    })
}

/// Dequantize `len` u8 values back to f32 with the given params.
#[no_mangle]
pub unsafe extern "C" fn lp_dequantize_u8(
    input: *const u8,
    len: usize,
    params: LPQuantParams,
    output: *mut f32,
) -> LPStatus {
    catch_panic(|| {
        if input.is_null() || output.is_null() {
            set_last_error("null argument".to_string());
            return LPStatus::ErrorInvalidArgument;
        }
        let p = match params.to_params() {
            Some(p) => p,
            None => return LPStatus::ErrorInvalidArgument,
        };
        let data = unsafe { std::slice::from_raw_parts(input, len) };
        let tensor = Tensor::from_u8(data.to_vec(), Shape::new(vec![len]));
        match dequantize(&tensor, &p) {
            Ok(d) => {
                let out = unsafe { std::slice::from_raw_parts_mut(output, len) };
                out.copy_from_slice(d.data_f32().expect("dequantize produced f32"));
                LPStatus::Ok
            }
            Err(e) => op_status(&e.into()),
        }
    })
}

/// Compute the broadcast output shape for two operand shapes.
///
/// `axis < 0` means no axis (numpy-style trailing alignment). On success,
/// writes the output rank into `*out_ndim` and the dims into `out_dims`,
/// which must have capacity for `max(a_ndim, b_ndim)` entries.
#[no_mangle]
pub unsafe extern "C" fn lp_mul_out_shape(
    a_dims: *const usize,
    a_ndim: usize,
    b_dims: *const usize,
    b_ndim: usize,
    broadcast: bool,
    axis: i64,
    out_dims: *mut usize,
    out_ndim: *mut usize,
) -> LPStatus {
    catch_panic(|| {
        if out_dims.is_null() || out_ndim.is_null() {
            set_last_error("null argument".to_string());
            return LPStatus::ErrorInvalidArgument;
        }
        let sa = match unsafe { shape_from_raw(a_dims, a_ndim) } {
            Some(s) => s,
            None => return LPStatus::ErrorInvalidArgument,
        };
        let sb = match unsafe { shape_from_raw(b_dims, b_ndim) } {
            Some(s) => s,
            None => return LPStatus::ErrorInvalidArgument,
        };
        match BroadcastPlan::new(&sa, &sb, broadcast, axis_from_raw(axis)) {
            Ok(plan) => {
                let dims = plan.out_shape().dims();
                unsafe {
                    *out_ndim = dims.len();
                    let out = std::slice::from_raw_parts_mut(out_dims, dims.len());
                    out.copy_from_slice(dims);
                }
                LPStatus::Ok
            }
            Err(e) => op_status(&e),
        }
    })
}

unsafe fn run_mul_u8(
    a: *const u8,
    a_dims: *const usize,
    a_ndim: usize,
    a_params: LPQuantParams,
    b: *const u8,
    b_dims: *const usize,
    b_ndim: usize,
    b_params: LPQuantParams,
    broadcast: bool,
    axis: i64,
    output_len: usize,
    out_params: Option<LPQuantParams>,
) -> Result<Tensor, LPStatus> {
    if a.is_null() || b.is_null() {
        set_last_error("null argument".to_string());
        return Err(LPStatus::ErrorInvalidArgument);
    }
    let sa = shape_from_raw(a_dims, a_ndim).ok_or(LPStatus::ErrorInvalidArgument)?;
    let sb = shape_from_raw(b_dims, b_ndim).ok_or(LPStatus::ErrorInvalidArgument)?;
    let pa = a_params
        .to_params()
        .ok_or(LPStatus::ErrorInvalidArgument)?;
    let pb = b_params
        .to_params()
        .ok_or(LPStatus::ErrorInvalidArgument)?;

    let plan = BroadcastPlan::new(&sa, &sb, broadcast, axis_from_raw(axis))
        .map_err(|e| op_status(&e))?;
    if plan.out_shape().numel() != output_len {
        set_last_error(format!(
            "output buffer holds {} elements but the broadcast output shape {} has {}",
            output_len,
            plan.out_shape(),
            plan.out_shape().numel()
        ));
        return Err(LPStatus::ErrorShape);
    }

    let ta = Tensor::from_u8(std::slice::from_raw_parts(a, sa.numel()).to_vec(), sa);
    let tb = Tensor::from_u8(std::slice::from_raw_parts(b, sb.numel()).to_vec(), sb);

    match out_params {
        Some(raw) => {
            let p = raw.to_params().ok_or(LPStatus::ErrorInvalidArgument)?;
            mul(
                &ta,
                Some(&pa),
                &tb,
                Some(&pb),
                OutputSpec::Quantized {
                    params: &p,
                    dtype: DType::U8,
                },
                &plan,
            )
            .map_err(|e| op_status(&e))
        }
        None => mul(&ta, Some(&pa), &tb, Some(&pb), OutputSpec::Dequantized, &plan)
            .map_err(|e| op_status(&e)),
    }
}

/// Quantized elementwise multiply over two u8 buffers, requantizing the
/// product into u8 with `out_params`.
///
/// `axis < 0` means no axis. `output` must hold exactly the broadcast
/// output element count (see `lp_mul_out_shape`).
#[no_mangle]
pub unsafe extern "C" fn lp_mul_u8(
    a: *const u8,
    a_dims: *const usize,
    a_ndim: usize,
    a_params: LPQuantParams,
    b: *const u8,
    b_dims: *const usize,
    b_ndim: usize,
    b_params: LPQuantParams,
    broadcast: bool,
    axis: i64,
    out_params: LPQuantParams,
    output: *mut u8,
    output_len: usize,
) -> LPStatus {
    catch_panic(|| {
        if output.is_null() {
            set_last_error("null argument".to_string());
            return LPStatus::ErrorInvalidArgument;
        }
        match unsafe {
            run_mul_u8(
                a,
                a_dims,
                a_ndim,
                a_params,
                b,
                b_dims,
                b_ndim,
                b_params,
                broadcast,
                axis,
                output_len,
                Some(out_params),
            )
        } {
            Ok(y) => {
                let out = unsafe { std::slice::from_raw_parts_mut(output, output_len) };
                out.copy_from_slice(y.data_u8().expect("quantized multiply produced u8"));
                LPStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Quantized elementwise multiply over two u8 buffers, dequantizing the
/// product directly into an f32 buffer.
#[no_mangle]
pub unsafe extern "C" fn lp_mul_dequantized_u8(
    a: *const u8,
    a_dims: *const usize,
    a_ndim: usize,
    a_params: LPQuantParams,
    b: *const u8,
    b_dims: *const usize,
    b_ndim: usize,
    b_params: LPQuantParams,
    broadcast: bool,
    axis: i64,
    output: *mut f32,
    output_len: usize,
) -> LPStatus {
    catch_panic(|| {
        if output.is_null() {
            set_last_error("null argument".to_string());
            return LPStatus::ErrorInvalidArgument;
        }
        match unsafe {
            run_mul_u8(
                a,
                a_dims,
                a_ndim,
                a_params,
                b,
                b_dims,
                b_ndim,
                b_params,
                broadcast,
                axis,
                output_len,
                None,
            )
        } {
            Ok(y) => {
                let out = unsafe { std::slice::from_raw_parts_mut(output, output_len) };
                out.copy_from_slice(y.data_f32().expect("dequantized multiply produced f32"));
                LPStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `lp_free_string`.
#[no_mangle]
pub extern "C" fn lp_last_error() -> *const c_char {
    match take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `lp_last_error`.
#[no_mangle]
pub unsafe extern "C" fn lp_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
