use std::cell::RefCell;
use std::ffi::CString;

use lp_ops::OpError;
use lp_quant::QuantError;
use lp_tensor::TensorError;

use crate::types::LPStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `lp_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

fn tensor_status(err: &TensorError) -> LPStatus {
    match err {
        TensorError::ShapeMismatch { .. }
        | TensorError::BroadcastError { .. }
        | TensorError::InvalidAxis { .. } => LPStatus::ErrorShape,
        TensorError::DTypeMismatch { .. } | TensorError::UnsupportedDType(_) => {
            LPStatus::ErrorTypeMismatch
        }
    }
}

fn quant_status(err: &QuantError) -> LPStatus {
    match err {
        QuantError::OutOfRange { .. } => LPStatus::ErrorRange,
        QuantError::InvalidScale(_)
        | QuantError::InvalidRange { .. }
        | QuantError::InvalidZeroPoint { .. } => LPStatus::ErrorInvalidArgument,
        QuantError::NotQuantized(_) => LPStatus::ErrorTypeMismatch,
        QuantError::Tensor(t) => tensor_status(t),
    }
}

/// Record an operator error and map it onto a status code.
pub(crate) fn op_status(err: &OpError) -> LPStatus {
    set_last_error(err.to_string());
    match err {
        OpError::MissingQuantParams { .. }
        | OpError::UnexpectedQuantParams { .. }
        | OpError::InvalidOutputDType(_) => LPStatus::ErrorTypeMismatch,
        OpError::Tensor(t) => tensor_status(t),
        OpError::Quant(q) => quant_status(q),
    }
}
