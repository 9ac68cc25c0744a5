use lp_quant::QuantizationParams;

use crate::error::set_last_error;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LPStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorShape = 2,
    ErrorRange = 3,
    ErrorTypeMismatch = 4,
    ErrorInternal = 5,
}

/// Affine quantization parameters for one tensor buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LPQuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl LPQuantParams {
    /// Convert to the engine's parameter type, recording a last-error
    /// message and returning `None` on an invalid scale.
    pub(crate) fn to_params(self) -> Option<QuantizationParams> {
        match QuantizationParams::new(self.scale, self.zero_point) {
            Ok(p) => Some(p),
            Err(e) => {
                set_last_error(e.to_string());
                None
            }
        }
    }
}
