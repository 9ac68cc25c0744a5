use lp_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuantError {
    #[error("invalid scale {0}: must be a positive finite value")]
    InvalidScale(f32),
    #[error("invalid value range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },
    #[error("zero point {zero_point} outside representable range [{qmin}, {qmax}]")]
    InvalidZeroPoint {
        zero_point: i32,
        qmin: i32,
        qmax: i32,
    },
    #[error("value {value} quantizes outside [{qmin}, {qmax}]")]
    OutOfRange { value: f32, qmin: i32, qmax: i32 },
    #[error("dtype {0} is not a quantized format")]
    NotQuantized(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, QuantError>;
