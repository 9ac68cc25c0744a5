use lp_quant::QuantError;
use lp_tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpError {
    #[error("{operand} operand has quantized dtype {dtype} but no quantization params")]
    MissingQuantParams {
        operand: &'static str,
        dtype: String,
    },
    #[error("{operand} operand has float dtype {dtype} but quantization params were given")]
    UnexpectedQuantParams {
        operand: &'static str,
        dtype: String,
    },
    #[error("output dtype {0} is not a quantized format")]
    InvalidOutputDType(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("quantization error: {0}")]
    Quant(#[from] QuantError),
}

pub type Result<T> = std::result::Result<T, OpError>;
