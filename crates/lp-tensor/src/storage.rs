use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// CPU-side tensor storage: one contiguous, row-major buffer per dtype.
#[derive(Debug, Clone)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// 16-bit floating point storage.
    F16(Vec<f16>),
    /// 8-bit signed quantized storage.
    I8(Vec<i8>),
    /// 8-bit unsigned quantized storage.
    U8(Vec<u8>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
            CpuStorage::I8(v) => v.len(),
            CpuStorage::U8(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::I8(_) => DType::I8,
            CpuStorage::U8(_) => DType::U8,
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
            DType::I8 => CpuStorage::I8(vec![0; n]),
            DType::U8 => CpuStorage::U8(vec![0; n]),
        }
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as a mutable f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice_mut(&mut self) -> Result<&mut [f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_mut_slice()),
            other => Err(dtype_mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as an f16 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F16.
    pub fn as_f16_slice(&self) -> Result<&[f16]> {
        match self {
            CpuStorage::F16(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::F16, other.dtype())),
        }
    }

    /// Returns the data as an i8 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not I8.
    pub fn as_i8_slice(&self) -> Result<&[i8]> {
        match self {
            CpuStorage::I8(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::I8, other.dtype())),
        }
    }

    /// Returns the data as a mutable i8 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not I8.
    pub fn as_i8_slice_mut(&mut self) -> Result<&mut [i8]> {
        match self {
            CpuStorage::I8(v) => Ok(v.as_mut_slice()),
            other => Err(dtype_mismatch(DType::I8, other.dtype())),
        }
    }

    /// Returns the data as a u8 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not U8.
    pub fn as_u8_slice(&self) -> Result<&[u8]> {
        match self {
            CpuStorage::U8(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::U8, other.dtype())),
        }
    }

    /// Returns the data as a mutable u8 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not U8.
    pub fn as_u8_slice_mut(&mut self) -> Result<&mut [u8]> {
        match self {
            CpuStorage::U8(v) => Ok(v.as_mut_slice()),
            other => Err(dtype_mismatch(DType::U8, other.dtype())),
        }
    }
}

fn dtype_mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
