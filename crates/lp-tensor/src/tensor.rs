use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major data with an associated shape and dtype.
/// The shape is immutable; the data is owned by the tensor and mutable
/// through the typed storage accessors.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    dtype: DType,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::F32(data), shape)
    }

    /// Create a new tensor from f16 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f16(data: Vec<f16>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::F16(data), shape)
    }

    /// Create a new tensor from quantized i8 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_i8(data: Vec<i8>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::I8(data), shape)
    }

    /// Create a new tensor from quantized u8 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_u8(data: Vec<u8>, shape: Shape) -> Self {
        Self::from_storage(CpuStorage::U8(data), shape)
    }

    /// Create a tensor from existing storage and a shape.
    ///
    /// # Panics
    /// Panics if `storage.len() != shape.numel()`.
    pub fn from_storage(storage: CpuStorage, shape: Shape) -> Self {
        assert_eq!(
            storage.len(),
            shape.numel(),
            "storage length {} does not match shape {} (numel={})",
            storage.len(),
            shape,
            shape.numel()
        );
        let dtype = storage.dtype();
        Tensor {
            storage,
            shape,
            dtype,
        }
    }

    /// Create a zero-filled tensor with the given dtype and shape.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::zeros(dtype, n),
            shape,
            dtype,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Returns a mutable reference to the underlying storage.
    pub fn storage_mut(&mut self) -> &mut CpuStorage {
        &mut self.storage
    }

    /// Returns the underlying data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the tensor dtype is not F32.
    pub fn data_f32(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns the underlying data as an i8 slice.
    ///
    /// # Errors
    /// Returns an error if the tensor dtype is not I8.
    pub fn data_i8(&self) -> Result<&[i8]> {
        self.storage.as_i8_slice()
    }

    /// Returns the underlying data as a u8 slice.
    ///
    /// # Errors
    /// Returns an error if the tensor dtype is not U8.
    pub fn data_u8(&self) -> Result<&[u8]> {
        self.storage.as_u8_slice()
    }

    /// Copies the tensor's values into an f32 vector, converting F16.
    ///
    /// # Errors
    /// Returns an error for quantized dtypes: recovering real values from
    /// quantized storage requires quantization parameters.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match &self.storage {
            CpuStorage::F32(v) => Ok(v.clone()),
            CpuStorage::F16(v) => Ok(v.iter().map(|x| x.to_f32()).collect()),
            CpuStorage::I8(_) | CpuStorage::U8(_) => Err(TensorError::UnsupportedDType(format!(
                "{} values require dequantization parameters",
                self.dtype
            ))),
        }
    }

    /// Reshape the tensor, returning a new tensor with the same data but
    /// a different shape.
    ///
    /// The total number of elements must remain the same.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            storage: self.storage.clone(),
            shape: new_shape,
            dtype: self.dtype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32() {
        let t = Tensor::from_f32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.data_f32().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_quantized() {
        let t = Tensor::from_u8(vec![0, 128, 255], Shape::new(vec![3]));
        assert_eq!(t.dtype(), DType::U8);
        assert_eq!(t.data_u8().unwrap(), &[0, 128, 255]);
        assert!(t.data_f32().is_err());

        let s = Tensor::from_i8(vec![-128, 127], Shape::new(vec![2]));
        assert_eq!(s.data_i8().unwrap(), &[-128, 127]);
    }

    #[test]
    fn test_zeros() {
        let z = Tensor::zeros(DType::I8, Shape::new(vec![2, 2]));
        assert_eq!(z.data_i8().unwrap(), &[0; 4]);
        assert_eq!(z.dtype(), DType::I8);
    }

    #[test]
    fn test_to_f32_vec() {
        let t = Tensor::from_f16(
            vec![f16::from_f32(1.0), f16::from_f32(-2.5)],
            Shape::new(vec![2]),
        );
        assert_eq!(t.to_f32_vec().unwrap(), vec![1.0, -2.5]);

        let q = Tensor::from_u8(vec![1], Shape::new(vec![1]));
        assert!(q.to_f32_vec().is_err());
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::from_f32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = t.reshape(Shape::new(vec![3, 2])).unwrap();
        assert_eq!(r.shape().dims(), &[3, 2]);
        assert_eq!(r.data_f32().unwrap(), t.data_f32().unwrap());
    }

    #[test]
    fn test_reshape_mismatch() {
        let t = Tensor::from_f32(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        assert!(t.reshape(Shape::new(vec![2, 2])).is_err());
    }

    #[test]
    #[should_panic]
    fn test_len_mismatch_panics() {
        let _t = Tensor::from_f32(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_storage_mut() {
        let mut t = Tensor::from_u8(vec![1, 2], Shape::new(vec![2]));
        t.storage_mut().as_u8_slice_mut().unwrap()[1] = 9;
        assert_eq!(t.data_u8().unwrap(), &[1, 9]);
    }
}
