use lp_tensor::{Shape, TensorError};

use crate::error::Result;

/// Iteration plan for one elementwise binary invocation.
///
/// Holds the output shape plus, for each operand, the dims it was planned
/// for and a stride vector of output rank with stride 0 on broadcast axes.
/// Computed once per invocation and discarded after use.
#[derive(Debug, Clone)]
pub struct BroadcastPlan {
    out_shape: Shape,
    lhs_dims: Vec<usize>,
    rhs_dims: Vec<usize>,
    lhs_strides: Vec<usize>,
    rhs_strides: Vec<usize>,
}

impl BroadcastPlan {
    /// Plan the elementwise iteration for two operand shapes.
    ///
    /// With `broadcast` disabled the shapes must be identical and the plan
    /// is trivial. With it enabled and no `axis`, the shorter shape is
    /// right-aligned against the longer one (numpy rules: each aligned pair
    /// must be equal or contain a 1; output dim is the pair max). With an
    /// `axis`, the shorter shape is placed starting at that axis of the
    /// longer one and positions outside the placed window count as 1.
    ///
    /// # Errors
    /// `ShapeMismatch` when `broadcast` is false and the shapes differ,
    /// `InvalidAxis` when the placed window does not fit, and
    /// `BroadcastError` for incompatible aligned dims.
    pub fn new(
        lhs: &Shape,
        rhs: &Shape,
        broadcast: bool,
        axis: Option<usize>,
    ) -> Result<BroadcastPlan> {
        if !broadcast {
            if lhs.dims() != rhs.dims() {
                return Err(TensorError::ShapeMismatch {
                    expected: lhs.dims().to_vec(),
                    got: rhs.dims().to_vec(),
                }
                .into());
            }
            let natural = lhs.strides();
            return Ok(BroadcastPlan {
                out_shape: lhs.clone(),
                lhs_dims: lhs.dims().to_vec(),
                rhs_dims: rhs.dims().to_vec(),
                lhs_strides: natural.clone(),
                rhs_strides: natural,
            });
        }

        // The shorter-ranked operand is the one placed; on a rank tie the
        // right-hand operand is.
        let (long, short, short_is_lhs) = if lhs.ndim() >= rhs.ndim() {
            (lhs, rhs, false)
        } else {
            (rhs, lhs, true)
        };
        let rank = long.ndim();

        let offset = match axis {
            Some(k) => {
                if k + short.ndim() > rank {
                    return Err(TensorError::InvalidAxis { axis: k, ndim: rank }.into());
                }
                k
            }
            None => rank - short.ndim(),
        };

        let mut short_padded = vec![1usize; rank];
        short_padded[offset..offset + short.ndim()].copy_from_slice(short.dims());

        let mut out_dims = vec![0usize; rank];
        for i in 0..rank {
            let (dl, ds) = (long.dim(i), short_padded[i]);
            if dl == ds || dl == 1 || ds == 1 {
                out_dims[i] = dl.max(ds);
            } else {
                return Err(TensorError::BroadcastError {
                    a: lhs.dims().to_vec(),
                    b: rhs.dims().to_vec(),
                }
                .into());
            }
        }

        // Natural row-major strides per operand, zeroed on size-1 dims so
        // broadcast axes always read offset 0.
        let long_natural = long.strides();
        let mut long_strides = vec![0usize; rank];
        for i in 0..rank {
            if long.dim(i) != 1 {
                long_strides[i] = long_natural[i];
            }
        }

        let short_natural = short.strides();
        let mut short_strides = vec![0usize; rank];
        for (j, &d) in short.dims().iter().enumerate() {
            if d != 1 {
                short_strides[offset + j] = short_natural[j];
            }
        }

        let (lhs_strides, rhs_strides) = if short_is_lhs {
            (short_strides, long_strides)
        } else {
            (long_strides, short_strides)
        };

        Ok(BroadcastPlan {
            out_shape: Shape::new(out_dims),
            lhs_dims: lhs.dims().to_vec(),
            rhs_dims: rhs.dims().to_vec(),
            lhs_strides,
            rhs_strides,
        })
    }

    /// Shape of the elementwise output.
    pub fn out_shape(&self) -> &Shape {
        &self.out_shape
    }

    /// The left operand dims this plan was built for.
    pub fn lhs_dims(&self) -> &[usize] {
        &self.lhs_dims
    }

    /// The right operand dims this plan was built for.
    pub fn rhs_dims(&self) -> &[usize] {
        &self.rhs_dims
    }

    /// Per-output-dim strides of the left operand (0 on broadcast axes).
    pub fn lhs_strides(&self) -> &[usize] {
        &self.lhs_strides
    }

    /// Per-output-dim strides of the right operand (0 on broadcast axes).
    pub fn rhs_strides(&self) -> &[usize] {
        &self.rhs_strides
    }

    /// Iterate the output in row-major order, yielding the flat source
    /// offset of each operand for every output element.
    pub fn offsets(&self) -> OffsetIter<'_> {
        OffsetIter {
            dims: self.out_shape.dims(),
            lhs_strides: &self.lhs_strides,
            rhs_strides: &self.rhs_strides,
            index: vec![0; self.out_shape.ndim()],
            lhs_off: 0,
            rhs_off: 0,
            remaining: self.out_shape.numel(),
        }
    }
}

/// Odometer over the output index space; O(1) amortized per element.
pub struct OffsetIter<'a> {
    dims: &'a [usize],
    lhs_strides: &'a [usize],
    rhs_strides: &'a [usize],
    index: Vec<usize>,
    lhs_off: usize,
    rhs_off: usize,
    remaining: usize,
}

impl Iterator for OffsetIter<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let item = (self.lhs_off, self.rhs_off);

        for d in (0..self.dims.len()).rev() {
            self.index[d] += 1;
            self.lhs_off += self.lhs_strides[d];
            self.rhs_off += self.rhs_strides[d];
            if self.index[d] < self.dims[d] {
                break;
            }
            self.index[d] = 0;
            self.lhs_off -= self.lhs_strides[d] * self.dims[d];
            self.rhs_off -= self.rhs_strides[d] * self.dims[d];
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
