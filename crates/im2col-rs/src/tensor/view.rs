//! Strided views over flat `f32` buffers.
//!
//! A view carries the dimensions and strides of one physical axis ordering. The linear index
//! of `index` is always `Σ index[i] * strides[i]`; debug builds check every coordinate against
//! its dimension, release builds only rely on slice indexing.

use crate::error::{ConvError, ConvResult};
use crate::tensor::checked_element_count;

fn contiguous_strides<const N: usize>(dims: [usize; N]) -> [usize; N] {
    let mut strides = [0usize; N];
    let mut stride = 1usize;
    for axis in (0..N).rev() {
        strides[axis] = stride;
        stride *= dims[axis];
    }
    strides
}

#[inline]
fn linear_offset<const N: usize>(
    dims: &[usize; N],
    strides: &[usize; N],
    index: [usize; N],
) -> usize {
    let mut offset = 0usize;
    for axis in 0..N {
        debug_assert!(
            index[axis] < dims[axis],
            "index {} out of bounds for axis {} of extent {}",
            index[axis],
            axis,
            dims[axis]
        );
        offset += index[axis] * strides[axis];
    }
    offset
}

fn permute_axes<const N: usize>(values: &[usize; N], perm: [usize; N]) -> [usize; N] {
    let mut seen = [false; N];
    let mut out = [0usize; N];
    for (axis, &p) in perm.iter().enumerate() {
        assert!(p < N, "permutation index {p} out of range for rank {N}");
        assert!(!seen[p], "duplicate index {p} in permutation");
        seen[p] = true;
        out[axis] = values[p];
    }
    out
}

/// Read-only strided view.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a, const N: usize> {
    data: &'a [f32],
    dims: [usize; N],
    strides: [usize; N],
}

impl<'a, const N: usize> TensorView<'a, N> {
    /// Wraps a dense row-major buffer whose length must equal the product of `dims`.
    pub fn contiguous(data: &'a [f32], dims: [usize; N]) -> ConvResult<Self> {
        let expected = checked_element_count(&dims)?;
        if data.len() != expected {
            return Err(ConvError::mismatch("source tensor", expected, data.len()));
        }
        Ok(Self {
            data,
            dims,
            strides: contiguous_strides(dims),
        })
    }

    pub fn dims(&self) -> [usize; N] {
        self.dims
    }

    #[inline]
    pub fn offset(&self, index: [usize; N]) -> usize {
        linear_offset(&self.dims, &self.strides, index)
    }

    #[inline]
    pub fn get(&self, index: [usize; N]) -> f32 {
        self.data[self.offset(index)]
    }

    /// Returns a view whose axis `i` is this view's axis `perm[i]`. No data moves.
    pub fn permuted(&self, perm: [usize; N]) -> Self {
        Self {
            data: self.data,
            dims: permute_axes(&self.dims, perm),
            strides: permute_axes(&self.strides, perm),
        }
    }
}

/// Mutable strided view.
#[derive(Debug)]
pub struct TensorViewMut<'a, const N: usize> {
    data: &'a mut [f32],
    dims: [usize; N],
    strides: [usize; N],
}

impl<'a, const N: usize> TensorViewMut<'a, N> {
    /// Wraps a dense row-major destination whose length must equal the product of `dims`.
    pub fn contiguous(data: &'a mut [f32], dims: [usize; N]) -> ConvResult<Self> {
        let expected = checked_element_count(&dims)?;
        if data.len() != expected {
            return Err(ConvError::mismatch(
                "destination tensor",
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            data,
            dims,
            strides: contiguous_strides(dims),
        })
    }

    #[inline]
    pub fn offset(&self, index: [usize; N]) -> usize {
        linear_offset(&self.dims, &self.strides, index)
    }

    #[inline]
    pub fn set(&mut self, index: [usize; N], value: f32) {
        let offset = self.offset(index);
        self.data[offset] = value;
    }
}
