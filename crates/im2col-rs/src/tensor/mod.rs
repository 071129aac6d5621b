//! Core tensor abstractions: aligned storage, strided views, and the activation and kernel
//! tensors the convolution pipelines operate on.

use crate::error::{ConvError, ConvResult};

mod activation;
pub mod buffer;
mod kernel;
mod view;

pub use activation::ActivationTensor;
pub use buffer::{AlignedAllocator, AlignedBuffer, BufferAllocator, DEFAULT_ALIGN};
pub use kernel::KernelTensor;
pub use view::{TensorView, TensorViewMut};

/// Computes `product(dims)` with overflow checking.
pub fn checked_element_count(dims: &[usize]) -> ConvResult<usize> {
    dims.iter().try_fold(1usize, |count, &dim| {
        count
            .checked_mul(dim)
            .ok_or(ConvError::Overflow("tensor element count"))
    })
}

/// Returns `inv` such that `perm[inv[j]] == j`.
pub(crate) fn invert_perm<const N: usize>(perm: [usize; N]) -> [usize; N] {
    let mut inv = [0usize; N];
    for (axis, &p) in perm.iter().enumerate() {
        inv[p] = axis;
    }
    inv
}
