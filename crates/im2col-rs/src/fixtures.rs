//! Deterministic tensor initialisation from a caller-supplied random source.

use rand::Rng;

use crate::error::ConvResult;
use crate::layout::{ActivationLayout, KernelLayout};
use crate::tensor::{ActivationTensor, BufferAllocator, KernelTensor};

/// Seed the drivers use when none is configured.
pub const DEFAULT_SEED: u64 = 15;

/// Draws a value in `[-1, 1)`.
fn signed_unit(rng: &mut impl Rng) -> f32 {
    2.0 * rng.gen::<f32>() - 1.0
}

/// Channel-major activation with samples uniform in `[-1, 1)`.
pub fn uniform_activation(
    channels: usize,
    height: usize,
    width: usize,
    rng: &mut impl Rng,
    allocator: &impl BufferAllocator,
) -> ConvResult<ActivationTensor> {
    let mut tensor = ActivationTensor::zeros(
        channels,
        height,
        width,
        ActivationLayout::ChannelMajor,
        allocator,
    )?;
    for slot in tensor.data_mut() {
        *slot = signed_unit(rng);
    }
    Ok(tensor)
}

/// `(O, I, H, W)` kernel with weights uniform in `[-1, 1)`.
pub fn uniform_kernel(
    out_channels: usize,
    in_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    rng: &mut impl Rng,
    allocator: &impl BufferAllocator,
) -> ConvResult<KernelTensor> {
    let mut kernel = KernelTensor::zeros(
        out_channels,
        in_channels,
        kernel_h,
        kernel_w,
        KernelLayout::OutInSpatial,
        allocator,
    )?;
    for slot in kernel.data_mut() {
        *slot = signed_unit(rng);
    }
    Ok(kernel)
}

/// Channel-major activation holding `1, 2, 3, …` in storage order.
pub fn sequential_activation(
    channels: usize,
    height: usize,
    width: usize,
    allocator: &impl BufferAllocator,
) -> ConvResult<ActivationTensor> {
    let mut tensor = ActivationTensor::zeros(
        channels,
        height,
        width,
        ActivationLayout::ChannelMajor,
        allocator,
    )?;
    for (i, slot) in tensor.data_mut().iter_mut().enumerate() {
        *slot = i as f32 + 1.0;
    }
    Ok(tensor)
}
