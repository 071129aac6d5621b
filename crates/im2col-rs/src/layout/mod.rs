//! Tensor layout tags and the conversions between them.
//!
//! Activations come in two total orderings of `(channel, row, col)` and kernels in two
//! orderings of `(out_channel, in_channel, row, col)`. Each activation layout has exactly one
//! kernel layout it is convolved with.

mod convert;

pub use convert::{chw_to_hwc, hwc_to_chw, hwio_to_oihw, oihw_to_hwio};

/// Physical axis ordering of an activation tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationLayout {
    /// `(C, H, W)`: channel varies slowest.
    ChannelMajor,
    /// `(H, W, C)`: channel varies fastest.
    ChannelMinor,
}

impl ActivationLayout {
    /// Physical axis `i` holds logical axis `perm[i]` of `(c, h, w)`.
    pub const fn perm_from_logical(self) -> [usize; 3] {
        match self {
            ActivationLayout::ChannelMajor => [0, 1, 2],
            ActivationLayout::ChannelMinor => [1, 2, 0],
        }
    }

    /// Kernel layout whose GEMM operand order matches this activation layout.
    pub const fn kernel_layout(self) -> KernelLayout {
        match self {
            ActivationLayout::ChannelMajor => KernelLayout::OutInSpatial,
            ActivationLayout::ChannelMinor => KernelLayout::SpatialInOut,
        }
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            ActivationLayout::ChannelMajor => "chw",
            ActivationLayout::ChannelMinor => "hwc",
        }
    }
}

/// Physical axis ordering of a convolution kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelLayout {
    /// `(O, I, H, W)`: out-channel varies slowest.
    OutInSpatial,
    /// `(H, W, I, O)`: kernel position varies slowest, out-channel fastest.
    SpatialInOut,
}

impl KernelLayout {
    /// Physical axis `i` holds logical axis `perm[i]` of `(o, i, h, w)`.
    pub const fn perm_from_logical(self) -> [usize; 4] {
        match self {
            KernelLayout::OutInSpatial => [0, 1, 2, 3],
            KernelLayout::SpatialInOut => [2, 3, 1, 0],
        }
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            KernelLayout::OutInSpatial => "oihw",
            KernelLayout::SpatialInOut => "hwio",
        }
    }
}
