//! Shape derivation for im2col convolution.

use crate::error::{ConvError, ConvResult};
use crate::layout::ActivationLayout;
use crate::tensor::checked_element_count;

/// Output extent along one spatial axis: `⌊(input − kernel + 2·padding) / stride⌋ + 1`.
pub fn output_extent(
    input: usize,
    kernel: usize,
    padding: usize,
    stride: usize,
) -> ConvResult<usize> {
    if stride == 0 {
        return Err(ConvError::geometry("stride must be at least 1"));
    }
    if kernel == 0 {
        return Err(ConvError::geometry("kernel extent must be at least 1"));
    }
    let padded = padding
        .checked_mul(2)
        .and_then(|p| p.checked_add(input))
        .ok_or(ConvError::Overflow("padded input extent"))?;
    if kernel > padded {
        return Err(ConvError::geometry(format!(
            "kernel extent {kernel} exceeds padded input extent {padded}"
        )));
    }
    Ok((padded - kernel) / stride + 1)
}

/// Everything im2col needs to know about one convolution.
///
/// Only [`ConvGeometry::new`] builds one, so the output extents always follow
/// [`output_extent`] and every derived size fits in `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    in_channels: usize,
    in_h: usize,
    in_w: usize,
    kernel_h: usize,
    kernel_w: usize,
    padding: usize,
    stride: usize,
    out_h: usize,
    out_w: usize,
}

impl ConvGeometry {
    pub fn new(
        in_channels: usize,
        in_h: usize,
        in_w: usize,
        kernel_h: usize,
        kernel_w: usize,
        padding: usize,
        stride: usize,
    ) -> ConvResult<Self> {
        if in_channels == 0 {
            return Err(ConvError::geometry("input must have at least one channel"));
        }
        let out_h = output_extent(in_h, kernel_h, padding, stride)?;
        let out_w = output_extent(in_w, kernel_w, padding, stride)?;
        checked_element_count(&[in_channels, in_h, in_w])?;
        checked_element_count(&[in_channels, kernel_h, kernel_w, out_h, out_w])
            .map_err(|_| ConvError::Overflow("column matrix size"))?;
        Ok(Self {
            in_channels,
            in_h,
            in_w,
            kernel_h,
            kernel_w,
            padding,
            stride,
            out_h,
            out_w,
        })
    }

    /// Square-kernel shorthand used by the drivers.
    pub fn square(
        in_channels: usize,
        in_h: usize,
        in_w: usize,
        kernel_size: usize,
        padding: usize,
        stride: usize,
    ) -> ConvResult<Self> {
        Self::new(
            in_channels,
            in_h,
            in_w,
            kernel_size,
            kernel_size,
            padding,
            stride,
        )
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn in_h(&self) -> usize {
        self.in_h
    }

    pub fn in_w(&self) -> usize {
        self.in_w
    }

    pub fn kernel_h(&self) -> usize {
        self.kernel_h
    }

    pub fn kernel_w(&self) -> usize {
        self.kernel_w
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn out_h(&self) -> usize {
        self.out_h
    }

    pub fn out_w(&self) -> usize {
        self.out_w
    }

    /// Receptive-field length: `kernel_h · kernel_w · in_channels`.
    pub fn k(&self) -> usize {
        self.kernel_h * self.kernel_w * self.in_channels
    }

    /// Number of output spatial positions: `out_h · out_w`.
    pub fn n(&self) -> usize {
        self.out_h * self.out_w
    }

    pub fn input_len(&self) -> usize {
        self.in_channels * self.in_h * self.in_w
    }

    /// Element count of the column matrix, `K · N`.
    pub fn column_len(&self) -> usize {
        self.k() * self.n()
    }

    pub fn output_len(&self, out_channels: usize) -> ConvResult<usize> {
        self.n()
            .checked_mul(out_channels)
            .ok_or(ConvError::Overflow("output tensor size"))
    }
}

/// Operand shape of the row-major product `C[m×n] = A[m×k] · B[k×n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmDims {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl GemmDims {
    /// Channel-major: kernel `(out_c × K)` times columns `(K × N)`.
    /// Channel-minor: columns `(N × K)` times kernel `(K × out_c)`.
    pub fn for_layout(
        layout: ActivationLayout,
        geometry: &ConvGeometry,
        out_channels: usize,
    ) -> Self {
        let k = geometry.k();
        let positions = geometry.n();
        match layout {
            ActivationLayout::ChannelMajor => GemmDims {
                m: out_channels,
                n: positions,
                k,
            },
            ActivationLayout::ChannelMinor => GemmDims {
                m: positions,
                n: out_channels,
                k,
            },
        }
    }
}
