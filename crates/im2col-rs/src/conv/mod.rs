//! Convolution as im2col followed by a single matrix multiply.
//!
//! The channel-major pipeline multiplies the kernel `(out_c × K)` by the column matrix
//! `(K × N)` and yields output in `(C, H, W)` order. The channel-minor pipeline multiplies the
//! column matrix `(N × K)` by the kernel `(K × out_c)` and yields `(H, W, C)`. Given inputs
//! related by the layout converters, both outputs describe the same convolution.

pub mod gemm;
pub mod geometry;
pub mod im2col;

use crate::error::{ConvError, ConvResult};
use crate::layout::ActivationLayout;
use crate::tensor::{ActivationTensor, AlignedAllocator, BufferAllocator, KernelTensor};

pub use gemm::{FaerGemm, ReferenceGemm, Sgemm};
pub use geometry::{output_extent, ConvGeometry, GemmDims};
pub use im2col::{
    column_builder, im2col, ChannelMajorColumns, ChannelMinorColumns, ColumnBuilder, ColumnMatrix,
};

/// Composes im2col with a GEMM primitive.
#[derive(Debug, Clone)]
pub struct GemmConvolution<G = FaerGemm, A = AlignedAllocator> {
    gemm: G,
    allocator: A,
}

impl GemmConvolution {
    pub fn new() -> Self {
        Self::with_parts(FaerGemm::default(), AlignedAllocator::default())
    }
}

impl Default for GemmConvolution {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Sgemm, A: BufferAllocator> GemmConvolution<G, A> {
    pub fn with_parts(gemm: G, allocator: A) -> Self {
        Self { gemm, allocator }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Validates that `input` and `kernel` can be convolved and derives the geometry.
    pub fn geometry(
        &self,
        input: &ActivationTensor,
        kernel: &KernelTensor,
        padding: usize,
        stride: usize,
    ) -> ConvResult<ConvGeometry> {
        if input.layout().kernel_layout() != kernel.layout() {
            return Err(ConvError::LayoutMismatch {
                activation: input.layout(),
                kernel: kernel.layout(),
            });
        }
        if kernel.in_channels() != input.channels() {
            return Err(ConvError::mismatch(
                "kernel input channels",
                input.channels(),
                kernel.in_channels(),
            ));
        }
        ConvGeometry::new(
            input.channels(),
            input.height(),
            input.width(),
            kernel.kernel_h(),
            kernel.kernel_w(),
            padding,
            stride,
        )
    }

    /// Runs im2col then the layout-specific product.
    pub fn forward(
        &self,
        input: &ActivationTensor,
        kernel: &KernelTensor,
        padding: usize,
        stride: usize,
    ) -> ConvResult<ActivationTensor> {
        let geometry = self.geometry(input, kernel, padding, stride)?;
        let columns = im2col(input, &geometry, &self.allocator)?;
        self.compose(&columns, kernel, &geometry)
    }

    /// Multiplies a column matrix with the kernel, operand order chosen by the layout.
    pub fn compose(
        &self,
        columns: &ColumnMatrix,
        kernel: &KernelTensor,
        geometry: &ConvGeometry,
    ) -> ConvResult<ActivationTensor> {
        let layout = columns.layout();
        if layout.kernel_layout() != kernel.layout() {
            return Err(ConvError::LayoutMismatch {
                activation: layout,
                kernel: kernel.layout(),
            });
        }
        if kernel.in_channels() != geometry.in_channels()
            || kernel.kernel_h() != geometry.kernel_h()
            || kernel.kernel_w() != geometry.kernel_w()
        {
            return Err(ConvError::geometry(format!(
                "kernel {:?} does not match geometry ({}, {}, {})",
                kernel.physical_dims(),
                geometry.in_channels(),
                geometry.kernel_h(),
                geometry.kernel_w()
            )));
        }

        let out_c = kernel.out_channels();
        let dims = GemmDims::for_layout(layout, geometry, out_c);
        let (expected_rows, expected_cols) = column_builder(layout).column_shape(geometry);
        if columns.rows() != expected_rows || columns.cols() != expected_cols {
            return Err(ConvError::mismatch(
                "column matrix",
                expected_rows * expected_cols,
                columns.rows() * columns.cols(),
            ));
        }

        let mut output = ActivationTensor::zeros(
            out_c,
            geometry.out_h(),
            geometry.out_w(),
            layout,
            &self.allocator,
        )?;
        tracing::debug!(
            layout = layout.short_name(),
            m = dims.m,
            n = dims.n,
            k = dims.k,
            "composing convolution gemm"
        );
        match layout {
            ActivationLayout::ChannelMajor => {
                self.gemm
                    .sgemm(dims, kernel.data(), columns.data(), output.data_mut())?
            }
            ActivationLayout::ChannelMinor => {
                self.gemm
                    .sgemm(dims, columns.data(), kernel.data(), output.data_mut())?
            }
        }
        Ok(output)
    }
}
