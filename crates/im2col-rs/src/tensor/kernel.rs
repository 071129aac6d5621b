//! Four-axis convolution weights stored in one of the two kernel layouts.

use super::buffer::{AlignedAllocator, AlignedBuffer, BufferAllocator, DEFAULT_ALIGN};
use super::checked_element_count;
use super::invert_perm;
use super::view::TensorView;
use crate::error::{ensure_len, ConvResult};
use crate::layout::{hwio_to_oihw, oihw_to_hwio, KernelLayout};

/// Kernel with logical shape `(out_channels, in_channels, kernel_h, kernel_w)`.
#[derive(Debug, Clone)]
pub struct KernelTensor {
    out_channels: usize,
    in_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    layout: KernelLayout,
    data: AlignedBuffer,
}

impl KernelTensor {
    pub fn zeros(
        out_channels: usize,
        in_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        layout: KernelLayout,
        allocator: &impl BufferAllocator,
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[out_channels, in_channels, kernel_h, kernel_w])?;
        let data = allocator.allocate_zeroed(len)?;
        Ok(Self {
            out_channels,
            in_channels,
            kernel_h,
            kernel_w,
            layout,
            data,
        })
    }

    pub fn from_buffer(
        out_channels: usize,
        in_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        layout: KernelLayout,
        data: AlignedBuffer,
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[out_channels, in_channels, kernel_h, kernel_w])?;
        ensure_len("kernel buffer", len, data.len())?;
        Ok(Self {
            out_channels,
            in_channels,
            kernel_h,
            kernel_w,
            layout,
            data,
        })
    }

    pub fn from_slice(
        out_channels: usize,
        in_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        layout: KernelLayout,
        values: &[f32],
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[out_channels, in_channels, kernel_h, kernel_w])?;
        ensure_len("kernel values", len, values.len())?;
        let data = AlignedBuffer::from_slice(values, DEFAULT_ALIGN)?;
        Self::from_buffer(out_channels, in_channels, kernel_h, kernel_w, layout, data)
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn kernel_h(&self) -> usize {
        self.kernel_h
    }

    pub fn kernel_w(&self) -> usize {
        self.kernel_w
    }

    pub fn layout(&self) -> KernelLayout {
        self.layout
    }

    pub fn physical_dims(&self) -> [usize; 4] {
        let logical = [
            self.out_channels,
            self.in_channels,
            self.kernel_h,
            self.kernel_w,
        ];
        self.layout.perm_from_logical().map(|axis| logical[axis])
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn view(&self) -> TensorView<'_, 4> {
        let dims = self.physical_dims();
        TensorView::contiguous(&self.data, dims)
            .unwrap_or_else(|err| unreachable!("kernel invariant violated: {err}"))
    }

    /// View indexed by logical `(oc, ic, kh, kw)` regardless of layout.
    pub fn logical_view(&self) -> TensorView<'_, 4> {
        self.view().permuted(invert_perm(self.layout.perm_from_logical()))
    }

    pub fn at(&self, oc: usize, ic: usize, kh: usize, kw: usize) -> f32 {
        self.logical_view().get([oc, ic, kh, kw])
    }

    /// Returns a fresh, independently owned copy stored in `target` layout.
    pub fn to_layout(&self, target: KernelLayout) -> ConvResult<Self> {
        self.to_layout_in(target, &AlignedAllocator::new(self.data.align()))
    }

    pub fn to_layout_in(
        &self,
        target: KernelLayout,
        allocator: &impl BufferAllocator,
    ) -> ConvResult<Self> {
        let (o, i, h, w) = (
            self.out_channels,
            self.in_channels,
            self.kernel_h,
            self.kernel_w,
        );
        let mut out = Self::zeros(o, i, h, w, target, allocator)?;
        match (self.layout, target) {
            (KernelLayout::OutInSpatial, KernelLayout::SpatialInOut) => {
                oihw_to_hwio(&self.data, &mut out.data, o, i, h, w)?
            }
            (KernelLayout::SpatialInOut, KernelLayout::OutInSpatial) => {
                hwio_to_oihw(&self.data, &mut out.data, o, i, h, w)?
            }
            _ => out.data.copy_from_slice(&self.data),
        }
        Ok(out)
    }
}
