//! Three-axis activation tensor stored in one of the two activation layouts.

use super::buffer::{AlignedAllocator, AlignedBuffer, BufferAllocator, DEFAULT_ALIGN};
use super::checked_element_count;
use super::invert_perm;
use super::view::TensorView;
use crate::error::{ensure_len, ConvResult};
use crate::layout::{chw_to_hwc, hwc_to_chw, ActivationLayout};

/// Activation with logical shape `(channels, height, width)`.
#[derive(Debug, Clone)]
pub struct ActivationTensor {
    channels: usize,
    height: usize,
    width: usize,
    layout: ActivationLayout,
    data: AlignedBuffer,
}

impl ActivationTensor {
    /// Returns a zero-filled tensor obtained from `allocator`.
    pub fn zeros(
        channels: usize,
        height: usize,
        width: usize,
        layout: ActivationLayout,
        allocator: &impl BufferAllocator,
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[channels, height, width])?;
        let data = allocator.allocate_zeroed(len)?;
        Ok(Self {
            channels,
            height,
            width,
            layout,
            data,
        })
    }

    /// Takes ownership of `data`, which must already be ordered according to `layout`.
    pub fn from_buffer(
        channels: usize,
        height: usize,
        width: usize,
        layout: ActivationLayout,
        data: AlignedBuffer,
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[channels, height, width])?;
        ensure_len("activation buffer", len, data.len())?;
        Ok(Self {
            channels,
            height,
            width,
            layout,
            data,
        })
    }

    /// Copies `values` (ordered according to `layout`) into a freshly aligned buffer.
    pub fn from_slice(
        channels: usize,
        height: usize,
        width: usize,
        layout: ActivationLayout,
        values: &[f32],
    ) -> ConvResult<Self> {
        let len = checked_element_count(&[channels, height, width])?;
        ensure_len("activation values", len, values.len())?;
        let data = AlignedBuffer::from_slice(values, DEFAULT_ALIGN)?;
        Self::from_buffer(channels, height, width, layout, data)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn layout(&self) -> ActivationLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dimensions in physical (storage) order.
    pub fn physical_dims(&self) -> [usize; 3] {
        let logical = [self.channels, self.height, self.width];
        self.layout.perm_from_logical().map(|axis| logical[axis])
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// View over the storage in physical axis order.
    pub fn view(&self) -> TensorView<'_, 3> {
        let dims = self.physical_dims();
        TensorView::contiguous(&self.data, dims)
            .unwrap_or_else(|err| unreachable!("activation invariant violated: {err}"))
    }

    /// View indexed by logical `(c, h, w)` regardless of layout.
    pub fn logical_view(&self) -> TensorView<'_, 3> {
        self.view().permuted(invert_perm(self.layout.perm_from_logical()))
    }

    pub fn at(&self, c: usize, h: usize, w: usize) -> f32 {
        self.logical_view().get([c, h, w])
    }

    /// Returns a fresh, independently owned copy stored in `target` layout.
    pub fn to_layout(&self, target: ActivationLayout) -> ConvResult<Self> {
        self.to_layout_in(target, &AlignedAllocator::new(self.data.align()))
    }

    pub fn to_layout_in(
        &self,
        target: ActivationLayout,
        allocator: &impl BufferAllocator,
    ) -> ConvResult<Self> {
        let (c, h, w) = (self.channels, self.height, self.width);
        let mut out = Self::zeros(c, h, w, target, allocator)?;
        match (self.layout, target) {
            (ActivationLayout::ChannelMajor, ActivationLayout::ChannelMinor) => {
                chw_to_hwc(&self.data, &mut out.data, c, h, w)?
            }
            (ActivationLayout::ChannelMinor, ActivationLayout::ChannelMajor) => {
                hwc_to_chw(&self.data, &mut out.data, c, h, w)?
            }
            _ => out.data.copy_from_slice(&self.data),
        }
        Ok(out)
    }
}
