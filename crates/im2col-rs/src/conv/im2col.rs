//! Column-matrix builders for both activation layouts.
//!
//! Channel-major input produces a `(K, N)` matrix: one row per `(channel, kh, kw)` and one
//! column per output position. Channel-minor input produces an `(N, K)` matrix: one row per
//! output position, columns ordered `(kh, kw, channel)` with channel fastest. Samples that fall
//! outside the input are written as `0.0`; no other boundary policy exists.

use super::geometry::ConvGeometry;
use crate::error::{ensure_len, ConvError, ConvResult};
use crate::layout::ActivationLayout;
use crate::tensor::{AlignedBuffer, ActivationTensor, BufferAllocator, TensorView};

/// Receptive-field patches of one input laid out as a dense row-major matrix.
#[derive(Debug, Clone)]
pub struct ColumnMatrix {
    rows: usize,
    cols: usize,
    layout: ActivationLayout,
    data: AlignedBuffer,
}

impl ColumnMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn layout(&self) -> ActivationLayout {
        self.layout
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn at(&self, row: usize, col: usize) -> f32 {
        debug_assert!(col < self.cols, "column {col} out of range {}", self.cols);
        self.data[row * self.cols + col]
    }
}

/// Fills a column matrix from an input stored in one specific layout.
pub trait ColumnBuilder: Send + Sync {
    fn layout(&self) -> ActivationLayout;

    /// `(rows, cols)` of the column matrix for `geometry`.
    fn column_shape(&self, geometry: &ConvGeometry) -> (usize, usize);

    /// Writes every entry of `dst` from `src`.
    ///
    /// `src` must hold `in_c·in_h·in_w` samples in [`ColumnBuilder::layout`] order and `dst`
    /// exactly `K·N` entries.
    fn fill(&self, geometry: &ConvGeometry, src: &[f32], dst: &mut [f32]) -> ConvResult<()>;
}

/// Builder for `(C, H, W)` input.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelMajorColumns;

/// Builder for `(H, W, C)` input.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelMinorColumns;

/// Selects the builder matching `layout`.
pub fn column_builder(layout: ActivationLayout) -> &'static dyn ColumnBuilder {
    match layout {
        ActivationLayout::ChannelMajor => &ChannelMajorColumns,
        ActivationLayout::ChannelMinor => &ChannelMinorColumns,
    }
}

fn check_buffers(geometry: &ConvGeometry, src: &[f32], dst: &[f32]) -> ConvResult<()> {
    ensure_len("im2col input", geometry.input_len(), src.len())?;
    ensure_len("column matrix", geometry.column_len(), dst.len())
}

impl ColumnBuilder for ChannelMajorColumns {
    fn layout(&self) -> ActivationLayout {
        ActivationLayout::ChannelMajor
    }

    fn column_shape(&self, geometry: &ConvGeometry) -> (usize, usize) {
        (geometry.k(), geometry.n())
    }

    fn fill(&self, geometry: &ConvGeometry, src: &[f32], dst: &mut [f32]) -> ConvResult<()> {
        check_buffers(geometry, src, dst)?;
        let dims = [geometry.in_channels(), geometry.in_h(), geometry.in_w()];
        let image = TensorView::contiguous(src, dims)?;

        let n = geometry.n();
        let (out_h, out_w) = (geometry.out_h(), geometry.out_w());
        let (in_h, in_w) = (geometry.in_h() as isize, geometry.in_w() as isize);
        let padding = geometry.padding() as isize;
        let stride = geometry.stride();

        for ch in 0..geometry.in_channels() {
            for kh in 0..geometry.kernel_h() {
                for kw in 0..geometry.kernel_w() {
                    let row = (ch * geometry.kernel_h() + kh) * geometry.kernel_w() + kw;
                    let dst_row = &mut dst[row * n..(row + 1) * n];
                    for oh in 0..out_h {
                        let ih = (oh * stride + kh) as isize - padding;
                        let dst_run = &mut dst_row[oh * out_w..(oh + 1) * out_w];
                        if ih < 0 || ih >= in_h {
                            dst_run.fill(0.0);
                            continue;
                        }
                        for (ow, slot) in dst_run.iter_mut().enumerate() {
                            let iw = (ow * stride + kw) as isize - padding;
                            *slot = if iw < 0 || iw >= in_w {
                                0.0
                            } else {
                                image.get([ch, ih as usize, iw as usize])
                            };
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl ColumnBuilder for ChannelMinorColumns {
    fn layout(&self) -> ActivationLayout {
        ActivationLayout::ChannelMinor
    }

    fn column_shape(&self, geometry: &ConvGeometry) -> (usize, usize) {
        (geometry.n(), geometry.k())
    }

    fn fill(&self, geometry: &ConvGeometry, src: &[f32], dst: &mut [f32]) -> ConvResult<()> {
        check_buffers(geometry, src, dst)?;
        let c_in = geometry.in_channels();
        let image = TensorView::contiguous(src, [geometry.in_h(), geometry.in_w(), c_in])?;

        let k = geometry.k();
        let (k_h, k_w) = (geometry.kernel_h(), geometry.kernel_w());
        let (in_h, in_w) = (geometry.in_h() as isize, geometry.in_w() as isize);
        let padding = geometry.padding() as isize;
        let stride = geometry.stride();
        // One kernel row of an interior patch is a single contiguous run in HWC storage.
        let run = k_w * c_in;

        for oh in 0..geometry.out_h() {
            for ow in 0..geometry.out_w() {
                let row = oh * geometry.out_w() + ow;
                let dst_row = &mut dst[row * k..(row + 1) * k];
                let tl_h = (oh * stride) as isize - padding;
                let tl_w = (ow * stride) as isize - padding;

                let interior = tl_h >= 0
                    && tl_w >= 0
                    && tl_h + k_h as isize <= in_h
                    && tl_w + k_w as isize <= in_w;
                if interior {
                    for kh in 0..k_h {
                        let start = image.offset([tl_h as usize + kh, tl_w as usize, 0]);
                        let dst_run = &mut dst_row[kh * run..(kh + 1) * run];
                        dst_run.copy_from_slice(&src[start..start + run]);
                    }
                    continue;
                }

                for kh in 0..k_h {
                    let ih = tl_h + kh as isize;
                    for kw in 0..k_w {
                        let iw = tl_w + kw as isize;
                        let col = (kh * k_w + kw) * c_in;
                        let patch = &mut dst_row[col..col + c_in];
                        if ih < 0 || ih >= in_h || iw < 0 || iw >= in_w {
                            patch.fill(0.0);
                        } else {
                            let start = image.offset([ih as usize, iw as usize, 0]);
                            patch.copy_from_slice(&src[start..start + c_in]);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds the column matrix of `input`, choosing the builder from the input's layout.
pub fn im2col(
    input: &ActivationTensor,
    geometry: &ConvGeometry,
    allocator: &impl BufferAllocator,
) -> ConvResult<ColumnMatrix> {
    let actual = [input.channels(), input.height(), input.width()];
    let expected = [geometry.in_channels(), geometry.in_h(), geometry.in_w()];
    if actual != expected {
        return Err(ConvError::geometry(format!(
            "input shape {actual:?} does not match geometry {expected:?}"
        )));
    }

    let builder = column_builder(input.layout());
    let (rows, cols) = builder.column_shape(geometry);
    let mut data = allocator.allocate_zeroed(geometry.column_len())?;
    tracing::debug!(
        layout = builder.layout().short_name(),
        rows,
        cols,
        padding = geometry.padding(),
        stride = geometry.stride(),
        "building column matrix"
    );
    builder.fill(geometry, input.data(), &mut data)?;
    Ok(ColumnMatrix {
        rows,
        cols,
        layout: builder.layout(),
        data,
    })
}
