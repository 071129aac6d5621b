//! Pure index-remapping routines between layouts.
//!
//! Every routine writes each destination element exactly once and performs no arithmetic on
//! the values, so a forward conversion followed by its inverse is bit-exact.

use crate::error::ConvResult;
use crate::tensor::{TensorView, TensorViewMut};

/// `dst[h·cols·channels + w·channels + c] = src[c·rows·cols + h·cols + w]`.
pub fn chw_to_hwc(
    src: &[f32],
    dst: &mut [f32],
    channels: usize,
    rows: usize,
    cols: usize,
) -> ConvResult<()> {
    let chw = TensorView::contiguous(src, [channels, rows, cols])?;
    let mut hwc = TensorViewMut::contiguous(dst, [rows, cols, channels])?;
    for h in 0..rows {
        for w in 0..cols {
            for c in 0..channels {
                hwc.set([h, w, c], chw.get([c, h, w]));
            }
        }
    }
    Ok(())
}

/// Inverse of [`chw_to_hwc`].
pub fn hwc_to_chw(
    src: &[f32],
    dst: &mut [f32],
    channels: usize,
    rows: usize,
    cols: usize,
) -> ConvResult<()> {
    let hwc = TensorView::contiguous(src, [rows, cols, channels])?;
    let mut chw = TensorViewMut::contiguous(dst, [channels, rows, cols])?;
    for c in 0..channels {
        for h in 0..rows {
            for w in 0..cols {
                chw.set([c, h, w], hwc.get([h, w, c]));
            }
        }
    }
    Ok(())
}

/// `dst[((h·cols + w)·in_c + ic)·out_c + oc] = src[((oc·in_c + ic)·rows + h)·cols + w]`.
pub fn oihw_to_hwio(
    src: &[f32],
    dst: &mut [f32],
    out_c: usize,
    in_c: usize,
    rows: usize,
    cols: usize,
) -> ConvResult<()> {
    let oihw = TensorView::contiguous(src, [out_c, in_c, rows, cols])?;
    let mut hwio = TensorViewMut::contiguous(dst, [rows, cols, in_c, out_c])?;
    for h in 0..rows {
        for w in 0..cols {
            for ic in 0..in_c {
                for oc in 0..out_c {
                    hwio.set([h, w, ic, oc], oihw.get([oc, ic, h, w]));
                }
            }
        }
    }
    Ok(())
}

/// Inverse of [`oihw_to_hwio`].
pub fn hwio_to_oihw(
    src: &[f32],
    dst: &mut [f32],
    out_c: usize,
    in_c: usize,
    rows: usize,
    cols: usize,
) -> ConvResult<()> {
    let hwio = TensorView::contiguous(src, [rows, cols, in_c, out_c])?;
    let mut oihw = TensorViewMut::contiguous(dst, [out_c, in_c, rows, cols])?;
    for oc in 0..out_c {
        for ic in 0..in_c {
            for h in 0..rows {
                for w in 0..cols {
                    oihw.set([oc, ic, h, w], hwio.get([h, w, ic, oc]));
                }
            }
        }
    }
    Ok(())
}
