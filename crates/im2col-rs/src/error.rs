//! Error type shared by the transform, conversion, and composition routines.

use thiserror::Error;

use crate::layout::{ActivationLayout, KernelLayout};

/// Failure surfaced by a core routine.
///
/// None of these are recoverable mid-transform: each one is reported before any destination
/// buffer is touched, so callers never observe a partially written result.
#[derive(Debug, Error)]
pub enum ConvError {
    #[error("failed to allocate {elements} f32 elements aligned to {align} bytes")]
    Allocation { elements: usize, align: usize },
    #[error("{what} holds {actual} elements, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid convolution geometry: {0}")]
    InvalidGeometry(String),
    #[error("activation layout {activation:?} cannot be paired with kernel layout {kernel:?}")]
    LayoutMismatch {
        activation: ActivationLayout,
        kernel: KernelLayout,
    },
    #[error("{0} overflows usize")]
    Overflow(&'static str),
}

impl ConvError {
    pub fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        ConvError::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        ConvError::InvalidGeometry(message.into())
    }
}

/// Convenience alias for results returned by core routines.
pub type ConvResult<T> = Result<T, ConvError>;

/// Fails unless `actual` equals `expected`.
pub(crate) fn ensure_len(what: &'static str, expected: usize, actual: usize) -> ConvResult<()> {
    if actual != expected {
        return Err(ConvError::mismatch(what, expected, actual));
    }
    Ok(())
}
