//! Elementwise comparison of convolution outputs produced in different layouts.

use crate::error::{ConvError, ConvResult};
use crate::tensor::ActivationTensor;

/// Absolute plus relative tolerance: `|actual − expected| ≤ atol + rtol·|expected|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f32,
    pub rtol: f32,
}

impl Tolerance {
    pub const EXACT: Tolerance = Tolerance {
        atol: 0.0,
        rtol: 0.0,
    };

    pub fn new(atol: f32, rtol: f32) -> Self {
        Self { atol, rtol }
    }

    pub fn allows(&self, actual: f32, expected: f32) -> bool {
        if actual.is_nan() || expected.is_nan() {
            return false;
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

impl Default for Tolerance {
    /// Summation order differs between the two operand arrangements, so exact equality is
    /// not guaranteed.
    fn default() -> Self {
        Self {
            atol: 1e-5,
            rtol: 1e-5,
        }
    }
}

/// Outcome of comparing two activations element by element.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutComparison {
    pub elements: usize,
    pub max_abs_err: f32,
    pub max_rel_err: f32,
    pub mismatches: usize,
    /// Logical `(c, h, w)` of the first element outside tolerance.
    pub first_mismatch: Option<[usize; 3]>,
}

impl LayoutComparison {
    pub fn is_match(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compares `actual` against `expected` after re-expressing `actual` in `expected`'s layout.
pub fn compare_layouts(
    expected: &ActivationTensor,
    actual: &ActivationTensor,
    tolerance: Tolerance,
) -> ConvResult<LayoutComparison> {
    let expected_dims = [expected.channels(), expected.height(), expected.width()];
    let actual_dims = [actual.channels(), actual.height(), actual.width()];
    if expected_dims != actual_dims {
        return Err(ConvError::geometry(format!(
            "cannot compare activation {actual_dims:?} against {expected_dims:?}"
        )));
    }

    let aligned = actual.to_layout(expected.layout())?;
    let view = expected.view();
    let mut comparison = LayoutComparison {
        elements: expected.len(),
        max_abs_err: 0.0,
        max_rel_err: 0.0,
        mismatches: 0,
        first_mismatch: None,
    };

    for (offset, (&want, &got)) in expected.data().iter().zip(aligned.data()).enumerate() {
        let abs_err = (got - want).abs();
        let rel_err = if abs_err == 0.0 {
            0.0
        } else if want == 0.0 {
            f32::INFINITY
        } else {
            abs_err / want.abs()
        };
        comparison.max_abs_err = comparison.max_abs_err.max(abs_err);
        comparison.max_rel_err = comparison.max_rel_err.max(rel_err);

        if !tolerance.allows(got, want) {
            comparison.mismatches += 1;
            if comparison.first_mismatch.is_none() {
                comparison.first_mismatch = Some(logical_index(expected, view.dims(), offset));
            }
        }
    }
    Ok(comparison)
}

fn logical_index(
    tensor: &ActivationTensor,
    physical_dims: [usize; 3],
    offset: usize,
) -> [usize; 3] {
    let inner = physical_dims[1] * physical_dims[2];
    let physical = [
        offset / inner,
        (offset % inner) / physical_dims[2],
        offset % physical_dims[2],
    ];
    let mut logical = [0usize; 3];
    for (axis, &p) in tensor.layout().perm_from_logical().iter().enumerate() {
        logical[p] = physical[axis];
    }
    logical
}
