//! Single-precision matrix multiply primitives.
//!
//! All implementations compute `C = A · B` over dense row-major operands with no transposition
//! (alpha = 1, beta = 0): whatever `c` held before the call is overwritten.

use std::env;
use std::sync::OnceLock;

use faer::linalg::matmul::matmul;
use faer::mat::{MatMut, MatRef};
use faer::{Accum, Par};

use super::geometry::GemmDims;
use crate::error::{ensure_len, ConvError, ConvResult};

/// Row-major, no-transpose `C[m×n] = A[m×k] · B[k×n]`.
pub trait Sgemm {
    fn sgemm(&self, dims: GemmDims, a: &[f32], b: &[f32], c: &mut [f32]) -> ConvResult<()>;
}

fn check_operands(dims: GemmDims, a: &[f32], b: &[f32], c: &[f32]) -> ConvResult<()> {
    let GemmDims { m, n, k } = dims;
    let a_len = m.checked_mul(k).ok_or(ConvError::Overflow("gemm lhs size"))?;
    let b_len = k.checked_mul(n).ok_or(ConvError::Overflow("gemm rhs size"))?;
    let c_len = m.checked_mul(n).ok_or(ConvError::Overflow("gemm output size"))?;
    ensure_len("gemm lhs", a_len, a.len())?;
    ensure_len("gemm rhs", b_len, b.len())?;
    ensure_len("gemm output", c_len, c.len())
}

/// Set to a truthy value to pin [`FaerGemm::default`] to one thread.
const SEQUENTIAL_ENV: &str = "IM2COL_RS_SEQUENTIAL";

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    ["1", "true", "yes", "on"]
        .iter()
        .any(|word| value.eq_ignore_ascii_case(word))
}

fn sequential_requested() -> bool {
    static SEQUENTIAL: OnceLock<bool> = OnceLock::new();
    *SEQUENTIAL.get_or_init(|| env::var(SEQUENTIAL_ENV).is_ok_and(|v| is_truthy(&v)))
}

/// GEMM backed by `faer`.
#[derive(Debug, Clone, Copy)]
pub struct FaerGemm {
    par: Par,
}

impl FaerGemm {
    pub fn new(par: Par) -> Self {
        Self { par }
    }

    pub fn sequential() -> Self {
        Self::new(Par::Seq)
    }
}

impl Default for FaerGemm {
    /// Uses faer's global parallelism unless `IM2COL_RS_SEQUENTIAL` is set.
    fn default() -> Self {
        if sequential_requested() {
            return Self::sequential();
        }
        let par = faer::get_global_parallelism();
        if par.degree() == 1 {
            Self::sequential()
        } else {
            Self::new(par)
        }
    }
}

impl Sgemm for FaerGemm {
    fn sgemm(&self, dims: GemmDims, a: &[f32], b: &[f32], c: &mut [f32]) -> ConvResult<()> {
        check_operands(dims, a, b, c)?;
        let GemmDims { m, n, k } = dims;
        if m == 0 || n == 0 {
            return Ok(());
        }
        if k == 0 {
            c.fill(0.0);
            return Ok(());
        }

        let a_view = MatRef::from_row_major_slice(a, m, k);
        let b_view = MatRef::from_row_major_slice(b, k, n);

        // faer prefers column-major output. Computing C^T = B^T · A^T into a column-major
        // (n × m) view leaves `c` holding row-major C without a copy.
        let a_t = a_view.transpose();
        let b_t = b_view.transpose();
        let mut out_view = MatMut::from_column_major_slice_mut(c, n, m);
        matmul(&mut out_view, Accum::Replace, b_t, a_t, 1.0f32, self.par);
        Ok(())
    }
}

/// Straightforward triple loop, accumulating over `k` in index order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceGemm;

impl Sgemm for ReferenceGemm {
    fn sgemm(&self, dims: GemmDims, a: &[f32], b: &[f32], c: &mut [f32]) -> ConvResult<()> {
        check_operands(dims, a, b, c)?;
        let GemmDims { m, n, k } = dims;
        for i in 0..m {
            let a_row = &a[i * k..(i + 1) * k];
            let c_row = &mut c[i * n..(i + 1) * n];
            c_row.fill(0.0);
            for (p, &a_ip) in a_row.iter().enumerate() {
                let b_row = &b[p * n..(p + 1) * n];
                for (slot, &b_pj) in c_row.iter_mut().zip(b_row) {
                    *slot += a_ip * b_pj;
                }
            }
        }
        Ok(())
    }
}
