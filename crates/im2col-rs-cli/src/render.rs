//! Console tables for small tensors and column matrices.

use std::fmt::Write;

use im2col_rs::{ActivationTensor, ColumnMatrix};

/// Only tensors below this element count are printed.
pub const PRINT_LIMIT: usize = 1024;

/// Integers are printed like `%-4.0f`, convolution outputs like `%-8.3f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFormat {
    pub width: usize,
    pub precision: usize,
}

impl CellFormat {
    pub const INTEGER: CellFormat = CellFormat {
        width: 4,
        precision: 0,
    };
    pub const OUTPUT: CellFormat = CellFormat {
        width: 8,
        precision: 3,
    };
}

fn push_cell(out: &mut String, value: f32, format: CellFormat) {
    let _ = write!(
        out,
        "{:<width$.precision$}",
        value,
        width = format.width,
        precision = format.precision
    );
}

/// Prints the tensor in storage order: one line per outermost index, the middle axis separated
/// by tabs.
pub fn activation_block(title: &str, tensor: &ActivationTensor, format: CellFormat) -> String {
    let [outer, middle, inner] = tensor.physical_dims();
    let view = tensor.view();
    let mut out = format!("{title} ({outer}, {middle}, {inner})\n");
    for a in 0..outer {
        for b in 0..middle {
            for c in 0..inner {
                push_cell(&mut out, view.get([a, b, c]), format);
            }
            out.push('\t');
        }
        out.push('\n');
    }
    out
}

/// Prints a channel-major tensor one spatial plane at a time, each followed by `--- <n>`.
pub fn channel_planes(title: &str, tensor: &ActivationTensor, format: CellFormat) -> String {
    let (channels, rows, cols) = (tensor.channels(), tensor.height(), tensor.width());
    let mut out = format!("{title} ({channels}, {rows}, {cols})\n");
    for c in 0..channels {
        for h in 0..rows {
            for w in 0..cols {
                push_cell(&mut out, tensor.at(c, h, w), format);
            }
            out.push('\n');
        }
        let _ = writeln!(out, "--- {}", c + 1);
    }
    out
}

pub fn column_matrix(columns: &ColumnMatrix, format: CellFormat) -> String {
    let mut out = format!("data_col {} x {}\n", columns.rows(), columns.cols());
    for row in 0..columns.rows() {
        for &value in columns.row(row) {
            push_cell(&mut out, value, format);
        }
        out.push('\n');
    }
    out
}
