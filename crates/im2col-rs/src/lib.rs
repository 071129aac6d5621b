//! Convolution via im2col and a single GEMM, in channel-major and channel-minor layouts.
//!
//! Both layouts run the same pipeline: build a column matrix from the input
//! ([`conv::im2col`]), then multiply it with the kernel ([`conv::GemmConvolution`]). The
//! [`layout`] converters derive one layout's tensors from the other's, and [`compare`] checks
//! that both pipelines agree.

pub mod compare;
pub mod config;
pub mod conv;
pub mod error;
pub mod fixtures;
pub mod io;
pub mod layout;
pub mod tensor;

pub use compare::{compare_layouts, LayoutComparison, Tolerance};
pub use config::RunConfig;
pub use conv::{ColumnMatrix, ConvGeometry, GemmConvolution};
pub use error::{ConvError, ConvResult};
pub use layout::{ActivationLayout, KernelLayout};
pub use tensor::{ActivationTensor, KernelTensor};
