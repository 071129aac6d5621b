//! Run configuration shared by the drivers.

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::conv::ConvGeometry;
use crate::fixtures::DEFAULT_SEED;

/// Shapes and seed for one convolution run. Missing JSON fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub in_c: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub kernel_size: usize,
    pub out_c: usize,
    pub stride: usize,
    pub padding: usize,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            in_c: 2,
            in_h: 4,
            in_w: 4,
            kernel_size: 3,
            out_c: 2,
            stride: 1,
            padding: 0,
            seed: DEFAULT_SEED,
        }
    }
}

impl RunConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("in_c", self.in_c),
            ("in_h", self.in_h),
            ("in_w", self.in_w),
            ("kernel_size", self.kernel_size),
            ("out_c", self.out_c),
            ("stride", self.stride),
        ] {
            ensure!(value > 0, "{name} must be positive");
        }
        self.geometry()?;
        Ok(())
    }

    pub fn geometry(&self) -> Result<ConvGeometry> {
        ConvGeometry::square(
            self.in_c,
            self.in_h,
            self.in_w,
            self.kernel_size,
            self.padding,
            self.stride,
        )
        .context("configuration does not describe a valid convolution")
    }
}
