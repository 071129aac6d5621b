//! Cross-validation dump: a one-line shape description plus headerless little-endian `f32`
//! files for the input, kernel and both outputs.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::conv::ConvGeometry;
use crate::layout::{ActivationLayout, KernelLayout};
use crate::tensor::{ActivationTensor, KernelTensor};

pub const META_FILE: &str = "meta.txt";
pub const INPUT_FILE: &str = "in_buf.bin";
pub const KERNEL_FILE: &str = "kn_buf.bin";
pub const CHANNEL_MAJOR_OUT_FILE: &str = "nchw_out.bin";
pub const CHANNEL_MINOR_OUT_FILE: &str = "nhwc_out.bin";

/// Every file a complete dump consists of, metadata first.
pub const DUMP_FILES: [&str; 5] = [
    META_FILE,
    INPUT_FILE,
    KERNEL_FILE,
    CHANNEL_MAJOR_OUT_FILE,
    CHANNEL_MINOR_OUT_FILE,
];

const META_KEYS: [&str; 9] = [
    "in_c", "in_h", "in_w", "kn_size", "out_c", "out_h", "out_w", "stride", "padding",
];

/// Shape metadata a reference tool needs to interpret the raw dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpMeta {
    pub in_c: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub kn_size: usize,
    pub out_c: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub stride: usize,
    pub padding: usize,
}

impl DumpMeta {
    /// The text format has a single kernel extent, so `geometry` must use a square kernel.
    pub fn new(geometry: &ConvGeometry, out_c: usize) -> Result<Self> {
        ensure!(
            geometry.kernel_h() == geometry.kernel_w(),
            "dump metadata requires a square kernel, got {}x{}",
            geometry.kernel_h(),
            geometry.kernel_w()
        );
        Ok(Self {
            in_c: geometry.in_channels(),
            in_h: geometry.in_h(),
            in_w: geometry.in_w(),
            kn_size: geometry.kernel_h(),
            out_c,
            out_h: geometry.out_h(),
            out_w: geometry.out_w(),
            stride: geometry.stride(),
            padding: geometry.padding(),
        })
    }

    fn values(&self) -> [usize; 9] {
        [
            self.in_c,
            self.in_h,
            self.in_w,
            self.kn_size,
            self.out_c,
            self.out_h,
            self.out_w,
            self.stride,
            self.padding,
        ]
    }
}

impl fmt::Display for DumpMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in META_KEYS.iter().zip(self.values()).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

impl FromStr for DumpMeta {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut values = [None::<usize>; 9];
        for field in line.trim().split(',') {
            let (key, value) = field
                .split_once(':')
                .ok_or_else(|| anyhow!("malformed metadata field '{}'", field.trim()))?;
            let key = key.trim();
            let slot = META_KEYS
                .iter()
                .position(|k| *k == key)
                .ok_or_else(|| anyhow!("unknown metadata key '{key}'"))?;
            let value = value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("metadata key '{key}' is not a non-negative integer"))?;
            values[slot] = Some(value);
        }
        let mut resolved = [0usize; 9];
        for (slot, (value, key)) in values.iter().zip(META_KEYS).enumerate() {
            resolved[slot] = value.ok_or_else(|| anyhow!("metadata is missing key '{key}'"))?;
        }
        let [in_c, in_h, in_w, kn_size, out_c, out_h, out_w, stride, padding] = resolved;
        Ok(Self {
            in_c,
            in_h,
            in_w,
            kn_size,
            out_c,
            out_h,
            out_w,
            stride,
            padding,
        })
    }
}

/// Writes `data` as contiguous little-endian f32 with no header.
///
/// On failure the error reports how many of the requested elements reached the writer.
pub fn write_f32_raw(path: impl AsRef<Path>, data: &[f32]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed opening {} for writing", path.display()))?;
    let mut writer = BufWriter::new(file);
    for (written, value) in data.iter().enumerate() {
        if let Err(err) = writer.write_all(&value.to_le_bytes()) {
            bail!(
                "wrote {written}/{} elements to {}: {err}",
                data.len(),
                path.display()
            );
        }
    }
    writer.flush().with_context(|| {
        format!(
            "failed flushing {} elements to {}",
            data.len(),
            path.display()
        )
    })?;
    Ok(())
}

/// Reads a headerless little-endian f32 file.
pub fn read_f32_raw(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .with_context(|| format!("failed reading {}", path.display()))?;
    ensure!(
        bytes.len() % 4 == 0,
        "{} holds {} bytes, not a whole number of f32 values",
        path.display(),
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// What a best-effort dump managed to write.
#[derive(Debug, Default)]
pub struct DumpReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl DumpReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes the metadata line and the four raw tensors into `dir`.
///
/// Failing to create `dir` or write the metadata aborts the dump; a failure on any raw file
/// is recorded in the report and the remaining files are still attempted.
pub fn write_dump(
    dir: impl AsRef<Path>,
    meta: &DumpMeta,
    input: &ActivationTensor,
    kernel: &KernelTensor,
    channel_major_out: &ActivationTensor,
    channel_minor_out: &ActivationTensor,
) -> Result<DumpReport> {
    ensure!(
        input.layout() == ActivationLayout::ChannelMajor,
        "input must be dumped in channel-major layout"
    );
    ensure!(
        kernel.layout() == KernelLayout::OutInSpatial,
        "kernel must be dumped in oihw layout"
    );
    ensure!(
        channel_major_out.layout() == ActivationLayout::ChannelMajor
            && channel_minor_out.layout() == ActivationLayout::ChannelMinor,
        "outputs must be dumped in their native layouts"
    );

    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let meta_path = dir.join(META_FILE);
    fs::write(&meta_path, format!("{meta}\n"))
        .with_context(|| format!("failed saving results to {}", meta_path.display()))?;

    let mut report = DumpReport {
        written: vec![meta_path],
        failed: Vec::new(),
    };
    let tensors: [(&str, &[f32]); 4] = [
        (INPUT_FILE, input.data()),
        (KERNEL_FILE, kernel.data()),
        (CHANNEL_MAJOR_OUT_FILE, channel_major_out.data()),
        (CHANNEL_MINOR_OUT_FILE, channel_minor_out.data()),
    ];
    for (name, data) in tensors {
        let path = dir.join(name);
        match write_f32_raw(&path, data) {
            Ok(()) => report.written.push(path),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "dump write failed");
                report.failed.push((path, format!("{err:#}")));
            }
        }
    }
    Ok(report)
}
