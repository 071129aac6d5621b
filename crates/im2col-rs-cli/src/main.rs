use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use im2col_rs::conv::im2col;
use im2col_rs::fixtures::{sequential_activation, uniform_activation, uniform_kernel};
use im2col_rs::io::{write_dump, DumpMeta};
use im2col_rs::tensor::AlignedAllocator;
use im2col_rs::{
    compare_layouts, ActivationLayout, GemmConvolution, KernelLayout, RunConfig, Tolerance,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

mod render;

use render::{CellFormat, PRINT_LIMIT};

#[derive(Parser)]
#[command(name = "im2col-rs")]
#[command(about = "im2col + GEMM convolution in channel-major and channel-minor layouts")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convolve random tensors in both layouts, compare, and dump the results
    Conv(ConvArgs),
    /// Print the column matrix of a 1..N input in one layout
    Columns(ColumnsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Chw,
    Hwc,
}

impl From<LayoutArg> for ActivationLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Chw => ActivationLayout::ChannelMajor,
            LayoutArg::Hwc => ActivationLayout::ChannelMinor,
        }
    }
}

#[derive(Args)]
struct ShapeArgs {
    /// JSON file with any of: in_c, in_h, in_w, kernel_size, out_c, stride, padding, seed
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long)]
    in_c: Option<usize>,
    #[arg(long)]
    in_h: Option<usize>,
    #[arg(long)]
    in_w: Option<usize>,
    #[arg(long)]
    kernel_size: Option<usize>,
    #[arg(long)]
    out_c: Option<usize>,
    #[arg(long)]
    stride: Option<usize>,
    #[arg(long)]
    padding: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
}

impl ShapeArgs {
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load_json(path)?,
            None => RunConfig::default(),
        };
        let overrides = [
            (&mut config.in_c, self.in_c),
            (&mut config.in_h, self.in_h),
            (&mut config.in_w, self.in_w),
            (&mut config.kernel_size, self.kernel_size),
            (&mut config.out_c, self.out_c),
            (&mut config.stride, self.stride),
            (&mut config.padding, self.padding),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct ConvArgs {
    #[command(flatten)]
    shape: ShapeArgs,
    /// Directory receiving meta.txt and the raw f32 dumps
    #[arg(long, value_name = "DIR", default_value = ".")]
    dump_dir: PathBuf,
    #[arg(long)]
    no_dump: bool,
    #[arg(long, default_value_t = Tolerance::default().atol)]
    atol: f32,
    #[arg(long, default_value_t = Tolerance::default().rtol)]
    rtol: f32,
}

#[derive(Args)]
struct ColumnsArgs {
    #[command(flatten)]
    shape: ShapeArgs,
    #[arg(long, value_enum, default_value_t = LayoutArg::Chw)]
    layout: LayoutArg,
}

fn setup_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber
            .json()
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Pretty => subscriber.pretty().init(),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn run_conv(args: &ConvArgs) -> Result<bool> {
    let config = args.shape.resolve()?;
    let geometry = config.geometry()?;
    info!(
        in_c = config.in_c,
        in_h = config.in_h,
        in_w = config.in_w,
        kn_size = config.kernel_size,
        out_c = config.out_c,
        stride = config.stride,
        padding = config.padding,
        "convolution shapes"
    );

    let conv = GemmConvolution::new();
    let allocator = conv.allocator();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let input = uniform_activation(config.in_c, config.in_h, config.in_w, &mut rng, allocator)
        .context("failed to create input buffer")?;
    let kernel = uniform_kernel(
        config.out_c,
        config.in_c,
        config.kernel_size,
        config.kernel_size,
        &mut rng,
        allocator,
    )
    .context("failed to create kernel buffer")?;

    let start = Instant::now();
    let chw_out = conv.forward(&input, &kernel, config.padding, config.stride)?;
    info!(elapsed_ms = elapsed_ms(start), "channel-major pipeline finished");

    let hwc_input = input.to_layout_in(ActivationLayout::ChannelMinor, allocator)?;
    let hwio_kernel = kernel.to_layout_in(KernelLayout::SpatialInOut, allocator)?;

    let start = Instant::now();
    let hwc_out = conv.forward(&hwc_input, &hwio_kernel, config.padding, config.stride)?;
    info!(elapsed_ms = elapsed_ms(start), "channel-minor pipeline finished");

    if chw_out.len() < PRINT_LIMIT {
        print!(
            "{}",
            render::activation_block("nchw_out_buf", &chw_out, CellFormat::OUTPUT)
        );
        print!(
            "{}",
            render::activation_block("nhwc_out_buf", &hwc_out, CellFormat::OUTPUT)
        );
    }

    let comparison = compare_layouts(&chw_out, &hwc_out, Tolerance::new(args.atol, args.rtol))?;
    if comparison.is_match() {
        info!(
            elements = comparison.elements,
            max_abs_err = comparison.max_abs_err,
            max_rel_err = comparison.max_rel_err,
            "layouts agree"
        );
    } else {
        warn!(
            mismatches = comparison.mismatches,
            first = ?comparison.first_mismatch,
            max_abs_err = comparison.max_abs_err,
            max_rel_err = comparison.max_rel_err,
            "layouts disagree"
        );
    }

    if !args.no_dump {
        let meta = DumpMeta::new(&geometry, config.out_c)?;
        match write_dump(
            &args.dump_dir,
            &meta,
            &input,
            &kernel,
            &chw_out,
            &hwc_out,
        ) {
            Ok(report) => {
                for (path, err) in &report.failed {
                    warn!(file = %path.display(), error = %err, "incomplete dump");
                }
                info!(
                    dir = %args.dump_dir.display(),
                    files = report.written.len(),
                    "saved cross-validation dump"
                );
            }
            Err(err) => warn!(error = %format!("{err:#}"), "failed saving results"),
        }
    }

    Ok(comparison.is_match())
}

fn run_columns(args: &ColumnsArgs) -> Result<bool> {
    let config = args.shape.resolve()?;
    let geometry = config.geometry()?;
    let layout = ActivationLayout::from(args.layout);
    info!(
        in_c = config.in_c,
        in_h = config.in_h,
        in_w = config.in_w,
        kn = config.kernel_size,
        stride = config.stride,
        padding = config.padding,
        layout = layout.short_name(),
        "column matrix shapes"
    );

    let allocator = AlignedAllocator::default();
    let input = sequential_activation(config.in_c, config.in_h, config.in_w, &allocator)
        .context("failed to create input buffer")?
        .to_layout_in(layout, &allocator)?;

    let start = Instant::now();
    let columns = im2col(&input, &geometry, &allocator)?;
    info!(elapsed_ms = elapsed_ms(start), "im2col finished");

    if input.len() > PRINT_LIMIT {
        return Ok(true);
    }
    match layout {
        ActivationLayout::ChannelMajor => print!(
            "{}",
            render::channel_planes("In NCHW", &input, CellFormat::INTEGER)
        ),
        ActivationLayout::ChannelMinor => print!(
            "{}",
            render::activation_block("In NHWC", &input, CellFormat::INTEGER)
        ),
    }
    println!();
    print!("{}", render::column_matrix(&columns, CellFormat::INTEGER));
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.log_format);

    let outcome = match &cli.command {
        Command::Conv(args) => run_conv(args),
        Command::Columns(args) => run_columns(args),
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
