use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use im2col_rs::fixtures::{uniform_activation, uniform_kernel};
use im2col_rs::io::{read_f32_raw, write_dump, write_f32_raw, DumpMeta, DUMP_FILES};
use im2col_rs::tensor::AlignedAllocator;
use im2col_rs::{ActivationLayout, ConvGeometry, GemmConvolution, KernelLayout};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn unique_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "im2col_rs_{tag}_{}_{nanos}",
        std::process::id()
    ))
}

#[test]
fn meta_line_lists_every_key_in_order() {
    let geometry = ConvGeometry::square(2, 4, 4, 3, 0, 1).unwrap();
    let meta = DumpMeta::new(&geometry, 2).unwrap();
    assert_eq!(
        meta.to_string(),
        "in_c: 2, in_h: 4, in_w: 4, kn_size: 3, out_c: 2, out_h: 2, out_w: 2, stride: 1, padding: 0"
    );
    let parsed: DumpMeta = meta.to_string().parse().unwrap();
    assert_eq!(parsed, meta);
}

#[test]
fn meta_parsing_accepts_any_key_order_and_rejects_gaps() {
    let shuffled = "padding: 1, stride: 2, out_w: 3, out_h: 4, out_c: 5, \
                    kn_size: 3, in_w: 6, in_h: 7, in_c: 8\n";
    let parsed: DumpMeta = shuffled.parse().unwrap();
    assert_eq!(parsed.in_c, 8);
    assert_eq!(parsed.padding, 1);
    assert_eq!(parsed.out_h, 4);

    let missing = "in_c: 2, in_h: 4, in_w: 4".parse::<DumpMeta>();
    assert!(missing.unwrap_err().to_string().contains("missing key"));
    assert!("in_c: two".parse::<DumpMeta>().is_err());
    assert!("depth: 3".parse::<DumpMeta>().is_err());
}

#[test]
fn meta_requires_square_kernel() {
    let geometry = ConvGeometry::new(1, 4, 4, 3, 1, 0, 1).unwrap();
    assert!(DumpMeta::new(&geometry, 1).is_err());
}

#[test]
fn raw_file_is_little_endian_without_header() {
    let dir = unique_dir("raw");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("values.bin");
    let values = [1.0f32, -2.5, 0.0, f32::MIN_POSITIVE];
    write_f32_raw(&path, &values).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    assert_eq!(read_f32_raw(&path).unwrap(), values.to_vec());

    fs::write(&path, [0u8; 6]).unwrap();
    assert!(read_f32_raw(&path).is_err());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn dump_writes_all_files() {
    let allocator = AlignedAllocator::default();
    let mut rng = StdRng::seed_from_u64(4);
    let input = uniform_activation(2, 5, 5, &mut rng, &allocator).unwrap();
    let kernel = uniform_kernel(3, 2, 3, 3, &mut rng, &allocator).unwrap();
    let conv = GemmConvolution::new();
    let chw_out = conv.forward(&input, &kernel, 1, 2).unwrap();
    let hwc_out = conv
        .forward(
            &input.to_layout(ActivationLayout::ChannelMinor).unwrap(),
            &kernel.to_layout(KernelLayout::SpatialInOut).unwrap(),
            1,
            2,
        )
        .unwrap();
    let geometry = conv.geometry(&input, &kernel, 1, 2).unwrap();
    let meta = DumpMeta::new(&geometry, 3).unwrap();

    let dir = unique_dir("dump");
    let report = write_dump(&dir, &meta, &input, &kernel, &chw_out, &hwc_out).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written.len(), DUMP_FILES.len());
    for name in DUMP_FILES {
        assert!(dir.join(name).is_file(), "{name} missing");
    }

    let text = fs::read_to_string(dir.join("meta.txt")).unwrap();
    let reread: DumpMeta = text.parse().unwrap();
    assert_eq!(reread, meta);
    assert_eq!(read_f32_raw(dir.join("in_buf.bin")).unwrap(), input.data());
    assert_eq!(read_f32_raw(dir.join("kn_buf.bin")).unwrap(), kernel.data());
    assert_eq!(read_f32_raw(dir.join("nchw_out.bin")).unwrap(), chw_out.data());
    assert_eq!(read_f32_raw(dir.join("nhwc_out.bin")).unwrap(), hwc_out.data());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn dump_continues_past_a_failed_file() {
    let allocator = AlignedAllocator::default();
    let mut rng = StdRng::seed_from_u64(6);
    let input = uniform_activation(1, 3, 3, &mut rng, &allocator).unwrap();
    let kernel = uniform_kernel(1, 1, 2, 2, &mut rng, &allocator).unwrap();
    let conv = GemmConvolution::new();
    let chw_out = conv.forward(&input, &kernel, 0, 1).unwrap();
    let hwc_out = chw_out.to_layout(ActivationLayout::ChannelMinor).unwrap();
    let meta = DumpMeta::new(&conv.geometry(&input, &kernel, 0, 1).unwrap(), 1).unwrap();

    let dir = unique_dir("partial");
    // a directory where the kernel file should go makes that one write fail
    fs::create_dir_all(dir.join("kn_buf.bin")).unwrap();
    let report = write_dump(&dir, &meta, &input, &kernel, &chw_out, &hwc_out).unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, dir.join("kn_buf.bin"));
    assert_eq!(report.written.len(), 4);
    assert!(dir.join("nhwc_out.bin").is_file());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn dump_requires_native_layouts() {
    let allocator = AlignedAllocator::default();
    let mut rng = StdRng::seed_from_u64(2);
    let input = uniform_activation(1, 3, 3, &mut rng, &allocator).unwrap();
    let kernel = uniform_kernel(1, 1, 2, 2, &mut rng, &allocator).unwrap();
    let conv = GemmConvolution::new();
    let out = conv.forward(&input, &kernel, 0, 1).unwrap();
    let meta = DumpMeta::new(&conv.geometry(&input, &kernel, 0, 1).unwrap(), 1).unwrap();

    let dir = unique_dir("layouts");
    let hwc_input = input.to_layout(ActivationLayout::ChannelMinor).unwrap();
    assert!(write_dump(&dir, &meta, &hwc_input, &kernel, &out, &out).is_err());
    assert!(!dir.exists());
}
