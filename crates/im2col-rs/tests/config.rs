use std::fs;
use std::path::PathBuf;

use im2col_rs::fixtures::DEFAULT_SEED;
use im2col_rs::RunConfig;

fn write_config(tag: &str, json: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "im2col_rs_config_{tag}_{}.json",
        std::process::id()
    ));
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn defaults_describe_the_reference_run() {
    let config = RunConfig::default();
    assert_eq!(
        (config.in_c, config.in_h, config.in_w, config.kernel_size, config.out_c),
        (2, 4, 4, 3, 2)
    );
    assert_eq!((config.stride, config.padding), (1, 0));
    assert_eq!(config.seed, DEFAULT_SEED);
    let geometry = config.geometry().unwrap();
    assert_eq!((geometry.out_h(), geometry.out_w()), (2, 2));
}

#[test]
fn partial_json_fills_in_defaults() {
    let path = write_config("partial", r#"{ "in_h": 9, "in_w": 7, "padding": 1, "stride": 2 }"#);
    let config = RunConfig::load_json(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(config.in_h, 9);
    assert_eq!(config.in_w, 7);
    assert_eq!(config.in_c, 2);
    assert_eq!(config.kernel_size, 3);
    let geometry = config.geometry().unwrap();
    assert_eq!((geometry.out_h(), geometry.out_w()), (5, 4));
}

#[test]
fn unknown_fields_are_rejected() {
    let path = write_config("unknown", r#"{ "in_c": 2, "dilation": 2 }"#);
    let err = RunConfig::load_json(&path).expect_err("unknown field must fail");
    fs::remove_file(&path).ok();
    assert!(format!("{err:#}").contains("dilation"));
}

#[test]
fn invalid_shapes_fail_validation() {
    let zero_stride = RunConfig {
        stride: 0,
        ..RunConfig::default()
    };
    assert!(zero_stride.validate().is_err());

    let oversized_kernel = RunConfig {
        kernel_size: 7,
        ..RunConfig::default()
    };
    assert!(oversized_kernel.validate().is_err());

    let padded_kernel = RunConfig {
        kernel_size: 5,
        padding: 1,
        ..RunConfig::default()
    };
    assert!(padded_kernel.validate().is_ok());
}

#[test]
fn missing_file_reports_path() {
    let err = RunConfig::load_json("/nonexistent/im2col_rs.json").expect_err("missing file");
    assert!(err.to_string().contains("im2col_rs.json"));
}
