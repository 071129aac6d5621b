use im2col_rs::conv::{im2col, ChannelMajorColumns, ChannelMinorColumns, ColumnBuilder};
use im2col_rs::fixtures::sequential_activation;
use im2col_rs::tensor::AlignedAllocator;
use im2col_rs::{ActivationLayout, ActivationTensor, ColumnMatrix, ConvError, ConvGeometry};
use proptest::prelude::*;

fn sequential(
    channels: usize,
    rows: usize,
    cols: usize,
    layout: ActivationLayout,
) -> ActivationTensor {
    let allocator = AlignedAllocator::default();
    sequential_activation(channels, rows, cols, &allocator)
        .unwrap()
        .to_layout(layout)
        .unwrap()
}

fn columns_for(input: &ActivationTensor, geometry: &ConvGeometry) -> ColumnMatrix {
    im2col(input, geometry, &AlignedAllocator::default()).unwrap()
}

/// Logical input sample under zero padding.
fn padded_sample(
    input: &ActivationTensor,
    geometry: &ConvGeometry,
    c: usize,
    ih: isize,
    iw: isize,
) -> f32 {
    if ih < 0 || iw < 0 || ih >= geometry.in_h() as isize || iw >= geometry.in_w() as isize {
        0.0
    } else {
        input.at(c, ih as usize, iw as usize)
    }
}

fn source_coords(
    geometry: &ConvGeometry,
    oh: usize,
    ow: usize,
    kh: usize,
    kw: usize,
) -> (isize, isize) {
    let padding = geometry.padding() as isize;
    (
        (oh * geometry.stride() + kh) as isize - padding,
        (ow * geometry.stride() + kw) as isize - padding,
    )
}

#[test]
fn channel_major_columns_for_unpadded_3x3() {
    let input = sequential(1, 3, 3, ActivationLayout::ChannelMajor);
    let geometry = ConvGeometry::square(1, 3, 3, 2, 0, 1).unwrap();
    let columns = columns_for(&input, &geometry);

    assert_eq!((columns.rows(), columns.cols()), (4, 4));
    assert_eq!(columns.layout(), ActivationLayout::ChannelMajor);
    assert_eq!(columns.row(0), &[1.0, 2.0, 4.0, 5.0]);
    assert_eq!(columns.row(1), &[2.0, 3.0, 5.0, 6.0]);
    assert_eq!(columns.row(2), &[4.0, 5.0, 7.0, 8.0]);
    assert_eq!(columns.row(3), &[5.0, 6.0, 8.0, 9.0]);
}

#[test]
fn channel_minor_columns_for_unpadded_3x3() {
    let input = sequential(1, 3, 3, ActivationLayout::ChannelMinor);
    let geometry = ConvGeometry::square(1, 3, 3, 2, 0, 1).unwrap();
    let columns = columns_for(&input, &geometry);

    assert_eq!((columns.rows(), columns.cols()), (4, 4));
    assert_eq!(columns.layout(), ActivationLayout::ChannelMinor);
    assert_eq!(columns.row(0), &[1.0, 2.0, 4.0, 5.0]);
    assert_eq!(columns.row(3), &[5.0, 6.0, 8.0, 9.0]);
}

#[test]
fn channel_minor_columns_put_channels_fastest() {
    // a 2x2 kernel over a 2x2 input has a single output position
    let input = sequential(2, 2, 2, ActivationLayout::ChannelMinor);
    let geometry = ConvGeometry::square(2, 2, 2, 2, 0, 1).unwrap();
    let columns = columns_for(&input, &geometry);

    assert_eq!((columns.rows(), columns.cols()), (1, 8));
    // channel 0 holds 1..4, channel 1 holds 5..8
    assert_eq!(columns.row(0), &[1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0]);
}

#[test]
fn padded_border_entries_are_zero() {
    let input = sequential(1, 3, 3, ActivationLayout::ChannelMajor);
    let geometry = ConvGeometry::square(1, 3, 3, 3, 1, 1).unwrap();
    let columns = columns_for(&input, &geometry);

    assert_eq!((columns.rows(), columns.cols()), (9, 9));
    // kernel tap (0, 0) sees the padded top-left corner for the first output row and column
    assert_eq!(columns.row(0), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 4.0, 5.0]);
    // the center tap reproduces the input
    assert_eq!(columns.row(4), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
}

#[test]
fn fully_padded_positions_are_all_zero() {
    let geometry = ConvGeometry::square(2, 2, 2, 2, 2, 1).unwrap();
    assert_eq!((geometry.out_h(), geometry.out_w()), (5, 5));

    let chw = columns_for(&sequential(2, 2, 2, ActivationLayout::ChannelMajor), &geometry);
    let hwc = columns_for(&sequential(2, 2, 2, ActivationLayout::ChannelMinor), &geometry);
    let edge = geometry.out_h() - 1;

    for oh in 0..geometry.out_h() {
        for ow in 0..geometry.out_w() {
            if oh != 0 && oh != edge && ow != 0 && ow != edge {
                continue;
            }
            let position = oh * geometry.out_w() + ow;
            for p in 0..geometry.k() {
                assert_eq!(chw.at(p, position), 0.0, "chw column {position}, row {p}");
            }
            assert!(hwc.row(position).iter().all(|&v| v == 0.0), "hwc row {position}");
        }
    }
    // the middle position still sees the whole input
    assert!(chw.data().iter().any(|&v| v != 0.0));
}

#[test]
fn stride_skips_positions() {
    let input = sequential(1, 5, 5, ActivationLayout::ChannelMajor);
    let geometry = ConvGeometry::square(1, 5, 5, 1, 0, 2).unwrap();
    let columns = columns_for(&input, &geometry);

    assert_eq!((columns.rows(), columns.cols()), (1, 9));
    assert_eq!(columns.row(0), &[1.0, 3.0, 5.0, 11.0, 13.0, 15.0, 21.0, 23.0, 25.0]);
}

#[test]
fn builders_reject_wrong_buffer_sizes() {
    let geometry = ConvGeometry::square(2, 4, 4, 3, 0, 1).unwrap();
    let src = vec![0.0; geometry.input_len()];
    let mut short = vec![0.0; geometry.column_len() - 1];
    let err = ChannelMajorColumns
        .fill(&geometry, &src, &mut short)
        .expect_err("short column buffer must fail");
    assert!(matches!(err, ConvError::DimensionMismatch { .. }));

    let mut dst = vec![0.0; geometry.column_len()];
    let err = ChannelMinorColumns
        .fill(&geometry, &src[1..], &mut dst)
        .expect_err("short input must fail");
    assert!(matches!(err, ConvError::DimensionMismatch { .. }));
}

#[test]
fn im2col_rejects_input_that_disagrees_with_geometry() {
    let input = sequential(2, 4, 4, ActivationLayout::ChannelMajor);
    let geometry = ConvGeometry::square(3, 4, 4, 3, 0, 1).unwrap();
    let err = im2col(&input, &geometry, &AlignedAllocator::default())
        .expect_err("channel mismatch must fail");
    assert!(matches!(err, ConvError::InvalidGeometry(_)));
}

#[test]
fn column_buffer_is_aligned() {
    let input = sequential(3, 6, 6, ActivationLayout::ChannelMinor);
    let geometry = ConvGeometry::square(3, 6, 6, 3, 1, 1).unwrap();
    let columns = columns_for(&input, &geometry);
    assert_eq!(columns.data().as_ptr() as usize % 64, 0);
}

fn geometry_strategy() -> impl Strategy<Value = ConvGeometry> {
    (1usize..4, 1usize..7, 1usize..7, 1usize..4, 0usize..3, 1usize..4).prop_filter_map(
        "kernel must fit the padded input",
        |(c, h, w, k, p, s)| ConvGeometry::square(c, h, w, k, p, s).ok(),
    )
}

proptest! {
    #[test]
    fn prop_channel_major_entries_match_padded_input(geometry in geometry_strategy()) {
        let input = sequential(
            geometry.in_channels(),
            geometry.in_h(),
            geometry.in_w(),
            ActivationLayout::ChannelMajor,
        );
        let columns = columns_for(&input, &geometry);
        prop_assert_eq!((columns.rows(), columns.cols()), (geometry.k(), geometry.n()));

        for c in 0..geometry.in_channels() {
            for kh in 0..geometry.kernel_h() {
                for kw in 0..geometry.kernel_w() {
                    let row = (c * geometry.kernel_h() + kh) * geometry.kernel_w() + kw;
                    for oh in 0..geometry.out_h() {
                        for ow in 0..geometry.out_w() {
                            let (ih, iw) = source_coords(&geometry, oh, ow, kh, kw);
                            let col = oh * geometry.out_w() + ow;
                            prop_assert_eq!(
                                columns.at(row, col),
                                padded_sample(&input, &geometry, c, ih, iw)
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn prop_channel_minor_is_a_relabeling_of_channel_major(geometry in geometry_strategy()) {
        let chw_input = sequential(
            geometry.in_channels(),
            geometry.in_h(),
            geometry.in_w(),
            ActivationLayout::ChannelMajor,
        );
        let hwc_input = chw_input.to_layout(ActivationLayout::ChannelMinor).unwrap();
        let chw = columns_for(&chw_input, &geometry);
        let hwc = columns_for(&hwc_input, &geometry);
        prop_assert_eq!((hwc.rows(), hwc.cols()), (geometry.n(), geometry.k()));

        let c_in = geometry.in_channels();
        for c in 0..c_in {
            for kh in 0..geometry.kernel_h() {
                for kw in 0..geometry.kernel_w() {
                    let chw_row = (c * geometry.kernel_h() + kh) * geometry.kernel_w() + kw;
                    let hwc_col = (kh * geometry.kernel_w() + kw) * c_in + c;
                    for position in 0..geometry.n() {
                        prop_assert_eq!(
                            chw.at(chw_row, position).to_bits(),
                            hwc.at(position, hwc_col).to_bits()
                        );
                    }
                }
            }
        }
    }
}
