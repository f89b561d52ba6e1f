mod util;

use std::io::{Cursor, Write};

use fileslice::{
    fileslice, fileslice_with, plan_segments, predict_shape, AlwaysContiguous, AlwaysFull,
    AlwaysSkip, ArrayError, CostModelHeuristic, DataType, ElementType, GzSeeker, MemoryOrder,
    Selector, SliceRange, SpaceHeuristic, ThresholdHeuristic,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{arr0, array, ArrayD};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use util::{counting_array, reference_slice, stored_bytes};

fn heuristic(i: usize) -> Box<dyn SpaceHeuristic> {
    match i {
        0 => Box::new(ThresholdHeuristic::default()),
        1 => Box::new(ThresholdHeuristic::new(0)),
        2 => Box::new(AlwaysFull),
        3 => Box::new(AlwaysContiguous),
        4 => Box::new(AlwaysSkip),
        _ => Box::new(CostModelHeuristic::compressed()),
    }
}

const ORDERS: [MemoryOrder; 2] = [MemoryOrder::ColumnMajor, MemoryOrder::RowMajor];

fn sl(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Selector {
    Selector::Slice(SliceRange::new(start, stop, step))
}

fn int32() -> ElementType {
    ElementType::le(DataType::Int32)
}

/// Check `spec` against the in-memory result for every order and heuristic.
fn check(shape: &[usize], spec: &[Selector]) {
    let data = counting_array(shape);
    let expected = reference_slice(&data, spec);
    for &order in &ORDERS {
        for offset in &[0usize, 3, 352] {
            let bytes = stored_bytes(&data, order, *offset);
            for h in 0..6 {
                let mut source = Cursor::new(&bytes);
                let heuristic = heuristic(h);
                let got: ArrayD<i32> = fileslice_with(
                    &mut source,
                    spec,
                    shape,
                    int32(),
                    *offset as u64,
                    order,
                    heuristic.as_ref(),
                )
                .unwrap();
                assert_eq!(
                    got, expected,
                    "{:?} on {:?}, order {:?}, heuristic {:?}",
                    spec, shape, order, heuristic
                );
            }
        }
    }
}

#[test]
fn slices_of_a_volume() {
    let shape = [5, 6, 7];
    let cases = vec![
        vec![],
        vec![Selector::Index(2)],
        vec![Selector::Index(-1)],
        vec![Selector::from(..), Selector::Index(3)],
        vec![Selector::Ellipsis, Selector::Index(0)],
        vec![Selector::from(1..4), Selector::from(2..), Selector::from(..5)],
        vec![sl(None, None, Some(2)), sl(Some(-1), None, Some(-2)), sl(None, None, Some(-1))],
        vec![sl(Some(4), Some(0), Some(-1)), Selector::Index(1), Selector::Index(6)],
        vec![Selector::NewAxis, Selector::Index(1), Selector::NewAxis],
        vec![Selector::Index(4), Selector::Ellipsis, Selector::NewAxis],
        vec![sl(Some(-100), Some(100), None), sl(Some(10), None, None)],
        vec![sl(Some(2), Some(2), None), Selector::Index(0)],
        vec![Selector::from(..), Selector::from(..), sl(Some(1), None, Some(3))],
        vec![sl(Some(3), Some(4), None), sl(None, None, Some(5)), sl(Some(-3), Some(-1), None)],
    ];
    for spec in cases {
        check(&shape, &spec);
    }
}

#[test]
fn slices_of_small_and_large_arrays() {
    check(&[], &[]);
    check(&[], &[Selector::NewAxis]);
    check(&[1], &[Selector::Index(0)]);
    check(&[300], &[sl(Some(10), Some(290), Some(7))]);
    check(&[100, 3], &[Selector::from(5..95), Selector::Index(1)]);
    check(&[3, 100], &[Selector::Index(1), sl(None, None, Some(-3))]);
    check(&[2, 3, 4, 5], &[Selector::Index(1), Selector::Ellipsis, Selector::from(1..3)]);
    check(&[4, 0, 3], &[Selector::Index(1)]);
}

#[test]
fn steps_longer_than_the_axis() {
    let shape = [10, 3];
    let cases = vec![
        vec![sl(Some(0), Some(10), Some(isize::MAX))],
        vec![sl(None, None, Some(isize::MIN))],
        vec![sl(Some(4), None, Some(isize::MIN)), sl(None, None, Some(isize::MAX))],
        vec![Selector::Index(2), sl(Some(-1), None, Some(isize::MIN + 1))],
        vec![sl(Some(isize::MIN), Some(isize::MAX), Some(isize::MAX))],
    ];
    for spec in cases {
        check(&shape, &spec);
    }
}

#[test]
fn zero_dim_array() {
    let bytes = 42i32.to_le_bytes().to_vec();
    let got: ArrayD<i32> =
        fileslice(&mut Cursor::new(bytes), &[], &[], int32(), 0, MemoryOrder::ColumnMajor).unwrap();
    assert_eq!(got, arr0(42).into_dyn());
}

#[test]
fn decodes_into_other_types() {
    // big-endian int16, column-major 2x3
    let bytes: Vec<u8> = vec![0, 1, 0, 2, 0, 3, 0, 4, 0xFF, 0xFF, 0x80, 0];
    let got: ArrayD<f64> = fileslice(
        &mut Cursor::new(bytes),
        &[Selector::from(..), Selector::from(1..)],
        &[2, 3],
        ElementType::be(DataType::Int16),
        0,
        MemoryOrder::ColumnMajor,
    )
    .unwrap();
    assert_eq!(got, array![[3., -1.], [4., -32768.]].into_dyn());
}

#[test]
fn invalid_slices_read_nothing() {
    let shape = [4, 5];
    let mut empty = Cursor::new(Vec::<u8>::new());
    let mut attempt = |spec: &[Selector]| {
        fileslice::<i32, _>(&mut empty, spec, &shape, int32(), 0, MemoryOrder::ColumnMajor)
    };
    assert!(matches!(
        attempt(&[Selector::Array(vec![0, 1])]),
        Err(ArrayError::InvalidSliceKind)
    ));
    assert!(matches!(
        attempt(&[Selector::from(..), Selector::Mask(vec![true; 5])]),
        Err(ArrayError::InvalidSliceKind)
    ));
    assert!(matches!(
        attempt(&[Selector::Ellipsis, Selector::Ellipsis]),
        Err(ArrayError::MultipleEllipsis)
    ));
    assert!(matches!(
        attempt(&[Selector::Index(0), Selector::Index(0), Selector::Index(0)]),
        Err(ArrayError::TooManyIndices(3, 2))
    ));
    assert!(matches!(
        attempt(&[Selector::Index(4)]),
        Err(ArrayError::OutOfRangeIndex(4, 0, 4))
    ));
    assert!(matches!(
        attempt(&[Selector::from(..), Selector::Index(-6)]),
        Err(ArrayError::OutOfRangeIndex(-6, 1, 5))
    ));
    assert!(matches!(
        attempt(&[sl(None, None, Some(0))]),
        Err(ArrayError::ZeroSliceStep)
    ));
    assert_eq!(empty.position(), 0);
}

#[test]
fn opaque_types_are_rejected() {
    let mut source = Cursor::new(vec![0u8; 12]);
    let got = fileslice::<u8, _>(
        &mut source,
        &[],
        &[4],
        ElementType::native(DataType::Rgb24),
        0,
        MemoryOrder::ColumnMajor,
    );
    assert!(matches!(got, Err(ArrayError::UnsupportedDataType(DataType::Rgb24))));
}

#[test]
fn truncated_source() {
    let data = counting_array(&[4, 5]);
    let mut bytes = stored_bytes(&data, MemoryOrder::ColumnMajor, 0);
    bytes.truncate(70);
    let got = fileslice::<i32, _>(
        &mut Cursor::new(bytes),
        &[Selector::from(..), Selector::Index(4)],
        &[4, 5],
        int32(),
        0,
        MemoryOrder::ColumnMajor,
    );
    assert!(matches!(got, Err(ArrayError::ShortRead(64, 16, 6))));
}

#[test]
fn slices_of_compressed_data() {
    let shape = [6, 7, 8];
    let data = counting_array(&shape);
    let mut e = GzEncoder::new(Vec::new(), Compression::default());
    e.write_all(&stored_bytes(&data, MemoryOrder::ColumnMajor, 16)).unwrap();
    let compressed = e.finish().unwrap();

    let spec = [sl(None, None, Some(-2)), Selector::Index(3), Selector::from(2..6)];
    let mut source = GzSeeker::new(Cursor::new(compressed));
    let got: ArrayD<i32> = fileslice_with(
        &mut source,
        &spec,
        &shape,
        int32(),
        16,
        MemoryOrder::ColumnMajor,
        &CostModelHeuristic::compressed(),
    )
    .unwrap();
    assert_eq!(got, reference_slice(&data, &spec));
}

#[test]
fn segments_of_a_plane() {
    // the middle plane of a column-major 4x4x3 int32 volume is one run
    let plan = plan_segments(
        &[Selector::from(..), Selector::from(..), Selector::Index(1)],
        &[4, 4, 3],
        4,
        10,
        MemoryOrder::ColumnMajor,
    )
    .unwrap();
    assert_eq!(plan.segments.len(), 1);
    assert_eq!(plan.segments[0].offset, 10 + 64);
    assert_eq!(plan.segments[0].length, 64);
    assert_eq!(plan.total_bytes(), 64);
    assert_eq!(plan.shape, vec![4, 4]);
}

fn axis_selector(len: usize) -> impl Strategy<Value = Selector> {
    let n = len as isize;
    prop_oneof![
        (-n..n).prop_map(Selector::Index),
        (
            proptest::option::of(-n - 2..n + 2),
            proptest::option::of(-n - 2..n + 2),
            prop_oneof![-3isize..0, 1isize..4],
        )
            .prop_map(|(start, stop, step)| sl(start, stop, Some(step))),
        Just(Selector::NewAxis),
    ]
}

fn shape_and_spec() -> impl Strategy<Value = (Vec<usize>, Vec<Selector>)> {
    proptest::collection::vec(1usize..7, 0..4).prop_flat_map(|shape| {
        let selectors: Vec<_> = shape.iter().map(|&n| axis_selector(n)).collect();
        (Just(shape), selectors)
    })
}

proptest! {
    #[test]
    fn slicing_matches_the_materialized_array(
        (shape, spec) in shape_and_spec(),
        row_major in any::<bool>(),
        offset in 0usize..9,
        h in 0usize..6,
    ) {
        let order = if row_major { MemoryOrder::RowMajor } else { MemoryOrder::ColumnMajor };
        let data = counting_array(&shape);
        let bytes = stored_bytes(&data, order, offset);
        let heuristic = heuristic(h);
        let got: ArrayD<i32> = fileslice_with(
            &mut Cursor::new(bytes),
            &spec,
            &shape,
            int32(),
            offset as u64,
            order,
            heuristic.as_ref(),
        ).unwrap();
        prop_assert_eq!(predict_shape(&spec, &shape).unwrap(), got.shape().to_vec());
        prop_assert_eq!(got, reference_slice(&data, &spec));
    }

    #[test]
    fn plans_never_read_past_the_array(
        (shape, spec) in shape_and_spec(),
        row_major in any::<bool>(),
    ) {
        let order = if row_major { MemoryOrder::RowMajor } else { MemoryOrder::ColumnMajor };
        let total = shape.iter().product::<usize>() as u64 * 2;
        let plan = plan_segments(&spec, &shape, 2, 100, order).unwrap();
        for segment in &plan.segments {
            prop_assert!(segment.length > 0);
            prop_assert!(segment.offset >= 100);
            prop_assert!(segment.offset + segment.length <= 100 + total);
        }
        prop_assert_eq!(plan.total_bytes(), plan.shape.iter().product::<usize>() as u64 * 2);
    }
}
