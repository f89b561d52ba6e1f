#![no_main]
use fileslice::{plan_segments, MemoryOrder, Selector, SliceRange};
use libfuzzer_sys::fuzz_target;

/// Decode a shape and a slice expression from raw bytes, three bytes per
/// axis: the axis length, a selector kind and a bound.
fn decode(data: &[u8]) -> (Vec<usize>, Vec<Selector>) {
    let mut shape = vec![];
    let mut spec = vec![];
    for chunk in data.chunks_exact(3).take(5) {
        shape.push(chunk[0] as usize % 17);
        let bound = chunk[2] as i8 as isize;
        spec.push(match chunk[1] % 5 {
            0 => Selector::Index(bound),
            1 => Selector::Slice(SliceRange::new(Some(bound), None, None)),
            2 => Selector::Slice(SliceRange::new(None, Some(bound), Some(-1))),
            3 => Selector::Slice(SliceRange::new(None, None, Some(bound))),
            _ => Selector::NewAxis,
        });
    }
    (shape, spec)
}

fuzz_target!(|data: &[u8]| {
    let (shape, spec) = decode(data);
    let order = if data.first().map_or(false, |b| b & 1 == 1) {
        MemoryOrder::RowMajor
    } else {
        MemoryOrder::ColumnMajor
    };
    if let Ok(plan) = plan_segments(&spec, &shape, 2, 7, order) {
        let total = shape.iter().product::<usize>() as u64 * 2;
        for segment in &plan.segments {
            assert!(segment.offset >= 7);
            assert!(segment.offset + segment.length <= 7 + total);
        }
    }
});
