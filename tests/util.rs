use fileslice::{MemoryOrder, Selector};
use ndarray::{ArrayD, Axis, IxDyn};

/// An array of the given shape holding 0, 1, 2, ... in row-major order.
#[allow(dead_code)]
pub fn counting_array(shape: &[usize]) -> ArrayD<i32> {
    let n = shape.iter().product::<usize>() as i32;
    ArrayD::from_shape_vec(IxDyn(shape), (0..n).collect()).unwrap()
}

/// Little-endian bytes of `data` in the given memory order, after `offset`
/// filler bytes.
#[allow(dead_code)]
pub fn stored_bytes(data: &ArrayD<i32>, order: MemoryOrder, offset: usize) -> Vec<u8> {
    let mut out = vec![0xAA; offset];
    let view = if order.is_column_major() {
        data.view().reversed_axes()
    } else {
        data.view()
    };
    for v in view.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// The positions selected by `start:stop:step` on an axis of length `len`,
/// with NumPy's bound clipping.
#[allow(dead_code)]
pub fn numpy_indices(
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
    len: usize,
) -> Vec<usize> {
    let n = len as isize;
    let step = step.unwrap_or(1);
    assert_ne!(step, 0);
    let resolve = |v: isize| if v < 0 { v + n } else { v };
    let mut out = vec![];
    if step > 0 {
        let start = start.map_or(0, resolve).max(0).min(n);
        let stop = stop.map_or(n, resolve).max(0).min(n);
        let mut i = start;
        while i < stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        let start = start.map_or(n - 1, resolve).max(-1).min(n - 1);
        let stop = stop.map_or(-1, resolve).max(-1).min(n - 1);
        let mut i = start;
        while i > stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }
    out
}

/// Slice a materialized array the way NumPy would, without going through
/// the crate's own slice handling.
#[allow(dead_code)]
pub fn reference_slice(data: &ArrayD<i32>, spec: &[Selector]) -> ArrayD<i32> {
    let n_real = spec
        .iter()
        .filter(|s| matches!(s, Selector::Index(_) | Selector::Slice(_)))
        .count();
    let full = Selector::from(..);
    let mut expanded = vec![];
    let mut seen_ellipsis = false;
    for s in spec {
        if *s == Selector::Ellipsis {
            if !seen_ellipsis {
                expanded.extend(std::iter::repeat(full.clone()).take(data.ndim() - n_real));
                seen_ellipsis = true;
            }
        } else {
            expanded.push(s.clone());
        }
    }
    if !seen_ellipsis {
        expanded.extend(std::iter::repeat(full).take(data.ndim() - n_real));
    }

    let mut out = data.clone();
    let mut axis = 0;
    for s in expanded {
        match s {
            Selector::Index(i) => {
                let n = out.shape()[axis] as isize;
                let i = if i < 0 { i + n } else { i };
                out = out.index_axis(Axis(axis), i as usize).to_owned();
            }
            Selector::Slice(r) => {
                let idx = numpy_indices(r.start, r.stop, r.step, out.shape()[axis]);
                out = if idx.is_empty() {
                    let mut shape = out.shape().to_vec();
                    shape[axis] = 0;
                    ArrayD::zeros(IxDyn(&shape))
                } else {
                    out.select(Axis(axis), &idx)
                };
                axis += 1;
            }
            Selector::NewAxis => {
                out = out.insert_axis(Axis(axis));
                axis += 1;
            }
            other => panic!("unsupported selector {:?}", other),
        }
    }
    out
}
