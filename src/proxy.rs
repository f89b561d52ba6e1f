//! Module holding the array proxy, a lazy handle on an array stored in a
//! file.
//!
//! A proxy captures the geometry of the stored array from a header when it
//! is created. It reads nothing until the data is requested, either in
//! full with [`ArrayProxy::materialize`], which caches the result, or in
//! part with [`ArrayProxy::slice`], which reads only the bytes needed.
use crate::element::{DataElement, LinearTransform};
use crate::error::{ArrayError, Result};
use crate::header::{HeaderSource, Scaling, ScalingParams};
use crate::opener::FileLike;
use crate::slice::{
    canonicalize, fileslice_with, fill_slice, CanonicalSelector, Selector, SpaceHeuristic,
    ThresholdHeuristic,
};
use crate::typedef::{ElementType, MemoryOrder};
use log::{debug, trace};
use ndarray::{ArrayD, Axis};

/// A lazy, cached handle on an array stored in a file-like source.
///
/// Values are decoded to `T` and the header's scaling is applied to them.
/// Every method touching the source or the cache takes `&mut self`: to
/// share a proxy between threads, wrap it in a lock.
///
/// # Example
///
/// ```
/// use fileslice::{ArrayHeader, ArrayProxy, DataType, ElementType, KeepOpen, Selector};
/// use fileslice::{Scaling, ScalingParams};
/// use std::io::Cursor;
///
/// let bytes: Vec<u8> = (0..24).collect();
/// let header = ArrayHeader::new(vec![4, 6], ElementType::native(DataType::Uint8))
///     .with_scaling(Scaling::Uniform(ScalingParams::new(2., 1.)?));
/// let mut proxy: ArrayProxy<_> = ArrayProxy::new(KeepOpen::new(Cursor::new(bytes)), &header)?;
/// let column = proxy.slice(&[Selector::from(..), Selector::Index(1)])?;
/// assert_eq!(column.as_slice().unwrap(), &[9., 11., 13., 15.]);
/// assert!(!proxy.is_cached());
/// assert_eq!(proxy.materialize()?.shape(), &[4, 6]);
/// assert!(proxy.is_cached());
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
#[derive(Debug)]
pub struct ArrayProxy<F, T = f64> {
    file_like: F,
    shape: Vec<usize>,
    element_type: ElementType,
    offset: u64,
    order: MemoryOrder,
    scaling: Scaling,
    heuristic: Box<dyn SpaceHeuristic>,
    cache: Option<ArrayD<T>>,
}

impl<F, T> ArrayProxy<F, T>
where
    F: FileLike,
    T: DataElement,
{
    /// Create a proxy over `file_like`, with the geometry described by
    /// `header`. The header is copied: later changes to it do not affect
    /// the proxy.
    ///
    /// # Errors
    ///
    /// - `InvalidScaling` if a scale is zero or not finite, or if the
    ///   number of per-volume scalings does not match the slowest varying
    ///   axis.
    pub fn new<H>(file_like: F, header: &H) -> Result<Self>
    where
        H: ?Sized + HeaderSource,
    {
        let shape = header.data_shape().to_vec();
        let order = header.data_order();
        let scaling = header.scaling();
        let params: &[ScalingParams] = match &scaling {
            Scaling::Uniform(p) => std::slice::from_ref(p),
            Scaling::PerVolume(ps) => {
                let outer = order.outer_axis(shape.len()).ok_or_else(|| {
                    ArrayError::InvalidScaling("per-volume scaling of a 0-dimensional array".into())
                })?;
                if ps.len() != shape[outer] {
                    return Err(ArrayError::InvalidScaling(format!(
                        "{} volume scalings for {} volumes",
                        ps.len(),
                        shape[outer]
                    )));
                }
                ps
            }
        };
        for p in params {
            let _ = ScalingParams::new(p.scale, p.inter)?;
        }

        Ok(ArrayProxy {
            file_like,
            shape,
            element_type: header.data_type(),
            offset: header.data_offset(),
            order,
            scaling,
            heuristic: Box::new(ThresholdHeuristic::default()),
            cache: None,
        })
    }

    /// Use a different space heuristic for slicing.
    pub fn with_heuristic<H>(mut self, heuristic: H) -> Self
    where
        H: SpaceHeuristic + 'static,
    {
        self.heuristic = Box::new(heuristic);
        self
    }

    /// The shape of the stored array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The number of dimensions of the stored array.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// The element type of the stored array.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The byte offset of the array in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The memory order of the stored array.
    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    /// The scaling applied to the stored values.
    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// The data source.
    pub fn file_like(&self) -> &F {
        &self.file_like
    }

    /// Whether the full array is cached.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Read the full array, scale it and keep it in the cache. Later calls
    /// return the cached array without touching the source.
    pub fn materialize(&mut self) -> Result<&ArrayD<T>> {
        let data = match self.cache.take() {
            Some(data) => data,
            None => {
                let data = self.read_scaled(&[])?;
                debug!("caching array of shape {:?}", data.shape());
                data
            }
        };
        Ok(self.cache.get_or_insert(data))
    }

    /// Drop the cached array, if any.
    pub fn uncache(&mut self) {
        self.cache = None;
    }

    /// Read the full array without scaling it. The result is not cached.
    pub fn get_unscaled(&mut self) -> Result<ArrayD<T>> {
        self.read(&[])
    }

    /// Read a slice of the array and scale it, reading only the bytes
    /// needed from the source.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSliceKind` before reading anything if `spec` uses
    /// fancy indexing, and with any other error of [`fileslice`].
    ///
    /// [`fileslice`]: ../slice/fn.fileslice.html
    pub fn slice(&mut self, spec: &[Selector]) -> Result<ArrayD<T>> {
        self.read_scaled(spec)
    }

    fn read(&mut self, spec: &[Selector]) -> Result<ArrayD<T>> {
        let ArrayProxy {
            file_like,
            shape,
            element_type,
            offset,
            order,
            heuristic,
            ..
        } = self;
        trace!("proxy read of {:?} from shape {:?}", spec, shape);
        file_like.with_reader(|source| {
            fileslice_with(
                source,
                spec,
                shape,
                *element_type,
                *offset,
                *order,
                &**heuristic,
            )
        })
    }

    fn read_scaled(&mut self, spec: &[Selector]) -> Result<ArrayD<T>> {
        let mut data = self.read(spec)?;
        if self.scaling.is_identity() {
            return Ok(data);
        }
        match &self.scaling {
            Scaling::Uniform(p) => scale_values(data.iter_mut(), p),
            Scaling::PerVolume(ps) => {
                let outer = self.order.outer_axis(self.shape.len()).ok_or_else(|| {
                    ArrayError::InvalidScaling("per-volume scaling of a 0-dimensional array".into())
                })?;
                match volume_selection(spec, &self.shape, outer)? {
                    VolumeSelection::One(v) => scale_values(data.iter_mut(), &ps[v]),
                    VolumeSelection::Many(axis, volumes) => {
                        for (k, v) in volumes.into_iter().enumerate() {
                            scale_values(data.index_axis_mut(Axis(axis), k).iter_mut(), &ps[v]);
                        }
                    }
                }
            }
        }
        Ok(data)
    }
}

fn scale_values<'a, T, I>(values: I, params: &ScalingParams)
where
    T: DataElement,
    I: IntoIterator<Item = &'a mut T>,
{
    if !params.is_identity() {
        <T::Transform as LinearTransform<T>>::linear_transform_many_inline(
            values,
            params.scale,
            params.inter,
        );
    }
}

enum VolumeSelection {
    /// The slice holds a single volume, its axis dropped.
    One(usize),
    /// The slice holds these volumes along the given output axis.
    Many(usize, Vec<usize>),
}

fn volume_selection(spec: &[Selector], shape: &[usize], outer: usize) -> Result<VolumeSelection> {
    let canonical = canonicalize(spec, shape)?;
    let (mut axis, mut out_axis) = (0, 0);
    for selector in canonical.selectors() {
        match *selector {
            CanonicalSelector::NewAxis => out_axis += 1,
            CanonicalSelector::Index(i) => {
                if axis == outer {
                    return Ok(VolumeSelection::One(i));
                }
                axis += 1;
            }
            CanonicalSelector::Slice(range) => {
                if axis == outer {
                    let volumes = fill_slice(&range, shape[axis])?.indices().collect();
                    return Ok(VolumeSelection::Many(out_axis, volumes));
                }
                axis += 1;
                out_axis += 1;
            }
        }
    }
    // canonical specs cover every axis
    Err(ArrayError::TooManyIndices(outer + 1, shape.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ArrayHeader;
    use crate::opener::KeepOpen;
    use crate::slice::AlwaysSkip;
    use crate::typedef::DataType;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn source(n: u8) -> KeepOpen<Cursor<Vec<u8>>> {
        KeepOpen::new(Cursor::new((0..n).collect()))
    }

    fn params(scale: f64, inter: f64) -> ScalingParams {
        ScalingParams { scale, inter }
    }

    #[test]
    fn captures_header_by_value() {
        let mut header =
            ArrayHeader::new(vec![2, 3], ElementType::le(DataType::Uint8)).with_offset(2);
        let mut proxy: ArrayProxy<_> = ArrayProxy::new(source(8), &header).unwrap();
        header.shape[0] = 100;
        header.offset = 0;
        assert_eq!(proxy.shape(), &[2, 3]);
        assert_eq!(proxy.offset(), 2);
        assert_eq!(proxy.ndim(), 2);
        assert_eq!(proxy.element_type(), ElementType::le(DataType::Uint8));
        let data = proxy.materialize().unwrap();
        assert_eq!(data.iter().cloned().collect::<Vec<_>>(), vec![2., 4., 6., 3., 5., 7.]);
    }

    #[test]
    fn cache_lifecycle() {
        let header = ArrayHeader::new(vec![4], ElementType::le(DataType::Uint8))
            .with_scaling(Scaling::Uniform(params(2., 0.)));
        let mut proxy: ArrayProxy<_, f32> = ArrayProxy::new(source(4), &header).unwrap();
        assert!(!proxy.is_cached());
        assert_eq!(proxy.materialize().unwrap().as_slice().unwrap(), &[0., 2., 4., 6.]);
        assert!(proxy.is_cached());
        assert_eq!(proxy.get_unscaled().unwrap().as_slice().unwrap(), &[0., 1., 2., 3.]);
        proxy.uncache();
        assert!(!proxy.is_cached());
        assert_eq!(proxy.materialize().unwrap().len(), 4);
    }

    #[test]
    fn per_volume_scaling_row_major() {
        // 3 volumes of 2 values, slowest axis first
        let header = ArrayHeader::new(vec![3, 2], ElementType::le(DataType::Uint8))
            .with_order(MemoryOrder::RowMajor)
            .with_scaling(Scaling::PerVolume(vec![
                params(1., 0.),
                params(10., 0.),
                params(1., 100.),
            ]));
        let mut proxy: ArrayProxy<_> = ArrayProxy::new(source(6), &header).unwrap();
        let full = proxy.materialize().unwrap().clone();
        assert_eq!(full.as_slice().unwrap(), &[0., 1., 20., 30., 104., 105.]);

        let one = proxy.slice(&[Selector::Index(1)]).unwrap();
        assert_eq!(one.as_slice().unwrap(), &[20., 30.]);

        let spec = [Selector::Slice(crate::slice::SliceRange::reversed()), Selector::Index(0)];
        let rev = proxy.slice(&spec).unwrap();
        assert_eq!(rev.iter().cloned().collect::<Vec<_>>(), vec![104., 20., 0.]);

        let spec = [Selector::NewAxis, Selector::from(1..)];
        let tail = proxy.slice(&spec).unwrap();
        assert_eq!(tail.shape(), &[1, 2, 2]);
        assert_eq!(tail.iter().cloned().collect::<Vec<_>>(), vec![20., 30., 104., 105.]);
    }

    #[test]
    fn per_volume_scaling_column_major() {
        let header = ArrayHeader::new(vec![2, 3], ElementType::le(DataType::Uint8))
            .with_scaling(Scaling::PerVolume(vec![
                params(1., 0.),
                params(-1., 0.),
                params(2., 0.),
            ]));
        let mut proxy: ArrayProxy<_> = ArrayProxy::new(source(6), &header)
            .unwrap()
            .with_heuristic(AlwaysSkip);
        let data = proxy.slice(&[Selector::Index(1)]).unwrap();
        assert_eq!(data.as_slice().unwrap(), &[1., -3., 10.]);
        let data = proxy.slice(&[Selector::Ellipsis, Selector::Index(2)]).unwrap();
        assert_eq!(data.as_slice().unwrap(), &[8., 10.]);
    }

    #[test]
    fn invalid_scaling_is_rejected() {
        let header = ArrayHeader::new(vec![2, 3], ElementType::le(DataType::Uint8))
            .with_scaling(Scaling::PerVolume(vec![params(1., 0.); 2]));
        let r = ArrayProxy::<_, f64>::new(source(6), &header);
        assert!(matches!(r, Err(ArrayError::InvalidScaling(_))));
        let header = ArrayHeader::new(vec![2, 3], ElementType::le(DataType::Uint8))
            .with_scaling(Scaling::Uniform(params(0., 1.)));
        let r = ArrayProxy::<_, f64>::new(source(6), &header);
        assert!(matches!(r, Err(ArrayError::InvalidScaling(_))));
    }

    #[test]
    fn fancy_indexing_reads_nothing() {
        let header = ArrayHeader::new(vec![6], ElementType::le(DataType::Uint8));
        let mut proxy: ArrayProxy<_> = ArrayProxy::new(source(6), &header).unwrap();
        let r = proxy.slice(&[Selector::Array(vec![0, 2])]);
        assert!(matches!(r, Err(ArrayError::InvalidSliceKind)));
        assert_eq!(proxy.file_like().get_ref().position(), 0);
    }
}
