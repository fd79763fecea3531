use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use num_complex::Complex64;
use num_traits::Zero;
use paste::paste;
use unsigned_varint::encode::{u64 as varint_encode_u64, u64_buffer as varint_u64_buffer};

use crate::errors::{Error, Result};

/// The kind of numerical data stored in an array.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    I8,
    I32,
    I64,
    F64,
    C128,
}

impl DType {
    /// Number of bytes a single element takes up.
    pub fn item_size(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I8 => 1,
            DType::I32 => 4,
            DType::I64 => 8,
            DType::F64 => 8,
            DType::C128 => 16,
        }
    }

    /// Tag used in the stable serialization fed to content hashes.
    fn tag(&self) -> u8 {
        match self {
            DType::U8 => 1,
            DType::I8 => 2,
            DType::I32 => 3,
            DType::I64 => 4,
            DType::F64 => 5,
            DType::C128 => 6,
        }
    }
}

/// A materialized N dimensional array of one of the supported dtypes.
///
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(ArrayD<u8>),
    I8(ArrayD<i8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F64(ArrayD<f64>),
    C128(ArrayD<Complex64>),
}

macro_rules! typed_accessors {
    ($variant:ident, $type:ty) => {
        paste! {
            /// Borrow the underlying ndarray, if this array holds that dtype.
            pub fn [<as_ $variant:lower>](&self) -> Option<&ArrayD<$type>> {
                match self {
                    ArrayData::$variant(data) => Some(data),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! for_each_variant {
    ($self:expr, $data:ident => $body:expr) => {
        match $self {
            ArrayData::U8($data) => $body,
            ArrayData::I8($data) => $body,
            ArrayData::I32($data) => $body,
            ArrayData::I64($data) => $body,
            ArrayData::F64($data) => $body,
            ArrayData::C128($data) => $body,
        }
    };
}

impl ArrayData {
    typed_accessors!(U8, u8);
    typed_accessors!(I8, i8);
    typed_accessors!(I32, i32);
    typed_accessors!(I64, i64);
    typed_accessors!(F64, f64);
    typed_accessors!(C128, Complex64);

    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::U8(_) => DType::U8,
            ArrayData::I8(_) => DType::I8,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::F64(_) => DType::F64,
            ArrayData::C128(_) => DType::C128,
        }
    }

    pub fn shape(&self) -> &[usize] {
        for_each_variant!(self, data => data.shape())
    }

    pub fn ndim(&self) -> usize {
        for_each_variant!(self, data => data.ndim())
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, data => data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An all-zero array of the given dtype and shape.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        match dtype {
            DType::U8 => ArrayData::U8(ArrayD::from_elem(shape, u8::zero())),
            DType::I8 => ArrayData::I8(ArrayD::from_elem(shape, i8::zero())),
            DType::I32 => ArrayData::I32(ArrayD::from_elem(shape, i32::zero())),
            DType::I64 => ArrayData::I64(ArrayD::from_elem(shape, i64::zero())),
            DType::F64 => ArrayData::F64(ArrayD::from_elem(shape, f64::zero())),
            DType::C128 => ArrayData::C128(ArrayD::from_elem(shape, Complex64::zero())),
        }
    }

    /// Create an array of the given dtype and shape with every element set to
    /// `value` (cast to the dtype).
    ///
    pub fn fill(dtype: DType, shape: &[usize], value: f64) -> Self {
        match dtype {
            DType::U8 => ArrayData::U8(ArrayD::from_elem(shape, value as u8)),
            DType::I8 => ArrayData::I8(ArrayD::from_elem(shape, value as i8)),
            DType::I32 => ArrayData::I32(ArrayD::from_elem(shape, value as i32)),
            DType::I64 => ArrayData::I64(ArrayD::from_elem(shape, value as i64)),
            DType::F64 => ArrayData::F64(ArrayD::from_elem(shape, value)),
            DType::C128 => {
                ArrayData::C128(ArrayD::from_elem(shape, Complex64::new(value, 0.0)))
            }
        }
    }

    /// Copy out a contiguous sub-range along the first axis.
    ///
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let slice = Slice::from(start..end);
        for_each_variant!(self, data => {
            ArrayData::from(data.slice_axis(Axis(0), slice).to_owned())
        })
    }

    /// Stack equally shaped slabs along a new leading axis.
    ///
    pub fn stack_rows(slabs: &[ArrayData]) -> Result<Self> {
        let first = slabs
            .first()
            .ok_or_else(|| Error::Configuration(String::from("cannot stack zero slabs")))?;

        macro_rules! stack_as {
            ($variant:ident, $accessor:ident) => {{
                let views: Vec<ArrayViewD<_>> = slabs
                    .iter()
                    .map(|slab| {
                        slab.$accessor().map(|data| data.view()).ok_or_else(|| {
                            Error::Configuration(String::from(
                                "cannot stack slabs of differing dtypes",
                            ))
                        })
                    })
                    .collect::<Result<_>>()?;
                let stacked = ndarray::stack(Axis(0), &views).map_err(|err| {
                    Error::Configuration(format!("cannot stack slabs: {err}"))
                })?;
                Ok(ArrayData::$variant(stacked))
            }};
        }

        match first {
            ArrayData::U8(_) => stack_as!(U8, as_u8),
            ArrayData::I8(_) => stack_as!(I8, as_i8),
            ArrayData::I32(_) => stack_as!(I32, as_i32),
            ArrayData::I64(_) => stack_as!(I64, as_i64),
            ArrayData::F64(_) => stack_as!(F64, as_f64),
            ArrayData::C128(_) => stack_as!(C128, as_c128),
        }
    }

    /// Serialize dtype, shape and elements into a stable, layout independent
    /// byte representation. Content hashes for task identity are derived from
    /// these bytes, so this encoding must never change for a given value.
    ///
    pub fn stable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.len() * self.dtype().item_size());
        let mut buffer = varint_u64_buffer();

        out.push(self.dtype().tag());
        out.extend_from_slice(varint_encode_u64(self.ndim() as u64, &mut buffer));
        for size in self.shape() {
            out.extend_from_slice(varint_encode_u64(*size as u64, &mut buffer));
        }

        match self {
            ArrayData::U8(data) => {
                for value in data.iter() {
                    out.push(*value);
                }
            }
            ArrayData::I8(data) => {
                for value in data.iter() {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            ArrayData::I32(data) => {
                for value in data.iter() {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            ArrayData::I64(data) => {
                for value in data.iter() {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            ArrayData::F64(data) => {
                for value in data.iter() {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            ArrayData::C128(data) => {
                for value in data.iter() {
                    out.extend_from_slice(&value.re.to_be_bytes());
                    out.extend_from_slice(&value.im.to_be_bytes());
                }
            }
        }

        out
    }
}

macro_rules! from_ndarray {
    ($variant:ident, $type:ty) => {
        impl From<ArrayD<$type>> for ArrayData {
            fn from(data: ArrayD<$type>) -> Self {
                ArrayData::$variant(data)
            }
        }
    };
}

from_ndarray!(U8, u8);
from_ndarray!(I8, i8);
from_ndarray!(I32, i32);
from_ndarray!(I64, i64);
from_ndarray!(F64, f64);
from_ndarray!(C128, Complex64);

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr1, arr2};

    #[test]
    fn test_item_sizes() {
        assert_eq!(DType::U8.item_size(), 1);
        assert_eq!(DType::I8.item_size(), 1);
        assert_eq!(DType::I32.item_size(), 4);
        assert_eq!(DType::I64.item_size(), 8);
        assert_eq!(DType::F64.item_size(), 8);
        assert_eq!(DType::C128.item_size(), 16);
    }

    #[test]
    fn test_fill() {
        let ones = ArrayData::fill(DType::F64, &[2, 3], 1.0);
        assert_eq!(ones.dtype(), DType::F64);
        assert_eq!(ones.shape(), &[2, 3]);
        assert!(ones.as_f64().unwrap().iter().all(|&v| v == 1.0));

        let zeros = ArrayData::fill(DType::C128, &[4], 0.0);
        assert_eq!(zeros.dtype(), DType::C128);
        assert!(zeros
            .as_c128()
            .unwrap()
            .iter()
            .all(|v| *v == Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_slice_rows() {
        let data = ArrayData::from(arr2(&[[1, 2], [3, 4], [5, 6]]).into_dyn());
        let slab = data.slice_rows(1, 3);
        assert_eq!(slab.shape(), &[2, 2]);
        assert_eq!(
            slab.as_i32().unwrap(),
            &arr2(&[[3, 4], [5, 6]]).into_dyn()
        );
    }

    #[test]
    fn test_stack_rows() {
        let a = ArrayData::from(arr1(&[1.0, 2.0]).into_dyn());
        let b = ArrayData::from(arr1(&[3.0, 4.0]).into_dyn());
        let stacked = ArrayData::stack_rows(&[a, b]).unwrap();
        assert_eq!(stacked.shape(), &[2, 2]);
        assert_eq!(
            stacked.as_f64().unwrap(),
            &arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn()
        );
    }

    #[test]
    fn test_stack_rows_dtype_mismatch() {
        let a = ArrayData::from(arr1(&[1.0, 2.0]).into_dyn());
        let b = ArrayData::from(arr1(&[3, 4]).into_dyn());
        assert!(ArrayData::stack_rows(&[a, b]).is_err());
    }

    #[test]
    fn test_stable_bytes_distinguish_shape() {
        let flat = ArrayData::from(arr1(&[1, 2, 3, 4]).into_dyn());
        let square = ArrayData::from(arr2(&[[1, 2], [3, 4]]).into_dyn());
        assert_ne!(flat.stable_bytes(), square.stable_bytes());

        let again = ArrayData::from(arr2(&[[1, 2], [3, 4]]).into_dyn());
        assert_eq!(square.stable_bytes(), again.stable_bytes());
    }
}
