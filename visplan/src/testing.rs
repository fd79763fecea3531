use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use parking_lot::Mutex;

use crate::{
    dataset::{default_dataset, Dataset},
    dims::{default_dim_sizes, DimTable},
    dtype::ArrayData,
    errors::Result,
    rules::antenna_pairs,
    runtime::UvwKernel,
    schema::SchemaRegistry,
    source::{SourceColumn, TableSource},
};

/// 5 timesteps of 4 antennas: 6 baselines, 30 visibility rows, 20 antenna
/// rows, 8 channels.
pub fn small_overrides() -> DimTable {
    let mut overrides = DimTable::new();
    overrides.insert(String::from("utime"), 5);
    overrides.insert(String::from("antenna"), 4);
    overrides.insert(String::from("chan"), 8);

    overrides
}

pub fn small_dataset() -> Dataset {
    dataset_with_dims(&small_overrides())
}

pub fn dataset_with_dims(overrides: &DimTable) -> Dataset {
    Dataset::new(
        default_dim_sizes(overrides, false),
        Arc::new(SchemaRegistry::input()),
        false,
    )
}

pub fn small_default_dataset() -> Dataset {
    default_dataset(Arc::new(SchemaRegistry::input()), &small_overrides(), false).unwrap()
}

/// Deterministic stand-in for the real coordinate decomposition: every
/// antenna row is the mean baseline coordinate offset by the antenna index.
///
pub struct CentroidKernel;

impl UvwKernel for CentroidKernel {
    fn antenna_uvw(
        &self,
        uvw: ArrayView2<f64>,
        _antenna2: ArrayView1<i32>,
        _antenna1: ArrayView1<i32>,
        _time_vrow_chunks: ArrayView1<i32>,
        nr_of_antenna: usize,
    ) -> Result<Array2<f64>> {
        let rows = uvw.nrows().max(1) as f64;
        Ok(Array2::from_shape_fn((nr_of_antenna, 3), |(a, c)| {
            a as f64 + uvw.column(c).sum() / rows
        }))
    }
}

/// Counts kernel invocations, for memoization tests.
pub struct CountingKernel {
    inner: CentroidKernel,
    calls: Mutex<usize>,
}

impl CountingKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: CentroidKernel,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl UvwKernel for CountingKernel {
    fn antenna_uvw(
        &self,
        uvw: ArrayView2<f64>,
        antenna2: ArrayView1<i32>,
        antenna1: ArrayView1<i32>,
        time_vrow_chunks: ArrayView1<i32>,
        nr_of_antenna: usize,
    ) -> Result<Array2<f64>> {
        *self.calls.lock() += 1;
        self.inner
            .antenna_uvw(uvw, antenna2, antenna1, time_vrow_chunks, nr_of_antenna)
    }
}

/// A `TableSource` built from literal dims and columns.
pub struct ColumnSource {
    dims: DimTable,
    columns: Vec<SourceColumn>,
}

impl TableSource for ColumnSource {
    fn dims(&self) -> DimTable {
        self.dims.clone()
    }

    fn columns(&self) -> Result<Vec<SourceColumn>> {
        Ok(self.columns.clone())
    }
}

pub fn column_source(dims: &[(&str, usize)], columns: Vec<SourceColumn>) -> ColumnSource {
    ColumnSource {
        dims: dims
            .iter()
            .map(|(name, size)| (String::from(*name), *size))
            .collect(),
        columns,
    }
}

/// A synthetic measurement main table: 5 timesteps of a 4 antenna array,
/// supplying uvw (chunked in two), the antenna pairing and a channel-less
/// weight column.
///
pub struct SyntheticSource {
    inner: ColumnSource,
}

impl SyntheticSource {
    pub fn new() -> Self {
        let rows = 30;
        let (antenna1, antenna2) = antenna_pairs(4, false);
        let tile = |base: Vec<i32>| {
            let mut tiled = Vec::with_capacity(rows);
            for _ in 0..5 {
                tiled.extend_from_slice(&base);
            }
            ArrayData::from(Array1::from_vec(tiled).into_dyn())
        };

        let uvw = Array2::from_shape_fn((rows, 3), |(r, c)| (r * 3 + c) as f64);
        let weight = Array2::from_elem((rows, 4), 1.0);

        let columns = vec![
            SourceColumn {
                name: String::from("uvw"),
                dims: vec![String::from("rows"), String::from("(u,v,w)")],
                data: ArrayData::from(uvw.into_dyn()),
                chunks: Some(vec![15, 15]),
            },
            SourceColumn {
                name: String::from("antenna1"),
                dims: vec![String::from("rows")],
                data: tile(antenna1),
                chunks: None,
            },
            SourceColumn {
                name: String::from("antenna2"),
                dims: vec![String::from("rows")],
                data: tile(antenna2),
                chunks: None,
            },
            SourceColumn {
                name: String::from("weight"),
                dims: vec![String::from("rows"), String::from("corrs")],
                data: ArrayData::from(weight.into_dyn()),
                chunks: None,
            },
        ];

        let dims = [
            ("rows", rows),
            ("chans", 8),
            ("corrs", 4),
            ("utime", 5),
            ("antenna", 4),
        ];

        Self {
            inner: column_source(&dims, columns),
        }
    }
}

impl TableSource for SyntheticSource {
    fn dims(&self) -> DimTable {
        self.inner.dims()
    }

    fn columns(&self) -> Result<Vec<SourceColumn>> {
        self.inner.columns()
    }
}
