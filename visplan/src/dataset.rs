use std::sync::Arc;

use cid::Cid;
use futures::future::try_join_all;
use indexmap::IndexMap;
use ndarray::{Axis, IxDyn};

use crate::{
    chunking::group_vrow_chunks,
    dims::{default_dim_sizes, DimTable},
    dtype::ArrayData,
    errors::{Error, Result},
    graph::TaskGraph,
    resolver::DefaultResolver,
    runtime::Runtime,
    schema::SchemaRegistry,
    uvw::create_antenna_uvw,
};

/// A named array's value: either actual numbers, or a recipe for computing
/// them held as roots into a task graph.
///
#[derive(Debug, Clone)]
pub enum ArrayValue {
    Materialized(ArrayData),
    Deferred(DeferredArray),
}

/// Handle onto not-yet-computed data. One root per chunk along the leading
/// axis; `shape` is the shape of the fully materialized array.
///
#[derive(Debug, Clone)]
pub struct DeferredArray {
    pub graph: Arc<TaskGraph>,
    pub roots: Vec<Cid>,
    pub shape: Vec<usize>,
}

/// One array in a dataset, with the dimension names its axes map onto.
///
#[derive(Debug, Clone)]
pub struct Array {
    pub dims: Vec<String>,
    pub value: ArrayValue,
}

/// An ordered collection of named arrays over a shared dimension table.
///
/// Per-dimension chunk runs and integer coordinates ride along so planning
/// passes and merges can validate agreement. The schema registry travels with
/// the dataset so defaults can be derived on demand.
///
#[derive(Debug, Clone)]
pub struct Dataset {
    pub arrays: IndexMap<String, Array>,
    pub dims: DimTable,
    pub chunks: IndexMap<String, Vec<usize>>,
    pub coords: IndexMap<String, Vec<i64>>,
    pub auto_correlations: bool,
    pub registry: Arc<SchemaRegistry>,
}

impl Dataset {
    pub fn new(dims: DimTable, registry: Arc<SchemaRegistry>, auto_correlations: bool) -> Self {
        let coords = dims
            .iter()
            .map(|(name, size)| (name.clone(), (0..*size as i64).collect()))
            .collect();

        Self {
            arrays: IndexMap::new(),
            dims,
            chunks: IndexMap::new(),
            coords,
            auto_correlations,
            registry,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Array> {
        self.arrays.get(name)
    }

    /// Borrow the materialized values of an array.
    ///
    pub fn get_data(&self, name: &str) -> Result<&ArrayData> {
        match self.arrays.get(name) {
            Some(array) => match &array.value {
                ArrayValue::Materialized(data) => Ok(data),
                ArrayValue::Deferred(_) => Err(Error::Configuration(format!(
                    "array '{name}' is deferred and must go through a runtime"
                ))),
            },
            None => Err(Error::BadName(String::from(name))),
        }
    }

    /// Assign materialized values under the given dimension names, verifying
    /// each axis against the dimension table.
    ///
    pub fn set_array(&mut self, name: &str, dims: Vec<String>, data: ArrayData) -> Result<()> {
        self.check_dims(name, &dims, data.shape())?;
        self.arrays.insert(
            String::from(name),
            Array {
                dims,
                value: ArrayValue::Materialized(data),
            },
        );

        Ok(())
    }

    /// Assign a deferred array under the given dimension names.
    ///
    pub fn set_deferred(
        &mut self,
        name: &str,
        dims: Vec<String>,
        deferred: DeferredArray,
    ) -> Result<()> {
        self.check_dims(name, &dims, &deferred.shape)?;
        self.arrays.insert(
            String::from(name),
            Array {
                dims,
                value: ArrayValue::Deferred(deferred),
            },
        );

        Ok(())
    }

    fn check_dims(&self, name: &str, dims: &[String], shape: &[usize]) -> Result<()> {
        if dims.len() != shape.len() {
            return Err(Error::Configuration(format!(
                "array '{}' declares {} dimensions but has {} axes",
                name,
                dims.len(),
                shape.len()
            )));
        }
        for (dim, size) in dims.iter().zip(shape) {
            let expected = *self.dims.get(dim).ok_or_else(|| {
                Error::Configuration(format!(
                    "array '{name}' references dimension '{dim}' which is not in the dimension table"
                ))
            })?;
            if expected != *size {
                return Err(Error::Configuration(format!(
                    "array '{name}' has {size} elements along '{dim}', expected {expected}"
                )));
            }
        }

        Ok(())
    }

    /// Chunk runs for a dimension, defaulting to a single full-size chunk.
    ///
    pub fn chunks_for(&self, dim: &str) -> Vec<usize> {
        if let Some(runs) = self.chunks.get(dim) {
            return runs.clone();
        }
        match self.dims.get(dim) {
            Some(0) | None => vec![],
            Some(size) => vec![*size],
        }
    }

    /// Replace the chunk runs for a dimension. The runs must partition the
    /// dimension exactly.
    ///
    pub fn set_chunks(&mut self, dim: &str, runs: Vec<usize>) -> Result<()> {
        let size = *self.dims.get(dim).ok_or_else(|| {
            Error::Configuration(format!("dimension '{dim}' is not in the dimension table"))
        })?;
        let total: usize = runs.iter().sum();
        if total != size {
            return Err(Error::InconsistentChunking(format!(
                "chunks for '{dim}' sum to {total}, expected {size}"
            )));
        }
        self.chunks.insert(String::from(dim), runs);

        Ok(())
    }

    /// Read a one dimensional i32 array as chunk-sized counts.
    ///
    pub(crate) fn usize_values(&self, name: &str) -> Result<Vec<usize>> {
        let data = self.get_data(name)?;
        let values = data.as_i32().ok_or_else(|| {
            Error::Configuration(format!("array '{name}' does not hold i32 values"))
        })?;
        if values.ndim() != 1 {
            return Err(Error::Configuration(format!(
                "array '{name}' is not one dimensional"
            )));
        }

        Ok(values.iter().map(|v| *v as usize).collect())
    }

    /// Evaluate a deferred array through a runtime, stacking the per-root
    /// slabs along a new leading axis. Materialized arrays come back as is.
    ///
    pub async fn materialize(&self, name: &str, runtime: &dyn Runtime) -> Result<ArrayData> {
        let array = self
            .arrays
            .get(name)
            .ok_or_else(|| Error::BadName(String::from(name)))?;
        match &array.value {
            ArrayValue::Materialized(data) => Ok(data.clone()),
            ArrayValue::Deferred(deferred) => {
                runtime.submit(Arc::clone(&deferred.graph)).await?;
                let slabs = try_join_all(
                    deferred.roots.iter().map(|cid| runtime.materialize(cid)),
                )
                .await?;

                ArrayData::stack_rows(&slabs)
            }
        }
    }
}

/// Build a dataset of the given dimensions with every input array present,
/// deriving defaults through the resolver. Arrays without a derivation rule
/// fall back to zeros.
///
pub fn default_dataset(
    registry: Arc<SchemaRegistry>,
    overrides: &DimTable,
    auto_correlations: bool,
) -> Result<Dataset> {
    let dims = default_dim_sizes(overrides, auto_correlations);
    let mut ds = Dataset::new(dims, Arc::clone(&registry), auto_correlations);
    fill_defaults(&mut ds, &DefaultResolver::new(registry))?;

    Ok(ds)
}

/// Derive every input-schema array the dataset is missing.
///
pub(crate) fn fill_defaults(ds: &mut Dataset, resolver: &DefaultResolver) -> Result<()> {
    let names: Vec<String> = resolver
        .registry()
        .iter()
        .map(|schema| schema.name.clone())
        .collect();
    for name in names {
        if ds.arrays.contains_key(&name) {
            continue;
        }
        let schema = match resolver.registry().get(&name) {
            Some(schema) => schema,
            None => continue,
        };
        if schema.default.is_some() {
            resolver.resolve(ds, &name)?;
        } else {
            let reified = schema.reify(&ds.dims, &ds.chunks)?;
            let zeros = ArrayData::zeros(reified.dtype, &reified.shape);
            ds.set_array(&name, reified.dims, zeros)?;
        }
    }

    Ok(())
}

/// Finish a dataset for kernel consumption: normalize the weight array, fill
/// remaining defaults, regroup row chunks on timestep boundaries and attach
/// the deferred per-antenna coordinate array.
///
pub fn prepare_dataset(mut ds: Dataset) -> Result<Dataset> {
    normalize_weight(&mut ds)?;

    let resolver = DefaultResolver::new(Arc::clone(&ds.registry));
    resolver.resolve(&mut ds, "time_arow_chunks")?;
    fill_defaults(&mut ds, &resolver)?;

    let vrow_chunks = ds.usize_values("time_vrow_chunks")?;
    let arow_chunks = ds.usize_values("time_arow_chunks")?;
    let max_vrow = ds.chunks_for("vrow").into_iter().max().unwrap_or(0);
    let groups = group_vrow_chunks(&vrow_chunks, &arow_chunks, max_vrow)?;
    ds.set_chunks("utime", groups.utime.clone())?;
    ds.set_chunks("vrow", groups.vrow.clone())?;
    ds.set_chunks("arow", groups.arow.clone())?;

    create_antenna_uvw(ds)
}

/// A measurement may carry per-channel weights under another name, or a
/// channel-less weight that has to be broadcast up to the full shape.
///
fn normalize_weight(ds: &mut Dataset) -> Result<()> {
    if let Some(array) = ds.arrays.shift_remove("weight_spectrum") {
        ds.arrays.insert(String::from("weight"), array);
        return Ok(());
    }

    let needs_broadcast = match ds.arrays.get("weight") {
        Some(array) => array.dims == ["vrow", "corr"],
        None => false,
    };
    if !needs_broadcast {
        return Ok(());
    }

    let chan = *ds.dims.get("chan").ok_or_else(|| {
        Error::Configuration(String::from(
            "dimension 'chan' is not in the dimension table",
        ))
    })?;
    let data = ds.get_data("weight")?;
    let values = data.as_f64().ok_or_else(|| {
        Error::Configuration(String::from("array 'weight' does not hold f64 values"))
    })?;
    let (vrow, corr) = (values.shape()[0], values.shape()[1]);
    let expanded = values.clone().insert_axis(Axis(1));
    let broadcast = expanded
        .broadcast(IxDyn(&[vrow, chan, corr]))
        .ok_or_else(|| {
            Error::Configuration(String::from("cannot broadcast 'weight' over 'chan'"))
        })?
        .to_owned();

    ds.set_array(
        "weight",
        vec![
            String::from("vrow"),
            String::from("chan"),
            String::from("corr"),
        ],
        ArrayData::from(broadcast),
    )
}
