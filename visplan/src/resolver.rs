use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use ndarray::{Array1, ArrayD, IxDyn};
use num_complex::Complex64;
use parking_lot::Mutex;

use crate::{
    dataset::{ArrayValue, Dataset},
    dtype::{ArrayData, DType},
    errors::{Error, Result},
    rules::{antenna_pairs, is_power_of_two, DefaultRule, PairMember},
    schema::SchemaRegistry,
};

/// Derives missing arrays from their schema rules, on demand.
///
/// Prerequisites resolve recursively through the same entry point, results
/// memoize onto the dataset, and per-rule invocation counters make the
/// memoization observable in tests. Re-entry on a name still being derived
/// means the rule table has a cycle.
///
pub struct DefaultResolver {
    registry: Arc<SchemaRegistry>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: Mutex<HashSet<String>>,
}

impl DefaultResolver {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            calls: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Times the derivation rule for `name` has actually run.
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    /// Return the array's values, deriving and assigning them first if the
    /// dataset does not have them yet.
    ///
    pub fn resolve(&self, ds: &mut Dataset, name: &str) -> Result<ArrayData> {
        if let Some(array) = ds.arrays.get(name) {
            return match &array.value {
                ArrayValue::Materialized(data) => Ok(data.clone()),
                ArrayValue::Deferred(_) => Err(Error::UnresolvedDefault {
                    name: String::from(name),
                    reason: String::from("the array is deferred"),
                }),
            };
        }

        let schema = self
            .registry
            .get(name)
            .ok_or_else(|| Error::BadName(String::from(name)))?;
        let dims = schema.dims.clone();
        let rule = match &schema.default {
            Some(rule) => rule.clone(),
            None => {
                return Err(Error::UnresolvedDefault {
                    name: String::from(name),
                    reason: String::from("no derivation rule is declared"),
                })
            }
        };

        if !self.in_flight.lock().insert(String::from(name)) {
            return Err(Error::UnresolvedDefault {
                name: String::from(name),
                reason: String::from("cyclic default dependency"),
            });
        }
        let derived = self.derive(ds, name, &rule);
        self.in_flight.lock().remove(name);

        let data = derived?;
        ds.set_array(name, dims, data.clone())?;

        Ok(data)
    }

    fn derive(&self, ds: &mut Dataset, name: &str, rule: &DefaultRule) -> Result<ArrayData> {
        for prerequisite in rule.prerequisites() {
            self.resolve(ds, prerequisite)?;
        }
        *self.calls.lock().entry(String::from(name)).or_insert(0) += 1;

        self.eval(ds, name, rule)
    }

    fn eval(&self, ds: &Dataset, name: &str, rule: &DefaultRule) -> Result<ArrayData> {
        let schema = self
            .registry
            .get(name)
            .ok_or_else(|| Error::BadName(String::from(name)))?;
        let reified = schema.reify(&ds.dims, &ds.chunks)?;
        let shape = reified.shape.as_slice();
        let dtype = reified.dtype;

        match rule {
            DefaultRule::Fill(value) => Ok(ArrayData::fill(dtype, shape, *value)),

            DefaultRule::Literal(values) => {
                if shape != [values.len()] {
                    return Err(Error::Configuration(format!(
                        "literal default for '{}' has {} elements, shape is {:?}",
                        name,
                        values.len(),
                        shape
                    )));
                }
                cast_literal(dtype, values)
            }

            DefaultRule::BroadcastIdentity { dim } => {
                let pos = dim_position(&reified.dims, name, dim)?;
                let size = shape[pos];
                if !is_power_of_two(size) {
                    return Err(Error::Configuration(format!(
                        "cannot create an identity default for '{name}': \
                         dimension '{dim}' has size {size}, which is not a power of two"
                    )));
                }
                let mut pattern = vec![0.0; size];
                pattern[0] = 1.0;
                pattern[size - 1] = 1.0;
                match dtype {
                    DType::C128 => Ok(ArrayData::from(ArrayD::from_shape_fn(
                        IxDyn(shape),
                        |idx| Complex64::new(pattern[idx[pos]], 0.0),
                    ))),
                    DType::F64 => Ok(ArrayData::from(ArrayD::from_shape_fn(
                        IxDyn(shape),
                        |idx| pattern[idx[pos]],
                    ))),
                    _ => Err(Error::Configuration(format!(
                        "identity default for '{name}' requires a float or complex dtype"
                    ))),
                }
            }

            DefaultRule::OneHot { dim, hot } => {
                let pos = dim_position(&reified.dims, name, dim)?;
                if *hot >= shape[pos] {
                    return Err(Error::Configuration(format!(
                        "hot index {} is out of range for dimension '{}' of size {}",
                        hot, dim, shape[pos]
                    )));
                }
                Ok(ArrayData::from(ArrayD::from_shape_fn(
                    IxDyn(shape),
                    |idx| if idx[pos] == *hot { 1.0 } else { 0.0 },
                )))
            }

            DefaultRule::LinearRange { lo, hi } => {
                let n = shape[0];
                let values = if n < 2 {
                    vec![*lo; n]
                } else {
                    let step = (hi - lo) / (n - 1) as f64;
                    (0..n).map(|i| lo + step * i as f64).collect()
                };
                Ok(ArrayData::from(Array1::from_vec(values).into_dyn()))
            }

            DefaultRule::AntennaPairs { member } => {
                let antenna = dim_size(ds, "antenna")?;
                let utime = dim_size(ds, "utime")?;
                let vrow = shape[0];
                let (antenna1, antenna2) = antenna_pairs(antenna, ds.auto_correlations);
                let nbl = antenna1.len();
                if utime * nbl != vrow {
                    return Err(Error::Configuration(format!(
                        "{vrow} visibility rows do not tile {utime} timesteps \
                         of {nbl} baselines"
                    )));
                }
                let base = match member {
                    PairMember::First => antenna1,
                    PairMember::Second => antenna2,
                };
                let mut tiled = Vec::with_capacity(vrow);
                for _ in 0..utime {
                    tiled.extend_from_slice(&base);
                }
                Ok(ArrayData::from(Array1::from_vec(tiled).into_dyn()))
            }

            DefaultRule::Time => {
                let unique = ds.get_data("time_unique")?;
                let unique = unique.as_f64().ok_or_else(|| {
                    Error::Configuration(String::from(
                        "array 'time_unique' does not hold f64 values",
                    ))
                })?;
                let chunks = ds.usize_values("time_vrow_chunks")?;
                if unique.len() != chunks.len() {
                    return Err(Error::InconsistentChunking(format!(
                        "{} unique times and {} row chunks do not agree",
                        unique.len(),
                        chunks.len()
                    )));
                }
                let mut values = Vec::with_capacity(shape[0]);
                for (time, count) in unique.iter().zip(&chunks) {
                    values.extend(std::iter::repeat(*time).take(*count));
                }
                Ok(ArrayData::from(Array1::from_vec(values).into_dyn()))
            }

            DefaultRule::TimeIndex => {
                let chunks = ds.usize_values("time_vrow_chunks")?;
                let mut values = Vec::with_capacity(shape[0]);
                for (index, count) in chunks.iter().enumerate() {
                    values.extend(std::iter::repeat(index as i32).take(*count));
                }
                Ok(ArrayData::from(Array1::from_vec(values).into_dyn()))
            }

            DefaultRule::TimeVrowChunks => {
                let vrow = dim_size(ds, "vrow")?;
                let utime = shape[0];
                if utime == 0 || vrow % utime != 0 {
                    return Err(Error::Configuration(format!(
                        "cannot evenly divide {vrow} visibility rows into {utime} timesteps"
                    )));
                }
                let per_step = (vrow / utime) as i32;
                Ok(ArrayData::from(
                    Array1::from_vec(vec![per_step; utime]).into_dyn(),
                ))
            }

            DefaultRule::TimeArowChunks => {
                let antenna1 = int_values(ds, "antenna1")?;
                let antenna2 = int_values(ds, "antenna2")?;
                let chunks = ds.usize_values("time_vrow_chunks")?;
                let mut counts = Vec::with_capacity(chunks.len());
                let mut start = 0;
                for count in &chunks {
                    let end = start + count;
                    if end > antenna1.len() {
                        return Err(Error::InconsistentChunking(format!(
                            "row chunk [{start}, {end}) runs past {} baseline rows",
                            antenna1.len()
                        )));
                    }
                    let distinct: BTreeSet<i32> = antenna1[start..end]
                        .iter()
                        .chain(&antenna2[start..end])
                        .copied()
                        .collect();
                    counts.push(distinct.len() as i32);
                    start = end;
                }
                Ok(ArrayData::from(Array1::from_vec(counts).into_dyn()))
            }
        }
    }
}

fn dim_size(ds: &Dataset, dim: &str) -> Result<usize> {
    ds.dims.get(dim).copied().ok_or_else(|| {
        Error::Configuration(format!("dimension '{dim}' is not in the dimension table"))
    })
}

fn dim_position(dims: &[String], name: &str, dim: &str) -> Result<usize> {
    dims.iter().position(|d| d == dim).ok_or_else(|| {
        Error::Configuration(format!("array '{name}' has no dimension '{dim}'"))
    })
}

fn int_values(ds: &Dataset, name: &str) -> Result<Vec<i32>> {
    let data = ds.get_data(name)?;
    let values = data.as_i32().ok_or_else(|| {
        Error::Configuration(format!("array '{name}' does not hold i32 values"))
    })?;

    Ok(values.iter().copied().collect())
}

fn cast_literal(dtype: DType, values: &[f64]) -> Result<ArrayData> {
    let data = match dtype {
        DType::U8 => ArrayData::from(
            Array1::from_vec(values.iter().map(|v| *v as u8).collect()).into_dyn(),
        ),
        DType::I8 => ArrayData::from(
            Array1::from_vec(values.iter().map(|v| *v as i8).collect()).into_dyn(),
        ),
        DType::I32 => ArrayData::from(
            Array1::from_vec(values.iter().map(|v| *v as i32).collect()).into_dyn(),
        ),
        DType::I64 => ArrayData::from(
            Array1::from_vec(values.iter().map(|v| *v as i64).collect()).into_dyn(),
        ),
        DType::F64 => ArrayData::from(Array1::from_vec(values.to_vec()).into_dyn()),
        DType::C128 => ArrayData::from(
            Array1::from_vec(
                values
                    .iter()
                    .map(|v| Complex64::new(*v, 0.0))
                    .collect::<Vec<_>>(),
            )
            .into_dyn(),
        ),
    };

    Ok(data)
}
