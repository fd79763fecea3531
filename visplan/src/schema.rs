use indexmap::IndexMap;

use crate::{
    dims::DimTable,
    dtype::DType,
    errors::{Error, Result},
    rules::{DefaultRule, PairMember},
};

/// Minimum and maximum synthetic timestamps (seconds, MJD epoch).
pub const TIME_LO: f64 = 4.865965e9;
pub const TIME_HI: f64 = 4.865985e9;

/// Minimum and maximum synthetic channel frequencies (Hz).
pub const FREQUENCY_LO: f64 = 8.56e9;
pub const FREQUENCY_HI: f64 = 1.712e10;

/// Declared shape and derivation rule for one named array.
///
#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub name: String,
    pub dims: Vec<String>,
    pub dtype: DType,
    pub default: Option<DefaultRule>,
}

/// An `ArraySchema` with its dimensions looked up against a concrete
/// dimension table.
///
#[derive(Debug, Clone)]
pub struct ReifiedSchema {
    pub dims: Vec<String>,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub chunks: Vec<Vec<usize>>,
}

impl ArraySchema {
    pub(crate) fn new(name: &str, dims: &[&str], dtype: DType, default: Option<DefaultRule>) -> Self {
        Self {
            name: String::from(name),
            dims: dims.iter().map(|dim| String::from(*dim)).collect(),
            dtype,
            default,
        }
    }

    /// Look up every dimension in the table, producing the concrete shape and
    /// per-dimension chunk runs. Dimensions without an entry in the chunk
    /// table get a single chunk spanning the full size.
    ///
    pub fn reify(
        &self,
        dims: &DimTable,
        chunks: &IndexMap<String, Vec<usize>>,
    ) -> Result<ReifiedSchema> {
        let mut shape = Vec::with_capacity(self.dims.len());
        let mut chunk_runs = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            let size = *dims.get(dim).ok_or_else(|| {
                Error::Configuration(format!(
                    "array '{}' references dimension '{}' which is not in the dimension table",
                    self.name, dim
                ))
            })?;
            shape.push(size);
            chunk_runs.push(match chunks.get(dim) {
                Some(runs) => runs.clone(),
                None if size == 0 => vec![],
                None => vec![size],
            });
        }

        Ok(ReifiedSchema {
            dims: self.dims.clone(),
            dtype: self.dtype,
            shape,
            chunks: chunk_runs,
        })
    }
}

/// Immutable, ordered collection of array schemas. Built once per planning
/// pass and shared via `Arc`.
///
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    arrays: IndexMap<String, ArraySchema>,
}

impl SchemaRegistry {
    pub(crate) fn from_schemas(schemas: Vec<ArraySchema>) -> Self {
        let arrays = schemas
            .into_iter()
            .map(|schema| (schema.name.clone(), schema))
            .collect();

        Self { arrays }
    }

    pub fn get(&self, name: &str) -> Option<&ArraySchema> {
        self.arrays.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArraySchema> {
        self.arrays.values()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Arrays synthesized for a simulation when no measurement supplies them.
    ///
    pub fn default_schema() -> Self {
        use DefaultRule::*;

        Self::from_schemas(vec![
            ArraySchema::new("time", &["vrow"], DType::F64, Some(Time)),
            ArraySchema::new("time_index", &["vrow"], DType::I32, Some(TimeIndex)),
            ArraySchema::new(
                "time_unique",
                &["utime"],
                DType::F64,
                Some(LinearRange {
                    lo: TIME_LO,
                    hi: TIME_HI,
                }),
            ),
            ArraySchema::new(
                "time_arow_chunks",
                &["utime"],
                DType::I32,
                Some(TimeArowChunks),
            ),
            ArraySchema::new(
                "time_vrow_chunks",
                &["utime"],
                DType::I32,
                Some(TimeVrowChunks),
            ),
            ArraySchema::new("base_vis", &["vrow", "chan", "corr"], DType::C128, None),
            ArraySchema::new("data", &["vrow", "chan", "corr"], DType::C128, None),
            ArraySchema::new("antenna_uvw", &["arow", "(u,v,w)"], DType::F64, None),
            ArraySchema::new("uvw", &["vrow", "(u,v,w)"], DType::F64, None),
            ArraySchema::new(
                "antenna1",
                &["vrow"],
                DType::I32,
                Some(AntennaPairs {
                    member: PairMember::First,
                }),
            ),
            ArraySchema::new(
                "antenna2",
                &["vrow"],
                DType::I32,
                Some(AntennaPairs {
                    member: PairMember::Second,
                }),
            ),
            ArraySchema::new("flag", &["vrow", "chan", "corr"], DType::U8, Some(Fill(0.0))),
            ArraySchema::new(
                "weight",
                &["vrow", "chan", "corr"],
                DType::F64,
                Some(Fill(1.0)),
            ),
            ArraySchema::new(
                "frequency",
                &["chan"],
                DType::F64,
                Some(LinearRange {
                    lo: FREQUENCY_LO,
                    hi: FREQUENCY_HI,
                }),
            ),
            ArraySchema::new("parallactic_angles", &["arow"], DType::F64, None),
            ArraySchema::new("antenna_position", &["antenna", "(x,y,z)"], DType::F64, None),
            ArraySchema::new(
                "direction_independent_effects",
                &["arow", "chan", "corr"],
                DType::C128,
                Some(BroadcastIdentity {
                    dim: String::from("corr"),
                }),
            ),
            ArraySchema::new(
                "ebeam",
                &["beam_lw", "beam_mh", "beam_nud", "corr"],
                DType::C128,
                Some(BroadcastIdentity {
                    dim: String::from("corr"),
                }),
            ),
            ArraySchema::new(
                "pointing_errors",
                &["arow", "chan", "(l,m)"],
                DType::F64,
                None,
            ),
            ArraySchema::new(
                "antenna_scaling",
                &["antenna", "chan", "(l,m)"],
                DType::F64,
                Some(Fill(1.0)),
            ),
            ArraySchema::new(
                "beam_extents",
                &["(ll,lm,lf,ul,um,uf)"],
                DType::F64,
                Some(Literal(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0])),
            ),
            ArraySchema::new(
                "beam_freq_map",
                &["beam_nud"],
                DType::F64,
                Some(LinearRange {
                    lo: FREQUENCY_LO,
                    hi: FREQUENCY_HI,
                }),
            ),
        ])
    }

    /// Per-source-population arrays.
    ///
    pub fn source_schema() -> Self {
        use DefaultRule::*;

        let stokes = |name: &str, dim: &str| {
            ArraySchema::new(
                name,
                &[dim, "utime", "(I,Q,U,V)"],
                DType::F64,
                Some(OneHot {
                    dim: String::from("(I,Q,U,V)"),
                    hot: 0,
                }),
            )
        };

        Self::from_schemas(vec![
            ArraySchema::new("point_lm", &["point", "(l,m)"], DType::F64, None),
            ArraySchema::new("point_ref_freq", &["point"], DType::F64, None),
            ArraySchema::new("point_alpha", &["point", "utime"], DType::F64, None),
            stokes("point_stokes", "point"),
            ArraySchema::new("gaussian_lm", &["gaussian", "(l,m)"], DType::F64, None),
            ArraySchema::new("gaussian_ref_freq", &["gaussian"], DType::F64, None),
            ArraySchema::new("gaussian_alpha", &["gaussian", "utime"], DType::F64, None),
            stokes("gaussian_stokes", "gaussian"),
            ArraySchema::new(
                "gaussian_shape_params",
                &["(lproj,mproj,theta)", "gaussian"],
                DType::F64,
                Some(OneHot {
                    dim: String::from("(lproj,mproj,theta)"),
                    hot: 2,
                }),
            ),
            ArraySchema::new("sersic_lm", &["sersic", "(l,m)"], DType::F64, None),
            ArraySchema::new("sersic_ref_freq", &["sersic"], DType::F64, None),
            ArraySchema::new("sersic_alpha", &["sersic", "utime"], DType::F64, None),
            stokes("sersic_stokes", "sersic"),
            ArraySchema::new(
                "sersic_shape_params",
                &["(s1,s2,theta)", "sersic"],
                DType::F64,
                Some(OneHot {
                    dim: String::from("(s1,s2,theta)"),
                    hot: 2,
                }),
            ),
        ])
    }

    /// Everything a kernel invocation may read.
    ///
    pub fn input() -> Self {
        let mut arrays = Self::default_schema().arrays;
        arrays.extend(Self::source_schema().arrays);

        Self { arrays }
    }

    /// Intermediate per-source terms produced while evaluating the model.
    ///
    pub fn scratch() -> Self {
        Self::from_schemas(vec![
            ArraySchema::new(
                "bsqrt",
                &["point", "utime", "chan", "corr"],
                DType::C128,
                None,
            ),
            ArraySchema::new(
                "complex_phase",
                &["point", "arow", "chan"],
                DType::C128,
                None,
            ),
            ArraySchema::new(
                "ejones",
                &["point", "arow", "chan", "corr"],
                DType::C128,
                None,
            ),
            ArraySchema::new(
                "antenna_jones",
                &["point", "arow", "chan", "corr"],
                DType::C128,
                None,
            ),
            ArraySchema::new("sgn_brightness", &["point", "utime"], DType::I8, None),
            ArraySchema::new("source_shape", &["point", "vrow", "chan"], DType::F64, None),
            ArraySchema::new("chi_sqrd_terms", &["vrow", "chan"], DType::F64, None),
        ])
    }

    /// Arrays a kernel invocation produces.
    ///
    pub fn output() -> Self {
        Self::from_schemas(vec![
            ArraySchema::new("model_vis", &["vrow", "chan", "corr"], DType::C128, None),
            ArraySchema::new("chi_squared", &[], DType::F64, None),
        ])
    }
}
