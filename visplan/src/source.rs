use std::sync::Arc;

use crate::{
    dataset::Dataset,
    dims::{default_dim_sizes, DimTable},
    dtype::ArrayData,
    errors::{Error, Result},
    schema::SchemaRegistry,
};

/// One named column read from a measurement table, with the source's own
/// dimension names and optional chunk runs along the leading axis.
///
#[derive(Debug, Clone)]
pub struct SourceColumn {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayData,
    pub chunks: Option<Vec<usize>>,
}

/// A measurement table: dimension sizes plus dimensioned columns.
///
/// Implementations sit over whatever storage actually holds the measurement.
/// The adapter below only renames dimensions; it never reinterprets values.
///
pub trait TableSource {
    fn dims(&self) -> DimTable;

    fn columns(&self) -> Result<Vec<SourceColumn>>;
}

/// Map a main-table dimension name onto ours. Unknown names pass through.
///
pub fn rename_dim(name: &str) -> String {
    String::from(match name {
        "rows" => "vrow",
        "chans" => "chan",
        "pols" => "pol",
        "corrs" => "corr",
        "time_chunks" => "time_vrow_chunks",
        other => other,
    })
}

/// Build a dataset over a measurement table. Source dimensions override the
/// standard sizes, column chunk runs become the chunk table entries for
/// their leading dimension, and values carry over untouched.
///
pub fn dataset_from_source(
    source: &dyn TableSource,
    registry: Arc<SchemaRegistry>,
    auto_correlations: bool,
) -> Result<Dataset> {
    let overrides: DimTable = source
        .dims()
        .iter()
        .map(|(name, size)| (rename_dim(name), *size))
        .collect();
    let dims = default_dim_sizes(&overrides, auto_correlations);
    let mut ds = Dataset::new(dims, registry, auto_correlations);

    for column in source.columns()? {
        let dims: Vec<String> = column.dims.iter().map(|dim| rename_dim(dim)).collect();
        if let (Some(runs), Some(leading)) = (column.chunks, dims.first()) {
            ds.set_chunks(leading, runs)?;
        }
        ds.set_array(&column.name, dims, column.data)?;
    }

    Ok(ds)
}

/// Pull antenna positions out of an antenna subtable, whose rows are
/// antennas rather than visibilities.
///
pub fn attach_antenna_table(ds: &mut Dataset, table: &dyn TableSource) -> Result<()> {
    let column = find_column(table, "position")?;
    let dims = column
        .dims
        .iter()
        .map(|dim| {
            String::from(match dim.as_str() {
                "rows" => "antenna",
                other => other,
            })
        })
        .collect();

    ds.set_array("antenna_position", dims, column.data)
}

/// Pull channel frequencies out of a spectral window subtable.
///
pub fn attach_spectral_window(ds: &mut Dataset, table: &dyn TableSource) -> Result<()> {
    let column = find_column(table, "chan_freq")?;
    let dims = column.dims.iter().map(|dim| rename_dim(dim)).collect();

    ds.set_array("frequency", dims, column.data)
}

fn find_column(table: &dyn TableSource, name: &str) -> Result<SourceColumn> {
    table
        .columns()?
        .into_iter()
        .find(|column| column.name == name)
        .ok_or_else(|| Error::Configuration(format!("source table has no '{name}' column")))
}
