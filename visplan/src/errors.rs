use std::result;

use cid::Cid;
use thiserror::Error as ThisError;

/// Errors raised by visplan.
///
/// All of these are deterministic logic errors, raised synchronously at the
/// point of detection. None of them should be retried: they indicate an
/// internally inconsistent schema or chunking that would silently corrupt
/// numeric results if execution proceeded. A top-level driver is expected to
/// catch these at the boundary and report the offending values.
///
#[derive(Debug, ThisError)]
pub enum Error {
    /// An invalid schema/dimension combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Lookup of an array that is neither present nor declared.
    #[error("no array named '{0}'")]
    BadName(String),

    /// Merge-time disagreement on the size of a shared dimension.
    #[error("conflicting sizes for dimension '{dim}': {sizes:?}")]
    DimensionConflict { dim: String, sizes: Vec<usize> },

    /// Merge-time disagreement on the values of a shared coordinate.
    #[error("conflicting coordinate values for dimension '{dim}'")]
    CoordinateConflict { dim: String },

    /// Mismatch between per-timestep row counts and chunk boundaries.
    #[error("inconsistent chunking: {0}")]
    InconsistentChunking(String),

    /// An array with no value and no viable default rule, or a cyclic
    /// default dependency.
    #[error("cannot derive a default for '{name}': {reason}")]
    UnresolvedDefault { name: String, reason: String },

    /// A task referenced by cid was never submitted to the runtime.
    #[error("task {0} is not present in any submitted graph")]
    NotFound(Cid),
}

pub type Result<T> = result::Result<T, Error>;
