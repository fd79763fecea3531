mod budget;
mod chunking;
mod dataset;
mod dims;
mod dtype;
mod errors;
mod graph;
mod merge;
mod resolver;
mod rules;
mod runtime;
mod schema;
mod source;
mod uvw;

#[cfg(test)]
mod testing;

pub use budget::budget;
pub use budget::default_reductions;
pub use budget::normalize_chunks;
pub use budget::rechunk_to_budget;
pub use budget::rechunk_with_reductions;
pub use budget::required_bytes;
pub use budget::uniq_log2_range;

pub use chunking::group_vrow_chunks;
pub use chunking::ChunkGroups;

pub use dataset::default_dataset;
pub use dataset::prepare_dataset;
pub use dataset::Array;
pub use dataset::ArrayValue;
pub use dataset::Dataset;
pub use dataset::DeferredArray;

pub use dims::default_dim_sizes;
pub use dims::nr_of_baselines;
pub use dims::DimTable;

pub use dtype::ArrayData;
pub use dtype::DType;

pub use errors::Error;
pub use errors::Result;

pub use graph::TaskGraph;
pub use graph::TaskInput;
pub use graph::TaskNode;
pub use graph::TaskOp;

pub use merge::merge_datasets;

pub use resolver::DefaultResolver;

pub use rules::DefaultRule;
pub use rules::PairMember;

pub use runtime::LocalRuntime;
pub use runtime::Runtime;
pub use runtime::UvwKernel;

pub use schema::ArraySchema;
pub use schema::ReifiedSchema;
pub use schema::SchemaRegistry;

pub use source::attach_antenna_table;
pub use source::attach_spectral_window;
pub use source::dataset_from_source;
pub use source::rename_dim;
pub use source::SourceColumn;
pub use source::TableSource;

pub use uvw::create_antenna_uvw;
