use std::sync::Arc;

use crate::{
    dataset::{Dataset, DeferredArray},
    errors::{Error, Result},
    graph::{TaskGraph, TaskInput, TaskNode, TaskOp},
};

/// Attach a deferred per-antenna coordinate array, one task per chunk group.
///
/// The vrow and utime chunk tables must march in lockstep, and within every
/// aligned pair the per-timestep row counts must sum to the row chunk's size.
/// Any mismatch fails the whole build; no partial array is ever assigned.
///
/// The result is a deferred `antenna_uvw` of shape (groups, antenna, 3) under
/// a derived `utime_group` dimension, chunked one group at a time.
///
pub fn create_antenna_uvw(mut ds: Dataset) -> Result<Dataset> {
    let utime_chunks = ds.chunks_for("utime");
    let vrow_chunks = ds.chunks_for("vrow");
    if utime_chunks.len() != vrow_chunks.len() {
        return Err(Error::InconsistentChunking(format!(
            "{} utime chunks and {} vrow chunks do not march in lockstep",
            utime_chunks.len(),
            vrow_chunks.len()
        )));
    }

    let nr_of_antenna = *ds.dims.get("antenna").ok_or_else(|| {
        Error::Configuration(String::from(
            "dimension 'antenna' is not in the dimension table",
        ))
    })?;
    let per_timestep = ds.usize_values("time_vrow_chunks")?;

    let mut bounds = Vec::with_capacity(vrow_chunks.len());
    let (mut row_start, mut ut_start) = (0, 0);
    for (vrows, utimes) in vrow_chunks.iter().zip(&utime_chunks) {
        let row_end = row_start + vrows;
        let ut_end = ut_start + utimes;
        let covered: usize = per_timestep[ut_start..ut_end].iter().sum();
        if covered != *vrows {
            return Err(Error::InconsistentChunking(format!(
                "rows in timestep chunks [{ut_start}, {ut_end}) sum to {covered}, \
                 but the row chunk [{row_start}, {row_end}) holds {vrows} rows"
            )));
        }
        bounds.push((row_start, row_end, ut_start, ut_end));
        row_start = row_end;
        ut_start = ut_end;
    }

    let uvw = ds.get_data("uvw")?.clone();
    let antenna1 = ds.get_data("antenna1")?.clone();
    let antenna2 = ds.get_data("antenna2")?.clone();
    let chunk_counts = ds.get_data("time_vrow_chunks")?.clone();

    let mut graph = TaskGraph::new();
    for (row_start, row_end, ut_start, ut_end) in &bounds {
        // antenna2 before antenna1: the kernel derives signs from the
        // conjugate baseline order.
        // TODO: flip once the kernel takes (antenna1, antenna2) directly.
        let inputs = vec![
            TaskInput::Literal(uvw.slice_rows(*row_start, *row_end)),
            TaskInput::Literal(antenna2.slice_rows(*row_start, *row_end)),
            TaskInput::Literal(antenna1.slice_rows(*row_start, *row_end)),
            TaskInput::Literal(chunk_counts.slice_rows(*ut_start, *ut_end)),
        ];
        graph.add_root(TaskNode::new(
            TaskOp::AntennaUvw { nr_of_antenna },
            inputs,
            vec![*row_start, *row_end, *ut_start, *ut_end],
        ));
    }

    let nr_of_groups = bounds.len();
    ds.dims.insert(String::from("utime_group"), nr_of_groups);
    ds.coords.insert(
        String::from("utime_group"),
        (0..nr_of_groups as i64).collect(),
    );
    ds.chunks
        .insert(String::from("utime_group"), vec![1; nr_of_groups]);

    let roots = graph.roots().to_vec();
    ds.set_deferred(
        "antenna_uvw",
        vec![
            String::from("utime_group"),
            String::from("antenna"),
            String::from("(u,v,w)"),
        ],
        DeferredArray {
            graph: Arc::new(graph),
            roots,
            shape: vec![nr_of_groups, nr_of_antenna, 3],
        },
    )?;

    Ok(ds)
}
