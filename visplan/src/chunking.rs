use crate::errors::{Error, Result};

/// Group sizes produced by the row-chunk grouper, one entry per group for
/// each of the three partitioned dimensions.
///
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkGroups {
    pub utime: Vec<usize>,
    pub vrow: Vec<usize>,
    pub arow: Vec<usize>,
}

impl ChunkGroups {
    fn push(&mut self, utimes: usize, vrows: usize, arows: usize) {
        self.utime.push(utimes);
        self.vrow.push(vrows);
        self.arow.push(arows);
    }

    pub fn len(&self) -> usize {
        self.utime.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utime.is_empty()
    }
}

/// Coalesce per-timestep row counts into groups of at most `max_vrow`
/// visibility rows, never splitting inside a timestep.
///
/// Only the visibility row total triggers a split. A single timestep larger
/// than `max_vrow` becomes its own oversized group rather than failing, and
/// no group is ever empty.
///
pub fn group_vrow_chunks(
    vrow_chunks: &[usize],
    arow_chunks: &[usize],
    max_vrow: usize,
) -> Result<ChunkGroups> {
    if vrow_chunks.len() != arow_chunks.len() {
        return Err(Error::InconsistentChunking(format!(
            "{} visibility row chunks and {} antenna row chunks do not agree",
            vrow_chunks.len(),
            arow_chunks.len()
        )));
    }

    let mut groups = ChunkGroups::default();
    let (mut utimes, mut vrows, mut arows) = (0, 0, 0);
    for (vrow, arow) in vrow_chunks.iter().zip(arow_chunks) {
        if utimes > 0 && vrows + vrow > max_vrow {
            groups.push(utimes, vrows, arows);
            utimes = 0;
            vrows = 0;
            arows = 0;
        }
        utimes += 1;
        vrows += vrow;
        arows += arow;
    }
    if utimes > 0 {
        groups.push(utimes, vrows, arows);
    }

    Ok(groups)
}
