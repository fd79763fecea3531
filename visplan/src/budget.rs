use indexmap::IndexMap;

use crate::{
    chunking::group_vrow_chunks,
    dataset::Dataset,
    dims::DimTable,
    errors::{Error, Result},
    schema::SchemaRegistry,
};

/// Reduce dimension sizes batch by batch until every array in every registry
/// fits the memory budget.
///
/// Bytes required are the sum over all arrays of the product of their
/// dimension sizes times the element size, with no deduplication between
/// registries. Batches are pulled only while the requirement exceeds the
/// budget, so an already-fitting table applies nothing. The reductions
/// applied so far are returned even when the final batch still does not fit.
///
pub fn budget<I>(
    registries: &[&SchemaRegistry],
    dims: &DimTable,
    mem_budget: u64,
    reductions: I,
) -> Result<IndexMap<String, usize>>
where
    I: IntoIterator<Item = Vec<(String, usize)>>,
{
    let mut dims = dims.clone();
    let mut applied = IndexMap::new();
    let mut required = required_bytes(registries, &dims)?;

    for batch in reductions {
        if required <= mem_budget {
            break;
        }
        for (dim, size) in batch {
            dims.insert(dim.clone(), size);
            applied.insert(dim, size);
        }
        required = required_bytes(registries, &dims)?;
    }

    Ok(applied)
}

/// Bytes needed to hold every array of every registry at the given sizes.
///
pub fn required_bytes(registries: &[&SchemaRegistry], dims: &DimTable) -> Result<u64> {
    let mut total = 0u64;
    for registry in registries {
        for schema in registry.iter() {
            let mut elements = 1u64;
            for dim in &schema.dims {
                let size = *dims.get(dim).ok_or_else(|| {
                    Error::Configuration(format!(
                        "array '{}' references dimension '{}' which is not in the \
                         dimension table",
                        schema.name, dim
                    ))
                })?;
                elements *= size as u64;
            }
            total += elements * schema.dtype.item_size() as u64;
        }
    }

    Ok(total)
}

/// Unique integers in `[start, size)` with a log2 spacing, descending.
///
pub fn uniq_log2_range(start: usize, size: usize, div: usize) -> Vec<usize> {
    if start == 0 || size == 0 || div < 2 {
        return vec![];
    }
    let lo = (start as f64).log2();
    let hi = (size as f64).log2();
    let step = (hi - lo) / (div - 1) as f64;

    let mut values: Vec<usize> = (0..div - 1)
        .map(|i| 2f64.powf(lo + step * i as f64) as usize)
        .collect();
    values.sort_unstable();
    values.dedup();
    values.reverse();

    values
}

/// The standard reduction schedule: cap the source populations at 50, then
/// walk unique-time candidates down a log2 ladder, shrinking vrow and arow to
/// the rows actually covered by the candidate timesteps.
///
pub fn default_reductions(ds: &Dataset) -> Result<Vec<Vec<(String, usize)>>> {
    let source_dims = ["point", "gaussian", "sersic"];
    let mut batches = Vec::new();

    let sources = source_dims
        .iter()
        .map(|dim| ds.dims.get(*dim).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);
    if sources > 50 {
        batches.push(
            source_dims
                .iter()
                .map(|dim| (String::from(*dim), 50))
                .collect(),
        );
    }

    let utime = ds.dims.get("utime").copied().unwrap_or(0);
    let vrow_chunks = ds.usize_values("time_vrow_chunks")?;
    let arow_chunks = ds.usize_values("time_arow_chunks")?;
    for candidate in uniq_log2_range(1, utime, 50) {
        let vrows: usize = vrow_chunks.iter().take(candidate).sum();
        let arows: usize = arow_chunks.iter().take(candidate).sum();
        batches.push(vec![
            (String::from("utime"), candidate),
            (String::from("vrow"), vrows),
            (String::from("arow"), arows),
        ]);
    }

    Ok(batches)
}

/// Uniform chunk runs of `size` covering `total`, with a trailing remainder.
///
pub fn normalize_chunks(size: usize, total: usize) -> Vec<usize> {
    if total == 0 {
        return vec![];
    }
    if size == 0 || size >= total {
        return vec![total];
    }
    let mut runs = vec![size; total / size];
    if total % size > 0 {
        runs.push(total % size);
    }

    runs
}

/// Rechunk the dataset so one tile of work, inputs, scratch and outputs
/// included, fits the memory budget. Array values are untouched; only the
/// chunk table changes.
///
pub fn rechunk_to_budget(ds: Dataset, mem_budget: u64) -> Result<Dataset> {
    let reductions = default_reductions(&ds)?;

    rechunk_with_reductions(ds, mem_budget, reductions)
}

pub fn rechunk_with_reductions(
    mut ds: Dataset,
    mem_budget: u64,
    reductions: Vec<Vec<(String, usize)>>,
) -> Result<Dataset> {
    let scratch = SchemaRegistry::scratch();
    let output = SchemaRegistry::output();
    let registries = [ds.registry.as_ref(), &scratch, &output];
    let applied = budget(&registries, &ds.dims, mem_budget, reductions)?;

    let max_vrow = applied
        .get("vrow")
        .copied()
        .unwrap_or_else(|| ds.chunks_for("vrow").into_iter().max().unwrap_or(0));
    let vrow_chunks = ds.usize_values("time_vrow_chunks")?;
    let arow_chunks = ds.usize_values("time_arow_chunks")?;
    let groups = group_vrow_chunks(&vrow_chunks, &arow_chunks, max_vrow)?;

    for (dim, size) in &applied {
        if matches!(dim.as_str(), "utime" | "vrow" | "arow") {
            continue;
        }
        let total = ds.dims.get(dim).copied().unwrap_or(0);
        ds.set_chunks(dim, normalize_chunks(*size, total))?;
    }
    ds.set_chunks("utime", groups.utime)?;
    ds.set_chunks("vrow", groups.vrow)?;
    ds.set_chunks("arow", groups.arow)?;

    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        dataset::prepare_dataset,
        dtype::DType,
        schema::ArraySchema,
        testing,
    };

    fn one_array_registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas(vec![ArraySchema::new("x", &["n"], DType::F64, None)])
    }

    fn reductions() -> Vec<Vec<(String, usize)>> {
        vec![
            vec![(String::from("n"), 500)],
            vec![(String::from("n"), 100)],
            vec![(String::from("n"), 10)],
        ]
    }

    #[test]
    fn test_budget_stops_once_it_fits() {
        let registry = one_array_registry();
        let mut dims = DimTable::new();
        dims.insert(String::from("n"), 1000);

        let applied = budget(&[&registry], &dims, 900, reductions()).unwrap();
        assert_eq!(applied.get("n"), Some(&100));
        // the input table is untouched
        assert_eq!(dims["n"], 1000);
    }

    #[test]
    fn test_budget_fixpoint() {
        let registry = one_array_registry();
        let mut dims = DimTable::new();
        dims.insert(String::from("n"), 1000);

        // an already-fitting table applies nothing
        let applied = budget(&[&registry], &dims, 1 << 20, reductions()).unwrap();
        assert!(applied.is_empty());

        // re-running the planner on its own reduced output applies nothing
        let applied = budget(&[&registry], &dims, 900, reductions()).unwrap();
        assert!(!applied.is_empty());
        for (dim, size) in applied {
            dims.insert(dim, size);
        }
        let again = budget(&[&registry], &dims, 900, reductions()).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_budget_returns_best_effort() {
        let registry = one_array_registry();
        let mut dims = DimTable::new();
        dims.insert(String::from("n"), 1000);

        let applied = budget(&[&registry], &dims, 1, reductions()).unwrap();
        assert_eq!(applied.get("n"), Some(&10));
    }

    #[test]
    fn test_budget_missing_dim() {
        let registry = one_array_registry();
        let dims = DimTable::new();
        assert!(matches!(
            budget(&[&registry], &dims, 1, reductions()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_required_bytes_sums_registries() {
        let registry = one_array_registry();
        let mut dims = DimTable::new();
        dims.insert(String::from("n"), 100);

        assert_eq!(required_bytes(&[&registry], &dims).unwrap(), 800);
        assert_eq!(required_bytes(&[&registry, &registry], &dims).unwrap(), 1600);
    }

    #[test]
    fn test_uniq_log2_range() {
        let values = uniq_log2_range(1, 100, 50);
        assert_eq!(*values.last().unwrap(), 1);
        assert!(values.iter().all(|&v| v < 100));
        assert!(values.windows(2).all(|pair| pair[0] > pair[1]));

        assert_eq!(uniq_log2_range(1, 5, 50), vec![4, 3, 2, 1]);
        assert_eq!(uniq_log2_range(1, 1, 50), vec![1]);
    }

    #[test]
    fn test_normalize_chunks() {
        assert_eq!(normalize_chunks(30, 100), vec![30, 30, 30, 10]);
        assert_eq!(normalize_chunks(100, 100), vec![100]);
        assert_eq!(normalize_chunks(200, 100), vec![100]);
        assert_eq!(normalize_chunks(10, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_default_reductions() {
        let ds = prepare_dataset(testing::small_default_dataset()).unwrap();
        let batches = default_reductions(&ds).unwrap();

        // no source population exceeds 50, so the ladder is all utime batches
        assert_eq!(
            batches[0],
            vec![
                (String::from("utime"), 4),
                (String::from("vrow"), 24),
                (String::from("arow"), 16),
            ]
        );
        assert_eq!(batches.len(), 4);
    }

    #[test]
    fn test_rechunk_keeps_chunk_tables_aligned() {
        let ds = prepare_dataset(testing::small_default_dataset()).unwrap();
        let ds = rechunk_to_budget(ds, 1024).unwrap();

        let utime = ds.chunks_for("utime");
        let vrow = ds.chunks_for("vrow");
        let arow = ds.chunks_for("arow");
        assert_eq!(utime.len(), vrow.len());
        assert_eq!(utime.len(), arow.len());
        assert_eq!(utime.iter().sum::<usize>(), ds.dims["utime"]);
        assert_eq!(vrow.iter().sum::<usize>(), ds.dims["vrow"]);
        assert_eq!(arow.iter().sum::<usize>(), ds.dims["arow"]);
    }

    #[test]
    fn test_rechunk_under_a_roomy_budget_changes_nothing() {
        let ds = prepare_dataset(testing::small_default_dataset()).unwrap();
        let before = ds.chunks.clone();
        let ds = rechunk_to_budget(ds, u64::MAX).unwrap();
        assert_eq!(ds.chunks, before);
    }
}
