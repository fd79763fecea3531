use indexmap::IndexMap;

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
};

/// Merge datasets into one, validating agreement on everything shared.
///
/// Every dimension name must have a single size across all inputs, and
/// shared coordinates must agree element-wise. Arrays, chunk runs and flags
/// union with later datasets winning.
///
pub fn merge_datasets(datasets: Vec<Dataset>) -> Result<Dataset> {
    if datasets.is_empty() {
        return Err(Error::Configuration(String::from(
            "cannot merge zero datasets",
        )));
    }

    let mut sizes: IndexMap<&String, Vec<usize>> = IndexMap::new();
    for ds in &datasets {
        for (dim, size) in &ds.dims {
            let seen = sizes.entry(dim).or_default();
            if !seen.contains(size) {
                seen.push(*size);
            }
        }
    }
    for (dim, seen) in sizes {
        if seen.len() > 1 {
            return Err(Error::DimensionConflict {
                dim: dim.clone(),
                sizes: seen,
            });
        }
    }

    let mut coords: IndexMap<&String, &Vec<i64>> = IndexMap::new();
    for ds in &datasets {
        for (dim, values) in &ds.coords {
            match coords.get(dim) {
                Some(first) => {
                    if *first != values {
                        return Err(Error::CoordinateConflict { dim: dim.clone() });
                    }
                }
                None => {
                    coords.insert(dim, values);
                }
            }
        }
    }

    let mut iter = datasets.into_iter();
    let mut merged = match iter.next() {
        Some(first) => first,
        None => unreachable!(),
    };
    for ds in iter {
        merged.dims.extend(ds.dims);
        merged.coords.extend(ds.coords);
        merged.chunks.extend(ds.chunks);
        merged.arrays.extend(ds.arrays);
        merged.auto_correlations = ds.auto_correlations;
        merged.registry = ds.registry;
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use ndarray::Array1;

    use crate::{dims::DimTable, dtype::ArrayData, schema::SchemaRegistry, testing};

    #[test]
    fn test_dimension_conflict_names_the_sizes() {
        let mut overrides = DimTable::new();
        overrides.insert(String::from("utime"), 5);
        overrides.insert(String::from("antenna"), 7);
        let seven = testing::dataset_with_dims(&overrides);

        overrides.insert(String::from("antenna"), 9);
        let nine = testing::dataset_with_dims(&overrides);

        match merge_datasets(vec![seven, nine]) {
            Err(Error::DimensionConflict { dim, sizes }) => {
                assert_eq!(dim, "antenna");
                assert_eq!(sizes, vec![7, 9]);
            }
            other => panic!("expected a dimension conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_coordinate_conflict() {
        let a = testing::small_dataset();
        let mut b = testing::small_dataset();
        let chan = b.coords["chan"].clone();
        b.coords
            .insert(String::from("chan"), chan.into_iter().rev().collect());

        match merge_datasets(vec![a, b]) {
            Err(Error::CoordinateConflict { dim }) => assert_eq!(dim, "chan"),
            other => panic!("expected a coordinate conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_coordinate_conflict_between_later_datasets() {
        // the first dataset never declares 'chan'; the disagreement is
        // between the second and third
        let mut dims = DimTable::new();
        dims.insert(String::from("utime"), 5);
        let no_chan = Dataset::new(dims, Arc::new(SchemaRegistry::input()), false);

        let b = testing::small_dataset();
        let mut c = testing::small_dataset();
        let chan = c.coords["chan"].clone();
        c.coords
            .insert(String::from("chan"), chan.into_iter().rev().collect());

        match merge_datasets(vec![no_chan, b, c]) {
            Err(Error::CoordinateConflict { dim }) => assert_eq!(dim, "chan"),
            other => panic!("expected a coordinate conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_later_arrays_win() {
        let mut a = testing::small_dataset();
        let mut b = testing::small_dataset();
        let chan = a.dims["chan"];

        let lo = ArrayData::from(Array1::from_vec(vec![1.0; chan]).into_dyn());
        let hi = ArrayData::from(Array1::from_vec(vec![2.0; chan]).into_dyn());
        a.set_array("frequency", vec![String::from("chan")], lo)
            .unwrap();
        b.set_array("frequency", vec![String::from("chan")], hi.clone())
            .unwrap();

        let merged = merge_datasets(vec![a, b]).unwrap();
        assert_eq!(merged.get_data("frequency").unwrap(), &hi);
    }

    #[test]
    fn test_disjoint_arrays_union() {
        let mut a = testing::small_dataset();
        let mut b = testing::small_dataset();
        let chan = a.dims["chan"];
        let utime = a.dims["utime"];

        a.set_array(
            "frequency",
            vec![String::from("chan")],
            ArrayData::from(Array1::from_vec(vec![1.0; chan]).into_dyn()),
        )
        .unwrap();
        b.set_array(
            "time_unique",
            vec![String::from("utime")],
            ArrayData::from(Array1::from_vec(vec![0.0; utime]).into_dyn()),
        )
        .unwrap();

        let merged = merge_datasets(vec![a, b]).unwrap();
        assert!(merged.arrays.contains_key("frequency"));
        assert!(merged.arrays.contains_key("time_unique"));
    }

    #[test]
    fn test_merge_nothing() {
        assert!(matches!(
            merge_datasets(vec![]),
            Err(Error::Configuration(_))
        ));
    }
}
