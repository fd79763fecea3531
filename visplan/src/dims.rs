use indexmap::IndexMap;

/// Ordered mapping of dimension name to global size.
///
/// Insertion order is kept so that reified schemas, merges and error messages
/// enumerate dimensions deterministically.
///
pub type DimTable = IndexMap<String, usize>;

/// Number of baselines for a given antenna count.
pub fn nr_of_baselines(nr_of_antenna: usize, auto_correlations: bool) -> usize {
    let pairs = nr_of_antenna * nr_of_antenna.saturating_sub(1) / 2;
    if auto_correlations {
        pairs + nr_of_antenna
    } else {
        pairs
    }
}

/// Build the standard dimension table, merging caller overrides over the
/// built-in sizes.
///
/// `vrow` (visibility rows, one per baseline per timestep) and `arow`
/// (antenna rows, one per antenna per timestep) are derived from the table
/// after overrides are applied, so overriding `antenna` or `utime` keeps the
/// table self-consistent. An explicit `vrow` or `arow` override wins over the
/// derivation.
///
pub fn default_dim_sizes(overrides: &DimTable, auto_correlations: bool) -> DimTable {
    let mut dims = DimTable::new();

    dims.insert(String::from("utime"), 100);
    dims.insert(String::from("chan"), 64);
    dims.insert(String::from("corr"), 4);
    dims.insert(String::from("pol"), 4);
    dims.insert(String::from("antenna"), 7);
    dims.insert(String::from("spw"), 1);

    dims.insert(String::from("point"), 1);
    dims.insert(String::from("gaussian"), 0);
    dims.insert(String::from("sersic"), 0);

    dims.insert(String::from("beam_lw"), 10);
    dims.insert(String::from("beam_mh"), 10);
    dims.insert(String::from("beam_nud"), 10);

    dims.insert(String::from("(I,Q,U,V)"), 4);
    dims.insert(String::from("(x,y,z)"), 3);
    dims.insert(String::from("(u,v,w)"), 3);
    dims.insert(String::from("(l,m)"), 2);
    dims.insert(String::from("(lproj,mproj,theta)"), 3);
    dims.insert(String::from("(s1,s2,theta)"), 3);
    dims.insert(String::from("(ll,lm,lf,ul,um,uf)"), 6);

    for (name, size) in overrides {
        dims.insert(name.clone(), *size);
    }

    let utime = dims["utime"];
    let antenna = dims["antenna"];
    if !overrides.contains_key("vrow") {
        let nbl = nr_of_baselines(antenna, auto_correlations);
        dims.insert(String::from("vrow"), utime * nbl);
    }
    if !overrides.contains_key("arow") {
        dims.insert(String::from("arow"), utime * antenna);
    }

    dims
}
