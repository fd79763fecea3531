/// Which member of the baseline pair an array holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairMember {
    First,
    Second,
}

/// How to derive a missing array from the dimension table and, for the
/// time-related rules, from other arrays.
///
/// The set is closed. Rules that read other arrays declare them in
/// `prerequisites`, which the resolver derives first through the same entry
/// point, so a chain like time -> time_vrow_chunks materializes bottom up.
///
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultRule {
    /// Every element set to the given value, cast to the array's dtype.
    Fill(f64),

    /// A fixed one dimensional value, cast to the array's dtype.
    Literal(Vec<f64>),

    /// Identity-like pattern broadcast over the named correlation dimension:
    /// first and last elements one, the rest zero. The dimension size must be
    /// a power of two.
    BroadcastIdentity { dim: String },

    /// Zero everywhere except index `hot` along the named dimension.
    OneHot { dim: String, hot: usize },

    /// Inclusive linear range along the array's single dimension.
    LinearRange { lo: f64, hi: f64 },

    /// Upper-triangle antenna pair indices, tiled over timesteps.
    AntennaPairs { member: PairMember },

    /// Per-row timestamp: each unique time repeated for its row chunk.
    Time,

    /// Per-row index into the unique times.
    TimeIndex,

    /// Rows per timestep, requiring vrow to divide evenly over utime.
    TimeVrowChunks,

    /// Distinct antennas referenced per timestep.
    TimeArowChunks,
}

impl DefaultRule {
    /// Arrays this rule reads, which must be resolved before it runs.
    pub fn prerequisites(&self) -> &'static [&'static str] {
        match self {
            DefaultRule::Time => &["time_unique", "time_vrow_chunks"],
            DefaultRule::TimeIndex => &["time_vrow_chunks"],
            DefaultRule::TimeArowChunks => &["antenna1", "antenna2", "time_vrow_chunks"],
            _ => &[],
        }
    }
}

pub(crate) fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Upper-triangle index pairs for one timestep of baselines, in row-major
/// order. With `auto_correlations` the diagonal is included.
///
pub(crate) fn antenna_pairs(
    nr_of_antenna: usize,
    auto_correlations: bool,
) -> (Vec<i32>, Vec<i32>) {
    let k = if auto_correlations { 0 } else { 1 };
    let mut antenna1 = Vec::new();
    let mut antenna2 = Vec::new();
    for i in 0..nr_of_antenna {
        for j in (i + k)..nr_of_antenna {
            antenna1.push(i as i32);
            antenna2.push(j as i32);
        }
    }

    (antenna1, antenna2)
}
