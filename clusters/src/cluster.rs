//! Known stellar clusters and their catalog parameters.
//!
//! The table values (distance modulus, log age, metallicity, reddening,
//! member count) come from the published cluster catalogs; the display color
//! is a plotting hint. Member-star rows are not part of the table: they are
//! loaded from a [`CacheStore`] on first access and memoized.

use std::fmt;
use std::sync::OnceLock;

use once_cell::sync::Lazy;

use crate::cache::{CacheError, CacheStore};
use crate::rows::StarRecord;

/// Cluster classification derived from the `open_cluster` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterType {
    Open,
    Globular,
    Unknown,
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClusterType::Open => "Open",
            ClusterType::Globular => "Globular",
            ClusterType::Unknown => "Unknown",
        };
        write!(f, "{label}")
    }
}

/// A known stellar cluster with fixed astrophysical parameters.
#[derive(Debug)]
pub struct Cluster {
    /// Catalog designation, e.g. "NGC 6475".
    pub name: String,
    /// Distance modulus (mag).
    pub distance_modulus: f64,
    /// log10 of the cluster age in years.
    pub log_age: f64,
    /// Metallicity [Fe/H]; NaN where unmeasured.
    pub metallicity: f64,
    /// Reddening E(B-V) (mag).
    pub color_excess: f64,
    /// Published member count.
    pub member_count: u32,
    /// Whether the cluster is open (vs. globular); `None` if unclassified.
    pub open_cluster: Option<bool>,
    /// RGB plotting color.
    pub display_color: u32,

    data: OnceLock<Vec<StarRecord>>,
}

impl Cluster {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        distance_modulus: f64,
        log_age: f64,
        metallicity: f64,
        color_excess: f64,
        member_count: u32,
        open_cluster: Option<bool>,
        display_color: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            distance_modulus,
            log_age,
            metallicity,
            color_excess,
            member_count,
            open_cluster,
            display_color,
            data: OnceLock::new(),
        }
    }

    /// Distance in parsecs, from the distance modulus.
    pub fn distance_pc(&self) -> f64 {
        10f64.powf((self.distance_modulus + 5.0) / 5.0)
    }

    /// Cluster classification.
    pub fn cluster_type(&self) -> ClusterType {
        match self.open_cluster {
            Some(true) => ClusterType::Open,
            Some(false) => ClusterType::Globular,
            None => ClusterType::Unknown,
        }
    }

    /// Member-star rows, loaded from the cache store on first access.
    ///
    /// The loaded rows are memoized for the lifetime of the cluster. If two
    /// threads race on the first access both may read the file; one result
    /// wins and the other is dropped.
    pub fn data(&self, store: &CacheStore) -> Result<&[StarRecord], CacheError> {
        if let Some(rows) = self.data.get() {
            return Ok(rows);
        }
        let rows = store.load(&self.name)?;
        Ok(self.data.get_or_init(|| rows))
    }

    /// Multi-line summary label for plots, each line prefixed with `indent`.
    pub fn info_label(&self, indent: &str) -> String {
        format!(
            "{indent}Cluster Type: {}\n{indent}log(age): {}\n{indent}Distance: {:.0} pc",
            self.cluster_type(),
            self.log_age,
            self.distance_pc()
        )
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

static KNOWN_CLUSTERS: Lazy<Vec<Cluster>> = Lazy::new(|| {
    vec![
        Cluster::new("IC 2391", 5.908, 7.70, -0.01, 0.030, 254, Some(true), 0x648FFF),
        Cluster::new("NGC 6475", 7.234, 8.54, 0.02, 0.049, 874, Some(true), 0x785EF0),
        Cluster::new("NGC 2360", 10.229, 8.98, -0.03, 0.090, 848, Some(true), 0xDC267F),
        Cluster::new("NGC 6793", 8.894, 8.78, f64::NAN, 0.272, 271, Some(true), 0xFE6100),
        Cluster::new("NGC 2232", 7.575, 7.70, 0.11, 0.031, 241, Some(true), 0xFFB000),
    ]
});

/// The fixed table of clusters this project works with.
pub fn known_clusters() -> &'static [Cluster] {
    &KNOWN_CLUSTERS
}
