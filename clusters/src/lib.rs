//! Stellar cluster data model.
//!
//! Provides the typed Gaia DR2 catalog row ([`SourceRow`]), the quality cuts
//! and column projection that turn raw cone-search rows into [`StarRecord`]s,
//! the static table of known clusters ([`known_clusters`]), and a simple
//! on-disk JSON cache for filtered rows ([`CacheStore`]).

pub mod cache;
pub mod cluster;
pub mod rows;

pub use cache::{CacheError, CacheStore};
pub use cluster::{known_clusters, Cluster, ClusterType};
pub use rows::{select_members, SourceRow, StarRecord};
