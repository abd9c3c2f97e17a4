//! Paginated downloader for Gaia DR2 cluster photometry.
//!
//! Talks to the MAST invoke API: resolves a cluster name to a sky position,
//! probes the first cone-search page to learn the total page count, fetches
//! the remaining pages on a bounded worker pool with live progress logging,
//! then applies the quality cuts and column projection from the `clusters`
//! crate.

pub mod fetch;
pub mod mast;

pub use fetch::{
    download_cluster_data, fetch_filtered, DownloadError, FetchConfig, PagePolicy, PageSource,
    DEFAULT_WORKERS,
};
pub use mast::{ConePage, MastClient, Paging, QueryError, ResolveError, SkyPosition, PAGE_SIZE};
