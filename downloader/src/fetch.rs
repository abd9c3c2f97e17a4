//! Paginated fetch pipeline: first-page probe, bounded worker pool, progress
//! reporting, then quality filtering and projection.
//!
//! Page 1 is always fetched synchronously because its pagination metadata
//! carries the total page count. Pages 2..N are pulled from a shared queue
//! by a fixed pool of worker threads; the only shared mutable state is an
//! atomic completed-page counter, polled by a supervised reporter thread
//! that logs `fetched X/Y pages` once per interval. The reporter is stopped
//! with a cancellation channel and joined, never killed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use clusters::{select_members, SourceRow, StarRecord};

use crate::mast::{ConePage, MastClient, QueryError, ResolveError, SkyPosition};

/// Default maximum number of simultaneous in-flight page requests.
pub const DEFAULT_WORKERS: usize = 16;

/// What to do when a page fetch fails partway through a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePolicy {
    /// Fail the whole run on the first page error. Partial results are not
    /// reconciled, matching the all-or-nothing batch semantics.
    Abort,
    /// Log a warning per failed page and keep the rows from the rest.
    SkipFailed,
}

/// Tuning for a download run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Worker pool size; the effective pool never exceeds the page count.
    pub workers: usize,
    /// Failed-page handling.
    pub page_policy: PagePolicy,
    /// How often the reporter logs progress.
    pub progress_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            page_policy: PagePolicy::Abort,
            progress_interval: Duration::from_secs(1),
        }
    }
}

/// Pipeline failures.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("name resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("page {page} fetch failed: {source}")]
    Query {
        page: u32,
        #[source]
        source: QueryError,
    },
}

/// Source of cone-search pages. The seam between the fetch pipeline and the
/// wire client, so the pipeline can be exercised against in-memory fakes.
pub trait PageSource: Sync {
    fn fetch_page(
        &self,
        name: &str,
        position: SkyPosition,
        page: u32,
    ) -> Result<ConePage, QueryError>;
}

impl PageSource for MastClient {
    fn fetch_page(
        &self,
        name: &str,
        position: SkyPosition,
        page: u32,
    ) -> Result<ConePage, QueryError> {
        MastClient::fetch_page(self, name, position, page)
    }
}

/// Download, filter, and project the catalog rows for a named cluster.
///
/// Resolves the name, fetches every result page, applies the quality cuts,
/// and returns the projected records in fetch order.
pub fn download_cluster_data(
    client: &MastClient,
    name: &str,
    config: &FetchConfig,
) -> Result<Vec<StarRecord>, DownloadError> {
    log::info!("starting download for {name}");
    let position = client.resolve(name)?;
    fetch_filtered(client, name, position, config)
}

/// Run the paginated fetch for an already-resolved position, then filter
/// and project.
pub fn fetch_filtered(
    source: &impl PageSource,
    name: &str,
    position: SkyPosition,
    config: &FetchConfig,
) -> Result<Vec<StarRecord>, DownloadError> {
    let raw = fetch_all_pages(source, name, position, config)?;
    let members = select_members(&raw);
    log::info!(
        "kept {} of {} rows for {name} after quality cuts",
        members.len(),
        raw.len()
    );
    Ok(members)
}

fn fetch_all_pages(
    source: &impl PageSource,
    name: &str,
    position: SkyPosition,
    config: &FetchConfig,
) -> Result<Vec<SourceRow>, DownloadError> {
    log::info!(
        "first-page cone search for {name} at ra={} dec={} radius={}",
        position.ra,
        position.dec,
        position.radius
    );
    let first = source
        .fetch_page(name, position, 1)
        .map_err(|source| DownloadError::Query { page: 1, source })?;

    let total_pages = first.paging.pages_filtered;
    let mut rows = first.data;

    // A page count of 0 or 1 means page 1 already held everything.
    if total_pages <= 1 {
        log::info!("all pages fetched for {name} (single page)");
        return Ok(rows);
    }

    log::info!("fetching {} remaining pages for {name}", total_pages - 1);

    let completed = AtomicUsize::new(1);
    let abort = AtomicBool::new(false);

    let (page_tx, page_rx) = crossbeam_channel::unbounded::<u32>();
    for page in 2..=total_pages {
        page_tx.send(page).expect("page queue receiver alive");
    }
    drop(page_tx);

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
    let pool = pool_size(config.workers, total_pages as usize - 1);

    let mut failures: Vec<(u32, QueryError)> = Vec::new();

    thread::scope(|scope| {
        let reporter = scope.spawn(|| {
            report_progress(
                &completed,
                total_pages as usize,
                config.progress_interval,
                &stop_rx,
            );
        });

        let mut workers = Vec::with_capacity(pool);
        for _ in 0..pool {
            let page_rx = page_rx.clone();
            let completed = &completed;
            let abort = &abort;
            let policy = config.page_policy;
            workers.push(scope.spawn(move || {
                let mut rows = Vec::new();
                let mut failures = Vec::new();
                for page in page_rx.iter() {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    match source.fetch_page(name, position, page) {
                        Ok(result) => {
                            rows.extend(result.data);
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            failures.push((page, err));
                            if policy == PagePolicy::Abort {
                                abort.store(true, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                }
                (rows, failures)
            }));
        }

        for worker in workers {
            let (worker_rows, worker_failures) = worker.join().expect("page worker panicked");
            rows.extend(worker_rows);
            failures.extend(worker_failures);
        }

        // Dropping the sender wakes the reporter; join it for a clean stop.
        drop(stop_tx);
        reporter.join().expect("progress reporter panicked");
    });

    failures.sort_by_key(|(page, _)| *page);
    match config.page_policy {
        PagePolicy::Abort => {
            if let Some((page, source)) = failures.into_iter().next() {
                return Err(DownloadError::Query { page, source });
            }
        }
        PagePolicy::SkipFailed => {
            for (page, err) in failures {
                log::warn!("skipping page {page} for {name}: {err}");
            }
        }
    }

    log::info!("all pages fetched for {name}");
    Ok(rows)
}

/// Effective worker count: never more threads than pages, never zero.
fn pool_size(limit: usize, remaining_pages: usize) -> usize {
    limit.clamp(1, remaining_pages.max(1))
}

/// Poll the completed-page counter until every page is in, or until the
/// fetch phase drops the cancellation channel.
fn report_progress(
    completed: &AtomicUsize,
    total_pages: usize,
    interval: Duration,
    stop: &Receiver<()>,
) {
    loop {
        let done = completed.load(Ordering::Relaxed);
        log::info!("fetched {done}/{total_pages} pages");
        if done >= total_pages {
            break;
        }
        match stop.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mast::Paging;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn position() -> SkyPosition {
        SkyPosition {
            ra: 130.025,
            dec: -52.9,
            radius: 0.2,
        }
    }

    fn passing_row(source_id: i64) -> SourceRow {
        SourceRow {
            source_id: Some(source_id),
            phot_g_mean_flux: Some(1.0e4),
            phot_g_mean_mag: Some(13.0),
            bp_rp: Some(0.9),
            bp_g: Some(0.45),
            g_rp: Some(0.45),
            visibility_periods_used: Some(12),
            astrometric_excess_noise: Some(0.2),
            parallax_over_error: Some(30.0),
            phot_g_mean_flux_over_error: Some(200.0),
            phot_bp_mean_flux_over_error: Some(60.0),
            phot_rp_mean_flux_over_error: Some(60.0),
        }
    }

    fn failing_row(source_id: i64) -> SourceRow {
        let mut row = passing_row(source_id);
        row.parallax_over_error = Some(2.0);
        row
    }

    fn config() -> FetchConfig {
        FetchConfig {
            progress_interval: Duration::from_millis(5),
            ..FetchConfig::default()
        }
    }

    /// In-memory page source with per-page canned results and call tracking.
    struct FakeSource {
        total_pages: u32,
        pages: HashMap<u32, Vec<SourceRow>>,
        failing_pages: Vec<u32>,
        calls: Mutex<Vec<u32>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        fn new(total_pages: u32, pages: HashMap<u32, Vec<SourceRow>>) -> Self {
            Self {
                total_pages,
                pages,
                failing_pages: Vec::new(),
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn uniform(total_pages: u32, rows_per_page: &[SourceRow]) -> Self {
            let pages = (1..=total_pages)
                .map(|page| (page, rows_per_page.to_vec()))
                .collect();
            Self::new(total_pages, pages)
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageSource for FakeSource {
        fn fetch_page(
            &self,
            _name: &str,
            _position: SkyPosition,
            page: u32,
        ) -> Result<ConePage, QueryError> {
            self.calls.lock().unwrap().push(page);

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing_pages.contains(&page) {
                return Err(QueryError::Http(format!("boom on page {page}")));
            }
            Ok(ConePage {
                data: self.pages.get(&page).cloned().unwrap_or_default(),
                paging: Paging {
                    pages_filtered: self.total_pages,
                    page_size: 5000,
                },
            })
        }
    }

    #[test]
    fn single_page_run_spawns_no_workers() {
        let source = FakeSource::uniform(1, &[passing_row(1), failing_row(2)]);
        let members = fetch_filtered(&source, "IC 2391", position(), &config()).unwrap();

        assert_eq!(source.calls(), vec![1]);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].source_id, 1);
    }

    #[test]
    fn zero_pages_filtered_keeps_page_one_rows() {
        let mut source = FakeSource::uniform(1, &[passing_row(1)]);
        source.total_pages = 0;
        let members = fetch_filtered(&source, "IC 2391", position(), &config()).unwrap();

        assert_eq!(source.calls(), vec![1]);
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn five_pages_fetch_each_remaining_page_exactly_once() {
        let pages = (1..=5)
            .map(|page| (page, vec![passing_row(page as i64)]))
            .collect();
        let source = FakeSource::new(5, pages);
        let members = fetch_filtered(&source, "NGC 6475", position(), &config()).unwrap();

        let mut calls = source.calls();
        calls.sort_unstable();
        assert_eq!(calls, vec![1, 2, 3, 4, 5]);
        assert_eq!(members.len(), 5);

        let mut ids: Vec<i64> = members.iter().map(|m| m.source_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn one_bad_row_per_page_is_dropped() {
        // 3 pages x 2 rows, one parallax failure each: 6 raw -> 3 kept.
        let pages = (1..=3)
            .map(|page| {
                let base = page as i64 * 10;
                (page, vec![passing_row(base), failing_row(base + 1)])
            })
            .collect();
        let source = FakeSource::new(3, pages);
        let members = fetch_filtered(&source, "NGC 2360", position(), &config()).unwrap();

        assert_eq!(members.len(), 3);
        let mut ids: Vec<i64> = members.iter().map(|m| m.source_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn worker_pool_is_bounded() {
        let mut source = FakeSource::uniform(9, &[passing_row(1)]);
        source.delay = Duration::from_millis(20);
        let config = FetchConfig {
            workers: 2,
            ..config()
        };

        fetch_filtered(&source, "NGC 2232", position(), &config).unwrap();

        // Page 1 runs alone; afterwards at most 2 requests are in flight.
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(source.calls().len(), 9);
    }

    #[test]
    fn abort_policy_surfaces_the_page_error() {
        let mut source = FakeSource::uniform(4, &[passing_row(1)]);
        source.failing_pages = vec![3];

        match fetch_filtered(&source, "NGC 6793", position(), &config()) {
            Err(DownloadError::Query { page: 3, source }) => {
                assert!(matches!(source, QueryError::Http(_)));
            }
            other => panic!("expected page 3 query error, got {other:?}"),
        }
    }

    #[test]
    fn skip_failed_policy_keeps_remaining_pages() {
        let pages = (1..=4)
            .map(|page| (page, vec![passing_row(page as i64)]))
            .collect();
        let mut source = FakeSource::new(4, pages);
        source.failing_pages = vec![3];
        let config = FetchConfig {
            page_policy: PagePolicy::SkipFailed,
            ..config()
        };

        let members = fetch_filtered(&source, "NGC 6793", position(), &config).unwrap();
        let mut ids: Vec<i64> = members.iter().map(|m| m.source_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn resolve_failure_happens_before_any_page_fetch() {
        // An unreachable invoke URL makes resolution fail without touching
        // the cone-search path.
        let client = MastClient::with_url("http://127.0.0.1:1/invoke");
        match download_cluster_data(&client, "Nonexistent 1", &config()) {
            Err(DownloadError::Resolve(ResolveError::Http(_))) => {}
            other => panic!("expected resolve error, got {other:?}"),
        }
    }

    #[test]
    fn pool_size_clamps_to_page_count() {
        assert_eq!(pool_size(16, 4), 4);
        assert_eq!(pool_size(16, 100), 16);
        assert_eq!(pool_size(0, 4), 1);
        assert_eq!(pool_size(4, 0), 1);
    }

    #[test]
    fn parallel_counter_increments_are_not_lost() {
        let completed = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(completed.load(Ordering::Relaxed), 8000);
    }

    #[test]
    fn reporter_stops_once_all_pages_are_counted() {
        let completed = AtomicUsize::new(5);
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        // Returns immediately despite the live cancellation channel.
        report_progress(&completed, 5, Duration::from_secs(60), &stop_rx);
    }

    #[test]
    fn reporter_stops_on_cancellation() {
        let completed = AtomicUsize::new(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = thread::spawn(move || {
            report_progress(&completed, 10, Duration::from_millis(5), &stop_rx);
        });
        thread::sleep(Duration::from_millis(20));
        drop(stop_tx);
        handle.join().unwrap();
    }
}
