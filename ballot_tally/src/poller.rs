//! Periodic snapshot fetching.
//!
//! The poller fetches a snapshot as soon as it starts, then once per interval
//! until it is cancelled. At most one fetch is outstanding at any time: ticks
//! that come due while a fetch is running are dropped, and a manual refresh
//! requested during a fetch waits for that fetch instead of starting another.
//!
//! Snapshots are delivered in fetch order through a [`SnapshotFeed`]. Once the
//! poller is cancelled the feed yields nothing more, including responses that
//! were already in flight.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use crate::backend::BallotBackend;
use crate::config::*;

/// Snapshots waiting to be consumed before the poller stops fetching.
const FEED_CAPACITY: usize = 8;

type RefreshWaiter = oneshot::Sender<Result<(), PollError>>;

/// Controls a running poller. Cloning gives another handle to the same poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
    refresh_tx: mpsc::UnboundedSender<RefreshWaiter>,
}

impl PollerHandle {
    /// Stops the poller. Safe to call at any time and from anywhere, including
    /// from inside a fetch.
    pub fn cancel(&self) {
        if !self.cancel_tx.send_replace(true) {
            info!("cancel: poller cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Fetches a snapshot without waiting for the next tick.
    ///
    /// If a fetch is already outstanding, no new fetch is started and this
    /// resolves when the outstanding one completes.
    pub async fn refresh_now(&self) -> Result<(), PollError> {
        if self.is_cancelled() {
            return Err(PollError::Cancelled {});
        }
        let (tx, rx) = oneshot::channel();
        if self.refresh_tx.send(tx).is_err() {
            return Err(PollError::Cancelled {});
        }
        rx.await.unwrap_or(Err(PollError::Cancelled {}))
    }
}

/// The snapshots produced by a poller.
#[derive(Debug)]
pub struct SnapshotFeed {
    rx: mpsc::Receiver<TallySnapshot>,
    cancelled: watch::Receiver<bool>,
}

impl SnapshotFeed {
    /// The next snapshot, or `None` once the poller is cancelled.
    pub async fn next(&mut self) -> Option<TallySnapshot> {
        if *self.cancelled.borrow() {
            return None;
        }
        let snapshot = self.rx.recv().await?;
        if *self.cancelled.borrow() {
            debug!("next: discarding snapshot received after cancellation");
            return None;
        }
        Some(snapshot)
    }
}

/// Starts polling `backend` with the given settings.
///
/// Must be called from within a tokio runtime. The poller runs until
/// [`PollerHandle::cancel`] is called or every handle is dropped.
pub fn start<B>(settings: &PollSettings, backend: Arc<B>) -> (PollerHandle, SnapshotFeed)
where
    B: BallotBackend + ?Sized + 'static,
{
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = mpsc::channel(FEED_CAPACITY);

    info!(
        "start: polling every {:?} with query {:?}",
        settings.interval, settings.query
    );
    let loop_cancel_rx = cancel_rx.clone();
    let mut settings = *settings;
    if settings.interval.is_zero() {
        warn!(
            "start: zero polling interval, using {:?}",
            PollSettings::DEFAULT_SETTINGS.interval
        );
        settings.interval = PollSettings::DEFAULT_SETTINGS.interval;
    }
    tokio::spawn(async move {
        run_poll_loop(
            backend,
            settings,
            snapshot_tx,
            loop_cancel_rx,
            refresh_rx,
        )
        .await;
        debug!("run_poll_loop: exited");
    });

    (
        PollerHandle {
            cancel_tx: Arc::new(cancel_tx),
            refresh_tx,
        },
        SnapshotFeed {
            rx: snapshot_rx,
            cancelled: cancel_rx,
        },
    )
}

/// Stops the poller behind `handle`.
pub fn cancel(handle: &PollerHandle) {
    handle.cancel()
}

// All the waiters are answered with the same outcome.
fn notify(waiters: &mut Vec<RefreshWaiter>, outcome: Result<(), PollError>) {
    for waiter in waiters.drain(..) {
        let _ = waiter.send(outcome.clone());
    }
}

async fn run_poll_loop<B>(
    backend: Arc<B>,
    settings: PollSettings,
    snapshot_tx: mpsc::Sender<TallySnapshot>,
    mut cancel_rx: watch::Receiver<bool>,
    mut refresh_rx: mpsc::UnboundedReceiver<RefreshWaiter>,
) where
    B: BallotBackend + ?Sized,
{
    let mut waiters: Vec<RefreshWaiter> = Vec::new();
    let mut next_tick = Instant::now();

    loop {
        if *cancel_rx.borrow() {
            break;
        }
        tokio::select! {
            biased;
            // An error means every handle is gone: nobody can cancel anymore.
            _ = cancel_rx.changed() => break,
            _ = sleep_until(next_tick) => {
                debug!("run_poll_loop: tick");
            }
            Some(waiter) = refresh_rx.recv() => {
                debug!("run_poll_loop: manual refresh");
                waiters.push(waiter);
            }
        }

        let fetch = backend.fetch_snapshot(&settings.query);
        tokio::pin!(fetch);
        let res = loop {
            tokio::select! {
                biased;
                _ = cancel_rx.changed() => {
                    debug!("run_poll_loop: cancelled during fetch, dropping the response");
                    notify(&mut waiters, Err(PollError::Cancelled {}));
                    return;
                }
                res = &mut fetch => break res,
                Some(waiter) = refresh_rx.recv() => {
                    debug!("run_poll_loop: refresh joins the outstanding fetch");
                    waiters.push(waiter);
                }
            }
        };

        // Ticks that came due during the fetch are dropped, not queued.
        let now = Instant::now();
        while next_tick <= now {
            next_tick += settings.interval;
        }

        if *cancel_rx.borrow() {
            break;
        }
        let outcome = match res {
            Ok(snapshot) => {
                debug!(
                    "run_poll_loop: snapshot as of {} with total {}",
                    snapshot.as_of(),
                    snapshot.total()
                );
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    sent = snapshot_tx.send(snapshot) => {
                        if sent.is_err() {
                            info!("run_poll_loop: feed dropped, stopping");
                            break;
                        }
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!("run_poll_loop: fetch failed, keeping the last tally: {}", e);
                Err(PollError::FetchFailed { source: e })
            }
        };
        notify(&mut waiters, outcome);
    }
    notify(&mut waiters, Err(PollError::Cancelled {}));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::builder::SnapshotBuilder;

    fn settings(ms: u64) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(ms),
            ..PollSettings::DEFAULT_SETTINGS
        }
    }

    fn totals(n: &[u64]) -> Vec<Result<TallySnapshot, BackendError>> {
        n.iter()
            .map(|t| Ok(SnapshotBuilder::new().count("a", *t).build()))
            .collect()
    }

    #[test]
    fn default_interval_is_ten_seconds() {
        assert_eq!(PollSettings::default().interval, Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_every_interval() {
        let backend = Arc::new(FakeBackend::with_snapshots(totals(&[1, 2, 3])));
        let t0 = Instant::now();
        let (handle, mut feed) = start(&settings(10_000), backend.clone());

        assert_eq!(feed.next().await.unwrap().total(), VoteCount(1));
        assert!(Instant::now() - t0 < Duration::from_millis(10_000));
        assert_eq!(feed.next().await.unwrap().total(), VoteCount(2));
        assert_eq!(feed.next().await.unwrap().total(), VoteCount(3));

        let starts = backend.fetch_starts.lock().unwrap().clone();
        assert_eq!(starts[1] - starts[0], Duration::from_millis(10_000));
        assert_eq!(starts[2] - starts[1], Duration::from_millis(10_000));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_uses_the_default() {
        let backend = Arc::new(FakeBackend::with_snapshots(totals(&[1, 2])));
        let (handle, mut feed) = start(&settings(0), backend.clone());
        feed.next().await.unwrap();
        feed.next().await.unwrap();
        handle.cancel();

        let starts = backend.fetch_starts.lock().unwrap().clone();
        assert_eq!(starts[1] - starts[0], PollSettings::DEFAULT_SETTINGS.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_skips_ticks() {
        let backend = Arc::new(FakeBackend {
            fetch_delay: Duration::from_millis(15_000),
            ..FakeBackend::with_snapshots(totals(&[1, 2]))
        });
        let t0 = Instant::now();
        let (handle, mut feed) = start(&settings(10_000), backend.clone());

        feed.next().await.unwrap();
        feed.next().await.unwrap();
        handle.cancel();

        let starts = backend.fetch_starts.lock().unwrap().clone();
        // The tick at 10s came due during the first fetch and was dropped.
        assert_eq!(starts[0] - t0, Duration::ZERO);
        assert_eq!(starts[1] - t0, Duration::from_millis(20_000));
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_feed() {
        let backend = Arc::new(FakeBackend::with_snapshots(totals(&[1, 2])));
        let (handle, mut feed) = start(&settings(1_000), backend.clone());
        feed.next().await.unwrap();
        cancel(&handle);
        assert!(handle.is_cancelled());
        assert_eq!(feed.next().await, None);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn response_in_flight_at_cancel_is_dropped() {
        let backend = Arc::new(FakeBackend {
            fetch_delay: Duration::from_millis(3_000),
            ..FakeBackend::with_snapshots(totals(&[7]))
        });
        let (handle, mut feed) = start(&settings(10_000), backend.clone());
        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            canceller.cancel();
        });
        assert_eq!(feed.next().await, None);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_inside_a_fetch() {
        let backend = Arc::new(FakeBackend::with_snapshots(totals(&[1])));
        let (handle, mut feed) = start(&settings(10_000), backend.clone());
        // The poller task only runs once the test yields, so the hook is in place.
        *backend.cancel_on_fetch.lock().unwrap() = Some(handle.clone());
        assert_eq!(feed.next().await, None);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_skips_the_wait() {
        let backend = Arc::new(FakeBackend::with_snapshots(totals(&[1, 2])));
        let t0 = Instant::now();
        let (handle, mut feed) = start(&settings(10_000), backend.clone());
        feed.next().await.unwrap();

        handle.refresh_now().await.unwrap();
        assert_eq!(feed.next().await.unwrap().total(), VoteCount(2));
        assert_eq!(backend.fetch_count(), 2);
        assert!(Instant::now() - t0 < Duration::from_millis(10_000));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_during_fetch_joins_it() {
        let backend = Arc::new(FakeBackend {
            fetch_delay: Duration::from_millis(2_000),
            ..FakeBackend::with_snapshots(totals(&[1, 2]))
        });
        let (handle, mut feed) = start(&settings(10_000), backend.clone());
        // Let the first fetch start.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 1);

        handle.refresh_now().await.unwrap();
        assert_eq!(backend.fetch_count(), 1);
        assert_eq!(feed.next().await.unwrap().total(), VoteCount(1));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_polling() {
        let backend = Arc::new(FakeBackend::with_snapshots(vec![
            Err(BackendError::Transport {
                message: "connection refused".to_string(),
            }),
            Ok(SnapshotBuilder::new().count("a", 4).build()),
        ]));
        let t0 = Instant::now();
        let (handle, mut feed) = start(&settings(10_000), backend.clone());

        assert_eq!(feed.next().await.unwrap().total(), VoteCount(4));
        assert_eq!(Instant::now() - t0, Duration::from_millis(10_000));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_reports_fetch_failure() {
        let backend = Arc::new(FakeBackend::with_snapshots(vec![
            Ok(SnapshotBuilder::new().count("a", 1).build()),
            Err(BackendError::Unauthorized {}),
        ]));
        let (handle, mut feed) = start(&settings(10_000), backend.clone());
        feed.next().await.unwrap();
        assert_eq!(
            handle.refresh_now().await,
            Err(PollError::FetchFailed {
                source: BackendError::Unauthorized {}
            })
        );
        handle.cancel();
        assert_eq!(handle.refresh_now().await, Err(PollError::Cancelled {}));
    }
}
