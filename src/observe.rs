//! A minimal publish-subscribe primitive for query results.
//!
//! A `Live<T>` is fed by a background task that runs a query once immediately and then again every
//! time the store reports a write to one of the tables the query reads. Each emission is a complete
//! snapshot or the failure of the query that should have produced it. Snapshots are never partial,
//! but a burst of writes may be coalesced into one emission.

use crate::error::{Error, ErrorType, Res};
use crate::store::{Changes, Scope};
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, trace};

/// What the producing task has published so far.
#[derive(Debug)]
struct Published<T> {
    /// The last successful result. Kept when a later refresh fails.
    snapshot: Option<T>,
    /// Set when the most recent refresh failed.
    failure: Option<Arc<anyhow::Error>>,
}

impl<T> Default for Published<T> {
    fn default() -> Self {
        Self {
            snapshot: None,
            failure: None,
        }
    }
}

/// A continuously updated query result.
///
/// The producing task stops when every clone of the `Live` has been dropped or when the store that
/// feeds it goes away.
#[derive(Debug)]
pub struct Live<T> {
    rx: watch::Receiver<Published<T>>,
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> Live<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawns the task that keeps this `Live` up-to-date. Must be called within a tokio runtime.
    pub(crate) fn spawn<F, Fut>(
        name: &'static str,
        mut changes: watch::Receiver<Changes>,
        scope: Scope,
        query: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Res<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(Published::default());
        tokio::spawn(async move {
            loop {
                let seen = *changes.borrow_and_update();
                match query().await {
                    Ok(snapshot) => tx.send_modify(|published| {
                        published.snapshot = Some(snapshot);
                        published.failure = None;
                    }),
                    Err(e) => {
                        error!("Unable to refresh {name}: {e:#}");
                        let failure = Arc::new(e.context(format!("Unable to refresh {name}")));
                        tx.send_modify(|published| published.failure = Some(failure));
                    }
                }
                if tx.is_closed() {
                    trace!("No subscribers remain for {name}");
                    return;
                }

                loop {
                    tokio::select! {
                        _ = tx.closed() => {
                            trace!("No subscribers remain for {name}");
                            return;
                        }
                        changed = changes.changed() => {
                            if changed.is_err() {
                                trace!("The store behind {name} has closed");
                                return;
                            }
                            if scope.touched(&seen, &changes.borrow_and_update()) {
                                break;
                            }
                        }
                    }
                }
            }
        });
        Self { rx }
    }

    /// Waits for the next result that this subscriber has not yet seen. The first call returns the
    /// initial result. A failed refresh is returned as a `Database` error. Returns `None` once the
    /// producing task has stopped.
    pub async fn next(&mut self) -> Option<Result<T>> {
        loop {
            self.rx.changed().await.ok()?;
            let published = self.rx.borrow_and_update();
            if let Some(failure) = published.failure.as_ref() {
                return Some(Err(Error::new(
                    ErrorType::Database,
                    anyhow::anyhow!("{failure:#}"),
                )));
            }
            if let Some(snapshot) = published.snapshot.as_ref() {
                return Some(Ok(snapshot.clone()));
            }
        }
    }

    /// The most recent successful snapshot, if the query has succeeded at least once.
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Table;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn counting_live(
        changes: watch::Receiver<Changes>,
        scope: Scope,
    ) -> (Arc<AtomicU64>, Live<u64>) {
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();
        let live = Live::spawn("counter", changes, scope, move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        });
        (runs, live)
    }

    async fn next_ok(live: &mut Live<u64>) -> u64 {
        timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_emits_initial_snapshot() {
        let (_tx, changes) = watch::channel(Changes::default());
        let (_runs, mut live) = counting_live(changes, Scope::ALL);
        assert_eq!(next_ok(&mut live).await, 1);
        assert_eq!(live.latest(), Some(1));
    }

    #[tokio::test]
    async fn test_re_emits_on_change_in_scope() {
        let (tx, changes) = watch::channel(Changes::default());
        let (_runs, mut live) = counting_live(changes, Scope::EXPENSES);
        assert_eq!(next_ok(&mut live).await, 1);

        tx.send_modify(|c| c.bump(Table::Expenses));
        assert_eq!(next_ok(&mut live).await, 2);
    }

    #[tokio::test]
    async fn test_ignores_change_out_of_scope() {
        let (tx, changes) = watch::channel(Changes::default());
        let (runs, mut live) = counting_live(changes, Scope::EXPENSES);
        assert_eq!(next_ok(&mut live).await, 1);

        tx.send_modify(|c| c.bump(Table::Categories));
        assert!(timeout(Duration::from_millis(200), live.next())
            .await
            .is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_when_store_closes() {
        let (tx, changes) = watch::channel(Changes::default());
        let (_runs, mut live) = counting_live(changes, Scope::ALL);
        assert_eq!(next_ok(&mut live).await, 1);

        drop(tx);
        assert!(timeout(WAIT, live.next()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initial_failure_is_returned() {
        let (_tx, changes) = watch::channel(Changes::default());
        let mut live: Live<u64> = Live::spawn("broken", changes, Scope::ALL, || async {
            anyhow::bail!("malformed row")
        });

        let err = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap_err();
        assert!(err.is_database());
        assert!(err.to_string().contains("malformed row"));
        assert_eq!(live.latest(), None);
    }

    #[tokio::test]
    async fn test_keeps_last_snapshot_after_failure() {
        let (tx, changes) = watch::channel(Changes::default());
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();
        let mut live = Live::spawn("flaky", changes, Scope::ALL, move || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    1 => anyhow::bail!("disk I/O error"),
                    n => Ok(n),
                }
            }
        });
        assert_eq!(next_ok(&mut live).await, 0);

        tx.send_modify(|c| c.bump(Table::Categories));
        let err = timeout(WAIT, live.next()).await.unwrap().unwrap().unwrap_err();
        assert!(err.to_string().contains("disk I/O error"));
        assert_eq!(live.latest(), Some(0));

        tx.send_modify(|c| c.bump(Table::Categories));
        assert_eq!(next_ok(&mut live).await, 2);
    }
}
