use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::live::{ChangeEvent, Query};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum LiveState<T> {
    /// A read is in flight and no result for the latest trigger exists yet.
    Unresolved,
    Resolved(T),
    Failed(String),
    /// Terminal. Nothing is published afterwards.
    Disposed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot<T> {
    /// Trigger that produced this state. Published resolutions never go backwards.
    pub generation: u64,
    pub state: LiveState<T>,
}

impl<T> LiveSnapshot<T> {
    pub fn is_settled(&self) -> bool {
        matches!(self.state, LiveState::Resolved(_) | LiveState::Failed(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, LiveState::Disposed)
    }
}

/// Handle to a standing query. Dropping it stops the driver.
pub struct LiveQuery<Q: Query> {
    key: watch::Sender<Q::Key>,
    state: watch::Receiver<LiveSnapshot<Q::Output>>,
    seen: u64,
    shutdown: Option<oneshot::Sender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl<Q: Query> LiveQuery<Q> {
    /// Starts evaluating `query` for `key` and keeps it current until disposed.
    pub fn spawn(store: Store, query: Q, key: Q::Key) -> Self {
        // subscribe before the first read so no commit slips between them
        let changes = store.subscribe_changes();
        let (key_tx, key_rx) = watch::channel(key);
        let (state_tx, state_rx) = watch::channel(LiveSnapshot {
            generation: 0,
            state: LiveState::Unresolved,
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            store,
            query: Arc::new(query),
            key: key_rx,
            changes,
            state: state_tx,
            latest: 0,
            reads: JoinSet::new(),
        };

        Self {
            key: key_tx,
            state: state_rx,
            seen: 0,
            shutdown: Some(shutdown_tx),
            driver: Some(tokio::spawn(driver.run(shutdown_rx))),
        }
    }

    pub fn key(&self) -> Q::Key {
        self.key.borrow().clone()
    }

    /// Replaces the dependency key. Returns false, without re-running, when it is unchanged.
    pub fn set_key(&self, key: Q::Key) -> bool {
        self.key.send_if_modified(|current| {
            if *current == key {
                false
            } else {
                *current = key;
                true
            }
        })
    }

    pub fn snapshot(&self) -> LiveSnapshot<Q::Output> {
        self.state.borrow().clone()
    }

    /// Latest resolved value, if the newest trigger has resolved.
    pub fn current(&self) -> Option<Q::Output> {
        match &self.state.borrow().state {
            LiveState::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Waits for the next published state of any kind.
    pub async fn changed(&mut self) -> Option<LiveSnapshot<Q::Output>> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Waits for a result newer than the last one returned here.
    ///
    /// Returns `None` once the subscription is disposed.
    pub async fn next_value(&mut self) -> Option<Result<Q::Output, String>> {
        let seen = self.seen;
        let snapshot = self
            .state
            .wait_for(|s| s.is_disposed() || (s.is_settled() && s.generation > seen))
            .await
            .ok()?
            .clone();

        self.seen = snapshot.generation;
        match snapshot.state {
            LiveState::Resolved(value) => Some(Ok(value)),
            LiveState::Failed(message) => Some(Err(message)),
            LiveState::Unresolved | LiveState::Disposed => None,
        }
    }

    /// Stops the driver, cancels in-flight reads and waits for it to exit.
    pub async fn dispose(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                warn!("live query driver ended abnormally: {}", e);
            }
        }
    }
}

impl<Q: Query> Drop for LiveQuery<Q> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

struct Driver<Q: Query> {
    store: Store,
    query: Arc<Q>,
    key: watch::Receiver<Q::Key>,
    changes: broadcast::Receiver<ChangeEvent>,
    state: watch::Sender<LiveSnapshot<Q::Output>>,
    latest: u64,
    reads: JoinSet<(u64, Result<Q::Output, AppError>)>,
}

impl<Q: Query> Driver<Q> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        debug!("{}: subscribed", self.query.name());
        self.trigger();

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                changed = self.key.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.trigger();
                }

                event = self.changes.recv() => match event {
                    Ok(event) => {
                        let affected = self.query.is_affected_by(&event, &*self.key.borrow());
                        if affected {
                            self.trigger();
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("{}: missed {} change(s), re-reading", self.query.name(), skipped);
                        self.trigger();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                Some(joined) = self.reads.join_next(), if !self.reads.is_empty() => match joined {
                    Ok((generation, result)) => self.publish(generation, result),
                    Err(e) => warn!("{}: read did not complete: {}", self.query.name(), e),
                },
            }
        }

        self.reads.abort_all();
        self.state.send_replace(LiveSnapshot {
            generation: self.latest,
            state: LiveState::Disposed,
        });
        debug!("{}: disposed", self.query.name());
    }

    fn trigger(&mut self) {
        self.latest += 1;
        let generation = self.latest;
        let key = self.key.borrow_and_update().clone();
        let store = self.store.clone();
        let query = Arc::clone(&self.query);

        self.reads.spawn(async move {
            let result = query.run(&store, &key).await;
            (generation, result)
        });

        self.state.send_replace(LiveSnapshot {
            generation,
            state: LiveState::Unresolved,
        });
    }

    fn publish(&mut self, generation: u64, result: Result<Q::Output, AppError>) {
        if generation != self.latest {
            debug!(
                "{}: discarding superseded read {} (latest {})",
                self.query.name(),
                generation,
                self.latest
            );
            return;
        }

        let state = match result {
            Ok(value) => LiveState::Resolved(value),
            Err(e) => {
                warn!("{}: read failed: {}", self.query.name(), e);
                LiveState::Failed(e.to_string())
            }
        };
        self.state.send_replace(LiveSnapshot { generation, state });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::live::{AllLists, TasksForList};

    const WAIT: Duration = Duration::from_secs(5);

    /// Echoes its key back. Older (smaller) keys take longer to answer.
    struct SlowEcho;

    #[async_trait::async_trait]
    impl Query for SlowEcho {
        type Key = u64;
        type Output = u64;

        fn name(&self) -> &'static str {
            "slow_echo"
        }

        fn is_affected_by(&self, _event: &ChangeEvent, _key: &u64) -> bool {
            false
        }

        async fn run(&self, _store: &Store, key: &u64) -> Result<u64, AppError> {
            let delay = 300u64.saturating_sub(key * 100);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(*key)
        }
    }

    #[tokio::test]
    async fn late_reads_for_old_keys_are_discarded() {
        let store = Store::in_memory().await.unwrap();
        let mut echo = LiveQuery::spawn(store, SlowEcho, 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(echo.set_key(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(echo.set_key(2));

        let first = timeout(WAIT, echo.next_value()).await.unwrap().unwrap().unwrap();
        assert_eq!(first, 2);
        assert_eq!(echo.current(), Some(2));
        let resolved = echo.snapshot();

        // let the slower reads for keys 0 and 1 finish
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(echo.snapshot(), resolved);
        assert_eq!(echo.current(), Some(2));
        assert!(timeout(Duration::from_millis(50), echo.next_value()).await.is_err());

        echo.dispose().await;
    }

    #[tokio::test]
    async fn starts_unresolved_then_resolves() {
        let store = Store::in_memory().await.unwrap();
        let mut lists = LiveQuery::spawn(store, AllLists, ());

        let value = timeout(WAIT, lists.next_value()).await.unwrap().unwrap().unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(lists.snapshot().generation, 1);
        assert_eq!(lists.current(), Some(value));
    }

    #[tokio::test]
    async fn returned_generations_only_increase() {
        let store = Store::in_memory().await.unwrap();
        let mut lists = LiveQuery::spawn(store.clone(), AllLists, ());

        let mut seen = Vec::new();
        for name in ["a", "b", "c"] {
            timeout(WAIT, lists.next_value()).await.unwrap().unwrap().unwrap();
            seen.push(lists.seen);
            store.create_list(name).await.unwrap();
        }
        let last = timeout(WAIT, async {
            loop {
                let value = lists.next_value().await.unwrap().unwrap();
                seen.push(lists.seen);
                if value.len() == 4 {
                    break value;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(last.len(), 4);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn set_key_with_same_value_does_not_rerun() {
        let store = Store::in_memory().await.unwrap();
        let tasks = LiveQuery::spawn(store, TasksForList, Some(1));

        assert!(!tasks.set_key(Some(1)));
        assert!(tasks.set_key(None));
        assert_eq!(tasks.key(), None);
    }

    #[tokio::test]
    async fn unrelated_changes_do_not_trigger_reads() {
        let store = Store::in_memory().await.unwrap();
        let work = store.create_list("Work").await.unwrap();
        let mut tasks = LiveQuery::spawn(store.clone(), TasksForList, Some(1));
        timeout(WAIT, tasks.next_value()).await.unwrap().unwrap().unwrap();
        let before = tasks.snapshot().generation;

        store.create_task(work, "elsewhere").await.unwrap();
        store.create_task(1, "here").await.unwrap();

        let value = timeout(WAIT, tasks.next_value()).await.unwrap().unwrap().unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value[0].task, "here");
        assert_eq!(tasks.snapshot().generation, before + 1);
    }

    #[tokio::test]
    async fn dispose_is_terminal() {
        let store = Store::in_memory().await.unwrap();
        let mut lists = LiveQuery::spawn(store.clone(), AllLists, ());
        timeout(WAIT, lists.next_value()).await.unwrap().unwrap().unwrap();
        let mut observer = lists.state.clone();

        timeout(WAIT, lists.dispose()).await.unwrap();
        assert!(observer.borrow_and_update().is_disposed());

        store.create_list("after").await.unwrap();
        assert!(observer.changed().await.is_err());
    }

    #[tokio::test]
    async fn failed_reads_are_published() {
        let store = Store::in_memory().await.unwrap();
        let mut lists = LiveQuery::spawn(store.clone(), AllLists, ());
        timeout(WAIT, lists.next_value()).await.unwrap().unwrap().unwrap();

        sqlx::query("DROP TABLE todos").execute(store.pool()).await.unwrap();
        sqlx::query("DROP TABLE todo_lists").execute(store.pool()).await.unwrap();
        store.announce(ChangeEvent::list(crate::live::ChangeKind::Updated, 1));

        let outcome = timeout(WAIT, lists.next_value()).await.unwrap().unwrap();
        assert!(outcome.is_err());
    }
}
