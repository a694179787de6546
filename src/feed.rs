use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{
    append_unique, dedupe_by_id, FeedPhase, FeedSnapshot, PageNumber, PhotoRecord,
};
use crate::source::{PhotoSource, SourceError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// The fetch failed; items and cursor were left unchanged.
    #[error("feed page fetch failed")]
    FetchFailed(#[from] SourceError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The list was replaced wholesale and the cursor reset to page 1.
    Replaced { item_count: usize },
    /// A fetch was already in flight; no call was issued.
    AlreadyInFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMoreOutcome {
    /// Records were appended and the cursor advanced.
    Appended { new_items: usize },
    /// The server returned an empty page. The cursor still advanced; this
    /// is the signal to stop requesting further pages, not an error.
    EndOfFeed,
    /// A fetch was already in flight; no call was issued.
    AlreadyInFlight,
}

/// Owns the ordered photo list and the refresh/append lifecycle for one
/// screen session.
///
/// At most one fetch is in flight at a time; `items` is only ever replaced
/// (refresh) or appended-to (`load_more`), never spliced or reordered. The
/// state lock is never held across an await point, so completions are
/// applied in the order the underlying calls resolve.
pub struct FeedController {
    source: Arc<dyn PhotoSource>,
    state: Mutex<FeedState>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
}

struct FeedState {
    items: Vec<PhotoRecord>,
    page: PageNumber,
    phase: FeedPhase,
}

impl FeedState {
    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: self.items.clone(),
            page: self.page,
            phase: self.phase,
            is_loading: self.phase.is_loading(),
        }
    }
}

impl FeedController {
    #[must_use]
    pub fn new(source: Arc<dyn PhotoSource>) -> Self {
        let (snapshot_tx, _) = watch::channel(FeedSnapshot::empty());
        Self {
            source,
            state: Mutex::new(FeedState {
                items: Vec::new(),
                page: PageNumber::FIRST,
                phase: FeedPhase::Idle,
            }),
            snapshot_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &FeedState) {
        let _ = self.snapshot_tx.send_replace(state.snapshot());
    }

    /// Single-flight guard: enters `phase` and returns the current cursor,
    /// or `None` when a fetch is already in flight.
    fn begin(&self, phase: FeedPhase) -> Option<PageNumber> {
        let mut state = self.lock();
        if state.phase.is_loading() {
            return None;
        }
        state.phase = phase;
        self.publish(&state);
        Some(state.page)
    }

    /// Requests page 1 and replaces the list wholesale on success. On
    /// failure the current items and cursor survive and the error is
    /// surfaced to the caller; there is no automatic retry.
    #[instrument(skip(self), fields(fetch_id = %Uuid::new_v4()))]
    pub async fn refresh(&self) -> Result<RefreshOutcome, FeedError> {
        if self.begin(FeedPhase::Refreshing).is_none() {
            debug!("refresh skipped, fetch already in flight");
            return Ok(RefreshOutcome::AlreadyInFlight);
        }

        match self.source.fetch_page(PageNumber::FIRST).await {
            Ok(records) => {
                let mut state = self.lock();
                state.items = dedupe_by_id(records);
                state.page = PageNumber::FIRST;
                state.phase = FeedPhase::Idle;
                let item_count = state.items.len();
                self.publish(&state);
                info!(items = item_count, "feed replaced from refresh");
                Ok(RefreshOutcome::Replaced { item_count })
            }
            Err(e) => {
                let mut state = self.lock();
                state.phase = FeedPhase::Idle;
                self.publish(&state);
                warn!(error = %e, "refresh failed, keeping current items");
                Err(FeedError::FetchFailed(e))
            }
        }
    }

    /// Requests the page after the current cursor and appends the result.
    ///
    /// Returns immediately without side effects while a fetch is in
    /// flight; rapid scroll-threshold events therefore collapse into one
    /// request. On failure the cursor is unchanged, so the next call
    /// retries the same page.
    #[instrument(skip(self), fields(fetch_id = %Uuid::new_v4()))]
    pub async fn load_more(&self) -> Result<LoadMoreOutcome, FeedError> {
        let Some(current) = self.begin(FeedPhase::AppendingMore) else {
            debug!("load_more skipped, fetch already in flight");
            return Ok(LoadMoreOutcome::AlreadyInFlight);
        };
        let next = current.next();

        match self.source.fetch_page(next).await {
            Ok(records) => {
                let end_of_feed = records.is_empty();
                let mut state = self.lock();
                let new_items = append_unique(&mut state.items, records);
                state.page = next;
                state.phase = FeedPhase::Idle;
                self.publish(&state);
                if end_of_feed {
                    info!(page = %next, "empty page, end of feed");
                    Ok(LoadMoreOutcome::EndOfFeed)
                } else {
                    info!(page = %next, appended = new_items, "page appended");
                    Ok(LoadMoreOutcome::Appended { new_items })
                }
            }
            Err(e) => {
                let mut state = self.lock();
                state.phase = FeedPhase::Idle;
                self.publish(&state);
                warn!(page = %next, error = %e, "load_more failed, cursor unchanged");
                Err(FeedError::FetchFailed(e))
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().snapshot()
    }

    /// Receiver observing every published snapshot. The channel closes
    /// when the controller is dropped, so a torn-down screen stops
    /// receiving updates instead of mutating a dead owner.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhotoId;
    use crate::testing::FakePhotoSource;

    fn record(id: &str) -> PhotoRecord {
        PhotoRecord {
            id: PhotoId::new(id).unwrap(),
            image_url: None,
            author_name: None,
            author_avatar_url: None,
            is_liked: false,
            likes_count: 0,
        }
    }

    fn controller(fake: &Arc<FakePhotoSource>) -> FeedController {
        let source: Arc<dyn PhotoSource> = fake.clone();
        FeedController::new(source)
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn refresh_replaces_wholesale_and_resets_cursor() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);

        fake.enqueue_page(Ok(vec![record("a"), record("b")]));
        fake.enqueue_page(Ok(vec![record("c")]));
        fake.enqueue_page(Ok(vec![record("x"), record("y")]));

        feed.refresh().await.unwrap();
        feed.load_more().await.unwrap();
        assert_eq!(feed.snapshot().page.get(), 2);
        assert_eq!(feed.snapshot().items.len(), 3);

        let outcome = feed.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Replaced { item_count: 2 });

        let snap = feed.snapshot();
        assert_eq!(snap.page, PageNumber::FIRST);
        assert!(!snap.is_loading);
        let ids: Vec<_> = snap.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["x", "y"]);
    }

    #[tokio::test]
    async fn load_more_appends_without_duplicates() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);

        fake.enqueue_page(Ok(vec![record("a"), record("b")]));
        fake.enqueue_page(Ok(vec![record("b"), record("c")]));

        feed.refresh().await.unwrap();
        let outcome = feed.load_more().await.unwrap();
        assert_eq!(outcome, LoadMoreOutcome::Appended { new_items: 1 });

        let ids: Vec<_> = feed
            .snapshot()
            .items
            .iter()
            .map(|r| r.id.as_str().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_page_advances_cursor_without_error() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);

        fake.enqueue_page(Ok(vec![record("a")]));
        fake.enqueue_page(Ok(vec![]));

        feed.refresh().await.unwrap();
        let outcome = feed.load_more().await.unwrap();
        assert_eq!(outcome, LoadMoreOutcome::EndOfFeed);

        let snap = feed.snapshot();
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.page.get(), 2);
        assert!(!snap.is_loading);
    }

    #[tokio::test]
    async fn failed_load_more_retries_the_same_page() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);

        fake.enqueue_page(Ok(vec![record("a")]));
        fake.enqueue_page(Err(SourceError::Network("connection reset".into())));
        fake.enqueue_page(Ok(vec![record("b")]));

        feed.refresh().await.unwrap();
        let err = feed.load_more().await.unwrap_err();
        assert!(matches!(err, FeedError::FetchFailed(SourceError::Network(_))));

        let snap = feed.snapshot();
        assert_eq!(snap.page, PageNumber::FIRST);
        assert_eq!(snap.items.len(), 1);
        assert!(!snap.is_loading);

        feed.load_more().await.unwrap();
        let pages: Vec<_> = fake.fetched_pages().iter().map(|p| p.get()).collect();
        assert_eq!(pages, [1, 2, 2]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_items() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);

        fake.enqueue_page(Ok(vec![record("a")]));
        fake.enqueue_page(Err(SourceError::Decode("truncated body".into())));

        feed.refresh().await.unwrap();
        let err = feed.refresh().await.unwrap_err();
        assert!(matches!(err, FeedError::FetchFailed(SourceError::Decode(_))));

        let snap = feed.snapshot();
        assert_eq!(snap.items.len(), 1);
        assert!(!snap.is_loading);
    }

    #[tokio::test]
    async fn load_more_is_single_flight() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = Arc::new(controller(&fake));

        fake.enqueue_page(Ok(vec![record("a")]));
        feed.refresh().await.unwrap();

        let gate = fake.hold_next_fetch();
        fake.enqueue_page(Ok(vec![record("b")]));

        let background = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.load_more().await })
        };
        settle().await;

        let snap = feed.snapshot();
        assert!(snap.is_loading);
        assert_eq!(snap.phase, FeedPhase::AppendingMore);

        let second = feed.load_more().await.unwrap();
        assert_eq!(second, LoadMoreOutcome::AlreadyInFlight);

        gate.notify_one();
        let first = background.await.unwrap().unwrap();
        assert_eq!(first, LoadMoreOutcome::Appended { new_items: 1 });

        // refresh + exactly one load_more reached the source
        assert_eq!(fake.fetched_pages().len(), 2);
    }

    #[tokio::test]
    async fn watch_observes_published_snapshots() {
        let fake = Arc::new(FakePhotoSource::new());
        let feed = controller(&fake);
        let rx = feed.watch();

        assert_eq!(rx.borrow().items.len(), 0);

        fake.enqueue_page(Ok(vec![record("a"), record("b")]));
        feed.refresh().await.unwrap();

        let snap = rx.borrow().clone();
        assert_eq!(snap.items.len(), 2);
        assert!(!snap.is_loading);
    }
}
