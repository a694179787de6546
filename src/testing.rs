//! Scripted Photo Source for tests and host-shell previews.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::model::{PageNumber, PhotoId, PhotoRecord};
use crate::source::{LikeAck, PhotoSource, SourceError};

/// In-memory `PhotoSource` with scripted results and call logs.
///
/// Results are consumed FIFO per operation; an empty queue yields the
/// benign default (an empty page, an empty acknowledgement). A held call
/// stays in flight until its gate is notified, which lets tests observe
/// intermediate state such as optimistic updates and single-flight guards.
#[derive(Default)]
pub struct FakePhotoSource {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    pages: VecDeque<Result<Vec<PhotoRecord>, SourceError>>,
    like_results: VecDeque<Result<LikeAck, SourceError>>,
    unlike_results: VecDeque<Result<LikeAck, SourceError>>,
    fetched_pages: Vec<PageNumber>,
    liked: Vec<PhotoId>,
    unliked: Vec<PhotoId>,
    hold_next_fetch: Option<Arc<Notify>>,
    hold_next_toggle: Option<Arc<Notify>>,
}

impl FakePhotoSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue_page(&self, result: Result<Vec<PhotoRecord>, SourceError>) {
        self.lock().pages.push_back(result);
    }

    pub fn enqueue_like(&self, result: Result<LikeAck, SourceError>) {
        self.lock().like_results.push_back(result);
    }

    pub fn enqueue_unlike(&self, result: Result<LikeAck, SourceError>) {
        self.lock().unlike_results.push_back(result);
    }

    /// Holds the next `fetch_page` call in flight until the returned gate
    /// is notified.
    #[must_use]
    pub fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().hold_next_fetch = Some(Arc::clone(&gate));
        gate
    }

    /// Holds the next `like`/`unlike` call in flight until the returned
    /// gate is notified.
    #[must_use]
    pub fn hold_next_toggle(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().hold_next_toggle = Some(Arc::clone(&gate));
        gate
    }

    #[must_use]
    pub fn fetched_pages(&self) -> Vec<PageNumber> {
        self.lock().fetched_pages.clone()
    }

    #[must_use]
    pub fn likes_for(&self, id: &PhotoId) -> usize {
        self.lock().liked.iter().filter(|l| *l == id).count()
    }

    #[must_use]
    pub fn unlikes_for(&self, id: &PhotoId) -> usize {
        self.lock().unliked.iter().filter(|l| *l == id).count()
    }
}

#[async_trait]
impl PhotoSource for FakePhotoSource {
    async fn fetch_page(&self, page: PageNumber) -> Result<Vec<PhotoRecord>, SourceError> {
        let (gate, result) = {
            let mut inner = self.lock();
            inner.fetched_pages.push(page);
            (inner.hold_next_fetch.take(), inner.pages.pop_front())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn like(&self, id: &PhotoId) -> Result<LikeAck, SourceError> {
        let (gate, result) = {
            let mut inner = self.lock();
            inner.liked.push(id.clone());
            (inner.hold_next_toggle.take(), inner.like_results.pop_front())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result.unwrap_or_else(|| Ok(LikeAck::default()))
    }

    async fn unlike(&self, id: &PhotoId) -> Result<LikeAck, SourceError> {
        let (gate, result) = {
            let mut inner = self.lock();
            inner.unliked.push(id.clone());
            (
                inner.hold_next_toggle.take(),
                inner.unlike_results.pop_front(),
            )
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result.unwrap_or_else(|| Ok(LikeAck::default()))
    }
}
