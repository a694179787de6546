use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::model::{PhotoId, PhotoRecord};
use crate::source::{PhotoSource, SourceError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LikeError {
    /// The like/unlike call failed; the optimistic change was rolled back.
    #[error("like toggle failed for photo {id}")]
    ToggleFailed {
        id: PhotoId,
        #[source]
        source: SourceError,
    },
}

/// Per-photo overlay state exposed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSnapshot {
    pub id: PhotoId,
    pub is_liked: bool,
    pub likes_count: u64,
    pub is_pending: bool,
}

/// Pure optimistic overlay for one photo: the `(is_liked, likes_count)`
/// pair the user currently sees, independent of server confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LikeOverlay {
    is_liked: bool,
    likes_count: u64,
}

impl LikeOverlay {
    fn seed(record: &PhotoRecord) -> Self {
        Self {
            is_liked: record.is_liked,
            likes_count: record.likes_count,
        }
    }

    /// Applies one optimistic flip and returns the pre-toggle pair. The
    /// count is saturating: an optimistic decrement can never go negative.
    fn apply_toggle(&mut self) -> Self {
        let prior = *self;
        self.likes_count = if self.is_liked {
            self.likes_count.saturating_sub(1)
        } else {
            self.likes_count.saturating_add(1)
        };
        self.is_liked = !self.is_liked;
        prior
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToggleDirection {
    Like,
    Unlike,
}

struct LikeState {
    overlay: LikeOverlay,
    in_flight: u32,
    seed_epoch: u64,
}

/// Optimistic like/unlike controller for a single photo.
///
/// Seeded from the photo's server-reported record; `toggle` flips the
/// overlay before its network call is issued, so every holder of the
/// controller observes the new state without delay. Overlapping toggles
/// are permitted and independent; each flips from the current optimistic
/// state and the server is treated as eventually consistent.
pub struct LikeToggleController {
    id: PhotoId,
    source: Arc<dyn PhotoSource>,
    state: Mutex<LikeState>,
}

impl LikeToggleController {
    #[must_use]
    pub fn new(source: Arc<dyn PhotoSource>, record: &PhotoRecord) -> Self {
        Self {
            id: record.id.clone(),
            source,
            state: Mutex::new(LikeState {
                overlay: LikeOverlay::seed(record),
                in_flight: 0,
                seed_epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LikeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, state: &LikeState) -> LikeSnapshot {
        LikeSnapshot {
            id: self.id.clone(),
            is_liked: state.overlay.is_liked,
            likes_count: state.overlay.likes_count,
            is_pending: state.in_flight > 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> &PhotoId {
        &self.id
    }

    #[must_use]
    pub fn snapshot(&self) -> LikeSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    /// Resets the overlay from a fresh server record, discarding any
    /// optimistic state. Call this whenever the backing record is replaced
    /// (a refresh), even if the id is unchanged: server truth may have
    /// legitimately moved. Failures of toggles issued before the reseed no
    /// longer roll the overlay back.
    pub fn reseed(&self, record: &PhotoRecord) {
        if record.id != self.id {
            warn!(
                expected = %self.id,
                got = %record.id,
                "reseed ignored, record is for a different photo"
            );
            return;
        }
        let mut state = self.lock();
        state.overlay = LikeOverlay::seed(record);
        state.seed_epoch += 1;
    }

    /// Flips the liked state optimistically, then issues the matching
    /// like/unlike call. On success the optimistic value stands (the
    /// server acknowledgement is logged, never reconciled against); on
    /// failure the overlay is rolled back to the pre-toggle pair and the
    /// error surfaced.
    #[instrument(skip(self), fields(photo_id = %self.id, toggle_id = %Uuid::new_v4()))]
    pub async fn toggle(&self) -> Result<LikeSnapshot, LikeError> {
        let (direction, prior, epoch) = {
            let mut state = self.lock();
            let prior = state.overlay.apply_toggle();
            state.in_flight += 1;
            let direction = if prior.is_liked {
                ToggleDirection::Unlike
            } else {
                ToggleDirection::Like
            };
            (direction, prior, state.seed_epoch)
        };

        let result = match direction {
            ToggleDirection::Like => self.source.like(&self.id).await,
            ToggleDirection::Unlike => self.source.unlike(&self.id).await,
        };

        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match result {
            Ok(ack) => {
                debug!(
                    ?direction,
                    server_echo = ack.photo.is_some(),
                    "toggle acknowledged"
                );
                Ok(self.snapshot_of(&state))
            }
            Err(source) => {
                if state.seed_epoch == epoch {
                    state.overlay = prior;
                    warn!(?direction, error = %source, "toggle failed, optimistic state rolled back");
                } else {
                    // A reseed already replaced the overlay with fresher
                    // server truth; restoring the stale pair would undo it.
                    warn!(?direction, error = %source, "toggle failed after reseed, rollback discarded");
                }
                Err(LikeError::ToggleFailed {
                    id: self.id.clone(),
                    source,
                })
            }
        }
    }
}
