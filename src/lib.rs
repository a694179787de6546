#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared feed/like synchronization core for the gallery app.
//!
//! Two cooperating controllers, both pure state-and-policy logic with no
//! rendering concerns:
//!
//! - [`FeedController`] owns the ordered photo list, the page cursor, and
//!   the refresh/append lifecycle.
//! - [`LikeToggleController`] owns the optimistic like state of a single
//!   photo and reconciles it against the server on toggle.
//!
//! Both talk to the remote API through the [`PhotoSource`] capability
//! interface, so shells plug in their transport and tests substitute a
//! fake. A [`GallerySession`] owns the source handle for one screen
//! session and constructs the controllers from it.

pub mod feed;
pub mod like;
pub mod model;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

pub use feed::{FeedController, FeedError, LoadMoreOutcome, RefreshOutcome};
pub use like::{LikeError, LikeSnapshot, LikeToggleController};
pub use model::{FeedPhase, FeedSnapshot, ModelError, PageNumber, PhotoId, PhotoRecord};
pub use source::{decode_page, ConfigError, LikeAck, PhotoSource, SourceConfig, SourceError};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the Photo Source handle for one screen session.
///
/// Constructed at session start and passed by handle; both controllers
/// share the same source without any global client instance.
pub struct GallerySession {
    source: Arc<dyn PhotoSource>,
}

impl GallerySession {
    #[must_use]
    pub fn new(source: Arc<dyn PhotoSource>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn feed_controller(&self) -> FeedController {
        FeedController::new(Arc::clone(&self.source))
    }

    /// Like overlay controller for one displayed photo, seeded from the
    /// record currently backing it. Re-seed it (or construct a fresh one)
    /// whenever a refresh replaces that record.
    #[must_use]
    pub fn like_toggle(&self, record: &PhotoRecord) -> LikeToggleController {
        LikeToggleController::new(Arc::clone(&self.source), record)
    }
}
