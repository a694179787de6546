use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid photo id: {0}")]
    InvalidId(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Validated photo identifier - immutable after construction
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    const MAX_LENGTH: usize = 128;

    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(ModelError::InvalidId("PhotoId cannot be empty".into()));
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(ModelError::InvalidId(format!(
                "PhotoId exceeds {} characters",
                Self::MAX_LENGTH
            )));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(ModelError::InvalidId(
                "PhotoId contains control characters".into(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-based page cursor. The remote API has no explicit end-of-data
/// marker; callers detect the end of the feed from an empty page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageNumber(u32);

impl PageNumber {
    pub const FIRST: Self = Self(1);

    pub fn new(value: u32) -> Result<Self, ModelError> {
        if value == 0 {
            return Err(ModelError::Validation("page numbers start at 1".into()));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// A photo as reported by the server. Immutable once fetched; the
/// per-item optimistic like state lives in its overlay, never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub image_url: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar_url: Option<String>,
    pub is_liked: bool,
    pub likes_count: u64,
}

/// Wire shape of one photo in a page listing.
///
/// Optional sub-objects are tolerated as absent so a sparse payload
/// still decodes; only the id is required.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoDto {
    pub id: String,
    #[serde(default)]
    pub liked_by_user: bool,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub user: Option<UserDto>,
    #[serde(default)]
    pub urls: Option<UrlsDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image: Option<ProfileImageDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileImageDto {
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlsDto {
    #[serde(default)]
    pub small: Option<String>,
}

impl TryFrom<PhotoDto> for PhotoRecord {
    type Error = ModelError;

    fn try_from(dto: PhotoDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PhotoId::new(dto.id)?,
            image_url: dto.urls.and_then(|u| u.small),
            author_name: dto.user.as_ref().and_then(|u| u.name.clone()),
            author_avatar_url: dto
                .user
                .and_then(|u| u.profile_image)
                .and_then(|p| p.small),
            is_liked: dto.liked_by_user,
            likes_count: dto.likes,
        })
    }
}

/// Which fetch, if any, the feed is currently waiting on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    #[default]
    Idle,
    Refreshing,
    AppendingMore,
}

impl FeedPhase {
    #[must_use]
    pub const fn is_loading(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Read-only feed state handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub items: Vec<PhotoRecord>,
    pub page: PageNumber,
    pub phase: FeedPhase,
    pub is_loading: bool,
}

impl FeedSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            page: PageNumber::FIRST,
            phase: FeedPhase::Idle,
            is_loading: false,
        }
    }
}

/// Appends records whose id is not already present, preserving arrival
/// order. Returns how many were appended.
pub(crate) fn append_unique(items: &mut Vec<PhotoRecord>, incoming: Vec<PhotoRecord>) -> usize {
    let mut appended = 0;
    for record in incoming {
        if items.iter().any(|existing| existing.id == record.id) {
            continue;
        }
        items.push(record);
        appended += 1;
    }
    appended
}

/// De-duplicates one fetched page by id, keeping first occurrences.
pub(crate) fn dedupe_by_id(records: Vec<PhotoRecord>) -> Vec<PhotoRecord> {
    let mut fresh = Vec::with_capacity(records.len());
    append_unique(&mut fresh, records);
    fresh
}
