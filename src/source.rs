use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::model::{PageNumber, PhotoDto, PhotoId, PhotoRecord};
use crate::{DEFAULT_PAGE_SIZE, REQUEST_TIMEOUT};

/// Failures a Photo Source operation can surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Transport or connectivity failure.
    #[error("network failure: {0}")]
    Network(String),
    /// The response arrived but its payload did not match the expected shape.
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Opaque acknowledgement for a like/unlike call. Some backends echo the
/// photo back; it is logged for observability and never reconciled against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikeAck {
    pub photo: Option<PhotoRecord>,
}

/// The remote collaborator the feed and like controllers talk to.
///
/// Kept to three named operations so tests can substitute a fake and the
/// controllers stay independent of any concrete network client.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch_page(&self, page: PageNumber) -> Result<Vec<PhotoRecord>, SourceError>;
    async fn like(&self, id: &PhotoId) -> Result<LikeAck, SourceError>;
    async fn unlike(&self, id: &PhotoId) -> Result<LikeAck, SourceError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("endpoint must be an http(s) base URL with a host: {0}")]
    InvalidBase(String),
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// Externally supplied configuration for a concrete `PhotoSource`
/// implementation: the base endpoint plus the API identity credential and
/// optional bearer token. Construction validates the endpoint once so the
/// URL builders below cannot fail afterwards.
///
/// Credentials are held behind `secrecy` and never appear in `Debug`
/// output or serialized state.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    base_url: Url,
    client_id: SecretString,
    access_token: Option<SecretString>,
    page_size: u32,
    request_timeout: Duration,
}

impl SourceConfig {
    pub fn new(base_url: Url, client_id: SecretString) -> Result<Self, ConfigError> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(ConfigError::InvalidBase(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            client_id,
            access_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, ConfigError> {
        if page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        self.page_size = page_size;
        Ok(self)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Page-listing URL: `{base}/photos?page=N&per_page=M`.
    pub fn page_url(&self, page: PageNumber) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ConfigError::InvalidBase(self.base_url.to_string()))?;
            segments.pop_if_empty().push("photos");
        }
        url.query_pairs_mut()
            .append_pair("page", &page.get().to_string())
            .append_pair("per_page", &self.page_size.to_string());
        Ok(url)
    }

    /// Like/unlike URL: `{base}/photos/{id}/like` (POST to like, DELETE to
    /// unlike).
    pub fn like_url(&self, id: &PhotoId) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ConfigError::InvalidBase(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .push("photos")
                .push(id.as_str())
                .push("like");
        }
        Ok(url)
    }

    /// `Authorization` header value: the bearer token when one is present,
    /// otherwise the Client-ID identity credential.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        match &self.access_token {
            Some(token) => format!("Bearer {}", token.expose_secret()),
            None => format!("Client-ID {}", self.client_id.expose_secret()),
        }
    }
}

/// Decodes one page listing body into records, surfacing any shape
/// mismatch as a `Decode` failure.
pub fn decode_page(body: &[u8]) -> Result<Vec<PhotoRecord>, SourceError> {
    let dtos: Vec<PhotoDto> =
        serde_json::from_slice(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    dtos.into_iter()
        .map(|dto| PhotoRecord::try_from(dto).map_err(|e| SourceError::Decode(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig::new(
            Url::parse("https://api.example.com").unwrap(),
            SecretString::new("client-sekrit".into()),
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_http_base() {
        let result = SourceConfig::new(
            Url::parse("ftp://files.example.com").unwrap(),
            SecretString::new("x".into()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidBase(_))));
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(matches!(
            config().with_page_size(0),
            Err(ConfigError::InvalidPageSize)
        ));
    }

    #[test]
    fn page_url_carries_cursor_and_size() {
        let cfg = config().with_page_size(25).unwrap();
        let url = cfg.page_url(PageNumber::new(3).unwrap()).unwrap();
        assert_eq!(url.path(), "/photos");
        assert_eq!(
            url.query(),
            Some("page=3&per_page=25"),
            "unexpected query: {url}"
        );
    }

    #[test]
    fn page_url_respects_base_path() {
        let cfg = SourceConfig::new(
            Url::parse("https://api.example.com/v1/").unwrap(),
            SecretString::new("x".into()),
        )
        .unwrap();
        let url = cfg.page_url(PageNumber::FIRST).unwrap();
        assert_eq!(url.path(), "/v1/photos");
    }

    #[test]
    fn like_url_targets_the_photo() {
        let url = config()
            .like_url(&PhotoId::new("abc123").unwrap())
            .unwrap();
        assert_eq!(url.path(), "/photos/abc123/like");
    }

    #[test]
    fn authorization_prefers_bearer_token() {
        let cfg = config();
        assert_eq!(cfg.authorization_header(), "Client-ID client-sekrit");

        let cfg = cfg.with_access_token(SecretString::new("tok".into()));
        assert_eq!(cfg.authorization_header(), "Bearer tok");
    }

    #[test]
    fn debug_output_is_redacted() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("client-sekrit"));
    }

    #[test]
    fn decode_page_maps_wire_fields() {
        let body = br#"[
            {"id": "p1", "liked_by_user": true, "likes": 7,
             "user": {"name": "Ada"}, "urls": {"small": "https://img/p1"}},
            {"id": "p2"}
        ]"#;
        let records = decode_page(body).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_liked);
        assert_eq!(records[0].likes_count, 7);
        assert_eq!(records[1].id.as_str(), "p2");
    }

    #[test]
    fn decode_page_rejects_malformed_body() {
        assert!(matches!(
            decode_page(b"{\"not\": \"a list\"}"),
            Err(SourceError::Decode(_))
        ));
        assert!(matches!(
            decode_page(br#"[{"id": ""}]"#),
            Err(SourceError::Decode(_))
        ));
    }
}
