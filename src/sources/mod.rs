//! # Sources Module
//!
//! Provider adapters and the resolver that turns a user query into playable
//! tracks.
//!
//! - [`youtube`]: videos, playlists and search through `yt-dlp`
//! - [`spotify`]: catalog listing through the Spotify Web API
//! - [`direct_url`]: direct HTTP audio and live streams
//! - [`resolver`]: URL classification, dispatch, sampling and shuffling
//!
//! Spotify cannot serve audio, so catalog entries are mapped to YouTube
//! matches by the resolver.

pub mod direct_url;
pub mod resolver;
pub mod spotify;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

pub use direct_url::DirectUrlClient;
pub use resolver::{Resolution, ResolveOptions, SourceResolver};
pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

/// Provider able to serve YouTube-like videos, playlists and search results.
///
/// An empty `Vec` means "nothing there"; `Err` is reserved for transport and
/// process failures.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Resolves a single video URL, optionally split into chapters.
    async fn video(&self, url: &str, split_chapters: bool) -> Result<Vec<TrackSource>>;

    /// Resolves every entry of a playlist by its id.
    async fn playlist(&self, list_id: &str, split_chapters: bool) -> Result<Vec<TrackSource>>;

    /// Resolves the best match for a free-text query.
    async fn search(&self, query: &str, split_chapters: bool) -> Result<Vec<TrackSource>>;
}

/// Provider exposing a music catalog without playable audio.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Lists every track behind a catalog link (track, album, playlist, artist).
    async fn catalog(&self, link: &str) -> Result<CatalogListing>;
}

/// Provider for direct HTTP audio / live streams.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Returns `None` when the URL does not serve a playable stream.
    async fn live_stream(&self, url: &str) -> Result<Option<TrackSource>>;
}

/// A catalog entry that still has to be mapped to a playable track.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTrack {
    pub name: String,
    pub artists: Vec<String>,
    pub duration: Option<Duration>,
}

impl CatalogTrack {
    /// Query used to find a playable equivalent.
    pub fn search_query(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogListing {
    pub tracks: Vec<CatalogTrack>,
}

impl CatalogListing {
    pub fn total(&self) -> usize {
        self.tracks.len()
    }
}

/// A resolved, playable track. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    title: String,
    artist: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    source_type: SourceType,
    offset: Option<Duration>,
    is_live: bool,
}

impl TrackSource {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            title: title.into(),
            artist: None,
            duration: None,
            thumbnail: None,
            url: url.into(),
            source_type,
            offset: None,
            is_live: false,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }
    /// Start position inside the underlying media (chapters).
    pub fn offset(&self) -> Option<Duration> {
        self.offset
    }
    pub fn is_live(&self) -> bool {
        self.is_live
    }

    // Builders
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn live(mut self) -> Self {
        self.is_live = true;
        self.duration = None;
        self
    }
}

/// Which transport plays a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    YouTube,
    DirectUrl,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::YouTube => "YouTube",
            SourceType::DirectUrl => "Stream",
        }
    }
}
