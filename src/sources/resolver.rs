//! Query resolution: classifies a query, dispatches it to one provider and
//! applies the sampling / shuffling policy.
//!
//! Resolution is side-effect free. Callers insert the returned tracks only
//! after it succeeds, so a failure never leaves a half-filled queue.

use futures::{stream, StreamExt};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::{CatalogProvider, CatalogTrack, StreamProvider, TrackSource, VideoProvider};
use crate::error::ResolutionError;

const YOUTUBE_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtu.be",
    "youtube.com",
    "music.youtube.com",
    "www.music.youtube.com",
];

const SPOTIFY_HOST: &str = "open.spotify.com";

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub split_chapters: bool,
    /// Upper bound for catalog (Spotify) links only.
    pub playlist_limit: usize,
    pub shuffle: bool,
}

/// Tracks found for a query plus an informational note (may be empty).
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tracks: Vec<TrackSource>,
    pub note: String,
}

/// Which provider branch a query goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    YouTubePlaylist(String),
    YouTubeVideo(String),
    Spotify,
    Stream,
    Search,
}

/// Classifies a raw query. Only a failed URL parse (or a scheme we can't
/// play) sends it to search; a recognised URL never falls back to search.
pub fn classify(query: &str) -> QueryKind {
    let Ok(url) = Url::parse(query.trim()) else {
        return QueryKind::Search;
    };

    let host = url.host_str().unwrap_or_default();

    if YOUTUBE_HOSTS.contains(&host) {
        let list = url
            .query_pairs()
            .find(|(key, value)| key == "list" && !value.is_empty())
            .map(|(_, value)| value.into_owned());

        return match list {
            Some(list_id) => QueryKind::YouTubePlaylist(list_id),
            None => QueryKind::YouTubeVideo(url.to_string()),
        };
    }

    if url.scheme() == "spotify" || host == SPOTIFY_HOST {
        return QueryKind::Spotify;
    }

    match url.scheme() {
        "http" | "https" => QueryKind::Stream,
        // "artist: song" parses as a URL with scheme "artist"
        _ => QueryKind::Search,
    }
}

/// Builds the note for a catalog resolution.
pub fn catalog_note(sample_size: Option<usize>, not_found: usize) -> String {
    let mut note = String::new();

    if let Some(limit) = sample_size {
        note = format!("a random sample of {} songs was taken", limit);
    }

    if sample_size.is_some() && not_found != 0 {
        note.push_str(" and ");
    }

    match not_found {
        0 => {}
        1 => note.push_str("1 song was not found"),
        n => note.push_str(&format!("{} songs were not found", n)),
    }

    note
}

/// Picks exactly `limit` entries uniformly at random, keeping catalog order.
fn sample_catalog(tracks: Vec<CatalogTrack>, limit: usize) -> Vec<CatalogTrack> {
    let mut picked = rand::seq::index::sample(&mut rand::thread_rng(), tracks.len(), limit).into_vec();
    picked.sort_unstable();

    let mut slots: Vec<Option<CatalogTrack>> = tracks.into_iter().map(Some).collect();
    picked.into_iter().filter_map(|i| slots[i].take()).collect()
}

pub struct SourceResolver {
    video: Arc<dyn VideoProvider>,
    catalog: Arc<dyn CatalogProvider>,
    stream: Arc<dyn StreamProvider>,
    lookup_concurrency: usize,
}

impl SourceResolver {
    pub fn new(
        video: Arc<dyn VideoProvider>,
        catalog: Arc<dyn CatalogProvider>,
        stream: Arc<dyn StreamProvider>,
        lookup_concurrency: usize,
    ) -> Self {
        Self {
            video,
            catalog,
            stream,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    pub async fn resolve(&self, query: &str, options: ResolveOptions) -> Result<Resolution, ResolutionError> {
        let kind = classify(query);
        debug!("Consulta {:?} clasificada como {:?}", query, kind);

        let mut note = String::new();
        let mut tracks = match kind {
            QueryKind::YouTubePlaylist(list_id) => {
                self.video.playlist(&list_id, options.split_chapters).await?
            }
            QueryKind::YouTubeVideo(url) => {
                let found = self.video.video(&url, options.split_chapters).await?;
                if found.is_empty() {
                    return Err(ResolutionError::NotFound);
                }
                found
            }
            QueryKind::Spotify => {
                let (found, catalog_msg) = self.resolve_catalog(query.trim(), options).await?;
                note = catalog_msg;
                found
            }
            QueryKind::Stream => match self.stream.live_stream(query.trim()).await? {
                Some(track) => vec![track],
                None => return Err(ResolutionError::NotFound),
            },
            QueryKind::Search => {
                let found = self.video.search(query.trim(), options.split_chapters).await?;
                if found.is_empty() {
                    return Err(ResolutionError::NotFound);
                }
                found
            }
        };

        if tracks.is_empty() {
            return Err(ResolutionError::EmptyResult);
        }

        if options.shuffle {
            tracks.shuffle(&mut rand::thread_rng());
        }

        info!("✅ {} canciones resueltas para {:?}", tracks.len(), query);
        Ok(Resolution { tracks, note })
    }

    /// Lists the catalog, samples it down to the limit and maps each entry
    /// to a playable track. Entries that fail to map are counted, not raised.
    async fn resolve_catalog(
        &self,
        link: &str,
        options: ResolveOptions,
    ) -> Result<(Vec<TrackSource>, String), ResolutionError> {
        let listing = self.catalog.catalog(link).await?;
        let total = listing.total();
        let limit = options.playlist_limit;

        let (entries, sample_size) = if total > limit {
            info!("🎲 Catálogo de {} canciones, tomando muestra de {}", total, limit);
            (sample_catalog(listing.tracks, limit), Some(limit))
        } else {
            (listing.tracks, None)
        };

        let video = &self.video;
        let split = options.split_chapters;
        let mapped: Vec<Option<Vec<TrackSource>>> = stream::iter(entries)
            .map(|entry| async move {
                match video.search(&entry.search_query(), split).await {
                    Ok(found) if !found.is_empty() => Some(found),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("No se encontró {:?}: {:?}", entry.search_query(), e);
                        None
                    }
                }
            })
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let not_found = mapped.iter().filter(|m| m.is_none()).count();
        let tracks = mapped.into_iter().flatten().flatten().collect();

        Ok((tracks, catalog_note(sample_size, not_found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{
        CatalogListing, MockCatalogProvider, MockStreamProvider, MockVideoProvider, SourceType,
    };
    use pretty_assertions::assert_eq;

    fn tracks(prefix: &str, n: usize) -> Vec<TrackSource> {
        (0..n)
            .map(|i| {
                TrackSource::new(
                    format!("{} {}", prefix, i),
                    format!("https://www.youtube.com/watch?v={}{}", prefix, i),
                    SourceType::YouTube,
                )
            })
            .collect()
    }

    fn catalog(n: usize) -> CatalogListing {
        CatalogListing {
            tracks: (0..n)
                .map(|i| CatalogTrack {
                    name: format!("song{}", i),
                    artists: vec!["band".to_string()],
                    duration: None,
                })
                .collect(),
        }
    }

    fn options(limit: usize) -> ResolveOptions {
        ResolveOptions {
            split_chapters: false,
            playlist_limit: limit,
            shuffle: false,
        }
    }

    fn resolver(
        video: MockVideoProvider,
        catalog: MockCatalogProvider,
        stream: MockStreamProvider,
    ) -> SourceResolver {
        SourceResolver::new(Arc::new(video), Arc::new(catalog), Arc::new(stream), 4)
    }

    fn titles(resolution: &Resolution) -> Vec<String> {
        resolution.tracks.iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn classifies_queries() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc&list=XYZ"),
            QueryKind::YouTubePlaylist("XYZ".into())
        );
        assert_eq!(
            classify("https://youtu.be/abc"),
            QueryKind::YouTubeVideo("https://youtu.be/abc".into())
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc&list="),
            QueryKind::YouTubeVideo("https://www.youtube.com/watch?v=abc&list=".into())
        );
        assert_eq!(classify("https://open.spotify.com/playlist/P"), QueryKind::Spotify);
        assert_eq!(classify("spotify:album:A"), QueryKind::Spotify);
        assert_eq!(classify("https://radio.example.com/live.mp3"), QueryKind::Stream);
        assert_eq!(classify("never gonna give you up"), QueryKind::Search);
        assert_eq!(classify("Daft Punk: One More Time"), QueryKind::Search);
    }

    #[test]
    fn catalog_note_wording() {
        assert_eq!(catalog_note(None, 0), "");
        assert_eq!(catalog_note(None, 1), "1 song was not found");
        assert_eq!(catalog_note(None, 3), "3 songs were not found");
        assert_eq!(catalog_note(Some(50), 0), "a random sample of 50 songs was taken");
        assert_eq!(
            catalog_note(Some(50), 5),
            "a random sample of 50 songs was taken and 5 songs were not found"
        );
    }

    #[test]
    fn sampling_keeps_catalog_order() {
        let sampled = sample_catalog(catalog(120).tracks, 50);
        assert_eq!(sampled.len(), 50);

        let indices: Vec<usize> = sampled
            .iter()
            .map(|t| t.name.trim_start_matches("song").parse().unwrap())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn youtube_playlist_ignores_limit() {
        let mut video = MockVideoProvider::new();
        video
            .expect_playlist()
            .withf(|id, split| id == "XYZ" && !*split)
            .times(1)
            .returning(|_, _| Ok(tracks("p", 80)));
        video.expect_search().never();

        let resolver = resolver(video, MockCatalogProvider::new(), MockStreamProvider::new());
        let resolution = resolver
            .resolve("https://www.youtube.com/watch?v=abc&list=XYZ", options(50))
            .await
            .unwrap();

        assert_eq!(resolution.tracks.len(), 80);
        assert_eq!(resolution.note, "");
    }

    #[tokio::test]
    async fn playlist_passes_chapter_flag() {
        let mut video = MockVideoProvider::new();
        video
            .expect_playlist()
            .withf(|_, split| *split)
            .returning(|_, _| Ok(tracks("chapter", 6)));

        let resolver = resolver(video, MockCatalogProvider::new(), MockStreamProvider::new());
        let mut opts = options(50);
        opts.split_chapters = true;

        let resolution = resolver
            .resolve("https://music.youtube.com/playlist?list=L1", opts)
            .await
            .unwrap();
        assert_eq!(resolution.tracks.len(), 6);
    }

    #[tokio::test]
    async fn missing_video_is_not_found_and_never_searched() {
        let mut video = MockVideoProvider::new();
        video.expect_video().returning(|_, _| Ok(Vec::new()));
        video.expect_search().never();

        let resolver = resolver(video, MockCatalogProvider::new(), MockStreamProvider::new());
        let err = resolver
            .resolve("https://www.youtube.com/watch?v=gone", options(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::NotFound));
    }

    #[tokio::test]
    async fn empty_playlist_is_empty_result() {
        let mut video = MockVideoProvider::new();
        video.expect_playlist().returning(|_, _| Ok(Vec::new()));

        let resolver = resolver(video, MockCatalogProvider::new(), MockStreamProvider::new());
        let err = resolver
            .resolve("https://www.youtube.com/playlist?list=EMPTY", options(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::EmptyResult));
    }

    #[tokio::test]
    async fn spotify_samples_and_counts_misses() {
        let mut catalog_provider = MockCatalogProvider::new();
        catalog_provider
            .expect_catalog()
            .withf(|link| link == "https://open.spotify.com/playlist/P")
            .returning(|_| Ok(catalog(120)));

        // Which entries get sampled is random, so the first five lookups
        // miss regardless of which songs they are for.
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let mut video = MockVideoProvider::new();
        video.expect_search().times(50).returning(move |query, _| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < 5 {
                Ok(Vec::new())
            } else {
                Ok(vec![TrackSource::new(query, "https://youtu.be/x", SourceType::YouTube)])
            }
        });

        let resolver = resolver(video, catalog_provider, MockStreamProvider::new());
        let resolution = resolver
            .resolve("https://open.spotify.com/playlist/P", options(50))
            .await
            .unwrap();

        assert_eq!(resolution.tracks.len(), 45);
        assert_eq!(
            resolution.note,
            "a random sample of 50 songs was taken and 5 songs were not found"
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn spotify_under_limit_returns_all_in_order() {
        let mut catalog_provider = MockCatalogProvider::new();
        catalog_provider.expect_catalog().returning(|_| Ok(catalog(3)));

        let mut video = MockVideoProvider::new();
        video.expect_search().returning(|query, _| {
            if query == "song1 band" {
                Err(anyhow::anyhow!("timeout"))
            } else {
                Ok(vec![TrackSource::new(query, "https://youtu.be/x", SourceType::YouTube)])
            }
        });

        let resolver = resolver(video, catalog_provider, MockStreamProvider::new());
        let resolution = resolver
            .resolve("spotify:album:A", options(50))
            .await
            .unwrap();

        assert_eq!(titles(&resolution), vec!["song0 band", "song2 band"]);
        assert_eq!(resolution.note, "1 song was not found");
    }

    #[tokio::test]
    async fn spotify_exactly_at_limit_is_taken_whole() {
        let mut catalog_provider = MockCatalogProvider::new();
        catalog_provider.expect_catalog().returning(|_| Ok(catalog(4)));

        let mut video = MockVideoProvider::new();
        video
            .expect_search()
            .times(4)
            .returning(|query, _| Ok(vec![TrackSource::new(query, "https://youtu.be/x", SourceType::YouTube)]));

        let resolver = resolver(video, catalog_provider, MockStreamProvider::new());
        let resolution = resolver
            .resolve("https://open.spotify.com/album/A", options(4))
            .await
            .unwrap();

        assert_eq!(
            titles(&resolution),
            vec!["song0 band", "song1 band", "song2 band", "song3 band"]
        );
        assert_eq!(resolution.note, "");
    }

    #[tokio::test]
    async fn spotify_with_no_matches_is_empty_result() {
        let mut catalog_provider = MockCatalogProvider::new();
        catalog_provider.expect_catalog().returning(|_| Ok(catalog(2)));
        let mut video = MockVideoProvider::new();
        video.expect_search().returning(|_, _| Ok(Vec::new()));

        let resolver = resolver(video, catalog_provider, MockStreamProvider::new());
        let err = resolver
            .resolve("https://open.spotify.com/album/A", options(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::EmptyResult));
    }

    #[tokio::test]
    async fn other_urls_are_live_streams() {
        let mut stream_provider = MockStreamProvider::new();
        stream_provider
            .expect_live_stream()
            .withf(|url| url == "https://radio.example.com/live")
            .returning(|url| Ok(Some(TrackSource::new(url, url, SourceType::DirectUrl).live())));

        let resolver = resolver(MockVideoProvider::new(), MockCatalogProvider::new(), stream_provider);
        let resolution = resolver
            .resolve("https://radio.example.com/live", options(50))
            .await
            .unwrap();

        assert_eq!(resolution.tracks.len(), 1);
        assert!(resolution.tracks[0].is_live());
    }

    #[tokio::test]
    async fn dead_stream_is_not_found() {
        let mut stream_provider = MockStreamProvider::new();
        stream_provider.expect_live_stream().returning(|_| Ok(None));
        let mut video = MockVideoProvider::new();
        video.expect_search().never();

        let resolver = resolver(video, MockCatalogProvider::new(), stream_provider);
        let err = resolver
            .resolve("https://example.com/page.html", options(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::NotFound));
    }

    #[tokio::test]
    async fn free_text_searches() {
        let mut video = MockVideoProvider::new();
        video
            .expect_search()
            .withf(|query, _| query == "lofi beats")
            .returning(|_, _| Ok(tracks("s", 1)));

        let resolver = resolver(video, MockCatalogProvider::new(), MockStreamProvider::new());
        let resolution = resolver.resolve("lofi beats", options(50)).await.unwrap();
        assert_eq!(titles(&resolution), vec!["s 0"]);

        let mut video = MockVideoProvider::new();
        video.expect_search().returning(|_, _| Ok(Vec::new()));
        let resolver = resolver_with(video);
        let err = resolver.resolve("nothing", options(50)).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound));
    }

    fn resolver_with(video: MockVideoProvider) -> SourceResolver {
        resolver(video, MockCatalogProvider::new(), MockStreamProvider::new())
    }

    #[tokio::test]
    async fn provider_errors_surface() {
        let mut video = MockVideoProvider::new();
        video
            .expect_search()
            .returning(|_, _| Err(anyhow::anyhow!("yt-dlp timed out")));

        let err = resolver_with(video)
            .resolve("anything", options(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolutionError::Provider(_)));
        assert_eq!(err.to_string(), "yt-dlp timed out");
    }

    #[tokio::test]
    async fn shuffle_keeps_membership() {
        let mut video = MockVideoProvider::new();
        video.expect_playlist().returning(|_, _| Ok(tracks("t", 30)));

        let mut opts = options(50);
        opts.shuffle = true;
        let resolution = resolver_with(video)
            .resolve("https://youtube.com/playlist?list=L", opts)
            .await
            .unwrap();

        let mut shuffled = titles(&resolution);
        let mut original: Vec<String> = tracks("t", 30).iter().map(|t| t.title().to_string()).collect();
        shuffled.sort();
        original.sort();
        assert_eq!(shuffled, original);
    }

    #[tokio::test]
    async fn no_shuffle_preserves_order() {
        let mut video = MockVideoProvider::new();
        video.expect_playlist().returning(|_, _| Ok(tracks("t", 5)));

        let resolution = resolver_with(video)
            .resolve("https://youtube.com/playlist?list=L", options(50))
            .await
            .unwrap();

        assert_eq!(titles(&resolution), vec!["t 0", "t 1", "t 2", "t 3", "t 4"]);
    }
}
