use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{SourceType, TrackSource, VideoProvider};

/// stderr fragments yt-dlp prints when the target simply isn't there.
const NOT_FOUND_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "does not exist",
    "http error 404",
    "this video has been removed",
    "no video results",
    "playlist does not exist",
];

/// Cliente para YouTube a través de yt-dlp
pub struct YouTubeClient {
    ytdlp: String,
    timeout: Duration,
    rate_limiter: Semaphore,
    lookup_concurrency: usize,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    is_live: Option<bool>,
    #[serde(default)]
    chapters: Option<Vec<Chapter>>,
}

#[derive(Debug, Deserialize)]
struct Chapter {
    start_time: f64,
    end_time: f64,
    title: String,
}

impl YtDlpInfo {
    fn page_url(&self) -> String {
        self.webpage_url
            .clone()
            .or_else(|| self.url.clone().filter(|u| u.starts_with("http")))
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id))
    }

    fn into_track(self) -> TrackSource {
        let url = self.page_url();
        let mut track = TrackSource::new(self.title, url, SourceType::YouTube);

        if let Some(artist) = self.uploader.or(self.channel) {
            track = track.with_artist(artist);
        }

        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        if self.is_live.unwrap_or(false) {
            return track.live();
        }

        if let Some(duration) = self.duration.filter(|d| *d > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(duration));
        }

        track
    }

    /// One track per chapter, or the whole video when it has none.
    fn into_tracks(self, split_chapters: bool) -> Vec<TrackSource> {
        let chapters = match &self.chapters {
            Some(chapters) if split_chapters && !chapters.is_empty() => chapters,
            _ => return vec![self.into_track()],
        };

        let url = self.page_url();
        chapters
            .iter()
            .filter(|chapter| chapter.end_time > chapter.start_time)
            .map(|chapter| {
                let mut track = TrackSource::new(
                    format!("{} ({})", chapter.title, self.title),
                    url.clone(),
                    SourceType::YouTube,
                )
                .with_offset(Duration::from_secs_f64(chapter.start_time.max(0.0)))
                .with_duration(Duration::from_secs_f64(chapter.end_time - chapter.start_time));

                if let Some(artist) = self.uploader.as_ref().or(self.channel.as_ref()) {
                    track = track.with_artist(artist.clone());
                }
                if let Some(thumbnail) = &self.thumbnail {
                    track = track.with_thumbnail(thumbnail.clone());
                }
                track
            })
            .collect()
    }
}

impl YouTubeClient {
    pub fn new(ytdlp: impl Into<String>, timeout: Duration, lookup_concurrency: usize) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            timeout,
            // Limitar procesos concurrentes para evitar rate limiting
            rate_limiter: Semaphore::new(3),
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Runs yt-dlp and returns stdout, or `None` when the target is missing.
    async fn run(&self, args: &[&str]) -> Result<Option<String>> {
        // Waiting for a free process slot counts against the timeout too.
        let output = tokio::time::timeout(self.timeout, async {
            let _permit = self.rate_limiter.acquire().await?;
            let output = Command::new(&self.ytdlp)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .context("Error al ejecutar yt-dlp")?;
            anyhow::Ok(output)
        })
        .await
        .with_context(|| format!("yt-dlp timed out after {:?}", self.timeout))??;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            debug!("yt-dlp reports missing target: {}", stderr.trim());
            return Ok(None);
        }

        anyhow::bail!("yt-dlp error: {}", stderr.trim())
    }

    fn parse_lines(stdout: &str) -> Vec<YtDlpInfo> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Línea de yt-dlp ignorada: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.ytdlp)
            .arg("--version")
            .output()
            .await
            .context("yt-dlp no está disponible")?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp no puede ejecutarse correctamente");
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[async_trait]
impl VideoProvider for YouTubeClient {
    async fn video(&self, url: &str, split_chapters: bool) -> Result<Vec<TrackSource>> {
        debug!("📊 Obteniendo info de: {}", url);

        let Some(stdout) = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", url])
            .await?
        else {
            return Ok(Vec::new());
        };

        Ok(Self::parse_lines(&stdout)
            .into_iter()
            .next()
            .map(|info| info.into_tracks(split_chapters))
            .unwrap_or_default())
    }

    async fn playlist(&self, list_id: &str, split_chapters: bool) -> Result<Vec<TrackSource>> {
        info!("📋 Obteniendo playlist: {}", list_id);

        let url = format!("https://www.youtube.com/playlist?list={}", list_id);
        let Some(stdout) = self
            .run(&["--flat-playlist", "--dump-json", "--no-warnings", &url])
            .await?
        else {
            return Ok(Vec::new());
        };

        let entries = Self::parse_lines(&stdout);
        if !split_chapters {
            return Ok(entries.into_iter().map(YtDlpInfo::into_track).collect());
        }

        // Flat entries carry no chapters; look each video up again.
        let urls: Vec<String> = entries.iter().map(YtDlpInfo::page_url).collect();
        let per_video: Vec<Result<Vec<TrackSource>>> = stream::iter(urls)
            .map(|url| async move { self.video(&url, true).await })
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut tracks = Vec::new();
        for (entry, result) in entries.into_iter().zip(per_video) {
            match result {
                Ok(found) if !found.is_empty() => tracks.extend(found),
                Ok(_) => warn!("Video de playlist no disponible: {}", entry.title),
                Err(e) => {
                    warn!("No se pudieron obtener capítulos de {}: {:?}", entry.title, e);
                    tracks.push(entry.into_track());
                }
            }
        }

        Ok(tracks)
    }

    async fn search(&self, query: &str, split_chapters: bool) -> Result<Vec<TrackSource>> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let Some(stdout) = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", &search_query])
            .await?
        else {
            return Ok(Vec::new());
        };

        Ok(Self::parse_lines(&stdout)
            .into_iter()
            .next()
            .map(|info| info.into_tracks(split_chapters))
            .unwrap_or_default())
    }
}
