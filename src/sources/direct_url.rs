use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

use super::{SourceType, StreamProvider, TrackSource};

/// Cliente de URL directa (radios, HLS, archivos de audio)
pub struct DirectUrlClient {
    client: reqwest::Client,
}

impl DirectUrlClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Headers are enough; the timeout only covers connect + response head.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("No se pudo crear el cliente HTTP")?;

        Ok(Self { client })
    }
}

/// Whether a response content type can be fed to the decoder.
fn is_playable(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("audio/")
        || mime.starts_with("video/")
        || mime.contains("mpegurl")
        || mime == "application/ogg"
        || mime == "application/octet-stream"
}

fn stream_title(headers: &HeaderMap, url: &str) -> String {
    headers
        .get("icy-name")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

/// Radio servers (icy headers), HLS playlists and bodies of unknown length
/// are streams; anything else is a finite file.
fn is_live(headers: &HeaderMap, content_type: &str) -> bool {
    headers.keys().any(|name| name.as_str().starts_with("icy-"))
        || content_type.to_ascii_lowercase().contains("mpegurl")
        || !headers.contains_key(CONTENT_LENGTH)
}

#[async_trait]
impl StreamProvider for DirectUrlClient {
    async fn live_stream(&self, url: &str) -> Result<Option<TrackSource>> {
        info!("📻 Comprobando stream: {}", url);

        let response = self
            .client
            .get(url)
            .header("Icy-MetaData", "1")
            .send()
            .await
            .with_context(|| format!("No se pudo abrir {}", url))?;

        if !response.status().is_success() {
            debug!("Stream respondió {}", response.status());
            return Ok(None);
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if !is_playable(content_type) {
            debug!("Content-Type no reproducible para {}", url);
            return Ok(None);
        }

        let track = TrackSource::new(stream_title(headers, url), url, SourceType::DirectUrl);
        if is_live(headers, content_type) {
            return Ok(Some(track.live()));
        }
        debug!("{} es un archivo de audio, no un stream", url);
        Ok(Some(track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn accepts_audio_content_types() {
        assert!(is_playable("audio/mpeg"));
        assert!(is_playable("Audio/AAC; charset=binary"));
        assert!(is_playable("application/vnd.apple.mpegurl"));
        assert!(is_playable("application/ogg"));
        assert!(!is_playable("text/html; charset=utf-8"));
        assert!(!is_playable("application/json"));
    }

    #[test]
    fn only_streams_are_live() {
        let mut file = HeaderMap::new();
        file.insert(CONTENT_LENGTH, HeaderValue::from_static("4096000"));
        assert!(!is_live(&file, "audio/mpeg"));
        assert!(is_live(&file, "application/vnd.apple.mpegurl"));

        assert!(is_live(&HeaderMap::new(), "audio/mpeg"));

        let mut radio = file.clone();
        radio.insert("icy-br", HeaderValue::from_static("128"));
        assert!(is_live(&radio, "audio/mpeg"));
    }

    #[test]
    fn title_prefers_icy_name() {
        let mut headers = HeaderMap::new();
        assert_eq!(stream_title(&headers, "https://radio.example/live"), "https://radio.example/live");

        headers.insert("icy-name", HeaderValue::from_static(" Jazz FM "));
        assert_eq!(stream_title(&headers, "https://radio.example/live"), "Jazz FM");
    }
}
