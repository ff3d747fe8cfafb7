use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64_ENGINE, Engine};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::{CatalogListing, CatalogProvider, CatalogTrack};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Kind of catalog object a Spotify link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl SpotifyKind {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(Self::Track),
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            "artist" => Some(Self::Artist),
            _ => None,
        }
    }
}

/// Parses `spotify:<kind>:<id>` URIs and `open.spotify.com/<kind>/<id>` links.
pub fn parse_link(link: &str) -> Result<(SpotifyKind, String)> {
    let segments: Vec<String> = if let Some(rest) = link.strip_prefix("spotify:") {
        rest.split(':').map(str::to_string).collect()
    } else {
        let url = Url::parse(link).context("Enlace de Spotify inválido")?;
        url.path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty() && !s.starts_with("intl-"))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    // Legacy `spotify:user:<user>:playlist:<id>` keeps kind/id at the end.
    let [.., kind, id] = segments.as_slice() else {
        anyhow::bail!("Enlace de Spotify incompleto: {}", link);
    };

    let kind = SpotifyKind::from_segment(kind)
        .with_context(|| format!("Tipo de enlace de Spotify no soportado: {}", kind))?;

    Ok((kind, id.clone()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    duration_ms: Option<u64>,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            duration: track.duration_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct TopTracks {
    tracks: Vec<SpotifyTrack>,
}

/// Cliente de la API web de Spotify (solo catálogo)
pub struct SpotifyClient {
    credentials: Option<(String, String)>,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(credentials: Option<(String, String)>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("No se pudo crear el cliente HTTP de Spotify")?;

        Ok(Self {
            credentials,
            client,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .context("Spotify no está configurado")?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.access_token.clone());
        }

        debug!("🔑 Solicitando token de Spotify");
        let auth = B64_ENGINE.encode(format!("{}:{}", client_id, client_secret));
        let response: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Renew a minute early
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        let access_token = response.access_token.clone();
        *cached = Some(CachedToken {
            access_token: response.access_token,
            expires_at: Instant::now() + lifetime,
        });

        Ok(access_token)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Spotify API error: {} - {}", status, error_text);
        }

        Ok(response.json().await?)
    }

    async fn paged<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: Paging<T> = self.get(&url).await?;
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }
}

#[async_trait]
impl CatalogProvider for SpotifyClient {
    async fn catalog(&self, link: &str) -> Result<CatalogListing> {
        let (kind, id) = parse_link(link)?;
        info!("🟢 Obteniendo catálogo de Spotify: {:?} {}", kind, id);

        let tracks: Vec<SpotifyTrack> = match kind {
            SpotifyKind::Track => vec![self.get(&format!("{}/tracks/{}", API_BASE, id)).await?],
            SpotifyKind::Album => {
                self.paged(format!("{}/albums/{}/tracks?limit=50", API_BASE, id))
                    .await?
            }
            SpotifyKind::Playlist => self
                .paged::<PlaylistItem>(format!("{}/playlists/{}/tracks?limit=100", API_BASE, id))
                .await?
                .into_iter()
                .filter_map(|item| item.track)
                .collect(),
            SpotifyKind::Artist => {
                let top: TopTracks = self
                    .get(&format!("{}/artists/{}/top-tracks?market=US", API_BASE, id))
                    .await?;
                top.tracks
            }
        };

        Ok(CatalogListing {
            tracks: tracks.into_iter().map(CatalogTrack::from).collect(),
        })
    }
}
