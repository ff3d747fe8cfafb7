//! The add-to-queue use case: resolve a query, insert the results and drive
//! the guild's player into playback.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    manager::PlayerManager,
    player::PlayerStatus,
    queue::QueueItem,
};
use crate::{
    bot::channels::VoiceSnapshot,
    error::QueueError,
    sources::{ResolveOptions, SourceResolver},
    storage::JsonStorage,
};

#[derive(Debug, Clone)]
pub struct AddRequest<'a> {
    pub guild_id: GuildId,
    pub requested_by: UserId,
    /// Text channel the request was made in.
    pub text_channel: ChannelId,
    pub query: &'a str,
    pub add_to_front: bool,
    pub shuffle_additions: bool,
    pub split_chapters: bool,
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub summary: String,
    /// Set when this call started playback on a fresh connection.
    pub now_playing: Option<QueueItem>,
    pub queue_len: usize,
}

impl AddOutcome {
    pub fn show_now_playing(&self) -> bool {
        self.now_playing.is_some()
    }
}

pub struct QueueOrchestrator {
    resolver: Arc<SourceResolver>,
    players: Arc<PlayerManager>,
    storage: Arc<JsonStorage>,
}

impl QueueOrchestrator {
    pub fn new(
        resolver: Arc<SourceResolver>,
        players: Arc<PlayerManager>,
        storage: Arc<JsonStorage>,
    ) -> Self {
        Self {
            resolver,
            players,
            storage,
        }
    }

    pub fn players(&self) -> &Arc<PlayerManager> {
        &self.players
    }

    pub async fn add_to_queue(
        &self,
        request: AddRequest<'_>,
        voice: &VoiceSnapshot,
    ) -> Result<AddOutcome, QueueError> {
        let destination = voice.destination().ok_or(QueueError::NoVoiceChannel)?;
        let player = self.players.get(request.guild_id);
        let was_playing = player.lock().await.current().is_some();

        let settings = self
            .storage
            .get_guild_settings(request.guild_id)
            .await
            .map_err(QueueError::Settings)?;

        // Nothing is mutated until resolution has fully succeeded.
        let resolution = self
            .resolver
            .resolve(
                request.query,
                ResolveOptions {
                    split_chapters: request.split_chapters,
                    playlist_limit: settings.playlist_limit,
                    shuffle: request.shuffle_additions,
                },
            )
            .await?;

        let items: Vec<QueueItem> = resolution
            .tracks
            .into_iter()
            .map(|track| QueueItem::new(track, request.requested_by, request.text_channel))
            .collect();
        let resolved = items.len();
        let first_title = items
            .first()
            .map(|item| item.title().to_string())
            .unwrap_or_default();

        let mut player = player.lock().await;
        for item in items.iter().filter(|item| player.queue().contains(item.source.url())) {
            debug!("{} ya estaba en la cola de guild {}", item.title(), request.guild_id);
        }

        // Both insertions keep the leading items, so `first_title` is queued
        // whenever anything is.
        let count = player.add(items, request.add_to_front);
        if count == 0 {
            return Err(QueueError::QueueFull);
        }
        let overflow = match resolved - count {
            0 => String::new(),
            1 => "1 song didn't fit in the queue".to_string(),
            n => format!("{} songs didn't fit in the queue", n),
        };

        let mut status_note = "";
        let mut now_playing = None;

        if !player.is_connected() {
            player.connect(destination).await?;
            player.play().await?;

            if was_playing {
                status_note = "resuming playback";
            }
            now_playing = player.current().cloned();
        } else if player.status() == PlayerStatus::Idle {
            player.play().await?;
        }

        info!(
            "🎶 {} canciones agregadas en guild {} (estado {:?})",
            count,
            request.guild_id,
            player.status()
        );

        let note = compose_note(&[status_note, resolution.note.as_str(), overflow.as_str()]);
        Ok(AddOutcome {
            summary: summary(&first_title, count, request.add_to_front, &note),
            now_playing,
            queue_len: player.queue().len(),
        })
    }
}

/// Joins the non-empty notes and wraps them as ` (<note>)`.
fn compose_note(parts: &[&str]) -> String {
    let parts: Vec<&str> = parts.iter().copied().filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    format!(" ({})", parts.join(", "))
}

fn summary(first_title: &str, count: usize, add_to_front: bool, note: &str) -> String {
    if count == 1 {
        let front = if add_to_front { " front of the" } else { "" };
        format!("{} added to the{} queue{}", first_title, front, note)
    } else {
        format!(
            "{} and {} other songs were added to the queue{}",
            first_title,
            count - 1,
            note
        )
    }
}
