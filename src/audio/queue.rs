use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serenity::model::id::{ChannelId, UserId};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info, warn};

use crate::sources::TrackSource;

/// A resolved track waiting in (or playing from) a guild queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub source: TrackSource,
    pub requested_by: UserId,
    /// Text channel the request came from.
    pub added_in_channel: ChannelId,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(source: TrackSource, requested_by: UserId, added_in_channel: ChannelId) -> Self {
        Self {
            source,
            requested_by,
            added_in_channel,
            added_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        self.source.title()
    }
}

/// Pending tracks for one guild, in playback order.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    fn available(&self) -> usize {
        self.max_size.saturating_sub(self.items.len())
    }

    /// Agrega tracks al final, conservando su orden. Devuelve cuántos entraron.
    pub fn append(&mut self, items: Vec<QueueItem>) -> usize {
        let offered = items.len();
        let to_add = offered.min(self.available());
        self.items.extend(items.into_iter().take(to_add));

        if to_add < offered {
            warn!("La cola está llena (máximo {} canciones), {} descartadas", self.max_size, offered - to_add);
        }
        info!("➕ Agregadas {} canciones a la cola", to_add);
        to_add
    }

    /// Inserta tracks delante de todo lo pendiente, conservando su orden.
    pub fn prepend(&mut self, items: Vec<QueueItem>) -> usize {
        let offered = items.len();
        let to_add = offered.min(self.available());

        for item in items.into_iter().take(to_add).rev() {
            self.items.push_front(item);
        }

        if to_add < offered {
            warn!("La cola está llena (máximo {} canciones), {} descartadas", self.max_size, offered - to_add);
        }
        info!("⏫ Agregadas {} canciones al frente de la cola", to_add);
        to_add
    }

    /// Saca el siguiente track (FIFO)
    pub fn pop_front(&mut self) -> Option<QueueItem> {
        let next = self.items.pop_front();
        if let Some(item) = &next {
            debug!("➡️ Siguiente en cola: {}", item.title());
        }
        next
    }

    /// Descarta `amount` tracks del frente y devuelve cuántos se descartaron.
    pub fn skip(&mut self, amount: usize) -> usize {
        let skipped = amount.min(self.items.len());
        self.items.drain(..skipped);
        skipped
    }

    /// Mezcla la cola. Devuelve `false` si no hay suficientes tracks.
    pub fn shuffle(&mut self) -> bool {
        if self.items.len() < 2 {
            return false;
        }

        self.items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada");
        true
    }

    /// Whether a track with this URL is already waiting.
    pub fn contains(&self, url: &str) -> bool {
        self.items.iter().any(|item| item.source.url() == url)
    }

    pub fn clear(&mut self) {
        let dropped = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada ({} canciones)", dropped);
    }

    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.source.duration()).sum()
    }
}
