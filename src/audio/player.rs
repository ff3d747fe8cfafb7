use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    queue::{MusicQueue, QueueItem},
    voice::{VoiceConnection, VoiceGateway},
};
use crate::error::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Connected or not, nothing playing.
    Idle,
    Playing,
    /// Connected, current item retained but not advancing.
    Paused,
}

/// Playback state for one guild.
///
/// Invariant: `Playing` implies a voice connection and a current item.
pub struct Player {
    guild_id: GuildId,
    gateway: Arc<dyn VoiceGateway>,
    queue: MusicQueue,
    current: Option<QueueItem>,
    status: PlayerStatus,
    connection: Option<Arc<dyn VoiceConnection>>,
    /// Bumped on every track start and every cut; stale end events are ignored.
    serial: u64,
}

impl Player {
    pub fn new(guild_id: GuildId, gateway: Arc<dyn VoiceGateway>, max_queue_size: usize) -> Self {
        Self {
            guild_id,
            gateway,
            queue: MusicQueue::new(max_queue_size),
            current: None,
            status: PlayerStatus::Idle,
            connection: None,
            serial: 0,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &MusicQueue {
        &self.queue
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.connection.as_ref().map(|c| c.channel_id())
    }

    /// Inserts a block of items at the front or the back, keeping its order.
    pub fn add(&mut self, items: Vec<QueueItem>, immediate: bool) -> usize {
        if immediate {
            self.queue.prepend(items)
        } else {
            self.queue.append(items)
        }
    }

    pub async fn connect(&mut self, channel_id: ChannelId) -> Result<(), PlayerError> {
        if self.voice_channel() == Some(channel_id) {
            return Ok(());
        }

        let connection = self.gateway.join(self.guild_id, channel_id).await?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Starts or resumes playback. Safe to call while already playing.
    pub async fn play(&mut self) -> Result<(), PlayerError> {
        match self.status {
            PlayerStatus::Playing => {
                debug!("play() ignorado, ya reproduciendo en guild {}", self.guild_id);
                return Ok(());
            }
            PlayerStatus::Paused => return self.resume().await,
            PlayerStatus::Idle => {}
        }

        let connection = self.connection.clone().ok_or(PlayerError::NotConnected)?;
        let item = match self.current.take() {
            Some(item) => item,
            None => self.queue.pop_front().ok_or(PlayerError::QueueEmpty)?,
        };

        self.start(connection, item).await
    }

    pub async fn pause(&mut self) -> Result<(), PlayerError> {
        if self.status != PlayerStatus::Playing {
            return Err(PlayerError::NotPlaying);
        }

        let connection = self.connection.clone().ok_or(PlayerError::NotConnected)?;
        connection.pause().await?;
        self.status = PlayerStatus::Paused;
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), PlayerError> {
        if self.status != PlayerStatus::Paused {
            return Err(PlayerError::NotPlaying);
        }

        let connection = self.connection.clone().ok_or(PlayerError::NotConnected)?;
        connection.resume().await?;
        self.status = PlayerStatus::Playing;
        Ok(())
    }

    /// Stops playback and forgets the current item; the queue is kept.
    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        self.cut().await?;
        self.current = None;
        self.status = PlayerStatus::Idle;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(())
    }

    /// Skips `amount` items ahead (at least one). Skipping exactly past the
    /// last item stops playback; skipping further than that is an error and
    /// leaves everything untouched.
    pub async fn forward(&mut self, amount: usize) -> Result<(), PlayerError> {
        let amount = amount.max(1);
        let available = self.queue.len() + usize::from(self.current.is_some());
        if amount > available {
            return Err(PlayerError::NoNextItem);
        }

        self.queue.skip(amount - 1);

        match (self.queue.pop_front(), self.connection.clone()) {
            (Some(next), Some(connection)) => self.start(connection, next).await,
            (Some(next), None) => {
                self.current = Some(next);
                self.status = PlayerStatus::Idle;
                Ok(())
            }
            (None, _) => {
                info!("📭 Cola terminada en guild {}", self.guild_id);
                self.stop().await
            }
        }
    }

    /// Drops every pending item; the current one is untouched.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn shuffle(&mut self) -> Result<(), PlayerError> {
        if self.queue.shuffle() {
            Ok(())
        } else {
            Err(PlayerError::NotEnoughSongs)
        }
    }

    /// Advances after the voice layer reports the end of track `serial`.
    pub async fn on_track_end(&mut self, serial: u64) {
        if serial != self.serial || self.status != PlayerStatus::Playing {
            debug!("Fin de track {} ignorado en guild {}", serial, self.guild_id);
            return;
        }

        self.current = None;
        self.status = PlayerStatus::Idle;

        let Some(connection) = self.connection.clone() else {
            return;
        };

        // Unplayable items are dropped so one bad entry doesn't stall the queue.
        while let Some(next) = self.queue.pop_front() {
            match self.start(connection.clone(), next).await {
                Ok(()) => return,
                Err(e) => warn!("Saltando track que no se pudo reproducir: {}", e),
            }
        }

        info!("📭 Cola vacía, no hay siguiente track en guild {}", self.guild_id);
    }

    /// The voice session vanished underneath us (kicked, channel deleted).
    /// The current item is kept so the next add can resume it.
    pub fn connection_lost(&mut self) {
        self.connection = None;
        self.serial += 1;
        self.status = PlayerStatus::Idle;
        info!("🔌 Conexión de voz perdida en guild {}", self.guild_id);
    }

    pub async fn disconnect(&mut self) -> Result<(), PlayerError> {
        if let Some(connection) = self.connection.clone() {
            connection.leave().await?;
        }
        self.connection_lost();
        Ok(())
    }

    async fn start(&mut self, connection: Arc<dyn VoiceConnection>, item: QueueItem) -> Result<(), PlayerError> {
        self.serial += 1;

        if let Err(e) = connection.play(&item, self.serial).await {
            self.current = None;
            self.status = PlayerStatus::Idle;
            return Err(e.into());
        }

        self.current = Some(item);
        self.status = PlayerStatus::Playing;
        Ok(())
    }

    async fn cut(&mut self) -> Result<(), PlayerError> {
        self.serial += 1;
        if let Some(connection) = self.connection.clone() {
            connection.stop().await?;
        }
        Ok(())
    }
}
