//! Voice transport seam.
//!
//! [`Player`](super::player::Player) only talks to [`VoiceGateway`] and
//! [`VoiceConnection`]; the songbird-backed implementation lives here too.
//! End-of-track notifications travel back as [`PlayerEvent`]s over a channel
//! so the voice driver never has to lock a player itself.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, error, info, warn};

use super::queue::QueueItem;
use crate::sources::SourceType;

/// Notifications from the voice layer to the player registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The track started with `serial` finished, errored or was cut.
    TrackEnded { guild_id: GuildId, serial: u64 },
}

/// An established voice session in one channel.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Replaces whatever is playing with `item`. `serial` is echoed back in
    /// the [`PlayerEvent::TrackEnded`] for this track.
    async fn play(&self, item: &QueueItem, serial: u64) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn leave(&self) -> Result<()>;
}

/// Opens voice sessions.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>>;
}

pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    events: UnboundedSender<PlayerEvent>,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>, events: UnboundedSender<PlayerEvent>) -> Self {
        Self {
            songbird,
            http: reqwest::Client::new(),
            events,
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                anyhow::anyhow!("Error al conectar al canal de voz")
            })?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            channel_id,
            call,
            songbird: self.songbird.clone(),
            http: self.http.clone(),
            events: self.events.clone(),
            current: SyncMutex::new(None),
        }))
    }
}

struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    events: UnboundedSender<PlayerEvent>,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn input_for(&self, item: &QueueItem) -> Input {
        let url = item.source.url().to_string();
        match item.source.source_type() {
            SourceType::YouTube => YoutubeDl::new(self.http.clone(), url).into(),
            SourceType::DirectUrl => HttpRequest::new(self.http.clone(), url).into(),
        }
    }

    fn notifier(&self, serial: u64) -> TrackEndNotifier {
        TrackEndNotifier {
            guild_id: self.guild_id,
            serial,
            events: self.events.clone(),
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(&self, item: &QueueItem, serial: u64) -> Result<()> {
        info!("🎵 Reproduciendo: {}", item.title());

        let input = self.input_for(item);
        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play_input(input)
        };

        handle
            .add_event(Event::Track(TrackEvent::End), self.notifier(serial))
            .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), self.notifier(serial))
            .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;

        // Chapters: start at the offset, cut after the chapter length.
        if let Some(offset) = item.source.offset() {
            let seeking = handle.clone();
            let title = item.title().to_string();
            // Seeking waits for the input to become ready, so it must not hold up play().
            tokio::spawn(async move {
                if let Err(e) = seeking.seek_async(offset).await {
                    warn!("No se pudo saltar al capítulo {}: {:?}", title, e);
                }
            });
            if let Some(length) = item.source.duration() {
                handle
                    .add_event(Event::Delayed(length), ChapterEnd { handle: handle.clone() })
                    .map_err(|e| anyhow::anyhow!("Error al programar fin de capítulo: {}", e))?;
            }
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(track) = self.current.lock().take() {
            let _ = track.stop();
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if let Some(track) = self.current.lock().as_ref() {
            track.pause()?;
        }
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        if let Some(track) = self.current.lock().as_ref() {
            track.play()?;
        }
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        self.stop().await?;
        self.songbird.remove(self.guild_id).await?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Reports the end of a track back to the registry.
struct TrackEndNotifier {
    guild_id: GuildId,
    serial: u64,
    events: UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track {} terminado en guild {}", self.serial, self.guild_id);

        let _ = self.events.send(PlayerEvent::TrackEnded {
            guild_id: self.guild_id,
            serial: self.serial,
        });

        None
    }
}

struct ChapterEnd {
    handle: TrackHandle,
}

#[async_trait]
impl VoiceEventHandler for ChapterEnd {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let _ = self.handle.stop();
        None
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory voice layer recording every call.

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeGateway {
        pub log: Arc<SyncMutex<Vec<String>>>,
        pub fail_join: bool,
    }

    impl FakeGateway {
        pub fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    #[async_trait]
    impl VoiceGateway for FakeGateway {
        async fn join(&self, _guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
            if self.fail_join {
                anyhow::bail!("missing permissions");
            }
            self.log.lock().push(format!("join:{}", channel_id));
            Ok(Arc::new(FakeConnection {
                channel_id,
                log: self.log.clone(),
            }))
        }
    }

    pub(crate) struct FakeConnection {
        channel_id: ChannelId,
        log: Arc<SyncMutex<Vec<String>>>,
    }

    #[async_trait]
    impl VoiceConnection for FakeConnection {
        fn channel_id(&self) -> ChannelId {
            self.channel_id
        }

        async fn play(&self, item: &QueueItem, serial: u64) -> Result<()> {
            if item.title().starts_with("broken") {
                anyhow::bail!("no audio for {}", item.title());
            }
            self.log.lock().push(format!("play:{}#{}", item.title(), serial));
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.log.lock().push("stop".into());
            Ok(())
        }

        async fn pause(&self) -> Result<()> {
            self.log.lock().push("pause".into());
            Ok(())
        }

        async fn resume(&self) -> Result<()> {
            self.log.lock().push("resume".into());
            Ok(())
        }

        async fn leave(&self) -> Result<()> {
            self.log.lock().push("leave".into());
            Ok(())
        }
    }
}
