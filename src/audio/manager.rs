use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tracing::{debug, info};

use super::{
    player::Player,
    voice::{PlayerEvent, VoiceGateway},
};

/// Registry owning one [`Player`] per guild.
///
/// Each player sits behind its own async mutex, which is what serialises
/// mutations for a guild; different guilds never contend.
pub struct PlayerManager {
    players: DashMap<GuildId, Arc<Mutex<Player>>>,
    gateway: Arc<dyn VoiceGateway>,
    max_queue_size: usize,
}

impl PlayerManager {
    pub fn new(gateway: Arc<dyn VoiceGateway>, max_queue_size: usize) -> Self {
        Self {
            players: DashMap::new(),
            gateway,
            max_queue_size,
        }
    }

    /// Returns the guild's player, creating it on first access.
    pub fn get(&self, guild_id: GuildId) -> Arc<Mutex<Player>> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creando player para guild {}", guild_id);
                Arc::new(Mutex::new(Player::new(
                    guild_id,
                    self.gateway.clone(),
                    self.max_queue_size,
                )))
            })
            .clone()
    }

    /// Returns the guild's player only if it already exists.
    pub fn existing(&self, guild_id: GuildId) -> Option<Arc<Mutex<Player>>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    pub async fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::TrackEnded { guild_id, serial } => {
                if let Some(player) = self.existing(guild_id) {
                    player.lock().await.on_track_end(serial).await;
                }
            }
        }
    }

    /// Consumes voice events until every sender is gone.
    ///
    /// Each event gets its own task so a guild holding its player lock (for
    /// example while resolving a long playlist) never delays another guild.
    /// Events for the same guild may run out of order; stale ones are
    /// rejected by the player's serial check.
    pub async fn run_events(self: Arc<Self>, mut events: UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = events.recv().await {
            let manager = self.clone();
            tokio::spawn(async move { manager.handle_event(event).await });
        }
        info!("Canal de eventos de voz cerrado");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{player::PlayerStatus, queue::tests::item, voice::fake::FakeGateway};
    use serenity::model::id::ChannelId;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn playing(manager: &PlayerManager, guild: GuildId, titles: &[&str]) {
        let player = manager.get(guild);
        let mut player = player.lock().await;
        player.add(titles.iter().map(|t| item(t)).collect(), false);
        player.connect(ChannelId::new(5)).await.unwrap();
        player.play().await.unwrap();
    }

    async fn current_title(manager: &PlayerManager, guild: GuildId) -> Option<String> {
        manager.get(guild).lock().await.current().map(|i| i.title().to_string())
    }

    /// Polls until the guild's current item is `expected`.
    async fn wait_for_current(manager: &PlayerManager, guild: GuildId, expected: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while current_title(manager, guild).await.as_deref() != Some(expected) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("guild {} never reached {}", guild, expected));
    }

    #[tokio::test]
    async fn creates_once_per_guild() {
        let manager = PlayerManager::new(Arc::new(FakeGateway::default()), 10);

        let a = manager.get(GuildId::new(1));
        let b = manager.get(GuildId::new(1));
        let c = manager.get(GuildId::new(2));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(manager.existing(GuildId::new(3)).is_none());
    }

    #[tokio::test]
    async fn track_end_events_advance_the_right_guild() {
        let manager = Arc::new(PlayerManager::new(Arc::new(FakeGateway::default()), 10));
        let guild = GuildId::new(1);
        playing(&manager, guild, &["a", "b"]).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(manager.clone().run_events(rx));

        tx.send(PlayerEvent::TrackEnded { guild_id: GuildId::new(9), serial: 1 }).unwrap();
        tx.send(PlayerEvent::TrackEnded { guild_id: guild, serial: 1 }).unwrap();
        drop(tx);
        worker.await.unwrap();

        wait_for_current(&manager, guild, "b").await;
        assert_eq!(manager.get(guild).lock().await.status(), PlayerStatus::Playing);
        assert!(manager.existing(GuildId::new(9)).is_none());
    }

    #[tokio::test]
    async fn busy_guild_does_not_hold_up_others() {
        let manager = Arc::new(PlayerManager::new(Arc::new(FakeGateway::default()), 10));
        let (busy, other) = (GuildId::new(1), GuildId::new(2));
        playing(&manager, busy, &["a", "b"]).await;
        playing(&manager, other, &["x", "y"]).await;

        let busy_player = manager.get(busy);
        let held = busy_player.lock().await;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(manager.clone().run_events(rx));
        tx.send(PlayerEvent::TrackEnded { guild_id: busy, serial: 1 }).unwrap();
        tx.send(PlayerEvent::TrackEnded { guild_id: other, serial: 1 }).unwrap();

        wait_for_current(&manager, other, "y").await;
        assert_eq!(held.current().map(|i| i.title().to_string()), Some("a".into()));

        drop(held);
        wait_for_current(&manager, busy, "b").await;
    }
}
