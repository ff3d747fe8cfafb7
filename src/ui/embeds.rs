use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{Player, PlayerStatus, QueueItem};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Embed for the player's current item, or `None` when nothing is loaded.
pub fn create_now_playing_embed(player: &Player) -> Option<CreateEmbed> {
    let current = player.current()?;
    let title = match player.status() {
        PlayerStatus::Paused => "⏸️ En Pausa",
        _ => "🎵 Reproduciendo Ahora",
    };
    let color = match player.status() {
        PlayerStatus::Paused => colors::WARNING_ORANGE,
        _ => colors::SUCCESS_GREEN,
    };

    Some(
        item_embed(current)
            .title(title)
            .color(color)
            .field("📋 En cola", queue_summary(player), true),
    )
}

fn item_embed(item: &QueueItem) -> CreateEmbed {
    let source = &item.source;
    let mut embed = CreateEmbed::default()
        .description(format!("**{}**", source.title()))
        .field("🎤 Artista", source.artist().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", duration_label(source.duration(), source.is_live()), true)
        .field("👤 Solicitado por", format!("<@{}>", item.requested_by), true)
        .field("🔗 Fuente", source.source_type().as_str(), true);

    if let Some(thumbnail) = source.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    let added_at = Timestamp::from_unix_timestamp(item.added_at.timestamp()).unwrap_or_else(|_| Timestamp::now());
    embed
        .url(source.url())
        .timestamp(added_at)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn queue_summary(player: &Player) -> String {
    if player.is_queue_empty() {
        return "vacía".to_string();
    }

    let queue = player.queue();
    match queue.len() {
        1 => format!("1 canción ({})", format_duration(queue.total_duration())),
        n => format!("{} canciones ({})", n, format_duration(queue.total_duration())),
    }
}

fn duration_label(duration: Option<Duration>, is_live: bool) -> String {
    match duration {
        _ if is_live => "🔴 En vivo".to_string(),
        Some(duration) => format_duration(duration),
        None => "Desconocida".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::tests::item, voice::fake::FakeGateway};
    use serenity::model::id::{ChannelId, GuildId};
    use std::sync::Arc;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(3 * 60 + 7)), "3:07");
        assert_eq!(format_duration(Duration::from_secs(3600 + 62)), "1:01:02");
    }

    #[test]
    fn live_streams_have_no_length() {
        assert_eq!(duration_label(Some(Duration::from_secs(10)), true), "🔴 En vivo");
        assert_eq!(duration_label(None, false), "Desconocida");
        assert_eq!(duration_label(Some(Duration::from_secs(10)), false), "0:10");
    }

    #[tokio::test]
    async fn embed_only_when_something_is_loaded() {
        let mut player = Player::new(GuildId::new(1), Arc::new(FakeGateway::default()), 10);
        assert!(create_now_playing_embed(&player).is_none());

        player.add(vec![item("a"), item("b")], false);
        player.connect(ChannelId::new(5)).await.unwrap();
        player.play().await.unwrap();

        assert!(create_now_playing_embed(&player).is_some());
        assert_eq!(queue_summary(&player), "1 canción (1:00)");
    }
}
