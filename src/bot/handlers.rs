use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        channel::{Message, ReactionType},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use super::{channels::VoiceSnapshot, commands::MessageCommand, JukeboxBot};
use crate::{
    audio::{AddRequest, PlayerStatus},
    error::QueueError,
    ui::embeds,
};

const WORKING_REACTION: &str = "🧑‍💻";

/// Maneja mensajes de texto con prefijo o links sueltos
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let Some(command) = MessageCommand::parse(&msg.content, &bot.config.command_prefix) else {
        return Ok(());
    };

    info!(
        "💬 Comando {:?} usado por {} en guild {}",
        command, msg.author.name, guild_id
    );

    let (content, extra) = match command {
        MessageCommand::Play { query } => add_from_message(ctx, msg, bot, guild_id, &query, false).await?,
        MessageCommand::BumpPlay { query } => add_from_message(ctx, msg, bot, guild_id, &query, true).await?,
        MessageCommand::Skip => skip(bot, guild_id, 1).await,
        MessageCommand::Stop => (stop(bot, guild_id).await, Vec::new()),
        MessageCommand::Shuffle => (shuffle(bot, guild_id).await, Vec::new()),
    };

    msg.channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .content(content)
                .embeds(extra)
                .reference_message(msg),
        )
        .await?;

    Ok(())
}

async fn add_from_message(
    ctx: &Context,
    msg: &Message,
    bot: &JukeboxBot,
    guild_id: GuildId,
    query: &str,
    add_to_front: bool,
) -> Result<(String, Vec<CreateEmbed>)> {
    let reaction = msg
        .react(&ctx.http, ReactionType::Unicode(WORKING_REACTION.to_string()))
        .await;
    let typing = msg.channel_id.start_typing(&ctx.http);

    let voice = voice_snapshot(ctx, guild_id, msg.author.id);
    let reply = add(bot, guild_id, msg.author.id, msg.channel_id, query, add_to_front, false, false, &voice).await;

    typing.stop();
    match reaction {
        Ok(reaction) => {
            if let Err(e) = reaction.delete(ctx).await {
                warn!("No se pudo quitar la reacción: {:?}", e);
            }
        }
        Err(e) => warn!("No se pudo reaccionar al mensaje: {:?}", e),
    }

    Ok(reply)
}

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => return handle_play(ctx, command, bot, guild_id).await,
        "skip" => {
            let amount = option_i64(&command, "amount").unwrap_or(1).max(1) as usize;
            let (content, now_playing) = skip(bot, guild_id, amount).await;
            respond(ctx, &command, content, now_playing).await?;
        }
        "stop" => respond(ctx, &command, stop(bot, guild_id).await, Vec::new()).await?,
        "shuffle" => respond(ctx, &command, shuffle(bot, guild_id).await, Vec::new()).await?,
        "pause" => respond(ctx, &command, pause(bot, guild_id).await, Vec::new()).await?,
        "resume" => respond(ctx, &command, resume(bot, guild_id).await, Vec::new()).await?,
        "leave" => respond(ctx, &command, leave(bot, guild_id).await, Vec::new()).await?,
        "playlist-limit" => {
            let limit = option_i64(&command, "limit").unwrap_or(1).max(1) as usize;
            let settings = bot.storage.set_playlist_limit(guild_id, limit).await?;
            let content = format!("playlist limit set to {}", settings.playlist_limit);
            respond(ctx, &command, content, Vec::new()).await?;
        }
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice = voice_snapshot(ctx, guild_id, command.user.id);
    let (content, extra) = add(
        bot,
        guild_id,
        command.user.id,
        command.channel_id,
        &query,
        option_bool(&command, "immediate"),
        option_bool(&command, "shuffle"),
        option_bool(&command, "split"),
        &voice,
    )
    .await;

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content).embeds(extra))
        .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn add(
    bot: &JukeboxBot,
    guild_id: GuildId,
    user_id: UserId,
    text_channel: ChannelId,
    query: &str,
    add_to_front: bool,
    shuffle_additions: bool,
    split_chapters: bool,
    voice: &VoiceSnapshot,
) -> (String, Vec<CreateEmbed>) {
    let request = AddRequest {
        guild_id,
        requested_by: user_id,
        text_channel,
        query,
        add_to_front,
        shuffle_additions,
        split_chapters,
    };

    match bot.orchestrator.add_to_queue(request, voice).await {
        Ok(outcome) => {
            info!("📋 {} canciones en cola en guild {}", outcome.queue_len, guild_id);
            let mut extra = Vec::new();
            if outcome.show_now_playing() {
                let player = bot.players().get(guild_id);
                extra.extend(embeds::create_now_playing_embed(&*player.lock().await));
            }
            (outcome.summary, extra)
        }
        Err(e) => {
            log_failure(guild_id, &e);
            (e.to_string(), Vec::new())
        }
    }
}

fn log_failure(guild_id: GuildId, error: &QueueError) {
    match error {
        QueueError::NoVoiceChannel => info!("Sin canal de voz destino en guild {}", guild_id),
        QueueError::QueueFull => info!("📋 Cola llena en guild {}", guild_id),
        other => warn!("❌ Error agregando a la cola en guild {}: {:?}", guild_id, other),
    }
}

async fn skip(bot: &JukeboxBot, guild_id: GuildId, amount: usize) -> (String, Vec<CreateEmbed>) {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    match player.forward(amount).await {
        Ok(()) => {
            let now_playing = embeds::create_now_playing_embed(&player).into_iter().collect();
            ("skipping".to_string(), now_playing)
        }
        Err(e) => (e.to_string(), Vec::new()),
    }
}

async fn stop(bot: &JukeboxBot, guild_id: GuildId) -> String {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    if !player.is_connected() {
        return "not connected".to_string();
    }
    if player.status() != PlayerStatus::Playing {
        return "not currently playing".to_string();
    }

    match player.stop().await {
        Ok(()) => "stopped".to_string(),
        Err(e) => e.to_string(),
    }
}

async fn shuffle(bot: &JukeboxBot, guild_id: GuildId) -> String {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    match player.shuffle() {
        Ok(()) => "shuffled".to_string(),
        Err(e) => e.to_string(),
    }
}

async fn pause(bot: &JukeboxBot, guild_id: GuildId) -> String {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    match player.pause().await {
        Ok(()) => "paused".to_string(),
        Err(e) => e.to_string(),
    }
}

async fn resume(bot: &JukeboxBot, guild_id: GuildId) -> String {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    match player.resume().await {
        Ok(()) => "resumed".to_string(),
        Err(e) => e.to_string(),
    }
}

async fn leave(bot: &JukeboxBot, guild_id: GuildId) -> String {
    let player = bot.players().get(guild_id);
    let mut player = player.lock().await;

    if !player.is_connected() {
        return "not connected".to_string();
    }
    if player.current().is_some() {
        if let Err(e) = player.stop().await {
            warn!("Error al detener antes de salir: {:?}", e);
        }
    }
    player.clear_queue();

    match player.disconnect().await {
        Ok(()) => "disconnected".to_string(),
        Err(e) => e.to_string(),
    }
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: String,
    extra: Vec<CreateEmbed>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .embeds(extra),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

fn voice_snapshot(ctx: &Context, guild_id: GuildId, user_id: UserId) -> VoiceSnapshot {
    match guild_id.to_guild_cached(&ctx.cache) {
        Some(guild) => VoiceSnapshot::from_guild(&guild, user_id),
        None => {
            warn!("Guild {} no encontrada en caché", guild_id);
            VoiceSnapshot::default()
        }
    }
}

fn option_bool(command: &CommandInteraction, name: &str) -> bool {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
        .unwrap_or(false)
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}
