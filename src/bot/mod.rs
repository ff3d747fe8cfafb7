//! # Bot Module
//!
//! Discord front end: turns gateway events into calls on the audio layer.
//!
//! - [`commands`]: text command parsing and slash command definitions
//! - [`handlers`]: per-command logic and replies
//! - [`channels`]: voice-channel discovery from the guild cache
//!
//! The [`JukeboxBot`] handler owns no playback state itself; players live in
//! the [`PlayerManager`] shared with the voice event loop.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod channels;
pub mod commands;
pub mod handlers;

use crate::{
    audio::{PlayerManager, QueueOrchestrator},
    config::Config,
    storage::JsonStorage,
};

/// Main Discord event handler.
pub struct JukeboxBot {
    config: Arc<Config>,
    /// Per-guild settings (playlist limit).
    storage: Arc<JsonStorage>,
    orchestrator: Arc<QueueOrchestrator>,
}

impl JukeboxBot {
    pub fn new(
        config: Config,
        storage: Arc<JsonStorage>,
        orchestrator: Arc<QueueOrchestrator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            orchestrator,
        }
    }

    pub fn players(&self) -> &Arc<PlayerManager> {
        self.orchestrator.players()
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set (instant
    /// propagation) or globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("Error manejando mensaje: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Forgets the voice session when the bot is kicked or its channel goes
    /// away. The current song is kept so the next add resumes it.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado en guild {}", guild_id);
        if let Some(player) = self.players().existing(guild_id) {
            player.lock().await.connection_lost();
        }
    }
}
