use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::{voice::SongbirdGateway, PlayerManager, QueueOrchestrator};
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::{DirectUrlClient, SourceResolver, SpotifyClient, YouTubeClient};
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let youtube = Arc::new(YouTubeClient::new(
        config.ytdlp_path.clone(),
        config.provider_timeout,
        config.catalog_lookup_concurrency,
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&youtube).await;
    }

    match youtube.verify().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => warn!("⚠️ yt-dlp no disponible: {:?}", e),
    }

    // Inicializar almacenamiento JSON
    let storage = Arc::new(JsonStorage::new(config.data_dir.clone(), config.default_playlist_limit).await?);

    let spotify = SpotifyClient::new(config.spotify_credentials(), config.provider_timeout)?;
    if config.spotify_credentials().is_none() {
        info!("🟡 Spotify sin credenciales, los links de Spotify fallarán");
    }
    let resolver = Arc::new(SourceResolver::new(
        youtube,
        Arc::new(spotify),
        Arc::new(DirectUrlClient::new(config.provider_timeout)?),
        config.catalog_lookup_concurrency,
    ));

    // Los eventos de fin de track llegan por este canal
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let songbird = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(songbird.clone(), events_tx));
    let players = Arc::new(PlayerManager::new(gateway, config.max_queue_size));
    tokio::spawn(players.clone().run_events(events_rx));

    let orchestrator = Arc::new(QueueOrchestrator::new(resolver, players, storage.clone()));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = JukeboxBot::new(config.clone(), storage, orchestrator);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(youtube: &YouTubeClient) -> Result<()> {
    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    youtube.verify().await?;

    if ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
