use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

/// Configuración de guild almacenada en JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    /// Maximum number of catalog (Spotify) entries taken from one link.
    pub playlist_limit: usize,
}

/// Manager de almacenamiento basado en archivos JSON, uno por guild.
///
/// Lookups go through a concurrent cache and each guild writes only its own
/// file, so guilds never wait on each other.
pub struct JsonStorage {
    data_dir: PathBuf,
    default_playlist_limit: usize,
    guilds_cache: DashMap<u64, GuildSettings>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf, default_playlist_limit: usize) -> Result<Self> {
        let guilds_dir = data_dir.join("guilds");
        fs::create_dir_all(&guilds_dir)
            .await
            .with_context(|| format!("No se pudo crear {}", guilds_dir.display()))?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let storage = Self {
            data_dir,
            default_playlist_limit,
            guilds_cache: DashMap::new(),
        };

        storage.load_all_guilds().await?;

        Ok(storage)
    }

    /// Obtiene la configuración de una guild, creándola si no existe
    pub async fn get_guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings> {
        let id = guild_id.get();
        if let Some(settings) = self.guilds_cache.get(&id) {
            return Ok(settings.clone());
        }

        let settings = self
            .guilds_cache
            .entry(id)
            .or_insert_with(|| GuildSettings {
                guild_id: id,
                playlist_limit: self.default_playlist_limit,
            })
            .clone();
        self.save_guild_settings(&settings).await?;

        info!("📝 Configuración por defecto creada para guild {}", guild_id);
        Ok(settings)
    }

    pub async fn set_playlist_limit(&self, guild_id: GuildId, limit: usize) -> Result<GuildSettings> {
        let mut settings = self.get_guild_settings(guild_id).await?;
        settings.playlist_limit = limit.clamp(1, 1000);

        self.guilds_cache.insert(settings.guild_id, settings.clone());
        self.save_guild_settings(&settings).await?;

        info!("💾 Límite de playlist de guild {} = {}", guild_id, settings.playlist_limit);
        Ok(settings)
    }

    // Métodos privados

    async fn load_guild_settings(&self, guild_id: u64) -> Result<GuildSettings> {
        let content = fs::read_to_string(self.guild_file_path(guild_id)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_guild_settings(&self, settings: &GuildSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(self.guild_file_path(settings.guild_id), content).await?;
        Ok(())
    }

    async fn load_all_guilds(&self) -> Result<()> {
        let mut files = fs::read_dir(self.data_dir.join("guilds")).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            match self.load_guild_settings(guild_id).await {
                Ok(settings) => {
                    self.guilds_cache.insert(guild_id, settings);
                    loaded_count += 1;
                }
                Err(e) => warn!("Error cargando configuración para guild {}: {}", guild_id, e),
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de guild", loaded_count);
        }

        Ok(())
    }

    fn guild_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("guilds").join(format!("guild_{}.json", guild_id))
    }
}
