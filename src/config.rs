use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo
    pub command_prefix: String,

    // Cola
    pub default_playlist_limit: usize,
    pub max_queue_size: usize,

    // Paths
    pub data_dir: PathBuf,
    pub ytdlp_path: String,

    // APIs (Opcionales)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Proveedores
    pub provider_timeout: Duration,
    pub catalog_lookup_concurrency: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),

            // Cola
            default_playlist_limit: std::env::var("DEFAULT_PLAYLIST_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),

            // APIs
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),

            // Proveedores
            provider_timeout: humantime::parse_duration(
                &std::env::var("PROVIDER_TIMEOUT").unwrap_or_else(|_| "30s".to_string()),
            )
            .context("PROVIDER_TIMEOUT inválido")?,
            catalog_lookup_concurrency: std::env::var("CATALOG_LOOKUP_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Credentials for the Spotify client, only when both halves are set.
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }

    /// Sanity checks on limits and timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.default_playlist_limit == 0 {
            anyhow::bail!("Default playlist limit must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.provider_timeout.is_zero() {
            anyhow::bail!("Provider timeout must be greater than 0");
        }

        if self.catalog_lookup_concurrency == 0 {
            anyhow::bail!("Catalog lookup concurrency must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}), prefix {:?}\n  \
            Queue: {} max items, {} songs per playlist\n  \
            Providers: {} ({} timeout, {} parallel lookups), Spotify={}\n  \
            Data: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.command_prefix,
            self.max_queue_size,
            self.default_playlist_limit,
            self.ytdlp_path,
            humantime::format_duration(self.provider_timeout),
            self.catalog_lookup_concurrency,
            self.spotify_credentials().is_some(),
            self.data_dir.display(),
        )
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            command_prefix: "!".to_string(),

            default_playlist_limit: 50,
            max_queue_size: 1000,

            data_dir: "./data".into(),
            ytdlp_path: "yt-dlp".to_string(),

            spotify_client_id: None,
            spotify_client_secret: None,

            provider_timeout: Duration::from_secs(30),
            catalog_lookup_concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_limits() {
        let config = Config {
            default_playlist_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            provider_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            catalog_lookup_concurrency: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn spotify_needs_both_credentials() {
        let mut config = Config {
            spotify_client_id: Some("id".into()),
            ..Config::default()
        };
        assert_eq!(config.spotify_credentials(), None);

        config.spotify_client_secret = Some("secret".into());
        assert_eq!(
            config.spotify_credentials(),
            Some(("id".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn summary_hides_secrets() {
        let config = Config {
            discord_token: "super-secret-token".into(),
            spotify_client_secret: Some("hidden".into()),
            ..Config::default()
        };
        let summary = config.summary();

        assert!(!summary.contains("super-secret-token"));
        assert!(!summary.contains("hidden"));
        assert!(summary.contains("30s"));
    }
}
