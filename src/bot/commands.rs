use anyhow::Result;
use regex::Regex;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};
use std::sync::LazyLock;

/// Hosts whose links are queued when dropped into chat on their own.
static SONG_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(www\.youtube\.com|youtu\.be|youtube\.com|open\.spotify\.com)\S*").unwrap()
});

/// Text commands understood in chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageCommand {
    Play { query: String },
    /// Like `Play`, but to the front of the queue.
    BumpPlay { query: String },
    Skip,
    Stop,
    Shuffle,
}

impl MessageCommand {
    /// Parses `<prefix><name> <query>`, or a bare song link which is queued
    /// like `play`.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let content = content.trim();

        if let Some(rest) = content.strip_prefix(prefix) {
            let (name, query) = match rest.split_once(char::is_whitespace) {
                Some((name, query)) => (name, query.trim()),
                None => (rest, ""),
            };

            let command = match name {
                "play" => Self::Play { query: query.to_string() },
                "bumpplay" => Self::BumpPlay { query: query.to_string() },
                "skip" => Self::Skip,
                "stop" => Self::Stop,
                "shuffle" => Self::Shuffle,
                _ => return None,
            };
            return Some(command);
        }

        if SONG_URL.is_match(content) {
            return Some(Self::Play { query: content.to_string() });
        }

        None
    }
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        stop_command(),
        shuffle_command(),
        pause_command(),
        resume_command(),
        leave_command(),
        playlist_limit_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción, playlist o stream")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "immediate",
            "Agregar al frente de la cola",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "shuffle",
            "Mezclar las canciones agregadas",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "split",
            "Separar videos por capítulos",
        ))
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta a la siguiente canción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "amount",
                "Número de canciones a saltar",
            )
            .min_int_value(1)
            .max_int_value(100),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción, conserva la cola")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola de reproducción")
}

// Comandos de conexión

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

// Configuración

fn playlist_limit_command() -> CreateCommand {
    CreateCommand::new("playlist-limit")
        .description("Máximo de canciones tomadas de una playlist de Spotify")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "limit", "Cantidad de canciones")
                .min_int_value(1)
                .max_int_value(1000)
                .required(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn play(query: &str) -> Option<MessageCommand> {
        Some(MessageCommand::Play { query: query.to_string() })
    }

    #[test]
    fn prefixed_commands() {
        assert_eq!(MessageCommand::parse("!play never gonna", "!"), play("never gonna"));
        assert_eq!(
            MessageCommand::parse("!bumpplay   first ", "!"),
            Some(MessageCommand::BumpPlay { query: "first".into() })
        );
        assert_eq!(MessageCommand::parse("!skip", "!"), Some(MessageCommand::Skip));
        assert_eq!(MessageCommand::parse("!stop", "!"), Some(MessageCommand::Stop));
        assert_eq!(MessageCommand::parse("!shuffle", "!"), Some(MessageCommand::Shuffle));
        assert_eq!(MessageCommand::parse("?play x", "?"), play("x"));
    }

    #[test]
    fn unknown_or_unprefixed_text_is_ignored() {
        assert_eq!(MessageCommand::parse("!volume 10", "!"), None);
        assert_eq!(MessageCommand::parse("!playlist x", "!"), None);
        assert_eq!(MessageCommand::parse("play x", "!"), None);
        assert_eq!(MessageCommand::parse("hello there", "!"), None);
    }

    #[test]
    fn bare_song_links_are_played() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(MessageCommand::parse(url, "!"), play(url));

        let url = "https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3";
        assert_eq!(MessageCommand::parse(url, "!"), play(url));

        assert_eq!(MessageCommand::parse("https://youtu.be/abc", "!"), play("https://youtu.be/abc"));
    }

    #[test]
    fn other_links_are_ignored() {
        assert_eq!(MessageCommand::parse("http://youtube.com/watch?v=x", "!"), None);
        assert_eq!(MessageCommand::parse("https://example.com/song.mp3", "!"), None);
        assert_eq!(MessageCommand::parse("look https://youtu.be/abc", "!"), None);
    }

    #[test]
    fn every_slash_command_is_registered() {
        assert_eq!(all_commands().len(), 8);
    }
}
