//! Domain errors for resolution, playback and queueing.
//!
//! The `Display` text of every variant is what the bot replies with, so it is
//! kept short and user-facing.

use thiserror::Error;

/// Failure to turn a query into playable tracks.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A specific URL target does not exist.
    #[error("that doesn't exist")]
    NotFound,

    /// Every branch ran but produced nothing playable.
    #[error("no songs found")]
    EmptyResult,

    /// Network, process or timeout failure inside a provider adapter.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Failure of a playback state transition.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("not connected")]
    NotConnected,

    #[error("the queue is empty")]
    QueueEmpty,

    #[error("no songs to skip")]
    NoNextItem,

    #[error("not currently playing")]
    NotPlaying,

    #[error("not enough songs to shuffle")]
    NotEnoughSongs,

    /// The voice transport failed (join, input creation, track control).
    #[error("voice error: {0}")]
    Voice(#[from] anyhow::Error),
}

/// Failure of the add-to-queue use case.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Neither the requester nor anybody else is in a voice channel.
    #[error("gotta be in a voice channel")]
    NoVoiceChannel,

    /// Every resolved track was dropped because the queue is at capacity.
    #[error("the queue is full")]
    QueueFull,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("couldn't load guild settings: {0}")]
    Settings(anyhow::Error),
}
