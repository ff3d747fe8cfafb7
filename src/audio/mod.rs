//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! - [`queue`]: the bounded list of upcoming items
//! - [`player`]: playback state machine driving one voice connection
//! - [`manager`]: registry of players, one per guild, and the voice event loop
//! - [`voice`]: the seam between players and Songbird
//! - [`orchestrator`]: the add-to-queue use case shared by every command
//!
//! All mutations of a guild's player go through its async mutex, so commands
//! and track-end events for the same guild never interleave.

pub mod manager;
pub mod orchestrator;
pub mod player;
pub mod queue;
pub mod voice;

pub use manager::PlayerManager;
pub use orchestrator::{AddOutcome, AddRequest, QueueOrchestrator};
pub use player::{Player, PlayerStatus};
pub use queue::{MusicQueue, QueueItem};
