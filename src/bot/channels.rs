//! Voice-channel discovery from a guild snapshot.

use serenity::model::{
    channel::ChannelType,
    guild::Guild,
    id::{ChannelId, UserId},
};

/// Who is in which voice channel, captured from the cache at request time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceSnapshot {
    /// Requester's current voice channel.
    pub member_channel: Option<ChannelId>,
    /// Non-bot occupants per voice channel.
    pub occupancy: Vec<(ChannelId, usize)>,
}

impl VoiceSnapshot {
    pub fn from_guild(guild: &Guild, member: UserId) -> Self {
        let member_channel = guild
            .voice_states
            .get(&member)
            .and_then(|state| state.channel_id);

        let mut occupancy: Vec<(ChannelId, usize)> = guild
            .channels
            .values()
            .filter(|channel| matches!(channel.kind, ChannelType::Voice | ChannelType::Stage))
            .map(|channel| (channel.id, 0))
            .collect();

        for state in guild.voice_states.values() {
            let Some(channel_id) = state.channel_id else {
                continue;
            };

            let is_bot = state.member.as_ref().is_some_and(|m| m.user.bot);
            if is_bot {
                continue;
            }

            if let Some(entry) = occupancy.iter_mut().find(|(id, _)| *id == channel_id) {
                entry.1 += 1;
            }
        }

        Self {
            member_channel,
            occupancy,
        }
    }

    /// Channel with the most occupants; ties go to the lowest channel id.
    pub fn most_popular(&self) -> Option<(ChannelId, usize)> {
        self.occupancy
            .iter()
            .copied()
            .filter(|(_, count)| *count > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    }

    /// Where to play: the requester's channel, else the busiest one.
    pub fn destination(&self) -> Option<ChannelId> {
        self.member_channel
            .or_else(|| self.most_popular().map(|(channel, _)| channel))
    }
}
