//! Identity and scope types shared across the stack.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A logical player identity: one account playing one character.
///
/// Authentication proves the account; the client picks the character.
/// The composite is what the registry, session store, and rooms key on —
/// the same account logged into two characters counts as two players.
///
/// On the wire this serializes as a single `"account:character"` string
/// (e.g. `"A1:C1"`), which is also what clients echo back in targeted
/// events such as `chat:private`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId {
    account_id: String,
    character_id: String,
}

impl PlayerId {
    /// Creates a player id from an account id and a character id.
    pub fn new(
        account_id: impl Into<String>,
        character_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            character_id: character_id.into(),
        }
    }

    /// The account half of the identity.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The character half of the identity.
    pub fn character_id(&self) -> &str {
        &self.character_id
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> String {
        format!("{}:{}", id.account_id, id.character_id)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (account, character) = s
            .split_once(':')
            .ok_or_else(|| format!("player id '{s}' missing ':'"))?;
        if account.is_empty() || character.is_empty() {
            return Err(format!("player id '{s}' has an empty component"));
        }
        Ok(Self::new(account, character))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.character_id)
    }
}

// ---------------------------------------------------------------------------
// MapId
// ---------------------------------------------------------------------------

/// A unique identifier for a game map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MapId(pub u64);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChatChannel
// ---------------------------------------------------------------------------

/// The kind of chat scope a message targets.
///
/// Each variant carries only the fields meaningful to that kind, so an
/// invalid combination (a whisper with a guild id, say) is unrepresentable.
/// `System` is server-originated; clients sending to it are rejected at
/// the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChatChannel {
    /// The global channel every authenticated player is in.
    General,
    /// The global trade channel.
    Trade,
    /// A guild's private channel.
    Guild { guild_id: String },
    /// A party's private channel.
    Party { party_id: String },
    /// A direct message to one player. No room backs this — it routes
    /// through the registry to the target's connection.
    Whisper { target: PlayerId },
    /// Server announcements. Outbound only.
    System,
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// A named broadcast scope: a map, a chat channel, or a player's private
/// room for direct addressing.
///
/// Room names are namespaced strings (`map:5`, `chat:guild:G1`,
/// `player:A1:C1`) so the different scope kinds can never collide in the
/// router's tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// The broadcast room for a map.
    pub fn map(map_id: MapId) -> Self {
        Self(format!("map:{}", map_id.0))
    }

    /// The broadcast room backing a chat channel.
    ///
    /// Returns `None` for [`ChatChannel::Whisper`], which is delivered
    /// point-to-point rather than through a room.
    pub fn channel(channel: &ChatChannel) -> Option<Self> {
        match channel {
            ChatChannel::General => Some(Self("chat:general".into())),
            ChatChannel::Trade => Some(Self("chat:trade".into())),
            ChatChannel::Guild { guild_id } => {
                Some(Self(format!("chat:guild:{guild_id}")))
            }
            ChatChannel::Party { party_id } => {
                Some(Self(format!("chat:party:{party_id}")))
            }
            ChatChannel::System => Some(Self("chat:system".into())),
            ChatChannel::Whisper { .. } => None,
        }
    }

    /// The per-player private room used for direct addressing.
    pub fn private(player_id: &PlayerId) -> Self {
        Self(format!("player:{player_id}"))
    }

    /// The raw room name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// If this is a map room, the map it broadcasts for.
    pub fn as_map(&self) -> Option<MapId> {
        self.0
            .strip_prefix("map:")
            .and_then(|id| id.parse().ok())
            .map(MapId)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =========================================================================
// Tests
// =========================================================================
