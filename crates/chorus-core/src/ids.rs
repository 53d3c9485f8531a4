//! Identifier newtypes shared by every layer.
//!
//! The transport hands out opaque string identifiers for users, channels and
//! messages.  Wrapping them keeps the engine from mixing a channel id up with a
//! user id, and gives a single place for the few bits of structure the engine
//! relies on (direct-message detection, timestamp age).

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identity of a chat user (or of the bot itself).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the mention form used in message text (`<@U123>`).
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a channel, group or direct-message conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for one-to-one conversations with the bot.
    ///
    /// Direct-message channel ids carry a `D` prefix.
    pub fn is_direct(&self) -> bool {
        self.0.starts_with('D')
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport timestamp of a message, in `seconds.micros` form.
///
/// Timestamps are unique per channel, which is why a message is identified by
/// the `(channel, ts)` pair rather than by the timestamp alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTs(pub String);

impl MessageTs {
    pub fn new(ts: impl Into<String>) -> Self {
        Self(ts.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a timestamp for the given wall-clock instant.
    pub fn from_system_time(time: SystemTime) -> Self {
        let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(format!("{}.{:06}", since.as_secs(), since.subsec_micros()))
    }

    /// Parses the timestamp back into a wall-clock instant.
    ///
    /// Returns `None` when the timestamp is not in the numeric form.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let (secs, frac) = self.0.split_once('.').unwrap_or((self.0.as_str(), "0"));
        let secs: u64 = secs.parse().ok()?;
        let micros: u32 = format!("{frac:0<6}").get(..6)?.parse().ok()?;
        UNIX_EPOCH.checked_add(Duration::new(secs, micros * 1_000))
    }

    /// Age of the message relative to `now`.  Future timestamps are age zero.
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        let at = self.to_system_time()?;
        Some(now.duration_since(at).unwrap_or_default())
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a single message: the channel it lives in plus its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub channel: ChannelId,
    pub ts: MessageTs,
}

impl MessageId {
    pub fn new(channel: ChannelId, ts: MessageTs) -> Self {
        Self { channel, ts }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.ts)
    }
}
