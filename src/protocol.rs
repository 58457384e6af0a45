//! Wire message schema for the game WebSocket channel, plus nonce generation.
//!
//! The server relays JSON messages of one shape in both directions; fields the
//! sender leaves empty are omitted on the wire, so every field is defaulted
//! and skipped when empty.

use serde::{Deserialize, Serialize};

/// A player identity as the server reports it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

impl Player {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            uuid: String::new(),
        }
    }
}

/// One relayed game event. `nonce` is the correlation id tying a locally
/// predicted fish to its eventual resolution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Player>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nonce: String,
}

impl Message {
    /// Salmon announcing a jump. Carries a fresh nonce so the later
    /// resolution can be matched to the predicted fish.
    pub fn jump(from: Player, nonce: String) -> Self {
        Self {
            kind: "jump".to_string(),
            from: Some(from),
            to: None,
            nonce,
        }
    }

    /// Bear resolving a strike on the fish that carried `nonce`.
    pub fn eat(to: Player, nonce: String) -> Self {
        Self {
            kind: "eat".to_string(),
            from: None,
            to: Some(to),
            nonce,
        }
    }
}

/// RFC 4122 version-4 uuid for correlation nonces, built from the browser's
/// CSPRNG. A failed entropy read degrades to the nil-ish uuid rather than
/// aborting; nonce collisions only cost a missed correlation.
pub fn uuid_v4() -> String {
    let mut b = [0u8; 16];
    let _ = getrandom::getrandom(&mut b);
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15]
    )
}
