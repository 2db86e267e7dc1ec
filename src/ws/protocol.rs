//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 3D position or velocity. `y` is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance on the horizontal (x/z) plane
    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

/// Weapon identifiers. Unknown ids fail deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponId {
    Fists,
    Chainsaw,
    Pistol,
    Shotgun,
    #[serde(rename = "supershotgun")]
    SuperShotgun,
    Chaingun,
    Rocket,
    Plasma,
    Bfg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmmoType {
    Bullets,
    Shells,
    Rockets,
    Cells,
}

/// Timed powerups (advisory display state only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Powerup {
    Invuln,
    Invis,
    Quad,
}

/// Per-type ammo counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmmoCounts {
    pub bullets: u32,
    pub shells: u32,
    pub rockets: u32,
    pub cells: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Health,
    Armor,
    Weapon,
    Ammo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Chat,
    Team,
    System,
    Kill,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Enter the arena with a display name
    Join { name: String },

    /// Client-simulated state; the server re-validates it
    UpdateState {
        position: Vec3,
        angle: f32,
        /// Advisory only
        #[serde(default)]
        velocity: Vec3,
        current_weapon: WeaponId,
        /// Advisory only, ownership is server-side
        #[serde(default)]
        weapons: Vec<WeaponId>,
        /// Advisory only: powerup -> expiry (unix ms)
        #[serde(default)]
        powerups: BTreeMap<Powerup, u64>,
        /// Ignored, health is authoritative
        #[serde(default)]
        health: Option<f32>,
        /// Ignored, armor is authoritative
        #[serde(default)]
        armor: Option<f32>,
    },

    /// Weapon fired
    Fire {
        weapon_id: WeaponId,
        angle: f32,
        position: Vec3,
    },

    /// Client-detected hit on another combatant
    Hit {
        target_id: Uuid,
        damage: f32,
        /// Must match the sending connection when present
        #[serde(default)]
        attacker_id: Option<Uuid>,
    },

    Chat { text: String },

    TeamChat { text: String },

    /// Echo of a server ping probe
    PongReply { timestamp: u64 },
}

impl ClientMsg {
    /// Boundary checks serde cannot express
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMsg::UpdateState {
                position,
                angle,
                velocity,
                ..
            } => {
                if !position.is_finite() || !velocity.is_finite() || !angle.is_finite() {
                    return Err(ProtocolError::NonFinite);
                }
            }
            ClientMsg::Fire {
                angle, position, ..
            } => {
                if !position.is_finite() || !angle.is_finite() {
                    return Err(ProtocolError::NonFinite);
                }
            }
            ClientMsg::Hit { damage, .. } => {
                if !damage.is_finite() {
                    return Err(ProtocolError::NonFinite);
                }
            }
            ClientMsg::Join { .. }
            | ClientMsg::Chat { .. }
            | ClientMsg::TeamChat { .. }
            | ClientMsg::PongReply { .. } => {}
        }
        Ok(())
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent once admission succeeds
    Welcome { id: Uuid, server_time: u64 },

    /// Full roster, sent to a joiner only
    RosterSnapshot {
        players: HashMap<Uuid, CombatantView>,
    },

    /// Someone else joined
    CombatantJoined { player: CombatantView },

    CombatantLeft { id: Uuid },

    StateUpdate { player: CombatantView },

    FireEvent {
        shooter_id: Uuid,
        weapon_id: WeaponId,
        angle: f32,
        position: Vec3,
    },

    ChatEvent { message: ChatMessage },

    RosterCount { count: usize },

    Leaderboard { entries: Vec<LeaderboardEntry> },

    ItemSpawned {
        id: String,
        category: ItemCategory,
        subtype: String,
        position: Vec3,
        value: f32,
    },

    ItemCollected { item_id: String, collector_id: Uuid },

    /// Authoritative position after a rejected movement
    PositionCorrection { position: Vec3 },

    /// Admission refused, the connection is closed afterwards
    CapacityFull,

    /// Latency probe; clients echo it back as `pongReply`
    PingProbe { timestamp: u64 },
}

/// Public view of a combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantView {
    pub id: Uuid,
    pub name: String,
    pub position: Vec3,
    pub angle: f32,
    pub velocity: Vec3,
    pub health: f32,
    pub armor: f32,
    pub current_weapon: WeaponId,
    pub ammo: AmmoCounts,
    pub weapons: Vec<WeaponId>,
    pub powerups: BTreeMap<Powerup, u64>,
    pub kills: u32,
    pub deaths: u32,
    pub team: Team,
    pub ping: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// `None` for system-originated messages
    pub player_id: Option<Uuid>,
    pub player_name: String,
    pub message: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub team: Team,
    pub ping: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("non-finite number in message")]
    NonFinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_msg_wire_names() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"fire","weaponId":"supershotgun","angle":1.5,"position":{"x":1,"y":32,"z":2}}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::Fire { weapon_id, .. } => assert_eq!(weapon_id, WeaponId::SuperShotgun),
            other => panic!("unexpected {:?}", other),
        }

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"pongReply","timestamp":42}"#).unwrap();
        assert!(matches!(msg, ClientMsg::PongReply { timestamp: 42 }));
    }

    #[test]
    fn test_unknown_weapon_is_rejected() {
        let parsed = serde_json::from_str::<ClientMsg>(
            r#"{"type":"fire","weaponId":"railgun","angle":0,"position":{"x":0,"y":0,"z":0}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_state_optional_fields() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"updateState","position":{"x":1,"y":32,"z":2},"angle":0.5,"currentWeapon":"pistol"}"#,
        )
        .unwrap();
        assert!(msg.validate().is_ok());
        match msg {
            ClientMsg::UpdateState {
                weapons, powerups, ..
            } => {
                assert!(weapons.is_empty());
                assert!(powerups.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_server_msg_shape() {
        let json = serde_json::to_value(ServerMsg::ItemCollected {
            item_id: "item_3".to_string(),
            collector_id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(json["type"], "itemCollected");
        assert_eq!(json["itemId"], "item_3");

        let json = serde_json::to_value(ServerMsg::CapacityFull).unwrap();
        assert_eq!(json["type"], "capacityFull");
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 100.0, 4.0);
        assert_eq!(a.planar_distance(&b), 5.0);
    }
}
