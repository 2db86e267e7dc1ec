//! Game simulation modules

pub mod arena;
pub mod chat;
pub mod combat;
pub mod items;
pub mod leaderboard;
pub mod map;
pub mod movement;
pub mod roster;
pub mod spawn;

pub use arena::{Arena, ArenaHandle, ConnectError};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Client message received from a WebSocket connection
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub session_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
