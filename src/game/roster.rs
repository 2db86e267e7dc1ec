//! Roster & session directory - the only owner of combatant records

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use crate::ws::protocol::{AmmoCounts, AmmoType, CombatantView, Powerup, Team, Vec3, WeaponId};

use super::combat::ammo_max;

/// Health a combatant (re)spawns with, and the normal healing cap
pub const SPAWN_HEALTH: f32 = 100.0;
/// Absolute health ceiling (mega-health overheal)
pub const HEALTH_CEILING: f32 = 200.0;
pub const SPAWN_ARMOR: f32 = 0.0;
pub const ARMOR_CEILING: f32 = 200.0;
pub const STARTING_WEAPONS: [WeaponId; 2] = [WeaponId::Fists, WeaponId::Pistol];
pub const STARTING_WEAPON: WeaponId = WeaponId::Pistol;
pub const STARTING_AMMO: AmmoCounts = AmmoCounts {
    bullets: 50,
    shells: 0,
    rockets: 0,
    cells: 0,
};

/// Weight of the previous estimate in the latency moving average
const PING_SMOOTHING: f32 = 0.8;

/// Authoritative state of one joined connection
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: Uuid,
    pub name: String,
    pub team: Team,

    // Movement
    pub position: Vec3,
    pub angle: f32,
    /// Advisory, never used for validation
    pub velocity: Vec3,
    /// Time of the last movement sample (accepted or not)
    pub last_move_at: u64,

    // Invariant-guarded combat state
    health: f32,
    armor: f32,
    current_weapon: WeaponId,
    ammo: AmmoCounts,
    weapons: BTreeSet<WeaponId>,
    pub last_shot_at: Option<u64>,

    /// Advisory display state: powerup -> expiry (unix ms)
    pub powerups: BTreeMap<Powerup, u64>,

    // Stats
    pub kills: u32,
    pub deaths: u32,
    ping: Option<f32>,
    pub last_ping_at: Option<u64>,
}

impl Combatant {
    pub fn new(id: Uuid, name: String, team: Team, spawn: Vec3, now: u64) -> Self {
        Self {
            id,
            name,
            team,
            position: spawn,
            angle: 0.0,
            velocity: Vec3::default(),
            last_move_at: now,
            health: SPAWN_HEALTH,
            armor: SPAWN_ARMOR,
            current_weapon: STARTING_WEAPON,
            ammo: STARTING_AMMO,
            weapons: STARTING_WEAPONS.into_iter().collect(),
            last_shot_at: None,
            powerups: BTreeMap::new(),
            kills: 0,
            deaths: 0,
            ping: None,
            last_ping_at: None,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn armor(&self) -> f32 {
        self.armor
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn set_health(&mut self, value: f32) {
        self.health = value.clamp(0.0, HEALTH_CEILING);
    }

    pub fn set_armor(&mut self, value: f32) {
        self.armor = value.clamp(0.0, ARMOR_CEILING);
    }

    pub fn current_weapon(&self) -> WeaponId {
        self.current_weapon
    }

    pub fn owns(&self, weapon: WeaponId) -> bool {
        self.weapons.contains(&weapon)
    }

    pub fn weapons(&self) -> impl Iterator<Item = WeaponId> + '_ {
        self.weapons.iter().copied()
    }

    /// Returns false if the weapon was already owned
    pub fn grant_weapon(&mut self, weapon: WeaponId) -> bool {
        self.weapons.insert(weapon)
    }

    /// Switch only to an owned weapon
    pub fn switch_weapon(&mut self, weapon: WeaponId) -> bool {
        if self.owns(weapon) {
            self.current_weapon = weapon;
            true
        } else {
            false
        }
    }

    pub fn ammo(&self, kind: AmmoType) -> u32 {
        self.ammo.get(kind)
    }

    /// Add ammo up to the per-type maximum. Returns false if already full.
    pub fn add_ammo(&mut self, kind: AmmoType, amount: u32) -> bool {
        let max = ammo_max(kind);
        let slot = self.ammo.slot_mut(kind);
        if *slot >= max {
            return false;
        }
        *slot = slot.saturating_add(amount).min(max);
        true
    }

    /// Take ammo if enough is available
    pub fn consume_ammo(&mut self, kind: AmmoType, amount: u32) -> bool {
        let slot = self.ammo.slot_mut(kind);
        if *slot < amount {
            return false;
        }
        *slot -= amount;
        true
    }

    /// Put the combatant back to spawn defaults at a new location.
    /// Kills and deaths are kept.
    pub fn respawn(&mut self, spawn: Vec3, now: u64) {
        self.position = spawn;
        self.angle = 0.0;
        self.velocity = Vec3::default();
        self.last_move_at = now;
        self.health = SPAWN_HEALTH;
        self.armor = SPAWN_ARMOR;
        self.current_weapon = STARTING_WEAPON;
        self.ammo = STARTING_AMMO;
        self.weapons = STARTING_WEAPONS.into_iter().collect();
        self.powerups.clear();
    }

    /// Smoothed round-trip latency in ms
    pub fn ping(&self) -> u32 {
        self.ping.map(|p| p.round() as u32).unwrap_or(0)
    }

    pub fn record_latency(&mut self, sample_ms: u64, now: u64) {
        let sample = sample_ms as f32;
        self.ping = Some(match self.ping {
            Some(prev) => prev * PING_SMOOTHING + sample * (1.0 - PING_SMOOTHING),
            None => sample,
        });
        self.last_ping_at = Some(now);
    }

    /// Drop advisory powerups whose expiry has passed
    pub fn expire_powerups(&mut self, now: u64) -> bool {
        let before = self.powerups.len();
        self.powerups.retain(|_, expiry| *expiry > now);
        before != self.powerups.len()
    }

    pub fn view(&self) -> CombatantView {
        CombatantView {
            id: self.id,
            name: self.name.clone(),
            position: self.position,
            angle: self.angle,
            velocity: self.velocity,
            health: self.health,
            armor: self.armor,
            current_weapon: self.current_weapon,
            ammo: self.ammo,
            weapons: self.weapons().collect(),
            powerups: self.powerups.clone(),
            kills: self.kills,
            deaths: self.deaths,
            team: self.team,
            ping: self.ping(),
        }
    }
}

/// Admission refusal
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("server is full")]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("connection was never admitted")]
    NotAdmitted,

    #[error("connection already joined")]
    AlreadyJoined,
}

/// Admitted connections and their combatants
#[derive(Debug)]
pub struct Roster {
    capacity: usize,
    sessions: HashSet<Uuid>,
    combatants: HashMap<Uuid, Combatant>,
    /// Join order, used for deterministic iteration
    order: Vec<Uuid>,
}

impl Roster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: HashSet::new(),
            combatants: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Reserve a slot for a new connection
    pub fn admit(&mut self, session_id: Uuid) -> Result<(), AdmissionError> {
        if self.sessions.contains(&session_id) {
            return Ok(());
        }
        if self.sessions.len() >= self.capacity {
            return Err(AdmissionError::Full);
        }
        self.sessions.insert(session_id);
        Ok(())
    }

    /// Create the combatant record for an admitted connection
    pub fn join(
        &mut self,
        session_id: Uuid,
        name: String,
        team: Team,
        spawn: Vec3,
        now: u64,
    ) -> Result<&Combatant, JoinError> {
        if !self.sessions.contains(&session_id) {
            return Err(JoinError::NotAdmitted);
        }
        if self.combatants.contains_key(&session_id) {
            return Err(JoinError::AlreadyJoined);
        }

        self.order.push(session_id);
        let combatant = self
            .combatants
            .entry(session_id)
            .or_insert_with(|| Combatant::new(session_id, name, team, spawn, now));
        Ok(combatant)
    }

    /// Release the connection's slot and return its combatant, if it had joined
    pub fn remove(&mut self, session_id: &Uuid) -> Option<Combatant> {
        self.sessions.remove(session_id);
        self.order.retain(|id| id != session_id);
        self.combatants.remove(session_id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Combatant> {
        self.combatants.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Combatant> {
        self.combatants.get_mut(id)
    }

    /// Joined combatants in join order
    pub fn iter(&self) -> impl Iterator<Item = &Combatant> + '_ {
        self.order.iter().filter_map(|id| self.combatants.get(id))
    }

    /// Joined combatant ids in join order
    pub fn ids(&self) -> Vec<Uuid> {
        self.order.clone()
    }

    /// Number of joined combatants
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// (red, blue) member counts
    pub fn team_counts(&self) -> (usize, usize) {
        self.combatants
            .values()
            .fold((0, 0), |(red, blue), c| match c.team {
                Team::Red => (red + 1, blue),
                Team::Blue => (red, blue + 1),
            })
    }
}
