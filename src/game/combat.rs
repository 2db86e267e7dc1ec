//! Combat system - weapons, fire-rate gating, damage and kills

use uuid::Uuid;

use crate::ws::protocol::{AmmoCounts, AmmoType, Vec3, WeaponId};

use super::roster::{Combatant, Roster};
use super::spawn::SpawnPolicy;

/// Upper bound on the damage a single reported hit may carry
pub const MAX_HIT_DAMAGE: f32 = 200.0;
/// Share of incoming damage armor soaks up
pub const ARMOR_ABSORPTION: f32 = 0.5;

/// Weapon stats per weapon id
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Minimum time between shots (ms)
    pub fire_rate_ms: u64,
    /// Ammo consumed, if any
    pub ammo_type: Option<AmmoType>,
    pub ammo_per_shot: u32,
}

impl WeaponStats {
    pub fn for_id(weapon: WeaponId) -> Self {
        let (fire_rate_ms, ammo_type, ammo_per_shot) = match weapon {
            WeaponId::Fists => (500, None, 0),
            WeaponId::Chainsaw => (100, None, 0),
            WeaponId::Pistol => (300, Some(AmmoType::Bullets), 1),
            WeaponId::Shotgun => (800, Some(AmmoType::Shells), 1),
            WeaponId::SuperShotgun => (1200, Some(AmmoType::Shells), 2),
            WeaponId::Chaingun => (100, Some(AmmoType::Bullets), 1),
            WeaponId::Rocket => (1000, Some(AmmoType::Rockets), 1),
            WeaponId::Plasma => (150, Some(AmmoType::Cells), 1),
            WeaponId::Bfg => (2000, Some(AmmoType::Cells), 40),
        };
        Self {
            fire_rate_ms,
            ammo_type,
            ammo_per_shot,
        }
    }
}

/// Per-type carrying limit
pub fn ammo_max(kind: AmmoType) -> u32 {
    match kind {
        AmmoType::Bullets => 200,
        AmmoType::Shells => 50,
        AmmoType::Rockets => 50,
        AmmoType::Cells => 300,
    }
}

/// Amount handed out by a large ammo pickup or bundled with a weapon
pub fn ammo_pickup_large(kind: AmmoType) -> u32 {
    match kind {
        AmmoType::Bullets => 50,
        AmmoType::Shells => 20,
        AmmoType::Rockets => 5,
        AmmoType::Cells => 100,
    }
}

impl AmmoCounts {
    pub fn get(&self, kind: AmmoType) -> u32 {
        match kind {
            AmmoType::Bullets => self.bullets,
            AmmoType::Shells => self.shells,
            AmmoType::Rockets => self.rockets,
            AmmoType::Cells => self.cells,
        }
    }

    pub fn slot_mut(&mut self, kind: AmmoType) -> &mut u32 {
        match kind {
            AmmoType::Bullets => &mut self.bullets,
            AmmoType::Shells => &mut self.shells,
            AmmoType::Rockets => &mut self.rockets,
            AmmoType::Cells => &mut self.cells,
        }
    }
}

/// Why a shot was refused. None of these are reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FireDenied {
    #[error("fired before the weapon's interval elapsed")]
    RateLimited,

    #[error("weapon not owned")]
    NotOwned,

    #[error("not enough ammo")]
    OutOfAmmo,
}

/// Why a hit report was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitIgnored {
    UnknownTarget,
    UnknownAttacker,
    FriendlyFire,
}

/// Result of resolving one hit
#[derive(Debug, Clone, PartialEq)]
pub enum HitOutcome {
    Ignored(HitIgnored),
    Damaged {
        absorbed: f32,
        dealt: f32,
    },
    Killed {
        target_name: String,
        attacker_name: String,
        /// Target and attacker are the same combatant
        self_kill: bool,
        respawn_at: Vec3,
    },
}

/// Armor soaks half the damage, limited by what armor is left
pub fn armor_absorption(armor: f32, damage: f32) -> f32 {
    if armor <= 0.0 {
        return 0.0;
    }
    (damage * ARMOR_ABSORPTION).ceil().min(armor)
}

/// Fire-rate gating and hit resolution
#[derive(Debug, Clone, Copy)]
pub struct CombatResolver {
    /// When true, teammates can damage each other
    pub hardcore_mode: bool,
}

impl CombatResolver {
    pub fn new(hardcore_mode: bool) -> Self {
        Self { hardcore_mode }
    }

    /// Gate a shot on ownership, fire interval and ammo. On success the shot
    /// time is stamped and the ammo is spent.
    pub fn attempt_fire(
        &self,
        shooter: &mut Combatant,
        weapon: WeaponId,
        now: u64,
    ) -> Result<(), FireDenied> {
        if !shooter.owns(weapon) {
            return Err(FireDenied::NotOwned);
        }

        let stats = WeaponStats::for_id(weapon);
        if let Some(last) = shooter.last_shot_at {
            if now.saturating_sub(last) < stats.fire_rate_ms {
                return Err(FireDenied::RateLimited);
            }
        }

        if let Some(kind) = stats.ammo_type {
            if !shooter.consume_ammo(kind, stats.ammo_per_shot) {
                return Err(FireDenied::OutOfAmmo);
            }
        }

        shooter.last_shot_at = Some(now);
        Ok(())
    }

    /// Apply a reported hit. The target respawns immediately on death.
    pub fn apply_hit(
        &self,
        roster: &mut Roster,
        spawns: &mut SpawnPolicy,
        target_id: Uuid,
        attacker_id: Uuid,
        raw_damage: f32,
        now: u64,
    ) -> HitOutcome {
        let attacker_team = match roster.get(&attacker_id) {
            Some(attacker) => attacker.team,
            None => return HitOutcome::Ignored(HitIgnored::UnknownAttacker),
        };

        let Some(target) = roster.get_mut(&target_id) else {
            return HitOutcome::Ignored(HitIgnored::UnknownTarget);
        };

        // Self damage (splash) always lands
        if !self.hardcore_mode && target_id != attacker_id && target.team == attacker_team {
            return HitOutcome::Ignored(HitIgnored::FriendlyFire);
        }

        let damage = if raw_damage.is_finite() {
            raw_damage.clamp(0.0, MAX_HIT_DAMAGE)
        } else {
            0.0
        };

        let absorbed = armor_absorption(target.armor(), damage);
        let dealt = damage - absorbed;
        target.set_armor(target.armor() - absorbed);
        target.set_health(target.health() - dealt);

        if target.is_alive() {
            return HitOutcome::Damaged { absorbed, dealt };
        }

        target.deaths += 1;
        let target_name = target.name.clone();
        let respawn_at = spawns.pick_spawn();
        target.respawn(respawn_at, now);

        let attacker_name = match roster.get_mut(&attacker_id) {
            Some(attacker) => {
                attacker.kills += 1;
                attacker.name.clone()
            }
            None => String::new(),
        };

        HitOutcome::Killed {
            target_name,
            attacker_name,
            self_kill: target_id == attacker_id,
            respawn_at,
        }
    }
}
