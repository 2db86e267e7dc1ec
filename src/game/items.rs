//! Item lifecycle - pickup spawn points, collection and respawn timers

use uuid::Uuid;

use crate::ws::protocol::{ItemCategory, ServerMsg, Vec3};

use super::combat::{ammo_pickup_large, WeaponStats};
use super::map::{ArenaMap, PickupKind};
use super::roster::{Combatant, Roster, ARMOR_CEILING, HEALTH_CEILING, SPAWN_HEALTH};

/// One static pickup location
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub kind: PickupKind,
    pub position: Vec3,
    pub active: bool,
    /// When an inactive item becomes available again (unix ms)
    pub respawn_at: u64,
    pub value: f32,
}

impl Item {
    pub fn new(id: String, kind: PickupKind, position: Vec3) -> Self {
        Self {
            id,
            kind,
            position,
            active: true,
            respawn_at: 0,
            value: pickup_value(kind),
        }
    }

    pub fn category(&self) -> ItemCategory {
        match self.kind {
            PickupKind::HealthSmall | PickupKind::HealthLarge | PickupKind::HealthMega => {
                ItemCategory::Health
            }
            PickupKind::ArmorSmall | PickupKind::ArmorLarge => ItemCategory::Armor,
            PickupKind::AmmoBox(_) => ItemCategory::Ammo,
            PickupKind::Weapon(_) => ItemCategory::Weapon,
        }
    }

    /// Subtype label shown to clients, e.g. `health_mega`
    pub fn subtype(&self) -> String {
        match self.kind {
            PickupKind::HealthSmall => "health_small".to_string(),
            PickupKind::HealthLarge => "health_large".to_string(),
            PickupKind::HealthMega => "health_mega".to_string(),
            PickupKind::ArmorSmall => "armor_small".to_string(),
            PickupKind::ArmorLarge => "armor_large".to_string(),
            PickupKind::AmmoBox(kind) => format!("ammo_{}", label(&kind)),
            PickupKind::Weapon(weapon) => label(&weapon),
        }
    }

    pub fn spawned_msg(&self) -> ServerMsg {
        ServerMsg::ItemSpawned {
            id: self.id.clone(),
            category: self.category(),
            subtype: self.subtype(),
            position: self.position,
            value: self.value,
        }
    }

    /// Apply the effect if it would do anything. Returns true when collected.
    fn apply_to(&self, combatant: &mut Combatant) -> bool {
        match self.kind {
            PickupKind::HealthSmall | PickupKind::HealthLarge | PickupKind::HealthMega => {
                let cap = if self.kind == PickupKind::HealthMega {
                    HEALTH_CEILING
                } else {
                    SPAWN_HEALTH
                };
                if combatant.health() >= cap {
                    return false;
                }
                combatant.set_health((combatant.health() + self.value).min(cap));
                true
            }
            PickupKind::ArmorSmall | PickupKind::ArmorLarge => {
                if combatant.armor() >= ARMOR_CEILING {
                    return false;
                }
                combatant.set_armor((combatant.armor() + self.value).min(ARMOR_CEILING));
                true
            }
            PickupKind::AmmoBox(kind) => combatant.add_ammo(kind, self.value as u32),
            PickupKind::Weapon(weapon) => {
                if !combatant.grant_weapon(weapon) {
                    return false;
                }
                if let Some(kind) = WeaponStats::for_id(weapon).ammo_type {
                    combatant.add_ammo(kind, self.value as u32);
                }
                true
            }
        }
    }
}

/// Serialized snake/lowercase name of a wire enum
fn label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// Magnitude of a pickup's effect
pub fn pickup_value(kind: PickupKind) -> f32 {
    match kind {
        PickupKind::HealthSmall => 10.0,
        PickupKind::HealthLarge => 25.0,
        PickupKind::HealthMega => 100.0,
        PickupKind::ArmorSmall => 50.0,
        PickupKind::ArmorLarge => 100.0,
        PickupKind::AmmoBox(kind) => ammo_pickup_large(kind) as f32,
        PickupKind::Weapon(weapon) => WeaponStats::for_id(weapon)
            .ammo_type
            .map(|kind| ammo_pickup_large(kind) as f32)
            .unwrap_or(0.0),
    }
}

/// What happened to items during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    Respawned { index: usize },
    Collected { item_id: String, collector_id: Uuid },
}

/// Sole owner of the arena's items
#[derive(Debug)]
pub struct ItemManager {
    items: Vec<Item>,
    pickup_radius: f32,
    respawn_ms: u64,
}

impl ItemManager {
    pub fn new(items: Vec<Item>, pickup_radius: f32, respawn_ms: u64) -> Self {
        Self {
            items,
            pickup_radius,
            respawn_ms,
        }
    }

    /// One item per pickup spawn on the map, ids `item_<index>`
    pub fn from_map(map: &ArenaMap, pickup_radius: f32, respawn_ms: u64) -> Self {
        let items = map
            .pickups()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                Item::new(
                    format!("item_{}", i),
                    p.kind,
                    ArenaMap::cell_center(p.cell_x, p.cell_z),
                )
            })
            .collect();
        Self::new(items, pickup_radius, respawn_ms)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn active(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(|item| item.active)
    }

    /// Reactivate due items, then run proximity collection. The first
    /// combatant checked (join order) wins a contested item.
    pub fn tick(&mut self, now: u64, roster: &mut Roster) -> Vec<ItemEvent> {
        let mut events = Vec::new();

        for (index, item) in self.items.iter_mut().enumerate() {
            if !item.active && now >= item.respawn_at {
                item.active = true;
                events.push(ItemEvent::Respawned { index });
            }
        }

        let ids = roster.ids();
        for item in self.items.iter_mut().filter(|item| item.active) {
            for id in &ids {
                let Some(combatant) = roster.get_mut(id) else {
                    continue;
                };
                if !combatant.is_alive()
                    || combatant.position.planar_distance(&item.position) > self.pickup_radius
                {
                    continue;
                }
                if item.apply_to(combatant) {
                    item.active = false;
                    item.respawn_at = now + self.respawn_ms;
                    events.push(ItemEvent::Collected {
                        item_id: item.id.clone(),
                        collector_id: *id,
                    });
                    break;
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{AmmoType, Team, WeaponId};

    const RESPAWN_MS: u64 = 30_000;

    fn setup(kind: PickupKind, players: usize) -> (ItemManager, Roster, Vec<Uuid>) {
        let position = Vec3::new(352.0, 32.0, 352.0);
        let manager = ItemManager::new(
            vec![Item::new("item_0".to_string(), kind, position)],
            32.0,
            RESPAWN_MS,
        );
        let mut roster = Roster::new(8);
        let mut ids = Vec::new();
        for i in 0..players {
            let id = Uuid::new_v4();
            roster.admit(id).unwrap();
            roster
                .join(id, format!("p{}", i), Team::Red, position, 0)
                .unwrap();
            ids.push(id);
        }
        (manager, roster, ids)
    }

    #[test]
    fn test_health_pickup_requires_missing_health() {
        let (mut items, mut roster, ids) = setup(PickupKind::HealthLarge, 1);

        assert!(items.tick(1_000, &mut roster).is_empty());
        assert!(items.items()[0].active);

        roster.get_mut(&ids[0]).unwrap().set_health(90.0);
        let events = items.tick(2_000, &mut roster);
        assert_eq!(
            events,
            vec![ItemEvent::Collected {
                item_id: "item_0".to_string(),
                collector_id: ids[0]
            }]
        );
        assert_eq!(roster.get(&ids[0]).unwrap().health(), 100.0);
        assert!(!items.items()[0].active);
        assert_eq!(items.items()[0].respawn_at, 2_000 + RESPAWN_MS);
    }

    #[test]
    fn test_mega_health_overheals_to_200() {
        let (mut items, mut roster, ids) = setup(PickupKind::HealthMega, 1);
        roster.get_mut(&ids[0]).unwrap().set_health(150.0);

        assert_eq!(items.tick(1_000, &mut roster).len(), 1);
        assert_eq!(roster.get(&ids[0]).unwrap().health(), 200.0);
    }

    #[test]
    fn test_armor_pickup_caps_at_200() {
        let (mut items, mut roster, ids) = setup(PickupKind::ArmorLarge, 1);
        roster.get_mut(&ids[0]).unwrap().set_armor(150.0);

        assert_eq!(items.tick(1_000, &mut roster).len(), 1);
        assert_eq!(roster.get(&ids[0]).unwrap().armor(), 200.0);

        let (mut items, mut roster, ids) = setup(PickupKind::ArmorSmall, 1);
        roster.get_mut(&ids[0]).unwrap().set_armor(200.0);
        assert!(items.tick(1_000, &mut roster).is_empty());
    }

    #[test]
    fn test_weapon_pickup_only_when_not_owned() {
        let (mut items, mut roster, _) = setup(PickupKind::Weapon(WeaponId::Pistol), 1);
        assert!(items.tick(1_000, &mut roster).is_empty());

        let (mut items, mut roster, ids) = setup(PickupKind::Weapon(WeaponId::Shotgun), 1);
        assert_eq!(items.tick(1_000, &mut roster).len(), 1);
        let c = roster.get(&ids[0]).unwrap();
        assert!(c.owns(WeaponId::Shotgun));
        assert_eq!(c.ammo(AmmoType::Shells), 20);
    }

    #[test]
    fn test_ammo_pickup() {
        let (mut items, mut roster, ids) = setup(PickupKind::AmmoBox(AmmoType::Bullets), 1);
        assert_eq!(items.tick(1_000, &mut roster).len(), 1);
        assert_eq!(roster.get(&ids[0]).unwrap().ammo(AmmoType::Bullets), 100);
    }

    #[test]
    fn test_first_checked_wins_within_tick() {
        let (mut items, mut roster, ids) = setup(PickupKind::HealthLarge, 2);
        for id in &ids {
            roster.get_mut(id).unwrap().set_health(50.0);
        }

        let events = items.tick(1_000, &mut roster);
        assert_eq!(events.len(), 1);
        assert_eq!(roster.get(&ids[0]).unwrap().health(), 75.0);
        assert_eq!(roster.get(&ids[1]).unwrap().health(), 50.0);

        // still inactive before the timer elapses
        assert!(items.tick(1_000 + RESPAWN_MS - 1, &mut roster).is_empty());
        assert_eq!(roster.get(&ids[1]).unwrap().health(), 50.0);
    }

    #[test]
    fn test_respawn_after_timer() {
        let (mut items, mut roster, ids) = setup(PickupKind::HealthLarge, 1);
        roster.get_mut(&ids[0]).unwrap().set_health(10.0);
        items.tick(1_000, &mut roster);

        // move away so the respawned item is not instantly re-collected
        roster.get_mut(&ids[0]).unwrap().position = Vec3::new(900.0, 32.0, 900.0);
        let events = items.tick(1_000 + RESPAWN_MS, &mut roster);
        assert_eq!(events, vec![ItemEvent::Respawned { index: 0 }]);
        assert!(items.items()[0].active);
    }

    #[test]
    fn test_radius_is_planar() {
        let (mut items, mut roster, ids) = setup(PickupKind::HealthLarge, 1);
        let c = roster.get_mut(&ids[0]).unwrap();
        c.set_health(50.0);
        // far above, but within radius on the x/z plane
        c.position = Vec3::new(352.0 + 30.0, 500.0, 352.0);
        assert_eq!(items.tick(1_000, &mut roster).len(), 1);

        let (mut items, mut roster, ids) = setup(PickupKind::HealthLarge, 1);
        let c = roster.get_mut(&ids[0]).unwrap();
        c.set_health(50.0);
        c.position = Vec3::new(352.0 + 33.0, 32.0, 352.0);
        assert!(items.tick(1_000, &mut roster).is_empty());
    }

    #[test]
    fn test_map_items_and_labels() {
        let map = ArenaMap::arena();
        let items = ItemManager::from_map(&map, 32.0, RESPAWN_MS);
        assert_eq!(items.items().len(), map.pickups().len());
        assert_eq!(items.active().count(), items.items().len());

        let mega = items
            .items()
            .iter()
            .find(|i| i.kind == PickupKind::HealthMega)
            .unwrap();
        assert_eq!(mega.subtype(), "health_mega");
        assert_eq!(mega.category(), ItemCategory::Health);

        let shells = items
            .items()
            .iter()
            .find(|i| i.kind == PickupKind::AmmoBox(AmmoType::Shells))
            .unwrap();
        assert_eq!(shells.subtype(), "ammo_shells");

        let rocket = items
            .items()
            .iter()
            .find(|i| i.kind == PickupKind::Weapon(WeaponId::Rocket))
            .unwrap();
        assert_eq!(rocket.subtype(), "rocket");
        assert_eq!(rocket.value, 5.0);
    }
}
