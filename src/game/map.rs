//! Static arena layout and the collision grid derived from it

use crate::ws::protocol::{AmmoType, Vec3, WeaponId};

/// Edge length of one grid cell in world units
pub const CELL_SIZE: f32 = 64.0;
/// Eye height combatants spawn at
pub const SPAWN_HEIGHT: f32 = 32.0;

/// Pickup placed on the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickupKind {
    HealthSmall,
    HealthLarge,
    HealthMega,
    ArmorSmall,
    ArmorLarge,
    AmmoBox(AmmoType),
    Weapon(WeaponId),
}

#[derive(Debug, Clone, Copy)]
pub struct PickupSpawn {
    pub cell_x: usize,
    pub cell_z: usize,
    pub kind: PickupKind,
}

/// Fixed arena definition
#[derive(Debug, Clone)]
pub struct ArenaMap {
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    /// `walls[z][x]` is true for solid cells
    walls: Vec<Vec<bool>>,
    spawns: Vec<(usize, usize)>,
    pickups: Vec<PickupSpawn>,
}

impl ArenaMap {
    /// The 20x20 deathmatch arena: border walls and a central room with
    /// two openings on the north and south sides.
    pub fn arena() -> Self {
        let (width, height) = (20, 20);
        let mut walls = vec![vec![false; width]; height];

        for (z, row) in walls.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let border = x == 0 || x == width - 1 || z == 0 || z == height - 1;
                let room_edge = ((x == 7 || x == 12) && (7..=12).contains(&z))
                    || ((z == 7 || z == 12) && (7..=12).contains(&x));
                let doorway = (x == 9 || x == 10) && (z == 7 || z == 12);
                *cell = border || (room_edge && !doorway);
            }
        }

        let pickup = |cell_x, cell_z, kind| PickupSpawn {
            cell_x,
            cell_z,
            kind,
        };

        Self {
            name: "Arena",
            width,
            height,
            walls,
            spawns: vec![(3, 3), (16, 3), (3, 16), (16, 16), (10, 10)],
            pickups: vec![
                pickup(5, 5, PickupKind::HealthLarge),
                pickup(14, 5, PickupKind::HealthLarge),
                pickup(5, 14, PickupKind::HealthLarge),
                pickup(14, 14, PickupKind::HealthLarge),
                pickup(10, 5, PickupKind::ArmorLarge),
                pickup(10, 14, PickupKind::ArmorLarge),
                pickup(8, 9, PickupKind::HealthMega),
                pickup(11, 10, PickupKind::ArmorSmall),
                pickup(3, 10, PickupKind::Weapon(WeaponId::Shotgun)),
                pickup(16, 10, PickupKind::Weapon(WeaponId::Shotgun)),
                pickup(10, 3, PickupKind::Weapon(WeaponId::Chaingun)),
                pickup(10, 16, PickupKind::Weapon(WeaponId::Rocket)),
                pickup(3, 7, PickupKind::HealthSmall),
                pickup(7, 3, PickupKind::AmmoBox(AmmoType::Bullets)),
                pickup(16, 12, PickupKind::AmmoBox(AmmoType::Shells)),
                pickup(12, 16, PickupKind::AmmoBox(AmmoType::Rockets)),
            ],
        }
    }

    /// World-space centre of a cell at spawn height
    pub fn cell_center(cell_x: usize, cell_z: usize) -> Vec3 {
        Vec3::new(
            cell_x as f32 * CELL_SIZE + CELL_SIZE / 2.0,
            SPAWN_HEIGHT,
            cell_z as f32 * CELL_SIZE + CELL_SIZE / 2.0,
        )
    }

    pub fn spawn_points(&self) -> Vec<Vec3> {
        self.spawns
            .iter()
            .map(|&(x, z)| Self::cell_center(x, z))
            .collect()
    }

    pub fn pickups(&self) -> &[PickupSpawn] {
        &self.pickups
    }

    /// True when the planar position is inside a wall or off the grid
    pub fn is_blocked(&self, position: &Vec3) -> bool {
        if position.x < 0.0 || position.z < 0.0 {
            return true;
        }
        let gx = (position.x / CELL_SIZE).floor() as usize;
        let gz = (position.z / CELL_SIZE).floor() as usize;
        self.walls
            .get(gz)
            .and_then(|row| row.get(gx))
            .copied()
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawns_are_open_cells() {
        let map = ArenaMap::arena();
        let spawns = map.spawn_points();
        assert_eq!(spawns.len(), 5);
        for spawn in &spawns {
            assert!(!map.is_blocked(spawn), "spawn {:?} is inside a wall", spawn);
        }
        assert_eq!(spawns[0], Vec3::new(224.0, 32.0, 224.0));
    }

    #[test]
    fn test_border_and_room_walls() {
        let map = ArenaMap::arena();
        assert!(map.is_blocked(&ArenaMap::cell_center(0, 5)));
        assert!(map.is_blocked(&ArenaMap::cell_center(7, 8)));
        // doorways stay open
        assert!(!map.is_blocked(&ArenaMap::cell_center(9, 7)));
        assert!(!map.is_blocked(&ArenaMap::cell_center(10, 12)));
    }

    #[test]
    fn test_off_grid_is_blocked() {
        let map = ArenaMap::arena();
        assert!(map.is_blocked(&Vec3::new(-1.0, 32.0, 100.0)));
        assert!(map.is_blocked(&Vec3::new(100.0, 32.0, 20.0 * CELL_SIZE + 1.0)));
    }

    #[test]
    fn test_pickups_are_reachable() {
        let map = ArenaMap::arena();
        assert_eq!(map.pickups().len(), 16);
        for p in map.pickups() {
            assert!(!map.is_blocked(&ArenaMap::cell_center(p.cell_x, p.cell_z)));
        }
    }
}
