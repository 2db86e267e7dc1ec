//! Spawn policy - spawn point selection and team balancing

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ws::protocol::{Team, Vec3};

use super::roster::Roster;

/// Picks spawn points uniformly from the map's fixed set
#[derive(Debug)]
pub struct SpawnPolicy {
    points: Vec<Vec3>,
    rng: ChaCha8Rng,
}

impl SpawnPolicy {
    pub fn new(points: Vec<Vec3>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { points, rng }
    }

    /// Uniformly chosen spawn point. Independent of where anyone died.
    pub fn pick_spawn(&mut self) -> Vec3 {
        if self.points.is_empty() {
            return Vec3::default();
        }
        let idx = self.rng.gen_range(0..self.points.len());
        self.points[idx]
    }
}

/// Team with fewer members; ties go to red
pub fn assign_team(roster: &Roster) -> Team {
    let (red, blue) = roster.team_counts();
    if blue < red {
        Team::Blue
    } else {
        Team::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_team_balancing() {
        let mut roster = Roster::new(8);
        let mut assigned = Vec::new();
        for i in 0..5 {
            let id = Uuid::new_v4();
            let team = assign_team(&roster);
            roster.admit(id).unwrap();
            roster.join(id, format!("p{}", i), team, Vec3::default(), 0).unwrap();
            assigned.push(team);
        }
        assert_eq!(
            assigned,
            vec![Team::Red, Team::Blue, Team::Red, Team::Blue, Team::Red]
        );
    }

    #[test]
    fn test_balancing_recomputed_after_leave() {
        let mut roster = Roster::new(8);
        let ids: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            let team = assign_team(&roster);
            roster.admit(*id).unwrap();
            roster.join(*id, "p".into(), team, Vec3::default(), 0).unwrap();
        }
        // red member leaves, blue now outnumbers red
        roster.remove(&ids[0]);
        assert_eq!(assign_team(&roster), Team::Red);
        // empty roster falls back to red
        roster.remove(&ids[1]);
        assert_eq!(assign_team(&roster), Team::Red);
    }

    #[test]
    fn test_spawn_points_come_from_the_set() {
        let points = vec![Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 2.0), Vec3::new(3.0, 0.0, 3.0)];
        let mut policy = SpawnPolicy::new(points.clone(), Some(42));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let p = policy.pick_spawn();
            assert!(points.contains(&p));
            seen.insert(p.x as i32);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_seeded_policy_is_reproducible() {
        let points: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let mut a = SpawnPolicy::new(points.clone(), Some(9));
        let mut b = SpawnPolicy::new(points, Some(9));
        for _ in 0..20 {
            assert_eq!(a.pick_spawn(), b.pick_spawn());
        }
    }
}
