//! Leaderboard projection and its heartbeat cadence

use std::cmp::Ordering;

use crate::ws::protocol::LeaderboardEntry;

use super::roster::Roster;

/// Ranking derived fresh from the roster: kills descending, then deaths
/// ascending. Name and id break remaining ties so the order is stable.
pub fn project(roster: &Roster) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = roster
        .iter()
        .map(|c| LeaderboardEntry {
            id: c.id,
            name: c.name.clone(),
            kills: c.kills,
            deaths: c.deaths,
            team: c.team,
            ping: c.ping(),
        })
        .collect();

    entries.sort_by(rank);
    entries
}

fn rank(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.kills
        .cmp(&a.kills)
        .then(a.deaths.cmp(&b.deaths))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Counts scheduler ticks and fires every `interval` ticks
pub struct LeaderboardCadence {
    ticks_since_refresh: u32,
    interval: u32,
}

impl LeaderboardCadence {
    pub fn new(interval: u32) -> Self {
        Self {
            ticks_since_refresh: 0,
            interval: interval.max(1),
        }
    }

    /// Advance one tick; true when the heartbeat refresh is due
    pub fn should_refresh(&mut self) -> bool {
        self.ticks_since_refresh += 1;
        if self.ticks_since_refresh >= self.interval {
            self.ticks_since_refresh = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Team, Vec3};
    use uuid::Uuid;

    #[test]
    fn test_ordering_kills_then_deaths() {
        let mut roster = Roster::new(8);
        for (name, kills, deaths) in [("a", 3, 2), ("b", 3, 1), ("c", 1, 0)] {
            let id = Uuid::new_v4();
            roster.admit(id).unwrap();
            roster
                .join(id, name.to_string(), Team::Red, Vec3::default(), 0)
                .unwrap();
            let c = roster.get_mut(&id).unwrap();
            c.kills = kills;
            c.deaths = deaths;
        }

        let board = project(&roster);
        let order: Vec<(u32, u32)> = board.iter().map(|e| (e.kills, e.deaths)).collect();
        assert_eq!(order, vec![(3, 1), (3, 2), (1, 0)]);
        assert_eq!(board[0].name, "b");
    }

    #[test]
    fn test_empty_roster() {
        assert!(project(&Roster::new(8)).is_empty());
    }

    #[test]
    fn test_cadence_fires_every_interval() {
        let mut cadence = LeaderboardCadence::new(120);
        let fired: Vec<usize> = (1..=360)
            .filter(|_| cadence.should_refresh())
            .collect();
        assert_eq!(fired, vec![120, 240, 360]);
    }
}
