//! Switch Table
//!
//! World-shared switch state keyed by `(switch number, team)`. The
//! table is explicitly owned by the world and passed `&mut` into the
//! tile engine - never an ambient global - which keeps the
//! single-writer-per-tick discipline visible in the signatures.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sim::state::Team;

/// What kind of actuation last touched a switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchKind {
    /// Opened permanently.
    Open,
    /// Opened until its end tick.
    TimedOpen,
    /// Closed until its end tick.
    TimedClose,
    /// Closed permanently.
    Close,
}

/// State of one `(number, team)` switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEntry {
    /// Currently open?
    pub active: bool,
    /// Tick at which a timed actuation reverts; `None` = permanent.
    pub end_tick: Option<u32>,
    /// The actuation that produced this state.
    pub kind: SwitchKind,
    /// Tick of the last state change.
    pub last_update_tick: u32,
}

/// All switches of the world.
///
/// Switch number 0 is the unswitched default and always reads active.
/// The super team bypasses gating entirely: it reads every switch as
/// active and its actuations land on every registered team.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SwitchTable {
    entries: BTreeMap<(u8, Team), SwitchEntry>,
    teams: BTreeSet<Team>,
}

impl SwitchTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a team known, so super actuations reach it.
    pub fn register_team(&mut self, team: Team) {
        if !team.is_super() {
            self.teams.insert(team);
        }
    }

    /// Read a switch.
    pub fn is_active(&self, number: u8, team: Team) -> bool {
        if number == 0 || team.is_super() {
            return true;
        }
        self.entries
            .get(&(number, team))
            .map(|e| e.active)
            .unwrap_or(false)
    }

    /// Entry details, if the switch was ever actuated.
    pub fn get(&self, number: u8, team: Team) -> Option<&SwitchEntry> {
        self.entries.get(&(number, team))
    }

    /// Open a switch; `end_tick` makes it timed. Returns true when the
    /// state actually changed (idempotent re-application returns false).
    pub fn set_open(&mut self, number: u8, team: Team, now: u32, end_tick: Option<u32>) -> bool {
        let kind = if end_tick.is_some() {
            SwitchKind::TimedOpen
        } else {
            SwitchKind::Open
        };
        self.actuate(number, team, true, kind, now, end_tick)
    }

    /// Close a switch; `end_tick` makes it timed.
    pub fn set_closed(&mut self, number: u8, team: Team, now: u32, end_tick: Option<u32>) -> bool {
        let kind = if end_tick.is_some() {
            SwitchKind::TimedClose
        } else {
            SwitchKind::Close
        };
        self.actuate(number, team, false, kind, now, end_tick)
    }

    fn actuate(
        &mut self,
        number: u8,
        team: Team,
        active: bool,
        kind: SwitchKind,
        now: u32,
        end_tick: Option<u32>,
    ) -> bool {
        if number == 0 {
            return false;
        }

        if team.is_super() {
            // Super actuations land on every registered team
            let teams: Vec<Team> = self.teams.iter().copied().collect();
            let mut changed = false;
            for team in teams {
                changed |= self.actuate_one(number, team, active, kind, now, end_tick);
            }
            return changed;
        }

        self.register_team(team);
        self.actuate_one(number, team, active, kind, now, end_tick)
    }

    fn actuate_one(
        &mut self,
        number: u8,
        team: Team,
        active: bool,
        kind: SwitchKind,
        now: u32,
        end_tick: Option<u32>,
    ) -> bool {
        let entry = self.entries.entry((number, team)).or_insert(SwitchEntry {
            active: !active, // force a change below for new entries
            end_tick: None,
            kind,
            last_update_tick: now,
        });

        if entry.active == active && entry.kind == kind {
            return false;
        }

        entry.active = active;
        entry.kind = kind;
        entry.end_tick = end_tick;
        entry.last_update_tick = now;
        true
    }

    /// Revert every timed actuation whose end tick has passed.
    /// Runs once per tick, owned by the world loop.
    pub fn tick(&mut self, now: u32) {
        for ((number, team), entry) in self.entries.iter_mut() {
            let Some(end) = entry.end_tick else { continue };
            if now < end {
                continue;
            }

            entry.active = !entry.active;
            entry.end_tick = None;
            entry.last_update_tick = now;
            debug!(
                number,
                team = team.0,
                active = entry.active,
                "timed switch reverted"
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_zero_always_active() {
        let table = SwitchTable::new();
        assert!(table.is_active(0, Team(0)));
        assert!(table.is_active(0, Team(5)));
    }

    #[test]
    fn test_open_close_cycle() {
        let mut table = SwitchTable::new();
        let team = Team(1);

        assert!(!table.is_active(7, team));
        assert!(table.set_open(7, team, 10, None));
        assert!(table.is_active(7, team));

        // Idempotent: reopening an open switch changes nothing
        assert!(!table.set_open(7, team, 11, None));
        assert_eq!(table.get(7, team).unwrap().last_update_tick, 10);

        assert!(table.set_closed(7, team, 12, None));
        assert!(!table.is_active(7, team));
    }

    #[test]
    fn test_per_team_isolation() {
        let mut table = SwitchTable::new();
        table.set_open(3, Team(0), 0, None);

        assert!(table.is_active(3, Team(0)));
        assert!(!table.is_active(3, Team(1)));
    }

    #[test]
    fn test_timed_open_reverts() {
        let mut table = SwitchTable::new();
        table.set_open(5, Team(0), 100, Some(200));
        assert!(table.is_active(5, Team(0)));

        table.tick(150);
        assert!(table.is_active(5, Team(0)), "not yet");

        table.tick(200);
        assert!(!table.is_active(5, Team(0)), "reverted at end tick");
        assert_eq!(table.get(5, Team(0)).unwrap().end_tick, None);
    }

    #[test]
    fn test_timed_close_reverts() {
        let mut table = SwitchTable::new();
        table.set_open(5, Team(0), 0, None);
        table.set_closed(5, Team(0), 100, Some(150));
        assert!(!table.is_active(5, Team(0)));

        table.tick(150);
        assert!(table.is_active(5, Team(0)), "closed interval over");
    }

    #[test]
    fn test_super_team_bypasses_and_broadcasts() {
        let mut table = SwitchTable::new();
        table.register_team(Team(0));
        table.register_team(Team(1));

        // Super reads everything as active
        assert!(table.is_active(42, Team::SUPER));

        // Super actuation lands on every registered team
        assert!(table.set_open(8, Team::SUPER, 0, None));
        assert!(table.is_active(8, Team(0)));
        assert!(table.is_active(8, Team(1)));
        assert!(!table.is_active(8, Team(2)), "unregistered team untouched");
    }
}
