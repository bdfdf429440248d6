//! Derived NPC presence with a short validity window.
//!
//! Presence is always a pure function of (definitions, game time, seed):
//! the cache is recomputed wholesale on miss and swapped atomically, never
//! patched incrementally. The refresh window is measured in game-hours and
//! comes from `SessionConfig::presence_refresh_hours`.

use std::collections::HashSet;

use contracts::{NpcDefinition, HOURS_PER_DAY};

use crate::npc::NpcRoster;
use crate::seed::{mix_seed, sample_range_i64, stable_str_hash};

/// Ids that entered or left the presence set across one recompute, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceDiff {
    pub arrived: Vec<String>,
    pub departed: Vec<String>,
}

impl PresenceDiff {
    pub fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.departed.is_empty()
    }
}

#[derive(Debug)]
pub struct PresenceCache {
    ordered_ids: Vec<String>,
    lookup: HashSet<String>,
    last_computed_at: Option<f64>,
    min_refresh_interval: f64,
    dirty: bool,
}

impl PresenceCache {
    pub fn new(min_refresh_interval: f64) -> Self {
        Self {
            ordered_ids: Vec::new(),
            lookup: HashSet::new(),
            last_computed_at: None,
            min_refresh_interval: min_refresh_interval.max(0.0),
            dirty: true,
        }
    }

    /// Force the next access to recompute regardless of the window.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_stale(&self, now: f64) -> bool {
        if self.dirty {
            return true;
        }
        match self.last_computed_at {
            None => true,
            Some(at) => now - at >= self.min_refresh_interval,
        }
    }

    /// Recompute only when the cache is stale. Returns the diff when a
    /// recompute happened.
    pub fn refresh_if_stale(
        &mut self,
        roster: &NpcRoster,
        now: f64,
        seed: u64,
        departure_chance_pct: u8,
    ) -> Option<PresenceDiff> {
        if !self.is_stale(now) {
            return None;
        }
        Some(self.refresh(roster, now, seed, departure_chance_pct))
    }

    /// Wholesale recompute. The new set replaces the old atomically; no NPC
    /// is ever partially present.
    pub fn refresh(
        &mut self,
        roster: &NpcRoster,
        now: f64,
        seed: u64,
        departure_chance_pct: u8,
    ) -> PresenceDiff {
        let mut next: Vec<String> = roster
            .definitions()
            .filter(|definition| npc_present_at(definition, now, seed, departure_chance_pct))
            .map(|definition| definition.id.clone())
            .collect();
        next.sort();
        let next_lookup: HashSet<String> = next.iter().cloned().collect();

        let arrived = next
            .iter()
            .filter(|id| !self.lookup.contains(*id))
            .cloned()
            .collect();
        let departed = self
            .ordered_ids
            .iter()
            .filter(|id| !next_lookup.contains(*id))
            .cloned()
            .collect();

        self.ordered_ids = next;
        self.lookup = next_lookup;
        self.last_computed_at = Some(now);
        self.dirty = false;

        PresenceDiff { arrived, departed }
    }

    /// O(1) membership test.
    pub fn is_present(&self, npc_id: &str) -> bool {
        self.lookup.contains(npc_id)
    }

    /// Present ids in sorted order.
    pub fn present_ids(&self) -> &[String] {
        &self.ordered_ids
    }

    pub fn last_computed_at(&self) -> Option<f64> {
        self.last_computed_at
    }
}

/// Schedule test plus the per-NPC-per-day departure roll. The roll streams
/// on (npc id, day index) so it cannot flicker between refreshes within
/// the same day.
fn npc_present_at(definition: &NpcDefinition, now: f64, seed: u64, departure_chance_pct: u8) -> bool {
    let hour = now.rem_euclid(HOURS_PER_DAY);
    let on_schedule = definition
        .schedule
        .iter()
        .any(|(start, end)| interval_contains(*start, *end, hour));
    if !on_schedule {
        return false;
    }

    let day = (now / HOURS_PER_DAY) as u64;
    let roll = sample_range_i64(
        mix_seed(seed, stable_str_hash(&definition.id)),
        day,
        0,
        99,
    );
    roll >= i64::from(departure_chance_pct)
}

/// `[start, end)` containment. `start > end` wraps midnight and is treated
/// as the two sub-intervals `[start, 24)` and `[0, end)`; `start == end`
/// is empty.
pub fn interval_contains(start: f64, end: f64, hour: f64) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Disposition;
    use std::collections::BTreeMap;

    fn npc(id: &str, schedule: Vec<(f64, f64)>) -> NpcDefinition {
        NpcDefinition {
            id: id.to_string(),
            name: id.to_string(),
            schedule,
            disposition: Disposition::Neutral,
            base_inventory: BTreeMap::new(),
        }
    }

    fn roster_of(definitions: Vec<NpcDefinition>) -> NpcRoster {
        NpcRoster::from_definitions(definitions)
    }

    #[test]
    fn midnight_wraparound_schedule() {
        let night_owl = npc("night_owl", vec![(22.0, 6.0)]);
        assert!(npc_present_at(&night_owl, 23.0, 1, 0));
        assert!(npc_present_at(&night_owl, 2.0, 1, 0));
        assert!(!npc_present_at(&night_owl, 12.0, 1, 0));
    }

    #[test]
    fn interval_edges_are_half_open() {
        assert!(interval_contains(9.0, 17.0, 9.0));
        assert!(!interval_contains(9.0, 17.0, 17.0));
        assert!(interval_contains(22.0, 6.0, 22.0));
        assert!(!interval_contains(22.0, 6.0, 6.0));
        assert!(!interval_contains(9.0, 9.0, 9.0));
    }

    #[test]
    fn refresh_is_deterministic_for_fixed_seed_and_time() {
        let roster = roster_of(vec![
            npc("a", vec![(8.0, 20.0)]),
            npc("b", vec![(8.0, 20.0)]),
            npc("c", vec![(21.0, 23.0)]),
        ]);

        let mut cache_one = PresenceCache::new(0.1);
        let mut cache_two = PresenceCache::new(0.1);
        cache_one.refresh(&roster, 10.0, 42, 30);
        cache_two.refresh(&roster, 10.0, 42, 30);

        assert_eq!(cache_one.present_ids(), cache_two.present_ids());
        assert!(!cache_one.is_present("c"));
    }

    #[test]
    fn departure_roll_is_stable_within_a_day() {
        let roster = roster_of(vec![npc("a", vec![(0.0, 24.0)])]);
        let mut cache = PresenceCache::new(0.0);

        cache.refresh(&roster, 1.0, 7, 50);
        let morning = cache.present_ids().to_vec();
        cache.refresh(&roster, 13.0, 7, 50);
        let evening = cache.present_ids().to_vec();
        assert_eq!(morning, evening, "same day, same roll");
    }

    #[test]
    fn refresh_if_stale_respects_the_window() {
        let roster = roster_of(vec![npc("a", vec![(0.0, 24.0)])]);
        let mut cache = PresenceCache::new(0.5);

        assert!(cache.refresh_if_stale(&roster, 1.0, 1, 0).is_some());
        assert!(cache.refresh_if_stale(&roster, 1.2, 1, 0).is_none());
        assert!(cache.refresh_if_stale(&roster, 1.5, 1, 0).is_some());

        cache.invalidate();
        assert!(cache.refresh_if_stale(&roster, 1.5, 1, 0).is_some());
    }

    #[test]
    fn diff_reports_arrivals_and_departures() {
        let roster = roster_of(vec![
            npc("day_shift", vec![(8.0, 18.0)]),
            npc("night_shift", vec![(18.0, 2.0)]),
        ]);
        let mut cache = PresenceCache::new(0.0);

        let diff = cache.refresh(&roster, 10.0, 1, 0);
        assert_eq!(diff.arrived, vec!["day_shift".to_string()]);
        assert!(diff.departed.is_empty());

        let diff = cache.refresh(&roster, 19.0, 1, 0);
        assert_eq!(diff.arrived, vec!["night_shift".to_string()]);
        assert_eq!(diff.departed, vec!["day_shift".to_string()]);
    }
}
