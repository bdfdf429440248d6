//! NPC roster: immutable definitions joined with per-session dynamic state.

use std::collections::BTreeMap;

use contracts::{NpcDefinition, NpcRecord};

#[derive(Debug, Clone, Default)]
pub struct NpcState {
    pub relationship: f64,
    pub last_interaction_at: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NpcEntry {
    pub definition: NpcDefinition,
    pub state: NpcState,
}

#[derive(Debug, Default)]
pub struct NpcRoster {
    entries: BTreeMap<String, NpcEntry>,
}

impl NpcRoster {
    pub fn from_definitions(definitions: impl IntoIterator<Item = NpcDefinition>) -> Self {
        let entries = definitions
            .into_iter()
            .map(|definition| {
                (
                    definition.id.clone(),
                    NpcEntry {
                        definition,
                        state: NpcState::default(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, npc_id: &str) -> Option<&NpcEntry> {
        self.entries.get(npc_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NpcEntry> {
        self.entries.values()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &NpcDefinition> {
        self.entries.values().map(|entry| &entry.definition)
    }

    /// Look an NPC up by id or (case-insensitive) display name.
    pub fn find(&self, needle: &str) -> Option<&NpcEntry> {
        if let Some(entry) = self.entries.get(needle) {
            return Some(entry);
        }
        let lowered = needle.to_lowercase();
        self.entries.values().find(|entry| {
            entry.definition.name.to_lowercase() == lowered
                || entry.definition.id.to_lowercase() == lowered
        })
    }

    /// Shift a relationship score, clamped to [-1, 1]. Returns the new
    /// score, or None for an unknown NPC.
    pub fn adjust_relationship(&mut self, npc_id: &str, delta: f64, now: f64) -> Option<f64> {
        let entry = self.entries.get_mut(npc_id)?;
        let updated = (entry.state.relationship + delta).clamp(-1.0, 1.0);
        entry.state.relationship = updated;
        entry.state.last_interaction_at = Some(now);
        Some(updated)
    }

    pub fn records(&self) -> BTreeMap<String, NpcRecord> {
        self.entries
            .iter()
            .map(|(id, entry)| {
                (
                    id.clone(),
                    NpcRecord {
                        relationship: entry.state.relationship,
                        last_interaction_at: entry.state.last_interaction_at,
                    },
                )
            })
            .collect()
    }

    pub fn restore_records(&mut self, records: &BTreeMap<String, NpcRecord>) {
        for (id, record) in records {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.state.relationship = record.relationship.clamp(-1.0, 1.0);
                entry.state.last_interaction_at = record.last_interaction_at;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Disposition;

    fn sample_definition(id: &str, name: &str) -> NpcDefinition {
        NpcDefinition {
            id: id.to_string(),
            name: name.to_string(),
            schedule: vec![(9.0, 17.0)],
            disposition: Disposition::Neutral,
            base_inventory: BTreeMap::new(),
        }
    }

    #[test]
    fn find_matches_id_and_name_case_insensitively() {
        let roster = NpcRoster::from_definitions(vec![sample_definition("old_tom", "Old Tom")]);
        assert!(roster.find("old_tom").is_some());
        assert!(roster.find("OLD TOM").is_some());
        assert!(roster.find("nobody").is_none());
    }

    #[test]
    fn relationship_clamps_to_unit_range() {
        let mut roster = NpcRoster::from_definitions(vec![sample_definition("mira", "Mira")]);
        let score = roster.adjust_relationship("mira", 3.0, 1.0).expect("known npc");
        assert_eq!(score, 1.0);
        let score = roster.adjust_relationship("mira", -5.0, 2.0).expect("known npc");
        assert_eq!(score, -1.0);
        assert_eq!(
            roster.get("mira").expect("known npc").state.last_interaction_at,
            Some(2.0)
        );
    }

    #[test]
    fn records_round_trip() {
        let mut roster = NpcRoster::from_definitions(vec![sample_definition("mira", "Mira")]);
        roster.adjust_relationship("mira", 0.25, 4.0);
        let records = roster.records();

        let mut fresh = NpcRoster::from_definitions(vec![sample_definition("mira", "Mira")]);
        fresh.restore_records(&records);
        assert_eq!(fresh.get("mira").expect("known npc").state.relationship, 0.25);
    }
}
