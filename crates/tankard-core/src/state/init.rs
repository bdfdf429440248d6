use super::*;

use contracts::{ContentPack, PlayerRecord, SavedState, BountyProgressRecord, SCHEMA_VERSION_V1};

impl GameState {
    pub fn new(config: SessionConfig, content: &ContentPack) -> Self {
        let areas: BTreeMap<String, AreaDefinition> = content
            .areas
            .iter()
            .map(|area| (area.id.clone(), area.clone()))
            .collect();
        let starting_area = if areas.contains_key(&config.starting_area) {
            config.starting_area.clone()
        } else {
            let fallback = areas.keys().next().cloned().unwrap_or_default();
            tracing::warn!(
                configured = %config.starting_area,
                fallback = %fallback,
                "configured starting area missing from content"
            );
            fallback
        };

        let player = Player {
            area: starting_area.clone(),
            gold: config.starting_gold.max(0),
            inventory: BTreeMap::new(),
            active_bounties: BTreeMap::new(),
            last_work_at: None,
        };

        let mut state = Self {
            areas,
            items: content
                .items
                .iter()
                .map(|item| (item.id.clone(), item.clone()))
                .collect(),
            bounty_board: content
                .bounties
                .iter()
                .map(|bounty| (bounty.id.clone(), bounty.clone()))
                .collect(),
            clock: GameClock::new(),
            player,
            roster: NpcRoster::from_definitions(content.npcs.iter().cloned()),
            economy: Economy::new(content.jobs.iter().cloned()),
            presence: PresenceCache::new(config.presence_refresh_hours),
            event_log: EventLog::new(config.session_id.clone(), config.event_log_capacity),
            snapshot_cache: SnapshotCache::new(config.snapshot_ttl_hours),
            resolver: CommandTable::with_defaults(),
            config,
        };

        state.push_event(
            EventType::SessionStarted,
            Some(json!({
                "seed": state.config.seed.to_string(),
                "area": starting_area,
            })),
        );
        // Opening presence without arrival events; the tavern is simply
        // already populated when the session begins.
        state.refresh_presence_silently();
        state
    }

    /// Rebuild a session from its persisted projection. Loading never moves
    /// time backwards relative to zero; the restored clock resumes exactly
    /// where the save left off.
    pub fn restore(config: SessionConfig, content: &ContentPack, saved: &SavedState) -> Self {
        let mut state = Self::new(config, content);

        state.clock = GameClock::starting_at(saved.game_time.max(0.0));
        state.player = Player {
            area: if state.areas.contains_key(&saved.player.area) {
                saved.player.area.clone()
            } else {
                state.player.area.clone()
            },
            gold: saved.player.gold.max(0),
            inventory: saved.player.inventory.clone(),
            active_bounties: saved
                .player
                .active_bounties
                .iter()
                .map(|(id, record)| {
                    (
                        id.clone(),
                        BountyProgress {
                            accepted_at: record.accepted_at,
                            completed: record.completed,
                        },
                    )
                })
                .collect(),
            last_work_at: saved.player.last_work_at,
        };
        state.roster.restore_records(&saved.npcs);
        let jobs = state.economy.jobs().cloned().collect::<Vec<_>>();
        state.economy = Economy::restore(&saved.economy, jobs);
        state.event_log = EventLog::restore(
            state.config.session_id.clone(),
            state.config.event_log_capacity,
            saved.next_sequence,
            saved.recent_events.clone(),
        );
        state.presence = PresenceCache::new(state.config.presence_refresh_hours);
        state.snapshot_cache = SnapshotCache::new(state.config.snapshot_ttl_hours);

        state.push_event(
            EventType::SessionRestored,
            Some(json!({ "game_time": saved.game_time })),
        );
        state.refresh_presence_silently();
        state
    }

    /// Serialize the authoritative state for the persistence collaborator.
    pub fn save_state(&self) -> SavedState {
        SavedState {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.config.session_id.clone(),
            game_time: self.clock.now(),
            next_sequence: self.event_log.next_sequence(),
            player: PlayerRecord {
                area: self.player.area.clone(),
                gold: self.player.gold,
                inventory: self.player.inventory.clone(),
                active_bounties: self
                    .player
                    .active_bounties
                    .iter()
                    .map(|(id, progress)| {
                        (
                            id.clone(),
                            BountyProgressRecord {
                                accepted_at: progress.accepted_at,
                                completed: progress.completed,
                            },
                        )
                    })
                    .collect(),
                last_work_at: self.player.last_work_at,
            },
            npcs: self.roster.records(),
            economy: self.economy.record(),
            recent_events: self.event_log.iter().cloned().collect(),
        }
    }
}
