use std::collections::BTreeMap;

mod commands;
mod init;
mod snapshot;

use contracts::{
    AreaDefinition, BountyDefinition, Event, EventType, ItemDefinition, PresentNpcView,
    SessionConfig, HOURS_PER_DAY,
};
use serde_json::{json, Value};

use crate::clock::{BoundaryKind, ClockError, GameClock};
use crate::economy::Economy;
use crate::event_log::EventLog;
use crate::npc::NpcRoster;
use crate::presence::PresenceCache;
use crate::resolver::CommandTable;

use snapshot::SnapshotCache;

#[derive(Debug, Clone, PartialEq)]
pub struct BountyProgress {
    pub accepted_at: f64,
    pub completed: bool,
}

#[derive(Debug)]
pub struct Player {
    pub area: String,
    pub gold: i64,
    pub inventory: BTreeMap<String, u32>,
    pub active_bounties: BTreeMap<String, BountyProgress>,
    pub last_work_at: Option<f64>,
}

/// The per-session world model. Owns every sub-component and sequences
/// calls between them; one command is fully resolved, applied, and
/// invalidated before the next is accepted.
pub struct GameState {
    config: SessionConfig,
    areas: BTreeMap<String, AreaDefinition>,
    items: BTreeMap<String, ItemDefinition>,
    bounty_board: BTreeMap<String, BountyDefinition>,
    clock: GameClock,
    player: Player,
    roster: NpcRoster,
    economy: Economy,
    presence: PresenceCache,
    event_log: EventLog,
    snapshot_cache: SnapshotCache,
    resolver: CommandTable,
}

impl GameState {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn events(&self) -> Vec<&Event> {
        self.event_log.iter().collect()
    }

    pub(crate) fn push_event_at(
        &mut self,
        at: f64,
        event_type: EventType,
        details: Option<Value>,
    ) -> u64 {
        self.event_log.append(at, event_type, details)
    }

    pub(crate) fn push_event(&mut self, event_type: EventType, details: Option<Value>) -> u64 {
        let now = self.clock.now();
        self.push_event_at(now, event_type, details)
    }

    /// Recompute presence if the validity window lapsed or an invalidation
    /// is pending. Read-path refreshes are silent: arrival/departure events
    /// are only emitted from boundary crossings in `advance_time`.
    pub(crate) fn refresh_presence_silently(&mut self) {
        let now = self.clock.now();
        let _ = self.presence.refresh_if_stale(
            &self.roster,
            now,
            self.config.seed,
            self.config.departure_chance_pct,
        );
    }

    pub fn is_npc_present(&mut self, npc_id: &str) -> bool {
        self.refresh_presence_silently();
        self.presence.is_present(npc_id)
    }

    pub fn present_npc_views(&mut self) -> Vec<PresentNpcView> {
        self.refresh_presence_silently();
        self.presence
            .present_ids()
            .iter()
            .filter_map(|id| self.roster.get(id))
            .map(|entry| PresentNpcView {
                id: entry.definition.id.clone(),
                name: entry.definition.name.clone(),
                disposition: entry.definition.disposition,
                relationship: entry.state.relationship,
            })
            .collect()
    }

    /// Advance the clock, servicing every crossed boundary individually
    /// and in order: presence re-evaluation and modifier expiry each hour,
    /// market drift each day. An NPC arriving and leaving within one
    /// advance produces both events. Zero delta does nothing at all.
    pub fn advance_time(&mut self, hours: f64) -> Result<Vec<u64>, ClockError> {
        let boundaries = self.clock.advance(hours)?;
        if hours == 0.0 {
            return Ok(Vec::new());
        }

        let mut emitted = Vec::new();
        for boundary in boundaries {
            match boundary.kind {
                BoundaryKind::Hour => {
                    let diff = self.presence.refresh(
                        &self.roster,
                        boundary.at,
                        self.config.seed,
                        self.config.departure_chance_pct,
                    );
                    for npc_id in &diff.arrived {
                        emitted.push(self.push_event_at(
                            boundary.at,
                            EventType::NpcArrived,
                            Some(json!({ "npc": npc_id })),
                        ));
                    }
                    for npc_id in &diff.departed {
                        emitted.push(self.push_event_at(
                            boundary.at,
                            EventType::NpcDeparted,
                            Some(json!({ "npc": npc_id })),
                        ));
                    }
                    for modifier in self.economy.expire_modifiers(boundary.at) {
                        emitted.push(self.push_event_at(
                            boundary.at,
                            EventType::PriceModifierExpired,
                            Some(json!({ "modifier": modifier.modifier_id })),
                        ));
                    }
                }
                BoundaryKind::Day => {
                    let day = (boundary.at / HOURS_PER_DAY) as u64;
                    let multiplier_bps = self.economy.drift_for_day(self.config.seed, day);
                    emitted.push(self.push_event_at(
                        boundary.at,
                        EventType::MarketDrifted,
                        Some(json!({ "price_multiplier_bps": multiplier_bps })),
                    ));
                    if let Some(modifier) =
                        self.economy
                            .spawn_daily_event(self.config.seed, day, boundary.at)
                    {
                        emitted.push(self.push_event_at(
                            boundary.at,
                            EventType::PriceModifierApplied,
                            Some(json!({
                                "modifier": modifier.modifier_id,
                                "multiplier_bps": modifier.multiplier_bps,
                                "expires_at_hour": modifier.expires_at_hour,
                            })),
                        ));
                    }
                }
            }
        }

        self.snapshot_cache.invalidate();
        Ok(emitted)
    }

    /// Loud-failure check for states that should be unreachable. Debug
    /// builds assert; release builds log with full context.
    pub(crate) fn check_invariants(&self) {
        debug_assert!(self.player.gold >= 0, "player gold went negative");
        if self.player.gold < 0 {
            tracing::error!(
                gold = self.player.gold,
                area = %self.player.area,
                "invariant violation: negative gold"
            );
        }
    }
}

#[cfg(test)]
mod tests;
