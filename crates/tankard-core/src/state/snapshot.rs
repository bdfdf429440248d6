use super::*;

use contracts::{clock_stamp, PlayerView, Snapshot, SCHEMA_VERSION_V1};

/// TTL cache for the snapshot projection. Mutating commands mark it dirty
/// before any subsequent read, so a snapshot taken right after a mutation
/// always reflects it — the TTL only spares rebuilds between mutations.
#[derive(Debug)]
pub(super) struct SnapshotCache {
    cached: Option<CachedSnapshot>,
    ttl_hours: f64,
    dirty: bool,
}

#[derive(Debug)]
struct CachedSnapshot {
    snapshot: Snapshot,
    built_at: f64,
}

impl SnapshotCache {
    pub(super) fn new(ttl_hours: f64) -> Self {
        Self {
            cached: None,
            ttl_hours: ttl_hours.max(0.0),
            dirty: true,
        }
    }

    pub(super) fn invalidate(&mut self) {
        self.dirty = true;
    }

    fn fresh(&self, now: f64) -> Option<&Snapshot> {
        if self.dirty {
            return None;
        }
        let cached = self.cached.as_ref()?;
        (now - cached.built_at < self.ttl_hours).then_some(&cached.snapshot)
    }

    fn store(&mut self, snapshot: Snapshot, now: f64) {
        self.cached = Some(CachedSnapshot {
            snapshot,
            built_at: now,
        });
        self.dirty = false;
    }
}

impl GameState {
    /// Current snapshot, served from cache unless forced, dirty, or past
    /// the TTL.
    pub fn snapshot(&mut self, force: bool) -> Snapshot {
        let now = self.clock.now();
        if !force {
            if let Some(snapshot) = self.snapshot_cache.fresh(now) {
                return snapshot.clone();
            }
        }

        tracing::debug!(game_time = now, force, "rebuilding snapshot");
        let snapshot = self.build_snapshot();
        self.snapshot_cache.store(snapshot.clone(), now);
        snapshot
    }

    fn build_snapshot(&mut self) -> Snapshot {
        let present_npcs = self.present_npc_views();
        let now = self.clock.now();
        Snapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: self.config.session_id.clone(),
            game_time: now,
            created_at: clock_stamp(now),
            player: PlayerView {
                area: self.player.area.clone(),
                gold: self.player.gold,
                inventory: self.player.inventory.clone(),
                active_bounties: self
                    .player
                    .active_bounties
                    .iter()
                    .filter(|(_, progress)| !progress.completed)
                    .map(|(id, _)| id.clone())
                    .collect(),
            },
            present_npcs,
            recent_events: self.event_log.recent(self.config.snapshot_recent_events),
            economy: self.economy.view(),
        }
    }
}
