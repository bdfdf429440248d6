//! v1 cross-boundary contracts for the tavern kernel, API, and persistence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const HOURS_PER_DAY: f64 = 24.0;

/// Per-session tuning knobs. Cache windows and chance values are
/// configuration, never load-bearing for correctness; both TTLs are
/// measured in game-hours so the kernel stays deterministic under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub schema_version: String,
    pub session_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub starting_gold: i64,
    pub starting_area: String,
    pub event_log_capacity: usize,
    pub snapshot_recent_events: usize,
    /// Minimum game-hours between presence recomputations.
    pub presence_refresh_hours: f64,
    /// Chance (percent) that a scheduled NPC skips the tavern for a day.
    pub departure_chance_pct: u8,
    /// Game-hours a cached snapshot stays valid absent invalidation.
    pub snapshot_ttl_hours: f64,
    pub work_cooldown_hours: f64,
    pub llm_timeout_secs: u64,
    pub notes: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            session_id: "session_local_001".to_string(),
            seed: 1337,
            starting_gold: 20,
            starting_area: "taproom".to_string(),
            event_log_capacity: 256,
            snapshot_recent_events: 16,
            presence_refresh_hours: 0.1,
            departure_chance_pct: 12,
            snapshot_ttl_hours: 0.25,
            work_cooldown_hours: 4.0,
            llm_timeout_secs: 8,
            notes: None,
        }
    }
}

/// Fully-typed player intent produced by the resolver. `Unknown` is the
/// terminal fallback: resolution never fails, it degrades to this variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Look,
    Status,
    Inventory,
    Help,
    Npcs,
    Jobs,
    Bounties,
    Go { area: String },
    Wait { hours: f64 },
    Buy { item: String },
    Talk { npc: String },
    Work { job: String },
    Gamble { wager: i64 },
    AcceptBounty { bounty: String },
    TurnInBounty { bounty: String },
    Unknown { raw: String },
}

impl Command {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Specific precondition-failure codes, kept distinct from the generic
/// `UnknownCommand` so callers can phrase refusals precisely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientGold,
    NpcNotPresent,
    UnknownNpc,
    UnknownArea,
    AlreadyThere,
    UnknownItem,
    UnknownJob,
    CooldownActive,
    InvalidWager,
    InvalidDuration,
    UnknownBounty,
    BountyAlreadyActive,
    BountyNotActive,
    ObjectiveIncomplete,
    UnknownCommand,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientGold => "insufficient_gold",
            Self::NpcNotPresent => "npc_not_present",
            Self::UnknownNpc => "unknown_npc",
            Self::UnknownArea => "unknown_area",
            Self::AlreadyThere => "already_there",
            Self::UnknownItem => "unknown_item",
            Self::UnknownJob => "unknown_job",
            Self::CooldownActive => "cooldown_active",
            Self::InvalidWager => "invalid_wager",
            Self::InvalidDuration => "invalid_duration",
            Self::UnknownBounty => "unknown_bounty",
            Self::BountyAlreadyActive => "bounty_already_active",
            Self::BountyNotActive => "bounty_not_active",
            Self::ObjectiveIncomplete => "objective_incomplete",
            Self::UnknownCommand => "unknown_command",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStarted,
    SessionRestored,
    PlayerMoved,
    TimePassed,
    ItemPurchased,
    ConversationHeld,
    RelationshipShifted,
    WorkCompleted,
    GambleResolved,
    BountyAccepted,
    BountyCompleted,
    NpcArrived,
    NpcDeparted,
    MarketDrifted,
    PriceModifierApplied,
    PriceModifierExpired,
}

/// Append-only record of something that happened. Sequence numbers are
/// strictly increasing for the lifetime of a session, across eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub session_id: String,
    pub sequence: u64,
    pub game_time: f64,
    pub created_at: String,
    pub event_type: EventType,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Friendly,
    Neutral,
    Gruff,
    Shady,
}

/// Static NPC definition, loaded once per session from external content.
/// Schedule intervals are `[start, end)` hours-of-day; `start > end`
/// wraps midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcDefinition {
    pub id: String,
    pub name: String,
    pub schedule: Vec<(f64, f64)>,
    pub disposition: Disposition,
    #[serde(default)]
    pub base_inventory: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub base_price: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDefinition {
    pub id: String,
    pub name: String,
    pub wage: i64,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BountyDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub required_item: String,
    pub target_npc: String,
    pub reward_gold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AreaDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// The complete static content consumed by a session: read-only after load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentPack {
    #[serde(default)]
    pub areas: Vec<AreaDefinition>,
    #[serde(default)]
    pub npcs: Vec<NpcDefinition>,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
    #[serde(default)]
    pub bounties: Vec<BountyDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceModifier {
    pub modifier_id: String,
    pub multiplier_bps: i64,
    pub expires_at_hour: f64,
}

// ---------------------------------------------------------------------------
// Snapshot projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub area: String,
    pub gold: i64,
    pub inventory: BTreeMap<String, u32>,
    pub active_bounties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentNpcView {
    pub id: String,
    pub name: String,
    pub disposition: Disposition,
    pub relationship: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EconomyView {
    pub price_multiplier_bps: i64,
    pub active_modifiers: Vec<PriceModifier>,
}

/// Point-in-time, serializable projection of session state for display and
/// LLM context. Derived, never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub schema_version: String,
    pub session_id: String,
    pub game_time: f64,
    pub created_at: String,
    pub player: PlayerView,
    pub present_npcs: Vec<PresentNpcView>,
    pub recent_events: Vec<Event>,
    pub economy: EconomyView,
}

/// Everything a command produced: outcome flag, specific reject reason on
/// precondition failure, narrative text, emitted event sequences, and the
/// post-command snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOutcome {
    pub schema_version: String,
    pub success: bool,
    pub reject_reason: Option<RejectReason>,
    pub narrative: String,
    pub events_emitted: Vec<u64>,
    pub snapshot: Snapshot,
}

// ---------------------------------------------------------------------------
// Persistence projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BountyProgressRecord {
    pub accepted_at: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub area: String,
    pub gold: i64,
    pub inventory: BTreeMap<String, u32>,
    pub active_bounties: BTreeMap<String, BountyProgressRecord>,
    pub last_work_at: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcRecord {
    pub relationship: f64,
    pub last_interaction_at: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EconomyRecord {
    pub base_multiplier_bps: i64,
    pub modifiers: Vec<PriceModifier>,
}

/// Serialized session state handed to the persistence collaborator. The
/// kernel produces and consumes this; storage details live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedState {
    pub schema_version: String,
    pub session_id: String,
    pub game_time: f64,
    pub next_sequence: u64,
    pub player: PlayerRecord,
    pub npcs: BTreeMap<String, NpcRecord>,
    pub economy: EconomyRecord,
    pub recent_events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// API surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    SessionNotFound,
    SessionAlreadyExists,
    InvalidCommand,
    InvalidQuery,
    ContractVersionUnsupported,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_code, self.message)
    }
}

/// Render a game time as a human-readable stamp, e.g. `day 02, 14:30`.
pub fn clock_stamp(game_time: f64) -> String {
    let day = (game_time / HOURS_PER_DAY) as u64 + 1;
    let hour_of_day = game_time.rem_euclid(HOURS_PER_DAY);
    let hour = hour_of_day as u64;
    let minute = ((hour_of_day - hour as f64) * 60.0) as u64;
    format!("day {day:02}, {hour:02}:{minute:02}")
}

pub mod serde_u64_string {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_round_trips() {
        let config = SessionConfig::default();
        let encoded = serde_json::to_string(&config).expect("serialize");
        let decoded: SessionConfig = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(config, decoded);
    }

    #[test]
    fn seed_serializes_as_string() {
        let config = SessionConfig::default();
        let encoded = serde_json::to_value(&config).expect("serialize");
        assert_eq!(
            encoded.get("seed").and_then(serde_json::Value::as_str),
            Some("1337")
        );
    }

    #[test]
    fn command_tagging_is_snake_case() {
        let command = Command::Go {
            area: "cellar".to_string(),
        };
        let encoded = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            encoded.get("type").and_then(serde_json::Value::as_str),
            Some("go")
        );
    }

    #[test]
    fn clock_stamp_formats_day_and_time() {
        assert_eq!(clock_stamp(0.0), "day 01, 00:00");
        assert_eq!(clock_stamp(38.5), "day 02, 14:30");
    }
}
