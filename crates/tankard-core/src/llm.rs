//! Narrow port to the language-model collaborator.
//!
//! The kernel only knows `generate(prompt) -> text`; transport, model
//! choice, and timeouts live behind the trait. Replies are expected to be
//! the serde representation of [`Command`]; anything else is an
//! `InvalidReply` and the caller degrades to the deterministic fallback.

use std::fmt;

use async_trait::async_trait;
use contracts::{clock_stamp, Command, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// No backend configured for this session.
    Disabled,
    RequestFailed(String),
    Timeout,
    InvalidReply(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "language backend disabled"),
            Self::RequestFailed(detail) => write!(f, "language backend request failed: {detail}"),
            Self::Timeout => write!(f, "language backend timed out"),
            Self::InvalidReply(detail) => write!(f, "language backend reply unparseable: {detail}"),
        }
    }
}

impl std::error::Error for LlmError {}

#[async_trait]
pub trait LanguageBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
    async fn is_healthy(&self) -> bool;
}

/// Build the parse prompt: the player's raw text plus a trimmed view of the
/// world (area, present NPCs, recent happenings), capped at `max_chars`.
pub fn build_parse_prompt(raw: &str, snapshot: &Snapshot, max_chars: usize) -> String {
    let verbs = "look, status, inventory, help, npcs, jobs, bounties, \
                 go <area>, wait <hours>, buy <item>, talk <npc>, work <job>, \
                 gamble <gold>, accept <bounty>, turn in <bounty>";

    let npcs = snapshot
        .present_npcs
        .iter()
        .map(|npc| npc.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let recent = snapshot
        .recent_events
        .iter()
        .rev()
        .take(5)
        .map(|event| format!("{:?}", event.event_type))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You translate tavern-goer requests into game commands.\n\
         Known commands: {verbs}.\n\
         Current time: {}. Player location: {}. Present: {npcs}.\n\
         Recent: {recent}.\n\
         Reply with ONLY a JSON object matching one command, e.g. \
         {{\"type\":\"buy\",\"item\":\"ale\"}} or {{\"type\":\"talk\",\"npc\":\"mira\"}}.\n\
         Player said: {raw:?}",
        clock_stamp(snapshot.game_time),
        snapshot.player.area,
    );
    if prompt.len() > max_chars {
        let mut cut = max_chars;
        while cut > 0 && !prompt.is_char_boundary(cut) {
            cut -= 1;
        }
        prompt.truncate(cut);
    }
    prompt
}

/// Extract a typed command from a model reply. Tolerates code fences and
/// surrounding prose; rejects replies that decode to `Unknown` so the
/// caller keeps the original text instead of the model's echo.
pub fn parse_reply(reply: &str) -> Result<Command, LlmError> {
    let start = reply
        .find('{')
        .ok_or_else(|| LlmError::InvalidReply("no JSON object in reply".to_string()))?;
    let end = reply
        .rfind('}')
        .ok_or_else(|| LlmError::InvalidReply("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(LlmError::InvalidReply("malformed JSON object".to_string()));
    }

    let command: Command = serde_json::from_str(&reply[start..=end])
        .map_err(|err| LlmError::InvalidReply(err.to_string()))?;
    if command.is_unknown() {
        return Err(LlmError::InvalidReply(
            "model returned the unknown variant".to_string(),
        ));
    }
    Ok(command)
}
