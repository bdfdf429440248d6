use super::*;

use contracts::{
    clock_stamp, Command, CommandOutcome, Disposition, ItemDefinition, RejectReason,
    SCHEMA_VERSION_V1,
};

use crate::seed::{mix_seed, sample_range_i64, stable_str_hash};

const MAX_WAIT_HOURS: f64 = 24.0;
const GAMBLE_WIN_PCT: i64 = 47;
const STREAM_GAMBLE: u64 = 0x5eed_0010;

/// What a successfully applied command produced. Handlers validate every
/// precondition before their first mutation, so an `Err` means nothing
/// changed.
struct Applied {
    narrative: String,
    events: Vec<u64>,
    affects_presence: bool,
}

impl GameState {
    /// Deterministic path: resolve raw text through the grammar table and
    /// dispatch. Fast, offline, and the fallback when no language backend
    /// is configured.
    pub fn process_command(&mut self, raw: &str) -> CommandOutcome {
        let command = self.resolver.resolve(raw);
        self.dispatch(command)
    }

    /// Grammar-only resolution, for callers that layer their own fallback
    /// (the LLM-assisted session facade).
    pub fn resolve(&self, raw: &str) -> Command {
        self.resolver.resolve(raw)
    }

    /// Apply one typed command: validate, mutate, emit events, invalidate
    /// caches, snapshot. Commands are atomic; a precondition failure
    /// returns a specific reason and leaves state untouched.
    pub fn dispatch(&mut self, command: Command) -> CommandOutcome {
        let unknown_raw = match &command {
            Command::Unknown { raw } => Some(raw.clone()),
            _ => None,
        };

        let result = match command {
            Command::Look => self.handle_look(),
            Command::Status => self.handle_status(),
            Command::Inventory => self.handle_inventory(),
            Command::Help => self.handle_help(),
            Command::Npcs => self.handle_npcs(),
            Command::Jobs => self.handle_jobs(),
            Command::Bounties => self.handle_bounties(),
            Command::Go { area } => self.handle_go(&area),
            Command::Wait { hours } => self.handle_wait(hours),
            Command::Buy { item } => self.handle_buy(&item),
            Command::Talk { npc } => self.handle_talk(&npc),
            Command::Work { job } => self.handle_work(&job),
            Command::Gamble { wager } => self.handle_gamble(wager),
            Command::AcceptBounty { bounty } => self.handle_accept_bounty(&bounty),
            Command::TurnInBounty { bounty } => self.handle_turn_in_bounty(&bounty),
            Command::Unknown { .. } => Err(RejectReason::UnknownCommand),
        };

        match result {
            Ok(applied) => {
                if applied.affects_presence {
                    self.presence.invalidate();
                }
                self.snapshot_cache.invalidate();
                self.check_invariants();
                let snapshot = self.snapshot(false);
                CommandOutcome {
                    schema_version: SCHEMA_VERSION_V1.to_string(),
                    success: true,
                    reject_reason: None,
                    narrative: applied.narrative,
                    events_emitted: applied.events,
                    snapshot,
                }
            }
            Err(reason) => {
                tracing::debug!(reason = reason.as_str(), "command rejected");
                let narrative = self.refusal_narrative(reason, unknown_raw.as_deref());
                let snapshot = self.snapshot(false);
                CommandOutcome {
                    schema_version: SCHEMA_VERSION_V1.to_string(),
                    success: false,
                    reject_reason: Some(reason),
                    narrative,
                    events_emitted: Vec::new(),
                    snapshot,
                }
            }
        }
    }

    fn handle_look(&mut self) -> Result<Applied, RejectReason> {
        let present = self.present_npc_views();
        let mut narrative = match self.areas.get(&self.player.area) {
            Some(area) => format!("{}. {}", area.name, area.description),
            None => "You are somewhere unmapped.".to_string(),
        };
        if present.is_empty() {
            narrative.push_str(" Nobody else is about.");
        } else {
            let names = present
                .iter()
                .map(|npc| npc.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            narrative.push_str(&format!(" Here: {names}."));
        }
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_status(&mut self) -> Result<Applied, RejectReason> {
        let open_bounties = self
            .player
            .active_bounties
            .values()
            .filter(|progress| !progress.completed)
            .count();
        let mut narrative = format!(
            "It is {}. You are in the {} with {} gold.",
            clock_stamp(self.clock.now()),
            self.player.area,
            self.player.gold
        );
        if open_bounties > 0 {
            narrative.push_str(&format!(" Open bounties: {open_bounties}."));
        }
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_inventory(&mut self) -> Result<Applied, RejectReason> {
        let narrative = if self.player.inventory.is_empty() {
            "Your pockets hold nothing but lint.".to_string()
        } else {
            let lines = self
                .player
                .inventory
                .iter()
                .map(|(id, quantity)| {
                    let name = self
                        .items
                        .get(id)
                        .map(|item| item.name.as_str())
                        .unwrap_or(id.as_str());
                    format!("{name} x{quantity}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("You carry: {lines}.")
        };
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_help(&mut self) -> Result<Applied, RejectReason> {
        Ok(Applied {
            narrative: "You can: look, status, inventory, npcs, jobs, bounties, go <area>, \
                        wait [hours], buy <item>, talk <npc>, work <job>, gamble <gold>, \
                        accept <bounty>, turn in <bounty>."
                .to_string(),
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_npcs(&mut self) -> Result<Applied, RejectReason> {
        let present = self.present_npc_views();
        let narrative = if present.is_empty() {
            "The tavern is quiet at this hour.".to_string()
        } else {
            let lines = present
                .iter()
                .map(|npc| {
                    format!(
                        "{} ({})",
                        npc.name,
                        format!("{:?}", npc.disposition).to_lowercase()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("Around the tavern: {lines}.")
        };
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_jobs(&mut self) -> Result<Applied, RejectReason> {
        let lines = self
            .economy
            .jobs()
            .map(|job| {
                format!(
                    "{} ({} gold, {:.0}h)",
                    job.name, job.wage, job.duration_hours
                )
            })
            .collect::<Vec<_>>();
        let narrative = if lines.is_empty() {
            "No work is on offer today.".to_string()
        } else {
            format!("Work on offer: {}.", lines.join(", "))
        };
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_bounties(&mut self) -> Result<Applied, RejectReason> {
        let lines = self
            .bounty_board
            .values()
            .map(|bounty| {
                let status = match self.player.active_bounties.get(&bounty.id) {
                    Some(progress) if progress.completed => "done",
                    Some(_) => "taken",
                    None => "open",
                };
                format!("{} [{status}] — {} gold", bounty.title, bounty.reward_gold)
            })
            .collect::<Vec<_>>();
        let narrative = if lines.is_empty() {
            "The bounty board is bare.".to_string()
        } else {
            format!("The board reads: {}.", lines.join("; "))
        };
        Ok(Applied {
            narrative,
            events: Vec::new(),
            affects_presence: false,
        })
    }

    fn handle_go(&mut self, area: &str) -> Result<Applied, RejectReason> {
        let destination = self.find_area(area).ok_or(RejectReason::UnknownArea)?;
        if destination == self.player.area {
            return Err(RejectReason::AlreadyThere);
        }

        let from = std::mem::replace(&mut self.player.area, destination.clone());
        let sequence = self.push_event(
            EventType::PlayerMoved,
            Some(json!({ "from": from, "to": destination })),
        );
        let narrative = self
            .areas
            .get(&destination)
            .map(|area| format!("{}. {}", area.name, area.description))
            .unwrap_or_else(|| format!("You make your way to the {destination}."));
        Ok(Applied {
            narrative,
            events: vec![sequence],
            affects_presence: true,
        })
    }

    fn handle_wait(&mut self, hours: f64) -> Result<Applied, RejectReason> {
        if !hours.is_finite() || hours <= 0.0 || hours > MAX_WAIT_HOURS {
            return Err(RejectReason::InvalidDuration);
        }

        let mut events = self
            .advance_time(hours)
            .map_err(|_| RejectReason::InvalidDuration)?;
        events.push(self.push_event(EventType::TimePassed, Some(json!({ "hours": hours }))));
        Ok(Applied {
            narrative: format!("Time drifts by. It is now {}.", clock_stamp(self.clock.now())),
            events,
            affects_presence: true,
        })
    }

    fn handle_buy(&mut self, item: &str) -> Result<Applied, RejectReason> {
        let definition = self
            .find_item(item)
            .cloned()
            .ok_or(RejectReason::UnknownItem)?;
        let price = self.economy.price_of(definition.base_price);
        if self.player.gold < price {
            return Err(RejectReason::InsufficientGold);
        }

        self.player.gold -= price;
        *self
            .player
            .inventory
            .entry(definition.id.clone())
            .or_insert(0) += 1;
        let sequence = self.push_event(
            EventType::ItemPurchased,
            Some(json!({
                "item": definition.id,
                "price": price,
                "gold_after": self.player.gold,
            })),
        );
        Ok(Applied {
            narrative: format!("You pay {price} gold for a {}.", definition.name),
            events: vec![sequence],
            affects_presence: false,
        })
    }

    fn handle_talk(&mut self, npc: &str) -> Result<Applied, RejectReason> {
        let (npc_id, npc_name, disposition) = {
            let entry = self.roster.find(npc).ok_or(RejectReason::UnknownNpc)?;
            (
                entry.definition.id.clone(),
                entry.definition.name.clone(),
                entry.definition.disposition,
            )
        };
        if !self.is_npc_present(&npc_id) {
            return Err(RejectReason::NpcNotPresent);
        }

        let before = self
            .roster
            .get(&npc_id)
            .map(|entry| entry.state.relationship)
            .unwrap_or(0.0);
        let now = self.clock.now();
        let after = self
            .roster
            .adjust_relationship(&npc_id, relationship_delta(disposition), now)
            .unwrap_or(before);

        let mut events = vec![self.push_event(
            EventType::ConversationHeld,
            Some(json!({ "npc": npc_id })),
        )];
        if (after - before).abs() > f64::EPSILON {
            events.push(self.push_event(
                EventType::RelationshipShifted,
                Some(json!({ "npc": npc_id, "relationship": after })),
            ));
        }
        Ok(Applied {
            narrative: talk_line(&npc_name, disposition),
            events,
            affects_presence: false,
        })
    }

    fn handle_work(&mut self, job: &str) -> Result<Applied, RejectReason> {
        let job = self.find_job(job).cloned().ok_or(RejectReason::UnknownJob)?;
        let now = self.clock.now();
        if let Some(last) = self.player.last_work_at {
            if now - last < self.config.work_cooldown_hours {
                return Err(RejectReason::CooldownActive);
            }
        }

        let mut events = self
            .advance_time(job.duration_hours.max(0.0))
            .map_err(|_| RejectReason::InvalidDuration)?;
        self.player.gold += job.wage;
        self.player.last_work_at = Some(self.clock.now());
        events.push(self.push_event(
            EventType::WorkCompleted,
            Some(json!({
                "job": job.id,
                "wage": job.wage,
                "gold_after": self.player.gold,
            })),
        ));
        Ok(Applied {
            narrative: format!(
                "You finish the {} and pocket {} gold.",
                job.name.to_lowercase(),
                job.wage
            ),
            events,
            affects_presence: true,
        })
    }

    fn handle_gamble(&mut self, wager: i64) -> Result<Applied, RejectReason> {
        if wager <= 0 {
            return Err(RejectReason::InvalidWager);
        }
        if self.player.gold < wager {
            return Err(RejectReason::InsufficientGold);
        }

        let roll = sample_range_i64(
            mix_seed(self.config.seed, STREAM_GAMBLE),
            self.event_log.next_sequence(),
            0,
            99,
        );
        let won = roll < GAMBLE_WIN_PCT;
        if won {
            self.player.gold += wager;
        } else {
            self.player.gold -= wager;
        }
        let sequence = self.push_event(
            EventType::GambleResolved,
            Some(json!({
                "wager": wager,
                "won": won,
                "gold_after": self.player.gold,
            })),
        );
        let narrative = if won {
            format!("The dice favor you: {wager} gold richer.")
        } else {
            format!("The dice turn cold. You lose {wager} gold.")
        };
        Ok(Applied {
            narrative,
            events: vec![sequence],
            affects_presence: false,
        })
    }

    fn handle_accept_bounty(&mut self, bounty: &str) -> Result<Applied, RejectReason> {
        let definition = self
            .find_bounty(bounty)
            .cloned()
            .ok_or(RejectReason::UnknownBounty)?;
        if self.player.active_bounties.contains_key(&definition.id) {
            return Err(RejectReason::BountyAlreadyActive);
        }

        let now = self.clock.now();
        self.player.active_bounties.insert(
            definition.id.clone(),
            BountyProgress {
                accepted_at: now,
                completed: false,
            },
        );
        let sequence = self.push_event(
            EventType::BountyAccepted,
            Some(json!({ "bounty": definition.id })),
        );
        Ok(Applied {
            narrative: format!("You tear the notice from the board: {}.", definition.title),
            events: vec![sequence],
            affects_presence: false,
        })
    }

    fn handle_turn_in_bounty(&mut self, bounty: &str) -> Result<Applied, RejectReason> {
        let definition = self
            .find_bounty(bounty)
            .cloned()
            .ok_or(RejectReason::UnknownBounty)?;
        match self.player.active_bounties.get(&definition.id) {
            None => return Err(RejectReason::BountyNotActive),
            Some(progress) if progress.completed => return Err(RejectReason::BountyNotActive),
            Some(_) => {}
        }
        if !self.is_npc_present(&definition.target_npc) {
            return Err(RejectReason::NpcNotPresent);
        }
        let held = self
            .player
            .inventory
            .get(&definition.required_item)
            .copied()
            .unwrap_or(0);
        if held == 0 {
            return Err(RejectReason::ObjectiveIncomplete);
        }

        if held == 1 {
            self.player.inventory.remove(&definition.required_item);
        } else {
            self.player
                .inventory
                .insert(definition.required_item.clone(), held - 1);
        }
        self.player.gold += definition.reward_gold;
        if let Some(progress) = self.player.active_bounties.get_mut(&definition.id) {
            progress.completed = true;
        }

        let mut events = vec![self.push_event(
            EventType::BountyCompleted,
            Some(json!({
                "bounty": definition.id,
                "reward": definition.reward_gold,
                "gold_after": self.player.gold,
            })),
        )];
        let now = self.clock.now();
        if let Some(after) = self
            .roster
            .adjust_relationship(&definition.target_npc, 0.1, now)
        {
            events.push(self.push_event(
                EventType::RelationshipShifted,
                Some(json!({ "npc": definition.target_npc, "relationship": after })),
            ));
        }
        Ok(Applied {
            narrative: format!(
                "The job is done. {} gold changes hands.",
                definition.reward_gold
            ),
            events,
            affects_presence: false,
        })
    }

    fn find_area(&self, needle: &str) -> Option<String> {
        if self.areas.contains_key(needle) {
            return Some(needle.to_string());
        }
        let lowered = needle.to_lowercase();
        self.areas
            .values()
            .find(|area| area.id.to_lowercase() == lowered || area.name.to_lowercase() == lowered)
            .map(|area| area.id.clone())
    }

    fn find_item(&self, needle: &str) -> Option<&ItemDefinition> {
        if let Some(item) = self.items.get(needle) {
            return Some(item);
        }
        let lowered = needle.to_lowercase();
        self.items
            .values()
            .find(|item| item.id.to_lowercase() == lowered || item.name.to_lowercase() == lowered)
    }

    fn find_job(&self, needle: &str) -> Option<&contracts::JobDefinition> {
        if let Some(job) = self.economy.job(needle) {
            return Some(job);
        }
        let lowered = needle.to_lowercase();
        self.economy
            .jobs()
            .find(|job| job.id.to_lowercase() == lowered || job.name.to_lowercase() == lowered)
    }

    fn find_bounty(&self, needle: &str) -> Option<&contracts::BountyDefinition> {
        if let Some(bounty) = self.bounty_board.get(needle) {
            return Some(bounty);
        }
        let lowered = needle.to_lowercase();
        self.bounty_board.values().find(|bounty| {
            bounty.id.to_lowercase() == lowered || bounty.title.to_lowercase() == lowered
        })
    }

    /// Every failure mode reads as an in-character line, never a raw error.
    fn refusal_narrative(&self, reason: RejectReason, raw: Option<&str>) -> String {
        match reason {
            RejectReason::UnknownCommand => {
                const LINES: [&str; 3] = [
                    "Grim squints at you across the bar. \"Come again?\"",
                    "Your words are lost in the tavern noise.",
                    "A nearby drinker shrugs; nobody understands what you mean.",
                ];
                let pick = stable_str_hash(raw.unwrap_or_default()) as usize % LINES.len();
                LINES[pick].to_string()
            }
            RejectReason::InsufficientGold => "Your purse is too light for that.".to_string(),
            RejectReason::NpcNotPresent => {
                "You scan the room, but they are nowhere to be seen.".to_string()
            }
            RejectReason::UnknownNpc => "Nobody by that name drinks here.".to_string(),
            RejectReason::UnknownArea => "No door leads that way.".to_string(),
            RejectReason::AlreadyThere => "You are already there.".to_string(),
            RejectReason::UnknownItem => "Nobody here sells such a thing.".to_string(),
            RejectReason::UnknownJob => "No such work is on offer.".to_string(),
            RejectReason::CooldownActive => {
                "You are still worn out from the last shift.".to_string()
            }
            RejectReason::InvalidWager => "The dealer laughs at your stake.".to_string(),
            RejectReason::InvalidDuration => {
                "The hours refuse to pass like that.".to_string()
            }
            RejectReason::UnknownBounty => "The board lists no such bounty.".to_string(),
            RejectReason::BountyAlreadyActive => "You have already taken that job.".to_string(),
            RejectReason::BountyNotActive => "That bounty is not yours to settle.".to_string(),
            RejectReason::ObjectiveIncomplete => {
                "You lack what the job calls for.".to_string()
            }
        }
    }
}

fn relationship_delta(disposition: Disposition) -> f64 {
    match disposition {
        Disposition::Friendly => 0.05,
        Disposition::Neutral => 0.03,
        Disposition::Gruff => 0.01,
        Disposition::Shady => 0.02,
    }
}

fn talk_line(name: &str, disposition: Disposition) -> String {
    match disposition {
        Disposition::Friendly => format!("{name} greets you warmly and trades a bit of gossip."),
        Disposition::Neutral => format!("{name} nods and chats about the weather on the road."),
        Disposition::Gruff => format!("{name} grunts, but doesn't wave you off."),
        Disposition::Shady => format!("{name} speaks quietly, eyes on the door."),
    }
}
