use super::*;

use contracts::{Command, ContentPack, RejectReason, SessionConfig};

use crate::content::builtin_content;

fn test_config() -> SessionConfig {
    SessionConfig {
        session_id: "test_session".to_string(),
        departure_chance_pct: 0,
        ..SessionConfig::default()
    }
}

fn content_with_pricey_ale() -> ContentPack {
    let mut pack = builtin_content();
    for item in &mut pack.items {
        if item.id == "ale" {
            item.base_price = 15;
        }
    }
    pack
}

#[test]
fn insufficient_gold_leaves_state_untouched() {
    let config = SessionConfig {
        starting_gold: 10,
        ..test_config()
    };
    let mut state = GameState::new(config, &content_with_pricey_ale());
    let before = state.snapshot(true);
    let events_before = state.event_log().len();

    let outcome = state.process_command("buy ale");

    assert!(!outcome.success);
    assert_eq!(outcome.reject_reason, Some(RejectReason::InsufficientGold));
    assert_eq!(state.player().gold, 10);
    assert!(outcome.events_emitted.is_empty());
    assert_eq!(state.event_log().len(), events_before);
    assert_eq!(outcome.snapshot, before, "snapshot unchanged on failure");
}

#[test]
fn snapshot_reflects_mutation_regardless_of_ttl() {
    let mut state = GameState::new(test_config(), &builtin_content());
    let before = state.snapshot(false);

    let outcome = state.process_command("buy bread");
    assert!(outcome.success);
    assert!(outcome.snapshot.player.gold < before.player.gold);

    let after = state.snapshot(false);
    assert_eq!(after.player.gold, outcome.snapshot.player.gold);
    assert!(after
        .player
        .inventory
        .contains_key("bread"));
}

#[test]
fn snapshot_is_served_from_cache_between_reads() {
    let mut state = GameState::new(test_config(), &builtin_content());
    let first = state.snapshot(false);
    let second = state.snapshot(false);
    assert_eq!(first, second);
}

#[test]
fn advance_time_zero_is_a_complete_noop() {
    let mut state = GameState::new(test_config(), &builtin_content());
    let before_now = state.now();
    let before_events = state.event_log().len();
    let before_snapshot = state.snapshot(false);

    let emitted = state.advance_time(0.0).expect("zero delta is valid");

    assert!(emitted.is_empty());
    assert_eq!(state.now(), before_now);
    assert_eq!(state.event_log().len(), before_events);
    assert_eq!(state.snapshot(false), before_snapshot);
}

#[test]
fn npc_arriving_and_leaving_within_one_advance_records_both() {
    let mut pack = builtin_content();
    pack.npcs = vec![contracts::NpcDefinition {
        id: "flash".to_string(),
        name: "Flash Visitor".to_string(),
        schedule: vec![(10.0, 11.0)],
        disposition: contracts::Disposition::Neutral,
        base_inventory: Default::default(),
    }];
    pack.bounties.clear();
    let mut state = GameState::new(test_config(), &pack);

    state.advance_time(12.0).expect("advance");

    let arrived = state
        .events()
        .iter()
        .position(|event| event.event_type == EventType::NpcArrived);
    let departed = state
        .events()
        .iter()
        .position(|event| event.event_type == EventType::NpcDeparted);
    let arrived = arrived.expect("arrival recorded");
    let departed = departed.expect("departure recorded");
    assert!(arrived < departed, "arrival precedes departure");
}

#[test]
fn event_sequences_are_strictly_increasing_across_commands() {
    let mut state = GameState::new(test_config(), &builtin_content());
    for raw in ["buy bread", "wait 2", "go cellar", "go taproom", "buy ale"] {
        state.process_command(raw);
    }

    let sequences: Vec<u64> = state.events().iter().map(|event| event.sequence).collect();
    assert!(
        sequences.windows(2).all(|pair| pair[0] < pair[1]),
        "sequences must strictly increase: {sequences:?}"
    );
    assert!(state.event_log().len() <= state.config().event_log_capacity);
}

#[test]
fn unknown_command_is_refused_in_character() {
    let mut state = GameState::new(test_config(), &builtin_content());
    let outcome = state.process_command("flibber the jabberwock");

    assert!(!outcome.success);
    assert_eq!(outcome.reject_reason, Some(RejectReason::UnknownCommand));
    assert!(!outcome.narrative.is_empty());
    assert!(
        !outcome.narrative.to_lowercase().contains("error"),
        "refusal must stay in character: {}",
        outcome.narrative
    );
}

#[test]
fn go_rejects_unknown_area_and_same_area() {
    let mut state = GameState::new(test_config(), &builtin_content());

    let outcome = state.dispatch(Command::Go {
        area: "moon".to_string(),
    });
    assert_eq!(outcome.reject_reason, Some(RejectReason::UnknownArea));

    let outcome = state.dispatch(Command::Go {
        area: "taproom".to_string(),
    });
    assert_eq!(outcome.reject_reason, Some(RejectReason::AlreadyThere));

    let outcome = state.dispatch(Command::Go {
        area: "cellar".to_string(),
    });
    assert!(outcome.success);
    assert_eq!(state.player().area, "cellar");
}

#[test]
fn work_pays_and_enforces_the_cooldown() {
    let mut state = GameState::new(test_config(), &builtin_content());
    let gold_before = state.player().gold;

    let outcome = state.process_command("work wash_dishes");
    assert!(outcome.success);
    assert_eq!(state.player().gold, gold_before + 3);
    assert!(state.now() >= 1.0);

    let outcome = state.process_command("work wash_dishes");
    assert!(!outcome.success);
    assert_eq!(outcome.reject_reason, Some(RejectReason::CooldownActive));
}

#[test]
fn talk_requires_presence_and_shifts_relationship() {
    let mut state = GameState::new(test_config(), &builtin_content());

    // Grim's shift covers the opening hour; Mira arrives at 9.
    let outcome = state.process_command("talk to mira");
    assert_eq!(outcome.reject_reason, Some(RejectReason::NpcNotPresent));

    let outcome = state.process_command("talk grim");
    assert!(outcome.success);
    assert!(state
        .events()
        .iter()
        .any(|event| event.event_type == EventType::ConversationHeld));
    assert!(state
        .events()
        .iter()
        .any(|event| event.event_type == EventType::RelationshipShifted));
}

#[test]
fn bounty_flow_happy_path_and_preconditions() {
    let mut state = GameState::new(test_config(), &builtin_content());

    let outcome = state.process_command("turn in rat_problem");
    assert_eq!(outcome.reject_reason, Some(RejectReason::BountyNotActive));

    let outcome = state.process_command("accept rat_problem");
    assert!(outcome.success);

    let outcome = state.process_command("accept rat_problem");
    assert_eq!(
        outcome.reject_reason,
        Some(RejectReason::BountyAlreadyActive)
    );

    // Poison not bought yet.
    let outcome = state.process_command("turn in rat_problem");
    assert_eq!(
        outcome.reject_reason,
        Some(RejectReason::ObjectiveIncomplete)
    );

    let outcome = state.process_command("buy rat_poison");
    assert!(outcome.success);
    let gold_before = state.player().gold;

    let outcome = state.process_command("turn in rat_problem");
    assert!(outcome.success, "{:?}", outcome.reject_reason);
    assert_eq!(state.player().gold, gold_before + 15);
    assert!(!state.player().inventory.contains_key("rat_poison"));

    let outcome = state.process_command("turn in rat_problem");
    assert_eq!(outcome.reject_reason, Some(RejectReason::BountyNotActive));
}

#[test]
fn failed_preconditions_preserve_saved_state_byte_for_byte() {
    let mut state = GameState::new(test_config(), &builtin_content());
    state.process_command("buy bread");
    let saved_before = serde_json::to_string(&state.save_state()).expect("serialize");

    for raw in [
        "buy room_key_that_is_not_real",
        "gamble 100000",
        "go moon",
        "talk to mira",
        "turn in rat_problem",
        "work smithing",
    ] {
        let outcome = state.process_command(raw);
        assert!(!outcome.success, "{raw} should fail");
    }

    let saved_after = serde_json::to_string(&state.save_state()).expect("serialize");
    assert_eq!(saved_before, saved_after);
}

#[test]
fn gamble_is_deterministic_for_a_fixed_seed() {
    let run = |seed: u64| {
        let config = SessionConfig {
            seed,
            ..test_config()
        };
        let mut state = GameState::new(config, &builtin_content());
        for _ in 0..6 {
            state.process_command("gamble 2");
        }
        state.player().gold
    };

    assert_eq!(run(42), run(42));
}

#[test]
fn save_and_restore_round_trip_preserves_the_session() {
    let mut state = GameState::new(test_config(), &builtin_content());
    state.process_command("buy bread");
    state.process_command("talk grim");
    state.process_command("wait 3");
    let saved = state.save_state();

    let restored = GameState::restore(test_config(), &builtin_content(), &saved);

    assert_eq!(restored.player().gold, state.player().gold);
    assert_eq!(restored.now(), state.now());
    assert_eq!(
        restored.player().inventory,
        state.player().inventory
    );
    assert!(
        restored.event_log().next_sequence() > saved.next_sequence,
        "restored log continues the sequence"
    );
    assert!(restored
        .events()
        .iter()
        .any(|event| event.event_type == EventType::SessionRestored));
}

#[test]
fn daily_boundary_drifts_the_market() {
    let mut state = GameState::new(test_config(), &builtin_content());
    state.advance_time(25.0).expect("advance past midnight");
    assert!(state
        .events()
        .iter()
        .any(|event| event.event_type == EventType::MarketDrifted));
}
