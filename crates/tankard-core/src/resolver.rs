//! Deterministic command grammar.
//!
//! Raw input is tokenized and matched against a registered pattern table.
//! The most specific match wins: more literal tokens beats fewer, then
//! longer patterns beat shorter; an exact tie goes to the earliest
//! registration (the source order of `CommandTable::with_defaults`). No
//! match degrades to `Command::Unknown` carrying the original text — this
//! path never fails and never touches a network.

use contracts::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(&'static str),
    /// Captures exactly one input token.
    Capture,
    /// Captures the remaining tokens (at least one), joined with spaces.
    /// Must be the final token of a pattern.
    Rest,
}

type Builder = fn(&[String]) -> Option<Command>;

struct PatternEntry {
    tokens: &'static [Token],
    build: Builder,
}

pub struct CommandTable {
    entries: Vec<PatternEntry>,
}

impl CommandTable {
    pub fn with_defaults() -> Self {
        use Token::{Capture, Literal, Rest};

        let mut table = Self {
            entries: Vec::new(),
        };
        table.register(&[Literal("look")], |_| Some(Command::Look));
        table.register(&[Literal("status")], |_| Some(Command::Status));
        table.register(&[Literal("inventory")], |_| Some(Command::Inventory));
        table.register(&[Literal("inv")], |_| Some(Command::Inventory));
        table.register(&[Literal("help")], |_| Some(Command::Help));
        table.register(&[Literal("npcs")], |_| Some(Command::Npcs));
        table.register(&[Literal("who")], |_| Some(Command::Npcs));
        table.register(&[Literal("jobs")], |_| Some(Command::Jobs));
        table.register(&[Literal("bounties")], |_| Some(Command::Bounties));
        table.register(&[Literal("go"), Capture], build_go);
        table.register(&[Literal("wait")], |_| Some(Command::Wait { hours: 1.0 }));
        table.register(&[Literal("wait"), Capture], build_wait);
        table.register(&[Literal("buy"), Rest], build_buy);
        table.register(&[Literal("talk"), Literal("to"), Rest], build_talk);
        table.register(&[Literal("talk"), Rest], build_talk);
        table.register(&[Literal("work"), Rest], build_work);
        table.register(&[Literal("gamble"), Capture], build_gamble);
        table.register(&[Literal("accept"), Rest], build_accept);
        table.register(&[Literal("turn"), Literal("in"), Rest], build_turn_in);
        table
    }

    fn register(&mut self, tokens: &'static [Token], build: Builder) {
        debug_assert!(
            !tokens
                .iter()
                .rev()
                .skip(1)
                .any(|token| *token == Token::Rest),
            "Rest must be the final pattern token"
        );
        self.entries.push(PatternEntry { tokens, build });
    }

    pub fn resolve(&self, raw: &str) -> Command {
        let trimmed = raw.trim();
        let lowered = trimmed.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        if tokens.is_empty() {
            return Command::Unknown {
                raw: trimmed.to_string(),
            };
        }

        let mut best: Option<((usize, usize), Command)> = None;
        for entry in &self.entries {
            let Some(captures) = match_tokens(entry.tokens, &tokens) else {
                continue;
            };
            let Some(command) = (entry.build)(&captures) else {
                continue;
            };
            let score = (literal_count(entry.tokens), entry.tokens.len());
            let better = match &best {
                None => true,
                Some((best_score, _)) => score > *best_score,
            };
            if better {
                best = Some((score, command));
            }
        }

        best.map(|(_, command)| command).unwrap_or(Command::Unknown {
            raw: trimmed.to_string(),
        })
    }
}

fn literal_count(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .filter(|token| matches!(token, Token::Literal(_)))
        .count()
}

fn match_tokens(pattern: &[Token], input: &[&str]) -> Option<Vec<String>> {
    let mut captures = Vec::new();
    let mut idx = 0;

    for token in pattern {
        match token {
            Token::Literal(text) => {
                if input.get(idx).copied() != Some(*text) {
                    return None;
                }
                idx += 1;
            }
            Token::Capture => {
                captures.push((*input.get(idx)?).to_string());
                idx += 1;
            }
            Token::Rest => {
                if idx >= input.len() {
                    return None;
                }
                captures.push(input[idx..].join(" "));
                idx = input.len();
            }
        }
    }

    (idx == input.len()).then_some(captures)
}

fn build_go(args: &[String]) -> Option<Command> {
    Some(Command::Go {
        area: args.first()?.clone(),
    })
}

fn build_wait(args: &[String]) -> Option<Command> {
    let hours = args.first()?.parse::<f64>().ok()?;
    hours.is_finite().then_some(Command::Wait { hours })
}

fn build_buy(args: &[String]) -> Option<Command> {
    Some(Command::Buy {
        item: args.first()?.clone(),
    })
}

fn build_talk(args: &[String]) -> Option<Command> {
    Some(Command::Talk {
        npc: args.first()?.clone(),
    })
}

fn build_work(args: &[String]) -> Option<Command> {
    Some(Command::Work {
        job: args.first()?.clone(),
    })
}

fn build_gamble(args: &[String]) -> Option<Command> {
    let wager = args.first()?.parse::<i64>().ok()?;
    Some(Command::Gamble { wager })
}

fn build_accept(args: &[String]) -> Option<Command> {
    Some(Command::AcceptBounty {
        bounty: args.first()?.clone(),
    })
}

fn build_turn_in(args: &[String]) -> Option<Command> {
    Some(Command::TurnInBounty {
        bounty: args.first()?.clone(),
    })
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_verbs_resolve() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.resolve("look"), Command::Look);
        assert_eq!(table.resolve("  HELP  "), Command::Help);
        assert_eq!(table.resolve("inv"), Command::Inventory);
    }

    #[test]
    fn arguments_are_captured() {
        let table = CommandTable::with_defaults();
        assert_eq!(
            table.resolve("go cellar"),
            Command::Go {
                area: "cellar".to_string()
            }
        );
        assert_eq!(
            table.resolve("buy bitter ale"),
            Command::Buy {
                item: "bitter ale".to_string()
            }
        );
        assert_eq!(table.resolve("gamble 5"), Command::Gamble { wager: 5 });
    }

    #[test]
    fn more_literal_tokens_win_the_tie() {
        let table = CommandTable::with_defaults();
        // "talk to old tom" matches both ["talk", Rest] and
        // ["talk", "to", Rest]; the extra literal must win so the NPC name
        // is "old tom", not "to old tom".
        assert_eq!(
            table.resolve("talk to old tom"),
            Command::Talk {
                npc: "old tom".to_string()
            }
        );
        assert_eq!(
            table.resolve("talk mira"),
            Command::Talk {
                npc: "mira".to_string()
            }
        );
    }

    #[test]
    fn wait_defaults_and_parses_duration() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.resolve("wait"), Command::Wait { hours: 1.0 });
        assert_eq!(table.resolve("wait 2.5"), Command::Wait { hours: 2.5 });
    }

    #[test]
    fn unparseable_arguments_degrade_to_unknown() {
        let table = CommandTable::with_defaults();
        assert!(table.resolve("wait forever").is_unknown());
        assert!(table.resolve("gamble everything").is_unknown());
    }

    #[test]
    fn junk_input_always_yields_unknown_not_a_panic() {
        let table = CommandTable::with_defaults();
        for raw in ["", "   ", "xyzzy", "buy", "go", "turn in", "%$#@!"] {
            let command = table.resolve(raw);
            if !raw.trim().is_empty() {
                // Either a real match or Unknown; partial patterns like a
                // bare "buy" must not match.
                if matches!(raw, "buy" | "go" | "turn in" | "xyzzy" | "%$#@!") {
                    assert!(command.is_unknown(), "input {raw:?} should be unknown");
                }
            } else {
                assert!(command.is_unknown());
            }
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let table = CommandTable::with_defaults();
        let first = table.resolve("talk to the hooded stranger");
        let second = table.resolve("talk to the hooded stranger");
        assert_eq!(first, second);
    }
}
