//! Static content loading. Definitions are read once at session start and
//! treated as immutable afterwards; the built-in pack keeps the game
//! playable with no external files.

use std::fmt;
use std::path::Path;

use contracts::{
    AreaDefinition, BountyDefinition, ContentPack, Disposition, ItemDefinition, JobDefinition,
    NpcDefinition,
};

#[derive(Debug)]
pub enum ContentError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// A definition references an id that does not exist in the pack.
    DanglingReference(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "content io error: {err}"),
            Self::Parse(err) => write!(f, "content parse error: {err}"),
            Self::DanglingReference(reference) => {
                write!(f, "content references unknown id: {reference}")
            }
        }
    }
}

impl std::error::Error for ContentError {}

impl From<std::io::Error> for ContentError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

pub fn load_content(path: impl AsRef<Path>) -> Result<ContentPack, ContentError> {
    let raw = std::fs::read_to_string(path)?;
    let pack: ContentPack = serde_json::from_str(&raw)?;
    validate(&pack)?;
    Ok(pack)
}

/// Bounties must point at real items and NPCs; a pack that fails this is
/// rejected at load rather than surfacing as a runtime lookup miss.
pub fn validate(pack: &ContentPack) -> Result<(), ContentError> {
    for bounty in &pack.bounties {
        if !pack.items.iter().any(|item| item.id == bounty.required_item) {
            return Err(ContentError::DanglingReference(format!(
                "bounty {} -> item {}",
                bounty.id, bounty.required_item
            )));
        }
        if !pack.npcs.iter().any(|npc| npc.id == bounty.target_npc) {
            return Err(ContentError::DanglingReference(format!(
                "bounty {} -> npc {}",
                bounty.id, bounty.target_npc
            )));
        }
    }
    Ok(())
}

/// The default Rusted Tankard: four areas, five regulars, a short menu,
/// two jobs, and a starter bounty.
pub fn builtin_content() -> ContentPack {
    let areas = vec![
        AreaDefinition {
            id: "taproom".to_string(),
            name: "The Taproom".to_string(),
            description: "Low beams, a long scarred bar, and the smell of old ale.".to_string(),
        },
        AreaDefinition {
            id: "cellar".to_string(),
            name: "The Cellar".to_string(),
            description: "Casks stacked to the ceiling; something scurries in the dark.".to_string(),
        },
        AreaDefinition {
            id: "courtyard".to_string(),
            name: "The Courtyard".to_string(),
            description: "A muddy yard between the stables and the kitchen door.".to_string(),
        },
        AreaDefinition {
            id: "guest_rooms".to_string(),
            name: "The Guest Rooms".to_string(),
            description: "A creaking corridor of doors, most of them locked.".to_string(),
        },
    ];

    let npcs = vec![
        NpcDefinition {
            id: "grim".to_string(),
            name: "Grim the Barkeep".to_string(),
            schedule: vec![(6.0, 2.0)],
            disposition: Disposition::Gruff,
            base_inventory: [("ale".to_string(), 99), ("stew".to_string(), 12)]
                .into_iter()
                .collect(),
        },
        NpcDefinition {
            id: "mira".to_string(),
            name: "Mira the Merchant".to_string(),
            schedule: vec![(9.0, 17.0)],
            disposition: Disposition::Friendly,
            base_inventory: [("rat_poison".to_string(), 3)].into_iter().collect(),
        },
        NpcDefinition {
            id: "old_tom".to_string(),
            name: "Old Tom".to_string(),
            schedule: vec![(16.0, 23.0)],
            disposition: Disposition::Neutral,
            base_inventory: Default::default(),
        },
        NpcDefinition {
            id: "sera".to_string(),
            name: "Sera the Bard".to_string(),
            schedule: vec![(19.0, 1.0)],
            disposition: Disposition::Friendly,
            base_inventory: Default::default(),
        },
        NpcDefinition {
            id: "hooded_stranger".to_string(),
            name: "The Hooded Stranger".to_string(),
            schedule: vec![(22.0, 6.0)],
            disposition: Disposition::Shady,
            base_inventory: Default::default(),
        },
    ];

    let items = vec![
        ItemDefinition {
            id: "ale".to_string(),
            name: "Mug of Ale".to_string(),
            base_price: 4,
            description: Some("Bitter, flat, beloved.".to_string()),
        },
        ItemDefinition {
            id: "stew".to_string(),
            name: "Bowl of Stew".to_string(),
            base_price: 6,
            description: Some("Mostly turnip.".to_string()),
        },
        ItemDefinition {
            id: "bread".to_string(),
            name: "Loaf of Bread".to_string(),
            base_price: 2,
            description: None,
        },
        ItemDefinition {
            id: "rat_poison".to_string(),
            name: "Rat Poison".to_string(),
            base_price: 5,
            description: Some("The cellar's last hope.".to_string()),
        },
        ItemDefinition {
            id: "room_key".to_string(),
            name: "Room Key".to_string(),
            base_price: 10,
            description: Some("One night upstairs, no questions.".to_string()),
        },
    ];

    let jobs = vec![
        JobDefinition {
            id: "wash_dishes".to_string(),
            name: "Wash Dishes".to_string(),
            wage: 3,
            duration_hours: 1.0,
        },
        JobDefinition {
            id: "cellar_shift".to_string(),
            name: "Cellar Shift".to_string(),
            wage: 8,
            duration_hours: 4.0,
        },
    ];

    let bounties = vec![BountyDefinition {
        id: "rat_problem".to_string(),
        title: "The Rat Problem".to_string(),
        description: "Grim wants the cellar rats dealt with. Bring him rat poison.".to_string(),
        required_item: "rat_poison".to_string(),
        target_npc: "grim".to_string(),
        reward_gold: 15,
    }];

    ContentPack {
        areas,
        npcs,
        items,
        jobs,
        bounties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_pack_validates() {
        let pack = builtin_content();
        assert!(validate(&pack).is_ok());
        assert!(!pack.areas.is_empty());
        assert!(!pack.npcs.is_empty());
    }

    #[test]
    fn builtin_pack_round_trips_through_json() {
        let pack = builtin_content();
        let encoded = serde_json::to_string(&pack).expect("serialize");
        let decoded: ContentPack = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(pack, decoded);
    }

    #[test]
    fn dangling_bounty_reference_is_rejected() {
        let mut pack = builtin_content();
        pack.bounties[0].required_item = "philosopher_stone".to_string();
        assert!(matches!(
            validate(&pack),
            Err(ContentError::DanglingReference(_))
        ));
    }
}
