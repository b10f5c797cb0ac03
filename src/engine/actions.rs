use serde::{Deserialize, Serialize};

use super::roles::Ability;
use super::types::{PlayerId, VoteChoice};

/// Arguments of a special-ability request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ability", rename_all = "snake_case")]
pub enum AbilityArgs {
    Peek,
    Strike { target: PlayerId },
    SwapHeadline,
}

impl AbilityArgs {
    pub fn ability(&self) -> Ability {
        match self {
            AbilityArgs::Peek => Ability::Peek,
            AbilityArgs::Strike { .. } => Ability::Strike,
            AbilityArgs::SwapHeadline => Ability::SwapHeadline,
        }
    }
}

/// Inbound player actions that are routed by the current phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerAction {
    Vote { choice: VoteChoice },
    UseAbility { args: AbilityArgs },
    Accuse { target: PlayerId },
}
