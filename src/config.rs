//! Session and coordinator configuration with fail-fast validation.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::phases::PhaseTimings;
use crate::engine::roles::DEFAULT_PEEK_USES;
use crate::engine::rules::{DEFAULT_ROUND_CAP, DEFAULT_SCORE_TO_WIN};
use crate::engine::types::{Difficulty, Reputation, RosterEntry, RoundNo};

pub const DEFAULT_STARTING_REPUTATION: Reputation = 3;
pub const DEFAULT_MAX_PLAYERS: usize = 10;
pub const DEFAULT_MIN_PLAYERS: usize = 3;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Rules of a single game, fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    pub round_cap: RoundNo,
    pub score_to_win: u32,
    /// Rounds after which the ability window opens.
    pub ability_rounds: BTreeSet<RoundNo>,
    pub min_players: usize,
    pub max_players: usize,
    pub starting_reputation: Reputation,
    pub peek_uses: u8,
    pub strike_ban_rounds: u8,
    pub failed_strike_ban_rounds: u8,
    pub accusation_ban_rounds: u8,
    pub max_message_chars: usize,
    pub difficulty: Difficulty,
    pub rng_seed: Option<u64>,
    pub timings: PhaseTimings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_cap: DEFAULT_ROUND_CAP,
            score_to_win: DEFAULT_SCORE_TO_WIN,
            ability_rounds: BTreeSet::from([1, 2, 3, 4]),
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            starting_reputation: DEFAULT_STARTING_REPUTATION,
            peek_uses: DEFAULT_PEEK_USES,
            strike_ban_rounds: 1,
            failed_strike_ban_rounds: 1,
            accusation_ban_rounds: 1,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            difficulty: Difficulty::default(),
            rng_seed: None,
            timings: PhaseTimings::default(),
        }
    }
}

impl GameConfig {
    /// Parses and validates a JSON config.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(raw)?;
        validate_game_config(&config)?;
        Ok(config)
    }

    pub fn is_ability_round(&self, round: RoundNo) -> bool {
        self.ability_rounds.contains(&round)
    }
}

pub fn validate_game_config(cfg: &GameConfig) -> Result<(), ConfigError> {
    if cfg.round_cap == 0 {
        return Err(ConfigError::validation("round_cap must be at least 1"));
    }
    if cfg.score_to_win == 0 {
        return Err(ConfigError::validation("score_to_win must be at least 1"));
    }
    if let Some(round) = cfg
        .ability_rounds
        .iter()
        .find(|r| **r == 0 || **r > cfg.round_cap)
    {
        return Err(ConfigError::validation(format!(
            "ability round {round} is outside 1..={}",
            cfg.round_cap
        )));
    }
    if cfg.min_players < 2 {
        return Err(ConfigError::validation("min_players must be at least 2"));
    }
    if cfg.min_players > cfg.max_players {
        return Err(ConfigError::validation(
            "min_players cannot exceed max_players",
        ));
    }
    if cfg.starting_reputation == 0 {
        return Err(ConfigError::validation(
            "starting_reputation must be greater than zero",
        ));
    }
    if cfg.max_message_chars == 0 {
        return Err(ConfigError::validation(
            "max_message_chars must be greater than zero",
        ));
    }
    if let Some((phase, _)) = cfg.timings.entries().iter().find(|(_, secs)| *secs == 0) {
        return Err(ConfigError::validation(format!(
            "{phase:?} must last at least one second"
        )));
    }
    if cfg.timings.role_assignment_min_dwell_secs > cfg.timings.role_assignment_secs {
        return Err(ConfigError::validation(
            "role assignment dwell cannot exceed its limit",
        ));
    }
    Ok(())
}

pub fn ensure_roster(cfg: &GameConfig, roster: &[RosterEntry]) -> Result<(), ConfigError> {
    if roster.is_empty() {
        return Err(ConfigError::validation("roster needs at least the creator"));
    }
    if roster.len() > cfg.max_players {
        return Err(ConfigError::validation(format!(
            "roster has {} players, limit is {}",
            roster.len(),
            cfg.max_players
        )));
    }
    let mut seen = HashSet::new();
    for entry in roster {
        if !seen.insert(entry.id) {
            return Err(ConfigError::validation(format!(
                "player {} appears twice in the roster",
                entry.id
            )));
        }
    }
    Ok(())
}

/// Settings for the process-wide session coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Workers tick themselves when set; otherwise the host calls `tick`.
    pub auto_tick: bool,
    pub tick_interval_ms: u64,
    pub max_sessions: usize,
    pub finished_retention_secs: u64,
    pub cleanup_interval_secs: u64,
    pub headline_timeout_ms: u64,
    pub headline_buffer: usize,
    pub command_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            auto_tick: true,
            tick_interval_ms: 2_000,
            max_sessions: 100,
            finished_retention_secs: 3_600,
            cleanup_interval_secs: 60,
            headline_timeout_ms: 1_500,
            headline_buffer: 2,
            command_capacity: 64,
        }
    }
}

impl CoordinatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn finished_retention(&self) -> Duration {
        Duration::from_secs(self.finished_retention_secs)
    }

    pub fn headline_timeout(&self) -> Duration {
        Duration::from_millis(self.headline_timeout_ms)
    }

    pub fn require_valid(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::validation("tick_interval_ms must be positive"));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::validation("max_sessions must be positive"));
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::validation("command_capacity must be positive"));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::validation(
                "cleanup_interval_secs must be positive",
            ));
        }
        Ok(())
    }
}
