use anyhow::{bail, Context, Result};
use saboteur_core::GameRules;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::state_machine::store::StoreOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// How often every session receives a tick.
    pub tick_interval: Duration,
    pub critical_sabotage_timeout: Duration,
    pub min_players: usize,
    pub max_players: usize,
    /// Distinct players needed to fix a sabotage.
    pub sabotage_fix_quorum: usize,
    /// Sessions without player input for this long are closed.
    pub session_idle_timeout: Duration,
    /// How long the role reveal stays visible before it is deleted.
    pub role_reveal_delete_after: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let tick_interval_ms = parse_or(&lookup, "TICK_INTERVAL_MS", 1000u64)?;
        let critical_secs = parse_or(&lookup, "CRITICAL_SABOTAGE_TIMEOUT_SECS", 60u64)?;
        let min_players = parse_or(&lookup, "MIN_PLAYERS", 4usize)?;
        let max_players = parse_or(&lookup, "MAX_PLAYERS", 10usize)?;
        let sabotage_fix_quorum = parse_or(&lookup, "SABOTAGE_FIX_QUORUM", 2usize)?;
        let idle_mins = parse_or(&lookup, "SESSION_IDLE_TIMEOUT_MINS", 120u64)?;
        let reveal_secs = parse_or(&lookup, "ROLE_REVEAL_DELETE_SECS", 30u64)?;

        if tick_interval_ms == 0 {
            bail!("TICK_INTERVAL_MS must be positive");
        }
        if min_players < 2 {
            bail!("MIN_PLAYERS must be at least 2");
        }
        if max_players < min_players {
            bail!(
                "MAX_PLAYERS ({}) must not be below MIN_PLAYERS ({})",
                max_players,
                min_players
            );
        }
        if sabotage_fix_quorum == 0 {
            bail!("SABOTAGE_FIX_QUORUM must be at least 1");
        }
        let Some(idle_secs) = idle_mins.checked_mul(60) else {
            bail!("SESSION_IDLE_TIMEOUT_MINS is too large");
        };

        Ok(Config {
            port,
            tick_interval: Duration::from_millis(tick_interval_ms),
            critical_sabotage_timeout: Duration::from_secs(critical_secs),
            min_players,
            max_players,
            sabotage_fix_quorum,
            session_idle_timeout: Duration::from_secs(idle_secs),
            role_reveal_delete_after: Duration::from_secs(reveal_secs),
        })
    }

    pub fn game_rules(&self) -> GameRules {
        GameRules {
            min_players: self.min_players,
            max_players: self.max_players,
            sabotage_fix_quorum: self.sabotage_fix_quorum,
            critical_sabotage_timeout: self.critical_sabotage_timeout,
            ..GameRules::default()
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            rules: self.game_rules(),
            role_reveal_ttl: self.role_reveal_delete_after,
            seed: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
