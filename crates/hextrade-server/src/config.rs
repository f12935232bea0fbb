//! Server configuration from the environment.

use hextrade_core::{BoardConfig, RuleConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("MAX_PLAYERS must be between 2 and 6, got {0}")]
    PlayerCount(usize),
}

/// Which board every new session gets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoardLayout {
    /// 37 tiles
    #[default]
    Extended,
    /// 19 tiles
    Classic,
}

impl FromStr for BoardLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extended" => Ok(BoardLayout::Extended),
            "classic" => Ok(BoardLayout::Classic),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub layout: BoardLayout,
    pub max_players: usize,
    /// Fixed seed for every session, for reproducible games
    pub seed: Option<u64>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source. Unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { var, value })
        }

        let addr = parse("SERVER_ADDR", lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into()))?;
        let layout = match lookup("BOARD_LAYOUT") {
            Some(value) => parse("BOARD_LAYOUT", value)?,
            None => BoardLayout::default(),
        };
        let max_players = match lookup("MAX_PLAYERS") {
            Some(value) => parse("MAX_PLAYERS", value)?,
            None => 6,
        };
        if !(2..=6).contains(&max_players) {
            return Err(ConfigError::PlayerCount(max_players));
        }
        let seed = lookup("RNG_SEED").map(|value| parse("RNG_SEED", value)).transpose()?;

        Ok(Self {
            addr,
            layout,
            max_players,
            seed,
        })
    }

    /// Rules for a newly created session
    pub fn rules(&self) -> RuleConfig {
        let board = match self.layout {
            BoardLayout::Extended => BoardConfig::extended(),
            BoardLayout::Classic => BoardConfig::classic(),
        };
        RuleConfig {
            board,
            max_players: self.max_players,
            seed: self.seed,
            ..RuleConfig::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            layout: BoardLayout::default(),
            max_players: 6,
            seed: None,
        }
    }
}
