//! Process configuration, read from the environment (and `.env` if present).
//!
//! | variable                  | default        |
//! |---------------------------|----------------|
//! | `RELAY_BIND`              | `0.0.0.0:5183` |
//! | `RELAY_PEER_ID_LENGTH`    | `12`           |
//! | `RELAY_ROOM_ID_MIN`       | `5`            |
//! | `RELAY_ROOM_ID_MAX`       | `100`          |
//! | `RELAY_IDLE_TIMEOUT_SECS` | `0` (off)      |

use std::{fmt::Display, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, bail};

use crate::relay::{DEFAULT_PEER_ID_LENGTH, IdBounds, RelayConfig};

pub const DEFAULT_BIND: &str = "0.0.0.0:5183";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: SocketAddr,
    pub relay: RelayConfig,
    pub idle_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = parse_or(&lookup, "RELAY_BIND", DEFAULT_BIND.parse::<SocketAddr>()?)?;
        let peer_id_length = parse_or(&lookup, "RELAY_PEER_ID_LENGTH", DEFAULT_PEER_ID_LENGTH)?;
        let defaults = IdBounds::default();
        let id_bounds = IdBounds {
            min_exclusive: parse_or(&lookup, "RELAY_ROOM_ID_MIN", defaults.min_exclusive)?,
            max_exclusive: parse_or(&lookup, "RELAY_ROOM_ID_MAX", defaults.max_exclusive)?,
        };
        let idle_secs: u64 = parse_or(&lookup, "RELAY_IDLE_TIMEOUT_SECS", 0)?;

        if id_bounds.max_exclusive.saturating_sub(id_bounds.min_exclusive) <= 1 {
            bail!(
                "room id bounds ({}, {}) admit no length",
                id_bounds.min_exclusive,
                id_bounds.max_exclusive
            );
        }
        if peer_id_length <= id_bounds.min_exclusive || peer_id_length >= id_bounds.max_exclusive {
            bail!(
                "peer id length {peer_id_length} is outside the id bounds ({}, {})",
                id_bounds.min_exclusive,
                id_bounds.max_exclusive
            );
        }

        Ok(Config {
            bind,
            relay: RelayConfig { peer_id_length, id_bounds },
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key}={raw}")),
        None => Ok(default),
    }
}
