//! Construction-time configuration parsed from the string-map surface the
//! backup engine hands the backend.

use std::collections::HashMap;
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
pub(crate) const FRAGMENT_ALIGNMENT: u64 = 320 * KIB;
const FRAGMENT_MIN: u64 = FRAGMENT_ALIGNMENT;
const FRAGMENT_MAX: u64 = 60 * MIB;
const DEFAULT_FRAGMENT_SIZE: u64 = 10 * MIB;
const DEFAULT_FRAGMENT_RETRY_COUNT: u32 = 5;
const DEFAULT_FRAGMENT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_SHORT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_READ_WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Error constructing a [`Config`] from raw key/value pairs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration key `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Per-phase timeouts (SPEC §5): `short` gates control-plane calls,
/// `list` gates each paginated GET, `read_write` is the idle-read timeout
/// wrapped around body streams.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub short: Duration,
    pub list: Duration,
    pub read_write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            short: DEFAULT_SHORT_TIMEOUT,
            list: DEFAULT_LIST_TIMEOUT,
            read_write: DEFAULT_READ_WRITE_TIMEOUT,
        }
    }
}

/// Immutable backend configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub auth_id: String,
    pub protocol_key: String,
    pub root_url: String,
    /// Already clamped and aligned; see [`clamp_fragment_size`].
    pub fragment_size: u64,
    pub fragment_retry_count: u32,
    pub fragment_retry_delay: Duration,
    pub timeouts: Timeouts,
}

/// Clamp `size` to `[320 KiB, 60 MiB]` and round down to a multiple of
/// 320 KiB, per the fragment-size invariant.
pub(crate) fn clamp_fragment_size(size: u64) -> u64 {
    let clamped = size.clamp(FRAGMENT_MIN, FRAGMENT_MAX);
    clamped - (clamped % FRAGMENT_ALIGNMENT)
}

impl Config {
    /// Build a [`Config`] from the string-map surface in SPEC_FULL §6.
    /// Unrecognized keys are ignored; missing optional keys fall back to
    /// their documented defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_id = map
            .get("auth-id")
            .cloned()
            .ok_or(ConfigError::Missing("auth-id"))?;
        let protocol_key = map
            .get("protocol-key")
            .cloned()
            .unwrap_or_else(|| "msgraph".to_owned());
        let root_url = map
            .get("root-url")
            .cloned()
            .ok_or(ConfigError::Missing("root-url"))?;

        let fragment_size = parse_opt_u64(map, "fragment-size")?
            .map(clamp_fragment_size)
            .unwrap_or(DEFAULT_FRAGMENT_SIZE);
        let fragment_retry_count = parse_opt_u32(map, "fragment-retry-count")?
            .unwrap_or(DEFAULT_FRAGMENT_RETRY_COUNT)
            .max(1);
        let fragment_retry_delay = Duration::from_millis(
            parse_opt_u64(map, "fragment-retry-delay")?.unwrap_or(DEFAULT_FRAGMENT_RETRY_DELAY_MS),
        );

        let mut timeouts = Timeouts::default();
        if let Some(v) = parse_opt_duration_ms(map, "short-timeout")? {
            timeouts.short = v;
        }
        if let Some(v) = parse_opt_duration_ms(map, "list-timeout")? {
            timeouts.list = v;
        }
        if let Some(v) = parse_opt_duration_ms(map, "read-write-timeout")? {
            timeouts.read_write = v;
        }

        Ok(Config {
            auth_id,
            protocol_key,
            root_url,
            fragment_size,
            fragment_retry_count,
            fragment_retry_delay,
            timeouts,
        })
    }
}

fn parse_opt_u64(map: &HashMap<String, String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: v.clone() }),
    }
}

fn parse_opt_u32(map: &HashMap<String, String>, key: &'static str) -> Result<Option<u32>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: v.clone() }),
    }
}

/// Duration strings are plain milliseconds; the backup engine normalizes
/// richer duration syntax before it reaches the core.
fn parse_opt_duration_ms(
    map: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_opt_u64(map, key)?.map(Duration::from_millis))
}
