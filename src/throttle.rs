//! Process-wide, host-keyed throttle gate.
//!
//! Holds the earliest instant the next request to a given host may be
//! dispatched, updated from `Retry-After` response headers. All operations
//! sharing a `ThrottleGate` respect a single backoff clock per host, which
//! prevents request storms after a 429/503.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Default)]
pub struct ThrottleGate {
    deadlines: Mutex<HashMap<String, Instant>>,
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until `host`'s gate has opened.
    pub async fn wait(&self, host: &str) {
        loop {
            let deadline = self.deadlines.lock().unwrap().get(host).copied();
            match deadline {
                Some(d) if d > Instant::now() => tokio::time::sleep_until(d).await,
                _ => return,
            }
        }
    }

    /// Update the gate for `host` from a `Retry-After` header value. Keeps
    /// the later of the current and newly observed deadlines.
    pub fn set_retry_after(&self, host: &str, header_value: &str) {
        let Some(delay) = parse_retry_after(header_value) else {
            return;
        };
        let new_deadline = Instant::now() + delay;
        let mut deadlines = self.deadlines.lock().unwrap();
        deadlines
            .entry(host.to_owned())
            .and_modify(|d| *d = (*d).max(new_deadline))
            .or_insert(new_deadline);
    }
}

/// Parse a `Retry-After` header: either an integer number of seconds, or an
/// HTTP-date. Returns the delay from now.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date (RFC 7231 IMF-fixdate) uses a literal "GMT" rather than a
    // numeric offset, so it doesn't parse as RFC 2822 directly.
    let target = chrono::NaiveDateTime::parse_from_str(trimmed, "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc2822(trimmed)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        })?;
    let now = chrono::Utc::now();
    let delta = target.signed_duration_since(now);
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
