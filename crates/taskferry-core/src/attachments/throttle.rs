//! WebDAV request pacing.
//!
//! Many hosted WebDAV servers throttle aggressively. Requests are spaced by
//! a minimum interval, and once the server answers with a rate-limit status
//! every further request is refused until the cooldown has passed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub min_interval_ms: u64,
    pub cooldown_secs: u64,
    pub max_uploads_per_cycle: usize,
    pub max_downloads_per_cycle: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 500,
            cooldown_secs: 120,
            max_uploads_per_cycle: 10,
            max_downloads_per_cycle: 10,
        }
    }
}

#[derive(Debug, Default)]
struct ThrottleState {
    last_request: Option<Instant>,
    cooldown_until: Option<Instant>,
}

/// Shared pacing state for one WebDAV server.
#[derive(Debug)]
pub struct WebDavThrottle {
    config: ThrottleConfig,
    state: Mutex<ThrottleState>,
}

impl WebDavThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub const fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Wait until the next request may be sent.
    ///
    /// Fails with [`Error::RateLimited`] while a cooldown is active.
    pub async fn wait_turn(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(until) = state.cooldown_until {
            if now < until {
                return Err(Error::RateLimited {
                    backend: "webdav",
                    retry_after: Some(until - now),
                });
            }
            state.cooldown_until = None;
        }

        let interval = Duration::from_millis(self.config.min_interval_ms);
        if let Some(last) = state.last_request {
            let ready_at = last + interval;
            if ready_at > now {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        state.last_request = Some(Instant::now());
        Ok(())
    }

    /// Start a cooldown after the server signalled a rate limit.
    pub async fn enter_cooldown(&self, retry_after: Option<Duration>) {
        let cooldown = retry_after
            .unwrap_or_default()
            .max(Duration::from_secs(self.config.cooldown_secs));
        warn!(
            cooldown_secs = cooldown.as_secs(),
            "WebDAV rate limit hit, pausing attachment transfers"
        );
        self.state.lock().await.cooldown_until = Some(Instant::now() + cooldown);
    }

    /// Time left on the active cooldown, if any.
    pub async fn cooldown_remaining(&self) -> Option<Duration> {
        let until = self.state.lock().await.cooldown_until?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }
}
