// crates/tally-policy/src/ratelimit.rs
//
// Call-rate gating with fixed hourly windows, keyed by (account, mode).
//
// A window opens on the first call and closes an hour later. On exhaustion
// the limiter returns the deterministic end of the current window as the
// next available time — callers are never queued. Modes without a
// configured limit are unlimited.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use tally_core::account::AccountId;
use tally_core::error::TallyError;

/// Per-mode hourly call limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_hour: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_hour: HashMap::from([("grant".to_string(), 30), ("action".to_string(), 60)]),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    count: u32,
}

/// Hourly window counter.
pub struct RateLimiter {
    limits: HashMap<String, u32>,
    windows: Mutex<HashMap<(AccountId, String), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limits: config.per_hour,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one call of `mode` by `account` at `now`.
    ///
    /// Ok when the window still has room; `RateLimited { next_available }`
    /// when it is exhausted (the call is not counted).
    pub fn check_and_count(
        &self,
        account: &AccountId,
        mode: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TallyError> {
        let limit = match self.limits.get(mode) {
            None => return Ok(()),
            Some(&limit) => limit,
        };

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (account.clone(), mode.to_string());
        let window = windows.entry(key).or_insert(Window { start: now, count: 0 });

        if now - window.start >= Duration::hours(1) {
            window.start = now;
            window.count = 0;
        }

        if window.count >= limit {
            return Err(TallyError::RateLimited {
                next_available: window.start + Duration::hours(1),
            });
        }
        window.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(mode: &str, per_hour: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            per_hour: HashMap::from([(mode.to_string(), per_hour)]),
        })
    }

    #[test]
    fn test_unconfigured_mode_is_unlimited() {
        let limiter = limiter("grant", 1);
        let account = AccountId::from("alice");
        let now = Utc::now();
        for _ in 0..100 {
            limiter.check_and_count(&account, "transfer", now).unwrap();
        }
    }

    #[test]
    fn test_window_exhaustion_returns_next_available() {
        let limiter = limiter("grant", 2);
        let account = AccountId::from("alice");
        let now = Utc::now();

        limiter.check_and_count(&account, "grant", now).unwrap();
        limiter.check_and_count(&account, "grant", now).unwrap();
        let err = limiter.check_and_count(&account, "grant", now).unwrap_err();
        match err {
            TallyError::RateLimited { next_available } => {
                assert_eq!(next_available, now + Duration::hours(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_window_resets_after_an_hour() {
        let limiter = limiter("grant", 1);
        let account = AccountId::from("alice");
        let now = Utc::now();

        limiter.check_and_count(&account, "grant", now).unwrap();
        assert!(limiter.check_and_count(&account, "grant", now).is_err());

        let later = now + Duration::hours(1);
        limiter.check_and_count(&account, "grant", later).unwrap();
    }

    #[test]
    fn test_accounts_have_independent_windows() {
        let limiter = limiter("grant", 1);
        let now = Utc::now();
        limiter
            .check_and_count(&AccountId::from("alice"), "grant", now)
            .unwrap();
        limiter
            .check_and_count(&AccountId::from("bob"), "grant", now)
            .unwrap();
    }
}
