use std::sync::Mutex;
use std::time::Instant;

use log::{debug, warn};

use crate::broker::policy::RateLimitPolicy;
use crate::broker::usage::KeyUsage;
use crate::constants;
use crate::providers::ProviderType;

/// A leased credential: the secret to authenticate with and the stable id
/// to report the call's outcome under.
#[derive(Debug, Clone)]
pub struct KeyLease {
    pub id: String,
    pub secret: String,
}

struct Credential {
    id: String,
    secret: String,
}

struct PoolState {
    credentials: Vec<Credential>,
    usage: Vec<KeyUsage>,
    /// Index the next selection scan starts from.
    cursor: usize,
}

/// Observability snapshot for a single key.
#[derive(Debug, Clone)]
pub struct KeyStatus {
    pub key_id: String,
    pub is_rate_limited: bool,
    pub is_blocked: bool,
    pub requests_last_minute: u32,
    pub requests_last_hour: u32,
    pub requests_last_day: u32,
    pub tokens_last_minute: u64,
    pub tokens_last_day: u64,
    pub consecutive_errors: u32,
    pub block_remaining_secs: Option<u64>,
}

/// Ordered credentials for one provider plus their usage records and the
/// rotation cursor, all behind one mutex.
///
/// Selection and outcome recording are short critical sections; the lock is
/// never held across an await. The network call happens strictly between
/// `acquire` and `record`.
pub struct KeyPool {
    provider: ProviderType,
    policy: RateLimitPolicy,
    state: Mutex<PoolState>,
}

impl KeyPool {
    /// Builds a pool from raw secrets. Key ids are `{provider}_{index}`,
    /// 1-based, in load order.
    pub fn new(provider: ProviderType, secrets: Vec<String>, policy: RateLimitPolicy) -> Self {
        let credentials: Vec<Credential> = secrets
            .into_iter()
            .enumerate()
            .map(|(i, secret)| Credential {
                id: format!("{}_{}", provider, i + 1),
                secret,
            })
            .collect();
        let usage = credentials
            .iter()
            .map(|c| KeyUsage::new(c.id.clone()))
            .collect();

        Self {
            provider,
            policy,
            state: Mutex::new(PoolState { credentials, usage, cursor: 0 }),
        }
    }

    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lease the next usable key, round-robin from the cursor.
    ///
    /// Scans exactly `len` candidates starting at the cursor and returns
    /// the first that is neither window-limited nor blocked; the cursor
    /// then lands one past the selection so the next call starts there.
    /// The cursor does not move when every candidate is unusable.
    pub fn acquire(&self) -> Option<KeyLease> {
        self.acquire_at(Instant::now())
    }

    pub(crate) fn acquire_at(&self, now: Instant) -> Option<KeyLease> {
        let mut state = self.lock();
        let len = state.credentials.len();

        for offset in 0..len {
            let idx = (state.cursor + offset) % len;
            if state.usage[idx].is_rate_limited_at(now, &self.policy) {
                continue;
            }

            state.cursor = (idx + 1) % len;
            let credential = &state.credentials[idx];
            debug!("Selected key {} for {}", credential.id, self.provider);
            return Some(KeyLease {
                id: credential.id.clone(),
                secret: credential.secret.clone(),
            });
        }

        warn!("All {} keys for {} are rate limited or blocked", len, self.provider);
        None
    }

    /// Record the outcome of a call made with `key_id`.
    ///
    /// Success appends usage then clears the error streak; failure bumps
    /// the streak (token count is ignored on failure).
    pub fn record(&self, key_id: &str, tokens: u32, success: bool) {
        self.record_at(Instant::now(), key_id, tokens, success);
    }

    pub(crate) fn record_at(&self, now: Instant, key_id: &str, tokens: u32, success: bool) {
        let mut state = self.lock();
        let Some(usage) = state.usage.iter_mut().find(|u| u.key_id() == key_id) else {
            warn!("Ignoring outcome report for unknown key id {}", key_id);
            return;
        };

        if success {
            usage.record_request_at(now, tokens);
            usage.record_success();
            debug!("Recorded successful request for {}", key_id);
        } else {
            usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
            debug!("Recorded error for {}", key_id);
        }
    }

    /// Soonest time any key in this pool becomes usable. Best-effort.
    pub fn next_available_time(&self) -> Option<Instant> {
        self.next_available_at(Instant::now())
    }

    pub(crate) fn next_available_at(&self, now: Instant) -> Option<Instant> {
        let state = self.lock();
        state
            .usage
            .iter()
            .map(|u| u.next_available_at(now, &self.policy))
            .min()
    }

    /// Consistent snapshot of every key's counters and block state.
    pub fn key_statuses(&self) -> Vec<KeyStatus> {
        self.key_statuses_at(Instant::now())
    }

    pub(crate) fn key_statuses_at(&self, now: Instant) -> Vec<KeyStatus> {
        let state = self.lock();
        state
            .usage
            .iter()
            .map(|u| KeyStatus {
                key_id: u.key_id().to_string(),
                is_rate_limited: u.is_rate_limited_at(now, &self.policy),
                is_blocked: u.is_blocked_at(now),
                requests_last_minute: u.requests_in_window_at(now, constants::MINUTE_WINDOW_SECS),
                requests_last_hour: u.requests_in_window_at(now, constants::HOUR_WINDOW_SECS),
                requests_last_day: u.requests_in_window_at(now, constants::DAY_WINDOW_SECS),
                tokens_last_minute: u.tokens_in_window_at(now, constants::MINUTE_WINDOW_SECS),
                tokens_last_day: u.tokens_in_window_at(now, constants::DAY_WINDOW_SECS),
                consecutive_errors: u.consecutive_errors(),
                block_remaining_secs: u
                    .blocked_until()
                    .filter(|until| *until > now)
                    .map(|until| (until - now).as_secs()),
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool_with(rpm: u32, secrets: &[&str]) -> KeyPool {
        KeyPool::new(
            ProviderType::Groq,
            secrets.iter().map(|s| s.to_string()).collect(),
            RateLimitPolicy {
                requests_per_minute: rpm,
                requests_per_hour: 10_000,
                requests_per_day: 100_000,
                tokens_per_minute: None,
                tokens_per_day: None,
            },
        )
    }

    #[test]
    fn healthy_keys_rotate_round_robin() {
        let pool = pool_with(1000, &["k1", "k2", "k3"]);
        let now = Instant::now();

        let a = pool.acquire_at(now).unwrap();
        let b = pool.acquire_at(now).unwrap();
        let c = pool.acquire_at(now).unwrap();
        let d = pool.acquire_at(now).unwrap();

        assert_eq!(a.id, "groq_1");
        assert_eq!(b.id, "groq_2");
        assert_eq!(c.id, "groq_3");
        assert_eq!(d.id, "groq_1");
    }

    #[test]
    fn limited_key_is_skipped() {
        let pool = pool_with(1, &["k1", "k2"]);
        let now = Instant::now();

        let first = pool.acquire_at(now).unwrap();
        assert_eq!(first.id, "groq_1");
        pool.record_at(now, &first.id, 0, true);

        // groq_1 hit its rpm=1 ceiling inside the same second
        let second = pool.acquire_at(now).unwrap();
        assert_eq!(second.id, "groq_2");
    }

    #[test]
    fn exhausted_pool_yields_nothing() {
        let pool = pool_with(1, &["k1", "k2"]);
        let now = Instant::now();

        for _ in 0..2 {
            let lease = pool.acquire_at(now).unwrap();
            pool.record_at(now, &lease.id, 0, true);
        }

        assert!(pool.acquire_at(now).is_none());
    }

    #[test]
    fn exhausted_pool_recovers_when_window_rolls_off() {
        let pool = pool_with(1, &["k1"]);
        let now = Instant::now();

        let lease = pool.acquire_at(now).unwrap();
        pool.record_at(now, &lease.id, 0, true);
        assert!(pool.acquire_at(now).is_none());

        assert!(pool.acquire_at(now + Duration::from_secs(61)).is_some());
    }

    #[test]
    fn blocked_key_is_skipped_until_cooldown() {
        let pool = pool_with(1000, &["k1", "k2"]);
        let now = Instant::now();

        for _ in 0..3 {
            pool.record_at(now, "groq_1", 0, false);
        }

        // Scan starts at the cursor (groq_1) but lands on groq_2 twice
        assert_eq!(pool.acquire_at(now).unwrap().id, "groq_2");
        assert_eq!(pool.acquire_at(now).unwrap().id, "groq_2");

        let after = now + Duration::from_secs(constants::DEFAULT_BLOCK_SECS);
        assert_eq!(pool.acquire_at(after).unwrap().id, "groq_1");
    }

    #[test]
    fn failure_outcome_ignores_tokens() {
        let pool = pool_with(1000, &["k1"]);
        let now = Instant::now();

        pool.record_at(now, "groq_1", 9999, false);
        let status = &pool.key_statuses_at(now)[0];
        assert_eq!(status.tokens_last_day, 0);
        assert_eq!(status.requests_last_day, 0);
        assert_eq!(status.consecutive_errors, 1);
    }

    #[test]
    fn unknown_key_id_is_ignored() {
        let pool = pool_with(1000, &["k1"]);
        pool.record("groq_99", 10, true);
        assert_eq!(pool.key_statuses()[0].requests_last_day, 0);
    }

    #[test]
    fn next_available_is_soonest_across_keys() {
        let pool = pool_with(1, &["k1", "k2"]);
        let now = Instant::now();

        pool.record_at(now, "groq_1", 0, true);
        pool.record_at(now + Duration::from_secs(10), "groq_2", 0, true);

        let at = pool.next_available_at(now + Duration::from_secs(10)).unwrap();
        assert_eq!(at, now + Duration::from_secs(60));
    }
}
