use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::warn;

use crate::broker::policy::RateLimitPolicy;
use crate::constants;

/// Sliding-window usage record for a single API key.
///
/// Two independent mechanisms gate usability: window counts against the
/// provider's `RateLimitPolicy`, and an error-triggered cooldown that kicks
/// in after `CONSECUTIVE_ERROR_LIMIT` failures with no success in between.
/// Either one alone makes the key unusable.
///
/// Entries older than 24 hours are pruned on every write, so they can never
/// inflate a window count. Every clock-dependent method has an `*_at` twin
/// taking an explicit `now` so tests can pin the clock.
#[derive(Debug)]
pub struct KeyUsage {
    key_id: String,
    request_times: VecDeque<Instant>,
    token_events: VecDeque<(Instant, u32)>,
    consecutive_errors: u32,
    blocked_until: Option<Instant>,
}

impl KeyUsage {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            request_times: VecDeque::new(),
            token_events: VecDeque::new(),
            consecutive_errors: 0,
            blocked_until: None,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocked_until
    }

    /// Record one request and the tokens it consumed.
    pub fn record_request(&mut self, tokens: u32) {
        self.record_request_at(Instant::now(), tokens);
    }

    pub(crate) fn record_request_at(&mut self, now: Instant, tokens: u32) {
        self.request_times.push_back(now);
        if tokens > 0 {
            self.token_events.push_back((now, tokens));
        }
        self.prune(now);
    }

    /// Number of requests younger than `window_secs`.
    pub fn requests_in_window(&self, window_secs: u64) -> u32 {
        self.requests_in_window_at(Instant::now(), window_secs)
    }

    pub(crate) fn requests_in_window_at(&self, now: Instant, window_secs: u64) -> u32 {
        let window = Duration::from_secs(window_secs);
        self.request_times
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < window)
            .count() as u32
    }

    /// Tokens consumed in the trailing `window_secs`.
    pub fn tokens_in_window(&self, window_secs: u64) -> u64 {
        self.tokens_in_window_at(Instant::now(), window_secs)
    }

    pub(crate) fn tokens_in_window_at(&self, now: Instant, window_secs: u64) -> u64 {
        let window = Duration::from_secs(window_secs);
        self.token_events
            .iter()
            .filter(|(t, _)| now.saturating_duration_since(*t) < window)
            .map(|(_, tokens)| *tokens as u64)
            .sum()
    }

    /// Whether this key is currently unusable under the given policy.
    pub fn is_rate_limited(&self, policy: &RateLimitPolicy) -> bool {
        self.is_rate_limited_at(Instant::now(), policy)
    }

    pub(crate) fn is_rate_limited_at(&self, now: Instant, policy: &RateLimitPolicy) -> bool {
        if self.is_blocked_at(now) {
            return true;
        }

        if self.requests_in_window_at(now, constants::MINUTE_WINDOW_SECS)
            >= policy.requests_per_minute
        {
            return true;
        }
        if self.requests_in_window_at(now, constants::HOUR_WINDOW_SECS) >= policy.requests_per_hour
        {
            return true;
        }
        if self.requests_in_window_at(now, constants::DAY_WINDOW_SECS) >= policy.requests_per_day {
            return true;
        }

        if let Some(tpm) = policy.tokens_per_minute {
            if self.tokens_in_window_at(now, constants::MINUTE_WINDOW_SECS) >= tpm as u64 {
                return true;
            }
        }
        if let Some(tpd) = policy.tokens_per_day {
            if self.tokens_in_window_at(now, constants::DAY_WINDOW_SECS) >= tpd as u64 {
                return true;
            }
        }

        false
    }

    /// Whether the error cooldown is active.
    pub fn is_blocked(&self) -> bool {
        self.is_blocked_at(Instant::now())
    }

    pub(crate) fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Record a failed call. After `CONSECUTIVE_ERROR_LIMIT` failures in a
    /// row the key is put on cooldown for `block_secs`, independent of the
    /// sliding-window counters.
    pub fn record_error(&mut self, block_secs: u64) {
        self.record_error_at(Instant::now(), block_secs);
    }

    pub(crate) fn record_error_at(&mut self, now: Instant, block_secs: u64) {
        self.consecutive_errors += 1;

        if self.consecutive_errors >= constants::CONSECUTIVE_ERROR_LIMIT {
            self.blocked_until = Some(now + Duration::from_secs(block_secs));
            warn!(
                "Key {} blocked for {}s after {} consecutive errors",
                self.key_id, block_secs, self.consecutive_errors
            );
        }
    }

    /// Record a successful call: the error streak and any active block are
    /// cleared immediately.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.blocked_until = None;
    }

    /// Estimate when this key next becomes usable under `policy`.
    ///
    /// Returns `now` when the key is usable already. Best-effort: usage
    /// recorded between the estimate and that time can push it out.
    pub(crate) fn next_available_at(&self, now: Instant, policy: &RateLimitPolicy) -> Instant {
        if let Some(until) = self.blocked_until {
            if now < until {
                return until;
            }
        }

        let mut available_at = now;

        let request_windows = [
            (constants::MINUTE_WINDOW_SECS, policy.requests_per_minute),
            (constants::HOUR_WINDOW_SECS, policy.requests_per_hour),
            (constants::DAY_WINDOW_SECS, policy.requests_per_day),
        ];
        for (window_secs, ceiling) in request_windows {
            if self.requests_in_window_at(now, window_secs) >= ceiling {
                if let Some(oldest) = self.oldest_request_in_window(now, window_secs) {
                    available_at = available_at.max(oldest + Duration::from_secs(window_secs));
                }
            }
        }

        let token_windows = [
            (constants::MINUTE_WINDOW_SECS, policy.tokens_per_minute),
            (constants::DAY_WINDOW_SECS, policy.tokens_per_day),
        ];
        for (window_secs, ceiling) in token_windows {
            let Some(ceiling) = ceiling else { continue };
            if self.tokens_in_window_at(now, window_secs) >= ceiling as u64 {
                if let Some(oldest) = self.oldest_token_event_in_window(now, window_secs) {
                    available_at = available_at.max(oldest + Duration::from_secs(window_secs));
                }
            }
        }

        available_at
    }

    fn oldest_request_in_window(&self, now: Instant, window_secs: u64) -> Option<Instant> {
        let window = Duration::from_secs(window_secs);
        self.request_times
            .iter()
            .find(|t| now.saturating_duration_since(**t) < window)
            .copied()
    }

    fn oldest_token_event_in_window(&self, now: Instant, window_secs: u64) -> Option<Instant> {
        let window = Duration::from_secs(window_secs);
        self.token_events
            .iter()
            .find(|(t, _)| now.saturating_duration_since(*t) < window)
            .map(|(t, _)| *t)
    }

    fn prune(&mut self, now: Instant) {
        let retention = Duration::from_secs(constants::USAGE_RETENTION_SECS);
        while let Some(front) = self.request_times.front() {
            if now.saturating_duration_since(*front) >= retention {
                self.request_times.pop_front();
            } else {
                break;
            }
        }
        while let Some((front, _)) = self.token_events.front() {
            if now.saturating_duration_since(*front) >= retention {
                self.token_events.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(rpm: u32) -> RateLimitPolicy {
        RateLimitPolicy {
            requests_per_minute: rpm,
            requests_per_hour: 10_000,
            requests_per_day: 100_000,
            tokens_per_minute: None,
            tokens_per_day: None,
        }
    }

    #[test]
    fn minute_window_limits_after_ceiling() {
        let mut usage = KeyUsage::new("openai_1");
        let now = Instant::now();
        let limits = policy(3);

        for i in 0..3 {
            assert!(!usage.is_rate_limited_at(now, &limits));
            usage.record_request_at(now + Duration::from_secs(i), 0);
        }

        assert!(usage.is_rate_limited_at(now + Duration::from_secs(3), &limits));
    }

    #[test]
    fn minute_window_rolls_off() {
        let mut usage = KeyUsage::new("openai_1");
        let now = Instant::now();
        let limits = policy(1);

        usage.record_request_at(now, 0);
        assert!(usage.is_rate_limited_at(now, &limits));

        // The entry leaves the 60s window
        assert!(!usage.is_rate_limited_at(now + Duration::from_secs(61), &limits));
    }

    #[test]
    fn entries_older_than_retention_are_pruned() {
        let mut usage = KeyUsage::new("openai_1");
        let now = Instant::now();

        usage.record_request_at(now, 500);
        usage.record_request_at(now + Duration::from_secs(25 * 3600), 10);

        // The 25h-old entry must be gone from both sequences
        assert_eq!(
            usage.requests_in_window_at(
                now + Duration::from_secs(25 * 3600),
                constants::DAY_WINDOW_SECS
            ),
            1
        );
        assert_eq!(
            usage.tokens_in_window_at(
                now + Duration::from_secs(25 * 3600),
                constants::DAY_WINDOW_SECS
            ),
            10
        );
    }

    #[test]
    fn token_ceiling_limits() {
        let mut usage = KeyUsage::new("anthropic_1");
        let now = Instant::now();
        let limits = RateLimitPolicy {
            requests_per_minute: 1000,
            requests_per_hour: 10_000,
            requests_per_day: 100_000,
            tokens_per_minute: Some(100),
            tokens_per_day: None,
        };

        usage.record_request_at(now, 60);
        assert!(!usage.is_rate_limited_at(now, &limits));

        usage.record_request_at(now + Duration::from_secs(1), 40);
        assert!(usage.is_rate_limited_at(now + Duration::from_secs(1), &limits));
    }

    #[test]
    fn three_errors_block_until_cooldown_elapses() {
        let mut usage = KeyUsage::new("groq_1");
        let now = Instant::now();
        let limits = policy(1000);

        usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
        usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
        assert!(!usage.is_rate_limited_at(now, &limits));

        usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
        assert!(usage.is_rate_limited_at(now, &limits));
        assert!(usage.is_rate_limited_at(now + Duration::from_secs(299), &limits));
        assert!(!usage.is_rate_limited_at(now + Duration::from_secs(300), &limits));
    }

    #[test]
    fn success_clears_error_streak_and_block() {
        let mut usage = KeyUsage::new("groq_1");
        let now = Instant::now();
        let limits = policy(1000);

        for _ in 0..3 {
            usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
        }
        assert!(usage.is_blocked_at(now));

        usage.record_success();
        assert_eq!(usage.consecutive_errors(), 0);
        assert!(!usage.is_blocked_at(now));
        assert!(!usage.is_rate_limited_at(now, &limits));
    }

    #[test]
    fn errors_interleaved_with_success_never_block() {
        let mut usage = KeyUsage::new("groq_1");
        let now = Instant::now();

        for _ in 0..5 {
            usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
            usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
            usage.record_success();
        }
        assert!(!usage.is_blocked_at(now));
    }

    #[test]
    fn next_available_tracks_binding_window() {
        let mut usage = KeyUsage::new("google_1");
        let now = Instant::now();
        let limits = policy(2);

        usage.record_request_at(now, 0);
        usage.record_request_at(now + Duration::from_secs(10), 0);

        let at = usage.next_available_at(now + Duration::from_secs(10), &limits);
        // Minute window releases when the oldest entry rolls off
        assert_eq!(at, now + Duration::from_secs(60));
    }

    #[test]
    fn next_available_is_now_when_usable() {
        let mut usage = KeyUsage::new("google_1");
        let now = Instant::now();
        let limits = policy(10);

        usage.record_request_at(now, 0);
        assert_eq!(usage.next_available_at(now, &limits), now);
    }

    #[test]
    fn next_available_prefers_block_expiry() {
        let mut usage = KeyUsage::new("google_1");
        let now = Instant::now();
        let limits = policy(1000);

        for _ in 0..3 {
            usage.record_error_at(now, constants::DEFAULT_BLOCK_SECS);
        }

        let at = usage.next_available_at(now, &limits);
        assert_eq!(at, now + Duration::from_secs(constants::DEFAULT_BLOCK_SECS));
    }
}
