//! Integration tests for KeyBroker.

use keywheel::{KeyBroker, ProviderType, RateLimitPolicy, RotationError};

fn tight_policy(rpm: u32) -> RateLimitPolicy {
    RateLimitPolicy {
        requests_per_minute: rpm,
        requests_per_hour: 10_000,
        requests_per_day: 100_000,
        tokens_per_minute: None,
        tokens_per_day: None,
    }
}

// ============================================================================
// Builder Tests
// ============================================================================

#[test]
fn builder_creates_pools_per_provider() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::Groq, "gsk-1")
        .add_key(ProviderType::Groq, "gsk-2")
        .add_key(ProviderType::OpenAI, "sk-1")
        .build();

    let providers = broker.providers();
    assert!(providers.contains(&ProviderType::Groq));
    assert!(providers.contains(&ProviderType::OpenAI));
    assert!(!providers.contains(&ProviderType::Anthropic));
}

#[test]
fn builder_caps_keys_per_provider() {
    let mut builder = KeyBroker::builder();
    for i in 0..15 {
        builder = builder.add_key(ProviderType::OpenAI, format!("sk-{}", i));
    }
    let broker = builder.build();

    let status = broker.provider_status(ProviderType::OpenAI).unwrap();
    assert_eq!(status.total_keys, 10);
}

#[test]
fn builder_add_keys_bulk() {
    let broker = KeyBroker::builder()
        .add_keys(ProviderType::Anthropic, ["ak-1", "ak-2", "ak-3"])
        .build();

    let status = broker.provider_status(ProviderType::Anthropic).unwrap();
    assert_eq!(status.total_keys, 3);
    assert_eq!(status.available_keys, 3);
}

// ============================================================================
// Key Selection Tests
// ============================================================================

#[test]
fn unconfigured_provider_is_a_config_error() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::Groq, "gsk-1")
        .build();

    let err = broker.get_available_key(ProviderType::Google).unwrap_err();
    assert!(matches!(err, RotationError::NoCredentialsConfigured(ProviderType::Google)));
}

#[test]
fn healthy_keys_rotate_through_distinct_ids() {
    let broker = KeyBroker::builder()
        .add_keys(ProviderType::OpenAI, ["sk-a", "sk-b", "sk-c"])
        .build();

    let a = broker.get_available_key(ProviderType::OpenAI).unwrap();
    let b = broker.get_available_key(ProviderType::OpenAI).unwrap();
    let c = broker.get_available_key(ProviderType::OpenAI).unwrap();

    assert_eq!(a.id, "openai_1");
    assert_eq!(b.id, "openai_2");
    assert_eq!(c.id, "openai_3");
    assert_eq!(a.secret, "sk-a");
    assert_eq!(b.secret, "sk-b");
    assert_eq!(c.secret, "sk-c");
}

#[test]
fn limited_key_fails_over_to_next() {
    // rpm=1 with two keys: the first use of groq_1 exhausts it for 60s,
    // so a second call within the same second must land on groq_2
    let broker = KeyBroker::builder()
        .policy(ProviderType::Groq, tight_policy(1))
        .add_keys(ProviderType::Groq, ["gsk-1", "gsk-2"])
        .build();

    let first = broker.get_available_key(ProviderType::Groq).unwrap();
    assert_eq!(first.id, "groq_1");
    broker.record_request(ProviderType::Groq, &first.id, 50, true);

    let second = broker.get_available_key(ProviderType::Groq).unwrap();
    assert_eq!(second.id, "groq_2");
}

#[test]
fn exhausted_pool_reports_all_credentials_exhausted() {
    let broker = KeyBroker::builder()
        .policy(ProviderType::Groq, tight_policy(1))
        .add_keys(ProviderType::Groq, ["gsk-1", "gsk-2"])
        .build();

    for _ in 0..2 {
        let lease = broker.get_available_key(ProviderType::Groq).unwrap();
        broker.record_request(ProviderType::Groq, &lease.id, 0, true);
    }

    let err = broker.get_available_key(ProviderType::Groq).unwrap_err();
    assert!(matches!(err, RotationError::AllCredentialsExhausted(ProviderType::Groq)));
}

// ============================================================================
// Error Blocking Tests
// ============================================================================

#[test]
fn three_failures_block_a_key() {
    let broker = KeyBroker::builder()
        .add_keys(ProviderType::Perplexity, ["pplx-1", "pplx-2"])
        .build();

    for _ in 0..3 {
        broker.record_request(ProviderType::Perplexity, "perplexity_1", 0, false);
    }

    let status = broker.provider_status(ProviderType::Perplexity).unwrap();
    let blocked = &status.keys[0];
    assert!(blocked.is_blocked);
    assert!(blocked.is_rate_limited);
    assert_eq!(blocked.consecutive_errors, 3);
    assert!(blocked.block_remaining_secs.is_some());
    assert_eq!(status.available_keys, 1);

    // Selection skips the blocked key entirely
    let lease = broker.get_available_key(ProviderType::Perplexity).unwrap();
    assert_eq!(lease.id, "perplexity_2");
}

#[test]
fn success_clears_a_block_immediately() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::DeepSeek, "dk-1")
        .build();

    for _ in 0..3 {
        broker.record_request(ProviderType::DeepSeek, "deepseek_1", 0, false);
    }
    assert!(broker.get_available_key(ProviderType::DeepSeek).is_err());

    broker.record_request(ProviderType::DeepSeek, "deepseek_1", 10, true);

    let status = broker.provider_status(ProviderType::DeepSeek).unwrap();
    assert_eq!(status.keys[0].consecutive_errors, 0);
    assert!(!status.keys[0].is_blocked);
    assert!(broker.get_available_key(ProviderType::DeepSeek).is_ok());
}

// ============================================================================
// Status & Diagnostics Tests
// ============================================================================

#[test]
fn status_tracks_window_counters() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::Google, "gk-1")
        .build();

    broker.record_request(ProviderType::Google, "google_1", 120, true);
    broker.record_request(ProviderType::Google, "google_1", 30, true);

    let status = broker.provider_status(ProviderType::Google).unwrap();
    assert_eq!(status.total_keys, 1);

    let key = &status.keys[0];
    assert_eq!(key.requests_last_minute, 2);
    assert_eq!(key.requests_last_hour, 2);
    assert_eq!(key.requests_last_day, 2);
    assert_eq!(key.tokens_last_minute, 150);
    assert_eq!(key.tokens_last_day, 150);
}

#[test]
fn status_for_unconfigured_provider_is_an_error() {
    let broker = KeyBroker::builder().build();
    assert!(broker.provider_status(ProviderType::OpenAI).is_err());
}

#[test]
fn all_status_covers_every_configured_provider() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::OpenAI, "sk-1")
        .add_key(ProviderType::Groq, "gsk-1")
        .build();

    let statuses = broker.all_status();
    assert_eq!(statuses.len(), 2);
}

#[test]
fn next_available_time_for_a_limited_pool_is_in_the_future() {
    let broker = KeyBroker::builder()
        .policy(ProviderType::Groq, tight_policy(1))
        .add_key(ProviderType::Groq, "gsk-1")
        .build();

    let before = std::time::Instant::now();
    let lease = broker.get_available_key(ProviderType::Groq).unwrap();
    broker.record_request(ProviderType::Groq, &lease.id, 0, true);

    let at = broker.next_available_time(ProviderType::Groq).unwrap();
    // The minute window binds: roughly 60s out from the recorded request
    assert!(at > before + std::time::Duration::from_secs(55));
}

#[test]
fn next_available_time_is_none_when_unconfigured() {
    let broker = KeyBroker::builder().build();
    assert!(broker.next_available_time(ProviderType::Groq).is_none());
}

#[test]
fn unknown_outcome_reports_are_dropped() {
    let broker = KeyBroker::builder()
        .add_key(ProviderType::Groq, "gsk-1")
        .build();

    // Neither of these may panic or corrupt state
    broker.record_request(ProviderType::Groq, "groq_42", 10, true);
    broker.record_request(ProviderType::Anthropic, "anthropic_1", 10, true);

    let status = broker.provider_status(ProviderType::Groq).unwrap();
    assert_eq!(status.keys[0].requests_last_day, 0);
}

// ============================================================================
// TOML Configuration Tests
// ============================================================================

#[test]
fn from_config_str_loads_keys_and_limits() {
    let toml = r#"
[[keys]]
provider = "groq"
api_key = "gsk-config-1"

[[keys]]
provider = "groq"
api_key = "gsk-config-2"

[limits.groq]
requests_per_minute = 1
requests_per_hour = 100
requests_per_day = 1000
"#;

    let broker = KeyBroker::from_config_str(toml).unwrap();

    let status = broker.provider_status(ProviderType::Groq).unwrap();
    assert_eq!(status.total_keys, 2);
    assert_eq!(status.limits.requests_per_minute, 1);

    // The override actually gates selection
    let lease = broker.get_available_key(ProviderType::Groq).unwrap();
    broker.record_request(ProviderType::Groq, &lease.id, 0, true);
    let second = broker.get_available_key(ProviderType::Groq).unwrap();
    assert_ne!(lease.id, second.id);
}

#[test]
fn from_config_str_rejects_unknown_provider() {
    let toml = r#"
[[keys]]
provider = "skynet"
api_key = "k"
"#;

    assert!(KeyBroker::from_config_str(toml).is_err());
}
