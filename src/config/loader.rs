//! Configuration file loading, environment variable resolution and the
//! environment key-loading convention.

use std::env;
use std::fs;
use std::path::Path;

use regex::Regex;
use url::Url;

use crate::constants;
use crate::errors::{RotationError, RotationResult};
use crate::providers::ProviderType;
use super::types::Config;

/// Load and parse a TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> RotationResult<Config> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        RotationError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse a TOML configuration string.
///
/// `${VAR_NAME}` references in key values are resolved against the
/// environment at load time; a missing variable is an error naming the
/// variable and where it was referenced.
pub fn parse_config(content: &str) -> RotationResult<Config> {
    let mut config: Config = toml::from_str(content).map_err(|e| {
        RotationError::ConfigError(format!("Failed to parse TOML: {}", e))
    })?;

    resolve_env_vars(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Keys for `provider` found in the environment.
///
/// Scans `{PREFIX}_API_KEY_1` .. `{PREFIX}_API_KEY_10`; the bare
/// `{PREFIX}_API_KEY` is accepted for the first slot. Gaps in the
/// numbering are allowed.
pub fn env_keys(provider: ProviderType) -> Vec<String> {
    let prefix = provider.env_prefix();
    let mut keys = Vec::new();

    for i in 1..=constants::MAX_KEYS_PER_PROVIDER {
        let slot = env::var(format!("{}_API_KEY_{}", prefix, i)).ok();
        let key = if i == 1 {
            slot.or_else(|| env::var(format!("{}_API_KEY", prefix)).ok())
        } else {
            slot
        };
        if let Some(key) = key {
            if !key.is_empty() {
                keys.push(key);
            }
        }
    }

    keys
}

/// Resolve environment variable references in the configuration.
fn resolve_env_vars(config: &mut Config) -> RotationResult<()> {
    let env_var_pattern = Regex::new(r"\$\{([^}]+)\}").unwrap();

    for (idx, entry) in config.keys.iter_mut().enumerate() {
        if let Some(resolved) = resolve_env_var_string(&entry.api_key, &env_var_pattern)? {
            entry.api_key = resolved;
        } else if env_var_pattern.is_match(&entry.api_key) {
            if let Some(caps) = env_var_pattern.captures(&entry.api_key) {
                let var_name = caps.get(1).unwrap().as_str();
                return Err(RotationError::ConfigError(format!(
                    "Environment variable '{}' not found\n  \
                     → Referenced in keys[{}].api_key\n  \
                     → Set it with: export {}=\"your-key\"",
                    var_name, idx, var_name
                )));
            }
        }
    }

    Ok(())
}

/// Resolve environment variables in a single string.
/// Returns None if no env vars are present, Some(resolved) if all resolved
/// successfully.
fn resolve_env_var_string(s: &str, pattern: &Regex) -> RotationResult<Option<String>> {
    if !pattern.is_match(s) {
        return Ok(None);
    }

    let mut result = s.to_string();

    for caps in pattern.captures_iter(s) {
        let full_match = caps.get(0).unwrap().as_str();
        let var_name = caps.get(1).unwrap().as_str();

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                return Err(RotationError::ConfigError(format!(
                    "Environment variable '{}' not found\n  \
                     → Set it with: export {}=\"your-value\"",
                    var_name, var_name
                )));
            }
        }
    }

    Ok(Some(result))
}

/// Validate the configuration for consistency.
fn validate_config(config: &Config) -> RotationResult<()> {
    for (idx, entry) in config.keys.iter().enumerate() {
        entry.provider.parse::<ProviderType>().map_err(|_| {
            RotationError::ConfigError(format!(
                "Unknown provider '{}' in keys[{}]\n  \
                 → Valid providers: openai, google, groq, anthropic, deepseek, perplexity",
                entry.provider, idx
            ))
        })?;
    }

    for (name, policy) in &config.limits {
        name.parse::<ProviderType>().map_err(|_| {
            RotationError::ConfigError(format!(
                "Unknown provider '{}' in [limits]\n  \
                 → Valid providers: openai, google, groq, anthropic, deepseek, perplexity",
                name
            ))
        })?;

        if policy.requests_per_minute == 0
            || policy.requests_per_hour == 0
            || policy.requests_per_day == 0
        {
            return Err(RotationError::ConfigError(format!(
                "Rate limits for '{}' must be greater than zero\n  \
                 → A ceiling of 0 would make every key permanently unusable",
                name
            )));
        }
    }

    for (name, endpoint) in &config.endpoints {
        name.parse::<ProviderType>().map_err(|_| {
            RotationError::ConfigError(format!(
                "Unknown provider '{}' in [endpoints]\n  \
                 → Valid providers: openai, google, groq, anthropic, deepseek, perplexity",
                name
            ))
        })?;

        Url::parse(endpoint).map_err(|e| {
            RotationError::ConfigError(format!(
                "Invalid endpoint '{}' for provider '{}': {}",
                endpoint, name, e
            ))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[[keys]]
provider = "groq"
api_key = "test-key"
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.keys.len(), 1);
        assert_eq!(config.keys[0].api_key, "test-key");
        assert_eq!(config.settings.max_retries, 3);
    }

    #[test]
    fn env_var_resolution() {
        env::set_var("KEYWHEEL_TEST_API_KEY", "resolved-key");

        let toml = r#"
[[keys]]
provider = "openai"
api_key = "${KEYWHEEL_TEST_API_KEY}"
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.keys[0].api_key, "resolved-key");

        env::remove_var("KEYWHEEL_TEST_API_KEY");
    }

    #[test]
    fn missing_env_var_names_the_variable() {
        let toml = r#"
[[keys]]
provider = "openai"
api_key = "${KEYWHEEL_DEFINITELY_UNSET}"
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("KEYWHEEL_DEFINITELY_UNSET"));
    }

    #[test]
    fn invalid_provider_rejected() {
        let toml = r#"
[[keys]]
provider = "skynet"
api_key = "key"
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("Unknown provider"));
    }

    #[test]
    fn limit_overrides_parse() {
        let toml = r#"
[settings]
max_retries = 5

[[keys]]
provider = "groq"
api_key = "key"

[limits.groq]
requests_per_minute = 10
requests_per_hour = 100
requests_per_day = 1000
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.settings.max_retries, 5);
        let groq = &config.limits["groq"];
        assert_eq!(groq.requests_per_minute, 10);
        assert!(groq.tokens_per_minute.is_none());
    }

    #[test]
    fn zero_ceiling_rejected() {
        let toml = r#"
[limits.groq]
requests_per_minute = 0
requests_per_hour = 100
requests_per_day = 1000
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let toml = r#"
[endpoints]
groq = "not a url"
"#;

        let err = parse_config(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid endpoint"));
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[keys]]\nprovider = \"perplexity\"\napi_key = \"pplx-key\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.keys[0].provider, "perplexity");
    }

    #[test]
    fn env_keys_follow_numbered_convention() {
        env::set_var("DEEPSEEK_API_KEY_1", "dk-1");
        env::set_var("DEEPSEEK_API_KEY_2", "dk-2");

        let keys = env_keys(ProviderType::DeepSeek);
        assert_eq!(keys, vec!["dk-1".to_string(), "dk-2".to_string()]);

        env::remove_var("DEEPSEEK_API_KEY_1");
        env::remove_var("DEEPSEEK_API_KEY_2");
    }

    #[test]
    fn bare_env_key_fills_first_slot() {
        env::set_var("PPLX_API_KEY", "pplx-only");

        let keys = env_keys(ProviderType::Perplexity);
        assert_eq!(keys, vec!["pplx-only".to_string()]);

        env::remove_var("PPLX_API_KEY");
    }
}
