//! Flat environment variables understood by the deployed service.
//!
//! Every value is optional. Unparseable or out-of-range values keep the
//! current setting instead of failing startup.

use std::time::Duration;

use super::types::{ensure_slash, Config};

pub const INPUT_BUCKET: &str = "INPUT_BUCKET";
pub const OUTPUT_BUCKET: &str = "OUTPUT_BUCKET";
pub const INPUT_PREFIX: &str = "INPUT_PREFIX";
pub const OUTPUT_PREFIX: &str = "OUTPUT_PREFIX";
pub const PORT: &str = "PORT";
pub const ACCESS_TOKEN: &str = "GCP_ACCESS_TOKEN";
pub const RETRIES: &str = "GCS_RETRIES";
pub const TOKEN_TIMEOUT: &str = "GCS_TOKEN_TIMEOUT";
pub const DOWNLOAD_TIMEOUT: &str = "GCS_DOWNLOAD_TIMEOUT";
pub const UPLOAD_TIMEOUT: &str = "GCS_UPLOAD_TIMEOUT";
pub const METADATA_TIMEOUT: &str = "GCS_METADATA_TIMEOUT";
pub const RETRY_BACKOFF: &str = "GCS_RETRY_BACKOFF";
pub const RETRY_MAX_BACKOFF: &str = "GCS_RETRY_MAX_BACKOFF";

/// Applies the flat variables on top of `config`, reading them through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get(INPUT_BUCKET) {
        config.storage.input_bucket = v;
    }
    if let Some(v) = get(OUTPUT_BUCKET) {
        config.storage.output_bucket = v;
    }
    if let Some(v) = get(INPUT_PREFIX) {
        config.storage.input_prefix = v;
    }
    if let Some(v) = get(OUTPUT_PREFIX) {
        config.storage.output_prefix = v;
    }
    config.storage.input_prefix = ensure_slash(&config.storage.input_prefix);
    config.storage.output_prefix = ensure_slash(&config.storage.output_prefix);

    if let Some(port) = get(PORT).and_then(|v| v.parse::<u16>().ok()) {
        config.server.port = port;
    }
    if let Some(v) = get(ACCESS_TOKEN) {
        config.token.access_token = Some(v);
    }

    let retry = &mut config.retry;
    if let Some(attempts) = get(RETRIES).and_then(|v| v.parse::<u32>().ok()) {
        // Zero still means one try.
        retry.attempts = attempts.max(1);
    }
    let millis = |name: &str| get(name).and_then(|v| parse_duration(&v)).map(as_millis);
    if let Some(ms) = millis(TOKEN_TIMEOUT) {
        retry.token_timeout_ms = ms;
    }
    if let Some(ms) = millis(DOWNLOAD_TIMEOUT) {
        retry.download_timeout_ms = ms;
    }
    if let Some(ms) = millis(UPLOAD_TIMEOUT) {
        retry.upload_timeout_ms = ms;
    }
    if let Some(ms) = millis(METADATA_TIMEOUT) {
        retry.metadata_timeout_ms = ms;
    }
    if let Some(ms) = millis(RETRY_BACKOFF) {
        retry.initial_backoff_ms = ms;
    }
    if let Some(ms) = millis(RETRY_MAX_BACKOFF) {
        retry.max_backoff_ms = ms;
    }
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Parses a duration such as `200ms`, `10s`, `1m30s` or `2h 5m`.
///
/// Returns `None` for malformed input and for zero durations.
pub fn parse_duration(input: &str) -> Option<Duration> {
    humantime::parse_duration(input.trim())
        .ok()
        .filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("200ms"), Some(Duration::from_millis(200)));
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h 5m"), Some(Duration::from_secs(7500)));
        assert_eq!(parse_duration("1500us"), Some(Duration::from_micros(1500)));
        assert_eq!(parse_duration("1.5h"), None);
        assert_eq!(parse_duration("0s"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                (INPUT_BUCKET, " in-bkt "),
                (OUTPUT_BUCKET, "out-bkt"),
                (INPUT_PREFIX, "drop"),
                (PORT, "9090"),
                (RETRIES, "5"),
                (RETRY_BACKOFF, "50ms"),
                (RETRY_MAX_BACKOFF, "1s"),
                (UPLOAD_TIMEOUT, "2m"),
                (ACCESS_TOKEN, "tok"),
            ]),
        );

        assert_eq!(config.storage.input_bucket, "in-bkt");
        assert_eq!(config.storage.output_bucket, "out-bkt");
        assert_eq!(config.storage.input_prefix, "drop/");
        assert_eq!(config.storage.output_prefix, "out/");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 50);
        assert_eq!(config.retry.max_backoff_ms, 1000);
        assert_eq!(config.retry.upload_timeout_ms, 120_000);
        assert_eq!(config.token.access_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                (PORT, "eighty"),
                (RETRIES, "-2"),
                (TOKEN_TIMEOUT, "soon"),
                (RETRY_BACKOFF, "0ms"),
                (OUTPUT_BUCKET, "   "),
            ]),
        );

        let defaults = Config::default();
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.retry, defaults.retry);
        assert!(config.storage.output_bucket.is_empty());
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let mut config = Config::default();
        config.storage.input_bucket = "in-bkt".to_string();
        config.storage.output_bucket = "out-bkt".to_string();
        apply_env_overrides(&mut config, lookup(&[(RETRIES, "0")]));

        assert_eq!(config.retry.attempts, 1);
        assert!(crate::config::validate_config(&config).is_ok());
    }
}
