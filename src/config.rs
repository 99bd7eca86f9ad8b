//! Server configuration module
//! Handles dynamic configuration parameters for the chat hub server

use crate::constants::{
    DEFAULT_BROADCAST_CAPACITY, DEFAULT_HOST, DEFAULT_MAX_CONCURRENT_SENDS,
    DEFAULT_MAX_MESSAGE_LENGTH, DEFAULT_OUTBOUND_QUEUE_CAPACITY, DEFAULT_PORT,
    DEFAULT_REGISTER_CAPACITY, DEFAULT_REVOCATION_CLEANUP_SECS, DEFAULT_TOKEN_TTL_HOURS,
    DEFAULT_UNREGISTER_CAPACITY, DEFAULT_WRITE_TIMEOUT_SECS,
};
use crate::error::{ChatHubError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tuning parameters for the hub coordinator and its fan-out
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Pending registrations before `register` callers wait
    pub register_capacity: usize,
    /// Pending unregistrations before callers wait
    pub unregister_capacity: usize,
    /// Pending chat events before producers wait
    pub broadcast_capacity: usize,
    /// Frames buffered per connection before it counts as a slow consumer
    pub outbound_queue_capacity: usize,
    /// Deadline for a single delivery to one connection
    pub write_timeout: Duration,
    /// Upper bound on concurrent deliveries for one broadcast
    pub max_concurrent_sends: usize,
    /// Largest accepted inbound text frame, in bytes
    pub max_message_length: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            register_capacity: DEFAULT_REGISTER_CAPACITY,
            unregister_capacity: DEFAULT_UNREGISTER_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for token signing/validation
    pub jwt_secret: String,
    /// Lifetime of issued access tokens
    pub token_ttl: Duration,
    /// How often expired revocations are purged
    pub revocation_cleanup_interval: Duration,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        panic!("ServerConfig::default() is not allowed for security reasons. Use ServerConfig::from_env() instead.");
    }
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret: "test-jwt-secret-only-for-unit-tests-never-use-in-production".to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_HOURS * 3600),
            revocation_cleanup_interval: Duration::from_secs(DEFAULT_REVOCATION_CLEANUP_SECS),
            hub: HubConfig::default(),
        }
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(ChatHubError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // Placeholders shipped in sample .env files
        let insecure_patterns = [
            "your-secret-key",
            "your-256-bit-secret",
            "change-this",
            "default",
            "password",
            "12345",
        ];

        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(ChatHubError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChatHubError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols) for security".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("CHAT_HUB_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = var_or(&lookup, "CHAT_HUB_PORT", DEFAULT_PORT);

        let jwt_secret = lookup("CHAT_HUB_JWT_SECRET")
            .or_else(|| lookup("JWT_SECRET"))
            .ok_or_else(|| {
                ChatHubError::ConfigError(
                    "JWT_SECRET environment variable is required for security. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;
        Self::validate_secret(&jwt_secret)?;

        let token_ttl_hours: u64 =
            var_or(&lookup, "CHAT_HUB_TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS);
        let cleanup_secs: u64 = var_or(
            &lookup,
            "CHAT_HUB_REVOCATION_CLEANUP_SECS",
            DEFAULT_REVOCATION_CLEANUP_SECS,
        );
        let write_timeout_secs: u64 =
            var_or(&lookup, "CHAT_HUB_WRITE_TIMEOUT_SECS", DEFAULT_WRITE_TIMEOUT_SECS);

        // Zero-sized channels panic in tokio, so capacities are clamped to one
        let hub = HubConfig {
            register_capacity: var_or(
                &lookup,
                "CHAT_HUB_REGISTER_CAPACITY",
                DEFAULT_REGISTER_CAPACITY,
            )
            .max(1),
            unregister_capacity: var_or(
                &lookup,
                "CHAT_HUB_UNREGISTER_CAPACITY",
                DEFAULT_UNREGISTER_CAPACITY,
            )
            .max(1),
            broadcast_capacity: var_or(
                &lookup,
                "CHAT_HUB_BROADCAST_CAPACITY",
                DEFAULT_BROADCAST_CAPACITY,
            )
            .max(1),
            outbound_queue_capacity: var_or(
                &lookup,
                "CHAT_HUB_OUTBOUND_QUEUE",
                DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            )
            .max(1),
            write_timeout: Duration::from_secs(write_timeout_secs.max(1)),
            max_concurrent_sends: var_or(
                &lookup,
                "CHAT_HUB_MAX_CONCURRENT_SENDS",
                DEFAULT_MAX_CONCURRENT_SENDS,
            )
            .max(1),
            max_message_length: var_or(
                &lookup,
                "CHAT_HUB_MAX_MESSAGE_LENGTH",
                DEFAULT_MAX_MESSAGE_LENGTH,
            ),
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_hours.max(1) * 3600),
            revocation_cleanup_interval: Duration::from_secs(cleanup_secs.max(1)),
            hub,
        })
    }
}

fn var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const STRONG_SECRET: &str = "k3y-Fz9!q0Lw2#Xv8rTn5%Hs7@Jd4^Gb6&";

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    #[should_panic(expected = "ServerConfig::default() is not allowed for security reasons")]
    fn test_default_panics() {
        let _ = ServerConfig::default();
    }

    #[test]
    fn test_for_testing_works_in_tests() {
        let config = ServerConfig::for_testing();
        assert!(config.jwt_secret.contains("test"));
        assert_eq!(config.hub.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
    }

    #[test]
    fn test_requires_secret() {
        let result = ServerConfig::from_vars(vars(&[]));
        assert!(result.unwrap_err().to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_rejects_weak_secrets() {
        assert!(ServerConfig::from_vars(vars(&[("JWT_SECRET", "short")])).is_err());
        assert!(ServerConfig::from_vars(vars(&[(
            "JWT_SECRET",
            "your-256-bit-secret-padded-out-to-length-0"
        )]))
        .is_err());
        assert!(ServerConfig::from_vars(vars(&[(
            "JWT_SECRET",
            "onlylettersonlylettersonlylettersonly"
        )]))
        .is_err());
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = ServerConfig::from_vars(vars(&[
            ("CHAT_HUB_JWT_SECRET", STRONG_SECRET),
            ("CHAT_HUB_PORT", "4100"),
            ("CHAT_HUB_BROADCAST_CAPACITY", "512"),
            ("CHAT_HUB_REGISTER_CAPACITY", "0"),
            ("CHAT_HUB_WRITE_TIMEOUT_SECS", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, 4100);
        assert_eq!(config.hub.broadcast_capacity, 512);
        assert_eq!(config.hub.register_capacity, 1);
        assert_eq!(
            config.hub.write_timeout,
            Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS)
        );
        assert_eq!(config.token_ttl, Duration::from_secs(24 * 3600));
    }
}
