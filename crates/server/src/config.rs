//! Server configuration.
//!
//! [`ServerConfig`] is built through a validating builder or loaded from
//! `TOGO_*` environment variables (a `.env` file is honoured when present).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TOGO_LISTEN_ADDR` | `0.0.0.0:5050` |
//! | `TOGO_JWT_SECRET` | required |
//! | `TOGO_TOKEN_TTL` | `15m` |
//! | `TOGO_REQUEST_TIMEOUT` | `30s` |
//! | `TOGO_QUOTA_MAX_ATTEMPTS` | `32` |
//! | `TOGO_SEED_USERS` | empty; `id:password:max_per_day`, comma separated |

use std::{collections::HashSet, fmt, net::SocketAddr, str::FromStr, time::Duration};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use togo_authn::DEFAULT_TOKEN_TTL;
use togo_storage::DEFAULT_MAX_INSERT_ATTEMPTS;
use zeroize::Zeroizing;

/// Default request timeout (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("missing required setting {key}")]
    Missing {
        /// Setting name.
        key: String,
    },

    /// A setting could not be parsed.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// Setting name.
        key: String,
        /// Why the value was refused.
        message: String,
    },

    /// A duration or count that must be non-zero was zero.
    #[error("{field} must be positive")]
    MustBePositive {
        /// Setting name.
        field: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Invalid { key: key.into(), message: message.to_string() }
    }
}

/// A configured secret. Wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// The secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// A user created in the identity store at startup.
#[derive(Clone, Deserialize)]
pub struct SeedUser {
    /// User identifier.
    pub id: String,
    /// Plaintext password, digested before it is stored.
    pub password: Secret,
    /// Daily task limit.
    pub max_tasks_per_day: u32,
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("id", &self.id)
            .field("max_tasks_per_day", &self.max_tasks_per_day)
            .finish_non_exhaustive()
    }
}

impl FromStr for SeedUser {
    type Err = ConfigError;

    /// Parses `id:password:max_per_day`. The password may itself contain `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = "TOGO_SEED_USERS";
        let (id, rest) =
            s.split_once(':').ok_or_else(|| ConfigError::invalid(key, "expected id:password:max"))?;
        let (password, max) =
            rest.rsplit_once(':').ok_or_else(|| ConfigError::invalid(key, "expected id:password:max"))?;
        let max_tasks_per_day =
            max.trim().parse().map_err(|e| ConfigError::invalid(key, format!("{max:?}: {e}")))?;

        Ok(Self { id: id.trim().to_owned(), password: password.into(), max_tasks_per_day })
    }
}

/// Configuration for the `togo` server.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use togo_server::config::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .jwt_secret("wqGyEBBfPK9w3Lxw")
///     .token_ttl(Duration::from_secs(600))
///     .build()?;
/// assert_eq!(config.listen_addr().port(), 5050);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_listen_addr")]
    listen_addr: SocketAddr,

    /// Token signing secret.
    jwt_secret: Secret,

    /// Lifetime of issued tokens.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    token_ttl: Duration,

    /// Per-request timeout.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    request_timeout: Duration,

    /// Bound on counter re-reads in a quota-guarded insert.
    #[serde(default = "default_quota_max_attempts")]
    quota_max_attempts: u32,

    /// Users created at startup.
    #[serde(default)]
    seed_users: Vec<SeedUser>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5050))
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_quota_max_attempts() -> u32 {
    DEFAULT_MAX_INSERT_ATTEMPTS
}

#[bon::bon]
impl ServerConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The secret is empty
    /// - The token lifetime, request timeout or attempt bound is zero
    /// - A seed user has an empty or duplicated id
    #[builder]
    pub fn new(
        #[builder(default = default_listen_addr())] listen_addr: SocketAddr,
        #[builder(into)] jwt_secret: Secret,
        #[builder(default = DEFAULT_TOKEN_TTL)] token_ttl: Duration,
        #[builder(default = DEFAULT_REQUEST_TIMEOUT)] request_timeout: Duration,
        #[builder(default = DEFAULT_MAX_INSERT_ATTEMPTS)] quota_max_attempts: u32,
        #[builder(default)] seed_users: Vec<SeedUser>,
    ) -> Result<Self, ConfigError> {
        Self { listen_addr, jwt_secret, token_ttl, request_timeout, quota_max_attempts, seed_users }
            .validated()
    }

    /// Checks the invariants [`new`](Self::new) enforces. Used after
    /// deserialization as well.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.jwt_secret.expose().is_empty() {
            return Err(ConfigError::Missing { key: "TOGO_JWT_SECRET".into() });
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::MustBePositive { field: "token_ttl" });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::MustBePositive { field: "request_timeout" });
        }
        if self.quota_max_attempts == 0 {
            return Err(ConfigError::MustBePositive { field: "quota_max_attempts" });
        }

        let mut seen = HashSet::new();
        for seed in &self.seed_users {
            if seed.id.is_empty() {
                return Err(ConfigError::invalid("TOGO_SEED_USERS", "user id must not be empty"));
            }
            if !seen.insert(seed.id.as_str()) {
                return Err(ConfigError::invalid(
                    "TOGO_SEED_USERS",
                    format!("duplicate user id '{}'", seed.id),
                ));
            }
        }

        Ok(self)
    }

    /// Loads configuration from the process environment, reading a `.env`
    /// file first if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is missing, unparsable or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is not an error.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is missing, unparsable or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = parse_or(&lookup, "TOGO_LISTEN_ADDR", default_listen_addr(), |raw| {
            raw.parse::<SocketAddr>().map_err(|e| e.to_string())
        })?;
        let jwt_secret = lookup("TOGO_JWT_SECRET")
            .ok_or_else(|| ConfigError::Missing { key: "TOGO_JWT_SECRET".into() })?;
        let token_ttl = parse_or(&lookup, "TOGO_TOKEN_TTL", DEFAULT_TOKEN_TTL, parse_duration)?;
        let request_timeout =
            parse_or(&lookup, "TOGO_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT, parse_duration)?;
        let quota_max_attempts =
            parse_or(&lookup, "TOGO_QUOTA_MAX_ATTEMPTS", DEFAULT_MAX_INSERT_ATTEMPTS, |raw| {
                raw.parse::<u32>().map_err(|e| e.to_string())
            })?;
        let seed_users = match lookup("TOGO_SEED_USERS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::parse)
                .collect::<Result<Vec<SeedUser>, _>>()?,
            None => Vec::new(),
        };

        Self::builder()
            .listen_addr(listen_addr)
            .jwt_secret(jwt_secret)
            .token_ttl(token_ttl)
            .request_timeout(request_timeout)
            .quota_max_attempts(quota_max_attempts)
            .seed_users(seed_users)
            .build()
    }

    /// Returns the listen address.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Returns the token signing secret.
    #[must_use]
    pub fn jwt_secret(&self) -> &Secret {
        &self.jwt_secret
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the bound on counter re-reads for quota-guarded inserts.
    #[must_use]
    pub fn quota_max_attempts(&self) -> u32 {
        self.quota_max_attempts
    }

    /// Returns the users to create at startup.
    #[must_use]
    pub fn seed_users(&self) -> &[SeedUser] {
        &self.seed_users
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            parse(raw.trim()).map_err(|message| ConfigError::invalid(key, message))
        },
        _ => Ok(default),
    }
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("TOGO_JWT_SECRET", "s")])).unwrap();

        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:5050");
        assert_eq!(config.token_ttl(), Duration::from_secs(900));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.quota_max_attempts(), 32);
        assert!(config.seed_users().is_empty());
    }

    #[test]
    fn test_secret_is_required() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key } if key == "TOGO_JWT_SECRET"));

        let err = ServerConfig::from_lookup(lookup(&[("TOGO_JWT_SECRET", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn test_humantime_durations() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "s"),
            ("TOGO_TOKEN_TTL", "1h 30m"),
            ("TOGO_REQUEST_TIMEOUT", "250ms"),
        ]))
        .unwrap();

        assert_eq!(config.token_ttl(), Duration::from_secs(5400));
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "s"),
            ("TOGO_LISTEN_ADDR", "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "TOGO_LISTEN_ADDR"));

        let err = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "s"),
            ("TOGO_QUOTA_MAX_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MustBePositive { field: "quota_max_attempts" });
    }

    #[test]
    fn test_seed_users_parse() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "s"),
            ("TOGO_SEED_USERS", "firstUser:example:5, second:pa:ss:2,"),
        ]))
        .unwrap();

        let seeds = config.seed_users();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].id, "firstUser");
        assert_eq!(seeds[0].password.expose(), "example");
        assert_eq!(seeds[0].max_tasks_per_day, 5);
        assert_eq!(seeds[1].password.expose(), "pa:ss");
    }

    #[test]
    fn test_duplicate_seed_users_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "s"),
            ("TOGO_SEED_USERS", "a:x:1,a:y:2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("TOGO_JWT_SECRET", "super-secret-key"),
            ("TOGO_SEED_USERS", "firstUser:hunter2:5"),
        ]))
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("firstUser"));
    }

    #[test]
    fn test_deserialize_then_validate() {
        let json = r#"{
            "jwt_secret": "s",
            "token_ttl": "10m",
            "seed_users": [{"id": "u", "password": "p", "max_tasks_per_day": 3}]
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        let config = config.validated().unwrap();

        assert_eq!(config.token_ttl(), Duration::from_secs(600));
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.seed_users()[0].max_tasks_per_day, 3);
    }

    proptest! {
        /// Passwords may contain anything but the list separator.
        #[test]
        fn seed_user_parse_keeps_password(
            id in "[A-Za-z0-9_]{1,16}",
            password in "[^,]{0,24}",
            max in 0u32..10_000,
        ) {
            let seed: SeedUser = format!("{id}:{password}:{max}").parse().unwrap();
            prop_assert_eq!(seed.id, id);
            prop_assert_eq!(seed.password.expose(), password.as_str());
            prop_assert_eq!(seed.max_tasks_per_day, max);
        }
    }
}
