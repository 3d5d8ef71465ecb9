/// Configuration management for the automation inbox service
///
/// Settings come from the process environment, optionally seeded from a `.env`
/// file. Every value has a default so the service starts with no configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name, reported in the startup log
    pub app_name: String,
    /// Deployment environment ("dev", "staging", "prod", ...)
    pub environment: String,
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Shared-secret authentication
    pub auth: AuthConfig,
    /// Log output configuration
    pub logging: LoggingConfig,
    /// Persisted request log configuration
    pub api_log: ApiLogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. "sqlite://data/automation.db" or "sqlite::memory:"
    pub url: String,
    /// Upper bound on pooled connections (file databases only)
    pub max_connections: u32,
}

/// `X-API-Key` gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected value of the `X-API-Key` header
    pub api_key: String,
    /// Route groups that require the key. Empty means no route is gated.
    pub protected: BTreeSet<RouteGroup>,
}

/// Route groups that can be placed behind the API key gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteGroup {
    Webhooks,
    Tasks,
    Workflows,
    ApiLogs,
}

impl RouteGroup {
    pub const ALL: [RouteGroup; 4] = [
        RouteGroup::Webhooks,
        RouteGroup::Tasks,
        RouteGroup::Workflows,
        RouteGroup::ApiLogs,
    ];

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "webhooks" => Some(RouteGroup::Webhooks),
            "tasks" => Some(RouteGroup::Tasks),
            "workflows" => Some(RouteGroup::Workflows),
            "api_logs" => Some(RouteGroup::ApiLogs),
            _ => None,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Settings for the request log sink (the `api_logs` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLogConfig {
    /// Persist one row per request
    pub enabled: bool,
    /// Bodies larger than this are not captured
    pub max_body_bytes: usize,
    /// Requests whose path starts with any of these prefixes are not persisted
    pub exclude_paths: Vec<String>,
}

impl Config {
    /// Build configuration from the process environment
    ///
    /// Loads `.env` from the working directory first when present. Variables
    /// already set in the environment win over `.env` entries.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment overrides from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = get("ENVIRONMENT", "dev");
        let json_logs = lookup("LOG_JSON")
            .and_then(|v| parse_bool(&v))
            .unwrap_or_else(|| is_deployed_environment(&environment));

        Self {
            app_name: get("APP_NAME", "Automation Inbox"),
            server: ServerConfig {
                host: get("HOST", "0.0.0.0"),
                port: get("PORT", "8000").parse().unwrap_or(8000),
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL", "sqlite://data/automation.db"),
                max_connections: get("DATABASE_MAX_CONNECTIONS", "5").parse().unwrap_or(5),
            },
            auth: AuthConfig {
                api_key: get("API_KEY", "change-me"),
                protected: lookup("API_KEY_ROUTES")
                    .map(|raw| parse_route_groups(&raw))
                    .unwrap_or_default(),
            },
            logging: LoggingConfig {
                level: get(
                    "LOG_LEVEL",
                    if is_deployed_environment(&environment) { "info" } else { "debug" },
                ),
                json: json_logs,
            },
            api_log: ApiLogConfig {
                enabled: lookup("API_LOG_ENABLED")
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(true),
                max_body_bytes: get("API_LOG_MAX_BODY_BYTES", "65536")
                    .parse()
                    .unwrap_or(65536),
                exclude_paths: lookup("API_LOG_EXCLUDE_PATHS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_else(|| vec!["/health".to_string(), "/v1/api-logs".to_string()]),
            },
            environment,
        }
    }

    /// Whether `group` sits behind the `X-API-Key` gate
    pub fn requires_api_key(&self, group: RouteGroup) -> bool {
        self.auth.protected.contains(&group)
    }
}

impl Default for Config {
    /// All defaults, no environment lookups
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn is_deployed_environment(environment: &str) -> bool {
    matches!(
        environment.to_ascii_lowercase().as_str(),
        "production" | "prod" | "staging"
    )
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_route_groups(raw: &str) -> BTreeSet<RouteGroup> {
    let items = split_list(raw);
    if items.iter().any(|item| item.eq_ignore_ascii_case("all")) {
        return RouteGroup::ALL.into_iter().collect();
    }
    items
        .iter()
        .filter_map(|item| {
            let group = RouteGroup::parse(item);
            if group.is_none() {
                tracing::warn!("Ignoring unknown API_KEY_ROUTES entry: {}", item);
            }
            group
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_leave_every_route_open() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.api_key, "change-me");
        assert!(config.auth.protected.is_empty());
        assert!(config.api_log.enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let config = config_from(&[("PORT", "not-a-port"), ("DATABASE_MAX_CONNECTIONS", "-1")]);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn route_groups_are_parsed_from_a_list() {
        let config = config_from(&[("API_KEY_ROUTES", "tasks, api-logs,bogus")]);
        assert!(config.requires_api_key(RouteGroup::Tasks));
        assert!(config.requires_api_key(RouteGroup::ApiLogs));
        assert!(!config.requires_api_key(RouteGroup::Webhooks));
    }

    #[test]
    fn all_protects_every_group() {
        let config = config_from(&[("API_KEY_ROUTES", "all")]);
        for group in RouteGroup::ALL {
            assert!(config.requires_api_key(group));
        }
    }

    #[test]
    fn deployed_environments_log_json() {
        let config = config_from(&[("ENVIRONMENT", "Production")]);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");

        let config = config_from(&[("ENVIRONMENT", "prod"), ("LOG_JSON", "false")]);
        assert!(!config.logging.json);
    }
}
