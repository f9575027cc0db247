//! Provider configuration: credentials and endpoint of the Ghost API.
//!
//! Values come from the provider block; each one left out falls back to its
//! environment variable.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::client::GhostClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment variable holding the API user.
pub const USER_ENV: &str = "GHOST_USER";
/// Environment variable holding the API password.
pub const PASSWORD_ENV: &str = "GHOST_PASSWORD";
/// Environment variable holding the API endpoint.
pub const ENDPOINT_ENV: &str = "GHOST_ENDPOINT";

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "user",
            Attribute::optional_string()
                .with_description(format!("API user. Defaults to ${}", USER_ENV)),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .with_description(format!("API password. Defaults to ${}", PASSWORD_ENV))
                .sensitive(),
        )
        .with_attribute(
            "endpoint",
            Attribute::optional_string()
                .with_description(format!("API base URL. Defaults to ${}", ENDPOINT_ENV)),
        )
}

/// Resolved connection settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API user.
    pub user: String,
    /// API password.
    pub password: String,
    /// Base URL, e.g. `https://ghost.example.com`.
    pub endpoint: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Config {
    /// Read the provider block, falling back to the process environment.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |name| std::env::var(name).ok())
    }

    /// Read the provider block, falling back to `lookup` for absent values.
    pub fn from_value_with_env<F>(value: Value, lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match value {
            Value::Null => Config::default(),
            value => serde_json::from_value(value)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        };

        for (field, name) in [
            (&mut config.user, USER_ENV),
            (&mut config.password, PASSWORD_ENV),
            (&mut config.endpoint, ENDPOINT_ENV),
        ] {
            if field.is_empty() {
                *field = lookup(name).unwrap_or_default();
            }
        }

        Ok(config)
    }

    /// Check the settings and build a client from them.
    pub fn client(&self) -> Result<GhostClient, ProviderError> {
        if self.user.is_empty() || self.password.is_empty() || self.endpoint.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "At least 1 ghost parameter is empty: Username: {}, Password, URL: {}",
                self.user, self.endpoint
            )));
        }

        Url::parse(&self.endpoint).map_err(|e| {
            ProviderError::Configuration(format!("Invalid endpoint URL {}: {}", self.endpoint, e))
        })?;

        let client = GhostClient::new(&self.endpoint, &self.user, &self.password)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        info!(user = %self.user, endpoint = %self.endpoint, "Ghost client configured");
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn config(user: &str, password: &str, endpoint: &str) -> Config {
        Config {
            user: user.into(),
            password: password.into(),
            endpoint: endpoint.into(),
        }
    }

    #[test]
    fn test_empty_parameters() {
        let err = assert_err!(config("", "", "").client());
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = assert_err!(config("myuser", "", "https://www.valid.url").client());
        let msg = err.to_string();
        assert!(msg.contains("myuser"));
        assert!(msg.contains("https://www.valid.url"));
    }

    #[test]
    fn test_password_never_in_error() {
        let err = assert_err!(config("myuser", "s3cr3t", "").client());
        assert!(!err.to_string().contains("s3cr3t"));
        assert!(!format!("{:?}", config("u", "s3cr3t", "e")).contains("s3cr3t"));
    }

    #[test]
    fn test_invalid_url() {
        let err = assert_err!(config("myuser", "mypwd", "invalid.url").client());
        assert!(err.to_string().contains("Invalid endpoint URL"));
    }

    #[test]
    fn test_valid_parameters() {
        let client = assert_ok!(config("myuser", "mypwd", "https://www.valid.url").client());
        assert_eq!(client.endpoint(), "https://www.valid.url");
        assert_eq!(client.username(), "myuser");
    }

    #[test]
    fn test_env_fallback() {
        let env = |name: &str| match name {
            USER_ENV => Some("envuser".to_string()),
            PASSWORD_ENV => Some("envpwd".to_string()),
            ENDPOINT_ENV => Some("https://env.example".to_string()),
            _ => None,
        };

        let config = Config::from_value_with_env(json!({"user": "explicit"}), env).unwrap();
        assert_eq!(config.user, "explicit");
        assert_eq!(config.password, "envpwd");
        assert_eq!(config.endpoint, "https://env.example");

        let config = Config::from_value_with_env(Value::Null, env).unwrap();
        assert_eq!(config.user, "envuser");
    }

    #[test]
    fn test_no_env() {
        let config = Config::from_value_with_env(json!({}), |_| None).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.client().is_err());
    }

    #[test]
    fn test_wrong_types() {
        let err = Config::from_value_with_env(json!({"user": 42}), |_| None).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_provider_schema() {
        let schema = provider_schema();
        assert!(schema.block.attributes["password"].flags.sensitive);
        assert!(schema.block.attributes["endpoint"].flags.optional);
    }
}
