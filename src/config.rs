//! Configuration manager for galleria.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Public base URL of current instance.
    /// Used to build OAuth callback URLs.
    pub url: String,
    /// Port to listen on.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to external identity providers.
    #[serde(skip_serializing)]
    pub oauth: Option<Oauth>,
    /// Related to the content moderation service.
    #[serde(skip_serializing)]
    pub moderation: Option<Moderation>,
    /// Related to session cookies.
    #[serde(skip_serializing)]
    pub session: Option<Session>,
    /// Related to login lockout.
    #[serde(skip_serializing, default)]
    pub lockout: Lockout,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// External identity providers configuration.
///
/// Both providers are required: a missing entry is a startup error,
/// never a runtime one.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oauth {
    pub google: Provider,
    pub github: Provider,
}

/// Client credentials for one identity provider.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub client_id: String,
    pub client_secret: String,
}

/// Content moderation service configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moderation {
    /// Base URL of the moderation endpoint.
    pub address: String,
}

/// Session cookie configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Server-side session lifetime, in seconds.
    pub ttl_seconds: Option<i64>,
    /// Whether cookies are only sent over HTTPS.
    #[serde(default)]
    pub secure: bool,
}

/// Login lockout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockout {
    /// Failed attempts before the account is blocked.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: i32,
    /// Lockout window, in minutes.
    #[serde(default = "default_lockout_minutes")]
    pub duration_minutes: i64,
}

fn default_max_failed_attempts() -> i32 {
    5
}

fn default_lockout_minutes() -> i64 {
    1
}

impl Default for Lockout {
    fn default() -> Self {
        Self {
            max_failed_attempts: default_max_failed_attempts(),
            duration_minutes: default_lockout_minutes(),
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize URLs.
                config.url = self.normalize_url(&config.url)?;
                if let Some(moderation) = config.moderation.as_mut() {
                    moderation.address =
                        self.normalize_url(&moderation.address)?;
                }

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: galleria
url: gallery.example.org
port: 8080
postgres:
  address: localhost:5432
  database: galleria
oauth:
  google:
    client_id: google-id
    client_secret: google-secret
  github:
    client_id: github-id
    client_secret: github-secret
moderation:
  address: moderation.example.org
session:
  ttl_seconds: 3600
lockout:
  duration_minutes: 2
"#;

    #[test]
    fn test_read_configuration() {
        let path = std::env::temp_dir().join("galleria_config_test.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Configuration::default().path(path.clone()).read().unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(config.name, "galleria");
        assert_eq!(config.url, "https://gallery.example.org/");
        assert_eq!(config.port, Some(8080));
        assert_eq!(
            config.moderation.as_ref().unwrap().address,
            "https://moderation.example.org/"
        );
        assert_eq!(config.oauth.as_ref().unwrap().google.client_id, "google-id");
        // defaulted field inside a present section.
        assert_eq!(config.lockout.max_failed_attempts, 5);
        assert_eq!(config.lockout.duration_minutes, 2);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = Configuration::default()
            .path(PathBuf::from("/nonexistent/galleria.yaml"))
            .read()
            .unwrap();

        assert!(config.postgres.is_none());
        assert_eq!(config.lockout.max_failed_attempts, 5);
    }
}
