//! Connection configuration
//!
//! [`ConnectionOptions`] describes how a session is established. When the
//! credential source is [`CredentialSource::System`], endpoint and identity
//! come from the client environment document described by
//! [`EnvironmentFile`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default catalog port
pub const DEFAULT_PORT: u16 = 1247;

/// Environment variable naming an explicit environment document
pub const ENVIRONMENT_FILE_VAR: &str = "IRODS_ENVIRONMENT_FILE";

/// Where connection credentials come from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Endpoint and identity from the client environment document
    System,
    /// Endpoint and identity given explicitly in [`ConnectionOptions`]
    #[default]
    UserDefined,
}

/// Options used to open a connection
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Credential source
    pub source: CredentialSource,
    /// Catalog host
    pub host: String,
    /// Catalog port
    pub port: u16,
    /// Zone to authenticate against
    pub zone: String,
    /// User name
    pub username: String,
    /// Password; empty delegates to the environment's authentication state
    pub password: String,
    /// Deadline for acquiring the session lease (`None` blocks indefinitely)
    #[serde(with = "duration_millis")]
    pub lease_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            source: CredentialSource::UserDefined,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            zone: String::new(),
            username: String::new(),
            password: String::new(),
            lease_timeout: None,
        }
    }
}

impl ConnectionOptions {
    /// Explicit credentials
    pub fn user_defined(
        host: impl Into<String>,
        port: u16,
        zone: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            source: CredentialSource::UserDefined,
            host: host.into(),
            port,
            zone: zone.into(),
            username: username.into(),
            password: password.into(),
            lease_timeout: None,
        }
    }

    /// Credentials from the process environment
    pub fn system(password: impl Into<String>) -> Self {
        Self {
            source: CredentialSource::System,
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the lease deadline
    #[must_use]
    pub const fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = Some(timeout);
        self
    }

    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_argument(format!("invalid connection options: {e}")))
    }
}

/// The client environment document (`irods_environment.json`)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFile {
    pub irods_host: String,
    #[serde(default = "default_port")]
    pub irods_port: u16,
    pub irods_user_name: String,
    pub irods_zone_name: String,
    #[serde(default)]
    pub irods_default_resource: Option<String>,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl EnvironmentFile {
    /// Location of the environment document: `$IRODS_ENVIRONMENT_FILE`,
    /// else `$HOME/.irods/irods_environment.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(ENVIRONMENT_FILE_VAR) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".irods").join("irods_environment.json"))
    }

    /// Load and parse the environment document at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::io(format!(
                "can't read environment file {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::invalid_argument(format!(
                "invalid environment file {}: {e}",
                path.display()
            ))
        })
    }

    /// Load the environment document from its default location
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()
            .ok_or_else(|| Error::not_found("no environment file location (HOME unset)"))?;
        Self::load(path)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
