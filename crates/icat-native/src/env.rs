//! Process-wide client environment
//!
//! Sessions opened with [`crate::ConnectRequest::Environment`] take their
//! endpoint and identity from here. The state is loaded from the default
//! environment document on first use and never changed afterwards.

use crate::status::{NativeError, NativeResult, USER_RODS_HOST_EMPTY};
use icat_common::EnvironmentFile;
use std::sync::OnceLock;

static ENVIRONMENT: OnceLock<EnvironmentFile> = OnceLock::new();

/// Seed the process environment before its first use
///
/// Returns `false` if an environment was already in place.
pub fn install_environment(env: EnvironmentFile) -> bool {
    let installed = ENVIRONMENT.set(env).is_ok();
    if !installed {
        tracing::warn!("client environment already initialised, keeping existing one");
    }
    installed
}

/// The process environment, loading the default document on first use
///
/// A failed load is not remembered; the next call tries again.
pub fn environment() -> NativeResult<EnvironmentFile> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env.clone());
    }
    let loaded = EnvironmentFile::load_default()
        .map_err(|e| NativeError::new(USER_RODS_HOST_EMPTY, e.message().to_string()))?;
    if loaded.irods_host.is_empty() {
        return Err(NativeError::new(
            USER_RODS_HOST_EMPTY,
            "environment has no irods_host",
        ));
    }
    tracing::debug!(host = %loaded.irods_host, zone = %loaded.irods_zone_name, "loaded client environment");
    Ok(ENVIRONMENT.get_or_init(|| loaded).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_environment_is_kept() {
        let env = EnvironmentFile {
            irods_host: "localhost".to_string(),
            irods_port: 1247,
            irods_user_name: "rods".to_string(),
            irods_zone_name: "tempZone".to_string(),
            irods_default_resource: None,
        };
        install_environment(env);

        let current = environment().unwrap();
        assert_eq!(current.irods_zone_name, "tempZone");

        let other = EnvironmentFile {
            irods_host: "elsewhere".to_string(),
            ..current.clone()
        };
        assert!(!install_environment(other));
        assert_eq!(environment().unwrap().irods_host, current.irods_host);
    }
}
