//! In-process catalog
//!
//! [`MemoryCatalog`] implements [`NativeClient`] over in-memory tables. It
//! keeps the catalog's observable behaviour (status codes, trash on
//! non-forced removal, per-replica listings, ACL inheritance) so code
//! written against the native facade can run without a catalog server.

mod principals;
mod session;
mod state;

pub use session::MemorySession;

use crate::env;
use crate::records::ConnectRequest;
use crate::session::{NativeClient, NativeSession};
use crate::status::{
    CAT_INVALID_ARGUMENT, CAT_INVALID_AUTHENTICATION, CAT_INVALID_USER,
    CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME, NativeResult, USER_SOCK_CONNECT_ERR,
};
use icat_common::{ResourceClass, UserType, ZoneType};
use parking_lot::Mutex;
use state::{CatalogState, DEFAULT_MODE, fail, parent_of};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub(crate) struct Shared {
    host: String,
    port: u16,
    zone: String,
    online: AtomicBool,
    next_session: AtomicU64,
    state: Mutex<CatalogState>,
}

/// An in-process catalog server
#[derive(Clone)]
pub struct MemoryCatalog {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCatalog")
            .field("host", &self.shared.host)
            .field("port", &self.shared.port)
            .field("zone", &self.shared.zone)
            .finish_non_exhaustive()
    }
}

impl MemoryCatalog {
    /// A catalog serving `zone` at `host:port`, administered by `admin`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        zone: impl Into<String>,
        admin: &str,
        password: &str,
    ) -> Self {
        let host = host.into();
        let zone = zone.into();
        let state = CatalogState::new(&host, port, &zone, admin, password);
        Self {
            shared: Arc::new(Shared {
                host,
                port,
                zone,
                online: AtomicBool::new(true),
                next_session: AtomicU64::new(1),
                state: Mutex::new(state),
            }),
        }
    }

    /// `tempZone` at `localhost:1247` with admin `rods`/`password` and
    /// `/tempZone/home/rods/hello.txt`
    pub fn demo() -> Self {
        let catalog = Self::new("localhost", 1247, "tempZone", "rods", "password");
        {
            let mut state = catalog.shared.state.lock();
            // Seeding a fresh catalog cannot collide with existing names
            let _ = state.put_object(
                "rods",
                "/tempZone/home/rods/hello.txt",
                b"Hello, World!\n".to_vec(),
                DEFAULT_MODE,
                false,
                "",
            );
        }
        catalog
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.shared.port
    }

    #[must_use]
    pub fn zone(&self) -> &str {
        &self.shared.zone
    }

    pub fn add_user(&self, name: &str, password: &str, user_type: UserType) -> NativeResult<()> {
        let mut state = self.shared.state.lock();
        state.create_user(name, "", user_type)?;
        if let Some(user) = state.principals.get_mut(name) {
            user.password = password.to_string();
        }
        Ok(())
    }

    /// Register a user whose home zone is a known remote zone
    pub fn add_remote_user(&self, name: &str, zone: &str) -> NativeResult<()> {
        let mut state = self.shared.state.lock();
        if !state.zones.contains_key(zone) || zone == self.shared.zone {
            return fail(CAT_INVALID_ARGUMENT, format!("zone {zone} is not a remote zone"));
        }
        if state.principals.contains_key(name) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("user {name} already exists"),
            );
        }
        state.insert_principal(name, "rodsuser", "");
        if let Some(user) = state.principals.get_mut(name) {
            user.zone = zone.to_string();
        }
        Ok(())
    }

    pub fn add_group(&self, name: &str, members: &[&str]) -> NativeResult<()> {
        let mut state = self.shared.state.lock();
        state.create_group(name, "")?;
        for member in members {
            state.add_to_group(member, "", name)?;
        }
        Ok(())
    }

    pub fn add_resource(&self, name: &str, class: ResourceClass, vault: &str) {
        let host = self.shared.host.clone();
        self.shared
            .state
            .lock()
            .insert_resource(name, class, &host, vault);
    }

    /// Register a federated zone
    pub fn add_remote_zone(&self, name: &str, conn_string: &str) {
        let mut state = self.shared.state.lock();
        let id = state.next_id();
        let now = state.tick();
        state.zones.insert(
            name.to_string(),
            state::ZoneRecord {
                id,
                zone_type: ZoneType::Remote,
                conn_string: conn_string.to_string(),
                comment: String::new(),
                create_ts: now,
                modify_ts: now,
            },
        );
    }

    /// Store a data object owned by the owner of its parent collection
    pub fn put_object(&self, path: &str, data: &[u8]) -> NativeResult<()> {
        let mut state = self.shared.state.lock();
        let owner = state
            .principals
            .values()
            .find(|p| p.type_name == "rodsadmin")
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let owner = state
            .collection_owner(parent_of(path))
            .unwrap_or(owner);
        state.put_object(&owner, path, data.to_vec(), DEFAULT_MODE, true, "")
    }

    #[must_use]
    pub fn object_data(&self, path: &str) -> Option<Vec<u8>> {
        self.shared.state.lock().object_data(path)
    }

    /// A collection or data object exists at `path`
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.shared.state.lock().contains(path)
    }

    /// Let `user` authenticate with an empty password, as after `iinit`
    pub fn remember_login(&self, user: &str) {
        if let Some(p) = self.shared.state.lock().principals.get_mut(user) {
            p.cached_login = true;
        }
    }

    /// Simulate losing (or regaining) the network path to the catalog
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    /// Number of times a session operation has been called
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.shared.state.lock().call_count(op)
    }

    /// Collection and data object handles currently open across sessions
    #[must_use]
    pub fn open_handle_count(&self) -> usize {
        self.shared.state.lock().open_handle_count()
    }

    fn authenticate(
        &self,
        host: &str,
        port: u16,
        username: &str,
        zone: &str,
        password: &str,
    ) -> NativeResult<MemorySession> {
        if !self.shared.online.load(Ordering::SeqCst)
            || host != self.shared.host
            || port != self.shared.port
        {
            return fail(
                USER_SOCK_CONNECT_ERR,
                format!("can't connect to {host}:{port}"),
            );
        }
        if zone != self.shared.zone {
            return fail(CAT_INVALID_USER, format!("unknown zone {zone}"));
        }

        let state = self.shared.state.lock();
        let user = state
            .principals
            .get(username)
            .filter(|p| !p.is_group())
            .ok_or_else(|| {
                crate::NativeError::new(CAT_INVALID_USER, format!("unknown user {username}"))
            })?;
        let accepted = if password.is_empty() {
            user.cached_login
        } else {
            user.password == password
        };
        if !accepted {
            return fail(
                CAT_INVALID_AUTHENTICATION,
                format!("authentication failed for {username}#{zone}"),
            );
        }
        drop(state);

        let session = self.shared.next_session.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(user = %username, zone = %zone, session, "catalog session opened");
        Ok(MemorySession::new(
            Arc::clone(&self.shared),
            session,
            username.to_string(),
        ))
    }
}

impl NativeClient for MemoryCatalog {
    fn connect(&self, request: &ConnectRequest) -> NativeResult<Box<dyn NativeSession>> {
        let session = match request {
            ConnectRequest::Environment { password } => {
                let env = env::environment()?;
                self.authenticate(
                    &env.irods_host,
                    env.irods_port,
                    &env.irods_user_name,
                    &env.irods_zone_name,
                    password,
                )?
            }
            ConnectRequest::Explicit {
                host,
                port,
                username,
                zone,
                password,
            } => self.authenticate(host, *port, username, zone, password)?,
        };
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AvuRecord, MetaTarget, ObjectKind, OpenFlags};
    use crate::status::SYS_HEADER_READ_LEN_ERR;

    fn explicit(user: &str, password: &str) -> ConnectRequest {
        ConnectRequest::Explicit {
            host: "localhost".to_string(),
            port: 1247,
            username: user.to_string(),
            zone: "tempZone".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_connect_checks_credentials() {
        let catalog = MemoryCatalog::demo();
        assert!(catalog.connect(&explicit("rods", "password")).is_ok());

        let err = catalog.connect(&explicit("rods", "wrong")).err().unwrap();
        assert_eq!(err.status, CAT_INVALID_AUTHENTICATION);

        let err = catalog.connect(&explicit("nobody", "x")).err().unwrap();
        assert_eq!(err.status, CAT_INVALID_USER);

        let err = catalog.connect(&explicit("rods", "")).err().unwrap();
        assert_eq!(err.status, CAT_INVALID_AUTHENTICATION);
        catalog.remember_login("rods");
        assert!(catalog.connect(&explicit("rods", "")).is_ok());

        let err = catalog
            .connect(&ConnectRequest::Explicit {
                host: "elsewhere".to_string(),
                port: 1247,
                username: "rods".to_string(),
                zone: "tempZone".to_string(),
                password: "password".to_string(),
            })
            .err()
            .unwrap();
        assert_eq!(err.status, USER_SOCK_CONNECT_ERR);
    }

    #[test]
    fn test_remote_users_keep_their_zone() {
        let catalog = MemoryCatalog::demo();
        let err = catalog.add_remote_user("bob", "otherZone").unwrap_err();
        assert_eq!(err.status, CAT_INVALID_ARGUMENT);

        catalog.add_remote_zone("otherZone", "other.example.org:1247");
        catalog.add_remote_user("bob", "otherZone").unwrap();
        let mut session = catalog.connect(&explicit("rods", "password")).unwrap();
        let info = session.user_info("bob").unwrap();
        assert_eq!(info["zone_name"], "otherZone");
        assert_eq!(
            catalog.add_remote_user("bob", "otherZone").unwrap_err().status,
            CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME
        );
    }

    #[test]
    fn test_environment_connect() {
        env::install_environment(icat_common::EnvironmentFile {
            irods_host: "localhost".to_string(),
            irods_port: 1247,
            irods_user_name: "rods".to_string(),
            irods_zone_name: "tempZone".to_string(),
            irods_default_resource: None,
        });
        let catalog = MemoryCatalog::demo();
        let mut session = catalog
            .connect(&ConnectRequest::Environment {
                password: "password".to_string(),
            })
            .unwrap();
        assert!(session.list_users().unwrap().contains(&"rods".to_string()));
    }

    #[test]
    fn test_session_reads_seeded_object() {
        let catalog = MemoryCatalog::demo();
        let mut session = catalog.connect(&explicit("rods", "password")).unwrap();
        let h = session
            .open_data_object("/tempZone/home/rods/hello.txt", "", OpenFlags::ReadOnly)
            .unwrap();
        assert_eq!(session.read_data_object(h, 64).unwrap(), b"Hello, World!\n");
        session.close_data_object(h).unwrap();
        assert_eq!(catalog.call_count("read_data_object"), 1);
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_dropped_session_releases_handles() {
        let catalog = MemoryCatalog::demo();
        {
            let mut session = catalog.connect(&explicit("rods", "password")).unwrap();
            session.open_collection("/tempZone/home/rods", true).unwrap();
            assert_eq!(catalog.open_handle_count(), 1);
        }
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_offline_and_disconnected() {
        let catalog = MemoryCatalog::demo();
        let mut session = catalog.connect(&explicit("rods", "password")).unwrap();
        catalog.set_online(false);
        let err = session.list_zones().unwrap_err();
        assert_eq!(err.status, SYS_HEADER_READ_LEN_ERR);
        catalog.set_online(true);

        session.disconnect().unwrap();
        let err = session.list_zones().unwrap_err();
        assert_eq!(err.status, USER_SOCK_CONNECT_ERR);
    }

    #[test]
    fn test_non_admin_cannot_create_users() {
        let catalog = MemoryCatalog::demo();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        let mut session = catalog.connect(&explicit("alice", "secret")).unwrap();
        let err = session
            .create_user("bob", "tempZone", UserType::User)
            .unwrap_err();
        assert_eq!(err.status, crate::status::CAT_INSUFFICIENT_PRIVILEGE_LEVEL);

        // alice's own objects land under her ownership
        session
            .create_data_object("/tempZone/home/alice/a.txt", 0, 0, false, "")
            .unwrap();
        let stat = session.stat_data_object("/tempZone/home/alice/a.txt").unwrap();
        assert_eq!(stat.owner_name, "alice");

        session
            .add_metadata("d", "/tempZone/home/alice/a.txt", &AvuRecord::new("k", "v", ""))
            .unwrap();
        session
            .remove("/tempZone/home/alice/a.txt", ObjectKind::DataObject, false, false)
            .unwrap();
        let avus = session
            .list_metadata(&MetaTarget::DataObject {
                name: "a.txt".to_string(),
                collection: "/tempZone/trash/home/alice".to_string(),
            })
            .unwrap();
        assert_eq!(avus.len(), 1);
    }
}
