//! Connections and the session lease
//!
//! A [`Connection`] owns one authenticated native session. The session is
//! not safe for concurrent use, so every remote call goes through a
//! [`Lease`]: an exclusive, scoped borrow of the session that is released
//! when the lease is dropped, on every exit path. Callers wanting
//! parallelism open more connections.

use crate::cache::PrincipalCache;
use crate::collection::Collection;
use crate::dataobj::DataObject;
use crate::options::CollectionOptions;
use crate::path;
use crate::principal::{Group, Resource, User, Zone};
use icat_common::{
    ConnectionOptions, CredentialSource, Error, ErrorKind, Result, UserType,
};
use icat_native::{ConnectRequest, NativeClient, NativeResult, NativeSession};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// State guarded by the lease lock
pub(crate) struct SessionSlot {
    session: Option<Box<dyn NativeSession>>,
    cache: PrincipalCache,
}

pub(crate) struct ConnectionInner {
    host: String,
    port: u16,
    zone: String,
    username: String,
    lease_timeout: Option<Duration>,
    connected: AtomicBool,
    slot: Mutex<SessionSlot>,
    opened: Mutex<Vec<Weak<Collection>>>,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if let Some(mut session) = self.slot.get_mut().session.take() {
            if let Err(e) = session.disconnect() {
                debug!("Disconnect on drop failed: {}", e);
            }
        }
    }
}

/// An authenticated session to a catalog
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

/// Non-owning reference held by principals and metadata collections
#[derive(Clone)]
pub(crate) struct WeakConnection(Weak<ConnectionInner>);

impl WeakConnection {
    pub(crate) fn upgrade(&self) -> Result<Connection> {
        self.0
            .upgrade()
            .map(|inner| Connection { inner })
            .ok_or_else(|| Error::closed("connection has been dropped"))
    }
}

impl Connection {
    /// Authenticate a new session
    ///
    /// With [`CredentialSource::System`] the endpoint and identity come from
    /// the process-wide client environment.
    pub fn open(native: &dyn NativeClient, options: &ConnectionOptions) -> Result<Self> {
        let (request, host, port, zone, username) = match options.source {
            CredentialSource::System => {
                let env = icat_native::env::environment()
                    .map_err(|e| e.into_error("load client environment"))?;
                (
                    ConnectRequest::Environment {
                        password: options.password.clone(),
                    },
                    env.irods_host,
                    env.irods_port,
                    env.irods_zone_name,
                    env.irods_user_name,
                )
            }
            CredentialSource::UserDefined => (
                ConnectRequest::Explicit {
                    host: options.host.clone(),
                    port: options.port,
                    username: options.username.clone(),
                    zone: options.zone.clone(),
                    password: options.password.clone(),
                },
                options.host.clone(),
                options.port,
                options.zone.clone(),
                options.username.clone(),
            ),
        };

        let session = native
            .connect(&request)
            .map_err(|e| {
                e.into_connect_error(&format!("connect to {host}:{port} as {username}"))
            })?;
        info!("Connected to {}:{}/{} as {}", host, port, zone, username);

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                host,
                port,
                zone,
                username,
                lease_timeout: options.lease_timeout,
                connected: AtomicBool::new(true),
                slot: Mutex::new(SessionSlot {
                    session: Some(session),
                    cache: PrincipalCache::default(),
                }),
                opened: Mutex::new(Vec::new()),
            }),
        })
    }

    pub(crate) fn downgrade(&self) -> WeakConnection {
        WeakConnection(Arc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Name of the zone this session authenticated against
    #[must_use]
    pub fn zone_name(&self) -> &str {
        &self.inner.zone
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, SessionSlot>> {
        match self.inner.lease_timeout {
            Some(timeout) => self.inner.slot.try_lock_for(timeout).ok_or_else(|| {
                Error::fatal(
                    ErrorKind::Timeout,
                    format!("session lease not acquired within {timeout:?}"),
                )
            }),
            None => Ok(self.inner.slot.lock()),
        }
    }

    /// Take the exclusive session lease
    ///
    /// Blocks until the lease is free, or until the configured lease
    /// timeout expires. Fails with `Closed` after [`Connection::disconnect`].
    pub fn borrow(&self) -> Result<Lease<'_>> {
        let guard = self.lock_slot()?;
        if guard.session.is_none() {
            return Err(Error::closed(format!(
                "connection to {}:{} is closed",
                self.inner.host, self.inner.port
            )));
        }
        debug!("Lease acquired on {}:{}", self.inner.host, self.inner.port);
        Ok(Lease {
            connection: self,
            guard,
        })
    }

    /// Close every opened collection and end the session
    ///
    /// Disconnecting twice is a no-op.
    pub fn disconnect(&self) -> Result<()> {
        let opened: Vec<Arc<Collection>> = self
            .inner
            .opened
            .lock()
            .drain(..)
            .filter_map(|collection| collection.upgrade())
            .collect();
        for collection in opened {
            if let Err(e) = collection.close() {
                warn!("Failed to close {} on disconnect: {}", collection.path(), e);
            }
        }

        let mut slot = self.lock_slot()?;
        let Some(mut session) = slot.session.take() else {
            return Ok(());
        };
        slot.cache = PrincipalCache::default();
        self.inner.connected.store(false, Ordering::SeqCst);
        drop(slot);

        let result = session.disconnect();
        info!("Disconnected from {}:{}", self.inner.host, self.inner.port);
        result.map_err(|e| e.into_error("disconnect"))
    }

    // =========== Principal cache ===========

    /// The zone this session authenticated against
    pub fn local_zone(&self) -> Result<Arc<Zone>> {
        self.borrow()?.local_zone()
    }

    pub fn zones(&self) -> Result<Vec<Arc<Zone>>> {
        self.borrow()?.zones()
    }

    pub fn users(&self) -> Result<Vec<Arc<User>>> {
        self.borrow()?.users()
    }

    pub fn groups(&self) -> Result<Vec<Arc<Group>>> {
        self.borrow()?.groups()
    }

    pub fn resources(&self) -> Result<Vec<Arc<Resource>>> {
        self.borrow()?.resources()
    }

    pub fn refresh_zones(&self) -> Result<Vec<Arc<Zone>>> {
        self.borrow()?.refresh_zones()
    }

    pub fn refresh_users(&self) -> Result<Vec<Arc<User>>> {
        self.borrow()?.refresh_users()
    }

    pub fn refresh_groups(&self) -> Result<Vec<Arc<Group>>> {
        self.borrow()?.refresh_groups()
    }

    pub fn refresh_resources(&self) -> Result<Vec<Arc<Resource>>> {
        self.borrow()?.refresh_resources()
    }

    /// The cached user named `name`, or an unhydrated placeholder
    pub fn user(&self, name: &str) -> Result<Arc<User>> {
        if let Some(user) = self.borrow()?.cached_user(name)? {
            return Ok(user);
        }
        warn!("User {} not in cache, using a placeholder", name);
        Ok(Arc::new(User::new(
            self.downgrade(),
            name.to_string(),
            self.inner.zone.clone(),
        )))
    }

    /// The cached group named `name`, or an unhydrated placeholder
    pub fn group(&self, name: &str) -> Result<Arc<Group>> {
        if let Some(group) = self.borrow()?.cached_group(name)? {
            return Ok(group);
        }
        warn!("Group {} not in cache, using a placeholder", name);
        Ok(Arc::new(Group::new(
            self.downgrade(),
            name.to_string(),
            self.inner.zone.clone(),
        )))
    }

    /// The cached zone named `name`, or an unhydrated placeholder
    pub fn zone(&self, name: &str) -> Result<Arc<Zone>> {
        let mut lease = self.borrow()?;
        lease.zones()?;
        if let Some(zone) = lease.guard.cache.zones.find(name) {
            return Ok(zone);
        }
        warn!("Zone {} not in cache, using a placeholder", name);
        Ok(Arc::new(Zone::new(self.downgrade(), name.to_string())))
    }

    /// The cached resource named `name`, or an unhydrated placeholder
    pub fn resource(&self, name: &str) -> Result<Arc<Resource>> {
        let mut lease = self.borrow()?;
        lease.resources()?;
        if let Some(resource) = lease.guard.cache.resources.find(name) {
            return Ok(resource);
        }
        warn!("Resource {} not in cache, using a placeholder", name);
        Ok(Arc::new(Resource::new(self.downgrade(), name.to_string())))
    }

    /// Create a user in the local zone
    pub fn create_user(&self, name: &str, user_type: UserType) -> Result<Arc<User>> {
        let mut lease = self.borrow()?;
        lease.run(&format!("create user {name}"), |s| {
            s.create_user(name, &self.inner.zone, user_type)
        })?;
        lease.refresh_users()?;
        info!("Created {} {}#{}", user_type, name, self.inner.zone);
        lease
            .cached_user(name)?
            .ok_or_else(|| Error::not_found(format!("user {name} missing after create")))
    }

    /// Create a group in the local zone
    pub fn create_group(&self, name: &str) -> Result<Arc<Group>> {
        let mut lease = self.borrow()?;
        lease.run(&format!("create group {name}"), |s| {
            s.create_group(name, &self.inner.zone)
        })?;
        lease.refresh_groups()?;
        info!("Created group {}#{}", name, self.inner.zone);
        lease
            .cached_group(name)?
            .ok_or_else(|| Error::not_found(format!("group {name} missing after create")))
    }

    // =========== Namespace ===========

    /// Open a collection
    ///
    /// The parent is hydrated to locate the collection; a recursive open
    /// also hydrates the whole subtree.
    pub fn collection(&self, options: CollectionOptions) -> Result<Arc<Collection>> {
        let path = path::normalize(&options.path)?;
        let collection = Collection::open(self, &path, options.recursive, !options.get_replicas)?;
        self.inner.opened.lock().push(Arc::downgrade(&collection));
        Ok(collection)
    }

    /// Open a collection non-recursively by path
    pub fn collection_by_path(&self, path: &str) -> Result<Arc<Collection>> {
        self.collection(CollectionOptions::new(path))
    }

    /// Open a data object by path
    pub fn data_object(&self, path: &str) -> Result<Arc<DataObject>> {
        let path = path::normalize(path)?;
        let parent = Collection::open(self, path::parent_of(&path), false, true)?;
        parent.get(path::name_of(&path))
    }

    /// Collections opened through this connection that are still alive
    #[must_use]
    pub fn opened_collections(&self) -> Vec<Arc<Collection>> {
        let mut opened = self.inner.opened.lock();
        opened.retain(|c| c.strong_count() > 0);
        opened.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("zone", &self.inner.zone)
            .field("username", &self.inner.username)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host: {}:{}/{}, Connected: {}",
            self.inner.host,
            self.inner.port,
            self.inner.zone,
            self.is_connected()
        )
    }
}

/// Exclusive use of a connection's session; released on drop
pub struct Lease<'a> {
    connection: &'a Connection,
    guard: MutexGuard<'a, SessionSlot>,
}

impl Lease<'_> {
    /// The leased native session
    pub fn session(&mut self) -> Result<&mut dyn NativeSession> {
        match self.guard.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::closed("connection is closed")),
        }
    }

    /// Run one remote call; failures carry `op` as context
    pub fn run<T>(
        &mut self,
        op: &str,
        call: impl FnOnce(&mut dyn NativeSession) -> NativeResult<T>,
    ) -> Result<T> {
        debug!("Remote call: {}", op);
        call(self.session()?).map_err(|e| e.into_error(op))
    }

    /// Like [`Lease::run`], but "no rows" yields an empty result
    pub fn run_rows<T: Default>(
        &mut self,
        op: &str,
        call: impl FnOnce(&mut dyn NativeSession) -> NativeResult<T>,
    ) -> Result<T> {
        debug!("Remote call: {}", op);
        match call(self.session()?) {
            Ok(rows) => Ok(rows),
            Err(e) if e.is_no_rows() => Ok(T::default()),
            Err(e) => Err(e.into_error(op)),
        }
    }

    pub(crate) fn zones(&mut self) -> Result<Vec<Arc<Zone>>> {
        match self.guard.cache.zones.get() {
            Some(zones) => Ok(zones),
            None => self.refresh_zones(),
        }
    }

    pub(crate) fn users(&mut self) -> Result<Vec<Arc<User>>> {
        match self.guard.cache.users.get() {
            Some(users) => Ok(users),
            None => self.refresh_users(),
        }
    }

    pub(crate) fn groups(&mut self) -> Result<Vec<Arc<Group>>> {
        match self.guard.cache.groups.get() {
            Some(groups) => Ok(groups),
            None => self.refresh_groups(),
        }
    }

    pub(crate) fn resources(&mut self) -> Result<Vec<Arc<Resource>>> {
        match self.guard.cache.resources.get() {
            Some(resources) => Ok(resources),
            None => self.refresh_resources(),
        }
    }

    pub(crate) fn refresh_zones(&mut self) -> Result<Vec<Arc<Zone>>> {
        let names = self.run_rows("list zones", |s| s.list_zones())?;
        let weak = self.connection.downgrade();
        Ok(self
            .guard
            .cache
            .zones
            .replace(names, |name| Zone::new(weak.clone(), name)))
    }

    pub(crate) fn refresh_users(&mut self) -> Result<Vec<Arc<User>>> {
        let names = self.run_rows("list users", |s| s.list_users())?;
        let weak = self.connection.downgrade();
        let zone = self.connection.zone_name().to_string();
        Ok(self
            .guard
            .cache
            .users
            .replace(names, |name| User::new(weak.clone(), name, zone.clone())))
    }

    pub(crate) fn refresh_groups(&mut self) -> Result<Vec<Arc<Group>>> {
        let names = self.run_rows("list groups", |s| s.list_groups())?;
        let weak = self.connection.downgrade();
        let zone = self.connection.zone_name().to_string();
        Ok(self
            .guard
            .cache
            .groups
            .replace(names, |name| Group::new(weak.clone(), name, zone.clone())))
    }

    pub(crate) fn refresh_resources(&mut self) -> Result<Vec<Arc<Resource>>> {
        let names = self.run_rows("list resources", |s| s.list_resources())?;
        let weak = self.connection.downgrade();
        Ok(self
            .guard
            .cache
            .resources
            .replace(names, |name| Resource::new(weak.clone(), name)))
    }

    /// The cached user named `name`; no placeholder on a miss
    pub(crate) fn cached_user(&mut self, name: &str) -> Result<Option<Arc<User>>> {
        self.users()?;
        Ok(self.guard.cache.users.find(name))
    }

    /// The cached group named `name`; no placeholder on a miss
    pub(crate) fn cached_group(&mut self, name: &str) -> Result<Option<Arc<Group>>> {
        self.groups()?;
        Ok(self.guard.cache.groups.find(name))
    }

    pub(crate) fn local_zone(&mut self) -> Result<Arc<Zone>> {
        self.zones()?;
        let zone = self.connection.zone_name();
        self.guard
            .cache
            .zones
            .find(zone)
            .ok_or_else(|| Error::not_found(format!("local zone {zone} is not in the zone list")))
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        debug!(
            "Lease released on {}:{}",
            self.connection.inner.host, self.connection.inner.port
        );
    }
}
