//! Data objects: byte streams in the namespace
//!
//! A [`DataObject`] holds at most one server handle, opened read-only or
//! read-write. Reads and writes open it lazily; writers upgrade a read-only
//! handle by closing and reopening. The local `offset` mirrors the server
//! cursor and never passes `size`.

use crate::acl::{self, Acl};
use crate::collection::{Collection, CollectionRef};
use crate::connection::Connection;
use crate::meta::{Meta, MetaCollection};
use crate::object::{AccessObject, WeakAccessObject};
use crate::options::{DataObjOptions, TrimOptions};
use crate::path;
use crate::principal::{PrincipalRef, Resource, ResourceRef, User};
use chrono::{DateTime, Utc};
use icat_common::checksum::digests_match;
use icat_common::{AccessLevel, Error, Result, parse_catalog_time};
use icat_native::status::BAD_INPUT_DESC_INDEX;
use icat_native::{CollectionEntry, DataHandle, ObjectKind, ObjectStat, OpenFlags};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// How the current handle was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Closed,
    ReadOnly,
    ReadWrite,
}

struct DataObjectState {
    path: String,
    size: u64,
    offset: u64,
    checksum: String,
    data_id: String,
    resource: String,
    resource_hierarchy: String,
    phy_path: String,
    repl_num: i32,
    repl_status: i32,
    owner: String,
    mode: u32,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
    handle: Option<DataHandle>,
    opened_as: OpenMode,
    parent: Weak<Collection>,
}

/// One replica of a data object as listed by its collection
pub struct DataObject {
    connection: Connection,
    state: RwLock<DataObjectState>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

fn to_usize(n: u64) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::invalid_argument(format!("{n} bytes don't fit in memory")))
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl DataObject {
    pub(crate) fn from_entry(
        connection: &Connection,
        entry: &CollectionEntry,
        parent: &Arc<Collection>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection: connection.clone(),
            state: RwLock::new(DataObjectState {
                path: path::join(&entry.coll_name, &entry.data_name),
                size: entry.data_size,
                offset: 0,
                checksum: entry.checksum.clone(),
                data_id: entry.data_id.clone(),
                resource: entry.resource.clone(),
                resource_hierarchy: entry.resource_hierarchy.clone(),
                phy_path: entry.phy_path.clone(),
                repl_num: entry.repl_num,
                repl_status: entry.repl_status,
                owner: entry.owner_name.clone(),
                mode: entry.data_mode,
                create_time: parse_catalog_time(&entry.create_time),
                modify_time: parse_catalog_time(&entry.modify_time),
                handle: None,
                opened_as: OpenMode::Closed,
                parent: Arc::downgrade(parent),
            }),
            meta: Mutex::new(None),
        })
    }

    // =========== Accessors ===========

    #[must_use]
    pub fn path(&self) -> String {
        self.state.read().path.clone()
    }

    #[must_use]
    pub fn name(&self) -> String {
        path::name_of(&self.state.read().path).to_string()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    /// Local mirror of the server cursor
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.state.read().offset
    }

    /// Last known checksum; empty until computed
    #[must_use]
    pub fn checksum(&self) -> String {
        self.state.read().checksum.clone()
    }

    #[must_use]
    pub fn data_id(&self) -> String {
        self.state.read().data_id.clone()
    }

    #[must_use]
    pub fn resource_name(&self) -> String {
        self.state.read().resource.clone()
    }

    /// The resource holding this replica
    pub fn resource(&self) -> Result<Arc<Resource>> {
        self.connection.resource(&self.resource_name())
    }

    #[must_use]
    pub fn resource_hierarchy(&self) -> String {
        self.state.read().resource_hierarchy.clone()
    }

    #[must_use]
    pub fn phy_path(&self) -> String {
        self.state.read().phy_path.clone()
    }

    #[must_use]
    pub fn repl_num(&self) -> i32 {
        self.state.read().repl_num
    }

    #[must_use]
    pub fn repl_status(&self) -> i32 {
        self.state.read().repl_status
    }

    #[must_use]
    pub fn owner_name(&self) -> String {
        self.state.read().owner.clone()
    }

    pub fn owner(&self) -> Result<Arc<User>> {
        self.connection.user(&self.owner_name())
    }

    #[must_use]
    pub fn mode(&self) -> u32 {
        self.state.read().mode
    }

    #[must_use]
    pub fn create_time(&self) -> DateTime<Utc> {
        self.state.read().create_time
    }

    #[must_use]
    pub fn modify_time(&self) -> DateTime<Utc> {
        self.state.read().modify_time
    }

    #[must_use]
    pub fn open_mode(&self) -> OpenMode {
        self.state.read().opened_as
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().handle.is_some()
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The containing collection, looked up by path when the tree no
    /// longer holds it
    pub fn parent(&self) -> Result<Arc<Collection>> {
        let (parent, path) = {
            let state = self.state.read();
            (state.parent.upgrade(), state.path.clone())
        };
        match parent {
            Some(parent) => Ok(parent),
            None => Collection::open(&self.connection, path::parent_of(&path), false, true),
        }
    }

    fn parent_path(&self) -> String {
        path::parent_of(&self.state.read().path).to_string()
    }

    // =========== Handle ===========

    fn open_with(&self, flags: OpenFlags) -> Result<DataHandle> {
        let (path, resource) = {
            let state = self.state.read();
            (state.path.clone(), state.resource.clone())
        };
        let handle = self
            .connection
            .borrow()?
            .run(&format!("open data object {path}"), |s| {
                s.open_data_object(&path, &resource, flags)
            })?;
        let mode = if flags.is_writable() {
            OpenMode::ReadWrite
        } else {
            OpenMode::ReadOnly
        };
        {
            let mut state = self.state.write();
            state.handle = Some(handle);
            state.opened_as = mode;
            state.offset = 0;
        }
        debug!("Opened {} as {:?}", path, mode);
        Ok(handle)
    }

    /// Open read-only, replacing any current handle
    pub fn open(&self) -> Result<()> {
        self.close()?;
        self.open_with(OpenFlags::ReadOnly).map(drop)
    }

    /// Open read-write, replacing any current handle
    pub fn open_rw(&self) -> Result<()> {
        self.close()?;
        self.open_with(OpenFlags::ReadWrite).map(drop)
    }

    /// Open read-only unless already open
    pub fn init(&self) -> Result<()> {
        self.ensure_open().map(drop)
    }

    /// Make sure a read-write handle is open
    pub fn init_rw(&self) -> Result<()> {
        self.ensure_writable().map(drop)
    }

    fn ensure_open(&self) -> Result<DataHandle> {
        let handle = self.state.read().handle;
        match handle {
            Some(handle) => Ok(handle),
            None => self.open_with(OpenFlags::ReadOnly),
        }
    }

    fn ensure_writable(&self) -> Result<DataHandle> {
        let (handle, mode) = {
            let state = self.state.read();
            (state.handle, state.opened_as)
        };
        match (handle, mode) {
            (Some(handle), OpenMode::ReadWrite) => Ok(handle),
            _ => {
                self.close()?;
                self.open_with(OpenFlags::ReadWrite)
            }
        }
    }

    /// Release the server handle; a no-op when already closed
    pub fn close(&self) -> Result<()> {
        let (handle, path) = {
            let mut state = self.state.write();
            let handle = state.handle.take();
            state.opened_as = OpenMode::Closed;
            state.offset = 0;
            (handle, state.path.clone())
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        let mut lease = self.connection.borrow()?;
        match lease.run(&format!("close data object {path}"), |s| {
            s.close_data_object(handle)
        }) {
            Err(e) if e.status() == Some(BAD_INPUT_DESC_INDEX) => {
                warn!("Data object {} was already closed", path);
                Ok(())
            }
            other => other,
        }
    }

    /// Move the cursor; positions past the end are rejected
    pub fn lseek(&self, offset: u64) -> Result<()> {
        let size = self.size();
        if offset > size {
            return Err(Error::invalid_argument(format!(
                "offset {offset} is past the end of {} ({size} bytes)",
                self.path()
            )));
        }
        let handle = self.ensure_open()?;
        self.seek_handle(handle, offset)
    }

    fn seek_handle(&self, handle: DataHandle, offset: u64) -> Result<()> {
        let path = self.path();
        let position = self
            .connection
            .borrow()?
            .run(&format!("seek {path}"), |s| s.seek_data_object(handle, offset))?;
        self.state.write().offset = position;
        Ok(())
    }

    // =========== Reading ===========

    fn read_from(&self, handle: DataHandle, len: usize) -> Result<Vec<u8>> {
        let path = self.path();
        let mut data = Vec::with_capacity(len);
        {
            let mut lease = self.connection.borrow()?;
            while data.len() < len {
                let chunk = lease.run(&format!("read {path}"), |s| {
                    s.read_data_object(handle, len - data.len())
                })?;
                if chunk.is_empty() {
                    break;
                }
                data.extend_from_slice(&chunk);
            }
        }
        let mut state = self.state.write();
        state.offset = state.offset.saturating_add(to_u64(data.len()));
        if state.offset > state.size {
            state.size = state.offset;
        }
        Ok(data)
    }

    /// Read the whole object into memory, then close
    pub fn read(&self) -> Result<Vec<u8>> {
        let handle = self.ensure_open()?;
        let result = self
            .seek_handle(handle, 0)
            .and_then(|()| self.read_from(handle, to_usize(self.size())?));
        let closed = self.close();
        let data = result?;
        closed?;
        debug!("Read {} bytes from {}", data.len(), self.path());
        Ok(data)
    }

    /// Read `len` bytes at `pos`, leaving the handle open
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.lseek(pos)?;
        let handle = self.ensure_open()?;
        self.read_from(handle, len)
    }

    /// Stream the object through `sink` in chunks of `chunk_size` bytes
    ///
    /// The cursor is rewound and the handle closed afterwards.
    pub fn read_chunk(&self, chunk_size: u64, mut sink: impl FnMut(&[u8])) -> Result<()> {
        if chunk_size == 0 {
            return Err(Error::invalid_argument("chunk size must be positive"));
        }
        let len = to_usize(chunk_size)?;
        let handle = self.ensure_open()?;
        self.seek_handle(handle, 0)?;
        loop {
            let (offset, size) = {
                let state = self.state.read();
                (state.offset, state.size)
            };
            if offset >= size {
                break;
            }
            let chunk = self.read_from(handle, len)?;
            if chunk.is_empty() {
                warn!("{} ended before its recorded size of {} bytes", self.path(), size);
                break;
            }
            sink(&chunk);
            let next = offset.saturating_add(chunk_size).min(self.size());
            self.seek_handle(handle, next)?;
        }
        self.seek_handle(handle, 0)?;
        self.close()
    }

    /// Read the object and write it to a local file
    pub fn download_to(&self, local_path: impl AsRef<Path>) -> Result<()> {
        let local = local_path.as_ref();
        let data = self.read()?;
        std::fs::write(local, &data)
            .map_err(|e| Error::io(format!("can't write {}: {e}", local.display())))?;
        info!("Downloaded {} to {}", self.path(), local.display());
        Ok(())
    }

    // =========== Writing ===========

    /// Replace the whole content with `data`, then close
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.close()?;
        let handle = self.open_with(OpenFlags::Truncate)?;
        let result = self.write_at_cursor(handle, data);
        let closed = self.close();
        result?;
        closed?;
        self.state.write().size = to_u64(data.len());
        info!("Wrote {} bytes to {}", data.len(), self.path());
        Ok(())
    }

    /// Write at the current offset, leaving the handle open
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let offset = self.offset();
        let reopened = !matches!(self.open_mode(), OpenMode::ReadWrite);
        let handle = self.ensure_writable()?;
        if reopened && offset > 0 {
            self.seek_handle(handle, offset)?;
        }
        self.write_at_cursor(handle, data)
    }

    fn write_at_cursor(&self, handle: DataHandle, data: &[u8]) -> Result<()> {
        let path = self.path();
        let written = self
            .connection
            .borrow()?
            .run(&format!("write {path}"), |s| s.write_data_object(handle, data))?;
        let mut state = self.state.write();
        state.offset = state.offset.saturating_add(to_u64(written));
        state.size = state.size.max(state.offset);
        state.checksum.clear();
        Ok(())
    }

    // =========== Namespace ===========

    /// Copy into `destination`, keeping the name
    pub fn copy_to(&self, destination: impl Into<CollectionRef>) -> Result<Arc<Self>> {
        self.copy_to_with(destination, DataObjOptions::default())
    }

    /// Copy into `destination`; a non-empty `options.name` renames the copy
    pub fn copy_to_with(
        &self,
        destination: impl Into<CollectionRef>,
        options: DataObjOptions,
    ) -> Result<Arc<Self>> {
        let destination = destination.into();
        let source = self.path();
        let dest_path = destination.resolve(&self.parent_path())?;
        let name = if options.name.is_empty() {
            self.name()
        } else {
            path::validate_name(&options.name)?;
            options.name.clone()
        };
        let target = path::join(&dest_path, &name);
        self.connection
            .borrow()?
            .run(&format!("copy {source} to {target}"), |s| {
                s.copy_data_object(&source, &target, options.force, options.resource_name())
            })?;
        info!("Copied {} to {}", source, target);

        let dest = destination.node(&self.connection, &dest_path, true)?;
        dest.refresh()?;
        dest.get(&name)
    }

    /// Move into `destination`, keeping the name
    pub fn move_to(self: &Arc<Self>, destination: impl Into<CollectionRef>) -> Result<()> {
        let destination = destination.into();
        let old_path = self.path();
        let dest_path = destination.resolve(&self.parent_path())?;
        let new_path = path::join(&dest_path, path::name_of(&old_path));

        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("move {old_path} to {new_path}"), |s| {
                s.move_object(&old_path, &new_path, ObjectKind::DataObject)
            })?;
        info!("Moved data object {} to {}", old_path, new_path);

        let dest = destination.node(&self.connection, &dest_path, true)?;
        self.relink(new_path, &dest)
    }

    /// Rename within the same collection; the new name must not contain `/`
    pub fn rename(self: &Arc<Self>, new_name: &str) -> Result<()> {
        path::validate_name(new_name)?;
        let old_path = self.path();
        let new_path = path::join(path::parent_of(&old_path), new_name);
        let parent = self.parent()?;

        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("rename {old_path} to {new_path}"), |s| {
                s.move_object(&old_path, &new_path, ObjectKind::DataObject)
            })?;
        info!("Renamed data object {} to {}", old_path, new_path);
        self.relink(new_path, &parent)
    }

    fn relink(self: &Arc<Self>, new_path: String, new_parent: &Arc<Collection>) -> Result<()> {
        let old_parent = {
            let mut state = self.state.write();
            state.path = new_path;
            state.handle = None;
            state.opened_as = OpenMode::Closed;
            state.offset = 0;
            std::mem::replace(&mut state.parent, Arc::downgrade(new_parent)).upgrade()
        };
        *self.meta.lock() = None;

        if let Some(old_parent) = old_parent {
            if !Arc::ptr_eq(&old_parent, new_parent) {
                old_parent.refresh()?;
            }
        }
        new_parent.refresh()?;
        new_parent.adopt_data_object(Arc::clone(self));
        Ok(())
    }

    /// Remove; `force` skips the trash
    pub fn rm(&self, recursive: bool, force: bool) -> Result<()> {
        let path = self.path();
        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("remove data object {path}"), |s| {
                s.remove(&path, ObjectKind::DataObject, recursive, force)
            })?;
        info!("Removed data object {} (force: {})", path, force);
        self.state.write().parent = Weak::new();
        Ok(())
    }

    pub fn destroy(&self) -> Result<()> {
        self.rm(true, true)
    }

    /// Permanently remove
    pub fn delete(&self, recursive: bool) -> Result<()> {
        self.rm(recursive, true)
    }

    /// Move to the trash
    pub fn trash(&self, recursive: bool) -> Result<()> {
        self.rm(recursive, false)
    }

    /// Remove without the force flag
    pub fn unlink(&self) -> Result<()> {
        self.rm(true, false)
    }

    // =========== Integrity ===========

    /// Have the server compute the checksum; stores and returns it
    pub fn chksum(&self) -> Result<String> {
        let path = self.path();
        let checksum = self
            .connection
            .borrow()?
            .run(&format!("checksum {path}"), |s| s.checksum_data_object(&path))?;
        self.state.write().checksum.clone_from(&checksum);
        Ok(checksum)
    }

    /// Compare `expected` with the checksum by digest, ignoring any scheme
    /// prefix
    pub fn verify(&self, expected: &str) -> Result<bool> {
        let stored = self.checksum();
        let checksum = if stored.is_empty() { self.chksum()? } else { stored };
        Ok(digests_match(&checksum, expected))
    }

    /// System metadata; also refreshes the cached size and checksum
    pub fn stat(&self) -> Result<ObjectStat> {
        let path = self.path();
        let stat = self
            .connection
            .borrow()?
            .run(&format!("stat {path}"), |s| s.stat_data_object(&path))?;
        let mut state = self.state.write();
        state.size = stat.size;
        state.offset = state.offset.min(stat.size);
        state.checksum.clone_from(&stat.checksum);
        state.data_id.clone_from(&stat.data_id);
        Ok(stat)
    }

    // =========== Access control ===========

    pub fn acl(&self) -> Result<Vec<Acl>> {
        let (path, data_id) = {
            let state = self.state.read();
            (state.path.clone(), state.data_id.clone())
        };
        let zone = self.connection.zone_name();
        let mut lease = self.connection.borrow()?;
        let records = lease.run_rows(&format!("read ACL of {path}"), |s| {
            s.data_object_acl(&data_id, zone)
        })?;
        acl::resolve(&mut lease, records)
    }

    pub fn chmod(&self, principal: impl Into<PrincipalRef>, level: AccessLevel) -> Result<()> {
        let principal = principal.into();
        let path = self.path();
        let zone = principal
            .zone()
            .unwrap_or_else(|| self.connection.zone_name().to_string());
        self.connection
            .borrow()?
            .run(&format!("chmod {path}"), |s| {
                s.chmod(&path, principal.name(), &zone, level, false)
            })?;
        info!("Set {} on {} for {}", level, path, principal.name());
        Ok(())
    }

    /// Grant `level` to a user or group
    pub fn grant_access(&self, principal: &AccessObject, level: AccessLevel) -> Result<()> {
        match principal {
            AccessObject::User(user) => self.chmod(user, level),
            AccessObject::Group(group) => self.chmod(group, level),
            other => Err(Error::invalid_argument(format!(
                "can't grant access to {}: not a user or group",
                other.name()
            ))),
        }
    }

    // =========== Replicas ===========

    /// Add a replica on `resource`
    pub fn replicate(&self, resource: impl Into<ResourceRef>) -> Result<()> {
        self.replicate_to(&resource.into(), false)
    }

    /// Replicate to `resource` only if no good replica exists there
    pub fn backup(&self, resource: impl Into<ResourceRef>) -> Result<()> {
        self.replicate_to(&resource.into(), true)
    }

    fn replicate_to(&self, resource: &ResourceRef, backup: bool) -> Result<()> {
        let path = self.path();
        self.connection
            .borrow()?
            .run(&format!("replicate {path}"), |s| {
                s.replicate(&path, resource.name(), backup)
            })?;
        info!("Replicated {} to {}", path, resource.name());
        Ok(())
    }

    /// Drop surplus replicas
    pub fn trim_replicas(&self, options: &TrimOptions) -> Result<()> {
        let path = self.path();
        let resource = options.resource.as_ref().map_or("", ResourceRef::name);
        self.connection
            .borrow()?
            .run(&format!("trim replicas of {path}"), |s| {
                s.trim_replicas(&path, resource, options.keep, options.min_age_minutes)
            })?;
        info!("Trimmed replicas of {} to {}", path, options.keep);
        Ok(())
    }

    /// Move this replica to another resource
    pub fn move_to_resource(&self, resource: impl Into<ResourceRef>) -> Result<()> {
        let resource = resource.into();
        let (path, source) = {
            let state = self.state.read();
            (state.path.clone(), state.resource.clone())
        };
        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("move replica of {path}"), |s| {
                s.move_replica(&path, &source, resource.name())
            })?;
        info!("Moved replica of {} from {} to {}", path, source, resource.name());
        let mut state = self.state.write();
        state.resource = resource.name().to_string();
        state.resource_hierarchy = resource.name().to_string();
        Ok(())
    }

    // =========== Metadata ===========

    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.downgrade(),
                WeakAccessObject::DataObject(Arc::downgrade(self)),
            )
        }))
    }

    pub fn attribute(self: &Arc<Self>, attribute: &str) -> Result<Vec<Meta>> {
        self.meta().get(attribute)
    }

    pub fn add_meta(self: &Arc<Self>, attribute: &str, value: &str, units: &str) -> Result<Meta> {
        self.meta().add(attribute, value, units)
    }

    pub fn delete_meta(self: &Arc<Self>, attribute: &str) -> Result<()> {
        self.meta().delete(attribute)
    }
}

impl fmt::Debug for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DataObject")
            .field("path", &state.path)
            .field("size", &state.size)
            .field("offset", &state.offset)
            .field("resource", &state.resource)
            .field("opened_as", &state.opened_as)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        write!(f, "DataObject: {} ({} bytes)", state.path, state.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connect;
    use icat_common::checksum::sha2_checksum;
    use icat_common::{ErrorKind, ResourceClass, UserType};
    use icat_native::MemoryCatalog;

    const HOME: &str = "/tempZone/home/rods";
    const HELLO: &str = "/tempZone/home/rods/hello.txt";

    fn scratch(catalog: &MemoryCatalog, conn: &Connection, name: &str, data: &[u8]) -> Arc<DataObject> {
        let path = format!("{HOME}/{name}");
        catalog.put_object(&path, data).unwrap();
        conn.data_object(&path).unwrap()
    }

    #[test]
    fn test_read_small_object() {
        let (catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        let data = hello.read().unwrap();
        assert_eq!(String::from_utf8(data).unwrap().trim_end(), "Hello, World!");
        assert!(!hello.is_open());
        assert_eq!(hello.offset(), 0);
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_create_then_delete() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let obj = home
            .create_data_object(DataObjOptions::new("test123.txt"))
            .unwrap();
        assert_eq!(obj.path(), "/tempZone/home/rods/test123.txt");

        obj.delete(false).unwrap();
        home.refresh().unwrap();
        assert!(!home.exists("test123.txt").unwrap());
        assert!(!catalog.contains("/tempZone/trash/home/rods/test123.txt"));
    }

    #[test]
    fn test_read_chunk() {
        let (catalog, conn) = connect();
        let data: Vec<u8> = (0..2500u32).map(|i| u8::try_from(i % 251).unwrap()).collect();
        let obj = scratch(&catalog, &conn, "big.bin", &data);

        let mut lengths = Vec::new();
        let mut collected = Vec::new();
        obj.read_chunk(1024, |chunk| {
            lengths.push(chunk.len());
            collected.extend_from_slice(chunk);
        })
        .unwrap();

        assert_eq!(lengths, vec![1024, 1024, 452]);
        assert_eq!(collected, data);
        assert_eq!(obj.offset(), 0);
        assert!(!obj.is_open());
        assert_eq!(catalog.open_handle_count(), 0);

        assert_eq!(
            obj.read_chunk(0, |_| {}).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_write_then_read() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        hello.write(b"replacement content that is longer").unwrap();
        assert_eq!(hello.read().unwrap(), b"replacement content that is longer");

        hello.write(b"short").unwrap();
        assert_eq!(hello.size(), 5);
        assert_eq!(hello.read().unwrap(), b"short");
        assert_eq!(hello.stat().unwrap().size, 5);
    }

    #[test]
    fn test_write_bytes_and_offsets() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let obj = home.create_data_object(DataObjOptions::new("log.txt")).unwrap();

        obj.write_bytes(b"abc").unwrap();
        assert_eq!(obj.open_mode(), OpenMode::ReadWrite);
        assert_eq!((obj.offset(), obj.size()), (3, 3));
        obj.write_bytes(b"def").unwrap();
        assert_eq!((obj.offset(), obj.size()), (6, 6));

        obj.lseek(1).unwrap();
        obj.write_bytes(b"X").unwrap();
        assert_eq!((obj.offset(), obj.size()), (2, 6));
        assert!(obj.offset() <= obj.size());

        let err = obj.lseek(7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        obj.close().unwrap();
        assert_eq!(catalog.object_data("/tempZone/home/rods/log.txt").unwrap(), b"aXcdef");
    }

    #[test]
    fn test_read_bytes_keeps_handle() {
        let (catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        assert_eq!(hello.read_bytes(7, 5).unwrap(), b"World");
        assert!(hello.is_open());
        assert_eq!(hello.offset(), 12);
        assert_eq!(hello.read_bytes(0, 100).unwrap(), b"Hello, World!\n");
        assert_eq!(hello.offset(), hello.size());
        hello.close().unwrap();
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_open_modes() {
        let (catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        assert_eq!(hello.open_mode(), OpenMode::Closed);

        hello.init().unwrap();
        assert_eq!(hello.open_mode(), OpenMode::ReadOnly);
        hello.init().unwrap();
        assert_eq!(catalog.open_handle_count(), 1);

        hello.init_rw().unwrap();
        assert_eq!(hello.open_mode(), OpenMode::ReadWrite);
        assert_eq!(catalog.open_handle_count(), 1);

        hello.open().unwrap();
        assert_eq!(hello.open_mode(), OpenMode::ReadOnly);
        hello.open_rw().unwrap();
        assert_eq!(hello.open_mode(), OpenMode::ReadWrite);

        hello.close().unwrap();
        hello.close().unwrap();
        assert_eq!(hello.open_mode(), OpenMode::Closed);
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_copy() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let backups = home.create_sub_collection("backups").unwrap();
        let hello = home.get("hello.txt").unwrap();

        let copy = hello.copy_to("backups").unwrap();
        assert_eq!(copy.path(), "/tempZone/home/rods/backups/hello.txt");
        assert!(backups.exists("hello.txt").unwrap());
        assert_eq!(copy.read().unwrap(), b"Hello, World!\n");

        assert!(hello.copy_to(&backups).unwrap_err().is_duplicate());
        hello.copy_to_with(&backups, DataObjOptions::new("").force(true)).unwrap();

        let renamed = hello
            .copy_to_with(HOME, DataObjOptions::new("hello-copy.txt"))
            .unwrap();
        assert_eq!(renamed.name(), "hello-copy.txt");
        assert!(catalog.contains(HELLO));
    }

    #[test]
    fn test_move_and_back() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let archive = home.create_sub_collection("archive").unwrap();
        let hello = home.get("hello.txt").unwrap();
        hello.add_meta("k", "v", "").unwrap();

        hello.move_to(&archive).unwrap();
        assert_eq!(hello.path(), "/tempZone/home/rods/archive/hello.txt");
        assert!(Arc::ptr_eq(&hello.parent().unwrap(), &archive));
        assert!(archive.data_objects().unwrap().iter().any(|d| Arc::ptr_eq(d, &hello)));
        assert!(!home.exists("hello.txt").unwrap());
        assert_eq!(hello.attribute("k").unwrap().len(), 1);

        hello.move_to(HOME).unwrap();
        assert_eq!(hello.path(), HELLO);
        assert_eq!(hello.parent().unwrap().path(), HOME);
        assert!(catalog.contains(HELLO));
        assert_eq!(hello.read().unwrap(), b"Hello, World!\n");
    }

    #[test]
    fn test_rename() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let hello = home.get("hello.txt").unwrap();

        let err = hello.rename("sub/hello.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(hello.path(), HELLO);

        hello.rename("greeting.txt").unwrap();
        assert_eq!(hello.name(), "greeting.txt");
        assert!(catalog.contains("/tempZone/home/rods/greeting.txt"));
        assert!(Arc::ptr_eq(&home.get("greeting.txt").unwrap(), &hello));
    }

    #[test]
    fn test_trash_and_unlink() {
        let (catalog, conn) = connect();
        let first = scratch(&catalog, &conn, "first.txt", b"1");
        first.trash(false).unwrap();
        assert!(catalog.contains("/tempZone/trash/home/rods/first.txt"));

        let second = scratch(&catalog, &conn, "second.txt", b"2");
        second.unlink().unwrap();
        assert!(!catalog.contains("/tempZone/home/rods/second.txt"));
        assert!(catalog.contains("/tempZone/trash/home/rods/second.txt"));

        let third = scratch(&catalog, &conn, "third.txt", b"3");
        third.destroy().unwrap();
        assert!(!catalog.contains("/tempZone/trash/home/rods/third.txt"));
        assert!(third.delete(false).unwrap_err().is_not_found());
    }

    #[test]
    fn test_checksum_and_verify() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        assert!(hello.checksum().is_empty());

        let expected = sha2_checksum(b"Hello, World!\n");
        assert_eq!(hello.chksum().unwrap(), expected);
        assert_eq!(hello.checksum(), expected);

        let digest = expected.split_once(':').unwrap().1;
        assert!(hello.verify(digest).unwrap());
        assert!(hello.verify(&expected).unwrap());
        assert!(!hello.verify("bogus").unwrap());
    }

    #[test]
    fn test_stat() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        let stat = hello.stat().unwrap();
        assert_eq!(stat.size, 14);
        assert_eq!(stat.owner_name, "rods");
        assert_eq!(stat.data_id, hello.data_id());

        let map = stat.to_map();
        let keys: Vec<&str> = map.keys().copied().collect();
        for key in [
            "objSize", "dataMode", "dataId", "chksum", "ownerName", "ownerZone", "createTime",
            "modifyTime",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(map["objSize"], "14");
    }

    #[test]
    fn test_acl_and_grants() {
        let (catalog, conn) = connect();
        catalog.add_user("bob", "pw", UserType::User).unwrap();
        let hello = conn.data_object(HELLO).unwrap();

        let acl = hello.acl().unwrap();
        assert_eq!(acl.len(), 1);
        assert_eq!(acl[0].to_string(), "rodsuser:rods#tempZone:own");

        hello.chmod("bob", AccessLevel::Write).unwrap();
        let bob = conn.user("bob").unwrap();
        let acl = hello.acl().unwrap();
        let entry = acl
            .iter()
            .find(|a| a.user().is_some_and(|u| Arc::ptr_eq(u, &bob)))
            .unwrap();
        assert_eq!(entry.level(), AccessLevel::Write);

        let public = AccessObject::Group(conn.group("public").unwrap());
        hello.grant_access(&public, AccessLevel::Read).unwrap();
        assert!(hello.acl().unwrap().iter().any(|a| a.group().is_some()));

        let home = AccessObject::Collection(hello.parent().unwrap());
        let err = hello.grant_access(&home, AccessLevel::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_replicas() {
        let (catalog, conn) = connect();
        catalog.add_resource("archResc", ResourceClass::Archive, "/archive");
        catalog.add_resource("tapeResc", ResourceClass::Archive, "/tape");
        let hello = conn.data_object(HELLO).unwrap();
        assert_eq!(hello.resource_name(), "demoResc");
        assert_eq!(hello.repl_num(), 0);
        assert_eq!(hello.resource().unwrap().name(), "demoResc");

        hello.replicate("archResc").unwrap();
        hello.backup("tapeResc").unwrap();
        let listing = conn
            .collection(crate::options::CollectionOptions::new(HOME).get_replicas(true))
            .unwrap();
        assert_eq!(listing.data_objects().unwrap().len(), 3);

        hello
            .trim_replicas(&TrimOptions {
                keep: 1,
                ..TrimOptions::default()
            })
            .unwrap();
        listing.refresh().unwrap();
        assert_eq!(listing.data_objects().unwrap().len(), 1);

        hello.move_to_resource("archResc").unwrap();
        assert_eq!(hello.resource_name(), "archResc");
        assert_eq!(hello.read().unwrap(), b"Hello, World!\n");

        let err = hello.replicate("noSuchResc").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_download_to() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hello.txt");
        hello.download_to(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"Hello, World!\n");

        let err = hello
            .download_to(dir.path().join("missing").join("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_metadata_round_trip() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        let added = hello.add_meta("k", "v", "").unwrap();
        let found = hello.attribute("k").unwrap();
        assert_eq!(found, vec![added]);
        hello.delete_meta("k").unwrap();
        assert!(hello.attribute("k").unwrap_err().is_not_found());
    }

    #[test]
    fn test_display() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object(HELLO).unwrap();
        assert_eq!(hello.to_string(), "DataObject: /tempZone/home/rods/hello.txt (14 bytes)");
        assert_eq!(hello.owner().unwrap().name(), "rods");
    }
}
