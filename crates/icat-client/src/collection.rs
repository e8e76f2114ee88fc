//! Collections: an in-memory mirror of the remote namespace
//!
//! A [`Collection`] hydrates lazily: the first access that needs children
//! reads the remote listing once and builds child nodes, each linked back
//! to its parent by a weak reference. `refresh()` re-reads the listing.
//! A recursive collection hydrates its whole subtree.
//!
//! Nodes never hold their own state lock while waiting for the session
//! lease, and parent locks are only ever taken before child locks.

use crate::acl::{self, Acl};
use crate::connection::Connection;
use crate::dataobj::DataObject;
use crate::meta::{Meta, MetaCollection};
use crate::object::WeakAccessObject;
use crate::options::DataObjOptions;
use crate::path;
use crate::principal::{PrincipalRef, User};
use chrono::{DateTime, Utc};
use icat_common::{AccessLevel, Error, ObjectType, Result, parse_catalog_time};
use icat_native::status::BAD_INPUT_DESC_INDEX;
use icat_native::{CollectionEntry, CollectionHandle, ObjectKind};
use parking_lot::{Mutex, RwLock};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// A child of a collection
#[derive(Clone, Debug)]
pub enum Entry {
    Collection(Arc<Collection>),
    DataObject(Arc<DataObject>),
}

impl Entry {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Collection(c) => c.name(),
            Self::DataObject(d) => d.name(),
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Collection(c) => c.path(),
            Self::DataObject(d) => d.path(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectType {
        match self {
            Self::Collection(_) => ObjectType::Collection,
            Self::DataObject(_) => ObjectType::DataObject,
        }
    }

    /// `C` for collections, `D` for data objects
    #[must_use]
    pub const fn type_letter(&self) -> char {
        match self {
            Self::Collection(_) => 'C',
            Self::DataObject(_) => 'D',
        }
    }

    #[must_use]
    pub const fn as_collection(&self) -> Option<&Arc<Collection>> {
        match self {
            Self::Collection(c) => Some(c),
            Self::DataObject(_) => None,
        }
    }

    #[must_use]
    pub const fn as_data_object(&self) -> Option<&Arc<DataObject>> {
        match self {
            Self::DataObject(d) => Some(d),
            Self::Collection(_) => None,
        }
    }
}

/// Destination of a move or copy: a collection node or a path
///
/// Relative paths resolve against the natural parent of the node being
/// moved.
#[derive(Clone, Debug)]
pub enum CollectionRef {
    Path(String),
    Collection(Arc<Collection>),
}

impl CollectionRef {
    /// Absolute destination path
    pub(crate) fn resolve(&self, base: &str) -> Result<String> {
        match self {
            Self::Path(p) => path::resolve(base, p),
            Self::Collection(c) => Ok(c.path()),
        }
    }

    /// The destination node, opening it by path if needed
    pub(crate) fn node(
        self,
        connection: &Connection,
        path: &str,
        trim_replicas: bool,
    ) -> Result<Arc<Collection>> {
        match self {
            Self::Collection(c) => Ok(c),
            Self::Path(_) => Collection::open(connection, path, false, trim_replicas),
        }
    }
}

impl From<&str> for CollectionRef {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for CollectionRef {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<Arc<Collection>> for CollectionRef {
    fn from(collection: Arc<Collection>) -> Self {
        Self::Collection(collection)
    }
}

impl From<&Arc<Collection>> for CollectionRef {
    fn from(collection: &Arc<Collection>) -> Self {
        Self::Collection(Arc::clone(collection))
    }
}

struct CollectionState {
    path: String,
    owner: String,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
    recursive: bool,
    trim_replicas: bool,
    handle: Option<CollectionHandle>,
    children: Option<Vec<Entry>>,
    parent: Weak<Collection>,
}

/// A node of the remote namespace that contains other nodes
pub struct Collection {
    connection: Connection,
    state: RwLock<CollectionState>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

impl Collection {
    fn with_state(connection: &Connection, state: CollectionState) -> Arc<Self> {
        Arc::new(Self {
            connection: connection.clone(),
            state: RwLock::new(state),
            meta: Mutex::new(None),
        })
    }

    /// A node known only by path, with no parent link
    fn detached(
        connection: &Connection,
        path: &str,
        recursive: bool,
        trim_replicas: bool,
    ) -> Arc<Self> {
        Self::with_state(
            connection,
            CollectionState {
                path: path.to_string(),
                owner: String::new(),
                create_time: DateTime::default(),
                modify_time: DateTime::default(),
                recursive,
                trim_replicas,
                handle: None,
                children: None,
                parent: Weak::new(),
            },
        )
    }

    fn from_entry(
        connection: &Connection,
        entry: &CollectionEntry,
        parent: &Arc<Self>,
        recursive: bool,
        trim_replicas: bool,
    ) -> Arc<Self> {
        Self::with_state(
            connection,
            CollectionState {
                path: entry.coll_name.clone(),
                owner: entry.owner_name.clone(),
                create_time: parse_catalog_time(&entry.create_time),
                modify_time: parse_catalog_time(&entry.modify_time),
                recursive,
                trim_replicas,
                handle: None,
                children: None,
                parent: Arc::downgrade(parent),
            },
        )
    }

    /// Locate the collection at `path` through its parent's listing
    pub(crate) fn open(
        connection: &Connection,
        path: &str,
        recursive: bool,
        trim_replicas: bool,
    ) -> Result<Arc<Self>> {
        let collection = if path == "/" {
            Self::detached(connection, path, recursive, trim_replicas)
        } else {
            let parent = Self::detached(connection, path::parent_of(path), false, trim_replicas);
            let name = path::name_of(path);
            let child = parent
                .collections()?
                .into_iter()
                .find(|c| c.name() == name)
                .ok_or_else(|| Error::not_found(format!("collection {path} does not exist")))?;
            child.state.write().recursive = recursive;
            child
        };
        if recursive {
            collection.init()?;
        }
        Ok(collection)
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
    pub fn owner_name(&self) -> String {
        self.state.read().owner.clone()
    }

    pub fn owner(&self) -> Result<Arc<User>> {
        self.connection.user(&self.owner_name())
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
    pub fn is_recursive(&self) -> bool {
        self.state.read().recursive
    }

    #[must_use]
    pub fn trims_replicas(&self) -> bool {
        self.state.read().trim_replicas
    }

    /// A server handle is held
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().handle.is_some()
    }

    /// The listing has been read at least once
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.state.read().children.is_some()
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The parent node, looked up by path when the tree no longer holds it;
    /// `None` for the root
    pub fn parent(&self) -> Result<Option<Arc<Self>>> {
        let (parent, path) = {
            let state = self.state.read();
            (state.parent.upgrade(), state.path.clone())
        };
        if parent.is_some() || path == "/" {
            return Ok(parent);
        }
        let parent_path = path::parent_of(&path);
        let trim = self.trims_replicas();
        Self::open(&self.connection, parent_path, false, trim).map(Some)
    }

    // =========== Hydration ===========

    /// Read the listing if it has not been read yet
    pub fn init(self: &Arc<Self>) -> Result<()> {
        if self.is_hydrated() {
            return Ok(());
        }
        self.refresh()
    }

    /// Re-read the listing and rebuild the children
    pub fn refresh(self: &Arc<Self>) -> Result<()> {
        let (path, recursive, trim_replicas) = {
            let state = self.state.read();
            (state.path.clone(), state.recursive, state.trim_replicas)
        };
        let entries = self.read_entries(&path, trim_replicas)?;

        let mut children = Vec::with_capacity(entries.len());
        for entry in &entries {
            match entry.kind {
                Some(ObjectKind::Collection) => {
                    let child =
                        Self::from_entry(&self.connection, entry, self, recursive, trim_replicas);
                    if recursive {
                        child.init()?;
                    }
                    children.push(Entry::Collection(child));
                }
                Some(ObjectKind::DataObject) => {
                    children.push(Entry::DataObject(DataObject::from_entry(
                        &self.connection,
                        entry,
                        self,
                    )));
                }
                None => warn!("Skipping unclassified entry {:?} in {}", entry.coll_name, path),
            }
        }
        debug!("Hydrated {} with {} entries", path, children.len());
        self.state.write().children = Some(children);
        Ok(())
    }

    fn read_entries(&self, path: &str, trim_replicas: bool) -> Result<Vec<CollectionEntry>> {
        let mut lease = self.connection.borrow()?;
        let handle = lease.run(&format!("open collection {path}"), |s| {
            s.open_collection(path, trim_replicas)
        })?;
        self.state.write().handle = Some(handle);
        let entries = lease.run_rows(&format!("read collection {path}"), |s| {
            s.read_collection(handle)
        });
        let closed = lease.run(&format!("close collection {path}"), |s| {
            s.close_collection(handle)
        });
        self.state.write().handle = None;
        let entries = entries?;
        closed?;
        Ok(entries)
    }

    /// Close open children, then this collection's handle
    ///
    /// Closing an already closed collection is a no-op.
    pub fn close(&self) -> Result<()> {
        let (children, handle, path) = {
            let mut state = self.state.write();
            (state.children.clone(), state.handle.take(), state.path.clone())
        };
        for child in children.iter().flatten() {
            match child {
                Entry::Collection(c) => c.close()?,
                Entry::DataObject(d) => d.close()?,
            }
        }
        if let Some(handle) = handle {
            let mut lease = self.connection.borrow()?;
            match lease.run(&format!("close collection {path}"), |s| {
                s.close_collection(handle)
            }) {
                Err(e) if e.status() == Some(BAD_INPUT_DESC_INDEX) => {
                    warn!("Collection {} was already closed", path);
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Swap in `entry` for the child at the same path
    fn adopt(&self, entry: Entry) {
        let path = entry.path();
        let mut state = self.state.write();
        if let Some(slot) = state
            .children
            .iter_mut()
            .flatten()
            .find(|child| child.path() == path)
        {
            *slot = entry;
        }
    }

    pub(crate) fn adopt_data_object(&self, data_object: Arc<DataObject>) {
        self.adopt(Entry::DataObject(data_object));
    }

    // =========== Lookup ===========

    /// Every child, data objects first
    pub fn all(self: &Arc<Self>) -> Result<Vec<Entry>> {
        self.init()?;
        Ok(self.state.read().children.clone().unwrap_or_default())
    }

    pub fn collections(self: &Arc<Self>) -> Result<Vec<Arc<Self>>> {
        Ok(self
            .all()?
            .into_iter()
            .filter_map(|e| match e {
                Entry::Collection(c) => Some(c),
                Entry::DataObject(_) => None,
            })
            .collect())
    }

    pub fn data_objects(self: &Arc<Self>) -> Result<Vec<Arc<DataObject>>> {
        Ok(self
            .all()?
            .into_iter()
            .filter_map(|e| match e {
                Entry::DataObject(d) => Some(d),
                Entry::Collection(_) => None,
            })
            .collect())
    }

    /// Data objects and sub-collections
    pub fn both(self: &Arc<Self>) -> Result<(Vec<Arc<DataObject>>, Vec<Arc<Self>>)> {
        Ok((self.data_objects()?, self.collections()?))
    }

    /// Walk down sub-collections to a relative or absolute path
    pub fn cd(self: &Arc<Self>, target: &str) -> Result<Arc<Self>> {
        let own = self.path();
        let target = path::resolve(&own, target)?;
        if target == own {
            return Ok(Arc::clone(self));
        }
        let prefix = if own == "/" { String::new() } else { own.clone() };
        let rest = target
            .strip_prefix(&format!("{prefix}/"))
            .ok_or_else(|| Error::not_found(format!("{target} is not below {own}")))?;

        let mut current = Arc::clone(self);
        for segment in rest.split('/') {
            let next = current
                .collections()?
                .into_iter()
                .find(|c| c.name() == segment)
                .ok_or_else(|| Error::not_found(format!("collection {target} not found")))?;
            current = next;
        }
        Ok(current)
    }

    /// The data object at a relative or absolute path below this collection
    pub fn get(self: &Arc<Self>, target: &str) -> Result<Arc<DataObject>> {
        let target = path::resolve(&self.path(), target)?;
        self.cd(path::parent_of(&target))?
            .data_objects()?
            .into_iter()
            .find(|d| d.path() == target)
            .ok_or_else(|| Error::not_found(format!("data object {target} not found")))
    }

    /// The child collection or data object at a path below this collection
    pub fn find(self: &Arc<Self>, target: &str) -> Result<Entry> {
        let target = path::resolve(&self.path(), target)?;
        self.cd(path::parent_of(&target))?
            .all()?
            .into_iter()
            .find(|e| e.path() == target)
            .ok_or_else(|| Error::not_found(format!("{target} not found")))
    }

    /// Depth-first search of the hydrated subtree for a name or full path
    pub fn find_recursive(self: &Arc<Self>, name_or_path: &str) -> Result<Entry> {
        self.init()?;
        self.search(name_or_path)
            .ok_or_else(|| Error::not_found(format!("{name_or_path} not found below {}", self.path())))
    }

    fn search(&self, name_or_path: &str) -> Option<Entry> {
        let children = self.state.read().children.clone()?;
        for child in &children {
            if child.name() == name_or_path || child.path() == name_or_path {
                return Some(child.clone());
            }
            if let Entry::Collection(c) = child {
                if let Some(found) = c.search(name_or_path) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// A direct child with this name exists
    pub fn exists(self: &Arc<Self>, name: &str) -> Result<bool> {
        Ok(self.all()?.iter().any(|e| e.name() == name))
    }

    // =========== Mutation ===========

    /// Create an empty data object in this collection
    pub fn create_data_object(self: &Arc<Self>, options: DataObjOptions) -> Result<Arc<DataObject>> {
        path::validate_name(&options.name)?;
        let path = path::join(&self.path(), &options.name);
        {
            let mut lease = self.connection.borrow()?;
            let handle = lease.run(&format!("create data object {path}"), |s| {
                s.create_data_object(
                    &path,
                    options.size,
                    options.mode,
                    options.force,
                    options.resource_name(),
                )
            })?;
            lease.run(&format!("close data object {path}"), |s| {
                s.close_data_object(handle)
            })?;
        }
        info!("Created data object {}", path);
        self.refresh()?;
        self.get(&options.name)
    }

    pub fn create_sub_collection(self: &Arc<Self>, name: &str) -> Result<Arc<Self>> {
        path::validate_name(name)?;
        let path = path::join(&self.path(), name);
        self.connection
            .borrow()?
            .run(&format!("create collection {path}"), |s| {
                s.create_collection(&path)
            })?;
        info!("Created collection {}", path);
        self.refresh()?;
        self.cd(name)
    }

    /// Upload a local file into this collection
    ///
    /// An empty `options.name` keeps the local file name.
    pub fn put(
        self: &Arc<Self>,
        local_path: impl AsRef<Path>,
        options: DataObjOptions,
    ) -> Result<Arc<DataObject>> {
        let local = local_path.as_ref();
        let data = std::fs::read(local)
            .map_err(|e| Error::io(format!("can't read {}: {e}", local.display())))?;
        let name = if options.name.is_empty() {
            local
                .file_name()
                .and_then(OsStr::to_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::invalid_argument(format!("{} has no file name", local.display()))
                })?
        } else {
            options.name.clone()
        };
        path::validate_name(&name)?;
        let path = path::join(&self.path(), &name);
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        {
            let mut lease = self.connection.borrow()?;
            let handle = lease.run(&format!("create data object {path}"), |s| {
                s.create_data_object(
                    &path,
                    size,
                    options.mode,
                    options.force,
                    options.resource_name(),
                )
            })?;
            let written = lease.run(&format!("write data object {path}"), |s| {
                s.write_data_object(handle, &data)
            });
            let closed = lease.run(&format!("close data object {path}"), |s| {
                s.close_data_object(handle)
            });
            written?;
            closed?;
        }
        info!("Uploaded {} to {}", local.display(), path);
        self.refresh()?;
        self.get(&name)
    }

    /// Move this collection under `destination`
    pub fn move_to(self: &Arc<Self>, destination: impl Into<CollectionRef>) -> Result<()> {
        let destination = destination.into();
        let old_path = self.path();
        let dest_path = destination.resolve(path::parent_of(&old_path))?;
        let new_path = path::join(&dest_path, path::name_of(&old_path));

        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("move {old_path} to {new_path}"), |s| {
                s.move_object(&old_path, &new_path, ObjectKind::Collection)
            })?;
        info!("Moved collection {} to {}", old_path, new_path);

        let new_parent = destination.node(&self.connection, &dest_path, self.trims_replicas())?;
        self.relink(new_path, &new_parent)
    }

    /// Rename in place; the new name must not contain `/`
    pub fn rename(self: &Arc<Self>, new_name: &str) -> Result<()> {
        path::validate_name(new_name)?;
        let old_path = self.path();
        let parent = self
            .parent()?
            .ok_or_else(|| Error::invalid_argument("the root collection can't be renamed"))?;
        let new_path = path::join(path::parent_of(&old_path), new_name);

        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("rename {old_path} to {new_path}"), |s| {
                s.move_object(&old_path, &new_path, ObjectKind::Collection)
            })?;
        info!("Renamed collection {} to {}", old_path, new_path);
        self.relink(new_path, &parent)
    }

    /// Point this node at its new location and refresh both parents
    fn relink(self: &Arc<Self>, new_path: String, new_parent: &Arc<Self>) -> Result<()> {
        let (old_parent, was_hydrated) = {
            let mut state = self.state.write();
            let old_parent = std::mem::replace(&mut state.parent, Arc::downgrade(new_parent));
            state.path = new_path;
            state.handle = None;
            (old_parent.upgrade(), state.children.take().is_some())
        };
        *self.meta.lock() = None;

        if let Some(old_parent) = old_parent {
            if !Arc::ptr_eq(&old_parent, new_parent) {
                old_parent.refresh()?;
            }
        }
        new_parent.refresh()?;
        new_parent.adopt(Entry::Collection(Arc::clone(self)));
        if was_hydrated {
            self.refresh()?;
        }
        Ok(())
    }

    /// Remove this collection; `force` skips the trash
    ///
    /// The node is detached from its parent; refresh the parent to see the
    /// change.
    pub fn rm(&self, recursive: bool, force: bool) -> Result<()> {
        let path = self.path();
        self.close()?;
        self.connection
            .borrow()?
            .run(&format!("remove collection {path}"), |s| {
                s.remove(&path, ObjectKind::Collection, recursive, force)
            })?;
        info!("Removed collection {} (force: {})", path, force);
        let mut state = self.state.write();
        state.parent = Weak::new();
        state.children = None;
        Ok(())
    }

    /// Remove this collection and everything below it, skipping the trash
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

    // =========== Access control ===========

    pub fn acl(&self) -> Result<Vec<Acl>> {
        let path = self.path();
        let zone = self.connection.zone_name();
        let mut lease = self.connection.borrow()?;
        let records = lease.run_rows(&format!("read ACL of {path}"), |s| {
            s.collection_acl(&path, zone)
        })?;
        acl::resolve(&mut lease, records)
    }

    /// Grant `level` to a user or group; `recursive` applies it to the
    /// whole subtree
    pub fn chmod(
        &self,
        principal: impl Into<PrincipalRef>,
        level: AccessLevel,
        recursive: bool,
    ) -> Result<()> {
        let principal = principal.into();
        let path = self.path();
        let zone = principal
            .zone()
            .unwrap_or_else(|| self.connection.zone_name().to_string());
        self.connection
            .borrow()?
            .run(&format!("chmod {path}"), |s| {
                s.chmod(&path, principal.name(), &zone, level, recursive)
            })?;
        info!("Set {} on {} for {}", level, path, principal.name());
        Ok(())
    }

    /// New children inherit this collection's ACL
    pub fn inheritance(&self) -> Result<bool> {
        let path = self.path();
        self.connection
            .borrow()?
            .run(&format!("read inheritance of {path}"), |s| {
                s.collection_inheritance(&path)
            })
    }

    pub fn set_inheritance(&self, enabled: bool, recursive: bool) -> Result<()> {
        let path = self.path();
        self.connection
            .borrow()?
            .run(&format!("set inheritance of {path}"), |s| {
                s.set_inheritance(&path, enabled, recursive)
            })?;
        info!("Set inheritance on {} to {}", path, enabled);
        Ok(())
    }

    // =========== Metadata ===========

    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.downgrade(),
                WeakAccessObject::Collection(Arc::downgrade(self)),
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

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Collection")
            .field("path", &state.path)
            .field("recursive", &state.recursive)
            .field("hydrated", &state.children.is_some())
            .finish_non_exhaustive()
    }
}

/// `Collection: <path>` then one `D:`/`C:` line per hydrated child
impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (path, children) = {
            let state = self.state.read();
            (state.path.clone(), state.children.clone())
        };
        writeln!(f, "Collection: {path}")?;
        for child in children.iter().flatten() {
            writeln!(f, "\t{}: {}", child.type_letter(), child.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CollectionOptions;
    use crate::testing::connect;
    use icat_common::{ErrorKind, ResourceClass};
    use std::io::Write;

    const HOME: &str = "/tempZone/home/rods";

    #[test]
    fn test_open_and_list() {
        let (_catalog, conn) = connect();
        let home = conn.collection(CollectionOptions::new(HOME)).unwrap();
        assert_eq!(home.path(), HOME);
        assert_eq!(home.name(), "rods");
        assert_eq!(home.owner_name(), "rods");
        assert!(!home.is_hydrated());

        let all = home.all().unwrap();
        assert!(!all.is_empty());
        assert!(all.iter().all(|e| matches!(e.type_letter(), 'C' | 'D')));
        assert!(all.iter().any(|e| e.name() == "hello.txt"));
        assert!(home.is_hydrated());
    }

    #[test]
    fn test_all_is_collections_and_data_objects() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        home.create_sub_collection("sub").unwrap();

        let all = home.all().unwrap();
        let (objs, colls) = home.both().unwrap();
        assert_eq!(all.len(), objs.len() + colls.len());
        for entry in &all {
            match entry {
                Entry::Collection(c) => assert!(colls.iter().any(|x| Arc::ptr_eq(x, c))),
                Entry::DataObject(d) => assert!(objs.iter().any(|x| Arc::ptr_eq(x, d))),
            }
        }
    }

    #[test]
    fn test_open_missing_collection() {
        let (_catalog, conn) = connect();
        let err = conn.collection_by_path("/tempZone/home/nobody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        // a data object is not a collection
        let err = conn
            .collection_by_path("/tempZone/home/rods/hello.txt")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_recursive_open_hydrates_subtree() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let a = home.create_sub_collection("a").unwrap();
        let b = a.create_sub_collection("b").unwrap();
        b.create_sub_collection("c").unwrap();

        let tree = conn
            .collection(CollectionOptions::new(HOME).recursive(true))
            .unwrap();

        fn check(c: &Arc<Collection>, seen: &mut usize) {
            assert!(c.is_recursive());
            assert!(c.is_hydrated());
            *seen += 1;
            for child in c.collections().unwrap() {
                check(&child, seen);
            }
        }
        let mut seen = 0;
        check(&tree, &mut seen);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_replicas_in_listing() {
        let (catalog, conn) = connect();
        catalog.add_resource("archResc", ResourceClass::Archive, "/archive");
        let hello = conn.data_object("/tempZone/home/rods/hello.txt").unwrap();
        hello.replicate("archResc").unwrap();

        let trimmed = conn.collection_by_path(HOME).unwrap();
        assert!(trimmed.trims_replicas());
        assert_eq!(trimmed.data_objects().unwrap().len(), 1);

        let all = conn
            .collection(CollectionOptions::new(HOME).get_replicas(true))
            .unwrap();
        assert!(!all.trims_replicas());
        let replicas = all.data_objects().unwrap();
        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[1].resource_name(), "archResc");
    }

    #[test]
    fn test_open_close_open() {
        let (catalog, conn) = connect();
        let first = conn.collection_by_path(HOME).unwrap();
        let names: Vec<String> = first.all().unwrap().iter().map(Entry::name).collect();
        first.close().unwrap();
        first.close().unwrap();
        assert!(!first.is_open());

        let second = conn.collection_by_path(HOME).unwrap();
        let again: Vec<String> = second.all().unwrap().iter().map(Entry::name).collect();
        assert_eq!(names, again);
        assert_eq!(first.path(), second.path());
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_create_children() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();

        let obj = home
            .create_data_object(DataObjOptions::new("test123.txt"))
            .unwrap();
        assert_eq!(obj.path(), "/tempZone/home/rods/test123.txt");
        assert_eq!(obj.size(), 0);
        assert!(home.exists("test123.txt").unwrap());
        let parent = obj.parent().unwrap();
        assert!(Arc::ptr_eq(&parent, &home));

        let err = home
            .create_data_object(DataObjOptions::new("test123.txt"))
            .unwrap_err();
        assert!(err.is_duplicate());
        home.create_data_object(DataObjOptions::new("test123.txt").force(true))
            .unwrap();

        let sub = home.create_sub_collection("reports").unwrap();
        assert_eq!(sub.path(), "/tempZone/home/rods/reports");
        assert!(home.cd("reports").is_ok());

        assert_eq!(
            home.create_sub_collection("a/b").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_put_uploads_file() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"uploaded bytes").unwrap();

        let obj = home.put(file.path(), DataObjOptions::new("upload.bin")).unwrap();
        assert_eq!(obj.size(), 14);
        assert_eq!(
            catalog.object_data("/tempZone/home/rods/upload.bin").unwrap(),
            b"uploaded bytes"
        );

        let dir = tempfile::tempdir().unwrap();
        let named = dir.path().join("notes.txt");
        std::fs::write(&named, "n").unwrap();
        let obj = home.put(&named, DataObjOptions::default()).unwrap();
        assert_eq!(obj.name(), "notes.txt");

        let err = home
            .put(dir.path().join("missing"), DataObjOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_lookup() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let sub = home.create_sub_collection("sub").unwrap();
        sub.create_data_object(DataObjOptions::new("deep.txt")).unwrap();

        assert_eq!(home.cd("sub").unwrap().path(), "/tempZone/home/rods/sub");
        assert!(Arc::ptr_eq(&home.cd(".").unwrap(), &home));
        assert!(home.cd("/tempZone/home/rods/sub").is_ok());
        assert!(home.cd("/tempZone/trash").unwrap_err().is_not_found());
        assert!(home.cd("hello.txt").unwrap_err().is_not_found());

        assert_eq!(home.get("hello.txt").unwrap().name(), "hello.txt");
        assert_eq!(home.get("sub/deep.txt").unwrap().name(), "deep.txt");
        assert!(home.get("sub").unwrap_err().is_not_found());

        assert_eq!(home.find("sub").unwrap().type_letter(), 'C');
        assert_eq!(home.find("hello.txt").unwrap().type_letter(), 'D');

        // only the hydrated subtree is searched
        let fresh = conn.collection_by_path(HOME).unwrap();
        assert!(fresh.find_recursive("deep.txt").unwrap_err().is_not_found());
        fresh.cd("sub").unwrap().init().unwrap();
        let found = fresh.find_recursive("deep.txt").unwrap();
        assert_eq!(found.path(), "/tempZone/home/rods/sub/deep.txt");
        assert!(fresh.find_recursive("/tempZone/home/rods/sub").is_ok());
    }

    #[test]
    fn test_move_and_back() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let src = home.create_sub_collection("src").unwrap();
        let dst = home.create_sub_collection("dst").unwrap();
        src.create_data_object(DataObjOptions::new("f.txt")).unwrap();

        src.move_to(&dst).unwrap();
        assert_eq!(src.path(), "/tempZone/home/rods/dst/src");
        assert!(Arc::ptr_eq(&src.parent().unwrap().unwrap(), &dst));
        assert!(dst.collections().unwrap().iter().any(|c| Arc::ptr_eq(c, &src)));
        assert!(!home.exists("src").unwrap());
        assert!(catalog.contains("/tempZone/home/rods/dst/src/f.txt"));
        assert_eq!(src.data_objects().unwrap()[0].path(), "/tempZone/home/rods/dst/src/f.txt");

        src.move_to(HOME).unwrap();
        assert_eq!(src.path(), "/tempZone/home/rods/src");
        assert_eq!(src.parent().unwrap().unwrap().path(), HOME);
        assert!(catalog.contains("/tempZone/home/rods/src/f.txt"));
    }

    #[test]
    fn test_move_relative_path() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let src = home.create_sub_collection("src").unwrap();
        home.create_sub_collection("dst").unwrap();

        src.move_to("dst").unwrap();
        assert_eq!(src.path(), "/tempZone/home/rods/dst/src");
        assert!(catalog.contains("/tempZone/home/rods/dst/src"));
    }

    #[test]
    fn test_rename() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let sub = home.create_sub_collection("old").unwrap();
        sub.add_meta("k", "v", "").unwrap();

        assert_eq!(sub.rename("a/b").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(sub.rename("..").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(catalog.contains("/tempZone/home/rods/old"));
        sub.rename("new").unwrap();
        assert_eq!(sub.path(), "/tempZone/home/rods/new");
        assert_eq!(sub.name(), "new");
        assert!(catalog.contains("/tempZone/home/rods/new"));
        assert!(home.exists("new").unwrap());
        assert!(!home.exists("old").unwrap());
        assert_eq!(sub.attribute("k").unwrap().len(), 1);
    }

    #[test]
    fn test_rm_trash_and_force() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let trashed = home.create_sub_collection("trashed").unwrap();
        trashed.create_data_object(DataObjOptions::new("x")).unwrap();

        let err = trashed.rm(false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
        trashed.trash(true).unwrap();
        assert!(catalog.contains("/tempZone/trash/home/rods/trashed"));
        home.refresh().unwrap();
        assert!(!home.exists("trashed").unwrap());
        assert!(trashed.parent().unwrap().is_some());

        let gone = home.create_sub_collection("gone").unwrap();
        gone.destroy().unwrap();
        assert!(!catalog.contains("/tempZone/home/rods/gone"));
        assert!(!catalog.contains("/tempZone/trash/home/rods/gone"));
    }

    #[test]
    fn test_acl_chmod_and_inheritance() {
        let (catalog, conn) = connect();
        catalog
            .add_user("alice", "secret", icat_common::UserType::User)
            .unwrap();
        let home = conn.collection_by_path(HOME).unwrap();
        let shared = home.create_sub_collection("shared").unwrap();
        shared
            .create_data_object(DataObjOptions::new("inner.txt"))
            .unwrap();
        let owners: Vec<String> = home.acl().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(owners, ["rodsuser:rods#tempZone:own"]);

        shared.chmod("alice", AccessLevel::Read, true).unwrap();
        let acl = shared.acl().unwrap();
        let alice = conn.user("alice").unwrap();
        let entry = acl
            .iter()
            .find(|a| a.user().is_some_and(|u| Arc::ptr_eq(u, &alice)))
            .unwrap();
        assert_eq!(entry.level(), AccessLevel::Read);
        assert_eq!(entry.to_string(), "rodsuser:alice#tempZone:read");

        let inner = shared.get("inner.txt").unwrap();
        assert!(inner.acl().unwrap().iter().any(|a| a.access_object().name() == "alice"));

        let public = conn.group("public").unwrap();
        shared.chmod(&public, AccessLevel::Write, false).unwrap();
        assert!(shared.acl().unwrap().iter().any(|a| a.group().is_some()));

        assert!(!shared.inheritance().unwrap());
        shared.set_inheritance(true, false).unwrap();
        assert!(shared.inheritance().unwrap());

        let err = shared.chmod("nobody", AccessLevel::Own, false).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.status().is_some());
    }

    #[test]
    fn test_display_and_owner() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        home.create_sub_collection("docs").unwrap();
        let text = home.to_string();
        assert!(text.starts_with("Collection: /tempZone/home/rods\n"));
        assert!(text.contains("\tD: hello.txt\n"));
        assert!(text.contains("\tC: docs\n"));

        let owner = home.owner().unwrap();
        assert!(Arc::ptr_eq(&owner, &conn.user("rods").unwrap()));
        assert!(home.create_time() <= home.modify_time());
    }

    #[test]
    fn test_parent_lookup_after_tree_dropped() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        let parent = home.parent().unwrap().unwrap();
        assert_eq!(parent.path(), "/tempZone/home");
        let root = conn.collection_by_path("/").unwrap();
        assert!(root.parent().unwrap().is_none());
        assert!(root.cd("tempZone/home/rods").is_ok());
    }

    #[test]
    fn test_disconnect_closes_opened_collections() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path(HOME).unwrap();
        assert_eq!(conn.opened_collections().len(), 1);
        let hello = home.get("hello.txt").unwrap();
        hello.open().unwrap();
        conn.disconnect().unwrap();
        assert!(!hello.is_open());
        assert_eq!(home.refresh().unwrap_err().kind(), ErrorKind::Closed);
    }
}
