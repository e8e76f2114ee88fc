//! Catalog tables and namespace operations

use crate::records::{
    AclRecord, AvuRecord, CollectionEntry, CollectionHandle, DataHandle, ObjectKind, ObjectStat, OpenFlags,
};
use crate::status::{
    BAD_INPUT_DESC_INDEX, CAT_COLLECTION_NOT_EMPTY, CAT_INVALID_ARGUMENT, CAT_NAME_EXISTS_AS_COLLECTION,
    CAT_NAME_EXISTS_AS_DATAOBJ, CAT_UNKNOWN_COLLECTION, CAT_UNKNOWN_FILE,
    CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME, NativeError, NativeResult, OVERWRITE_WITHOUT_FORCE_FLAG,
    SYS_REPLICA_DOES_NOT_EXIST, SYS_RESC_DOES_NOT_EXIST,
};
use icat_common::checksum::sha2_checksum;
use icat_common::{AccessLevel, ResourceClass, ZoneType};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// First value of the catalog clock (unix seconds)
const CLOCK_START: i64 = 1_600_000_000;

/// Default mode of new data objects
pub const DEFAULT_MODE: u32 = 0o600;

/// Replica status of an up-to-date replica
const GOOD_REPLICA: i32 = 1;

pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

pub fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// `path` is `root` or lies below it
fn is_within(path: &str, root: &str) -> bool {
    path == root
        || (path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/')
}

/// Rewrite the `from` prefix of `path` to `to`
fn rebase(path: &str, from: &str, to: &str) -> String {
    format!("{to}{}", &path[from.len()..])
}

fn rekey<V>(map: &mut BTreeMap<String, V>, from: &str, to: &str) {
    let keys: Vec<String> = map.keys().filter(|k| is_within(k, from)).cloned().collect();
    for key in keys {
        if let Some(value) = map.remove(&key) {
            map.insert(rebase(&key, from, to), value);
        }
    }
}

pub fn timestamp(secs: i64) -> String {
    format!("{secs:011}")
}

pub fn fail<T>(status: i32, message: impl Into<String>) -> NativeResult<T> {
    Err(NativeError::new(status, message))
}

/// A user or group row
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: u64,
    pub name: String,
    pub zone: String,
    pub type_name: String,
    pub password: String,
    pub info: String,
    pub comment: String,
    pub create_ts: i64,
    pub modify_ts: i64,
    pub cached_login: bool,
}

impl Principal {
    pub fn is_group(&self) -> bool {
        self.type_name == "rodsgroup"
    }
}

#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub id: u64,
    pub zone_type: ZoneType,
    pub conn_string: String,
    pub comment: String,
    pub create_ts: i64,
    pub modify_ts: i64,
}

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: u64,
    pub class: ResourceClass,
    pub type_name: String,
    pub host: String,
    pub vault: String,
    pub free_space: u64,
    pub children: String,
    pub parent: String,
    pub comment: String,
    pub create_ts: i64,
    pub modify_ts: i64,
}

#[derive(Debug, Clone)]
struct CollectionRecord {
    owner: String,
    create_ts: i64,
    modify_ts: i64,
    inherit: bool,
}

#[derive(Debug, Clone)]
struct Replica {
    num: i32,
    resource: String,
    phy_path: String,
    status: i32,
    create_ts: i64,
}

#[derive(Debug, Clone)]
struct ObjectRecord {
    id: u64,
    owner: String,
    owner_zone: String,
    data: Vec<u8>,
    mode: u32,
    checksum: String,
    replicas: Vec<Replica>,
    create_ts: i64,
    modify_ts: i64,
}

#[derive(Debug)]
struct OpenListing {
    session: u64,
    path: String,
    trim: bool,
}

#[derive(Debug)]
struct OpenStream {
    session: u64,
    path: String,
    cursor: u64,
    writable: bool,
}

/// Everything the catalog knows
#[derive(Debug)]
pub struct CatalogState {
    pub zone: String,
    pub default_resource: String,
    clock: i64,
    next_id: u64,
    next_handle: i32,
    pub principals: BTreeMap<String, Principal>,
    pub memberships: BTreeMap<String, BTreeSet<String>>,
    pub zones: BTreeMap<String, ZoneRecord>,
    pub resources: BTreeMap<String, ResourceRecord>,
    collections: BTreeMap<String, CollectionRecord>,
    objects: BTreeMap<String, ObjectRecord>,
    acls: BTreeMap<String, BTreeMap<String, AccessLevel>>,
    pub avus: BTreeMap<(String, String), Vec<AvuRecord>>,
    listings: HashMap<i32, OpenListing>,
    streams: HashMap<i32, OpenStream>,
    calls: BTreeMap<String, usize>,
}

impl CatalogState {
    /// A zone with its structural collections, a default resource, the
    /// `public` group and one admin account owning everything
    pub fn new(host: &str, port: u16, zone: &str, admin: &str, password: &str) -> Self {
        let mut state = Self {
            zone: zone.to_string(),
            default_resource: "demoResc".to_string(),
            clock: CLOCK_START,
            next_id: 10_000,
            next_handle: 3,
            principals: BTreeMap::new(),
            memberships: BTreeMap::new(),
            zones: BTreeMap::new(),
            resources: BTreeMap::new(),
            collections: BTreeMap::new(),
            objects: BTreeMap::new(),
            acls: BTreeMap::new(),
            avus: BTreeMap::new(),
            listings: HashMap::new(),
            streams: HashMap::new(),
            calls: BTreeMap::new(),
        };

        let id = state.next_id();
        state.zones.insert(
            zone.to_string(),
            ZoneRecord {
                id,
                zone_type: ZoneType::Local,
                conn_string: format!("{host}:{port}"),
                comment: String::new(),
                create_ts: CLOCK_START,
                modify_ts: CLOCK_START,
            },
        );
        state.insert_resource("demoResc", ResourceClass::Cache, host, "/var/lib/irods/Vault");
        state.insert_principal("public", "rodsgroup", "");
        state.insert_principal(admin, "rodsadmin", password);

        for path in [
            "/".to_string(),
            format!("/{zone}"),
            format!("/{zone}/home"),
            format!("/{zone}/trash"),
            format!("/{zone}/trash/home"),
        ] {
            state.insert_collection(&path, admin);
        }
        state.create_home(admin);
        state
    }

    pub fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    pub const fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    const fn next_handle(&mut self) -> i32 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn record_call(&mut self, op: &str) {
        *self.calls.entry(op.to_string()).or_default() += 1;
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.get(op).copied().unwrap_or_default()
    }

    pub fn open_handle_count(&self) -> usize {
        self.listings.len() + self.streams.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.collections.contains_key(path) || self.objects.contains_key(path)
    }

    pub fn collection_owner(&self, path: &str) -> Option<String> {
        self.collections.get(path).map(|c| c.owner.clone())
    }

    /// Replicas stored on `resource`
    pub fn replica_count(&self, resource: &str) -> usize {
        self.objects
            .values()
            .flat_map(|o| &o.replicas)
            .filter(|r| r.resource == resource)
            .count()
    }

    pub fn object_data(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.get(path).map(|o| o.data.clone())
    }

    pub fn insert_principal(&mut self, name: &str, type_name: &str, password: &str) {
        let now = self.tick();
        let id = self.next_id();
        self.principals.insert(
            name.to_string(),
            Principal {
                id,
                name: name.to_string(),
                zone: self.zone.clone(),
                type_name: type_name.to_string(),
                password: password.to_string(),
                info: String::new(),
                comment: String::new(),
                create_ts: now,
                modify_ts: now,
                cached_login: false,
            },
        );
        if type_name != "rodsgroup" {
            self.memberships
                .entry("public".to_string())
                .or_default()
                .insert(name.to_string());
        }
    }

    pub fn insert_resource(&mut self, name: &str, class: ResourceClass, host: &str, vault: &str) {
        let now = self.tick();
        let id = self.next_id();
        self.resources.insert(
            name.to_string(),
            ResourceRecord {
                id,
                class,
                type_name: "unixfilesystem".to_string(),
                host: host.to_string(),
                vault: vault.to_string(),
                free_space: 0,
                children: String::new(),
                parent: String::new(),
                comment: String::new(),
                create_ts: now,
                modify_ts: now,
            },
        );
    }

    fn insert_collection(&mut self, path: &str, owner: &str) {
        let now = self.tick();
        self.collections.insert(
            path.to_string(),
            CollectionRecord {
                owner: owner.to_string(),
                create_ts: now,
                modify_ts: now,
                inherit: false,
            },
        );
        self.acls.insert(
            path.to_string(),
            BTreeMap::from([(owner.to_string(), AccessLevel::Own)]),
        );
    }

    /// Home and trash collections of a new user
    pub fn create_home(&mut self, user: &str) {
        for base in ["home", "trash/home"] {
            let path = format!("/{}/{base}/{user}", self.zone);
            if !self.collections.contains_key(&path) {
                self.insert_collection(&path, user);
            }
        }
    }

    fn require_collection(&self, path: &str) -> NativeResult<&CollectionRecord> {
        self.collections.get(path).ok_or_else(|| {
            NativeError::new(CAT_UNKNOWN_COLLECTION, format!("unknown collection {path}"))
        })
    }

    fn require_object(&self, path: &str) -> NativeResult<&ObjectRecord> {
        self.objects
            .get(path)
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {path}")))
    }

    fn resolve_resource(&self, resource: &str) -> NativeResult<String> {
        if resource.is_empty() {
            return Ok(self.default_resource.clone());
        }
        if self.resources.contains_key(resource) {
            Ok(resource.to_string())
        } else {
            fail(
                SYS_RESC_DOES_NOT_EXIST,
                format!("resource {resource} does not exist"),
            )
        }
    }

    fn physical_path(&self, resource: &str, path: &str) -> String {
        let vault = self
            .resources
            .get(resource)
            .map_or("/var/lib/irods/Vault", |r| r.vault.as_str());
        let zone_prefix = format!("/{}", self.zone);
        format!(
            "{vault}{}",
            path.strip_prefix(&zone_prefix).unwrap_or(path)
        )
    }

    /// Owner gets `own`; children of inheriting collections also take the
    /// parent's entries
    fn grant_initial_acl(&mut self, path: &str, owner: &str) {
        let parent = parent_of(path);
        let inherit = self.collections.get(parent).is_some_and(|c| c.inherit);
        let mut acl = if inherit {
            self.acls.get(parent).cloned().unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        acl.insert(owner.to_string(), AccessLevel::Own);
        self.acls.insert(path.to_string(), acl);
    }

    // =========== Collections ===========

    pub fn open_listing(
        &mut self,
        session: u64,
        path: &str,
        trim: bool,
    ) -> NativeResult<CollectionHandle> {
        self.require_collection(path)?;
        let handle = self.next_handle();
        self.listings.insert(
            handle,
            OpenListing {
                session,
                path: path.to_string(),
                trim,
            },
        );
        Ok(CollectionHandle(handle))
    }

    /// Data objects first, then sub-collections, each in name order
    pub fn read_listing(
        &self,
        session: u64,
        handle: CollectionHandle,
    ) -> NativeResult<Vec<CollectionEntry>> {
        let listing = self
            .listings
            .get(&handle.0)
            .filter(|l| l.session == session)
            .ok_or_else(|| NativeError::new(BAD_INPUT_DESC_INDEX, format!("bad handle {handle}")))?;

        let mut entries = Vec::new();
        for (path, object) in self
            .objects
            .iter()
            .filter(|(p, _)| parent_of(p) == listing.path)
        {
            let shown = if listing.trim {
                &object.replicas[..object.replicas.len().min(1)]
            } else {
                &object.replicas[..]
            };
            for replica in shown {
                entries.push(CollectionEntry {
                    kind: Some(ObjectKind::DataObject),
                    owner_name: object.owner.clone(),
                    coll_name: listing.path.clone(),
                    create_time: timestamp(object.create_ts),
                    modify_time: timestamp(object.modify_ts),
                    data_name: name_of(path).to_string(),
                    data_id: object.id.to_string(),
                    data_size: object.data.len() as u64,
                    data_mode: object.mode,
                    checksum: object.checksum.clone(),
                    resource: replica.resource.clone(),
                    resource_hierarchy: replica.resource.clone(),
                    phy_path: replica.phy_path.clone(),
                    repl_num: replica.num,
                    repl_status: replica.status,
                });
            }
        }
        for (path, collection) in self
            .collections
            .iter()
            .filter(|(p, _)| p.as_str() != "/" && parent_of(p) == listing.path)
        {
            entries.push(CollectionEntry {
                kind: Some(ObjectKind::Collection),
                owner_name: collection.owner.clone(),
                coll_name: path.clone(),
                create_time: timestamp(collection.create_ts),
                modify_time: timestamp(collection.modify_ts),
                ..CollectionEntry::default()
            });
        }
        Ok(entries)
    }

    pub fn close_listing(&mut self, session: u64, handle: CollectionHandle) -> NativeResult<()> {
        match self.listings.get(&handle.0) {
            Some(l) if l.session == session => {
                self.listings.remove(&handle.0);
                Ok(())
            }
            _ => fail(BAD_INPUT_DESC_INDEX, format!("bad handle {handle}")),
        }
    }

    pub fn create_collection(&mut self, owner: &str, path: &str) -> NativeResult<()> {
        self.require_collection(parent_of(path))?;
        if self.collections.contains_key(path) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("collection {path} already exists"),
            );
        }
        if self.objects.contains_key(path) {
            return fail(
                CAT_NAME_EXISTS_AS_DATAOBJ,
                format!("{path} exists as a data object"),
            );
        }
        let inherit = self
            .collections
            .get(parent_of(path))
            .is_some_and(|c| c.inherit);
        self.insert_collection(path, owner);
        self.grant_initial_acl(path, owner);
        if let Some(created) = self.collections.get_mut(path) {
            created.inherit = inherit;
        }
        Ok(())
    }

    pub fn inheritance(&self, path: &str) -> NativeResult<bool> {
        Ok(self.require_collection(path)?.inherit)
    }

    pub fn set_inheritance(&mut self, path: &str, enabled: bool, recursive: bool) -> NativeResult<()> {
        self.require_collection(path)?;
        for (p, c) in &mut self.collections {
            if p == path || (recursive && is_within(p, path)) {
                c.inherit = enabled;
            }
        }
        Ok(())
    }

    fn acl_records(&self, path: &str) -> Vec<AclRecord> {
        self.acls
            .get(path)
            .into_iter()
            .flatten()
            .filter_map(|(name, level)| {
                self.principals.get(name).map(|p| AclRecord {
                    name: p.name.clone(),
                    zone: p.zone.clone(),
                    access: level.catalog_name().to_string(),
                    user_type: p.type_name.clone(),
                })
            })
            .collect()
    }

    pub fn collection_acl(&self, path: &str) -> NativeResult<Vec<AclRecord>> {
        self.require_collection(path)?;
        Ok(self.acl_records(path))
    }

    pub fn data_object_acl(&self, data_id: &str) -> NativeResult<Vec<AclRecord>> {
        let path = self
            .objects
            .iter()
            .find(|(_, o)| o.id.to_string() == data_id)
            .map(|(p, _)| p.clone())
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data id {data_id}")))?;
        Ok(self.acl_records(&path))
    }

    pub fn chmod(
        &mut self,
        path: &str,
        principal: &str,
        level: AccessLevel,
        recursive: bool,
    ) -> NativeResult<()> {
        if !self.contains(path) {
            return fail(CAT_UNKNOWN_FILE, format!("unknown path {path}"));
        }
        let targets: Vec<String> = if recursive && self.collections.contains_key(path) {
            self.collections
                .keys()
                .chain(self.objects.keys())
                .filter(|p| is_within(p, path))
                .cloned()
                .collect()
        } else {
            vec![path.to_string()]
        };
        for target in targets {
            let acl = self.acls.entry(target).or_default();
            if level == AccessLevel::Null {
                acl.remove(principal);
            } else {
                acl.insert(principal.to_string(), level);
            }
        }
        Ok(())
    }

    // =========== Data objects ===========

    /// Create or overwrite a data object holding `data`
    pub fn put_object(
        &mut self,
        owner: &str,
        path: &str,
        data: Vec<u8>,
        mode: u32,
        force: bool,
        resource: &str,
    ) -> NativeResult<()> {
        self.require_collection(parent_of(path))?;
        if self.collections.contains_key(path) {
            return fail(
                CAT_NAME_EXISTS_AS_COLLECTION,
                format!("{path} exists as a collection"),
            );
        }
        let resource = self.resolve_resource(resource)?;
        let now = self.tick();

        if let Some(existing) = self.objects.get_mut(path) {
            if !force {
                return fail(
                    OVERWRITE_WITHOUT_FORCE_FLAG,
                    format!("{path} exists and force is not set"),
                );
            }
            existing.data = data;
            existing.checksum.clear();
            existing.modify_ts = now;
            return Ok(());
        }

        let id = self.next_id();
        let phy_path = self.physical_path(&resource, path);
        let owner_zone = self
            .principals
            .get(owner)
            .map_or_else(|| self.zone.clone(), |p| p.zone.clone());
        self.objects.insert(
            path.to_string(),
            ObjectRecord {
                id,
                owner: owner.to_string(),
                owner_zone,
                data,
                mode,
                checksum: String::new(),
                replicas: vec![Replica {
                    num: 0,
                    resource,
                    phy_path,
                    status: GOOD_REPLICA,
                    create_ts: now,
                }],
                create_ts: now,
                modify_ts: now,
            },
        );
        self.grant_initial_acl(path, owner);
        Ok(())
    }

    pub fn open_stream(
        &mut self,
        session: u64,
        path: &str,
        resource: &str,
        flags: OpenFlags,
    ) -> NativeResult<DataHandle> {
        self.require_object(path)?;
        if !resource.is_empty() {
            self.resolve_resource(resource)?;
        }
        if flags == OpenFlags::Truncate {
            let now = self.tick();
            if let Some(object) = self.objects.get_mut(path) {
                object.data.clear();
                object.checksum.clear();
                object.modify_ts = now;
            }
        }
        let handle = self.next_handle();
        self.streams.insert(
            handle,
            OpenStream {
                session,
                path: path.to_string(),
                cursor: 0,
                writable: flags.is_writable(),
            },
        );
        Ok(DataHandle(handle))
    }

    fn stream_mut(&mut self, session: u64, handle: DataHandle) -> NativeResult<&mut OpenStream> {
        self.streams
            .get_mut(&handle.0)
            .filter(|s| s.session == session)
            .ok_or_else(|| NativeError::new(BAD_INPUT_DESC_INDEX, format!("bad handle {handle}")))
    }

    pub fn read_stream(
        &mut self,
        session: u64,
        handle: DataHandle,
        len: usize,
    ) -> NativeResult<Vec<u8>> {
        let stream = self
            .streams
            .get_mut(&handle.0)
            .filter(|s| s.session == session)
            .ok_or_else(|| NativeError::new(BAD_INPUT_DESC_INDEX, format!("bad handle {handle}")))?;
        let object = self.objects.get(&stream.path).ok_or_else(|| {
            NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {}", stream.path))
        })?;
        let start = usize::try_from(stream.cursor)
            .unwrap_or(usize::MAX)
            .min(object.data.len());
        let end = start.saturating_add(len).min(object.data.len());
        stream.cursor = end as u64;
        Ok(object.data[start..end].to_vec())
    }

    pub fn write_stream(
        &mut self,
        session: u64,
        handle: DataHandle,
        data: &[u8],
    ) -> NativeResult<usize> {
        let now = self.tick();
        let stream = self
            .streams
            .get_mut(&handle.0)
            .filter(|s| s.session == session)
            .ok_or_else(|| NativeError::new(BAD_INPUT_DESC_INDEX, format!("bad handle {handle}")))?;
        if !stream.writable {
            return fail(
                CAT_INVALID_ARGUMENT,
                format!("{} is open read-only", stream.path),
            );
        }
        let object = self.objects.get_mut(&stream.path).ok_or_else(|| {
            NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {}", stream.path))
        })?;
        let start = usize::try_from(stream.cursor).unwrap_or(usize::MAX);
        let end = start.saturating_add(data.len());
        if object.data.len() < end {
            object.data.resize(end, 0);
        }
        object.data[start..end].copy_from_slice(data);
        object.checksum.clear();
        object.modify_ts = now;
        stream.cursor = end as u64;
        Ok(data.len())
    }

    pub fn seek_stream(&mut self, session: u64, handle: DataHandle, offset: u64) -> NativeResult<u64> {
        let stream = self.stream_mut(session, handle)?;
        stream.cursor = offset;
        Ok(offset)
    }

    pub fn close_stream(&mut self, session: u64, handle: DataHandle) -> NativeResult<()> {
        self.stream_mut(session, handle)?;
        self.streams.remove(&handle.0);
        Ok(())
    }

    /// Drop every handle a session still holds
    pub fn release_session(&mut self, session: u64) {
        self.listings.retain(|_, l| l.session != session);
        self.streams.retain(|_, s| s.session != session);
    }

    pub fn stat(&self, path: &str) -> NativeResult<ObjectStat> {
        let object = self.require_object(path)?;
        Ok(ObjectStat {
            size: object.data.len() as u64,
            data_mode: object.mode,
            data_id: object.id.to_string(),
            checksum: object.checksum.clone(),
            owner_name: object.owner.clone(),
            owner_zone: object.owner_zone.clone(),
            create_time: timestamp(object.create_ts),
            modify_time: timestamp(object.modify_ts),
        })
    }

    pub fn checksum(&mut self, path: &str) -> NativeResult<String> {
        self.require_object(path)?;
        let object = self
            .objects
            .get_mut(path)
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {path}")))?;
        object.checksum = sha2_checksum(&object.data);
        Ok(object.checksum.clone())
    }

    pub fn copy_object(
        &mut self,
        owner: &str,
        source: &str,
        destination: &str,
        force: bool,
        resource: &str,
    ) -> NativeResult<()> {
        let (data, mode) = {
            let object = self.require_object(source)?;
            (object.data.clone(), object.mode)
        };
        self.put_object(owner, destination, data, mode, force, resource)
    }

    pub fn move_object(
        &mut self,
        source: &str,
        destination: &str,
        kind: ObjectKind,
    ) -> NativeResult<()> {
        match kind {
            ObjectKind::DataObject => {
                self.require_object(source)?;
            }
            ObjectKind::Collection => {
                self.require_collection(source)?;
                if is_within(destination, source) {
                    return fail(
                        CAT_INVALID_ARGUMENT,
                        format!("can't move {source} into itself"),
                    );
                }
            }
        }
        self.require_collection(parent_of(destination))?;
        if self.contains(destination) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("{destination} already exists"),
            );
        }

        rekey(&mut self.collections, source, destination);
        rekey(&mut self.objects, source, destination);
        rekey(&mut self.acls, source, destination);
        let moved: Vec<(String, String)> = self
            .avus
            .keys()
            .filter(|(letter, key)| (letter == "d" || letter == "C") && is_within(key, source))
            .cloned()
            .collect();
        for (letter, key) in moved {
            if let Some(avus) = self.avus.remove(&(letter.clone(), key.clone())) {
                self.avus
                    .insert((letter, rebase(&key, source, destination)), avus);
            }
        }
        let now = self.tick();
        if let Some(c) = self.collections.get_mut(destination) {
            c.modify_ts = now;
        }
        if let Some(o) = self.objects.get_mut(destination) {
            o.modify_ts = now;
        }
        Ok(())
    }

    /// Remove a tree permanently, or move it to the owner's trash
    pub fn remove(
        &mut self,
        user: &str,
        path: &str,
        kind: ObjectKind,
        recursive: bool,
        force: bool,
    ) -> NativeResult<()> {
        match kind {
            ObjectKind::DataObject => {
                self.require_object(path)?;
            }
            ObjectKind::Collection => {
                self.require_collection(path)?;
                let non_empty = self
                    .collections
                    .keys()
                    .chain(self.objects.keys())
                    .any(|p| p != path && is_within(p, path));
                if non_empty && !recursive {
                    return fail(
                        CAT_COLLECTION_NOT_EMPTY,
                        format!("collection {path} is not empty"),
                    );
                }
            }
        }

        let trash_root = format!("/{}/trash", self.zone);
        if force || is_within(path, &trash_root) {
            self.purge(path);
            return Ok(());
        }

        self.create_home(user);
        let trash_home = format!("/{}/trash/home/{user}", self.zone);
        let mut destination = join(&trash_home, name_of(path));
        if self.contains(&destination) {
            let now = self.tick();
            destination = format!("{destination}.{now}");
        }
        self.move_object(path, &destination, kind)
    }

    fn purge(&mut self, root: &str) {
        self.collections.retain(|p, _| !is_within(p, root));
        self.objects.retain(|p, _| !is_within(p, root));
        self.acls.retain(|p, _| !is_within(p, root));
        self.avus
            .retain(|(letter, key), _| !((letter == "d" || letter == "C") && is_within(key, root)));
    }

    // =========== Replicas ===========

    pub fn replicate(&mut self, path: &str, resource: &str, _backup: bool) -> NativeResult<()> {
        let resource = self.resolve_resource(resource)?;
        self.require_object(path)?;
        let now = self.tick();
        let phy_path = self.physical_path(&resource, path);
        let object = self
            .objects
            .get_mut(path)
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {path}")))?;
        if object.replicas.iter().any(|r| r.resource == resource) {
            return Ok(());
        }
        let num = object.replicas.iter().map(|r| r.num).max().unwrap_or(-1) + 1;
        object.replicas.push(Replica {
            num,
            resource,
            phy_path,
            status: GOOD_REPLICA,
            create_ts: now,
        });
        Ok(())
    }

    /// Drop replicas beyond `keep` (never the last one); only replicas on
    /// `resource` when it is set, and only ones at least `min_age_minutes` old
    pub fn trim_replicas(
        &mut self,
        path: &str,
        resource: &str,
        keep: u32,
        min_age_minutes: u32,
    ) -> NativeResult<()> {
        if !resource.is_empty() {
            self.resolve_resource(resource)?;
        }
        let now = self.clock;
        let object = self
            .objects
            .get_mut(path)
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {path}")))?;
        let keep = usize::try_from(keep.max(1)).unwrap_or(1);
        let min_age = i64::from(min_age_minutes) * 60;
        while object.replicas.len() > keep {
            let Some(victim) = object.replicas.iter().rposition(|r| {
                (resource.is_empty() || r.resource == resource) && now - r.create_ts >= min_age
            }) else {
                break;
            };
            object.replicas.remove(victim);
        }
        Ok(())
    }

    pub fn move_replica(
        &mut self,
        path: &str,
        source_resource: &str,
        destination_resource: &str,
    ) -> NativeResult<()> {
        let destination = self.resolve_resource(destination_resource)?;
        let phy_path = self.physical_path(&destination, path);
        let object = self
            .objects
            .get_mut(path)
            .ok_or_else(|| NativeError::new(CAT_UNKNOWN_FILE, format!("unknown data object {path}")))?;
        let replica = object
            .replicas
            .iter_mut()
            .find(|r| r.resource == source_resource)
            .ok_or_else(|| {
                NativeError::new(
                    SYS_REPLICA_DOES_NOT_EXIST,
                    format!("{path} has no replica on {source_resource}"),
                )
            })?;
        replica.resource = destination;
        replica.phy_path = phy_path;
        Ok(())
    }

    /// The metadata owner named by a type letter and path exists
    pub fn entity_exists(&self, type_letter: &str, path: &str) -> Option<bool> {
        match type_letter {
            "d" => Some(self.objects.contains_key(path)),
            "C" => Some(self.collections.contains_key(path)),
            "u" => Some(self.principals.contains_key(path)),
            "R" => Some(self.resources.contains_key(path)),
            "Z" => Some(self.zones.contains_key(path)),
            _ => None,
        }
    }

    /// Drop every ACL entry naming `principal`
    pub fn forget_principal(&mut self, principal: &str) {
        for acl in self.acls.values_mut() {
            acl.remove(principal);
        }
        self.avus.remove(&("u".to_string(), principal.to_string()));
    }
}
