//! Records exchanged with the native catalog client
//!
//! These are owned, wire-neutral renderings of the catalog's result
//! structures. Ownership replaces the foreign library's out-buffers, so
//! nothing needs freeing on error paths.

use std::collections::BTreeMap;
use std::fmt;

/// Server-side cursor over an open collection listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionHandle(pub i32);

/// Server-side cursor over an open data object byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataHandle(pub i32);

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection#{}", self.0)
    }
}

impl fmt::Display for DataHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data#{}", self.0)
    }
}

/// Namespace node kind as reported by a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    DataObject,
    Collection,
}

/// Data object open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenFlags {
    ReadOnly,
    ReadWrite,
    /// Read-write, discarding the existing content
    Truncate,
}

impl OpenFlags {
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Truncate)
    }
}

/// How a session authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectRequest {
    /// Endpoint and identity from the process environment
    Environment { password: String },
    /// Explicit endpoint and identity
    Explicit {
        host: String,
        port: u16,
        username: String,
        zone: String,
        password: String,
    },
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment { .. } => f.debug_struct("Environment").finish_non_exhaustive(),
            Self::Explicit {
                host,
                port,
                username,
                zone,
                ..
            } => f
                .debug_struct("Explicit")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("zone", zone)
                .finish_non_exhaustive(),
        }
    }
}

/// One entry of a collection listing
///
/// For collections `coll_name` is the full path; for data objects it is
/// the containing collection's path and the `data_*` fields are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionEntry {
    pub kind: Option<ObjectKind>,
    pub owner_name: String,
    pub coll_name: String,
    pub create_time: String,
    pub modify_time: String,
    pub data_name: String,
    pub data_id: String,
    pub data_size: u64,
    pub data_mode: u32,
    pub checksum: String,
    pub resource: String,
    pub resource_hierarchy: String,
    pub phy_path: String,
    pub repl_num: i32,
    pub repl_status: i32,
}

impl CollectionEntry {
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.kind == Some(ObjectKind::Collection)
    }
}

/// A metadata triple as stored by the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AvuRecord {
    pub attribute: String,
    pub value: String,
    pub units: String,
}

impl AvuRecord {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            units: units.into(),
        }
    }
}

/// One access-control entry as stored by the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclRecord {
    /// Principal name
    pub name: String,
    /// Principal zone
    pub zone: String,
    /// Catalog access name (`own`, `modify object`, `read object`, ...)
    pub access: String,
    /// Catalog user type name (`rodsuser`, `rodsgroup`, ...)
    pub user_type: String,
}

/// System metadata of a data object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub data_mode: u32,
    pub data_id: String,
    pub checksum: String,
    pub owner_name: String,
    pub owner_zone: String,
    pub create_time: String,
    pub modify_time: String,
}

impl ObjectStat {
    /// The stat as a mapping keyed by the catalog's field names
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("objSize", self.size.to_string()),
            ("dataMode", format!("{:o}", self.data_mode)),
            ("dataId", self.data_id.clone()),
            ("chksum", self.checksum.clone()),
            ("ownerName", self.owner_name.clone()),
            ("ownerZone", self.owner_zone.clone()),
            ("createTime", self.create_time.clone()),
            ("modifyTime", self.modify_time.clone()),
        ])
    }
}

/// Which entity a metadata listing is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaTarget {
    DataObject { name: String, collection: String },
    Collection { name: String, parent: String },
    User { name: String, zone: String },
}

/// Catalog columns of a principal, zone or resource, keyed by column name
pub type InfoMap = BTreeMap<String, String>;
