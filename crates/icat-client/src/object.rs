//! Entities that can own metadata or appear in an ACL

use crate::collection::Collection;
use crate::connection::Connection;
use crate::dataobj::DataObject;
use crate::principal::{Group, Resource, User, Zone};
use chrono::{DateTime, Utc};
use icat_common::{Error, ObjectType, Result};
use std::fmt;
use std::sync::{Arc, Weak};

/// A user, group, namespace node, resource or zone
#[derive(Clone)]
pub enum AccessObject {
    User(Arc<User>),
    Group(Arc<Group>),
    Collection(Arc<Collection>),
    DataObject(Arc<DataObject>),
    Resource(Arc<Resource>),
    Zone(Arc<Zone>),
}

impl AccessObject {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::User(u) => u.name().to_string(),
            Self::Group(g) => g.name().to_string(),
            Self::Collection(c) => c.name(),
            Self::DataObject(d) => d.name(),
            Self::Resource(r) => r.name().to_string(),
            Self::Zone(z) => z.name().to_string(),
        }
    }

    /// Zone qualifying a principal or zone; `None` for nodes and resources
    #[must_use]
    pub fn zone(&self) -> Option<String> {
        match self {
            Self::User(u) => Some(u.zone_name()),
            Self::Group(g) => Some(g.zone_name().to_string()),
            Self::Zone(z) => Some(z.name().to_string()),
            Self::Collection(_) | Self::DataObject(_) | Self::Resource(_) => None,
        }
    }

    /// Catalog address used by metadata calls: the full path of a node,
    /// the name of anything else
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Collection(c) => c.path(),
            Self::DataObject(d) => d.path(),
            _ => self.name(),
        }
    }

    /// Metadata and ACL short-type letter
    #[must_use]
    pub const fn short_type(&self) -> &'static str {
        match self {
            Self::User(_) | Self::Group(_) => "u",
            Self::Collection(_) => "C",
            Self::DataObject(_) => "d",
            Self::Resource(_) => "R",
            Self::Zone(_) => "Z",
        }
    }

    pub fn kind(&self) -> Result<ObjectType> {
        match self {
            Self::User(u) => u.kind(),
            Self::Group(_) => Ok(ObjectType::Group),
            Self::Collection(_) => Ok(ObjectType::Collection),
            Self::DataObject(_) => Ok(ObjectType::DataObject),
            Self::Resource(r) => r.kind(),
            Self::Zone(_) => Ok(ObjectType::Zone),
        }
    }

    /// Catalog id; namespace nodes other than data objects have none
    pub fn id(&self) -> Result<String> {
        match self {
            Self::User(u) => u.id(),
            Self::Group(g) => g.id(),
            Self::Collection(_) => Ok(String::new()),
            Self::DataObject(d) => Ok(d.data_id()),
            Self::Resource(r) => r.id(),
            Self::Zone(z) => z.id(),
        }
    }

    /// Catalog comment; empty for namespace nodes
    pub fn comment(&self) -> Result<String> {
        match self {
            Self::User(u) => u.comment(),
            Self::Group(g) => g.comment(),
            Self::Collection(_) | Self::DataObject(_) => Ok(String::new()),
            Self::Resource(r) => r.comment(),
            Self::Zone(z) => z.comment(),
        }
    }

    pub fn create_time(&self) -> Result<DateTime<Utc>> {
        match self {
            Self::User(u) => u.create_time(),
            Self::Group(g) => g.create_time(),
            Self::Collection(c) => Ok(c.create_time()),
            Self::DataObject(d) => Ok(d.create_time()),
            Self::Resource(r) => r.create_time(),
            Self::Zone(z) => z.create_time(),
        }
    }

    pub fn modify_time(&self) -> Result<DateTime<Utc>> {
        match self {
            Self::User(u) => u.modify_time(),
            Self::Group(g) => g.modify_time(),
            Self::Collection(c) => Ok(c.modify_time()),
            Self::DataObject(d) => Ok(d.modify_time()),
            Self::Resource(r) => r.modify_time(),
            Self::Zone(z) => z.modify_time(),
        }
    }

    pub fn connection(&self) -> Result<Connection> {
        match self {
            Self::User(u) => u.connection(),
            Self::Group(g) => g.connection(),
            Self::Collection(c) => Ok(c.connection().clone()),
            Self::DataObject(d) => Ok(d.connection().clone()),
            Self::Resource(r) => r.connection(),
            Self::Zone(z) => z.connection(),
        }
    }

    /// Same underlying instance
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::User(a), Self::User(b)) => Arc::ptr_eq(a, b),
            (Self::Group(a), Self::Group(b)) => Arc::ptr_eq(a, b),
            (Self::Collection(a), Self::Collection(b)) => Arc::ptr_eq(a, b),
            (Self::DataObject(a), Self::DataObject(b)) => Arc::ptr_eq(a, b),
            (Self::Resource(a), Self::Resource(b)) => Arc::ptr_eq(a, b),
            (Self::Zone(a), Self::Zone(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for AccessObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(u) => fmt::Debug::fmt(u, f),
            Self::Group(g) => fmt::Debug::fmt(g, f),
            Self::Collection(c) => fmt::Debug::fmt(c, f),
            Self::DataObject(d) => fmt::Debug::fmt(d, f),
            Self::Resource(r) => fmt::Debug::fmt(r, f),
            Self::Zone(z) => fmt::Debug::fmt(z, f),
        }
    }
}

impl From<Arc<User>> for AccessObject {
    fn from(user: Arc<User>) -> Self {
        Self::User(user)
    }
}

impl From<Arc<Group>> for AccessObject {
    fn from(group: Arc<Group>) -> Self {
        Self::Group(group)
    }
}

impl From<Arc<Collection>> for AccessObject {
    fn from(collection: Arc<Collection>) -> Self {
        Self::Collection(collection)
    }
}

impl From<Arc<DataObject>> for AccessObject {
    fn from(data_object: Arc<DataObject>) -> Self {
        Self::DataObject(data_object)
    }
}

/// Back-reference from a metadata collection to its owner
#[derive(Clone)]
pub(crate) enum WeakAccessObject {
    User(Weak<User>),
    Group(Weak<Group>),
    Collection(Weak<Collection>),
    DataObject(Weak<DataObject>),
    Resource(Weak<Resource>),
    Zone(Weak<Zone>),
}

impl WeakAccessObject {
    pub(crate) fn upgrade(&self) -> Result<AccessObject> {
        let owner = match self {
            Self::User(u) => u.upgrade().map(AccessObject::User),
            Self::Group(g) => g.upgrade().map(AccessObject::Group),
            Self::Collection(c) => c.upgrade().map(AccessObject::Collection),
            Self::DataObject(d) => d.upgrade().map(AccessObject::DataObject),
            Self::Resource(r) => r.upgrade().map(AccessObject::Resource),
            Self::Zone(z) => z.upgrade().map(AccessObject::Zone),
        };
        owner.ok_or_else(|| Error::closed("metadata owner has been dropped"))
    }
}
