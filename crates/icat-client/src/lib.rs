//! iCAT Client - object-oriented access to an iRODS-style catalog
//!
//! The entry point is [`Connection`], an authenticated session whose
//! remote calls are serialised through a [`Lease`]. From a connection:
//! - [`Collection`] and [`DataObject`] mirror the remote namespace as a
//!   lazily hydrated tree
//! - [`User`], [`Group`], [`Zone`] and [`Resource`] come from a per-connection
//!   principal cache
//! - [`MetaCollection`] and [`Acl`] expose metadata and access control
//!
//! [`Client`] wraps connection setup and teardown around a closure.

pub mod acl;
mod cache;
pub mod client;
pub mod collection;
pub mod connection;
pub mod dataobj;
pub mod meta;
pub mod object;
pub mod options;
pub mod path;
pub mod principal;

#[cfg(test)]
pub(crate) mod testing;

pub use acl::Acl;
pub use client::Client;
pub use collection::{Collection, CollectionRef, Entry};
pub use connection::{Connection, Lease};
pub use dataobj::{DataObject, OpenMode};
pub use meta::{Meta, MetaCollection};
pub use object::AccessObject;
pub use options::{CollectionOptions, DataObjOptions, TrimOptions};
pub use principal::{
    Group, GroupRef, PrincipalRef, Resource, ResourceRef, User, UserRef, Zone,
};

pub use icat_common::{
    AccessLevel, ConnectionOptions, CredentialSource, Error, ErrorKind, Level, ObjectType,
    ResourceClass, Result, UserType, ZoneType,
};
pub use icat_native::{MemoryCatalog, NativeClient, ObjectStat};
