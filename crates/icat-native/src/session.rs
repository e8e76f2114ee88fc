//! The native client contract
//!
//! [`NativeClient`] establishes sessions; [`NativeSession`] is one
//! authenticated session. A session is not safe for concurrent use, so
//! every method takes `&mut self` and callers serialise access.

use crate::records::{
    AclRecord, AvuRecord, CollectionEntry, CollectionHandle, ConnectRequest, DataHandle, InfoMap,
    MetaTarget, ObjectKind, ObjectStat, OpenFlags,
};
use crate::status::NativeResult;
use icat_common::{AccessLevel, UserType};

/// Establishes authenticated sessions with a catalog server
pub trait NativeClient: Send + Sync {
    /// Authenticate and return a live session
    fn connect(&self, request: &ConnectRequest) -> NativeResult<Box<dyn NativeSession>>;
}

/// One authenticated catalog session
pub trait NativeSession: Send {
    // =========== Session ===========

    fn disconnect(&mut self) -> NativeResult<()>;

    // =========== Collections ===========

    /// Open a collection listing
    fn open_collection(&mut self, path: &str, trim_replicas: bool)
    -> NativeResult<CollectionHandle>;

    /// Read every entry of an open listing in one pass
    fn read_collection(&mut self, handle: CollectionHandle) -> NativeResult<Vec<CollectionEntry>>;

    fn close_collection(&mut self, handle: CollectionHandle) -> NativeResult<()>;

    fn create_collection(&mut self, path: &str) -> NativeResult<()>;

    fn collection_inheritance(&mut self, path: &str) -> NativeResult<bool>;

    fn set_inheritance(&mut self, path: &str, enabled: bool, recursive: bool) -> NativeResult<()>;

    fn collection_acl(&mut self, path: &str, zone_hint: &str) -> NativeResult<Vec<AclRecord>>;

    // =========== Data objects ===========

    /// Open a data object byte stream; an empty resource means the default
    fn open_data_object(
        &mut self,
        path: &str,
        resource: &str,
        flags: OpenFlags,
    ) -> NativeResult<DataHandle>;

    /// Read up to `len` bytes at the handle's cursor
    fn read_data_object(&mut self, handle: DataHandle, len: usize) -> NativeResult<Vec<u8>>;

    /// Write at the handle's cursor, returning the bytes written
    fn write_data_object(&mut self, handle: DataHandle, data: &[u8]) -> NativeResult<usize>;

    /// Position the handle's cursor, returning the new position
    fn seek_data_object(&mut self, handle: DataHandle, offset: u64) -> NativeResult<u64>;

    fn close_data_object(&mut self, handle: DataHandle) -> NativeResult<()>;

    fn stat_data_object(&mut self, path: &str) -> NativeResult<ObjectStat>;

    /// Compute, store and return the server-side checksum
    fn checksum_data_object(&mut self, path: &str) -> NativeResult<String>;

    /// Create a data object and return an open read-write handle to it
    fn create_data_object(
        &mut self,
        path: &str,
        size: u64,
        mode: u32,
        force: bool,
        resource: &str,
    ) -> NativeResult<DataHandle>;

    fn copy_data_object(
        &mut self,
        source: &str,
        destination: &str,
        force: bool,
        resource: &str,
    ) -> NativeResult<()>;

    fn move_object(&mut self, source: &str, destination: &str, kind: ObjectKind)
    -> NativeResult<()>;

    /// Remove a collection or data object; without `force` it goes to trash
    fn remove(
        &mut self,
        path: &str,
        kind: ObjectKind,
        recursive: bool,
        force: bool,
    ) -> NativeResult<()>;

    fn data_object_acl(&mut self, data_id: &str, zone_hint: &str) -> NativeResult<Vec<AclRecord>>;

    fn replicate(&mut self, path: &str, resource: &str, backup: bool) -> NativeResult<()>;

    fn trim_replicas(
        &mut self,
        path: &str,
        resource: &str,
        keep: u32,
        min_age_minutes: u32,
    ) -> NativeResult<()>;

    fn move_replica(
        &mut self,
        path: &str,
        source_resource: &str,
        destination_resource: &str,
    ) -> NativeResult<()>;

    // =========== Metadata ===========

    /// List AVUs; an entity without metadata reports `CAT_NO_ROWS_FOUND`
    fn list_metadata(&mut self, target: &MetaTarget) -> NativeResult<Vec<AvuRecord>>;

    fn add_metadata(&mut self, type_letter: &str, path: &str, avu: &AvuRecord) -> NativeResult<()>;

    fn modify_metadata(
        &mut self,
        type_letter: &str,
        path: &str,
        old: &AvuRecord,
        new: &AvuRecord,
    ) -> NativeResult<()>;

    fn remove_metadata(
        &mut self,
        type_letter: &str,
        path: &str,
        avu: &AvuRecord,
    ) -> NativeResult<()>;

    // =========== Principals ===========

    fn list_users(&mut self) -> NativeResult<Vec<String>>;

    fn list_groups(&mut self) -> NativeResult<Vec<String>>;

    fn list_zones(&mut self) -> NativeResult<Vec<String>>;

    fn list_resources(&mut self) -> NativeResult<Vec<String>>;

    /// Catalog columns of a user or group
    fn user_info(&mut self, name: &str) -> NativeResult<InfoMap>;

    fn zone_info(&mut self, name: &str) -> NativeResult<InfoMap>;

    fn resource_info(&mut self, name: &str) -> NativeResult<InfoMap>;

    /// Names of the groups a user belongs to
    fn user_groups(&mut self, name: &str) -> NativeResult<Vec<String>>;

    /// Members of a group as `user#zone`
    fn group_members(&mut self, name: &str) -> NativeResult<Vec<String>>;

    fn create_user(&mut self, name: &str, zone: &str, user_type: UserType) -> NativeResult<()>;

    fn delete_user(&mut self, name: &str, zone: &str) -> NativeResult<()>;

    fn create_group(&mut self, name: &str, zone: &str) -> NativeResult<()>;

    fn delete_group(&mut self, name: &str, zone: &str) -> NativeResult<()>;

    fn add_to_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()>;

    fn remove_from_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()>;

    fn change_password(&mut self, user: &str, new: &str, current: &str) -> NativeResult<()>;

    // =========== Access control ===========

    fn chmod(
        &mut self,
        path: &str,
        principal: &str,
        zone: &str,
        level: AccessLevel,
        recursive: bool,
    ) -> NativeResult<()>;
}
