//! Sessions against the in-process catalog

use super::Shared;
use super::state::{CatalogState, DEFAULT_MODE, fail};
use crate::records::{
    AclRecord, AvuRecord, CollectionEntry, CollectionHandle, DataHandle, InfoMap, MetaTarget,
    ObjectKind, ObjectStat, OpenFlags,
};
use crate::session::NativeSession;
use crate::status::{CAT_INVALID_USER, NativeResult, SYS_HEADER_READ_LEN_ERR, USER_SOCK_CONNECT_ERR};
use icat_common::{AccessLevel, UserType};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Who a session acts as
struct Identity {
    session: u64,
    user: String,
}

/// One authenticated session on a [`super::MemoryCatalog`]
pub struct MemorySession {
    shared: Arc<Shared>,
    identity: Identity,
    connected: bool,
}

impl MemorySession {
    pub(super) fn new(shared: Arc<Shared>, session: u64, user: String) -> Self {
        Self {
            shared,
            identity: Identity { session, user },
            connected: true,
        }
    }

    /// Run one remote call against the catalog tables
    fn call<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut CatalogState, &Identity) -> NativeResult<T>,
    ) -> NativeResult<T> {
        if !self.connected {
            return fail(USER_SOCK_CONNECT_ERR, "session is disconnected");
        }
        if !self.shared.online.load(Ordering::SeqCst) {
            return fail(SYS_HEADER_READ_LEN_ERR, "connection to catalog lost");
        }
        let mut state = self.shared.state.lock();
        state.record_call(op);
        f(&mut state, &self.identity)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.connected {
            self.shared.state.lock().release_session(self.identity.session);
        }
    }
}

impl NativeSession for MemorySession {
    fn disconnect(&mut self) -> NativeResult<()> {
        self.call("disconnect", |state, id| {
            state.release_session(id.session);
            Ok(())
        })?;
        self.connected = false;
        Ok(())
    }

    fn open_collection(
        &mut self,
        path: &str,
        trim_replicas: bool,
    ) -> NativeResult<CollectionHandle> {
        self.call("open_collection", |state, id| {
            state.open_listing(id.session, path, trim_replicas)
        })
    }

    fn read_collection(&mut self, handle: CollectionHandle) -> NativeResult<Vec<CollectionEntry>> {
        self.call("read_collection", |state, id| {
            state.read_listing(id.session, handle)
        })
    }

    fn close_collection(&mut self, handle: CollectionHandle) -> NativeResult<()> {
        self.call("close_collection", |state, id| {
            state.close_listing(id.session, handle)
        })
    }

    fn create_collection(&mut self, path: &str) -> NativeResult<()> {
        self.call("create_collection", |state, id| {
            state.create_collection(&id.user, path)
        })
    }

    fn collection_inheritance(&mut self, path: &str) -> NativeResult<bool> {
        self.call("collection_inheritance", |state, _| state.inheritance(path))
    }

    fn set_inheritance(&mut self, path: &str, enabled: bool, recursive: bool) -> NativeResult<()> {
        self.call("set_inheritance", |state, _| {
            state.set_inheritance(path, enabled, recursive)
        })
    }

    fn collection_acl(&mut self, path: &str, _zone_hint: &str) -> NativeResult<Vec<AclRecord>> {
        self.call("collection_acl", |state, _| state.collection_acl(path))
    }

    fn open_data_object(
        &mut self,
        path: &str,
        resource: &str,
        flags: OpenFlags,
    ) -> NativeResult<DataHandle> {
        self.call("open_data_object", |state, id| {
            state.open_stream(id.session, path, resource, flags)
        })
    }

    fn read_data_object(&mut self, handle: DataHandle, len: usize) -> NativeResult<Vec<u8>> {
        self.call("read_data_object", |state, id| {
            state.read_stream(id.session, handle, len)
        })
    }

    fn write_data_object(&mut self, handle: DataHandle, data: &[u8]) -> NativeResult<usize> {
        self.call("write_data_object", |state, id| {
            state.write_stream(id.session, handle, data)
        })
    }

    fn seek_data_object(&mut self, handle: DataHandle, offset: u64) -> NativeResult<u64> {
        self.call("seek_data_object", |state, id| {
            state.seek_stream(id.session, handle, offset)
        })
    }

    fn close_data_object(&mut self, handle: DataHandle) -> NativeResult<()> {
        self.call("close_data_object", |state, id| {
            state.close_stream(id.session, handle)
        })
    }

    fn stat_data_object(&mut self, path: &str) -> NativeResult<ObjectStat> {
        self.call("stat_data_object", |state, _| state.stat(path))
    }

    fn checksum_data_object(&mut self, path: &str) -> NativeResult<String> {
        self.call("checksum_data_object", |state, _| state.checksum(path))
    }

    fn create_data_object(
        &mut self,
        path: &str,
        _size: u64,
        mode: u32,
        force: bool,
        resource: &str,
    ) -> NativeResult<DataHandle> {
        self.call("create_data_object", |state, id| {
            let mode = if mode == 0 { DEFAULT_MODE } else { mode };
            state.put_object(&id.user, path, Vec::new(), mode, force, resource)?;
            state.open_stream(id.session, path, resource, OpenFlags::ReadWrite)
        })
    }

    fn copy_data_object(
        &mut self,
        source: &str,
        destination: &str,
        force: bool,
        resource: &str,
    ) -> NativeResult<()> {
        self.call("copy_data_object", |state, id| {
            state.copy_object(&id.user, source, destination, force, resource)
        })
    }

    fn move_object(
        &mut self,
        source: &str,
        destination: &str,
        kind: ObjectKind,
    ) -> NativeResult<()> {
        self.call("move_object", |state, _| {
            state.move_object(source, destination, kind)
        })
    }

    fn remove(
        &mut self,
        path: &str,
        kind: ObjectKind,
        recursive: bool,
        force: bool,
    ) -> NativeResult<()> {
        self.call("remove", |state, id| {
            state.remove(&id.user, path, kind, recursive, force)
        })
    }

    fn data_object_acl(&mut self, data_id: &str, _zone_hint: &str) -> NativeResult<Vec<AclRecord>> {
        self.call("data_object_acl", |state, _| state.data_object_acl(data_id))
    }

    fn replicate(&mut self, path: &str, resource: &str, backup: bool) -> NativeResult<()> {
        self.call("replicate", |state, _| state.replicate(path, resource, backup))
    }

    fn trim_replicas(
        &mut self,
        path: &str,
        resource: &str,
        keep: u32,
        min_age_minutes: u32,
    ) -> NativeResult<()> {
        self.call("trim_replicas", |state, _| {
            state.trim_replicas(path, resource, keep, min_age_minutes)
        })
    }

    fn move_replica(
        &mut self,
        path: &str,
        source_resource: &str,
        destination_resource: &str,
    ) -> NativeResult<()> {
        self.call("move_replica", |state, _| {
            state.move_replica(path, source_resource, destination_resource)
        })
    }

    fn list_metadata(&mut self, target: &MetaTarget) -> NativeResult<Vec<AvuRecord>> {
        self.call("list_metadata", |state, _| state.list_metadata(target))
    }

    fn add_metadata(&mut self, type_letter: &str, path: &str, avu: &AvuRecord) -> NativeResult<()> {
        self.call("add_metadata", |state, _| {
            state.add_metadata(type_letter, path, avu)
        })
    }

    fn modify_metadata(
        &mut self,
        type_letter: &str,
        path: &str,
        old: &AvuRecord,
        new: &AvuRecord,
    ) -> NativeResult<()> {
        self.call("modify_metadata", |state, _| {
            state.modify_metadata(type_letter, path, old, new)
        })
    }

    fn remove_metadata(
        &mut self,
        type_letter: &str,
        path: &str,
        avu: &AvuRecord,
    ) -> NativeResult<()> {
        self.call("remove_metadata", |state, _| {
            state.remove_metadata(type_letter, path, avu)
        })
    }

    fn list_users(&mut self) -> NativeResult<Vec<String>> {
        self.call("list_users", |state, _| Ok(state.list_users()))
    }

    fn list_groups(&mut self) -> NativeResult<Vec<String>> {
        self.call("list_groups", |state, _| Ok(state.list_groups()))
    }

    fn list_zones(&mut self) -> NativeResult<Vec<String>> {
        self.call("list_zones", |state, _| Ok(state.zones.keys().cloned().collect()))
    }

    fn list_resources(&mut self) -> NativeResult<Vec<String>> {
        self.call("list_resources", |state, _| {
            Ok(state.resources.keys().cloned().collect())
        })
    }

    fn user_info(&mut self, name: &str) -> NativeResult<InfoMap> {
        self.call("user_info", |state, _| state.user_info(name))
    }

    fn zone_info(&mut self, name: &str) -> NativeResult<InfoMap> {
        self.call("zone_info", |state, _| state.zone_info(name))
    }

    fn resource_info(&mut self, name: &str) -> NativeResult<InfoMap> {
        self.call("resource_info", |state, _| state.resource_info(name))
    }

    fn user_groups(&mut self, name: &str) -> NativeResult<Vec<String>> {
        self.call("user_groups", |state, _| state.user_groups(name))
    }

    fn group_members(&mut self, name: &str) -> NativeResult<Vec<String>> {
        self.call("group_members", |state, _| state.group_members(name))
    }

    fn create_user(&mut self, name: &str, zone: &str, user_type: UserType) -> NativeResult<()> {
        self.call("create_user", |state, id| {
            state.require_admin(&id.user)?;
            state.create_user(name, zone, user_type)
        })
    }

    fn delete_user(&mut self, name: &str, zone: &str) -> NativeResult<()> {
        self.call("delete_user", |state, id| {
            state.require_admin(&id.user)?;
            state.delete_principal(name, zone, false)
        })
    }

    fn create_group(&mut self, name: &str, zone: &str) -> NativeResult<()> {
        self.call("create_group", |state, id| {
            state.require_admin(&id.user)?;
            state.create_group(name, zone)
        })
    }

    fn delete_group(&mut self, name: &str, zone: &str) -> NativeResult<()> {
        self.call("delete_group", |state, id| {
            state.require_admin(&id.user)?;
            state.delete_principal(name, zone, true)
        })
    }

    fn add_to_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()> {
        self.call("add_to_group", |state, id| {
            state.require_admin(&id.user)?;
            state.add_to_group(user, zone, group)
        })
    }

    fn remove_from_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()> {
        self.call("remove_from_group", |state, id| {
            state.require_admin(&id.user)?;
            state.remove_from_group(user, zone, group)
        })
    }

    fn change_password(&mut self, user: &str, new: &str, current: &str) -> NativeResult<()> {
        self.call("change_password", |state, id| {
            state.change_password(&id.user, user, new, current)
        })
    }

    fn chmod(
        &mut self,
        path: &str,
        principal: &str,
        _zone: &str,
        level: AccessLevel,
        recursive: bool,
    ) -> NativeResult<()> {
        self.call("chmod", |state, _| {
            if !state.principals.contains_key(principal) {
                return fail(
                    CAT_INVALID_USER,
                    format!("no user or group {principal}"),
                );
            }
            state.chmod(path, principal, level, recursive)
        })
    }
}
