//! Catalog groups

use super::{Lazy, Named, User, UserRef, Zone, column, column_time};
use crate::connection::{Connection, WeakConnection};
use crate::meta::{Meta, MetaCollection};
use crate::object::WeakAccessObject;
use chrono::{DateTime, Utc};
use icat_common::{Error, ObjectType, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug)]
struct GroupInfo {
    id: String,
    info: String,
    comment: String,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
}

/// A catalog group
pub struct Group {
    connection: WeakConnection,
    name: String,
    zone: String,
    info: Lazy<GroupInfo>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

impl Group {
    pub(crate) const fn new(connection: WeakConnection, name: String, zone: String) -> Self {
        Self {
            connection,
            name,
            zone,
            info: Lazy::new(),
            meta: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn zone_name(&self) -> &str {
        &self.zone
    }

    pub fn zone(&self) -> Result<Arc<Zone>> {
        self.connection()?.zone(&self.zone)
    }

    pub fn connection(&self) -> Result<Connection> {
        self.connection.upgrade()
    }

    pub fn init(&self) -> Result<()> {
        self.hydrated().map(drop)
    }

    pub fn refresh(&self) -> Result<()> {
        let info = self.fetch()?;
        self.info.set(info);
        Ok(())
    }

    fn hydrated(&self) -> Result<GroupInfo> {
        self.info.get_or_try_init(|| self.fetch())
    }

    // groups share the user table
    fn fetch(&self) -> Result<GroupInfo> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let columns = lease.run(&format!("group info {}", self.name), |s| {
            s.user_info(&self.name)
        })?;
        Ok(GroupInfo {
            id: column(&columns, "user_id"),
            info: column(&columns, "user_info"),
            comment: column(&columns, "r_comment"),
            create_time: column_time(&columns, "create_ts"),
            modify_time: column_time(&columns, "modify_ts"),
        })
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.hydrated()?.id)
    }

    pub fn info(&self) -> Result<String> {
        Ok(self.hydrated()?.info)
    }

    pub fn comment(&self) -> Result<String> {
        Ok(self.hydrated()?.comment)
    }

    pub fn create_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.hydrated()?.create_time)
    }

    pub fn modify_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.hydrated()?.modify_time)
    }

    /// Members, resolved through the user cache
    pub fn users(&self) -> Result<Vec<Arc<User>>> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let members = lease.run_rows(&format!("members of {}", self.name), |s| {
            s.group_members(&self.name)
        })?;
        members
            .iter()
            .map(|member| {
                let name = member.split_once('#').map_or(member.as_str(), |(n, _)| n);
                lease.cached_user(name)?.ok_or_else(|| {
                    Error::integrity(format!(
                        "member {member} of group {} is not in the user cache",
                        self.name
                    ))
                })
            })
            .collect()
    }

    pub fn add_user(&self, user: impl Into<UserRef>) -> Result<()> {
        let user = user.into();
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("add {} to {}", user.name(), self.name), |s| {
            s.add_to_group(user.name(), &self.zone, &self.name)
        })?;
        info!("Added user {} to group {}", user.name(), self.name);
        Ok(())
    }

    pub fn remove_user(&self, user: impl Into<UserRef>) -> Result<()> {
        let user = user.into();
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("remove {} from {}", user.name(), self.name), |s| {
            s.remove_from_group(user.name(), &self.zone, &self.name)
        })?;
        info!("Removed user {} from group {}", user.name(), self.name);
        Ok(())
    }

    /// Delete the group from the catalog and refresh the group cache
    pub fn delete(&self) -> Result<()> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("delete group {}", self.name), |s| {
            s.delete_group(&self.name, &self.zone)
        })?;
        lease.refresh_groups()?;
        info!("Deleted group {}#{}", self.name, self.zone);
        Ok(())
    }

    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.clone(),
                WeakAccessObject::Group(Arc::downgrade(self)),
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

impl Named for Group {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", ObjectType::Group, self.name, self.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connect;
    use icat_common::{ErrorKind, UserType};

    #[test]
    fn test_members_resolve_to_cached_users() {
        let (catalog, conn) = connect();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        catalog.add_group("science", &["alice", "rods"]).unwrap();

        let science = conn.group("science").unwrap();
        let members = science.users().unwrap();
        assert_eq!(members.len(), 2);
        let alice = conn.user("alice").unwrap();
        assert!(members.iter().any(|u| Arc::ptr_eq(u, &alice)));
        assert_eq!(science.to_string(), "rodsgroup:science#tempZone");
    }

    #[test]
    fn test_member_missing_from_cache_is_integrity_error() {
        let (catalog, conn) = connect();
        // load the user cache before alice exists
        conn.users().unwrap();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        catalog.add_group("science", &["alice"]).unwrap();

        let science = conn.group("science").unwrap();
        let err = science.users().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);

        conn.refresh_users().unwrap();
        assert_eq!(science.users().unwrap().len(), 1);
    }

    #[test]
    fn test_add_remove_and_delete() {
        let (catalog, conn) = connect();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        let staff = conn.create_group("staff").unwrap();
        assert!(!staff.id().unwrap().is_empty());

        staff.add_user("alice").unwrap();
        assert_eq!(staff.users().unwrap()[0].name(), "alice");
        staff.remove_user("alice").unwrap();
        assert!(staff.users().unwrap().is_empty());

        staff.delete().unwrap();
        assert!(!conn.groups().unwrap().iter().any(|g| g.name() == "staff"));
    }
}
