//! Catalog users

use super::{GroupRef, Lazy, Named, Zone, column, column_time};
use crate::connection::{Connection, WeakConnection};
use crate::meta::{Meta, MetaCollection};
use crate::object::WeakAccessObject;
use crate::principal::Group;
use chrono::{DateTime, Utc};
use icat_common::{Error, ObjectType, Result};
use icat_native::InfoMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Debug)]
struct UserInfo {
    id: String,
    zone: String,
    kind: ObjectType,
    info: String,
    comment: String,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
}

impl UserInfo {
    fn from_columns(columns: &InfoMap, zone: &str) -> Self {
        let mut home = column(columns, "zone_name");
        if home.is_empty() {
            home = zone.to_string();
        }
        Self {
            id: column(columns, "user_id"),
            zone: home,
            kind: ObjectType::from_type_name(&column(columns, "user_type_name")),
            info: column(columns, "user_info"),
            comment: column(columns, "r_comment"),
            create_time: column_time(columns, "create_ts"),
            modify_time: column_time(columns, "modify_ts"),
        }
    }
}

/// A catalog user: regular, admin or group admin
pub struct User {
    connection: WeakConnection,
    name: String,
    zone: String,
    info: Lazy<UserInfo>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

impl User {
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

    /// Home zone; the connection's zone until the user is hydrated
    #[must_use]
    pub fn zone_name(&self) -> String {
        self.info.peek().map_or_else(|| self.zone.clone(), |i| i.zone)
    }

    pub fn zone(&self) -> Result<Arc<Zone>> {
        let zone = self.hydrated()?.zone;
        self.connection()?.zone(&zone)
    }

    pub fn connection(&self) -> Result<Connection> {
        self.connection.upgrade()
    }

    /// Fetch the user's catalog columns if not yet loaded
    pub fn init(&self) -> Result<()> {
        self.hydrated().map(drop)
    }

    /// Re-fetch the user's catalog columns
    pub fn refresh(&self) -> Result<()> {
        let info = self.fetch()?;
        self.info.set(info);
        Ok(())
    }

    fn hydrated(&self) -> Result<UserInfo> {
        self.info.get_or_try_init(|| self.fetch())
    }

    fn fetch(&self) -> Result<UserInfo> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let columns = lease.run(&format!("user info {}", self.name), |s| {
            s.user_info(&self.name)
        })?;
        Ok(UserInfo::from_columns(&columns, &self.zone))
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.hydrated()?.id)
    }

    /// User, admin or group admin
    pub fn kind(&self) -> Result<ObjectType> {
        Ok(self.hydrated()?.kind)
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

    /// Groups this user belongs to, resolved through the group cache
    pub fn groups(&self) -> Result<Vec<Arc<Group>>> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let names = lease.run_rows(&format!("groups of {}", self.name), |s| {
            s.user_groups(&self.name)
        })?;
        // the catalog lists every user as a member of its own personal group
        names
            .into_iter()
            .filter(|name| *name != self.name)
            .map(|name| {
                lease.cached_group(&name)?.ok_or_else(|| {
                    Error::integrity(format!(
                        "group {name} of user {} is not in the group cache",
                        self.name
                    ))
                })
            })
            .collect()
    }

    pub fn add_to_group(&self, group: impl Into<GroupRef>) -> Result<()> {
        let group = group.into();
        let zone = self.zone_name();
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("add {} to {}", self.name, group.name()), |s| {
            s.add_to_group(&self.name, &zone, group.name())
        })?;
        info!("Added user {} to group {}", self.name, group.name());
        Ok(())
    }

    pub fn remove_from_group(&self, group: impl Into<GroupRef>) -> Result<()> {
        let group = group.into();
        let zone = self.zone_name();
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("remove {} from {}", self.name, group.name()), |s| {
            s.remove_from_group(&self.name, &zone, group.name())
        })?;
        info!("Removed user {} from group {}", self.name, group.name());
        Ok(())
    }

    pub fn change_password(&self, new_password: &str, current_password: &str) -> Result<()> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("change password of {}", self.name), |s| {
            s.change_password(&self.name, new_password, current_password)
        })?;
        info!("Changed password of user {}", self.name);
        Ok(())
    }

    /// Delete the user from the catalog and refresh the user cache
    pub fn delete(&self) -> Result<()> {
        let zone = self.zone_name();
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("delete user {}", self.name), |s| {
            s.delete_user(&self.name, &zone)
        })?;
        lease.refresh_users()?;
        info!("Deleted user {}#{}", self.name, zone);
        Ok(())
    }

    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.clone(),
                WeakAccessObject::User(Arc::downgrade(self)),
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

impl Named for User {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("zone", &self.zone_name())
            .finish_non_exhaustive()
    }
}

/// `rodsuser:name#zone`; the kind shows as `rodsuser` until hydrated
impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, zone) = self
            .info
            .peek()
            .map_or_else(|| (ObjectType::User, self.zone.clone()), |i| (i.kind, i.zone));
        write!(f, "{kind}:{}#{zone}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connect;
    use icat_common::{ErrorKind, UserType};

    #[test]
    fn test_user_hydrates_on_access() {
        let (catalog, conn) = connect();
        let rods = conn.user("rods").unwrap();
        assert_eq!(rods.to_string(), "rodsuser:rods#tempZone");
        let before = catalog.call_count("user_info");

        assert_eq!(rods.kind().unwrap(), ObjectType::Admin);
        assert!(!rods.id().unwrap().is_empty());
        rods.comment().unwrap();
        assert_eq!(catalog.call_count("user_info"), before + 1);
        assert_eq!(rods.to_string(), "rodsadmin:rods#tempZone");

        rods.refresh().unwrap();
        assert_eq!(catalog.call_count("user_info"), before + 2);
    }

    #[test]
    fn test_remote_user_zone_comes_from_catalog() {
        let (catalog, conn) = connect();
        catalog.add_remote_zone("otherZone", "other.example.org:1247");
        catalog.add_remote_user("bob", "otherZone").unwrap();
        let bob = conn
            .refresh_users()
            .unwrap()
            .into_iter()
            .find(|u| u.name() == "bob")
            .unwrap();
        assert_eq!(bob.zone_name(), "tempZone");

        bob.init().unwrap();
        assert_eq!(bob.zone_name(), "otherZone");
        assert_eq!(bob.to_string(), "rodsuser:bob#otherZone");
        assert_eq!(bob.zone().unwrap().name(), "otherZone");
    }

    #[test]
    fn test_user_groups_skip_personal_group() {
        let (catalog, conn) = connect();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        catalog.add_group("science", &["alice"]).unwrap();

        let alice = conn.user("alice").unwrap();
        let mut names: Vec<String> = alice
            .groups()
            .unwrap()
            .iter()
            .map(|g| g.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["public", "science"]);

        let science = conn.group("science").unwrap();
        assert!(alice.groups().unwrap().iter().any(|g| Arc::ptr_eq(g, &science)));
    }

    #[test]
    fn test_group_membership_changes() {
        let (catalog, conn) = connect();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        let staff = conn.create_group("staff").unwrap();
        let alice = conn.user("alice").unwrap();

        alice.add_to_group(&staff).unwrap();
        assert!(alice.groups().unwrap().iter().any(|g| g.name() == "staff"));
        alice.remove_from_group("staff").unwrap();
        assert!(!alice.groups().unwrap().iter().any(|g| g.name() == "staff"));
        assert!(alice.remove_from_group("staff").unwrap_err().is_not_found());
        assert!(alice.add_to_group("nosuch").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_refreshes_cache() {
        let (_catalog, conn) = connect();
        let bob = conn.create_user("bob", UserType::User).unwrap();
        assert_eq!(bob.kind().unwrap(), ObjectType::User);
        bob.delete().unwrap();
        assert!(!conn.users().unwrap().iter().any(|u| u.name() == "bob"));
    }

    #[test]
    fn test_change_password() {
        let (catalog, conn) = connect();
        catalog.add_user("alice", "secret", UserType::User).unwrap();
        let alice = conn.user("alice").unwrap();
        alice.change_password("n3w", "password").unwrap();

        let err = alice.change_password("again", "wrong").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_user_metadata() {
        let (_catalog, conn) = connect();
        let rods = conn.user("rods").unwrap();
        rods.add_meta("team", "ops", "").unwrap();
        assert_eq!(rods.attribute("team").unwrap()[0].value(), "ops");
        assert!(Arc::ptr_eq(&rods.meta(), &rods.meta()));
        rods.delete_meta("team").unwrap();
        assert!(rods.attribute("team").unwrap_err().is_not_found());
    }
}
