//! Principal, zone, resource and metadata tables

use super::state::{CatalogState, fail, join, timestamp};
use crate::records::{AvuRecord, InfoMap, MetaTarget};
use crate::status::{
    CAT_INSUFFICIENT_PRIVILEGE_LEVEL, CAT_INVALID_ARGUMENT, CAT_INVALID_AUTHENTICATION, CAT_INVALID_USER, CAT_NO_ROWS_FOUND,
    CAT_UNKNOWN_COLLECTION, CAT_UNKNOWN_FILE, CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
    NativeError, NativeResult, SYS_RESC_DOES_NOT_EXIST,
};
use icat_common::UserType;

fn info_map<const N: usize>(pairs: [(&str, String); N]) -> InfoMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl CatalogState {
    // =========== Metadata ===========

    pub fn list_metadata(&self, target: &MetaTarget) -> NativeResult<Vec<AvuRecord>> {
        let key = match target {
            MetaTarget::DataObject { name, collection } => ("d".to_string(), join(collection, name)),
            MetaTarget::Collection { name, parent } => ("C".to_string(), join(parent, name)),
            MetaTarget::User { name, .. } => ("u".to_string(), name.clone()),
        };
        match self.avus.get(&key) {
            Some(avus) if !avus.is_empty() => Ok(avus.clone()),
            _ => fail(CAT_NO_ROWS_FOUND, format!("no metadata for {}", key.1)),
        }
    }

    fn require_meta_owner(&self, type_letter: &str, path: &str) -> NativeResult<()> {
        match self.entity_exists(type_letter, path) {
            Some(true) => Ok(()),
            Some(false) => {
                let status = match type_letter {
                    "d" => CAT_UNKNOWN_FILE,
                    "C" => CAT_UNKNOWN_COLLECTION,
                    "u" => CAT_INVALID_USER,
                    "R" => SYS_RESC_DOES_NOT_EXIST,
                    _ => CAT_INVALID_ARGUMENT,
                };
                fail(status, format!("no {type_letter} entity named {path}"))
            }
            None => fail(
                CAT_INVALID_ARGUMENT,
                format!("unknown metadata type {type_letter}"),
            ),
        }
    }

    pub fn add_metadata(&mut self, type_letter: &str, path: &str, avu: &AvuRecord) -> NativeResult<()> {
        self.require_meta_owner(type_letter, path)?;
        if avu.attribute.is_empty() || avu.value.is_empty() {
            return fail(CAT_INVALID_ARGUMENT, "attribute and value must be set");
        }
        let avus = self
            .avus
            .entry((type_letter.to_string(), path.to_string()))
            .or_default();
        if avus.contains(avu) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("{path} already has {}={}", avu.attribute, avu.value),
            );
        }
        avus.push(avu.clone());
        Ok(())
    }

    pub fn modify_metadata(
        &mut self,
        type_letter: &str,
        path: &str,
        old: &AvuRecord,
        new: &AvuRecord,
    ) -> NativeResult<()> {
        self.require_meta_owner(type_letter, path)?;
        if new.attribute.is_empty() || new.value.is_empty() {
            return fail(CAT_INVALID_ARGUMENT, "attribute and value must be set");
        }
        let avus = self
            .avus
            .get_mut(&(type_letter.to_string(), path.to_string()))
            .ok_or_else(|| NativeError::new(CAT_NO_ROWS_FOUND, format!("no metadata for {path}")))?;
        if old != new && avus.contains(new) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("{path} already has {}={}", new.attribute, new.value),
            );
        }
        let slot = avus.iter_mut().find(|a| *a == old).ok_or_else(|| {
            NativeError::new(
                CAT_NO_ROWS_FOUND,
                format!("{path} has no {}={}", old.attribute, old.value),
            )
        })?;
        *slot = new.clone();
        Ok(())
    }

    pub fn remove_metadata(&mut self, type_letter: &str, path: &str, avu: &AvuRecord) -> NativeResult<()> {
        let key = (type_letter.to_string(), path.to_string());
        let avus = self.avus.get_mut(&key).ok_or_else(|| {
            NativeError::new(CAT_NO_ROWS_FOUND, format!("no metadata for {path}"))
        })?;
        let before = avus.len();
        avus.retain(|a| a != avu);
        if avus.len() == before {
            return fail(
                CAT_NO_ROWS_FOUND,
                format!("{path} has no {}={}", avu.attribute, avu.value),
            );
        }
        if avus.is_empty() {
            self.avus.remove(&key);
        }
        Ok(())
    }

    // =========== Principals ===========

    pub fn list_users(&self) -> Vec<String> {
        self.principals
            .values()
            .filter(|p| !p.is_group())
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn list_groups(&self) -> Vec<String> {
        self.principals
            .values()
            .filter(|p| p.is_group())
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn user_info(&self, name: &str) -> NativeResult<InfoMap> {
        let p = self
            .principals
            .get(name)
            .ok_or_else(|| NativeError::new(CAT_INVALID_USER, format!("no user {name}")))?;
        Ok(info_map([
            ("user_id", p.id.to_string()),
            ("user_name", p.name.clone()),
            ("user_type_name", p.type_name.clone()),
            ("zone_name", p.zone.clone()),
            ("user_info", p.info.clone()),
            ("r_comment", p.comment.clone()),
            ("create_ts", timestamp(p.create_ts)),
            ("modify_ts", timestamp(p.modify_ts)),
        ]))
    }

    pub fn zone_info(&self, name: &str) -> NativeResult<InfoMap> {
        let z = self
            .zones
            .get(name)
            .ok_or_else(|| NativeError::new(CAT_NO_ROWS_FOUND, format!("no zone {name}")))?;
        Ok(info_map([
            ("zone_id", z.id.to_string()),
            ("zone_name", name.to_string()),
            ("zone_type_name", z.zone_type.to_string()),
            ("zone_conn_string", z.conn_string.clone()),
            ("r_comment", z.comment.clone()),
            ("create_ts", timestamp(z.create_ts)),
            ("modify_ts", timestamp(z.modify_ts)),
        ]))
    }

    pub fn resource_info(&self, name: &str) -> NativeResult<InfoMap> {
        let r = self.resources.get(name).ok_or_else(|| {
            NativeError::new(SYS_RESC_DOES_NOT_EXIST, format!("no resource {name}"))
        })?;
        Ok(info_map([
            ("resc_id", r.id.to_string()),
            ("resc_name", name.to_string()),
            ("zone_name", self.zone.clone()),
            ("resc_type_name", r.type_name.clone()),
            ("resc_class_name", r.class.to_string()),
            ("resc_net", r.host.clone()),
            ("resc_def_path", r.vault.clone()),
            ("free_space", r.free_space.to_string()),
            ("resc_info", String::new()),
            ("r_comment", r.comment.clone()),
            ("resc_status", "up".to_string()),
            ("resc_children", r.children.clone()),
            ("resc_parent", r.parent.clone()),
            ("resc_objcount", self.replica_count(name).to_string()),
            ("create_ts", timestamp(r.create_ts)),
            ("modify_ts", timestamp(r.modify_ts)),
        ]))
    }

    /// Groups a user belongs to, including the per-user group of its own name
    pub fn user_groups(&self, name: &str) -> NativeResult<Vec<String>> {
        if !self.principals.contains_key(name) {
            return fail(CAT_INVALID_USER, format!("no user {name}"));
        }
        let mut groups: Vec<String> = self
            .memberships
            .iter()
            .filter(|(_, members)| members.contains(name))
            .map(|(group, _)| group.clone())
            .collect();
        groups.push(name.to_string());
        Ok(groups)
    }

    pub fn group_members(&self, name: &str) -> NativeResult<Vec<String>> {
        match self.principals.get(name) {
            Some(p) if p.is_group() => Ok(self
                .memberships
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|m| self.principals.get(m))
                .map(|m| format!("{}#{}", m.name, m.zone))
                .collect()),
            _ => fail(CAT_INVALID_USER, format!("no group {name}")),
        }
    }

    pub fn require_admin(&self, user: &str) -> NativeResult<()> {
        match self.principals.get(user) {
            Some(p) if p.type_name == "rodsadmin" => Ok(()),
            _ => fail(
                CAT_INSUFFICIENT_PRIVILEGE_LEVEL,
                format!("{user} is not an administrator"),
            ),
        }
    }

    fn require_local_zone(&self, zone: &str) -> NativeResult<()> {
        if zone.is_empty() || zone == self.zone {
            Ok(())
        } else {
            fail(CAT_INVALID_ARGUMENT, format!("zone {zone} is not local"))
        }
    }

    pub fn create_user(&mut self, name: &str, zone: &str, user_type: UserType) -> NativeResult<()> {
        self.require_local_zone(zone)?;
        if self.principals.contains_key(name) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("user {name} already exists"),
            );
        }
        self.insert_principal(name, &user_type.to_string(), "");
        self.create_home(name);
        Ok(())
    }

    pub fn create_group(&mut self, name: &str, zone: &str) -> NativeResult<()> {
        self.require_local_zone(zone)?;
        if self.principals.contains_key(name) {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("group {name} already exists"),
            );
        }
        self.insert_principal(name, "rodsgroup", "");
        Ok(())
    }

    /// Delete a user (`group == false`) or group
    pub fn delete_principal(&mut self, name: &str, zone: &str, group: bool) -> NativeResult<()> {
        self.require_local_zone(zone)?;
        match self.principals.get(name) {
            Some(p) if p.is_group() == group => {}
            _ => return fail(CAT_INVALID_USER, format!("no such principal {name}")),
        }
        self.principals.remove(name);
        if group {
            self.memberships.remove(name);
        } else {
            for members in self.memberships.values_mut() {
                members.remove(name);
            }
        }
        self.forget_principal(name);
        Ok(())
    }

    pub fn add_to_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()> {
        self.require_local_zone(zone)?;
        self.require_membership_pair(user, group)?;
        if !self
            .memberships
            .entry(group.to_string())
            .or_default()
            .insert(user.to_string())
        {
            return fail(
                CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME,
                format!("{user} is already in {group}"),
            );
        }
        Ok(())
    }

    pub fn remove_from_group(&mut self, user: &str, zone: &str, group: &str) -> NativeResult<()> {
        self.require_local_zone(zone)?;
        self.require_membership_pair(user, group)?;
        let removed = self
            .memberships
            .get_mut(group)
            .is_some_and(|members| members.remove(user));
        if removed {
            Ok(())
        } else {
            fail(CAT_INVALID_USER, format!("{user} is not in {group}"))
        }
    }

    fn require_membership_pair(&self, user: &str, group: &str) -> NativeResult<()> {
        match (self.principals.get(user), self.principals.get(group)) {
            (Some(u), Some(g)) if !u.is_group() && g.is_group() => Ok(()),
            (Some(u), _) if !u.is_group() => fail(CAT_INVALID_USER, format!("no group {group}")),
            _ => fail(CAT_INVALID_USER, format!("no user {user}")),
        }
    }

    /// `current` is the caller's own password; admins may change anyone's
    pub fn change_password(
        &mut self,
        caller: &str,
        user: &str,
        new: &str,
        current: &str,
    ) -> NativeResult<()> {
        let caller_ok = self
            .principals
            .get(caller)
            .is_some_and(|p| p.password == current);
        if !caller_ok {
            return fail(CAT_INVALID_AUTHENTICATION, "current password does not match");
        }
        if caller != user {
            self.require_admin(caller)?;
        }
        let now = self.tick();
        let target = self
            .principals
            .get_mut(user)
            .filter(|p| !p.is_group())
            .ok_or_else(|| NativeError::new(CAT_INVALID_USER, format!("no user {user}")))?;
        target.password = new.to_string();
        target.modify_ts = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CatalogState {
        CatalogState::new("localhost", 1247, "tempZone", "rods", "password")
    }

    #[test]
    fn test_metadata_lifecycle() {
        let mut s = state();
        let target = MetaTarget::Collection {
            name: "rods".to_string(),
            parent: "/tempZone/home".to_string(),
        };
        assert!(s.list_metadata(&target).unwrap_err().is_no_rows());

        let avu = AvuRecord::new("k", "v", "");
        s.add_metadata("C", "/tempZone/home/rods", &avu).unwrap();
        let err = s.add_metadata("C", "/tempZone/home/rods", &avu).unwrap_err();
        assert_eq!(err.status, CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME);
        assert_eq!(s.list_metadata(&target).unwrap(), vec![avu.clone()]);

        let new = AvuRecord::new("k", "v2", "u");
        s.modify_metadata("C", "/tempZone/home/rods", &avu, &new).unwrap();
        assert_eq!(s.list_metadata(&target).unwrap(), vec![new.clone()]);

        s.remove_metadata("C", "/tempZone/home/rods", &new).unwrap();
        assert!(s.list_metadata(&target).unwrap_err().is_no_rows());
    }

    #[test]
    fn test_metadata_owner_must_exist() {
        let mut s = state();
        let avu = AvuRecord::new("k", "v", "");
        let err = s.add_metadata("d", "/tempZone/home/rods/none", &avu).unwrap_err();
        assert_eq!(err.status, CAT_UNKNOWN_FILE);
        let err = s.add_metadata("x", "/tempZone", &avu).unwrap_err();
        assert_eq!(err.status, CAT_INVALID_ARGUMENT);
        let err = s
            .add_metadata("C", "/tempZone/home/rods", &AvuRecord::new("", "v", ""))
            .unwrap_err();
        assert_eq!(err.status, CAT_INVALID_ARGUMENT);
    }

    #[test]
    fn test_users_and_groups() {
        let mut s = state();
        s.create_user("alice", "tempZone", UserType::User).unwrap();
        s.create_group("staff", "").unwrap();
        s.add_to_group("alice", "tempZone", "staff").unwrap();

        assert_eq!(s.list_users(), vec!["alice", "rods"]);
        assert_eq!(s.list_groups(), vec!["public", "staff"]);
        assert_eq!(s.group_members("staff").unwrap(), vec!["alice#tempZone"]);
        assert_eq!(
            s.user_groups("alice").unwrap(),
            vec!["public", "staff", "alice"]
        );
        assert!(s.contains("/tempZone/home/alice"));

        let err = s.add_to_group("alice", "tempZone", "staff").unwrap_err();
        assert_eq!(err.status, CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME);

        s.remove_from_group("alice", "tempZone", "staff").unwrap();
        assert!(s.group_members("staff").unwrap().is_empty());

        s.delete_principal("staff", "tempZone", true).unwrap();
        assert_eq!(s.list_groups(), vec!["public"]);
        assert!(s.delete_principal("alice", "tempZone", true).is_err());
    }

    #[test]
    fn test_info_maps() {
        let s = state();
        let user = s.user_info("rods").unwrap();
        assert_eq!(user["user_type_name"], "rodsadmin");
        assert_eq!(user["zone_name"], "tempZone");

        let zone = s.zone_info("tempZone").unwrap();
        assert_eq!(zone["zone_type_name"], "local");
        assert_eq!(zone["zone_conn_string"], "localhost:1247");

        let resc = s.resource_info("demoResc").unwrap();
        assert_eq!(resc["resc_class_name"], "cache");
        assert_eq!(resc["resc_def_path"], "/var/lib/irods/Vault");
        assert_eq!(
            s.resource_info("nope").unwrap_err().status,
            SYS_RESC_DOES_NOT_EXIST
        );
    }

    #[test]
    fn test_change_password() {
        let mut s = state();
        s.create_user("alice", "tempZone", UserType::User).unwrap();
        s.change_password("rods", "alice", "secret", "password")
            .unwrap();
        assert_eq!(s.principals["alice"].password, "secret");

        let err = s
            .change_password("alice", "rods", "x", "secret")
            .unwrap_err();
        assert_eq!(err.status, CAT_INSUFFICIENT_PRIVILEGE_LEVEL);

        let err = s
            .change_password("alice", "alice", "y", "wrong")
            .unwrap_err();
        assert_eq!(err.status, CAT_INVALID_AUTHENTICATION);
    }
}
