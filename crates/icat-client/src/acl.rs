//! Access control entries

use crate::connection::Lease;
use crate::object::AccessObject;
use crate::principal::{Group, User};
use icat_common::{AccessLevel, Error, ObjectType, Result};
use icat_native::AclRecord;
use std::fmt;
use std::sync::Arc;

/// One access grant on a collection or data object
#[derive(Clone, Debug)]
pub struct Acl {
    access_object: AccessObject,
    level: AccessLevel,
    kind: ObjectType,
}

impl Acl {
    #[must_use]
    pub const fn new(access_object: AccessObject, level: AccessLevel, kind: ObjectType) -> Self {
        Self {
            access_object,
            level,
            kind,
        }
    }

    #[must_use]
    pub const fn access_object(&self) -> &AccessObject {
        &self.access_object
    }

    #[must_use]
    pub const fn level(&self) -> AccessLevel {
        self.level
    }

    /// User, admin, group admin or group
    #[must_use]
    pub const fn kind(&self) -> ObjectType {
        self.kind
    }

    #[must_use]
    pub const fn user(&self) -> Option<&Arc<User>> {
        match &self.access_object {
            AccessObject::User(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub const fn group(&self) -> Option<&Arc<Group>> {
        match &self.access_object {
            AccessObject::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// `kind:name#zone:level`
impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}:{}",
            self.kind,
            self.access_object.name(),
            self.access_object.zone().unwrap_or_default(),
            self.level
        )
    }
}

/// Translate catalog records, resolving principals through the cache
///
/// Every principal must already be cached; a miss or an unknown kind is
/// an integrity error. Admins and group admins appear with the `rodsuser`
/// kind; the full type stays on the [`User`](crate::User).
pub(crate) fn resolve(lease: &mut Lease<'_>, records: Vec<AclRecord>) -> Result<Vec<Acl>> {
    records
        .into_iter()
        .map(|record| {
            let kind = ObjectType::from_type_name(&record.user_type);
            let level = AccessLevel::from_catalog(&record.access);
            let access_object = if kind.is_user() {
                lease.cached_user(&record.name)?.map(AccessObject::User)
            } else if kind == ObjectType::Group {
                lease.cached_group(&record.name)?.map(AccessObject::Group)
            } else {
                return Err(Error::integrity(format!(
                    "ACL entry for {} has unknown kind {:?}",
                    record.name, record.user_type
                )));
            };
            let access_object = access_object.ok_or_else(|| {
                Error::integrity(format!(
                    "ACL principal {}#{} is not in the cache",
                    record.name, record.zone
                ))
            })?;
            let kind = if kind.is_user() { ObjectType::User } else { kind };
            Ok(Acl::new(access_object, level, kind))
        })
        .collect()
}
