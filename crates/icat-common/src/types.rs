//! Core type definitions for the iCAT client
//!
//! Closed enumerations for access levels, entity kinds and principal
//! classifications, along with their catalog string renderings.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Access level granted by an ACL entry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    #[display("null")]
    Null,
    #[display("read")]
    Read,
    #[display("write")]
    Write,
    #[display("own")]
    Own,
}

impl AccessLevel {
    /// Translate the catalog's access name (`own`, `modify object`,
    /// `read object`); anything else is `Null`.
    #[must_use]
    pub fn from_catalog(access: &str) -> Self {
        match access {
            "own" => Self::Own,
            "modify object" => Self::Write,
            "read object" => Self::Read,
            _ => Self::Null,
        }
    }

    /// Name used by the catalog when storing this level
    #[must_use]
    pub const fn catalog_name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Read => "read object",
            Self::Write => "modify object",
            Self::Own => "own",
        }
    }
}

/// Kind of entity: namespace nodes, principals and storage
///
/// Principal variants render as the catalog's user type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ObjectType {
    #[display("dataObj")]
    DataObject,
    #[display("collection")]
    Collection,
    #[display("zone")]
    Zone,
    #[display("resource")]
    Resource,
    #[display("resourceGroup")]
    ResourceGroup,
    #[display("rodsuser")]
    User,
    #[display("rodsadmin")]
    Admin,
    #[display("groupadmin")]
    GroupAdmin,
    #[display("rodsgroup")]
    Group,
    #[display("unknown")]
    Unknown,
}

impl ObjectType {
    /// Parse a catalog user type name; unrecognized names are `Unknown`
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "rodsuser" => Self::User,
            "rodsadmin" => Self::Admin,
            "groupadmin" => Self::GroupAdmin,
            "rodsgroup" => Self::Group,
            _ => Self::Unknown,
        }
    }

    /// Short type letter used to address metadata and ACL calls
    ///
    /// `None` for [`ObjectType::Unknown`], which has no catalog address.
    #[must_use]
    pub const fn short_type(self) -> Option<&'static str> {
        match self {
            Self::DataObject => Some("d"),
            Self::Collection => Some("C"),
            Self::Zone => Some("Z"),
            Self::Resource | Self::ResourceGroup => Some("R"),
            Self::User | Self::Admin | Self::GroupAdmin | Self::Group => Some("u"),
            Self::Unknown => None,
        }
    }

    /// User, admin or group-admin
    #[must_use]
    pub const fn is_user(self) -> bool {
        matches!(self, Self::User | Self::Admin | Self::GroupAdmin)
    }

    /// Any principal kind, users and groups alike
    #[must_use]
    pub const fn is_principal(self) -> bool {
        self.is_user() || matches!(self, Self::Group)
    }
}

/// Type assigned to a new user account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum UserType {
    #[default]
    #[display("rodsuser")]
    User,
    #[display("rodsadmin")]
    Admin,
    #[display("groupadmin")]
    GroupAdmin,
}

impl UserType {
    /// The entity kind a user of this type reports
    #[must_use]
    pub const fn object_type(self) -> ObjectType {
        match self {
            Self::User => ObjectType::User,
            Self::Admin => ObjectType::Admin,
            Self::GroupAdmin => ObjectType::GroupAdmin,
        }
    }
}

impl TryFrom<ObjectType> for UserType {
    type Error = crate::error::Error;

    fn try_from(kind: ObjectType) -> crate::error::Result<Self> {
        match kind {
            ObjectType::User => Ok(Self::User),
            ObjectType::Admin => Ok(Self::Admin),
            ObjectType::GroupAdmin => Ok(Self::GroupAdmin),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown user type {other}"
            ))),
        }
    }
}

/// Local or federated zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ZoneType {
    #[default]
    #[display("local")]
    Local,
    #[display("remote")]
    Remote,
}

impl ZoneType {
    #[must_use]
    pub fn from_catalog(name: &str) -> Self {
        if name == "remote" {
            Self::Remote
        } else {
            Self::Local
        }
    }
}

/// Storage class of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ResourceClass {
    #[display("cache")]
    Cache,
    #[display("archive")]
    Archive,
    #[default]
    #[display("unknown")]
    Unknown,
}

impl ResourceClass {
    #[must_use]
    pub fn from_catalog(name: &str) -> Self {
        match name {
            "cache" => Self::Cache,
            "archive" => Self::Archive,
            _ => Self::Unknown,
        }
    }
}

/// Parse a catalog timestamp (zero-padded unix seconds, e.g. `01471441907`)
///
/// Unparseable values yield the unix epoch.
#[must_use]
pub fn parse_catalog_time(ts: &str) -> DateTime<Utc> {
    ts.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default()
}

/// Render a time the way the catalog stores it (11-digit zero padded)
#[must_use]
pub fn format_catalog_time(time: DateTime<Utc>) -> String {
    format!("{:011}", time.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_from_catalog() {
        assert_eq!(AccessLevel::from_catalog("own"), AccessLevel::Own);
        assert_eq!(AccessLevel::from_catalog("modify object"), AccessLevel::Write);
        assert_eq!(AccessLevel::from_catalog("read object"), AccessLevel::Read);
        assert_eq!(AccessLevel::from_catalog("delete object"), AccessLevel::Null);
        assert_eq!(AccessLevel::Own.to_string(), "own");
        assert_eq!(AccessLevel::Write.catalog_name(), "modify object");
    }

    #[test]
    fn test_object_type_short_type() {
        assert_eq!(ObjectType::DataObject.short_type(), Some("d"));
        assert_eq!(ObjectType::Collection.short_type(), Some("C"));
        assert_eq!(ObjectType::Zone.short_type(), Some("Z"));
        assert_eq!(ObjectType::Resource.short_type(), Some("R"));
        for t in [
            ObjectType::User,
            ObjectType::Admin,
            ObjectType::GroupAdmin,
            ObjectType::Group,
        ] {
            assert_eq!(t.short_type(), Some("u"));
        }
        assert_eq!(ObjectType::Unknown.short_type(), None);
    }

    #[test]
    fn test_object_type_names() {
        assert_eq!(ObjectType::from_type_name("rodsuser"), ObjectType::User);
        assert_eq!(ObjectType::from_type_name("rodsgroup"), ObjectType::Group);
        assert_eq!(ObjectType::from_type_name("bogus"), ObjectType::Unknown);
        assert_eq!(ObjectType::User.to_string(), "rodsuser");
        assert_eq!(ObjectType::GroupAdmin.to_string(), "groupadmin");
        assert!(ObjectType::Admin.is_user());
        assert!(!ObjectType::Group.is_user());
        assert!(ObjectType::Group.is_principal());
    }

    #[test]
    fn test_user_type() {
        assert_eq!(UserType::Admin.to_string(), "rodsadmin");
        assert_eq!(UserType::GroupAdmin.object_type(), ObjectType::GroupAdmin);
        assert_eq!(UserType::try_from(ObjectType::User).unwrap(), UserType::User);
        let err = UserType::try_from(ObjectType::Group).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_catalog_time() {
        let t = parse_catalog_time("01471441907");
        assert_eq!(t.timestamp(), 1_471_441_907);
        assert_eq!(format_catalog_time(t), "01471441907");
        assert_eq!(parse_catalog_time("").timestamp(), 0);
    }
}
