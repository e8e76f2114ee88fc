//! Principals and storage: users, groups, zones and resources
//!
//! Each is created knowing only its name. Catalog columns are fetched on
//! the first attribute access and kept until `refresh()`.

mod group;
mod resource;
mod user;
mod zone;

pub use group::Group;
pub use resource::Resource;
pub use user::User;
pub use zone::Zone;

use chrono::{DateTime, Utc};
use icat_common::{Result, parse_catalog_time};
use icat_native::InfoMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cache entries are keyed by name
pub(crate) trait Named {
    fn name(&self) -> &str;
}

/// Catalog columns fetched on first use
pub(crate) struct Lazy<T>(RwLock<Option<T>>);

impl<T: Clone> Lazy<T> {
    pub(crate) const fn new() -> Self {
        Self(RwLock::new(None))
    }

    pub(crate) fn get_or_try_init(&self, fetch: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(value) = self.0.read().as_ref() {
            return Ok(value.clone());
        }
        let value = fetch()?;
        *self.0.write() = Some(value.clone());
        Ok(value)
    }

    pub(crate) fn set(&self, value: T) {
        *self.0.write() = Some(value);
    }

    pub(crate) fn peek(&self) -> Option<T> {
        self.0.read().clone()
    }
}

pub(crate) fn column(info: &InfoMap, key: &str) -> String {
    info.get(key).cloned().unwrap_or_default()
}

pub(crate) fn column_time(info: &InfoMap, key: &str) -> DateTime<Utc> {
    parse_catalog_time(info.get(key).map_or("", String::as_str))
}

/// Generates an argument enum accepting either a name or a cached handle
macro_rules! name_or_handle {
    ($(#[$doc:meta])* $name:ident, $variant:ident($ty:ty)) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub enum $name {
            Name(String),
            $variant(Arc<$ty>),
        }

        impl $name {
            #[must_use]
            pub fn name(&self) -> &str {
                match self {
                    Self::Name(name) => name,
                    Self::$variant(handle) => handle.name(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::Name(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self::Name(name)
            }
        }

        impl From<Arc<$ty>> for $name {
            fn from(handle: Arc<$ty>) -> Self {
                Self::$variant(handle)
            }
        }

        impl From<&Arc<$ty>> for $name {
            fn from(handle: &Arc<$ty>) -> Self {
                Self::$variant(Arc::clone(handle))
            }
        }
    };
}

name_or_handle!(
    /// A user given by name or handle
    UserRef,
    User(User)
);
name_or_handle!(
    /// A group given by name or handle
    GroupRef,
    Group(Group)
);
name_or_handle!(
    /// A resource given by name or handle
    ResourceRef,
    Resource(Resource)
);

/// The principal an ACL change applies to
#[derive(Clone, Debug)]
pub enum PrincipalRef {
    Name(String),
    User(Arc<User>),
    Group(Arc<Group>),
}

impl PrincipalRef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::User(user) => user.name(),
            Self::Group(group) => group.name(),
        }
    }

    /// Zone of a principal handle; `None` for bare names
    #[must_use]
    pub fn zone(&self) -> Option<String> {
        match self {
            Self::Name(_) => None,
            Self::User(user) => Some(user.zone_name()),
            Self::Group(group) => Some(group.zone_name().to_string()),
        }
    }
}

impl From<&str> for PrincipalRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PrincipalRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<User>> for PrincipalRef {
    fn from(user: Arc<User>) -> Self {
        Self::User(user)
    }
}

impl From<&Arc<User>> for PrincipalRef {
    fn from(user: &Arc<User>) -> Self {
        Self::User(Arc::clone(user))
    }
}

impl From<Arc<Group>> for PrincipalRef {
    fn from(group: Arc<Group>) -> Self {
        Self::Group(group)
    }
}

impl From<&Arc<Group>> for PrincipalRef {
    fn from(group: &Arc<Group>) -> Self {
        Self::Group(Arc::clone(group))
    }
}
