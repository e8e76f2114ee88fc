//! Options for opening and creating namespace nodes

use crate::principal::ResourceRef;

/// Options for [`crate::Connection::collection`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Absolute collection path
    pub path: String,
    /// Hydrate the whole subtree
    pub recursive: bool,
    /// List every replica of replicated data objects
    pub get_replicas: bool,
}

impl CollectionOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub const fn get_replicas(mut self, get_replicas: bool) -> Self {
        self.get_replicas = get_replicas;
        self
    }
}

/// Options for creating, uploading or copying a data object
#[derive(Clone, Debug, Default)]
pub struct DataObjOptions {
    /// Name of the new data object; for `put` and `copy_to_with` empty
    /// keeps the source name
    pub name: String,
    /// Expected size in bytes
    pub size: u64,
    /// Unix mode; zero uses the catalog default
    pub mode: u32,
    /// Overwrite an existing data object
    pub force: bool,
    /// Target resource; `None` uses the catalog default
    pub resource: Option<ResourceRef>,
}

impl DataObjOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<ResourceRef>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub(crate) fn resource_name(&self) -> &str {
        self.resource.as_ref().map_or("", ResourceRef::name)
    }
}

/// Options for [`crate::DataObject::trim_replicas`]
#[derive(Clone, Debug)]
pub struct TrimOptions {
    /// Only trim replicas on this resource
    pub resource: Option<ResourceRef>,
    /// Number of replicas to keep
    pub keep: u32,
    /// Only trim replicas at least this old
    pub min_age_minutes: u32,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            resource: None,
            keep: 2,
            min_age_minutes: 0,
        }
    }
}
