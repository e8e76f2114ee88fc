//! Storage resources

use super::{Lazy, Named, column, column_time};
use crate::connection::{Connection, WeakConnection};
use crate::meta::MetaCollection;
use crate::object::WeakAccessObject;
use chrono::{DateTime, Utc};
use icat_common::{ObjectType, ResourceClass, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct ResourceInfo {
    id: String,
    zone: String,
    class: ResourceClass,
    resource_type: String,
    host: String,
    vault_path: String,
    free_space: u64,
    info: String,
    comment: String,
    status: String,
    children: String,
    parent: String,
    object_count: u64,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
}

/// A storage resource
pub struct Resource {
    connection: WeakConnection,
    name: String,
    info: Lazy<ResourceInfo>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

impl Resource {
    pub(crate) const fn new(connection: WeakConnection, name: String) -> Self {
        Self {
            connection,
            name,
            info: Lazy::new(),
            meta: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
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

    fn hydrated(&self) -> Result<ResourceInfo> {
        self.info.get_or_try_init(|| self.fetch())
    }

    fn fetch(&self) -> Result<ResourceInfo> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let columns = lease.run(&format!("resource info {}", self.name), |s| {
            s.resource_info(&self.name)
        })?;
        Ok(ResourceInfo {
            id: column(&columns, "resc_id"),
            zone: column(&columns, "zone_name"),
            class: ResourceClass::from_catalog(&column(&columns, "resc_class_name")),
            resource_type: column(&columns, "resc_type_name"),
            host: column(&columns, "resc_net"),
            vault_path: column(&columns, "resc_def_path"),
            free_space: column(&columns, "free_space").parse().unwrap_or(0),
            info: column(&columns, "resc_info"),
            comment: column(&columns, "r_comment"),
            status: column(&columns, "resc_status"),
            children: column(&columns, "resc_children"),
            parent: column(&columns, "resc_parent"),
            object_count: column(&columns, "resc_objcount").parse().unwrap_or(0),
            create_time: column_time(&columns, "create_ts"),
            modify_time: column_time(&columns, "modify_ts"),
        })
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.hydrated()?.id)
    }

    /// Resource, or resource group when it has children
    pub fn kind(&self) -> Result<ObjectType> {
        Ok(if self.hydrated()?.children.is_empty() {
            ObjectType::Resource
        } else {
            ObjectType::ResourceGroup
        })
    }

    pub fn zone_name(&self) -> Result<String> {
        Ok(self.hydrated()?.zone)
    }

    pub fn class(&self) -> Result<ResourceClass> {
        Ok(self.hydrated()?.class)
    }

    /// Storage driver, e.g. `unixfilesystem`
    pub fn resource_type(&self) -> Result<String> {
        Ok(self.hydrated()?.resource_type)
    }

    pub fn host(&self) -> Result<String> {
        Ok(self.hydrated()?.host)
    }

    pub fn vault_path(&self) -> Result<String> {
        Ok(self.hydrated()?.vault_path)
    }

    pub fn free_space(&self) -> Result<u64> {
        Ok(self.hydrated()?.free_space)
    }

    pub fn info(&self) -> Result<String> {
        Ok(self.hydrated()?.info)
    }

    pub fn comment(&self) -> Result<String> {
        Ok(self.hydrated()?.comment)
    }

    pub fn status(&self) -> Result<String> {
        Ok(self.hydrated()?.status)
    }

    /// Child resources in hierarchy string form
    pub fn children(&self) -> Result<String> {
        Ok(self.hydrated()?.children)
    }

    pub fn parent(&self) -> Result<String> {
        Ok(self.hydrated()?.parent)
    }

    pub fn object_count(&self) -> Result<u64> {
        Ok(self.hydrated()?.object_count)
    }

    pub fn create_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.hydrated()?.create_time)
    }

    pub fn modify_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.hydrated()?.modify_time)
    }

    /// Resource metadata is not readable through the catalog; always empty
    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.clone(),
                WeakAccessObject::Resource(Arc::downgrade(self)),
            )
        }))
    }
}

impl Named for Resource {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource:{}", self.name)
    }
}
