//! Catalog zones

use super::{Lazy, Named, column, column_time};
use crate::connection::{Connection, WeakConnection};
use crate::meta::MetaCollection;
use crate::object::WeakAccessObject;
use chrono::{DateTime, Utc};
use icat_common::{Result, ZoneType};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct ZoneInfo {
    id: String,
    zone_type: ZoneType,
    connection_info: String,
    comment: String,
    create_time: DateTime<Utc>,
    modify_time: DateTime<Utc>,
}

/// A local or federated zone
pub struct Zone {
    connection: WeakConnection,
    name: String,
    info: Lazy<ZoneInfo>,
    meta: Mutex<Option<Arc<MetaCollection>>>,
}

impl Zone {
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

    fn hydrated(&self) -> Result<ZoneInfo> {
        self.info.get_or_try_init(|| self.fetch())
    }

    fn fetch(&self) -> Result<ZoneInfo> {
        let connection = self.connection()?;
        let mut lease = connection.borrow()?;
        let columns = lease.run(&format!("zone info {}", self.name), |s| {
            s.zone_info(&self.name)
        })?;
        Ok(ZoneInfo {
            id: column(&columns, "zone_id"),
            zone_type: ZoneType::from_catalog(&column(&columns, "zone_type_name")),
            connection_info: column(&columns, "zone_conn_string"),
            comment: column(&columns, "r_comment"),
            create_time: column_time(&columns, "create_ts"),
            modify_time: column_time(&columns, "modify_ts"),
        })
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.hydrated()?.id)
    }

    pub fn zone_type(&self) -> Result<ZoneType> {
        Ok(self.hydrated()?.zone_type)
    }

    /// `host:port` of a federated zone
    pub fn connection_info(&self) -> Result<String> {
        Ok(self.hydrated()?.connection_info)
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

    /// Zone metadata is not readable through the catalog; always empty
    pub fn meta(self: &Arc<Self>) -> Arc<MetaCollection> {
        let mut slot = self.meta.lock();
        Arc::clone(slot.get_or_insert_with(|| {
            MetaCollection::new(
                self.connection.clone(),
                WeakAccessObject::Zone(Arc::downgrade(self)),
            )
        }))
    }
}

impl Named for Zone {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone:{}", self.name)
    }
}
