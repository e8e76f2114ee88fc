//! Attribute-value-units metadata
//!
//! A [`MetaCollection`] holds the AVU triples of one owner. It is read
//! lazily on first access and fully re-read after every successful
//! mutation. Reads are dispatched by owner kind; resources and zones have
//! no catalog read and always present an empty set.

use crate::connection::WeakConnection;
use crate::object::{AccessObject, WeakAccessObject};
use crate::path;
use icat_common::{Error, Result};
use icat_native::{AvuRecord, MetaTarget, NativeResult, NativeSession};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::info;

/// One metadata triple
#[derive(Clone, Debug)]
pub struct Meta {
    attribute: String,
    value: String,
    units: String,
    collection: Weak<MetaCollection>,
}

impl Meta {
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn units(&self) -> &str {
        &self.units
    }

    /// The owning metadata collection
    pub fn collection(&self) -> Result<Arc<MetaCollection>> {
        self.collection
            .upgrade()
            .ok_or_else(|| Error::closed("metadata collection has been dropped"))
    }

    fn record(&self) -> AvuRecord {
        AvuRecord::new(&self.attribute, &self.value, &self.units)
    }

    /// Replace the whole triple; a no-op when nothing changes
    pub fn set_all(&mut self, attribute: &str, value: &str, units: &str) -> Result<()> {
        if attribute == self.attribute && value == self.value && units == self.units {
            return Ok(());
        }
        let new = AvuRecord::new(attribute, value, units);
        self.collection()?.modify(&self.record(), &new)?;
        self.attribute = new.attribute;
        self.value = new.value;
        self.units = new.units;
        Ok(())
    }

    pub fn set_value(&mut self, value: &str) -> Result<()> {
        let (attribute, units) = (self.attribute.clone(), self.units.clone());
        self.set_all(&attribute, value, &units)
    }

    pub fn set_units(&mut self, units: &str) -> Result<()> {
        let (attribute, value) = (self.attribute.clone(), self.value.clone());
        self.set_all(&attribute, &value, units)
    }

    /// Set value and units
    pub fn set(&mut self, value: &str, units: &str) -> Result<()> {
        let attribute = self.attribute.clone();
        self.set_all(&attribute, value, units)
    }

    pub fn rename(&mut self, attribute: &str) -> Result<()> {
        let (value, units) = (self.value.clone(), self.units.clone());
        self.set_all(attribute, &value, &units)
    }

    /// Remove this triple from its owner
    pub fn delete(&self) -> Result<()> {
        self.collection()?.remove(&self.record())
    }
}

/// Triples compare by content, not by owner
impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute && self.value == other.value && self.units == other.units
    }
}

impl Eq for Meta {}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (unit: {})", self.attribute, self.value, self.units)
    }
}

/// The metadata of one owner
pub struct MetaCollection {
    connection: WeakConnection,
    owner: WeakAccessObject,
    metas: RwLock<Option<Vec<Meta>>>,
    this: Weak<Self>,
}

impl MetaCollection {
    pub(crate) fn new(connection: WeakConnection, owner: WeakAccessObject) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            connection,
            owner,
            metas: RwLock::new(None),
            this: this.clone(),
        })
    }

    pub fn owner(&self) -> Result<AccessObject> {
        self.owner.upgrade()
    }

    /// Read the triples if not yet loaded
    pub fn init(&self) -> Result<()> {
        if self.metas.read().is_none() {
            self.refresh()?;
        }
        Ok(())
    }

    /// Re-read every triple of the owner
    pub fn refresh(&self) -> Result<()> {
        let owner = self.owner()?;
        let records = match read_target(&owner)? {
            Some(target) => {
                let connection = self.connection.upgrade()?;
                let mut lease = connection.borrow()?;
                lease.run_rows(&format!("read metadata of {}", owner.path()), |s| {
                    s.list_metadata(&target)
                })?
            }
            None => Vec::new(),
        };
        let metas = records
            .into_iter()
            .map(|avu| Meta {
                attribute: avu.attribute,
                value: avu.value,
                units: avu.units,
                collection: self.this.clone(),
            })
            .collect();
        *self.metas.write() = Some(metas);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<Meta>> {
        self.init()?;
        Ok(self.metas.read().clone().unwrap_or_default())
    }

    /// Every triple with this attribute; none is `NotFound`
    pub fn get(&self, attribute: &str) -> Result<Vec<Meta>> {
        let matches: Vec<Meta> = self
            .all()?
            .into_iter()
            .filter(|m| m.attribute == attribute)
            .collect();
        if matches.is_empty() {
            return Err(Error::not_found(format!(
                "no metadata with attribute {attribute}"
            )));
        }
        Ok(matches)
    }

    /// The first triple with this attribute
    pub fn first(&self, attribute: &str) -> Result<Meta> {
        self.all()?
            .into_iter()
            .find(|m| m.attribute == attribute)
            .ok_or_else(|| Error::not_found(format!("no metadata with attribute {attribute}")))
    }

    /// Attach a triple and return it as re-read from the catalog
    pub fn add(&self, attribute: &str, value: &str, units: &str) -> Result<Meta> {
        if attribute.is_empty() || value.is_empty() {
            return Err(Error::invalid_argument(
                "metadata attribute and value must not be empty",
            ));
        }
        if self
            .all()?
            .iter()
            .any(|m| m.attribute == attribute && m.value == value)
        {
            return Err(Error::duplicate(format!(
                "metadata {attribute}={value} already exists"
            )));
        }

        let owner = self.owner()?;
        let avu = AvuRecord::new(attribute, value, units);
        self.with_lease(&owner, "add metadata to", |s, letter, path| {
            s.add_metadata(letter, path, &avu)
        })?;
        info!("Added metadata {}={} to {}", attribute, value, owner.path());
        self.refresh()?;

        self.all()?
            .into_iter()
            .find(|m| m.attribute == attribute && m.value == value && m.units == units)
            .ok_or_else(|| Error::not_found(format!("metadata {attribute}={value} missing after add")))
    }

    /// Remove every triple with this attribute
    pub fn delete(&self, attribute: &str) -> Result<()> {
        let matches = self.get(attribute)?;
        let owner = self.owner()?;
        for meta in &matches {
            let avu = meta.record();
            self.with_lease(&owner, "remove metadata from", |s, letter, path| {
                s.remove_metadata(letter, path, &avu)
            })?;
        }
        info!("Deleted metadata {} from {}", attribute, owner.path());
        self.refresh()
    }

    fn modify(&self, old: &AvuRecord, new: &AvuRecord) -> Result<()> {
        let owner = self.owner()?;
        self.with_lease(&owner, "modify metadata of", |s, letter, path| {
            s.modify_metadata(letter, path, old, new)
        })?;
        self.refresh()
    }

    fn remove(&self, avu: &AvuRecord) -> Result<()> {
        let owner = self.owner()?;
        self.with_lease(&owner, "remove metadata from", |s, letter, path| {
            s.remove_metadata(letter, path, avu)
        })?;
        self.refresh()
    }

    fn with_lease(
        &self,
        owner: &AccessObject,
        op: &str,
        call: impl FnOnce(&mut dyn NativeSession, &str, &str) -> NativeResult<()>,
    ) -> Result<()> {
        let path = owner.path();
        let letter = owner.short_type();
        let connection = self.connection.upgrade()?;
        let mut lease = connection.borrow()?;
        lease.run(&format!("{op} {path}"), |s| call(s, letter, &path))
    }
}

/// Listing target for an owner; `None` for owners the catalog cannot list
fn read_target(owner: &AccessObject) -> Result<Option<MetaTarget>> {
    Ok(match owner {
        AccessObject::DataObject(d) => {
            let path = d.path();
            Some(MetaTarget::DataObject {
                name: path::name_of(&path).to_string(),
                collection: path::parent_of(&path).to_string(),
            })
        }
        AccessObject::Collection(c) => {
            let path = c.path();
            Some(MetaTarget::Collection {
                name: path::name_of(&path).to_string(),
                parent: path::parent_of(&path).to_string(),
            })
        }
        AccessObject::User(_) | AccessObject::Group(_) => Some(MetaTarget::User {
            name: owner.name(),
            zone: owner.connection()?.zone_name().to_string(),
        }),
        AccessObject::Resource(_) | AccessObject::Zone(_) => None,
    })
}

impl fmt::Debug for MetaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaCollection")
            .field("metas", &self.metas.read())
            .finish_non_exhaustive()
    }
}

/// `Metadata: <owner path>` then one tab-indented line per loaded triple
impl fmt::Display for MetaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.owner.upgrade().map(|o| o.path()).unwrap_or_default();
        writeln!(f, "Metadata: {path}")?;
        for meta in self.metas.read().iter().flatten() {
            writeln!(f, "\t{meta}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::connect;
    use icat_common::ErrorKind;

    #[test]
    fn test_add_get_delete() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object("/tempZone/home/rods/hello.txt").unwrap();
        let meta = hello.meta();
        assert!(meta.all().unwrap().is_empty());

        let added = meta.add("k", "v", "").unwrap();
        let found = meta.get("k").unwrap();
        assert_eq!(found, vec![added.clone()]);
        assert_eq!(meta.first("k").unwrap(), added);

        meta.delete("k").unwrap();
        assert_eq!(meta.get("k").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(meta.first("k").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_add_is_unique_by_attribute_and_value() {
        let (_catalog, conn) = connect();
        let home = conn.collection_by_path("/tempZone/home/rods").unwrap();
        let meta = home.meta();
        let t = meta.add("project", "alpha", "id").unwrap();
        assert!(meta.all().unwrap().contains(&t));
        let count = meta
            .all()
            .unwrap()
            .iter()
            .filter(|m| m.attribute() == "project" && m.value() == "alpha")
            .count();
        assert_eq!(count, 1);

        let err = meta.add("project", "alpha", "other").unwrap_err();
        assert!(err.is_duplicate());
        meta.add("project", "beta", "").unwrap();
        assert_eq!(meta.get("project").unwrap().len(), 2);
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let (_catalog, conn) = connect();
        let meta = conn.collection_by_path("/tempZone/home/rods").unwrap().meta();
        assert_eq!(
            meta.add("", "v", "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            meta.add("k", "", "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_meta_setters() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object("/tempZone/home/rods/hello.txt").unwrap();
        let mut meta = hello.add_meta("size", "small", "").unwrap();

        meta.set_value("large").unwrap();
        meta.set_units("bytes").unwrap();
        assert_eq!(meta.to_string(), "size: large (unit: bytes)");
        meta.rename("volume").unwrap();
        meta.set("huge", "").unwrap();

        let stored = hello.attribute("volume").unwrap();
        assert_eq!(stored, vec![meta.clone()]);
        assert!(hello.attribute("size").is_err());

        meta.delete().unwrap();
        assert!(hello.meta().all().unwrap().is_empty());
    }

    #[test]
    fn test_unchanged_set_all_makes_no_call() {
        let (catalog, conn) = connect();
        let hello = conn.data_object("/tempZone/home/rods/hello.txt").unwrap();
        let mut meta = hello.add_meta("a", "b", "c").unwrap();
        meta.set_all("a", "b", "c").unwrap();
        assert_eq!(catalog.call_count("modify_metadata"), 0);
    }

    #[test]
    fn test_lazy_read_and_refresh() {
        let (catalog, conn) = connect();
        let home = conn.collection_by_path("/tempZone/home/rods").unwrap();
        let meta = home.meta();
        meta.all().unwrap();
        meta.all().unwrap();
        assert_eq!(catalog.call_count("list_metadata"), 1);
        meta.refresh().unwrap();
        assert_eq!(catalog.call_count("list_metadata"), 2);
    }

    #[test]
    fn test_display() {
        let (_catalog, conn) = connect();
        let hello = conn.data_object("/tempZone/home/rods/hello.txt").unwrap();
        hello.add_meta("k", "v", "u").unwrap();
        assert_eq!(
            hello.meta().to_string(),
            "Metadata: /tempZone/home/rods/hello.txt\n\tk: v (unit: u)\n"
        );
    }
}
