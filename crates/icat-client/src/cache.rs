//! Per-connection principal cache
//!
//! One lazy slot per entity class. Slots are only touched while the
//! session lease is held, so reads during an operation are stable.

use crate::principal::{Group, Named, Resource, User, Zone};
use std::sync::Arc;

/// Cached entries of one entity class
pub(crate) struct Slot<T> {
    entries: Option<Vec<Arc<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { entries: None }
    }
}

impl<T: Named> Slot<T> {
    /// Entries, if the slot has been populated
    pub(crate) fn get(&self) -> Option<Vec<Arc<T>>> {
        self.entries.clone()
    }

    pub(crate) fn find(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .as_ref()?
            .iter()
            .find(|entry| entry.name() == name)
            .cloned()
    }

    /// Re-populate from a fresh name listing
    ///
    /// Names already cached keep their instance, so handles held elsewhere
    /// stay identical to the cache entry.
    pub(crate) fn replace(
        &mut self,
        names: Vec<String>,
        mut make: impl FnMut(String) -> T,
    ) -> Vec<Arc<T>> {
        let entries: Vec<Arc<T>> = names
            .into_iter()
            .map(|name| self.find(&name).unwrap_or_else(|| Arc::new(make(name))))
            .collect();
        self.entries = Some(entries.clone());
        entries
    }
}

#[derive(Default)]
pub(crate) struct PrincipalCache {
    pub(crate) zones: Slot<Zone>,
    pub(crate) users: Slot<User>,
    pub(crate) groups: Slot<Group>,
    pub(crate) resources: Slot<Resource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry(String);

    impl Named for Entry {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_slot_starts_empty() {
        let slot: Slot<Entry> = Slot::default();
        assert!(slot.get().is_none());
        assert!(slot.find("a").is_none());
    }

    #[test]
    fn test_replace_keeps_existing_instances() {
        let mut slot = Slot::default();
        let first = slot.replace(vec!["a".to_string(), "b".to_string()], Entry);
        let second = slot.replace(vec!["b".to_string(), "c".to_string()], Entry);

        assert!(Arc::ptr_eq(&first[1], &second[0]));
        assert_eq!(second[1].name(), "c");
        assert!(slot.find("a").is_none());
        assert_eq!(slot.get().unwrap().len(), 2);
    }
}
