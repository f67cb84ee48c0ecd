//! Canonical store of named schemas for one generation run.
//!
//! Ids are reserved before a schema is known (so self-referential types can
//! point at themselves) and filled once resolution finishes. Filling performs
//! structural deduplication: a schema equal to one already registered reuses
//! the existing id.

use crate::error::{Error, Result, SourceLocation};
use crate::schema::Schema;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// A registered schema as handed to the emitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRegistryEntry {
    pub id: String,
    pub schema: Schema,
    pub first_discovery_order: usize,
}

#[derive(Debug)]
enum Slot {
    /// Id handed out, schema still being resolved.
    Reserved { explicit: bool, order: usize },
    Filled {
        explicit: bool,
        entry: SchemaRegistryEntry,
        owner: SourceLocation,
    },
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    slots: IndexMap<String, Slot>,
    /// Canonical fingerprint -> id, for structural dedup.
    fingerprints: HashMap<String, String>,
    next_order: usize,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a schema that is about to be resolved.
    ///
    /// Non-explicit names are disambiguated with a numeric suffix when taken.
    /// An explicit id always maps to itself; two declarations insisting on it
    /// share the slot and are checked for equality when filled.
    pub fn reserve(&mut self, name: &str, explicit: bool) -> String {
        let order = self.next_order;
        self.next_order += 1;

        if explicit {
            if !self.slots.contains_key(name) {
                self.slots
                    .insert(name.to_string(), Slot::Reserved { explicit, order });
            }
            debug!("Reserved explicit schema id {}", name);
            return name.to_string();
        }

        let mut id = name.to_string();
        let mut suffix = 2;
        while self.slots.contains_key(&id) {
            id = format!("{}{}", name, suffix);
            suffix += 1;
        }
        debug!("Reserved schema id {} for {}", id, name);
        self.slots.insert(id.clone(), Slot::Reserved { explicit, order });
        id
    }

    /// Store the resolved schema for a reserved id and return the id callers
    /// should reference, which differs from `id` when an equal schema was
    /// already registered.
    pub fn fill(&mut self, id: &str, schema: Schema, owner: &SourceLocation) -> Result<String> {
        let fingerprint = schema.fingerprint();

        match self.slots.get(id) {
            None => Err(Error::RegistryCorruption { id: id.to_string() }),
            Some(Slot::Filled {
                explicit,
                entry,
                owner: existing_owner,
            }) => {
                if entry.schema.fingerprint() == fingerprint {
                    return Ok(id.to_string());
                }
                if *explicit && existing_owner != owner {
                    return Err(Error::SchemaConflict {
                        location: owner.clone(),
                        id: id.to_string(),
                        detail: format!(
                            "already declared with a different shape at {}",
                            existing_owner
                        ),
                    });
                }
                Err(Error::RegistryCorruption { id: id.to_string() })
            }
            Some(Slot::Reserved { explicit, order }) => {
                let (explicit, order) = (*explicit, *order);

                // Entries filled while `id` was reserved may already point at it.
                if !explicit && !schema.references(id) && !self.is_referenced(id) {
                    if let Some(existing) = self.fingerprints.get(&fingerprint) {
                        let existing = existing.clone();
                        debug!("Schema {} is structurally equal to {}, reusing id", id, existing);
                        self.slots.shift_remove(id);
                        return Ok(existing);
                    }
                }

                self.fingerprints
                    .entry(fingerprint)
                    .or_insert_with(|| id.to_string());
                self.slots.insert(
                    id.to_string(),
                    Slot::Filled {
                        explicit,
                        entry: SchemaRegistryEntry {
                            id: id.to_string(),
                            schema,
                            first_discovery_order: order,
                        },
                        owner: owner.clone(),
                    },
                );
                Ok(id.to_string())
            }
        }
    }

    fn is_referenced(&self, id: &str) -> bool {
        self.slots.values().any(|slot| match slot {
            Slot::Filled { entry, .. } => entry.schema.references(id),
            Slot::Reserved { .. } => false,
        })
    }

    /// Reserve and fill in one step, for schemas that cannot refer to themselves.
    pub fn assign(
        &mut self,
        name: &str,
        schema: Schema,
        explicit: bool,
        owner: &SourceLocation,
    ) -> Result<String> {
        let id = self.reserve(name, explicit);
        self.fill(&id, schema, owner)
    }

    /// Drop a reservation that will never be filled.
    pub fn release(&mut self, id: &str) {
        if matches!(self.slots.get(id), Some(Slot::Reserved { .. })) {
            self.slots.shift_remove(id);
        }
    }

    /// Filled schema for `id`; `None` while it is still being resolved.
    pub fn get(&self, id: &str) -> Option<&Schema> {
        match self.slots.get(id) {
            Some(Slot::Filled { entry, .. }) => Some(&entry.schema),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Filled { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filled entries sorted by first discovery.
    pub fn entries(&self) -> Vec<SchemaRegistryEntry> {
        let mut entries: Vec<SchemaRegistryEntry> = self
            .slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Filled { entry, .. } => Some(entry.clone()),
                Slot::Reserved { .. } => None,
            })
            .collect();
        entries.sort_by_key(|entry| entry.first_discovery_order);
        entries
    }

    pub fn into_entries(self) -> Vec<SchemaRegistryEntry> {
        self.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn object(fields: &[(&str, &str)]) -> Schema {
        let properties: IndexMap<String, Schema> = fields
            .iter()
            .map(|(name, ty)| (name.to_string(), Schema::typed(ty)))
            .collect();
        let required = fields.iter().map(|(name, _)| name.to_string()).collect();
        Schema::object(properties, required, false)
    }

    fn here() -> SourceLocation {
        SourceLocation::new("src/models.rs", 1, 0)
    }

    #[test]
    fn test_assign_dedups_equal_schemas() {
        let mut registry = SchemaRegistry::new();
        let a = registry
            .assign("User", object(&[("id", "integer"), ("name", "string")]), false, &here())
            .unwrap();
        let b = registry
            .assign("Author", object(&[("name", "string"), ("id", "integer")]), false, &here())
            .unwrap();

        assert_eq!(a, "User");
        assert_eq!(b, "User");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("Author").is_none());
    }

    #[test]
    fn test_name_collision_gets_numeric_suffix() {
        let mut registry = SchemaRegistry::new();
        let a = registry
            .assign("User", object(&[("id", "integer")]), false, &here())
            .unwrap();
        let b = registry
            .assign("User", object(&[("email", "string")]), false, &here())
            .unwrap();
        let c = registry
            .assign("User", object(&[("age", "integer")]), false, &here())
            .unwrap();

        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("User", "User2", "User3"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_explicit_id_conflict() {
        let mut registry = SchemaRegistry::new();
        let first = SourceLocation::new("src/a.rs", 3, 0);
        let second = SourceLocation::new("src/b.rs", 7, 0);

        registry
            .assign("UserDto", object(&[("id", "integer")]), true, &first)
            .unwrap();
        let err = registry
            .assign("UserDto", object(&[("id", "string")]), true, &second)
            .unwrap_err();

        match err {
            Error::SchemaConflict { id, location, .. } => {
                assert_eq!(id, "UserDto");
                assert_eq!(location, second);
            }
            other => panic!("Expected schema conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_id_shared_when_equal() {
        let mut registry = SchemaRegistry::new();
        let first = SourceLocation::new("src/a.rs", 3, 0);
        let second = SourceLocation::new("src/b.rs", 7, 0);

        let a = registry
            .assign("UserDto", object(&[("id", "integer")]), true, &first)
            .unwrap();
        let b = registry
            .assign("UserDto", object(&[("id", "integer")]), true, &second)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_refilling_with_different_schema_is_corruption() {
        let mut registry = SchemaRegistry::new();
        let id = registry
            .assign("User", object(&[("id", "integer")]), false, &here())
            .unwrap();
        let err = registry
            .fill(&id, object(&[("id", "string")]), &here())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_self_referencing_schema_is_not_deduped() {
        let mut registry = SchemaRegistry::new();
        let mut props = IndexMap::new();
        props.insert("next".to_string(), Schema::reference("Node"));
        registry
            .assign("Other", Schema::object(props.clone(), vec![], false), false, &here())
            .unwrap();

        let id = registry.reserve("Node", false);
        assert!(registry.get(&id).is_none());
        let filled = registry
            .fill(&id, Schema::object(props, vec![], false), &here())
            .unwrap();
        assert_eq!(filled, "Node");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_placeholder_still_referenced_is_not_deduped() {
        let mut registry = SchemaRegistry::new();
        let mut outer_props = IndexMap::new();
        outer_props.insert("b".to_string(), Schema::reference("B"));

        let y = registry.reserve("Y", false);
        let mut inner_props = IndexMap::new();
        inner_props.insert("y".to_string(), Schema::reference(y.clone()));
        registry
            .assign("B", Schema::object(inner_props, vec![], false), false, &here())
            .unwrap();
        registry
            .assign("W", Schema::object(outer_props.clone(), vec![], false), false, &here())
            .unwrap();

        let filled = registry
            .fill(&y, Schema::object(outer_props, vec![], false), &here())
            .unwrap();
        assert_eq!(filled, "Y");
        assert!(registry.get("Y").is_some());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_entries_follow_discovery_order() {
        let mut registry = SchemaRegistry::new();
        let outer = registry.reserve("Outer", false);
        registry
            .assign("Inner", object(&[("x", "integer")]), false, &here())
            .unwrap();
        registry
            .fill(&outer, Schema::reference("Inner"), &here())
            .unwrap();

        let ids: Vec<String> = registry.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["Outer", "Inner"]);
    }

    #[test]
    fn test_release_frees_the_name() {
        let mut registry = SchemaRegistry::new();
        let id = registry.reserve("Temp", false);
        registry.release(&id);
        assert!(registry.entries().is_empty());
        assert_eq!(registry.reserve("Temp", false), "Temp");
    }
}
