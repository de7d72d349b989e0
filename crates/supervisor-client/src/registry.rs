// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Handle registry (spec §4.1, component C2).
//!
//! The C original threads live nodes/fields through intrusive
//! singly-linked lists and validates external references by pointer
//! identity. Per spec §9's own design notes, this port replaces that
//! with a growable-array-plus-free-list generational arena: external
//! [`NodeHandle`]/[`FieldHandle`] tokens carry a generation that must
//! match the slot's current generation, so a stale handle is rejected
//! by value comparison rather than by scanning every live object.

use std::collections::HashMap;

use supervisor_types::{FieldHandle, FieldRecord, NodeHandle, NodeId, NodeRecord, ProtoScopeId};
use tracing::debug;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A growable-array-plus-free-list arena keyed by generational handles.
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            (slot.generation, index)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            (0, index)
        }
    }

    fn get(&self, generation: u32, index: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, generation: u32, index: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, generation: u32, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take();
        if value.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
        value
    }

    fn iter(&self) -> impl Iterator<Item = ((u32, u32), &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            slot.value
                .as_ref()
                .map(|v| ((slot.generation, index as u32), v))
        })
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = ((u32, u32), &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let generation = slot.generation;
            slot.value.as_mut().map(move |v| ((generation, index as u32), v))
        })
    }
}

/// The live node/field handle registry (spec §4.1).
///
/// Synthetic root (id `0`) and the controller's own robot node are
/// created at construction and persist for the life of the process
/// (spec §3 "Lifecycle").
pub struct HandleRegistry {
    nodes: Arena<NodeRecord>,
    fields: Arena<FieldRecord>,
    node_id_index: HashMap<NodeId, NodeHandle>,
    root_handle: NodeHandle,
}

impl HandleRegistry {
    /// Build a fresh registry containing only the synthetic root node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let mut node_id_index = HashMap::new();
        let (generation, index) = nodes.insert(NodeRecord::new(supervisor_types::ROOT_NODE_ID, 0, -1));
        let root_handle = NodeHandle::from_raw_parts(generation, index);
        node_id_index.insert(supervisor_types::ROOT_NODE_ID, root_handle);
        Self {
            nodes,
            fields: Arena::new(),
            node_id_index,
            root_handle,
        }
    }

    /// The synthetic root node's handle.
    #[must_use]
    pub const fn root(&self) -> NodeHandle {
        self.root_handle
    }

    /// `find_node_by_id`: registry membership check by server-assigned id.
    #[must_use]
    pub fn find_node_by_id(&self, id: NodeId) -> Option<NodeHandle> {
        self.node_id_index.get(&id).copied()
    }

    /// `find_node_by_def`: matches iff the PROTO scope matches and (the
    /// query is itself PROTO-scoped, or the candidate isn't
    /// PROTO-internal) and the DEF name matches (spec §4.1).
    #[must_use]
    pub fn find_node_by_def(&self, def: &str, parent_proto: Option<NodeHandle>) -> Option<NodeHandle> {
        self.nodes.iter().find_map(|((generation, index), record)| {
            let handle = NodeHandle::from_raw_parts(generation, index);
            let proto_matches = record.parent_proto == parent_proto;
            let visibility_ok = parent_proto.is_some() || !record.is_proto_internal;
            let def_matches = record.def_name.as_deref() == Some(def);
            (proto_matches && visibility_ok && def_matches).then_some(handle)
        })
    }

    /// `find_node_by_tag`: first node whose device tag matches.
    #[must_use]
    pub fn find_node_by_tag(&self, tag: i32) -> Option<NodeHandle> {
        self.nodes.iter().find_map(|((generation, index), record)| {
            (record.device_tag == Some(tag)).then(|| NodeHandle::from_raw_parts(generation, index))
        })
    }

    /// `is_node_ref_valid`: whether `handle` still names a live slot.
    #[must_use]
    pub fn is_node_ref_valid(&self, handle: NodeHandle) -> bool {
        let (generation, index) = handle.raw_parts();
        self.nodes.get(generation, index).is_some()
    }

    /// Borrow a node record by handle.
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&NodeRecord> {
        let (generation, index) = handle.raw_parts();
        self.nodes.get(generation, index)
    }

    /// Mutably borrow a node record by handle.
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut NodeRecord> {
        let (generation, index) = handle.raw_parts();
        self.nodes.get_mut(generation, index)
    }

    /// Iterate every live node record mutably, for per-step cache
    /// invalidation (spec §4.3's read-answer-cycle boundary).
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeRecord> {
        self.nodes.iter_mut().map(|(_, record)| record)
    }

    /// `add_node`: idempotent on id. If the node already exists, only
    /// its DEF name is refreshed (extracting the segment after the
    /// last `.`); otherwise a new record is inserted.
    pub fn add_node(
        &mut self,
        id: NodeId,
        type_tag: i32,
        parent_id: i32,
        def_expr: Option<&str>,
    ) -> NodeHandle {
        let (_, def_name) = def_expr.map_or((None, None), |expr| {
            let (scope, name) = supervisor_types::canonicalize_def_name(expr);
            (scope, Some(name))
        });

        if let Some(&existing) = self.node_id_index.get(&id) {
            if let Some(record) = self.node_mut(existing) {
                record.def_name = def_name.map(ToOwned::to_owned);
            }
            return existing;
        }

        let mut record = NodeRecord::new(id, type_tag, parent_id);
        record.def_name = def_name.map(ToOwned::to_owned);
        let (generation, index) = self.nodes.insert(record);
        let handle = NodeHandle::from_raw_parts(generation, index);
        self.node_id_index.insert(id, handle);
        debug!(node_id = id, "node resolved into registry");
        handle
    }

    /// `remove_node`: unlink the node and reset the parent id of every
    /// dependent handle to `-1`.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        let (generation, index) = handle.raw_parts();
        let Some(record) = self.nodes.remove(generation, index) else {
            return;
        };
        self.node_id_index.remove(&record.id);
        for (_, other) in self.nodes.iter_mut() {
            if other.parent_id == i32::try_from(record.id).unwrap_or(i32::MAX) {
                other.parent_id = -1;
            }
        }
    }

    /// `remove_internal_proto_entries`: purge every node/field whose
    /// `is_proto_internal` is set (triggered by `NODE_REGENERATED`).
    pub fn remove_internal_proto_entries(&mut self) {
        let stale: Vec<(u32, u32)> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.is_proto_internal)
            .map(|(key, _)| key)
            .collect();
        for (generation, index) in stale {
            if let Some(record) = self.nodes.remove(generation, index) {
                self.node_id_index.remove(&record.id);
            }
        }
        let stale_fields: Vec<(u32, u32)> = self
            .fields
            .iter()
            .filter(|(_, record)| record.is_proto_internal)
            .map(|(key, _)| key)
            .collect();
        for (generation, index) in stale_fields {
            self.fields.remove(generation, index);
        }
        debug!("purged PROTO-internal registry entries");
    }

    /// Insert a freshly-resolved field record, returning its handle.
    ///
    /// Per spec §4.1, repeated resolution of the same `(node_id, name)`
    /// must return the same handle — callers are expected to check
    /// [`Self::find_field_by_name`] first.
    pub fn add_field(&mut self, record: FieldRecord) -> FieldHandle {
        let (generation, index) = self.fields.insert(record);
        FieldHandle::from_raw_parts(generation, index)
    }

    /// Find an already-resolved field by owning node and name.
    #[must_use]
    pub fn find_field_by_name(&self, node_id: NodeId, name: &str) -> Option<FieldHandle> {
        self.fields.iter().find_map(|((generation, index), record)| {
            (record.node_id == node_id && record.name == name)
                .then(|| FieldHandle::from_raw_parts(generation, index))
        })
    }

    /// Find an already-resolved field by owning node and server-assigned
    /// field id, for applying a `FIELD_GET_VALUE`/`FIELD_INSERT_VALUE`
    /// reply back onto the record that was waiting for it.
    #[must_use]
    pub fn find_field_by_ids(&self, node_id: NodeId, field_id: supervisor_types::FieldWireId) -> Option<FieldHandle> {
        self.fields.iter().find_map(|((generation, index), record)| {
            (record.node_id == node_id && record.field_id == field_id)
                .then(|| FieldHandle::from_raw_parts(generation, index))
        })
    }

    /// Borrow a field record by handle.
    #[must_use]
    pub fn field(&self, handle: FieldHandle) -> Option<&FieldRecord> {
        let (generation, index) = handle.raw_parts();
        self.fields.get(generation, index)
    }

    /// Mutably borrow a field record by handle.
    pub fn field_mut(&mut self, handle: FieldHandle) -> Option<&mut FieldRecord> {
        let (generation, index) = handle.raw_parts();
        self.fields.get_mut(generation, index)
    }

    /// Iterate every live field record mutably, for reconciling a
    /// parent field's cached `mf_count` after a child node is removed.
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut FieldRecord> {
        self.fields.iter_mut().map(|(_, record)| record)
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A PROTO scope qualifier, carried alongside a dotted DEF-name lookup.
pub type ProtoScope = Option<ProtoScopeId>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn registry_with_node(id: NodeId) -> (HandleRegistry, NodeHandle) {
        let mut registry = HandleRegistry::new();
        let handle = registry.add_node(id, 1, 0, Some("ROBOT.BODY"));
        (registry, handle)
    }

    #[test]
    fn root_node_exists_at_construction() {
        let registry = HandleRegistry::new();
        assert!(registry.is_node_ref_valid(registry.root()));
        assert_eq!(registry.find_node_by_id(supervisor_types::ROOT_NODE_ID), Some(registry.root()));
    }

    #[test]
    fn add_node_is_idempotent_on_id() {
        let (mut registry, handle) = registry_with_node(5);
        let handle2 = registry.add_node(5, 1, 0, Some("OTHER.BODY"));
        assert_eq!(handle, handle2);
        assert_eq!(registry.node(handle).unwrap().def_name.as_deref(), Some("BODY"));
    }

    #[test]
    fn find_by_def_extracts_last_segment() {
        let (registry, handle) = registry_with_node(5);
        assert_eq!(registry.find_node_by_def("BODY", None), Some(handle));
    }

    #[test]
    fn remove_node_resets_children_parent_id() {
        let (mut registry, parent) = registry_with_node(5);
        let child = registry.add_node(6, 1, 5, None);
        registry.remove_node(parent);
        assert!(!registry.is_node_ref_valid(parent));
        assert_eq!(registry.find_node_by_id(5), None);
        assert_eq!(registry.node(child).unwrap().parent_id, -1);
    }

    #[test]
    fn stale_handle_is_rejected_after_removal() {
        let (mut registry, handle) = registry_with_node(5);
        registry.remove_node(handle);
        // A fresh insert recycles the slot with a bumped generation.
        let _new_handle = registry.add_node(7, 1, 0, None);
        assert!(!registry.is_node_ref_valid(handle));
    }

    #[test]
    fn remove_internal_proto_entries_purges_only_flagged_nodes() {
        let mut registry = HandleRegistry::new();
        let kept = registry.add_node(1, 1, 0, None);
        let purged = registry.add_node(2, 1, 0, None);
        registry.node_mut(purged).unwrap().is_proto_internal = true;
        registry.remove_internal_proto_entries();
        assert!(registry.is_node_ref_valid(kept));
        assert!(!registry.is_node_ref_valid(purged));
    }
}
