use crate::store::{EntityIter, JobState, JobStateError, JobStateResult, RelationshipIter};
use crate::types::{
    CollectedGraph, DanglingRelationship, Entity, EntityKey, Relationship, RelationshipIdentity,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryState {
    entities: Vec<Entity>,
    entity_index: BTreeMap<EntityKey, usize>,
    entities_by_type: BTreeMap<String, Vec<usize>>,
    relationships: Vec<Relationship>,
    relationship_index: BTreeSet<RelationshipIdentity>,
    relationships_by_type: BTreeMap<String, Vec<usize>>,
}

impl MemoryState {
    fn entity_at(&self, entity_type: &str, position: usize) -> Option<&Entity> {
        let index = *self.entities_by_type.get(entity_type)?.get(position)?;
        self.entities.get(index)
    }

    fn relationship_at(&self, relationship_type: &str, position: usize) -> Option<&Relationship> {
        let index = *self
            .relationships_by_type
            .get(relationship_type)?
            .get(position)?;
        self.relationships.get(index)
    }
}

/// In-memory [`JobState`]. Clones share the same underlying run state.
#[derive(Clone, Debug, Default)]
pub struct MemoryJobState {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryJobState {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.inner)
    }
}

// Writes are all-or-nothing under the lock, so a poisoned guard still holds
// consistent data.
fn lock_state(inner: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    inner
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobState for MemoryJobState {
    fn add_entity(&self, entity: Entity) -> JobStateResult<Entity> {
        let mut state = self.state();
        if state.entity_index.contains_key(&entity.key) {
            return Err(JobStateError::DuplicateKey { key: entity.key });
        }

        let index = state.entities.len();
        state.entity_index.insert(entity.key.clone(), index);
        state
            .entities_by_type
            .entry(entity.entity_type.clone())
            .or_default()
            .push(index);
        state.entities.push(entity.clone());
        Ok(entity)
    }

    fn add_relationship(&self, relationship: Relationship) -> JobStateResult<Relationship> {
        let mut state = self.state();
        let identity = relationship.identity();
        if state.relationship_index.contains(&identity) {
            return Err(JobStateError::DuplicateRelationship { identity });
        }

        let index = state.relationships.len();
        state.relationship_index.insert(identity);
        state
            .relationships_by_type
            .entry(relationship.relationship_type.clone())
            .or_default()
            .push(index);
        state.relationships.push(relationship.clone());
        Ok(relationship)
    }

    fn find_entity(&self, key: &str) -> Option<Entity> {
        let state = self.state();
        let index = *state.entity_index.get(key)?;
        state.entities.get(index).cloned()
    }

    fn has_key(&self, key: &str) -> bool {
        self.state().entity_index.contains_key(key)
    }

    fn iterate_entities(&self, entity_type: &str) -> EntityIter {
        Box::new(TypedEntityIter {
            inner: Arc::clone(&self.inner),
            entity_type: entity_type.to_string(),
            position: 0,
        })
    }

    fn iterate_relationships(&self, relationship_type: &str) -> RelationshipIter {
        Box::new(TypedRelationshipIter {
            inner: Arc::clone(&self.inner),
            relationship_type: relationship_type.to_string(),
            position: 0,
        })
    }

    fn entity_count(&self) -> usize {
        self.state().entities.len()
    }

    fn relationship_count(&self) -> usize {
        self.state().relationships.len()
    }

    fn encountered_types(&self) -> BTreeMap<String, usize> {
        let state = self.state();
        state
            .entities_by_type
            .iter()
            .chain(state.relationships_by_type.iter())
            .map(|(record_type, indices)| (record_type.clone(), indices.len()))
            .collect()
    }

    fn dangling_relationships(&self) -> Vec<DanglingRelationship> {
        let state = self.state();
        state
            .relationships
            .iter()
            .filter_map(|relationship| {
                let missing_keys: Vec<EntityKey> = [&relationship.from_key, &relationship.to_key]
                    .into_iter()
                    .filter(|key| !state.entity_index.contains_key(key.as_str()))
                    .cloned()
                    .collect();
                if missing_keys.is_empty() {
                    None
                } else {
                    Some(DanglingRelationship {
                        relationship: relationship.clone(),
                        missing_keys,
                    })
                }
            })
            .collect()
    }

    fn collect(&self) -> CollectedGraph {
        let state = self.state();
        CollectedGraph {
            entities: state.entities.clone(),
            relationships: state.relationships.clone(),
        }
    }
}

// Scans hold a position rather than a borrow, so the lock is only taken per
// item and records appended mid-scan are still reached.
struct TypedEntityIter {
    inner: Arc<Mutex<MemoryState>>,
    entity_type: String,
    position: usize,
}

impl Iterator for TypedEntityIter {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let state = lock_state(&self.inner);
        let entity = state.entity_at(&self.entity_type, self.position)?.clone();
        self.position += 1;
        Some(entity)
    }
}

struct TypedRelationshipIter {
    inner: Arc<Mutex<MemoryState>>,
    relationship_type: String,
    position: usize,
}

impl Iterator for TypedRelationshipIter {
    type Item = Relationship;

    fn next(&mut self) -> Option<Relationship> {
        let state = lock_state(&self.inner);
        let relationship = state
            .relationship_at(&self.relationship_type, self.position)?
            .clone();
        self.position += 1;
        Some(relationship)
    }
}
