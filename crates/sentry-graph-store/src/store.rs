use crate::types::{
    CollectedGraph, DanglingRelationship, Entity, EntityKey, Relationship, RelationshipIdentity,
};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum JobStateError {
    #[error("duplicate entity key: {key}")]
    DuplicateKey { key: EntityKey },

    #[error("duplicate relationship: {identity}")]
    DuplicateRelationship { identity: RelationshipIdentity },
}

pub type JobStateResult<T> = Result<T, JobStateError>;

pub type EntityIter = Box<dyn Iterator<Item = Entity> + Send>;
pub type RelationshipIter = Box<dyn Iterator<Item = Relationship> + Send>;

/// Run-scoped store shared by every step of one ingestion run.
///
/// Writes are append-only per key. Lookups never fail: an absent key means
/// the entity has not been discovered yet.
pub trait JobState: Send + Sync {
    /// Rejects a second entity with the same key instead of overwriting it.
    fn add_entity(&self, entity: Entity) -> JobStateResult<Entity>;

    fn add_entities(&self, entities: Vec<Entity>) -> JobStateResult<()> {
        for entity in entities {
            self.add_entity(entity)?;
        }
        Ok(())
    }

    /// Rejects an identical `(type, from_key, to_key)` triple. Endpoints are
    /// not checked here; see [`JobState::dangling_relationships`].
    fn add_relationship(&self, relationship: Relationship) -> JobStateResult<Relationship>;

    fn find_entity(&self, key: &str) -> Option<Entity>;

    fn has_key(&self, key: &str) -> bool {
        self.find_entity(key).is_some()
    }

    /// Lazy scan over one entity type in insertion order. Each call starts a
    /// fresh scan.
    fn iterate_entities(&self, entity_type: &str) -> EntityIter;

    fn iterate_relationships(&self, relationship_type: &str) -> RelationshipIter;

    fn entity_count(&self) -> usize;

    fn relationship_count(&self) -> usize;

    /// Number of stored records per entity or relationship type.
    fn encountered_types(&self) -> BTreeMap<String, usize>;

    fn dangling_relationships(&self) -> Vec<DanglingRelationship>;

    fn collect(&self) -> CollectedGraph;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_error_duplicate_relationship_expected_identity_in_message() {
        let error = JobStateError::DuplicateRelationship {
            identity: RelationshipIdentity {
                relationship_type: "sentry_team_has_member".to_string(),
                from_key: "sentry-team-10".to_string(),
                to_key: "sentry-member-1000".to_string(),
            },
        };

        assert_eq!(
            error.to_string(),
            "duplicate relationship: sentry_team_has_member (sentry-team-10 -> sentry-member-1000)"
        );
    }
}
