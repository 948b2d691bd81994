pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemoryJobState;
pub use store::{EntityIter, JobState, JobStateError, JobStateResult, RelationshipIter};
pub use types::{
    AttrValue, CollectedGraph, DanglingRelationship, Entity, EntityKey, Relationship,
    RelationshipClass, RelationshipIdentity, entity_key,
};
