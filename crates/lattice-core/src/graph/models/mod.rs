//! Data models for the knowledge graph.

mod edge;
mod node;

pub use edge::{EdgeUpsert, RelRef, RelationshipType};
pub use node::{EntityType, NodeKind, NodeRef, NodeUpsert};
