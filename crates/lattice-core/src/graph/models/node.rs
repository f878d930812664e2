//! Node types for the knowledge graph.

use serde::{Deserialize, Serialize};

/// The four vertex kinds stored in the graph.
///
/// Kinds are a closed set with a fixed table dispatch; adding a kind means
/// adding a variant and its table entry here, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
    Project,
    Directory,
    File,
    Entity,
}

impl NodeKind {
    /// All kinds, in containment order.
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Project,
        NodeKind::Directory,
        NodeKind::File,
        NodeKind::Entity,
    ];

    /// The table name in the graph store for this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            NodeKind::Project => "project",
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
            NodeKind::Entity => "entity",
        }
    }

    /// Uppercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Project => "PROJECT",
            NodeKind::Directory => "DIRECTORY",
            NodeKind::File => "FILE",
            NodeKind::Entity => "ENTITY",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROJECT" => Ok(NodeKind::Project),
            "DIRECTORY" => Ok(NodeKind::Directory),
            "FILE" => Ok(NodeKind::File),
            "ENTITY" => Ok(NodeKind::Entity),
            other => Err(format!("unknown node kind `{}`", other)),
        }
    }
}

/// Sub-type of an ENTITY node, stored as its `entity_type` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Class,
    Function,
    Method,
    Module,
    Concept,
    /// Stub for an external symbol with no extractable definition.
    Reference,
}

impl EntityType {
    /// Lowercase property value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Class => "class",
            EntityType::Function => "function",
            EntityType::Method => "method",
            EntityType::Module => "module",
            EntityType::Concept => "concept",
            EntityType::Reference => "reference",
        }
    }

    /// Parse the stored property value back into the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Some(EntityType::Class),
            "function" => Some(EntityType::Function),
            "method" => Some(EntityType::Method),
            "module" => Some(EntityType::Module),
            "concept" => Some(EntityType::Concept),
            "reference" => Some(EntityType::Reference),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved node write: canonical id plus its properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeUpsert {
    /// Node kind, selecting the target table.
    pub kind: NodeKind,
    /// Canonical entity id, the merge key.
    pub entity_id: String,
    /// Free-form properties merged into the record.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl NodeUpsert {
    /// Create a node write with empty properties.
    pub fn new(kind: NodeKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            properties: serde_json::Map::new(),
        }
    }

    /// Attach a property, replacing any previous value for the key.
    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Reference to a node after a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub entity_id: String,
}
