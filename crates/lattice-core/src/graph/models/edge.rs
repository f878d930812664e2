//! Relationship types for the knowledge graph.

use serde::{Deserialize, Serialize};

/// Directed relationship types between nodes.
///
/// A relationship is uniquely identified by `(source_id, target_id, type)`;
/// re-creating one updates it, never duplicates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipType {
    /// Containment hierarchy: PROJECT -> DIRECTORY -> ... -> FILE.
    Contains,
    Imports,
    Defines,
    Calls,
    /// Generic semantic link.
    Relates,
}

impl RelationshipType {
    /// All relationship types.
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::Contains,
        RelationshipType::Imports,
        RelationshipType::Defines,
        RelationshipType::Calls,
        RelationshipType::Relates,
    ];

    /// The table name in the graph store for this relationship type.
    pub fn table_name(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "contains",
            RelationshipType::Imports => "imports",
            RelationshipType::Defines => "defines",
            RelationshipType::Calls => "calls",
            RelationshipType::Relates => "relates",
        }
    }

    /// Uppercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Imports => "IMPORTS",
            RelationshipType::Defines => "DEFINES",
            RelationshipType::Calls => "CALLS",
            RelationshipType::Relates => "RELATES",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONTAINS" => Ok(RelationshipType::Contains),
            "IMPORTS" => Ok(RelationshipType::Imports),
            "DEFINES" => Ok(RelationshipType::Defines),
            "CALLS" => Ok(RelationshipType::Calls),
            "RELATES" => Ok(RelationshipType::Relates),
            other => Err(format!("unknown relationship type `{}`", other)),
        }
    }
}

/// A fully resolved edge write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeUpsert {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
    /// Extraction confidence in [0, 1]; clamped on write.
    pub confidence_score: f32,
    /// Free-form properties merged into the record.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl EdgeUpsert {
    /// Create an edge write with full confidence and empty properties.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        rel_type: RelationshipType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type,
            confidence_score: 1.0,
            properties: serde_json::Map::new(),
        }
    }

    /// Set the extraction confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence_score = confidence;
        self
    }

    /// Attach a property, replacing any previous value for the key.
    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Reference to a relationship after a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelRef {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
}
