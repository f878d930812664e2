//! Canonical, content-addressed entity identifiers.
//!
//! Every node in the graph is keyed by a deterministic identifier derived
//! from its defining content, never from a mutable path string:
//!
//! - `file_<hex12>` - first 12 hex chars of the file's content hash
//! - `entity_<hex8>_<hex8>` - hashes of the entity name and its owning
//!   file's content hash, as two independent segments
//! - `project_<hex12>` / `dir_<hex12>` - hashed project name, or hashed
//!   (project, path) pair for directories
//! - bare lowercase identifiers for stub entities (imported symbols with
//!   no extractable definition), kept prefix-free so they can never
//!   collide with the canonical namespaces
//!
//! Validation classifies without ever mutating its input. Two legacy
//! shapes are recognized and rejected explicitly so callers can log and
//! migrate instead of guessing: path-embedded ids
//! (`kind:project:module/path`) and placeholder ids (`file_placeholder_*`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::models::NodeKind;

/// Prefix for canonical file ids.
pub const FILE_PREFIX: &str = "file_";

/// Prefix for canonical entity ids.
pub const ENTITY_PREFIX: &str = "entity_";

/// Prefix for canonical project ids.
pub const PROJECT_PREFIX: &str = "project_";

/// Prefix for canonical directory ids.
pub const DIR_PREFIX: &str = "dir_";

const RESERVED_PREFIXES: &[&str] = &[FILE_PREFIX, ENTITY_PREFIX, PROJECT_PREFIX, DIR_PREFIX];

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Normalize an externally supplied hash: lowercase hex is passed through,
/// anything else is hashed again so the result is always well-formed.
fn normalize_hash(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.len() >= 12 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        trimmed
    } else {
        sha256_hex(trimmed.as_bytes())
    }
}

/// Canonical id for a file, from a precomputed content hash.
pub fn file_id(content_hash: &str) -> String {
    let hash = normalize_hash(content_hash);
    format!("{}{}", FILE_PREFIX, &hash[..12])
}

/// Canonical id for a file, hashing the content directly.
pub fn file_id_from_content(content: &[u8]) -> String {
    let hash = sha256_hex(content);
    format!("{}{}", FILE_PREFIX, &hash[..12])
}

/// Fallback file id when content is unavailable: hash of path, size and
/// modification time. Weaker than content addressing; used only when the
/// extractor could not read the file body.
pub fn file_id_from_metadata(path: &str, size: u64, mtime_epoch: i64) -> String {
    let material = format!("{}\0{}\0{}", path, size, mtime_epoch);
    let hash = sha256_hex(material.as_bytes());
    format!("{}{}", FILE_PREFIX, &hash[..12])
}

/// Canonical id for an extracted entity: independent hashes of the entity
/// name and its owning file's content hash.
pub fn entity_id(name: &str, owning_file_hash: &str) -> String {
    let name_hash = sha256_hex(name.as_bytes());
    let file_hash = sha256_hex(normalize_hash(owning_file_hash).as_bytes());
    format!("{}{}_{}", ENTITY_PREFIX, &name_hash[..8], &file_hash[..8])
}

/// Canonical id for a project root.
pub fn project_id(project_name: &str) -> String {
    let hash = sha256_hex(project_name.as_bytes());
    format!("{}{}", PROJECT_PREFIX, &hash[..12])
}

/// Canonical id for a directory, scoped to its project so that merge by
/// (project, path) and merge by id coincide.
pub fn directory_id(project_name: &str, dir_path: &str) -> String {
    let normalized = dir_path.trim_matches('/');
    let material = format!("{}\0{}", project_name, normalized);
    let hash = sha256_hex(material.as_bytes());
    format!("{}{}", DIR_PREFIX, &hash[..12])
}

/// Id for a stub entity (an imported external symbol with no extractable
/// definition): a bare lowercase identifier, never carrying one of the
/// canonical prefixes.
pub fn stub_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() || matches!(lower, '.' | '-' | '_') {
            out.push(lower);
        } else {
            out.push('_');
        }
    }
    let out = out.trim_matches(|c| c == '_' || c == '.').to_string();

    let mut out = if out.is_empty() || !out.starts_with(|c: char| c.is_ascii_lowercase()) {
        format!("x{}", out)
    } else {
        out
    };
    // A stub must stay outside the canonical namespaces.
    if RESERVED_PREFIXES.iter().any(|p| out.starts_with(p)) {
        out = format!("ext.{}", out);
    }
    out
}

/// The shape detected for an entity id during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFormat {
    /// Well-formed `project_<hex12>`.
    CanonicalProject,
    /// Well-formed `dir_<hex12>`.
    CanonicalDirectory,
    /// Well-formed `file_<hex12>`.
    CanonicalFile,
    /// Well-formed `entity_<hex8>_<hex8>`.
    CanonicalEntity,
    /// Bare lowercase stub identifier.
    Stub,
    /// Deprecated path-embedded id, e.g. `kind:project:module/path`.
    PathEmbedded,
    /// Deprecated placeholder id, e.g. `file_placeholder_0`.
    Placeholder,
    /// Empty or otherwise unparseable input.
    Malformed,
}

impl IdFormat {
    /// Short name used in error messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdFormat::CanonicalProject => "canonical-project",
            IdFormat::CanonicalDirectory => "canonical-directory",
            IdFormat::CanonicalFile => "canonical-file",
            IdFormat::CanonicalEntity => "canonical-entity",
            IdFormat::Stub => "stub",
            IdFormat::PathEmbedded => "path-embedded",
            IdFormat::Placeholder => "placeholder",
            IdFormat::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for IdFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating an entity id against a node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdValidation {
    /// Whether the id is acceptable for the requested kind.
    pub is_valid: bool,
    /// The shape the id was classified as, valid or not.
    pub detected_format: IdFormat,
    /// Explanation when invalid.
    pub error: Option<String>,
}

impl IdValidation {
    fn valid(format: IdFormat) -> Self {
        Self {
            is_valid: true,
            detected_format: format,
            error: None,
        }
    }

    fn invalid(format: IdFormat, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            detected_format: format,
            error: Some(message.into()),
        }
    }
}

fn matches(pattern: &str, id: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(id))
        .unwrap_or(false)
}

fn is_placeholder(id: &str) -> bool {
    matches(
        r"^(file|entity|dir|project)_placeholder(_[A-Za-z0-9]*)?$",
        id,
    ) || id.ends_with("_unknown")
}

fn is_stub_shaped(id: &str) -> bool {
    matches(r"^[a-z][a-z0-9_.\-]*$", id) && !RESERVED_PREFIXES.iter().any(|p| id.starts_with(p))
}

/// Classify the shape of an id without reference to a node kind.
pub fn detect_format(id: &str) -> IdFormat {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed != id {
        return IdFormat::Malformed;
    }
    if is_placeholder(id) {
        return IdFormat::Placeholder;
    }
    if id.contains(':') || id.contains('/') {
        return IdFormat::PathEmbedded;
    }

    if matches(r"^project_[0-9a-f]{12}$", id) {
        IdFormat::CanonicalProject
    } else if matches(r"^dir_[0-9a-f]{12}$", id) {
        IdFormat::CanonicalDirectory
    } else if matches(r"^file_[0-9a-f]{12}$", id) {
        IdFormat::CanonicalFile
    } else if matches(r"^entity_[0-9a-f]{8}_[0-9a-f]{8}$", id) {
        IdFormat::CanonicalEntity
    } else if is_stub_shaped(id) {
        IdFormat::Stub
    } else {
        IdFormat::Malformed
    }
}

/// Classify an id without touching it. Detects the shape first, then
/// checks it against the requested kind; callers are responsible for
/// rejecting or regenerating, never for "fixing" input.
pub fn validate(id: &str, kind: NodeKind) -> IdValidation {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return IdValidation::invalid(IdFormat::Malformed, "empty entity id");
    }
    if trimmed != id {
        return IdValidation::invalid(
            IdFormat::Malformed,
            "entity id has leading or trailing whitespace",
        );
    }

    if is_placeholder(id) {
        return IdValidation::invalid(
            IdFormat::Placeholder,
            format!("placeholder id `{}` must be regenerated from content", id),
        );
    }
    if id.contains(':') || id.contains('/') {
        return IdValidation::invalid(
            IdFormat::PathEmbedded,
            format!("path-embedded id `{}` is deprecated; migrate to content-addressed form", id),
        );
    }

    let detected = detect_format(id);

    let ok = match (kind, detected) {
        (NodeKind::Project, IdFormat::CanonicalProject) => true,
        (NodeKind::Directory, IdFormat::CanonicalDirectory) => true,
        (NodeKind::File, IdFormat::CanonicalFile) => true,
        // Stub entities are legitimate ENTITY nodes.
        (NodeKind::Entity, IdFormat::CanonicalEntity | IdFormat::Stub) => true,
        _ => false,
    };

    if ok {
        IdValidation::valid(detected)
    } else {
        IdValidation::invalid(
            detected,
            format!("id `{}` ({}) is not valid for kind {}", id, detected, kind),
        )
    }
}

/// Infer which node kind an id belongs to from its canonical prefix.
/// Stub-shaped ids resolve to [`NodeKind::Entity`]; anything else is `None`.
pub fn kind_for_id(id: &str) -> Option<NodeKind> {
    match detect_format(id) {
        IdFormat::CanonicalProject => Some(NodeKind::Project),
        IdFormat::CanonicalDirectory => Some(NodeKind::Directory),
        IdFormat::CanonicalFile => Some(NodeKind::File),
        IdFormat::CanonicalEntity | IdFormat::Stub => Some(NodeKind::Entity),
        IdFormat::PathEmbedded | IdFormat::Placeholder | IdFormat::Malformed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_is_deterministic() {
        let a = file_id_from_content(b"fn main() {}\n");
        let b = file_id_from_content(b"fn main() {}\n");
        assert_eq!(a, b);
        assert!(a.starts_with("file_"));
        assert_eq!(a.len(), "file_".len() + 12);
    }

    #[test]
    fn test_file_id_accepts_precomputed_hash() {
        let hash = "AB12CD34EF56aa99bb88cc77";
        let id = file_id(hash);
        assert_eq!(id, "file_ab12cd34ef56");
    }

    #[test]
    fn test_file_id_rehashes_non_hex_material() {
        let id = file_id("not a hash at all");
        assert!(validate(&id, NodeKind::File).is_valid);
    }

    #[test]
    fn test_metadata_fallback_differs_from_content_id() {
        let by_content = file_id_from_content(b"content");
        let by_meta = file_id_from_metadata("src/lib.rs", 7, 1700000000);
        assert_ne!(by_content, by_meta);
        assert!(validate(&by_meta, NodeKind::File).is_valid);
    }

    #[test]
    fn test_entity_id_segments_are_independent() {
        let file_hash = sha256_hex(b"file body");
        let a = entity_id("parse", &file_hash);
        let b = entity_id("parse", &sha256_hex(b"other body"));
        let c = entity_id("render", &file_hash);
        assert!(validate(&a, NodeKind::Entity).is_valid);
        // Same name, different file: first segment matches, second differs.
        let (a_name, a_file) = a["entity_".len()..].split_once('_').unwrap();
        let (b_name, b_file) = b["entity_".len()..].split_once('_').unwrap();
        assert_eq!(a_name, b_name);
        assert_ne!(a_file, b_file);
        // Different name, same file: the reverse.
        let (c_name, c_file) = c["entity_".len()..].split_once('_').unwrap();
        assert_ne!(a_name, c_name);
        assert_eq!(a_file, c_file);
    }

    #[test]
    fn test_directory_id_scoped_by_project() {
        let a = directory_id("alpha", "src/util");
        let b = directory_id("beta", "src/util");
        assert_ne!(a, b);
        assert_eq!(a, directory_id("alpha", "/src/util/"));
    }

    #[test]
    fn test_stub_id_never_collides_with_canonical_namespaces() {
        assert_eq!(stub_id("NumPy"), "numpy");
        assert_eq!(stub_id("os.path"), "os.path");
        assert_eq!(stub_id("@scope/pkg"), "scope_pkg");
        assert_eq!(stub_id("__dunder__"), "dunder");
        assert_eq!(stub_id("42weird"), "x42weird");
        let shadow = stub_id("file_utils");
        assert!(shadow.starts_with("ext."));
        assert!(validate(&shadow, NodeKind::Entity).is_valid);
    }

    #[test]
    fn test_validate_accepts_wellformed_ids() {
        assert!(validate(&project_id("demo"), NodeKind::Project).is_valid);
        assert!(validate(&directory_id("demo", "a/b"), NodeKind::Directory).is_valid);
        assert!(validate(&file_id_from_content(b"x"), NodeKind::File).is_valid);
        assert!(validate(&entity_id("f", "abc123abc123"), NodeKind::Entity).is_valid);
        assert!(validate("requests", NodeKind::Entity).is_valid);
    }

    #[test]
    fn test_validate_rejects_placeholder_ids() {
        for bad in ["file_placeholder_0", "entity_placeholder_x", "file_placeholder", "mod_unknown"] {
            let v = validate(bad, NodeKind::File);
            assert!(!v.is_valid, "{} should be rejected", bad);
            assert_eq!(v.detected_format, IdFormat::Placeholder, "{}", bad);
            assert!(v.error.is_some());
        }
    }

    #[test]
    fn test_validate_rejects_path_embedded_ids() {
        for bad in [
            "file:myproj:src/main.py",
            "entity:myproj:pkg.module.Class",
            "src/main.py",
        ] {
            let v = validate(bad, NodeKind::File);
            assert!(!v.is_valid, "{} should be rejected", bad);
            assert_eq!(v.detected_format, IdFormat::PathEmbedded, "{}", bad);
        }
    }

    #[test]
    fn test_validate_rejects_cross_kind_ids() {
        let fid = file_id_from_content(b"x");
        let v = validate(&fid, NodeKind::Entity);
        assert!(!v.is_valid);
        assert_eq!(v.detected_format, IdFormat::CanonicalFile);

        let eid = entity_id("f", "aa");
        let v = validate(&eid, NodeKind::File);
        assert!(!v.is_valid);
        assert_eq!(v.detected_format, IdFormat::CanonicalEntity);
    }

    #[test]
    fn test_validate_rejects_empty_and_padded_input() {
        let v = validate("", NodeKind::File);
        assert!(!v.is_valid);
        assert_eq!(v.detected_format, IdFormat::Malformed);

        let v = validate("  file_ab12cd34ef56 ", NodeKind::File);
        assert!(!v.is_valid);
        assert_eq!(v.detected_format, IdFormat::Malformed);
    }

    #[test]
    fn test_kind_for_id() {
        assert_eq!(kind_for_id(&project_id("p")), Some(NodeKind::Project));
        assert_eq!(kind_for_id(&directory_id("p", "a")), Some(NodeKind::Directory));
        assert_eq!(kind_for_id(&file_id_from_content(b"x")), Some(NodeKind::File));
        assert_eq!(kind_for_id("numpy"), Some(NodeKind::Entity));
        assert_eq!(kind_for_id("file_placeholder_1"), None);
        assert_eq!(kind_for_id("file:proj:a/b"), None);
    }
}
