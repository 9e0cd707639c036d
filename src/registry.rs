//! Node registry - which physical controller owns which channels.
//!
//! The registry is a human-editable JSON file mapping node ids to channel
//! ranges and transport metadata. It is read fresh from disk on every
//! dispatch call, never cached: edits take effect on the next command without
//! a restart. A missing or corrupt file degrades to an empty registry (all
//! dispatch becomes a no-op) rather than failing the caller - the logical
//! buffer stays fully functional either way.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Declared transport for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Hardwired,
    Wireless,
}

/// One physical controller and the contiguous channel range it drives.
///
/// `channel_start..=channel_end` are 1-based global channel numbers. Ranges
/// are caller-supplied and not validated for overlap; when two records
/// overlap, resolution returns the first match in registry file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub channel_start: u16,
    pub channel_end: u16,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl NodeRecord {
    /// A node is wired if it declares `hardwired`, or if its address is the
    /// local host (legacy registries marked wired nodes that way).
    pub fn is_wired(&self) -> bool {
        self.node_type == Some(NodeType::Hardwired) || self.address.as_deref() == Some("localhost")
    }

    /// Whether this node's range covers `global` (1-based).
    pub fn owns(&self, global: u16) -> bool {
        self.channel_start <= global && global <= self.channel_end
    }

    /// Translate a global channel into this node's 1-based local numbering.
    pub fn local_channel(&self, global: u16) -> u16 {
        global - self.channel_start + 1
    }
}

/// Order-preserving map of node id to record. File order is load-bearing:
/// overlapping ranges tie-break on the first match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRegistry {
    nodes: IndexMap<String, NodeRecord>,
}

impl NodeRegistry {
    /// Find the node owning `global`, if any, along with its node-local
    /// channel number. `None` means no physical node drives this channel -
    /// not an error; the caller commits the buffer write and skips dispatch.
    pub fn resolve(&self, global: u16) -> Option<(&str, &NodeRecord, u16)> {
        self.nodes
            .iter()
            .find(|(_, record)| record.owns(global))
            .map(|(id, record)| (id.as_str(), record, record.local_channel(global)))
    }

    /// Iterate all nodes in file order (broadcast operations hit every one).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[cfg(test)]
    pub fn insert(&mut self, id: impl Into<String>, record: NodeRecord) {
        self.nodes.insert(id.into(), record);
    }
}

/// Why a registry load failed. Dispatch paths never see this - they go
/// through [`RegistryLoader::load`], which logs and falls back to empty -
/// but setup tooling that needs to tell "no file yet" from "broken edit"
/// can call [`RegistryLoader::try_load`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read node registry: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse node registry: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reads the registry file on demand.
pub struct RegistryLoader {
    path: PathBuf,
}

impl RegistryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry from disk. Any read or parse failure logs a warning
    /// and yields an empty registry: a broken registry disables physical
    /// dispatch but never fails a caller.
    pub async fn load(&self) -> NodeRegistry {
        match self.try_load().await {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "node registry unavailable, treating as empty");
                NodeRegistry::default()
            }
        }
    }

    /// Load the registry, surfacing the failure instead of degrading.
    pub async fn try_load(&self) -> Result<NodeRegistry, RegistryError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn wired(start: u16, end: u16) -> NodeRecord {
        NodeRecord {
            channel_start: start,
            channel_end: end,
            node_type: Some(NodeType::Hardwired),
            address: None,
        }
    }

    fn wireless(start: u16, end: u16, address: &str) -> NodeRecord {
        NodeRecord {
            channel_start: start,
            channel_end: end,
            node_type: Some(NodeType::Wireless),
            address: Some(address.to_string()),
        }
    }

    #[test]
    fn test_parse_registry_file_format() {
        let json = r#"{
            "stage-left": { "channel_start": 1, "channel_end": 170, "type": "hardwired" },
            "stage-right": { "channel_start": 171, "channel_end": 342, "type": "wireless", "address": "10.0.0.5" }
        }"#;

        let registry: NodeRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(registry.len(), 2);

        let (id, record, local) = registry.resolve(200).unwrap();
        assert_eq!(id, "stage-right");
        assert_eq!(record.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(local, 30);
    }

    #[test]
    fn test_wired_classification() {
        assert!(wired(1, 10).is_wired());
        assert!(!wireless(1, 10, "10.0.0.5").is_wired());

        // Address "localhost" marks a node wired even without a type.
        let legacy = NodeRecord {
            channel_start: 1,
            channel_end: 10,
            node_type: None,
            address: Some("localhost".to_string()),
        };
        assert!(legacy.is_wired());

        // No type, remote address: wireless.
        let implicit = NodeRecord {
            channel_start: 1,
            channel_end: 10,
            node_type: None,
            address: Some("10.0.0.9".to_string()),
        };
        assert!(!implicit.is_wired());
    }

    #[test]
    fn test_resolve_boundaries() {
        let mut registry = NodeRegistry::default();
        registry.insert("a", wired(1, 170));

        assert_eq!(registry.resolve(1).unwrap().2, 1);
        assert_eq!(registry.resolve(170).unwrap().2, 170);
        assert!(registry.resolve(171).is_none());
    }

    #[test]
    fn test_resolve_overlap_first_match_wins() {
        let mut registry = NodeRegistry::default();
        registry.insert("first", wired(1, 100));
        registry.insert("second", wireless(50, 200, "10.0.0.5"));

        let (id, _, local) = registry.resolve(60).unwrap();
        assert_eq!(id, "first");
        assert_eq!(local, 60);
    }

    #[test]
    fn test_unaddressed_channel_resolves_to_none() {
        let mut registry = NodeRegistry::default();
        registry.insert("a", wired(1, 170));
        registry.insert("b", wireless(171, 342, "10.0.0.5"));

        assert!(registry.resolve(400).is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_empty() {
        let loader = RegistryLoader::new("/nonexistent/nodes.json");
        assert!(loader.load().await.is_empty());
        assert!(matches!(
            loader.try_load().await,
            Err(RegistryError::Read(_))
        ));
    }

    #[tokio::test]
    async fn test_load_malformed_file_yields_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let loader = RegistryLoader::new(file.path());
        assert!(loader.load().await.is_empty());
        assert!(matches!(
            loader.try_load().await,
            Err(RegistryError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_preserves_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "zulu": { "channel_start": 1, "channel_end": 100 },
                "alpha": { "channel_start": 50, "channel_end": 200 }
            }"#,
        )
        .unwrap();

        let loader = RegistryLoader::new(file.path());
        let registry = loader.load().await;

        let ids: Vec<&str> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["zulu", "alpha"]);
        assert_eq!(registry.resolve(60).unwrap().0, "zulu");
    }
}
